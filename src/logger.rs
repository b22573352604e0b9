use std::path::PathBuf;

use log::LevelFilter;
use log4rs::{
    append::rolling_file::{
        policy::compound::{
            roll::fixed_window::FixedWindowRoller, trigger::size::SizeTrigger, CompoundPolicy,
        },
        RollingFileAppender,
    },
    config::{Appender, Config, Root},
    encode::pattern::PatternEncoder,
};
use tauri::Manager;

type AnyError = Box<dyn std::error::Error>;

fn err(msg: impl Into<String>) -> AnyError {
    Box::new(std::io::Error::other(msg.into()))
}

fn log_paths(app: &tauri::AppHandle) -> Result<(PathBuf, PathBuf), AnyError> {
    let logs_dir = app
        .path()
        .app_data_dir()
        .map_err(|e| err(format!("failed to resolve app data dir: {e}")))?
        .join("logs");
    let log_file = logs_dir.join("nebula-launcher.log");
    Ok((logs_dir, log_file))
}

/// File logging (AppDataDir/logs/nebula-launcher.log), rolled by size.
pub fn init(app: &tauri::AppHandle) -> Result<(), AnyError> {
    let (logs_dir, log_file) = log_paths(app)?;
    std::fs::create_dir_all(&logs_dir).map_err(|e| err(e.to_string()))?;

    // 5MB per file, keep 3 rolled files.
    let roller = FixedWindowRoller::builder()
        .build(
            &logs_dir
                .join("nebula-launcher.{}.log")
                .to_string_lossy()
                .to_string(),
            3,
        )
        .map_err(|e| err(e.to_string()))?;
    let policy = CompoundPolicy::new(Box::new(SizeTrigger::new(5 * 1024 * 1024)), Box::new(roller));

    let file_appender = RollingFileAppender::builder()
        .encoder(Box::new(PatternEncoder::new(
            "{d(%Y-%m-%d %H:%M:%S%.3f)} [{l}] {t} - {m}{n}",
        )))
        .build(&log_file, Box::new(policy))
        .map_err(|e| err(e.to_string()))?;

    let cfg_builder = {
        let cfg_builder =
            Config::builder().appender(Appender::builder().build("file", Box::new(file_appender)));

        // In dev builds, also log to console for convenience.
        #[cfg(debug_assertions)]
        let cfg_builder = {
            use log4rs::append::console::ConsoleAppender;
            let stdout = ConsoleAppender::builder()
                .encoder(Box::new(PatternEncoder::new("[{l}] {m}{n}")))
                .build();
            cfg_builder.appender(Appender::builder().build("stdout", Box::new(stdout)))
        };

        cfg_builder
    };

    let root_builder = {
        let root_builder = Root::builder().appender("file");
        #[cfg(debug_assertions)]
        let root_builder = root_builder.appender("stdout");
        root_builder
    };

    let cfg = cfg_builder
        .build(root_builder.build(LevelFilter::Info))
        .map_err(|e| err(e.to_string()))?;

    // Ignore error if already initialized (hot reload / repeated setup).
    if log4rs::init_config(cfg).is_err() {
        return Ok(());
    }

    std::panic::set_hook(Box::new(|info| {
        log::error!("panic: {info}");
    }));

    log::info!("logger initialized");
    log::info!("log file: {}", log_file.to_string_lossy());
    Ok(())
}
