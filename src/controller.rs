use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::catalog::VersionCatalog;
use crate::error::{ActiveError, ErrorKind, GatewayError};
use crate::events::{BackendEvent, DownloadProgressEvent};
use crate::gateway::{BackendGateway, DiagnosticReport};
use crate::progress::{DownloadProgress, Stage};
use crate::state::{
    Branch, SessionSnapshot, SessionStore, AUTO_VERSION, CONNECTION_WARNING_MESSAGE, READY_MESSAGE,
};

pub const MAX_NICKNAME_LEN: usize = 16;

/// Keeps the 100%-complete state visible before collapsing back to idle.
const SETTLE_DELAY: Duration = Duration::from_secs(2);

/// Instance the host applies version selection to. Multi-instance support
/// lives host-side; the launcher always drives the default instance.
const DEFAULT_INSTANCE: &str = "default";

enum PlayGate {
    Started,
    AlreadyRunning,
    InvalidNickname,
}

fn nickname_problem(nickname: &str) -> Option<&'static str> {
    if nickname.is_empty() {
        return Some("Please enter a nickname");
    }
    if nickname.chars().count() > MAX_NICKNAME_LEN {
        return Some("Nickname is too long (max 16 characters)");
    }
    None
}

fn versions_with_auto(list: &[String]) -> Vec<String> {
    let mut versions = Vec::with_capacity(list.len() + 1);
    versions.push(AUTO_VERSION.to_string());
    versions.extend(list.iter().cloned());
    versions
}

/// Orchestration core: issues gateway commands, applies optimistic updates,
/// reconciles host confirmations and pushed events into the session store,
/// and exposes the command surface the presentation layer calls.
pub struct LaunchSessionController {
    gateway: Arc<dyn BackendGateway>,
    store: Arc<SessionStore>,
    catalog: VersionCatalog,
    settle_delay: Duration,
    /// Download cycle generation. Bumped by every `play` and every forced
    /// reset so stale settle timers become no-ops.
    cycle: Arc<AtomicU64>,
    /// Cycle a settle timer is already scheduled for (0 = none).
    settle_scheduled: Arc<AtomicU64>,
}

impl LaunchSessionController {
    pub fn new(gateway: Arc<dyn BackendGateway>) -> Self {
        Self::with_settle_delay(gateway, SETTLE_DELAY)
    }

    pub fn with_settle_delay(gateway: Arc<dyn BackendGateway>, settle_delay: Duration) -> Self {
        let catalog = VersionCatalog::new(Arc::clone(&gateway));
        LaunchSessionController {
            gateway,
            store: Arc::new(SessionStore::new()),
            catalog,
            settle_delay,
            cycle: Arc::new(AtomicU64::new(1)),
            settle_scheduled: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn store(&self) -> &Arc<SessionStore> {
        &self.store
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.store.snapshot()
    }

    /// Initial session load: identity, persisted branch/version, catalog,
    /// launcher version and news. Identity/instance failures degrade to a
    /// warning status instead of aborting the session.
    pub async fn bootstrap(&self) {
        let mut load_error: Option<GatewayError> = None;

        let nickname = match self.gateway.get_identity().await {
            Ok(n) => {
                let n = n.trim().to_string();
                if n.is_empty() {
                    None
                } else {
                    Some(n)
                }
            }
            Err(e) => {
                load_error = Some(e);
                None
            }
        };

        let info = match self.gateway.get_instance_info().await {
            Ok(info) => Some(info),
            Err(e) => {
                load_error = Some(e);
                None
            }
        };
        let branch = info
            .as_ref()
            .and_then(|i| Branch::from_wire(i.branch.trim()))
            .unwrap_or_default();
        let stored_version = info
            .as_ref()
            .map(|i| i.version.trim().to_string())
            .filter(|v| !v.is_empty());

        let mut fetch_error: Option<GatewayError> = None;
        let catalog_list = match self.catalog.fetch(branch).await {
            Ok(list) => list,
            Err(e) => {
                fetch_error = Some(e);
                self.catalog.cached(branch)
            }
        };

        let launcher_version = match self.gateway.get_launcher_version().await {
            Ok(v) => v,
            Err(e) => {
                log::warn!("launcher version unavailable: {e}");
                String::new()
            }
        };
        let news = match self.gateway.get_news_feed().await {
            Ok(items) => items,
            Err(e) => {
                log::warn!("news feed unavailable: {e}");
                vec![]
            }
        };

        self.store.update(|s| {
            if let Some(nickname) = &nickname {
                s.nickname = nickname.clone();
            }
            s.branch = branch;
            s.versions = versions_with_auto(&catalog_list);
            s.selected_version = match &stored_version {
                Some(v) if v == AUTO_VERSION || catalog_list.contains(v) => v.clone(),
                _ => AUTO_VERSION.to_string(),
            };
            s.launcher_version = launcher_version.clone();
            s.news = news.clone();
            if let Some(e) = &load_error {
                s.status_message = CONNECTION_WARNING_MESSAGE.to_string();
                s.active_error = Some(ActiveError::from_gateway(
                    ErrorKind::InstanceLoad,
                    "Failed to load launcher configuration",
                    e,
                ));
            } else if let Some(e) = &fetch_error {
                s.active_error = Some(ActiveError::from_gateway(
                    ErrorKind::VersionFetch,
                    "Failed to fetch available versions",
                    e,
                ));
            }
        });
        log::info!(
            "session bootstrapped: branch={}, versions={}",
            branch.as_wire(),
            self.store.snapshot().versions.len()
        );
    }

    /// Starts the download/launch pipeline. The gateway call stays open for
    /// the whole operation; completion is signaled by the terminal idle
    /// event, not by this call resolving.
    pub async fn play(&self, nickname: &str, server_address: Option<&str>) -> Result<(), String> {
        let trimmed = nickname.trim().to_string();
        let problem = nickname_problem(&trimmed);

        let mut gate = PlayGate::Started;
        self.store.update(|s| {
            // Re-entrancy guard first: a command issued mid-flight changes
            // nothing and never reaches the host.
            if s.is_downloading {
                gate = PlayGate::AlreadyRunning;
                return;
            }
            if let Some(problem) = problem {
                gate = PlayGate::InvalidNickname;
                s.active_error = Some(ActiveError::validation(problem));
                return;
            }
            // Optimistic: the host may hold the call open for the entire
            // operation, so the UI flips to "in progress" right away.
            s.is_downloading = true;
            s.progress = DownloadProgress::default();
        });

        match gate {
            PlayGate::AlreadyRunning => {
                log::warn!("play ignored: operation already in progress");
                return Err("an operation is already in progress".to_string());
            }
            PlayGate::InvalidNickname => {
                return Err(problem.unwrap_or("invalid nickname").to_string())
            }
            PlayGate::Started => {}
        }

        self.cycle.fetch_add(1, Ordering::SeqCst);
        self.settle_scheduled.store(0, Ordering::SeqCst);
        log::info!("play requested");

        if let Err(e) = self.gateway.play(&trimmed, server_address).await {
            // Rejected before completion: nothing to show, reset immediately.
            self.cycle.fetch_add(1, Ordering::SeqCst);
            self.settle_scheduled.store(0, Ordering::SeqCst);
            self.store.update(|s| {
                s.is_downloading = false;
                s.progress = DownloadProgress::default();
                s.status_message = READY_MESSAGE.to_string();
                s.active_error = Some(ActiveError::from_gateway(
                    ErrorKind::Launch,
                    "Failed to start the game",
                    &e,
                ));
            });
            return Err(e.to_string());
        }
        Ok(())
    }

    /// Persists the new nickname through the host before committing it
    /// locally; identity changes only.
    pub async fn rename(&self, nickname: &str) -> Result<(), String> {
        let trimmed = nickname.trim().to_string();
        if let Some(problem) = nickname_problem(&trimmed) {
            self.store
                .update(|s| s.active_error = Some(ActiveError::validation(problem)));
            return Err(problem.to_string());
        }

        if let Err(e) = self.gateway.set_identity(&trimmed).await {
            self.store.update(|s| {
                s.active_error = Some(ActiveError::from_gateway(
                    ErrorKind::Config,
                    "Failed to save nickname",
                    &e,
                ));
            });
            return Err(e.to_string());
        }
        self.store.update(|s| s.nickname = trimmed.clone());
        Ok(())
    }

    /// Two-phase branch switch: persist host-side first, only then commit
    /// locally, refresh the catalog and revalidate the selected version. A
    /// persistence failure leaves the branch exactly as it was.
    pub async fn select_branch(&self, branch: Branch) -> Result<(), String> {
        if self.store.snapshot().branch == branch {
            return Ok(());
        }

        if let Err(e) = self.gateway.set_branch(branch).await {
            self.store.update(|s| {
                s.active_error = Some(ActiveError::from_gateway(
                    ErrorKind::Config,
                    "Failed to switch branch",
                    &e,
                ));
            });
            return Err(e.to_string());
        }

        let mut fetch_error: Option<GatewayError> = None;
        let catalog_list = match self.catalog.fetch(branch).await {
            Ok(list) => list,
            Err(e) => {
                fetch_error = Some(e);
                self.catalog.cached(branch)
            }
        };

        // Branch + catalog + selection land as one batched notification.
        self.store.update(|s| {
            s.branch = branch;
            s.versions = versions_with_auto(&catalog_list);
            if s.selected_version != AUTO_VERSION && !catalog_list.contains(&s.selected_version) {
                s.selected_version = AUTO_VERSION.to_string();
            }
            if let Some(e) = &fetch_error {
                s.active_error = Some(ActiveError::from_gateway(
                    ErrorKind::VersionFetch,
                    "Failed to fetch available versions",
                    e,
                ));
            }
        });
        log::info!("branch switched to {}", branch.as_wire());

        match fetch_error {
            Some(e) => Err(e.to_string()),
            None => Ok(()),
        }
    }

    /// Version selection is optimistic: the local choice sticks even if
    /// persisting it fails (unlike branch changes; see DESIGN.md).
    pub async fn select_version(&self, version: &str) -> Result<(), String> {
        let known = self
            .store
            .snapshot()
            .versions
            .iter()
            .any(|v| v == version);
        if !known {
            self.store.update(|s| {
                s.active_error = Some(ActiveError::validation(format!(
                    "Unknown version: {version}"
                )));
            });
            return Err(format!("unknown version: {version}"));
        }

        self.store
            .update(|s| s.selected_version = version.to_string());

        if let Err(e) = self.gateway.set_version(version, DEFAULT_INSTANCE).await {
            self.store.update(|s| {
                s.active_error = Some(ActiveError::from_gateway(
                    ErrorKind::Config,
                    "Failed to save version selection",
                    &e,
                ));
            });
            return Err(e.to_string());
        }
        Ok(())
    }

    /// Explicit self-update start. Availability events never start one on
    /// their own. The update ends with a process restart; only a rejection
    /// clears `is_updating`.
    pub async fn request_self_update(&self) -> Result<(), String> {
        let mut already_running = false;
        self.store.update(|s| {
            if s.self_update.is_updating {
                already_running = true;
                return;
            }
            s.self_update.is_updating = true;
            s.self_update.downloaded = 0;
            s.self_update.total = 0;
        });
        if already_running {
            return Err("launcher update already in progress".to_string());
        }

        log::info!("launcher self-update requested");
        if let Err(e) = self.gateway.request_self_update().await {
            self.store.update(|s| {
                s.self_update.is_updating = false;
                s.active_error = Some(ActiveError::from_gateway(
                    ErrorKind::Update,
                    "Failed to update the launcher",
                    &e,
                ));
            });
            return Err(e.to_string());
        }
        Ok(())
    }

    pub fn dismiss_error(&self) {
        self.store.update(|s| s.active_error = None);
    }

    pub fn advance_news(&self) {
        self.store.update(|s| {
            if !s.news.is_empty() {
                s.news_index = (s.news_index + 1) % s.news.len();
            }
        });
    }

    pub async fn run_diagnostics(&self) -> Result<DiagnosticReport, String> {
        match self.gateway.run_diagnostics().await {
            Ok(report) => Ok(report),
            Err(e) => {
                self.store.update(|s| {
                    s.active_error = Some(ActiveError::from_gateway(
                        ErrorKind::Backend,
                        "Diagnostics failed",
                        &e,
                    ));
                });
                Err(e.to_string())
            }
        }
    }

    /// Applies one pushed event. Events are handled in arrival order; the
    /// two progress streams are disjoint enum variants, so a self-update
    /// event can never leak into download state or vice versa.
    pub fn handle_event(&self, event: BackendEvent) {
        match event {
            BackendEvent::DownloadProgress(progress) => self.apply_download_progress(&progress),
            BackendEvent::SelfUpdateAvailable { asset } => {
                log::info!("launcher update available: {}", asset.url);
                self.store
                    .update(|s| s.self_update.pending = Some(asset.clone()));
            }
            BackendEvent::SelfUpdateProgress { downloaded, total } => {
                self.store.update(|s| {
                    s.self_update.downloaded = downloaded;
                    s.self_update.total = total;
                });
            }
            BackendEvent::BackendError {
                kind,
                message,
                technical,
            } => {
                // A host-side error means the in-flight operation cannot
                // continue; stop showing it and invalidate any settle timer.
                self.cycle.fetch_add(1, Ordering::SeqCst);
                self.settle_scheduled.store(0, Ordering::SeqCst);
                self.store.update(|s| {
                    s.active_error = Some(ActiveError::new(kind, message.clone(), technical.clone()));
                    s.is_downloading = false;
                    s.progress = DownloadProgress::default();
                    s.status_message = READY_MESSAGE.to_string();
                });
            }
        }
    }

    fn apply_download_progress(&self, event: &DownloadProgressEvent) {
        let stage = event.stage();
        let mut schedule_settle = false;

        self.store.update(|s| {
            if stage == Some(Stage::Idle) {
                // Terminal event. A duplicate after the reset is a no-op.
                if !s.is_downloading {
                    return;
                }
                merge_progress(s, event, stage);
                schedule_settle = true;
                return;
            }
            if stage.is_none() && !s.is_downloading {
                // Stage-less stray while idle: nothing to merge onto.
                return;
            }
            s.is_downloading = true;
            merge_progress(s, event, stage);
        });

        if schedule_settle {
            self.schedule_settle();
        }
    }

    fn schedule_settle(&self) {
        let cycle_now = self.cycle.load(Ordering::SeqCst);
        if self.settle_scheduled.swap(cycle_now, Ordering::SeqCst) == cycle_now {
            return; // already ticking for this cycle
        }

        let store = Arc::clone(&self.store);
        let cycle = Arc::clone(&self.cycle);
        let scheduled = Arc::clone(&self.settle_scheduled);
        let delay = self.settle_delay;
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if cycle.load(Ordering::SeqCst) != cycle_now {
                return; // superseded by a newer cycle or a forced reset
            }
            scheduled.store(0, Ordering::SeqCst);
            store.update(|s| {
                s.is_downloading = false;
                s.progress = DownloadProgress::default();
                s.status_message = READY_MESSAGE.to_string();
            });
        });
    }
}

/// Merges one progress event. Percent may never go backwards within a
/// stage; a stage transition re-baselines it.
fn merge_progress(s: &mut SessionSnapshot, event: &DownloadProgressEvent, stage: Option<Stage>) {
    let previous_stage = s.progress.stage;
    if let Some(stage) = stage {
        s.progress.stage = stage;
    }
    s.progress.percent = if s.progress.stage == previous_stage {
        s.progress.percent.max(event.percent)
    } else {
        event.percent
    };
    s.progress.message = event.message.clone();
    if !event.message.is_empty() {
        s.status_message = event.message.clone();
    }
    s.progress.current_file = event.current_file.clone();
    s.progress.speed = event.speed.clone();
    s.progress.downloaded = event.downloaded;
    s.progress.total = event.total;
}
