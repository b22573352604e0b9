use serde::{Deserialize, Serialize};
use tauri::{AppHandle, Emitter};

use crate::state::SessionSnapshot;

/// Stage of the download/launch lifecycle. Transitions are dictated by
/// host-pushed events only; the controller never infers them locally.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    #[default]
    Idle,
    Downloading,
    Installing,
    Launching,
}

impl Stage {
    /// Parses the wire form of a stage. Unknown or missing values yield
    /// `None`, which the controller treats as "no stage transition".
    pub fn from_wire(s: &str) -> Option<Stage> {
        match s {
            "idle" => Some(Stage::Idle),
            "downloading" | "download" => Some(Stage::Downloading),
            "installing" | "install" => Some(Stage::Installing),
            "launching" | "launch" => Some(Stage::Launching),
            _ => None,
        }
    }
}

/// Download/installation progress as last reported by the host service.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DownloadProgress {
    pub stage: Stage,
    pub percent: f64, // 0.0..=100.0
    pub message: String,
    pub current_file: String,
    pub speed: String,
    pub downloaded: u64,
    pub total: u64,
}

/// Launcher self-update asset announced by the host service.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct UpdateAsset {
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub sha256: String,
}

/// Self-update state, tracked separately from game download progress.
/// `pending` is set only by the unsolicited availability event;
/// `is_updating` only by the explicit update command.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SelfUpdateState {
    pub pending: Option<UpdateAsset>,
    pub is_updating: bool,
    pub downloaded: u64,
    pub total: u64,
}

/// Frontend-facing session event.
///
/// Event name: `session://state`
pub fn emit_session_state(app: &AppHandle, snapshot: &SessionSnapshot) {
    let _ = app.emit("session://state", snapshot);
}
