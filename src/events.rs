use serde_json::Value;

use crate::error::ErrorKind;
use crate::progress::{Stage, UpdateAsset};

pub const EVENT_DOWNLOAD_PROGRESS: &str = "download-progress";
pub const EVENT_SELFUPDATE_AVAILABLE: &str = "selfupdate-available";
pub const EVENT_SELFUPDATE_PROGRESS: &str = "selfupdate-progress";
pub const EVENT_BACKEND_ERROR: &str = "backend-error";

/// One frame from the host push channel, still untyped.
#[derive(Debug, Clone)]
pub struct RawEvent {
    pub name: String,
    pub payload: Value,
}

/// Game download/install progress push. Fields the host omitted (or sent
/// with the wrong type) come through as empty values; a partial event must
/// merge cleanly, never crash rendering.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DownloadProgressEvent {
    stage: String,
    pub percent: f64,
    pub message: String,
    pub current_file: String,
    pub speed: String,
    pub downloaded: u64,
    pub total: u64,
}

impl DownloadProgressEvent {
    fn from_value(payload: &Value) -> Self {
        DownloadProgressEvent {
            stage: str_field(payload, "stage"),
            percent: payload
                .get("percent")
                .and_then(Value::as_f64)
                .unwrap_or(0.0)
                .clamp(0.0, 100.0),
            message: str_field(payload, "message"),
            current_file: str_field(payload, "currentFile"),
            speed: str_field(payload, "speed"),
            downloaded: u64_field(payload, "downloaded"),
            total: u64_field(payload, "total"),
        }
    }

    /// `None` when the host sent no recognizable stage; the controller then
    /// keeps the current stage rather than guessing a transition.
    pub fn stage(&self) -> Option<Stage> {
        Stage::from_wire(&self.stage)
    }

    #[cfg(test)]
    pub fn for_test(stage: Stage, percent: f64) -> Self {
        DownloadProgressEvent {
            stage: match stage {
                Stage::Idle => "idle",
                Stage::Downloading => "downloading",
                Stage::Installing => "installing",
                Stage::Launching => "launching",
            }
            .to_string(),
            percent,
            ..DownloadProgressEvent::default()
        }
    }
}

/// Push events, routed by name into two disjoint streams (game download vs.
/// launcher self-update) plus the error relay. A handler for one stream can
/// never observe fields meant for the other.
#[derive(Debug, Clone, PartialEq)]
pub enum BackendEvent {
    DownloadProgress(DownloadProgressEvent),
    SelfUpdateAvailable {
        asset: UpdateAsset,
    },
    SelfUpdateProgress {
        downloaded: u64,
        total: u64,
    },
    BackendError {
        kind: ErrorKind,
        message: String,
        technical: String,
    },
}

impl BackendEvent {
    /// Normalizes a raw frame. Unknown event names yield `None` and are
    /// dropped by the pump.
    pub fn parse(name: &str, payload: &Value) -> Option<BackendEvent> {
        match name {
            EVENT_DOWNLOAD_PROGRESS => Some(BackendEvent::DownloadProgress(
                DownloadProgressEvent::from_value(payload),
            )),
            EVENT_SELFUPDATE_AVAILABLE => {
                let asset = payload
                    .get("asset")
                    .cloned()
                    .and_then(|v| serde_json::from_value::<UpdateAsset>(v).ok())
                    .unwrap_or_default();
                Some(BackendEvent::SelfUpdateAvailable { asset })
            }
            EVENT_SELFUPDATE_PROGRESS => Some(BackendEvent::SelfUpdateProgress {
                downloaded: u64_field(payload, "downloaded"),
                total: u64_field(payload, "total"),
            }),
            EVENT_BACKEND_ERROR => Some(BackendEvent::BackendError {
                kind: ErrorKind::from_wire(&str_field(payload, "kind")),
                message: str_field(payload, "message"),
                technical: str_field(payload, "technical"),
            }),
            _ => None,
        }
    }
}

fn str_field(payload: &Value, key: &str) -> String {
    payload
        .get(key)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

fn u64_field(payload: &Value, key: &str) -> u64 {
    payload.get(key).and_then(Value::as_u64).unwrap_or(0)
}
