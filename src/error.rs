use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;

/// Transport-level failure of a gateway call. Cloneable so coalesced
/// in-flight fetches can hand the same failure to every waiter.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum GatewayError {
    #[error("host unreachable: {0}")]
    Transport(String),
    #[error("{0}")]
    Rejected(String),
}

impl GatewayError {
    pub fn transport(e: impl std::fmt::Display) -> Self {
        GatewayError::Transport(e.to_string())
    }
}

/// Category of a user-visible error, mirrored verbatim to the frontend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ErrorKind {
    #[serde(rename = "VALIDATION")]
    Validation,
    #[serde(rename = "LAUNCH_ERROR")]
    Launch,
    #[serde(rename = "UPDATE_ERROR")]
    Update,
    #[serde(rename = "CONFIG_ERROR")]
    Config,
    #[serde(rename = "VERSION_FETCH_ERROR")]
    VersionFetch,
    #[serde(rename = "INSTANCE_LOAD_ERROR")]
    InstanceLoad,
    #[serde(rename = "BACKEND_ERROR")]
    Backend,
}

impl ErrorKind {
    /// Maps an error kind pushed by the host service. Unknown kinds fold
    /// into the generic backend category.
    pub fn from_wire(kind: &str) -> Self {
        match kind {
            "VALIDATION" => ErrorKind::Validation,
            "LAUNCH_ERROR" => ErrorKind::Launch,
            "UPDATE_ERROR" => ErrorKind::Update,
            "CONFIG_ERROR" => ErrorKind::Config,
            "VERSION_FETCH_ERROR" => ErrorKind::VersionFetch,
            "INSTANCE_LOAD_ERROR" => ErrorKind::InstanceLoad,
            _ => ErrorKind::Backend,
        }
    }
}

/// The one error shown to the user at a time. A new error replaces the
/// previous one; clearing is an explicit user action.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActiveError {
    #[serde(rename = "type")]
    pub kind: ErrorKind,
    pub message: String,
    pub technical: String,
    pub timestamp: DateTime<Utc>,
}

impl ActiveError {
    pub fn new(kind: ErrorKind, message: impl Into<String>, technical: impl Into<String>) -> Self {
        let err = ActiveError {
            kind,
            message: message.into(),
            technical: technical.into(),
            timestamp: Utc::now(),
        };
        log::error!("[{:?}] {} ({})", err.kind, err.message, err.technical);
        err
    }

    pub fn validation(message: impl Into<String>) -> Self {
        ActiveError::new(ErrorKind::Validation, message, "")
    }

    /// Wraps a failed gateway call with a user-facing message.
    pub fn from_gateway(kind: ErrorKind, message: impl Into<String>, err: &GatewayError) -> Self {
        ActiveError::new(kind, message, err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_kind_round_trip() {
        assert_eq!(ErrorKind::from_wire("CONFIG_ERROR"), ErrorKind::Config);
        assert_eq!(ErrorKind::from_wire("VALIDATION"), ErrorKind::Validation);
        assert_eq!(ErrorKind::from_wire("something-else"), ErrorKind::Backend);
    }

    #[test]
    fn kind_serializes_as_screaming_tag() {
        let err = ActiveError::validation("bad nickname");
        let json = serde_json::to_value(&err).unwrap();
        assert_eq!(json["type"], "VALIDATION");
        assert_eq!(json["message"], "bad nickname");
    }
}
