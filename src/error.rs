use serde::Serialize;
use thiserror::Error;

use crate::camera::LensType;

/// Failures that reach the presentation layer.
///
/// Transient detection misses are not errors and never appear here.
#[derive(Debug, Error)]
pub enum ScanError {
    /// No usable camera, or a lens could not be locked or configured.
    #[error("input device error: {0}")]
    InputDevice(String),

    #[error("camera access not authorized")]
    Authorization,

    /// A triggered photo capture produced no image. Detection continues.
    #[error("capture failed: {0}")]
    Capture(String),

    /// Switching failed and restoring the previous lens failed as well.
    #[error("switch to {attempted} failed and rollback to {previous} failed: {reason}")]
    SwitchRollback {
        attempted: LensType,
        previous: LensType,
        reason: String,
    },

    #[error("session stopped")]
    Stopped,
}

/// Coarse error category carried by presentation events.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum ErrorKind {
    InputDevice,
    Authorization,
    Capture,
    Stopped,
}

impl ScanError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ScanError::InputDevice(_) | ScanError::SwitchRollback { .. } => ErrorKind::InputDevice,
            ScanError::Authorization => ErrorKind::Authorization,
            ScanError::Capture(_) => ErrorKind::Capture,
            ScanError::Stopped => ErrorKind::Stopped,
        }
    }

    /// Fatal errors stop detection; capture errors leave the session usable.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, ScanError::Capture(_))
    }

    pub(crate) fn lock_poisoned(what: &str) -> Self {
        ScanError::InputDevice(format!("{} lock poisoned", what))
    }
}

pub type ScanResult<T> = std::result::Result<T, ScanError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rollback_failure_is_an_input_device_error() {
        let err = ScanError::SwitchRollback {
            attempted: LensType::Telephoto,
            previous: LensType::Wide,
            reason: "busy".to_string(),
        };
        assert_eq!(err.kind(), ErrorKind::InputDevice);
        assert!(err.is_fatal());
        assert!(err.to_string().contains("telephoto"));
    }

    #[test]
    fn capture_errors_are_not_fatal() {
        let err = ScanError::Capture("no image data".to_string());
        assert_eq!(err.kind(), ErrorKind::Capture);
        assert!(!err.is_fatal());
    }
}
