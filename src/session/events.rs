use serde::Serialize;

use crate::camera::{CapturedPhoto, LensType};
use crate::error::ErrorKind;
use crate::geometry::{Quad, Size};

/// Who asked for a lens change.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum SwitchOrigin {
    Controller,
    Caller,
}

/// Messages for the presentation layer. Always delivered through a
/// channel, never by calling into the UI from the detection thread.
#[derive(Clone, Debug, PartialEq)]
pub enum SessionEvent {
    /// Overlay update in display space; `None` clears the overlay.
    DetectionUpdate {
        quad: Option<Quad>,
        frame_size: Size,
    },
    CaptureStarted,
    /// `quad` is in frame pixel space, ready for cropping.
    CaptureCompleted {
        photo: CapturedPhoto,
        quad: Option<Quad>,
    },
    LensChanged {
        lens: LensType,
        origin: SwitchOrigin,
    },
    SwitchRolledBack {
        attempted: LensType,
        restored: LensType,
    },
    Error(ErrorKind),
}

/// Running counters for one session.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct SessionStats {
    pub frames_processed: u64,
    pub frames_dropped: u64,
    pub detections: u64,
    pub no_detections: u64,
    pub auto_switches: u64,
    pub captures_triggered: u64,
}
