//! Document scanning camera control core.
//!
//! Owns the decisions between the raw camera feed and the scanning UI:
//! which back-facing lens to use, how good each frame's document
//! detection is, when to switch lenses automatically, and how a detected
//! outline maps onto the portrait preview.
//!
//! # Module Structure
//!
//! - `geometry`: points, sizes, rects and detected quads
//! - `quality`: per-frame detection quality score
//! - `camera`: lens inventory, selection policy, switch transaction,
//!   adaptive switch controller
//! - `transform`: detector space to display space
//! - `detect`: shape detector boundary and candidate selection
//! - `funnel`: multi-frame stabilization boundary
//! - `frame` / `ingest`: camera frames and a synthetic source
//! - `session`: the per-frame loop and its control thread
//! - `config`: file and environment configuration

pub mod camera;
pub mod config;
pub mod detect;
pub mod error;
pub mod frame;
pub mod funnel;
pub mod geometry;
pub mod ingest;
pub mod quality;
pub mod session;
pub mod transform;

pub use camera::{
    CameraInventory, CameraManager, CameraPreference, ControllerConfig, LensDescriptor, LensType,
    MacroMode,
};
pub use config::ScanConfig;
pub use detect::{DetectorConfig, QuadDetector};
pub use error::{ErrorKind, ScanError, ScanResult};
pub use frame::Frame;
pub use funnel::{FunnelDecision, StabilizationFunnel};
pub use geometry::{CoordinateSpace, Point, Quad, Rect, Size};
pub use quality::{DetectionQualityScore, QualityConfig};
pub use session::{
    FrameOutcome, ScanSession, SessionConfig, SessionEvent, SessionStats, StopHandle,
};
pub use transform::compose_display_transform;
