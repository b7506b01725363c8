//! Frame sources.
//!
//! Camera frames normally arrive from the platform capture pipeline. The
//! synthetic source here stands in for it in the daemon and in tests.
//! Sources hand frames to the detection loop and never retain them.

pub mod synthetic;

pub use synthetic::{SourceConfig, SourceStats, SyntheticSource};
