use anyhow::Result;

use crate::frame::Frame;
use crate::geometry::Quad;

/// Detection parameters handed to the shape detector on every frame.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DetectorConfig {
    /// Short side over long side of the candidate's bounding box.
    pub min_aspect_ratio: f64,
    pub max_aspect_ratio: f64,
    pub min_confidence: f32,
    pub max_observations: usize,
    /// Short side of the candidate as a fraction of the frame's short side.
    pub min_size: f64,
    pub quadrature_tolerance_degrees: f64,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            min_aspect_ratio: 0.3,
            max_aspect_ratio: 1.0,
            min_confidence: 0.8,
            max_observations: 1,
            min_size: 0.2,
            quadrature_tolerance_degrees: 30.0,
        }
    }
}

/// Frame-to-quad shape detector.
///
/// Implementations return the single best candidate for the frame, or
/// `None`. A detector error is treated by the loop exactly like `None`:
/// the next frame supersedes it.
pub trait QuadDetector: Send {
    /// Backend identifier.
    fn name(&self) -> &'static str;

    fn detect(&mut self, frame: &Frame, config: &DetectorConfig) -> Result<Option<Quad>>;

    /// Optional warm-up hook.
    fn warm_up(&mut self) -> Result<()> {
        Ok(())
    }
}
