//! Per-frame detection quality.
//!
//! A detected quad is scored on three independent terms: how much of the
//! frame its bounding box covers, whether the box has a document-like
//! aspect ratio, and how close each corner is to a right angle. The terms
//! are multiplied together. Area and aspect are hard thresholds, not
//! smooth falloffs, so the score can jump at a band edge.

use serde::Serialize;

use crate::geometry::{Quad, Size};

/// Score when the relative area is outside the optimal band.
pub const AREA_OUT_OF_BAND: f64 = 0.5;
/// Score when the aspect ratio is outside the configured band.
pub const ASPECT_OUT_OF_BAND: f64 = 0.3;
/// Multiplier applied once per corner that is too far from 90 degrees.
pub const IRREGULAR_CORNER_PENALTY: f64 = 0.7;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct QualityConfig {
    pub optimal_area_min: f64,
    pub optimal_area_max: f64,
    pub min_aspect_ratio: f64,
    pub max_aspect_ratio: f64,
    pub quadrature_tolerance_degrees: f64,
}

impl Default for QualityConfig {
    fn default() -> Self {
        Self {
            optimal_area_min: 0.1,
            optimal_area_max: 0.8,
            min_aspect_ratio: 0.3,
            max_aspect_ratio: 1.0,
            quadrature_tolerance_degrees: 30.0,
        }
    }
}

/// Scalar quality plus the measurements behind it, kept for diagnostics.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct DetectionQualityScore {
    pub value: f64,
    pub relative_area: f64,
    pub aspect_ratio: f64,
    /// Largest deviation from 90 degrees over the four corners.
    pub max_angle_deviation: f64,
    pub irregular_corners: u8,
}

impl DetectionQualityScore {
    /// Score recorded for a frame with no detection.
    pub const NONE: f64 = 0.0;
}

/// Score one detected quad against a frame. `frame_size` must have a
/// positive area.
pub fn score(quad: &Quad, frame_size: Size, config: &QualityConfig) -> DetectionQualityScore {
    let bbox = quad.bounding_box();

    let relative_area = bbox.area() / frame_size.area();
    let area_score =
        if relative_area >= config.optimal_area_min && relative_area <= config.optimal_area_max {
            1.0
        } else {
            AREA_OUT_OF_BAND
        };

    // NaN and infinity (zero-height boxes) fall outside the band.
    let aspect_ratio = bbox.size.width / bbox.size.height;
    let aspect_score =
        if aspect_ratio >= config.min_aspect_ratio && aspect_ratio <= config.max_aspect_ratio {
            1.0
        } else {
            ASPECT_OUT_OF_BAND
        };

    let mut regularity = 1.0;
    let mut irregular_corners = 0u8;
    let mut max_angle_deviation: f64 = 0.0;
    for angle in quad.interior_angles() {
        let deviation = (angle - 90.0).abs();
        max_angle_deviation = max_angle_deviation.max(deviation);
        if deviation > config.quadrature_tolerance_degrees {
            regularity *= IRREGULAR_CORNER_PENALTY;
            irregular_corners += 1;
        }
    }

    let value = (area_score * aspect_score * regularity).min(1.0);

    DetectionQualityScore {
        value,
        relative_area,
        aspect_ratio,
        max_angle_deviation,
        irregular_corners,
    }
}
