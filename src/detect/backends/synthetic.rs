use anyhow::Result;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::detect::backend::{DetectorConfig, QuadDetector};
use crate::detect::result::{select_best, RectangleObservation};
use crate::frame::Frame;
use crate::geometry::{CoordinateSpace, Point, Quad};

/// Frames per scene cycle.
const CYCLE_FRAMES: u64 = 300;
/// Frames at the end of each cycle during which the document is hard to see.
const DEGRADED_FRAMES: u64 = 120;

/// Synthetic rectangle engine for demos and soak runs.
///
/// Simulates a document held in front of the camera: a slightly jittered
/// quad near the frame center plus a smaller clutter candidate. Every
/// cycle ends with a degraded stretch where most frames detect nothing,
/// so the adaptive lens switch has something to react to.
pub struct SyntheticDetector {
    rng: StdRng,
    dropout: f64,
    degraded_dropout: f64,
}

impl SyntheticDetector {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            dropout: 0.05,
            degraded_dropout: 0.9,
        }
    }

    fn jitter(&mut self, p: Point, amount: f64) -> Point {
        Point::new(
            p.x + self.rng.gen_range(-amount..=amount),
            p.y + self.rng.gen_range(-amount..=amount),
        )
    }

    fn document(&mut self, amount: f64) -> Quad {
        let corners = [
            Point::new(0.35, 0.85),
            Point::new(0.65, 0.85),
            Point::new(0.65, 0.15),
            Point::new(0.35, 0.15),
        ];
        let jittered = corners.map(|p| self.jitter(p, amount));
        Quad::from_corners(jittered, CoordinateSpace::DetectorNormalized)
    }
}

impl QuadDetector for SyntheticDetector {
    fn name(&self) -> &'static str {
        "synthetic"
    }

    fn detect(&mut self, frame: &Frame, config: &DetectorConfig) -> Result<Option<Quad>> {
        let degraded = frame.seq % CYCLE_FRAMES >= CYCLE_FRAMES - DEGRADED_FRAMES;
        let dropout = if degraded {
            self.degraded_dropout
        } else {
            self.dropout
        };
        if self.rng.gen_bool(dropout) {
            return Ok(None);
        }

        let document = self.document(if degraded { 0.03 } else { 0.005 });
        let clutter_origin = self.rng.gen_range(0.0..0.6);
        let clutter = Quad::from_corners(
            [
                Point::new(clutter_origin, clutter_origin + 0.15),
                Point::new(clutter_origin + 0.1, clutter_origin + 0.15),
                Point::new(clutter_origin + 0.1, clutter_origin),
                Point::new(clutter_origin, clutter_origin),
            ],
            CoordinateSpace::DetectorNormalized,
        );
        let observations = [
            RectangleObservation::new(document, self.rng.gen_range(0.75..1.0)),
            RectangleObservation::new(clutter, self.rng.gen_range(0.5..1.0)),
        ];
        Ok(select_best(&observations, frame.size(), config))
    }
}
