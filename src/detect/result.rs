use crate::geometry::{CoordinateSpace, Quad, Size};
use crate::transform::to_pixel_space;

use super::backend::DetectorConfig;

/// One raw candidate from the underlying rectangle engine.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RectangleObservation {
    pub quad: Quad,
    pub confidence: f32,
}

impl RectangleObservation {
    pub fn new(quad: Quad, confidence: f32) -> Self {
        Self { quad, confidence }
    }
}

/// Apply the detector thresholds to raw observations and return the
/// largest surviving candidate.
///
/// Candidates are ranked by confidence and cut to `max_observations`
/// before the largest bounding box is picked; ties go to confidence.
pub fn select_best(
    observations: &[RectangleObservation],
    frame_size: Size,
    config: &DetectorConfig,
) -> Option<Quad> {
    let mut accepted: Vec<(&RectangleObservation, f64)> = observations
        .iter()
        .filter(|obs| obs.confidence >= config.min_confidence && obs.quad.is_valid())
        .filter_map(|obs| {
            let pixel = match obs.quad.space {
                CoordinateSpace::DetectorNormalized => to_pixel_space(&obs.quad, frame_size),
                _ => obs.quad,
            };
            let bbox = pixel.bounding_box();
            let short = bbox.size.width.min(bbox.size.height);
            let long = bbox.size.width.max(bbox.size.height);
            if long <= 0.0 {
                return None;
            }
            let aspect = short / long;
            if aspect < config.min_aspect_ratio || aspect > config.max_aspect_ratio {
                return None;
            }
            let frame_short = frame_size.width.min(frame_size.height);
            if short / frame_short < config.min_size {
                return None;
            }
            let square = pixel
                .interior_angles()
                .iter()
                .all(|a| (a - 90.0).abs() <= config.quadrature_tolerance_degrees);
            if !square {
                return None;
            }
            Some((obs, bbox.area()))
        })
        .collect();

    accepted.sort_by(|a, b| b.0.confidence.total_cmp(&a.0.confidence));
    accepted.truncate(config.max_observations.max(1));

    accepted
        .into_iter()
        .max_by(|a, b| {
            a.1.total_cmp(&b.1)
                .then_with(|| a.0.confidence.total_cmp(&b.0.confidence))
        })
        .map(|(obs, _)| obs.quad)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::{Point, Rect};

    const FRAME: Size = Size::new(1000.0, 800.0);

    fn obs(x: f64, y: f64, w: f64, h: f64, confidence: f32) -> RectangleObservation {
        RectangleObservation::new(
            Quad::from_rect(Rect::new(x, y, w, h), CoordinateSpace::Pixel),
            confidence,
        )
    }

    fn config(max_observations: usize) -> DetectorConfig {
        DetectorConfig {
            max_observations,
            ..DetectorConfig::default()
        }
    }

    #[test]
    fn low_confidence_is_dropped() {
        let candidates = [obs(0.0, 0.0, 400.0, 500.0, 0.5)];
        assert!(select_best(&candidates, FRAME, &config(1)).is_none());
    }

    #[test]
    fn small_and_thin_candidates_are_dropped() {
        let candidates = [
            obs(0.0, 0.0, 100.0, 120.0, 0.95),
            obs(0.0, 0.0, 600.0, 100.0, 0.95),
        ];
        assert!(select_best(&candidates, FRAME, &config(5)).is_none());
    }

    #[test]
    fn skewed_candidates_are_dropped() {
        let skewed = RectangleObservation::new(
            Quad::new(
                Point::new(400.0, 100.0),
                Point::new(800.0, 100.0),
                Point::new(500.0, 600.0),
                Point::new(100.0, 600.0),
                CoordinateSpace::Pixel,
            ),
            0.99,
        );
        assert!(select_best(&[skewed], FRAME, &config(1)).is_none());
    }

    #[test]
    fn self_intersecting_candidates_are_dropped() {
        let bowtie = RectangleObservation::new(
            Quad::new(
                Point::new(100.0, 100.0),
                Point::new(600.0, 100.0),
                Point::new(100.0, 700.0),
                Point::new(600.0, 700.0),
                CoordinateSpace::Pixel,
            ),
            0.99,
        );
        assert!(select_best(&[bowtie], FRAME, &config(1)).is_none());
    }

    #[test]
    fn largest_of_top_candidates_wins() {
        let big = obs(0.0, 0.0, 500.0, 600.0, 0.85);
        let small = obs(0.0, 0.0, 300.0, 400.0, 0.99);
        let best = select_best(&[small, big], FRAME, &config(2)).unwrap();
        assert_eq!(best, big.quad);
    }

    #[test]
    fn max_observations_cuts_by_confidence_first() {
        let big = obs(0.0, 0.0, 500.0, 600.0, 0.85);
        let small = obs(0.0, 0.0, 300.0, 400.0, 0.99);
        let best = select_best(&[big, small], FRAME, &config(1)).unwrap();
        assert_eq!(best, small.quad);
    }

    #[test]
    fn normalized_candidates_are_measured_in_pixels() {
        let normalized = RectangleObservation::new(
            Quad::from_rect(
                Rect::new(0.2, 0.2, 0.4, 0.5),
                CoordinateSpace::DetectorNormalized,
            ),
            0.9,
        );
        let best = select_best(&[normalized], FRAME, &config(1)).unwrap();
        assert_eq!(best.space, CoordinateSpace::DetectorNormalized);
    }
}
