//! Multi-frame stabilization boundary.
//!
//! The funnel decides, from a run of detections, whether the overlay
//! should be shown and whether enough stable passes have accumulated to
//! trigger an automatic capture. Its smoothing is owned by the platform
//! layer; the loop only relies on the contract below.

use anyhow::Result;

use crate::geometry::Quad;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FunnelDecision {
    Show,
    ShowAndAutoScan,
    Ignore,
}

pub trait StabilizationFunnel: Send {
    /// Offer a new candidate alongside the quad currently on screen.
    /// Returns the decision and the (possibly smoothed) quad to display.
    fn add(&mut self, candidate: &Quad, displayed: Option<&Quad>) -> Result<(FunnelDecision, Quad)>;

    fn pass_count(&self) -> u32;

    fn reset_pass_count(&mut self);
}

/// Deterministic stand-in: shows every candidate as-is and requests an
/// auto scan once `passes_to_scan` consecutive candidates have arrived.
#[derive(Clone, Debug)]
pub struct StubFunnel {
    passes: u32,
    passes_to_scan: u32,
    resets: u32,
}

impl StubFunnel {
    pub fn new(passes_to_scan: u32) -> Self {
        Self {
            passes: 0,
            passes_to_scan: passes_to_scan.max(1),
            resets: 0,
        }
    }

    /// Number of times the caller has reset the pass counter.
    pub fn resets(&self) -> u32 {
        self.resets
    }
}

impl Default for StubFunnel {
    fn default() -> Self {
        Self::new(20)
    }
}

impl StabilizationFunnel for StubFunnel {
    fn add(&mut self, candidate: &Quad, _displayed: Option<&Quad>) -> Result<(FunnelDecision, Quad)> {
        self.passes = self.passes.saturating_add(1);
        let decision = if self.passes >= self.passes_to_scan {
            FunnelDecision::ShowAndAutoScan
        } else {
            FunnelDecision::Show
        };
        Ok((decision, *candidate))
    }

    fn pass_count(&self) -> u32 {
        self.passes
    }

    fn reset_pass_count(&mut self) {
        self.passes = 0;
        self.resets += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::{CoordinateSpace, Rect};

    #[test]
    fn stub_funnel_arms_after_passes() {
        let quad = Quad::from_rect(Rect::new(0.0, 0.0, 1.0, 1.0), CoordinateSpace::Pixel);
        let mut funnel = StubFunnel::new(3);
        assert_eq!(funnel.add(&quad, None).unwrap().0, FunnelDecision::Show);
        assert_eq!(funnel.add(&quad, Some(&quad)).unwrap().0, FunnelDecision::Show);
        assert_eq!(
            funnel.add(&quad, Some(&quad)).unwrap().0,
            FunnelDecision::ShowAndAutoScan
        );
        funnel.reset_pass_count();
        assert_eq!(funnel.pass_count(), 0);
        assert_eq!(funnel.resets(), 1);
        assert_eq!(funnel.add(&quad, None).unwrap().0, FunnelDecision::Show);
    }
}
