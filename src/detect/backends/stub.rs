use anyhow::Result;
use std::collections::VecDeque;

use crate::detect::backend::{DetectorConfig, QuadDetector};
use crate::frame::Frame;
use crate::geometry::Quad;

/// Stub detector for testing. Replays a fixed script of results, one per
/// frame, then keeps returning the fallback.
pub struct StubDetector {
    script: VecDeque<Option<Quad>>,
    fallback: Option<Quad>,
    calls: u64,
}

impl StubDetector {
    pub fn new(script: impl IntoIterator<Item = Option<Quad>>) -> Self {
        Self {
            script: script.into_iter().collect(),
            fallback: None,
            calls: 0,
        }
    }

    /// Always return `result`.
    pub fn repeating(result: Option<Quad>) -> Self {
        Self::new([]).with_fallback(result)
    }

    pub fn with_fallback(mut self, fallback: Option<Quad>) -> Self {
        self.fallback = fallback;
        self
    }

    pub fn calls(&self) -> u64 {
        self.calls
    }
}

impl Default for StubDetector {
    fn default() -> Self {
        Self::repeating(None)
    }
}

impl QuadDetector for StubDetector {
    fn name(&self) -> &'static str {
        "stub"
    }

    fn detect(&mut self, _frame: &Frame, _config: &DetectorConfig) -> Result<Option<Quad>> {
        self.calls += 1;
        Ok(self.script.pop_front().unwrap_or(self.fallback))
    }
}
