//! Adaptive lens-switch controller.
//!
//! Keeps a bounded window of per-frame quality scores. When the window is
//! full and its mean drops below the switch threshold, and the cooldown
//! since the last controller-triggered switch has elapsed, the controller
//! asks for a lens switch. History is cleared on every lens change because
//! scores from different lenses are not comparable.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

pub const DEFAULT_HISTORY_CAPACITY: usize = 10;
pub const DEFAULT_SWITCH_THRESHOLD: f64 = 0.3;
pub const DEFAULT_SWITCH_COOLDOWN: Duration = Duration::from_secs(10);

/// Fixed-capacity FIFO of recent quality scores.
#[derive(Clone, Debug)]
pub struct QualityHistory {
    scores: VecDeque<f64>,
    capacity: usize,
}

impl QualityHistory {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            scores: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Append a score, evicting the oldest when at capacity.
    pub fn push(&mut self, score: f64) {
        while self.scores.len() >= self.capacity {
            self.scores.pop_front();
        }
        self.scores.push_back(score);
    }

    pub fn mean(&self) -> Option<f64> {
        if self.scores.is_empty() {
            return None;
        }
        Some(self.scores.iter().sum::<f64>() / self.scores.len() as f64)
    }

    pub fn is_full(&self) -> bool {
        self.scores.len() >= self.capacity
    }

    pub fn len(&self) -> usize {
        self.scores.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scores.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn clear(&mut self) {
        self.scores.clear();
    }

    pub fn iter(&self) -> impl Iterator<Item = f64> + '_ {
        self.scores.iter().copied()
    }
}

/// Minimum interval between controller-triggered switches.
#[derive(Clone, Copy, Debug)]
pub struct SwitchCooldown {
    interval: Duration,
    last_switch: Option<Instant>,
}

impl SwitchCooldown {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last_switch: None,
        }
    }

    pub fn elapsed(&self, now: Instant) -> bool {
        match self.last_switch {
            Some(last) => now.saturating_duration_since(last) >= self.interval,
            None => true,
        }
    }

    pub fn record(&mut self, at: Instant) {
        self.last_switch = Some(at);
    }

    pub fn last_switch(&self) -> Option<Instant> {
        self.last_switch
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ControllerConfig {
    pub history_capacity: usize,
    pub switch_threshold: f64,
    pub cooldown: Duration,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            history_capacity: DEFAULT_HISTORY_CAPACITY,
            switch_threshold: DEFAULT_SWITCH_THRESHOLD,
            cooldown: DEFAULT_SWITCH_COOLDOWN,
        }
    }
}

/// Control state, derived from the cooldown.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ControllerState {
    Stable,
    CoolingDown,
}

#[derive(Clone, Debug)]
pub struct AdaptiveSwitchController {
    history: QualityHistory,
    cooldown: SwitchCooldown,
    threshold: f64,
}

impl AdaptiveSwitchController {
    pub fn new(config: ControllerConfig) -> Self {
        Self {
            history: QualityHistory::new(config.history_capacity),
            cooldown: SwitchCooldown::new(config.cooldown),
            threshold: config.switch_threshold,
        }
    }

    /// Record one frame's score. Returns true when a switch should happen
    /// now. `auto_mode` is false when the caller pinned a specific lens;
    /// the score is still recorded.
    pub fn observe(&mut self, score: f64, auto_mode: bool, now: Instant) -> bool {
        self.history.push(score);
        if !auto_mode || !self.history.is_full() {
            return false;
        }
        let Some(mean) = self.history.mean() else {
            return false;
        };
        if mean >= self.threshold {
            return false;
        }
        if !self.cooldown.elapsed(now) {
            log::debug!(
                "quality mean {:.3} below {:.2} but switch cooling down",
                mean,
                self.threshold
            );
            return false;
        }
        log::info!(
            "quality mean {:.3} over {} frames below {:.2}; requesting lens switch",
            mean,
            self.history.len(),
            self.threshold
        );
        true
    }

    /// Mark a controller-triggered switch at `at` and reset history.
    pub fn record_switch(&mut self, at: Instant) {
        self.cooldown.record(at);
        self.history.clear();
    }

    /// Any lens change, explicit or automatic, invalidates history.
    pub fn on_lens_changed(&mut self) {
        self.history.clear();
    }

    pub fn state(&self, now: Instant) -> ControllerState {
        if self.cooldown.elapsed(now) {
            ControllerState::Stable
        } else {
            ControllerState::CoolingDown
        }
    }

    pub fn history(&self) -> &QualityHistory {
        &self.history
    }

    pub fn cooldown(&self) -> SwitchCooldown {
        self.cooldown
    }
}

impl Default for AdaptiveSwitchController {
    fn default() -> Self {
        Self::new(ControllerConfig::default())
    }
}
