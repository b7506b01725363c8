use std::time::{Duration, Instant};

use anyhow::{bail, Result};

use crate::frame::Frame;

#[derive(Clone, Debug)]
pub struct SourceConfig {
    /// Target frame rate. `next_frame` paces itself to this rate.
    pub target_fps: u32,
    pub width: u32,
    pub height: u32,
    /// Every n-th frame arrives without a pixel buffer; 0 disables.
    pub missing_buffer_every: u64,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            target_fps: 30,
            width: 1920,
            height: 1080,
            missing_buffer_every: 0,
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct SourceStats {
    pub frames_captured: u64,
    pub frames_without_buffer: u64,
}

/// Synthetic landscape camera feed.
///
/// Produces a cheap gradient pattern that shifts every frame so consecutive
/// frames differ.
pub struct SyntheticSource {
    config: SourceConfig,
    connected: bool,
    stats: SourceStats,
    last_frame_at: Option<Instant>,
}

impl SyntheticSource {
    pub fn new(config: SourceConfig) -> Result<Self> {
        if config.width == 0 || config.height == 0 {
            bail!("source dimensions must be non-zero");
        }
        if config.target_fps == 0 {
            bail!("source target_fps must be > 0");
        }
        Ok(Self {
            config,
            connected: false,
            stats: SourceStats::default(),
            last_frame_at: None,
        })
    }

    /// Synthetic sources are always reachable.
    pub fn connect(&mut self) -> Result<()> {
        self.connected = true;
        log::info!(
            "synthetic source connected: {}x{} @ {} fps",
            self.config.width,
            self.config.height,
            self.config.target_fps
        );
        Ok(())
    }

    pub fn next_frame(&mut self) -> Result<Frame> {
        if !self.connected {
            bail!("synthetic source not connected");
        }
        self.pace();
        let seq = self.stats.frames_captured;
        self.stats.frames_captured += 1;

        let every = self.config.missing_buffer_every;
        if every > 0 && (seq + 1) % every == 0 {
            self.stats.frames_without_buffer += 1;
            return Ok(Frame::empty(seq, self.config.width, self.config.height));
        }
        let pixels = self.generate_pixels(seq);
        Ok(Frame::new(seq, self.config.width, self.config.height, pixels))
    }

    fn pace(&mut self) {
        let interval = Duration::from_secs(1) / self.config.target_fps;
        if let Some(last) = self.last_frame_at {
            let elapsed = last.elapsed();
            if elapsed < interval {
                std::thread::sleep(interval - elapsed);
            }
        }
        self.last_frame_at = Some(Instant::now());
    }

    /// Single-channel luma plane.
    fn generate_pixels(&self, seq: u64) -> Vec<u8> {
        let width = self.config.width as usize;
        let count = width * self.config.height as usize;
        (0..count)
            .map(|i| ((i % width + i / width + seq as usize) % 256) as u8)
            .collect()
    }

    pub fn is_healthy(&self) -> bool {
        self.connected
    }

    pub fn stats(&self) -> SourceStats {
        self.stats.clone()
    }

    pub fn config(&self) -> &SourceConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fast(width: u32, height: u32) -> SourceConfig {
        SourceConfig {
            target_fps: 1000,
            width,
            height,
            missing_buffer_every: 0,
        }
    }

    #[test]
    fn frames_require_connect() {
        let mut source = SyntheticSource::new(fast(4, 2)).unwrap();
        assert!(source.next_frame().is_err());
        assert!(!source.is_healthy());
        source.connect().unwrap();
        let frame = source.next_frame().unwrap();
        assert_eq!(frame.seq, 0);
        assert_eq!(frame.pixels().map(|p| p.len()), Some(8));
    }

    #[test]
    fn consecutive_frames_differ() {
        let mut source = SyntheticSource::new(fast(8, 8)).unwrap();
        source.connect().unwrap();
        let a = source.next_frame().unwrap();
        let b = source.next_frame().unwrap();
        assert_ne!(a.pixels(), b.pixels());
        assert_eq!(source.stats().frames_captured, 2);
    }

    #[test]
    fn missing_buffers_are_injected() {
        let mut config = fast(4, 4);
        config.missing_buffer_every = 3;
        let mut source = SyntheticSource::new(config).unwrap();
        source.connect().unwrap();
        let buffers: Vec<bool> = (0..6)
            .map(|_| source.next_frame().unwrap().has_buffer())
            .collect();
        assert_eq!(buffers, vec![true, true, false, true, true, false]);
        assert_eq!(source.stats().frames_without_buffer, 2);
    }

    #[test]
    fn rejects_zero_dimensions() {
        assert!(SyntheticSource::new(fast(0, 10)).is_err());
        let mut config = fast(10, 10);
        config.target_fps = 0;
        assert!(SyntheticSource::new(config).is_err());
    }
}
