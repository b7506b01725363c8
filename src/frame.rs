//! Camera frames as handed to the detection loop.
//!
//! A frame carries its dimensions, a sequence number and the monotonic
//! capture instant. The pixel buffer is optional: the platform sometimes
//! delivers a sample with no image buffer attached, which the loop treats
//! as a frame with nothing detected.

use std::time::Instant;

use crate::geometry::Size;

pub struct Frame {
    pixels: Option<Vec<u8>>,

    pub seq: u64,
    pub width: u32,
    pub height: u32,

    /// Monotonic capture instant, used as the controller clock.
    pub captured_at: Instant,
}

impl Frame {
    pub fn new(seq: u64, width: u32, height: u32, pixels: Vec<u8>) -> Self {
        Self::at(seq, width, height, Some(pixels), Instant::now())
    }

    /// Frame with an explicit capture instant and optional buffer.
    pub fn at(
        seq: u64,
        width: u32,
        height: u32,
        pixels: Option<Vec<u8>>,
        captured_at: Instant,
    ) -> Self {
        Self {
            pixels,
            seq,
            width,
            height,
            captured_at,
        }
    }

    /// A sample that arrived without an image buffer.
    pub fn empty(seq: u64, width: u32, height: u32) -> Self {
        Self::at(seq, width, height, None, Instant::now())
    }

    pub fn size(&self) -> Size {
        Size::new(self.width as f64, self.height as f64)
    }

    pub fn pixels(&self) -> Option<&[u8]> {
        self.pixels.as_deref()
    }

    pub fn has_buffer(&self) -> bool {
        self.pixels.as_ref().is_some_and(|p| !p.is_empty())
    }
}

impl std::fmt::Debug for Frame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Pixel contents are never printed.
        f.debug_struct("Frame")
            .field("seq", &self.seq)
            .field("width", &self.width)
            .field("height", &self.height)
            .field("bytes", &self.pixels.as_ref().map(|p| p.len()))
            .finish()
    }
}
