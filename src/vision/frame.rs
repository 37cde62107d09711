//! Captured frames and the current/previous frame pair

use std::sync::Arc;

use super::color::Rgb;

/// An immutable RGB capture of the scan region
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    /// Width in pixels
    pub width: u32,
    /// Height in pixels
    pub height: u32,
    /// Capture sequence number, assigned by [`FrameBuffers`]
    pub version: u64,
    /// Packed RGB pixel data, row-major
    data: Vec<u8>,
}

impl Frame {
    /// Create a frame from packed RGB data.
    /// Returns `None` if the buffer length does not match the dimensions.
    pub fn from_rgb(width: u32, height: u32, data: Vec<u8>) -> Option<Self> {
        if data.len() != width as usize * height as usize * 3 {
            return None;
        }
        Some(Self {
            width,
            height,
            version: 0,
            data,
        })
    }

    /// Create a frame from packed BGRA data (the layout of a GDI DIB section)
    pub fn from_bgra(width: u32, height: u32, bgra: &[u8]) -> Option<Self> {
        if bgra.len() != width as usize * height as usize * 4 {
            return None;
        }
        let data = bgra
            .chunks_exact(4)
            .flat_map(|px| [px[2], px[1], px[0]])
            .collect();
        Some(Self {
            width,
            height,
            version: 0,
            data,
        })
    }

    /// A frame filled with one color
    pub fn filled(width: u32, height: u32, color: Rgb) -> Self {
        let mut data = Vec::with_capacity(width as usize * height as usize * 3);
        for _ in 0..(width as usize * height as usize) {
            data.extend_from_slice(&[color.r, color.g, color.b]);
        }
        Self {
            width,
            height,
            version: 0,
            data,
        }
    }

    /// An all-black frame
    pub fn black(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            version: 0,
            data: vec![0; width as usize * height as usize * 3],
        }
    }

    pub fn with_version(mut self, version: u64) -> Self {
        self.version = version;
        self
    }

    pub fn contains(&self, x: i32, y: i32) -> bool {
        x >= 0 && y >= 0 && (x as u32) < self.width && (y as u32) < self.height
    }

    /// Get a pixel at (x, y); out-of-bounds coordinates yield `None`
    pub fn pixel(&self, x: i32, y: i32) -> Option<Rgb> {
        if !self.contains(x, y) {
            return None;
        }
        let idx = (y as usize * self.width as usize + x as usize) * 3;
        Some(Rgb::new(self.data[idx], self.data[idx + 1], self.data[idx + 2]))
    }

    /// Overwrite a pixel; out-of-bounds writes are ignored
    pub fn set_pixel(&mut self, x: i32, y: i32, color: Rgb) {
        if !self.contains(x, y) {
            return;
        }
        let idx = (y as usize * self.width as usize + x as usize) * 3;
        self.data[idx] = color.r;
        self.data[idx + 1] = color.g;
        self.data[idx + 2] = color.b;
    }

    /// Fill an inclusive rectangle, clipped to the frame
    pub fn fill_rect(&mut self, min_x: i32, min_y: i32, max_x: i32, max_y: i32, color: Rgb) {
        for y in min_y.max(0)..=max_y.min(self.height as i32 - 1) {
            for x in min_x.max(0)..=max_x.min(self.width as i32 - 1) {
                self.set_pixel(x, y, color);
            }
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    /// Centre of the frame, which is where the player's avatar sits
    pub fn center(&self) -> (f64, f64) {
        (self.width as f64 / 2.0, self.height as f64 / 2.0)
    }

    pub fn same_size(&self, other: &Frame) -> bool {
        self.width == other.width && self.height == other.height
    }
}

/// Current and previous capture, swapped on every capture.
///
/// Frames are shared read-only; the classifier never sees a buffer that the
/// capture stage is still writing.
#[derive(Debug, Clone)]
pub struct FrameBuffers {
    current: Arc<Frame>,
    previous: Arc<Frame>,
    next_version: u64,
}

impl FrameBuffers {
    /// Start with two black frames so the first capture counts as motion everywhere it is not black
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            current: Arc::new(Frame::black(width, height)),
            previous: Arc::new(Frame::black(width, height)),
            next_version: 1,
        }
    }

    /// Install a new capture; the old current frame becomes the previous one
    pub fn push(&mut self, frame: Frame) {
        let frame = frame.with_version(self.next_version);
        self.next_version += 1;
        self.previous = std::mem::replace(&mut self.current, Arc::new(frame));
    }

    pub fn current(&self) -> &Arc<Frame> {
        &self.current
    }

    pub fn previous(&self) -> &Arc<Frame> {
        &self.previous
    }

    /// Number of frames captured so far
    pub fn captured(&self) -> u64 {
        self.next_version - 1
    }
}
