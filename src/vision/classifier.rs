//! Per-frame pixel classification
//!
//! Walks the capture on a coarse grid and tags samples that both match a
//! palette color and changed since the previous capture. The motion check is
//! what separates a moving sprite from static scenery painted in the same hue.

use super::color::{ClassId, Palette};
use super::frame::Frame;

/// Default grid step between samples
pub const DEFAULT_SAMPLE_STRIDE: u32 = 3;

/// Default minimum summed channel change to count as motion
pub const DEFAULT_MOTION_THRESHOLD: u16 = 30;

/// A grid sample that matched a palette entry and moved
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TaggedPixel {
    pub x: i32,
    pub y: i32,
    /// Euclidean distance to the frame centre
    pub distance_from_center: f64,
    pub class_id: ClassId,
}

/// Grid sampler that tags motion-confirmed palette matches
#[derive(Debug, Clone, Copy)]
pub struct FrameClassifier {
    pub sample_stride: u32,
    pub motion_threshold: u16,
}

impl Default for FrameClassifier {
    fn default() -> Self {
        Self {
            sample_stride: DEFAULT_SAMPLE_STRIDE,
            motion_threshold: DEFAULT_MOTION_THRESHOLD,
        }
    }
}

impl FrameClassifier {
    pub fn new(sample_stride: u32, motion_threshold: u16) -> Self {
        Self {
            sample_stride: sample_stride.max(1),
            motion_threshold,
        }
    }

    /// Lazily classify `frame` against `previous`.
    ///
    /// The returned iterator walks the grid once, row by row; it cannot be
    /// restarted. An empty palette produces nothing.
    pub fn classify<'a>(
        &self,
        frame: &'a Frame,
        previous: &'a Frame,
        palette: &'a Palette,
    ) -> TaggedPixels<'a> {
        TaggedPixels {
            frame,
            previous,
            palette,
            stride: self.sample_stride.max(1) as i32,
            motion_threshold: self.motion_threshold,
            center: frame.center(),
            x: 0,
            y: 0,
        }
    }
}

/// Iterator over the tagged samples of one frame
pub struct TaggedPixels<'a> {
    frame: &'a Frame,
    previous: &'a Frame,
    palette: &'a Palette,
    stride: i32,
    motion_threshold: u16,
    center: (f64, f64),
    x: i32,
    y: i32,
}

impl TaggedPixels<'_> {
    fn advance(&mut self) {
        self.x += self.stride;
        if self.x >= self.frame.width as i32 {
            self.x = 0;
            self.y += self.stride;
        }
    }
}

impl Iterator for TaggedPixels<'_> {
    type Item = TaggedPixel;

    fn next(&mut self) -> Option<TaggedPixel> {
        if self.palette.is_empty() {
            return None;
        }

        while self.y < self.frame.height as i32 {
            let (x, y) = (self.x, self.y);
            self.advance();

            let Some(sample) = self.frame.pixel(x, y) else {
                continue;
            };
            let Some(profile) = self.palette.classify(sample) else {
                continue;
            };
            let Some(before) = self.previous.pixel(x, y) else {
                continue;
            };
            if sample.manhattan(&before) <= self.motion_threshold {
                continue;
            }

            let dx = x as f64 - self.center.0;
            let dy = y as f64 - self.center.1;
            return Some(TaggedPixel {
                x,
                y,
                distance_from_center: (dx * dx + dy * dy).sqrt(),
                class_id: profile.class_id,
            });
        }

        None
    }
}
