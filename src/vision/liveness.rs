//! Health bar probe
//!
//! Monsters show a red health bar a little above their sprite while they are
//! alive. The probe looks for that overlay rather than the monster's body
//! color, so it is independent of the classifier palette.

use serde::{Deserialize, Serialize};

use super::cluster::Detection;
use super::color::Rgb;
use super::frame::Frame;

/// Decides whether a detection still carries a vital signal
pub trait VitalSign {
    fn is_alive(&self, detection: &Detection) -> bool;
}

impl<F> VitalSign for F
where
    F: Fn(&Detection) -> bool,
{
    fn is_alive(&self, detection: &Detection) -> bool {
        self(detection)
    }
}

/// Samples a strip above a bounding box for health-bar red
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LivenessProbe {
    /// Top of the strip, in pixels above the box
    pub top_offset: i32,
    /// Bottom of the strip (exclusive), in pixels above the box
    pub bottom_offset: i32,
    /// Horizontal margin added on both sides of the box
    pub margin_x: i32,
    /// Sampling step in both directions
    pub step: i32,
    /// Red channel must be strictly above this
    pub red_min: u8,
    /// Green channel must be strictly below this
    pub green_max: u8,
    /// Blue channel must be strictly below this
    pub blue_max: u8,
    /// Alive when strictly more samples than this are red
    pub min_samples: u32,
}

impl Default for LivenessProbe {
    fn default() -> Self {
        Self {
            top_offset: 80,
            bottom_offset: 10,
            margin_x: 20,
            step: 2,
            red_min: 180,
            green_max: 100,
            blue_max: 100,
            min_samples: 15,
        }
    }
}

impl LivenessProbe {
    /// Saturated red of an on-screen health bar
    pub fn is_vital_color(&self, c: Rgb) -> bool {
        c.r > self.red_min && c.g < self.green_max && c.b < self.blue_max
    }

    /// Number of vital-colored samples in the strip above the box.
    /// Samples outside the frame are simply not counted.
    pub fn count(&self, frame: &Frame, detection: &Detection) -> u32 {
        let step = self.step.max(1) as usize;
        let top = (detection.min_y - self.top_offset).max(0);
        let bottom = detection.min_y - self.bottom_offset;
        let left = detection.min_x - self.margin_x;
        let right = detection.max_x + self.margin_x;

        let mut count = 0;
        for y in (top..bottom).step_by(step) {
            for x in (left..right).step_by(step) {
                if let Some(c) = frame.pixel(x, y) {
                    if self.is_vital_color(c) {
                        count += 1;
                    }
                }
            }
        }
        count
    }

    /// Enough health-bar samples above the box
    pub fn is_alive(&self, frame: &Frame, detection: &Detection) -> bool {
        self.count(frame, detection) > self.min_samples
    }

    /// Bind the probe to a frame
    pub fn on<'a>(&'a self, frame: &'a Frame) -> FrameProbe<'a> {
        FrameProbe { probe: self, frame }
    }
}

/// A liveness probe bound to one capture
#[derive(Clone, Copy)]
pub struct FrameProbe<'a> {
    probe: &'a LivenessProbe,
    frame: &'a Frame,
}

impl VitalSign for FrameProbe<'_> {
    fn is_alive(&self, detection: &Detection) -> bool {
        self.probe.is_alive(self.frame, detection)
    }
}
