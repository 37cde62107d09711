//! Color profiles and palettes
//!
//! A palette is the ordered list of color signatures the classifier tests
//! each sample against. Matching is per-channel absolute difference, so a
//! profile describes an axis-aligned cube in RGB space.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Index of an entity class (a monster database record)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClassId(pub u16);

impl fmt::Display for ClassId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "class#{}", self.0)
    }
}

/// A single RGB sample
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const BLACK: Rgb = Rgb::new(0, 0, 0);

    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Sum of per-channel absolute differences, used as the motion measure
    pub fn manhattan(&self, other: &Rgb) -> u16 {
        self.r.abs_diff(other.r) as u16
            + self.g.abs_diff(other.g) as u16
            + self.b.abs_diff(other.b) as u16
    }

    /// Largest per-channel absolute difference
    pub fn chebyshev(&self, other: &Rgb) -> u8 {
        self.r
            .abs_diff(other.r)
            .max(self.g.abs_diff(other.g))
            .max(self.b.abs_diff(other.b))
    }
}

impl From<[u8; 3]> for Rgb {
    fn from(c: [u8; 3]) -> Self {
        Self::new(c[0], c[1], c[2])
    }
}

/// Color signature identifying one entity class
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColorProfile {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub tolerance: u8,
    pub class_id: ClassId,
}

impl ColorProfile {
    pub fn new(r: u8, g: u8, b: u8, tolerance: u8, class_id: ClassId) -> Self {
        Self {
            r,
            g,
            b,
            tolerance,
            class_id,
        }
    }

    pub fn color(&self) -> Rgb {
        Rgb::new(self.r, self.g, self.b)
    }

    /// Check whether a sample falls inside this profile's tolerance cube
    pub fn matches(&self, sample: Rgb) -> bool {
        Self::within(self.color(), sample, self.tolerance)
    }

    /// Symmetric L∞ color match
    pub fn within(a: Rgb, b: Rgb, tolerance: u8) -> bool {
        a.chebyshev(&b) <= tolerance
    }
}

/// Ordered collection of color profiles; the first matching profile wins
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Palette {
    profiles: Vec<ColorProfile>,
}

impl Palette {
    pub fn new(profiles: Vec<ColorProfile>) -> Self {
        Self { profiles }
    }

    pub fn push(&mut self, profile: ColorProfile) {
        self.profiles.push(profile);
    }

    /// First profile matching the sample, in palette order
    pub fn classify(&self, sample: Rgb) -> Option<&ColorProfile> {
        self.profiles.iter().find(|p| p.matches(sample))
    }

    pub fn profiles(&self) -> &[ColorProfile] {
        &self.profiles
    }

    pub fn len(&self) -> usize {
        self.profiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }
}

impl FromIterator<ColorProfile> for Palette {
    fn from_iter<I: IntoIterator<Item = ColorProfile>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}
