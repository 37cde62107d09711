//! Greedy clustering of tagged pixels into detections

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::classifier::TaggedPixel;
use super::color::ClassId;

pub const DEFAULT_MERGE_DISTANCE: f64 = 60.0;
pub const DEFAULT_MIN_PIXELS: u32 = 15;
pub const DEFAULT_PLAYER_EXCLUSION_RADIUS: f64 = 130.0;

/// One clustered group of samples in a single frame.
///
/// Detections have no identity; they are rebuilt from scratch every cycle.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    pub min_x: i32,
    pub max_x: i32,
    pub min_y: i32,
    pub max_y: i32,
    pub pixel_count: u32,
    pub center_x: i32,
    pub center_y: i32,
    pub distance_from_center: f64,
    pub class_id: ClassId,
}

impl Detection {
    /// A one-sample cluster
    fn seed(pixel: &TaggedPixel) -> Self {
        Self {
            min_x: pixel.x,
            max_x: pixel.x,
            min_y: pixel.y,
            max_y: pixel.y,
            pixel_count: 1,
            center_x: pixel.x,
            center_y: pixel.y,
            distance_from_center: pixel.distance_from_center,
            class_id: pixel.class_id,
        }
    }

    /// Grow the box to cover the pixel and move the centre to the box midpoint
    fn absorb(&mut self, pixel: &TaggedPixel) {
        self.min_x = self.min_x.min(pixel.x);
        self.max_x = self.max_x.max(pixel.x);
        self.min_y = self.min_y.min(pixel.y);
        self.max_y = self.max_y.max(pixel.y);
        self.pixel_count += 1;
        self.center_x = (self.min_x + self.max_x) / 2;
        self.center_y = (self.min_y + self.max_y) / 2;
    }

    /// Euclidean distance from this detection's centre to a point
    pub fn distance_to_point(&self, x: f64, y: f64) -> f64 {
        let dx = self.center_x as f64 - x;
        let dy = self.center_y as f64 - y;
        (dx * dx + dy * dy).sqrt()
    }

    /// Euclidean distance between two detection centres
    pub fn distance_to(&self, other: &Detection) -> f64 {
        self.distance_to_point(other.center_x as f64, other.center_y as f64)
    }

    pub fn width(&self) -> i32 {
        self.max_x - self.min_x
    }

    pub fn height(&self) -> i32 {
        self.max_y - self.min_y
    }

    pub fn contains(&self, x: i32, y: i32) -> bool {
        x >= self.min_x && x <= self.max_x && y >= self.min_y && y <= self.max_y
    }
}

/// Clustering parameters
#[derive(Debug, Clone, Copy)]
pub struct ClusterBuilder {
    /// A pixel joins the first open cluster whose centre is closer than this
    pub merge_distance: f64,
    /// Clusters with fewer samples are scan noise
    pub min_pixels: u32,
    /// Clusters centred this close to the capture centre are the player
    pub player_exclusion_radius: f64,
    /// Capture centre
    pub center: (f64, f64),
}

impl ClusterBuilder {
    pub fn new(merge_distance: f64, min_pixels: u32, player_exclusion_radius: f64) -> Self {
        Self {
            merge_distance,
            min_pixels,
            player_exclusion_radius,
            center: (0.0, 0.0),
        }
    }

    /// Set the capture centre from the frame size
    pub fn centered_on(mut self, width: u32, height: u32) -> Self {
        self.center = (width as f64 / 2.0, height as f64 / 2.0);
        self
    }

    /// Single pass greedy merge, per class, followed by the noise and player filters
    pub fn build<I>(&self, pixels: I) -> Vec<Detection>
    where
        I: IntoIterator<Item = TaggedPixel>,
    {
        let mut open: BTreeMap<ClassId, Vec<Detection>> = BTreeMap::new();

        for pixel in pixels {
            let clusters = open.entry(pixel.class_id).or_default();
            let px = pixel.x as f64;
            let py = pixel.y as f64;

            match clusters
                .iter_mut()
                .find(|c| c.distance_to_point(px, py) < self.merge_distance)
            {
                Some(cluster) => cluster.absorb(&pixel),
                None => clusters.push(Detection::seed(&pixel)),
            }
        }

        open.into_values()
            .flatten()
            .filter(|c| c.pixel_count >= self.min_pixels)
            .filter_map(|mut c| {
                c.distance_from_center = c.distance_to_point(self.center.0, self.center.1);
                (c.distance_from_center >= self.player_exclusion_radius).then_some(c)
            })
            .collect()
    }
}

impl Default for ClusterBuilder {
    fn default() -> Self {
        Self::new(
            DEFAULT_MERGE_DISTANCE,
            DEFAULT_MIN_PIXELS,
            DEFAULT_PLAYER_EXCLUSION_RADIUS,
        )
    }
}
