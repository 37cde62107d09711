//! Straight-line approach paths
//!
//! No terrain is modelled. The path from the player to a target is a line
//! split into evenly spaced waypoints, thinned to a handful of stops.

/// Interpolated points from `start` to `end`, both included.
/// One point every 20 pixels, and never fewer than 5 segments.
pub fn path_points(start: (i32, i32), end: (i32, i32)) -> Vec<(i32, i32)> {
    let dx = (end.0 - start.0) as f64;
    let dy = (end.1 - start.1) as f64;
    let length = (dx * dx + dy * dy).sqrt() as usize;
    let steps = (length / 20).max(5);

    (0..=steps)
        .map(|i| {
            let t = i as f64 / steps as f64;
            (
                (start.0 as f64 + dx * t) as i32,
                (start.1 as f64 + dy * t) as i32,
            )
        })
        .collect()
}

/// At most five evenly spaced stops along the path, excluding the start.
/// The end point is not always among them; callers click the target anyway.
pub fn waypoints(start: (i32, i32), end: (i32, i32)) -> Vec<(i32, i32)> {
    let path = path_points(start, end);
    let step = ((path.len() - 1 + 4) / 5).max(1);
    path.into_iter().skip(step).step_by(step).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_path_has_minimum_steps() {
        let path = path_points((0, 0), (10, 0));
        assert_eq!(path.len(), 6);
        assert_eq!(path[0], (0, 0));
        assert_eq!(path[5], (10, 0));
    }

    #[test]
    fn test_long_path_step_count() {
        // 400px at one point per 20px
        let path = path_points((0, 0), (0, 400));
        assert_eq!(path.len(), 21);
        assert_eq!(path[1], (0, 20));
    }

    #[test]
    fn test_waypoints_are_thinned() {
        let stops = waypoints((700, 350), (700, 750));
        assert!(stops.len() <= 5);
        assert!(stops.iter().all(|&(x, y)| x == 700 && y > 350 && y <= 750));
        // Monotonic toward the target
        assert!(stops.windows(2).all(|w| w[0].1 < w[1].1));
    }

    #[test]
    fn test_waypoint_cap_holds_for_mid_lengths() {
        for len in (0..600).step_by(7) {
            assert!(waypoints((0, 0), (len, 0)).len() <= 5, "length {}", len);
        }
    }

    #[test]
    fn test_degenerate_path() {
        let path = path_points((5, 5), (5, 5));
        assert!(path.iter().all(|&p| p == (5, 5)));
    }
}
