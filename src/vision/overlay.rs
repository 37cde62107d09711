//! Debug overlay: tracked boxes and lines from the player to each target

use image::{Rgb as Pixel, RgbImage};
use imageproc::drawing::{draw_cross_mut, draw_hollow_rect_mut, draw_line_segment_mut};
use imageproc::rect::Rect;

use super::frame::Frame;
use crate::config::DisplayConfig;
use crate::core::BotStatus;

const ENTITY: Pixel<u8> = Pixel([0, 255, 0]);
const TARGET: Pixel<u8> = Pixel([255, 0, 0]);
const LINE: Pixel<u8> = Pixel([255, 255, 0]);
const PLAYER: Pixel<u8> = Pixel([255, 255, 255]);

/// Copy a frame into an `RgbImage`
pub fn to_image(frame: &Frame) -> RgbImage {
    RgbImage::from_raw(frame.width, frame.height, frame.as_bytes().to_vec())
        .unwrap_or_else(|| RgbImage::new(frame.width, frame.height))
}

/// Draw the published status over a copy of `frame`
pub fn render_overlay(frame: &Frame, status: &BotStatus, display: &DisplayConfig) -> RgbImage {
    let mut image = to_image(frame);
    let (cx, cy) = frame.center();

    if display.show_esp_lines {
        let mut by_distance: Vec<_> = status.tracked.iter().collect();
        by_distance.sort_by(|a, b| a.distance().total_cmp(&b.distance()));
        for entity in by_distance.into_iter().take(display.max_esp_lines) {
            let (x, y) = entity.center();
            draw_line_segment_mut(&mut image, (cx as f32, cy as f32), (x as f32, y as f32), LINE);
        }
    }

    if display.show_boxes {
        for entity in &status.tracked {
            let g = &entity.geometry;
            let color = if Some(entity.id) == status.target { TARGET } else { ENTITY };
            let rect = Rect::at(g.min_x, g.min_y).of_size(g.width().max(1) as u32, g.height().max(1) as u32);
            draw_hollow_rect_mut(&mut image, rect, color);
        }
    }

    draw_cross_mut(&mut image, PLAYER, cx as i32, cy as i32);
    image
}
