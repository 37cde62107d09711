//! Frame sources
//!
//! The live window grabber is platform code outside this crate; everything
//! here only needs something that hands back a [`Frame`] of a fixed size.

use super::color::Rgb;
use super::frame::Frame;
use crate::{HunterError, Result};

/// Something that produces captures of the target window's scan region
pub trait FrameSource: Send {
    /// Grab the most recent image.
    /// An error means the source is gone and the session cannot continue.
    fn capture(&mut self) -> Result<Frame>;

    /// Offset of the scan region inside the window's client area, used to
    /// translate frame coordinates into click coordinates
    fn origin(&self) -> (i32, i32) {
        (0, 0)
    }

    /// Human-readable description for logs
    fn describe(&self) -> String {
        "frame source".to_string()
    }
}

impl<S: FrameSource + ?Sized> FrameSource for Box<S> {
    fn capture(&mut self) -> Result<Frame> {
        (**self).capture()
    }

    fn origin(&self) -> (i32, i32) {
        (**self).origin()
    }

    fn describe(&self) -> String {
        (**self).describe()
    }
}

/// Scan rectangle centred inside a larger client area, clamped at the top-left corner.
/// Returns `(x, y, width, height)`.
pub fn centered_region(client_w: u32, client_h: u32, scan_w: u32, scan_h: u32) -> (u32, u32, u32, u32) {
    let x = (client_w / 2).saturating_sub(scan_w / 2);
    let y = (client_h / 2).saturating_sub(scan_h / 2);
    (x, y, scan_w.min(client_w - x), scan_h.min(client_h - y))
}

/// Copy a sub-rectangle out of a frame; parts outside the source are black
pub fn crop(frame: &Frame, x: u32, y: u32, width: u32, height: u32) -> Frame {
    let mut data = Vec::with_capacity(width as usize * height as usize * 3);
    for row in 0..height {
        for col in 0..width {
            let px = frame
                .pixel((x + col) as i32, (y + row) as i32)
                .unwrap_or(Rgb::BLACK);
            data.extend_from_slice(&[px.r, px.g, px.b]);
        }
    }
    Frame::from_rgb(width, height, data).unwrap_or_else(|| Frame::black(width, height))
}

/// Replays an in-memory list of frames
pub struct FrameSequence {
    frames: Vec<Frame>,
    index: usize,
    looping: bool,
    origin: (i32, i32),
}

impl FrameSequence {
    pub fn new(frames: Vec<Frame>) -> Self {
        Self {
            frames,
            index: 0,
            looping: false,
            origin: (0, 0),
        }
    }

    /// Restart from the first frame instead of ending
    pub fn looping(mut self, looping: bool) -> Self {
        self.looping = looping;
        self
    }

    pub fn with_origin(mut self, x: i32, y: i32) -> Self {
        self.origin = (x, y);
        self
    }

    pub fn remaining(&self) -> usize {
        self.frames.len().saturating_sub(self.index)
    }
}

impl FrameSource for FrameSequence {
    fn capture(&mut self) -> Result<Frame> {
        if self.index >= self.frames.len() {
            if self.looping && !self.frames.is_empty() {
                self.index = 0;
            } else {
                return Err(HunterError::CaptureLost(
                    "frame sequence exhausted".to_string(),
                ));
            }
        }
        let frame = self.frames[self.index].clone();
        self.index += 1;
        Ok(frame)
    }

    fn origin(&self) -> (i32, i32) {
        self.origin
    }

    fn describe(&self) -> String {
        format!("frame sequence ({} frames)", self.frames.len())
    }
}

#[cfg(feature = "vision")]
pub use image_source::ImageDirectorySource;

#[cfg(feature = "vision")]
mod image_source {
    use std::path::{Path, PathBuf};

    use super::{centered_region, crop, FrameSource};
    use crate::vision::frame::Frame;
    use crate::{HunterError, Result};

    const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "bmp"];

    /// Replays screenshots from a directory, sorted by file name
    pub struct ImageDirectorySource {
        files: Vec<PathBuf>,
        index: usize,
        looping: bool,
        scan_size: Option<(u32, u32)>,
        origin: (i32, i32),
    }

    impl ImageDirectorySource {
        pub fn from_directory(dir: &Path, looping: bool) -> Result<Self> {
            let mut files: Vec<PathBuf> = std::fs::read_dir(dir)?
                .filter_map(|entry| entry.ok().map(|e| e.path()))
                .filter(|path| {
                    path.extension()
                        .and_then(|ext| ext.to_str())
                        .map(|ext| IMAGE_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
                        .unwrap_or(false)
                })
                .collect();
            files.sort();

            if files.is_empty() {
                return Err(HunterError::CaptureLost(format!(
                    "no images found in {}",
                    dir.display()
                )));
            }

            log::info!("Loaded {} frames from {}", files.len(), dir.display());

            Ok(Self {
                files,
                index: 0,
                looping,
                scan_size: None,
                origin: (0, 0),
            })
        }

        /// Crop every image to a centred scan region of this size
        pub fn with_scan_size(mut self, width: u32, height: u32) -> Self {
            self.scan_size = Some((width, height));
            self
        }
    }

    impl FrameSource for ImageDirectorySource {
        fn capture(&mut self) -> Result<Frame> {
            if self.index >= self.files.len() {
                if !self.looping {
                    return Err(HunterError::CaptureLost("image sequence exhausted".to_string()));
                }
                self.index = 0;
            }
            let path = &self.files[self.index];
            self.index += 1;

            let img = image::open(path)
                .map_err(|e| HunterError::CaptureLost(format!("{}: {}", path.display(), e)))?
                .to_rgb8();
            let (width, height) = img.dimensions();
            let frame = Frame::from_rgb(width, height, img.into_raw()).ok_or_else(|| {
                HunterError::CaptureLost(format!("{}: bad pixel buffer", path.display()))
            })?;

            match self.scan_size {
                Some((scan_w, scan_h)) => {
                    let (x, y, w, h) = centered_region(width, height, scan_w, scan_h);
                    self.origin = (x as i32, y as i32);
                    Ok(crop(&frame, x, y, w, h))
                }
                None => Ok(frame),
            }
        }

        fn origin(&self) -> (i32, i32) {
            self.origin
        }

        fn describe(&self) -> String {
            format!("image directory ({} files)", self.files.len())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sequence_ends_with_capture_lost() {
        let mut source = FrameSequence::new(vec![Frame::black(2, 2), Frame::black(2, 2)]);
        assert!(source.capture().is_ok());
        assert!(source.capture().is_ok());
        assert!(matches!(source.capture(), Err(HunterError::CaptureLost(_))));
    }

    #[test]
    fn test_sequence_loops() {
        let mut source = FrameSequence::new(vec![
            Frame::filled(1, 1, Rgb::new(1, 0, 0)),
            Frame::filled(1, 1, Rgb::new(2, 0, 0)),
        ])
        .looping(true);

        let reds: Vec<u8> = (0..5)
            .map(|_| source.capture().unwrap().pixel(0, 0).unwrap().r)
            .collect();
        assert_eq!(reds, vec![1, 2, 1, 2, 1]);
    }

    #[test]
    fn test_empty_looping_sequence_is_lost() {
        let mut source = FrameSequence::new(Vec::new()).looping(true);
        assert!(source.capture().is_err());
    }

    #[test]
    fn test_centered_region() {
        assert_eq!(centered_region(1920, 1080, 1400, 700), (260, 190, 1400, 700));
        // Window smaller than the scan size: clamp to the corner and shrink
        assert_eq!(centered_region(800, 600, 1400, 700), (0, 0, 800, 600));
    }

    #[test]
    fn test_crop() {
        let mut frame = Frame::black(4, 4);
        frame.set_pixel(2, 1, Rgb::new(9, 9, 9));
        let cropped = crop(&frame, 1, 1, 2, 2);
        assert_eq!(cropped.width, 2);
        assert_eq!(cropped.pixel(1, 0), Some(Rgb::new(9, 9, 9)));
        assert_eq!(cropped.pixel(0, 0), Some(Rgb::BLACK));
    }
}
