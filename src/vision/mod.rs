//! Frame capture and color/motion detection
//!
//! Data flows through this module in one direction per cycle:
//!
//! ```text
//! FrameSource -> FrameBuffers -> FrameClassifier -> ClusterBuilder -> Detection
//! ```
//!
//! [`LivenessProbe`] looks at the same frames independently of the palette.

pub mod capture;
pub mod classifier;
pub mod cluster;
pub mod color;
pub mod frame;
pub mod liveness;

#[cfg(feature = "vision")]
pub mod overlay;

pub use capture::{centered_region, crop, FrameSequence, FrameSource};
#[cfg(feature = "vision")]
pub use capture::ImageDirectorySource;
pub use classifier::{FrameClassifier, TaggedPixel};
pub use cluster::{ClusterBuilder, Detection};
pub use color::{ClassId, ColorProfile, Palette, Rgb};
pub use frame::{Frame, FrameBuffers};
pub use liveness::{FrameProbe, LivenessProbe, VitalSign};
#[cfg(feature = "vision")]
pub use overlay::render_overlay;
