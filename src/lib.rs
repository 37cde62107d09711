//! Monster Finder
//!
//! Screen-reading hunting engine. Each worker cycle captures the area around
//! the player, classifies pixels by monster color and motion, clusters them
//! into detections, keeps stable identities across frames, and drives one
//! engagement at a time through synthesized input.
//!
//! The capture and input back ends are traits ([`FrameSource`],
//! [`InputSink`], [`PlayerStatusSource`]) so the whole pipeline runs on
//! recorded frames as well as on a live window.
//!
//! Everything time-dependent takes an explicit [`Tick`].

pub mod config;
pub mod core;
pub mod database;
pub mod engagement;
pub mod error;
pub mod input;
pub mod stats;
pub mod targeting;
pub mod tracking;
pub mod vision;

/// Milliseconds on the worker clock
pub type Tick = u64;

// Re-export commonly used types
pub use config::BotConfig;
pub use crate::core::{
    BotStatus, ControlCommand, Devices, HotkeyMap, Hunt, HuntEvent, HuntEventKind, Hunter,
    ProfilePaths, RunState,
};
pub use database::{MonsterDatabase, MonsterRecord};
pub use engagement::{EngagementController, EngagementState, PlayerStatus, PlayerStatusSource};
pub use error::{ConfigError, HunterError, Result};
pub use input::{Humanizer, InputSink, Key, RecordingSink};
pub use stats::SessionStats;
pub use targeting::{ClassTraits, TargetPolicy};
pub use tracking::{EntityId, IdentityTracker, TrackedEntity};
pub use vision::{ClassId, Detection, Frame, FrameSequence, FrameSource, LivenessProbe};
