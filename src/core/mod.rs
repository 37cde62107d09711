//! Hunter runtime
//!
//! - `Hunt` - everything the worker owns, advanced one capture at a time
//! - `Hunter` - the worker, stats and hotkey threads around it
//! - `BotStatus` - the snapshot published after every cycle
//! - `HuntEvent` - what happened during a cycle

pub mod control;
pub mod events;
mod pipeline;
mod runner;
mod snapshot;
mod state;

pub use control::{ControlCommand, ControlQueue, HotkeyMap, HotkeySource, ScriptedHotkeys};
pub use events::{EventHandler, HuntCallback, HuntEvent, HuntEventKind};
pub use pipeline::{CycleReport, Hunt};
pub use runner::{Devices, Hunter, ProfilePaths, StatusCallback};
pub use snapshot::SnapshotCell;
pub use state::{BotStatus, RunState};
