//! Control requests and hotkey polling

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, VecDeque};
use std::fmt;
use std::str::FromStr;

use crate::input::Key;

/// Request from the operator to the running hunter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ControlCommand {
    Start,
    Stop,
    Pause,
    Resume,
    /// Pause when running, resume when paused
    TogglePause,
    /// Re-read the config and monster database from disk
    ReloadConfig,
    ToggleAutoLoot,
    ToggleOverlay,
    /// Press escape and abandon the current target
    EmergencyEscape,
}

impl ControlCommand {
    /// Commands that start or end the worker rather than steer it
    pub fn is_lifecycle(&self) -> bool {
        matches!(self, ControlCommand::Start | ControlCommand::Stop)
    }
}

impl FromStr for ControlCommand {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace(['-', ' '], "_").as_str() {
            "start" => Ok(ControlCommand::Start),
            "stop" => Ok(ControlCommand::Stop),
            "pause" => Ok(ControlCommand::Pause),
            "resume" => Ok(ControlCommand::Resume),
            "toggle_pause" => Ok(ControlCommand::TogglePause),
            "reload" | "reload_config" => Ok(ControlCommand::ReloadConfig),
            "toggle_auto_loot" => Ok(ControlCommand::ToggleAutoLoot),
            "toggle_overlay" => Ok(ControlCommand::ToggleOverlay),
            "escape" | "emergency_escape" => Ok(ControlCommand::EmergencyEscape),
            _ => Err(format!("Unknown control command: {}", s)),
        }
    }
}

impl fmt::Display for ControlCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ControlCommand::Start => "start",
            ControlCommand::Stop => "stop",
            ControlCommand::Pause => "pause",
            ControlCommand::Resume => "resume",
            ControlCommand::TogglePause => "toggle_pause",
            ControlCommand::ReloadConfig => "reload_config",
            ControlCommand::ToggleAutoLoot => "toggle_auto_loot",
            ControlCommand::ToggleOverlay => "toggle_overlay",
            ControlCommand::EmergencyEscape => "emergency_escape",
        };
        write!(f, "{}", name)
    }
}

/// FIFO of pending commands shared between producers and the worker
#[derive(Debug, Default)]
pub struct ControlQueue {
    pending: Mutex<VecDeque<ControlCommand>>,
}

impl ControlQueue {
    /// Create an empty queue
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a command for the worker
    pub fn push(&self, command: ControlCommand) {
        self.pending.lock().push_back(command);
    }

    /// Take every queued command, oldest first
    pub fn drain(&self) -> Vec<ControlCommand> {
        self.pending.lock().drain(..).collect()
    }

    pub fn len(&self) -> usize {
        self.pending.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.lock().is_empty()
    }
}

/// Physical keyboard state, polled by the control thread
pub trait HotkeySource: Send {
    /// Keys that went down since the previous poll
    fn pressed(&mut self) -> Vec<Key>;
}

impl<H: HotkeySource + ?Sized> HotkeySource for Box<H> {
    fn pressed(&mut self) -> Vec<Key> {
        (**self).pressed()
    }
}

/// Hotkey source that replays a fixed script, one batch per poll
#[derive(Debug, Clone, Default)]
pub struct ScriptedHotkeys {
    batches: VecDeque<Vec<Key>>,
}

impl ScriptedHotkeys {
    /// Hotkey source that reports one batch per poll
    pub fn new<I: IntoIterator<Item = Vec<Key>>>(batches: I) -> Self {
        Self {
            batches: batches.into_iter().collect(),
        }
    }
}

impl HotkeySource for ScriptedHotkeys {
    fn pressed(&mut self) -> Vec<Key> {
        self.batches.pop_front().unwrap_or_default()
    }
}

/// Key to command bindings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HotkeyMap {
    bindings: BTreeMap<Key, ControlCommand>,
}

impl HotkeyMap {
    /// A map with no bindings
    pub fn empty() -> Self {
        Self {
            bindings: BTreeMap::new(),
        }
    }

    /// Bind `key` to `command`, replacing any earlier binding
    pub fn bind(mut self, key: Key, command: ControlCommand) -> Self {
        self.bindings.insert(key, command);
        self
    }

    /// Command bound to `key`
    pub fn command(&self, key: Key) -> Option<ControlCommand> {
        self.bindings.get(&key).copied()
    }

    /// Commands for a batch of key presses, in press order
    pub fn translate(&self, keys: &[Key]) -> Vec<ControlCommand> {
        keys.iter().filter_map(|k| self.command(*k)).collect()
    }
}

impl Default for HotkeyMap {
    /// F5 start, F6 stop, F7 pause/resume, F8 auto-loot, F9 overlay,
    /// F10 escape, F11 reload
    fn default() -> Self {
        Self::empty()
            .bind(Key::F5, ControlCommand::Start)
            .bind(Key::F6, ControlCommand::Stop)
            .bind(Key::F7, ControlCommand::TogglePause)
            .bind(Key::F8, ControlCommand::ToggleAutoLoot)
            .bind(Key::F9, ControlCommand::ToggleOverlay)
            .bind(Key::F10, ControlCommand::EmergencyEscape)
            .bind(Key::F11, ControlCommand::ReloadConfig)
    }
}
