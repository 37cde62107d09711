//! Input synthesis
//!
//! The hunter never talks to the OS directly. It drives an [`InputSink`],
//! which a platform layer implements with real mouse and keyboard events.
//! [`Humanizer`] wraps any sink with randomized click deviation and pacing.

use parking_lot::Mutex;
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crate::config::InputConfig;

/// A virtual-key code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Key(pub u16);

impl Key {
    pub const TAB: Key = Key(0x09);
    pub const ENTER: Key = Key(0x0D);
    pub const ESCAPE: Key = Key(0x1B);
    pub const SPACE: Key = Key(0x20);
    pub const X: Key = Key(0x58);
    pub const NUMPAD0: Key = Key(0x60);
    pub const NUMPAD1: Key = Key(0x61);
    pub const NUMPAD2: Key = Key(0x62);
    pub const F1: Key = Key(0x70);
    pub const F2: Key = Key(0x71);
    pub const F3: Key = Key(0x72);
    pub const F4: Key = Key(0x73);
    pub const F5: Key = Key(0x74);
    pub const F6: Key = Key(0x75);
    pub const F7: Key = Key(0x76);
    pub const F8: Key = Key(0x77);
    pub const F9: Key = Key(0x78);
    pub const F10: Key = Key(0x79);
    pub const F11: Key = Key(0x7A);
    pub const F12: Key = Key(0x7B);

    /// Letter key, case-insensitive
    pub fn letter(c: char) -> Option<Key> {
        c.is_ascii_alphabetic()
            .then(|| Key(c.to_ascii_uppercase() as u16))
    }

    /// Function key F1..F12
    pub fn function(n: u8) -> Option<Key> {
        (1..=12).contains(&n).then(|| Key(Self::F1.0 + n as u16 - 1))
    }

    fn name(&self) -> Option<String> {
        let name = match self.0 {
            0x09 => "tab".to_string(),
            0x0D => "enter".to_string(),
            0x1B => "escape".to_string(),
            0x20 => "space".to_string(),
            c @ 0x30..=0x39 => ((c as u8) as char).to_string(),
            c @ 0x41..=0x5A => ((c as u8) as char).to_ascii_lowercase().to_string(),
            c @ 0x60..=0x69 => format!("numpad{}", c - 0x60),
            c @ 0x70..=0x7B => format!("f{}", c - 0x70 + 1),
            _ => return None,
        };
        Some(name)
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name() {
            Some(name) => write!(f, "{}", name),
            None => write!(f, "0x{:02x}", self.0),
        }
    }
}

impl FromStr for Key {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_lowercase();
        let key = match lower.as_str() {
            "tab" => Some(Key::TAB),
            "enter" | "return" => Some(Key::ENTER),
            "escape" | "esc" => Some(Key::ESCAPE),
            "space" => Some(Key::SPACE),
            _ => None,
        };
        if let Some(key) = key {
            return Ok(key);
        }

        if let Some(hex) = lower.strip_prefix("0x") {
            return u16::from_str_radix(hex, 16)
                .map(Key)
                .map_err(|_| format!("Unknown key: {}", s));
        }
        if let Some(n) = lower.strip_prefix("numpad") {
            if let Ok(n @ 0..=9) = n.parse::<u16>() {
                return Ok(Key(Key::NUMPAD0.0 + n));
            }
        }
        if let Some(n) = lower.strip_prefix('f') {
            if let Some(key) = n.parse::<u8>().ok().and_then(Key::function) {
                return Ok(key);
            }
        }

        let mut chars = lower.chars();
        match (chars.next(), chars.next()) {
            (Some(c), None) if c.is_ascii_digit() => Ok(Key(c as u16)),
            (Some(c), None) => Key::letter(c).ok_or_else(|| format!("Unknown key: {}", s)),
            _ => Err(format!("Unknown key: {}", s)),
        }
    }
}

impl TryFrom<String> for Key {
    type Error = String;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<Key> for String {
    fn from(key: Key) -> String {
        key.to_string()
    }
}

/// Destination for synthesized input. Fire-and-forget; nothing is acknowledged.
pub trait InputSink: Send {
    /// Left click at client-area coordinates
    fn click(&mut self, x: i32, y: i32);
    fn key_press(&mut self, key: Key);
    fn key_down(&mut self, key: Key);
    fn key_up(&mut self, key: Key);

    /// Pause between two actions. Sinks that do not pace input ignore this.
    fn settle(&mut self, _base_ms: u64) {}
}

impl<S: InputSink + ?Sized> InputSink for Box<S> {
    fn click(&mut self, x: i32, y: i32) {
        (**self).click(x, y)
    }

    fn key_press(&mut self, key: Key) {
        (**self).key_press(key)
    }

    fn key_down(&mut self, key: Key) {
        (**self).key_down(key)
    }

    fn key_up(&mut self, key: Key) {
        (**self).key_up(key)
    }

    fn settle(&mut self, base_ms: u64) {
        (**self).settle(base_ms)
    }
}

/// One synthesized input action
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InputAction {
    Click { x: i32, y: i32 },
    KeyPress(Key),
    KeyDown(Key),
    KeyUp(Key),
}

/// Sink that records every action; clones share the same log
#[derive(Debug, Clone, Default)]
pub struct RecordingSink {
    actions: Arc<Mutex<Vec<InputAction>>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn actions(&self) -> Vec<InputAction> {
        self.actions.lock().clone()
    }

    pub fn clicks(&self) -> Vec<(i32, i32)> {
        self.actions
            .lock()
            .iter()
            .filter_map(|a| match a {
                InputAction::Click { x, y } => Some((*x, *y)),
                _ => None,
            })
            .collect()
    }

    /// Number of presses of one key
    pub fn presses(&self, key: Key) -> usize {
        self.actions
            .lock()
            .iter()
            .filter(|a| **a == InputAction::KeyPress(key))
            .count()
    }

    pub fn clear(&self) {
        self.actions.lock().clear();
    }

    fn record(&self, action: InputAction) {
        self.actions.lock().push(action);
    }
}

impl InputSink for RecordingSink {
    fn click(&mut self, x: i32, y: i32) {
        self.record(InputAction::Click { x, y });
    }

    fn key_press(&mut self, key: Key) {
        self.record(InputAction::KeyPress(key));
    }

    fn key_down(&mut self, key: Key) {
        self.record(InputAction::KeyDown(key));
    }

    fn key_up(&mut self, key: Key) {
        self.record(InputAction::KeyUp(key));
    }
}

/// Adds human-looking noise to another sink
pub struct Humanizer<S> {
    inner: S,
    config: InputConfig,
    rng: SmallRng,
    sleep: bool,
    last_delay: Duration,
}

impl<S: InputSink> Humanizer<S> {
    pub fn new(inner: S, config: InputConfig) -> Self {
        Self {
            inner,
            config,
            rng: SmallRng::from_entropy(),
            sleep: true,
            last_delay: Duration::ZERO,
        }
    }

    /// Deterministic noise for replays
    pub fn seeded(inner: S, config: InputConfig, seed: u64) -> Self {
        Self {
            inner,
            config,
            rng: SmallRng::seed_from_u64(seed),
            sleep: true,
            last_delay: Duration::ZERO,
        }
    }

    /// Keep the spatial noise but never block the caller
    pub fn without_delays(mut self) -> Self {
        self.sleep = false;
        self
    }

    /// The wrapped sink
    pub fn inner(&self) -> &S {
        &self.inner
    }

    /// Unwrap the sink
    pub fn into_inner(self) -> S {
        self.inner
    }

    /// Offset applied to both click axes
    pub fn deviation(&mut self) -> i32 {
        let d = self.config.click_deviation;
        if !self.config.random_delay || d <= 0 {
            return 0;
        }
        self.rng.gen_range(-d..=d)
    }

    /// Pause after a click
    pub fn click_delay(&mut self) -> Duration {
        let (min, max) = (self.config.click_delay_min_ms, self.config.click_delay_max_ms);
        if !self.config.random_delay || max <= min {
            return Duration::from_millis(min);
        }
        Duration::from_millis(self.rng.gen_range(min..max))
    }

    /// Pause after a key event
    pub fn key_delay(&mut self) -> Duration {
        let (min, max) = (self.config.random_delay_min_ms, self.config.random_delay_max_ms);
        if !self.config.random_delay {
            return Duration::ZERO;
        }
        if max <= min {
            return Duration::from_millis(min);
        }
        Duration::from_millis(self.rng.gen_range(min..max))
    }

    /// `base_ms`, or a random delay within the configured bounds when
    /// random delay is on
    pub fn jittered(&mut self, base_ms: u64) -> Duration {
        if !self.config.random_delay {
            return Duration::from_millis(base_ms);
        }
        self.key_delay()
    }

    /// The most recent delay applied after an action
    pub fn last_delay(&self) -> Duration {
        self.last_delay
    }

    fn pause(&mut self, delay: Duration) {
        self.last_delay = delay;
        if self.sleep && !delay.is_zero() {
            thread::sleep(delay);
        }
    }
}

impl<S: InputSink> InputSink for Humanizer<S> {
    fn click(&mut self, x: i32, y: i32) {
        // Same offset on both axes
        let d = self.deviation();
        self.inner.click(x + d, y + d);
        let delay = self.click_delay();
        self.pause(delay);
    }

    fn key_press(&mut self, key: Key) {
        self.inner.key_press(key);
        let delay = self.key_delay();
        self.pause(delay);
    }

    fn key_down(&mut self, key: Key) {
        self.inner.key_down(key);
        let delay = self.key_delay();
        self.pause(delay);
    }

    fn key_up(&mut self, key: Key) {
        self.inner.key_up(key);
        let delay = self.key_delay();
        self.pause(delay);
    }

    fn settle(&mut self, base_ms: u64) {
        let delay = self.jittered(base_ms);
        self.pause(delay);
    }
}
