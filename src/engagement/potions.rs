//! Player vitals and potion use

use serde::{Deserialize, Serialize};

use crate::config::PotionConfig;
use crate::input::InputSink;
use crate::Tick;

/// Player HP/MP as read from the game UI
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PlayerStatus {
    pub current_hp: u32,
    pub max_hp: u32,
    pub current_mp: u32,
    pub max_mp: u32,
}

impl Default for PlayerStatus {
    fn default() -> Self {
        Self {
            current_hp: 1000,
            max_hp: 1000,
            current_mp: 500,
            max_mp: 500,
        }
    }
}

impl PlayerStatus {
    pub fn new(current_hp: u32, max_hp: u32, current_mp: u32, max_mp: u32) -> Self {
        Self {
            current_hp,
            max_hp,
            current_mp,
            max_mp,
        }
    }

    /// HP percentage; an unknown maximum reads as full
    pub fn hp_percent(&self) -> f64 {
        percent(self.current_hp, self.max_hp)
    }

    pub fn mp_percent(&self) -> f64 {
        percent(self.current_mp, self.max_mp)
    }
}

fn percent(current: u32, max: u32) -> f64 {
    if max == 0 {
        return 100.0;
    }
    current as f64 / max as f64 * 100.0
}

/// Where the worker reads player vitals from
pub trait PlayerStatusSource: Send {
    fn status(&mut self) -> PlayerStatus;
}

/// Reports a healthy player; used when no UI reader is available
#[derive(Debug, Clone, Copy, Default)]
pub struct FullHealth;

impl PlayerStatusSource for FullHealth {
    fn status(&mut self) -> PlayerStatus {
        PlayerStatus::default()
    }
}

impl<F> PlayerStatusSource for F
where
    F: FnMut() -> PlayerStatus + Send,
{
    fn status(&mut self) -> PlayerStatus {
        self()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PotionKind {
    Health,
    Mana,
}

/// Drinks potions when vitals fall below their thresholds
#[derive(Debug, Clone)]
pub struct PotionKeeper {
    config: PotionConfig,
    last_use: Option<Tick>,
}

impl PotionKeeper {
    pub fn new(config: PotionConfig) -> Self {
        Self {
            config,
            last_use: None,
        }
    }

    pub fn set_config(&mut self, config: PotionConfig) {
        self.config = config;
    }

    /// Press at most one potion key. HP takes precedence over MP, and both
    /// share one use delay.
    pub fn tick<S: InputSink + ?Sized>(
        &mut self,
        now: Tick,
        status: &PlayerStatus,
        input: &mut S,
    ) -> Option<PotionKind> {
        if !self.config.enabled {
            return None;
        }
        if let Some(last) = self.last_use {
            if now.saturating_sub(last) < self.config.use_delay_ms {
                return None;
            }
        }

        let (kind, key) = if status.hp_percent() < self.config.hp_percent {
            (PotionKind::Health, self.config.hp_key)
        } else if status.mp_percent() < self.config.mp_percent {
            (PotionKind::Mana, self.config.mp_key)
        } else {
            return None;
        };

        input.key_press(key);
        self.last_use = Some(now);
        log::info!("Used {:?} potion ({})", kind, key);
        Some(kind)
    }
}
