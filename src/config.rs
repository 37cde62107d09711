//! Runtime configuration
//!
//! The bot is tuned through one TOML file split into sections. Every field
//! has a default, and a section that fails to deserialize is replaced by its
//! defaults instead of rejecting the whole file.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::engagement::skills::{default_rotation, Skill};
use crate::error::ConfigError;
use crate::input::Key;
use crate::targeting::TargetPolicy;
use crate::vision::{ClusterBuilder, FrameClassifier, LivenessProbe};

/// Scan region and detection tunables
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    /// Width of the centred scan region
    pub width: u32,
    /// Height of the centred scan region
    pub height: u32,
    /// Grid step between classifier samples
    pub sample_stride: u32,
    /// Summed channel change a sample needs to count as moving
    pub motion_threshold: u16,
    /// Clusters with fewer samples are dropped as noise
    pub min_cluster_pixels: u32,
    pub merge_distance: f64,
    /// Radius around the capture centre occupied by the player's own avatar
    pub player_exclusion_radius: f64,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            width: 1400,
            height: 700,
            sample_stride: 3,
            motion_threshold: 30,
            min_cluster_pixels: 15,
            merge_distance: 60.0,
            player_exclusion_radius: 130.0,
        }
    }
}

impl ScanConfig {
    pub fn classifier(&self) -> FrameClassifier {
        FrameClassifier::new(self.sample_stride, self.motion_threshold)
    }

    pub fn cluster_builder(&self) -> ClusterBuilder {
        ClusterBuilder::new(
            self.merge_distance,
            self.min_cluster_pixels,
            self.player_exclusion_radius,
        )
        .centered_on(self.width, self.height)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackingConfig {
    /// Largest per-cycle movement still treated as the same entity
    pub matching_radius: f64,
    /// How long an unmatched entity is kept before it is dropped
    pub staleness_ms: u64,
}

impl Default for TrackingConfig {
    fn default() -> Self {
        Self {
            matching_radius: 100.0,
            staleness_ms: 2000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngagementConfig {
    /// Hard cap on one engagement, after which the target is abandoned
    pub max_engagement_ms: u64,
    /// Minimum spacing between chained attack presses
    pub attack_cooldown_ms: u64,
    /// Pause between the targeting click and the first attack
    pub attack_delay_ms: u64,
    pub attack_key: Key,
    /// Key used to disengage on timeout or emergency
    pub escape_key: Key,
    /// Cast skills from the rotation while engaging
    pub auto_skill: bool,
    /// Keep pressing the attack key while engaging
    pub chain_attack: bool,
    /// Approach targets along a straight-line waypoint path
    pub pathfinding: bool,
    /// Click intermediate waypoints before the target itself
    pub waypoint_clicks: bool,
}

impl Default for EngagementConfig {
    fn default() -> Self {
        Self {
            max_engagement_ms: 10_000,
            attack_cooldown_ms: 500,
            attack_delay_ms: 100,
            attack_key: Key::SPACE,
            escape_key: Key::ESCAPE,
            auto_skill: true,
            chain_attack: true,
            pathfinding: true,
            waypoint_clicks: false,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TargetingConfig {
    pub policy: TargetPolicy,
    /// Only engage classes flagged aggressive in the monster database
    pub only_aggressive: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LootConfig {
    pub auto_loot: bool,
    pub key: Key,
    /// Period of the background loot press while scanning
    pub interval_ms: u64,
    /// Presses issued after a kill
    pub presses: u32,
    /// Wait after the first press, for the loot animation
    pub first_delay_ms: u64,
    /// Wait after each following press
    pub spacing_ms: u64,
}

impl Default for LootConfig {
    fn default() -> Self {
        Self {
            auto_loot: true,
            key: Key::X,
            interval_ms: 2000,
            presses: 4,
            first_delay_ms: 500,
            spacing_ms: 300,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SafetyConfig {
    /// Pause the worker when player HP drops below `critical_hp_percent`
    pub pause_on_low_hp: bool,
    pub critical_hp_percent: f64,
    /// Warn below this HP, and escape an open engagement with `auto_escape`
    pub low_hp_percent: f64,
    /// Honour the emergency escape command and escape on low HP
    pub auto_escape: bool,
}

impl Default for SafetyConfig {
    fn default() -> Self {
        Self {
            pause_on_low_hp: true,
            critical_hp_percent: 15.0,
            low_hp_percent: 30.0,
            auto_escape: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PotionConfig {
    pub enabled: bool,
    pub hp_key: Key,
    pub mp_key: Key,
    /// Drink an HP potion below this HP percentage
    pub hp_percent: f64,
    /// Drink an MP potion below this MP percentage
    pub mp_percent: f64,
    /// Minimum time between two potions of either kind
    pub use_delay_ms: u64,
}

impl Default for PotionConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            hp_key: Key::NUMPAD1,
            mp_key: Key::NUMPAD2,
            hp_percent: 30.0,
            mp_percent: 20.0,
            use_delay_ms: 1000,
        }
    }
}

/// Humanization of synthesized input
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InputConfig {
    pub random_delay: bool,
    pub random_delay_min_ms: u64,
    pub random_delay_max_ms: u64,
    /// Maximum click offset in pixels
    pub click_deviation: i32,
    pub click_delay_min_ms: u64,
    pub click_delay_max_ms: u64,
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            random_delay: true,
            random_delay_min_ms: 50,
            random_delay_max_ms: 200,
            click_deviation: 5,
            click_delay_min_ms: 100,
            click_delay_max_ms: 300,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplayConfig {
    pub show_overlay: bool,
    pub show_boxes: bool,
    pub show_esp_lines: bool,
    /// ESP lines are drawn to this many of the nearest entities
    pub max_esp_lines: usize,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            show_overlay: true,
            show_boxes: true,
            show_esp_lines: true,
            max_esp_lines: 10,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerConfig {
    /// Sleep between two worker cycles
    pub cycle_ms: u64,
    /// Period of the statistics refresh task
    pub stats_interval_ms: u64,
    /// Period of the hotkey poll task
    pub control_poll_ms: u64,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            cycle_ms: 30,
            stats_interval_ms: 1000,
            control_poll_ms: 50,
        }
    }
}

/// Complete bot configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BotConfig {
    pub scan: ScanConfig,
    pub tracking: TrackingConfig,
    pub liveness: LivenessProbe,
    pub engagement: EngagementConfig,
    pub targeting: TargetingConfig,
    pub loot: LootConfig,
    pub safety: SafetyConfig,
    pub potions: PotionConfig,
    pub input: InputConfig,
    pub display: DisplayConfig,
    pub worker: WorkerConfig,
    pub skills: Vec<Skill>,
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            scan: ScanConfig::default(),
            tracking: TrackingConfig::default(),
            liveness: LivenessProbe::default(),
            engagement: EngagementConfig::default(),
            targeting: TargetingConfig::default(),
            loot: LootConfig::default(),
            safety: SafetyConfig::default(),
            potions: PotionConfig::default(),
            input: InputConfig::default(),
            display: DisplayConfig::default(),
            worker: WorkerConfig::default(),
            skills: default_rotation(),
        }
    }
}

impl BotConfig {
    /// Load from a TOML file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config = Self::from_toml_str(&content)?;
        log::info!("Loaded bot config from {}", path.display());
        Ok(config)
    }

    /// Parse a TOML document. Only a document that is not TOML at all is an
    /// error; bad sections and bad skill entries fall back to defaults.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let table: toml::Table = content.parse()?;

        Ok(Self {
            scan: section(&table, "scan"),
            tracking: section(&table, "tracking"),
            liveness: section(&table, "liveness"),
            engagement: section(&table, "engagement"),
            targeting: section(&table, "targeting"),
            loot: section(&table, "loot"),
            safety: section(&table, "safety"),
            potions: section(&table, "potions"),
            input: section(&table, "input"),
            display: section(&table, "display"),
            worker: section(&table, "worker"),
            skills: skills(&table),
        })
    }

    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        std::fs::write(path, self.to_toml_string()?)?;
        log::info!("Saved bot config to {}", path.display());
        Ok(())
    }
}

fn section<T>(table: &toml::Table, name: &str) -> T
where
    T: DeserializeOwned + Default,
{
    let Some(value) = table.get(name) else {
        return T::default();
    };
    match value.clone().try_into() {
        Ok(parsed) => parsed,
        Err(e) => {
            log::warn!("Invalid [{}] section, using defaults: {}", name, e);
            T::default()
        }
    }
}

fn skills(table: &toml::Table) -> Vec<Skill> {
    let Some(value) = table.get("skills") else {
        return default_rotation();
    };
    let Some(entries) = value.as_array() else {
        log::warn!("Invalid skills list, using the default rotation");
        return default_rotation();
    };

    entries
        .iter()
        .enumerate()
        .filter_map(|(i, entry)| match entry.clone().try_into::<Skill>() {
            Ok(skill) => Some(skill),
            Err(e) => {
                log::warn!("Skipping skill #{}: {}", i, e);
                None
            }
        })
        .collect()
}
