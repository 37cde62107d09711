//! Session statistics

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::ConfigError;
use crate::Tick;

/// Cumulative counters for one hunting session
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionStats {
    pub total_kills: u32,
    pub total_experience: u64,
    pub items_looted: u32,
    pub potions_used: u32,
    /// Session running time, refreshed by [`SessionStats::update`]
    pub running_ms: u64,
    pub kills_per_minute: u32,
    pub experience_per_minute: f64,
    #[serde(skip)]
    started_at: Option<Tick>,
}

impl SessionStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reset all counters and start the clock
    pub fn start(&mut self, now: Tick) {
        *self = Self {
            started_at: Some(now),
            ..Self::default()
        };
    }

    /// Stop the clock, keeping the final running time
    pub fn end(&mut self, now: Tick) {
        self.update(now);
        self.started_at = None;
    }

    pub fn is_running(&self) -> bool {
        self.started_at.is_some()
    }

    pub fn record_kill(&mut self, experience: u32, now: Tick) {
        self.total_kills += 1;
        self.total_experience += experience as u64;
        self.update(now);
    }

    pub fn record_loot(&mut self, items: u32) {
        self.items_looted += items;
    }

    pub fn record_potion(&mut self) {
        self.potions_used += 1;
    }

    /// Refresh running time and per-minute rates
    pub fn update(&mut self, now: Tick) {
        let Some(started) = self.started_at else {
            return;
        };
        self.running_ms = now.saturating_sub(started);
        let minutes = self.running_ms as f64 / 60_000.0;
        if minutes > 0.0 {
            self.kills_per_minute = (self.total_kills as f64 / minutes) as u32;
            self.experience_per_minute = self.total_experience as f64 / minutes;
        }
    }

    /// Multi-line summary for display
    pub fn formatted(&self) -> String {
        let seconds = self.running_ms / 1000;
        format!(
            "=== Statistics ===\n\
             Running Time: {}m {}s\n\
             Total Kills: {}\n\
             Total EXP: {}\n\
             Items Looted: {}\n\
             Potions Used: {}\n\
             Kills/Min: {}\n\
             EXP/Min: {:.1}\n",
            seconds / 60,
            seconds % 60,
            self.total_kills,
            self.total_experience,
            self.items_looted,
            self.potions_used,
            self.kills_per_minute,
            self.experience_per_minute
        )
    }

    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        std::fs::write(path, toml::to_string_pretty(self)?)?;
        log::info!("Saved session statistics to {}", path.display());
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rates() {
        let mut stats = SessionStats::new();
        stats.start(1_000);
        stats.record_kill(500, 31_000);
        stats.record_kill(300, 61_000);

        assert_eq!(stats.total_kills, 2);
        assert_eq!(stats.total_experience, 800);
        assert_eq!(stats.running_ms, 60_000);
        assert_eq!(stats.kills_per_minute, 2);
        assert!((stats.experience_per_minute - 800.0).abs() < 1e-9);
    }

    #[test]
    fn test_update_before_start_is_noop() {
        let mut stats = SessionStats::new();
        stats.update(5_000);
        assert_eq!(stats.running_ms, 0);
        assert!(!stats.is_running());
    }

    #[test]
    fn test_end_freezes_time() {
        let mut stats = SessionStats::new();
        stats.start(0);
        stats.end(90_000);
        stats.update(500_000);
        assert_eq!(stats.running_ms, 90_000);
    }

    #[test]
    fn test_formatted() {
        let mut stats = SessionStats::new();
        stats.start(0);
        stats.record_kill(750, 125_000);
        stats.record_loot(1);
        stats.record_potion();

        let text = stats.formatted();
        assert!(text.starts_with("=== Statistics ===\n"));
        assert!(text.contains("Running Time: 2m 5s\n"));
        assert!(text.contains("Total Kills: 1\n"));
        assert!(text.contains("Total EXP: 750\n"));
        assert!(text.contains("Items Looted: 1\n"));
        assert!(text.contains("Potions Used: 1\n"));
        assert!(text.contains("Kills/Min: 0\n"));
        assert!(text.contains("EXP/Min: 360.0\n"));
    }

    #[test]
    fn test_save_and_load() {
        let path = std::env::temp_dir().join(format!("monster-finder-stats-{}.toml", std::process::id()));
        let mut stats = SessionStats::new();
        stats.start(0);
        stats.record_kill(100, 30_000);
        stats.end(60_000);
        stats.save(&path).unwrap();

        let loaded = SessionStats::load(&path).unwrap();
        assert_eq!(loaded, stats);
        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn test_stats_json() {
        let stats = SessionStats::default();
        let json = serde_json::to_string(&stats).unwrap();
        assert!(json.contains("\"total_kills\":0"));
        assert!(!json.contains("started_at"));
    }
}
