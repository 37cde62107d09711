//! Skill rotation

use serde::{Deserialize, Serialize};

use crate::input::Key;
use crate::Tick;

/// A bindable skill
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Skill {
    pub name: String,
    pub key: Key,
    #[serde(default = "default_cooldown")]
    pub cooldown_ms: u64,
    /// 1 is the most important; informational only
    #[serde(default = "default_priority")]
    pub priority: u8,
    /// Only usable while player HP is at least this percentage
    #[serde(default)]
    pub min_hp_percent: f64,
    /// Only usable while player HP is at most this percentage
    #[serde(default = "default_max_hp")]
    pub max_hp_percent: f64,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(skip)]
    pub last_used: Option<Tick>,
}

fn default_cooldown() -> u64 {
    1000
}

fn default_priority() -> u8 {
    5
}

fn default_max_hp() -> f64 {
    100.0
}

fn default_enabled() -> bool {
    true
}

impl Skill {
    pub fn new(name: impl Into<String>, key: Key, cooldown_ms: u64, priority: u8) -> Self {
        Self {
            name: name.into(),
            key,
            cooldown_ms,
            priority,
            min_hp_percent: 0.0,
            max_hp_percent: 100.0,
            enabled: true,
            last_used: None,
        }
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    pub fn with_hp_range(mut self, min: f64, max: f64) -> Self {
        self.min_hp_percent = min;
        self.max_hp_percent = max;
        self
    }

    pub fn is_on_cooldown(&self, now: Tick) -> bool {
        self.last_used
            .map(|t| now.saturating_sub(t) < self.cooldown_ms)
            .unwrap_or(false)
    }

    pub fn is_usable(&self, now: Tick, hp_percent: f64) -> bool {
        self.enabled
            && !self.is_on_cooldown(now)
            && hp_percent >= self.min_hp_percent
            && hp_percent <= self.max_hp_percent
    }
}

/// Basic attack, four damage skills and two buffs that start disabled
pub fn default_rotation() -> Vec<Skill> {
    vec![
        Skill::new("Basic Attack", Key::SPACE, 1000, 10),
        Skill::new("Skill 1 (F1)", Key::F1, 5000, 5),
        Skill::new("Skill 2 (F2)", Key::F2, 8000, 4),
        Skill::new("Skill 3 (F3)", Key::F3, 10_000, 3),
        Skill::new("Skill 4 (F4)", Key::F4, 12_000, 2),
        Skill::new("Buff 1 (F5)", Key::F5, 30_000, 1).disabled(),
        Skill::new("Buff 2 (F6)", Key::F6, 60_000, 1).disabled(),
    ]
}

/// Round-robin over a skill list.
///
/// The search starts at the most recently used skill, so a skill that comes
/// off cooldown is picked again before the ones after it.
#[derive(Debug, Clone, Default)]
pub struct SkillRotation {
    skills: Vec<Skill>,
    current: usize,
}

impl SkillRotation {
    pub fn new(skills: Vec<Skill>) -> Self {
        Self { skills, current: 0 }
    }

    pub fn skills(&self) -> &[Skill] {
        &self.skills
    }

    pub fn len(&self) -> usize {
        self.skills.len()
    }

    pub fn is_empty(&self) -> bool {
        self.skills.is_empty()
    }

    /// Index of the next usable skill without consuming it
    pub fn peek(&self, now: Tick, hp_percent: f64) -> Option<usize> {
        let len = self.skills.len();
        (0..len)
            .map(|i| (self.current + i) % len)
            .find(|&idx| self.skills[idx].is_usable(now, hp_percent))
    }

    /// Pick the next usable skill and start its cooldown
    pub fn next_skill(&mut self, now: Tick, hp_percent: f64) -> Option<&Skill> {
        let idx = self.peek(now, hp_percent)?;
        self.current = idx;
        let skill = &mut self.skills[idx];
        skill.last_used = Some(now);
        Some(skill)
    }

    pub fn set_enabled(&mut self, index: usize, enabled: bool) {
        if let Some(skill) = self.skills.get_mut(index) {
            skill.enabled = enabled;
        }
    }

    pub fn push(&mut self, skill: Skill) {
        self.skills.push(skill);
    }

    pub fn remove(&mut self, index: usize) -> Option<Skill> {
        if index >= self.skills.len() {
            return None;
        }
        let skill = self.skills.remove(index);
        if self.current >= self.skills.len() {
            self.current = 0;
        }
        Some(skill)
    }

    pub fn reset_cooldowns(&mut self) {
        for skill in &mut self.skills {
            skill.last_used = None;
        }
    }
}
