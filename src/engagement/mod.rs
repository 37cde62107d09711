//! Engagement: target acquisition, combat, loot, and the player-side
//! helpers (skills, potions, approach paths) it drives.

pub mod controller;
pub mod path;
pub mod potions;
pub mod skills;

pub use controller::{EngagementController, EngagementSession, EngagementState, Scene};
pub use potions::{FullHealth, PlayerStatus, PlayerStatusSource, PotionKeeper, PotionKind};
pub use skills::{default_rotation, Skill, SkillRotation};
