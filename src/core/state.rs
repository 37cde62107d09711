//! Published hunter state

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::engagement::EngagementState;
use crate::stats::SessionStats;
use crate::tracking::{EntityId, TrackedEntity};

/// Lifecycle of the worker
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    #[default]
    Stopped,
    Running,
    Paused,
    /// The worker ended on its own, e.g. because capture failed
    Terminated(String),
}

impl RunState {
    /// Running or paused
    pub fn is_active(&self) -> bool {
        matches!(self, RunState::Running | RunState::Paused)
    }
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunState::Stopped => write!(f, "stopped"),
            RunState::Running => write!(f, "running"),
            RunState::Paused => write!(f, "paused"),
            RunState::Terminated(reason) => write!(f, "terminated: {}", reason),
        }
    }
}

/// Snapshot of everything a display or stats reporter needs.
///
/// Published whole by the worker after every cycle; readers never see a
/// half-updated status.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BotStatus {
    pub run_state: RunState,
    pub engagement: EngagementState,
    pub target: Option<EntityId>,
    /// Live tracked entities, ordered by id
    pub tracked: Vec<TrackedEntity>,
    pub stats: SessionStats,
    /// Frames processed since start
    pub frames: u64,
    pub auto_loot: bool,
    pub show_overlay: bool,
}

impl BotStatus {
    /// Serialize the snapshot as JSON
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| "{}".to_string())
    }

    /// The entity currently being engaged, if it is still tracked
    pub fn target_entity(&self) -> Option<&TrackedEntity> {
        let target = self.target?;
        self.tracked.iter().find(|e| e.id == target)
    }
}
