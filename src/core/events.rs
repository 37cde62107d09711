//! Events emitted by the hunter

use serde::{Deserialize, Serialize};

use crate::tracking::EntityId;
use crate::vision::ClassId;
use crate::Tick;

/// What happened
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum HuntEventKind {
    /// A session was opened against this entity
    TargetAcquired {
        target: EntityId,
        class_id: ClassId,
        position: (i32, i32),
    },
    /// The target's health bar disappeared
    TargetDefeated {
        target: EntityId,
        class_id: ClassId,
        experience: u32,
        elapsed_ms: u64,
    },
    /// The session hit its time limit and was abandoned
    EngagementTimedOut { target: EntityId, elapsed_ms: u64 },
    /// The target went unseen past the staleness window
    TargetLost { target: EntityId },
    /// Loot presses for a kill are done
    Looted { presses: u32 },
    /// Emergency escape; `target` is the abandoned session, if any
    Escaped { target: Option<EntityId> },
    /// Player HP fell below the critical threshold and the hunt paused itself
    CriticalHealth { hp_percent: f64 },
    /// Player HP fell below the low threshold
    LowHealth { hp_percent: f64 },
}

/// Event with the worker tick it happened at
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HuntEvent {
    pub at: Tick,
    pub kind: HuntEventKind,
}

impl HuntEvent {
    /// Create an event at `at`
    pub fn new(at: Tick, kind: HuntEventKind) -> Self {
        Self { at, kind }
    }

    /// A session opened against `target`
    pub fn target_acquired(at: Tick, target: EntityId, class_id: ClassId, position: (i32, i32)) -> Self {
        Self::new(
            at,
            HuntEventKind::TargetAcquired {
                target,
                class_id,
                position,
            },
        )
    }

    /// The target's health bar disappeared
    pub fn target_defeated(
        at: Tick,
        target: EntityId,
        class_id: ClassId,
        experience: u32,
        elapsed_ms: u64,
    ) -> Self {
        Self::new(
            at,
            HuntEventKind::TargetDefeated {
                target,
                class_id,
                experience,
                elapsed_ms,
            },
        )
    }

    /// The engagement hit its time limit
    pub fn timed_out(at: Tick, target: EntityId, elapsed_ms: u64) -> Self {
        Self::new(at, HuntEventKind::EngagementTimedOut { target, elapsed_ms })
    }

    /// The target went unseen past the staleness window
    pub fn target_lost(at: Tick, target: EntityId) -> Self {
        Self::new(at, HuntEventKind::TargetLost { target })
    }

    /// Loot presses finished
    pub fn looted(at: Tick, presses: u32) -> Self {
        Self::new(at, HuntEventKind::Looted { presses })
    }

    /// Target this event is about, if any
    pub fn target(&self) -> Option<EntityId> {
        match &self.kind {
            HuntEventKind::TargetAcquired { target, .. }
            | HuntEventKind::TargetDefeated { target, .. }
            | HuntEventKind::EngagementTimedOut { target, .. }
            | HuntEventKind::TargetLost { target } => Some(*target),
            HuntEventKind::Escaped { target } => *target,
            HuntEventKind::Looted { .. }
            | HuntEventKind::CriticalHealth { .. }
            | HuntEventKind::LowHealth { .. } => None,
        }
    }
}

/// Callback type for hunt events
pub type HuntCallback = Box<dyn Fn(&HuntEvent) + Send + Sync>;

/// Fan-out of hunt events to registered listeners
pub struct EventHandler {
    callbacks: Vec<HuntCallback>,
}

impl EventHandler {
    /// Create a new event handler
    pub fn new() -> Self {
        Self {
            callbacks: Vec::new(),
        }
    }

    /// Register a callback for every event
    pub fn on_event(&mut self, callback: HuntCallback) {
        self.callbacks.push(callback);
    }

    /// Deliver an event to every callback
    pub fn emit(&self, event: &HuntEvent) {
        for callback in &self.callbacks {
            callback(event);
        }
    }

    /// Whether any callback is registered
    pub fn has_listeners(&self) -> bool {
        !self.callbacks.is_empty()
    }
}

impl Default for EventHandler {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn test_event_target() {
        let event = HuntEvent::target_acquired(5, EntityId(3), ClassId(1), (10, 20));
        assert_eq!(event.target(), Some(EntityId(3)));
        assert_eq!(HuntEvent::looted(9, 4).target(), None);
    }

    #[test]
    fn test_handler_fans_out() {
        let count = Arc::new(AtomicUsize::new(0));
        let mut handler = EventHandler::new();
        assert!(!handler.has_listeners());

        for _ in 0..2 {
            let count = count.clone();
            handler.on_event(Box::new(move |_: &HuntEvent| {
                count.fetch_add(1, Ordering::SeqCst);
            }));
        }
        handler.emit(&HuntEvent::target_lost(0, EntityId(1)));
        assert_eq!(count.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_event_json() {
        let event = HuntEvent::timed_out(10_000, EntityId(7), 10_000);
        let json = serde_json::to_string(&event).unwrap();
        let parsed: HuntEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, event);
    }
}
