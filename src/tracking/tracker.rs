//! Frame-to-frame identity reconciliation
//!
//! Each cycle's detections are matched to the entities seen before by
//! nearest centre within a fixed radius, per class. Unmatched detections
//! become new entities; entities that go unseen too long or lose their
//! health bar are dropped.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use crate::config::TrackingConfig;
use crate::vision::{ClassId, Detection, VitalSign};
use crate::Tick;

/// Stable entity identity. Allocated in increasing order and never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityId(pub u64);

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A detection with a cross-frame identity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackedEntity {
    pub id: EntityId,
    pub class_id: ClassId,
    /// Geometry from the most recent matching detection
    pub geometry: Detection,
    pub first_seen: Tick,
    pub last_seen: Tick,
    pub alive: bool,
}

impl TrackedEntity {
    /// Start tracking a detection
    pub fn new(id: EntityId, geometry: Detection, now: Tick) -> Self {
        Self {
            id,
            class_id: geometry.class_id,
            geometry,
            first_seen: now,
            last_seen: now,
            alive: true,
        }
    }

    /// Distance from the capture centre
    pub fn distance(&self) -> f64 {
        self.geometry.distance_from_center
    }

    /// Centre of the current geometry
    pub fn center(&self) -> (i32, i32) {
        (self.geometry.center_x, self.geometry.center_y)
    }
}

/// What one reconciliation pass did
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileOutcome {
    pub created: Vec<EntityId>,
    pub updated: Vec<EntityId>,
    /// Dropped after going unseen past the staleness window
    pub expired: Vec<EntityId>,
    /// Dropped because the liveness probe failed
    pub retired: Vec<EntityId>,
}

impl ReconcileOutcome {
    /// The pass changed nothing
    pub fn is_quiet(&self) -> bool {
        self.created.is_empty()
            && self.updated.is_empty()
            && self.expired.is_empty()
            && self.retired.is_empty()
    }
}

/// Owner of every tracked entity
#[derive(Debug, Clone)]
pub struct IdentityTracker {
    entities: BTreeMap<EntityId, TrackedEntity>,
    next_id: u64,
    matching_radius: f64,
    staleness_ms: u64,
}

impl IdentityTracker {
    /// Create an empty tracker
    pub fn new(matching_radius: f64, staleness_ms: u64) -> Self {
        Self {
            entities: BTreeMap::new(),
            next_id: 1,
            matching_radius,
            staleness_ms,
        }
    }

    /// Create an empty tracker from the `[tracking]` section
    pub fn from_config(config: &TrackingConfig) -> Self {
        Self::new(config.matching_radius, config.staleness_ms)
    }

    /// Apply new tunables without losing tracked state
    pub fn configure(&mut self, config: &TrackingConfig) {
        self.matching_radius = config.matching_radius;
        self.staleness_ms = config.staleness_ms;
    }

    /// Match this cycle's detections, then drop stale and dead entities.
    ///
    /// Only entities that were matched or created in this pass are probed.
    /// An entity claimed by one detection cannot be claimed by another in
    /// the same pass; among equally near entities the lowest id wins.
    pub fn reconcile<V>(&mut self, now: Tick, detections: &[Detection], vital: &V) -> ReconcileOutcome
    where
        V: VitalSign + ?Sized,
    {
        let mut outcome = ReconcileOutcome::default();
        let mut claimed = BTreeSet::new();

        for detection in detections {
            match self.nearest_unclaimed(detection, &claimed) {
                Some(id) => {
                    if let Some(entity) = self.entities.get_mut(&id) {
                        entity.geometry = *detection;
                        entity.last_seen = now;
                        entity.alive = vital.is_alive(detection);
                    }
                    claimed.insert(id);
                    outcome.updated.push(id);
                }
                None => {
                    let id = self.allocate();
                    let mut entity = TrackedEntity::new(id, *detection, now);
                    entity.alive = vital.is_alive(detection);
                    log::debug!("New entity {} ({}) at {:?}", id, entity.class_id, entity.center());
                    self.entities.insert(id, entity);
                    claimed.insert(id);
                    outcome.created.push(id);
                }
            }
        }

        let staleness = self.staleness_ms;
        self.entities.retain(|id, entity| {
            if !claimed.contains(id) {
                if now.saturating_sub(entity.last_seen) > staleness {
                    outcome.expired.push(*id);
                    return false;
                }
                return true;
            }
            if !entity.alive {
                outcome.retired.push(*id);
                return false;
            }
            true
        });

        outcome
    }

    fn nearest_unclaimed(&self, detection: &Detection, claimed: &BTreeSet<EntityId>) -> Option<EntityId> {
        self.entities
            .values()
            .filter(|e| e.class_id == detection.class_id && !claimed.contains(&e.id))
            .map(|e| (e.id, e.geometry.distance_to(detection)))
            .filter(|(_, d)| *d < self.matching_radius)
            .min_by(|a, b| a.1.total_cmp(&b.1))
            .map(|(id, _)| id)
    }

    fn allocate(&mut self) -> EntityId {
        let id = EntityId(self.next_id);
        self.next_id += 1;
        id
    }

    /// Look up a tracked entity
    pub fn get(&self, id: EntityId) -> Option<&TrackedEntity> {
        self.entities.get(&id)
    }

    /// Whether `id` is still tracked
    pub fn contains(&self, id: EntityId) -> bool {
        self.entities.contains_key(&id)
    }

    /// Forget an entity, e.g. one confirmed killed
    pub fn remove(&mut self, id: EntityId) -> Option<TrackedEntity> {
        self.entities.remove(&id)
    }

    /// Tracked entities, ordered by id
    pub fn entities(&self) -> impl Iterator<Item = &TrackedEntity> {
        self.entities.values()
    }

    /// Owned copy of every live entity, ordered by id
    pub fn snapshot(&self) -> Vec<TrackedEntity> {
        self.entities.values().filter(|e| e.alive).cloned().collect()
    }

    /// Number of tracked entities
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// Drop everything. Ids keep counting up.
    pub fn clear(&mut self) {
        self.entities.clear();
    }
}

impl Default for IdentityTracker {
    fn default() -> Self {
        Self::from_config(&TrackingConfig::default())
    }
}
