//! Cross-frame identity for detections

mod tracker;

pub use tracker::{EntityId, IdentityTracker, ReconcileOutcome, TrackedEntity};
