//! Target selection policies

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use crate::tracking::TrackedEntity;
use crate::vision::ClassId;

/// Per-class facts the selector ranks by
pub trait ClassTraits {
    /// Lower is more important
    fn priority(&self, class: ClassId) -> u8;
    fn estimated_health(&self, class: ClassId) -> u32;
    fn is_aggressive(&self, class: ClassId) -> bool;
}

/// How the next target is chosen. Every policy breaks ties by distance to
/// the capture centre, nearest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetPolicy {
    /// Closest to the player
    Nearest,
    /// Lowest class priority number
    #[default]
    Priority,
    /// Lowest estimated health
    Weakest,
    /// Highest estimated health
    Strongest,
}

impl TargetPolicy {
    pub const ALL: [TargetPolicy; 4] = [
        TargetPolicy::Nearest,
        TargetPolicy::Priority,
        TargetPolicy::Weakest,
        TargetPolicy::Strongest,
    ];

    /// Total order over candidates; `Less` is the better target
    pub fn compare<T: ClassTraits + ?Sized>(
        &self,
        a: &TrackedEntity,
        b: &TrackedEntity,
        traits: &T,
    ) -> Ordering {
        let primary = match self {
            TargetPolicy::Nearest => Ordering::Equal,
            TargetPolicy::Priority => traits
                .priority(a.class_id)
                .cmp(&traits.priority(b.class_id)),
            TargetPolicy::Weakest => traits
                .estimated_health(a.class_id)
                .cmp(&traits.estimated_health(b.class_id)),
            TargetPolicy::Strongest => traits
                .estimated_health(b.class_id)
                .cmp(&traits.estimated_health(a.class_id)),
        };
        primary
            .then_with(|| a.distance().total_cmp(&b.distance()))
            .then_with(|| a.id.cmp(&b.id))
    }
}

impl FromStr for TargetPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "nearest" => Ok(TargetPolicy::Nearest),
            "priority" => Ok(TargetPolicy::Priority),
            "weakest" => Ok(TargetPolicy::Weakest),
            "strongest" => Ok(TargetPolicy::Strongest),
            _ => Err(format!("Unknown target policy: {}", s)),
        }
    }
}

impl fmt::Display for TargetPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TargetPolicy::Nearest => write!(f, "nearest"),
            TargetPolicy::Priority => write!(f, "priority"),
            TargetPolicy::Weakest => write!(f, "weakest"),
            TargetPolicy::Strongest => write!(f, "strongest"),
        }
    }
}

/// Best live candidate under `policy`, or `None` for an empty list
pub fn select<'a, T: ClassTraits + ?Sized>(
    policy: TargetPolicy,
    candidates: &'a [TrackedEntity],
    traits: &T,
) -> Option<&'a TrackedEntity> {
    candidates
        .iter()
        .filter(|e| e.alive)
        .min_by(|a, b| policy.compare(a, b, traits))
}
