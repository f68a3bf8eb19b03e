//! # Status Conditions
//!
//! Reason-keyed condition list shared by MongoDBConfig and MongoDBData.
//!
//! Upserts follow apimachinery `SetStatusCondition` semantics: a condition is
//! keyed by its `type`, appended when new and replaced in place otherwise, and
//! `lastTransitionTime` only moves when the condition's status flips.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

pub const CONDITION_TRUE: &str = "True";
pub const CONDITION_FALSE: &str = "False";

/// Condition represents one reason-coded observation of a resource
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Condition {
    /// Type of condition (same value as the reason code)
    pub r#type: String,
    /// Status of the condition (True, False)
    pub status: String,
    /// Machine-readable reason code
    #[serde(default)]
    pub reason: String,
    /// Human-readable message
    #[serde(default)]
    pub message: String,
    /// Last time the status of this condition flipped (RFC3339)
    #[serde(default)]
    pub last_transition_time: Option<String>,
    /// metadata.generation the condition was computed from
    #[serde(default)]
    pub observed_generation: Option<i64>,
}

impl Condition {
    /// Build a condition keyed by `reason`
    pub fn new(reason: &str, status: bool, message: &str, observed_generation: Option<i64>) -> Self {
        Self {
            r#type: reason.to_string(),
            status: condition_status(status).to_string(),
            reason: reason.to_string(),
            message: message.to_string(),
            last_transition_time: None,
            observed_generation,
        }
    }

    pub fn is_true(&self) -> bool {
        self.status == CONDITION_TRUE
    }
}

pub fn condition_status(status: bool) -> &'static str {
    if status {
        CONDITION_TRUE
    } else {
        CONDITION_FALSE
    }
}

/// Find a condition by type
pub fn find_condition<'a>(conditions: &'a [Condition], r#type: &str) -> Option<&'a Condition> {
    conditions.iter().find(|c| c.r#type == r#type)
}

/// Insert or replace `new` in `conditions`, keyed by type
///
/// Returns `true` when anything observable changed.
pub fn set_status_condition(conditions: &mut Vec<Condition>, mut new: Condition) -> bool {
    let now = chrono::Utc::now().to_rfc3339();

    let Some(existing) = conditions.iter_mut().find(|c| c.r#type == new.r#type) else {
        if new.last_transition_time.is_none() {
            new.last_transition_time = Some(now);
        }
        conditions.push(new);
        return true;
    };

    let mut changed = false;
    if existing.status != new.status {
        existing.status = new.status;
        existing.last_transition_time = new.last_transition_time.or(Some(now));
        changed = true;
    }
    if existing.reason != new.reason {
        existing.reason = new.reason;
        changed = true;
    }
    if existing.message != new.message {
        existing.message = new.message;
        changed = true;
    }
    if existing.observed_generation != new.observed_generation {
        existing.observed_generation = new.observed_generation;
        changed = true;
    }
    changed
}
