use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The status half of a Kubernetes-style `metav1.Condition`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConditionStatus {
    True,
    False,
    Unknown,
}

/// One entry of a declarative object's `status.conditions` list.
///
/// Mirrors `metav1.Condition` closely enough to serialize the same way on
/// the wire; `ResourceSynced` is the only type this engine's reconcilers
/// currently set (see `notify-runtime::reconcile`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Condition {
    #[serde(rename = "type")]
    pub type_: String,
    pub status: ConditionStatus,
    pub reason: String,
    pub message: String,
    pub last_transition_time: DateTime<Utc>,
}

impl Condition {
    pub fn new(type_: impl Into<String>, status: ConditionStatus, reason: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            type_: type_.into(),
            status,
            reason: reason.into(),
            message: message.into(),
            last_transition_time: Utc::now(),
        }
    }

    /// Insert or update (by `type_`) within a condition list, bumping
    /// `last_transition_time` on the entry that changes.
    pub fn upsert(conditions: &mut Vec<Condition>, condition: Condition) {
        if let Some(existing) = conditions.iter_mut().find(|c| c.type_ == condition.type_) {
            existing.status = condition.status;
            existing.reason = condition.reason;
            existing.message = condition.message;
            existing.last_transition_time = Utc::now();
        } else {
            conditions.push(condition);
        }
    }
}
