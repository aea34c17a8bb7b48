// Snapshot Domain Model - the entire persisted state

use std::collections::HashSet;

use serde::{Deserialize, Deserializer, Serialize};

use super::history::HistoryEvent;
use super::rep::{Rep, RepId, UNKNOWN_REP_NAME};

/// Document field names, shared by every store adapter
pub mod fields {
    pub const REPS: &str = "reps";
    pub const QUEUE: &str = "queue";
    pub const STEPPED_AWAY: &str = "steppedAway";
    pub const WITH_CUSTOMER: &str = "withCustomer";
    pub const HISTORY: &str = "history";
    pub const IS_SETUP_COMPLETE: &str = "isSetupComplete";

    pub const ALL: [&str; 6] = [
        REPS,
        QUEUE,
        STEPPED_AWAY,
        WITH_CUSTOMER,
        HISTORY,
        IS_SETUP_COMPLETE,
    ];
}

/// Complete persisted state.
///
/// Every derived view (status, active queue, designated rep, stats) is computed
/// from these fields and never stored. Missing or `null` collections in a stored
/// document are read back as empty.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    #[serde(default, deserialize_with = "null_as_default")]
    pub reps: Vec<Rep>,

    /// Rotation sequence: check-in order, no duplicates
    #[serde(default, deserialize_with = "null_as_default")]
    pub queue: Vec<RepId>,

    #[serde(default, deserialize_with = "null_as_default")]
    pub stepped_away: Vec<RepId>,

    #[serde(default, deserialize_with = "null_as_default")]
    pub with_customer: Vec<RepId>,

    /// Newest first
    #[serde(default, deserialize_with = "null_as_default")]
    pub history: Vec<HistoryEvent>,

    #[serde(default, deserialize_with = "null_as_default")]
    pub is_setup_complete: bool,

    /// Store-maintained write counter (0 = never written)
    #[serde(default, deserialize_with = "null_as_default")]
    pub version: u64,
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

impl Snapshot {
    pub fn rep(&self, id: RepId) -> Option<&Rep> {
        self.reps.iter().find(|r| r.id == id)
    }

    /// Name to capture in a history event
    pub fn rep_name(&self, id: RepId) -> String {
        self.rep(id)
            .map(|r| r.name.clone())
            .unwrap_or_else(|| UNKNOWN_REP_NAME.to_string())
    }

    pub fn is_checked_in(&self, id: RepId) -> bool {
        self.queue.contains(&id)
    }

    pub fn is_stepped_away(&self, id: RepId) -> bool {
        self.stepped_away.contains(&id)
    }

    pub fn is_with_customer(&self, id: RepId) -> bool {
        self.with_customer.contains(&id)
    }

    /// Apply changed fields on top of this snapshot
    pub fn merge(&mut self, patch: &SnapshotPatch) {
        if let Some(reps) = &patch.reps {
            self.reps = reps.clone();
        }
        if let Some(queue) = &patch.queue {
            self.queue = queue.clone();
        }
        if let Some(stepped_away) = &patch.stepped_away {
            self.stepped_away = stepped_away.clone();
        }
        if let Some(with_customer) = &patch.with_customer {
            self.with_customer = with_customer.clone();
        }
        if let Some(history) = &patch.history {
            self.history = history.clone();
        }
        if let Some(is_setup_complete) = patch.is_setup_complete {
            self.is_setup_complete = is_setup_complete;
        }
    }

    /// Breaches of the membership invariants.
    ///
    /// The engine never produces these; they only appear when concurrent
    /// writers overwrite each other's fields.
    pub fn invariant_violations(&self) -> Vec<InvariantViolation> {
        let mut violations = Vec::new();

        let mut seen = HashSet::new();
        for id in &self.queue {
            if !seen.insert(*id) {
                violations.push(InvariantViolation::DuplicateInQueue(*id));
            }
        }
        for id in &self.stepped_away {
            if !seen.contains(id) {
                violations.push(InvariantViolation::SteppedAwayNotCheckedIn(*id));
            }
        }
        for id in &self.with_customer {
            if !seen.contains(id) {
                violations.push(InvariantViolation::WithCustomerNotCheckedIn(*id));
            }
        }

        violations
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvariantViolation {
    DuplicateInQueue(RepId),
    SteppedAwayNotCheckedIn(RepId),
    WithCustomerNotCheckedIn(RepId),
}

impl std::fmt::Display for InvariantViolation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InvariantViolation::DuplicateInQueue(id) => write!(f, "rep {} queued twice", id),
            InvariantViolation::SteppedAwayNotCheckedIn(id) => {
                write!(f, "rep {} stepped away without being checked in", id)
            }
            InvariantViolation::WithCustomerNotCheckedIn(id) => {
                write!(f, "rep {} with customer without being checked in", id)
            }
        }
    }
}

/// The fields a command changed.
///
/// Store adapters that support partial-field writes persist only these, so a
/// concurrent command touching other fields is not overwritten.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reps: Option<Vec<Rep>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub queue: Option<Vec<RepId>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stepped_away: Option<Vec<RepId>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub with_customer: Option<Vec<RepId>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub history: Option<Vec<HistoryEvent>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_setup_complete: Option<bool>,
}

impl SnapshotPatch {
    pub fn is_empty(&self) -> bool {
        self.changed_fields().is_empty()
    }

    /// Document field names present in this patch
    pub fn changed_fields(&self) -> Vec<&'static str> {
        let mut changed = Vec::new();
        if self.reps.is_some() {
            changed.push(fields::REPS);
        }
        if self.queue.is_some() {
            changed.push(fields::QUEUE);
        }
        if self.stepped_away.is_some() {
            changed.push(fields::STEPPED_AWAY);
        }
        if self.with_customer.is_some() {
            changed.push(fields::WITH_CUSTOMER);
        }
        if self.history.is_some() {
            changed.push(fields::HISTORY);
        }
        if self.is_setup_complete.is_some() {
            changed.push(fields::IS_SETUP_COMPLETE);
        }
        changed
    }

    /// Serialize each changed field as its own JSON document value
    pub fn to_field_values(&self) -> serde_json::Result<Vec<(&'static str, serde_json::Value)>> {
        let serde_json::Value::Object(mut object) = serde_json::to_value(self)? else {
            return Ok(Vec::new());
        };

        Ok(fields::ALL
            .iter()
            .filter_map(|field| object.remove(*field).map(|value| (*field, value)))
            .collect())
    }
}

impl From<&Snapshot> for SnapshotPatch {
    fn from(snapshot: &Snapshot) -> Self {
        Self {
            reps: Some(snapshot.reps.clone()),
            queue: Some(snapshot.queue.clone()),
            stepped_away: Some(snapshot.stepped_away.clone()),
            with_customer: Some(snapshot.with_customer.clone()),
            history: Some(snapshot.history.clone()),
            is_setup_complete: Some(snapshot.is_setup_complete),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_missing_and_null_fields_default_to_empty() {
        let snapshot: Snapshot = serde_json::from_value(json!({
            "reps": [{"id": 1, "name": "Alice", "avatar": "A"}],
            "queue": null,
            "withCustomer": [1]
        }))
        .unwrap();

        assert_eq!(snapshot.reps.len(), 1);
        assert!(snapshot.queue.is_empty());
        assert!(snapshot.stepped_away.is_empty());
        assert_eq!(snapshot.with_customer, vec![1]);
        assert!(snapshot.history.is_empty());
        assert!(!snapshot.is_setup_complete);
        assert_eq!(snapshot.version, 0);
    }

    #[test]
    fn test_rep_name_falls_back_to_unknown() {
        let snapshot = Snapshot {
            reps: vec![Rep::new(1, "Alice").unwrap()],
            ..Default::default()
        };
        assert_eq!(snapshot.rep_name(1), "Alice");
        assert_eq!(snapshot.rep_name(99), UNKNOWN_REP_NAME);
    }

    #[test]
    fn test_merge_only_touches_patched_fields() {
        let mut snapshot = Snapshot {
            queue: vec![1, 2],
            stepped_away: vec![2],
            is_setup_complete: true,
            ..Default::default()
        };
        let patch = SnapshotPatch {
            queue: Some(vec![2, 1]),
            ..Default::default()
        };

        snapshot.merge(&patch);

        assert_eq!(snapshot.queue, vec![2, 1]);
        assert_eq!(snapshot.stepped_away, vec![2]);
        assert!(snapshot.is_setup_complete);
    }

    #[test]
    fn test_patch_field_values_use_document_names() {
        let patch = SnapshotPatch {
            stepped_away: Some(vec![3]),
            is_setup_complete: Some(true),
            ..Default::default()
        };

        let values = patch.to_field_values().unwrap();
        assert_eq!(
            values,
            vec![
                (fields::STEPPED_AWAY, json!([3])),
                (fields::IS_SETUP_COMPLETE, json!(true)),
            ]
        );
        assert_eq!(patch.changed_fields(), vec!["steppedAway", "isSetupComplete"]);
        assert!(SnapshotPatch::default().is_empty());
    }

    #[test]
    fn test_invariant_violations_detected() {
        let snapshot = Snapshot {
            queue: vec![1, 2, 1],
            stepped_away: vec![3],
            with_customer: vec![2, 4],
            ..Default::default()
        };

        assert_eq!(
            snapshot.invariant_violations(),
            vec![
                InvariantViolation::DuplicateInQueue(1),
                InvariantViolation::SteppedAwayNotCheckedIn(3),
                InvariantViolation::WithCustomerNotCheckedIn(4),
            ]
        );
        assert!(Snapshot::default().invariant_violations().is_empty());
    }
}
