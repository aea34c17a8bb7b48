// Rotation Selector - derived, never stored

use crate::domain::{RepId, RepStatus, Snapshot};

/// Rotation sequence minus stepped-away and busy reps, order preserved
pub fn active_queue(snapshot: &Snapshot) -> Vec<RepId> {
    snapshot
        .queue
        .iter()
        .copied()
        .filter(|id| !snapshot.is_stepped_away(*id) && !snapshot.is_with_customer(*id))
        .collect()
}

/// The rep who is "up now": head of the active queue
pub fn designated_rep(snapshot: &Snapshot) -> Option<RepId> {
    active_queue(snapshot).first().copied()
}

/// 1-based position in the active queue
pub fn active_position(snapshot: &Snapshot, rep_id: RepId) -> Option<usize> {
    active_queue(snapshot)
        .iter()
        .position(|id| *id == rep_id)
        .map(|index| index + 1)
}

/// Derive a rep's status from the membership fields.
///
/// Busy wins over stepped away: a rep can sit in both sets if they stepped
/// away while serving.
pub fn rep_status(snapshot: &Snapshot, rep_id: RepId) -> RepStatus {
    if !snapshot.is_checked_in(rep_id) {
        RepStatus::NotCheckedIn
    } else if snapshot.is_with_customer(rep_id) {
        RepStatus::WithCustomer
    } else if snapshot.is_stepped_away(rep_id) {
        RepStatus::SteppedAway
    } else if designated_rep(snapshot) == Some(rep_id) {
        RepStatus::UpNow
    } else {
        RepStatus::Queued
    }
}
