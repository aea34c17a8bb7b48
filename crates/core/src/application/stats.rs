// Stats Aggregator - folds the history ledger into per-rep counts

use std::collections::HashMap;

use serde::Serialize;

use crate::application::rotation;
use crate::domain::{ActivityStatus, Rep, RepId, Snapshot};

/// One ranked stats row
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatsRow {
    /// 1-based
    pub rank: usize,
    pub rep: Rep,
    pub customer_events: usize,
    pub status: ActivityStatus,
}

/// Rank current reps by customer interaction events.
///
/// This is an event count, not a deduplicated number of customers: every
/// `took_customer` and every `finished_customer` event adds one. A customer
/// taken in rotation and then finished counts twice; one assigned through
/// `mark_with_customer` and then finished counts once for the finish only,
/// since `with_customer` events are not counted. Events of removed reps are
/// ignored. Ties keep roster order.
pub fn ranked(snapshot: &Snapshot) -> Vec<StatsRow> {
    let mut counts: HashMap<RepId, usize> = HashMap::new();
    for event in &snapshot.history {
        if event.action.is_customer_interaction() {
            *counts.entry(event.rep_id).or_insert(0) += 1;
        }
    }

    let mut rows: Vec<StatsRow> = snapshot
        .reps
        .iter()
        .map(|rep| StatsRow {
            rank: 0,
            rep: rep.clone(),
            customer_events: counts.get(&rep.id).copied().unwrap_or(0),
            status: rotation::rep_status(snapshot, rep.id).into(),
        })
        .collect();

    // Stable: equal counts keep roster order
    rows.sort_by(|a, b| b.customer_events.cmp(&a.customer_events));
    for (index, row) in rows.iter_mut().enumerate() {
        row.rank = index + 1;
    }
    rows
}
