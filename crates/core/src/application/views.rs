// Read-only views for the presentation layer

use serde::Serialize;

use crate::application::{ledger, rotation, stats};
use crate::domain::{HistoryEvent, Rep, RepId, RepStatus, Snapshot};

pub use stats::StatsRow;

/// A rep waiting in the active queue
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QueueEntry {
    /// 1-based
    pub position: usize,
    pub rep: Rep,
    pub designated: bool,
}

/// The queue screen: active queue plus the busy and away sections
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ActiveQueueView {
    pub entries: Vec<QueueEntry>,
    pub with_customer: Vec<Rep>,
    pub stepped_away: Vec<Rep>,
}

impl ActiveQueueView {
    pub fn designated(&self) -> Option<&Rep> {
        self.entries.iter().find(|e| e.designated).map(|e| &e.rep)
    }

    /// Nobody checked in at all
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty() && self.with_customer.is_empty() && self.stepped_away.is_empty()
    }
}

/// A roster row with derived status
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RosterEntry {
    pub rep: Rep,
    pub status: RepStatus,
    pub position: Option<usize>,
}

fn reps_for(snapshot: &Snapshot, ids: &[RepId]) -> Vec<Rep> {
    ids.iter().filter_map(|id| snapshot.rep(*id)).cloned().collect()
}

pub fn active_queue_view(snapshot: &Snapshot) -> ActiveQueueView {
    let entries = rotation::active_queue(snapshot)
        .into_iter()
        .filter_map(|id| snapshot.rep(id).cloned())
        .enumerate()
        .map(|(index, rep)| QueueEntry {
            position: index + 1,
            rep,
            designated: index == 0,
        })
        .collect();

    ActiveQueueView {
        entries,
        with_customer: reps_for(snapshot, &snapshot.with_customer),
        stepped_away: reps_for(snapshot, &snapshot.stepped_away),
    }
}

pub fn roster_view(snapshot: &Snapshot) -> Vec<RosterEntry> {
    snapshot
        .reps
        .iter()
        .map(|rep| RosterEntry {
            rep: rep.clone(),
            status: rotation::rep_status(snapshot, rep.id),
            position: rotation::active_position(snapshot, rep.id),
        })
        .collect()
}

pub fn stats_view(snapshot: &Snapshot) -> Vec<StatsRow> {
    stats::ranked(snapshot)
}

pub fn history_view(snapshot: &Snapshot, limit: usize) -> Vec<HistoryEvent> {
    ledger::recent(&snapshot.history, limit).to_vec()
}
