// Availability State Machine - pure command evaluation
//
// (Snapshot, Command, now) -> Decision. No I/O; persistence happens in the
// sync adapter.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::application::{ledger, rotation};
use crate::domain::{Action, DomainError, HistoryEvent, Rep, RepId, Snapshot, SnapshotPatch};

/// Commands a caller can issue against the rotation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum Command {
    CompleteSetup { names: Vec<String> },
    AddRep { name: String },
    RemoveRep { rep_id: RepId },
    CheckIn { rep_id: RepId },
    CheckOut { rep_id: RepId },
    TakeCustomer { rep_id: RepId },
    MarkWithCustomer { rep_id: RepId },
    FinishedWithCustomer { rep_id: RepId },
    ToggleStepAway { rep_id: RepId },
    ClearDay,
    FullReset,
}

impl Command {
    pub fn name(&self) -> &'static str {
        match self {
            Command::CompleteSetup { .. } => "complete_setup",
            Command::AddRep { .. } => "add_rep",
            Command::RemoveRep { .. } => "remove_rep",
            Command::CheckIn { .. } => "check_in",
            Command::CheckOut { .. } => "check_out",
            Command::TakeCustomer { .. } => "take_customer",
            Command::MarkWithCustomer { .. } => "mark_with_customer",
            Command::FinishedWithCustomer { .. } => "finished_with_customer",
            Command::ToggleStepAway { .. } => "toggle_step_away",
            Command::ClearDay => "clear_day",
            Command::FullReset => "full_reset",
        }
    }

    pub fn rep_id(&self) -> Option<RepId> {
        match self {
            Command::RemoveRep { rep_id }
            | Command::CheckIn { rep_id }
            | Command::CheckOut { rep_id }
            | Command::TakeCustomer { rep_id }
            | Command::MarkWithCustomer { rep_id }
            | Command::FinishedWithCustomer { rep_id }
            | Command::ToggleStepAway { rep_id } => Some(*rep_id),
            _ => None,
        }
    }
}

/// Why a command validated but changed nothing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum NoOpReason {
    UnknownRep { rep_id: RepId },
    AlreadyCheckedIn { rep_id: RepId },
    NotCheckedIn { rep_id: RepId },
    NotDesignated { rep_id: RepId, designated: Option<RepId> },
    AlreadyWithCustomer { rep_id: RepId },
    NotWithCustomer { rep_id: RepId },
    EmptyName,
    EmptyRoster,
}

impl std::fmt::Display for NoOpReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NoOpReason::UnknownRep { rep_id } => write!(f, "rep {} is not on the roster", rep_id),
            NoOpReason::AlreadyCheckedIn { rep_id } => {
                write!(f, "rep {} is already checked in", rep_id)
            }
            NoOpReason::NotCheckedIn { rep_id } => write!(f, "rep {} is not checked in", rep_id),
            NoOpReason::NotDesignated {
                rep_id,
                designated: Some(up),
            } => write!(f, "rep {} is not up (rep {} is)", rep_id, up),
            NoOpReason::NotDesignated {
                rep_id,
                designated: None,
            } => write!(f, "rep {} is not up (nobody is available)", rep_id),
            NoOpReason::AlreadyWithCustomer { rep_id } => {
                write!(f, "rep {} is already with a customer", rep_id)
            }
            NoOpReason::NotWithCustomer { rep_id } => {
                write!(f, "rep {} is not with a customer", rep_id)
            }
            NoOpReason::EmptyName => write!(f, "rep name is empty"),
            NoOpReason::EmptyRoster => write!(f, "no rep names given"),
        }
    }
}

impl From<DomainError> for NoOpReason {
    fn from(err: DomainError) -> Self {
        match err {
            DomainError::EmptyName => NoOpReason::EmptyName,
            DomainError::EmptyRoster => NoOpReason::EmptyRoster,
        }
    }
}

/// Changed fields plus the ledger entry describing them
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Change {
    pub patch: SnapshotPatch,
    pub event: Option<HistoryEvent>,
}

/// Result of evaluating a command against a snapshot
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    /// Persist these fields
    Apply(Change),
    /// Discard the whole document, roster and setup flag included
    Reset,
    NoOp(NoOpReason),
}

/// Evaluate `command` against `snapshot` at time `now`
pub fn decide(snapshot: &Snapshot, command: &Command, now: DateTime<Utc>) -> Decision {
    match command {
        Command::CompleteSetup { names } => complete_setup(names),
        Command::AddRep { name } => add_rep(snapshot, name, now),
        Command::RemoveRep { rep_id } => remove_rep(snapshot, *rep_id),
        Command::CheckIn { rep_id } => check_in(snapshot, *rep_id, now),
        Command::CheckOut { rep_id } => check_out(snapshot, *rep_id, now),
        Command::TakeCustomer { rep_id } => take_customer(snapshot, *rep_id, now),
        Command::MarkWithCustomer { rep_id } => mark_with_customer(snapshot, *rep_id, now),
        Command::FinishedWithCustomer { rep_id } => finished_with_customer(snapshot, *rep_id, now),
        Command::ToggleStepAway { rep_id } => toggle_step_away(snapshot, *rep_id, now),
        Command::ClearDay => clear_day(),
        Command::FullReset => Decision::Reset,
    }
}

/// Apply a decision locally (what the store will hold after the write)
pub fn apply(snapshot: &Snapshot, decision: &Decision) -> Snapshot {
    match decision {
        Decision::Apply(change) => {
            let mut next = snapshot.clone();
            next.merge(&change.patch);
            next
        }
        Decision::Reset => Snapshot::default(),
        Decision::NoOp(_) => snapshot.clone(),
    }
}

fn without(ids: &[RepId], rep_id: RepId) -> Vec<RepId> {
    ids.iter().copied().filter(|id| *id != rep_id).collect()
}

fn with(ids: &[RepId], rep_id: RepId) -> Vec<RepId> {
    let mut next = without(ids, rep_id);
    next.push(rep_id);
    next
}

fn require_rep(snapshot: &Snapshot, rep_id: RepId) -> Result<(), NoOpReason> {
    match snapshot.rep(rep_id) {
        Some(_) => Ok(()),
        None => Err(NoOpReason::UnknownRep { rep_id }),
    }
}

/// Wrap a patch with its history event
fn record(
    snapshot: &Snapshot,
    rep_id: RepId,
    action: Action,
    now: DateTime<Utc>,
    mut patch: SnapshotPatch,
) -> Decision {
    let event = ledger::event_for(snapshot, rep_id, action, now);
    patch.history = Some(ledger::prepend(&snapshot.history, event.clone()));
    Decision::Apply(Change {
        patch,
        event: Some(event),
    })
}

fn complete_setup(names: &[String]) -> Decision {
    let reps = match Rep::roster(names) {
        Ok(reps) => reps,
        Err(err) => return Decision::NoOp(err.into()),
    };

    Decision::Apply(Change {
        patch: SnapshotPatch {
            reps: Some(reps),
            queue: Some(Vec::new()),
            stepped_away: Some(Vec::new()),
            with_customer: Some(Vec::new()),
            history: Some(Vec::new()),
            is_setup_complete: Some(true),
        },
        event: None,
    })
}

fn add_rep(snapshot: &Snapshot, name: &str, now: DateTime<Utc>) -> Decision {
    let id = Rep::next_id(&snapshot.reps, now.timestamp_millis());
    let rep = match Rep::new(id, name) {
        Ok(rep) => rep,
        Err(err) => return Decision::NoOp(err.into()),
    };

    let mut reps = snapshot.reps.clone();
    reps.push(rep);
    Decision::Apply(Change {
        patch: SnapshotPatch {
            reps: Some(reps),
            ..Default::default()
        },
        event: None,
    })
}

fn remove_rep(snapshot: &Snapshot, rep_id: RepId) -> Decision {
    if let Err(reason) = require_rep(snapshot, rep_id) {
        return Decision::NoOp(reason);
    }

    Decision::Apply(Change {
        patch: SnapshotPatch {
            reps: Some(
                snapshot
                    .reps
                    .iter()
                    .filter(|r| r.id != rep_id)
                    .cloned()
                    .collect(),
            ),
            queue: Some(without(&snapshot.queue, rep_id)),
            stepped_away: Some(without(&snapshot.stepped_away, rep_id)),
            with_customer: Some(without(&snapshot.with_customer, rep_id)),
            ..Default::default()
        },
        event: None,
    })
}

fn check_in(snapshot: &Snapshot, rep_id: RepId, now: DateTime<Utc>) -> Decision {
    if let Err(reason) = require_rep(snapshot, rep_id) {
        return Decision::NoOp(reason);
    }
    if snapshot.is_checked_in(rep_id) {
        return Decision::NoOp(NoOpReason::AlreadyCheckedIn { rep_id });
    }

    let mut queue = snapshot.queue.clone();
    queue.push(rep_id);
    record(
        snapshot,
        rep_id,
        Action::CheckedIn,
        now,
        SnapshotPatch {
            queue: Some(queue),
            ..Default::default()
        },
    )
}

fn check_out(snapshot: &Snapshot, rep_id: RepId, now: DateTime<Utc>) -> Decision {
    // A second check-out finds nothing to prune and must not log again.
    let member = snapshot.is_checked_in(rep_id)
        || snapshot.is_stepped_away(rep_id)
        || snapshot.is_with_customer(rep_id);
    if !member {
        return Decision::NoOp(NoOpReason::NotCheckedIn { rep_id });
    }

    record(
        snapshot,
        rep_id,
        Action::CheckedOut,
        now,
        SnapshotPatch {
            queue: Some(without(&snapshot.queue, rep_id)),
            stepped_away: Some(without(&snapshot.stepped_away, rep_id)),
            with_customer: Some(without(&snapshot.with_customer, rep_id)),
            ..Default::default()
        },
    )
}

fn take_customer(snapshot: &Snapshot, rep_id: RepId, now: DateTime<Utc>) -> Decision {
    let designated = rotation::designated_rep(snapshot);
    if designated != Some(rep_id) {
        return Decision::NoOp(NoOpReason::NotDesignated { rep_id, designated });
    }

    record(
        snapshot,
        rep_id,
        Action::TookCustomer,
        now,
        SnapshotPatch {
            with_customer: Some(with(&snapshot.with_customer, rep_id)),
            ..Default::default()
        },
    )
}

fn mark_with_customer(snapshot: &Snapshot, rep_id: RepId, now: DateTime<Utc>) -> Decision {
    if let Err(reason) = require_rep(snapshot, rep_id) {
        return Decision::NoOp(reason);
    }
    if snapshot.is_with_customer(rep_id) {
        return Decision::NoOp(NoOpReason::AlreadyWithCustomer { rep_id });
    }

    let mut patch = SnapshotPatch {
        with_customer: Some(with(&snapshot.with_customer, rep_id)),
        stepped_away: Some(without(&snapshot.stepped_away, rep_id)),
        ..Default::default()
    };
    // Busy reps must be in the rotation; an off-shift rep is enrolled at the tail.
    if !snapshot.is_checked_in(rep_id) {
        let mut queue = snapshot.queue.clone();
        queue.push(rep_id);
        patch.queue = Some(queue);
    }

    record(snapshot, rep_id, Action::WithCustomer, now, patch)
}

fn finished_with_customer(snapshot: &Snapshot, rep_id: RepId, now: DateTime<Utc>) -> Decision {
    if !snapshot.is_with_customer(rep_id) {
        return Decision::NoOp(NoOpReason::NotWithCustomer { rep_id });
    }

    record(
        snapshot,
        rep_id,
        Action::FinishedCustomer,
        now,
        SnapshotPatch {
            with_customer: Some(without(&snapshot.with_customer, rep_id)),
            // Rotation reset: back of the line regardless of prior position
            queue: Some(with(&snapshot.queue, rep_id)),
            ..Default::default()
        },
    )
}

fn toggle_step_away(snapshot: &Snapshot, rep_id: RepId, now: DateTime<Utc>) -> Decision {
    if !snapshot.is_checked_in(rep_id) {
        return Decision::NoOp(NoOpReason::NotCheckedIn { rep_id });
    }

    let (stepped_away, action) = if snapshot.is_stepped_away(rep_id) {
        (without(&snapshot.stepped_away, rep_id), Action::Returned)
    } else {
        (with(&snapshot.stepped_away, rep_id), Action::SteppedAway)
    };

    record(
        snapshot,
        rep_id,
        action,
        now,
        SnapshotPatch {
            stepped_away: Some(stepped_away),
            ..Default::default()
        },
    )
}

fn clear_day() -> Decision {
    Decision::Apply(Change {
        patch: SnapshotPatch {
            queue: Some(Vec::new()),
            stepped_away: Some(Vec::new()),
            with_customer: Some(Vec::new()),
            history: Some(Vec::new()),
            ..Default::default()
        },
        event: None,
    })
}
