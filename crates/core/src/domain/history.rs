// History Event Domain Model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::rep::RepId;

/// Event identifier (epoch ms, strictly increasing in creation order)
pub type EventId = i64;

/// State transition recorded in the ledger
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    CheckedIn,
    CheckedOut,
    TookCustomer,
    SteppedAway,
    Returned,
    WithCustomer,
    FinishedCustomer,
}

impl Action {
    /// Human-readable label for history listings
    pub fn label(&self) -> &'static str {
        match self {
            Action::CheckedIn => "Checked in",
            Action::CheckedOut => "Checked out",
            Action::TookCustomer => "Took customer",
            Action::SteppedAway => "Stepped away",
            Action::Returned => "Returned",
            Action::WithCustomer => "Helping customer",
            Action::FinishedCustomer => "Finished with customer",
        }
    }

    /// Whether the stats aggregator counts this action
    pub fn is_customer_interaction(&self) -> bool {
        matches!(self, Action::TookCustomer | Action::FinishedCustomer)
    }
}

impl std::fmt::Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Action::CheckedIn => write!(f, "checked_in"),
            Action::CheckedOut => write!(f, "checked_out"),
            Action::TookCustomer => write!(f, "took_customer"),
            Action::SteppedAway => write!(f, "stepped_away"),
            Action::Returned => write!(f, "returned"),
            Action::WithCustomer => write!(f, "with_customer"),
            Action::FinishedCustomer => write!(f, "finished_customer"),
        }
    }
}

/// Immutable ledger entry.
///
/// `rep_name` is a snapshot of the name at event time so the entry survives
/// removal of the rep.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEvent {
    pub id: EventId,
    pub rep_id: RepId,
    pub rep_name: String,
    pub action: Action,
    pub timestamp: DateTime<Utc>,
}
