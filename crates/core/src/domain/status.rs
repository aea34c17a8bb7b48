// Derived Rep Status (never stored)

use serde::{Deserialize, Serialize};

/// Availability of a rep, derived from the membership fields of a snapshot.
///
/// Exactly one applies at any instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RepStatus {
    NotCheckedIn,
    Queued,
    UpNow,
    SteppedAway,
    WithCustomer,
}

impl std::fmt::Display for RepStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RepStatus::NotCheckedIn => write!(f, "NOT_CHECKED_IN"),
            RepStatus::Queued => write!(f, "QUEUED"),
            RepStatus::UpNow => write!(f, "UP_NOW"),
            RepStatus::SteppedAway => write!(f, "STEPPED_AWAY"),
            RepStatus::WithCustomer => write!(f, "WITH_CUSTOMER"),
        }
    }
}

/// Coarse status shown next to stats rows
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityStatus {
    Busy,
    Active,
    Away,
    Off,
}

impl From<RepStatus> for ActivityStatus {
    fn from(status: RepStatus) -> Self {
        match status {
            RepStatus::WithCustomer => ActivityStatus::Busy,
            RepStatus::SteppedAway => ActivityStatus::Away,
            RepStatus::Queued | RepStatus::UpNow => ActivityStatus::Active,
            RepStatus::NotCheckedIn => ActivityStatus::Off,
        }
    }
}

impl std::fmt::Display for ActivityStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ActivityStatus::Busy => write!(f, "busy"),
            ActivityStatus::Active => write!(f, "active"),
            ActivityStatus::Away => write!(f, "away"),
            ActivityStatus::Off => write!(f, "off"),
        }
    }
}
