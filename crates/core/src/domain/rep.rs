// Rep Domain Model

use serde::{Deserialize, Serialize};

use super::error::{DomainError, Result};

/// Rep identifier.
///
/// Sequential (1..=n) for reps created at setup, epoch-millisecond based for
/// reps added later.
pub type RepId = i64;

/// Name captured in history when an event refers to a rep missing from the roster
pub const UNKNOWN_REP_NAME: &str = "Unknown";

/// A sales rep on the floor
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rep {
    pub id: RepId,
    pub name: String,
    pub avatar: char,
}

impl Rep {
    /// Create a rep from free-text input.
    ///
    /// The name is trimmed and must not be empty afterwards. The avatar is the
    /// first character of the trimmed name, uppercased.
    pub fn new(id: RepId, name: &str) -> Result<Self> {
        let name = name.trim();
        let first = name.chars().next().ok_or(DomainError::EmptyName)?;
        let avatar = first.to_uppercase().next().unwrap_or(first);

        Ok(Self {
            id,
            name: name.to_string(),
            avatar,
        })
    }

    /// Build the setup roster: blank names are dropped, ids are assigned 1..=n
    pub fn roster(names: &[String]) -> Result<Vec<Rep>> {
        let reps: Vec<Rep> = names
            .iter()
            .filter(|name| !name.trim().is_empty())
            .enumerate()
            .map(|(index, name)| Rep::new(index as RepId + 1, name))
            .collect::<Result<_>>()?;

        if reps.is_empty() {
            return Err(DomainError::EmptyRoster);
        }
        Ok(reps)
    }

    /// Id for a rep added after setup.
    ///
    /// Time-based, but never collides with an existing id even when several
    /// reps are added within the same millisecond.
    pub fn next_id(existing: &[Rep], now_millis: i64) -> RepId {
        let max_existing = existing.iter().map(|r| r.id).max().unwrap_or(0);
        now_millis.max(max_existing + 1)
    }
}
