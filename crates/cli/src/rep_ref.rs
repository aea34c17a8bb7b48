//! `<rep>` arguments: a numeric id or a case-insensitive name.
//!
//! Roster ids win; digit-only input that is no current id is tried as a name.

use anyhow::{bail, Result};
use upnext_core::domain::{RepId, Snapshot};

pub fn resolve_rep(snapshot: &Snapshot, input: &str) -> Result<RepId> {
    let input = input.trim();

    let parsed = input.parse::<RepId>().ok();
    if let Some(id) = parsed {
        if snapshot.rep(id).is_some() {
            return Ok(id);
        }
    }

    let matches: Vec<RepId> = snapshot
        .reps
        .iter()
        .filter(|rep| rep.name.eq_ignore_ascii_case(input))
        .map(|rep| rep.id)
        .collect();

    match (matches.as_slice(), parsed) {
        ([id], _) => Ok(*id),
        // Ids of removed reps go through so the engine reports the no-op
        ([], Some(id)) => Ok(id),
        ([], None) => bail!("No rep named {:?}; see `upnext roster`", input),
        (ids, _) => bail!(
            "{} reps are named {:?}; use an id instead ({:?})",
            ids.len(),
            input,
            ids
        ),
    }
}
