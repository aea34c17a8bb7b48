// History Ledger - append-only, newest first

use chrono::{DateTime, Utc};

use crate::domain::{Action, EventId, HistoryEvent, RepId, Snapshot};

/// Next event id: the clock's millisecond, bumped past the newest existing id.
///
/// Ids stay strictly increasing in generation order even when several events
/// are created within one millisecond or the clock steps backwards.
pub fn next_event_id(history: &[HistoryEvent], now: DateTime<Utc>) -> EventId {
    let newest = history.iter().map(|e| e.id).max();
    match newest {
        Some(id) => now.timestamp_millis().max(id + 1),
        None => now.timestamp_millis(),
    }
}

/// Build the event for `action`, capturing the rep's current name
pub fn event_for(snapshot: &Snapshot, rep_id: RepId, action: Action, now: DateTime<Utc>) -> HistoryEvent {
    HistoryEvent {
        id: next_event_id(&snapshot.history, now),
        rep_id,
        rep_name: snapshot.rep_name(rep_id),
        action,
        timestamp: now,
    }
}

/// New ledger with `event` prepended; existing entries are untouched
pub fn prepend(history: &[HistoryEvent], event: HistoryEvent) -> Vec<HistoryEvent> {
    let mut next = Vec::with_capacity(history.len() + 1);
    next.push(event);
    next.extend_from_slice(history);
    next
}

/// The latest `limit` events, most recent first
pub fn recent(history: &[HistoryEvent], limit: usize) -> &[HistoryEvent] {
    &history[..history.len().min(limit)]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Rep;

    fn at(millis: i64) -> DateTime<Utc> {
        DateTime::from_timestamp_millis(millis).unwrap()
    }

    fn event(id: EventId) -> HistoryEvent {
        HistoryEvent {
            id,
            rep_id: 1,
            rep_name: "Alice".to_string(),
            action: Action::CheckedIn,
            timestamp: at(id),
        }
    }

    #[test]
    fn test_next_event_id_uses_clock_when_ahead() {
        assert_eq!(next_event_id(&[], at(5_000)), 5_000);
        assert_eq!(next_event_id(&[event(4_000)], at(5_000)), 5_000);
    }

    #[test]
    fn test_next_event_id_sequences_within_same_instant() {
        let history = vec![event(5_000)];
        assert_eq!(next_event_id(&history, at(5_000)), 5_001);

        // Clock went backwards
        assert_eq!(next_event_id(&history, at(1_000)), 5_001);
    }

    #[test]
    fn test_event_for_captures_name_at_event_time() {
        let snapshot = Snapshot {
            reps: vec![Rep::new(1, "Alice").unwrap()],
            ..Default::default()
        };

        let known = event_for(&snapshot, 1, Action::SteppedAway, at(10));
        let unknown = event_for(&snapshot, 9, Action::CheckedIn, at(10));

        assert_eq!(known.rep_name, "Alice");
        assert_eq!(unknown.rep_name, "Unknown");
    }

    #[test]
    fn test_prepend_and_recent() {
        let history = vec![event(2), event(1)];
        let history = prepend(&history, event(3));

        let ids: Vec<EventId> = history.iter().map(|e| e.id).collect();
        assert_eq!(ids, vec![3, 2, 1]);
        assert_eq!(recent(&history, 2).len(), 2);
        assert_eq!(recent(&history, 2)[0].id, 3);
        assert_eq!(recent(&history, 50).len(), 3);
    }
}
