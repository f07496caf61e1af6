//! In-memory player session registry.
//!
//! Tracks one record per active player id. Each record carries a generation
//! (distinguishes a re-created id from the removed one) and per-field event
//! counters (let late command results detect that an event already updated
//! the same fields). Ids removed locally stay fenced until the player's
//! `Removed` acknowledgement arrives, so trailing events of the old session
//! never reach a session re-created under the same id.

use std::collections::HashMap;

use media_session_types::{EventKind, Placement, PlaybackState, SessionPhase, SessionSnapshot};

use crate::error::SessionError;

pub(crate) const INITIAL_STATUS: &str = "Initializing...";

/// In-memory representation of a player session.
#[derive(Clone, Debug)]
pub(crate) struct SessionRecord {
    pub id: String,
    pub source_url: String,
    pub placement: Placement,
    pub phase: SessionPhase,
    pub state: PlaybackState,
    pub status: String,
    /// Registry-unique number assigned on reservation.
    pub generation: u64,
    /// Bumped by events that change play/pause state.
    pub playback_seq: u64,
    /// Bumped by events that move the position.
    pub time_seq: u64,
}

impl SessionRecord {
    /// Record that an event of `kind` is about to be applied.
    pub fn note_event(&mut self, kind: EventKind) {
        match kind {
            EventKind::Play | EventKind::Pause | EventKind::Ended => self.playback_seq += 1,
            EventKind::TimeUpdated | EventKind::Seek => self.time_seq += 1,
            _ => {}
        }
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            id: self.id.clone(),
            source_url: self.source_url.clone(),
            placement: self.placement.clone(),
            phase: self.phase,
            state: self.state.clone(),
            status: self.status.clone(),
        }
    }
}

/// Position of a record at the moment a command was dispatched.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct Ticket {
    pub generation: u64,
    pub playback_seq: u64,
    pub time_seq: u64,
}

/// How strictly a command result must match the record it was issued against.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Freshness {
    /// Same session instance; events in between are fine.
    SameSession,
    /// No play/pause/ended event applied since dispatch.
    NoPlaybackEventSince,
    /// No time update or seek event applied since dispatch.
    NoTimeEventSince,
}

#[derive(Default)]
pub(crate) struct SessionRegistry {
    by_id: HashMap<String, SessionRecord>,
    next_generation: u64,
    /// `Removed` acknowledgements still owed by the player, per id.
    pending_removals: HashMap<String, u32>,
}

impl SessionRegistry {
    /// Reserve `id` for a new session in the `Creating` phase.
    ///
    /// Fails with `CreationError` when the id is already active.
    pub fn reserve(
        &mut self,
        id: &str,
        source_url: &str,
        placement: Placement,
        state: PlaybackState,
    ) -> Result<u64, SessionError> {
        if self.by_id.contains_key(id) {
            return Err(SessionError::CreationError(format!(
                "player id already in use: {id}"
            )));
        }
        self.next_generation += 1;
        let generation = self.next_generation;
        self.by_id.insert(
            id.to_string(),
            SessionRecord {
                id: id.to_string(),
                source_url: source_url.to_string(),
                placement,
                phase: SessionPhase::Creating,
                state,
                status: INITIAL_STATUS.to_string(),
                generation,
                playback_seq: 0,
                time_seq: 0,
            },
        );
        Ok(generation)
    }

    pub fn get(&self, id: &str) -> Option<&SessionRecord> {
        self.by_id.get(id)
    }

    pub fn get_mut(&mut self, id: &str) -> Option<&mut SessionRecord> {
        self.by_id.get_mut(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.by_id.contains_key(id)
    }

    /// Capture the dispatch ticket for `id`.
    pub fn ticket(&self, id: &str) -> Result<Ticket, SessionError> {
        let record = self.by_id.get(id).ok_or_else(|| SessionError::not_found(id))?;
        Ok(Ticket {
            generation: record.generation,
            playback_seq: record.playback_seq,
            time_seq: record.time_seq,
        })
    }

    /// Return the record only if it still matches `ticket` under `freshness`.
    pub fn fresh_mut(
        &mut self,
        id: &str,
        ticket: Ticket,
        freshness: Freshness,
    ) -> Option<&mut SessionRecord> {
        let record = self.by_id.get_mut(id)?;
        if record.generation != ticket.generation {
            return None;
        }
        let stale = match freshness {
            Freshness::SameSession => false,
            Freshness::NoPlaybackEventSince => record.playback_seq != ticket.playback_seq,
            Freshness::NoTimeEventSince => record.time_seq != ticket.time_seq,
        };
        if stale { None } else { Some(record) }
    }

    /// Remove the record for `id` if it belongs to `generation`.
    pub fn remove_generation(&mut self, id: &str, generation: u64) -> Option<SessionRecord> {
        if self.by_id.get(id)?.generation != generation {
            return None;
        }
        self.by_id.remove(id)
    }

    pub fn remove(&mut self, id: &str) -> Option<SessionRecord> {
        self.by_id.remove(id)
    }

    /// Ids of all active sessions, sorted.
    pub fn ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.by_id.keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Expect one `Removed` acknowledgement for `id`.
    pub fn expect_removed(&mut self, id: &str) {
        *self.pending_removals.entry(id.to_string()).or_default() += 1;
    }

    /// Consume (or withdraw) one expected acknowledgement. Returns `false`
    /// when none was owed.
    pub fn settle_removed(&mut self, id: &str) -> bool {
        let Some(count) = self.pending_removals.get_mut(id) else {
            return false;
        };
        *count -= 1;
        if *count == 0 {
            self.pending_removals.remove(id);
        }
        true
    }

    /// Events for `id` still belong to a removed session.
    pub fn is_fenced(&self, id: &str) -> bool {
        self.pending_removals.contains_key(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reserve(registry: &mut SessionRegistry, id: &str) -> Result<u64, SessionError> {
        registry.reserve(
            id,
            "https://example.com/a.mp4",
            Placement::default(),
            PlaybackState::default(),
        )
    }

    #[test]
    fn reserve_rejects_active_id() {
        let mut registry = SessionRegistry::default();
        reserve(&mut registry, "p1").unwrap();
        let err = reserve(&mut registry, "p1").unwrap_err();
        assert!(matches!(err, SessionError::CreationError(_)));
        assert_eq!(registry.ids(), vec!["p1".to_string()]);
    }

    #[test]
    fn reserve_after_remove_gets_new_generation() {
        let mut registry = SessionRegistry::default();
        let first = reserve(&mut registry, "p1").unwrap();
        registry.remove("p1").unwrap();
        let second = reserve(&mut registry, "p1").unwrap();
        assert_ne!(first, second);
        assert_eq!(registry.get("p1").unwrap().status, INITIAL_STATUS);
    }

    #[test]
    fn fresh_mut_rejects_stale_generation() {
        let mut registry = SessionRegistry::default();
        reserve(&mut registry, "p1").unwrap();
        let ticket = registry.ticket("p1").unwrap();
        registry.remove("p1");
        reserve(&mut registry, "p1").unwrap();
        assert!(registry
            .fresh_mut("p1", ticket, Freshness::SameSession)
            .is_none());
    }

    #[test]
    fn fresh_mut_honors_event_counters() {
        let mut registry = SessionRegistry::default();
        reserve(&mut registry, "p1").unwrap();
        let ticket = registry.ticket("p1").unwrap();
        registry.get_mut("p1").unwrap().note_event(EventKind::Pause);
        assert!(registry
            .fresh_mut("p1", ticket, Freshness::NoPlaybackEventSince)
            .is_none());
        assert!(registry
            .fresh_mut("p1", ticket, Freshness::NoTimeEventSince)
            .is_some());
        assert!(registry
            .fresh_mut("p1", ticket, Freshness::SameSession)
            .is_some());
    }

    #[test]
    fn informational_events_do_not_bump_counters() {
        let mut registry = SessionRegistry::default();
        reserve(&mut registry, "p1").unwrap();
        let before = registry.ticket("p1").unwrap();
        let record = registry.get_mut("p1").unwrap();
        record.note_event(EventKind::BackgroundPlayback);
        record.note_event(EventKind::FullScreen);
        assert_eq!(registry.ticket("p1").unwrap(), before);
    }

    #[test]
    fn remove_generation_keeps_newer_session() {
        let mut registry = SessionRegistry::default();
        let old = reserve(&mut registry, "p1").unwrap();
        registry.remove("p1");
        reserve(&mut registry, "p1").unwrap();
        assert!(registry.remove_generation("p1", old).is_none());
        assert!(registry.contains("p1"));
    }

    #[test]
    fn removal_fence_counts_each_acknowledgement() {
        let mut registry = SessionRegistry::default();
        registry.expect_removed("p1");
        registry.expect_removed("p1");
        assert!(registry.is_fenced("p1"));
        assert!(!registry.is_fenced("p2"));

        assert!(registry.settle_removed("p1"));
        assert!(registry.is_fenced("p1"));
        assert!(registry.settle_removed("p1"));
        assert!(!registry.is_fenced("p1"));
        assert!(!registry.settle_removed("p1"));
    }

    #[test]
    fn ticket_for_unknown_id_is_not_found() {
        let registry = SessionRegistry::default();
        assert_eq!(
            registry.ticket("ghost").unwrap_err(),
            SessionError::NotFound("ghost".to_string())
        );
    }
}
