//! Player session controller.
//!
//! Owns player identities, forwards control commands to the external player
//! and mirrors its state from pushed events. Events always take precedence
//! over optimistic updates made from command results.

use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use uuid::Uuid;

use media_session_types::{
    CommandOutcome, CreateOptions, EventKind, Placement, PlaybackState, PlayerCommand,
    PlayerEvent, PlayerInfo, SessionPhase, SessionSnapshot,
};

use crate::config::PlaybackDefaults;
use crate::error::SessionError;
use crate::events::{SessionUpdate, UpdateBus};
use crate::listeners::{ListenerHandle, ListenerRegistry, SubscriptionGuard, invoke_all};
use crate::registry::{Freshness, INITIAL_STATUS, SessionRecord, SessionRegistry, Ticket};
use crate::status::{apply_event, format_info, set_current_time, set_duration};
use crate::transport::PlayerTransport;

/// Generate a fresh client-side player id (`player-<uuid>`).
pub fn generate_player_id() -> String {
    format!("player-{}", Uuid::new_v4())
}

/// Controller for player sessions behind one external transport.
///
/// Cheap to clone; clones share the same sessions and listeners.
#[derive(Clone)]
pub struct PlayerSessionController {
    inner: Arc<Inner>,
}

struct Inner {
    transport: Arc<dyn PlayerTransport>,
    sessions: Mutex<SessionRegistry>,
    listeners: Arc<Mutex<ListenerRegistry>>,
    updates: UpdateBus,
    defaults: PlaybackDefaults,
}

impl PlayerSessionController {
    pub fn new(transport: Arc<dyn PlayerTransport>) -> Self {
        Self::with_defaults(transport, PlaybackDefaults::default())
    }

    /// Build a controller whose new sessions start from `defaults`.
    pub fn with_defaults(transport: Arc<dyn PlayerTransport>, defaults: PlaybackDefaults) -> Self {
        Self {
            inner: Arc::new(Inner {
                transport,
                sessions: Mutex::new(SessionRegistry::default()),
                listeners: Arc::new(Mutex::new(ListenerRegistry::default())),
                updates: UpdateBus::new(),
                defaults,
            }),
        }
    }

    // Lock order: sessions before listeners.
    fn sessions(&self) -> MutexGuard<'_, SessionRegistry> {
        self.inner
            .sessions
            .lock()
            .unwrap_or_else(|err| err.into_inner())
    }

    fn listeners(&self) -> MutexGuard<'_, ListenerRegistry> {
        self.inner
            .listeners
            .lock()
            .unwrap_or_else(|err| err.into_inner())
    }

    /// Create a player surface bound to `id`.
    ///
    /// The session is registered before the command is sent so events the
    /// player emits while creating (an immediate `Ready`) are not lost.
    pub async fn create(
        &self,
        id: &str,
        source_url: &str,
        placement: Placement,
        options: CreateOptions,
    ) -> Result<(), SessionError> {
        if id.trim().is_empty() {
            return Err(SessionError::CreationError(
                "player id must not be empty".to_string(),
            ));
        }
        validate_source(source_url)?;
        let mut state = PlaybackState {
            volume: self.inner.defaults.volume,
            rate: self.inner.defaults.rate,
            ..PlaybackState::default()
        };
        if let Some(rate) = options.extra.rate {
            validate_rate(rate)?;
            state.rate = rate;
        }

        let generation = self
            .sessions()
            .reserve(id, source_url, placement.clone(), state)?;
        tracing::debug!(player_id = %id, url = %source_url, "creating player");

        let command = PlayerCommand::Create {
            player_id: id.to_string(),
            url: source_url.to_string(),
            placement,
            options,
        };
        let failure = match self.inner.transport.send(command).await {
            Ok(outcome) if outcome.result => None,
            Ok(outcome) => Some(
                outcome
                    .message
                    .unwrap_or_else(|| "player refused create".to_string()),
            ),
            Err(err) => Some(err.to_string()),
        };

        if let Some(message) = failure {
            self.teardown(id, generation);
            tracing::warn!(player_id = %id, error = %message, "player creation failed");
            return Err(SessionError::CreationError(message));
        }

        let status = {
            let mut sessions = self.sessions();
            let Some(record) = sessions
                .get_mut(id)
                .filter(|record| record.generation == generation)
            else {
                tracing::warn!(player_id = %id, "player removed while creating");
                return Err(SessionError::CreationError(format!(
                    "player removed during creation: {id}"
                )));
            };
            if record.status == INITIAL_STATUS {
                record.status = "Created".to_string();
                Some(record.status.clone())
            } else {
                None
            }
        };
        if let Some(status) = status {
            self.inner.updates.status_changed(id, &status);
        }
        tracing::info!(player_id = %id, "player created");
        Ok(())
    }

    /// Start playback. A no-op success when the cache already says playing.
    pub async fn play(&self, id: &str) -> Result<(), SessionError> {
        if self.cached(id, |record| record.state.is_playing)? {
            tracing::debug!(player_id = %id, "play ignored: already playing");
            return Ok(());
        }
        let (_, ticket) = self
            .dispatch(id, PlayerCommand::Play {
                player_id: id.to_string(),
            })
            .await?;
        self.apply_result(id, ticket, Freshness::NoPlaybackEventSince, |record| {
            record.state.is_playing = true;
            record.state.ended = false;
            record.phase = SessionPhase::Playing;
            None
        });
        Ok(())
    }

    /// Pause playback. A no-op success when the cache already says paused.
    pub async fn pause(&self, id: &str) -> Result<(), SessionError> {
        if !self.cached(id, |record| record.state.is_playing)? {
            tracing::debug!(player_id = %id, "pause ignored: not playing");
            return Ok(());
        }
        let (_, ticket) = self
            .dispatch(id, PlayerCommand::Pause {
                player_id: id.to_string(),
            })
            .await?;
        self.apply_result(id, ticket, Freshness::NoPlaybackEventSince, |record| {
            record.state.is_playing = false;
            record.phase = SessionPhase::Paused;
            None
        });
        Ok(())
    }

    /// Set the volume; `volume` must be within `[0, 1]`.
    pub async fn set_volume(&self, id: &str, volume: f64) -> Result<(), SessionError> {
        validate_volume(volume)?;
        let (_, ticket) = self
            .dispatch(id, PlayerCommand::SetVolume {
                player_id: id.to_string(),
                volume,
            })
            .await?;
        self.apply_result(id, ticket, Freshness::SameSession, |record| {
            record.state.volume = volume;
            Some(format!("Volume: {}%", (volume * 100.0).round()))
        });
        Ok(())
    }

    /// Set the playback rate; `rate` must be `> 0`.
    pub async fn set_rate(&self, id: &str, rate: f64) -> Result<(), SessionError> {
        validate_rate(rate)?;
        let (_, ticket) = self
            .dispatch(id, PlayerCommand::SetRate {
                player_id: id.to_string(),
                rate,
            })
            .await?;
        self.apply_result(id, ticket, Freshness::SameSession, |record| {
            record.state.rate = rate;
            Some(format!("Speed: {rate}x"))
        });
        Ok(())
    }

    /// Ask the player for the media duration. `None` while unknown.
    pub async fn get_duration(&self, id: &str) -> Result<Option<f64>, SessionError> {
        let (outcome, ticket) = self
            .dispatch(id, PlayerCommand::GetDuration {
                player_id: id.to_string(),
            })
            .await?;
        let value = outcome.value_f64().filter(|v| *v >= 0.0);
        if let Some(duration) = value {
            self.apply_result(id, ticket, Freshness::SameSession, |record| {
                set_duration(&mut record.state, duration);
                None
            });
        }
        Ok(value)
    }

    /// Ask the player for the current position. `None` while unknown.
    pub async fn get_current_time(&self, id: &str) -> Result<Option<f64>, SessionError> {
        let (outcome, ticket) = self
            .dispatch(id, PlayerCommand::GetCurrentTime {
                player_id: id.to_string(),
            })
            .await?;
        let value = outcome.value_f64().filter(|v| *v >= 0.0);
        if let Some(seconds) = value {
            self.apply_result(id, ticket, Freshness::NoTimeEventSince, |record| {
                set_current_time(&mut record.state, seconds);
                None
            });
        }
        Ok(value)
    }

    pub async fn is_playing(&self, id: &str) -> Result<Option<bool>, SessionError> {
        let (outcome, ticket) = self
            .dispatch(id, PlayerCommand::IsPlaying {
                player_id: id.to_string(),
            })
            .await?;
        let value = outcome.value_bool();
        if let Some(playing) = value {
            self.apply_result(id, ticket, Freshness::NoPlaybackEventSince, |record| {
                record.state.is_playing = playing;
                match (playing, record.phase) {
                    (true, phase) if phase != SessionPhase::Playing => {
                        record.phase = SessionPhase::Playing
                    }
                    (false, SessionPhase::Playing) => record.phase = SessionPhase::Paused,
                    _ => {}
                }
                None
            });
        }
        Ok(value)
    }

    pub async fn is_muted(&self, id: &str) -> Result<Option<bool>, SessionError> {
        let (outcome, ticket) = self
            .dispatch(id, PlayerCommand::IsMuted {
                player_id: id.to_string(),
            })
            .await?;
        let value = outcome.value_bool();
        if let Some(muted) = value {
            self.apply_result(id, ticket, Freshness::SameSession, |record| {
                record.state.is_muted = muted;
                None
            });
        }
        Ok(value)
    }

    /// Run the four point-in-time queries and publish the summary as status.
    pub async fn info(&self, id: &str) -> Result<PlayerInfo, SessionError> {
        let info = PlayerInfo {
            duration: self.get_duration(id).await?,
            current_time: self.get_current_time(id).await?,
            is_playing: self.is_playing(id).await?,
            is_muted: self.is_muted(id).await?,
        };
        self.set_status(id, format_info(&info));
        Ok(info)
    }

    /// Tear down the player surface and every listener bound to it.
    ///
    /// Local teardown happens even when the player reports a failure; that
    /// failure is still returned. After a confirmed remove, events for `id`
    /// are dropped until the player's `Removed` acknowledgement arrives.
    pub async fn remove(&self, id: &str) -> Result<(), SessionError> {
        let ticket = {
            let mut sessions = self.sessions();
            let ticket = sessions.ticket(id)?;
            // Fence before sending: the acknowledgement can arrive before `send` returns.
            sessions.expect_removed(id);
            ticket
        };
        let result = self
            .inner
            .transport
            .send(PlayerCommand::Remove {
                player_id: id.to_string(),
            })
            .await;
        if !matches!(&result, Ok(outcome) if outcome.result) {
            self.sessions().settle_removed(id);
        }
        self.teardown(id, ticket.generation);
        match result {
            Ok(outcome) if outcome.result => Ok(()),
            Ok(outcome) => {
                let message = outcome
                    .message
                    .unwrap_or_else(|| "remove failed".to_string());
                tracing::warn!(player_id = %id, error = %message, "player refused remove");
                Err(SessionError::TransportError(message))
            }
            Err(err) => {
                tracing::warn!(player_id = %id, error = %err, "remove not delivered");
                Err(err.into())
            }
        }
    }

    /// Apply a pushed event. Returns `false` when the event was dropped: the
    /// id has no session, or the event still belongs to a removed session.
    ///
    /// State is updated first; listeners run afterwards without any lock held,
    /// so they may call back into the controller.
    pub fn handle_event(&self, event: &PlayerEvent) -> bool {
        let id = event.player_id();
        let (applied, handlers) = {
            let mut sessions = self.sessions();
            if sessions.is_fenced(id) {
                if event.kind() == EventKind::Removed {
                    sessions.settle_removed(id);
                }
                tracing::debug!(player_id = %id, kind = ?event.kind(), "dropping event for removed session");
                return false;
            }
            let Some(record) = sessions.get_mut(id) else {
                tracing::debug!(player_id = %id, kind = ?event.kind(), "dropping event for unknown player");
                return false;
            };
            record.note_event(event.kind());
            let applied = apply_event(record, event);
            if applied.removed {
                sessions.remove(id);
            }
            let mut listeners = self.listeners();
            let handlers = listeners.handlers_for(event);
            if applied.removed {
                listeners.drop_session(id);
            }
            (applied, handlers)
        };

        if applied.state_changed {
            self.inner.updates.state_changed(id);
        }
        if let Some(status) = applied.status.as_deref() {
            self.inner.updates.status_changed(id, status);
        }
        if applied.removed {
            tracing::info!(player_id = %id, "player removed by remote");
            self.inner.updates.removed(id);
        }
        invoke_all(&handlers, event);
        true
    }

    /// Register a listener for every player's events of `kind`.
    pub fn add_event_listener<F>(&self, kind: EventKind, handler: F) -> ListenerHandle
    where
        F: Fn(&PlayerEvent) + Send + Sync + 'static,
    {
        self.listeners().add_global(kind, Arc::new(handler))
    }

    /// Register a listener for `kind` events of one player.
    ///
    /// The listener is dropped automatically when the player is removed.
    pub fn add_session_listener<F>(
        &self,
        id: &str,
        kind: EventKind,
        handler: F,
    ) -> Result<ListenerHandle, SessionError>
    where
        F: Fn(&PlayerEvent) + Send + Sync + 'static,
    {
        let sessions = self.sessions();
        if !sessions.contains(id) {
            return Err(SessionError::not_found(id));
        }
        Ok(self.listeners().add_session(id, kind, Arc::new(handler)))
    }

    /// Remove one listener. Returns `true` when it was still registered.
    pub fn remove_listener(&self, handle: &ListenerHandle) -> bool {
        let removed = self.listeners().remove(handle);
        tracing::debug!(
            kind = ?handle.kind(),
            player_id = handle.player_id().unwrap_or("*"),
            removed,
            "listener removed"
        );
        removed
    }

    /// Empty guard that releases every listener it tracks when dropped.
    pub fn subscription(&self) -> SubscriptionGuard {
        SubscriptionGuard::new(self.inner.listeners.clone())
    }

    /// Cached view of one player.
    pub fn snapshot(&self, id: &str) -> Result<SessionSnapshot, SessionError> {
        self.sessions()
            .get(id)
            .map(SessionRecord::snapshot)
            .ok_or_else(|| SessionError::not_found(id))
    }

    /// Ids of all active players, sorted.
    pub fn player_ids(&self) -> Vec<String> {
        self.sessions().ids()
    }

    /// Subscribe to local cache change notifications.
    pub fn subscribe_updates(&self) -> broadcast::Receiver<SessionUpdate> {
        self.inner.updates.subscribe()
    }

    fn cached<T>(&self, id: &str, read: impl FnOnce(&SessionRecord) -> T) -> Result<T, SessionError> {
        self.sessions()
            .get(id)
            .map(read)
            .ok_or_else(|| SessionError::not_found(id))
    }

    fn set_status(&self, id: &str, status: String) {
        let changed = match self.sessions().get_mut(id) {
            Some(record) if record.status != status => {
                record.status = status.clone();
                true
            }
            _ => false,
        };
        if changed {
            self.inner.updates.status_changed(id, &status);
        }
    }

    /// Send a command for an existing session.
    ///
    /// The result is discarded with `NotFound` when the session was removed
    /// (or re-created) while the command was in flight.
    async fn dispatch(
        &self,
        id: &str,
        command: PlayerCommand,
    ) -> Result<(CommandOutcome, Ticket), SessionError> {
        let ticket = self.sessions().ticket(id)?;
        let name = command.name();
        tracing::debug!(player_id = %id, command = name, "dispatching command");
        let result = self.inner.transport.send(command).await;

        let alive = self
            .sessions()
            .get(id)
            .is_some_and(|record| record.generation == ticket.generation);
        if !alive {
            tracing::debug!(player_id = %id, command = name, "discarding result for removed player");
            return Err(SessionError::not_found(id));
        }

        let message = match result {
            Ok(outcome) if outcome.result => return Ok((outcome, ticket)),
            Ok(outcome) => outcome
                .message
                .unwrap_or_else(|| format!("{name} failed")),
            Err(err) => err.to_string(),
        };
        tracing::warn!(player_id = %id, command = name, error = %message, "command failed");
        self.set_status(id, format!("{} error: {message}", command_label(name)));
        Err(SessionError::TransportError(message))
    }

    /// Apply an optimistic update from a command result if `ticket` is still fresh.
    fn apply_result(
        &self,
        id: &str,
        ticket: Ticket,
        freshness: Freshness,
        update: impl FnOnce(&mut SessionRecord) -> Option<String>,
    ) {
        let (state_changed, status) = {
            let mut sessions = self.sessions();
            let Some(record) = sessions.fresh_mut(id, ticket, freshness) else {
                tracing::debug!(player_id = %id, "skipping stale command result");
                return;
            };
            let before_state = record.state.clone();
            let before_phase = record.phase;
            let status = update(record);
            if let Some(status) = status.as_ref() {
                record.status = status.clone();
            }
            (
                record.state != before_state || record.phase != before_phase,
                status,
            )
        };
        if state_changed {
            self.inner.updates.state_changed(id);
        }
        if let Some(status) = status {
            self.inner.updates.status_changed(id, &status);
        }
    }

    /// Drop the session record of `generation` and its listeners.
    fn teardown(&self, id: &str, generation: u64) {
        let dropped = {
            let mut sessions = self.sessions();
            if sessions.remove_generation(id, generation).is_none() {
                return;
            }
            self.listeners().drop_session(id)
        };
        tracing::info!(player_id = %id, listeners = dropped, "player session removed");
        self.inner.updates.removed(id);
    }
}

/// Feed events from `events` into `controller` until the channel closes.
pub fn spawn_event_pump(
    controller: PlayerSessionController,
    mut events: mpsc::Receiver<PlayerEvent>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            controller.handle_event(&event);
        }
        tracing::debug!("player event stream closed");
    })
}

pub(crate) fn validate_volume(volume: f64) -> Result<(), SessionError> {
    if (0.0..=1.0).contains(&volume) {
        Ok(())
    } else {
        Err(SessionError::InvalidArgument(format!(
            "volume must be within [0, 1], got {volume}"
        )))
    }
}

pub(crate) fn validate_rate(rate: f64) -> Result<(), SessionError> {
    if rate.is_finite() && rate > 0.0 {
        Ok(())
    } else {
        Err(SessionError::InvalidArgument(format!(
            "rate must be > 0, got {rate}"
        )))
    }
}

fn validate_source(source_url: &str) -> Result<(), SessionError> {
    if source_url.trim().is_empty() {
        return Err(SessionError::CreationError("source url is empty".to_string()));
    }
    reqwest::Url::parse(source_url)
        .map(|_| ())
        .map_err(|err| SessionError::CreationError(format!("unresolvable source {source_url}: {err}")))
}

/// `setVolume` -> `SetVolume`.
fn command_label(name: &str) -> String {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) => first.to_ascii_uppercase().to_string() + chars.as_str(),
        None => String::new(),
    }
}
