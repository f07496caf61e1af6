//! In-process simulated player.
//!
//! Answers the command protocol and pushes events the way a remote player
//! would, without decoding anything. Used by `session-cli` when no endpoint
//! is configured.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use media_session_types::{CommandOutcome, PlayerCommand, PlayerEvent};

use crate::config::LoopbackSettings;
use crate::transport::{PlayerTransport, TransportError};

const EVENT_CHANNEL_CAPACITY: usize = 256;

#[derive(Debug, Clone)]
struct SimulatedPlayer {
    playing: bool,
    position: f64,
    duration: f64,
    volume: f64,
    rate: f64,
    muted: bool,
    full_screen: bool,
    picture_in_picture: bool,
}

/// Simulated external player.
#[derive(Clone)]
pub struct LoopbackPlayer {
    players: Arc<Mutex<HashMap<String, SimulatedPlayer>>>,
    events: mpsc::Sender<PlayerEvent>,
    settings: LoopbackSettings,
}

impl LoopbackPlayer {
    /// Create a player and the receiving end of its event stream.
    pub fn new(settings: LoopbackSettings) -> (Self, mpsc::Receiver<PlayerEvent>) {
        let (events, rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        (
            Self {
                players: Arc::new(Mutex::new(HashMap::new())),
                events,
                settings,
            },
            rx,
        )
    }

    pub fn player_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.lock().keys().cloned().collect();
        ids.sort();
        ids
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, SimulatedPlayer>> {
        self.players.lock().unwrap_or_else(|err| err.into_inner())
    }

    async fn emit(&self, events: Vec<PlayerEvent>) {
        for event in events {
            if self.events.send(event).await.is_err() {
                tracing::debug!("loopback event receiver dropped");
                return;
            }
        }
    }

    fn execute(&self, command: PlayerCommand) -> (CommandOutcome, Vec<PlayerEvent>) {
        let mut players = self.lock();
        let id = command.player_id().to_string();
        if let PlayerCommand::Create { url, .. } = &command {
            if players.contains_key(&id) {
                return (CommandOutcome::failed("player already exists"), Vec::new());
            }
            if url.trim().is_empty() {
                return (CommandOutcome::failed("missing url"), Vec::new());
            }
            players.insert(
                id.clone(),
                SimulatedPlayer {
                    playing: false,
                    position: 0.0,
                    duration: self.settings.duration_sec,
                    volume: 0.5,
                    rate: 1.0,
                    muted: false,
                    full_screen: false,
                    picture_in_picture: false,
                },
            );
            let ready = PlayerEvent::Ready {
                player_id: id.clone(),
                duration: Some(self.settings.duration_sec),
            };
            return (CommandOutcome::ok_with(id), vec![ready]);
        }

        let Some(player) = players.get_mut(&id) else {
            return (CommandOutcome::failed("player not found"), Vec::new());
        };
        let mut events = Vec::new();
        let outcome = match command {
            PlayerCommand::Create { .. } => CommandOutcome::failed("player already exists"),
            PlayerCommand::Play { .. } => {
                if player.position >= player.duration {
                    player.position = 0.0;
                }
                if !player.playing {
                    player.playing = true;
                    events.push(PlayerEvent::Play {
                        player_id: id.clone(),
                    });
                }
                CommandOutcome::ok()
            }
            PlayerCommand::Pause { .. } => {
                if player.playing {
                    player.playing = false;
                    events.push(PlayerEvent::Pause {
                        player_id: id.clone(),
                    });
                }
                CommandOutcome::ok()
            }
            PlayerCommand::SetVolume { volume, .. } => {
                player.volume = volume;
                player.muted = player.volume == 0.0;
                CommandOutcome::ok()
            }
            PlayerCommand::SetRate { rate, .. } => {
                if rate > self.settings.max_rate {
                    CommandOutcome::failed("rate too high")
                } else {
                    player.rate = rate;
                    CommandOutcome::ok()
                }
            }
            PlayerCommand::GetDuration { .. } => CommandOutcome::ok_with(player.duration),
            PlayerCommand::GetCurrentTime { .. } => CommandOutcome::ok_with(player.position),
            PlayerCommand::IsPlaying { .. } => CommandOutcome::ok_with(player.playing),
            PlayerCommand::IsMuted { .. } => CommandOutcome::ok_with(player.muted),
            PlayerCommand::Remove { .. } => {
                players.remove(&id);
                events.push(PlayerEvent::Removed {
                    player_id: id.clone(),
                });
                CommandOutcome::ok()
            }
        };
        (outcome, events)
    }

    /// Advance every playing player by `elapsed` wall time.
    pub async fn tick(&self, elapsed: Duration) {
        let events = {
            let mut players = self.lock();
            let mut events = Vec::new();
            for (id, player) in players.iter_mut().filter(|(_, p)| p.playing) {
                player.position =
                    (player.position + elapsed.as_secs_f64() * player.rate).min(player.duration);
                events.push(PlayerEvent::TimeUpdated {
                    player_id: id.clone(),
                    current_time: player.position,
                });
                if player.position >= player.duration {
                    player.playing = false;
                    events.push(PlayerEvent::Ended {
                        player_id: id.clone(),
                    });
                }
            }
            events
        };
        self.emit(events).await;
    }

    /// Periodically call [`LoopbackPlayer::tick`] at the configured interval.
    pub fn spawn_ticker(&self) -> JoinHandle<()> {
        let player = self.clone();
        let interval = self.settings.tick;
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                player.tick(interval).await;
                if player.events.is_closed() {
                    break;
                }
            }
        })
    }

    /// Simulate the user scrubbing the native controls.
    pub async fn seek(&self, id: &str, seconds: f64) -> bool {
        let event = {
            let mut players = self.lock();
            let Some(player) = players.get_mut(id) else {
                return false;
            };
            let previous_time = player.position;
            player.position = seconds.clamp(0.0, player.duration);
            PlayerEvent::Seek {
                player_id: id.to_string(),
                previous_time,
                new_time: player.position,
            }
        };
        self.emit(vec![event]).await;
        true
    }

    /// Simulate the user toggling fullscreen on the native surface.
    pub async fn toggle_full_screen(&self, id: &str) -> bool {
        let event = {
            let mut players = self.lock();
            let Some(player) = players.get_mut(id) else {
                return false;
            };
            player.full_screen = !player.full_screen;
            PlayerEvent::FullScreen {
                player_id: id.to_string(),
                is_in_full_screen: player.full_screen,
            }
        };
        self.emit(vec![event]).await;
        true
    }

    pub async fn toggle_picture_in_picture(&self, id: &str) -> bool {
        let event = {
            let mut players = self.lock();
            let Some(player) = players.get_mut(id) else {
                return false;
            };
            player.picture_in_picture = !player.picture_in_picture;
            PlayerEvent::PictureInPicture {
                player_id: id.to_string(),
                is_in_picture_in_picture: player.picture_in_picture,
            }
        };
        self.emit(vec![event]).await;
        true
    }

    /// Simulate the app moving to the background while `id` plays.
    pub async fn background(&self, id: &str, in_background: bool) -> bool {
        let playing = match self.lock().get(id) {
            Some(player) => player.playing,
            None => return false,
        };
        self.emit(vec![PlayerEvent::BackgroundPlayback {
            player_id: id.to_string(),
            is_playing_in_background: in_background && playing,
        }])
        .await;
        true
    }
}

#[async_trait]
impl PlayerTransport for LoopbackPlayer {
    async fn send(&self, command: PlayerCommand) -> Result<CommandOutcome, TransportError> {
        if self.events.is_closed() {
            return Err(TransportError::Offline("loopback player stopped".to_string()));
        }
        let (outcome, events) = self.execute(command);
        self.emit(events).await;
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use media_session_types::Placement;

    fn settings() -> LoopbackSettings {
        LoopbackSettings {
            duration_sec: 10.0,
            tick: Duration::from_millis(100),
            max_rate: 2.0,
        }
    }

    fn create(id: &str) -> PlayerCommand {
        PlayerCommand::Create {
            player_id: id.to_string(),
            url: "https://example.com/a.mp4".to_string(),
            placement: Placement::default(),
            options: Default::default(),
        }
    }

    fn drain(rx: &mut mpsc::Receiver<PlayerEvent>) -> Vec<PlayerEvent> {
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        events
    }

    #[tokio::test]
    async fn create_emits_ready_with_duration() {
        let (player, mut rx) = LoopbackPlayer::new(settings());
        let outcome = player.send(create("p1")).await.unwrap();
        assert!(outcome.result);
        assert_eq!(
            drain(&mut rx),
            vec![PlayerEvent::Ready {
                player_id: "p1".to_string(),
                duration: Some(10.0),
            }]
        );

        let again = player.send(create("p1")).await.unwrap();
        assert!(!again.result);
    }

    #[tokio::test]
    async fn unknown_player_is_refused() {
        let (player, _rx) = LoopbackPlayer::new(settings());
        let outcome = player
            .send(PlayerCommand::Play {
                player_id: "ghost".to_string(),
            })
            .await
            .unwrap();
        assert_eq!(outcome, CommandOutcome::failed("player not found"));
    }

    #[tokio::test]
    async fn rate_above_maximum_is_refused() {
        let (player, _rx) = LoopbackPlayer::new(settings());
        player.send(create("p1")).await.unwrap();
        let outcome = player
            .send(PlayerCommand::SetRate {
                player_id: "p1".to_string(),
                rate: 3.0,
            })
            .await
            .unwrap();
        assert_eq!(outcome.message.as_deref(), Some("rate too high"));
    }

    #[tokio::test]
    async fn ticking_reaches_end_and_stops() {
        let (player, mut rx) = LoopbackPlayer::new(settings());
        player.send(create("p1")).await.unwrap();
        player
            .send(PlayerCommand::Play {
                player_id: "p1".to_string(),
            })
            .await
            .unwrap();
        drain(&mut rx);

        player.tick(Duration::from_secs(4)).await;
        player.tick(Duration::from_secs(8)).await;

        let events = drain(&mut rx);
        assert_eq!(
            events,
            vec![
                PlayerEvent::TimeUpdated {
                    player_id: "p1".to_string(),
                    current_time: 4.0,
                },
                PlayerEvent::TimeUpdated {
                    player_id: "p1".to_string(),
                    current_time: 10.0,
                },
                PlayerEvent::Ended {
                    player_id: "p1".to_string(),
                },
            ]
        );
        let playing = player
            .send(PlayerCommand::IsPlaying {
                player_id: "p1".to_string(),
            })
            .await
            .unwrap();
        assert_eq!(playing.value_bool(), Some(false));
    }

    #[tokio::test]
    async fn seek_is_clamped_and_reported() {
        let (player, mut rx) = LoopbackPlayer::new(settings());
        player.send(create("p1")).await.unwrap();
        drain(&mut rx);

        assert!(player.seek("p1", 99.0).await);
        assert_eq!(
            drain(&mut rx),
            vec![PlayerEvent::Seek {
                player_id: "p1".to_string(),
                previous_time: 0.0,
                new_time: 10.0,
            }]
        );
        assert!(!player.seek("ghost", 1.0).await);
    }

    #[tokio::test]
    async fn remove_emits_removed() {
        let (player, mut rx) = LoopbackPlayer::new(settings());
        player.send(create("p1")).await.unwrap();
        player
            .send(PlayerCommand::Remove {
                player_id: "p1".to_string(),
            })
            .await
            .unwrap();
        let events = drain(&mut rx);
        assert_eq!(
            events.last(),
            Some(&PlayerEvent::Removed {
                player_id: "p1".to_string(),
            })
        );
        assert!(player.player_ids().is_empty());
    }

    #[tokio::test]
    async fn closed_event_stream_reports_offline() {
        let (player, rx) = LoopbackPlayer::new(settings());
        drop(rx);
        assert!(matches!(
            player.send(create("p1")).await,
            Err(TransportError::Offline(_))
        ));
    }
}
