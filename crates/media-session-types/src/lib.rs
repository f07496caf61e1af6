use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Rendering rectangle requested for a player surface.
///
/// Values are CSS-like strings (`100%`, `500px`) and are forwarded untouched.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Placement {
    /// Surface width.
    pub width: String,
    /// Surface height.
    pub height: String,
}

impl Default for Placement {
    fn default() -> Self {
        Self {
            width: "100%".to_string(),
            height: "100%".to_string(),
        }
    }
}

/// Presentation metadata and startup behavior shared by every platform.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ExtraOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subtitle: Option<String>,
    /// Poster image shown before the first frame.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub poster: Option<String>,
    /// Start playback as soon as the player reports ready.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auto_play_when_ready: Option<bool>,
    /// Initial playback rate.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rate: Option<f64>,
}

/// iOS-specific player options.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct IosOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shows_playback_controls: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allows_picture_in_picture_playback: Option<bool>,
}

/// Android-specific player options.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AndroidOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub use_default_controls: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enable_network_security_configuration: Option<bool>,
}

/// Web-specific player options.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct WebOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enable_chromecast: Option<bool>,
}

/// Options forwarded with a `create` command.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct CreateOptions {
    #[serde(default)]
    pub extra: ExtraOptions,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ios: Option<IosOptions>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub android: Option<AndroidOptions>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub web: Option<WebOptions>,
}

/// Control command sent to the external player.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(tag = "command", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum PlayerCommand {
    Create {
        player_id: String,
        url: String,
        placement: Placement,
        #[serde(flatten)]
        options: CreateOptions,
    },
    Play { player_id: String },
    Pause { player_id: String },
    SetVolume { player_id: String, volume: f64 },
    SetRate { player_id: String, rate: f64 },
    GetDuration { player_id: String },
    GetCurrentTime { player_id: String },
    IsPlaying { player_id: String },
    IsMuted { player_id: String },
    Remove { player_id: String },
}

impl PlayerCommand {
    /// Player id the command targets.
    pub fn player_id(&self) -> &str {
        match self {
            PlayerCommand::Create { player_id, .. }
            | PlayerCommand::Play { player_id }
            | PlayerCommand::Pause { player_id }
            | PlayerCommand::SetVolume { player_id, .. }
            | PlayerCommand::SetRate { player_id, .. }
            | PlayerCommand::GetDuration { player_id }
            | PlayerCommand::GetCurrentTime { player_id }
            | PlayerCommand::IsPlaying { player_id }
            | PlayerCommand::IsMuted { player_id }
            | PlayerCommand::Remove { player_id } => player_id,
        }
    }

    /// Wire name of the command, used in logs and status text.
    pub fn name(&self) -> &'static str {
        match self {
            PlayerCommand::Create { .. } => "create",
            PlayerCommand::Play { .. } => "play",
            PlayerCommand::Pause { .. } => "pause",
            PlayerCommand::SetVolume { .. } => "setVolume",
            PlayerCommand::SetRate { .. } => "setRate",
            PlayerCommand::GetDuration { .. } => "getDuration",
            PlayerCommand::GetCurrentTime { .. } => "getCurrentTime",
            PlayerCommand::IsPlaying { .. } => "isPlaying",
            PlayerCommand::IsMuted { .. } => "isMuted",
            PlayerCommand::Remove { .. } => "remove",
        }
    }
}

/// Result envelope returned by the external player for every command.
///
/// Callers must check `result` before trusting `value`.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct CommandOutcome {
    pub result: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
}

impl CommandOutcome {
    pub fn ok() -> Self {
        Self {
            result: true,
            message: None,
            value: None,
        }
    }

    pub fn ok_with(value: impl Into<Value>) -> Self {
        Self {
            result: true,
            message: None,
            value: Some(value.into()),
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            result: false,
            message: Some(message.into()),
            value: None,
        }
    }

    /// Numeric value, if present and finite.
    pub fn value_f64(&self) -> Option<f64> {
        self.value
            .as_ref()
            .and_then(Value::as_f64)
            .filter(|v| v.is_finite())
    }

    pub fn value_bool(&self) -> Option<bool> {
        self.value.as_ref().and_then(Value::as_bool)
    }
}

/// Event kinds pushed by the external player.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum EventKind {
    #[serde(rename = "MediaPlayer:Ready")]
    Ready,
    #[serde(rename = "MediaPlayer:Play")]
    Play,
    #[serde(rename = "MediaPlayer:Pause")]
    Pause,
    #[serde(rename = "MediaPlayer:TimeUpdated")]
    TimeUpdated,
    #[serde(rename = "MediaPlayer:Seek")]
    Seek,
    #[serde(rename = "MediaPlayer:Ended")]
    Ended,
    #[serde(rename = "MediaPlayer:FullScreen")]
    FullScreen,
    #[serde(rename = "MediaPlayer:PictureInPicture")]
    PictureInPicture,
    #[serde(rename = "MediaPlayer:isPlayingInBackground")]
    BackgroundPlayback,
    #[serde(rename = "MediaPlayer:Removed")]
    Removed,
}

impl EventKind {
    pub const ALL: [EventKind; 10] = [
        EventKind::Ready,
        EventKind::Play,
        EventKind::Pause,
        EventKind::TimeUpdated,
        EventKind::Seek,
        EventKind::Ended,
        EventKind::FullScreen,
        EventKind::PictureInPicture,
        EventKind::BackgroundPlayback,
        EventKind::Removed,
    ];
}

/// Event pushed by the external player, scoped to one player id.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(tag = "event", rename_all_fields = "camelCase")]
pub enum PlayerEvent {
    #[serde(rename = "MediaPlayer:Ready")]
    Ready {
        player_id: String,
        /// Media duration in seconds, when the player reports it with readiness.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        duration: Option<f64>,
    },
    #[serde(rename = "MediaPlayer:Play")]
    Play { player_id: String },
    #[serde(rename = "MediaPlayer:Pause")]
    Pause { player_id: String },
    #[serde(rename = "MediaPlayer:TimeUpdated")]
    TimeUpdated { player_id: String, current_time: f64 },
    #[serde(rename = "MediaPlayer:Seek")]
    Seek {
        player_id: String,
        previous_time: f64,
        new_time: f64,
    },
    #[serde(rename = "MediaPlayer:Ended")]
    Ended { player_id: String },
    #[serde(rename = "MediaPlayer:FullScreen")]
    FullScreen {
        player_id: String,
        is_in_full_screen: bool,
    },
    #[serde(rename = "MediaPlayer:PictureInPicture")]
    PictureInPicture {
        player_id: String,
        is_in_picture_in_picture: bool,
    },
    #[serde(rename = "MediaPlayer:isPlayingInBackground")]
    BackgroundPlayback {
        player_id: String,
        is_playing_in_background: bool,
    },
    #[serde(rename = "MediaPlayer:Removed")]
    Removed { player_id: String },
}

impl PlayerEvent {
    pub fn player_id(&self) -> &str {
        match self {
            PlayerEvent::Ready { player_id, .. }
            | PlayerEvent::Play { player_id }
            | PlayerEvent::Pause { player_id }
            | PlayerEvent::TimeUpdated { player_id, .. }
            | PlayerEvent::Seek { player_id, .. }
            | PlayerEvent::Ended { player_id }
            | PlayerEvent::FullScreen { player_id, .. }
            | PlayerEvent::PictureInPicture { player_id, .. }
            | PlayerEvent::BackgroundPlayback { player_id, .. }
            | PlayerEvent::Removed { player_id } => player_id,
        }
    }

    pub fn kind(&self) -> EventKind {
        match self {
            PlayerEvent::Ready { .. } => EventKind::Ready,
            PlayerEvent::Play { .. } => EventKind::Play,
            PlayerEvent::Pause { .. } => EventKind::Pause,
            PlayerEvent::TimeUpdated { .. } => EventKind::TimeUpdated,
            PlayerEvent::Seek { .. } => EventKind::Seek,
            PlayerEvent::Ended { .. } => EventKind::Ended,
            PlayerEvent::FullScreen { .. } => EventKind::FullScreen,
            PlayerEvent::PictureInPicture { .. } => EventKind::PictureInPicture,
            PlayerEvent::BackgroundPlayback { .. } => EventKind::BackgroundPlayback,
            PlayerEvent::Removed { .. } => EventKind::Removed,
        }
    }
}

/// Lifecycle phase of a cached player session.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SessionPhase {
    /// `create` sent, no `Ready` seen yet.
    Creating,
    Ready,
    Playing,
    Paused,
    /// Playback reached the end of the media.
    Ended,
}

/// Locally cached view of a remote player's state.
///
/// This is a best-effort mirror of the external player and never authoritative.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct PlaybackState {
    pub is_playing: bool,
    /// Position in seconds.
    pub current_time: f64,
    /// Duration in seconds; `None` until the player reports readiness.
    pub duration: Option<f64>,
    /// Volume in `[0, 1]`.
    pub volume: f64,
    /// Playback rate, always `> 0`.
    pub rate: f64,
    pub is_muted: bool,
    pub is_full_screen: bool,
    pub is_picture_in_picture: bool,
    /// Informational only; reported by `isPlayingInBackground` events.
    pub is_playing_in_background: bool,
    /// `true` after an `Ended` event until playback restarts.
    pub ended: bool,
}

impl Default for PlaybackState {
    fn default() -> Self {
        Self {
            is_playing: false,
            current_time: 0.0,
            duration: None,
            volume: 0.5,
            rate: 1.0,
            is_muted: false,
            is_full_screen: false,
            is_picture_in_picture: false,
            is_playing_in_background: false,
            ended: false,
        }
    }
}

/// Point-in-time snapshot of one cached session.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct SessionSnapshot {
    pub id: String,
    pub source_url: String,
    pub placement: Placement,
    pub phase: SessionPhase,
    pub state: PlaybackState,
    /// Last human-readable status message.
    pub status: String,
}

/// Aggregated answer of the four player queries.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct PlayerInfo {
    pub duration: Option<f64>,
    pub current_time: Option<f64>,
    pub is_playing: Option<bool>,
    pub is_muted: Option<bool>,
}
