//! Event reconciliation and status text helpers.
//!
//! Centralizes how pushed player events update a cached session record.

use media_session_types::{PlaybackState, PlayerEvent, PlayerInfo, SessionPhase};

use crate::registry::SessionRecord;

/// Local changes produced by applying one event.
#[derive(Debug, Default, PartialEq)]
pub(crate) struct Applied {
    /// Cached playback state or phase changed.
    pub state_changed: bool,
    /// New status text, when the event sets one.
    pub status: Option<String>,
    /// The player reported its own removal.
    pub removed: bool,
}

/// Apply a pushed event to a session record.
pub(crate) fn apply_event(record: &mut SessionRecord, event: &PlayerEvent) -> Applied {
    let before_state = record.state.clone();
    let before_phase = record.phase;
    let mut applied = Applied::default();

    match event {
        PlayerEvent::Ready { duration, .. } => {
            if let Some(duration) = duration.filter(|d| d.is_finite() && *d >= 0.0) {
                record.state.duration = Some(duration);
            }
            if record.phase == SessionPhase::Creating {
                record.phase = SessionPhase::Ready;
            }
            applied.status = Some("Ready to play".to_string());
        }
        PlayerEvent::Play { .. } => {
            record.state.is_playing = true;
            record.state.ended = false;
            record.phase = SessionPhase::Playing;
            applied.status = Some("Playing".to_string());
        }
        PlayerEvent::Pause { .. } => {
            record.state.is_playing = false;
            record.phase = SessionPhase::Paused;
            applied.status = Some("Paused".to_string());
        }
        PlayerEvent::TimeUpdated { current_time, .. } => {
            set_current_time(&mut record.state, *current_time);
        }
        PlayerEvent::Seek { new_time, .. } => {
            set_current_time(&mut record.state, *new_time);
            applied.status = Some(format!("Seeked to {}s", whole_seconds(*new_time)));
        }
        PlayerEvent::Ended { .. } => {
            record.state.is_playing = false;
            record.state.ended = true;
            record.phase = SessionPhase::Ended;
            applied.status = Some("Video ended".to_string());
        }
        PlayerEvent::FullScreen {
            is_in_full_screen, ..
        } => {
            record.state.is_full_screen = *is_in_full_screen;
            applied.status = Some(if *is_in_full_screen { "Fullscreen" } else { "Normal" }.to_string());
        }
        PlayerEvent::PictureInPicture {
            is_in_picture_in_picture,
            ..
        } => {
            record.state.is_picture_in_picture = *is_in_picture_in_picture;
            applied.status = Some(
                if *is_in_picture_in_picture {
                    "Picture in Picture"
                } else {
                    "Normal"
                }
                .to_string(),
            );
        }
        PlayerEvent::BackgroundPlayback {
            is_playing_in_background,
            ..
        } => {
            record.state.is_playing_in_background = *is_playing_in_background;
        }
        PlayerEvent::Removed { .. } => {
            applied.removed = true;
            applied.status = Some("Player removed".to_string());
        }
    }

    if let Some(status) = applied.status.as_ref() {
        record.status = status.clone();
    }
    applied.state_changed = record.state != before_state || record.phase != before_phase;
    applied
}

/// Update the cached position, keeping it within `[0, duration]`.
pub(crate) fn set_current_time(state: &mut PlaybackState, seconds: f64) {
    if !seconds.is_finite() {
        return;
    }
    state.current_time = seconds.max(0.0);
    clamp_to_duration(state);
}

/// Record a reported duration and re-clamp the position against it.
pub(crate) fn set_duration(state: &mut PlaybackState, seconds: f64) {
    if !seconds.is_finite() || seconds < 0.0 {
        return;
    }
    state.duration = Some(seconds);
    clamp_to_duration(state);
}

fn clamp_to_duration(state: &mut PlaybackState) {
    if let Some(duration) = state.duration {
        if state.current_time > duration {
            state.current_time = duration;
        }
    }
}

fn whole_seconds(seconds: f64) -> u64 {
    if seconds.is_finite() && seconds > 0.0 {
        seconds.floor() as u64
    } else {
        0
    }
}

/// Format seconds as `m:ss`.
pub fn format_time(seconds: f64) -> String {
    let total = whole_seconds(seconds);
    format!("{}:{:02}", total / 60, total % 60)
}

/// Progress through the media as a percentage, `0` while the duration is unknown.
pub fn progress_percent(state: &PlaybackState) -> f64 {
    match state.duration {
        Some(duration) if duration > 0.0 => (state.current_time / duration * 100.0).clamp(0.0, 100.0),
        _ => 0.0,
    }
}

/// Multi-line summary of a [`PlayerInfo`] answer.
pub fn format_info(info: &PlayerInfo) -> String {
    let yes_no = |value: Option<bool>| if value.unwrap_or(false) { "Yes" } else { "No" };
    format!(
        "Duration: {}s\nCurrent: {}s\nPlaying: {}\nMuted: {}",
        whole_seconds(info.duration.unwrap_or(0.0)),
        whole_seconds(info.current_time.unwrap_or(0.0)),
        yes_no(info.is_playing),
        yes_no(info.is_muted),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use media_session_types::Placement;

    fn record() -> SessionRecord {
        SessionRecord {
            id: "p1".to_string(),
            source_url: "https://example.com/a.mp4".to_string(),
            placement: Placement::default(),
            phase: SessionPhase::Creating,
            state: PlaybackState::default(),
            status: "Initializing...".to_string(),
            generation: 1,
            playback_seq: 0,
            time_seq: 0,
        }
    }

    fn id() -> String {
        "p1".to_string()
    }

    #[test]
    fn ready_sets_duration_and_phase() {
        let mut rec = record();
        let applied = apply_event(
            &mut rec,
            &PlayerEvent::Ready {
                player_id: id(),
                duration: Some(596.0),
            },
        );
        assert!(applied.state_changed);
        assert_eq!(rec.phase, SessionPhase::Ready);
        assert_eq!(rec.state.duration, Some(596.0));
        assert_eq!(rec.status, "Ready to play");
    }

    #[test]
    fn ready_without_duration_keeps_it_unknown() {
        let mut rec = record();
        apply_event(
            &mut rec,
            &PlayerEvent::Ready {
                player_id: id(),
                duration: None,
            },
        );
        assert_eq!(rec.state.duration, None);
    }

    #[test]
    fn late_ready_does_not_reset_playing_phase() {
        let mut rec = record();
        apply_event(&mut rec, &PlayerEvent::Play { player_id: id() });
        apply_event(
            &mut rec,
            &PlayerEvent::Ready {
                player_id: id(),
                duration: None,
            },
        );
        assert_eq!(rec.phase, SessionPhase::Playing);
        assert!(rec.state.is_playing);
    }

    #[test]
    fn time_update_is_clamped_to_known_duration() {
        let mut rec = record();
        rec.state.duration = Some(10.0);
        apply_event(
            &mut rec,
            &PlayerEvent::TimeUpdated {
                player_id: id(),
                current_time: 42.0,
            },
        );
        assert_eq!(rec.state.current_time, 10.0);
    }

    #[test]
    fn time_update_without_duration_is_taken_verbatim() {
        let mut rec = record();
        let applied = apply_event(
            &mut rec,
            &PlayerEvent::TimeUpdated {
                player_id: id(),
                current_time: 42.0,
            },
        );
        assert_eq!(rec.state.current_time, 42.0);
        assert!(applied.status.is_none());
    }

    #[test]
    fn seek_moves_to_new_time_and_sets_status() {
        let mut rec = record();
        apply_event(
            &mut rec,
            &PlayerEvent::Seek {
                player_id: id(),
                previous_time: 3.0,
                new_time: 75.6,
            },
        );
        assert_eq!(rec.state.current_time, 75.6);
        assert_eq!(rec.status, "Seeked to 75s");
    }

    #[test]
    fn ended_stops_playback_and_play_restarts() {
        let mut rec = record();
        apply_event(&mut rec, &PlayerEvent::Play { player_id: id() });
        apply_event(&mut rec, &PlayerEvent::Ended { player_id: id() });
        assert!(!rec.state.is_playing);
        assert!(rec.state.ended);
        assert_eq!(rec.phase, SessionPhase::Ended);

        apply_event(&mut rec, &PlayerEvent::Play { player_id: id() });
        assert!(!rec.state.ended);
        assert_eq!(rec.phase, SessionPhase::Playing);
    }

    #[test]
    fn background_playback_is_informational() {
        let mut rec = record();
        let applied = apply_event(
            &mut rec,
            &PlayerEvent::BackgroundPlayback {
                player_id: id(),
                is_playing_in_background: true,
            },
        );
        assert!(rec.state.is_playing_in_background);
        assert!(!rec.state.is_playing);
        assert!(applied.status.is_none());
        assert_eq!(rec.status, "Initializing...");
    }

    #[test]
    fn full_screen_and_pip_toggle_status() {
        let mut rec = record();
        apply_event(
            &mut rec,
            &PlayerEvent::FullScreen {
                player_id: id(),
                is_in_full_screen: true,
            },
        );
        assert!(rec.state.is_full_screen);
        assert_eq!(rec.status, "Fullscreen");
        apply_event(
            &mut rec,
            &PlayerEvent::PictureInPicture {
                player_id: id(),
                is_in_picture_in_picture: false,
            },
        );
        assert_eq!(rec.status, "Normal");
    }

    #[test]
    fn removed_is_flagged() {
        let mut rec = record();
        let applied = apply_event(&mut rec, &PlayerEvent::Removed { player_id: id() });
        assert!(applied.removed);
    }

    #[test]
    fn set_duration_reclamps_position() {
        let mut state = PlaybackState::default();
        set_current_time(&mut state, 30.0);
        set_duration(&mut state, 20.0);
        assert_eq!(state.current_time, 20.0);
        set_duration(&mut state, f64::NAN);
        assert_eq!(state.duration, Some(20.0));
    }

    #[test]
    fn format_time_pads_seconds() {
        assert_eq!(format_time(0.0), "0:00");
        assert_eq!(format_time(65.9), "1:05");
        assert_eq!(format_time(596.5), "9:56");
        assert_eq!(format_time(-3.0), "0:00");
    }

    #[test]
    fn progress_is_zero_until_duration_known() {
        let mut state = PlaybackState::default();
        state.current_time = 5.0;
        assert_eq!(progress_percent(&state), 0.0);
        state.duration = Some(20.0);
        assert_eq!(progress_percent(&state), 25.0);
    }

    #[test]
    fn info_text_treats_unknown_as_zero_or_no() {
        let info = PlayerInfo {
            duration: Some(596.4),
            current_time: None,
            is_playing: Some(true),
            is_muted: None,
        };
        assert_eq!(
            format_info(&info),
            "Duration: 596s\nCurrent: 0s\nPlaying: Yes\nMuted: No"
        );
    }
}
