//! `session-cli` drives one media player session from stdin.
//!
//! Commands mirror a minimal player control panel:
//! - play / pause
//! - volume and rate, stepping through presets or set explicitly
//! - info: query duration, position, playing and muted
//! - remove, quit
//!
//! Without an endpoint the session runs against the in-process loopback player.

mod commands;

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use anyhow::{Context, Result};
use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use media_session::config::{
    SessionConfig, defaults_from_config, endpoint_from_config, loopback_from_config,
    timeout_from_config,
};
use media_session::status::{format_time, progress_percent};
use media_session::{
    HttpTransport, LoopbackPlayer, PlayerSessionController, SessionError, SessionUpdate,
    generate_player_id, logging, spawn_event_pump,
};
use media_session_types::{
    AndroidOptions, CreateOptions, EventKind, ExtraOptions, IosOptions, Placement,
    PlaybackState, PlayerEvent, WebOptions,
};

use crate::commands::{CliCommand, HELP, RATE_STEPS, VOLUME_STEPS, next_in_cycle};

const DEFAULT_MEDIA_URL: &str =
    "https://commondatastorage.googleapis.com/gtv-videos-library/sample/BigBuckBunny.mp4";
const POSTER_URL: &str = "https://peach.blender.org/wp-content/uploads/12_video_bunny_800.png";

#[derive(Parser, Debug)]
#[command(name = "session-cli", version)]
struct Args {
    /// Path to a TOML config file.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Base URL of an HTTP player endpoint; overrides `transport.endpoint`.
    #[arg(long)]
    endpoint: Option<String>,

    /// Media to load.
    #[arg(long, default_value = DEFAULT_MEDIA_URL)]
    url: String,

    /// Player id; generated when omitted.
    #[arg(long)]
    id: Option<String>,
}

/// Background tasks and the simulated player, when there is one.
struct Backend {
    loopback: Option<LoopbackPlayer>,
    tasks: Vec<JoinHandle<()>>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let config = match args.config.as_deref() {
        Some(path) => SessionConfig::load(path)?,
        None => SessionConfig::default(),
    };
    logging::init(config.log_filter.as_deref())?;

    let defaults = defaults_from_config(&config)?;
    let endpoint = args
        .endpoint
        .as_deref()
        .map(|s| s.trim_end_matches('/').to_string())
        .or_else(|| endpoint_from_config(&config));

    let (controller, mut backend) = match endpoint {
        Some(base_url) => {
            let transport = HttpTransport::new(&base_url, timeout_from_config(&config))
                .with_context(|| format!("connect player endpoint {base_url}"))?;
            let (events, stream_task) = transport.spawn_event_stream();
            let controller = PlayerSessionController::with_defaults(Arc::new(transport), defaults);
            let pump = spawn_event_pump(controller.clone(), events);
            tracing::info!(endpoint = %base_url, "using http player");
            (
                controller,
                Backend {
                    loopback: None,
                    tasks: vec![stream_task, pump],
                },
            )
        }
        None => {
            let (player, events) = LoopbackPlayer::new(loopback_from_config(&config)?);
            let controller =
                PlayerSessionController::with_defaults(Arc::new(player.clone()), defaults);
            let pump = spawn_event_pump(controller.clone(), events);
            let ticker = player.spawn_ticker();
            tracing::info!("using loopback player");
            (
                controller,
                Backend {
                    loopback: Some(player),
                    tasks: vec![ticker, pump],
                },
            )
        }
    };

    let id = args.id.unwrap_or_else(generate_player_id);
    backend
        .tasks
        .push(spawn_status_printer(id.clone(), controller.subscribe_updates()));

    controller
        .create(
            &id,
            &args.url,
            Placement {
                width: "100%".to_string(),
                height: "500px".to_string(),
            },
            demo_options(),
        )
        .await
        .with_context(|| format!("create player {id}"))?;
    println!("Player initialized: {id}");

    let mut subscription = controller.subscription();
    let last_second = Arc::new(AtomicU64::new(u64::MAX));
    let progress_controller = controller.clone();
    subscription.track(controller.add_session_listener(
        &id,
        EventKind::TimeUpdated,
        move |event: &PlayerEvent| {
            let Ok(snapshot) = progress_controller.snapshot(event.player_id()) else {
                return;
            };
            let second = snapshot.state.current_time.floor() as u64;
            if last_second.swap(second, Ordering::Relaxed) != second {
                println!("{}", progress_line(&snapshot.state));
            }
        },
    )?);
    subscription.track(controller.add_event_listener(
        EventKind::BackgroundPlayback,
        |event: &PlayerEvent| {
            if let PlayerEvent::BackgroundPlayback {
                is_playing_in_background,
                ..
            } = event
            {
                println!("Playing in background: {is_playing_in_background}");
            }
        },
    ));
    for kind in EventKind::ALL {
        subscription.track(controller.add_event_listener(kind, |event: &PlayerEvent| {
            tracing::debug!(player_id = %event.player_id(), ?event, "player event");
        }));
    }
    tracing::debug!(listeners = subscription.len(), "listeners registered");

    println!("{HELP}");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await.context("read stdin")? {
        let command = match commands::parse(&line) {
            Ok(Some(command)) => command,
            Ok(None) => continue,
            Err(err) => {
                println!("Error: {err}");
                continue;
            }
        };
        if command == CliCommand::Quit {
            break;
        }
        if let Err(err) = run_command(&controller, backend.loopback.as_ref(), &id, command).await {
            println!("Error: {err}");
        }
    }

    subscription.dispose();
    if controller.snapshot(&id).is_ok() {
        if let Err(err) = controller.remove(&id).await {
            tracing::warn!(player_id = %id, error = %err, "remove on exit failed");
        }
    }
    for task in backend.tasks.drain(..) {
        task.abort();
    }
    Ok(())
}

async fn run_command(
    controller: &PlayerSessionController,
    loopback: Option<&LoopbackPlayer>,
    id: &str,
    command: CliCommand,
) -> Result<()> {
    match command {
        CliCommand::Play => controller.play(id).await?,
        CliCommand::Pause => controller.pause(id).await?,
        CliCommand::Volume(value) => {
            let volume = match value {
                Some(volume) => volume,
                None => next_in_cycle(&VOLUME_STEPS, controller.snapshot(id)?.state.volume),
            };
            controller.set_volume(id, volume).await?;
        }
        CliCommand::Rate(value) => {
            let rate = match value {
                Some(rate) => rate,
                None => next_in_cycle(&RATE_STEPS, controller.snapshot(id)?.state.rate),
            };
            controller.set_rate(id, rate).await?;
        }
        CliCommand::Info => {
            controller.info(id).await?;
        }
        CliCommand::Status => {
            let snapshot = controller.snapshot(id)?;
            println!("Player: {} ({:?})", snapshot.id, snapshot.phase);
            println!("Status: {}", snapshot.status);
            println!("{}", progress_line(&snapshot.state));
            println!(
                "Volume: {}%  Speed: {}x  Muted: {}",
                (snapshot.state.volume * 100.0).round(),
                snapshot.state.rate,
                snapshot.state.is_muted
            );
        }
        CliCommand::Seek(seconds) => {
            let player = simulated(loopback)?;
            if !player.seek(id, seconds).await {
                return Err(SessionError::NotFound(id.to_string()).into());
            }
        }
        CliCommand::FullScreen => {
            if !simulated(loopback)?.toggle_full_screen(id).await {
                return Err(SessionError::NotFound(id.to_string()).into());
            }
        }
        CliCommand::PictureInPicture => {
            if !simulated(loopback)?.toggle_picture_in_picture(id).await {
                return Err(SessionError::NotFound(id.to_string()).into());
            }
        }
        CliCommand::Background => {
            if !simulated(loopback)?.background(id, true).await {
                return Err(SessionError::NotFound(id.to_string()).into());
            }
        }
        CliCommand::Remove => controller.remove(id).await?,
        CliCommand::Help => println!("{HELP}"),
        CliCommand::Quit => {}
    }
    Ok(())
}

fn simulated(loopback: Option<&LoopbackPlayer>) -> Result<&LoopbackPlayer> {
    loopback.ok_or_else(|| anyhow::anyhow!("only available with the loopback player"))
}

/// Print status changes for `id` as they are published.
fn spawn_status_printer(
    id: String,
    mut updates: broadcast::Receiver<SessionUpdate>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut last = String::new();
        loop {
            let status = match updates.recv().await {
                Ok(SessionUpdate::StatusChanged { player_id, status }) if player_id == id => {
                    status
                }
                Ok(SessionUpdate::Removed { player_id }) if player_id == id => {
                    "Player removed".to_string()
                }
                Ok(_) => continue,
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::debug!(skipped, "status printer lagged");
                    continue;
                }
                Err(broadcast::error::RecvError::Closed) => break,
            };
            if status != last {
                println!("Status: {status}");
                last = status;
            }
        }
    })
}

fn progress_line(state: &PlaybackState) -> String {
    let duration = state
        .duration
        .map(format_time)
        .unwrap_or_else(|| "--:--".to_string());
    format!(
        "{} / {} ({:.0}%)",
        format_time(state.current_time),
        duration,
        progress_percent(state)
    )
}

fn demo_options() -> CreateOptions {
    CreateOptions {
        extra: ExtraOptions {
            title: Some("Big Buck Bunny".to_string()),
            subtitle: Some("A free short film".to_string()),
            poster: Some(POSTER_URL.to_string()),
            auto_play_when_ready: Some(false),
            rate: Some(1.0),
        },
        ios: Some(IosOptions {
            shows_playback_controls: Some(true),
            allows_picture_in_picture_playback: Some(true),
        }),
        android: Some(AndroidOptions {
            use_default_controls: Some(true),
            enable_network_security_configuration: Some(true),
        }),
        web: Some(WebOptions {
            enable_chromecast: Some(true),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn progress_line_formats_known_and_unknown_duration() {
        let mut state = PlaybackState {
            current_time: 42.0,
            ..PlaybackState::default()
        };
        assert_eq!(progress_line(&state), "0:42 / --:-- (0%)");
        state.duration = Some(596.0);
        assert_eq!(progress_line(&state), "0:42 / 9:56 (7%)");
    }

    #[test]
    fn demo_options_serialize_platform_sections() {
        let value = serde_json::to_value(demo_options()).unwrap();
        assert_eq!(value["extra"]["title"], "Big Buck Bunny");
        assert_eq!(value["ios"]["allowsPictureInPicturePlayback"], true);
        assert_eq!(value["web"]["enableChromecast"], true);
    }

    #[tokio::test]
    async fn cycling_volume_steps_from_cached_value() {
        let (player, events) = LoopbackPlayer::new(Default::default());
        let controller = PlayerSessionController::new(Arc::new(player.clone()));
        let pump = spawn_event_pump(controller.clone(), events);
        controller
            .create("p1", DEFAULT_MEDIA_URL, Placement::default(), demo_options())
            .await
            .unwrap();

        run_command(&controller, Some(&player), "p1", CliCommand::Volume(None))
            .await
            .unwrap();
        assert_eq!(controller.snapshot("p1").unwrap().state.volume, 1.0);
        run_command(&controller, Some(&player), "p1", CliCommand::Volume(None))
            .await
            .unwrap();
        assert_eq!(controller.snapshot("p1").unwrap().state.volume, 0.0);

        assert!(run_command(&controller, None, "p1", CliCommand::FullScreen)
            .await
            .is_err());
        pump.abort();
    }
}
