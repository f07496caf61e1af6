//! Configuration loading and parsing.
//!
//! Defines the session config schema and resolves defaults.

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;

const DEFAULT_TIMEOUT_MS: u64 = 3000;
const DEFAULT_LOOPBACK_DURATION_SEC: f64 = 596.0;
const DEFAULT_TICK_MS: u64 = 250;
const DEFAULT_MAX_RATE: f64 = 2.0;

/// Top-level configuration loaded from TOML.
#[derive(Debug, Default, Deserialize)]
pub struct SessionConfig {
    /// Tracing filter used when `RUST_LOG` is not set.
    pub log_filter: Option<String>,
    /// External player transport settings.
    pub transport: Option<TransportConfig>,
    /// Initial cached values for new sessions.
    pub defaults: Option<DefaultsConfig>,
    /// Simulated player settings (used when no endpoint is configured).
    pub loopback: Option<LoopbackConfig>,
}

/// Transport config from TOML.
#[derive(Debug, Default, Deserialize)]
pub struct TransportConfig {
    /// Base URL of an HTTP player endpoint.
    pub endpoint: Option<String>,
    /// Per-command timeout in milliseconds.
    pub timeout_ms: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
pub struct DefaultsConfig {
    pub volume: Option<f64>,
    pub rate: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
pub struct LoopbackConfig {
    /// Duration reported for every loaded source, in seconds.
    pub duration_sec: Option<f64>,
    /// Interval between simulated time updates.
    pub tick_ms: Option<u64>,
    /// Rates above this are refused with `rate too high`.
    pub max_rate: Option<f64>,
}

/// Initial cached volume and rate for new sessions.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlaybackDefaults {
    pub volume: f64,
    pub rate: f64,
}

impl Default for PlaybackDefaults {
    fn default() -> Self {
        Self {
            volume: 0.5,
            rate: 1.0,
        }
    }
}

/// Resolved simulated-player settings.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LoopbackSettings {
    pub duration_sec: f64,
    pub tick: Duration,
    pub max_rate: f64,
}

impl Default for LoopbackSettings {
    fn default() -> Self {
        Self {
            duration_sec: DEFAULT_LOOPBACK_DURATION_SEC,
            tick: Duration::from_millis(DEFAULT_TICK_MS),
            max_rate: DEFAULT_MAX_RATE,
        }
    }
}

impl SessionConfig {
    /// Load configuration from disk.
    pub fn load(path: &Path) -> Result<Self> {
        let raw =
            std::fs::read_to_string(path).with_context(|| format!("read config {:?}", path))?;
        Self::parse(&raw).with_context(|| format!("parse config {:?}", path))
    }

    /// Parse configuration from a TOML string.
    pub fn parse(raw: &str) -> Result<Self> {
        Ok(toml::from_str::<SessionConfig>(raw)?)
    }
}

/// Extract the optional HTTP endpoint, trimmed of trailing slashes.
pub fn endpoint_from_config(cfg: &SessionConfig) -> Option<String> {
    cfg.transport
        .as_ref()
        .and_then(|t| t.endpoint.as_deref())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| s.trim_end_matches('/').to_string())
}

/// Resolve the per-command transport timeout.
pub fn timeout_from_config(cfg: &SessionConfig) -> Duration {
    let ms = cfg
        .transport
        .as_ref()
        .and_then(|t| t.timeout_ms)
        .filter(|ms| *ms > 0)
        .unwrap_or(DEFAULT_TIMEOUT_MS);
    Duration::from_millis(ms)
}

/// Resolve and validate playback defaults.
pub fn defaults_from_config(cfg: &SessionConfig) -> Result<PlaybackDefaults> {
    let mut defaults = PlaybackDefaults::default();
    let Some(section) = cfg.defaults.as_ref() else {
        return Ok(defaults);
    };
    if let Some(volume) = section.volume {
        if !(0.0..=1.0).contains(&volume) {
            return Err(anyhow::anyhow!(
                "defaults.volume must be within [0, 1], got {volume}"
            ));
        }
        defaults.volume = volume;
    }
    if let Some(rate) = section.rate {
        if !(rate.is_finite() && rate > 0.0) {
            return Err(anyhow::anyhow!("defaults.rate must be > 0, got {rate}"));
        }
        defaults.rate = rate;
    }
    Ok(defaults)
}

/// Resolve simulated-player settings.
pub fn loopback_from_config(cfg: &SessionConfig) -> Result<LoopbackSettings> {
    let mut settings = LoopbackSettings::default();
    let Some(section) = cfg.loopback.as_ref() else {
        return Ok(settings);
    };
    if let Some(duration) = section.duration_sec {
        if !(duration.is_finite() && duration > 0.0) {
            return Err(anyhow::anyhow!(
                "loopback.duration_sec must be > 0, got {duration}"
            ));
        }
        settings.duration_sec = duration;
    }
    if let Some(tick_ms) = section.tick_ms.filter(|ms| *ms > 0) {
        settings.tick = Duration::from_millis(tick_ms);
    }
    if let Some(max_rate) = section.max_rate {
        if !(max_rate.is_finite() && max_rate > 0.0) {
            return Err(anyhow::anyhow!(
                "loopback.max_rate must be > 0, got {max_rate}"
            ));
        }
        settings.max_rate = max_rate;
    }
    Ok(settings)
}
