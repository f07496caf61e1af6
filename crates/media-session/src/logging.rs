//! Tracing subscriber setup.

use anyhow::Result;
use tracing_subscriber::EnvFilter;

const DEFAULT_FILTER: &str = "info";

/// Install the global fmt subscriber.
///
/// `RUST_LOG` wins over `config_filter`, which wins over `info`.
pub fn init(config_filter: Option<&str>) -> Result<()> {
    let filter = resolve_filter(config_filter)?;
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|err| anyhow::anyhow!("install tracing subscriber: {err}"))
}

fn resolve_filter(config_filter: Option<&str>) -> Result<EnvFilter> {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return Ok(filter);
    }
    let directive = config_filter
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .unwrap_or(DEFAULT_FILTER);
    EnvFilter::try_new(directive).map_err(|err| anyhow::anyhow!("invalid log filter {directive:?}: {err}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_filter_is_validated() {
        if std::env::var_os("RUST_LOG").is_some() {
            return;
        }
        assert!(resolve_filter(Some("media_session=debug")).is_ok());
        assert!(resolve_filter(Some("   ")).is_ok());
        assert!(resolve_filter(None).is_ok());
        assert!(resolve_filter(Some("media_session=notalevel")).is_err());
    }
}
