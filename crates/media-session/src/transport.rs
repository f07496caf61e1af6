//! Transport abstraction for dispatching player commands.
//!
//! Implementations carry a [`PlayerCommand`] to the external player and return
//! its [`CommandOutcome`]. Events travel separately (see [`crate::controller::spawn_event_pump`]).

use async_trait::async_trait;

use media_session_types::{CommandOutcome, PlayerCommand};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    /// The external player could not be reached.
    #[error("player offline: {0}")]
    Offline(String),
    /// No answer within the configured timeout.
    #[error("player did not respond in time")]
    Timeout,
    /// The player answered with a non-success HTTP status.
    #[error("player responded with status {status}: {body}")]
    Status { status: u16, body: String },
    /// The response could not be decoded.
    #[error("invalid player response: {0}")]
    Decode(String),
}

#[async_trait]
pub trait PlayerTransport: Send + Sync {
    /// Send one command and wait for the player's outcome.
    async fn send(&self, command: PlayerCommand) -> Result<CommandOutcome, TransportError>;
}
