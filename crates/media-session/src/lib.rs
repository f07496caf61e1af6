//! Player session control for an externally rendered media player.
//!
//! [`PlayerSessionController`] issues commands through a [`PlayerTransport`]
//! and mirrors the player's state from its pushed events.

pub mod config;
pub mod controller;
pub mod error;
pub mod events;
pub mod http_transport;
pub mod listeners;
pub mod logging;
pub mod loopback;
mod registry;
pub mod status;
pub mod transport;

pub use controller::{PlayerSessionController, generate_player_id, spawn_event_pump};
pub use error::SessionError;
pub use events::SessionUpdate;
pub use http_transport::HttpTransport;
pub use listeners::{ListenerHandle, SubscriptionGuard};
pub use loopback::LoopbackPlayer;
pub use transport::{PlayerTransport, TransportError};
