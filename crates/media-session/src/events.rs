//! In-process update bus for UI subscribers.
//!
//! Provides a lightweight broadcast channel announcing local cache changes.

use tokio::sync::broadcast;

/// Notification published after the controller changes its local cache.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionUpdate {
    /// Cached playback state or phase of a player changed.
    StateChanged { player_id: String },
    /// Status text of a player changed.
    StatusChanged { player_id: String, status: String },
    /// A player session was torn down.
    Removed { player_id: String },
}

#[derive(Clone)]
pub struct UpdateBus {
    sender: broadcast::Sender<SessionUpdate>,
}

impl UpdateBus {
    /// Create a new bus with a bounded broadcast channel.
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(64);
        Self { sender }
    }

    /// Subscribe to the update stream.
    pub fn subscribe(&self) -> broadcast::Receiver<SessionUpdate> {
        self.sender.subscribe()
    }

    pub fn state_changed(&self, player_id: &str) {
        let _ = self.sender.send(SessionUpdate::StateChanged {
            player_id: player_id.to_string(),
        });
    }

    pub fn status_changed(&self, player_id: &str, status: &str) {
        let _ = self.sender.send(SessionUpdate::StatusChanged {
            player_id: player_id.to_string(),
            status: status.to_string(),
        });
    }

    pub fn removed(&self, player_id: &str) {
        let _ = self.sender.send(SessionUpdate::Removed {
            player_id: player_id.to_string(),
        });
    }
}

impl Default for UpdateBus {
    fn default() -> Self {
        Self::new()
    }
}
