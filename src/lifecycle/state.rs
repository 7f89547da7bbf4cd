//! Server lifecycle states.
//!
//! ```text
//! Created → Listening → ShuttingDown → Stopped
//!               │              │
//!               └──→ Fatal ←───┘ (listener failure / drain timeout)
//! ```

use tokio::sync::watch;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerState {
    Created,
    Listening,
    ShuttingDown,
    Stopped,
    Fatal,
}

impl ServerState {
    /// `Stopped` and `Fatal` are final.
    pub fn is_terminal(self) -> bool {
        matches!(self, ServerState::Stopped | ServerState::Fatal)
    }
}

impl std::fmt::Display for ServerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ServerState::Created => "created",
            ServerState::Listening => "listening",
            ServerState::ShuttingDown => "shutting_down",
            ServerState::Stopped => "stopped",
            ServerState::Fatal => "fatal",
        };
        f.write_str(name)
    }
}

/// Publishes state transitions to any number of watchers.
#[derive(Debug, Clone)]
pub struct StateCell {
    tx: watch::Sender<ServerState>,
}

impl StateCell {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(ServerState::Created);
        Self { tx }
    }

    pub fn get(&self) -> ServerState {
        *self.tx.borrow()
    }

    /// Move to `next` unless the current state is terminal.
    pub fn set(&self, next: ServerState) {
        self.tx.send_if_modified(|current| {
            if current.is_terminal() || *current == next {
                return false;
            }
            tracing::debug!(from = %current, to = %next, "Server state changed");
            *current = next;
            true
        });
    }

    pub fn subscribe(&self) -> watch::Receiver<ServerState> {
        self.tx.subscribe()
    }
}

impl Default for StateCell {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_states_stick() {
        let cell = StateCell::new();
        let rx = cell.subscribe();

        cell.set(ServerState::Listening);
        cell.set(ServerState::Fatal);
        cell.set(ServerState::Stopped);

        assert_eq!(cell.get(), ServerState::Fatal);
        assert_eq!(*rx.borrow(), ServerState::Fatal);
    }

    #[tokio::test]
    async fn watchers_see_transitions() {
        let cell = StateCell::new();
        let mut rx = cell.subscribe();

        cell.set(ServerState::Listening);
        rx.changed().await.unwrap();
        assert_eq!(*rx.borrow_and_update(), ServerState::Listening);
    }
}
