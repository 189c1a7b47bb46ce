//! Connection state shared by storage implementations.

use std::sync::Arc;

use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use crate::error::StorageError;

/// Watch-backed connected flag with a cancellable wait.
///
/// Implementations flip the flag as their underlying transport comes and
/// goes; the engine blocks on [`ConnectionState::wait_for_connected`] during
/// its connecting phase.
#[derive(Debug, Clone)]
pub struct ConnectionState {
    tx: Arc<watch::Sender<bool>>,
}

impl ConnectionState {
    pub fn new(connected: bool) -> Self {
        Self {
            tx: Arc::new(watch::channel(connected).0),
        }
    }

    /// Create a state that reports connected immediately.
    pub fn connected() -> Self {
        Self::new(true)
    }

    pub fn set_connected(&self, connected: bool) {
        self.tx.send_replace(connected);
    }

    pub fn is_connected(&self) -> bool {
        *self.tx.subscribe().borrow()
    }

    /// Wait until the connection reports connected.
    ///
    /// Returns [`StorageError::Cancelled`] if the token fires first.
    pub async fn wait_for_connected(
        &self,
        token: &CancellationToken,
    ) -> Result<(), StorageError> {
        let mut rx = self.tx.subscribe();
        loop {
            if *rx.borrow_and_update() {
                return Ok(());
            }
            tokio::select! {
                _ = token.cancelled() => return Err(StorageError::Cancelled),
                changed = rx.changed() => {
                    if changed.is_err() {
                        return Err(StorageError::backend("connection state dropped"));
                    }
                }
            }
        }
    }
}

impl Default for ConnectionState {
    fn default() -> Self {
        Self::connected()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_wait_returns_immediately_when_connected() {
        let state = ConnectionState::connected();
        let token = CancellationToken::new();
        state.wait_for_connected(&token).await.unwrap();
    }

    #[tokio::test]
    async fn test_wait_resolves_after_connect() {
        let state = ConnectionState::new(false);
        let token = CancellationToken::new();

        let waiter = {
            let state = state.clone();
            let token = token.clone();
            tokio::spawn(async move { state.wait_for_connected(&token).await })
        };

        state.set_connected(true);
        waiter.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_wait_cancelled() {
        let state = ConnectionState::new(false);
        let token = CancellationToken::new();
        token.cancel();

        let err = state.wait_for_connected(&token).await.unwrap_err();
        assert!(matches!(err, StorageError::Cancelled));
    }
}
