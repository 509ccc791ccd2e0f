use std::time::Duration;

use tokio::sync::watch;

use crate::utils::{RelayError, Result};

/// Lifecycle of a publisher or subscriber connection.
///
/// `Created → Connecting → Connected`, back to `Connecting` on every
/// disconnect, and `Stopped` once the owner asks for it (or the reconnect
/// policy gives up).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Created,
    Connecting,
    Connected,
    Stopped,
}

/// Resolves when `state` reaches `Connected`.
pub(crate) async fn wait_connected(
    state: &watch::Receiver<ConnectionState>,
    timeout: Duration,
) -> Result<()> {
    let mut state = state.clone();
    let reached = tokio::time::timeout(timeout, async move {
        state
            .wait_for(|s| matches!(s, ConnectionState::Connected | ConnectionState::Stopped))
            .await
            .map(|s| *s)
    })
    .await;

    match reached {
        Ok(Ok(ConnectionState::Connected)) => Ok(()),
        Ok(_) => Err(RelayError::Stopped),
        Err(_) => Err(RelayError::Timeout(timeout)),
    }
}
