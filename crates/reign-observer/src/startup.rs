//! Background launch of the observer server.
//!
//! [`spawn_observer`] binds eagerly, so a taken port is reported to the
//! caller instead of being logged from inside a detached task, then serves
//! on a background Tokio task.

use std::net::SocketAddr;
use std::sync::Arc;

use reign_core::config::ServerConfig;
use tokio::task::JoinHandle;

use crate::server::{ServerError, bind, serve};
use crate::state::AppState;

/// Errors that can occur when spawning the observer server.
#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    /// The server failed to bind or start.
    #[error("server start error: {0}")]
    Server(#[from] ServerError),
}

/// Bind the observer and serve it on a background task.
///
/// Returns the bound address (useful with port `0`) and the task handle.
/// The server runs until the runtime shuts down or the task is aborted.
///
/// # Errors
///
/// Returns [`StartupError::Server`] if the address cannot be bound.
pub async fn spawn_observer(
    config: &ServerConfig,
    state: Arc<AppState>,
) -> Result<(SocketAddr, JoinHandle<()>), StartupError> {
    let listener = bind(config).await?;
    let addr = listener
        .local_addr()
        .map_err(|e| ServerError::Bind(format!("no local address: {e}")))?;

    let handle = tokio::spawn(async move {
        if let Err(e) = serve(listener, state).await {
            tracing::error!(error = %e, "Observer server exited with error");
        }
    });

    tracing::info!(%addr, "Observer server spawned on background task");

    Ok((addr, handle))
}
