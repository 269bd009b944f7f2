//! Web server for the monitor page, media feeds and control endpoints.

pub mod config;
pub mod handlers;
pub mod router;
pub mod state;

pub use config::WebConfig;
pub use router::create_app;
pub use state::AppState;

use crate::error::{MonitorError, Result};
use std::future::{Future, IntoFuture};
use tracing::{info, warn};

/// Serve until Ctrl-C or a server error, then release every device.
pub async fn start_web_server(config: WebConfig, state: AppState) -> Result<()> {
    let app = create_app(&config, state.clone())?;

    let addr = config.bind_address()?;

    info!("Starting Nursery Pi web server on http://{}", addr);
    info!("Video feed: http://{}/video_feed", addr);
    info!("Audio feed: http://{}/audio_feed", addr);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| MonitorError::web_server_error(format!("Failed to bind to address: {}", e)))?;

    // Media feeds never end on their own, so the server is dropped on
    // Ctrl-C rather than drained.
    let served = tokio::select! {
        result = axum::serve(listener, app).into_future() => {
            result.map_err(|e| MonitorError::web_server_error(format!("Server error: {}", e)))
        }
        _ = shutdown_signal() => Ok(()),
    };

    state.shutdown().await;
    served
}

async fn shutdown_signal() {
    shutdown_on(tokio::signal::ctrl_c()).await
}

/// Resolves once `signal` fires. If the signal cannot be registered the
/// server keeps running until the process is killed.
async fn shutdown_on(signal: impl Future<Output = std::io::Result<()>>) {
    match signal.await {
        Ok(()) => info!("Shutdown requested"),
        Err(e) => {
            warn!("Failed to listen for Ctrl-C, serving until killed: {}", e);
            std::future::pending::<()>().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;
    use std::time::Duration;
    use tokio::time::timeout;

    #[tokio::test]
    async fn test_signal_ends_serving() {
        let fired = timeout(Duration::from_millis(100), shutdown_on(async { Ok(()) })).await;
        assert!(fired.is_ok());
    }

    #[tokio::test]
    async fn test_failed_signal_registration_keeps_serving() {
        let failed = async { Err(io::Error::new(io::ErrorKind::Other, "no signal driver")) };
        let waited = timeout(Duration::from_millis(100), shutdown_on(failed)).await;
        assert!(waited.is_err());
    }
}
