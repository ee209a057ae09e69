//! HTTP server wiring.

pub mod api;

use crate::core::exec::ExecService;
use crate::domain::ports::{ModuleStore, PageHost};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::Mutex;

pub use api::create_router;

/// State shared by all handlers.
///
/// Submissions take the service lock for their whole duration, so only one
/// submission touches the registry and the module directory at a time.
/// Page reads go straight to the host.
pub struct AppState<S: ModuleStore> {
    pub service: Mutex<ExecService<S>>,
    pub host: Arc<dyn PageHost>,
}

impl<S: ModuleStore> AppState<S> {
    pub fn new(service: ExecService<S>, host: Arc<dyn PageHost>) -> Self {
        Self {
            service: Mutex::new(service),
            host,
        }
    }
}

/// Bind `host:port` and serve until Ctrl-C.
pub async fn run<S: ModuleStore + 'static>(
    host: &str,
    port: u16,
    state: Arc<AppState<S>>,
) -> std::io::Result<()> {
    let listener = TcpListener::bind((host, port)).await?;
    tracing::info!("Listening on {}", listener.local_addr()?);

    axum::serve(listener, create_router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutting down");
}
