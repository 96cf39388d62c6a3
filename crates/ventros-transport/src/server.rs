//! Transport server using Axum.
//!
//! Binds the loopback listener, mounts the gateway, IPC, and health
//! routes, and owns the graceful-shutdown handle.

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use axum::{
    Router,
    extract::State,
    response::{IntoResponse, Json},
    routing::get,
};
use serde_json::json;
use tokio::sync::{broadcast, mpsc};
use tracing::info;
use ventros_protocol::{HandlerResult, NotFoundKind, RouteTarget};

use crate::{gateway, ipc};

/// Implemented by the host shell to answer IPC requests.
pub trait RequestHandler: Send + Sync + 'static {
    fn handle_request(
        &self,
        method: &str,
        params: Option<serde_json::Value>,
    ) -> impl std::future::Future<Output = HandlerResult> + Send;
}

/// Implemented by the gateway router to decide where a `ventros://`
/// request goes.
pub trait RouteResolver: Send + Sync + 'static {
    /// Early redirect for `.service` hosts with a live port.
    fn rewrite_if_service(&self, url: &str) -> Option<String>;

    fn resolve(&self, url: &str) -> impl std::future::Future<Output = RouteTarget> + Send;

    fn not_found_payload(&self, kind: NotFoundKind) -> impl std::future::Future<Output = Vec<u8>> + Send;

    /// What `/` serves: the launcher, a home page, or the welcome page.
    fn entry(&self) -> impl std::future::Future<Output = RouteTarget> + Send;

    /// Number of live services, reported by `/health`.
    fn service_count(&self) -> usize;
}

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("invalid listen address {0}")]
    InvalidAddress(String),

    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },
}

/// Transport server configuration.
#[derive(Debug, Clone)]
pub struct TransportConfig {
    /// Port to listen on (0 for OS-assigned)
    pub port: u16,
    pub hostname: String,
    /// Maximum concurrent IPC connections
    pub max_connections: Option<usize>,
    /// Log every gateway request at info instead of debug
    pub verbose_logging: bool,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            port: 7341,
            hostname: "127.0.0.1".into(),
            max_connections: Some(32),
            verbose_logging: false,
        }
    }
}

/// Shared state for the transport server.
pub(crate) struct AppState<R: RouteResolver, H: RequestHandler> {
    pub(crate) resolver: Arc<R>,
    pub(crate) handler: Arc<H>,
    pub(crate) config: TransportConfig,
    /// Broadcast channel for notifications (host → all IPC clients)
    pub(crate) notification_tx: broadcast::Sender<String>,
    pub(crate) client_count: Arc<AtomicUsize>,
}

pub struct TransportServer {
    shutdown_tx: Option<mpsc::Sender<()>>,
    handle: Option<tokio::task::JoinHandle<()>>,
    /// Actual bound port
    port: u16,
}

impl TransportServer {
    /// Start with a fresh notification channel.
    pub async fn start<R: RouteResolver, H: RequestHandler>(
        config: TransportConfig,
        resolver: Arc<R>,
        handler: Arc<H>,
    ) -> Result<Self, TransportError> {
        let (notification_tx, _) = broadcast::channel(1024);
        Self::start_with_sender(config, resolver, handler, notification_tx).await
    }

    /// Start with a pre-existing broadcast channel so other subsystems (the
    /// supervisor) can publish to IPC clients.
    pub async fn start_with_sender<R: RouteResolver, H: RequestHandler>(
        config: TransportConfig,
        resolver: Arc<R>,
        handler: Arc<H>,
        notification_tx: broadcast::Sender<String>,
    ) -> Result<Self, TransportError> {
        let (shutdown_tx, mut shutdown_rx) = mpsc::channel(1);

        let state = Arc::new(AppState {
            resolver,
            handler,
            config: config.clone(),
            notification_tx,
            client_count: Arc::new(AtomicUsize::new(0)),
        });

        let app = Router::new()
            .route("/", get(gateway::entry_handler::<R, H>))
            .route("/ipc", get(ipc::ipc_upgrade_handler::<R, H>))
            .route("/health", get(health_handler::<R, H>))
            .fallback(gateway::gateway_handler::<R, H>)
            .with_state(state);

        let addr: SocketAddr = format!("{}:{}", config.hostname, config.port)
            .parse()
            .map_err(|_| TransportError::InvalidAddress(format!("{}:{}", config.hostname, config.port)))?;
        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .map_err(|source| TransportError::Bind { addr, source })?;
        let actual_port = listener
            .local_addr()
            .map_err(|source| TransportError::Bind { addr, source })?
            .port();

        info!("Gateway listening on http://{}:{}/", config.hostname, actual_port);

        let handle = tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async move {
                    let _ = shutdown_rx.recv().await;
                })
                .await
                .ok();
        });

        Ok(Self {
            shutdown_tx: Some(shutdown_tx),
            handle: Some(handle),
            port: actual_port,
        })
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// Gracefully stop the server.
    pub async fn stop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(()).await;
        }
        if let Some(handle) = self.handle.take() {
            let _ = handle.await;
        }
        info!("Gateway stopped");
    }
}

async fn health_handler<R: RouteResolver, H: RequestHandler>(
    State(state): State<Arc<AppState<R, H>>>,
) -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "services": state.resolver.service_count(),
        "clients": state.client_count.load(Ordering::Relaxed),
    }))
}
