//! HTTP transport for the Slack slash command endpoint.
//!
//! Routes:
//! - `POST /slack/slash-command`: signature-checked, acknowledged immediately
//! - `GET /health`
//! - `GET /`

use axum::{
    Form, Json, Router,
    extract::State,
    http::StatusCode,
    middleware,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde_json::json;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::signal;
use tracing::{error, info, warn};

use crate::auth::{SignatureVerifier, slack_signature_middleware};
use crate::db::ConnectionPool;
use crate::error::{BotError, BotResult};
use crate::models::{Acknowledgment, Command, SlashCommandForm};
use crate::pipeline::{CommandDispatcher, CommandWorker};

pub const SLASH_COMMAND_PATH: &str = "/slack/slash-command";

/// Time allowed for open connections after a shutdown signal.
const GRACEFUL_TIMEOUT: Duration = Duration::from_secs(30);

/// Time allowed for in-flight commands once the server has stopped.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone)]
struct AppState {
    dispatcher: CommandDispatcher,
}

/// Build the application router.
pub fn router(dispatcher: CommandDispatcher, verifier: Arc<SignatureVerifier>) -> Router {
    let slash = Router::new()
        .route(SLASH_COMMAND_PATH, post(slash_command))
        .route_layer(middleware::from_fn_with_state(
            verifier,
            slack_signature_middleware,
        ))
        .with_state(AppState { dispatcher });

    Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .merge(slash)
}

async fn root() -> Json<serde_json::Value> {
    Json(json!({
        "service": "Slack Data Bot",
        "status": "running",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "healthy" }))
}

/// Acknowledge right away and leave the work to the command worker.
async fn slash_command(
    State(state): State<AppState>,
    Form(form): Form<SlashCommandForm>,
) -> Response {
    let command = match Command::try_from(form) {
        Ok(command) => command,
        Err(e) => {
            warn!(error = %e, "Rejected slash command");
            return error_response(StatusCode::BAD_REQUEST, &e);
        }
    };

    info!(
        user = %command.user_id,
        channel = %command.channel_id,
        question = %command.question,
        "Command received"
    );

    if let Err(e) = state.dispatcher.submit(command) {
        error!(error = %e, "Failed to queue command");
        return error_response(StatusCode::SERVICE_UNAVAILABLE, &e);
    }

    Json(Acknowledgment::processing()).into_response()
}

fn error_response(status: StatusCode, err: &BotError) -> Response {
    let body = json!({
        "error": {
            "code": err.category().to_string(),
            "message": err.user_message(),
        }
    });
    (status, Json(body)).into_response()
}

/// HTTP server owning the worker and pool it shuts down.
pub struct HttpServer {
    host: String,
    port: u16,
    worker: CommandWorker,
    pool: Arc<ConnectionPool>,
    verifier: Arc<SignatureVerifier>,
}

impl HttpServer {
    pub fn new(
        host: impl Into<String>,
        port: u16,
        worker: CommandWorker,
        pool: Arc<ConnectionPool>,
        verifier: Arc<SignatureVerifier>,
    ) -> Self {
        Self {
            host: host.into(),
            port,
            worker,
            pool,
            verifier,
        }
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Bind and serve until SIGINT or SIGTERM.
    pub async fn run(self) -> BotResult<()> {
        let bind_addr = self.bind_addr();
        let listener = TcpListener::bind(&bind_addr).await.map_err(|e| {
            BotError::config(format!("Failed to bind to {}: {}", bind_addr, e))
        })?;
        self.serve(listener, wait_for_signal()).await
    }

    /// Serve on `listener` until `shutdown` resolves, then drain jobs and
    /// close the pool.
    pub async fn serve<F>(self, listener: TcpListener, shutdown: F) -> BotResult<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let local_addr = listener
            .local_addr()
            .map_err(|e| BotError::internal(format!("Listener has no address: {}", e)))?;
        info!(addr = %local_addr, path = SLASH_COMMAND_PATH, "Slash command endpoint ready");

        let app = router(self.worker.dispatcher(), Arc::clone(&self.verifier));

        let shutdown_notify = Arc::new(tokio::sync::Notify::new());
        let shutdown_notify_clone = shutdown_notify.clone();
        let shutdown_signal = async move {
            shutdown.await;
            shutdown_notify_clone.notify_one();
        };

        let server = axum::serve(listener, app).with_graceful_shutdown(shutdown_signal);

        // Race between: server completing normally vs forced timeout/second signal after shutdown
        tokio::select! {
            result = server => {
                match result {
                    Ok(()) => info!("HTTP server stopped"),
                    Err(e) => {
                        error!(error = %e, "HTTP server error");
                        return Err(BotError::internal(format!("HTTP server error: {}", e)));
                    }
                }
            }
            _ = async {
                shutdown_notify.notified().await;
                info!(
                    timeout_secs = GRACEFUL_TIMEOUT.as_secs(),
                    "Waiting for connections to close (send signal again to force exit)..."
                );

                tokio::select! {
                    _ = tokio::time::sleep(GRACEFUL_TIMEOUT) => {
                        warn!("Graceful shutdown timeout, forcing exit");
                    }
                    _ = wait_for_signal() => {
                        warn!("Received second signal, forcing immediate exit");
                    }
                }
            } => {}
        }

        self.worker.shutdown(DRAIN_TIMEOUT).await;

        info!("Closing database connections");
        self.pool.close().await;

        Ok(())
    }
}

/// Wait for a shutdown signal (SIGINT or SIGTERM).
async fn wait_for_signal() {
    let ctrl_c = signal::ctrl_c();

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received SIGINT"),
        _ = terminate => info!("Received SIGTERM"),
    }
}
