//! Minimal account backend: save a user, check a username/password pair.

use std::sync::Arc;

use axum::{routing::post, Router};
use tokio::{net::TcpListener, signal};
use tracing::{error, info};

pub mod error;
pub mod routes;
pub mod users;

use crate::error::Result;
use routes::{login_handler, save_user_handler};
use users::UserDb;

pub struct ServerState {
    pub users: UserDb,
}

pub fn router(state: Arc<ServerState>) -> Router {
    Router::new()
        .route("/api/saveUser", post(save_user_handler))
        .route("/api/login", post(login_handler))
        .with_state(state)
}

pub async fn serve(users: UserDb, port: u16) -> Result<()> {
    let state = Arc::new(ServerState { users });
    let app = router(state);

    let address = format!("0.0.0.0:{port}");
    info!("Binding to {address}");
    let listener = TcpListener::bind(&address).await?;
    info!("Server running on {address}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shut down");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        match signal::ctrl_c().await {
            Ok(()) => info!("Received Ctrl+C, shutting down"),
            Err(e) => {
                error!("Failed to install Ctrl+C handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut term) => {
                term.recv().await;
                info!("Received terminate signal, shutting down");
            }
            Err(e) => {
                error!("Failed to install signal handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
