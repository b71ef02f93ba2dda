use crate::{
    config::{ConfigError, get_env},
    gateway::HttpAuthGateway,
    server::ServerState,
    service::PostService,
};
use quill_db::{client::DbClient, store::DbError};
use std::sync::Arc;
use thiserror::Error;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod config;
mod context;
mod gateway;
mod server;
mod service;
#[cfg(test)]
mod testing;

#[derive(Debug, Error)]
enum InitError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("Error setting up the database: {0}")]
    Database(#[from] DbError),
    #[error("Error building the authentication client: {0}")]
    AuthClient(#[from] reqwest::Error),
    #[error("Error binding tcp listener: {0}")]
    TcpBind(std::io::Error),
    #[error("Error serving server: {0}")]
    TcpServe(std::io::Error),
}

fn install_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "quill_api=debug,\
                quill_db=debug,\
                tower_http=debug,axum::rejection=trace,sqlx=warn"
                    .into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

async fn shutdown_signal(shutdown: CancellationToken) {
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            error!(%err, "Could not listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(err) => {
                error!(%err, "Could not listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    info!("Shutdown signal received");
    shutdown.cancel();
}

#[tokio::main]
async fn main() -> Result<(), InitError> {
    install_tracing();
    let env = get_env()?;

    let db = Arc::new(DbClient::connect(&env.database_url, env.database_max_connections).await?);
    if env.run_migrations {
        db.migrate().await?;
        info!("Database migrations applied");
    }

    let auth = Arc::new(HttpAuthGateway::new(
        &env.auth_service_url,
        env.auth_timeout(),
    )?);
    let posts = PostService::new(auth, db.clone());
    let state = ServerState {
        posts: Arc::new(posts),
    };
    let app = server::app(state, env.request_timeout());

    let listener = tokio::net::TcpListener::bind(env.server_socket())
        .await
        .map_err(InitError::TcpBind)?;
    info!(address = %env.server_socket(), "Post service listening");

    let shutdown = CancellationToken::new();
    tokio::spawn(shutdown_signal(shutdown.clone()));

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown.cancelled_owned())
        .await
        .map_err(InitError::TcpServe)?;

    db.close().await;
    info!("Post service gracefully stopped");

    Ok(())
}
