mod config;
mod handlers;
mod pages;


use axum::routing::{get, post};
use axum::Router;
use clap::Parser;
use handlers::AppState;
use std::sync::Arc;
use std::time::Duration;
use tower_sessions::{Expiry, MemoryStore, SessionManagerLayer};
use views::{DemoQueryApi, QueryApi, RemoteQueryApi};

use crate::config::load_config;

#[derive(Parser)]
#[command(name = "quota-dashboard")]
struct Args {
    #[arg(long, default_value = "config")]
    config_file: String,

    #[arg(long)]
    demo: bool,
}

pub fn build_router(state: AppState) -> Router {
    let base = state.base_path.clone();

    let routes = Router::new()
        .route("/", get(handlers::home))
        .route(
            "/query",
            get(handlers::token_query).post(handlers::submit_lookup),
        )
        .route("/sync", get(handlers::github_sync))
        .route("/sync/config", post(handlers::save_sync_config))
        .route("/sync/run", post(handlers::run_sync))
        .with_state(state);

    if base == "/" {
        routes
    } else {
        Router::new().nest(&base, routes)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init_from_env(env_logger::Env::default().default_filter_or("server=info"));

    let args = Args::parse();
    let app_config = load_config(&args.config_file).await?;

    let (api, api_label): (Arc<dyn QueryApi>, String) = if args.demo {
        log::info!("Running in DEMO mode");
        (Arc::new(DemoQueryApi::new()), "demo".to_string())
    } else {
        let client = remote::new_client(
            &app_config.api_base_url,
            app_config.access_token.clone(),
            Duration::from_secs(app_config.request_timeout_secs),
        )?;
        log::info!("Querying {}", client.base_url());
        let label = client.base_url().to_string();
        (Arc::new(RemoteQueryApi { client }), label)
    };

    let session_store = MemoryStore::default();
    let session_layer = SessionManagerLayer::new(session_store)
        .with_expiry(Expiry::OnInactivity(time::Duration::seconds(handlers::SESSION_IDLE_SECS)))
        .with_same_site(tower_sessions::cookie::SameSite::Lax);

    let state = AppState::new(api, app_config.base_path, api_label);
    let app = build_router(state).layer(session_layer);

    let listener =
        tokio::net::TcpListener::bind(format!("{}:{}", app_config.host, app_config.port)).await?;
    log::info!(
        "Listening on http://{}:{}",
        app_config.host,
        app_config.port
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
