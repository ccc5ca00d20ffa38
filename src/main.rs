use std::env;
use std::sync::Arc;

use anyhow::Result;
use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use tokio::sync::Mutex;
use tracing::info;
use tracing_subscriber::EnvFilter;

use alt_text_gen::gemini::{AltTextService, OutputMode};
use alt_text_gen::session::Session;
use alt_text_gen::web_pages::{self, AppState};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .compact()
        .init();

    let port = env::var("PORT")
        .ok()
        .and_then(|value| value.parse::<u16>().ok())
        .unwrap_or(3000);
    let bind_address = format!("0.0.0.0:{}", port);
    let mode = OutputMode::from_env();

    let state = Arc::new(AppState {
        service: AltTextService::new(mode),
        session: Mutex::new(Session::new()),
    });

    let router = axum::Router::new()
        .route("/", get(web_pages::index_page))
        .route(
            "/generate",
            post(web_pages::handle_generate).layer(DefaultBodyLimit::max(10 * 1024 * 1024)),
        )
        .with_state(state);
    let tcp_listener = tokio::net::TcpListener::bind(&bind_address).await?;

    info!(%bind_address, ?mode, "alt text generator started");

    axum::serve(tcp_listener, router)
        .with_graceful_shutdown(async { let _ = tokio::signal::ctrl_c().await; })
        .await?;
    Ok(())
}
