use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, services::ServeDir, trace::TraceLayer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use wordmoney::{
    api, broadcast, config::GameConfig, lookup::DictionaryClient, state::AppState,
    words::ThemeRegistry, ws,
};

#[tokio::main]
async fn main() -> std::io::Result<()> {
    // Load .env file if present (before any env var reads)
    if let Err(e) = dotenvy::dotenv() {
        // Not an error if .env doesn't exist, only log if it's a different issue
        if !matches!(e, dotenvy::Error::Io(_)) {
            eprintln!("Warning: Failed to load .env file: {}", e);
        }
    }

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "wordmoney=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting WordMoney...");

    let config = GameConfig::from_env();

    let themes = match &config.wordlist_dir {
        Some(dir) => {
            tracing::info!("Loading word lists from {}", dir.display());
            ThemeRegistry::from_dir(dir)
        }
        None => ThemeRegistry::builtin(),
    };

    let dictionary = match DictionaryClient::from_config(&config) {
        Ok(client) => Some(client),
        Err(e) => {
            tracing::warn!(
                "Failed to initialize dictionary client: {}. Definitions will not be available.",
                e
            );
            None
        }
    };

    let bind_addr = config.bind_addr;
    let mut app_state = AppState::with_config(config, themes);
    if let Some(client) = dictionary {
        app_state = app_state.with_dictionary(Arc::new(client));
    }
    let state = Arc::new(app_state);

    // Stale marking, idle kicks, turn hand-off and timers
    broadcast::spawn_liveness_sweeper(state.clone());

    // TTL eviction of anonymous players and empty rooms
    broadcast::spawn_eviction_job(state.clone());

    let app = Router::new()
        .route("/ws", get(ws::ws_handler))
        .route("/api/guess", post(api::submit_guess))
        .route("/api/define/{word}", get(api::define_word))
        .route("/health", get(api::health))
        .fallback_service(ServeDir::new("static"))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    tracing::info!("Listening on http://{}", bind_addr);

    let listener = tokio::net::TcpListener::bind(bind_addr).await?;
    axum::serve(listener, app).await
}
