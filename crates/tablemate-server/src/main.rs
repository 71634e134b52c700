mod config;

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use axum::{
    Router,
    extract::{State, WebSocketUpgrade},
    middleware,
    response::IntoResponse,
    routing::{delete, get, post},
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use tablemate_api::auth::{self, AppState, AppStateInner};
use tablemate_api::middleware::require_auth;
use tablemate_api::moderation::ModerationClient;
use tablemate_api::{checkins, devices, matches, messages};
use tablemate_gateway::connection;
use tablemate_gateway::dispatcher::Dispatcher;
use tablemate_gateway::push::PushClient;

use config::Config;

#[derive(Clone)]
struct ServerState {
    dispatcher: Dispatcher,
    db: Arc<tablemate_db::Database>,
    jwt_secret: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Init logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "tablemate=debug,tower_http=debug".into()),
        )
        .init();

    let config = Config::load()?;

    // Init database
    let db = Arc::new(tablemate_db::Database::open(&PathBuf::from(&config.db_path))?);

    // Shared state
    let dispatcher = Dispatcher::new();
    let app_state: AppState = Arc::new(AppStateInner {
        db: db.clone(),
        jwt_secret: config.jwt_secret.clone(),
        dispatcher: dispatcher.clone(),
        moderation: ModerationClient::new(config.moderation_url.clone()),
        push: PushClient::new(config.push_url.clone(), config.push_api_key.clone()),
        windows: config.windows.clone(),
    });

    // Routes
    let public_routes = Router::new()
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login))
        .with_state(app_state.clone());

    let protected_routes = Router::new()
        .route("/checkins", post(checkins::create))
        .route(
            "/checkins/restaurant/{restaurant_id}",
            get(checkins::list_at_restaurant),
        )
        .route(
            "/checkins/active/{restaurant_id}",
            get(checkins::active_status),
        )
        .route("/checkins/{check_in_id}", delete(checkins::remove))
        .route("/matches/request", post(matches::request))
        .route("/matches/my", get(matches::mine))
        .route("/matches/pending", get(matches::pending))
        .route("/matches/smart/discover", get(matches::discover))
        .route("/matches/{match_id}/accept", post(matches::accept))
        .route("/matches/{match_id}/reject", post(matches::reject))
        .route("/matches/{match_id}", delete(matches::remove))
        .route("/messages", post(messages::create))
        .route("/messages/{match_id}", get(messages::thread))
        .route("/devices", post(devices::register))
        .route("/devices/{token}", delete(devices::unregister))
        .layer(middleware::from_fn_with_state(
            app_state.clone(),
            require_auth,
        ))
        .with_state(app_state.clone());

    let server_state = ServerState {
        dispatcher: dispatcher.clone(),
        db: db.clone(),
        jwt_secret: config.jwt_secret.clone(),
    };
    let ws_route = Router::new()
        .route("/gateway", get(ws_upgrade))
        .with_state(server_state);

    let app = Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .merge(ws_route)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    info!("Tablemate server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

async fn ws_upgrade(State(state): State<ServerState>, ws: WebSocketUpgrade) -> impl IntoResponse {
    ws.on_upgrade(move |socket| {
        connection::handle_connection(socket, state.dispatcher, state.db, state.jwt_secret)
    })
}
