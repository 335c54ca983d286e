pub mod error;
pub mod extractors;
pub mod routes;
pub mod state;
pub mod ws;

use axum::{
    Router,
    extract::State,
    routing::{get, post, put},
};
use state::AppState;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Group routes
    let group_routes = Router::new()
        .route("/", post(routes::group::create))
        .route("/{group_id}", get(routes::group::get))
        .route("/{group_id}/reading-time", put(routes::group::set_reading_time))
        .route("/{group_id}/matching-time", get(routes::group::matching_time))
        .route(
            "/{group_id}/session",
            get(routes::group::list_sessions).post(routes::group::create_session),
        );

    // Session routes
    let session_routes = Router::new().route("/{session_id}", get(routes::session::get));

    // WebRTC signaling relay
    let signaling_routes = Router::new().route(
        "/signaling",
        post(routes::signaling::post)
            .get(routes::signaling::latest)
            .put(routes::signaling::join)
            .delete(routes::signaling::leave),
    );

    let api = Router::new()
        .nest("/group", group_routes)
        .nest("/session", session_routes)
        .nest("/webrtc", signaling_routes);

    // Health check
    let health = Router::new().route("/health", get(health_check));

    Router::new()
        .nest("/api", api)
        .merge(health)
        .route("/ws", get(ws::handler::ws_upgrade))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

async fn health_check(State(state): State<AppState>) -> axum::Json<serde_json::Value> {
    axum::Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "connections": state.ws_storage.connection_count(),
        "liveSessions": state.hub.live_session_count(),
    }))
}
