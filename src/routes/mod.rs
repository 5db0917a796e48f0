// HTTP + WebSocket routes

mod http;
mod ws;

use axum::{
    Router,
    routing::{get, post},
};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

use crate::hub::HubServices;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) services: Arc<HubServices>,
}

pub fn app(services: Arc<HubServices>) -> Router {
    let state = AppState { services };
    Router::new()
        .route("/", get(|| async { "Home Site backend" })) // GET /
        .route("/version", get(http::version_handler)) // GET /version
        .route("/api/sockets", get(http::sockets_handler)) // GET /api/sockets
        .route("/api/sockets/{id}/on", get(http::socket_on_handler)) // GET /api/sockets/{id}/on
        .route("/api/sockets/{id}/off", get(http::socket_off_handler)) // GET /api/sockets/{id}/off
        .route("/api/lights", get(http::lights_handler)) // GET /api/lights
        .route("/api/lights/{id}", get(http::light_handler)) // GET /api/lights/{id}
        .route("/api/lights/{id}/{command}", post(http::light_command_handler)) // POST /api/lights/{id}/{command}
        .route("/api/params", get(http::params_handler)) // GET /api/params
        .route("/api/stats", get(http::stats_handler)) // GET /api/stats
        .route("/api/worktype", get(http::worktype_handler)) // GET /api/worktype
        .route("/api/sub", get(http::sub_handler)) // GET /api/sub
        .route("/api/sbu", get(http::sbu_handler)) // GET /api/sbu
        .route("/api/history/days", get(http::history_days_handler)) // GET /api/history/days
        .route("/api/history/months", get(http::history_months_handler)) // GET /api/history/months
        .route("/epg/{slot}", get(http::epg_handler)) // GET /epg/{slot}
        .route("/ws/sockets", get(ws::ws_sockets)) // WS /ws/sockets
        .route("/ws/lights", get(ws::ws_lights)) // WS /ws/lights
        .layer(CorsLayer::new().allow_origin(Any))
        .with_state(state)
}
