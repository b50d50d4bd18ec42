use crate::commands;
use crate::state::AppState;
use axum::{
    routing::{get, post},
    Router,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/api/alertas",
            get(commands::alertas::get_alertas_axum).post(commands::alertas::create_alerta_axum),
        )
        .route(
            "/api/alertas/:id/toggle",
            post(commands::alertas::toggle_alerta_axum),
        )
        .route(
            "/api/alertas/:id/delete",
            post(commands::alertas::delete_alerta_axum),
        )
}
