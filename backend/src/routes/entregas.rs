use crate::commands;
use crate::state::AppState;
use axum::{routing::get, Router};

pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/api/entregas",
            get(commands::entregas::get_entregas_axum).post(commands::entregas::create_entrega_axum),
        )
        .route(
            "/api/entregas/:id/comprobante",
            get(commands::reportes::comprobante_entrega_axum),
        )
}
