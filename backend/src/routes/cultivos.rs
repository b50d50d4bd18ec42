use crate::commands;
use crate::state::AppState;
use axum::{
    routing::{get, post},
    Router,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/api/cultivos",
            get(commands::cultivos::get_cultivos_axum).post(commands::cultivos::create_cultivo_axum),
        )
        .route("/api/etapas", get(commands::cultivos::catalogo_etapas_axum))
        .route("/api/cultivos/:id", get(commands::cultivos::get_cultivo_axum))
        .route(
            "/api/cultivos/:id/update",
            post(commands::cultivos::update_cultivo_axum),
        )
        .route(
            "/api/cultivos/:id/delete",
            post(commands::cultivos::delete_cultivo_axum),
        )
        // Stages
        .route(
            "/api/cultivos/:id/etapas",
            get(commands::cultivos::get_etapas_axum).post(commands::cultivos::change_stage_axum),
        )
        .route(
            "/api/cultivos/:id/etapas/siguiente",
            post(commands::cultivos::advance_stage_axum),
        )
        // Observations
        .route(
            "/api/cultivos/:id/observaciones",
            get(commands::cultivos::get_observaciones_axum)
                .post(commands::cultivos::create_observacion_axum),
        )
        .route(
            "/api/cultivos/:id/reporte",
            get(commands::reportes::reporte_cultivo_axum),
        )
}
