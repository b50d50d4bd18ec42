use crate::commands;
use crate::state::AppState;
use axum::{routing::get, Router};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/dashboard", get(commands::dashboard::get_dashboard_axum))
        .route(
            "/api/dashboard/estadisticas",
            get(commands::dashboard::get_estadisticas_axum),
        )
        .route(
            "/api/dashboard/cultivos-por-etapa",
            get(commands::dashboard::get_cultivos_por_etapa_axum),
        )
        .route(
            "/api/dashboard/alertas-pendientes",
            get(commands::alertas::get_alertas_pendientes_axum),
        )
        .route(
            "/api/dashboard/entregas-por-mes",
            get(commands::entregas::get_entregas_por_mes_axum),
        )
        .route(
            "/api/calendario",
            get(commands::calendario::get_calendario_axum),
        )
        .route("/api/mapa", get(commands::mapa::get_mapa_axum))
}
