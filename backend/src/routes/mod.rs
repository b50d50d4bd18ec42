use crate::state::AppState;
use axum::Router;

pub mod alertas;
pub mod auth;
pub mod cultivos;
pub mod dashboard;
pub mod entregas;
pub mod media;
pub mod usuarios;
pub mod utility;

pub fn create_router() -> Router<AppState> {
    Router::new()
        .merge(utility::router())
        .merge(auth::router())
        .merge(dashboard::router())
        .merge(cultivos::router())
        .merge(alertas::router())
        .merge(usuarios::router())
        .merge(entregas::router())
        .merge(media::router())
}
