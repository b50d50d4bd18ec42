use crate::commands;
use crate::state::AppState;
use axum::{
    routing::{get, post},
    Router,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/auth/register", post(commands::auth::register_axum))
        .route("/api/auth/login", post(commands::auth::login_axum))
        .route("/api/auth/logout", post(commands::auth::logout_axum))
        .route("/api/auth/me", get(commands::auth::me_axum))
        .route(
            "/api/auth/perfil",
            post(commands::auth::update_perfil_axum),
        )
}
