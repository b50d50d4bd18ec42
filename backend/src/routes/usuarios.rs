use crate::commands;
use crate::state::AppState;
use axum::{
    routing::{get, post},
    Router,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/api/usuarios-finales",
            get(commands::usuarios::get_usuarios_finales_axum)
                .post(commands::usuarios::create_usuario_final_axum),
        )
        .route(
            "/api/usuarios-finales/:id",
            get(commands::usuarios::get_usuario_final_axum),
        )
        .route(
            "/api/usuarios-finales/:id/update",
            post(commands::usuarios::update_usuario_final_axum),
        )
        .route(
            "/api/usuarios-finales/:id/delete",
            post(commands::usuarios::delete_usuario_final_axum),
        )
}
