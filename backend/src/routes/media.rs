use crate::commands;
use crate::state::AppState;
use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/api/media",
            post(commands::media::upload_media_axum)
                .layer(DefaultBodyLimit::max(commands::media::MAX_UPLOAD_BYTES)),
        )
        .route("/api/media/:name", get(commands::media::serve_media_axum))
}
