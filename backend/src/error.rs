use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum FecanboError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Authentication failed: {0}")]
    Auth(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("Bcrypt error: {0}")]
    Bcrypt(#[from] bcrypt::BcryptError),

    #[error("Token error: {0}")]
    Token(#[from] jsonwebtoken::errors::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl FecanboError {
    /// Wraps a data-layer failure of a named operation: the cause is logged,
    /// the caller only sees the generic message.
    pub fn operation(message: &str, err: impl std::fmt::Display) -> Self {
        tracing::error!("{}: {}", message, err);
        FecanboError::Internal(message.to_string())
    }
}

pub type FecanboResult<T> = Result<T, FecanboError>;

impl IntoResponse for FecanboError {
    fn into_response(self) -> Response {
        let (status, error_message) = match self {
            FecanboError::Database(ref e) => {
                tracing::error!("Database Error: {:?}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "No se pudo completar la operación. Intenta de nuevo.".to_string(),
                )
            }
            FecanboError::Auth(msg) => (StatusCode::UNAUTHORIZED, msg),
            FecanboError::Token(e) => {
                tracing::debug!("Rejected session token: {}", e);
                (
                    StatusCode::UNAUTHORIZED,
                    "Sesión inválida o vencida. Inicia sesión nuevamente.".to_string(),
                )
            }
            FecanboError::Validation(msg) => (StatusCode::BAD_REQUEST, msg),
            FecanboError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            // Already logged by FecanboError::operation or at the raise site
            FecanboError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
            FecanboError::Io(e) => {
                tracing::error!("IO Error: {:?}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Error de archivos en el servidor.".to_string(),
                )
            }
            _ => {
                tracing::error!("Unhandled Error: {:?}", self);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Ocurrió un error inesperado. Intenta de nuevo.".to_string(),
                )
            }
        };

        let body = Json(json!({
            "success": false,
            "error": error_message,
        }));

        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;

    async fn body_json(err: FecanboError) -> (StatusCode, serde_json::Value) {
        let res = err.into_response();
        let status = res.status();
        let bytes = res.into_body().collect().await.unwrap().to_bytes();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_validation_message_is_returned_verbatim() {
        let (status, body) =
            body_json(FecanboError::Validation("El nombre es obligatorio".into())).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["success"], false);
        assert_eq!(body["error"], "El nombre es obligatorio");
    }

    #[tokio::test]
    async fn test_database_error_is_hidden_behind_generic_message() {
        let (status, body) = body_json(FecanboError::Database(sqlx::Error::RowNotFound)).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(!body["error"].as_str().unwrap().contains("RowNotFound"));
    }

    #[tokio::test]
    async fn test_operation_keeps_only_the_user_message() {
        let err = FecanboError::operation("No se pudo crear la alerta", "constraint violated");
        let (status, body) = body_json(err).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"], "No se pudo crear la alerta");
    }
}
