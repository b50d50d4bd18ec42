#[cfg(test)]
mod tests {
    use crate::config::test_config;
    use crate::db::init_pool_with_options;
    use crate::middleware::auth::{issue_token, SESSION_COOKIE};
    use crate::state::AppState;
    use axum::{
        body::Body,
        http::{header, Method, Request, StatusCode},
        Router,
    };
    use http_body_util::BodyExt;
    use serde_json::{json, Value};
    use sqlx::postgres::PgConnectOptions;
    use std::sync::Arc;
    use tower::ServiceExt;

    /// The full application over a pool that never connects; every request
    /// here is answered before a query would run.
    fn app() -> Router {
        let state = AppState {
            pool: init_pool_with_options(PgConnectOptions::new()),
            config: Arc::new(test_config()),
        };
        crate::build_app(state)
    }

    async fn send(request: Request<Body>) -> (StatusCode, Value) {
        let res = app().oneshot(request).await.unwrap();
        let status = res.status();
        let bytes = res.into_body().collect().await.unwrap().to_bytes();
        (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
    }

    fn post_json(uri: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method(Method::POST)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn test_ping_is_public_and_enveloped() {
        let (status, body) =
            send(Request::builder().uri("/api/ping").body(Body::empty()).unwrap()).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({ "success": true, "data": "pong" }));
    }

    #[tokio::test]
    async fn test_feature_routes_require_session() {
        for uri in [
            "/api/cultivos",
            "/api/alertas",
            "/api/entregas",
            "/api/usuarios-finales",
            "/api/dashboard",
            "/api/calendario",
            "/api/mapa",
            "/api/media/obs_1_abcdef12.png",
        ] {
            let (status, body) =
                send(Request::builder().uri(uri).body(Body::empty()).unwrap()).await;
            assert_eq!(status, StatusCode::UNAUTHORIZED, "{}", uri);
            assert_eq!(body["success"], json!(false));
            assert_eq!(body["error"], json!("Debes iniciar sesión para continuar."));
        }
    }

    #[tokio::test]
    async fn test_register_rejects_mismatched_passwords() {
        let (status, body) = send(post_json(
            "/api/auth/register",
            json!({
                "email": "ana@fecanbo.org",
                "password": "secreto123",
                "confirm_password": "secreto124",
                "nombre_completo": "Ana"
            }),
        ))
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(
            body,
            json!({ "success": false, "error": "Las contraseñas no coinciden" })
        );
    }

    #[tokio::test]
    async fn test_login_requires_credentials() {
        let (status, body) =
            send(post_json("/api/auth/login", json!({ "email": " ", "password": "" }))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], json!("Ingresa tu email y contraseña."));
    }

    #[tokio::test]
    async fn test_logout_clears_cookie() {
        let res = app()
            .oneshot(post_json("/api/auth/logout", json!({})))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        let cookie = res.headers()[header::SET_COOKIE].to_str().unwrap();
        assert!(cookie.starts_with(&format!("{}=;", SESSION_COOKIE)));
        assert!(cookie.contains("Max-Age=0"));
    }

    #[tokio::test]
    async fn test_pages_redirect_by_session() {
        let res = app()
            .oneshot(Request::builder().uri("/cultivos").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::SEE_OTHER);
        assert_eq!(res.headers()[header::LOCATION], "/login");

        let config = test_config();
        let grower = crate::db::Cultivador {
            id: uuid::Uuid::new_v4(),
            email: "ana@fecanbo.org".into(),
            password_hash: String::new(),
            nombre_completo: "Ana".into(),
            documento: None,
            telefono: None,
            direccion: None,
            provincia: None,
            ciudad: None,
            fecha_registro: chrono::Utc::now(),
            estado: "activo".into(),
            es_admin: false,
        };
        let token = issue_token(&config, &grower).unwrap();
        let res = app()
            .oneshot(
                Request::builder()
                    .uri("/register")
                    .header(header::COOKIE, format!("{}={}", SESSION_COOKIE, token))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::SEE_OTHER);
        assert_eq!(res.headers()[header::LOCATION], "/dashboard");
    }

    #[tokio::test]
    async fn test_invalid_stage_is_rejected_before_database() {
        let config = test_config();
        let grower = crate::db::Cultivador {
            id: uuid::Uuid::new_v4(),
            email: "ana@fecanbo.org".into(),
            password_hash: String::new(),
            nombre_completo: "Ana".into(),
            documento: None,
            telefono: None,
            direccion: None,
            provincia: None,
            ciudad: None,
            fecha_registro: chrono::Utc::now(),
            estado: "activo".into(),
            es_admin: false,
        };
        let token = issue_token(&config, &grower).unwrap();
        let mut request = post_json(
            &format!("/api/cultivos/{}/etapas", uuid::Uuid::new_v4()),
            json!({ "etapa": "flowering" }),
        );
        request.headers_mut().insert(
            header::AUTHORIZATION,
            format!("Bearer {}", token).parse().unwrap(),
        );
        let (status, body) = send(request).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], json!("Etapa inválida: 'flowering'"));
    }
}
