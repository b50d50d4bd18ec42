use crate::config::AppConfig;
use crate::db::Cultivador;
use crate::error::{FecanboError, FecanboResult};
use axum::{
    extract::{Request, State},
    http::{header, HeaderMap},
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

pub const SESSION_COOKIE: &str = "fecanbo_session";

const PUBLIC_API_ROUTES: &[&str] = &[
    "/api/auth/login",
    "/api/auth/register",
    "/api/auth/logout",
    "/api/ping",
];

const AUTH_PAGES: &[&str] = &["/login", "/register"];

const DASHBOARD_PAGES: &[&str] = &[
    "/dashboard",
    "/cultivos",
    "/entregas",
    "/usuarios",
    "/usuarios-finales",
    "/alertas",
    "/calendario",
    "/mapa",
    "/configuracion",
];

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    pub sub: String,
    pub email: String,
    pub nombre: String,
    pub es_admin: bool,
    pub exp: usize,
}

/// The grower a request acts for. Admins see every tenant's rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tenant {
    pub cultivador_id: Uuid,
    pub es_admin: bool,
}

impl Claims {
    pub fn tenant(&self) -> FecanboResult<Tenant> {
        let cultivador_id = Uuid::parse_str(&self.sub)
            .map_err(|_| FecanboError::Auth("Sesión inválida".to_string()))?;
        Ok(Tenant {
            cultivador_id,
            es_admin: self.es_admin,
        })
    }
}

pub fn issue_token(config: &AppConfig, cultivador: &Cultivador) -> FecanboResult<String> {
    let exp = chrono::Utc::now() + chrono::Duration::hours(config.session_ttl_hours);
    let claims = Claims {
        sub: cultivador.id.to_string(),
        email: cultivador.email.clone(),
        nombre: cultivador.nombre_completo.clone(),
        es_admin: cultivador.es_admin,
        exp: exp.timestamp() as usize,
    };
    Ok(encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(&config.jwt_secret),
    )?)
}

pub fn decode_token(secret: &[u8], token: &str) -> FecanboResult<Claims> {
    let data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret),
        &Validation::default(),
    )?;
    Ok(data.claims)
}

pub fn session_cookie(token: &str, ttl_hours: i64) -> String {
    format!(
        "{}={}; Path=/; HttpOnly; SameSite=Lax; Max-Age={}",
        SESSION_COOKIE,
        token,
        ttl_hours * 3600
    )
}

pub fn clear_session_cookie() -> String {
    format!("{}=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0", SESSION_COOKIE)
}

/// Bearer header first, then the session cookie.
pub fn extract_token(headers: &HeaderMap) -> Option<String> {
    if let Some(auth) = headers
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
    {
        if let Some(token) = auth.strip_prefix("Bearer ") {
            return Some(token.trim().to_string());
        }
    }

    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|h| h.to_str().ok())
        .flat_map(|h| h.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, value)| *name == SESSION_COOKIE && !value.is_empty())
        .map(|(_, value)| value.to_string())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Gate {
    Pass,
    Unauthorized,
    RedirectToLogin,
    RedirectToDashboard,
}

fn under(path: &str, prefix: &str) -> bool {
    path == prefix
        || path
            .strip_prefix(prefix)
            .map_or(false, |rest| rest.starts_with('/'))
}

pub fn route_gate(path: &str, authenticated: bool) -> Gate {
    if path.starts_with("/api/") {
        if authenticated || PUBLIC_API_ROUTES.contains(&path) {
            return Gate::Pass;
        }
        return Gate::Unauthorized;
    }

    if authenticated && AUTH_PAGES.iter().any(|p| under(path, p)) {
        return Gate::RedirectToDashboard;
    }
    if !authenticated && DASHBOARD_PAGES.iter().any(|p| under(path, p)) {
        return Gate::RedirectToLogin;
    }
    Gate::Pass
}

pub async fn auth_middleware(
    State(config): State<Arc<AppConfig>>,
    mut request: Request,
    next: Next,
) -> Response {
    let claims = extract_token(request.headers())
        .and_then(|token| match decode_token(&config.jwt_secret, &token) {
            Ok(claims) => Some(claims),
            Err(e) => {
                tracing::debug!("Ignoring invalid session: {}", e);
                None
            }
        });

    match route_gate(request.uri().path(), claims.is_some()) {
        Gate::Pass => {}
        Gate::Unauthorized => {
            return FecanboError::Auth("Debes iniciar sesión para continuar.".to_string())
                .into_response()
        }
        Gate::RedirectToLogin => return Redirect::to("/login").into_response(),
        Gate::RedirectToDashboard => return Redirect::to("/dashboard").into_response(),
    }

    if let Some(claims) = claims {
        request.extensions_mut().insert(claims);
    }

    next.run(request).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::test_config;
    use axum::{
        body::Body,
        http::{HeaderValue, Request as HttpRequest, StatusCode},
        middleware,
        routing::get,
        Extension, Router,
    };
    use tower::ServiceExt;

    fn sample_grower() -> Cultivador {
        Cultivador {
            id: Uuid::new_v4(),
            email: "grower@fecanbo.org".to_string(),
            password_hash: String::new(),
            nombre_completo: "Ana Pérez".to_string(),
            documento: None,
            telefono: None,
            direccion: None,
            provincia: None,
            ciudad: None,
            fecha_registro: chrono::Utc::now(),
            estado: "activo".to_string(),
            es_admin: false,
        }
    }

    fn app(config: Arc<AppConfig>) -> Router {
        Router::new()
            .route("/dashboard", get(|| async { "dashboard" }))
            .route("/login", get(|| async { "login" }))
            .route("/api/ping", get(|| async { "pong" }))
            .route(
                "/api/whoami",
                get(|Extension(claims): Extension<Claims>| async move { claims.email }),
            )
            .layer(middleware::from_fn_with_state(config, auth_middleware))
    }

    #[test]
    fn test_route_gate_decisions() {
        assert_eq!(route_gate("/api/cultivos", false), Gate::Unauthorized);
        assert_eq!(route_gate("/api/cultivos", true), Gate::Pass);
        assert_eq!(route_gate("/api/auth/login", false), Gate::Pass);
        assert_eq!(route_gate("/cultivos/123", false), Gate::RedirectToLogin);
        assert_eq!(route_gate("/usuarios-finales", false), Gate::RedirectToLogin);
        assert_eq!(route_gate("/login", true), Gate::RedirectToDashboard);
        assert_eq!(route_gate("/register", false), Gate::Pass);
        assert_eq!(route_gate("/", false), Gate::Pass);
        assert_eq!(route_gate("/dashboards-public", false), Gate::Pass);
    }

    #[test]
    fn test_token_roundtrip_carries_tenant() {
        let config = test_config();
        let grower = sample_grower();
        let token = issue_token(&config, &grower).unwrap();
        let claims = decode_token(&config.jwt_secret, &token).unwrap();
        let tenant = claims.tenant().unwrap();
        assert_eq!(tenant.cultivador_id, grower.id);
        assert!(!tenant.es_admin);
        assert!(decode_token(b"other-secret", &token).is_err());
    }

    #[test]
    fn test_extract_token_from_cookie_and_bearer() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::COOKIE,
            HeaderValue::from_static("theme=dark; fecanbo_session=abc.def.ghi"),
        );
        assert_eq!(extract_token(&headers).as_deref(), Some("abc.def.ghi"));

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer xyz"));
        assert_eq!(extract_token(&headers).as_deref(), Some("xyz"));

        assert_eq!(extract_token(&HeaderMap::new()), None);
    }

    #[tokio::test]
    async fn test_unauthenticated_page_redirects_to_login() {
        let res = app(Arc::new(test_config()))
            .oneshot(HttpRequest::builder().uri("/dashboard").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::SEE_OTHER);
        assert_eq!(res.headers()[header::LOCATION], "/login");
    }

    #[tokio::test]
    async fn test_authenticated_login_page_redirects_to_dashboard() {
        let config = Arc::new(test_config());
        let token = issue_token(&config, &sample_grower()).unwrap();
        let res = app(config)
            .oneshot(
                HttpRequest::builder().uri("/login")
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
    async fn test_api_requires_session_and_exposes_claims() {
        let config = Arc::new(test_config());

        let res = app(config.clone())
            .oneshot(HttpRequest::builder().uri("/api/whoami").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

        let res = app(config.clone())
            .oneshot(HttpRequest::builder().uri("/api/ping").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);

        let token = issue_token(&config, &sample_grower()).unwrap();
        let res = app(config)
            .oneshot(
                HttpRequest::builder().uri("/api/whoami")
                    .header(header::AUTHORIZATION, format!("Bearer {}", token))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);
    }
}
