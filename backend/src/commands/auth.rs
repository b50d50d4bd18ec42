use crate::commands::utility::{blank_to_none, require_text};
use crate::db::{Cultivador, DbPool};
use crate::error::{FecanboError, FecanboResult};
use crate::middleware::auth::{clear_session_cookie, issue_token, session_cookie, Claims};
use crate::state::AppState;
use axum::{
    extract::State,
    http::header,
    response::IntoResponse,
    Extension, Json,
};
use bcrypt::{hash, verify, DEFAULT_COST};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

const MIN_PASSWORD_LEN: usize = 6;

#[derive(Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    pub confirm_password: Option<String>,
    pub nombre_completo: Option<String>,
}

#[derive(Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Serialize)]
pub struct SessionResponse {
    pub token: String,
    pub cultivador: Cultivador,
}

#[derive(Deserialize, Default)]
pub struct PerfilForm {
    pub nombre_completo: Option<String>,
    pub documento: Option<String>,
    pub telefono: Option<String>,
    pub direccion: Option<String>,
    pub provincia: Option<String>,
    pub ciudad: Option<String>,
}

/// bcrypt at the default cost takes long enough to stall a worker thread.
pub(crate) async fn hash_password(password: &str) -> FecanboResult<String> {
    let password = password.to_string();
    tokio::task::spawn_blocking(move || hash(password, DEFAULT_COST))
        .await
        .map_err(|e| FecanboError::Internal(e.to_string()))?
        .map_err(FecanboError::from)
}

async fn verify_password(password: &str, password_hash: &str) -> FecanboResult<bool> {
    let (password, password_hash) = (password.to_string(), password_hash.to_string());
    tokio::task::spawn_blocking(move || verify(password, &password_hash))
        .await
        .map_err(|e| FecanboError::Internal(e.to_string()))?
        .map_err(FecanboError::from)
}

fn normalize_email(email: &str) -> FecanboResult<String> {
    let email = email.trim().to_lowercase();
    match email.split_once('@') {
        Some((user, domain)) if !user.is_empty() && domain.contains('.') => Ok(email),
        _ => Err(FecanboError::Validation("Ingresa un email válido.".to_string())),
    }
}

pub async fn register_cultivador(
    pool: &DbPool,
    email: &str,
    password: &str,
    nombre_completo: Option<String>,
) -> FecanboResult<Cultivador> {
    let email = normalize_email(email)?;
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(FecanboError::Validation(format!(
            "La contraseña debe tener al menos {} caracteres.",
            MIN_PASSWORD_LEN
        )));
    }
    let nombre = require_text(nombre_completo, "El nombre completo es obligatorio.")?;
    let password_hash = hash_password(password).await?;

    let result = sqlx::query_as::<_, Cultivador>(
        "INSERT INTO cultivadores (email, password_hash, nombre_completo) VALUES ($1, $2, $3) RETURNING *",
    )
    .bind(&email)
    .bind(password_hash)
    .bind(nombre)
    .fetch_one(pool)
    .await;

    match result {
        Ok(cultivador) => {
            tracing::info!("Registered grower {} ({})", cultivador.email, cultivador.id);
            Ok(cultivador)
        }
        Err(sqlx::Error::Database(db)) if db.is_unique_violation() => Err(
            FecanboError::Validation("Ya existe una cuenta registrada con ese email.".to_string()),
        ),
        Err(e) => Err(FecanboError::operation("No se pudo completar el registro", e)),
    }
}

pub async fn authenticate(pool: &DbPool, email: &str, password: &str) -> FecanboResult<Cultivador> {
    let invalid = || FecanboError::Auth("Email o contraseña incorrectos.".to_string());

    let email = email.trim().to_lowercase();
    let cultivador = sqlx::query_as::<_, Cultivador>("SELECT * FROM cultivadores WHERE email = $1")
        .bind(&email)
        .fetch_optional(pool)
        .await?
        .ok_or_else(invalid)?;

    if !verify_password(password, &cultivador.password_hash).await? {
        tracing::warn!("Failed login for {}", email);
        return Err(invalid());
    }
    if cultivador.estado != "activo" {
        return Err(FecanboError::Auth(format!(
            "La cuenta se encuentra {}.",
            cultivador.estado
        )));
    }
    Ok(cultivador)
}

pub async fn get_cultivador(pool: &DbPool, id: Uuid) -> FecanboResult<Cultivador> {
    sqlx::query_as::<_, Cultivador>("SELECT * FROM cultivadores WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| FecanboError::NotFound("Cultivador no encontrado".to_string()))
}

pub async fn update_perfil(pool: &DbPool, id: Uuid, form: PerfilForm) -> FecanboResult<Cultivador> {
    let nombre = require_text(form.nombre_completo, "El nombre completo es obligatorio.")?;
    sqlx::query_as::<_, Cultivador>(
        "UPDATE cultivadores SET nombre_completo = $1, documento = $2, telefono = $3, direccion = $4, provincia = $5, ciudad = $6 \
         WHERE id = $7 RETURNING *",
    )
    .bind(nombre)
    .bind(blank_to_none(form.documento))
    .bind(blank_to_none(form.telefono))
    .bind(blank_to_none(form.direccion))
    .bind(blank_to_none(form.provincia))
    .bind(blank_to_none(form.ciudad))
    .bind(id)
    .fetch_optional(pool)
    .await
    .map_err(|e| FecanboError::operation("No se pudo actualizar el perfil", e))?
    .ok_or_else(|| FecanboError::NotFound("Cultivador no encontrado".to_string()))
}

fn session_response(state: &AppState, cultivador: Cultivador) -> FecanboResult<impl IntoResponse> {
    let token = issue_token(&state.config, &cultivador)?;
    let cookie = session_cookie(&token, state.config.session_ttl_hours);
    Ok((
        [(header::SET_COOKIE, cookie)],
        Json(SessionResponse { token, cultivador }),
    ))
}

pub async fn register_axum(
    State(state): State<AppState>,
    Json(payload): Json<RegisterRequest>,
) -> FecanboResult<impl IntoResponse> {
    if let Some(confirm) = &payload.confirm_password {
        if confirm != &payload.password {
            return Err(FecanboError::Validation(
                "Las contraseñas no coinciden".to_string(),
            ));
        }
    }
    let cultivador = register_cultivador(
        &state.pool,
        &payload.email,
        &payload.password,
        payload.nombre_completo,
    )
    .await?;
    session_response(&state, cultivador)
}

pub async fn login_axum(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> FecanboResult<impl IntoResponse> {
    if payload.email.trim().is_empty() || payload.password.is_empty() {
        return Err(FecanboError::Validation(
            "Ingresa tu email y contraseña.".to_string(),
        ));
    }
    let cultivador = authenticate(&state.pool, &payload.email, &payload.password).await?;
    tracing::info!("Grower {} signed in", cultivador.email);
    session_response(&state, cultivador)
}

pub async fn logout_axum() -> impl IntoResponse {
    ([(header::SET_COOKIE, clear_session_cookie())], Json(()))
}

pub async fn me_axum(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> FecanboResult<Json<Cultivador>> {
    let tenant = claims.tenant()?;
    Ok(Json(get_cultivador(&state.pool, tenant.cultivador_id).await?))
}

pub async fn update_perfil_axum(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(form): Json<PerfilForm>,
) -> FecanboResult<Json<Cultivador>> {
    let tenant = claims.tenant()?;
    Ok(Json(update_perfil(&state.pool, tenant.cultivador_id, form).await?))
}
