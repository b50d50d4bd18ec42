use crate::commands::utility::{blank_to_none, require_text};
use crate::db::{DbPool, UsuarioFinal};
use crate::error::{FecanboError, FecanboResult};
use crate::middleware::auth::{Claims, Tenant};
use crate::state::AppState;
use axum::extract::{Json, Path, State};
use axum::Extension;
use serde::Deserialize;
use uuid::Uuid;

/// The edit dialog posts `dni` and `diagnostico`; the create form uses the
/// column names.
#[derive(Deserialize, Default, Debug)]
pub struct UsuarioFinalForm {
    pub nombre_completo: Option<String>,
    #[serde(alias = "dni")]
    pub documento: Option<String>,
    pub telefono: Option<String>,
    pub email: Option<String>,
    pub direccion: Option<String>,
    #[serde(alias = "diagnostico")]
    pub condicion_medica: Option<String>,
    pub observaciones_medicas: Option<String>,
    pub dosis_recomendada: Option<String>,
    pub notas: Option<String>,
}

struct DatosUsuario {
    nombre_completo: String,
    documento: Option<String>,
    telefono: Option<String>,
    email: Option<String>,
    direccion: Option<String>,
    condicion_medica: Option<String>,
    observaciones_medicas: Option<String>,
    dosis_recomendada: Option<String>,
    notas: Option<String>,
}

impl TryFrom<UsuarioFinalForm> for DatosUsuario {
    type Error = FecanboError;

    fn try_from(form: UsuarioFinalForm) -> FecanboResult<Self> {
        let email = blank_to_none(form.email).map(|e| e.to_lowercase());
        if let Some(email) = &email {
            if !email.contains('@') {
                return Err(FecanboError::Validation(format!("Email inválido: '{}'", email)));
            }
        }
        Ok(DatosUsuario {
            nombre_completo: require_text(form.nombre_completo, "El nombre completo es obligatorio.")?,
            documento: blank_to_none(form.documento),
            telefono: blank_to_none(form.telefono),
            email,
            direccion: blank_to_none(form.direccion),
            condicion_medica: blank_to_none(form.condicion_medica),
            observaciones_medicas: blank_to_none(form.observaciones_medicas),
            dosis_recomendada: blank_to_none(form.dosis_recomendada),
            notas: blank_to_none(form.notas),
        })
    }
}

pub async fn get_usuarios_finales(pool: &DbPool, tenant: Tenant) -> FecanboResult<Vec<UsuarioFinal>> {
    let usuarios = sqlx::query_as::<_, UsuarioFinal>(
        "SELECT * FROM usuarios_finales WHERE activo = TRUE AND ($1 OR cultivador_id = $2) ORDER BY nombre_completo ASC",
    )
    .bind(tenant.es_admin)
    .bind(tenant.cultivador_id)
    .fetch_all(pool)
    .await?;
    Ok(usuarios)
}

pub async fn get_usuario_final(pool: &DbPool, tenant: Tenant, id: Uuid) -> FecanboResult<UsuarioFinal> {
    sqlx::query_as::<_, UsuarioFinal>(
        "SELECT * FROM usuarios_finales WHERE id = $1 AND ($2 OR cultivador_id = $3)",
    )
    .bind(id)
    .bind(tenant.es_admin)
    .bind(tenant.cultivador_id)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| FecanboError::NotFound("Usuario final no encontrado".to_string()))
}

pub async fn create_usuario_final(
    pool: &DbPool,
    tenant: Tenant,
    form: UsuarioFinalForm,
) -> FecanboResult<UsuarioFinal> {
    let datos = DatosUsuario::try_from(form)?;
    let usuario = sqlx::query_as::<_, UsuarioFinal>(
        "INSERT INTO usuarios_finales (
            cultivador_id, nombre_completo, documento, telefono, email, direccion,
            condicion_medica, observaciones_medicas, dosis_recomendada, notas, activo
        ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, TRUE)
        RETURNING *",
    )
    .bind(tenant.cultivador_id)
    .bind(datos.nombre_completo)
    .bind(datos.documento)
    .bind(datos.telefono)
    .bind(datos.email)
    .bind(datos.direccion)
    .bind(datos.condicion_medica)
    .bind(datos.observaciones_medicas)
    .bind(datos.dosis_recomendada)
    .bind(datos.notas)
    .fetch_one(pool)
    .await
    .map_err(|e| FecanboError::operation("No se pudo registrar el usuario final", e))?;

    tracing::info!("Registered end user {} for grower {}", usuario.id, usuario.cultivador_id);
    Ok(usuario)
}

pub async fn update_usuario_final(
    pool: &DbPool,
    tenant: Tenant,
    id: Uuid,
    form: UsuarioFinalForm,
) -> FecanboResult<UsuarioFinal> {
    let datos = DatosUsuario::try_from(form)?;
    sqlx::query_as::<_, UsuarioFinal>(
        "UPDATE usuarios_finales SET
            nombre_completo = $1, documento = $2, telefono = $3, email = $4, direccion = $5,
            condicion_medica = $6, observaciones_medicas = $7, dosis_recomendada = $8, notas = $9
         WHERE id = $10 AND ($11 OR cultivador_id = $12)
         RETURNING *",
    )
    .bind(datos.nombre_completo)
    .bind(datos.documento)
    .bind(datos.telefono)
    .bind(datos.email)
    .bind(datos.direccion)
    .bind(datos.condicion_medica)
    .bind(datos.observaciones_medicas)
    .bind(datos.dosis_recomendada)
    .bind(datos.notas)
    .bind(id)
    .bind(tenant.es_admin)
    .bind(tenant.cultivador_id)
    .fetch_optional(pool)
    .await
    .map_err(|e| FecanboError::operation("No se pudo actualizar el usuario final", e))?
    .ok_or_else(|| FecanboError::NotFound("Usuario final no encontrado".to_string()))
}

pub async fn delete_usuario_final(pool: &DbPool, tenant: Tenant, id: Uuid) -> FecanboResult<()> {
    let result = sqlx::query(
        "UPDATE usuarios_finales SET activo = FALSE WHERE id = $1 AND ($2 OR cultivador_id = $3)",
    )
    .bind(id)
    .bind(tenant.es_admin)
    .bind(tenant.cultivador_id)
    .execute(pool)
    .await
    .map_err(|e| FecanboError::operation("No se pudo eliminar el usuario final", e))?;

    if result.rows_affected() == 0 {
        return Err(FecanboError::NotFound("Usuario final no encontrado".to_string()));
    }
    Ok(())
}

pub async fn get_usuarios_finales_axum(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> FecanboResult<Json<Vec<UsuarioFinal>>> {
    Ok(Json(get_usuarios_finales(&state.pool, claims.tenant()?).await?))
}

pub async fn get_usuario_final_axum(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
) -> FecanboResult<Json<UsuarioFinal>> {
    Ok(Json(get_usuario_final(&state.pool, claims.tenant()?, id).await?))
}

pub async fn create_usuario_final_axum(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(form): Json<UsuarioFinalForm>,
) -> FecanboResult<Json<UsuarioFinal>> {
    Ok(Json(create_usuario_final(&state.pool, claims.tenant()?, form).await?))
}

pub async fn update_usuario_final_axum(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
    Json(form): Json<UsuarioFinalForm>,
) -> FecanboResult<Json<UsuarioFinal>> {
    Ok(Json(update_usuario_final(&state.pool, claims.tenant()?, id, form).await?))
}

pub async fn delete_usuario_final_axum(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
) -> FecanboResult<Json<()>> {
    delete_usuario_final(&state.pool, claims.tenant()?, id).await?;
    Ok(Json(()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_edit_form_aliases() {
        let form: UsuarioFinalForm = serde_json::from_str(
            r#"{"nombre_completo": "María Gómez", "dni": "30123456", "diagnostico": "Epilepsia refractaria", "telefono": ""}"#,
        )
        .unwrap();
        let datos = DatosUsuario::try_from(form).unwrap();
        assert_eq!(datos.documento.as_deref(), Some("30123456"));
        assert_eq!(datos.condicion_medica.as_deref(), Some("Epilepsia refractaria"));
        assert_eq!(datos.telefono, None);
    }

    #[test]
    fn test_required_name_and_email_shape() {
        assert!(DatosUsuario::try_from(UsuarioFinalForm::default()).is_err());
        let form = UsuarioFinalForm {
            nombre_completo: Some("Juan Pérez".into()),
            email: Some("juan-sin-arroba".into()),
            ..Default::default()
        };
        assert!(DatosUsuario::try_from(form).is_err());
        let form = UsuarioFinalForm {
            nombre_completo: Some("Juan Pérez".into()),
            email: Some(" Juan@Mail.com ".into()),
            ..Default::default()
        };
        assert_eq!(
            DatosUsuario::try_from(form).unwrap().email.as_deref(),
            Some("juan@mail.com")
        );
    }
}
