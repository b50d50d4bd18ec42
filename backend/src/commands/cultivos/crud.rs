use crate::catalog::{Etapa, MedioCultivo, MetodoCultivo};
use crate::commands::utility::{blank_to_none, de_opt_f64, de_opt_i32, parse_date_safe, require_text};
use crate::db::{Cultivo, DbPool};
use crate::error::{FecanboError, FecanboResult};
use crate::middleware::auth::{Claims, Tenant};
use crate::state::AppState;
use axum::extract::{Json, Path, State};
use axum::Extension;
use serde::Deserialize;
use uuid::Uuid;

const TIPOS_GENETICA: &[&str] = &["indica", "sativa", "hibrida", "ruderalis"];
const PROPOSITOS: &[&str] = &["medicinal", "investigacion", "personal"];

/// Create and edit dialogs post different field names for the same columns;
/// both are accepted.
#[derive(Deserialize, Default, Debug)]
pub struct CultivoForm {
    pub nombre: Option<String>,
    pub variedad: Option<String>,
    #[serde(default, deserialize_with = "de_opt_i32")]
    pub cantidad_plantas: Option<i32>,
    #[serde(alias = "ubicacion")]
    pub ubicacion_descripcion: Option<String>,
    #[serde(default, deserialize_with = "de_opt_f64")]
    pub latitud: Option<f64>,
    #[serde(default, deserialize_with = "de_opt_f64")]
    pub longitud: Option<f64>,
    #[serde(alias = "tipo_cultivo")]
    pub metodo_cultivo: Option<String>,
    #[serde(alias = "metodo")]
    pub medio_cultivo: Option<String>,
    pub tipo: Option<String>,
    pub proposito: Option<String>,
    pub fecha_estimada_cosecha: Option<String>,
    pub notas: Option<String>,
}

fn one_of(value: Option<String>, allowed: &[&str], what: &str) -> FecanboResult<Option<String>> {
    match blank_to_none(value) {
        None => Ok(None),
        Some(v) if allowed.contains(&v.as_str()) => Ok(Some(v)),
        Some(v) => Err(FecanboError::Validation(format!("{} inválido: '{}'", what, v))),
    }
}

fn validate_plantas(cantidad: Option<i32>) -> FecanboResult<i32> {
    match cantidad {
        Some(n) if n > 0 => Ok(n),
        _ => Err(FecanboError::Validation(
            "La cantidad de plantas debe ser mayor a cero.".to_string(),
        )),
    }
}

fn validate_coords(latitud: Option<f64>, longitud: Option<f64>) -> FecanboResult<()> {
    match (latitud, longitud) {
        (Some(lat), _) if !(-90.0..=90.0).contains(&lat) => Err(FecanboError::Validation(
            "La latitud debe estar entre -90 y 90.".to_string(),
        )),
        (_, Some(lon)) if !(-180.0..=180.0).contains(&lon) => Err(FecanboError::Validation(
            "La longitud debe estar entre -180 y 180.".to_string(),
        )),
        (Some(_), None) | (None, Some(_)) => Err(FecanboError::Validation(
            "Indica latitud y longitud juntas.".to_string(),
        )),
        _ => Ok(()),
    }
}

fn parse_fecha_cosecha(value: Option<String>) -> FecanboResult<Option<chrono::NaiveDate>> {
    match blank_to_none(value) {
        None => Ok(None),
        Some(v) => parse_date_safe(&v).map(Some).ok_or_else(|| {
            FecanboError::Validation(format!("Fecha estimada de cosecha inválida: '{}'", v))
        }),
    }
}

/// Loads a crop the tenant may see, active or not.
pub async fn fetch_cultivo_scoped(pool: &DbPool, tenant: Tenant, id: Uuid) -> FecanboResult<Cultivo> {
    sqlx::query_as::<_, Cultivo>(
        "SELECT * FROM cultivos WHERE id = $1 AND ($2 OR cultivador_id = $3)",
    )
    .bind(id)
    .bind(tenant.es_admin)
    .bind(tenant.cultivador_id)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| FecanboError::NotFound("Cultivo no encontrado".to_string()))
}

pub async fn get_cultivos(pool: &DbPool, tenant: Tenant) -> FecanboResult<Vec<Cultivo>> {
    let cultivos = sqlx::query_as::<_, Cultivo>(
        "SELECT * FROM cultivos WHERE activo = TRUE AND ($1 OR cultivador_id = $2) ORDER BY created_at DESC",
    )
    .bind(tenant.es_admin)
    .bind(tenant.cultivador_id)
    .fetch_all(pool)
    .await?;
    Ok(cultivos)
}

pub async fn create_cultivo(pool: &DbPool, tenant: Tenant, form: CultivoForm) -> FecanboResult<Cultivo> {
    let nombre = require_text(form.nombre, "El nombre del cultivo es obligatorio.")?;
    let cantidad_plantas = validate_plantas(form.cantidad_plantas)?;
    validate_coords(form.latitud, form.longitud)?;
    let tipo = one_of(form.tipo, TIPOS_GENETICA, "Tipo de genética")?;
    let proposito = one_of(form.proposito, PROPOSITOS, "Propósito")?;
    let fecha_estimada_cosecha = parse_fecha_cosecha(form.fecha_estimada_cosecha)?;
    let metodo = MetodoCultivo::from_form(form.metodo_cultivo.as_deref());
    let medio = MedioCultivo::from_form(form.medio_cultivo.as_deref());

    let mut tx = pool.begin().await?;

    let cultivo = sqlx::query_as::<_, Cultivo>(
        "INSERT INTO cultivos (
            cultivador_id, nombre, variedad, tipo, proposito, fecha_inicio, fecha_estimada_cosecha,
            estado_actual, latitud, longitud, ubicacion_descripcion, metodo_cultivo, medio_cultivo,
            cantidad_plantas, notas, activo
        ) VALUES ($1, $2, $3, $4, $5, (NOW() AT TIME ZONE 'America/Argentina/Buenos_Aires')::DATE, $6, $7, $8, $9, $10, $11, $12, $13, $14, TRUE)
        RETURNING *",
    )
    .bind(tenant.cultivador_id)
    .bind(&nombre)
    .bind(blank_to_none(form.variedad))
    .bind(tipo)
    .bind(proposito)
    .bind(fecha_estimada_cosecha)
    .bind(Etapa::Germinacion.as_str())
    .bind(form.latitud)
    .bind(form.longitud)
    .bind(blank_to_none(form.ubicacion_descripcion))
    .bind(metodo.as_str())
    .bind(medio.as_str())
    .bind(cantidad_plantas)
    .bind(blank_to_none(form.notas))
    .fetch_one(&mut *tx)
    .await
    .map_err(|e| FecanboError::operation("No se pudo crear el cultivo", e))?;

    sqlx::query("INSERT INTO cultivo_etapas (cultivo_id, etapa, fecha_inicio) VALUES ($1, $2, NOW())")
        .bind(cultivo.id)
        .bind(Etapa::Germinacion.as_str())
        .execute(&mut *tx)
        .await
        .map_err(|e| FecanboError::operation("No se pudo crear la etapa inicial del cultivo", e))?;

    tx.commit().await?;
    tracing::info!("Created crop {} ({}) for grower {}", cultivo.nombre, cultivo.id, cultivo.cultivador_id);
    Ok(cultivo)
}

pub async fn update_cultivo(
    pool: &DbPool,
    tenant: Tenant,
    id: Uuid,
    form: CultivoForm,
) -> FecanboResult<Cultivo> {
    let nombre = require_text(form.nombre, "El nombre del cultivo es obligatorio.")?;
    let cantidad_plantas = validate_plantas(form.cantidad_plantas)?;
    validate_coords(form.latitud, form.longitud)?;
    let metodo = blank_to_none(form.metodo_cultivo)
        .map(|v| v.parse::<MetodoCultivo>())
        .transpose()?;
    let medio = blank_to_none(form.medio_cultivo)
        .map(|v| v.parse::<MedioCultivo>())
        .transpose()?;
    let tipo = one_of(form.tipo, TIPOS_GENETICA, "Tipo de genética")?;
    let proposito = one_of(form.proposito, PROPOSITOS, "Propósito")?;
    let fecha_estimada_cosecha = parse_fecha_cosecha(form.fecha_estimada_cosecha)?;

    // Coordinates, genetics, purpose and harvest estimate are kept when omitted
    sqlx::query_as::<_, Cultivo>(
        "UPDATE cultivos SET
            nombre = $1, variedad = $2, cantidad_plantas = $3, metodo_cultivo = $4, medio_cultivo = $5,
            ubicacion_descripcion = $6, notas = $7,
            latitud = COALESCE($8, latitud), longitud = COALESCE($9, longitud),
            tipo = COALESCE($10, tipo), proposito = COALESCE($11, proposito),
            fecha_estimada_cosecha = COALESCE($12, fecha_estimada_cosecha),
            updated_at = NOW()
         WHERE id = $13 AND ($14 OR cultivador_id = $15)
         RETURNING *",
    )
    .bind(nombre)
    .bind(blank_to_none(form.variedad))
    .bind(cantidad_plantas)
    .bind(metodo.map(|m| m.as_str()))
    .bind(medio.map(|m| m.as_str()))
    .bind(blank_to_none(form.ubicacion_descripcion))
    .bind(blank_to_none(form.notas))
    .bind(form.latitud)
    .bind(form.longitud)
    .bind(tipo)
    .bind(proposito)
    .bind(fecha_estimada_cosecha)
    .bind(id)
    .bind(tenant.es_admin)
    .bind(tenant.cultivador_id)
    .fetch_optional(pool)
    .await
    .map_err(|e| FecanboError::operation("No se pudo actualizar el cultivo", e))?
    .ok_or_else(|| FecanboError::NotFound("Cultivo no encontrado".to_string()))
}

/// Soft delete: the crop disappears from listings, its history stays.
pub async fn delete_cultivo(pool: &DbPool, tenant: Tenant, id: Uuid) -> FecanboResult<()> {
    let result = sqlx::query(
        "UPDATE cultivos SET activo = FALSE, updated_at = NOW() WHERE id = $1 AND ($2 OR cultivador_id = $3)",
    )
    .bind(id)
    .bind(tenant.es_admin)
    .bind(tenant.cultivador_id)
    .execute(pool)
    .await
    .map_err(|e| FecanboError::operation("No se pudo eliminar el cultivo", e))?;

    if result.rows_affected() == 0 {
        return Err(FecanboError::NotFound("Cultivo no encontrado".to_string()));
    }
    tracing::info!("Crop {} deactivated", id);
    Ok(())
}

pub async fn get_cultivos_axum(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> FecanboResult<Json<Vec<Cultivo>>> {
    Ok(Json(get_cultivos(&state.pool, claims.tenant()?).await?))
}

pub async fn get_cultivo_axum(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
) -> FecanboResult<Json<Cultivo>> {
    Ok(Json(fetch_cultivo_scoped(&state.pool, claims.tenant()?, id).await?))
}

pub async fn create_cultivo_axum(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(form): Json<CultivoForm>,
) -> FecanboResult<Json<Cultivo>> {
    Ok(Json(create_cultivo(&state.pool, claims.tenant()?, form).await?))
}

pub async fn update_cultivo_axum(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
    Json(form): Json<CultivoForm>,
) -> FecanboResult<Json<Cultivo>> {
    Ok(Json(update_cultivo(&state.pool, claims.tenant()?, id, form).await?))
}

pub async fn delete_cultivo_axum(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
) -> FecanboResult<Json<()>> {
    delete_cultivo(&state.pool, claims.tenant()?, id).await?;
    Ok(Json(()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_form_field_aliases() {
        let form: CultivoForm = serde_json::from_str(
            r#"{
                "nombre": "Norte",
                "variedad": "Critical Kush",
                "cantidad_plantas": "4",
                "ubicacion": "La Plata, Buenos Aires",
                "latitud": "-34.9214",
                "longitud": "-57.9544",
                "tipo_cultivo": "outdoor",
                "metodo": "coco",
                "notas": ""
            }"#,
        )
        .unwrap();
        assert_eq!(form.cantidad_plantas, Some(4));
        assert_eq!(form.ubicacion_descripcion.as_deref(), Some("La Plata, Buenos Aires"));
        assert_eq!(
            MetodoCultivo::from_form(form.metodo_cultivo.as_deref()),
            MetodoCultivo::Exterior
        );
        assert_eq!(
            MedioCultivo::from_form(form.medio_cultivo.as_deref()),
            MedioCultivo::Coco
        );
        assert_eq!(blank_to_none(form.notas), None);
    }

    #[test]
    fn test_validation_rules() {
        assert!(validate_plantas(Some(0)).is_err());
        assert!(validate_plantas(None).is_err());
        assert_eq!(validate_plantas(Some(12)).unwrap(), 12);

        assert!(validate_coords(Some(-34.9), Some(-57.9)).is_ok());
        assert!(validate_coords(None, None).is_ok());
        assert!(validate_coords(Some(95.0), Some(0.0)).is_err());
        assert!(validate_coords(Some(-34.9), None).is_err());

        assert_eq!(
            one_of(Some("sativa".into()), TIPOS_GENETICA, "Tipo").unwrap(),
            Some("sativa".to_string())
        );
        assert!(one_of(Some("autofloreciente".into()), TIPOS_GENETICA, "Tipo").is_err());
        assert!(parse_fecha_cosecha(Some("31/12/2025".into())).is_err());
    }

    #[test]
    fn test_plant_count_beyond_integer_range_is_rejected() {
        let form = serde_json::from_str::<CultivoForm>(
            r#"{"nombre": "Norte", "cantidad_plantas": "5000000000"}"#,
        );
        assert!(form.is_err());

        let form: CultivoForm =
            serde_json::from_str(r#"{"nombre": "Norte", "cantidad_plantas": "12.8"}"#).unwrap();
        assert_eq!(validate_plantas(form.cantidad_plantas).unwrap(), 12);
    }
}
