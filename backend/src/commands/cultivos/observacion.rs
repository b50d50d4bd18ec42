use super::crud::fetch_cultivo_scoped;
use crate::catalog::TipoObservacion;
use crate::commands::media::{is_safe_media_name, media_belongs_to};
use crate::commands::utility::{blank_to_none, de_opt_f64, de_opt_i32, parse_datetime_flexible, require_text};
use crate::db::{DbPool, Observacion};
use crate::error::{FecanboError, FecanboResult};
use crate::middleware::auth::{Claims, Tenant};
use crate::state::AppState;
use axum::extract::{Json, Path, State};
use axum::Extension;
use serde::Deserialize;
use uuid::Uuid;

#[derive(Deserialize, Default, Debug)]
pub struct ObservacionForm {
    pub descripcion: Option<String>,
    pub tipo: Option<String>,
    pub fecha_observacion: Option<String>,
    #[serde(default, deserialize_with = "de_opt_f64")]
    pub altura_cm: Option<f64>,
    #[serde(default, deserialize_with = "de_opt_f64")]
    pub ph: Option<f64>,
    #[serde(default, deserialize_with = "de_opt_f64")]
    pub temperatura: Option<f64>,
    #[serde(default, deserialize_with = "de_opt_i32")]
    pub humedad: Option<i32>,
    #[serde(default, deserialize_with = "de_opt_f64")]
    pub ec: Option<f64>,
    #[serde(default)]
    pub fotos: Vec<String>,
}

fn validate_medidas(form: &ObservacionForm) -> FecanboResult<()> {
    if let Some(ph) = form.ph {
        if !(0.0..=14.0).contains(&ph) {
            return Err(FecanboError::Validation("El pH debe estar entre 0 y 14.".to_string()));
        }
    }
    if let Some(humedad) = form.humedad {
        if !(0..=100).contains(&humedad) {
            return Err(FecanboError::Validation(
                "La humedad debe estar entre 0 y 100.".to_string(),
            ));
        }
    }
    if form.altura_cm.is_some_and(|a| a < 0.0) || form.ec.is_some_and(|ec| ec < 0.0) {
        return Err(FecanboError::Validation(
            "Altura y EC no pueden ser negativas.".to_string(),
        ));
    }
    if let Some(foto) = form.fotos.iter().find(|f| !is_safe_media_name(f)) {
        return Err(FecanboError::Validation(format!("Foto inválida: '{}'", foto)));
    }
    Ok(())
}

/// Photos must be uploads of the caller.
fn validate_fotos(fotos: &[String], tenant: Tenant) -> FecanboResult<()> {
    match fotos.iter().find(|f| !media_belongs_to(f, tenant)) {
        Some(foto) => Err(FecanboError::Validation(format!("Foto inválida: '{}'", foto))),
        None => Ok(()),
    }
}

pub async fn get_observaciones(
    pool: &DbPool,
    tenant: Tenant,
    cultivo_id: Uuid,
) -> FecanboResult<Vec<Observacion>> {
    fetch_cultivo_scoped(pool, tenant, cultivo_id).await?;
    let observaciones = sqlx::query_as::<_, Observacion>(
        "SELECT * FROM observaciones WHERE cultivo_id = $1 ORDER BY fecha_observacion DESC",
    )
    .bind(cultivo_id)
    .fetch_all(pool)
    .await?;
    Ok(observaciones)
}

pub async fn create_observacion(
    pool: &DbPool,
    tenant: Tenant,
    cultivo_id: Uuid,
    form: ObservacionForm,
) -> FecanboResult<Observacion> {
    validate_medidas(&form)?;
    validate_fotos(&form.fotos, tenant)?;
    let cultivo = fetch_cultivo_scoped(pool, tenant, cultivo_id).await?;
    let descripcion = require_text(form.descripcion, "La descripción es obligatoria.")?;
    let tipo = match blank_to_none(form.tipo) {
        Some(t) => t.parse::<TipoObservacion>()?,
        None => TipoObservacion::General,
    };
    let fecha = match blank_to_none(form.fecha_observacion) {
        Some(raw) => parse_datetime_flexible(&raw).ok_or_else(|| {
            FecanboError::Validation(format!("Fecha de observación inválida: '{}'", raw))
        })?,
        None => chrono::Utc::now(),
    };

    let observacion = sqlx::query_as::<_, Observacion>(
        "INSERT INTO observaciones (
            cultivo_id, cultivador_id, fecha_observacion, tipo, descripcion, fotos,
            temperatura, humedad, ph, ec, altura_cm
        ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
        RETURNING *",
    )
    .bind(cultivo.id)
    .bind(cultivo.cultivador_id)
    .bind(fecha)
    .bind(tipo.as_str())
    .bind(descripcion)
    .bind(&form.fotos)
    .bind(form.temperatura)
    .bind(form.humedad)
    .bind(form.ph)
    .bind(form.ec)
    .bind(form.altura_cm)
    .fetch_one(pool)
    .await
    .map_err(|e| FecanboError::operation("No se pudo guardar la observación", e))?;

    tracing::info!("Observation {} recorded for crop {}", observacion.id, cultivo.id);
    Ok(observacion)
}

pub async fn get_observaciones_axum(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
) -> FecanboResult<Json<Vec<Observacion>>> {
    Ok(Json(get_observaciones(&state.pool, claims.tenant()?, id).await?))
}

pub async fn create_observacion_axum(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
    Json(form): Json<ObservacionForm>,
) -> FecanboResult<Json<Observacion>> {
    Ok(Json(create_observacion(&state.pool, claims.tenant()?, id, form).await?))
}
