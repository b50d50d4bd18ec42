use crate::catalog::{PrioridadAlerta, TipoAlerta};
use crate::commands::cultivos::fetch_cultivo_scoped;
use crate::commands::utility::{blank_to_none, de_opt_i32, parse_datetime_flexible, parse_uuid_field};
use crate::db::{Alerta, AlertaConCultivo, DbPool};
use crate::error::{FecanboError, FecanboResult};
use crate::middleware::auth::{Claims, Tenant};
use crate::state::AppState;
use axum::extract::{Json, Path, State};
use axum::Extension;
use serde::Deserialize;
use uuid::Uuid;

const PENDING_LIMIT: i64 = 10;

#[derive(Deserialize, Default, Debug)]
pub struct AlertaForm {
    pub cultivo_id: Option<String>,
    pub tipo: Option<String>,
    pub titulo: Option<String>,
    pub descripcion: Option<String>,
    pub prioridad: Option<String>,
    pub fecha_programada: Option<String>,
    #[serde(default)]
    pub recurrente: bool,
    #[serde(default, deserialize_with = "de_opt_i32")]
    pub intervalo_dias: Option<i32>,
    #[serde(default, deserialize_with = "de_opt_i32")]
    pub recordatorio_dias_antes: Option<i32>,
}

#[derive(Deserialize, Debug)]
pub struct ToggleAlertaRequest {
    pub completada: bool,
    pub notas_completado: Option<String>,
}

/// Form values after validation, before the crop has been resolved.
#[derive(Debug, PartialEq)]
pub struct NuevaAlerta {
    pub tipo: TipoAlerta,
    pub prioridad: PrioridadAlerta,
    pub titulo: String,
    pub descripcion: Option<String>,
    pub fecha_programada: chrono::DateTime<chrono::Utc>,
    pub recurrente: bool,
    pub intervalo_dias: Option<i32>,
    pub recordatorio_dias_antes: i32,
}

impl NuevaAlerta {
    pub fn from_form(form: &AlertaForm) -> FecanboResult<Self> {
        let tipo: TipoAlerta = blank_to_none(form.tipo.clone())
            .ok_or_else(|| FecanboError::Validation("El tipo de alerta es obligatorio.".to_string()))?
            .parse()?;
        let prioridad = match blank_to_none(form.prioridad.clone()) {
            Some(p) => p.parse()?,
            None => PrioridadAlerta::Media,
        };
        let raw_fecha = blank_to_none(form.fecha_programada.clone()).ok_or_else(|| {
            FecanboError::Validation("La fecha programada es obligatoria.".to_string())
        })?;
        let fecha_programada = parse_datetime_flexible(&raw_fecha).ok_or_else(|| {
            FecanboError::Validation(format!("Fecha programada inválida: '{}'", raw_fecha))
        })?;

        let intervalo_dias = if form.recurrente {
            match form.intervalo_dias {
                Some(d) if d > 0 => Some(d),
                _ => {
                    return Err(FecanboError::Validation(
                        "Una alerta recurrente necesita un intervalo en días mayor a cero.".to_string(),
                    ))
                }
            }
        } else {
            None
        };
        let recordatorio_dias_antes = form.recordatorio_dias_antes.unwrap_or(1);
        if recordatorio_dias_antes < 0 {
            return Err(FecanboError::Validation(
                "Los días de recordatorio no pueden ser negativos.".to_string(),
            ));
        }

        Ok(NuevaAlerta {
            titulo: blank_to_none(form.titulo.clone())
                .unwrap_or_else(|| format!("Alerta de {}", tipo.label())),
            descripcion: blank_to_none(form.descripcion.clone()),
            tipo,
            prioridad,
            fecha_programada,
            recurrente: form.recurrente,
            intervalo_dias,
            recordatorio_dias_antes,
        })
    }
}

pub async fn get_alertas(pool: &DbPool, tenant: Tenant) -> FecanboResult<Vec<AlertaConCultivo>> {
    let alertas = sqlx::query_as::<_, AlertaConCultivo>(
        "SELECT a.*, c.nombre AS cultivo_nombre, c.variedad AS cultivo_variedad
         FROM alertas a
         JOIN cultivos c ON c.id = a.cultivo_id
         WHERE ($1 OR c.cultivador_id = $2)
         ORDER BY a.fecha_programada ASC",
    )
    .bind(tenant.es_admin)
    .bind(tenant.cultivador_id)
    .fetch_all(pool)
    .await?;
    Ok(alertas)
}

pub async fn get_alertas_pendientes(pool: &DbPool, tenant: Tenant) -> FecanboResult<Vec<AlertaConCultivo>> {
    let alertas = sqlx::query_as::<_, AlertaConCultivo>(
        "SELECT a.*, c.nombre AS cultivo_nombre, c.variedad AS cultivo_variedad
         FROM alertas a
         JOIN cultivos c ON c.id = a.cultivo_id
         WHERE a.completada = FALSE AND ($1 OR c.cultivador_id = $2)
         ORDER BY a.fecha_programada ASC
         LIMIT $3",
    )
    .bind(tenant.es_admin)
    .bind(tenant.cultivador_id)
    .bind(PENDING_LIMIT)
    .fetch_all(pool)
    .await?;
    Ok(alertas)
}

/// The caller's most recently created active crop, used when an alert is
/// created without choosing one.
async fn default_cultivo(pool: &DbPool, tenant: Tenant) -> FecanboResult<Uuid> {
    let row: Option<(Uuid,)> = sqlx::query_as(
        "SELECT id FROM cultivos WHERE activo = TRUE AND cultivador_id = $1 ORDER BY created_at DESC LIMIT 1",
    )
    .bind(tenant.cultivador_id)
    .fetch_optional(pool)
    .await?;
    row.map(|(id,)| id).ok_or_else(|| {
        FecanboError::Validation("No hay cultivos activos. Crea un cultivo primero.".to_string())
    })
}

pub async fn create_alerta(pool: &DbPool, tenant: Tenant, form: AlertaForm) -> FecanboResult<Alerta> {
    let nueva = NuevaAlerta::from_form(&form)?;
    let cultivo_id = match blank_to_none(form.cultivo_id) {
        Some(raw) => {
            let id = parse_uuid_field(Some(raw), "Cultivo inválido")?;
            fetch_cultivo_scoped(pool, tenant, id).await?.id
        }
        None => default_cultivo(pool, tenant).await?,
    };

    let alerta = sqlx::query_as::<_, Alerta>(
        "INSERT INTO alertas (
            cultivo_id, tipo, prioridad, titulo, descripcion, fecha_programada,
            recordatorio_dias_antes, recurrente, intervalo_dias, creada_por
        ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
        RETURNING *",
    )
    .bind(cultivo_id)
    .bind(nueva.tipo.as_str())
    .bind(nueva.prioridad.as_str())
    .bind(&nueva.titulo)
    .bind(&nueva.descripcion)
    .bind(nueva.fecha_programada)
    .bind(nueva.recordatorio_dias_antes)
    .bind(nueva.recurrente)
    .bind(nueva.intervalo_dias)
    .bind(tenant.cultivador_id)
    .fetch_one(pool)
    .await
    .map_err(|e| FecanboError::operation("No se pudo crear la alerta", e))?;

    tracing::info!("Alert {} scheduled for crop {}", alerta.id, cultivo_id);
    Ok(alerta)
}

pub async fn toggle_alerta(
    pool: &DbPool,
    tenant: Tenant,
    id: Uuid,
    completada: bool,
    notas_completado: Option<String>,
) -> FecanboResult<Alerta> {
    sqlx::query_as::<_, Alerta>(
        "UPDATE alertas a SET
            completada = $1,
            fecha_completada = CASE WHEN $1 THEN NOW() ELSE NULL END,
            notas_completado = CASE WHEN $1 THEN $2 ELSE NULL END
         FROM cultivos c
         WHERE a.id = $3 AND c.id = a.cultivo_id AND ($4 OR c.cultivador_id = $5)
         RETURNING a.*",
    )
    .bind(completada)
    .bind(blank_to_none(notas_completado))
    .bind(id)
    .bind(tenant.es_admin)
    .bind(tenant.cultivador_id)
    .fetch_optional(pool)
    .await
    .map_err(|e| FecanboError::operation("No se pudo actualizar la alerta", e))?
    .ok_or_else(|| FecanboError::NotFound("Alerta no encontrada".to_string()))
}

pub async fn delete_alerta(pool: &DbPool, tenant: Tenant, id: Uuid) -> FecanboResult<()> {
    let result = sqlx::query(
        "DELETE FROM alertas a USING cultivos c
         WHERE a.id = $1 AND c.id = a.cultivo_id AND ($2 OR c.cultivador_id = $3)",
    )
    .bind(id)
    .bind(tenant.es_admin)
    .bind(tenant.cultivador_id)
    .execute(pool)
    .await
    .map_err(|e| FecanboError::operation("No se pudo eliminar la alerta", e))?;

    if result.rows_affected() == 0 {
        return Err(FecanboError::NotFound("Alerta no encontrada".to_string()));
    }
    Ok(())
}

pub async fn get_alertas_axum(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> FecanboResult<Json<Vec<AlertaConCultivo>>> {
    Ok(Json(get_alertas(&state.pool, claims.tenant()?).await?))
}

pub async fn get_alertas_pendientes_axum(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> FecanboResult<Json<Vec<AlertaConCultivo>>> {
    Ok(Json(get_alertas_pendientes(&state.pool, claims.tenant()?).await?))
}

pub async fn create_alerta_axum(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(form): Json<AlertaForm>,
) -> FecanboResult<Json<Alerta>> {
    Ok(Json(create_alerta(&state.pool, claims.tenant()?, form).await?))
}

pub async fn toggle_alerta_axum(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
    Json(payload): Json<ToggleAlertaRequest>,
) -> FecanboResult<Json<Alerta>> {
    Ok(Json(
        toggle_alerta(
            &state.pool,
            claims.tenant()?,
            id,
            payload.completada,
            payload.notas_completado,
        )
        .await?,
    ))
}

pub async fn delete_alerta_axum(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
) -> FecanboResult<Json<()>> {
    delete_alerta(&state.pool, claims.tenant()?, id).await?;
    Ok(Json(()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn form(json: &str) -> AlertaForm {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn test_defaults_applied() {
        let nueva = NuevaAlerta::from_form(&form(
            r#"{"tipo": "riego", "fecha_programada": "2025-03-10"}"#,
        ))
        .unwrap();
        assert_eq!(nueva.tipo, TipoAlerta::Riego);
        assert_eq!(nueva.prioridad, PrioridadAlerta::Media);
        assert_eq!(nueva.titulo, "Alerta de Riego");
        assert_eq!(nueva.recordatorio_dias_antes, 1);
        assert!(!nueva.recurrente);
        assert_eq!(nueva.intervalo_dias, None);
        // Midnight in Buenos Aires is 03:00 UTC
        assert_eq!(nueva.fecha_programada.to_rfc3339(), "2025-03-10T03:00:00+00:00");
    }

    #[test]
    fn test_recurrence_requires_interval() {
        let err = NuevaAlerta::from_form(&form(
            r#"{"tipo": "poda", "fecha_programada": "2025-03-10", "recurrente": true, "intervalo_dias": ""}"#,
        ));
        assert!(matches!(err, Err(FecanboError::Validation(_))));

        let nueva = NuevaAlerta::from_form(&form(
            r#"{"tipo": "poda", "titulo": "Poda apical", "prioridad": "alta", "fecha_programada": "2025-03-10T08:30", "recurrente": true, "intervalo_dias": "7"}"#,
        ))
        .unwrap();
        assert_eq!(nueva.intervalo_dias, Some(7));
        assert_eq!(nueva.titulo, "Poda apical");
        assert_eq!(nueva.prioridad, PrioridadAlerta::Alta);
    }

    #[test]
    fn test_invalid_values_rejected() {
        assert!(NuevaAlerta::from_form(&form(r#"{"fecha_programada": "2025-03-10"}"#)).is_err());
        assert!(NuevaAlerta::from_form(&form(r#"{"tipo": "cosecha"}"#)).is_err());
        assert!(NuevaAlerta::from_form(&form(
            r#"{"tipo": "lluvia", "fecha_programada": "2025-03-10"}"#
        ))
        .is_err());
        assert!(NuevaAlerta::from_form(&form(
            r#"{"tipo": "riego", "fecha_programada": "10/03/2025"}"#
        ))
        .is_err());
    }
}
