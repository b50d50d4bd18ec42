use super::crud::fetch_cultivo_scoped;
use crate::catalog::Etapa;
use crate::db::{CultivoEtapa, DbPool};
use crate::error::{FecanboError, FecanboResult};
use crate::middleware::auth::{Claims, Tenant};
use crate::state::AppState;
use axum::extract::{Json, Path, State};
use axum::Extension;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Deserialize)]
pub struct CambioEtapaRequest {
    #[serde(alias = "nueva_etapa")]
    pub etapa: String,
    pub observaciones: Option<String>,
}

/// Result of a transition: the stage row that was closed (if any) and the
/// new open one.
#[derive(Serialize, Debug)]
pub struct CambioEtapa {
    pub anterior: Option<CultivoEtapa>,
    pub actual: CultivoEtapa,
}

/// One entry of the stage timeline shown next to a crop.
#[derive(Serialize, Debug, PartialEq)]
pub struct EtapaInfo {
    pub etapa: Etapa,
    pub nombre: &'static str,
    pub orden: usize,
    pub duracion_tipica: &'static str,
}

pub fn catalogo_etapas() -> Vec<EtapaInfo> {
    Etapa::ALL
        .iter()
        .map(|etapa| EtapaInfo {
            etapa: *etapa,
            nombre: etapa.label(),
            orden: etapa.position() + 1,
            duracion_tipica: etapa.typical_duration(),
        })
        .collect()
}

pub async fn get_etapas(pool: &DbPool, tenant: Tenant, cultivo_id: Uuid) -> FecanboResult<Vec<CultivoEtapa>> {
    fetch_cultivo_scoped(pool, tenant, cultivo_id).await?;
    let etapas = sqlx::query_as::<_, CultivoEtapa>(
        "SELECT * FROM cultivo_etapas WHERE cultivo_id = $1 ORDER BY fecha_inicio ASC",
    )
    .bind(cultivo_id)
    .fetch_all(pool)
    .await?;
    Ok(etapas)
}

/// Closes the open stage row, opens a new one and moves the crop's current
/// stage, all in one transaction with the crop row locked.
pub async fn change_stage(
    pool: &DbPool,
    tenant: Tenant,
    cultivo_id: Uuid,
    etapa: Etapa,
    observaciones: Option<String>,
) -> FecanboResult<CambioEtapa> {
    let mut tx = pool.begin().await?;

    let locked: Option<(Uuid,)> = sqlx::query_as(
        "SELECT id FROM cultivos WHERE id = $1 AND ($2 OR cultivador_id = $3) FOR UPDATE",
    )
    .bind(cultivo_id)
    .bind(tenant.es_admin)
    .bind(tenant.cultivador_id)
    .fetch_optional(&mut *tx)
    .await?;
    if locked.is_none() {
        return Err(FecanboError::NotFound("Cultivo no encontrado".to_string()));
    }

    // Read after the lock so a transition that waited never closes a stage
    // before the time it was opened.
    let (ahora,): (DateTime<Utc>,) = sqlx::query_as("SELECT clock_timestamp()")
        .fetch_one(&mut *tx)
        .await?;

    let anterior = sqlx::query_as::<_, CultivoEtapa>(
        "UPDATE cultivo_etapas SET
            fecha_fin = $2,
            duracion_dias = FLOOR(EXTRACT(EPOCH FROM ($2 - fecha_inicio)) / 86400)::INT
         WHERE cultivo_id = $1 AND fecha_fin IS NULL
         RETURNING *",
    )
    .bind(cultivo_id)
    .bind(ahora)
    .fetch_optional(&mut *tx)
    .await
    .map_err(|e| FecanboError::operation("No se pudo cerrar la etapa actual", e))?;

    let actual = sqlx::query_as::<_, CultivoEtapa>(
        "INSERT INTO cultivo_etapas (cultivo_id, etapa, fecha_inicio, observaciones)
         VALUES ($1, $2, $3, $4)
         RETURNING *",
    )
    .bind(cultivo_id)
    .bind(etapa.as_str())
    .bind(ahora)
    .bind(crate::commands::utility::blank_to_none(observaciones))
    .fetch_one(&mut *tx)
    .await
    .map_err(|e| FecanboError::operation("No se pudo crear la nueva etapa", e))?;

    sqlx::query("UPDATE cultivos SET estado_actual = $1, updated_at = $3 WHERE id = $2")
        .bind(etapa.as_str())
        .bind(cultivo_id)
        .bind(ahora)
        .execute(&mut *tx)
        .await
        .map_err(|e| FecanboError::operation("No se pudo actualizar el estado del cultivo", e))?;

    tx.commit().await?;
    tracing::info!("Crop {} moved to stage {}", cultivo_id, etapa);
    Ok(CambioEtapa { anterior, actual })
}

pub fn next_stage(etapa: Etapa) -> FecanboResult<Etapa> {
    etapa.next().ok_or_else(|| {
        FecanboError::Validation(format!(
            "La etapa {} es la última del ciclo.",
            etapa.label()
        ))
    })
}

pub async fn catalogo_etapas_axum() -> Json<Vec<EtapaInfo>> {
    Json(catalogo_etapas())
}

pub async fn get_etapas_axum(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
) -> FecanboResult<Json<Vec<CultivoEtapa>>> {
    Ok(Json(get_etapas(&state.pool, claims.tenant()?, id).await?))
}

pub async fn change_stage_axum(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
    Json(payload): Json<CambioEtapaRequest>,
) -> FecanboResult<Json<CambioEtapa>> {
    let etapa: Etapa = payload.etapa.parse()?;
    Ok(Json(
        change_stage(&state.pool, claims.tenant()?, id, etapa, payload.observaciones).await?,
    ))
}

pub async fn advance_stage_axum(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
) -> FecanboResult<Json<CambioEtapa>> {
    let tenant = claims.tenant()?;
    let cultivo = fetch_cultivo_scoped(&state.pool, tenant, id).await?;
    let siguiente = next_stage(cultivo.estado_actual.parse()?)?;
    Ok(Json(change_stage(&state.pool, tenant, id, siguiente, None).await?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_next_stage() {
        assert_eq!(next_stage(Etapa::Vegetativo).unwrap(), Etapa::Floracion);
        assert_eq!(next_stage(Etapa::Secado).unwrap(), Etapa::Curado);
        assert!(matches!(
            next_stage(Etapa::Finalizado),
            Err(FecanboError::Validation(_))
        ));
    }

    #[test]
    fn test_stage_catalog_order() {
        let catalogo = catalogo_etapas();
        assert_eq!(catalogo.len(), 7);
        assert_eq!(catalogo[0].etapa, Etapa::Germinacion);
        assert_eq!(catalogo[0].orden, 1);
        assert_eq!(catalogo[2].nombre, "Floración");
        assert_eq!(catalogo[2].duracion_tipica, "7-9 semanas");
        assert_eq!(catalogo[6].etapa, Etapa::Finalizado);
    }

    #[test]
    fn test_request_accepts_form_field_name() {
        let req: CambioEtapaRequest =
            serde_json::from_str(r#"{"nueva_etapa": "floracion"}"#).unwrap();
        assert_eq!(req.etapa.parse::<Etapa>().unwrap(), Etapa::Floracion);
        assert!(req.observaciones.is_none());
    }
}
