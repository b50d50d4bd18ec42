use crate::catalog::Etapa;
use crate::commands::alertas::get_alertas_pendientes;
use crate::commands::entregas::get_entregas_por_mes;
use crate::db::{AlertaConCultivo, Cultivo, CultivosPorEtapa, DbPool, Estadisticas, EntregasPorMes};
use crate::error::{FecanboError, FecanboResult};
use crate::middleware::auth::{Claims, Tenant};
use crate::state::AppState;
use axum::{extract::State, Extension, Json};
use serde::Serialize;
use std::collections::HashMap;

const RECENT_CROPS: i64 = 5;

#[derive(Serialize, Debug)]
pub struct Dashboard {
    pub estadisticas: Estadisticas,
    pub cultivos_recientes: Vec<Cultivo>,
    pub alertas_pendientes: Vec<AlertaConCultivo>,
    pub cultivos_por_etapa: Vec<CultivosPorEtapa>,
    pub entregas_por_mes: Vec<EntregasPorMes>,
}

/// Counts degrade to zero when the query fails or times out; the dashboard
/// still renders.
pub async fn get_estadisticas(pool: &DbPool, tenant: Tenant) -> Estadisticas {
    let sql = r#"
        WITH cultivo_stats AS (
            SELECT
                COUNT(*) AS total,
                COUNT(*) FILTER (WHERE activo) AS activos,
                COUNT(*) FILTER (WHERE NOT activo) AS finalizados
            FROM cultivos
            WHERE ($1 OR cultivador_id = $2)
        ),
        alerta_stats AS (
            SELECT COUNT(*) AS pendientes
            FROM alertas a
            JOIN cultivos c ON c.id = a.cultivo_id
            WHERE a.completada = FALSE AND ($1 OR c.cultivador_id = $2)
        ),
        entrega_stats AS (
            SELECT COUNT(*) AS total, COALESCE(SUM(cantidad_gramos), 0) AS gramos
            FROM entregas
            WHERE ($1 OR cultivador_id = $2)
        ),
        usuario_stats AS (
            SELECT COUNT(*) AS activos
            FROM usuarios_finales
            WHERE activo AND ($1 OR cultivador_id = $2)
        )
        SELECT
            cs.total AS total_cultivos,
            cs.activos AS cultivos_activos,
            cs.finalizados AS cultivos_finalizados,
            als.pendientes AS alertas_pendientes,
            es.total AS total_entregas,
            es.gramos AS total_gramos_entregados,
            us.activos AS total_usuarios_finales
        FROM cultivo_stats cs, alerta_stats als, entrega_stats es, usuario_stats us
    "#;

    match tokio::time::timeout(
        std::time::Duration::from_secs(15),
        sqlx::query_as::<_, Estadisticas>(sql)
            .bind(tenant.es_admin)
            .bind(tenant.cultivador_id)
            .fetch_one(pool),
    )
    .await
    {
        Ok(Ok(stats)) => stats,
        Ok(Err(e)) => {
            tracing::error!("Dashboard stats error: {}", e);
            Estadisticas::default()
        }
        Err(_) => {
            tracing::error!("Dashboard stats timeout");
            Estadisticas::default()
        }
    }
}

/// Fills in the chart stages that have no active crops.
pub fn etapas_para_grafico(conteos: &[(String, i64)]) -> Vec<CultivosPorEtapa> {
    let por_etapa: HashMap<&str, i64> = conteos.iter().map(|(e, n)| (e.as_str(), *n)).collect();
    Etapa::CHART
        .iter()
        .map(|etapa| CultivosPorEtapa {
            etapa: etapa.label().to_string(),
            cantidad: por_etapa.get(etapa.as_str()).copied().unwrap_or(0),
        })
        .collect()
}

pub async fn get_cultivos_por_etapa(pool: &DbPool, tenant: Tenant) -> FecanboResult<Vec<CultivosPorEtapa>> {
    let conteos: Vec<(String, i64)> = sqlx::query_as(
        "SELECT estado_actual, COUNT(*) FROM cultivos
         WHERE activo = TRUE AND ($1 OR cultivador_id = $2)
         GROUP BY estado_actual",
    )
    .bind(tenant.es_admin)
    .bind(tenant.cultivador_id)
    .fetch_all(pool)
    .await?;
    Ok(etapas_para_grafico(&conteos))
}

async fn get_cultivos_recientes(pool: &DbPool, tenant: Tenant) -> FecanboResult<Vec<Cultivo>> {
    let cultivos = sqlx::query_as::<_, Cultivo>(
        "SELECT * FROM cultivos WHERE activo = TRUE AND ($1 OR cultivador_id = $2)
         ORDER BY created_at DESC LIMIT $3",
    )
    .bind(tenant.es_admin)
    .bind(tenant.cultivador_id)
    .bind(RECENT_CROPS)
    .fetch_all(pool)
    .await?;
    Ok(cultivos)
}

pub async fn get_dashboard(pool: &DbPool, tenant: Tenant) -> FecanboResult<Dashboard> {
    let (estadisticas, cultivos_recientes, alertas_pendientes, cultivos_por_etapa, entregas_por_mes) = tokio::try_join!(
        async { Ok::<_, FecanboError>(get_estadisticas(pool, tenant).await) },
        get_cultivos_recientes(pool, tenant),
        get_alertas_pendientes(pool, tenant),
        get_cultivos_por_etapa(pool, tenant),
        get_entregas_por_mes(pool, tenant),
    )?;
    Ok(Dashboard {
        estadisticas,
        cultivos_recientes,
        alertas_pendientes,
        cultivos_por_etapa,
        entregas_por_mes,
    })
}

pub async fn get_dashboard_axum(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> FecanboResult<Json<Dashboard>> {
    Ok(Json(get_dashboard(&state.pool, claims.tenant()?).await?))
}

pub async fn get_estadisticas_axum(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> FecanboResult<Json<Estadisticas>> {
    Ok(Json(get_estadisticas(&state.pool, claims.tenant()?).await))
}

pub async fn get_cultivos_por_etapa_axum(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> FecanboResult<Json<Vec<CultivosPorEtapa>>> {
    Ok(Json(get_cultivos_por_etapa(&state.pool, claims.tenant()?).await?))
}
