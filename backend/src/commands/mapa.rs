use crate::db::{Cultivo, DbPool};
use crate::error::FecanboResult;
use crate::middleware::auth::{Claims, Tenant};
use crate::state::AppState;
use axum::{extract::State, Extension, Json};
use serde::Serialize;
use uuid::Uuid;

const BBOX_DELTA: f64 = 0.01;

#[derive(Serialize, Debug, PartialEq)]
pub struct PuntoMapa {
    pub cultivo_id: Uuid,
    pub nombre: String,
    pub variedad: Option<String>,
    pub estado_actual: String,
    pub latitud: f64,
    pub longitud: f64,
    pub ubicacion_descripcion: Option<String>,
    pub embed_url: String,
    pub enlace: String,
}

pub fn osm_embed_url(lat: f64, lon: f64) -> String {
    format!(
        "https://www.openstreetmap.org/export/embed.html?bbox={},{},{},{}&layer=mapnik&marker={},{}",
        lon - BBOX_DELTA,
        lat - BBOX_DELTA,
        lon + BBOX_DELTA,
        lat + BBOX_DELTA,
        lat,
        lon
    )
}

pub fn punto_mapa(cultivo: Cultivo) -> Option<PuntoMapa> {
    let (latitud, longitud) = (cultivo.latitud?, cultivo.longitud?);
    Some(PuntoMapa {
        cultivo_id: cultivo.id,
        embed_url: osm_embed_url(latitud, longitud),
        enlace: format!("https://www.google.com/maps?q={},{}", latitud, longitud),
        nombre: cultivo.nombre,
        variedad: cultivo.variedad,
        estado_actual: cultivo.estado_actual,
        latitud,
        longitud,
        ubicacion_descripcion: cultivo.ubicacion_descripcion,
    })
}

pub async fn get_mapa(pool: &DbPool, tenant: Tenant) -> FecanboResult<Vec<PuntoMapa>> {
    let cultivos = sqlx::query_as::<_, Cultivo>(
        "SELECT * FROM cultivos
         WHERE activo = TRUE AND latitud IS NOT NULL AND longitud IS NOT NULL
           AND ($1 OR cultivador_id = $2)
         ORDER BY nombre ASC",
    )
    .bind(tenant.es_admin)
    .bind(tenant.cultivador_id)
    .fetch_all(pool)
    .await?;
    Ok(cultivos.into_iter().filter_map(punto_mapa).collect())
}

pub async fn get_mapa_axum(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> FecanboResult<Json<Vec<PuntoMapa>>> {
    Ok(Json(get_mapa(&state.pool, claims.tenant()?).await?))
}
