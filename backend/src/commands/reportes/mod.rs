pub mod pdf;
pub mod texto;

use crate::commands::cultivos::fetch_cultivo_scoped;
use crate::commands::usuarios::get_usuario_final;
use crate::commands::utility::slug;
use crate::db::{DbPool, Entrega};
use crate::error::{FecanboError, FecanboResult};
use crate::middleware::auth::{Claims, Tenant};
use crate::state::AppState;
use axum::{
    extract::{Path, Query, State},
    http::header,
    response::IntoResponse,
    Extension,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Formato {
    #[default]
    Pdf,
    Txt,
}

impl Formato {
    fn extension(self) -> &'static str {
        match self {
            Formato::Pdf => "pdf",
            Formato::Txt => "txt",
        }
    }

    fn content_type(self) -> &'static str {
        match self {
            Formato::Pdf => "application/pdf",
            Formato::Txt => "text/plain; charset=utf-8",
        }
    }
}

#[derive(Deserialize, Debug, Default)]
pub struct FormatoQuery {
    #[serde(default)]
    pub formato: Formato,
}

/// A rendered document ready to be downloaded.
#[derive(Debug)]
pub struct Documento {
    pub file_name: String,
    pub formato: Formato,
    pub bytes: Vec<u8>,
}

impl IntoResponse for Documento {
    fn into_response(self) -> axum::response::Response {
        let disposition = format!("attachment; filename=\"{}\"", self.file_name);
        (
            [
                (header::CONTENT_TYPE, self.formato.content_type().to_string()),
                (header::CONTENT_DISPOSITION, disposition),
            ],
            self.bytes,
        )
            .into_response()
    }
}

/// Download names keep to ASCII letters, digits, dashes and dots.
pub fn file_name(prefix: &str, base: &str, generado: DateTime<Utc>, formato: Formato) -> String {
    let base: String = pdf::fold_ascii(&slug(base))
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
        .collect();
    format!(
        "{}-{}-{}.{}",
        prefix,
        base,
        generado.format("%Y-%m-%d"),
        formato.extension()
    )
}

async fn render(titulo: &'static str, texto: String, formato: Formato) -> FecanboResult<Vec<u8>> {
    match formato {
        Formato::Txt => Ok(texto.into_bytes()),
        Formato::Pdf => tokio::task::spawn_blocking(move || pdf::render_pdf(titulo, &texto))
            .await
            .map_err(|e| FecanboError::Internal(e.to_string()))?,
    }
}

pub async fn reporte_cultivo(
    pool: &DbPool,
    tenant: Tenant,
    id: Uuid,
    formato: Formato,
) -> FecanboResult<Documento> {
    let cultivo = fetch_cultivo_scoped(pool, tenant, id).await?;
    let generado = Utc::now();
    let texto = texto::reporte_cultivo(&cultivo, generado);
    let bytes = render(texto::TITULO_CULTIVO, texto, formato).await?;
    tracing::info!("Generated crop report for {} ({:?})", cultivo.id, formato);
    Ok(Documento {
        file_name: file_name("cultivo", &cultivo.nombre, generado, formato),
        formato,
        bytes,
    })
}

pub async fn comprobante_entrega(
    pool: &DbPool,
    tenant: Tenant,
    id: Uuid,
    formato: Formato,
) -> FecanboResult<Documento> {
    let entrega = sqlx::query_as::<_, Entrega>(
        "SELECT * FROM entregas WHERE id = $1 AND ($2 OR cultivador_id = $3)",
    )
    .bind(id)
    .bind(tenant.es_admin)
    .bind(tenant.cultivador_id)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| FecanboError::NotFound("Entrega no encontrada".to_string()))?;

    let (cultivo, usuario) = tokio::try_join!(
        fetch_cultivo_scoped(pool, tenant, entrega.cultivo_id),
        get_usuario_final(pool, tenant, entrega.usuario_final_id),
    )?;

    let generado = Utc::now();
    let texto = texto::comprobante_entrega(&entrega, &cultivo, &usuario, generado);
    let bytes = render(texto::TITULO_ENTREGA, texto, formato).await?;
    let base = entrega
        .lote
        .clone()
        .filter(|l| !l.trim().is_empty())
        .unwrap_or_else(|| entrega.id.to_string());
    tracing::info!("Generated delivery receipt for {} ({:?})", entrega.id, formato);
    Ok(Documento {
        file_name: file_name("entrega", &base, generado, formato),
        formato,
        bytes,
    })
}

pub async fn reporte_cultivo_axum(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
    Query(query): Query<FormatoQuery>,
) -> FecanboResult<impl IntoResponse> {
    reporte_cultivo(&state.pool, claims.tenant()?, id, query.formato).await
}

pub async fn comprobante_entrega_axum(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
    Query(query): Query<FormatoQuery>,
) -> FecanboResult<impl IntoResponse> {
    comprobante_entrega(&state.pool, claims.tenant()?, id, query.formato).await
}
