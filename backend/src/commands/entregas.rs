use crate::catalog::TipoProducto;
use crate::commands::cultivos::fetch_cultivo_scoped;
use crate::commands::usuarios::get_usuario_final;
use crate::commands::utility::{argentina_offset, blank_to_none, de_opt_decimal, parse_uuid_field};
use crate::db::{DbPool, Entrega, EntregaDetalle, EntregasPorMes};
use crate::error::{FecanboError, FecanboResult};
use crate::middleware::auth::{Claims, Tenant};
use crate::state::AppState;
use axum::extract::{Json, State};
use axum::Extension;
use chrono::{DateTime, Datelike, Months, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::Deserialize;
use std::collections::BTreeMap;
use uuid::Uuid;

const MESES: [&str; 12] = [
    "Ene", "Feb", "Mar", "Abr", "May", "Jun", "Jul", "Ago", "Sep", "Oct", "Nov", "Dic",
];

const DETALLE_SELECT: &str = "SELECT e.*,
        c.nombre AS cultivo_nombre, c.variedad AS cultivo_variedad,
        u.nombre_completo AS usuario_nombre, u.documento AS usuario_documento
     FROM entregas e
     LEFT JOIN cultivos c ON c.id = e.cultivo_id
     LEFT JOIN usuarios_finales u ON u.id = e.usuario_final_id";

#[derive(Deserialize, Default, Debug)]
pub struct EntregaForm {
    pub cultivo_id: Option<String>,
    pub usuario_final_id: Option<String>,
    pub tipo_producto: Option<String>,
    #[serde(default, deserialize_with = "de_opt_decimal")]
    pub cantidad_gramos: Option<Decimal>,
    pub lote: Option<String>,
    pub notas: Option<String>,
}

/// Grams are stored as NUMERIC(10,2): two decimals, half away from zero,
/// at most 99999999.99.
pub fn parse_gramos(value: Option<Decimal>) -> FecanboResult<Decimal> {
    let gramos = value
        .map(|d| d.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero))
        .ok_or_else(|| FecanboError::Validation("Indica la cantidad en gramos.".to_string()))?;
    if gramos <= Decimal::ZERO {
        return Err(FecanboError::Validation(
            "La cantidad en gramos debe ser mayor a cero.".to_string(),
        ));
    }
    if gramos > Decimal::new(9_999_999_999, 2) {
        return Err(FecanboError::Validation(
            "La cantidad en gramos no puede superar 99999999.99.".to_string(),
        ));
    }
    Ok(gramos)
}

/// Groups deliveries by calendar month (Argentina time), oldest first,
/// with grams rounded to whole numbers.
pub fn agrupar_por_mes(entregas: &[(DateTime<Utc>, Decimal)]) -> Vec<EntregasPorMes> {
    let mut meses: BTreeMap<(i32, u32), (i64, Decimal)> = BTreeMap::new();
    for (fecha, gramos) in entregas {
        let local = fecha.with_timezone(&argentina_offset());
        let entry = meses.entry((local.year(), local.month())).or_default();
        entry.0 += 1;
        entry.1 += *gramos;
    }
    meses
        .into_iter()
        .map(|((year, month), (count, gramos))| EntregasPorMes {
            mes: format!("{} {}", MESES[(month - 1) as usize], year),
            entregas: count,
            gramos: gramos
                .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
                .to_i64()
                .unwrap_or_default(),
        })
        .collect()
}

pub async fn get_entregas(pool: &DbPool, tenant: Tenant) -> FecanboResult<Vec<EntregaDetalle>> {
    let sql = format!(
        "{} WHERE ($1 OR e.cultivador_id = $2) ORDER BY e.fecha_entrega DESC",
        DETALLE_SELECT
    );
    let entregas = sqlx::query_as::<_, EntregaDetalle>(&sql)
        .bind(tenant.es_admin)
        .bind(tenant.cultivador_id)
        .fetch_all(pool)
        .await?;
    Ok(entregas)
}

pub async fn get_entrega_detalle(pool: &DbPool, tenant: Tenant, id: Uuid) -> FecanboResult<EntregaDetalle> {
    let sql = format!("{} WHERE e.id = $1 AND ($2 OR e.cultivador_id = $3)", DETALLE_SELECT);
    sqlx::query_as::<_, EntregaDetalle>(&sql)
        .bind(id)
        .bind(tenant.es_admin)
        .bind(tenant.cultivador_id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| FecanboError::NotFound("Entrega no encontrada".to_string()))
}

pub async fn create_entrega(pool: &DbPool, tenant: Tenant, form: EntregaForm) -> FecanboResult<Entrega> {
    let cultivo_id = parse_uuid_field(form.cultivo_id, "Selecciona un cultivo.")?;
    let usuario_final_id = parse_uuid_field(form.usuario_final_id, "Selecciona un usuario final.")?;
    let cantidad_gramos = parse_gramos(form.cantidad_gramos)?;
    let tipo = TipoProducto::from_form(form.tipo_producto.as_deref());

    let cultivo = fetch_cultivo_scoped(pool, tenant, cultivo_id).await?;
    let usuario = get_usuario_final(pool, tenant, usuario_final_id).await?;
    if !usuario.activo {
        return Err(FecanboError::Validation(
            "El usuario final no está activo.".to_string(),
        ));
    }

    let entrega = sqlx::query_as::<_, Entrega>(
        "INSERT INTO entregas (
            cultivo_id, usuario_final_id, cultivador_id, fecha_entrega,
            cantidad_gramos, tipo_producto, lote, notas
        ) VALUES ($1, $2, $3, NOW(), $4, $5, $6, $7)
        RETURNING *",
    )
    .bind(cultivo.id)
    .bind(usuario.id)
    .bind(cultivo.cultivador_id)
    .bind(cantidad_gramos)
    .bind(tipo.as_str())
    .bind(blank_to_none(form.lote))
    .bind(blank_to_none(form.notas))
    .fetch_one(pool)
    .await
    .map_err(|e| FecanboError::operation("No se pudo crear la entrega", e))?;

    tracing::info!(
        "Delivery {} of {} g from crop {} to end user {}",
        entrega.id,
        entrega.cantidad_gramos,
        cultivo.id,
        usuario.id
    );
    Ok(entrega)
}

pub async fn get_entregas_por_mes(pool: &DbPool, tenant: Tenant) -> FecanboResult<Vec<EntregasPorMes>> {
    let desde = Utc::now()
        .checked_sub_months(Months::new(6))
        .unwrap_or_else(Utc::now);
    let rows: Vec<(DateTime<Utc>, Decimal)> = sqlx::query_as(
        "SELECT fecha_entrega, cantidad_gramos FROM entregas
         WHERE fecha_entrega >= $1 AND ($2 OR cultivador_id = $3)
         ORDER BY fecha_entrega ASC",
    )
    .bind(desde)
    .bind(tenant.es_admin)
    .bind(tenant.cultivador_id)
    .fetch_all(pool)
    .await?;
    Ok(agrupar_por_mes(&rows))
}

pub async fn get_entregas_axum(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> FecanboResult<Json<Vec<EntregaDetalle>>> {
    Ok(Json(get_entregas(&state.pool, claims.tenant()?).await?))
}

pub async fn create_entrega_axum(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(form): Json<EntregaForm>,
) -> FecanboResult<Json<Entrega>> {
    Ok(Json(create_entrega(&state.pool, claims.tenant()?, form).await?))
}

pub async fn get_entregas_por_mes_axum(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> FecanboResult<Json<Vec<EntregasPorMes>>> {
    Ok(Json(get_entregas_por_mes(&state.pool, claims.tenant()?).await?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::str::FromStr;

    fn at(y: i32, m: u32, d: u32, h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, 0, 0).unwrap()
    }

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    #[test]
    fn test_grams_are_exact_and_positive() {
        assert_eq!(parse_gramos(Some(dec("2.5"))).unwrap(), dec("2.5"));
        assert_eq!(parse_gramos(Some(dec("10.126"))).unwrap(), dec("10.13"));
        assert!(parse_gramos(Some(Decimal::ZERO)).is_err());
        assert!(parse_gramos(Some(dec("0.004"))).is_err());
        assert!(parse_gramos(Some(dec("-3"))).is_err());
        assert!(parse_gramos(None).is_err());
    }

    #[test]
    fn test_grams_round_half_away_from_zero() {
        for raw in [r#""2.675""#, "2.675"] {
            let form: EntregaForm =
                serde_json::from_str(&format!(r#"{{"cantidad_gramos": {}}}"#, raw)).unwrap();
            assert_eq!(parse_gramos(form.cantidad_gramos).unwrap(), dec("2.68"));
        }
        assert_eq!(parse_gramos(Some(dec("0.005"))).unwrap(), dec("0.01"));
    }

    #[test]
    fn test_grams_above_column_limit_are_rejected() {
        assert_eq!(parse_gramos(Some(dec("99999999.99"))).unwrap(), dec("99999999.99"));
        assert!(matches!(
            parse_gramos(Some(dec("99999999.995"))),
            Err(FecanboError::Validation(_))
        ));
        let form: EntregaForm = serde_json::from_str(r#"{"cantidad_gramos": 1e12}"#).unwrap();
        assert!(matches!(
            parse_gramos(form.cantidad_gramos),
            Err(FecanboError::Validation(_))
        ));
    }

    #[test]
    fn test_monthly_grouping() {
        let rows = vec![
            (at(2025, 1, 10, 15), Decimal::from_str("10.4").unwrap()),
            (at(2025, 1, 20, 15), Decimal::from_str("5.3").unwrap()),
            // 01:00 UTC on Feb 1st is still January 31st in Buenos Aires
            (at(2025, 2, 1, 1), Decimal::from_str("1").unwrap()),
            (at(2024, 12, 5, 12), Decimal::from_str("7.5").unwrap()),
            (at(2025, 3, 2, 12), Decimal::from_str("20").unwrap()),
        ];
        let meses = agrupar_por_mes(&rows);
        assert_eq!(
            meses,
            vec![
                EntregasPorMes { mes: "Dic 2024".into(), entregas: 1, gramos: 8 },
                EntregasPorMes { mes: "Ene 2025".into(), entregas: 3, gramos: 17 },
                EntregasPorMes { mes: "Mar 2025".into(), entregas: 1, gramos: 20 },
            ]
        );
    }

    #[test]
    fn test_form_accepts_text_grams() {
        let form: EntregaForm = serde_json::from_str(
            r#"{"cultivo_id": "", "usuario_final_id": "x", "tipo_producto": "crema", "cantidad_gramos": "3,75"}"#,
        )
        .unwrap();
        assert_eq!(form.cantidad_gramos, Some(dec("3.75")));
        assert_eq!(TipoProducto::from_form(form.tipo_producto.as_deref()), TipoProducto::Otro);
        assert!(parse_uuid_field(form.cultivo_id, "Selecciona un cultivo.").is_err());
    }
}
