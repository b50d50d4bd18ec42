use crate::commands::utility::argentina_offset;
use crate::db::{AlertaConCultivo, DbPool};
use crate::error::{FecanboError, FecanboResult};
use crate::middleware::auth::{Claims, Tenant};
use crate::state::AppState;
use axum::extract::{Json, Query, State};
use axum::Extension;
use chrono::{Datelike, Duration, NaiveDate, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

const MESES_LARGOS: [&str; 12] = [
    "Enero", "Febrero", "Marzo", "Abril", "Mayo", "Junio", "Julio", "Agosto", "Septiembre",
    "Octubre", "Noviembre", "Diciembre",
];

#[derive(Deserialize, Debug, Default)]
pub struct CalendarioQuery {
    pub mes: Option<String>,
}

#[derive(Serialize, Debug)]
pub struct DiaCalendario {
    pub fecha: NaiveDate,
    pub en_mes: bool,
    pub es_hoy: bool,
    pub alertas: Vec<AlertaConCultivo>,
}

#[derive(Serialize, Debug)]
pub struct Calendario {
    pub mes: String,
    pub titulo: String,
    pub dias: Vec<DiaCalendario>,
}

const ANIOS_VALIDOS: std::ops::RangeInclusive<i32> = 1900..=9999;

fn mes_invalido(value: &str) -> FecanboError {
    FecanboError::Validation(format!("Mes inválido: '{}'", value))
}

/// `YYYY-MM` → first day of that month. Years outside 1900..=9999 are refused.
pub fn parse_mes(value: &str) -> FecanboResult<NaiveDate> {
    NaiveDate::parse_from_str(&format!("{}-01", value.trim()), "%Y-%m-%d")
        .ok()
        .filter(|d| ANIOS_VALIDOS.contains(&d.year()))
        .ok_or_else(|| mes_invalido(value))
}

/// Monday on or before the 1st through the Sunday on or after the last day.
pub fn grid_bounds(primero: NaiveDate) -> FecanboResult<(NaiveDate, NaiveDate)> {
    let fuera_de_rango = || mes_invalido(&primero.format("%Y-%m").to_string());
    let ultimo = primero
        .checked_add_months(chrono::Months::new(1))
        .and_then(|siguiente| siguiente.checked_sub_signed(Duration::days(1)))
        .ok_or_else(fuera_de_rango)?;
    let inicio = primero
        .checked_sub_signed(Duration::days(primero.weekday().num_days_from_monday() as i64))
        .ok_or_else(fuera_de_rango)?;
    let fin = ultimo
        .checked_add_signed(Duration::days(6 - ultimo.weekday().num_days_from_monday() as i64))
        .ok_or_else(fuera_de_rango)?;
    Ok((inicio, fin))
}

pub fn build_calendario(
    primero: NaiveDate,
    hoy: NaiveDate,
    alertas: Vec<AlertaConCultivo>,
) -> FecanboResult<Calendario> {
    let offset = argentina_offset();
    let mut por_dia: HashMap<NaiveDate, Vec<AlertaConCultivo>> = HashMap::new();
    for alerta in alertas {
        let dia = alerta.alerta.fecha_programada.with_timezone(&offset).date_naive();
        por_dia.entry(dia).or_default().push(alerta);
    }

    let (inicio, fin) = grid_bounds(primero)?;
    let dias = inicio
        .iter_days()
        .take_while(|d| *d <= fin)
        .map(|fecha| DiaCalendario {
            fecha,
            en_mes: fecha.month() == primero.month() && fecha.year() == primero.year(),
            es_hoy: fecha == hoy,
            alertas: por_dia.remove(&fecha).unwrap_or_default(),
        })
        .collect();

    Ok(Calendario {
        mes: primero.format("%Y-%m").to_string(),
        titulo: format!("{} {}", MESES_LARGOS[primero.month0() as usize], primero.year()),
        dias,
    })
}

pub async fn get_calendario(pool: &DbPool, tenant: Tenant, mes: Option<String>) -> FecanboResult<Calendario> {
    let offset = argentina_offset();
    let hoy = Utc::now().with_timezone(&offset).date_naive();
    let primero = match mes.filter(|m| !m.trim().is_empty()) {
        Some(m) => parse_mes(&m)?,
        None => hoy.with_day(1).unwrap_or(hoy),
    };
    let (inicio, fin) = grid_bounds(primero)?;
    let to_utc = |d: NaiveDate| {
        d.and_hms_opt(0, 0, 0)
            .and_then(|dt| offset.from_local_datetime(&dt).single())
            .map(|dt| dt.with_timezone(&Utc))
            .ok_or_else(|| FecanboError::Internal("Fecha fuera de rango".to_string()))
    };
    let desde = to_utc(inicio)?;
    let hasta = to_utc(fin.succ_opt().unwrap_or(fin))?;

    let alertas = sqlx::query_as::<_, AlertaConCultivo>(
        "SELECT a.*, c.nombre AS cultivo_nombre, c.variedad AS cultivo_variedad
         FROM alertas a
         JOIN cultivos c ON c.id = a.cultivo_id
         WHERE a.completada = FALSE
           AND a.fecha_programada >= $1 AND a.fecha_programada < $2
           AND ($3 OR c.cultivador_id = $4)
         ORDER BY a.fecha_programada ASC",
    )
    .bind(desde)
    .bind(hasta)
    .bind(tenant.es_admin)
    .bind(tenant.cultivador_id)
    .fetch_all(pool)
    .await?;

    build_calendario(primero, hoy, alertas)
}

pub async fn get_calendario_axum(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Query(query): Query<CalendarioQuery>,
) -> FecanboResult<Json<Calendario>> {
    Ok(Json(get_calendario(&state.pool, claims.tenant()?, query.mes).await?))
}
