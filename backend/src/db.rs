use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::postgres::{PgConnectOptions, PgPoolOptions};
use sqlx::{FromRow, Pool, Postgres};
use std::str::FromStr;
use uuid::Uuid;

use crate::config::AppConfig;
use crate::error::{FecanboError, FecanboResult};

pub type DbPool = Pool<Postgres>;

pub fn init_pool_with_options(opts: PgConnectOptions) -> DbPool {
    // connect_lazy_with returns the pool immediately. It does not validate connection.
    PgPoolOptions::new()
        .max_connections(20)
        .acquire_timeout(std::time::Duration::from_secs(30))
        .idle_timeout(std::time::Duration::from_secs(120))
        .max_lifetime(std::time::Duration::from_secs(300))
        .connect_lazy_with(opts)
}

pub fn init_pool(database_url: &str) -> FecanboResult<DbPool> {
    let opts = PgConnectOptions::from_str(database_url)
        .map_err(|e| FecanboError::Internal(format!("Invalid DB URL: {}", e)))?;
    Ok(init_pool_with_options(opts))
}

pub async fn init_database(pool: &DbPool, config: &AppConfig) -> FecanboResult<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    if let Err(e) = ensure_seeds(pool, config).await {
        tracing::warn!("Seeding skipped: {}", e);
    }
    tracing::info!("Database ready");
    Ok(())
}

/// Creates the configured administrator account on an empty install.
async fn ensure_seeds(pool: &DbPool, config: &AppConfig) -> FecanboResult<()> {
    let (Some(email), Some(password)) = (&config.admin_email, &config.admin_password) else {
        return Ok(());
    };

    let exists: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM cultivadores WHERE email = $1")
        .bind(email.trim().to_lowercase())
        .fetch_one(pool)
        .await?;
    if exists.0 == 0 {
        let hash = crate::commands::auth::hash_password(password).await?;
        sqlx::query(
            "INSERT INTO cultivadores (email, password_hash, nombre_completo, es_admin) \
             VALUES ($1, $2, 'Administrador', TRUE) ON CONFLICT (email) DO NOTHING",
        )
        .bind(email.trim().to_lowercase())
        .bind(hash)
        .execute(pool)
        .await?;
        tracing::info!("Seeded administrator account {}", email);
    }
    Ok(())
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Cultivador {
    pub id: Uuid,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub nombre_completo: String,
    pub documento: Option<String>,
    pub telefono: Option<String>,
    pub direccion: Option<String>,
    pub provincia: Option<String>,
    pub ciudad: Option<String>,
    pub fecha_registro: DateTime<Utc>,
    pub estado: String,
    pub es_admin: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Cultivo {
    pub id: Uuid,
    pub cultivador_id: Uuid,
    pub nombre: String,
    pub variedad: Option<String>,
    pub tipo: Option<String>,
    pub proposito: Option<String>,
    pub fecha_inicio: NaiveDate,
    pub fecha_estimada_cosecha: Option<NaiveDate>,
    pub estado_actual: String,
    pub latitud: Option<f64>,
    pub longitud: Option<f64>,
    pub ubicacion_descripcion: Option<String>,
    pub metodo_cultivo: Option<String>,
    pub medio_cultivo: Option<String>,
    pub cantidad_plantas: i32,
    pub notas: Option<String>,
    pub activo: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct CultivoEtapa {
    pub id: Uuid,
    pub cultivo_id: Uuid,
    pub etapa: String,
    pub fecha_inicio: DateTime<Utc>,
    pub fecha_fin: Option<DateTime<Utc>>,
    pub duracion_dias: Option<i32>,
    pub observaciones: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Observacion {
    pub id: Uuid,
    pub cultivo_id: Uuid,
    pub cultivador_id: Uuid,
    pub fecha_observacion: DateTime<Utc>,
    pub tipo: String,
    pub descripcion: String,
    pub fotos: Vec<String>,
    pub temperatura: Option<f64>,
    pub humedad: Option<i32>,
    pub ph: Option<f64>,
    pub ec: Option<f64>,
    pub altura_cm: Option<f64>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Alerta {
    pub id: Uuid,
    pub cultivo_id: Uuid,
    pub tipo: String,
    pub prioridad: String,
    pub titulo: String,
    pub descripcion: Option<String>,
    pub fecha_programada: DateTime<Utc>,
    pub fecha_completada: Option<DateTime<Utc>>,
    pub completada: bool,
    pub recordatorio_dias_antes: i32,
    pub recurrente: bool,
    pub intervalo_dias: Option<i32>,
    pub creada_por: Option<Uuid>,
    pub notas_completado: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Alert joined with the name of its crop, as listed on the alerts page.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct AlertaConCultivo {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub alerta: Alerta,
    pub cultivo_nombre: Option<String>,
    pub cultivo_variedad: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct UsuarioFinal {
    pub id: Uuid,
    pub cultivador_id: Uuid,
    pub nombre_completo: String,
    pub documento: Option<String>,
    pub telefono: Option<String>,
    pub email: Option<String>,
    pub direccion: Option<String>,
    pub condicion_medica: Option<String>,
    pub observaciones_medicas: Option<String>,
    pub dosis_recomendada: Option<String>,
    pub notas: Option<String>,
    pub activo: bool,
    pub fecha_registro: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Entrega {
    pub id: Uuid,
    pub cultivo_id: Uuid,
    pub usuario_final_id: Uuid,
    pub cultivador_id: Uuid,
    pub fecha_entrega: DateTime<Utc>,
    pub cantidad_gramos: Decimal,
    pub tipo_producto: String,
    pub lote: Option<String>,
    pub notas: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Delivery with the crop and recipient it links, for listings.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct EntregaDetalle {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub entrega: Entrega,
    pub cultivo_nombre: Option<String>,
    pub cultivo_variedad: Option<String>,
    pub usuario_nombre: Option<String>,
    pub usuario_documento: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, FromRow)]
pub struct Estadisticas {
    pub total_cultivos: i64,
    pub cultivos_activos: i64,
    pub cultivos_finalizados: i64,
    pub alertas_pendientes: i64,
    pub total_entregas: i64,
    pub total_gramos_entregados: Decimal,
    pub total_usuarios_finales: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CultivosPorEtapa {
    pub etapa: String,
    pub cantidad: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EntregasPorMes {
    pub mes: String,
    pub entregas: i64,
    pub gramos: i64,
}
