use crate::error::{FecanboError, FecanboResult};
use crate::middleware::auth::{Claims, Tenant};
use crate::state::AppState;
use axum::{
    extract::{Multipart, Path, State},
    http::header,
    response::IntoResponse,
    Extension, Json,
};
use serde::Serialize;
use std::path::Path as FsPath;
use uuid::Uuid;

pub const MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;
const ALLOWED_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "webp"];

#[derive(Serialize, Debug)]
pub struct MediaUpload {
    pub file_name: String,
    pub url: String,
}

fn allowed_extension(file_name: &str) -> Option<String> {
    FsPath::new(file_name)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase())
        .filter(|e| ALLOWED_EXTENSIONS.contains(&e.as_str()))
}

/// Stored names are generated by the upload; anything with a path component
/// or an unexpected extension is refused.
pub fn is_safe_media_name(name: &str) -> bool {
    !name.is_empty()
        && !name.starts_with('.')
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-' || c == '.')
        && !name.contains("..")
        && allowed_extension(name).is_some()
}

pub fn content_type_for(name: &str) -> &'static str {
    match allowed_extension(name).as_deref() {
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("webp") => "image/webp",
        _ => "image/png",
    }
}

fn owner_prefix(cultivador_id: Uuid) -> String {
    format!("obs_{}_", cultivador_id.simple())
}

/// Stored names carry the uploading grower: `obs_<grower>_<ts>_<uuid8>.<ext>`.
fn generated_name(cultivador_id: Uuid, extension: &str) -> String {
    format!(
        "{}{}_{}.{}",
        owner_prefix(cultivador_id),
        chrono::Utc::now().timestamp(),
        Uuid::new_v4().to_string().split_at(8).0,
        extension
    )
}

/// Growers only reach their own uploads; administrators reach every file.
pub fn media_belongs_to(name: &str, tenant: Tenant) -> bool {
    tenant.es_admin || name.starts_with(&owner_prefix(tenant.cultivador_id))
}

pub async fn store_media(
    media_dir: &FsPath,
    cultivador_id: Uuid,
    original_name: &str,
    bytes: &[u8],
) -> FecanboResult<String> {
    let extension = allowed_extension(original_name).ok_or_else(|| {
        FecanboError::Validation("Solo se permiten imágenes JPG, PNG o WEBP.".to_string())
    })?;
    if bytes.is_empty() {
        return Err(FecanboError::Validation("El archivo está vacío.".to_string()));
    }

    tokio::fs::create_dir_all(media_dir).await?;
    let file_name = generated_name(cultivador_id, &extension);
    tokio::fs::write(media_dir.join(&file_name), bytes).await?;
    tracing::info!("Stored photo {} ({} bytes)", file_name, bytes.len());
    Ok(file_name)
}

pub async fn read_media(media_dir: &FsPath, tenant: Tenant, file_name: &str) -> FecanboResult<Vec<u8>> {
    if !is_safe_media_name(file_name) {
        return Err(FecanboError::Validation("Nombre de archivo inválido".to_string()));
    }
    if !media_belongs_to(file_name, tenant) {
        return Err(FecanboError::NotFound(format!(
            "Archivo no encontrado: {}",
            file_name
        )));
    }
    let path = media_dir.join(file_name);
    if !tokio::fs::try_exists(&path).await.unwrap_or(false) {
        return Err(FecanboError::NotFound(format!(
            "Archivo no encontrado: {}",
            file_name
        )));
    }
    Ok(tokio::fs::read(&path).await?)
}

pub async fn upload_media_axum(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    mut multipart: Multipart,
) -> FecanboResult<Json<MediaUpload>> {
    let tenant = claims.tenant()?;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| FecanboError::Validation(format!("Formulario inválido: {}", e)))?
    {
        let Some(original_name) = field.file_name().map(str::to_string) else {
            continue;
        };
        let bytes = field
            .bytes()
            .await
            .map_err(|e| FecanboError::Validation(format!("No se pudo leer el archivo: {}", e)))?;
        let file_name =
            store_media(&state.config.media_dir, tenant.cultivador_id, &original_name, &bytes).await?;
        let url = format!("/api/media/{}", file_name);
        return Ok(Json(MediaUpload { file_name, url }));
    }
    Err(FecanboError::Validation(
        "No se recibió ningún archivo.".to_string(),
    ))
}

pub async fn serve_media_axum(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(file_name): Path<String>,
) -> FecanboResult<impl IntoResponse> {
    let bytes = read_media(&state.config.media_dir, claims.tenant()?, &file_name).await?;
    Ok((
        [
            (header::CONTENT_TYPE, content_type_for(&file_name)),
            (header::CACHE_CONTROL, "private, max-age=86400"),
        ],
        bytes,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_media_name_checks() {
        assert!(is_safe_media_name("obs_1735689600_1a2b3c4d.jpg"));
        assert!(is_safe_media_name("obs_1735689600_1a2b3c4d.WEBP"));
        assert!(!is_safe_media_name("../secret.png"));
        assert!(!is_safe_media_name("dir/obs.png"));
        assert!(!is_safe_media_name("obs.gif"));
        assert!(!is_safe_media_name(".png"));
        assert!(!is_safe_media_name(""));
    }

    #[test]
    fn test_content_types() {
        assert_eq!(content_type_for("a.JPG"), "image/jpeg");
        assert_eq!(content_type_for("a.jpeg"), "image/jpeg");
        assert_eq!(content_type_for("a.webp"), "image/webp");
        assert_eq!(content_type_for("a.png"), "image/png");
    }

    fn grower() -> Tenant {
        Tenant {
            cultivador_id: Uuid::new_v4(),
            es_admin: false,
        }
    }

    #[tokio::test]
    async fn test_store_and_read_back() {
        let dir = std::env::temp_dir().join(format!("fecanbo-media-{}", Uuid::new_v4()));
        let owner = grower();
        let name = store_media(&dir, owner.cultivador_id, "planta.JPG", b"\xFF\xD8\xFFdata")
            .await
            .unwrap();
        assert!(name.starts_with(&format!("obs_{}_", owner.cultivador_id.simple())));
        assert!(name.ends_with(".jpg"));
        assert!(is_safe_media_name(&name));
        assert_eq!(read_media(&dir, owner, &name).await.unwrap(), b"\xFF\xD8\xFFdata");

        assert!(matches!(
            store_media(&dir, owner.cultivador_id, "notas.pdf", b"%PDF").await,
            Err(FecanboError::Validation(_))
        ));
        let missing = format!("obs_{}_0_00000000.png", owner.cultivador_id.simple());
        assert!(matches!(
            read_media(&dir, owner, &missing).await,
            Err(FecanboError::NotFound(_))
        ));
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn test_photos_are_private_to_their_grower() {
        let dir = std::env::temp_dir().join(format!("fecanbo-media-{}", Uuid::new_v4()));
        let owner = grower();
        let name = store_media(&dir, owner.cultivador_id, "hoja.png", b"\x89PNG").await.unwrap();

        let other = grower();
        assert!(!media_belongs_to(&name, other));
        assert!(matches!(
            read_media(&dir, other, &name).await,
            Err(FecanboError::NotFound(_))
        ));

        let admin = Tenant { es_admin: true, ..other };
        assert!(media_belongs_to(&name, admin));
        assert_eq!(read_media(&dir, admin, &name).await.unwrap(), b"\x89PNG");
        let _ = std::fs::remove_dir_all(&dir);
    }
}
