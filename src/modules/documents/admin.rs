use std::path::Path as FsPath;

use axum::{
    Json,
    extract::{Multipart, Path, State},
    http::StatusCode,
};
use axum_extra::extract::cookie::CookieJar;
use serde::Deserialize;
use tracing::info;
use uuid::Uuid;

use crate::{
    modules::admin_shared::{db_failure, release_stored_files},
    preview::kind_from_extension,
    utils::validate::{clean_optional, require_title},
    web::{
        ApiFailure, AppState, DocumentRow, FileFieldConfig, SavedFile, UploadError,
        admin::require_admin,
        bad_request, not_found, process_upload_form,
        storage::{AREA_DOCUMENTS, content_type_for, public_url_for},
    },
};

const DOCUMENT_RETURNING: &str = "RETURNING id, title, description, category, file_url, original_name, file_size, content_type, created_at, updated_at";

const DOCUMENT_EXTENSIONS: &[&str] = &[
    "pdf", "doc", "docx", "xls", "xlsx", "ppt", "pptx", "txt", "png", "jpg", "jpeg", "gif", "webp",
];

#[derive(Deserialize)]
pub struct DocumentMetadata {
    title: String,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    category: Option<String>,
}

/// Title from the form, else the original file name without its extension.
fn document_title(explicit: Option<&str>, saved: &SavedFile) -> Result<String, String> {
    if let Some(title) = clean_optional(explicit) {
        return require_title(&title, "Title");
    }
    let stem = FsPath::new(&saved.original_name)
        .file_stem()
        .and_then(|stem| stem.to_str())
        .unwrap_or_default();
    require_title(stem, "Title")
}

/// The stored content type; browsers send octet-stream for many office files, so the extension
/// decides whenever it names a known kind.
fn document_content_type(saved: &SavedFile) -> String {
    if kind_from_extension(&saved.original_name).is_some() {
        return content_type_for(FsPath::new(&saved.original_name)).to_string();
    }
    saved
        .content_type
        .clone()
        .unwrap_or_else(|| mime::APPLICATION_OCTET_STREAM.to_string())
}

/// `POST /api/admin/documents`: multipart with `file`, `title`, `description` and `category`.
pub async fn upload_document(
    State(state): State<AppState>,
    jar: CookieJar,
    multipart: Multipart,
) -> Result<(StatusCode, Json<DocumentRow>), ApiFailure> {
    let admin = require_admin(&state, &jar).await?;

    let dest_dir = state.storage_root().join(AREA_DOCUMENTS);
    let outcome = process_upload_form(
        multipart,
        &dest_dir,
        &[FileFieldConfig::new("file", DOCUMENT_EXTENSIONS).required()],
        state.config().max_upload_bytes,
    )
    .await
    .map_err(UploadError::into_failure)?;

    let Some(saved) = outcome.file_for("file") else {
        return Err(bad_request("A file is required."));
    };

    let title = match document_title(outcome.text("title"), saved) {
        Ok(title) => title,
        Err(message) => {
            outcome.discard().await;
            return Err(bad_request(message));
        }
    };

    let result = sqlx::query_as::<_, DocumentRow>(&format!(
        "INSERT INTO documents (id, title, description, category, file_url, original_name, file_size, content_type, created_by) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9) {DOCUMENT_RETURNING}"
    ))
    .bind(Uuid::new_v4())
    .bind(&title)
    .bind(clean_optional(outcome.text("description")))
    .bind(clean_optional(outcome.text("category")))
    .bind(public_url_for(AREA_DOCUMENTS, &saved.stored_name))
    .bind(&saved.original_name)
    .bind(i64::try_from(saved.file_size).unwrap_or(i64::MAX))
    .bind(document_content_type(saved))
    .bind(admin.id)
    .fetch_one(state.pool_ref())
    .await;

    match result {
        Ok(document) => {
            info!(
                admin = %admin.username,
                document_id = %document.id,
                bytes = saved.file_size,
                "document uploaded"
            );
            Ok((StatusCode::CREATED, Json(document)))
        }
        Err(err) => {
            outcome.discard().await;
            Err(db_failure(err))
        }
    }
}

pub async fn update_document(
    State(state): State<AppState>,
    jar: CookieJar,
    Path(id): Path<Uuid>,
    Json(body): Json<DocumentMetadata>,
) -> Result<Json<DocumentRow>, ApiFailure> {
    require_admin(&state, &jar).await?;
    let title = require_title(&body.title, "Title").map_err(bad_request)?;

    let document = sqlx::query_as::<_, DocumentRow>(&format!(
        "UPDATE documents SET title = $2, description = $3, category = $4, updated_at = NOW() \
         WHERE id = $1 {DOCUMENT_RETURNING}"
    ))
    .bind(id)
    .bind(&title)
    .bind(clean_optional(body.description.as_deref()))
    .bind(clean_optional(body.category.as_deref()))
    .fetch_optional(state.pool_ref())
    .await
    .map_err(db_failure)?
    .ok_or_else(|| not_found("Document not found."))?;

    Ok(Json(document))
}

pub async fn delete_document(
    State(state): State<AppState>,
    jar: CookieJar,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiFailure> {
    let admin = require_admin(&state, &jar).await?;

    let file_url: Option<String> =
        sqlx::query_scalar("DELETE FROM documents WHERE id = $1 RETURNING file_url")
            .bind(id)
            .fetch_optional(state.pool_ref())
            .await
            .map_err(db_failure)?;

    let Some(file_url) = file_url else {
        return Err(not_found("Document not found."));
    };
    release_stored_files(
        state.pool_ref(),
        state.storage_root(),
        AREA_DOCUMENTS,
        std::slice::from_ref(&file_url),
    )
    .await;

    info!(admin = %admin.username, document_id = %id, "document deleted");
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn saved(original_name: &str, content_type: Option<&str>) -> SavedFile {
        SavedFile {
            field_name: "file".into(),
            original_name: original_name.into(),
            stored_name: format!("abc_{original_name}"),
            stored_path: PathBuf::from("storage/documents").join(original_name),
            file_size: 12,
            content_type: content_type.map(str::to_string),
        }
    }

    #[test]
    fn title_falls_back_to_file_stem() {
        let file = saved("Term plan 2025.docx", None);
        assert_eq!(document_title(None, &file).unwrap(), "Term plan 2025");
        assert_eq!(document_title(Some("  "), &file).unwrap(), "Term plan 2025");
        assert_eq!(document_title(Some(" Plan "), &file).unwrap(), "Plan");
    }

    #[test]
    fn content_type_prefers_extension() {
        let file = saved("slides.pptx", Some("application/octet-stream"));
        assert_eq!(
            document_content_type(&file),
            "application/vnd.openxmlformats-officedocument.presentationml.presentation"
        );

        let file = saved("notes", Some("text/plain"));
        assert_eq!(document_content_type(&file), "text/plain");

        let file = saved("notes", None);
        assert_eq!(document_content_type(&file), "application/octet-stream");
    }
}
