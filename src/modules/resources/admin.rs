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
    modules::admin_shared::{ConstraintMessage, db_failure, release_stored_files, write_failure},
    preview::{FileKind, classify},
    utils::validate::{clean_optional, require_title, validate_link},
    web::{
        ApiFailure, AppState, FileFieldConfig, ResourceRow, UploadError,
        admin::require_admin,
        bad_request, not_found, process_upload_form,
        storage::{AREA_RESOURCES, public_url_for},
    },
};

const RESOURCE_RETURNING: &str = "RETURNING id, unit_id, title, resource_type, link, preview_link, download_link, file_url, category, created_at, updated_at";

const RESOURCE_CONSTRAINTS: &[ConstraintMessage] = &[ConstraintMessage::bad_request(
    "resources_unit_id_fkey",
    "Unit does not exist.",
)];

pub(super) const RESOURCE_EXTENSIONS: &[&str] = &[
    "pdf", "doc", "docx", "xls", "xlsx", "ppt", "pptx", "txt", "csv", "png", "jpg", "jpeg", "gif",
    "webp", "svg", "mp3", "wav", "m4a", "ogg", "mp4", "webm", "m4v",
];

const MAX_TYPE_LEN: usize = 50;

#[derive(Debug, Default, Deserialize)]
pub struct ResourcePayload {
    pub unit_id: Uuid,
    pub title: String,
    #[serde(default)]
    pub resource_type: String,
    #[serde(default)]
    pub link: Option<String>,
    #[serde(default)]
    pub preview_link: Option<String>,
    #[serde(default)]
    pub download_link: Option<String>,
    #[serde(default)]
    pub file_url: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
}

/// A validated resource ready to be written.
#[derive(Debug, Clone, PartialEq)]
pub(super) struct ResourceInput {
    pub unit_id: Uuid,
    pub title: String,
    pub resource_type: String,
    pub link: Option<String>,
    pub preview_link: Option<String>,
    pub download_link: Option<String>,
    pub file_url: Option<String>,
    pub category: Option<String>,
}

impl ResourceInput {
    fn first_link(&self) -> Option<&str> {
        [
            &self.preview_link,
            &self.file_url,
            &self.link,
            &self.download_link,
        ]
        .into_iter()
        .flatten()
        .map(String::as_str)
        .next()
    }
}

fn checked_link(value: Option<&str>, field: &str) -> Result<Option<String>, String> {
    let Some(link) = clean_optional(value) else {
        return Ok(None);
    };
    validate_link(&link).map_err(|message| format!("{field}: {message}"))?;
    Ok(Some(link))
}

/// Explicit type, lowercased, or the kind the classifier sees in `link`.
pub(super) fn resource_type_for(explicit: Option<&str>, link: &str) -> Result<String, String> {
    if let Some(explicit) = clean_optional(explicit) {
        if explicit.chars().count() > MAX_TYPE_LEN {
            return Err(format!(
                "Resource type must be at most {MAX_TYPE_LEN} characters."
            ));
        }
        return Ok(explicit.to_lowercase());
    }

    Ok(match classify(link, None).kind {
        FileKind::Unknown => "link".to_string(),
        kind => kind.as_str().to_string(),
    })
}

pub(super) fn validate_resource(payload: ResourcePayload) -> Result<ResourceInput, String> {
    let title = require_title(&payload.title, "Title")?;

    let mut input = ResourceInput {
        unit_id: payload.unit_id,
        title,
        resource_type: String::new(),
        link: checked_link(payload.link.as_deref(), "link")?,
        preview_link: checked_link(payload.preview_link.as_deref(), "preview_link")?,
        download_link: checked_link(payload.download_link.as_deref(), "download_link")?,
        file_url: checked_link(payload.file_url.as_deref(), "file_url")?,
        category: clean_optional(payload.category.as_deref()),
    };

    let Some(first_link) = input.first_link() else {
        return Err(
            "At least one of link, preview_link, download_link or file_url is required."
                .to_string(),
        );
    };
    input.resource_type = resource_type_for(Some(payload.resource_type.as_str()), first_link)?;

    Ok(input)
}

pub(super) async fn insert_resource<'e, E>(
    executor: E,
    input: &ResourceInput,
    created_by: Option<Uuid>,
) -> sqlx::Result<ResourceRow>
where
    E: sqlx::PgExecutor<'e>,
{
    sqlx::query_as::<_, ResourceRow>(&format!(
        "INSERT INTO resources (id, unit_id, title, resource_type, link, preview_link, download_link, file_url, category, created_by) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10) {RESOURCE_RETURNING}"
    ))
    .bind(Uuid::new_v4())
    .bind(input.unit_id)
    .bind(&input.title)
    .bind(&input.resource_type)
    .bind(&input.link)
    .bind(&input.preview_link)
    .bind(&input.download_link)
    .bind(&input.file_url)
    .bind(&input.category)
    .bind(created_by)
    .fetch_one(executor)
    .await
}

pub async fn create_resource(
    State(state): State<AppState>,
    jar: CookieJar,
    Json(payload): Json<ResourcePayload>,
) -> Result<(StatusCode, Json<ResourceRow>), ApiFailure> {
    let admin = require_admin(&state, &jar).await?;
    let input = validate_resource(payload).map_err(bad_request)?;

    let resource = insert_resource(state.pool_ref(), &input, Some(admin.id))
        .await
        .map_err(|err| write_failure(err, RESOURCE_CONSTRAINTS))?;

    info!(admin = %admin.username, resource_id = %resource.id, "resource created");
    Ok((StatusCode::CREATED, Json(resource)))
}

/// Multipart variant of create: a `file` part plus the same fields as text parts.
pub async fn upload_resource(
    State(state): State<AppState>,
    jar: CookieJar,
    multipart: Multipart,
) -> Result<(StatusCode, Json<ResourceRow>), ApiFailure> {
    let admin = require_admin(&state, &jar).await?;

    let dest_dir = state.storage_root().join(AREA_RESOURCES);
    let outcome = process_upload_form(
        multipart,
        &dest_dir,
        &[FileFieldConfig::new("file", RESOURCE_EXTENSIONS).required()],
        state.config().max_upload_bytes,
    )
    .await
    .map_err(UploadError::into_failure)?;

    let Some(saved) = outcome.file_for("file") else {
        return Err(bad_request("A file is required."));
    };

    let Some(unit_id) = outcome
        .text("unit_id")
        .and_then(|value| Uuid::parse_str(value.trim()).ok())
    else {
        outcome.discard().await;
        return Err(bad_request("A valid unit_id is required."));
    };

    let fallback_title = FsPath::new(&saved.original_name)
        .file_stem()
        .and_then(|stem| stem.to_str())
        .unwrap_or("Untitled resource")
        .to_string();
    let title = outcome
        .text("title")
        .filter(|value| !value.trim().is_empty())
        .map(str::to_string)
        .unwrap_or(fallback_title);

    let payload = ResourcePayload {
        unit_id,
        title,
        resource_type: outcome.text("resource_type").unwrap_or_default().to_string(),
        link: outcome.text("link").map(str::to_string),
        preview_link: outcome.text("preview_link").map(str::to_string),
        download_link: outcome.text("download_link").map(str::to_string),
        file_url: Some(public_url_for(AREA_RESOURCES, &saved.stored_name)),
        category: outcome.text("category").map(str::to_string),
    };

    let input = match validate_resource(payload) {
        Ok(input) => input,
        Err(message) => {
            outcome.discard().await;
            return Err(bad_request(message));
        }
    };

    match insert_resource(state.pool_ref(), &input, Some(admin.id)).await {
        Ok(resource) => {
            info!(
                admin = %admin.username,
                resource_id = %resource.id,
                file = %saved.stored_name,
                bytes = saved.file_size,
                "resource uploaded"
            );
            Ok((StatusCode::CREATED, Json(resource)))
        }
        Err(err) => {
            outcome.discard().await;
            Err(write_failure(err, RESOURCE_CONSTRAINTS))
        }
    }
}

pub async fn update_resource(
    State(state): State<AppState>,
    jar: CookieJar,
    Path(id): Path<Uuid>,
    Json(payload): Json<ResourcePayload>,
) -> Result<Json<ResourceRow>, ApiFailure> {
    require_admin(&state, &jar).await?;
    let input = validate_resource(payload).map_err(bad_request)?;

    let previous_file: Option<Option<String>> =
        sqlx::query_scalar("SELECT file_url FROM resources WHERE id = $1")
            .bind(id)
            .fetch_optional(state.pool_ref())
            .await
            .map_err(db_failure)?;
    let Some(previous_file) = previous_file else {
        return Err(not_found("Resource not found."));
    };

    let resource = sqlx::query_as::<_, ResourceRow>(&format!(
        "UPDATE resources SET unit_id = $2, title = $3, resource_type = $4, link = $5, preview_link = $6, \
         download_link = $7, file_url = $8, category = $9, updated_at = NOW() WHERE id = $1 {RESOURCE_RETURNING}"
    ))
    .bind(id)
    .bind(input.unit_id)
    .bind(&input.title)
    .bind(&input.resource_type)
    .bind(&input.link)
    .bind(&input.preview_link)
    .bind(&input.download_link)
    .bind(&input.file_url)
    .bind(&input.category)
    .fetch_optional(state.pool_ref())
    .await
    .map_err(|err| write_failure(err, RESOURCE_CONSTRAINTS))?
    .ok_or_else(|| not_found("Resource not found."))?;

    if previous_file != resource.file_url {
        release_stored_files(
            state.pool_ref(),
            state.storage_root(),
            AREA_RESOURCES,
            previous_file.as_slice(),
        )
        .await;
    }

    Ok(Json(resource))
}

pub async fn delete_resource(
    State(state): State<AppState>,
    jar: CookieJar,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiFailure> {
    let admin = require_admin(&state, &jar).await?;

    let deleted: Option<Option<String>> =
        sqlx::query_scalar("DELETE FROM resources WHERE id = $1 RETURNING file_url")
            .bind(id)
            .fetch_optional(state.pool_ref())
            .await
            .map_err(db_failure)?;

    let Some(file_url) = deleted else {
        return Err(not_found("Resource not found."));
    };
    release_stored_files(
        state.pool_ref(),
        state.storage_root(),
        AREA_RESOURCES,
        file_url.as_slice(),
    )
    .await;

    info!(admin = %admin.username, resource_id = %id, "resource deleted");
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payload() -> ResourcePayload {
        ResourcePayload {
            unit_id: Uuid::nil(),
            title: " Fractions ".into(),
            ..Default::default()
        }
    }

    #[test]
    fn a_link_is_required() {
        let err = validate_resource(payload()).unwrap_err();
        assert!(err.starts_with("At least one of link"), "{err}");

        let mut blank = payload();
        blank.link = Some("   ".into());
        assert!(validate_resource(blank).is_err());
    }

    #[test]
    fn links_are_validated_per_field() {
        let mut bad = payload();
        bad.preview_link = Some("javascript:alert(1)".into());
        let err = validate_resource(bad).unwrap_err();
        assert!(err.starts_with("preview_link:"), "{err}");
    }

    #[test]
    fn type_is_derived_from_the_link() {
        let mut video = payload();
        video.link = Some("https://youtu.be/dQw4w9WgXcQ".into());
        let input = validate_resource(video).unwrap();
        assert_eq!(input.title, "Fractions");
        assert_eq!(input.resource_type, "video");

        let mut stored = payload();
        stored.file_url = Some("/files/resources/abc_sheet.PDF".into());
        assert_eq!(validate_resource(stored).unwrap().resource_type, "pdf");

        let mut page = payload();
        page.link = Some("https://example.com/lesson".into());
        assert_eq!(validate_resource(page).unwrap().resource_type, "link");
    }

    #[test]
    fn explicit_type_wins_and_is_lowercased() {
        let mut input = payload();
        input.link = Some("https://example.com/a.pdf".into());
        input.resource_type = " Worksheet ".into();
        assert_eq!(validate_resource(input).unwrap().resource_type, "worksheet");

        assert!(resource_type_for(Some("x".repeat(MAX_TYPE_LEN + 1).as_str()), "https://a.b").is_err());
    }
}
