use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use axum_extra::extract::cookie::CookieJar;
use serde::Deserialize;
use tracing::info;
use uuid::Uuid;

use crate::{
    modules::admin_shared::db_failure,
    utils::validate::{clean_required, require_title},
    web::{AnnouncementRow, ApiFailure, AppState, admin::require_admin, bad_request, data, not_found},
};

const ANNOUNCEMENT_RETURNING: &str =
    "RETURNING id, title, body, is_published, published_at, created_at, updated_at";

const MAX_BODY_LEN: usize = 20_000;

#[derive(Debug, Deserialize)]
pub struct AnnouncementPayload {
    title: String,
    body: String,
    #[serde(default)]
    is_published: bool,
}

fn validate_announcement(payload: &AnnouncementPayload) -> Result<(String, String), String> {
    let title = require_title(&payload.title, "Title")?;
    let Some(body) = clean_required(&payload.body) else {
        return Err("Body is required.".to_string());
    };
    if body.chars().count() > MAX_BODY_LEN {
        return Err(format!("Body must be at most {MAX_BODY_LEN} characters."));
    }
    Ok((title, body))
}

pub async fn list_all(
    State(state): State<AppState>,
    jar: CookieJar,
) -> Result<Json<Vec<AnnouncementRow>>, ApiFailure> {
    require_admin(&state, &jar).await?;
    let announcements = data::fetch_all_announcements(state.pool_ref())
        .await
        .map_err(db_failure)?;
    Ok(Json(announcements))
}

/// Any announcement, drafts included, for the edit form.
pub async fn get_announcement(
    State(state): State<AppState>,
    jar: CookieJar,
    Path(id): Path<Uuid>,
) -> Result<Json<AnnouncementRow>, ApiFailure> {
    require_admin(&state, &jar).await?;
    let announcement = data::fetch_announcement(state.pool_ref(), id)
        .await
        .map_err(db_failure)?
        .ok_or_else(|| not_found("Announcement not found."))?;
    Ok(Json(announcement))
}

pub async fn create_announcement(
    State(state): State<AppState>,
    jar: CookieJar,
    Json(payload): Json<AnnouncementPayload>,
) -> Result<(StatusCode, Json<AnnouncementRow>), ApiFailure> {
    let admin = require_admin(&state, &jar).await?;
    let (title, body) = validate_announcement(&payload).map_err(bad_request)?;

    let announcement = sqlx::query_as::<_, AnnouncementRow>(&format!(
        "INSERT INTO announcements (id, title, body, is_published, published_at, created_by) \
         VALUES ($1, $2, $3, $4, CASE WHEN $4 THEN NOW() ELSE NULL END, $5) {ANNOUNCEMENT_RETURNING}"
    ))
    .bind(Uuid::new_v4())
    .bind(&title)
    .bind(&body)
    .bind(payload.is_published)
    .bind(admin.id)
    .fetch_one(state.pool_ref())
    .await
    .map_err(db_failure)?;

    info!(
        admin = %admin.username,
        announcement_id = %announcement.id,
        published = announcement.is_published,
        "announcement created"
    );
    Ok((StatusCode::CREATED, Json(announcement)))
}

/// `published_at` is stamped the first time an announcement goes live and kept afterwards.
pub async fn update_announcement(
    State(state): State<AppState>,
    jar: CookieJar,
    Path(id): Path<Uuid>,
    Json(payload): Json<AnnouncementPayload>,
) -> Result<Json<AnnouncementRow>, ApiFailure> {
    require_admin(&state, &jar).await?;
    let (title, body) = validate_announcement(&payload).map_err(bad_request)?;

    let announcement = sqlx::query_as::<_, AnnouncementRow>(&format!(
        "UPDATE announcements SET title = $2, body = $3, is_published = $4, \
         published_at = CASE WHEN $4 AND published_at IS NULL THEN NOW() ELSE published_at END, \
         updated_at = NOW() WHERE id = $1 {ANNOUNCEMENT_RETURNING}"
    ))
    .bind(id)
    .bind(&title)
    .bind(&body)
    .bind(payload.is_published)
    .fetch_optional(state.pool_ref())
    .await
    .map_err(db_failure)?
    .ok_or_else(|| not_found("Announcement not found."))?;

    Ok(Json(announcement))
}

pub async fn delete_announcement(
    State(state): State<AppState>,
    jar: CookieJar,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiFailure> {
    let admin = require_admin(&state, &jar).await?;

    let result = sqlx::query("DELETE FROM announcements WHERE id = $1")
        .bind(id)
        .execute(state.pool_ref())
        .await
        .map_err(db_failure)?;

    if result.rows_affected() == 0 {
        return Err(not_found("Announcement not found."));
    }

    info!(admin = %admin.username, announcement_id = %id, "announcement deleted");
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn announcement_requires_title_and_body() {
        let payload = AnnouncementPayload {
            title: " Term starts ".into(),
            body: " Classes resume on Monday. ".into(),
            is_published: true,
        };
        assert_eq!(
            validate_announcement(&payload).unwrap(),
            (
                "Term starts".to_string(),
                "Classes resume on Monday.".to_string()
            )
        );

        let payload = AnnouncementPayload {
            title: "Term starts".into(),
            body: "   ".into(),
            is_published: false,
        };
        assert_eq!(validate_announcement(&payload).unwrap_err(), "Body is required.");
    }

    #[test]
    fn announcement_body_has_a_cap() {
        let payload = AnnouncementPayload {
            title: "Long".into(),
            body: "x".repeat(MAX_BODY_LEN + 1),
            is_published: false,
        };
        assert!(validate_announcement(&payload).is_err());
    }
}
