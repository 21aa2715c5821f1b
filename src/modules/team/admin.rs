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
    utils::validate::{clean_optional, require_title, validate_email, validate_link},
    web::{
        ApiFailure, AppState, FileFieldConfig, TeamMemberRow, UploadError,
        admin::require_admin,
        bad_request, data, not_found, process_upload_form,
        storage::{AREA_TEAM, public_url_for},
    },
};

const MEMBER_RETURNING: &str =
    "RETURNING id, name, role, bio, email, photo_url, position, created_at, updated_at";

const PHOTO_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "gif", "webp"];

#[derive(Debug, Default, Deserialize)]
pub struct MemberPayload {
    name: String,
    role: String,
    #[serde(default)]
    bio: Option<String>,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    photo_url: Option<String>,
    #[serde(default)]
    position: Option<i32>,
}

#[derive(Debug, PartialEq)]
struct MemberInput {
    name: String,
    role: String,
    bio: Option<String>,
    email: Option<String>,
    photo_url: Option<String>,
    /// False when the request left `photo_url` out, so an update keeps the current photo.
    replaces_photo: bool,
    position: Option<i32>,
}

fn validate_member(payload: MemberPayload) -> Result<MemberInput, String> {
    let name = require_title(&payload.name, "Name")?;
    let role = require_title(&payload.role, "Role")?;

    let email = clean_optional(payload.email.as_deref());
    if let Some(email) = &email {
        validate_email(email)?;
    }
    let replaces_photo = payload.photo_url.is_some();
    let photo_url = clean_optional(payload.photo_url.as_deref());
    if let Some(photo_url) = &photo_url {
        validate_link(photo_url)?;
    }
    if payload.position.is_some_and(|position| position < 0) {
        return Err("Position must not be negative.".to_string());
    }

    Ok(MemberInput {
        name,
        role,
        bio: clean_optional(payload.bio.as_deref()),
        email,
        photo_url,
        replaces_photo,
        position: payload.position,
    })
}

pub async fn create_member(
    State(state): State<AppState>,
    jar: CookieJar,
    Json(payload): Json<MemberPayload>,
) -> Result<(StatusCode, Json<TeamMemberRow>), ApiFailure> {
    let admin = require_admin(&state, &jar).await?;
    let input = validate_member(payload).map_err(bad_request)?;

    let member = sqlx::query_as::<_, TeamMemberRow>(&format!(
        "INSERT INTO team_members (id, name, role, bio, email, photo_url, position) \
         VALUES ($1, $2, $3, $4, $5, $6, COALESCE($7, (SELECT COALESCE(MAX(position) + 1, 0) FROM team_members))) \
         {MEMBER_RETURNING}"
    ))
    .bind(Uuid::new_v4())
    .bind(&input.name)
    .bind(&input.role)
    .bind(&input.bio)
    .bind(&input.email)
    .bind(&input.photo_url)
    .bind(input.position)
    .fetch_one(state.pool_ref())
    .await
    .map_err(db_failure)?;

    info!(admin = %admin.username, member_id = %member.id, "team member created");
    Ok((StatusCode::CREATED, Json(member)))
}

/// Replaces the member's fields. A missing `photo_url` keeps the current photo; a blank one clears it.
pub async fn update_member(
    State(state): State<AppState>,
    jar: CookieJar,
    Path(id): Path<Uuid>,
    Json(payload): Json<MemberPayload>,
) -> Result<Json<TeamMemberRow>, ApiFailure> {
    require_admin(&state, &jar).await?;
    let input = validate_member(payload).map_err(bad_request)?;

    let previous = data::fetch_team_member(state.pool_ref(), id)
        .await
        .map_err(db_failure)?
        .ok_or_else(|| not_found("Team member not found."))?;

    let member = sqlx::query_as::<_, TeamMemberRow>(&format!(
        "UPDATE team_members SET name = $2, role = $3, bio = $4, email = $5, \
         photo_url = CASE WHEN $8 THEN $6 ELSE photo_url END, \
         position = COALESCE($7, position), updated_at = NOW() WHERE id = $1 {MEMBER_RETURNING}"
    ))
    .bind(id)
    .bind(&input.name)
    .bind(&input.role)
    .bind(&input.bio)
    .bind(&input.email)
    .bind(&input.photo_url)
    .bind(input.position)
    .bind(input.replaces_photo)
    .fetch_optional(state.pool_ref())
    .await
    .map_err(db_failure)?
    .ok_or_else(|| not_found("Team member not found."))?;

    if previous.photo_url != member.photo_url {
        release_stored_files(
            state.pool_ref(),
            state.storage_root(),
            AREA_TEAM,
            previous.photo_url.as_slice(),
        )
        .await;
    }

    Ok(Json(member))
}

pub async fn delete_member(
    State(state): State<AppState>,
    jar: CookieJar,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiFailure> {
    let admin = require_admin(&state, &jar).await?;

    let deleted: Option<Option<String>> =
        sqlx::query_scalar("DELETE FROM team_members WHERE id = $1 RETURNING photo_url")
            .bind(id)
            .fetch_optional(state.pool_ref())
            .await
            .map_err(db_failure)?;

    let Some(photo_url) = deleted else {
        return Err(not_found("Team member not found."));
    };
    release_stored_files(
        state.pool_ref(),
        state.storage_root(),
        AREA_TEAM,
        photo_url.as_slice(),
    )
    .await;

    info!(admin = %admin.username, member_id = %id, "team member deleted");
    Ok(StatusCode::NO_CONTENT)
}

/// `POST /api/admin/team-members/:id/photo`: replace the member's photo with an uploaded image.
pub async fn upload_photo(
    State(state): State<AppState>,
    jar: CookieJar,
    Path(id): Path<Uuid>,
    multipart: Multipart,
) -> Result<Json<TeamMemberRow>, ApiFailure> {
    let admin = require_admin(&state, &jar).await?;

    let previous = data::fetch_team_member(state.pool_ref(), id)
        .await
        .map_err(db_failure)?
        .ok_or_else(|| not_found("Team member not found."))?;

    let dest_dir = state.storage_root().join(AREA_TEAM);
    let outcome = process_upload_form(
        multipart,
        &dest_dir,
        &[FileFieldConfig::new("photo", PHOTO_EXTENSIONS).required()],
        state.config().max_upload_bytes,
    )
    .await
    .map_err(UploadError::into_failure)?;

    let Some(saved) = outcome.file_for("photo") else {
        return Err(bad_request("A photo is required."));
    };
    let photo_url = public_url_for(AREA_TEAM, &saved.stored_name);

    let result = sqlx::query_as::<_, TeamMemberRow>(&format!(
        "UPDATE team_members SET photo_url = $2, updated_at = NOW() WHERE id = $1 {MEMBER_RETURNING}"
    ))
    .bind(id)
    .bind(&photo_url)
    .fetch_optional(state.pool_ref())
    .await;

    let member = match result {
        Ok(Some(member)) => member,
        Ok(None) => {
            outcome.discard().await;
            return Err(not_found("Team member not found."));
        }
        Err(err) => {
            outcome.discard().await;
            return Err(db_failure(err));
        }
    };

    release_stored_files(
        state.pool_ref(),
        state.storage_root(),
        AREA_TEAM,
        previous.photo_url.as_slice(),
    )
    .await;

    info!(admin = %admin.username, member_id = %id, "team member photo updated");
    Ok(Json(member))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payload() -> MemberPayload {
        MemberPayload {
            name: " Ada Lovelace ".into(),
            role: "Mathematics lead".into(),
            ..Default::default()
        }
    }

    #[test]
    fn member_fields_are_cleaned() {
        let mut body = payload();
        body.bio = Some("  ".into());
        body.email = Some(" ada@school.edu ".into());
        let input = validate_member(body).unwrap();
        assert_eq!(input.name, "Ada Lovelace");
        assert_eq!(input.bio, None);
        assert_eq!(input.email.as_deref(), Some("ada@school.edu"));
    }

    #[test]
    fn member_rejects_bad_email_and_photo() {
        let mut body = payload();
        body.email = Some("not-an-email".into());
        assert_eq!(validate_member(body).unwrap_err(), "Email format is invalid.");

        let mut body = payload();
        body.photo_url = Some("data:image/png;base64,AAAA".into());
        assert!(validate_member(body).is_err());

        let mut body = payload();
        body.role = String::new();
        assert_eq!(validate_member(body).unwrap_err(), "Role is required.");
    }

    #[test]
    fn omitted_photo_keeps_the_current_one() {
        let input = validate_member(payload()).unwrap();
        assert!(!input.replaces_photo);

        let mut body = payload();
        body.photo_url = Some("  ".into());
        let input = validate_member(body).unwrap();
        assert!(input.replaces_photo);
        assert_eq!(input.photo_url, None);

        let mut body = payload();
        body.photo_url = Some("/files/team/abc_ada.jpg".into());
        let input = validate_member(body).unwrap();
        assert!(input.replaces_photo);
        assert_eq!(input.photo_url.as_deref(), Some("/files/team/abc_ada.jpg"));
    }
}
