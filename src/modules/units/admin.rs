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
    modules::admin_shared::{ConstraintMessage, db_failure, release_stored_files, write_failure},
    utils::validate::require_title,
    web::{
        ApiFailure, AppState, UnitRow, admin::require_admin, bad_request, not_found,
        storage::AREA_RESOURCES,
    },
};

const UNIT_CONSTRAINTS: &[ConstraintMessage] = &[
    ConstraintMessage::bad_request("units_grade_id_fkey", "Grade does not exist."),
    ConstraintMessage::conflict(
        "idx_units_grade_title",
        "This grade already has a unit with that title.",
    ),
];

#[derive(Deserialize)]
pub struct UnitPayload {
    grade_id: Uuid,
    title: String,
    #[serde(default)]
    position: Option<i32>,
}

pub async fn create_unit(
    State(state): State<AppState>,
    jar: CookieJar,
    Json(payload): Json<UnitPayload>,
) -> Result<(StatusCode, Json<UnitRow>), ApiFailure> {
    let admin = require_admin(&state, &jar).await?;
    let title = require_title(&payload.title, "Title").map_err(bad_request)?;
    if payload.position.is_some_and(|position| position < 0) {
        return Err(bad_request("Position must not be negative."));
    }

    let unit = sqlx::query_as::<_, UnitRow>(
        "INSERT INTO units (id, grade_id, title, position) \
         VALUES ($1, $2, $3, COALESCE($4, (SELECT COALESCE(MAX(position) + 1, 0) FROM units WHERE grade_id = $2))) \
         RETURNING id, grade_id, title, position, created_at, updated_at",
    )
    .bind(Uuid::new_v4())
    .bind(payload.grade_id)
    .bind(&title)
    .bind(payload.position)
    .fetch_one(state.pool_ref())
    .await
    .map_err(|err| write_failure(err, UNIT_CONSTRAINTS))?;

    info!(admin = %admin.username, unit_id = %unit.id, grade_id = %unit.grade_id, "unit created");
    Ok((StatusCode::CREATED, Json(unit)))
}

pub async fn update_unit(
    State(state): State<AppState>,
    jar: CookieJar,
    Path(id): Path<Uuid>,
    Json(payload): Json<UnitPayload>,
) -> Result<Json<UnitRow>, ApiFailure> {
    require_admin(&state, &jar).await?;
    let title = require_title(&payload.title, "Title").map_err(bad_request)?;
    if payload.position.is_some_and(|position| position < 0) {
        return Err(bad_request("Position must not be negative."));
    }

    let unit = sqlx::query_as::<_, UnitRow>(
        "UPDATE units SET grade_id = $2, title = $3, position = COALESCE($4, position), updated_at = NOW() \
         WHERE id = $1 RETURNING id, grade_id, title, position, created_at, updated_at",
    )
    .bind(id)
    .bind(payload.grade_id)
    .bind(&title)
    .bind(payload.position)
    .fetch_optional(state.pool_ref())
    .await
    .map_err(|err| write_failure(err, UNIT_CONSTRAINTS))?
    .ok_or_else(|| not_found("Unit not found."))?;

    Ok(Json(unit))
}

pub async fn delete_unit(
    State(state): State<AppState>,
    jar: CookieJar,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiFailure> {
    let admin = require_admin(&state, &jar).await?;

    let mut transaction = state.pool_ref().begin().await.map_err(db_failure)?;

    let stored_files: Vec<String> = sqlx::query_scalar(
        "SELECT file_url FROM resources WHERE unit_id = $1 AND file_url IS NOT NULL",
    )
    .bind(id)
    .fetch_all(&mut *transaction)
    .await
    .map_err(db_failure)?;

    let result = sqlx::query("DELETE FROM units WHERE id = $1")
        .bind(id)
        .execute(&mut *transaction)
        .await
        .map_err(db_failure)?;

    if result.rows_affected() == 0 {
        return Err(not_found("Unit not found."));
    }

    transaction.commit().await.map_err(db_failure)?;
    release_stored_files(
        state.pool_ref(),
        state.storage_root(),
        AREA_RESOURCES,
        &stored_files,
    )
    .await;

    info!(admin = %admin.username, unit_id = %id, "unit deleted");
    Ok(StatusCode::NO_CONTENT)
}
