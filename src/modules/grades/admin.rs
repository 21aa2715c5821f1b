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
        ApiFailure, AppState, GradeRow, admin::require_admin, bad_request, not_found,
        storage::AREA_RESOURCES,
    },
};

const GRADE_CONSTRAINTS: &[ConstraintMessage] = &[ConstraintMessage::conflict(
    "idx_grades_title_category",
    "A grade with this title already exists in that category.",
)];

#[derive(Deserialize)]
pub struct GradePayload {
    title: String,
    category: String,
    #[serde(default)]
    position: Option<i32>,
}

#[derive(Debug, PartialEq)]
struct GradeInput {
    title: String,
    category: String,
    position: Option<i32>,
}

fn validate_grade(payload: GradePayload) -> Result<GradeInput, String> {
    let title = require_title(&payload.title, "Title")?;
    let category = require_title(&payload.category, "Category")?;
    if payload.position.is_some_and(|position| position < 0) {
        return Err("Position must not be negative.".to_string());
    }
    Ok(GradeInput {
        title,
        category,
        position: payload.position,
    })
}

pub async fn create_grade(
    State(state): State<AppState>,
    jar: CookieJar,
    Json(payload): Json<GradePayload>,
) -> Result<(StatusCode, Json<GradeRow>), ApiFailure> {
    let admin = require_admin(&state, &jar).await?;
    let input = validate_grade(payload).map_err(bad_request)?;

    // Without an explicit position the grade goes to the end of its category.
    let grade = sqlx::query_as::<_, GradeRow>(
        "INSERT INTO grades (id, title, category, position) \
         VALUES ($1, $2, $3, COALESCE($4, (SELECT COALESCE(MAX(position) + 1, 0) FROM grades WHERE LOWER(category) = LOWER($3)))) \
         RETURNING id, title, category, position, created_at, updated_at",
    )
    .bind(Uuid::new_v4())
    .bind(&input.title)
    .bind(&input.category)
    .bind(input.position)
    .fetch_one(state.pool_ref())
    .await
    .map_err(|err| write_failure(err, GRADE_CONSTRAINTS))?;

    info!(admin = %admin.username, grade_id = %grade.id, "grade created");
    Ok((StatusCode::CREATED, Json(grade)))
}

pub async fn update_grade(
    State(state): State<AppState>,
    jar: CookieJar,
    Path(id): Path<Uuid>,
    Json(payload): Json<GradePayload>,
) -> Result<Json<GradeRow>, ApiFailure> {
    require_admin(&state, &jar).await?;
    let input = validate_grade(payload).map_err(bad_request)?;

    let grade = sqlx::query_as::<_, GradeRow>(
        "UPDATE grades SET title = $2, category = $3, position = COALESCE($4, position), updated_at = NOW() \
         WHERE id = $1 RETURNING id, title, category, position, created_at, updated_at",
    )
    .bind(id)
    .bind(&input.title)
    .bind(&input.category)
    .bind(input.position)
    .fetch_optional(state.pool_ref())
    .await
    .map_err(|err| write_failure(err, GRADE_CONSTRAINTS))?
    .ok_or_else(|| not_found("Grade not found."))?;

    Ok(Json(grade))
}

/// Deleting a grade cascades to its units and resources.
pub async fn delete_grade(
    State(state): State<AppState>,
    jar: CookieJar,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiFailure> {
    let admin = require_admin(&state, &jar).await?;

    let mut transaction = state.pool_ref().begin().await.map_err(db_failure)?;

    let stored_files: Vec<String> = sqlx::query_scalar(
        "SELECT r.file_url FROM resources r JOIN units u ON u.id = r.unit_id \
         WHERE u.grade_id = $1 AND r.file_url IS NOT NULL",
    )
    .bind(id)
    .fetch_all(&mut *transaction)
    .await
    .map_err(db_failure)?;

    let result = sqlx::query("DELETE FROM grades WHERE id = $1")
        .bind(id)
        .execute(&mut *transaction)
        .await
        .map_err(db_failure)?;

    if result.rows_affected() == 0 {
        return Err(not_found("Grade not found."));
    }

    transaction.commit().await.map_err(db_failure)?;
    release_stored_files(
        state.pool_ref(),
        state.storage_root(),
        AREA_RESOURCES,
        &stored_files,
    )
    .await;

    info!(admin = %admin.username, grade_id = %id, files = stored_files.len(), "grade deleted");
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payload(title: &str, category: &str, position: Option<i32>) -> GradePayload {
        GradePayload {
            title: title.into(),
            category: category.into(),
            position,
        }
    }

    #[test]
    fn grade_fields_are_trimmed() {
        let input = validate_grade(payload(" Grade 5 ", " primary ", None)).unwrap();
        assert_eq!(
            input,
            GradeInput {
                title: "Grade 5".into(),
                category: "primary".into(),
                position: None,
            }
        );
    }

    #[test]
    fn grade_requires_title_and_category() {
        assert_eq!(
            validate_grade(payload(" ", "primary", None)).unwrap_err(),
            "Title is required."
        );
        assert_eq!(
            validate_grade(payload("Grade 5", "", None)).unwrap_err(),
            "Category is required."
        );
        assert!(validate_grade(payload("Grade 5", "primary", Some(-1))).is_err());
    }
}
