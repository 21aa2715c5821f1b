use axum::{
    Json, Router,
    extract::{Path, Query, State},
    routing::{get, post, put},
};
use serde::Serialize;
use uuid::Uuid;

mod admin;

use crate::{
    modules::admin_shared::{CategoryQuery, db_failure},
    web::{ApiFailure, AppState, GradeRow, UnitRow, data, not_found},
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/grades", get(list_grades))
        .route("/api/grades/:id", get(grade_detail))
        .route("/api/admin/grades", post(admin::create_grade))
        .route(
            "/api/admin/grades/:id",
            put(admin::update_grade).delete(admin::delete_grade),
        )
}

#[derive(Serialize)]
pub struct GradeDetail {
    #[serde(flatten)]
    grade: GradeRow,
    units: Vec<UnitRow>,
}

async fn list_grades(
    State(state): State<AppState>,
    Query(query): Query<CategoryQuery>,
) -> Result<Json<Vec<GradeRow>>, ApiFailure> {
    let grades = data::fetch_grades(state.pool_ref(), query.filter())
        .await
        .map_err(db_failure)?;
    Ok(Json(grades))
}

async fn grade_detail(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<GradeDetail>, ApiFailure> {
    let grade = data::fetch_grade(state.pool_ref(), id)
        .await
        .map_err(db_failure)?
        .ok_or_else(|| not_found("Grade not found."))?;
    let units = data::fetch_units_for_grade(state.pool_ref(), id)
        .await
        .map_err(db_failure)?;

    Ok(Json(GradeDetail { grade, units }))
}
