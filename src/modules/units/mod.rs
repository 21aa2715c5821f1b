use axum::{
    Json, Router,
    extract::{Path, State},
    routing::{get, post, put},
};
use serde::Serialize;
use uuid::Uuid;

mod admin;

use crate::{
    modules::admin_shared::db_failure,
    web::{ApiFailure, AppState, ResourceRow, UnitRow, data, not_found},
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/grades/:id/units", get(list_units_for_grade))
        .route("/api/units/:id", get(unit_detail))
        .route("/api/admin/units", post(admin::create_unit))
        .route(
            "/api/admin/units/:id",
            put(admin::update_unit).delete(admin::delete_unit),
        )
}

#[derive(Serialize)]
pub struct UnitDetail {
    #[serde(flatten)]
    unit: UnitRow,
    resources: Vec<ResourceRow>,
}

async fn list_units_for_grade(
    State(state): State<AppState>,
    Path(grade_id): Path<Uuid>,
) -> Result<Json<Vec<UnitRow>>, ApiFailure> {
    if data::fetch_grade(state.pool_ref(), grade_id)
        .await
        .map_err(db_failure)?
        .is_none()
    {
        return Err(not_found("Grade not found."));
    }

    let units = data::fetch_units_for_grade(state.pool_ref(), grade_id)
        .await
        .map_err(db_failure)?;
    Ok(Json(units))
}

async fn unit_detail(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<UnitDetail>, ApiFailure> {
    let unit = data::fetch_unit(state.pool_ref(), id)
        .await
        .map_err(db_failure)?
        .ok_or_else(|| not_found("Unit not found."))?;
    let resources = data::fetch_resources_for_unit(state.pool_ref(), id)
        .await
        .map_err(db_failure)?;

    Ok(Json(UnitDetail { unit, resources }))
}
