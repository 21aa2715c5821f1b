use axum::{
    Json, Router,
    extract::{Path, Query, State},
    routing::{get, post, put},
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

mod admin;
mod export;
mod import;
mod links;

use crate::{
    modules::admin_shared::db_failure,
    preview::{PreviewPlan, plan_preview},
    utils::validate::validate_link,
    web::{ApiFailure, AppState, ResourceRow, bad_request, data, not_found},
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/units/:id/resources", get(list_resources_for_unit))
        .route("/api/resources/:id", get(resource_detail))
        .route("/api/resources/:id/preview", get(resource_preview))
        .route("/api/preview", get(preview_link))
        .route("/api/admin/resources", post(admin::create_resource))
        .route("/api/admin/resources/upload", post(admin::upload_resource))
        .route("/api/admin/resources/import", post(import::import_resources))
        .route("/api/admin/resources/export", get(export::export_resources))
        .route("/api/admin/resources/link-report", get(links::link_report))
        .route(
            "/api/admin/resources/:id",
            put(admin::update_resource).delete(admin::delete_resource),
        )
}

#[derive(Serialize)]
pub struct ResourcePreview {
    resource: ResourceRow,
    preview: Option<PreviewPlan>,
}

#[derive(Deserialize)]
pub struct PreviewQuery {
    url: String,
    #[serde(default, rename = "type")]
    type_hint: Option<String>,
}

/// Viewer chain for a resource, using the first link present by precedence.
pub fn preview_for(resource: &ResourceRow, public_base: Option<&str>) -> Option<PreviewPlan> {
    let link = resource.display_link()?;
    Some(plan_preview(
        link,
        resource.download_target(),
        Some(resource.resource_type.as_str()),
        public_base,
    ))
}

async fn list_resources_for_unit(
    State(state): State<AppState>,
    Path(unit_id): Path<Uuid>,
) -> Result<Json<Vec<ResourceRow>>, ApiFailure> {
    if data::fetch_unit(state.pool_ref(), unit_id)
        .await
        .map_err(db_failure)?
        .is_none()
    {
        return Err(not_found("Unit not found."));
    }

    let resources = data::fetch_resources_for_unit(state.pool_ref(), unit_id)
        .await
        .map_err(db_failure)?;
    Ok(Json(resources))
}

async fn resource_detail(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ResourceRow>, ApiFailure> {
    data::fetch_resource(state.pool_ref(), id)
        .await
        .map_err(db_failure)?
        .map(Json)
        .ok_or_else(|| not_found("Resource not found."))
}

async fn resource_preview(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ResourcePreview>, ApiFailure> {
    let resource = data::fetch_resource(state.pool_ref(), id)
        .await
        .map_err(db_failure)?
        .ok_or_else(|| not_found("Resource not found."))?;

    let preview = preview_for(&resource, state.public_base_url());
    Ok(Json(ResourcePreview { resource, preview }))
}

/// `GET /api/preview?url=&type=`: classify an arbitrary link without storing it.
async fn preview_link(
    State(state): State<AppState>,
    Query(query): Query<PreviewQuery>,
) -> Result<Json<PreviewPlan>, ApiFailure> {
    let url = query.url.trim();
    if url.is_empty() {
        return Err(bad_request("A url parameter is required."));
    }
    validate_link(url).map_err(bad_request)?;

    let type_hint = query
        .type_hint
        .as_deref()
        .map(str::trim)
        .filter(|hint| !hint.is_empty());
    Ok(Json(plan_preview(
        url,
        None,
        type_hint,
        state.public_base_url(),
    )))
}
