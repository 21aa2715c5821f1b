use axum::{Json, extract::State};
use axum_extra::extract::cookie::CookieJar;
use tracing::info;

use crate::{
    config::SiteSettings,
    web::{ApiFailure, AppState, bad_request, internal_error},
};

use super::auth::require_admin;

pub async fn get_settings(
    State(state): State<AppState>,
    jar: CookieJar,
) -> Result<Json<SiteSettings>, ApiFailure> {
    require_admin(&state, &jar).await?;
    Ok(Json(state.site_settings().await))
}

pub async fn save_settings(
    State(state): State<AppState>,
    jar: CookieJar,
    Json(body): Json<SiteSettings>,
) -> Result<Json<SiteSettings>, ApiFailure> {
    let admin = require_admin(&state, &jar).await?;

    let settings = body
        .normalized()
        .ok_or_else(|| bad_request("Site title is required."))?;

    settings
        .save(state.pool_ref())
        .await
        .map_err(internal_error)?;
    state.reload_settings().await.map_err(internal_error)?;

    info!(admin = %admin.username, "site settings updated");
    Ok(Json(state.site_settings().await))
}
