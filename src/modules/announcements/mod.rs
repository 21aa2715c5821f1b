use axum::{
    Json, Router,
    extract::State,
    routing::get,
};

mod admin;

use crate::{
    modules::admin_shared::db_failure,
    web::{AnnouncementRow, ApiFailure, AppState, data},
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/announcements", get(list_published))
        .route(
            "/api/admin/announcements",
            get(admin::list_all).post(admin::create_announcement),
        )
        .route(
            "/api/admin/announcements/:id",
            get(admin::get_announcement)
                .put(admin::update_announcement)
                .delete(admin::delete_announcement),
        )
}

/// Published announcements, newest first.
async fn list_published(
    State(state): State<AppState>,
) -> Result<Json<Vec<AnnouncementRow>>, ApiFailure> {
    let announcements = data::fetch_published_announcements(state.pool_ref())
        .await
        .map_err(db_failure)?;
    Ok(Json(announcements))
}
