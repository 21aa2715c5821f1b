use axum::{
    Json, Router,
    extract::State,
    routing::{get, post, put},
};

mod admin;

use crate::{
    modules::admin_shared::db_failure,
    web::{ApiFailure, AppState, TeamMemberRow, data},
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/team-members", get(list_team_members))
        .route("/api/admin/team-members", post(admin::create_member))
        .route(
            "/api/admin/team-members/:id",
            put(admin::update_member).delete(admin::delete_member),
        )
        .route(
            "/api/admin/team-members/:id/photo",
            post(admin::upload_photo),
        )
}

async fn list_team_members(
    State(state): State<AppState>,
) -> Result<Json<Vec<TeamMemberRow>>, ApiFailure> {
    let members = data::fetch_team_members(state.pool_ref())
        .await
        .map_err(db_failure)?;
    Ok(Json(members))
}
