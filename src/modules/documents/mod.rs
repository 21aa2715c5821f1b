use axum::{
    Json, Router,
    extract::{Path, Query, State},
    routing::{get, post, put},
};
use uuid::Uuid;

mod admin;

use crate::{
    modules::admin_shared::{CategoryQuery, db_failure},
    web::{ApiFailure, AppState, DocumentRow, data, not_found},
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/documents", get(list_documents))
        .route("/api/documents/:id", get(document_detail))
        .route("/api/admin/documents", post(admin::upload_document))
        .route(
            "/api/admin/documents/:id",
            put(admin::update_document).delete(admin::delete_document),
        )
}

async fn list_documents(
    State(state): State<AppState>,
    Query(query): Query<CategoryQuery>,
) -> Result<Json<Vec<DocumentRow>>, ApiFailure> {
    let documents = data::fetch_documents(state.pool_ref(), query.filter())
        .await
        .map_err(db_failure)?;
    Ok(Json(documents))
}

async fn document_detail(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<DocumentRow>, ApiFailure> {
    data::fetch_document(state.pool_ref(), id)
        .await
        .map_err(db_failure)?
        .map(Json)
        .ok_or_else(|| not_found("Document not found."))
}
