use axum::{
    Router,
    extract::DefaultBodyLimit,
    http::{StatusCode, header},
    response::IntoResponse,
    routing::{delete, get, post, put},
};

use crate::{
    modules,
    web::{AppState, admin, auth, landing, storage},
};

const ROBOTS_TXT_BODY: &str = "User-agent: *\nDisallow: /api/\nAllow: /\n";

/// Room for multipart framing and the text fields sent next to a file.
const BODY_LIMIT_SLACK: usize = 1024 * 1024;

pub fn build_router(state: AppState) -> Router {
    let body_limit = usize::try_from(state.config().max_upload_bytes)
        .unwrap_or(usize::MAX)
        .saturating_add(BODY_LIMIT_SLACK);

    Router::new()
        .route("/", get(landing::home_page))
        .route("/grades/:id", get(landing::grade_page))
        .route("/resources/:id", get(landing::resource_page))
        .route("/files/*path", get(storage::serve_file))
        .route("/healthz", get(healthz))
        .route("/robots.txt", get(robots_txt))
        .route("/api/auth/login", post(auth::login))
        .route("/api/auth/logout", post(auth::logout))
        .route("/api/auth/me", get(auth::me))
        .route(
            "/api/admin/users",
            get(admin::list_admins).post(admin::create_admin),
        )
        .route("/api/admin/users/:id", delete(admin::delete_admin))
        .route(
            "/api/admin/users/:id/password",
            put(admin::update_admin_password),
        )
        .route(
            "/api/admin/settings",
            get(admin::get_settings).put(admin::save_settings),
        )
        .merge(modules::grades::router())
        .merge(modules::units::router())
        .merge(modules::resources::router())
        .merge(modules::documents::router())
        .merge(modules::team::router())
        .merge(modules::announcements::router())
        .merge(modules::contact::router())
        .layer(DefaultBodyLimit::max(body_limit))
        .with_state(state)
}

async fn robots_txt() -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
        ROBOTS_TXT_BODY,
    )
}

async fn healthz() -> impl IntoResponse {
    StatusCode::OK
}
