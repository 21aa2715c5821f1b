use axum_extra::extract::cookie::CookieJar;

use crate::web::{
    ApiFailure, AppState, AuthUser,
    auth::{self, JsonAuthError},
    json_error,
};

/// Gate for every `/api/admin/*` handler.
pub async fn require_admin(state: &AppState, jar: &CookieJar) -> Result<AuthUser, ApiFailure> {
    auth::current_user_or_json_error(state, jar)
        .await
        .map_err(|JsonAuthError { status, message }| json_error(status, message))
}
