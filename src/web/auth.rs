use argon2::Argon2;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use axum::{
    Json,
    extract::State,
    http::StatusCode,
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use chrono::{Duration as ChronoDuration, Utc};
use cookie::time::Duration as CookieDuration;
use rand_core::OsRng;
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use tracing::{error, info};
use uuid::Uuid;

use crate::web::{ApiFailure, AppState, json_error};

#[derive(Clone, sqlx::FromRow)]
pub struct DbAdminAuth {
    pub id: Uuid,
    pub username: String,
    pub password_hash: String,
}

#[derive(Clone, Debug, Serialize, sqlx::FromRow)]
pub struct AuthUser {
    pub id: Uuid,
    pub username: String,
}

pub const SESSION_COOKIE: &str = "portal_session";
pub const SESSION_TTL_DAYS: i64 = 7;

#[derive(Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

/// Failure produced when a JSON route requires a signed-in admin.
pub struct JsonAuthError {
    pub status: StatusCode,
    pub message: &'static str,
}

pub async fn login(
    State(state): State<AppState>,
    jar: CookieJar,
    Json(body): Json<LoginRequest>,
) -> Result<(CookieJar, Json<AuthUser>), ApiFailure> {
    let username = body.username.trim();
    if username.is_empty() || body.password.is_empty() {
        return Err(json_error(
            StatusCode::BAD_REQUEST,
            "Username and password are required.",
        ));
    }

    let admin = match fetch_admin_by_username(state.pool_ref(), username).await {
        Ok(Some(admin)) => admin,
        Ok(None) => return Err(invalid_credentials()),
        Err(err) => {
            error!(?err, "failed to fetch admin during login");
            return Err(server_error());
        }
    };

    if !verify_password(&body.password, &admin.password_hash) {
        return Err(invalid_credentials());
    }

    let session_token = Uuid::new_v4();
    let expires_at = Utc::now() + ChronoDuration::days(SESSION_TTL_DAYS);

    if let Err(err) =
        sqlx::query("INSERT INTO admin_sessions (id, admin_id, expires_at) VALUES ($1, $2, $3)")
            .bind(session_token)
            .bind(admin.id)
            .bind(expires_at)
            .execute(state.pool_ref())
            .await
    {
        error!(?err, "failed to create session");
        return Err(server_error());
    }

    info!(admin = %admin.username, "admin signed in");

    let secure = state
        .public_base_url()
        .is_some_and(|url| url.starts_with("https://"));
    let mut cookie = Cookie::new(SESSION_COOKIE, session_token.to_string());
    cookie.set_path("/");
    cookie.set_http_only(true);
    cookie.set_secure(secure);
    cookie.set_same_site(SameSite::Lax);
    cookie.set_max_age(CookieDuration::days(SESSION_TTL_DAYS));

    Ok((
        jar.add(cookie),
        Json(AuthUser {
            id: admin.id,
            username: admin.username,
        }),
    ))
}

pub async fn logout(State(state): State<AppState>, jar: CookieJar) -> (CookieJar, StatusCode) {
    if let Some(token) = session_token(&jar) {
        if let Err(err) = sqlx::query("DELETE FROM admin_sessions WHERE id = $1")
            .bind(token)
            .execute(state.pool_ref())
            .await
        {
            error!(?err, "failed to remove session during logout");
        }
    }

    let mut removal = Cookie::new(SESSION_COOKIE, "");
    removal.set_path("/");
    removal.set_http_only(true);
    removal.set_same_site(SameSite::Lax);
    removal.set_max_age(CookieDuration::seconds(0));

    (jar.remove(removal), StatusCode::NO_CONTENT)
}

pub async fn me(State(state): State<AppState>, jar: CookieJar) -> Result<Json<AuthUser>, ApiFailure> {
    current_user_or_json_error(&state, &jar)
        .await
        .map(Json)
        .map_err(|JsonAuthError { status, message }| json_error(status, message))
}

/// Resolve the admin behind the session cookie, if the session is still valid.
pub async fn current_user_or_json_error(
    state: &AppState,
    jar: &CookieJar,
) -> Result<AuthUser, JsonAuthError> {
    let Some(token) = session_token(jar) else {
        return Err(JsonAuthError {
            status: StatusCode::UNAUTHORIZED,
            message: "Please sign in first.",
        });
    };

    match fetch_user_by_session(state.pool_ref(), token).await {
        Ok(Some(user)) => Ok(user),
        Ok(None) => Err(JsonAuthError {
            status: StatusCode::UNAUTHORIZED,
            message: "Your session has expired, please sign in again.",
        }),
        Err(err) => {
            error!(?err, "failed to validate session");
            Err(JsonAuthError {
                status: StatusCode::INTERNAL_SERVER_ERROR,
                message: "Unable to verify the session right now.",
            })
        }
    }
}

fn session_token(jar: &CookieJar) -> Option<Uuid> {
    let cookie = jar.get(SESSION_COOKIE)?;
    Uuid::parse_str(cookie.value()).ok()
}

pub fn hash_password(password: &str) -> Result<String, argon2::password_hash::Error> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
}

pub fn verify_password(password: &str, password_hash: &str) -> bool {
    let parsed = PasswordHash::new(password_hash);
    match parsed {
        Ok(hash) => Argon2::default()
            .verify_password(password.as_bytes(), &hash)
            .is_ok(),
        Err(_) => false,
    }
}

pub async fn fetch_admin_by_username(
    pool: &PgPool,
    username: &str,
) -> sqlx::Result<Option<DbAdminAuth>> {
    sqlx::query_as::<_, DbAdminAuth>(
        "SELECT id, username, password_hash FROM admin_users WHERE username = $1",
    )
    .bind(username)
    .fetch_optional(pool)
    .await
}

pub async fn fetch_user_by_session(pool: &PgPool, token: Uuid) -> sqlx::Result<Option<AuthUser>> {
    sqlx::query_as::<_, AuthUser>(
        "SELECT admin_users.id, admin_users.username FROM admin_sessions JOIN admin_users ON admin_users.id = admin_sessions.admin_id WHERE admin_sessions.id = $1 AND admin_sessions.expires_at > NOW()",
    )
    .bind(token)
    .fetch_optional(pool)
    .await
}

fn invalid_credentials() -> ApiFailure {
    json_error(StatusCode::UNAUTHORIZED, "Invalid username or password.")
}

fn server_error() -> ApiFailure {
    json_error(
        StatusCode::INTERNAL_SERVER_ERROR,
        "Server error, please try again later.",
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn password_round_trip() {
        let hash = hash_password("correct horse").unwrap();
        assert!(verify_password("correct horse", &hash));
        assert!(!verify_password("wrong horse", &hash));
    }

    #[test]
    fn malformed_hash_never_verifies() {
        assert!(!verify_password("anything", "not-a-phc-string"));
    }

    #[test]
    fn session_token_requires_uuid_cookie() {
        let jar = CookieJar::new().add(Cookie::new(SESSION_COOKIE, "garbage"));
        assert!(session_token(&jar).is_none());

        let token = Uuid::new_v4();
        let jar = CookieJar::new().add(Cookie::new(SESSION_COOKIE, token.to_string()));
        assert_eq!(session_token(&jar), Some(token));
    }
}
