use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use axum_extra::extract::cookie::CookieJar;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{error, info};
use uuid::Uuid;

use crate::{
    utils::validate::{validate_password, validate_username},
    web::{
        ApiFailure, AppState, RecordRef, auth, bad_request, internal_error, json_error, not_found,
    },
};

use super::auth::require_admin;

#[derive(Serialize, sqlx::FromRow)]
pub struct AdminUserRow {
    id: Uuid,
    username: String,
    created_at: DateTime<Utc>,
}

#[derive(Deserialize)]
pub struct CreateAdminRequest {
    username: String,
    password: String,
}

#[derive(Deserialize)]
pub struct UpdatePasswordRequest {
    password: String,
}

pub async fn list_admins(
    State(state): State<AppState>,
    jar: CookieJar,
) -> Result<Json<Vec<AdminUserRow>>, ApiFailure> {
    require_admin(&state, &jar).await?;

    let admins = sqlx::query_as::<_, AdminUserRow>(
        "SELECT id, username, created_at FROM admin_users ORDER BY username",
    )
    .fetch_all(state.pool_ref())
    .await
    .map_err(|err| internal_error(err.into()))?;

    Ok(Json(admins))
}

pub async fn create_admin(
    State(state): State<AppState>,
    jar: CookieJar,
    Json(body): Json<CreateAdminRequest>,
) -> Result<(StatusCode, Json<RecordRef>), ApiFailure> {
    let current = require_admin(&state, &jar).await?;

    let username = body.username.trim();
    validate_username(username).map_err(bad_request)?;
    validate_password(&body.password).map_err(bad_request)?;

    let password_hash = auth::hash_password(&body.password).map_err(|err| {
        error!(?err, "failed to hash password while creating admin");
        json_error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "Could not process the password, please retry.",
        )
    })?;

    let id = Uuid::new_v4();
    let result =
        sqlx::query("INSERT INTO admin_users (id, username, password_hash) VALUES ($1, $2, $3)")
            .bind(id)
            .bind(username)
            .bind(password_hash)
            .execute(state.pool_ref())
            .await;

    match result {
        Ok(_) => {
            info!(created_by = %current.username, %username, "admin user created");
            Ok((StatusCode::CREATED, Json(RecordRef::new(id))))
        }
        Err(sqlx::Error::Database(db_err))
            if db_err.constraint() == Some("admin_users_username_key") =>
        {
            Err(json_error(StatusCode::CONFLICT, "That username is already taken."))
        }
        Err(err) => Err(internal_error(err.into())),
    }
}

pub async fn update_admin_password(
    State(state): State<AppState>,
    jar: CookieJar,
    Path(id): Path<Uuid>,
    Json(body): Json<UpdatePasswordRequest>,
) -> Result<StatusCode, ApiFailure> {
    require_admin(&state, &jar).await?;
    validate_password(&body.password).map_err(bad_request)?;

    let password_hash = auth::hash_password(&body.password).map_err(|err| {
        error!(?err, "failed to hash password while updating admin");
        json_error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "Could not process the password, please retry.",
        )
    })?;

    let mut transaction = state
        .pool_ref()
        .begin()
        .await
        .map_err(|err| internal_error(err.into()))?;

    let result = sqlx::query(
        "UPDATE admin_users SET password_hash = $2, updated_at = NOW() WHERE id = $1",
    )
    .bind(id)
    .bind(password_hash)
    .execute(&mut *transaction)
    .await
    .map_err(|err| internal_error(err.into()))?;

    if result.rows_affected() == 0 {
        return Err(not_found("Admin user not found."));
    }

    // Existing sessions for this account stop working once its password changes.
    sqlx::query("DELETE FROM admin_sessions WHERE admin_id = $1")
        .bind(id)
        .execute(&mut *transaction)
        .await
        .map_err(|err| internal_error(err.into()))?;

    transaction
        .commit()
        .await
        .map_err(|err| internal_error(err.into()))?;

    Ok(StatusCode::NO_CONTENT)
}

pub async fn delete_admin(
    State(state): State<AppState>,
    jar: CookieJar,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiFailure> {
    let current = require_admin(&state, &jar).await?;

    if current.id == id {
        return Err(bad_request("You cannot delete your own account."));
    }

    let mut transaction = state
        .pool_ref()
        .begin()
        .await
        .map_err(|err| internal_error(err.into()))?;

    let remaining: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM admin_users")
        .fetch_one(&mut *transaction)
        .await
        .map_err(|err| internal_error(err.into()))?;

    if remaining <= 1 {
        return Err(bad_request("At least one admin account must remain."));
    }

    let result = sqlx::query("DELETE FROM admin_users WHERE id = $1")
        .bind(id)
        .execute(&mut *transaction)
        .await
        .map_err(|err| internal_error(err.into()))?;

    if result.rows_affected() == 0 {
        return Err(not_found("Admin user not found."));
    }

    transaction
        .commit()
        .await
        .map_err(|err| internal_error(err.into()))?;

    info!(deleted_by = %current.username, admin_id = %id, "admin user deleted");
    Ok(StatusCode::NO_CONTENT)
}
