use axum::{
    Json, Router,
    extract::State,
    routing::{get, put},
};
use axum_extra::extract::cookie::CookieJar;
use serde::Deserialize;
use tracing::info;

use crate::{
    modules::admin_shared::db_failure,
    utils::validate::{clean_optional, validate_email, validate_link},
    web::{ApiFailure, AppState, ContactInfoRow, admin::require_admin, bad_request, data},
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/contact-info", get(get_contact_info))
        .route("/api/admin/contact-info", put(save_contact_info))
}

#[derive(Debug, Default, Deserialize)]
pub struct ContactPayload {
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    phone: Option<String>,
    #[serde(default)]
    address: Option<String>,
    #[serde(default)]
    office_hours: Option<String>,
    #[serde(default)]
    website: Option<String>,
    #[serde(default)]
    facebook: Option<String>,
}

fn validate_contact(payload: ContactPayload) -> Result<ContactInfoRow, String> {
    let contact = ContactInfoRow {
        email: clean_optional(payload.email.as_deref()),
        phone: clean_optional(payload.phone.as_deref()),
        address: clean_optional(payload.address.as_deref()),
        office_hours: clean_optional(payload.office_hours.as_deref()),
        website: clean_optional(payload.website.as_deref()),
        facebook: clean_optional(payload.facebook.as_deref()),
    };

    if let Some(email) = &contact.email {
        validate_email(email)?;
    }
    for (field, link) in [("website", &contact.website), ("facebook", &contact.facebook)] {
        if let Some(link) = link {
            validate_link(link).map_err(|message| format!("{field}: {message}"))?;
        }
    }

    Ok(contact)
}

async fn get_contact_info(State(state): State<AppState>) -> Result<Json<ContactInfoRow>, ApiFailure> {
    let contact = data::fetch_contact_info(state.pool_ref())
        .await
        .map_err(db_failure)?;
    Ok(Json(contact))
}

async fn save_contact_info(
    State(state): State<AppState>,
    jar: CookieJar,
    Json(payload): Json<ContactPayload>,
) -> Result<Json<ContactInfoRow>, ApiFailure> {
    let admin = require_admin(&state, &jar).await?;
    let contact = validate_contact(payload).map_err(bad_request)?;

    let saved = sqlx::query_as::<_, ContactInfoRow>(
        "INSERT INTO contact_info (id, email, phone, address, office_hours, website, facebook) \
         VALUES (1, $1, $2, $3, $4, $5, $6) \
         ON CONFLICT (id) DO UPDATE SET email = EXCLUDED.email, phone = EXCLUDED.phone, \
         address = EXCLUDED.address, office_hours = EXCLUDED.office_hours, \
         website = EXCLUDED.website, facebook = EXCLUDED.facebook, updated_at = NOW() \
         RETURNING email, phone, address, office_hours, website, facebook",
    )
    .bind(&contact.email)
    .bind(&contact.phone)
    .bind(&contact.address)
    .bind(&contact.office_hours)
    .bind(&contact.website)
    .bind(&contact.facebook)
    .fetch_one(state.pool_ref())
    .await
    .map_err(db_failure)?;

    info!(admin = %admin.username, "contact info updated");
    Ok(Json(saved))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_fields_become_null() {
        let contact = validate_contact(ContactPayload {
            email: Some(" office@school.edu ".into()),
            phone: Some("  ".into()),
            ..Default::default()
        })
        .unwrap();
        assert_eq!(contact.email.as_deref(), Some("office@school.edu"));
        assert_eq!(contact.phone, None);
        assert_eq!(contact.website, None);
    }

    #[test]
    fn contact_links_and_email_are_checked() {
        let err = validate_contact(ContactPayload {
            email: Some("office@".into()),
            ..Default::default()
        })
        .unwrap_err();
        assert_eq!(err, "Email format is invalid.");

        let err = validate_contact(ContactPayload {
            facebook: Some("facebook.com/school".into()),
            ..Default::default()
        })
        .unwrap_err();
        assert!(err.starts_with("facebook:"), "{err}");
    }
}
