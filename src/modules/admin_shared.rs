use std::{collections::HashSet, path::Path};

use axum::http::StatusCode;
use serde::Deserialize;
use sqlx::PgPool;
use tracing::warn;

use crate::web::{
    ApiFailure, data, internal_error, json_error,
    storage::{remove_unreferenced_files, url_in_area},
};

/// How a violated constraint should be reported to the client.
pub struct ConstraintMessage {
    pub constraint: &'static str,
    pub status: StatusCode,
    pub message: &'static str,
}

impl ConstraintMessage {
    pub const fn conflict(constraint: &'static str, message: &'static str) -> Self {
        Self {
            constraint,
            status: StatusCode::CONFLICT,
            message,
        }
    }

    pub const fn bad_request(constraint: &'static str, message: &'static str) -> Self {
        Self {
            constraint,
            status: StatusCode::BAD_REQUEST,
            message,
        }
    }
}

/// Map a failed write to a client error when it tripped a known constraint, else a logged 500.
pub fn write_failure(err: sqlx::Error, known: &[ConstraintMessage]) -> ApiFailure {
    if let sqlx::Error::Database(db_err) = &err {
        if let Some(name) = db_err.constraint() {
            if let Some(entry) = known.iter().find(|entry| entry.constraint == name) {
                return json_error(entry.status, entry.message);
            }
        }
    }
    internal_error(err.into())
}

pub fn db_failure(err: sqlx::Error) -> ApiFailure {
    internal_error(err.into())
}

/// Remove the files a deleted or updated row owned in `area`, unless another row still links to them.
///
/// Runs after the write commits. When the reference check fails the files stay
/// on disk for the maintenance sweep.
pub async fn release_stored_files(pool: &PgPool, root: &Path, area: &str, urls: &[String]) {
    let owned: Vec<String> = urls
        .iter()
        .filter(|url| url_in_area(url, area))
        .cloned()
        .collect();
    if owned.is_empty() {
        return;
    }

    let still_referenced: HashSet<String> = match data::fetch_still_referenced(pool, &owned).await {
        Ok(urls) => urls.into_iter().collect(),
        Err(err) => {
            warn!(?err, area, "failed to check stored file references");
            return;
        }
    };

    remove_unreferenced_files(root, area, &owned, &still_referenced).await;
}

#[derive(Debug, Default, Deserialize)]
pub struct CategoryQuery {
    #[serde(default)]
    pub category: Option<String>,
}

impl CategoryQuery {
    /// The requested category, ignoring blank values.
    pub fn filter(&self) -> Option<&str> {
        self.category
            .as_deref()
            .map(str::trim)
            .filter(|value| !value.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_category_means_no_filter() {
        let query = CategoryQuery {
            category: Some("  ".into()),
        };
        assert_eq!(query.filter(), None);

        let query = CategoryQuery {
            category: Some(" primary ".into()),
        };
        assert_eq!(query.filter(), Some("primary"));
        assert_eq!(CategoryQuery::default().filter(), None);
    }

    #[test]
    fn non_database_errors_are_internal() {
        let known = [ConstraintMessage::conflict("x", "dup")];
        let (status, _) = write_failure(sqlx::Error::RowNotFound, &known);
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    }
}
