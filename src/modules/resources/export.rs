use anyhow::{Context, Result};
use axum::{
    extract::State,
    http::{HeaderMap, HeaderValue, header},
    response::{IntoResponse, Response},
};
use axum_extra::extract::cookie::CookieJar;
use chrono::Utc;
use rust_xlsxwriter::{Format, Workbook};
use sqlx::FromRow;
use tracing::info;

use crate::{
    modules::admin_shared::db_failure,
    web::{ApiFailure, AppState, admin::require_admin, internal_error},
};

const XLSX_CONTENT_TYPE: &str = "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";

/// The first six columns match what the importer reads back.
const CATALOG_HEADERS: [&str; 9] = [
    "Grade",
    "Category",
    "Unit",
    "Title",
    "Type",
    "Link",
    "Preview link",
    "Download link",
    "File",
];

#[derive(Debug, Clone, FromRow)]
pub(super) struct CatalogRow {
    pub grade: String,
    pub category: String,
    pub unit: String,
    pub title: String,
    pub resource_type: String,
    pub link: Option<String>,
    pub preview_link: Option<String>,
    pub download_link: Option<String>,
    pub file_url: Option<String>,
}

impl CatalogRow {
    fn primary_link(&self) -> &str {
        [
            &self.link,
            &self.preview_link,
            &self.file_url,
            &self.download_link,
        ]
        .into_iter()
        .flatten()
        .map(String::as_str)
        .next()
        .unwrap_or_default()
    }
}

pub(super) fn build_catalog_workbook(rows: &[CatalogRow]) -> Result<Vec<u8>> {
    let mut workbook = Workbook::new();
    let worksheet = workbook.add_worksheet();
    let header_format = Format::new().set_bold();

    for (col, title) in CATALOG_HEADERS.iter().enumerate() {
        worksheet
            .write_string_with_format(0, col as u16, *title, &header_format)
            .context("failed to write catalog header")?;
    }

    for (index, row) in rows.iter().enumerate() {
        let line = (index + 1) as u32;
        let values = [
            row.grade.as_str(),
            row.category.as_str(),
            row.unit.as_str(),
            row.title.as_str(),
            row.resource_type.as_str(),
            row.primary_link(),
            row.preview_link.as_deref().unwrap_or_default(),
            row.download_link.as_deref().unwrap_or_default(),
            row.file_url.as_deref().unwrap_or_default(),
        ];
        for (col, value) in values.iter().enumerate() {
            if value.is_empty() {
                continue;
            }
            worksheet
                .write_string(line, col as u16, *value)
                .context("failed to write catalog row")?;
        }
    }

    worksheet
        .set_column_width(3, 40)
        .context("failed to size title column")?;
    worksheet
        .set_column_width(5, 60)
        .context("failed to size link column")?;

    workbook
        .save_to_buffer()
        .context("failed to serialize catalog workbook")
}

/// `GET /api/admin/resources/export`: the whole catalog as an `.xlsx` download.
pub async fn export_resources(
    State(state): State<AppState>,
    jar: CookieJar,
) -> Result<Response, ApiFailure> {
    let admin = require_admin(&state, &jar).await?;

    let rows = sqlx::query_as::<_, CatalogRow>(
        "SELECT g.title AS grade, g.category, u.title AS unit, r.title, r.resource_type, \
         r.link, r.preview_link, r.download_link, r.file_url \
         FROM resources r JOIN units u ON u.id = r.unit_id JOIN grades g ON g.id = u.grade_id \
         ORDER BY g.category, g.position, g.title, u.position, u.title, r.created_at",
    )
    .fetch_all(state.pool_ref())
    .await
    .map_err(db_failure)?;

    let bytes = build_catalog_workbook(&rows).map_err(internal_error)?;

    let filename = format!("resource-catalog-{}.xlsx", Utc::now().format("%Y%m%d"));
    let mut headers = HeaderMap::new();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static(XLSX_CONTENT_TYPE),
    );
    let disposition = HeaderValue::from_str(&format!("attachment; filename=\"{filename}\""))
        .map_err(|err| internal_error(err.into()))?;
    headers.insert(header::CONTENT_DISPOSITION, disposition);

    info!(admin = %admin.username, rows = rows.len(), "resource catalog exported");
    Ok((headers, bytes).into_response())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modules::resources::import::parse_import_sheet;

    #[test]
    fn exported_catalog_can_be_imported_again() {
        let rows = vec![
            CatalogRow {
                grade: "Grade 5".into(),
                category: "primary".into(),
                unit: "Fractions".into(),
                title: "Worksheet".into(),
                resource_type: "pdf".into(),
                link: None,
                preview_link: None,
                download_link: None,
                file_url: Some("/files/resources/ws.pdf".into()),
            },
            CatalogRow {
                grade: "Grade 5".into(),
                category: "primary".into(),
                unit: "Fractions".into(),
                title: "Intro".into(),
                resource_type: "video".into(),
                link: Some("https://youtu.be/abc123".into()),
                preview_link: None,
                download_link: None,
                file_url: None,
            },
        ];

        let bytes = build_catalog_workbook(&rows).unwrap();
        let parsed = parse_import_sheet(&bytes).unwrap();

        assert!(parsed.issues.is_empty(), "{:?}", parsed.issues);
        assert_eq!(parsed.rows.len(), 2);
        assert_eq!(parsed.rows[0].link, "/files/resources/ws.pdf");
        assert_eq!(parsed.rows[1].link, "https://youtu.be/abc123");
        assert_eq!(parsed.rows[1].resource_type.as_deref(), Some("video"));
    }
}
