use std::{collections::HashMap, io::Cursor};

use anyhow::{Context, Result, anyhow, bail};
use axum::{
    Json,
    extract::{Multipart, State},
    http::StatusCode,
};
use axum_extra::extract::cookie::CookieJar;
use calamine::{DataType, Range, Reader, Xlsx};
use serde::Serialize;
use sqlx::{Postgres, Transaction};
use tracing::{info, warn};
use uuid::Uuid;

use crate::{
    modules::admin_shared::db_failure,
    utils::validate::{require_title, validate_link},
    web::{ApiFailure, AppState, admin::require_admin, bad_request, json_error},
};

use super::admin::{ResourceInput, insert_resource, resource_type_for};

const DEFAULT_CATEGORY: &str = "general";

/// One spreadsheet row that passed validation.
#[derive(Debug, Clone, PartialEq)]
pub(super) struct ImportRow {
    pub row: usize,
    pub grade: String,
    pub category: String,
    pub unit: String,
    pub title: String,
    pub resource_type: Option<String>,
    pub link: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RowIssue {
    pub row: usize,
    pub message: String,
}

#[derive(Debug, Default)]
pub(super) struct ParsedSheet {
    pub rows: Vec<ImportRow>,
    pub issues: Vec<RowIssue>,
}

#[derive(Debug, Default, Serialize)]
pub struct ImportSummary {
    grades_created: usize,
    units_created: usize,
    resources_created: usize,
    skipped: Vec<RowIssue>,
}

struct ColumnMap {
    grade: usize,
    category: Option<usize>,
    unit: usize,
    title: usize,
    resource_type: Option<usize>,
    link: usize,
}

impl ColumnMap {
    fn from_header(range: &Range<DataType>) -> Result<Self> {
        let (_, width) = range.get_size();
        let mut found: HashMap<&'static str, usize> = HashMap::new();

        for col in 0..width {
            let Some(name) = cell_to_string(range.get((0, col))) else {
                continue;
            };
            let key = match name.to_ascii_lowercase().replace(' ', "_").as_str() {
                "grade" => "grade",
                "category" => "category",
                "unit" => "unit",
                "title" => "title",
                "type" | "resource_type" => "type",
                "link" | "url" => "link",
                _ => continue,
            };
            found.entry(key).or_insert(col);
        }

        let required = |key: &str| {
            found
                .get(key)
                .copied()
                .ok_or_else(|| anyhow!("The header row is missing the `{key}` column."))
        };

        Ok(Self {
            grade: required("grade")?,
            category: found.get("category").copied(),
            unit: required("unit")?,
            title: required("title")?,
            resource_type: found.get("type").copied(),
            link: required("link")?,
        })
    }
}

fn cell_to_string(cell: Option<&DataType>) -> Option<String> {
    let value = cell?;
    let text = match value {
        DataType::String(s) => s.trim().to_string(),
        DataType::Float(f) => {
            let mut s = format!("{f}");
            if s.ends_with(".0") {
                s.truncate(s.len() - 2);
            }
            s
        }
        DataType::Int(i) => i.to_string(),
        DataType::Bool(b) => b.to_string(),
        DataType::Empty => String::new(),
        other => other.to_string(),
    };

    let trimmed = text.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// Read the first worksheet of an `.xlsx` catalog. Invalid rows are reported, not fatal.
pub(super) fn parse_import_sheet(bytes: &[u8]) -> Result<ParsedSheet> {
    let mut workbook =
        Xlsx::new(Cursor::new(bytes)).context("Could not open the workbook, is it an .xlsx file?")?;
    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| anyhow!("The workbook has no worksheets."))??;

    let (height, _) = range.get_size();
    if height == 0 {
        bail!("The worksheet is empty.");
    }

    let columns = ColumnMap::from_header(&range)?;
    let mut parsed = ParsedSheet::default();

    for index in 1..height {
        // Spreadsheet row numbers are 1-based and include the header.
        let row = index + 1;
        let cell = |col: usize| cell_to_string(range.get((index, col)));

        let grade = cell(columns.grade);
        let category = columns.category.and_then(cell);
        let unit = cell(columns.unit);
        let title = cell(columns.title);
        let resource_type = columns.resource_type.and_then(cell);
        let link = cell(columns.link);

        if [&grade, &category, &unit, &title, &resource_type, &link]
            .iter()
            .all(|value| value.is_none())
        {
            continue;
        }

        match parse_row(row, grade, category, unit, title, resource_type, link) {
            Ok(parsed_row) => parsed.rows.push(parsed_row),
            Err(message) => parsed.issues.push(RowIssue { row, message }),
        }
    }

    Ok(parsed)
}

fn parse_row(
    row: usize,
    grade: Option<String>,
    category: Option<String>,
    unit: Option<String>,
    title: Option<String>,
    resource_type: Option<String>,
    link: Option<String>,
) -> Result<ImportRow, String> {
    let grade = require_title(grade.as_deref().unwrap_or_default(), "Grade")?;
    let unit = require_title(unit.as_deref().unwrap_or_default(), "Unit")?;
    let title = require_title(title.as_deref().unwrap_or_default(), "Title")?;
    let category = category.unwrap_or_else(|| DEFAULT_CATEGORY.to_string());
    let Some(link) = link else {
        return Err("Link is required.".to_string());
    };
    validate_link(&link)?;

    Ok(ImportRow {
        row,
        grade,
        category,
        unit,
        title,
        resource_type,
        link,
    })
}

/// `POST /api/admin/resources/import`: multipart with a single `file` part holding the workbook.
pub async fn import_resources(
    State(state): State<AppState>,
    jar: CookieJar,
    mut multipart: Multipart,
) -> Result<Json<ImportSummary>, ApiFailure> {
    let admin = require_admin(&state, &jar).await?;

    let mut workbook = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|err| bad_request(format!("Failed to read the upload form: {err}")))?
    {
        if field.name() != Some("file") {
            continue;
        }
        let file_name = field.file_name().unwrap_or_default().to_ascii_lowercase();
        if !file_name.ends_with(".xlsx") {
            return Err(bad_request("Please upload an .xlsx workbook."));
        }
        let bytes = field
            .bytes()
            .await
            .map_err(|err| bad_request(format!("Failed to read the workbook: {err}")))?;
        if bytes.len() as u64 > state.config().max_upload_bytes {
            return Err(json_error(
                StatusCode::PAYLOAD_TOO_LARGE,
                "The workbook is too large.",
            ));
        }
        workbook = Some(bytes);
    }

    let Some(bytes) = workbook else {
        return Err(bad_request("A workbook in the `file` field is required."));
    };

    let parsed = parse_import_sheet(&bytes).map_err(|err| {
        warn!(?err, "rejected resource import workbook");
        bad_request(err.to_string())
    })?;

    let mut transaction = state.pool_ref().begin().await.map_err(db_failure)?;
    let mut summary = ImportSummary {
        skipped: parsed.issues,
        ..ImportSummary::default()
    };
    let mut grade_ids: HashMap<(String, String), Uuid> = HashMap::new();
    let mut unit_ids: HashMap<(Uuid, String), Uuid> = HashMap::new();

    for row in parsed.rows {
        let grade_key = (row.grade.to_lowercase(), row.category.to_lowercase());
        let grade_id = match grade_ids.get(&grade_key) {
            Some(id) => *id,
            None => {
                let (id, created) = find_or_create_grade(&mut transaction, &row.grade, &row.category)
                    .await
                    .map_err(db_failure)?;
                summary.grades_created += usize::from(created);
                grade_ids.insert(grade_key, id);
                id
            }
        };

        let unit_key = (grade_id, row.unit.to_lowercase());
        let unit_id = match unit_ids.get(&unit_key) {
            Some(id) => *id,
            None => {
                let (id, created) = find_or_create_unit(&mut transaction, grade_id, &row.unit)
                    .await
                    .map_err(db_failure)?;
                summary.units_created += usize::from(created);
                unit_ids.insert(unit_key, id);
                id
            }
        };

        let duplicate: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM resources WHERE unit_id = $1 AND LOWER(title) = LOWER($2) AND link = $3)",
        )
        .bind(unit_id)
        .bind(&row.title)
        .bind(&row.link)
        .fetch_one(&mut *transaction)
        .await
        .map_err(db_failure)?;
        if duplicate {
            summary.skipped.push(RowIssue {
                row: row.row,
                message: "The resource already exists in this unit.".to_string(),
            });
            continue;
        }

        let resource_type = match resource_type_for(row.resource_type.as_deref(), &row.link) {
            Ok(resource_type) => resource_type,
            Err(message) => {
                summary.skipped.push(RowIssue { row: row.row, message });
                continue;
            }
        };

        let input = ResourceInput {
            unit_id,
            title: row.title,
            resource_type,
            link: Some(row.link),
            preview_link: None,
            download_link: None,
            file_url: None,
            category: None,
        };
        insert_resource(&mut *transaction, &input, Some(admin.id))
            .await
            .map_err(db_failure)?;
        summary.resources_created += 1;
    }

    transaction.commit().await.map_err(db_failure)?;

    summary.skipped.sort_by_key(|issue| issue.row);
    info!(
        admin = %admin.username,
        grades = summary.grades_created,
        units = summary.units_created,
        resources = summary.resources_created,
        skipped = summary.skipped.len(),
        "resource catalog imported"
    );
    Ok(Json(summary))
}

async fn find_or_create_grade(
    transaction: &mut Transaction<'_, Postgres>,
    title: &str,
    category: &str,
) -> sqlx::Result<(Uuid, bool)> {
    let existing: Option<Uuid> = sqlx::query_scalar(
        "SELECT id FROM grades WHERE LOWER(title) = LOWER($1) AND LOWER(category) = LOWER($2)",
    )
    .bind(title)
    .bind(category)
    .fetch_optional(&mut **transaction)
    .await?;
    if let Some(id) = existing {
        return Ok((id, false));
    }

    let id = Uuid::new_v4();
    sqlx::query(
        "INSERT INTO grades (id, title, category, position) \
         VALUES ($1, $2, $3, (SELECT COALESCE(MAX(position) + 1, 0) FROM grades WHERE LOWER(category) = LOWER($3)))",
    )
    .bind(id)
    .bind(title)
    .bind(category)
    .execute(&mut **transaction)
    .await?;
    Ok((id, true))
}

async fn find_or_create_unit(
    transaction: &mut Transaction<'_, Postgres>,
    grade_id: Uuid,
    title: &str,
) -> sqlx::Result<(Uuid, bool)> {
    let existing: Option<Uuid> = sqlx::query_scalar(
        "SELECT id FROM units WHERE grade_id = $1 AND LOWER(title) = LOWER($2)",
    )
    .bind(grade_id)
    .bind(title)
    .fetch_optional(&mut **transaction)
    .await?;
    if let Some(id) = existing {
        return Ok((id, false));
    }

    let id = Uuid::new_v4();
    sqlx::query(
        "INSERT INTO units (id, grade_id, title, position) \
         VALUES ($1, $2, $3, (SELECT COALESCE(MAX(position) + 1, 0) FROM units WHERE grade_id = $2))",
    )
    .bind(id)
    .bind(grade_id)
    .bind(title)
    .execute(&mut **transaction)
    .await?;
    Ok((id, true))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_xlsxwriter::Workbook;
    use tempfile::tempdir;

    fn workbook_bytes(rows: &[&[&str]]) -> Vec<u8> {
        let dir = tempdir().unwrap();
        let path = dir.path().join("catalog.xlsx");

        let mut workbook = Workbook::new();
        let worksheet = workbook.add_worksheet();
        for (row_idx, row) in rows.iter().enumerate() {
            for (col_idx, value) in row.iter().enumerate() {
                if !value.is_empty() {
                    worksheet
                        .write_string(row_idx as u32, col_idx as u16, *value)
                        .unwrap();
                }
            }
        }
        workbook.save(&path).unwrap();

        std::fs::read(&path).unwrap()
    }

    #[test]
    fn parses_rows_and_reports_invalid_ones() {
        let bytes = workbook_bytes(&[
            &["Grade", "Category", "Unit", "Title", "Type", "Link"],
            &["Grade 5", "Primary", "Fractions", "Intro video", "", "https://youtu.be/abc123"],
            &["Grade 5", "", "Fractions", "Worksheet", "pdf", "/files/resources/ws.pdf"],
            &["", "", "", "", "", ""],
            &["Grade 6", "Primary", "Decimals", "", "", "https://example.com/x"],
            &["Grade 6", "Primary", "Decimals", "Bad link", "", "ftp://example.com/x"],
        ]);

        let parsed = parse_import_sheet(&bytes).unwrap();

        assert_eq!(parsed.rows.len(), 2);
        assert_eq!(
            parsed.rows[0],
            ImportRow {
                row: 2,
                grade: "Grade 5".into(),
                category: "Primary".into(),
                unit: "Fractions".into(),
                title: "Intro video".into(),
                resource_type: None,
                link: "https://youtu.be/abc123".into(),
            }
        );
        assert_eq!(parsed.rows[1].category, DEFAULT_CATEGORY);
        assert_eq!(parsed.rows[1].resource_type.as_deref(), Some("pdf"));

        assert_eq!(
            parsed.issues,
            vec![
                RowIssue {
                    row: 5,
                    message: "Title is required.".into(),
                },
                RowIssue {
                    row: 6,
                    message: "Links must be http(s) URLs or /files/ paths.".into(),
                },
            ]
        );
    }

    #[test]
    fn header_aliases_and_missing_columns() {
        let bytes = workbook_bytes(&[
            &["grade", "unit", "title", "URL"],
            &["Grade 1", "Letters", "Alphabet song", "https://vimeo.com/123"],
        ]);
        let parsed = parse_import_sheet(&bytes).unwrap();
        assert_eq!(parsed.rows.len(), 1);
        assert_eq!(parsed.rows[0].link, "https://vimeo.com/123");

        let bytes = workbook_bytes(&[&["grade", "unit", "title"]]);
        let err = parse_import_sheet(&bytes).unwrap_err();
        assert!(err.to_string().contains("`link`"), "{err}");
    }

    #[test]
    fn rejects_non_workbooks() {
        assert!(parse_import_sheet(b"not a zip").is_err());
    }
}
