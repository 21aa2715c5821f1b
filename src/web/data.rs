use sqlx::PgPool;
use uuid::Uuid;

use super::models::{
    AnnouncementRow, ContactInfoRow, DocumentRow, GradeRow, ResourceRow, TeamMemberRow, UnitRow,
};

const GRADE_COLUMNS: &str = "id, title, category, position, created_at, updated_at";
const UNIT_COLUMNS: &str = "id, grade_id, title, position, created_at, updated_at";
const RESOURCE_COLUMNS: &str = "id, unit_id, title, resource_type, link, preview_link, download_link, file_url, category, created_at, updated_at";
const DOCUMENT_COLUMNS: &str = "id, title, description, category, file_url, original_name, file_size, content_type, created_at, updated_at";
const TEAM_COLUMNS: &str =
    "id, name, role, bio, email, photo_url, position, created_at, updated_at";
const ANNOUNCEMENT_COLUMNS: &str =
    "id, title, body, is_published, published_at, created_at, updated_at";

pub async fn fetch_grades(pool: &PgPool, category: Option<&str>) -> sqlx::Result<Vec<GradeRow>> {
    sqlx::query_as::<_, GradeRow>(&format!(
        "SELECT {GRADE_COLUMNS} FROM grades WHERE ($1::TEXT IS NULL OR LOWER(category) = LOWER($1)) ORDER BY LOWER(category), position, title"
    ))
    .bind(category)
    .fetch_all(pool)
    .await
}

pub async fn fetch_grade(pool: &PgPool, id: Uuid) -> sqlx::Result<Option<GradeRow>> {
    sqlx::query_as::<_, GradeRow>(&format!("SELECT {GRADE_COLUMNS} FROM grades WHERE id = $1"))
        .bind(id)
        .fetch_optional(pool)
        .await
}

pub async fn fetch_units_for_grade(pool: &PgPool, grade_id: Uuid) -> sqlx::Result<Vec<UnitRow>> {
    sqlx::query_as::<_, UnitRow>(&format!(
        "SELECT {UNIT_COLUMNS} FROM units WHERE grade_id = $1 ORDER BY position, title"
    ))
    .bind(grade_id)
    .fetch_all(pool)
    .await
}

pub async fn fetch_unit(pool: &PgPool, id: Uuid) -> sqlx::Result<Option<UnitRow>> {
    sqlx::query_as::<_, UnitRow>(&format!("SELECT {UNIT_COLUMNS} FROM units WHERE id = $1"))
        .bind(id)
        .fetch_optional(pool)
        .await
}

pub async fn fetch_resources_for_unit(
    pool: &PgPool,
    unit_id: Uuid,
) -> sqlx::Result<Vec<ResourceRow>> {
    sqlx::query_as::<_, ResourceRow>(&format!(
        "SELECT {RESOURCE_COLUMNS} FROM resources WHERE unit_id = $1 ORDER BY created_at, title"
    ))
    .bind(unit_id)
    .fetch_all(pool)
    .await
}

/// Every resource under a grade, in unit order, for pages that render the whole grade at once.
pub async fn fetch_resources_for_grade(
    pool: &PgPool,
    grade_id: Uuid,
) -> sqlx::Result<Vec<ResourceRow>> {
    sqlx::query_as::<_, ResourceRow>(
        "SELECT r.id, r.unit_id, r.title, r.resource_type, r.link, r.preview_link, r.download_link, r.file_url, r.category, r.created_at, r.updated_at \
         FROM resources r JOIN units u ON u.id = r.unit_id \
         WHERE u.grade_id = $1 ORDER BY u.position, u.title, r.created_at, r.title",
    )
    .bind(grade_id)
    .fetch_all(pool)
    .await
}

pub async fn fetch_resource(pool: &PgPool, id: Uuid) -> sqlx::Result<Option<ResourceRow>> {
    sqlx::query_as::<_, ResourceRow>(&format!(
        "SELECT {RESOURCE_COLUMNS} FROM resources WHERE id = $1"
    ))
    .bind(id)
    .fetch_optional(pool)
    .await
}

pub async fn fetch_all_resources(pool: &PgPool) -> sqlx::Result<Vec<ResourceRow>> {
    sqlx::query_as::<_, ResourceRow>(&format!(
        "SELECT {RESOURCE_COLUMNS} FROM resources ORDER BY created_at"
    ))
    .fetch_all(pool)
    .await
}

pub async fn fetch_documents(
    pool: &PgPool,
    category: Option<&str>,
) -> sqlx::Result<Vec<DocumentRow>> {
    sqlx::query_as::<_, DocumentRow>(&format!(
        "SELECT {DOCUMENT_COLUMNS} FROM documents WHERE ($1::TEXT IS NULL OR LOWER(category) = LOWER($1)) ORDER BY created_at DESC"
    ))
    .bind(category)
    .fetch_all(pool)
    .await
}

pub async fn fetch_document(pool: &PgPool, id: Uuid) -> sqlx::Result<Option<DocumentRow>> {
    sqlx::query_as::<_, DocumentRow>(&format!(
        "SELECT {DOCUMENT_COLUMNS} FROM documents WHERE id = $1"
    ))
    .bind(id)
    .fetch_optional(pool)
    .await
}

pub async fn fetch_team_members(pool: &PgPool) -> sqlx::Result<Vec<TeamMemberRow>> {
    sqlx::query_as::<_, TeamMemberRow>(&format!(
        "SELECT {TEAM_COLUMNS} FROM team_members ORDER BY position, name"
    ))
    .fetch_all(pool)
    .await
}

pub async fn fetch_team_member(pool: &PgPool, id: Uuid) -> sqlx::Result<Option<TeamMemberRow>> {
    sqlx::query_as::<_, TeamMemberRow>(&format!(
        "SELECT {TEAM_COLUMNS} FROM team_members WHERE id = $1"
    ))
    .bind(id)
    .fetch_optional(pool)
    .await
}

pub async fn fetch_published_announcements(pool: &PgPool) -> sqlx::Result<Vec<AnnouncementRow>> {
    sqlx::query_as::<_, AnnouncementRow>(&format!(
        "SELECT {ANNOUNCEMENT_COLUMNS} FROM announcements WHERE is_published ORDER BY published_at DESC NULLS LAST, created_at DESC"
    ))
    .fetch_all(pool)
    .await
}

pub async fn fetch_all_announcements(pool: &PgPool) -> sqlx::Result<Vec<AnnouncementRow>> {
    sqlx::query_as::<_, AnnouncementRow>(&format!(
        "SELECT {ANNOUNCEMENT_COLUMNS} FROM announcements ORDER BY created_at DESC"
    ))
    .fetch_all(pool)
    .await
}

pub async fn fetch_announcement(pool: &PgPool, id: Uuid) -> sqlx::Result<Option<AnnouncementRow>> {
    sqlx::query_as::<_, AnnouncementRow>(&format!(
        "SELECT {ANNOUNCEMENT_COLUMNS} FROM announcements WHERE id = $1"
    ))
    .bind(id)
    .fetch_optional(pool)
    .await
}

/// The singleton contact row, or all-empty fields before anything was saved.
pub async fn fetch_contact_info(pool: &PgPool) -> sqlx::Result<ContactInfoRow> {
    let row = sqlx::query_as::<_, ContactInfoRow>(
        "SELECT email, phone, address, office_hours, website, facebook FROM contact_info WHERE id = 1",
    )
    .fetch_optional(pool)
    .await?;
    Ok(row.unwrap_or_default())
}

/// Every column that may hold a `/files/...` URL.
const STORED_FILE_REFERENCES: &str = "SELECT file_url AS url FROM resources \
     UNION SELECT link FROM resources \
     UNION SELECT preview_link FROM resources \
     UNION SELECT download_link FROM resources \
     UNION SELECT file_url FROM documents \
     UNION SELECT photo_url FROM team_members";

/// All local file URLs that any row still points at.
pub async fn fetch_referenced_file_urls(pool: &PgPool) -> sqlx::Result<Vec<String>> {
    sqlx::query_scalar(&format!(
        "SELECT url FROM ({STORED_FILE_REFERENCES}) refs WHERE url LIKE '/files/%'"
    ))
    .fetch_all(pool)
    .await
}

/// The subset of `urls` that some row still points at.
pub async fn fetch_still_referenced(pool: &PgPool, urls: &[String]) -> sqlx::Result<Vec<String>> {
    sqlx::query_scalar(&format!(
        "SELECT url FROM ({STORED_FILE_REFERENCES}) refs WHERE url = ANY($1)"
    ))
    .bind(urls)
    .fetch_all(pool)
    .await
}
