use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Clone, Debug, Serialize, FromRow)]
pub struct GradeRow {
    pub id: Uuid,
    pub title: String,
    pub category: String,
    pub position: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Clone, Debug, Serialize, FromRow)]
pub struct UnitRow {
    pub id: Uuid,
    pub grade_id: Uuid,
    pub title: String,
    pub position: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Clone, Debug, Serialize, FromRow)]
pub struct ResourceRow {
    pub id: Uuid,
    pub unit_id: Uuid,
    pub title: String,
    pub resource_type: String,
    pub link: Option<String>,
    pub preview_link: Option<String>,
    pub download_link: Option<String>,
    pub file_url: Option<String>,
    pub category: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ResourceRow {
    /// The link the preview page should render, by precedence.
    pub fn display_link(&self) -> Option<&str> {
        [
            &self.preview_link,
            &self.file_url,
            &self.link,
            &self.download_link,
        ]
        .into_iter()
        .flatten()
        .map(String::as_str)
        .find(|link| !link.trim().is_empty())
    }

    /// Explicit download link, falling back to the stored file.
    pub fn download_target(&self) -> Option<&str> {
        [&self.download_link, &self.file_url]
            .into_iter()
            .flatten()
            .map(String::as_str)
            .find(|link| !link.trim().is_empty())
    }
}

#[derive(Clone, Debug, Serialize, FromRow)]
pub struct DocumentRow {
    pub id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub category: Option<String>,
    pub file_url: String,
    pub original_name: String,
    pub file_size: i64,
    pub content_type: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Clone, Debug, Serialize, FromRow)]
pub struct TeamMemberRow {
    pub id: Uuid,
    pub name: String,
    pub role: String,
    pub bio: Option<String>,
    pub email: Option<String>,
    pub photo_url: Option<String>,
    pub position: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Clone, Debug, Serialize, FromRow)]
pub struct AnnouncementRow {
    pub id: Uuid,
    pub title: String,
    pub body: String,
    pub is_published: bool,
    pub published_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Clone, Debug, Default, Serialize, FromRow)]
pub struct ContactInfoRow {
    pub email: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub office_hours: Option<String>,
    pub website: Option<String>,
    pub facebook: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resource() -> ResourceRow {
        ResourceRow {
            id: Uuid::new_v4(),
            unit_id: Uuid::new_v4(),
            title: "Fractions worksheet".into(),
            resource_type: "pdf".into(),
            link: None,
            preview_link: None,
            download_link: None,
            file_url: None,
            category: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn display_link_follows_precedence() {
        let mut row = resource();
        assert_eq!(row.display_link(), None);

        row.download_link = Some("https://example.com/d.pdf".into());
        assert_eq!(row.display_link(), Some("https://example.com/d.pdf"));

        row.link = Some("https://example.com/l.pdf".into());
        assert_eq!(row.display_link(), Some("https://example.com/l.pdf"));

        row.file_url = Some("/files/resources/f.pdf".into());
        assert_eq!(row.display_link(), Some("/files/resources/f.pdf"));

        row.preview_link = Some("  ".into());
        assert_eq!(row.display_link(), Some("/files/resources/f.pdf"));

        row.preview_link = Some("https://example.com/p".into());
        assert_eq!(row.display_link(), Some("https://example.com/p"));
    }

    #[test]
    fn download_target_prefers_explicit_link() {
        let mut row = resource();
        row.file_url = Some("/files/resources/f.pdf".into());
        assert_eq!(row.download_target(), Some("/files/resources/f.pdf"));
        row.download_link = Some("https://example.com/d.pdf".into());
        assert_eq!(row.download_target(), Some("https://example.com/d.pdf"));
    }
}
