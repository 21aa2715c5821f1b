use std::borrow::Cow;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Html,
};
use tracing::error;
use uuid::Uuid;

use crate::{
    config::SiteSettings,
    modules::resources::preview_for,
    preview::{FileKind, classify},
    web::{
        AnnouncementRow, AppState, ContactInfoRow, DocumentRow, GradeRow, ResourceRow,
        TeamMemberRow, UnitRow, data,
        templates::{PageLayout, escape_html, render_page, render_viewer_chain},
    },
};

pub type PageFailure = (StatusCode, Html<String>);

fn page_error(settings: &SiteSettings, status: StatusCode, message: &str) -> PageFailure {
    let body = format!(
        r#"<section class="panel"><h2>{}</h2><p>{}</p><p><a href="/">Back to the dashboard</a></p></section>"#,
        status.canonical_reason().unwrap_or("Error"),
        escape_html(message)
    );
    let html = render_page(PageLayout {
        settings,
        meta_title: Cow::Borrowed(status.canonical_reason().unwrap_or("Error")),
        breadcrumbs: Vec::new(),
        body_html: Cow::Owned(body),
        body_scripts: Vec::new(),
    });
    (status, Html(html))
}

fn db_page_error(settings: &SiteSettings, err: sqlx::Error, context: &str) -> PageFailure {
    error!(?err, context, "failed to load public page data");
    page_error(
        settings,
        StatusCode::INTERNAL_SERVER_ERROR,
        "The page could not be loaded, please try again later.",
    )
}

/// `GET /`: announcements, grades by category, documents, team and contact details.
pub async fn home_page(State(state): State<AppState>) -> Result<Html<String>, PageFailure> {
    let settings = state.site_settings().await;
    let pool = state.pool_ref();

    let announcements = data::fetch_published_announcements(pool)
        .await
        .map_err(|err| db_page_error(&settings, err, "announcements"))?;
    let grades = data::fetch_grades(pool, None)
        .await
        .map_err(|err| db_page_error(&settings, err, "grades"))?;
    let documents = data::fetch_documents(pool, None)
        .await
        .map_err(|err| db_page_error(&settings, err, "documents"))?;
    let team = data::fetch_team_members(pool)
        .await
        .map_err(|err| db_page_error(&settings, err, "team"))?;
    let contact = data::fetch_contact_info(pool)
        .await
        .map_err(|err| db_page_error(&settings, err, "contact"))?;

    let body = [
        render_announcements(&announcements),
        render_grade_groups(&grades),
        render_documents(&documents),
        render_team(&team),
        render_contact(&contact),
    ]
    .concat();

    Ok(Html(render_page(PageLayout {
        settings: &settings,
        meta_title: Cow::Borrowed(""),
        breadcrumbs: Vec::new(),
        body_html: Cow::Owned(body),
        body_scripts: Vec::new(),
    })))
}

/// `GET /grades/:id`: every unit of the grade with its resources.
pub async fn grade_page(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Html<String>, PageFailure> {
    let settings = state.site_settings().await;
    let pool = state.pool_ref();

    let grade = data::fetch_grade(pool, id)
        .await
        .map_err(|err| db_page_error(&settings, err, "grade"))?
        .ok_or_else(|| page_error(&settings, StatusCode::NOT_FOUND, "This grade does not exist."))?;
    let units = data::fetch_units_for_grade(pool, id)
        .await
        .map_err(|err| db_page_error(&settings, err, "units"))?;
    let resources = data::fetch_resources_for_grade(pool, id)
        .await
        .map_err(|err| db_page_error(&settings, err, "resources"))?;

    let body = render_units(&units, &resources);

    Ok(Html(render_page(PageLayout {
        settings: &settings,
        meta_title: Cow::Owned(grade.title.clone()),
        breadcrumbs: vec![(format!("{} ({})", grade.title, grade.category), None)],
        body_html: Cow::Owned(body),
        body_scripts: Vec::new(),
    })))
}

/// `GET /resources/:id`: the universal preview page.
pub async fn resource_page(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Html<String>, PageFailure> {
    let settings = state.site_settings().await;
    let pool = state.pool_ref();

    let resource = data::fetch_resource(pool, id)
        .await
        .map_err(|err| db_page_error(&settings, err, "resource"))?
        .ok_or_else(|| {
            page_error(&settings, StatusCode::NOT_FOUND, "This resource does not exist.")
        })?;

    let unit = data::fetch_unit(pool, resource.unit_id)
        .await
        .map_err(|err| db_page_error(&settings, err, "unit"))?;
    let grade = match &unit {
        Some(unit) => data::fetch_grade(pool, unit.grade_id)
            .await
            .map_err(|err| db_page_error(&settings, err, "grade"))?,
        None => None,
    };

    let mut breadcrumbs = Vec::new();
    if let Some(grade) = &grade {
        breadcrumbs.push((grade.title.clone(), Some(format!("/grades/{}", grade.id))));
    }
    if let Some(unit) = &unit {
        breadcrumbs.push((unit.title.clone(), None));
    }
    breadcrumbs.push((resource.title.clone(), None));

    let plan = preview_for(&resource, state.public_base_url());
    let kind = plan
        .as_ref()
        .map(|plan| plan.target.kind)
        .unwrap_or(FileKind::Unknown);

    let (viewer_html, script) = match &plan {
        Some(plan) => render_viewer_chain(&plan.viewers, &resource.title),
        None => (
            r#"<div class="panel"><p class="empty">This resource has no link yet.</p></div>"#
                .to_string(),
            None,
        ),
    };

    let body = format!(
        r#"<section>
            <h2>{title}</h2>
            <p><span class="tag">{kind}</span> <span class="muted">{resource_type}</span></p>
            {viewer_html}
        </section>"#,
        title = escape_html(&resource.title),
        kind = kind.label(),
        resource_type = escape_html(&resource.resource_type),
    );

    Ok(Html(render_page(PageLayout {
        settings: &settings,
        meta_title: Cow::Owned(resource.title.clone()),
        breadcrumbs,
        body_html: Cow::Owned(body),
        body_scripts: script.into_iter().collect(),
    })))
}

fn render_announcements(announcements: &[AnnouncementRow]) -> String {
    if announcements.is_empty() {
        return String::new();
    }
    let items = announcements
        .iter()
        .map(|announcement| {
            let date = announcement
                .published_at
                .unwrap_or(announcement.created_at)
                .format("%d %b %Y");
            format!(
                r#"<article class="announcement"><h3>{title}</h3><span class="muted">{date}</span><p>{body}</p></article>"#,
                title = escape_html(&announcement.title),
                body = escape_html(&announcement.body),
            )
        })
        .collect::<String>();
    format!(r#"<section><h2>Announcements</h2>{items}</section>"#)
}

/// Grades arrive ordered by category, so consecutive rows form each group.
fn group_by_category(grades: &[GradeRow]) -> Vec<(&str, Vec<&GradeRow>)> {
    let mut groups: Vec<(&str, Vec<&GradeRow>)> = Vec::new();
    for grade in grades {
        if let Some((category, members)) = groups.last_mut() {
            if category.eq_ignore_ascii_case(&grade.category) {
                members.push(grade);
                continue;
            }
        }
        groups.push((grade.category.as_str(), vec![grade]));
    }
    groups
}

fn render_grade_groups(grades: &[GradeRow]) -> String {
    if grades.is_empty() {
        return r#"<section><h2>Grades</h2><p class="empty">No grades have been published yet.</p></section>"#
            .to_string();
    }

    group_by_category(grades)
        .into_iter()
        .map(|(category, members)| {
            let cards = members
                .iter()
                .map(|grade| {
                    format!(
                        r#"<a class="card" href="/grades/{id}"><h3>{title}</h3><p>Browse units and resources →</p></a>"#,
                        id = grade.id,
                        title = escape_html(&grade.title),
                    )
                })
                .collect::<String>();
            format!(
                r#"<section><h2>{category}</h2><div class="card-grid">{cards}</div></section>"#,
                category = escape_html(category),
            )
        })
        .collect()
}

fn render_documents(documents: &[DocumentRow]) -> String {
    if documents.is_empty() {
        return String::new();
    }
    let items = documents
        .iter()
        .map(|document| {
            let category = document
                .category
                .as_deref()
                .map(|category| format!(r#" <span class="tag">{}</span>"#, escape_html(category)))
                .unwrap_or_default();
            format!(
                r#"<li><span><a href="{url}" target="_blank" rel="noopener">{title}</a>{category}</span><span class="muted">{size}</span></li>"#,
                url = escape_html(&document.file_url),
                title = escape_html(&document.title),
                size = format_size(document.file_size),
            )
        })
        .collect::<String>();
    format!(
        r#"<section><h2>Documents</h2><div class="panel"><ul class="resource-list">{items}</ul></div></section>"#
    )
}

fn render_team(team: &[TeamMemberRow]) -> String {
    if team.is_empty() {
        return String::new();
    }
    let cards = team
        .iter()
        .map(|member| {
            let photo = member
                .photo_url
                .as_deref()
                .map(|url| {
                    format!(
                        r#"<img src="{}" alt="{}">"#,
                        escape_html(url),
                        escape_html(&member.name)
                    )
                })
                .unwrap_or_default();
            let bio = member
                .bio
                .as_deref()
                .map(|bio| format!("<p>{}</p>", escape_html(bio)))
                .unwrap_or_default();
            let email = member
                .email
                .as_deref()
                .map(|email| {
                    let email = escape_html(email);
                    format!(r#"<p><a href="mailto:{email}">{email}</a></p>"#)
                })
                .unwrap_or_default();
            format!(
                r#"<div class="card member">{photo}<h3>{name}</h3><p class="muted">{role}</p>{bio}{email}</div>"#,
                name = escape_html(&member.name),
                role = escape_html(&member.role),
            )
        })
        .collect::<String>();
    format!(r#"<section><h2>Our team</h2><div class="card-grid">{cards}</div></section>"#)
}

fn render_contact(contact: &ContactInfoRow) -> String {
    let mut rows = String::new();
    let mut push = |label: &str, value: String| {
        rows.push_str(&format!("<dt>{label}</dt><dd>{value}</dd>"));
    };

    if let Some(email) = &contact.email {
        let email = escape_html(email);
        push("Email", format!(r#"<a href="mailto:{email}">{email}</a>"#));
    }
    if let Some(phone) = &contact.phone {
        push("Phone", escape_html(phone));
    }
    if let Some(address) = &contact.address {
        push("Address", escape_html(address));
    }
    if let Some(hours) = &contact.office_hours {
        push("Office hours", escape_html(hours));
    }
    for (label, link) in [("Website", &contact.website), ("Facebook", &contact.facebook)] {
        if let Some(link) = link {
            let link = escape_html(link);
            push(
                label,
                format!(r#"<a href="{link}" target="_blank" rel="noopener">{link}</a>"#),
            );
        }
    }

    if rows.is_empty() {
        return String::new();
    }
    format!(
        r#"<section><h2>Contact</h2><div class="panel"><dl class="contact">{rows}</dl></div></section>"#
    )
}

fn render_units(units: &[UnitRow], resources: &[ResourceRow]) -> String {
    if units.is_empty() {
        return r#"<section><p class="empty">No units have been added to this grade yet.</p></section>"#
            .to_string();
    }

    units
        .iter()
        .map(|unit| {
            let items = resources
                .iter()
                .filter(|resource| resource.unit_id == unit.id)
                .map(render_resource_item)
                .collect::<String>();
            let list = if items.is_empty() {
                r#"<p class="empty">No resources yet.</p>"#.to_string()
            } else {
                format!(r#"<ul class="resource-list">{items}</ul>"#)
            };
            format!(
                r#"<section><h2>{title}</h2><div class="panel">{list}</div></section>"#,
                title = escape_html(&unit.title),
            )
        })
        .collect()
}

fn render_resource_item(resource: &ResourceRow) -> String {
    let kind = resource
        .display_link()
        .map(|link| classify(link, Some(resource.resource_type.as_str())).kind)
        .unwrap_or(FileKind::Unknown);
    format!(
        r#"<li><a href="/resources/{id}">{title}</a><span class="tag">{kind}</span></li>"#,
        id = resource.id,
        title = escape_html(&resource.title),
        kind = kind.label(),
    )
}

fn format_size(bytes: i64) -> String {
    const KB: f64 = 1024.0;
    let bytes = bytes.max(0) as f64;
    if bytes < KB {
        format!("{bytes} B")
    } else if bytes < KB * KB {
        format!("{:.1} KB", bytes / KB)
    } else {
        format!("{:.1} MB", bytes / (KB * KB))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn grade(title: &str, category: &str) -> GradeRow {
        GradeRow {
            id: Uuid::new_v4(),
            title: title.into(),
            category: category.into(),
            position: 0,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn grades_group_by_consecutive_category() {
        let grades = vec![
            grade("Grade 1", "Primary"),
            grade("Grade 2", "primary"),
            grade("Grade 7", "Secondary"),
        ];
        let groups = group_by_category(&grades);
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].0, "Primary");
        assert_eq!(groups[0].1.len(), 2);
        assert_eq!(groups[1].0, "Secondary");
    }

    #[test]
    fn contact_section_is_omitted_when_empty() {
        assert_eq!(render_contact(&ContactInfoRow::default()), "");

        let contact = ContactInfoRow {
            phone: Some("+1 555 0100".into()),
            website: Some("https://school.example".into()),
            ..ContactInfoRow::default()
        };
        let html = render_contact(&contact);
        assert!(html.contains("<dt>Phone</dt><dd>+1 555 0100</dd>"));
        assert!(html.contains(r#"href="https://school.example""#));
    }

    #[test]
    fn sizes_are_human_readable() {
        assert_eq!(format_size(512), "512 B");
        assert_eq!(format_size(2048), "2.0 KB");
        assert_eq!(format_size(5 * 1024 * 1024), "5.0 MB");
    }

    #[test]
    fn announcement_markup_is_escaped() {
        let now = Utc::now();
        let html = render_announcements(&[AnnouncementRow {
            id: Uuid::new_v4(),
            title: "<b>Exams</b>".into(),
            body: "Bring pencils & erasers".into(),
            is_published: true,
            published_at: Some(now),
            created_at: now,
            updated_at: now,
        }]);
        assert!(html.contains("&lt;b&gt;Exams&lt;/b&gt;"));
        assert!(html.contains("pencils &amp; erasers"));
    }
}
