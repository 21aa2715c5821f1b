use std::borrow::Cow;

use chrono::{Datelike, Utc};

use crate::{
    config::SiteSettings,
    preview::{Viewer, ViewerMode},
};

const PAGE_BASE_STYLES: &str = r#"
        :root { color-scheme: light; }
        body { font-family: "Helvetica Neue", Arial, sans-serif; margin: 0; background: #f8fafc; color: #0f172a; min-height: 100vh; display: flex; flex-direction: column; }
        header { background: #ffffff; padding: clamp(1.75rem, 4vw, 2.5rem) clamp(1.25rem, 6vw, 3rem); border-bottom: 1px solid #e2e8f0; }
        header h1 { margin: 0; font-size: clamp(1.7rem, 3vw, 2.3rem); }
        header h1 a { color: inherit; text-decoration: none; }
        header p.tagline { margin: 0.5rem 0 0; color: #64748b; }
        nav.breadcrumbs { margin-top: 0.9rem; font-size: 0.92rem; color: #64748b; }
        nav.breadcrumbs a { color: #1d4ed8; text-decoration: none; font-weight: 600; }
        nav.breadcrumbs a:hover { text-decoration: underline; }
        main { flex: 1; padding: clamp(1.5rem, 4vw, 2.75rem); max-width: 1100px; margin: 0 auto; width: 100%; box-sizing: border-box; }
        section { margin-bottom: 2.5rem; }
        section > h2 { margin: 0 0 1rem; font-size: 1.35rem; }
        .panel { background: #ffffff; border-radius: 12px; border: 1px solid #e2e8f0; padding: 1.5rem; box-shadow: 0 18px 40px rgba(15, 23, 42, 0.08); }
        .card-grid { display: grid; gap: 1.25rem; grid-template-columns: repeat(auto-fit, minmax(220px, 1fr)); }
        .card { display: block; background: #ffffff; padding: 1.4rem; border-radius: 14px; text-decoration: none; color: inherit; border: 1px solid #e2e8f0; box-shadow: 0 12px 30px rgba(15, 23, 42, 0.06); transition: transform 0.15s ease, border 0.15s ease; }
        a.card:hover { transform: translateY(-3px); border-color: #bfdbfe; }
        .card h3 { margin: 0 0 0.5rem; font-size: 1.1rem; }
        .card p { margin: 0; color: #475569; font-size: 0.95rem; line-height: 1.55; }
        .muted { color: #64748b; font-size: 0.9rem; }
        .tag { display: inline-flex; align-items: center; padding: 0.2rem 0.65rem; border-radius: 999px; font-size: 0.8rem; font-weight: 600; background: #e0f2fe; color: #1d4ed8; }
        .announcement { border-left: 4px solid #2563eb; padding: 0.9rem 1.2rem; background: #ffffff; border-radius: 10px; margin-bottom: 1rem; border: 1px solid #e2e8f0; }
        .announcement h3 { margin: 0 0 0.35rem; }
        .announcement p { margin: 0.5rem 0 0; white-space: pre-line; line-height: 1.6; }
        .resource-list { list-style: none; margin: 0; padding: 0; }
        .resource-list li { display: flex; justify-content: space-between; align-items: center; gap: 1rem; padding: 0.75rem 0; border-bottom: 1px solid #e2e8f0; }
        .resource-list li:last-child { border-bottom: none; }
        .resource-list a { color: #0f172a; font-weight: 600; text-decoration: none; }
        .resource-list a:hover { color: #1d4ed8; }
        .member img { width: 72px; height: 72px; border-radius: 50%; object-fit: cover; margin-bottom: 0.75rem; }
        dl.contact { display: grid; grid-template-columns: max-content 1fr; gap: 0.5rem 1.25rem; margin: 0; }
        dl.contact dt { font-weight: 600; }
        dl.contact dd { margin: 0; white-space: pre-line; }
        .viewer-stage { background: #0f172a; border-radius: 12px; overflow: hidden; min-height: 320px; display: flex; align-items: center; justify-content: center; }
        .viewer-stage iframe { width: 100%; height: 75vh; border: 0; background: #ffffff; }
        .viewer-stage img { max-width: 100%; max-height: 75vh; display: block; }
        .viewer-stage video { width: 100%; max-height: 75vh; }
        .viewer-stage audio { width: 90%; margin: 3rem auto; }
        .viewer-options { display: flex; flex-wrap: wrap; gap: 0.75rem; margin-top: 1rem; align-items: center; }
        .viewer-options button { padding: 0.55rem 1rem; border-radius: 999px; border: 1px solid #bfdbfe; background: #e0f2fe; color: #1d4ed8; font-weight: 600; cursor: pointer; }
        .viewer-options button.active { background: #2563eb; border-color: #2563eb; color: #ffffff; }
        .download-link { display: inline-flex; padding: 0.55rem 1.1rem; border-radius: 999px; background: #16a34a; color: #ffffff; font-weight: 600; text-decoration: none; }
        .download-link:hover { background: #15803d; }
        .empty { color: #94a3b8; font-style: italic; }
        .app-footer { margin-top: 3rem; padding: 1.5rem; text-align: center; font-size: 0.85rem; color: #94a3b8; }
        @media (max-width: 768px) {
            .resource-list li { flex-direction: column; align-items: flex-start; }
            .viewer-stage iframe { height: 60vh; }
        }
"#;

const VIEWER_SWITCH_SCRIPT: &str = r#"<script>
document.querySelectorAll('[data-viewer-target]').forEach(function (button) {
    button.addEventListener('click', function () {
        var template = document.getElementById(button.getAttribute('data-viewer-target'));
        var stage = document.getElementById('viewer-stage');
        if (!template || !stage) { return; }
        stage.innerHTML = template.innerHTML;
        document.querySelectorAll('[data-viewer-target]').forEach(function (other) {
            other.classList.toggle('active', other === button);
        });
    });
});
</script>"#;

pub struct PageLayout<'a> {
    pub settings: &'a SiteSettings,
    pub meta_title: Cow<'a, str>,
    pub breadcrumbs: Vec<(String, Option<String>)>,
    pub body_html: Cow<'a, str>,
    pub body_scripts: Vec<Cow<'a, str>>,
}

pub fn render_page(layout: PageLayout<'_>) -> String {
    let PageLayout {
        settings,
        meta_title,
        breadcrumbs,
        body_html,
        body_scripts,
    } = layout;

    let site_title = escape_html(&settings.site_title);
    let tagline_html = if settings.tagline.is_empty() {
        String::new()
    } else {
        format!(
            r#"<p class="tagline">{}</p>"#,
            escape_html(&settings.tagline)
        )
    };

    let breadcrumbs_html = if breadcrumbs.is_empty() {
        String::new()
    } else {
        let trail = std::iter::once(r#"<a href="/">Home</a>"#.to_string())
            .chain(breadcrumbs.iter().map(|(label, href)| match href {
                Some(href) => format!(
                    r#"<a href="{href}">{label}</a>"#,
                    href = escape_html(href),
                    label = escape_html(label)
                ),
                None => escape_html(label),
            }))
            .collect::<Vec<_>>()
            .join(" / ");
        format!(r#"<nav class="breadcrumbs">{trail}</nav>"#)
    };

    let page_title = if meta_title.is_empty() {
        site_title.clone()
    } else {
        format!("{} · {site_title}", escape_html(&meta_title))
    };

    let scripts = body_scripts
        .into_iter()
        .map(|script| script.into_owned())
        .collect::<Vec<_>>()
        .join("\n");
    let footer = render_footer(settings);

    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <title>{page_title}</title>
    <meta name="viewport" content="width=device-width, initial-scale=1">
    <style>
{styles}
    </style>
</head>
<body>
    <header>
        <h1><a href="/">{site_title}</a></h1>
        {tagline_html}
        {breadcrumbs_html}
    </header>
    <main>
{body_html}
    </main>
    {footer}
{scripts}
</body>
</html>"#,
        styles = PAGE_BASE_STYLES,
    )
}

pub fn render_footer(settings: &SiteSettings) -> String {
    let current_year = Utc::now().year();
    let text = if settings.footer_text.is_empty() {
        escape_html(&settings.site_title)
    } else {
        escape_html(&settings.footer_text)
    };
    format!(
        r#"<footer class="app-footer">© {year} {text}</footer>"#,
        year = current_year
    )
}

/// Markup for one viewer. Frames are sandboxed loosely enough for hosted players to run.
pub fn render_viewer(viewer: &Viewer, title: &str) -> String {
    let src = escape_html(&viewer.src);
    let title = escape_html(title);
    match viewer.mode {
        ViewerMode::Image => format!(r#"<img src="{src}" alt="{title}">"#),
        ViewerMode::Video => format!(
            r#"<video src="{src}" controls preload="metadata">Your browser cannot play this video.</video>"#
        ),
        ViewerMode::Audio => format!(
            r#"<audio src="{src}" controls preload="metadata">Your browser cannot play this audio.</audio>"#
        ),
        ViewerMode::Frame => format!(
            r#"<iframe src="{src}" title="{title}" loading="lazy" referrerpolicy="no-referrer-when-downgrade" allow="autoplay; encrypted-media; fullscreen; picture-in-picture" allowfullscreen></iframe>"#
        ),
        ViewerMode::Download => format!(
            r#"<a class="download-link" href="{src}" target="_blank" rel="noopener">Download</a>"#
        ),
    }
}

/// The embedded primary viewer, switch buttons for the alternatives, and the download link.
pub fn render_viewer_chain(viewers: &[Viewer], title: &str) -> (String, Option<Cow<'static, str>>) {
    let embeddable: Vec<&Viewer> = viewers
        .iter()
        .filter(|viewer| viewer.mode != ViewerMode::Download)
        .collect();
    let download = viewers
        .iter()
        .find(|viewer| viewer.mode == ViewerMode::Download)
        .map(|viewer| render_viewer(viewer, title))
        .unwrap_or_default();

    let Some(primary) = embeddable.first() else {
        return (
            format!(
                r#"<div class="panel"><p class="empty">No inline preview is available for this resource.</p><div class="viewer-options">{download}</div></div>"#
            ),
            None,
        );
    };

    let templates = embeddable
        .iter()
        .enumerate()
        .map(|(index, viewer)| {
            format!(
                r#"<template id="viewer-{index}">{}</template>"#,
                render_viewer(viewer, title)
            )
        })
        .collect::<String>();

    let buttons = if embeddable.len() > 1 {
        embeddable
            .iter()
            .enumerate()
            .map(|(index, viewer)| {
                format!(
                    r#"<button type="button" data-viewer-target="viewer-{index}"{active}>{label}</button>"#,
                    active = if index == 0 { r#" class="active""# } else { "" },
                    label = escape_html(viewer.label),
                )
            })
            .collect::<String>()
    } else {
        String::new()
    };

    let html = format!(
        r#"<div id="viewer-stage" class="viewer-stage">{primary}</div>
        <div class="viewer-options"><span class="muted">Not loading? Try:</span>{buttons}{download}</div>
        {templates}"#,
        primary = render_viewer(primary, title),
    );

    let script = (embeddable.len() > 1).then_some(Cow::Borrowed(VIEWER_SWITCH_SCRIPT));
    (html, script)
}

pub fn escape_html(input: &str) -> String {
    input
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::preview::plan_preview;

    #[test]
    fn escapes_markup() {
        assert_eq!(
            escape_html(r#"<a href="x">Tom & Jerry's</a>"#),
            "&lt;a href=&quot;x&quot;&gt;Tom &amp; Jerry&#39;s&lt;/a&gt;"
        );
    }

    #[test]
    fn footer_uses_settings() {
        let settings = SiteSettings {
            footer_text: "Maple <School>".into(),
            ..SiteSettings::default()
        };
        let footer = render_footer(&settings);
        assert!(footer.contains("Maple &lt;School&gt;"));
        assert!(footer.contains(&Utc::now().year().to_string()));
    }

    #[test]
    fn viewer_chain_embeds_first_viewer_and_lists_alternatives() {
        let plan = plan_preview(
            "https://example.com/slides.pptx",
            None,
            None,
            None,
        );
        let (html, script) = render_viewer_chain(&plan.viewers, "Slides");

        assert!(html.starts_with(r#"<div id="viewer-stage" class="viewer-stage"><iframe src="https://view.officeapps.live.com"#));
        assert!(html.contains("Google Viewer"));
        assert!(html.contains(r#"class="download-link" href="https://example.com/slides.pptx""#));
        assert!(script.is_some());
    }

    #[test]
    fn image_viewer_is_escaped() {
        let viewer = Viewer {
            mode: ViewerMode::Image,
            src: "/files/team/a\"b.png".into(),
            label: "Image",
        };
        assert_eq!(
            render_viewer(&viewer, "<x>"),
            r#"<img src="/files/team/a&quot;b.png" alt="&lt;x&gt;">"#
        );
    }

    #[test]
    fn page_includes_breadcrumbs_and_title() {
        let settings = SiteSettings::default();
        let html = render_page(PageLayout {
            settings: &settings,
            meta_title: Cow::Borrowed("Grade 5"),
            breadcrumbs: vec![("Grade 5".into(), None)],
            body_html: Cow::Borrowed("<p>body</p>"),
            body_scripts: Vec::new(),
        });
        assert!(html.contains("<title>Grade 5 · Curriculum Portal</title>"));
        assert!(html.contains(r#"<a href="/">Home</a> / Grade 5"#));
        assert!(html.contains("<p>body</p>"));
    }
}
