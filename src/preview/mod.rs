use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Serialize, Serializer};
use url::{Url, form_urlencoded};

static DRIVE_FILE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"/file/d/([A-Za-z0-9_-]+)").expect("invalid drive regex"));

static DOCS_EDIT_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^/(document|spreadsheets|presentation)/d/([A-Za-z0-9_-]+)/edit")
        .expect("invalid docs regex")
});

static MEDIA_ID_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9_-]+$").expect("invalid media id regex"));

const GOOGLE_VIEWER: &str = "https://docs.google.com/viewer";
const OFFICE_VIEWER: &str = "https://view.officeapps.live.com/op/embed.aspx";
const OFFICE_EXTENSIONS: &[&str] = &["ppt", "pptx", "doc", "docx", "xls", "xlsx"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FileKind {
    Pdf,
    Word,
    Excel,
    Powerpoint,
    Image,
    Video,
    Audio,
    Text,
    Unknown,
}

impl FileKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FileKind::Pdf => "pdf",
            FileKind::Word => "word",
            FileKind::Excel => "excel",
            FileKind::Powerpoint => "powerpoint",
            FileKind::Image => "image",
            FileKind::Video => "video",
            FileKind::Audio => "audio",
            FileKind::Text => "text",
            FileKind::Unknown => "unknown",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            FileKind::Pdf => "PDF document",
            FileKind::Word => "Word document",
            FileKind::Excel => "Spreadsheet",
            FileKind::Powerpoint => "Presentation",
            FileKind::Image => "Image",
            FileKind::Video => "Video",
            FileKind::Audio => "Audio",
            FileKind::Text => "Text",
            FileKind::Unknown => "File",
        }
    }

    pub fn is_office(&self) -> bool {
        matches!(self, FileKind::Word | FileKind::Excel | FileKind::Powerpoint)
    }
}

/// The rewrite rule that produced an [`EmbedTarget`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provider {
    GoogleDrive,
    GoogleDocs,
    OneDrive,
    PdfViewer,
    Office,
    YouTube,
    Vimeo,
    Dropbox,
    Direct,
}

impl Provider {
    pub fn as_str(&self) -> &'static str {
        match self {
            Provider::GoogleDrive => "google_drive",
            Provider::GoogleDocs => "google_docs",
            Provider::OneDrive => "onedrive",
            Provider::PdfViewer => "pdf_viewer",
            Provider::Office => "office",
            Provider::YouTube => "youtube",
            Provider::Vimeo => "vimeo",
            Provider::Dropbox => "dropbox",
            Provider::Direct => "direct",
        }
    }

    /// Providers whose embed URL is a hosted player or viewer page rather than the file itself.
    fn hosts_viewer(&self) -> bool {
        matches!(
            self,
            Provider::GoogleDrive
                | Provider::GoogleDocs
                | Provider::OneDrive
                | Provider::YouTube
                | Provider::Vimeo
        )
    }
}

impl Serialize for Provider {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EmbedTarget {
    pub kind: FileKind,
    pub provider: Provider,
    pub embed_url: String,
    pub rewritten: bool,
}

impl EmbedTarget {
    fn unchanged(kind: FileKind, provider: Provider, url: &str) -> Self {
        Self {
            kind,
            provider,
            embed_url: url.to_string(),
            rewritten: false,
        }
    }

    fn rewritten(kind: FileKind, provider: Provider, embed_url: String) -> Self {
        Self {
            kind,
            provider,
            embed_url,
            rewritten: true,
        }
    }
}

/// Decide how a resource link should be embedded. Rules are ordered and the first match wins.
pub fn classify(raw: &str, type_hint: Option<&str>) -> EmbedTarget {
    let input = raw.trim();
    let path = path_of(input);
    let fallback_kind = kind_from_extension(&path).or_else(|| type_hint.map(kind_from_hint));
    let fallback_kind = fallback_kind.unwrap_or(FileKind::Unknown);

    let Some(url) = parse_web_url(input) else {
        if OFFICE_EXTENSIONS.contains(&extension_of(&path).as_str()) {
            return EmbedTarget::unchanged(fallback_kind, Provider::Office, input);
        }
        return EmbedTarget::unchanged(fallback_kind, Provider::Direct, input);
    };
    let host = normalized_host(&url);

    if host == "drive.google.com" {
        if let Some(target) = rewrite_drive(input, &url, fallback_kind) {
            return target;
        }
    }

    if host == "docs.google.com" {
        if let Some(target) = rewrite_docs(&url) {
            return target;
        }
    }

    if is_onedrive_host(&host) {
        return rewrite_onedrive(input, &url, &host, type_hint);
    }

    let known_provider = is_media_host(&host) || is_dropbox_host(&host);
    let extension = extension_of(&path);

    if !known_provider && extension == "pdf" {
        let encoded: String = form_urlencoded::byte_serialize(input.as_bytes()).collect();
        return EmbedTarget::rewritten(
            FileKind::Pdf,
            Provider::PdfViewer,
            format!("{GOOGLE_VIEWER}?url={encoded}&embedded=true"),
        );
    }

    if !known_provider && OFFICE_EXTENSIONS.contains(&extension.as_str()) {
        return EmbedTarget::unchanged(fallback_kind, Provider::Office, input);
    }

    if host == "youtube.com" || host == "youtube-nocookie.com" || host == "youtu.be" {
        if let Some(target) = rewrite_youtube(input, &url, &host) {
            return target;
        }
    }

    if host == "vimeo.com" || host == "player.vimeo.com" {
        if let Some(target) = rewrite_vimeo(input, &url, &host) {
            return target;
        }
    }

    if is_dropbox_host(&host) {
        return rewrite_dropbox(input, &url, fallback_kind);
    }

    EmbedTarget::unchanged(fallback_kind, Provider::Direct, input)
}

fn rewrite_drive(input: &str, url: &Url, kind: FileKind) -> Option<EmbedTarget> {
    let path = url.path().trim_end_matches('/');
    if path.ends_with("/preview") {
        return Some(EmbedTarget::unchanged(kind, Provider::GoogleDrive, input));
    }

    let id = DRIVE_FILE_RE
        .captures(path)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
        .or_else(|| {
            if path == "/open" || path == "/uc" {
                query_value(url, "id")
            } else {
                None
            }
        })?;

    Some(EmbedTarget::rewritten(
        kind,
        Provider::GoogleDrive,
        format!("https://drive.google.com/file/d/{id}/preview"),
    ))
}

fn rewrite_docs(url: &Url) -> Option<EmbedTarget> {
    let caps = DOCS_EDIT_RE.captures(url.path())?;
    let family = caps.get(1)?.as_str();
    let id = caps.get(2)?.as_str();
    let kind = match family {
        "document" => FileKind::Word,
        "spreadsheets" => FileKind::Excel,
        _ => FileKind::Powerpoint,
    };

    Some(EmbedTarget::rewritten(
        kind,
        Provider::GoogleDocs,
        format!("https://docs.google.com/{family}/d/{id}/preview?embedded=true"),
    ))
}

fn rewrite_onedrive(input: &str, url: &Url, host: &str, type_hint: Option<&str>) -> EmbedTarget {
    let kind = sharepoint_kind(url.path())
        .or_else(|| kind_from_extension(url.path()))
        .or_else(|| type_hint.map(kind_from_hint))
        .unwrap_or(FileKind::Unknown);

    let mut rewritten = url.clone();
    let mut changed = false;

    if host != "1drv.ms" {
        let path = url
            .path()
            .split('/')
            .map(|segment| {
                if segment.eq_ignore_ascii_case("view.aspx") || segment == "view" {
                    changed = true;
                    "embed"
                } else {
                    segment
                }
            })
            .collect::<Vec<_>>()
            .join("/");
        rewritten.set_path(&path);
    }

    if let Some(query) = url.query() {
        let query = query
            .split('&')
            .map(|pair| {
                if pair.eq_ignore_ascii_case("action=view") {
                    changed = true;
                    "action=embedview"
                } else {
                    pair
                }
            })
            .collect::<Vec<_>>()
            .join("&");
        rewritten.set_query(Some(&query));
    }

    if changed {
        EmbedTarget::rewritten(kind, Provider::OneDrive, rewritten.to_string())
    } else {
        EmbedTarget::unchanged(kind, Provider::OneDrive, input)
    }
}

fn rewrite_youtube(input: &str, url: &Url, host: &str) -> Option<EmbedTarget> {
    let path = url.path();
    if path.starts_with("/embed/") {
        return Some(EmbedTarget::unchanged(
            FileKind::Video,
            Provider::YouTube,
            input,
        ));
    }

    let id = if host == "youtu.be" {
        first_segment(path)
    } else if path == "/watch" {
        query_value(url, "v")
    } else if let Some(rest) = path
        .strip_prefix("/shorts/")
        .or_else(|| path.strip_prefix("/live/"))
    {
        first_segment(rest)
    } else {
        None
    };
    let id = id?;

    if !MEDIA_ID_RE.is_match(&id) {
        return None;
    }

    Some(EmbedTarget::rewritten(
        FileKind::Video,
        Provider::YouTube,
        format!("https://www.youtube.com/embed/{id}"),
    ))
}

fn rewrite_vimeo(input: &str, url: &Url, host: &str) -> Option<EmbedTarget> {
    if host == "player.vimeo.com" {
        return Some(EmbedTarget::unchanged(FileKind::Video, Provider::Vimeo, input));
    }

    let id = url
        .path()
        .split('/')
        .find(|segment| !segment.is_empty() && segment.chars().all(|c| c.is_ascii_digit()))?;

    Some(EmbedTarget::rewritten(
        FileKind::Video,
        Provider::Vimeo,
        format!("https://player.vimeo.com/video/{id}"),
    ))
}

fn rewrite_dropbox(input: &str, url: &Url, kind: FileKind) -> EmbedTarget {
    let Some(query) = url.query() else {
        return EmbedTarget::unchanged(kind, Provider::Dropbox, input);
    };

    let mut changed = false;
    let query = query
        .split('&')
        .map(|pair| {
            if pair == "dl=0" {
                changed = true;
                "raw=1"
            } else {
                pair
            }
        })
        .collect::<Vec<_>>()
        .join("&");

    if !changed {
        return EmbedTarget::unchanged(kind, Provider::Dropbox, input);
    }

    let mut rewritten = url.clone();
    rewritten.set_query(Some(&query));
    EmbedTarget::rewritten(kind, Provider::Dropbox, rewritten.to_string())
}

/// Maps a file extension in a URL or path to a kind, ignoring query and fragment.
pub fn kind_from_extension(path: &str) -> Option<FileKind> {
    let kind = match extension_of(&path_of(path)).as_str() {
        "pdf" => FileKind::Pdf,
        "doc" | "docx" | "odt" | "rtf" => FileKind::Word,
        "xls" | "xlsx" | "ods" => FileKind::Excel,
        "ppt" | "pptx" | "pps" | "ppsx" | "odp" => FileKind::Powerpoint,
        "png" | "jpg" | "jpeg" | "gif" | "webp" | "svg" | "bmp" | "avif" => FileKind::Image,
        "mp4" | "webm" | "mov" | "m4v" | "ogv" | "mkv" => FileKind::Video,
        "mp3" | "wav" | "m4a" | "aac" | "flac" | "ogg" | "oga" | "opus" => FileKind::Audio,
        "txt" | "md" | "csv" | "json" | "xml" | "html" | "htm" => FileKind::Text,
        _ => return None,
    };
    Some(kind)
}

/// Maps a free-form resource type (or a MIME type) to a kind.
pub fn kind_from_hint(hint: &str) -> FileKind {
    let hint = hint.trim().to_ascii_lowercase();

    if hint == "application/pdf" {
        return FileKind::Pdf;
    }
    if let Some((family, _)) = hint.split_once('/') {
        return match family {
            "image" => FileKind::Image,
            "video" => FileKind::Video,
            "audio" => FileKind::Audio,
            "text" => FileKind::Text,
            _ => FileKind::Unknown,
        };
    }

    match hint.as_str() {
        "pdf" => FileKind::Pdf,
        "word" | "doc" | "docx" | "document" => FileKind::Word,
        "excel" | "spreadsheet" | "sheet" | "xls" | "xlsx" => FileKind::Excel,
        "powerpoint" | "presentation" | "slides" | "ppt" | "pptx" => FileKind::Powerpoint,
        "image" | "photo" | "picture" => FileKind::Image,
        "video" | "youtube" => FileKind::Video,
        "audio" | "sound" | "podcast" => FileKind::Audio,
        "text" | "txt" | "note" | "notes" => FileKind::Text,
        _ => FileKind::Unknown,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ViewerMode {
    Image,
    Video,
    Audio,
    Frame,
    Download,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Viewer {
    pub mode: ViewerMode,
    pub src: String,
    pub label: &'static str,
}

impl Viewer {
    fn new(mode: ViewerMode, src: impl Into<String>, label: &'static str) -> Self {
        Self {
            mode,
            src: src.into(),
            label,
        }
    }
}

/// Classification of a link plus the ordered list of ways to show it.
#[derive(Debug, Clone, Serialize)]
pub struct PreviewPlan {
    pub target: EmbedTarget,
    pub viewers: Vec<Viewer>,
}

impl PreviewPlan {
    pub fn primary(&self) -> Option<&Viewer> {
        self.viewers.first()
    }

    pub fn download(&self) -> Option<&Viewer> {
        self.viewers
            .iter()
            .find(|viewer| viewer.mode == ViewerMode::Download)
    }
}

/// Build the viewer fallback chain: native viewer, online office/pdf viewers, a generic
/// iframe of the original link, then a download link.
///
/// Local `/files/...` links are made absolute with `public_base` before they are handed to
/// third-party viewers; without a base those viewers are skipped.
pub fn plan_preview(
    link: &str,
    download_link: Option<&str>,
    type_hint: Option<&str>,
    public_base: Option<&str>,
) -> PreviewPlan {
    let original = link.trim();
    let absolute = absolute_url(original, public_base);
    let target = classify(absolute.as_deref().unwrap_or(original), type_hint);

    let direct_src = match target.provider {
        Provider::Dropbox => target.embed_url.clone(),
        _ => original.to_string(),
    };

    let mut viewers = Vec::new();

    if target.provider.hosts_viewer() {
        viewers.push(Viewer::new(ViewerMode::Frame, &target.embed_url, "Embedded viewer"));
    } else {
        match target.kind {
            FileKind::Image => {
                viewers.push(Viewer::new(ViewerMode::Image, &direct_src, "Image"));
            }
            FileKind::Video => {
                viewers.push(Viewer::new(ViewerMode::Video, &direct_src, "Video player"));
            }
            FileKind::Audio => {
                viewers.push(Viewer::new(ViewerMode::Audio, &direct_src, "Audio player"));
            }
            FileKind::Pdf | FileKind::Text => {
                viewers.push(Viewer::new(ViewerMode::Frame, &direct_src, "Browser viewer"));
            }
            _ => {}
        }
    }

    if !target.provider.hosts_viewer() {
        let public_src = match target.provider {
            Provider::Dropbox => Some(target.embed_url.clone()),
            _ => absolute.clone(),
        };
        if let Some(public_src) = public_src {
            let encoded: String =
                form_urlencoded::byte_serialize(public_src.as_bytes()).collect();
            if target.kind.is_office() {
                viewers.push(Viewer::new(
                    ViewerMode::Frame,
                    format!("{OFFICE_VIEWER}?src={encoded}"),
                    "Office Online",
                ));
            }
            if target.kind.is_office() || target.kind == FileKind::Pdf {
                viewers.push(Viewer::new(
                    ViewerMode::Frame,
                    format!("{GOOGLE_VIEWER}?url={encoded}&embedded=true"),
                    "Google Viewer",
                ));
            }
        }
    }

    viewers.push(Viewer::new(ViewerMode::Frame, original, "Original link"));

    let download = download_link
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
        .or_else(|| (!target.provider.hosts_viewer()).then(|| direct_src.clone()))
        .unwrap_or_else(|| original.to_string());
    viewers.push(Viewer::new(ViewerMode::Download, download, "Download"));

    let mut seen = Vec::new();
    viewers.retain(|viewer| {
        let key = (viewer.mode == ViewerMode::Download, viewer.src.clone());
        if seen.contains(&key) {
            false
        } else {
            seen.push(key);
            true
        }
    });

    PreviewPlan { target, viewers }
}

/// Returns an absolute http(s) URL for `link`, joining local paths onto `public_base`.
pub fn absolute_url(link: &str, public_base: Option<&str>) -> Option<String> {
    let link = link.trim();
    if parse_web_url(link).is_some() {
        return Some(link.to_string());
    }
    if !link.starts_with('/') || link.starts_with("//") {
        return None;
    }
    let base = public_base?.trim().trim_end_matches('/');
    if base.is_empty() {
        return None;
    }
    parse_web_url(&format!("{base}{link}")).map(|url| url.to_string())
}

fn parse_web_url(input: &str) -> Option<Url> {
    let url = Url::parse(input).ok()?;
    match url.scheme() {
        "http" | "https" if url.host_str().is_some() => Some(url),
        _ => None,
    }
}

fn normalized_host(url: &Url) -> String {
    let host = url.host_str().unwrap_or("").to_ascii_lowercase();
    host.strip_prefix("www.")
        .or_else(|| host.strip_prefix("m."))
        .map(str::to_string)
        .unwrap_or(host)
}

fn is_onedrive_host(host: &str) -> bool {
    host == "onedrive.live.com" || host == "1drv.ms" || host.ends_with(".sharepoint.com")
}

fn is_media_host(host: &str) -> bool {
    matches!(
        host,
        "youtube.com" | "youtube-nocookie.com" | "youtu.be" | "vimeo.com" | "player.vimeo.com"
    )
}

fn is_dropbox_host(host: &str) -> bool {
    host == "dropbox.com" || host == "dl.dropboxusercontent.com"
}

/// SharePoint sharing links carry the document family as `/:w:/`, `/:x:/`, `/:p:/` or `/:b:/`.
fn sharepoint_kind(path: &str) -> Option<FileKind> {
    let marker = path.split('/').find(|segment| {
        segment.len() == 3 && segment.starts_with(':') && segment.ends_with(':')
    })?;
    match &marker[1..2] {
        "w" => Some(FileKind::Word),
        "x" => Some(FileKind::Excel),
        "p" => Some(FileKind::Powerpoint),
        "b" => Some(FileKind::Pdf),
        _ => None,
    }
}

fn path_of(input: &str) -> String {
    if let Ok(url) = Url::parse(input) {
        return url.path().to_string();
    }
    let end = input.find(['?', '#']).unwrap_or(input.len());
    input[..end].to_string()
}

fn extension_of(path: &str) -> String {
    let file_name = path.rsplit('/').next().unwrap_or("");
    file_name
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default()
}

fn first_segment(path: &str) -> Option<String> {
    path.trim_start_matches('/')
        .split('/')
        .next()
        .filter(|segment| !segment.is_empty())
        .map(str::to_string)
}

fn query_value(url: &Url, key: &str) -> Option<String> {
    url.query_pairs()
        .find(|(name, _)| name == key)
        .map(|(_, value)| value.into_owned())
        .filter(|value| !value.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drive_file_link_becomes_preview() {
        let target = classify(
            "https://drive.google.com/file/d/1AbC_dEf-123/view?usp=sharing",
            Some("pdf"),
        );
        assert_eq!(
            target.embed_url,
            "https://drive.google.com/file/d/1AbC_dEf-123/preview"
        );
        assert_eq!(target.provider, Provider::GoogleDrive);
        assert_eq!(target.kind, FileKind::Pdf);
        assert!(target.rewritten);
    }

    #[test]
    fn drive_open_link_becomes_preview() {
        let target = classify("https://drive.google.com/open?id=XYZ789", None);
        assert_eq!(
            target.embed_url,
            "https://drive.google.com/file/d/XYZ789/preview"
        );
    }

    #[test]
    fn drive_preview_link_is_left_alone() {
        let once = classify("https://drive.google.com/file/d/1AbC/view", None);
        let twice = classify(&once.embed_url, None);
        assert_eq!(twice.embed_url, once.embed_url);
        assert_eq!(twice.provider, Provider::GoogleDrive);
        assert!(!twice.rewritten);
    }

    #[test]
    fn google_docs_edit_becomes_embedded_preview() {
        let doc = classify(
            "https://docs.google.com/document/d/DOC123/edit?usp=sharing",
            None,
        );
        assert_eq!(
            doc.embed_url,
            "https://docs.google.com/document/d/DOC123/preview?embedded=true"
        );
        assert_eq!(doc.kind, FileKind::Word);

        let sheet = classify("https://docs.google.com/spreadsheets/d/SHEET9/edit#gid=0", None);
        assert_eq!(
            sheet.embed_url,
            "https://docs.google.com/spreadsheets/d/SHEET9/preview?embedded=true"
        );
        assert_eq!(sheet.kind, FileKind::Excel);

        let slides = classify("https://docs.google.com/presentation/d/DECK_1/edit", None);
        assert_eq!(
            slides.embed_url,
            "https://docs.google.com/presentation/d/DECK_1/preview?embedded=true"
        );
        assert_eq!(slides.kind, FileKind::Powerpoint);
    }

    #[test]
    fn google_docs_preview_passes_through() {
        let url = "https://docs.google.com/document/d/DOC123/preview?embedded=true";
        let target = classify(url, None);
        assert_eq!(target.embed_url, url);
        assert_eq!(target.provider, Provider::Direct);
    }

    #[test]
    fn onedrive_view_becomes_embed() {
        let target = classify(
            "https://onedrive.live.com/view.aspx?resid=ABC123&authkey=KEY",
            Some("word"),
        );
        assert_eq!(
            target.embed_url,
            "https://onedrive.live.com/embed?resid=ABC123&authkey=KEY"
        );
        assert_eq!(target.provider, Provider::OneDrive);
        assert_eq!(target.kind, FileKind::Word);
    }

    #[test]
    fn sharepoint_action_view_becomes_embedview() {
        let target = classify(
            "https://contoso.sharepoint.com/:x:/r/sites/math/_layouts/15/Doc.aspx?sourcedoc=%7B42%7D&action=view",
            None,
        );
        assert_eq!(
            target.embed_url,
            "https://contoso.sharepoint.com/:x:/r/sites/math/_layouts/15/Doc.aspx?sourcedoc=%7B42%7D&action=embedview"
        );
        assert_eq!(target.kind, FileKind::Excel);
    }

    #[test]
    fn bare_pdf_is_wrapped_in_google_viewer() {
        let target = classify("https://example.com/files/lesson%201.pdf", None);
        assert_eq!(
            target.embed_url,
            "https://docs.google.com/viewer?url=https%3A%2F%2Fexample.com%2Ffiles%2Flesson%25201.pdf&embedded=true"
        );
        assert_eq!(target.kind, FileKind::Pdf);
        assert_eq!(target.provider, Provider::PdfViewer);
    }

    #[test]
    fn office_files_are_not_modified() {
        for (url, kind) in [
            ("https://example.com/a/slides.pptx", FileKind::Powerpoint),
            ("https://example.com/a/old.PPT", FileKind::Powerpoint),
            ("https://example.com/a/essay.docx", FileKind::Word),
            ("https://example.com/a/grades.xls", FileKind::Excel),
        ] {
            let target = classify(url, None);
            assert_eq!(target.embed_url, url);
            assert_eq!(target.kind, kind);
            assert_eq!(target.provider, Provider::Office);
            assert!(!target.rewritten);
        }
    }

    #[test]
    fn youtube_links_become_embeds() {
        for url in [
            "https://www.youtube.com/watch?v=dQw4w9WgXcQ&t=42",
            "https://youtu.be/dQw4w9WgXcQ",
            "https://www.youtube.com/shorts/dQw4w9WgXcQ",
            "https://m.youtube.com/watch?v=dQw4w9WgXcQ",
        ] {
            let target = classify(url, None);
            assert_eq!(
                target.embed_url, "https://www.youtube.com/embed/dQw4w9WgXcQ",
                "{url}"
            );
            assert_eq!(target.kind, FileKind::Video);
        }
    }

    #[test]
    fn youtube_embed_is_left_alone() {
        let url = "https://www.youtube.com/embed/dQw4w9WgXcQ";
        let target = classify(url, None);
        assert_eq!(target.embed_url, url);
        assert_eq!(target.provider, Provider::YouTube);
        assert!(!target.rewritten);
    }

    #[test]
    fn vimeo_numeric_id_becomes_player() {
        let target = classify("https://vimeo.com/76979871", None);
        assert_eq!(target.embed_url, "https://player.vimeo.com/video/76979871");
        assert_eq!(target.kind, FileKind::Video);
    }

    #[test]
    fn vimeo_without_numeric_id_passes_through() {
        let url = "https://vimeo.com/channels/staffpicks";
        let target = classify(url, None);
        assert_eq!(target.embed_url, url);
        assert_eq!(target.provider, Provider::Direct);
    }

    #[test]
    fn dropbox_download_flag_becomes_raw() {
        let target = classify("https://www.dropbox.com/s/abc123/diagram.png?dl=0", None);
        assert_eq!(
            target.embed_url,
            "https://www.dropbox.com/s/abc123/diagram.png?raw=1"
        );
        assert_eq!(target.kind, FileKind::Image);

        let pdf = classify(
            "https://www.dropbox.com/scl/fi/xyz/notes.pdf?rlkey=k1&dl=0",
            None,
        );
        assert_eq!(
            pdf.embed_url,
            "https://www.dropbox.com/scl/fi/xyz/notes.pdf?rlkey=k1&raw=1"
        );
        assert_eq!(pdf.provider, Provider::Dropbox);
        assert_eq!(pdf.kind, FileKind::Pdf);
    }

    #[test]
    fn unknown_links_pass_through() {
        let url = "https://www.khanacademy.org/math/algebra";
        let target = classify(url, Some("video"));
        assert_eq!(target.embed_url, url);
        assert_eq!(target.provider, Provider::Direct);
        assert_eq!(target.kind, FileKind::Video);
        assert!(!target.rewritten);
    }

    #[test]
    fn local_paths_are_direct() {
        let target = classify("/files/resources/ab12_worksheet.pdf", None);
        assert_eq!(target.provider, Provider::Direct);
        assert_eq!(target.kind, FileKind::Pdf);

        let office = classify("/files/resources/ab12_unit.docx", None);
        assert_eq!(office.provider, Provider::Office);
    }

    #[test]
    fn hints_cover_mime_types() {
        assert_eq!(kind_from_hint("application/pdf"), FileKind::Pdf);
        assert_eq!(kind_from_hint("video/mp4"), FileKind::Video);
        assert_eq!(kind_from_hint(" Presentation "), FileKind::Powerpoint);
        assert_eq!(kind_from_hint("link"), FileKind::Unknown);
    }

    #[test]
    fn extension_ignores_query() {
        assert_eq!(
            kind_from_extension("https://cdn.example.com/clip.MP4?token=1"),
            Some(FileKind::Video)
        );
        assert_eq!(kind_from_extension("/files/readme"), None);
    }

    #[test]
    fn absolute_url_joins_public_base() {
        assert_eq!(
            absolute_url("/files/a.pdf", Some("https://portal.example.org/")),
            Some("https://portal.example.org/files/a.pdf".to_string())
        );
        assert_eq!(absolute_url("/files/a.pdf", None), None);
        assert_eq!(
            absolute_url("https://x.org/a.pdf", None),
            Some("https://x.org/a.pdf".to_string())
        );
        assert_eq!(absolute_url("ftp://x.org/a.pdf", None), None);
    }

    #[test]
    fn office_chain_falls_back_to_download() {
        let plan = plan_preview(
            "/files/resources/unit1.pptx",
            None,
            None,
            Some("https://portal.example.org"),
        );
        let modes: Vec<_> = plan.viewers.iter().map(|v| (v.mode, v.label)).collect();
        assert_eq!(
            modes,
            vec![
                (ViewerMode::Frame, "Office Online"),
                (ViewerMode::Frame, "Google Viewer"),
                (ViewerMode::Frame, "Original link"),
                (ViewerMode::Download, "Download"),
            ]
        );
        assert_eq!(
            plan.viewers[0].src,
            "https://view.officeapps.live.com/op/embed.aspx?src=https%3A%2F%2Fportal.example.org%2Ffiles%2Fresources%2Funit1.pptx"
        );
        assert_eq!(
            plan.download().map(|v| v.src.as_str()),
            Some("/files/resources/unit1.pptx")
        );
    }

    #[test]
    fn office_chain_without_public_base_skips_online_viewers() {
        let plan = plan_preview("/files/resources/unit1.docx", None, None, None);
        assert_eq!(plan.viewers.len(), 2);
        assert_eq!(plan.viewers[0].label, "Original link");
    }

    #[test]
    fn local_pdf_prefers_browser_viewer() {
        let plan = plan_preview("/files/documents/a.pdf", None, None, Some("https://p.org"));
        assert_eq!(plan.primary().map(|v| v.label), Some("Browser viewer"));
        assert_eq!(plan.viewers[1].label, "Google Viewer");
    }

    #[test]
    fn youtube_chain_embeds_player_and_keeps_explicit_download() {
        let plan = plan_preview(
            "https://youtu.be/dQw4w9WgXcQ",
            Some("https://example.com/transcript.pdf"),
            None,
            None,
        );
        assert_eq!(
            plan.primary().map(|v| v.src.as_str()),
            Some("https://www.youtube.com/embed/dQw4w9WgXcQ")
        );
        assert_eq!(
            plan.download().map(|v| v.src.as_str()),
            Some("https://example.com/transcript.pdf")
        );
    }

    #[test]
    fn image_chain_uses_native_viewer() {
        let plan = plan_preview("https://www.dropbox.com/s/a/map.jpg?dl=0", None, None, None);
        let primary = plan.primary().expect("viewer");
        assert_eq!(primary.mode, ViewerMode::Image);
        assert_eq!(primary.src, "https://www.dropbox.com/s/a/map.jpg?raw=1");
    }

    #[test]
    fn drive_download_link_becomes_preview() {
        let target = classify("https://drive.google.com/uc?id=FILE42&export=download", None);
        assert_eq!(
            target.embed_url,
            "https://drive.google.com/file/d/FILE42/preview"
        );
        assert_eq!(target.provider, Provider::GoogleDrive);
        assert!(target.rewritten);
    }

    #[test]
    fn onedrive_short_link_keeps_its_path() {
        let url = "https://1drv.ms/b/s/AbC123Xy";
        let target = classify(url, Some("pdf"));
        assert_eq!(target.embed_url, url);
        assert_eq!(target.provider, Provider::OneDrive);
        assert_eq!(target.kind, FileKind::Pdf);
        assert!(!target.rewritten);

        let target = classify("https://1drv.ms/w/s/AbC123Xy?action=view", None);
        assert_eq!(
            target.embed_url,
            "https://1drv.ms/w/s/AbC123Xy?action=embedview"
        );
        assert!(target.rewritten);
    }

    #[test]
    fn onedrive_embed_link_is_left_alone() {
        let once = classify(
            "https://onedrive.live.com/view.aspx?resid=ABC123&authkey=KEY",
            Some("word"),
        );
        let twice = classify(&once.embed_url, Some("word"));
        assert_eq!(
            twice.embed_url,
            "https://onedrive.live.com/embed?resid=ABC123&authkey=KEY"
        );
        assert_eq!(twice.provider, Provider::OneDrive);
        assert!(!twice.rewritten);
    }

    #[test]
    fn youtube_live_link_becomes_embed() {
        let target = classify("https://www.youtube.com/live/dQw4w9WgXcQ?feature=share", None);
        assert_eq!(target.embed_url, "https://www.youtube.com/embed/dQw4w9WgXcQ");
        assert_eq!(target.provider, Provider::YouTube);
    }

    #[test]
    fn vimeo_player_link_is_left_alone() {
        let url = "https://player.vimeo.com/video/76979871";
        let target = classify(url, None);
        assert_eq!(target.embed_url, url);
        assert_eq!(target.provider, Provider::Vimeo);
        assert_eq!(target.kind, FileKind::Video);
        assert!(!target.rewritten);
    }

    #[test]
    fn provider_hosted_pdf_skips_google_viewer() {
        let target = classify("https://www.dropbox.com/s/abc123/worksheet.pdf?dl=0", None);
        assert_eq!(
            target.embed_url,
            "https://www.dropbox.com/s/abc123/worksheet.pdf?raw=1"
        );
        assert_eq!(target.provider, Provider::Dropbox);
        assert_eq!(target.kind, FileKind::Pdf);
    }
}
