use std::{
    collections::HashSet,
    io::ErrorKind,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use axum::{
    extract::{Path as AxumPath, Query, State},
    http::{HeaderMap, HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use mime::Mime;
use serde::Deserialize;
use tracing::{error, warn};

use crate::web::{ApiFailure, AppState, json_error, not_found};

/// URL prefix under which stored uploads are served.
pub const FILES_PREFIX: &str = "/files/";

/// Subdirectories of the storage root, one per kind of upload.
pub const AREA_RESOURCES: &str = "resources";
pub const AREA_DOCUMENTS: &str = "documents";
pub const AREA_TEAM: &str = "team";
pub const STORAGE_AREAS: &[&str] = &[AREA_RESOURCES, AREA_DOCUMENTS, AREA_TEAM];

#[derive(Default, Deserialize)]
pub struct FileQuery {
    #[serde(default)]
    download: Option<String>,
}

/// Ensure the area directory under the storage root exists and return it.
pub async fn ensure_storage_area(root: &Path, area: &str) -> Result<PathBuf> {
    let dir = root.join(area);
    tokio::fs::create_dir_all(&dir)
        .await
        .with_context(|| format!("failed to ensure storage area at {}", dir.display()))?;
    Ok(dir)
}

pub fn public_url_for(area: &str, stored_name: &str) -> String {
    format!("{FILES_PREFIX}{area}/{stored_name}")
}

/// Map a relative request path onto the storage root, rejecting anything that could escape it.
pub fn resolve_stored_path(root: &Path, relative: &str) -> Option<PathBuf> {
    let mut resolved = root.to_path_buf();
    let mut depth = 0;

    for segment in relative.split('/') {
        if segment.is_empty()
            || segment.starts_with('.')
            || segment.contains(['\\', ':', '\0'])
        {
            return None;
        }
        resolved.push(segment);
        depth += 1;
    }

    (depth > 0).then_some(resolved)
}

/// The on-disk path behind a `/files/...` URL, if the URL points into local storage.
pub fn stored_path_for_url(root: &Path, url: &str) -> Option<PathBuf> {
    let relative = url.strip_prefix(FILES_PREFIX)?;
    resolve_stored_path(root, relative)
}

/// Best-effort removal of a stored upload; missing files are not an error.
pub async fn remove_stored_file(root: &Path, url: Option<&str>) {
    let Some(path) = url.and_then(|url| stored_path_for_url(root, url)) else {
        return;
    };

    match tokio::fs::remove_file(&path).await {
        Ok(()) => {}
        Err(err) if err.kind() == ErrorKind::NotFound => {}
        Err(err) => warn!(?err, file = %path.display(), "failed to remove stored file"),
    }
}

/// Whether a `/files/...` URL names a stored upload directly inside `area`.
pub fn url_in_area(url: &str, area: &str) -> bool {
    url.strip_prefix(FILES_PREFIX)
        .and_then(|rest| rest.strip_prefix(area))
        .and_then(|rest| rest.strip_prefix('/'))
        .is_some_and(|name| !name.is_empty() && !name.contains('/'))
}

/// Remove the files among `urls` that live in `area` and are absent from `still_referenced`.
pub async fn remove_unreferenced_files(
    root: &Path,
    area: &str,
    urls: &[String],
    still_referenced: &HashSet<String>,
) -> usize {
    let mut removed = 0;
    for url in urls {
        if !url_in_area(url, area) || still_referenced.contains(url) {
            continue;
        }
        remove_stored_file(root, Some(url)).await;
        removed += 1;
    }
    removed
}

pub fn content_type_for(path: &Path) -> Mime {
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase())
        .unwrap_or_default();

    let essence = match extension.as_str() {
        "pdf" => return mime::APPLICATION_PDF,
        "png" => return mime::IMAGE_PNG,
        "jpg" | "jpeg" => return mime::IMAGE_JPEG,
        "gif" => return mime::IMAGE_GIF,
        "svg" => return mime::IMAGE_SVG,
        "bmp" => return mime::IMAGE_BMP,
        "txt" | "md" => return mime::TEXT_PLAIN_UTF_8,
        "csv" => return mime::TEXT_CSV_UTF_8,
        "json" => return mime::APPLICATION_JSON,
        "webp" => "image/webp",
        "mp4" | "m4v" => "video/mp4",
        "webm" => "video/webm",
        "mp3" => "audio/mpeg",
        "wav" => "audio/wav",
        "m4a" => "audio/mp4",
        "ogg" | "oga" => "audio/ogg",
        "doc" => "application/msword",
        "docx" => "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        "xls" => "application/vnd.ms-excel",
        "xlsx" => "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
        "ppt" => "application/vnd.ms-powerpoint",
        "pptx" => "application/vnd.openxmlformats-officedocument.presentationml.presentation",
        _ => return mime::APPLICATION_OCTET_STREAM,
    };

    essence
        .parse()
        .unwrap_or(mime::APPLICATION_OCTET_STREAM)
}

/// `GET /files/*path`: serve a stored upload inline, or as an attachment with `?download=1`.
pub async fn serve_file(
    State(state): State<AppState>,
    AxumPath(relative): AxumPath<String>,
    Query(query): Query<FileQuery>,
) -> Result<Response, ApiFailure> {
    let path = resolve_stored_path(state.storage_root(), &relative)
        .ok_or_else(|| json_error(StatusCode::BAD_REQUEST, "Invalid file path."))?;

    let filename = path
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or("download")
        .to_string();
    let content_type = content_type_for(&path);
    let attachment = query.download.is_some_and(|value| value != "0");

    stream_file(&path, &filename, &content_type, attachment).await
}

/// Read a stored file into a response with the given content type and disposition.
pub async fn stream_file(
    path: &Path,
    filename: &str,
    content_type: &Mime,
    attachment: bool,
) -> Result<Response, ApiFailure> {
    let bytes = match tokio::fs::read(path).await {
        Ok(bytes) => bytes,
        Err(err) if err.kind() == ErrorKind::NotFound => {
            return Err(not_found("File not found."));
        }
        Err(err) => {
            error!(?err, file = %path.display(), "failed to read stored file");
            return Err(json_error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to read the file.",
            ));
        }
    };

    let mut headers = HeaderMap::new();
    let content_type = HeaderValue::from_str(content_type.as_ref())
        .unwrap_or(HeaderValue::from_static("application/octet-stream"));
    headers.insert(header::CONTENT_TYPE, content_type);

    let disposition = format!(
        "{}; filename=\"{}\"",
        if attachment { "attachment" } else { "inline" },
        ascii_filename(filename)
    );
    let disposition = HeaderValue::from_str(&disposition).map_err(|_| {
        json_error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "Invalid download header.",
        )
    })?;
    headers.insert(header::CONTENT_DISPOSITION, disposition);
    headers.insert(
        header::X_CONTENT_TYPE_OPTIONS,
        HeaderValue::from_static("nosniff"),
    );

    Ok((headers, bytes).into_response())
}

fn ascii_filename(name: &str) -> String {
    name.chars()
        .map(|c| {
            if (c.is_ascii_graphic() || c == ' ') && c != '"' && c != '\\' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn resolves_paths_inside_root() {
        let root = Path::new("/srv/storage");
        assert_eq!(
            resolve_stored_path(root, "documents/abc_notes.pdf"),
            Some(PathBuf::from("/srv/storage/documents/abc_notes.pdf"))
        );
    }

    #[test]
    fn rejects_traversal_and_hidden_segments() {
        let root = Path::new("/srv/storage");
        for bad in [
            "",
            "../etc/passwd",
            "documents/../../x",
            "documents//x.pdf",
            ".env",
            "documents/.hidden",
            "C:/windows",
            "documents\\x.pdf",
        ] {
            assert!(resolve_stored_path(root, bad).is_none(), "{bad}");
        }
    }

    #[test]
    fn urls_map_back_to_storage() {
        let root = Path::new("storage");
        assert_eq!(
            stored_path_for_url(root, "/files/team/photo.png"),
            Some(PathBuf::from("storage/team/photo.png"))
        );
        assert!(stored_path_for_url(root, "https://example.com/files/x.png").is_none());
        assert_eq!(public_url_for(AREA_DOCUMENTS, "a.pdf"), "/files/documents/a.pdf");
    }

    #[test]
    fn content_types_follow_extension() {
        assert_eq!(content_type_for(Path::new("a.PDF")), mime::APPLICATION_PDF);
        assert_eq!(
            content_type_for(Path::new("b.docx")).as_ref(),
            "application/vnd.openxmlformats-officedocument.wordprocessingml.document"
        );
        assert_eq!(
            content_type_for(Path::new("c.bin")),
            mime::APPLICATION_OCTET_STREAM
        );
    }

    #[test]
    fn header_filenames_are_ascii() {
        assert_eq!(ascii_filename("unit \"1\" ü.pdf"), "unit _1_ _.pdf");
    }

    #[tokio::test]
    async fn remove_stored_file_ignores_missing_and_external() {
        let dir = tempdir().unwrap();
        let area = ensure_storage_area(dir.path(), AREA_RESOURCES).await.unwrap();
        let file = area.join("x.txt");
        tokio::fs::write(&file, b"hello").await.unwrap();

        remove_stored_file(dir.path(), Some("https://example.com/x.txt")).await;
        assert!(file.exists());

        remove_stored_file(dir.path(), Some("/files/resources/x.txt")).await;
        assert!(!file.exists());

        remove_stored_file(dir.path(), Some("/files/resources/x.txt")).await;
        remove_stored_file(dir.path(), None).await;
    }

    #[tokio::test]
    async fn stream_file_sets_disposition() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("sheet.pdf");
        tokio::fs::write(&file, b"%PDF-1.4").await.unwrap();

        let response = stream_file(&file, "sheet.pdf", &mime::APPLICATION_PDF, false)
            .await
            .unwrap();
        assert_eq!(
            response.headers().get(header::CONTENT_DISPOSITION).unwrap(),
            "inline; filename=\"sheet.pdf\""
        );
        assert_eq!(
            response.headers().get(header::CONTENT_TYPE).unwrap(),
            "application/pdf"
        );

        let missing = stream_file(&dir.path().join("nope.pdf"), "nope.pdf", &mime::APPLICATION_PDF, true).await;
        assert!(matches!(missing, Err((StatusCode::NOT_FOUND, _))));
    }

    #[test]
    fn area_membership_requires_a_flat_name_in_that_area() {
        assert!(url_in_area("/files/resources/abc_sheet.pdf", AREA_RESOURCES));
        assert!(!url_in_area("/files/documents/abc_handbook.pdf", AREA_RESOURCES));
        assert!(!url_in_area("/files/resources-old/abc.pdf", AREA_RESOURCES));
        assert!(!url_in_area("/files/resources/", AREA_RESOURCES));
        assert!(!url_in_area("/files/resources/nested/abc.pdf", AREA_RESOURCES));
        assert!(!url_in_area("https://example.com/files/resources/a.pdf", AREA_RESOURCES));
    }

    #[tokio::test]
    async fn removal_spares_other_areas_and_shared_files() {
        let dir = tempdir().unwrap();
        let documents = dir.path().join(AREA_DOCUMENTS);
        let resources = dir.path().join(AREA_RESOURCES);
        std::fs::create_dir_all(&documents).unwrap();
        std::fs::create_dir_all(&resources).unwrap();
        std::fs::write(documents.join("abc_handbook.pdf"), b"handbook").unwrap();
        std::fs::write(resources.join("r1_sheet.pdf"), b"sheet").unwrap();
        std::fs::write(resources.join("r2_shared.pdf"), b"shared").unwrap();

        let urls = vec![
            public_url_for(AREA_DOCUMENTS, "abc_handbook.pdf"),
            public_url_for(AREA_RESOURCES, "r1_sheet.pdf"),
            public_url_for(AREA_RESOURCES, "r2_shared.pdf"),
        ];
        let still_referenced: HashSet<String> =
            [public_url_for(AREA_RESOURCES, "r2_shared.pdf")].into();

        let removed =
            remove_unreferenced_files(dir.path(), AREA_RESOURCES, &urls, &still_referenced).await;

        assert_eq!(removed, 1);
        assert!(documents.join("abc_handbook.pdf").exists());
        assert!(resources.join("r2_shared.pdf").exists());
        assert!(!resources.join("r1_sheet.pdf").exists());
    }
}
