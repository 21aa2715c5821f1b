use std::{
    collections::HashMap,
    path::{Path, PathBuf},
};

use axum::{extract::Multipart, http::StatusCode};
use tokio::{fs::File, io::AsyncWriteExt};
use tracing::warn;
use uuid::Uuid;

use crate::web::{ApiFailure, json_error};

/// Result type used by the shared upload helpers.
pub type UploadResult<T> = Result<T, UploadError>;

/// Error returned when validating or persisting uploaded files.
#[derive(Debug)]
pub struct UploadError {
    status: StatusCode,
    message: String,
}

impl UploadError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }

    fn too_large(limit: u64) -> Self {
        Self {
            status: StatusCode::PAYLOAD_TOO_LARGE,
            message: format!(
                "Uploaded file exceeds the limit of {} MB.",
                limit / (1024 * 1024)
            ),
        }
    }

    fn storage(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn into_failure(self) -> ApiFailure {
        if self.status.is_server_error() {
            warn!(message = %self.message, "upload could not be stored");
            return json_error(self.status, "Could not store the uploaded file.");
        }
        json_error(self.status, self.message)
    }
}

impl std::fmt::Display for UploadError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for UploadError {}

/// Expectations for a single multipart file field. Each field accepts at most one file.
#[derive(Debug, Clone, Copy)]
pub struct FileFieldConfig<'a> {
    pub field_name: &'a str,
    pub allowed_extensions: &'a [&'a str],
    pub required: bool,
}

impl<'a> FileFieldConfig<'a> {
    pub fn new(field_name: &'a str, allowed_extensions: &'a [&'a str]) -> Self {
        Self {
            field_name,
            allowed_extensions,
            required: false,
        }
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    fn allows(&self, extension: &str) -> bool {
        self.allowed_extensions.is_empty()
            || self
                .allowed_extensions
                .iter()
                .any(|allowed| allowed.eq_ignore_ascii_case(extension))
    }
}

/// Metadata describing a stored upload on disk.
#[derive(Debug, Clone)]
pub struct SavedFile {
    pub field_name: String,
    pub original_name: String,
    pub stored_name: String,
    pub stored_path: PathBuf,
    pub file_size: u64,
    pub content_type: Option<String>,
}

/// Aggregated output of the shared upload processor.
#[derive(Debug, Default)]
pub struct UploadOutcome {
    pub files: Vec<SavedFile>,
    pub text_fields: HashMap<String, String>,
}

impl UploadOutcome {
    pub fn file_for(&self, field_name: &str) -> Option<&SavedFile> {
        self.files.iter().find(|file| file.field_name == field_name)
    }

    pub fn text(&self, field_name: &str) -> Option<&str> {
        self.text_fields.get(field_name).map(String::as_str)
    }

    /// Remove every stored file, used when the surrounding write fails.
    pub async fn discard(&self) {
        remove_saved(&self.files).await;
    }
}

/// Parse multipart form data, storing files in `dest_dir` under unique names.
///
/// Text fields are collected by name (the last value wins). Empty file parts, which browsers
/// send for untouched file inputs, are skipped. Any failure removes files already written.
pub async fn process_upload_form(
    mut multipart: Multipart,
    dest_dir: &Path,
    field_configs: &[FileFieldConfig<'_>],
    max_bytes: u64,
) -> UploadResult<UploadOutcome> {
    tokio::fs::create_dir_all(dest_dir)
        .await
        .map_err(|err| UploadError::storage(format!("failed to create upload directory: {err}")))?;

    let mut outcome = UploadOutcome::default();

    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(err) => {
                outcome.discard().await;
                return Err(UploadError::new(format!(
                    "Failed to read the upload form: {err}"
                )));
            }
        };

        let field_name = field.name().unwrap_or("").to_string();

        let Some(file_name) = field.file_name().map(str::to_string) else {
            match field.text().await {
                Ok(value) => {
                    outcome.text_fields.insert(field_name, value);
                    continue;
                }
                Err(err) => {
                    outcome.discard().await;
                    return Err(UploadError::new(format!(
                        "Failed to read field `{field_name}`: {err}"
                    )));
                }
            }
        };

        if file_name.trim().is_empty() {
            continue;
        }

        let Some(config) = field_configs
            .iter()
            .find(|config| config.field_name == field_name)
        else {
            outcome.discard().await;
            return Err(UploadError::new(format!(
                "Unexpected file field `{field_name}`."
            )));
        };

        if outcome.file_for(&field_name).is_some() {
            outcome.discard().await;
            return Err(UploadError::new(format!(
                "Only one file may be uploaded for `{field_name}`."
            )));
        }

        let extension = extension_of(&file_name);
        if !config.allows(&extension) {
            outcome.discard().await;
            return Err(UploadError::new(format!(
                "Files of type `{extension}` are not accepted for `{field_name}`."
            )));
        }

        let content_type = field.content_type().map(str::to_string);
        let stored_name = stored_name_for(&file_name, &extension);
        let stored_path = dest_dir.join(&stored_name);

        match write_field(field, &stored_path, max_bytes).await {
            Ok(file_size) => outcome.files.push(SavedFile {
                field_name,
                original_name: file_name,
                stored_name,
                stored_path,
                file_size,
                content_type,
            }),
            Err(err) => {
                let _ = tokio::fs::remove_file(&stored_path).await;
                outcome.discard().await;
                return Err(err);
            }
        }
    }

    for config in field_configs.iter().filter(|config| config.required) {
        if outcome.file_for(config.field_name).is_none() {
            outcome.discard().await;
            return Err(UploadError::new(format!(
                "A file is required for `{}`.",
                config.field_name
            )));
        }
    }

    Ok(outcome)
}

async fn write_field(
    mut field: axum::extract::multipart::Field<'_>,
    stored_path: &Path,
    max_bytes: u64,
) -> UploadResult<u64> {
    let mut file = File::create(stored_path)
        .await
        .map_err(|err| UploadError::storage(format!("failed to create file: {err}")))?;

    let mut total_bytes: u64 = 0;
    while let Some(chunk) = field
        .chunk()
        .await
        .map_err(|err| UploadError::new(format!("Failed to read upload data: {err}")))?
    {
        total_bytes += chunk.len() as u64;
        if total_bytes > max_bytes {
            return Err(UploadError::too_large(max_bytes));
        }
        file.write_all(&chunk)
            .await
            .map_err(|err| UploadError::storage(format!("failed to write file: {err}")))?;
    }
    file.flush()
        .await
        .map_err(|err| UploadError::storage(format!("failed to flush file: {err}")))?;

    Ok(total_bytes)
}

async fn remove_saved(files: &[SavedFile]) {
    for file in files {
        if let Err(err) = tokio::fs::remove_file(&file.stored_path).await {
            warn!(?err, file = %file.stored_path.display(), "failed to discard upload");
        }
    }
}

fn extension_of(file_name: &str) -> String {
    Path::new(file_name)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase())
        .unwrap_or_default()
}

/// `<uuid>_<sanitized original>` so uploads never collide and stay recognisable.
fn stored_name_for(original: &str, extension: &str) -> String {
    let mut sanitized = sanitize_filename::sanitize(original).replace(' ', "_");
    if sanitized.is_empty() || sanitized.starts_with('.') {
        sanitized = if extension.is_empty() {
            "file".to_string()
        } else {
            format!("file.{extension}")
        };
    }
    format!("{}_{}", Uuid::new_v4().simple(), sanitized)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stored_names_are_unique_and_sanitized() {
        let first = stored_name_for("Unit 1/worksheet.pdf", "pdf");
        let second = stored_name_for("Unit 1/worksheet.pdf", "pdf");
        assert_ne!(first, second);
        assert!(first.ends_with("_Unit_1worksheet.pdf"), "{first}");
        assert!(!first.contains('/'));
    }

    #[test]
    fn hidden_or_empty_names_get_a_fallback() {
        let name = stored_name_for(".htaccess", "htaccess");
        assert!(name.ends_with("_file.htaccess"), "{name}");
        let name = stored_name_for("///", "");
        assert!(name.ends_with("_file"), "{name}");
    }

    #[test]
    fn extension_checks_ignore_case() {
        let config = FileFieldConfig::new("file", &["pdf", "docx"]);
        assert!(config.allows("PDF"));
        assert!(!config.allows("exe"));
        assert!(FileFieldConfig::new("file", &[]).allows("anything"));
        assert_eq!(extension_of("Report.DOCX"), "docx");
        assert_eq!(extension_of("README"), "");
    }

    #[test]
    fn upload_errors_map_to_status() {
        let err = UploadError::too_large(50 * 1024 * 1024);
        assert_eq!(err.status(), StatusCode::PAYLOAD_TOO_LARGE);
        assert!(err.message().contains("50 MB"));

        let (status, body) = UploadError::storage("disk full").into_failure();
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(!body.0.message.contains("disk full"));
    }
}
