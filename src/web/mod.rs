pub mod admin;
pub mod auth;
pub mod data;
pub mod landing;
pub mod models;
pub mod responses;
pub mod router;
pub mod state;
pub mod storage;
pub mod templates;
pub mod uploads;

pub use auth::{AuthUser, SESSION_COOKIE, SESSION_TTL_DAYS};
pub use models::{
    AnnouncementRow, ContactInfoRow, DocumentRow, GradeRow, ResourceRow, TeamMemberRow, UnitRow,
};
pub use responses::{
    ApiFailure, ApiMessage, RecordRef, bad_request, internal_error, json_error, not_found,
};
pub use state::AppState;
pub use templates::{escape_html, render_footer, render_page};
pub use uploads::{FileFieldConfig, SavedFile, UploadError, UploadOutcome, process_upload_form};
