mod auth;
mod settings;
mod users;

pub use auth::require_admin;
pub use settings::{get_settings, save_settings};
pub use users::{create_admin, delete_admin, list_admins, update_admin_password};
