pub mod admin_shared;
pub mod announcements;
pub mod contact;
pub mod documents;
pub mod grades;
pub mod resources;
pub mod team;
pub mod units;
