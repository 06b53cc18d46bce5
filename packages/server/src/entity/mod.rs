pub mod chapter;
pub mod chapter_progress;
pub mod course;
pub mod profile;
pub mod session;
pub mod subject;
