pub mod admin;
pub mod auth;
pub mod chapter;
pub mod course;
pub mod dashboard;
pub mod media;
pub mod subject;
