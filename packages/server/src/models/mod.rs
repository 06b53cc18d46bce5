pub mod auth;
pub mod chapter;
pub mod course;
pub mod dashboard;
pub mod shared;
pub mod subject;
pub mod user;
