//! Domain operations shared by the HTTP handlers and startup seeding.
//!
//! Handlers validate payloads and authorise the caller; everything that must
//! hold regardless of caller (ordering, delete guards, video binding) lives here.

pub mod account;
pub mod catalog;
pub mod chapter;
pub mod playback;
pub mod video;
