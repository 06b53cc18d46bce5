//! Client library for the Lectern course service.
//!
//! [`session::Session`] holds the signed-in identity and feeds the route
//! guard; [`coordinator::Coordinator`] drives video uploads and playback.

pub mod api;
pub mod backend;
pub mod coordinator;
pub mod error;
pub mod session;
pub mod types;

pub use api::ApiClient;
pub use backend::{AuthBackend, AuthEvent, HttpBackend, Identity, TokenStore};
pub use coordinator::{Coordinator, MediaApi, PlaybackState, UploadState};
pub use error::ClientError;
pub use session::{Navigation, Session, SessionState};
