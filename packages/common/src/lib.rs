pub mod config;
pub mod entitlement;
pub mod guard;
pub mod ordering;
pub mod role;
pub mod storage;

pub use entitlement::{AccessWindow, Entitlement};
pub use guard::{GuardDecision, GuardState, RouteRequirements};
pub use ordering::{MoveDirection, SwapPlan};
pub use role::UserRole;

/// Reserved `video_storage_path` meaning "no video uploaded yet".
pub const NO_VIDEO_SENTINEL: &str = "placeholder.mp4";

/// Returns true if the path refers to an uploaded object rather than the sentinel.
pub fn has_video(path: &str) -> bool {
    !path.is_empty() && path != NO_VIDEO_SENTINEL
}
