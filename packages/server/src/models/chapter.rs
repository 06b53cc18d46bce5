use chrono::{DateTime, Utc};
use common::{MoveDirection, has_video};
use serde::{Deserialize, Serialize};

use crate::error::AppError;

use super::shared::{
    Pagination, double_option, validate_optional_position, validate_optional_text, validate_title,
};

const DESCRIPTION_MAX: usize = 8192;

#[derive(Deserialize, utoipa::ToSchema)]
pub struct CreateChapterRequest {
    pub course_id: i32,
    #[schema(example = "Limits")]
    pub title: String,
    pub description: Option<String>,
    /// Explicit position. Appended after the last chapter when omitted.
    pub order_in_course: Option<i32>,
}

pub fn validate_create_chapter(payload: &CreateChapterRequest) -> Result<(), AppError> {
    validate_title(&payload.title)?;
    validate_optional_text(payload.description.as_deref(), "Description", DESCRIPTION_MAX)?;
    validate_optional_position(payload.order_in_course)
}

/// Partial chapter edit. Changing `course_id` moves the chapter without
/// renumbering either course.
#[derive(Debug, Deserialize, Default, PartialEq, utoipa::ToSchema)]
pub struct UpdateChapterRequest {
    pub course_id: Option<i32>,
    pub title: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    #[schema(value_type = Option<String>)]
    pub description: Option<Option<String>>,
    pub order_in_course: Option<i32>,
}

pub fn validate_update_chapter(payload: &UpdateChapterRequest) -> Result<(), AppError> {
    if let Some(ref title) = payload.title {
        validate_title(title)?;
    }
    validate_optional_text(
        payload.description.as_ref().and_then(|d| d.as_deref()),
        "Description",
        DESCRIPTION_MAX,
    )?;
    validate_optional_position(payload.order_in_course)
}

#[derive(Deserialize, utoipa::ToSchema)]
pub struct MoveChapterRequest {
    pub direction: MoveDirection,
}

#[derive(Debug, Clone, Serialize, Deserialize, utoipa::ToSchema)]
pub struct ChapterResponse {
    pub id: i32,
    pub course_id: i32,
    pub title: String,
    pub description: Option<String>,
    pub order_in_course: i32,
    /// False while the chapter still points at the placeholder.
    pub has_video: bool,
    pub video_storage_path: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<crate::entity::chapter::Model> for ChapterResponse {
    fn from(m: crate::entity::chapter::Model) -> Self {
        Self {
            id: m.id,
            course_id: m.course_id,
            title: m.title,
            description: m.description,
            order_in_course: m.order_in_course,
            has_video: has_video(&m.video_storage_path),
            video_storage_path: m.video_storage_path,
            created_at: m.created_at,
            updated_at: m.updated_at,
        }
    }
}

/// Chapter row inside a course listing, with the caller's watch state.
#[derive(Debug, Clone, Serialize, Deserialize, utoipa::ToSchema)]
pub struct ChapterSummary {
    pub id: i32,
    pub title: String,
    pub description: Option<String>,
    pub order_in_course: i32,
    pub has_video: bool,
    pub watched_at: Option<DateTime<Utc>>,
}

#[derive(Deserialize, utoipa::IntoParams)]
pub struct ChapterListQuery {
    pub page: Option<u64>,
    pub per_page: Option<u64>,
    /// Case-insensitive match on title or description.
    pub search: Option<String>,
    pub course_id: Option<i32>,
    /// Chapters of any course under this subject.
    pub subject_id: Option<i32>,
}

#[derive(Serialize, Deserialize, utoipa::ToSchema)]
pub struct ChapterListResponse {
    pub data: Vec<ChapterResponse>,
    pub pagination: Pagination,
}

/// Time-limited playback link for one chapter.
#[derive(Debug, Serialize, Deserialize, utoipa::ToSchema)]
pub struct PlaybackResponse {
    pub chapter_id: i32,
    pub url: String,
    pub expires_at: DateTime<Utc>,
}
