use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AppError;

use super::chapter::ChapterSummary;
use super::shared::{Pagination, double_option, validate_optional_text, validate_title};

const DESCRIPTION_MAX: usize = 8192;
const KEYWORDS_MAX: usize = 512;

#[derive(Deserialize, utoipa::ToSchema)]
pub struct CreateCourseRequest {
    pub subject_id: i32,
    #[schema(example = "Calculus I")]
    pub title: String,
    pub description: Option<String>,
    /// Free-form search terms.
    #[schema(example = "limits derivatives")]
    pub keywords: Option<String>,
}

pub fn validate_create_course(payload: &CreateCourseRequest) -> Result<(), AppError> {
    validate_title(&payload.title)?;
    validate_optional_text(payload.description.as_deref(), "Description", DESCRIPTION_MAX)?;
    validate_optional_text(payload.keywords.as_deref(), "Keywords", KEYWORDS_MAX)
}

#[derive(Deserialize, Default, PartialEq, utoipa::ToSchema)]
pub struct UpdateCourseRequest {
    pub subject_id: Option<i32>,
    pub title: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    #[schema(value_type = Option<String>)]
    pub description: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    #[schema(value_type = Option<String>)]
    pub keywords: Option<Option<String>>,
}

pub fn validate_update_course(payload: &UpdateCourseRequest) -> Result<(), AppError> {
    if let Some(ref title) = payload.title {
        validate_title(title)?;
    }
    validate_optional_text(
        payload.description.as_ref().and_then(|d| d.as_deref()),
        "Description",
        DESCRIPTION_MAX,
    )?;
    validate_optional_text(
        payload.keywords.as_ref().and_then(|k| k.as_deref()),
        "Keywords",
        KEYWORDS_MAX,
    )
}

#[derive(Debug, Serialize, Deserialize, utoipa::ToSchema)]
pub struct CourseResponse {
    pub id: i32,
    pub subject_id: i32,
    pub title: String,
    pub description: Option<String>,
    pub keywords: Option<String>,
    pub created_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<crate::entity::course::Model> for CourseResponse {
    fn from(m: crate::entity::course::Model) -> Self {
        Self {
            id: m.id,
            subject_id: m.subject_id,
            title: m.title,
            description: m.description,
            keywords: m.keywords,
            created_by: m.created_by,
            created_at: m.created_at,
            updated_at: m.updated_at,
        }
    }
}

/// A course with its subject and ordered chapters, annotated for the caller.
#[derive(Serialize, Deserialize, utoipa::ToSchema)]
pub struct CourseDetailResponse {
    #[serde(flatten)]
    pub course: CourseResponse,
    pub subject_name: String,
    /// Ordered by `order_in_course`, ties by id.
    pub chapters: Vec<ChapterSummary>,
}

#[derive(Deserialize, utoipa::IntoParams)]
pub struct CourseListQuery {
    pub page: Option<u64>,
    pub per_page: Option<u64>,
    /// Case-insensitive match on title, description or keywords.
    pub search: Option<String>,
    pub subject_id: Option<i32>,
}

#[derive(Serialize, Deserialize, utoipa::ToSchema)]
pub struct CourseListResponse {
    pub data: Vec<CourseResponse>,
    pub pagination: Pagination,
}
