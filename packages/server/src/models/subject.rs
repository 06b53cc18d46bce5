use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::AppError;

use super::shared::{Pagination, double_option, validate_optional_text, validate_required};

const NAME_MAX: usize = 128;
const DESCRIPTION_MAX: usize = 4096;

#[derive(Deserialize, utoipa::ToSchema)]
pub struct CreateSubjectRequest {
    /// Unique subject name.
    #[schema(example = "Math")]
    pub name: String,
    pub description: Option<String>,
}

pub fn validate_create_subject(payload: &CreateSubjectRequest) -> Result<(), AppError> {
    validate_required(&payload.name, "Name", NAME_MAX)?;
    validate_optional_text(payload.description.as_deref(), "Description", DESCRIPTION_MAX)
}

#[derive(Deserialize, Default, PartialEq, utoipa::ToSchema)]
pub struct UpdateSubjectRequest {
    pub name: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    #[schema(value_type = Option<String>)]
    pub description: Option<Option<String>>,
}

pub fn validate_update_subject(payload: &UpdateSubjectRequest) -> Result<(), AppError> {
    if let Some(ref name) = payload.name {
        validate_required(name, "Name", NAME_MAX)?;
    }
    validate_optional_text(
        payload.description.as_ref().and_then(|d| d.as_deref()),
        "Description",
        DESCRIPTION_MAX,
    )
}

#[derive(Debug, Serialize, Deserialize, utoipa::ToSchema)]
pub struct SubjectResponse {
    pub id: i32,
    #[schema(example = "Math")]
    pub name: String,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<crate::entity::subject::Model> for SubjectResponse {
    fn from(m: crate::entity::subject::Model) -> Self {
        Self {
            id: m.id,
            name: m.name,
            description: m.description,
            created_at: m.created_at,
            updated_at: m.updated_at,
        }
    }
}

#[derive(Deserialize, utoipa::IntoParams)]
pub struct SubjectListQuery {
    pub page: Option<u64>,
    pub per_page: Option<u64>,
    /// Case-insensitive match on name or description.
    pub search: Option<String>,
}

#[derive(Serialize, Deserialize, utoipa::ToSchema)]
pub struct SubjectListResponse {
    pub data: Vec<SubjectResponse>,
    pub pagination: Pagination,
}
