//! Wire types as the server returns them.

use chrono::{DateTime, Utc};
use common::entitlement::AccessWindow;
use common::{Entitlement, UserRole};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    pub id: Uuid,
    pub username: String,
    pub role: UserRole,
    pub access_expiry_date: DateTime<Utc>,
    pub phone_number: String,
    pub school: Option<String>,
    pub college: Option<String>,
    pub major: Option<String>,
    pub grade_year: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl AccessWindow for Profile {
    fn access_expiry(&self) -> Option<DateTime<Utc>> {
        Some(self.access_expiry_date)
    }
}

#[derive(Debug, Deserialize)]
pub struct LoginResponse {
    pub token: String,
    pub expires_at: DateTime<Utc>,
    pub profile: Profile,
}

#[derive(Debug, Deserialize)]
pub struct MeResponse {
    pub profile: Profile,
    pub entitlement: Entitlement,
}

/// Self-registration form. Only the username, password and phone are required.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SignUpForm {
    pub username: String,
    pub password: String,
    pub phone_number: String,
    pub school: Option<String>,
    pub college: Option<String>,
    pub major: Option<String>,
    pub grade_year: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Pagination {
    pub page: u64,
    pub per_page: u64,
    pub total: u64,
    pub total_pages: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Page<T> {
    pub data: Vec<T>,
    pub pagination: Pagination,
}

/// Search and paging parameters shared by every listing.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ListQuery {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub per_page: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub search: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subject_id: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub course_id: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<UserRole>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Subject {
    pub id: i32,
    pub name: String,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Course {
    pub id: i32,
    pub subject_id: i32,
    pub title: String,
    pub description: Option<String>,
    pub keywords: Option<String>,
    pub created_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CourseDetail {
    #[serde(flatten)]
    pub course: Course,
    pub subject_name: String,
    pub chapters: Vec<ChapterSummary>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Chapter {
    pub id: i32,
    pub course_id: i32,
    pub title: String,
    pub description: Option<String>,
    pub order_in_course: i32,
    pub has_video: bool,
    pub video_storage_path: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChapterSummary {
    pub id: i32,
    pub title: String,
    pub description: Option<String>,
    pub order_in_course: i32,
    pub has_video: bool,
    pub watched_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PlaybackLink {
    pub chapter_id: i32,
    pub url: String,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RecentProgress {
    pub chapter_id: i32,
    pub chapter_title: String,
    pub course_id: i32,
    pub course_title: String,
    pub watched_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Dashboard {
    pub entitlement: Entitlement,
    pub subjects: Vec<Subject>,
    pub courses: Vec<Course>,
    pub recent_progress: Vec<RecentProgress>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AdminStats {
    pub user_count: u64,
    pub admin_count: u64,
    pub expired_user_count: u64,
    pub subject_count: u64,
    pub course_count: u64,
    pub chapter_count: u64,
}
