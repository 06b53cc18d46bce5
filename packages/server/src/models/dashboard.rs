use chrono::{DateTime, Utc};
use common::Entitlement;
use serde::{Deserialize, Serialize};

use super::course::CourseResponse;
use super::subject::SubjectResponse;

/// One recent watch event joined with its chapter and course titles.
#[derive(Debug, Serialize, Deserialize, utoipa::ToSchema)]
pub struct RecentProgress {
    pub chapter_id: i32,
    pub chapter_title: String,
    pub course_id: i32,
    pub course_title: String,
    pub watched_at: DateTime<Utc>,
}

#[derive(Serialize, Deserialize, utoipa::ToSchema)]
pub struct DashboardResponse {
    pub entitlement: Entitlement,
    /// Most recently created subjects.
    pub subjects: Vec<SubjectResponse>,
    /// Most recently created courses.
    pub courses: Vec<CourseResponse>,
    /// The caller's latest watch events, newest first.
    pub recent_progress: Vec<RecentProgress>,
}

#[derive(Debug, Serialize, Deserialize, utoipa::ToSchema)]
pub struct AdminStatsResponse {
    pub user_count: u64,
    pub admin_count: u64,
    /// Regular users whose access window has closed.
    pub expired_user_count: u64,
    pub subject_count: u64,
    pub course_count: u64,
    pub chapter_count: u64,
}
