use std::collections::HashMap;

use axum::{Json, extract::State};
use chrono::Utc;
use common::Entitlement;
use sea_orm::*;
use tracing::instrument;

use crate::entity::{chapter, chapter_progress, course, subject};
use crate::error::{AppError, ErrorBody};
use crate::extractors::auth::AuthUser;
use crate::models::course::CourseResponse;
use crate::models::dashboard::{DashboardResponse, RecentProgress};
use crate::models::subject::SubjectResponse;
use crate::state::AppState;

const DASHBOARD_SUBJECTS: u64 = 3;
const DASHBOARD_COURSES: u64 = 4;
const DASHBOARD_RECENT: u64 = 5;

#[utoipa::path(
    get,
    path = "/",
    tag = "Dashboard",
    operation_id = "getDashboard",
    summary = "Landing page data",
    description = "The caller's entitlement, the newest subjects and courses, and the chapters the caller watched most recently.",
    responses(
        (status = 200, description = "Dashboard", body = DashboardResponse),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user), fields(profile_id = %auth_user.profile_id))]
pub async fn get_dashboard(
    auth_user: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<DashboardResponse>, AppError> {
    let db = &state.db;

    let subjects = subject::Entity::find()
        .order_by_desc(subject::Column::CreatedAt)
        .limit(DASHBOARD_SUBJECTS)
        .all(db)
        .await?
        .into_iter()
        .map(SubjectResponse::from)
        .collect();

    let courses = course::Entity::find()
        .order_by_desc(course::Column::CreatedAt)
        .order_by_desc(course::Column::Id)
        .limit(DASHBOARD_COURSES)
        .all(db)
        .await?
        .into_iter()
        .map(CourseResponse::from)
        .collect();

    Ok(Json(DashboardResponse {
        entitlement: Entitlement::evaluate(Some(&auth_user.access_expiry), Utc::now()),
        subjects,
        courses,
        recent_progress: recent_progress(db, &auth_user).await?,
    }))
}

async fn recent_progress(
    db: &DatabaseConnection,
    auth_user: &AuthUser,
) -> Result<Vec<RecentProgress>, AppError> {
    let rows = chapter_progress::Entity::find()
        .filter(chapter_progress::Column::UserId.eq(auth_user.profile_id))
        .order_by_desc(chapter_progress::Column::WatchedAt)
        .limit(DASHBOARD_RECENT)
        .find_also_related(chapter::Entity)
        .all(db)
        .await?;

    let course_ids: Vec<i32> = rows
        .iter()
        .filter_map(|(_, ch)| ch.as_ref().map(|c| c.course_id))
        .collect();
    let course_titles: HashMap<i32, String> = if course_ids.is_empty() {
        HashMap::new()
    } else {
        course::Entity::find()
            .filter(course::Column::Id.is_in(course_ids))
            .all(db)
            .await?
            .into_iter()
            .map(|c| (c.id, c.title))
            .collect()
    };

    Ok(rows
        .into_iter()
        .filter_map(|(progress, ch)| {
            let ch = ch?;
            Some(RecentProgress {
                chapter_id: ch.id,
                chapter_title: ch.title,
                course_id: ch.course_id,
                course_title: course_titles.get(&ch.course_id).cloned()?,
                watched_at: progress.watched_at,
            })
        })
        .collect())
}
