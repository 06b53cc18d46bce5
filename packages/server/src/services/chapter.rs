use chrono::Utc;
use common::ordering::{self, MoveDirection, SwapPlan};
use common::storage::VideoStore;
use common::{NO_VIDEO_SENTINEL, has_video};
use sea_orm::prelude::Expr;
use sea_orm::sea_query::LockType;
use sea_orm::*;
use tracing::instrument;

use crate::entity::{chapter, chapter_progress, course};
use crate::error::AppError;
use crate::models::chapter::UpdateChapterRequest;
use crate::models::shared::normalize_optional;

/// Fields for a new chapter. `order_in_course = None` appends.
#[derive(Debug, Clone)]
pub struct NewChapter {
    pub course_id: i32,
    pub title: String,
    pub description: Option<String>,
    pub order_in_course: Option<i32>,
}

pub async fn find_chapter<C: ConnectionTrait>(db: &C, id: i32) -> Result<chapter::Model, AppError> {
    chapter::Entity::find_by_id(id)
        .one(db)
        .await?
        .ok_or_else(|| AppError::NotFound("Chapter not found".into()))
}

async fn find_course_for_update<C: ConnectionTrait>(
    txn: &C,
    id: i32,
) -> Result<course::Model, AppError> {
    course::Entity::find_by_id(id)
        .lock(LockType::Update)
        .one(txn)
        .await?
        .ok_or_else(|| AppError::NotFound("Course not found".into()))
}

/// All chapters of a course in display order.
pub async fn list_in_course<C: ConnectionTrait>(
    db: &C,
    course_id: i32,
) -> Result<Vec<chapter::Model>, AppError> {
    Ok(chapter::Entity::find()
        .filter(chapter::Column::CourseId.eq(course_id))
        .order_by_asc(chapter::Column::OrderInCourse)
        .order_by_asc(chapter::Column::Id)
        .all(db)
        .await?)
}

/// Order for a chapter appended to `course_id`: one past the current maximum, or 0.
pub async fn next_order<C: ConnectionTrait>(db: &C, course_id: i32) -> Result<i32, AppError> {
    let last = chapter::Entity::find()
        .filter(chapter::Column::CourseId.eq(course_id))
        .order_by_desc(chapter::Column::OrderInCourse)
        .one(db)
        .await?;
    ordering::next_position(last.map(|c| c.order_in_course))
        .ok_or_else(|| AppError::Validation("Chapter order overflow".into()))
}

/// Reject an explicit order already held by another chapter of the course.
async fn ensure_order_free<C: ConnectionTrait>(
    db: &C,
    course_id: i32,
    order: i32,
    except: Option<i32>,
) -> Result<(), AppError> {
    let mut query = chapter::Entity::find()
        .filter(chapter::Column::CourseId.eq(course_id))
        .filter(chapter::Column::OrderInCourse.eq(order));
    if let Some(id) = except {
        query = query.filter(chapter::Column::Id.ne(id));
    }
    if query.count(db).await? > 0 {
        return Err(AppError::Conflict(format!(
            "Order {order} is already used in this course"
        )));
    }
    Ok(())
}

/// Create a chapter with no video, appended or at the given order.
#[instrument(skip(db, new), fields(course_id = new.course_id))]
pub async fn append<C>(db: &C, new: NewChapter) -> Result<chapter::Model, AppError>
where
    C: ConnectionTrait + TransactionTrait,
{
    let txn = db.begin().await?;
    find_course_for_update(&txn, new.course_id).await?;

    let order = match new.order_in_course {
        Some(order) => {
            ensure_order_free(&txn, new.course_id, order, None).await?;
            order
        }
        None => next_order(&txn, new.course_id).await?,
    };

    let now = Utc::now();
    let model = chapter::ActiveModel {
        course_id: Set(new.course_id),
        title: Set(new.title.trim().to_string()),
        description: Set(normalize_optional(new.description)),
        video_storage_path: Set(NO_VIDEO_SENTINEL.to_string()),
        order_in_course: Set(order),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    }
    .insert(&txn)
    .await?;

    txn.commit().await?;
    Ok(model)
}

/// Move a chapter one step up or down within its course.
///
/// Returns the course's chapters in their new display order. At either edge
/// nothing is written. Both position updates happen in one transaction.
#[instrument(skip(db))]
pub async fn swap<C>(
    db: &C,
    chapter_id: i32,
    direction: MoveDirection,
) -> Result<Vec<chapter::Model>, AppError>
where
    C: ConnectionTrait + TransactionTrait,
{
    let txn = db.begin().await?;
    let target = find_chapter(&txn, chapter_id).await?;
    // Serialises concurrent moves within the same course.
    find_course_for_update(&txn, target.course_id).await?;

    let mut siblings = list_in_course(&txn, target.course_id).await?;
    let plan = ordering::plan_swap(&siblings, chapter_id, direction)
        .ok_or_else(|| AppError::NotFound("Chapter not found".into()))?;

    if let SwapPlan::Swap { moved, neighbour } = plan {
        let now = Utc::now();
        for assignment in [moved, neighbour] {
            chapter::Entity::update_many()
                .col_expr(
                    chapter::Column::OrderInCourse,
                    Expr::value(assignment.position),
                )
                .col_expr(chapter::Column::UpdatedAt, Expr::value(now))
                .filter(chapter::Column::Id.eq(assignment.id))
                .exec(&txn)
                .await?;

            if let Some(sibling) = siblings.iter_mut().find(|c| c.id == assignment.id) {
                sibling.order_in_course = assignment.position;
                sibling.updated_at = now;
            }
        }
        ordering::sort_by_position(&mut siblings);
        tracing::debug!(moved = moved.id, neighbour = neighbour.id, "Swapped chapter order");
    }

    txn.commit().await?;
    Ok(siblings)
}

/// Apply a partial edit. A new `course_id` moves the chapter and keeps its
/// order value; neither course is renumbered.
#[instrument(skip(db, payload))]
pub async fn update<C>(
    db: &C,
    chapter_id: i32,
    payload: UpdateChapterRequest,
) -> Result<chapter::Model, AppError>
where
    C: ConnectionTrait + TransactionTrait,
{
    if payload == UpdateChapterRequest::default() {
        return find_chapter(db, chapter_id).await;
    }

    let txn = db.begin().await?;
    let existing = find_chapter(&txn, chapter_id).await?;

    let course_id = payload.course_id.unwrap_or(existing.course_id);
    if course_id != existing.course_id {
        find_course_for_update(&txn, course_id).await?;
    }
    if let Some(order) = payload.order_in_course
        && (order != existing.order_in_course || course_id != existing.course_id)
    {
        ensure_order_free(&txn, course_id, order, Some(chapter_id)).await?;
    }

    let mut active: chapter::ActiveModel = existing.into();
    if payload.course_id.is_some() {
        active.course_id = Set(course_id);
    }
    if let Some(ref title) = payload.title {
        active.title = Set(title.trim().to_string());
    }
    if let Some(description) = payload.description {
        active.description = Set(normalize_optional(description));
    }
    if let Some(order) = payload.order_in_course {
        active.order_in_course = Set(order);
    }
    active.updated_at = Set(Utc::now());

    let model = active.update(&txn).await?;
    txn.commit().await?;
    Ok(model)
}

/// Delete a chapter and its progress rows, then remove its video.
///
/// The object is removed after the commit. A failure there leaves an orphaned
/// object which is logged and not retried.
#[instrument(skip(db, store))]
pub async fn delete<C>(db: &C, store: &dyn VideoStore, chapter_id: i32) -> Result<(), AppError>
where
    C: ConnectionTrait + TransactionTrait,
{
    let txn = db.begin().await?;
    let chapter = find_chapter(&txn, chapter_id).await?;

    chapter_progress::Entity::delete_many()
        .filter(chapter_progress::Column::ChapterId.eq(chapter_id))
        .exec(&txn)
        .await?;
    chapter::Entity::delete_by_id(chapter_id).exec(&txn).await?;
    txn.commit().await?;

    remove_video_best_effort(store, &chapter.video_storage_path).await;
    Ok(())
}

/// Remove a stored video, logging instead of failing.
pub async fn remove_video_best_effort(store: &dyn VideoStore, path: &str) {
    if !has_video(path) {
        return;
    }
    match store.remove(path).await {
        Ok(true) => tracing::debug!(path, "Removed video object"),
        Ok(false) => tracing::debug!(path, "Video object was already gone"),
        Err(e) => tracing::warn!(path, error = %e, "Orphaned video object: removal failed"),
    }
}
