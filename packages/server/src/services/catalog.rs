use chrono::Utc;
use sea_orm::sea_query::LockType;
use sea_orm::*;
use tracing::instrument;
use uuid::Uuid;

use crate::entity::{chapter, course, subject};
use crate::error::AppError;
use crate::models::course::{CreateCourseRequest, UpdateCourseRequest};
use crate::models::shared::normalize_optional;
use crate::models::subject::{CreateSubjectRequest, UpdateSubjectRequest};

pub async fn find_subject<C: ConnectionTrait>(db: &C, id: i32) -> Result<subject::Model, AppError> {
    subject::Entity::find_by_id(id)
        .one(db)
        .await?
        .ok_or_else(|| AppError::NotFound("Subject not found".into()))
}

pub async fn find_course<C: ConnectionTrait>(db: &C, id: i32) -> Result<course::Model, AppError> {
    course::Entity::find_by_id(id)
        .one(db)
        .await?
        .ok_or_else(|| AppError::NotFound("Course not found".into()))
}

async fn ensure_subject_name_free<C: ConnectionTrait>(
    db: &C,
    name: &str,
    except: Option<i32>,
) -> Result<(), AppError> {
    let mut query = subject::Entity::find().filter(subject::Column::Name.eq(name));
    if let Some(id) = except {
        query = query.filter(subject::Column::Id.ne(id));
    }
    if query.count(db).await? > 0 {
        return Err(AppError::Conflict(format!(
            "A subject named '{name}' already exists"
        )));
    }
    Ok(())
}

fn map_subject_unique(err: DbErr, name: &str) -> AppError {
    match err.sql_err() {
        Some(SqlErr::UniqueConstraintViolation(_)) => {
            AppError::Conflict(format!("A subject named '{name}' already exists"))
        }
        _ => AppError::from(err),
    }
}

#[instrument(skip(db, payload), fields(name = %payload.name))]
pub async fn create_subject<C: ConnectionTrait>(
    db: &C,
    payload: CreateSubjectRequest,
) -> Result<subject::Model, AppError> {
    let name = payload.name.trim().to_string();
    ensure_subject_name_free(db, &name, None).await?;

    let now = Utc::now();
    subject::ActiveModel {
        name: Set(name.clone()),
        description: Set(normalize_optional(payload.description)),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    }
    .insert(db)
    .await
    .map_err(|e| map_subject_unique(e, &name))
}

#[instrument(skip(db, payload))]
pub async fn update_subject<C>(
    db: &C,
    id: i32,
    payload: UpdateSubjectRequest,
) -> Result<subject::Model, AppError>
where
    C: ConnectionTrait + TransactionTrait,
{
    if payload == UpdateSubjectRequest::default() {
        return find_subject(db, id).await;
    }

    let txn = db.begin().await?;
    let existing = find_subject(&txn, id).await?;
    let mut active: subject::ActiveModel = existing.into();

    let mut new_name = None;
    if let Some(ref name) = payload.name {
        let name = name.trim().to_string();
        ensure_subject_name_free(&txn, &name, Some(id)).await?;
        active.name = Set(name.clone());
        new_name = Some(name);
    }
    if let Some(description) = payload.description {
        active.description = Set(normalize_optional(description));
    }
    active.updated_at = Set(Utc::now());

    let model = active
        .update(&txn)
        .await
        .map_err(|e| map_subject_unique(e, new_name.as_deref().unwrap_or_default()))?;
    txn.commit().await?;
    Ok(model)
}

/// Delete a subject. Refused while any course still belongs to it.
#[instrument(skip(db))]
pub async fn delete_subject<C>(db: &C, id: i32) -> Result<(), AppError>
where
    C: ConnectionTrait + TransactionTrait,
{
    let txn = db.begin().await?;
    subject::Entity::find_by_id(id)
        .lock(LockType::Update)
        .one(&txn)
        .await?
        .ok_or_else(|| AppError::NotFound("Subject not found".into()))?;

    let course_count = course::Entity::find()
        .filter(course::Column::SubjectId.eq(id))
        .count(&txn)
        .await?;
    if course_count > 0 {
        return Err(AppError::Conflict(format!(
            "Cannot delete subject with {course_count} existing course(s)"
        )));
    }

    subject::Entity::delete_by_id(id).exec(&txn).await?;
    txn.commit().await?;
    Ok(())
}

#[instrument(skip(db, payload), fields(subject_id = payload.subject_id))]
pub async fn create_course<C>(
    db: &C,
    created_by: Uuid,
    payload: CreateCourseRequest,
) -> Result<course::Model, AppError>
where
    C: ConnectionTrait + TransactionTrait,
{
    let txn = db.begin().await?;
    find_subject(&txn, payload.subject_id).await?;

    let now = Utc::now();
    let model = course::ActiveModel {
        subject_id: Set(payload.subject_id),
        title: Set(payload.title.trim().to_string()),
        description: Set(normalize_optional(payload.description)),
        keywords: Set(normalize_optional(payload.keywords)),
        created_by: Set(Some(created_by)),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    }
    .insert(&txn)
    .await?;

    txn.commit().await?;
    Ok(model)
}

#[instrument(skip(db, payload))]
pub async fn update_course<C>(
    db: &C,
    id: i32,
    payload: UpdateCourseRequest,
) -> Result<course::Model, AppError>
where
    C: ConnectionTrait + TransactionTrait,
{
    if payload == UpdateCourseRequest::default() {
        return find_course(db, id).await;
    }

    let txn = db.begin().await?;
    let existing = find_course(&txn, id).await?;
    if let Some(subject_id) = payload.subject_id
        && subject_id != existing.subject_id
    {
        find_subject(&txn, subject_id).await?;
    }

    let mut active: course::ActiveModel = existing.into();
    if let Some(subject_id) = payload.subject_id {
        active.subject_id = Set(subject_id);
    }
    if let Some(ref title) = payload.title {
        active.title = Set(title.trim().to_string());
    }
    if let Some(description) = payload.description {
        active.description = Set(normalize_optional(description));
    }
    if let Some(keywords) = payload.keywords {
        active.keywords = Set(normalize_optional(keywords));
    }
    active.updated_at = Set(Utc::now());

    let model = active.update(&txn).await?;
    txn.commit().await?;
    Ok(model)
}

/// Delete a course. Refused while any chapter still belongs to it.
#[instrument(skip(db))]
pub async fn delete_course<C>(db: &C, id: i32) -> Result<(), AppError>
where
    C: ConnectionTrait + TransactionTrait,
{
    let txn = db.begin().await?;
    course::Entity::find_by_id(id)
        .lock(LockType::Update)
        .one(&txn)
        .await?
        .ok_or_else(|| AppError::NotFound("Course not found".into()))?;

    let chapter_count = chapter::Entity::find()
        .filter(chapter::Column::CourseId.eq(id))
        .count(&txn)
        .await?;
    if chapter_count > 0 {
        return Err(AppError::Conflict(format!(
            "Cannot delete course with {chapter_count} existing chapter(s)"
        )));
    }

    course::Entity::delete_by_id(id).exec(&txn).await?;
    txn.commit().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use chrono::{DateTime, TimeZone};

    use super::*;

    fn at() -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000, 0).unwrap()
    }

    fn math() -> subject::Model {
        subject::Model {
            id: 1,
            name: "Math".into(),
            description: None,
            created_at: at(),
            updated_at: at(),
        }
    }

    fn calculus() -> course::Model {
        course::Model {
            id: 1,
            title: "Calculus I".into(),
            description: None,
            keywords: None,
            created_by: None,
            subject_id: 1,
            created_at: at(),
            updated_at: at(),
        }
    }

    fn count_row(n: i64) -> BTreeMap<&'static str, Value> {
        BTreeMap::from([("num_items", Value::from(n))])
    }

    #[tokio::test]
    async fn subject_with_courses_is_not_deleted() {
        let db = MockDatabase::new(DbBackend::Postgres)
            .append_query_results([vec![math()]])
            .append_query_results([vec![count_row(1)]])
            .into_connection();

        let err = delete_subject(&db, 1).await.unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
        assert!(!format!("{:?}", db.into_transaction_log()).contains("DELETE"));
    }

    #[tokio::test]
    async fn empty_subject_is_deleted() {
        let db = MockDatabase::new(DbBackend::Postgres)
            .append_query_results([vec![math()]])
            .append_query_results([vec![count_row(0)]])
            .append_exec_results([MockExecResult {
                last_insert_id: 0,
                rows_affected: 1,
            }])
            .into_connection();

        delete_subject(&db, 1).await.unwrap();
        assert!(format!("{:?}", db.into_transaction_log()).contains("DELETE"));
    }

    #[tokio::test]
    async fn course_with_chapters_is_not_deleted() {
        let db = MockDatabase::new(DbBackend::Postgres)
            .append_query_results([vec![calculus()]])
            .append_query_results([vec![count_row(2)]])
            .into_connection();

        let err = delete_course(&db, 1).await.unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
        assert!(!format!("{:?}", db.into_transaction_log()).contains("DELETE"));
    }

    #[tokio::test]
    async fn duplicate_subject_name_is_conflict() {
        let db = MockDatabase::new(DbBackend::Postgres)
            .append_query_results([vec![count_row(1)]])
            .into_connection();

        let err = create_subject(
            &db,
            CreateSubjectRequest {
                name: " Math ".into(),
                description: None,
            },
        )
        .await
        .unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
    }

    #[tokio::test]
    async fn course_under_missing_subject_is_not_found() {
        let db = MockDatabase::new(DbBackend::Postgres)
            .append_query_results([Vec::<subject::Model>::new()])
            .into_connection();

        let err = create_course(
            &db,
            Uuid::now_v7(),
            CreateCourseRequest {
                subject_id: 42,
                title: "Calculus I".into(),
                description: None,
                keywords: None,
            },
        )
        .await
        .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }
}
