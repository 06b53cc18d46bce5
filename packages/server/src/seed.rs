use chrono::Utc;
use common::UserRole;
use sea_orm::*;
use sea_orm::sea_query::Index;
use tracing::info;

use crate::config::AppConfig;
use crate::entity::{chapter, chapter_progress, session};
use crate::error::AppError;
use crate::services::account::{self, NewProfile, grant_from_now};

/// Create the configured bootstrap administrator if it does not exist yet.
///
/// An existing account with that username is left untouched, whatever its role.
pub async fn seed_bootstrap_admin(
    db: &DatabaseConnection,
    config: &AppConfig,
) -> Result<(), AppError> {
    let (Some(username), Some(password)) = (
        config.bootstrap.admin_username.as_deref(),
        config.bootstrap.admin_password.as_deref(),
    ) else {
        return Ok(());
    };

    if let Some(existing) = account::find_by_username(db, username).await? {
        if existing.role != UserRole::Admin {
            tracing::warn!(
                username,
                "Bootstrap admin username belongs to a non-admin account; leaving it alone"
            );
        }
        return Ok(());
    }

    // Administrators are not bound by the signup grant; give them a long window.
    let days = std::cmp::Ord::max(config.access.admin_grant_days, 3650);
    let model = account::create_profile(
        db,
        NewProfile {
            username: username.to_string(),
            password: password.to_string(),
            phone_number: "-".into(),
            role: UserRole::Admin,
            access_expiry_date: grant_from_now(days),
            school: None,
            college: None,
            major: None,
            grade_year: None,
        },
    )
    .await?;

    info!(profile_id = %model.id, username, "Created bootstrap admin");
    Ok(())
}

/// Ensure required database indexes exist.
///
/// SeaORM's schema-sync doesn't support composite non-unique indexes,
/// so we create them manually on startup.
pub async fn ensure_indexes(db: &DatabaseConnection) -> Result<(), DbErr> {
    let backend = db.get_database_backend();

    let indexes = [
        // Sibling lookups and next-order: WHERE course_id = ? ORDER BY order_in_course
        (
            "idx_chapter_course_order",
            Index::create()
                .if_not_exists()
                .name("idx_chapter_course_order")
                .table(chapter::Entity)
                .col(chapter::Column::CourseId)
                .col(chapter::Column::OrderInCourse)
                .to_owned(),
        ),
        // Revocation on password reset and account deletion
        (
            "idx_session_profile",
            Index::create()
                .if_not_exists()
                .name("idx_session_profile")
                .table(session::Entity)
                .col(session::Column::ProfileId)
                .to_owned(),
        ),
        // Dashboard: a user's latest watch events
        (
            "idx_progress_user_watched",
            Index::create()
                .if_not_exists()
                .name("idx_progress_user_watched")
                .table(chapter_progress::Entity)
                .col(chapter_progress::Column::UserId)
                .col(chapter_progress::Column::WatchedAt)
                .to_owned(),
        ),
    ];

    for (name, stmt) in indexes {
        match db.execute_raw(backend.build(&stmt)).await {
            Ok(_) => info!("Ensured index {name} exists"),
            Err(e) => tracing::warn!("Failed to create index {name}: {}", e),
        }
    }

    Ok(())
}

/// Delete sessions whose token lifetime has passed.
pub async fn purge_expired_sessions(db: &DatabaseConnection) -> Result<u64, DbErr> {
    let result = session::Entity::delete_many()
        .filter(session::Column::ExpiresAt.lte(Utc::now()))
        .exec(db)
        .await?;
    if result.rows_affected > 0 {
        info!("Purged {} expired sessions", result.rows_affected);
    }
    Ok(result.rows_affected)
}
