use chrono::{DateTime, Utc};
use common::{AccessWindow, UserRole};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[sea_orm::model]
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "profile")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    #[sea_orm(unique)]
    pub username: String,
    /// Argon2 PHC string.
    #[serde(skip_serializing)]
    pub password: String,
    pub role: UserRole,
    pub access_expiry_date: DateTimeUtc,

    pub phone_number: String,
    pub school: Option<String>,
    pub college: Option<String>,
    pub major: Option<String>,
    pub grade_year: Option<String>,

    #[sea_orm(has_many)]
    pub sessions: HasMany<super::session::Entity>,

    #[sea_orm(has_many)]
    pub progress: HasMany<super::chapter_progress::Entity>,

    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

impl ActiveModelBehavior for ActiveModel {}

impl AccessWindow for Model {
    fn access_expiry(&self) -> Option<DateTime<Utc>> {
        Some(self.access_expiry_date)
    }
}
