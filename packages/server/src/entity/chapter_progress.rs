use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Last time a user obtained a playable URL for a chapter. One row per pair.
#[sea_orm::model]
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "chapter_progress")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub user_id: Uuid,
    #[sea_orm(primary_key, auto_increment = false)]
    pub chapter_id: i32,
    #[sea_orm(belongs_to, from = "user_id", to = "id")]
    pub user: HasOne<super::profile::Entity>,
    #[sea_orm(belongs_to, from = "chapter_id", to = "id")]
    pub chapter: HasOne<super::chapter::Entity>,

    pub watched_at: DateTimeUtc,
}

impl ActiveModelBehavior for ActiveModel {}
