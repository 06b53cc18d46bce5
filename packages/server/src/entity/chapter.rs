use common::ordering::Positioned;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[sea_orm::model]
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "chapter")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    pub title: String,
    #[sea_orm(column_type = "Text", nullable)]
    pub description: Option<String>,
    /// Object path in video storage, or `common::NO_VIDEO_SENTINEL`.
    pub video_storage_path: String,
    pub order_in_course: i32,

    pub course_id: i32,
    #[sea_orm(belongs_to, from = "course_id", to = "id")]
    pub course: HasOne<super::course::Entity>,

    #[sea_orm(has_many)]
    pub progress: HasMany<super::chapter_progress::Entity>,

    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

impl ActiveModelBehavior for ActiveModel {}

impl Positioned for Model {
    fn id(&self) -> i32 {
        self.id
    }
    fn position(&self) -> i32 {
        self.order_in_course
    }
}
