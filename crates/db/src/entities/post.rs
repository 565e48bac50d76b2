//! Post entity.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "post")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,

    /// Author user handle
    #[sea_orm(indexed)]
    pub author_handle: String,

    /// Author's image URL (denormalized display field, rewritten when the
    /// author changes their profile image)
    pub author_image: String,

    pub title: String,

    #[sea_orm(column_type = "Text")]
    pub body: String,

    /// Derived counter; kept consistent with the follow table inside the
    /// same transaction as every follow/unfollow
    pub follow_count: i32,

    /// Derived counter; kept consistent with the comment table inside the
    /// same transaction as every comment insert
    pub comment_count: i32,

    pub created_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::AuthorHandle",
        to = "super::user::Column::Handle",
        on_delete = "Cascade"
    )]
    Author,

    #[sea_orm(has_many = "super::comment::Entity")]
    Comment,

    #[sea_orm(has_many = "super::follow::Entity")]
    Follow,
}

impl Related<super::user::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Author.def()
    }
}

impl Related<super::comment::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Comment.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
