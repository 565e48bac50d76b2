//! Create follow table migration.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Follow::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Follow::Id)
                            .string_len(32)
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Follow::PostId).string_len(32).not_null())
                    .col(
                        ColumnDef::new(Follow::UserHandle)
                            .string_len(128)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Follow::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_follow_post")
                            .from(Follow::Table, Follow::PostId)
                            .to(Post::Table, Post::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_follow_user")
                            .from(Follow::Table, Follow::UserHandle)
                            .to(User::Table, User::Handle)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // Unique index: (post_id, user_handle) - the store-side guard that
        // makes "at most one follow per pair" hold under concurrency
        manager
            .create_index(
                Index::create()
                    .name("idx_follow_post_user")
                    .table(Follow::Table)
                    .col(Follow::PostId)
                    .col(Follow::UserHandle)
                    .unique()
                    .to_owned(),
            )
            .await?;

        // Index: user_handle (listing a user's follows)
        manager
            .create_index(
                Index::create()
                    .name("idx_follow_user_handle")
                    .table(Follow::Table)
                    .col(Follow::UserHandle)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Follow::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum Follow {
    Table,
    Id,
    PostId,
    UserHandle,
    CreatedAt,
}

#[derive(Iden)]
enum Post {
    Table,
    Id,
}

#[derive(Iden)]
enum User {
    Table,
    Handle,
}
