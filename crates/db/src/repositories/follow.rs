//! Follow repository.
//!
//! Follow creation and deletion keep `post.follow_count` consistent with the
//! follow table: each is a single transaction pairing the row change with a
//! store-side counter expression. The count is never read into process memory
//! and written back.

use std::sync::Arc;

use crate::entities::{Follow, Post, follow, post};
use crate::repositories::is_unique_violation;
use chirp_common::{AppError, AppResult};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait, ModelTrait,
    QueryFilter, Set, TransactionTrait, sea_query::Expr,
};

/// Follow repository for database operations.
#[derive(Clone)]
pub struct FollowRepository {
    db: Arc<DatabaseConnection>,
}

impl FollowRepository {
    /// Create a new follow repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Find a follow by `(post_id, user_handle)`.
    pub async fn find_by_pair(
        &self,
        post_id: &str,
        user_handle: &str,
    ) -> AppResult<Option<follow::Model>> {
        Self::find_pair_on(self.db.as_ref(), post_id, user_handle).await
    }

    async fn find_pair_on<C: ConnectionTrait>(
        conn: &C,
        post_id: &str,
        user_handle: &str,
    ) -> AppResult<Option<follow::Model>> {
        Follow::find()
            .filter(follow::Column::PostId.eq(post_id))
            .filter(follow::Column::UserHandle.eq(user_handle))
            .one(conn)
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Get all follows by a user.
    pub async fn find_by_user(&self, user_handle: &str) -> AppResult<Vec<follow::Model>> {
        Follow::find()
            .filter(follow::Column::UserHandle.eq(user_handle))
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Create a follow and increment the post's `follow_count`, atomically.
    ///
    /// The pre-flight existence check callers may have done is only an
    /// optimistic check; it is re-validated here inside the transaction, and
    /// the unique index on `(post_id, user_handle)` backstops the race where
    /// two requests pass that check concurrently. Either way the loser gets
    /// [`AppError::Conflict`] and the counter moves exactly once.
    pub async fn create_and_count(
        &self,
        id: &str,
        post_id: &str,
        user_handle: &str,
    ) -> AppResult<follow::Model> {
        let txn = self
            .db
            .begin()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        if Self::find_pair_on(&txn, post_id, user_handle)
            .await?
            .is_some()
        {
            return Err(AppError::Conflict("Post already followed".to_string()));
        }

        let model = follow::ActiveModel {
            id: Set(id.to_string()),
            post_id: Set(post_id.to_string()),
            user_handle: Set(user_handle.to_string()),
            created_at: Set(chrono::Utc::now().into()),
        };

        let created = model.insert(&txn).await.map_err(|e| {
            if is_unique_violation(&e) {
                AppError::Conflict("Post already followed".to_string())
            } else {
                AppError::Database(e.to_string())
            }
        })?;

        Post::update_many()
            .col_expr(
                post::Column::FollowCount,
                Expr::col(post::Column::FollowCount).add(1),
            )
            .filter(post::Column::Id.eq(post_id))
            .exec(&txn)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        txn.commit()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(created)
    }

    /// Delete a follow and decrement the post's `follow_count`, atomically.
    ///
    /// Returns the id of the deleted follow (the fan-out layer uses it to
    /// locate the notification it created). The lookup is only optimistic,
    /// like the one in [`Self::create_and_count`]: a concurrent unfollow can
    /// delete the row between the lookup and the DELETE, in which case zero
    /// rows are affected and the loser gets [`AppError::Conflict`] before the
    /// decrement runs. The decrement itself is clamped at zero so the counter
    /// can never go negative.
    pub async fn delete_and_count(&self, post_id: &str, user_handle: &str) -> AppResult<String> {
        let txn = self
            .db
            .begin()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        let Some(existing) = Self::find_pair_on(&txn, post_id, user_handle).await? else {
            return Err(AppError::Conflict("Post never followed".to_string()));
        };
        let follow_id = existing.id.clone();

        let deleted = existing
            .delete(&txn)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        if deleted.rows_affected == 0 {
            return Err(AppError::Conflict("Post never followed".to_string()));
        }

        Post::update_many()
            .col_expr(
                post::Column::FollowCount,
                Expr::cust("GREATEST(follow_count - 1, 0)"),
            )
            .filter(post::Column::Id.eq(post_id))
            .exec(&txn)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        txn.commit()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(follow_id)
    }
}
