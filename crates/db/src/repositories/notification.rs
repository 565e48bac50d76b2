//! Notification repository.
//!
//! A notification's id is the id of the follow or comment that triggered it,
//! so a redelivered event collides with the row it already wrote instead of
//! duplicating it.

use std::sync::Arc;

use crate::entities::{Notification, notification};
use chirp_common::{AppError, AppResult};
use sea_orm::{
    ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, QuerySelect,
    sea_query::{Expr, OnConflict},
};

/// Notification repository for database operations.
#[derive(Clone)]
pub struct NotificationRepository {
    db: Arc<DatabaseConnection>,
}

impl NotificationRepository {
    /// Create a new notification repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Insert a notification, silently doing nothing if one with the same id
    /// already exists. Returns whether a row was written.
    pub async fn create_idempotent(&self, model: notification::ActiveModel) -> AppResult<bool> {
        let result = Notification::insert(model)
            .on_conflict(
                OnConflict::column(notification::Column::Id)
                    .do_nothing()
                    .to_owned(),
            )
            .exec_without_returning(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(result > 0)
    }

    /// Delete a notification by id. Missing rows are not an error; the fan-out
    /// layer calls this for events whose notification may never have existed.
    pub async fn delete_by_id(&self, id: &str) -> AppResult<()> {
        Notification::delete_by_id(id)
            .exec(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(())
    }

    /// Delete every notification referencing a post.
    pub async fn delete_by_post(&self, post_id: &str) -> AppResult<u64> {
        let result = Notification::delete_many()
            .filter(notification::Column::PostId.eq(post_id))
            .exec(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(result.rows_affected)
    }

    /// Get the most recent notifications for a recipient.
    pub async fn find_by_recipient(
        &self,
        recipient: &str,
        limit: u64,
    ) -> AppResult<Vec<notification::Model>> {
        Notification::find()
            .filter(notification::Column::Recipient.eq(recipient))
            .order_by_desc(notification::Column::CreatedAt)
            .limit(limit)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Mark a batch of notifications read.
    ///
    /// The recipient filter keeps a user from marking someone else's
    /// notifications; ids belonging to another user are silently skipped.
    pub async fn mark_read(&self, ids: &[String], recipient: &str) -> AppResult<u64> {
        if ids.is_empty() {
            return Ok(0);
        }

        let result = Notification::update_many()
            .col_expr(notification::Column::IsRead, Expr::value(true))
            .filter(notification::Column::Id.is_in(ids.iter().map(String::as_str)))
            .filter(notification::Column::Recipient.eq(recipient))
            .exec(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(result.rows_affected)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::entities::notification::NotificationType;
    use chrono::Utc;
    use sea_orm::{DatabaseBackend, MockDatabase, MockExecResult, Set};

    fn create_test_notification(id: &str, recipient: &str) -> notification::Model {
        notification::Model {
            id: id.to_string(),
            recipient: recipient.to_string(),
            sender: "bob".to_string(),
            post_id: "p1".to_string(),
            notification_type: NotificationType::Follow,
            is_read: false,
            created_at: Utc::now().into(),
        }
    }

    fn active_from(model: &notification::Model) -> notification::ActiveModel {
        notification::ActiveModel {
            id: Set(model.id.clone()),
            recipient: Set(model.recipient.clone()),
            sender: Set(model.sender.clone()),
            post_id: Set(model.post_id.clone()),
            notification_type: Set(model.notification_type.clone()),
            is_read: Set(model.is_read),
            created_at: Set(model.created_at),
        }
    }

    #[tokio::test]
    async fn test_create_idempotent_writes_row() {
        let model = create_test_notification("f1", "alice");

        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_exec_results([MockExecResult {
                    last_insert_id: 0,
                    rows_affected: 1,
                }])
                .into_connection(),
        );

        let repo = NotificationRepository::new(db);
        let written = repo.create_idempotent(active_from(&model)).await.unwrap();

        assert!(written);
    }

    #[tokio::test]
    async fn test_create_idempotent_duplicate_is_noop() {
        let model = create_test_notification("f1", "alice");

        // Conflict on the id: zero rows affected, no error
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_exec_results([MockExecResult {
                    last_insert_id: 0,
                    rows_affected: 0,
                }])
                .into_connection(),
        );

        let repo = NotificationRepository::new(db);
        let written = repo.create_idempotent(active_from(&model)).await.unwrap();

        assert!(!written);
    }

    #[tokio::test]
    async fn test_find_by_recipient() {
        let n1 = create_test_notification("f1", "alice");
        let n2 = create_test_notification("c1", "alice");

        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[n1, n2]])
                .into_connection(),
        );

        let repo = NotificationRepository::new(db);
        let result = repo.find_by_recipient("alice", 10).await.unwrap();

        assert_eq!(result.len(), 2);
    }

    #[tokio::test]
    async fn test_mark_read_empty_batch_is_noop() {
        let db = Arc::new(MockDatabase::new(DatabaseBackend::Postgres).into_connection());

        let repo = NotificationRepository::new(db);
        let updated = repo.mark_read(&[], "alice").await.unwrap();

        assert_eq!(updated, 0);
    }

    #[tokio::test]
    async fn test_mark_read_updates_rows() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_exec_results([MockExecResult {
                    last_insert_id: 0,
                    rows_affected: 2,
                }])
                .into_connection(),
        );

        let repo = NotificationRepository::new(db);
        let updated = repo
            .mark_read(&["f1".to_string(), "c1".to_string()], "alice")
            .await
            .unwrap();

        assert_eq!(updated, 2);
    }
}
