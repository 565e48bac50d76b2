//! Notification service.

use chirp_common::AppResult;
use chirp_db::{entities::user, repositories::NotificationRepository};

/// Notification service for business logic.
#[derive(Clone)]
pub struct NotificationService {
    notification_repo: NotificationRepository,
}

impl NotificationService {
    /// Create a new notification service.
    #[must_use]
    pub const fn new(notification_repo: NotificationRepository) -> Self {
        Self { notification_repo }
    }

    /// Mark a batch of the user's notifications read. Ids that do not belong
    /// to the user are ignored. Returns how many were updated.
    pub async fn mark_read(&self, user: &user::Model, ids: Vec<String>) -> AppResult<u64> {
        self.notification_repo.mark_read(&ids, &user.handle).await
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::Utc;
    use sea_orm::{DatabaseBackend, MockDatabase, MockExecResult};
    use std::sync::Arc;

    fn create_test_user(handle: &str) -> user::Model {
        user::Model {
            handle: handle.to_string(),
            email: format!("{handle}@example.com"),
            password_hash: "$argon2id$test".to_string(),
            token: "test_token".to_string(),
            image_url: "/files/no-img.png".to_string(),
            bio: None,
            website: None,
            location: None,
            created_at: Utc::now().into(),
        }
    }

    #[tokio::test]
    async fn test_mark_read_counts_updates() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_exec_results([MockExecResult {
                    last_insert_id: 0,
                    rows_affected: 2,
                }])
                .into_connection(),
        );
        let service = NotificationService::new(NotificationRepository::new(db));

        let updated = service
            .mark_read(
                &create_test_user("alice"),
                vec!["f1".to_string(), "c1".to_string()],
            )
            .await
            .unwrap();

        assert_eq!(updated, 2);
    }
}
