//! Store event fan-out.
//!
//! Primary writes (follows, comments, deletions, profile image changes)
//! commit first; side effects such as notification rows and denormalized
//! image propagation run afterwards, driven by a [`StoreEvent`] handed to
//! [`FanoutService::spawn`]. The primary write never waits on fan-out and
//! never fails because of it.

use std::sync::Arc;
use std::time::Duration;

use chirp_common::AppResult;
use chirp_db::{
    entities::notification::{self, NotificationType},
    repositories::{NotificationRepository, PostRepository},
};
use sea_orm::Set;

/// How many times a failing fan-out is attempted before it is dropped.
const MAX_ATTEMPTS: u32 = 3;

/// Backoff before the first retry; doubles per attempt.
const BASE_BACKOFF: Duration = Duration::from_millis(100);

/// A change to the primary store that side effects are derived from.
#[derive(Debug, Clone)]
pub enum StoreEvent {
    /// A follow row was committed.
    FollowCreated {
        follow_id: String,
        post_id: String,
        sender: String,
    },
    /// A follow row was deleted.
    FollowDeleted { follow_id: String },
    /// A comment row was committed.
    CommentCreated {
        comment_id: String,
        post_id: String,
        sender: String,
    },
    /// A post and its children were deleted.
    PostDeleted { post_id: String },
    /// A user's profile image URL changed.
    UserImageChanged { handle: String, image_url: String },
}

/// Consumes store events and applies their side effects.
#[derive(Clone)]
pub struct FanoutService {
    post_repo: PostRepository,
    notification_repo: NotificationRepository,
}

impl FanoutService {
    /// Create a new fan-out service.
    #[must_use]
    pub const fn new(post_repo: PostRepository, notification_repo: NotificationRepository) -> Self {
        Self {
            post_repo,
            notification_repo,
        }
    }

    /// Hand an event off for asynchronous processing.
    pub fn spawn(self: &Arc<Self>, event: StoreEvent) {
        let this = Arc::clone(self);
        tokio::spawn(async move {
            this.dispatch(event).await;
        });
    }

    /// Apply an event, retrying transient failures with exponential backoff.
    ///
    /// Only server-class errors are retried. Every side effect is idempotent
    /// (conflict-ignoring inserts, absent-row deletes, already-propagated
    /// rows skipped), so a retry after a partially applied attempt is safe.
    /// After the last attempt the event is dropped and logged; the primary
    /// write it derives from has already committed.
    pub async fn dispatch(&self, event: StoreEvent) {
        for attempt in 1..=MAX_ATTEMPTS {
            match self.apply(&event).await {
                Ok(()) => return,
                Err(e) if e.is_server_error() && attempt < MAX_ATTEMPTS => {
                    let backoff = BASE_BACKOFF * 2u32.pow(attempt - 1);
                    tracing::warn!(
                        error = %e,
                        attempt = attempt,
                        backoff_ms = backoff.as_millis() as u64,
                        event = ?event,
                        "Fan-out attempt failed, retrying"
                    );
                    tokio::time::sleep(backoff).await;
                }
                Err(e) => {
                    tracing::error!(error = %e, event = ?event, "Dropping fan-out event");
                    return;
                }
            }
        }
    }

    async fn apply(&self, event: &StoreEvent) -> AppResult<()> {
        match event {
            StoreEvent::FollowCreated {
                follow_id,
                post_id,
                sender,
            } => {
                self.notify(follow_id, post_id, sender, NotificationType::Follow)
                    .await
            }
            StoreEvent::CommentCreated {
                comment_id,
                post_id,
                sender,
            } => {
                self.notify(comment_id, post_id, sender, NotificationType::Comment)
                    .await
            }
            StoreEvent::FollowDeleted { follow_id } => {
                // Events are not ordered across tasks: a rapid follow/unfollow
                // can run this delete before the create lands, leaving a
                // notification for a dead follow until the post's own deletion
                // sweeps it.
                self.notification_repo.delete_by_id(follow_id).await
            }
            StoreEvent::PostDeleted { post_id } => {
                let removed = self.notification_repo.delete_by_post(post_id).await?;
                if removed > 0 {
                    tracing::debug!(post_id = %post_id, removed = removed, "Swept residual notifications");
                }
                Ok(())
            }
            StoreEvent::UserImageChanged { handle, image_url } => {
                let rewritten = self.post_repo.update_author_image(handle, image_url).await?;
                tracing::info!(handle = %handle, rewritten = rewritten, "Propagated profile image to posts");
                Ok(())
            }
        }
    }

    /// Write the notification for a follow or comment.
    ///
    /// The notification id is the id of the triggering row, so a redelivered
    /// event lands on the existing row and writes nothing. A post that has
    /// since been deleted, or an author acting on their own post, produces no
    /// notification.
    async fn notify(
        &self,
        source_id: &str,
        post_id: &str,
        sender: &str,
        notification_type: NotificationType,
    ) -> AppResult<()> {
        let Some(post) = self.post_repo.find_by_id(post_id).await? else {
            return Ok(());
        };
        if post.author_handle == *sender {
            return Ok(());
        }

        let model = notification::ActiveModel {
            id: Set(source_id.to_string()),
            recipient: Set(post.author_handle),
            sender: Set(sender.to_string()),
            post_id: Set(post_id.to_string()),
            notification_type: Set(notification_type),
            is_read: Set(false),
            created_at: Set(chrono::Utc::now().into()),
        };

        self.notification_repo.create_idempotent(model).await?;
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chirp_db::entities::post;
    use chrono::Utc;
    use sea_orm::{DatabaseBackend, DbErr, MockDatabase, MockExecResult, RuntimeErr, Value};
    use std::collections::BTreeMap;

    fn create_test_post(id: &str, author: &str) -> post::Model {
        post::Model {
            id: id.to_string(),
            author_handle: author.to_string(),
            author_image: "/files/no-img.png".to_string(),
            title: "Test title".to_string(),
            body: "Test body".to_string(),
            follow_count: 0,
            comment_count: 0,
            created_at: Utc::now().into(),
        }
    }

    fn service_with(db: Arc<sea_orm::DatabaseConnection>) -> FanoutService {
        FanoutService::new(
            PostRepository::new(Arc::clone(&db)),
            NotificationRepository::new(db),
        )
    }

    #[tokio::test]
    async fn test_follow_created_writes_notification() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[create_test_post("p1", "alice")]])
                .append_exec_results([MockExecResult {
                    last_insert_id: 0,
                    rows_affected: 1,
                }])
                .into_connection(),
        );

        let service = service_with(db);
        let result = service
            .apply(&StoreEvent::FollowCreated {
                follow_id: "f1".to_string(),
                post_id: "p1".to_string(),
                sender: "bob".to_string(),
            })
            .await;

        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_own_post_produces_no_notification() {
        // Only the post lookup runs; an insert would exhaust the mock
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[create_test_post("p1", "alice")]])
                .into_connection(),
        );

        let service = service_with(db);
        let result = service
            .apply(&StoreEvent::CommentCreated {
                comment_id: "c1".to_string(),
                post_id: "p1".to_string(),
                sender: "alice".to_string(),
            })
            .await;

        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_deleted_post_is_skipped() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([Vec::<post::Model>::new()])
                .into_connection(),
        );

        let service = service_with(db);
        let result = service
            .apply(&StoreEvent::FollowCreated {
                follow_id: "f1".to_string(),
                post_id: "gone".to_string(),
                sender: "bob".to_string(),
            })
            .await;

        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_dispatch_drops_after_retries() {
        let err = || DbErr::Query(RuntimeErr::Internal("connection reset".to_string()));
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_errors([err(), err(), err()])
                .into_connection(),
        );

        let service = service_with(db);
        // All three attempts fail; the event is dropped without panicking
        service
            .dispatch(StoreEvent::FollowCreated {
                follow_id: "f1".to_string(),
                post_id: "p1".to_string(),
                sender: "bob".to_string(),
            })
            .await;
    }

    #[tokio::test]
    async fn test_image_change_propagates() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([vec![BTreeMap::from([("id", Value::from("p1"))])]])
                .append_exec_results([MockExecResult {
                    last_insert_id: 0,
                    rows_affected: 1,
                }])
                .into_connection(),
        );

        let service = service_with(db);
        let result = service
            .apply(&StoreEvent::UserImageChanged {
                handle: "alice".to_string(),
                image_url: "/files/new.png".to_string(),
            })
            .await;

        assert!(result.is_ok());
    }
}
