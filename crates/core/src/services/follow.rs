//! Follow service.

use std::sync::Arc;

use chirp_common::{AppResult, IdGenerator};
use chirp_db::{
    entities::{post, user},
    repositories::{FollowRepository, PostRepository},
};

use crate::services::fanout::{FanoutService, StoreEvent};

/// Follow service for business logic.
#[derive(Clone)]
pub struct FollowService {
    follow_repo: FollowRepository,
    post_repo: PostRepository,
    id_gen: IdGenerator,
    fanout: Option<Arc<FanoutService>>,
}

impl FollowService {
    /// Create a new follow service.
    #[must_use]
    pub fn new(follow_repo: FollowRepository, post_repo: PostRepository) -> Self {
        Self {
            follow_repo,
            post_repo,
            id_gen: IdGenerator::new(),
            fanout: None,
        }
    }

    /// Attach the fan-out service. Called once during startup wiring.
    pub fn set_fanout(&mut self, fanout: Arc<FanoutService>) {
        self.fanout = Some(fanout);
    }

    /// Follow a post, returning it with the updated count.
    ///
    /// Following a missing post is a 404; following twice is a conflict,
    /// enforced inside the same transaction that moves the counter.
    pub async fn follow(&self, user: &user::Model, post_id: &str) -> AppResult<post::Model> {
        self.post_repo.get_by_id(post_id).await?;

        let follow = self
            .follow_repo
            .create_and_count(&self.id_gen.generate(), post_id, &user.handle)
            .await?;

        if let Some(fanout) = &self.fanout {
            fanout.spawn(StoreEvent::FollowCreated {
                follow_id: follow.id,
                post_id: post_id.to_string(),
                sender: user.handle.clone(),
            });
        }

        self.post_repo.get_by_id(post_id).await
    }

    /// Unfollow a post, returning it with the updated count.
    pub async fn unfollow(&self, user: &user::Model, post_id: &str) -> AppResult<post::Model> {
        self.post_repo.get_by_id(post_id).await?;

        let follow_id = self
            .follow_repo
            .delete_and_count(post_id, &user.handle)
            .await?;

        if let Some(fanout) = &self.fanout {
            fanout.spawn(StoreEvent::FollowDeleted { follow_id });
        }

        self.post_repo.get_by_id(post_id).await
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chirp_common::AppError;
    use chrono::Utc;
    use sea_orm::{DatabaseBackend, MockDatabase, MockExecResult};

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

    fn create_test_post(id: &str, author: &str, follow_count: i32) -> post::Model {
        post::Model {
            id: id.to_string(),
            author_handle: author.to_string(),
            author_image: "/files/no-img.png".to_string(),
            title: "Test title".to_string(),
            body: "Test body".to_string(),
            follow_count,
            comment_count: 0,
            created_at: Utc::now().into(),
        }
    }

    fn create_test_follow(id: &str, post_id: &str, user_handle: &str) -> chirp_db::entities::follow::Model {
        chirp_db::entities::follow::Model {
            id: id.to_string(),
            post_id: post_id.to_string(),
            user_handle: user_handle.to_string(),
            created_at: Utc::now().into(),
        }
    }

    fn create_test_service(db: Arc<sea_orm::DatabaseConnection>) -> FollowService {
        FollowService::new(
            FollowRepository::new(Arc::clone(&db)),
            PostRepository::new(db),
        )
    }

    #[tokio::test]
    async fn test_follow_missing_post() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([Vec::<post::Model>::new()])
                .into_connection(),
        );
        let service = create_test_service(db);

        let result = service.follow(&create_test_user("bob"), "gone").await;

        match result {
            Err(AppError::PostNotFound(id)) => assert_eq!(id, "gone"),
            _ => panic!("Expected PostNotFound error"),
        }
    }

    #[tokio::test]
    async fn test_follow_returns_updated_post() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                // existence check
                .append_query_results([[create_test_post("p1", "alice", 0)]])
                // in-transaction pair re-check finds nothing
                .append_query_results([Vec::<chirp_db::entities::follow::Model>::new()])
                // insert returns the follow row
                .append_query_results([[create_test_follow("f1", "p1", "bob")]])
                // re-read after commit carries the moved counter
                .append_query_results([[create_test_post("p1", "alice", 1)]])
                .append_exec_results([
                    MockExecResult {
                        last_insert_id: 0,
                        rows_affected: 1,
                    },
                    MockExecResult {
                        last_insert_id: 0,
                        rows_affected: 1,
                    },
                ])
                .into_connection(),
        );
        let service = create_test_service(db);

        let post = service
            .follow(&create_test_user("bob"), "p1")
            .await
            .unwrap();

        assert_eq!(post.follow_count, 1);
    }

    #[tokio::test]
    async fn test_unfollow_never_followed() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[create_test_post("p1", "alice", 0)]])
                .append_query_results([Vec::<chirp_db::entities::follow::Model>::new()])
                .into_connection(),
        );
        let service = create_test_service(db);

        let result = service.unfollow(&create_test_user("bob"), "p1").await;

        match result {
            Err(AppError::Conflict(msg)) => assert!(msg.contains("never followed")),
            _ => panic!("Expected Conflict error"),
        }
    }
}
