//! Post repository.

use std::sync::Arc;

use crate::entities::{Comment, Follow, Notification, Post, comment, follow, notification, post};
use chirp_common::{AppError, AppResult};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder,
    QuerySelect, TransactionTrait, sea_query::Expr,
};

/// How many posts a single image-propagation UPDATE may touch.
pub const IMAGE_PROPAGATION_CHUNK: u64 = 500;

/// Documents removed by a cascade deletion, for logging.
#[derive(Debug, Clone, Copy, Default)]
pub struct CascadeStats {
    /// Comments deleted.
    pub comments: u64,
    /// Follows deleted.
    pub follows: u64,
    /// Notifications deleted.
    pub notifications: u64,
}

/// Post repository for database operations.
#[derive(Clone)]
pub struct PostRepository {
    db: Arc<DatabaseConnection>,
}

impl PostRepository {
    /// Create a new post repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Find a post by ID.
    pub async fn find_by_id(&self, id: &str) -> AppResult<Option<post::Model>> {
        Post::find_by_id(id)
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Find a post by ID, returning an error if not found.
    pub async fn get_by_id(&self, id: &str) -> AppResult<post::Model> {
        self.find_by_id(id)
            .await?
            .ok_or_else(|| AppError::PostNotFound(id.to_string()))
    }

    /// Create a new post.
    pub async fn create(&self, model: post::ActiveModel) -> AppResult<post::Model> {
        model
            .insert(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Get all posts, newest first.
    pub async fn find_all(&self) -> AppResult<Vec<post::Model>> {
        Post::find()
            .order_by_desc(post::Column::CreatedAt)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Get posts by an author, newest first.
    pub async fn find_by_author(&self, handle: &str) -> AppResult<Vec<post::Model>> {
        Post::find()
            .filter(post::Column::AuthorHandle.eq(handle))
            .order_by_desc(post::Column::CreatedAt)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Delete a post and every comment, follow and notification referencing
    /// it, as one transaction.
    ///
    /// A partial cascade (post gone, orphaned children remaining) can never
    /// be observed: on any failure the whole unit rolls back and the caller
    /// retries the operation as a whole.
    pub async fn delete_cascade(&self, post_id: &str) -> AppResult<CascadeStats> {
        let txn = self
            .db
            .begin()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        let comments = Comment::delete_many()
            .filter(comment::Column::PostId.eq(post_id))
            .exec(&txn)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?
            .rows_affected;

        let follows = Follow::delete_many()
            .filter(follow::Column::PostId.eq(post_id))
            .exec(&txn)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?
            .rows_affected;

        let notifications = Notification::delete_many()
            .filter(notification::Column::PostId.eq(post_id))
            .exec(&txn)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?
            .rows_affected;

        Post::delete_by_id(post_id)
            .exec(&txn)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        txn.commit()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(CascadeStats {
            comments,
            follows,
            notifications,
        })
    }

    /// Rewrite `author_image` on every post by `handle`, in bounded chunks.
    ///
    /// Posts already carrying the new URL are excluded from the scan, so the
    /// loop always makes progress and a repeated update with an identical URL
    /// issues no writes. Returns the number of posts rewritten.
    pub async fn update_author_image(&self, handle: &str, image_url: &str) -> AppResult<u64> {
        let mut total = 0u64;

        loop {
            let ids: Vec<String> = Post::find()
                .select_only()
                .column(post::Column::Id)
                .filter(post::Column::AuthorHandle.eq(handle))
                .filter(post::Column::AuthorImage.ne(image_url))
                .limit(IMAGE_PROPAGATION_CHUNK)
                .into_tuple()
                .all(self.db.as_ref())
                .await
                .map_err(|e| AppError::Database(e.to_string()))?;

            if ids.is_empty() {
                break;
            }
            let batch_len = ids.len() as u64;

            let result = Post::update_many()
                .col_expr(post::Column::AuthorImage, Expr::value(image_url))
                .filter(post::Column::Id.is_in(ids))
                .exec(self.db.as_ref())
                .await
                .map_err(|e| AppError::Database(e.to_string()))?;

            total += result.rows_affected;

            if batch_len < IMAGE_PROPAGATION_CHUNK {
                break;
            }
        }

        Ok(total)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::Utc;
    use sea_orm::{DatabaseBackend, MockDatabase, MockExecResult, Value};
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

    #[tokio::test]
    async fn test_find_by_id_found() {
        let post = create_test_post("p1", "alice");

        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[post.clone()]])
                .into_connection(),
        );

        let repo = PostRepository::new(db);
        let result = repo.find_by_id("p1").await.unwrap();

        assert!(result.is_some());
        assert_eq!(result.unwrap().author_handle, "alice");
    }

    #[tokio::test]
    async fn test_get_by_id_not_found_returns_error() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([Vec::<post::Model>::new()])
                .into_connection(),
        );

        let repo = PostRepository::new(db);
        let result = repo.get_by_id("missing").await;

        match result {
            Err(AppError::PostNotFound(id)) => assert_eq!(id, "missing"),
            _ => panic!("Expected PostNotFound error"),
        }
    }

    #[tokio::test]
    async fn test_find_all() {
        let p1 = create_test_post("p1", "alice");
        let p2 = create_test_post("p2", "bob");

        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[p1, p2]])
                .into_connection(),
        );

        let repo = PostRepository::new(db);
        let result = repo.find_all().await.unwrap();

        assert_eq!(result.len(), 2);
    }

    #[tokio::test]
    async fn test_delete_cascade_counts() {
        // 3 comments, 2 follows, 1 notification, then the post itself
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_exec_results([
                    MockExecResult {
                        last_insert_id: 0,
                        rows_affected: 3,
                    },
                    MockExecResult {
                        last_insert_id: 0,
                        rows_affected: 2,
                    },
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

        let repo = PostRepository::new(db);
        let stats = repo.delete_cascade("p1").await.unwrap();

        assert_eq!(stats.comments, 3);
        assert_eq!(stats.follows, 2);
        assert_eq!(stats.notifications, 1);
    }

    #[tokio::test]
    async fn test_update_author_image_no_stale_posts() {
        // The id scan returns nothing: no UPDATE is issued
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([Vec::<BTreeMap<&str, Value>>::new()])
                .into_connection(),
        );

        let repo = PostRepository::new(db);
        let rewritten = repo
            .update_author_image("alice", "/files/new.png")
            .await
            .unwrap();

        assert_eq!(rewritten, 0);
    }

    #[tokio::test]
    async fn test_update_author_image_single_chunk() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([vec![
                    BTreeMap::from([("id", Value::from("p1"))]),
                    BTreeMap::from([("id", Value::from("p2"))]),
                ]])
                .append_exec_results([MockExecResult {
                    last_insert_id: 0,
                    rows_affected: 2,
                }])
                .into_connection(),
        );

        let repo = PostRepository::new(db);
        let rewritten = repo
            .update_author_image("alice", "/files/new.png")
            .await
            .unwrap();

        assert_eq!(rewritten, 2);
    }
}
