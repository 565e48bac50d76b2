//! Post service.

use std::sync::Arc;

use chirp_common::{AppError, AppResult, IdGenerator};
use chirp_db::{
    entities::{comment, post, user},
    repositories::{CommentRepository, PostRepository},
};
use sea_orm::Set;
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::services::fanout::{FanoutService, StoreEvent};

/// Post service for business logic.
#[derive(Clone)]
pub struct PostService {
    post_repo: PostRepository,
    comment_repo: CommentRepository,
    id_gen: IdGenerator,
    fanout: Option<Arc<FanoutService>>,
}

/// Input for creating a post.
#[derive(Debug, Deserialize, Validate)]
pub struct CreatePostInput {
    #[validate(length(min = 1, max = 200, message = "Must not be empty"))]
    pub title: String,

    #[validate(length(min = 1, max = 10_000, message = "Must not be empty"))]
    pub body: String,
}

/// Input for commenting on a post.
#[derive(Debug, Deserialize, Validate)]
pub struct CommentInput {
    #[validate(length(min = 1, max = 2_000, message = "Must not be empty"))]
    pub body: String,
}

/// A post together with its comments, newest comment first.
#[derive(Debug, Serialize)]
pub struct PostWithComments {
    #[serde(flatten)]
    pub post: post::Model,
    pub comments: Vec<comment::Model>,
}

impl PostService {
    /// Create a new post service.
    #[must_use]
    pub fn new(post_repo: PostRepository, comment_repo: CommentRepository) -> Self {
        Self {
            post_repo,
            comment_repo,
            id_gen: IdGenerator::new(),
            fanout: None,
        }
    }

    /// Attach the fan-out service. Called once during startup wiring.
    pub fn set_fanout(&mut self, fanout: Arc<FanoutService>) {
        self.fanout = Some(fanout);
    }

    /// Create a post.
    ///
    /// The author's handle and current image URL are denormalized onto the
    /// post at creation time; the image URL is kept current by fan-out when
    /// the author changes it.
    pub async fn create(&self, author: &user::Model, input: CreatePostInput) -> AppResult<post::Model> {
        input.validate()?;

        let model = post::ActiveModel {
            id: Set(self.id_gen.generate()),
            author_handle: Set(author.handle.clone()),
            author_image: Set(author.image_url.clone()),
            title: Set(input.title),
            body: Set(input.body),
            follow_count: Set(0),
            comment_count: Set(0),
            created_at: Set(chrono::Utc::now().into()),
        };

        self.post_repo.create(model).await
    }

    /// Get all posts, newest first.
    pub async fn list(&self) -> AppResult<Vec<post::Model>> {
        self.post_repo.find_all().await
    }

    /// Get a post with its comments.
    pub async fn get_with_comments(&self, post_id: &str) -> AppResult<PostWithComments> {
        let post = self.post_repo.get_by_id(post_id).await?;
        let comments = self.comment_repo.find_by_post(post_id).await?;

        Ok(PostWithComments { post, comments })
    }

    /// Comment on a post.
    pub async fn add_comment(
        &self,
        author: &user::Model,
        post_id: &str,
        input: CommentInput,
    ) -> AppResult<comment::Model> {
        input.validate()?;

        // Commenting on a deleted post is a 404, not an orphaned row
        self.post_repo.get_by_id(post_id).await?;

        let model = comment::ActiveModel {
            id: Set(self.id_gen.generate()),
            post_id: Set(post_id.to_string()),
            author_handle: Set(author.handle.clone()),
            author_image: Set(author.image_url.clone()),
            body: Set(input.body),
            created_at: Set(chrono::Utc::now().into()),
        };

        let created = self.comment_repo.create_and_count(model).await?;

        if let Some(fanout) = &self.fanout {
            fanout.spawn(StoreEvent::CommentCreated {
                comment_id: created.id.clone(),
                post_id: created.post_id.clone(),
                sender: created.author_handle.clone(),
            });
        }

        Ok(created)
    }

    /// Delete a post and everything hanging off it.
    ///
    /// Only the author may delete their post. The post, its comments, its
    /// follows and its notifications go in one unit; fan-out then sweeps any
    /// notification written concurrently with the cascade.
    pub async fn delete(&self, requester: &user::Model, post_id: &str) -> AppResult<()> {
        let post = self.post_repo.get_by_id(post_id).await?;

        if post.author_handle != requester.handle {
            return Err(AppError::Forbidden("Unauthorized".to_string()));
        }

        let stats = self.post_repo.delete_cascade(post_id).await?;
        tracing::info!(
            post_id = %post_id,
            comments = stats.comments,
            follows = stats.follows,
            notifications = stats.notifications,
            "Post deleted"
        );

        if let Some(fanout) = &self.fanout {
            fanout.spawn(StoreEvent::PostDeleted {
                post_id: post_id.to_string(),
            });
        }

        Ok(())
    }
}
