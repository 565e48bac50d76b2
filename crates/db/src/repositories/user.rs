//! User repository.

use std::sync::Arc;

use crate::entities::{User, user};
use crate::repositories::is_unique_violation;
use chirp_common::{AppError, AppResult};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set,
};

/// User repository for database operations.
#[derive(Clone)]
pub struct UserRepository {
    db: Arc<DatabaseConnection>,
}

impl UserRepository {
    /// Create a new user repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Find a user by handle.
    pub async fn find_by_handle(&self, handle: &str) -> AppResult<Option<user::Model>> {
        User::find_by_id(handle)
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Find a user by handle, returning an error if not found.
    pub async fn get_by_handle(&self, handle: &str) -> AppResult<user::Model> {
        self.find_by_handle(handle)
            .await?
            .ok_or_else(|| AppError::UserNotFound(handle.to_string()))
    }

    /// Find a user by email.
    pub async fn find_by_email(&self, email: &str) -> AppResult<Option<user::Model>> {
        User::find()
            .filter(user::Column::Email.eq(email))
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Find a user by bearer token.
    pub async fn find_by_token(&self, token: &str) -> AppResult<Option<user::Model>> {
        User::find()
            .filter(user::Column::Token.eq(token))
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Create a new user.
    ///
    /// Handle and email uniqueness are constraints, not pre-checks; a losing
    /// concurrent signup surfaces as [`AppError::Conflict`]. The violated
    /// constraint's name distinguishes a taken handle from a reused email.
    pub async fn create(&self, model: user::ActiveModel) -> AppResult<user::Model> {
        model.insert(self.db.as_ref()).await.map_err(|e| {
            if is_unique_violation(&e) {
                if e.to_string().contains("email") {
                    AppError::Conflict("Email is already in use".to_string())
                } else {
                    AppError::Conflict("Handle is already taken".to_string())
                }
            } else {
                AppError::Database(e.to_string())
            }
        })
    }

    /// Update a user.
    pub async fn update(&self, model: user::ActiveModel) -> AppResult<user::Model> {
        model
            .update(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Set a user's profile image URL, returning the previous value.
    pub async fn set_image_url(&self, handle: &str, image_url: &str) -> AppResult<String> {
        let user = self.get_by_handle(handle).await?;
        let old_url = user.image_url.clone();

        if old_url != image_url {
            let mut active: user::ActiveModel = user.into();
            active.image_url = Set(image_url.to_string());
            active
                .update(self.db.as_ref())
                .await
                .map_err(|e| AppError::Database(e.to_string()))?;
        }

        Ok(old_url)
    }
}
