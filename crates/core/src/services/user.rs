//! User service.

use std::sync::Arc;

use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use chirp_common::{AppError, AppResult, IdGenerator, StorageBackend, generate_storage_key};
use chirp_db::{
    entities::{follow, notification, post, user},
    repositories::{FollowRepository, NotificationRepository, PostRepository, UserRepository},
};
use sea_orm::Set;
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::services::fanout::{FanoutService, StoreEvent};

/// How many notifications the authenticated-user payload carries.
const NOTIFICATION_PAGE: u64 = 10;

/// Image placed on accounts that have not uploaded one.
const DEFAULT_IMAGE_KEY: &str = "no-img.png";

/// User service for business logic.
#[derive(Clone)]
pub struct UserService {
    user_repo: UserRepository,
    post_repo: PostRepository,
    follow_repo: FollowRepository,
    notification_repo: NotificationRepository,
    storage: Arc<dyn StorageBackend>,
    id_gen: IdGenerator,
    fanout: Option<Arc<FanoutService>>,
}

/// Input for creating a new account.
#[derive(Debug, Deserialize, Validate)]
pub struct SignupInput {
    #[validate(length(min = 1, max = 30))]
    pub handle: String,

    #[validate(email)]
    pub email: String,

    #[validate(length(min = 6, max = 128))]
    pub password: String,

    pub confirm_password: String,
}

/// Input for logging in.
#[derive(Debug, Deserialize, Validate)]
pub struct LoginInput {
    #[validate(email)]
    pub email: String,

    #[validate(length(min = 1))]
    pub password: String,
}

/// Input for updating profile details. Empty strings are treated as absent.
#[derive(Debug, Default, Deserialize, Validate)]
pub struct UpdateDetailsInput {
    #[validate(length(max = 500))]
    pub bio: Option<String>,

    #[validate(length(max = 500))]
    pub website: Option<String>,

    #[validate(length(max = 100))]
    pub location: Option<String>,
}

/// A freshly issued session token.
#[derive(Debug, Clone, Serialize)]
pub struct SessionToken {
    pub token: String,
}

/// The authenticated user's own data.
#[derive(Debug, Serialize)]
pub struct AuthenticatedUser {
    pub credentials: user::Model,
    pub follows: Vec<follow::Model>,
    pub notifications: Vec<notification::Model>,
}

/// A user's public profile.
#[derive(Debug, Serialize)]
pub struct Profile {
    pub user: user::Model,
    pub posts: Vec<post::Model>,
}

impl UserService {
    /// Create a new user service.
    #[must_use]
    pub fn new(
        user_repo: UserRepository,
        post_repo: PostRepository,
        follow_repo: FollowRepository,
        notification_repo: NotificationRepository,
        storage: Arc<dyn StorageBackend>,
    ) -> Self {
        Self {
            user_repo,
            post_repo,
            follow_repo,
            notification_repo,
            storage,
            id_gen: IdGenerator::new(),
            fanout: None,
        }
    }

    /// Attach the fan-out service. Called once during startup wiring.
    pub fn set_fanout(&mut self, fanout: Arc<FanoutService>) {
        self.fanout = Some(fanout);
    }

    /// Register a new account and return its session token.
    pub async fn signup(&self, input: SignupInput) -> AppResult<SessionToken> {
        input.validate()?;
        if input.password != input.confirm_password {
            return Err(AppError::Validation("Passwords must match".to_string()));
        }

        let password_hash = hash_password(&input.password)?;
        let token = self.id_gen.generate_token();

        let model = user::ActiveModel {
            handle: Set(input.handle.clone()),
            email: Set(input.email.clone()),
            password_hash: Set(password_hash),
            token: Set(token.clone()),
            image_url: Set(self.storage.public_url(DEFAULT_IMAGE_KEY)),
            bio: Set(None),
            website: Set(None),
            location: Set(None),
            created_at: Set(chrono::Utc::now().into()),
        };

        let user = self.user_repo.create(model).await?;
        tracing::info!(handle = %user.handle, "User signed up");

        Ok(SessionToken { token })
    }

    /// Verify credentials and return the account's session token.
    ///
    /// Unknown email and wrong password are indistinguishable to the caller.
    pub async fn login(&self, input: LoginInput) -> AppResult<SessionToken> {
        input.validate()?;

        let user = self
            .user_repo
            .find_by_email(&input.email)
            .await?
            .ok_or_else(wrong_credentials)?;

        if !verify_password(&input.password, &user.password_hash)? {
            return Err(wrong_credentials());
        }

        Ok(SessionToken { token: user.token })
    }

    /// Resolve a bearer token to its user.
    pub async fn authenticate_by_token(&self, token: &str) -> AppResult<user::Model> {
        self.user_repo
            .find_by_token(token)
            .await?
            .ok_or_else(|| AppError::Forbidden("Unauthorized".to_string()))
    }

    /// Get the authenticated user's credentials, follows and recent
    /// notifications.
    pub async fn get_authenticated(&self, user: user::Model) -> AppResult<AuthenticatedUser> {
        let follows = self.follow_repo.find_by_user(&user.handle).await?;
        let notifications = self
            .notification_repo
            .find_by_recipient(&user.handle, NOTIFICATION_PAGE)
            .await?;

        Ok(AuthenticatedUser {
            credentials: user,
            follows,
            notifications,
        })
    }

    /// Get a user's public profile with their posts, newest first.
    pub async fn get_profile(&self, handle: &str) -> AppResult<Profile> {
        let user = self.user_repo.get_by_handle(handle).await?;
        let posts = self.post_repo.find_by_author(handle).await?;

        Ok(Profile { user, posts })
    }

    /// Update the authenticated user's profile details.
    ///
    /// Fields are trimmed; empty values leave the stored detail untouched. A
    /// website without a scheme gets `http://` prepended.
    pub async fn update_details(
        &self,
        user: user::Model,
        input: UpdateDetailsInput,
    ) -> AppResult<user::Model> {
        input.validate()?;

        let mut active: user::ActiveModel = user.into();

        if let Some(bio) = non_empty(input.bio.as_deref()) {
            active.bio = Set(Some(bio));
        }
        if let Some(website) = non_empty(input.website.as_deref()) {
            let website = if website.starts_with("http://") || website.starts_with("https://") {
                website
            } else {
                format!("http://{website}")
            };
            active.website = Set(Some(website));
        }
        if let Some(location) = non_empty(input.location.as_deref()) {
            active.location = Set(Some(location));
        }

        self.user_repo.update(active).await
    }

    /// Store a new profile image and propagate the URL change.
    ///
    /// Only JPEG and PNG uploads are accepted. The URL rewrite on the user's
    /// existing posts happens through fan-out; re-uploading an identical URL
    /// emits no event.
    pub async fn update_image(
        &self,
        handle: &str,
        data: &[u8],
        content_type: &str,
    ) -> AppResult<String> {
        if content_type != "image/jpeg" && content_type != "image/png" {
            return Err(AppError::BadRequest(
                "Wrong file type submitted".to_string(),
            ));
        }

        let key = generate_storage_key(content_type);
        let uploaded = self.storage.upload(&key, data, content_type).await?;

        let old_url = self.user_repo.set_image_url(handle, &uploaded.url).await?;

        if old_url != uploaded.url {
            if let Some(fanout) = &self.fanout {
                fanout.spawn(StoreEvent::UserImageChanged {
                    handle: handle.to_string(),
                    image_url: uploaded.url.clone(),
                });
            }
        }

        Ok(uploaded.url)
    }
}

/// A trimmed, non-empty copy of the value, if there is one.
fn non_empty(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(ToString::to_string)
}

fn wrong_credentials() -> AppError {
    AppError::Forbidden("Wrong credentials, please try again".to_string())
}

/// Hash a password using Argon2.
fn hash_password(password: &str) -> AppResult<String> {
    let salt = SaltString::generate(&mut OsRng);

    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|h| h.to_string())
        .map_err(|e| AppError::Internal(format!("Failed to hash password: {e}")))
}

/// Verify a password against a hash.
fn verify_password(password: &str, hash: &str) -> AppResult<bool> {
    let parsed_hash =
        PasswordHash::new(hash).map_err(|e| AppError::Internal(format!("Invalid hash: {e}")))?;

    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chirp_common::LocalStorage;
    use chrono::Utc;
    use sea_orm::{DatabaseBackend, MockDatabase};

    fn create_test_user(handle: &str, password: &str) -> user::Model {
        user::Model {
            handle: handle.to_string(),
            email: format!("{handle}@example.com"),
            password_hash: hash_password(password).unwrap(),
            token: "test_token".to_string(),
            image_url: "/files/no-img.png".to_string(),
            bio: None,
            website: None,
            location: None,
            created_at: Utc::now().into(),
        }
    }

    fn create_test_service(db: Arc<sea_orm::DatabaseConnection>) -> UserService {
        let storage = Arc::new(LocalStorage::new(
            std::env::temp_dir().join("chirp-user-test"),
            "/files".to_string(),
        ));
        UserService::new(
            UserRepository::new(Arc::clone(&db)),
            PostRepository::new(Arc::clone(&db)),
            FollowRepository::new(Arc::clone(&db)),
            NotificationRepository::new(db),
            storage,
        )
    }

    #[test]
    fn test_hash_password_and_verify() {
        let hash = hash_password("hunter22").unwrap();
        assert!(hash.starts_with("$argon2"));
        assert!(verify_password("hunter22", &hash).unwrap());
        assert!(!verify_password("hunter23", &hash).unwrap());
    }

    #[test]
    fn test_verify_password_invalid_hash() {
        assert!(verify_password("hunter22", "not-a-hash").is_err());
    }

    #[tokio::test]
    async fn test_signup_password_mismatch() {
        let db = Arc::new(MockDatabase::new(DatabaseBackend::Postgres).into_connection());
        let service = create_test_service(db);

        let result = service
            .signup(SignupInput {
                handle: "alice".to_string(),
                email: "alice@example.com".to_string(),
                password: "hunter22".to_string(),
                confirm_password: "hunter23".to_string(),
            })
            .await;

        match result {
            Err(AppError::Validation(msg)) => assert!(msg.contains("must match")),
            _ => panic!("Expected Validation error"),
        }
    }

    #[tokio::test]
    async fn test_signup_invalid_email() {
        let db = Arc::new(MockDatabase::new(DatabaseBackend::Postgres).into_connection());
        let service = create_test_service(db);

        let result = service
            .signup(SignupInput {
                handle: "alice".to_string(),
                email: "not-an-email".to_string(),
                password: "hunter22".to_string(),
                confirm_password: "hunter22".to_string(),
            })
            .await;

        assert!(matches!(result, Err(AppError::Validation(_))));
    }

    #[tokio::test]
    async fn test_login_unknown_email() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([Vec::<user::Model>::new()])
                .into_connection(),
        );
        let service = create_test_service(db);

        let result = service
            .login(LoginInput {
                email: "nobody@example.com".to_string(),
                password: "whatever".to_string(),
            })
            .await;

        match result {
            Err(AppError::Forbidden(msg)) => assert!(msg.contains("Wrong credentials")),
            _ => panic!("Expected Forbidden error"),
        }
    }

    #[tokio::test]
    async fn test_login_wrong_password() {
        let user = create_test_user("alice", "hunter22");
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[user]])
                .into_connection(),
        );
        let service = create_test_service(db);

        let result = service
            .login(LoginInput {
                email: "alice@example.com".to_string(),
                password: "hunter23".to_string(),
            })
            .await;

        assert!(matches!(result, Err(AppError::Forbidden(_))));
    }

    #[tokio::test]
    async fn test_login_success_returns_token() {
        let user = create_test_user("alice", "hunter22");
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[user]])
                .into_connection(),
        );
        let service = create_test_service(db);

        let session = service
            .login(LoginInput {
                email: "alice@example.com".to_string(),
                password: "hunter22".to_string(),
            })
            .await
            .unwrap();

        assert_eq!(session.token, "test_token");
    }

    #[tokio::test]
    async fn test_update_image_rejects_wrong_type() {
        let db = Arc::new(MockDatabase::new(DatabaseBackend::Postgres).into_connection());
        let service = create_test_service(db);

        let result = service.update_image("alice", b"GIF89a", "image/gif").await;

        match result {
            Err(AppError::BadRequest(msg)) => assert!(msg.contains("Wrong file type")),
            _ => panic!("Expected BadRequest error"),
        }
    }

    #[test]
    fn test_non_empty_trims_and_filters() {
        assert_eq!(non_empty(Some("  hi  ")), Some("hi".to_string()));
        assert_eq!(non_empty(Some("   ")), None);
        assert_eq!(non_empty(None), None);
    }
}
