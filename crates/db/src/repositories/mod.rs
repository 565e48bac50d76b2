//! Database repositories.
//!
//! All store access goes through these types; counter maintenance and cascade
//! deletion run as single transactions here, never as unguarded
//! read-modify-write sequences in callers.

pub mod comment;
pub mod follow;
pub mod notification;
pub mod post;
pub mod user;

pub use comment::CommentRepository;
pub use follow::FollowRepository;
pub use notification::NotificationRepository;
pub use post::PostRepository;
pub use user::UserRepository;

use sea_orm::{DbErr, SqlErr};

/// Whether a database error is a unique-constraint violation.
///
/// Duplicate follows, taken handles and reused emails all surface this way;
/// callers map it to a domain-level conflict instead of a 500.
pub(crate) fn is_unique_violation(err: &DbErr) -> bool {
    matches!(err.sql_err(), Some(SqlErr::UniqueConstraintViolation(_)))
}
