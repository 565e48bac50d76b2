//! Business logic services for chirp.
//!
//! Services sit between the HTTP layer and the repositories: they validate
//! input, enforce authorization, and emit store events for the fan-out layer
//! after the primary write commits.

pub mod services;

pub use services::{
    fanout::{FanoutService, StoreEvent},
    follow::FollowService,
    notification::NotificationService,
    post::{CommentInput, CreatePostInput, PostService, PostWithComments},
    user::{
        AuthenticatedUser, LoginInput, Profile, SessionToken, SignupInput, UpdateDetailsInput,
        UserService,
    },
};
