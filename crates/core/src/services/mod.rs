//! Service layer.

pub mod fanout;
pub mod follow;
pub mod notification;
pub mod post;
pub mod user;
