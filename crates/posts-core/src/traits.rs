//! # Core Traits (Ports)
//!
//! Any storage plugin must implement these traits to be used by the service.

use async_trait::async_trait;
use uuid::Uuid;

use crate::context::Context;
use crate::error::Result;
use crate::models::{Comment, InComment, InPost, Post};

/// Data persistence contract for posts and their comment trees.
///
/// Every call checks `ctx` before doing any work. Returned records are
/// copies; holding one does not observe later writes.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait PostStorage: Send + Sync {
    // Post Operations
    async fn get_post(&self, ctx: &Context, id: Uuid) -> Result<Post>;
    /// All posts, in no particular order.
    async fn get_posts(&self, ctx: &Context) -> Result<Vec<Post>>;
    async fn insert_post(&self, ctx: &Context, input: InPost) -> Result<Post>;
    /// Soft-deletes the post and echoes its id back.
    async fn delete_post(&self, ctx: &Context, id: Uuid) -> Result<Uuid>;
    /// Replaces the content and mute flag of a live post.
    async fn update_post(&self, ctx: &Context, id: Uuid, input: InPost) -> Result<Post>;

    // Comment Operations (any depth)
    async fn get_comment(&self, ctx: &Context, post_id: Uuid, comment_id: Uuid) -> Result<Comment>;
    /// `parent_id == None` inserts a top-level comment, otherwise a reply.
    async fn insert_comment(
        &self,
        ctx: &Context,
        post_id: Uuid,
        parent_id: Option<Uuid>,
        input: InComment,
    ) -> Result<Comment>;
    async fn update_comment(
        &self,
        ctx: &Context,
        post_id: Uuid,
        comment_id: Uuid,
        input: InComment,
    ) -> Result<Comment>;
    async fn delete_comment(&self, ctx: &Context, post_id: Uuid, comment_id: Uuid) -> Result<Uuid>;
}

/// Source of fresh identifiers for new posts and comments.
///
/// Callers must still probe for collisions; an implementation is free to
/// repeat itself.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
pub trait IdSource: Send + Sync {
    fn next_id(&self) -> Uuid;
}

/// Random 128-bit (v4) identifiers.
#[derive(Debug, Clone, Copy, Default)]
pub struct RandomIds;

impl IdSource for RandomIds {
    fn next_id(&self) -> Uuid {
        Uuid::new_v4()
    }
}
