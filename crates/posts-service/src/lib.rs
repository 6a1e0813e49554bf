//! # posts-service
//!
//! Business layer on top of any `PostStorage`: validates input, orders and
//! pages listings, and turns storage failures into client-safe messages.
//! Authorization is left to whoever calls this service.

pub mod error;
pub mod query;

use std::sync::Arc;

use posts_core::{Comment, Context, InComment, InPost, Post, PostStorage};
use tracing::instrument;
use uuid::Uuid;

pub use crate::error::{Result, ServiceError};
pub use crate::query::{PostQuery, SortOrder};

/// Default cap on post and comment content, in characters.
pub const DEFAULT_MAX_CONTENT_LEN: usize = 2000;

pub struct PostService {
    storage: Arc<dyn PostStorage>,
    max_content_len: usize,
}

impl PostService {
    pub fn new(storage: Arc<dyn PostStorage>) -> Self {
        Self {
            storage,
            max_content_len: DEFAULT_MAX_CONTENT_LEN,
        }
    }

    pub fn with_max_content_len(mut self, max_content_len: usize) -> Self {
        self.max_content_len = max_content_len;
        self
    }

    pub async fn get_post(&self, ctx: &Context, id: Uuid) -> Result<Post> {
        Ok(self.storage.get_post(ctx, id).await?)
    }

    /// Lists posts ordered by `sort_by` (`newest`, `oldest`, `upvoted` or
    /// `downvoted`), then paged. An unknown key fails before storage is read.
    #[instrument(skip(self, ctx))]
    pub async fn get_posts(
        &self,
        ctx: &Context,
        limit: Option<usize>,
        offset: Option<usize>,
        sort_by: &str,
    ) -> Result<Vec<Post>> {
        let query = PostQuery {
            limit,
            offset,
            sort: sort_by.parse()?,
        };
        let posts = self.storage.get_posts(ctx).await?;
        Ok(query.apply(posts))
    }

    pub async fn insert_post(&self, ctx: &Context, input: InPost) -> Result<Post> {
        self.validate_content(&input.content)?;
        Ok(self.storage.insert_post(ctx, input).await?)
    }

    pub async fn update_post(&self, ctx: &Context, id: Uuid, input: InPost) -> Result<Post> {
        self.validate_content(&input.content)?;
        Ok(self.storage.update_post(ctx, id, input).await?)
    }

    pub async fn delete_post(&self, ctx: &Context, id: Uuid) -> Result<Uuid> {
        Ok(self.storage.delete_post(ctx, id).await?)
    }

    pub async fn get_comment(&self, ctx: &Context, post_id: Uuid, comment_id: Uuid) -> Result<Comment> {
        Ok(self.storage.get_comment(ctx, post_id, comment_id).await?)
    }

    pub async fn insert_comment(
        &self,
        ctx: &Context,
        post_id: Uuid,
        parent_id: Option<Uuid>,
        input: InComment,
    ) -> Result<Comment> {
        self.validate_content(&input.content)?;
        Ok(self
            .storage
            .insert_comment(ctx, post_id, parent_id, input)
            .await?)
    }

    pub async fn update_comment(
        &self,
        ctx: &Context,
        post_id: Uuid,
        comment_id: Uuid,
        input: InComment,
    ) -> Result<Comment> {
        self.validate_content(&input.content)?;
        Ok(self
            .storage
            .update_comment(ctx, post_id, comment_id, input)
            .await?)
    }

    pub async fn delete_comment(&self, ctx: &Context, post_id: Uuid, comment_id: Uuid) -> Result<Uuid> {
        Ok(self.storage.delete_comment(ctx, post_id, comment_id).await?)
    }

    fn validate_content(&self, content: &str) -> Result<()> {
        if content.trim().is_empty() {
            return Err(ServiceError::Validation("content is empty".into()));
        }
        let len = content.chars().count();
        if len > self.max_content_len {
            return Err(ServiceError::Validation(format!(
                "content is {len} characters, limit is {}",
                self.max_content_len
            )));
        }
        Ok(())
    }
}
