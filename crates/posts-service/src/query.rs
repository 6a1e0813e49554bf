//! Ordering and paging of post listings. Storage hands posts back unordered;
//! everything about presentation order lives here.

use std::str::FromStr;

use posts_core::Post;

use crate::error::ServiceError;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SortOrder {
    #[default]
    Newest,
    Oldest,
    /// Most upvoted first
    Upvoted,
    /// Most downvoted first
    Downvoted,
}

impl FromStr for SortOrder {
    type Err = ServiceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "newest" => Ok(Self::Newest),
            "oldest" => Ok(Self::Oldest),
            "upvoted" => Ok(Self::Upvoted),
            "downvoted" => Ok(Self::Downvoted),
            other => Err(ServiceError::UnknownSortKey(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct PostQuery {
    pub limit: Option<usize>,
    pub offset: Option<usize>,
    pub sort: SortOrder,
}

impl PostQuery {
    /// Sorts, skips `offset`, then keeps at most `limit`. Out-of-range values
    /// are clamped rather than rejected.
    pub fn apply(&self, mut posts: Vec<Post>) -> Vec<Post> {
        match self.sort {
            SortOrder::Newest => posts.sort_by(|a, b| b.created_at.cmp(&a.created_at)),
            SortOrder::Oldest => posts.sort_by(|a, b| a.created_at.cmp(&b.created_at)),
            SortOrder::Upvoted => posts.sort_by(|a, b| b.upvotes.cmp(&a.upvotes)),
            SortOrder::Downvoted => posts.sort_by(|a, b| b.downvotes.cmp(&a.downvotes)),
        }

        let offset = self.offset.unwrap_or(0).min(posts.len());
        let limit = self.limit.unwrap_or(usize::MAX);
        posts.into_iter().skip(offset).take(limit).collect()
    }
}
