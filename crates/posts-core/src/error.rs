//! # StorageError
//!
//! Centralized error handling for post storage.
//! Every failure a `PostStorage` can produce is one of these variants.

use thiserror::Error;

/// The primary error type for all storage operations.
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("post not found")]
    PostNotFound,

    #[error("post has been deleted")]
    PostIsDeleted,

    /// Top-level comments are disabled on the post
    #[error("post is mute")]
    PostIsMute,

    #[error("comment not found")]
    CommentNotFound,

    #[error("comment has been deleted")]
    CommentIsDeleted,

    /// The parent comment already sits at the deepest allowed level
    #[error("comment thread is too deep")]
    ThreadTooDeep,

    /// The caller's context was cancelled before the operation started
    #[error("context cancelled")]
    Cancelled,

    /// The caller's deadline passed before the operation started
    #[error("context deadline exceeded")]
    DeadlineExceeded,

    /// Writing a snapshot failed; persistence is stopped after this
    #[error("error when dumping: {0}")]
    BadDump(String),

    /// The snapshot source exists but could not be decoded
    #[error("error when restoring: {0}")]
    BadRestore(String),
}

impl StorageError {
    /// Not-found and state-conflict errors, as opposed to cancellation or
    /// persistence failures.
    pub fn is_domain(&self) -> bool {
        matches!(
            self,
            Self::PostNotFound
                | Self::PostIsDeleted
                | Self::PostIsMute
                | Self::CommentNotFound
                | Self::CommentIsDeleted
                | Self::ThreadTooDeep
        )
    }
}

/// A specialized Result type for storage logic.
pub type Result<T> = std::result::Result<T, StorageError>;
