//! # Domain Models
//!
//! Posts and their comment trees. Every output record *has* its input record
//! (`Post::input`, `Comment::input`) plus the fields the store owns.
//!
//! Neither type carries any synchronization of its own; they are plain values
//! that the storage layer owns and hands out as copies.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize, Serializer};
use uuid::Uuid;

/// Comment id -> Comment. Used both for a post's top level and for replies.
pub type CommentTree = HashMap<Uuid, Comment>;

/// Caller-supplied part of a post.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InPost {
    /// Creator id
    pub user_id: Uuid,
    /// When set, nobody can leave new top-level comments on the post
    pub is_mute: bool,
    pub content: String,
}

/// A post as stored, with its whole comment tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Post {
    #[serde(rename = "in_post")]
    pub input: InPost,

    pub id: Uuid,

    pub upvotes: u64,
    pub downvotes: u64,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// `None` while the post is live
    pub deleted_at: Option<DateTime<Utc>>,

    /// Top-level comments only; replies hang off each comment
    pub comments: CommentTree,
}

impl Post {
    /// Builds a fresh post: counters zeroed, no comments, both timestamps now.
    pub fn new(id: Uuid, input: InPost) -> Self {
        let now = Utc::now();
        Self {
            input,
            id,
            upvotes: 0,
            downvotes: 0,
            created_at: now,
            updated_at: now,
            deleted_at: None,
            comments: CommentTree::new(),
        }
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }
}

/// Caller-supplied part of a comment.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InComment {
    /// Creator id
    pub user_id: Uuid,
    pub content: String,
}

/// A node of a post's comment tree.
///
/// On the wire the input fields sit next to the stored ones (`user_id`,
/// `content`, `id`, ...), see `CommentRecord`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(from = "CommentRecord")]
pub struct Comment {
    pub input: InComment,

    pub id: Uuid,

    pub upvotes: u64,
    pub downvotes: u64,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,

    pub replies: CommentTree,
}

/// Flat JSON layout of a comment. Spelled out field by field so decoding
/// streams straight into the record instead of buffering every subtree.
#[derive(Deserialize)]
#[serde(rename = "Comment")]
struct CommentRecord {
    user_id: Uuid,
    content: String,
    id: Uuid,
    upvotes: u64,
    downvotes: u64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    deleted_at: Option<DateTime<Utc>>,
    replies: CommentTree,
}

impl From<CommentRecord> for Comment {
    fn from(record: CommentRecord) -> Self {
        Self {
            input: InComment {
                user_id: record.user_id,
                content: record.content,
            },
            id: record.id,
            upvotes: record.upvotes,
            downvotes: record.downvotes,
            created_at: record.created_at,
            updated_at: record.updated_at,
            deleted_at: record.deleted_at,
            replies: record.replies,
        }
    }
}

#[derive(Serialize)]
#[serde(rename = "Comment")]
struct CommentRecordRef<'a> {
    user_id: &'a Uuid,
    content: &'a str,
    id: &'a Uuid,
    upvotes: u64,
    downvotes: u64,
    created_at: &'a DateTime<Utc>,
    updated_at: &'a DateTime<Utc>,
    deleted_at: &'a Option<DateTime<Utc>>,
    replies: &'a CommentTree,
}

impl Serialize for Comment {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        CommentRecordRef {
            user_id: &self.input.user_id,
            content: &self.input.content,
            id: &self.id,
            upvotes: self.upvotes,
            downvotes: self.downvotes,
            created_at: &self.created_at,
            updated_at: &self.updated_at,
            deleted_at: &self.deleted_at,
            replies: &self.replies,
        }
        .serialize(serializer)
    }
}

impl Comment {
    pub fn new(id: Uuid, input: InComment) -> Self {
        let now = Utc::now();
        Self {
            input,
            id,
            upvotes: 0,
            downvotes: 0,
            created_at: now,
            updated_at: now,
            deleted_at: None,
            replies: CommentTree::new(),
        }
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }
}
