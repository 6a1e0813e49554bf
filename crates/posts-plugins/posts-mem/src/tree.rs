//! Comment tree algorithms.
//!
//! Everything here works on a `CommentTree`, so the same code serves a post's
//! top level and any comment's replies. A direct child is found with one map
//! probe; anything deeper costs a depth-first walk of the subtree. Walks keep
//! their own stack, so lookups never recurse however deep a thread gets.

use std::collections::HashMap;

use chrono::Utc;
use posts_core::{Comment, CommentTree, IdSource, InComment, Result, StorageError};
use tracing::warn;
use uuid::Uuid;

/// Deepest level a reply may be inserted at; top-level comments are level 1.
///
/// Cloning, dropping and serializing a comment still recurse once per level,
/// so threads are kept well inside a default thread stack.
pub const MAX_THREAD_DEPTH: usize = 256;

/// Draws ids until one is free in `taken`.
///
/// Unbounded: with 128-bit ids a second draw is already improbable.
pub(crate) fn fresh_id<V>(taken: &HashMap<Uuid, V>, ids: &dyn IdSource) -> Uuid {
    loop {
        let id = ids.next_id();
        if !taken.contains_key(&id) {
            return id;
        }
        warn!(%id, "generated id collides with an existing sibling, regenerating");
    }
}

pub(crate) fn find<'a>(tree: &'a CommentTree, id: &Uuid) -> Option<&'a Comment> {
    let mut pending = vec![tree];
    while let Some(level) = pending.pop() {
        if let Some(comment) = level.get(id) {
            return Some(comment);
        }
        // this level was just probed, only its children's replies remain
        pending.extend(level.values().map(|child| &child.replies));
    }
    None
}

pub(crate) fn find_mut<'a>(tree: &'a mut CommentTree, id: &Uuid) -> Option<&'a mut Comment> {
    find_mut_with_depth(tree, id).map(|(comment, _)| comment)
}

/// Like `find_mut`, also returning the level the comment sits at.
pub(crate) fn find_mut_with_depth<'a>(
    tree: &'a mut CommentTree,
    id: &Uuid,
) -> Option<(&'a mut Comment, usize)> {
    let mut pending = vec![(1, tree)];
    while let Some((depth, level)) = pending.pop() {
        if level.contains_key(id) {
            return level.get_mut(id).map(|comment| (comment, depth));
        }
        pending.extend(level.values_mut().map(|child| (depth + 1, &mut child.replies)));
    }
    None
}

/// Replaces the content of the comment with `id` anywhere under `tree`.
///
/// Soft-deleted comments are still editable.
pub(crate) fn update(tree: &mut CommentTree, id: &Uuid, input: InComment) -> Result<Comment> {
    let comment = find_mut(tree, id).ok_or(StorageError::CommentNotFound)?;
    comment.input.content = input.content;
    comment.updated_at = Utc::now();
    Ok(comment.clone())
}

/// Soft-deletes the comment with `id`. Its replies stay where they are.
pub(crate) fn delete(tree: &mut CommentTree, id: &Uuid) -> Result<Uuid> {
    let comment = find_mut(tree, id).ok_or(StorageError::CommentNotFound)?;
    comment.deleted_at = Some(Utc::now());
    Ok(*id)
}

/// Adds a new comment directly into `tree` without any state checks.
pub(crate) fn insert(tree: &mut CommentTree, input: InComment, ids: &dyn IdSource) -> Comment {
    let id = fresh_id(tree, ids);
    let comment = Comment::new(id, input);
    tree.insert(id, comment.clone());
    comment
}

/// Adds a reply under `parent`, which sits at level `parent_depth`.
pub(crate) fn insert_reply(
    parent: &mut Comment,
    parent_depth: usize,
    input: InComment,
    ids: &dyn IdSource,
) -> Result<Comment> {
    if parent.is_deleted() {
        return Err(StorageError::CommentIsDeleted);
    }
    if parent_depth >= MAX_THREAD_DEPTH {
        return Err(StorageError::ThreadTooDeep);
    }
    Ok(insert(&mut parent.replies, input, ids))
}
