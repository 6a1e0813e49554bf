//! # posts-mem
//!
//! In-memory implementation of `PostStorage`.
//!
//! All posts live in one map behind one reader/writer lock. Reads take the
//! read lock, writes and the dump worker take the write lock; there is no
//! per-post locking and no call ever takes the lock twice.
//!
//! Records never leave the map by reference: every call returns clones, and
//! writes mutate the stored value in place while the write lock is held.

mod snapshot;
mod tree;

use std::io::ErrorKind;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use posts_core::{
    Comment, Context, IdSource, InComment, InPost, Post, PostStorage, RandomIds, Result,
    StorageError,
};
use tokio::fs::File;
use tokio::io::AsyncRead;
use tokio::sync::{mpsc, RwLock};
use tracing::{debug, info, instrument};
use uuid::Uuid;

use crate::snapshot::{DumpWorker, PostMap};

pub use crate::snapshot::SnapshotSink;
pub use crate::tree::MAX_THREAD_DEPTH;

pub struct MemPostStorage {
    /// PostId -> Post
    posts: Arc<RwLock<PostMap>>,
    ids: Arc<dyn IdSource>,
    worker: Option<DumpWorker>,
}

struct DumpTarget {
    sink: Box<dyn SnapshotSink>,
    interval: Duration,
    errors: mpsc::Sender<StorageError>,
}

enum RestoreSource {
    Reader(Box<dyn AsyncRead + Send + Unpin>),
    /// Opened at build time; a missing file is a cold start
    Path(PathBuf),
}

/// Assembles a `MemPostStorage`, optionally restoring it from a snapshot and
/// starting the periodic dump.
#[derive(Default)]
pub struct MemPostStorageBuilder {
    ids: Option<Arc<dyn IdSource>>,
    restore_from: Option<RestoreSource>,
    dump_to: Option<DumpTarget>,
}

impl MemPostStorageBuilder {
    pub fn id_source(mut self, ids: Arc<dyn IdSource>) -> Self {
        self.ids = Some(ids);
        self
    }

    /// Seeds the store from `source` at build time.
    pub fn restore_from(mut self, source: impl AsyncRead + Send + Unpin + 'static) -> Self {
        self.restore_from = Some(RestoreSource::Reader(Box::new(source)));
        self
    }

    /// Seeds the store from the snapshot file at `path`. If there is no file
    /// yet the store starts empty; any other open error fails `build`.
    pub fn restore_from_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.restore_from = Some(RestoreSource::Path(path.into()));
        self
    }

    /// Dumps the whole store into `sink` every `interval`.
    ///
    /// The first dump failure is sent on `errors` and persistence stops; the
    /// channel should have room for at least one message.
    pub fn dump_to(
        mut self,
        sink: impl SnapshotSink,
        interval: Duration,
        errors: mpsc::Sender<StorageError>,
    ) -> Self {
        self.dump_to = Some(DumpTarget {
            sink: Box::new(sink),
            interval,
            errors,
        });
        self
    }

    /// Restores, then starts the dump worker. Must run inside a tokio runtime
    /// when a dump target is set.
    pub async fn build(self) -> Result<MemPostStorage> {
        let posts = match self.restore_from {
            Some(RestoreSource::Reader(mut source)) => snapshot::restore(&mut source).await?,
            Some(RestoreSource::Path(path)) => match File::open(&path).await {
                Ok(mut file) => snapshot::restore(&mut file).await?,
                Err(err) if err.kind() == ErrorKind::NotFound => {
                    info!(path = %path.display(), "no snapshot yet, cold start");
                    PostMap::new()
                }
                Err(err) => {
                    return Err(StorageError::BadRestore(format!(
                        "opening {}: {err}",
                        path.display()
                    )))
                }
            },
            None => PostMap::new(),
        };
        let posts = Arc::new(RwLock::new(posts));

        let worker = self.dump_to.map(|target| {
            info!(interval = ?target.interval, "starting dump worker");
            DumpWorker::spawn(posts.clone(), target.sink, target.interval, target.errors)
        });

        Ok(MemPostStorage {
            posts,
            ids: self.ids.unwrap_or_else(|| Arc::new(RandomIds)),
            worker,
        })
    }
}

impl MemPostStorage {
    /// A store without persistence, using random ids.
    pub fn new() -> Self {
        Self::with_id_source(Arc::new(RandomIds))
    }

    /// A store without persistence, drawing ids from `ids`.
    pub fn with_id_source(ids: Arc<dyn IdSource>) -> Self {
        Self {
            posts: Arc::new(RwLock::new(PostMap::new())),
            ids,
            worker: None,
        }
    }

    pub fn builder() -> MemPostStorageBuilder {
        MemPostStorageBuilder::default()
    }

    /// Stops the dump worker, letting a cycle that already started finish.
    /// Dropping the store instead aborts it mid-cycle.
    pub async fn close(mut self) {
        if let Some(worker) = self.worker.take() {
            worker.stop().await;
        }
    }
}

impl Default for MemPostStorage {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PostStorage for MemPostStorage {
    async fn get_post(&self, ctx: &Context, id: Uuid) -> Result<Post> {
        ctx.check()?;
        let posts = self.posts.read().await;

        posts.get(&id).cloned().ok_or(StorageError::PostNotFound)
    }

    async fn get_posts(&self, ctx: &Context) -> Result<Vec<Post>> {
        ctx.check()?;
        let posts = self.posts.read().await;

        Ok(posts.values().cloned().collect())
    }

    #[instrument(skip_all)]
    async fn insert_post(&self, ctx: &Context, input: InPost) -> Result<Post> {
        ctx.check()?;
        let mut posts = self.posts.write().await;

        let id = tree::fresh_id(&*posts, self.ids.as_ref());
        let post = Post::new(id, input);
        posts.insert(id, post.clone());

        debug!(%id, "inserted post");
        Ok(post)
    }

    #[instrument(skip(self, ctx))]
    async fn delete_post(&self, ctx: &Context, id: Uuid) -> Result<Uuid> {
        ctx.check()?;
        let mut posts = self.posts.write().await;

        let post = posts.get_mut(&id).ok_or(StorageError::PostNotFound)?;
        if post.is_deleted() {
            return Err(StorageError::PostIsDeleted);
        }
        post.deleted_at = Some(Utc::now());

        debug!("deleted post");
        Ok(id)
    }

    #[instrument(skip(self, ctx, input))]
    async fn update_post(&self, ctx: &Context, id: Uuid, input: InPost) -> Result<Post> {
        ctx.check()?;
        let mut posts = self.posts.write().await;

        let post = posts.get_mut(&id).ok_or(StorageError::PostNotFound)?;
        if post.is_deleted() {
            return Err(StorageError::PostIsDeleted);
        }
        post.input.content = input.content;
        post.input.is_mute = input.is_mute;
        post.updated_at = Utc::now();

        Ok(post.clone())
    }

    async fn get_comment(&self, ctx: &Context, post_id: Uuid, comment_id: Uuid) -> Result<Comment> {
        ctx.check()?;
        let posts = self.posts.read().await;

        let post = posts.get(&post_id).ok_or(StorageError::PostNotFound)?;
        tree::find(&post.comments, &comment_id)
            .cloned()
            .ok_or(StorageError::CommentNotFound)
    }

    #[instrument(skip(self, ctx, input))]
    async fn insert_comment(
        &self,
        ctx: &Context,
        post_id: Uuid,
        parent_id: Option<Uuid>,
        input: InComment,
    ) -> Result<Comment> {
        ctx.check()?;
        let mut posts = self.posts.write().await;

        let post = posts.get_mut(&post_id).ok_or(StorageError::PostNotFound)?;
        if post.is_deleted() {
            return Err(StorageError::PostIsDeleted);
        }

        let comment = match parent_id {
            // top level: one map insertion
            None => {
                if post.input.is_mute {
                    return Err(StorageError::PostIsMute);
                }
                tree::insert(&mut post.comments, input, self.ids.as_ref())
            }
            // reply: find the parent anywhere in the tree first
            Some(parent_id) => {
                let (parent, depth) = tree::find_mut_with_depth(&mut post.comments, &parent_id)
                    .ok_or(StorageError::CommentNotFound)?;
                tree::insert_reply(parent, depth, input, self.ids.as_ref())?
            }
        };

        debug!(id = %comment.id, "inserted comment");
        Ok(comment)
    }

    #[instrument(skip(self, ctx, input))]
    async fn update_comment(
        &self,
        ctx: &Context,
        post_id: Uuid,
        comment_id: Uuid,
        input: InComment,
    ) -> Result<Comment> {
        ctx.check()?;
        let mut posts = self.posts.write().await;

        let post = posts.get_mut(&post_id).ok_or(StorageError::PostNotFound)?;
        tree::update(&mut post.comments, &comment_id, input)
    }

    #[instrument(skip(self, ctx))]
    async fn delete_comment(&self, ctx: &Context, post_id: Uuid, comment_id: Uuid) -> Result<Uuid> {
        ctx.check()?;
        let mut posts = self.posts.write().await;

        let post = posts.get_mut(&post_id).ok_or(StorageError::PostNotFound)?;
        tree::delete(&mut post.comments, &comment_id)
    }
}
