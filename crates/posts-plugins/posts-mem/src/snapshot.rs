//! Whole-store snapshots.
//!
//! The store is restored once from a byte source when it is built, then a
//! background worker periodically rewrites the full post map into a sink.
//! A rewrite is truncate-then-write, so a crash in the middle of a dump loses
//! the previous snapshot as well.

use std::collections::HashMap;
use std::io::SeekFrom;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use posts_core::{Post, Result, StorageError};
use serde::Deserialize;
use tokio::fs::File;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncSeekExt, AsyncWriteExt};
use tokio::sync::{mpsc, oneshot, RwLock};
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

pub(crate) type PostMap = HashMap<Uuid, Post>;

/// Destination of dumps. Each call replaces whatever the sink held before.
#[async_trait]
pub trait SnapshotSink: Send + 'static {
    async fn overwrite(&mut self, bytes: &[u8]) -> std::io::Result<()>;
}

#[async_trait]
impl SnapshotSink for File {
    async fn overwrite(&mut self, bytes: &[u8]) -> std::io::Result<()> {
        self.set_len(0).await?;
        self.seek(SeekFrom::Start(0)).await?;
        self.write_all(bytes).await?;
        self.flush().await
    }
}

/// Decodes a snapshot. Empty or whitespace-only input is a cold start.
pub(crate) async fn restore<R>(source: &mut R) -> Result<PostMap>
where
    R: AsyncRead + Unpin + ?Sized,
{
    let mut bytes = Vec::new();
    source
        .read_to_end(&mut bytes)
        .await
        .map_err(|e| StorageError::BadRestore(e.to_string()))?;

    if bytes.iter().all(u8::is_ascii_whitespace) {
        info!("snapshot source is empty, starting with an empty store");
        return Ok(PostMap::new());
    }

    let posts = decode(&bytes).map_err(|e| StorageError::BadRestore(e.to_string()))?;
    info!(posts = posts.len(), "restored store from snapshot");
    Ok(posts)
}

/// Every reply level nests two JSON containers, so serde_json's default depth
/// limit is lifted and the decoder grows its stack on demand instead.
fn decode(bytes: &[u8]) -> serde_json::Result<PostMap> {
    let mut de = serde_json::Deserializer::from_slice(bytes);
    de.disable_recursion_limit();
    let posts = PostMap::deserialize(serde_stacker::Deserializer::new(&mut de))?;
    de.end()?;
    Ok(posts)
}

/// One dump cycle. Holds the write lock for the whole cycle, sink I/O
/// included, so the snapshot is consistent and requests wait for it.
pub(crate) async fn dump_once(posts: &RwLock<PostMap>, sink: &mut dyn SnapshotSink) -> Result<()> {
    let guard = posts.write().await;

    let bytes = serde_json::to_vec(&*guard).map_err(|e| StorageError::BadDump(e.to_string()))?;
    sink.overwrite(&bytes)
        .await
        .map_err(|e| StorageError::BadDump(e.to_string()))?;

    debug!(posts = guard.len(), bytes = bytes.len(), "dumped store");
    Ok(())
}

/// Background task rewriting the snapshot every `interval`.
///
/// The first failure is sent on the error channel and ends the task for good;
/// the store keeps serving from memory.
pub(crate) struct DumpWorker {
    stop_tx: Option<oneshot::Sender<()>>,
    join_handle: Option<JoinHandle<()>>,
}

impl DumpWorker {
    pub(crate) fn spawn(
        posts: Arc<RwLock<PostMap>>,
        mut sink: Box<dyn SnapshotSink>,
        interval: Duration,
        errors: mpsc::Sender<StorageError>,
    ) -> Self {
        let (stop_tx, mut stop_rx) = oneshot::channel::<()>();

        let join_handle = tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = &mut stop_rx => {
                        debug!("dump worker stopped");
                        break;
                    }
                    _ = sleep(interval) => {
                        if let Err(err) = dump_once(&posts, sink.as_mut()).await {
                            error!(error = %err, "dump failed, persistence disabled");
                            if errors.send(err).await.is_err() {
                                warn!("dump error channel closed, nobody was told");
                            }
                            break;
                        }
                    }
                }
            }
        });

        Self {
            stop_tx: Some(stop_tx),
            join_handle: Some(join_handle),
        }
    }

    /// Signals the worker to stop and waits for an in-flight cycle to finish.
    pub(crate) async fn stop(mut self) {
        if let Some(stop_tx) = self.stop_tx.take() {
            let _ = stop_tx.send(());
        }
        if let Some(join_handle) = self.join_handle.take() {
            if let Err(err) = join_handle.await {
                warn!(error = %err, "dump worker did not exit cleanly");
            }
        }
    }
}

impl Drop for DumpWorker {
    fn drop(&mut self) {
        if let Some(stop_tx) = self.stop_tx.take() {
            let _ = stop_tx.send(());
        }
        if let Some(join_handle) = self.join_handle.take() {
            join_handle.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use posts_core::{Comment, InComment, InPost};

    struct FailingSink;

    #[async_trait]
    impl SnapshotSink for FailingSink {
        async fn overwrite(&mut self, _bytes: &[u8]) -> std::io::Result<()> {
            Err(std::io::Error::other("disk full"))
        }
    }

    #[tokio::test]
    async fn restore_empty_source() {
        let mut source: &[u8] = b"";
        assert!(restore(&mut source).await.unwrap().is_empty());

        let mut source: &[u8] = b" \n";
        assert!(restore(&mut source).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn restore_garbage_is_fatal() {
        let mut source: &[u8] = b"{not json";
        let err = restore(&mut source).await.unwrap_err();
        assert!(matches!(err, StorageError::BadRestore(_)));
    }

    #[tokio::test]
    async fn restore_reads_post_map() {
        let post = Post::new(Uuid::new_v4(), InPost::default());
        let map = PostMap::from([(post.id, post.clone())]);
        let bytes = serde_json::to_vec(&map).unwrap();

        let mut source: &[u8] = &bytes;
        assert_eq!(restore(&mut source).await.unwrap(), map);
    }

    #[tokio::test]
    async fn restore_reads_deep_thread() {
        let mut post = Post::new(Uuid::new_v4(), InPost::default());
        let mut node = Comment::new(Uuid::new_v4(), InComment::default());
        let deepest = node.id;
        for _ in 1..crate::tree::MAX_THREAD_DEPTH {
            let mut parent = Comment::new(Uuid::new_v4(), InComment::default());
            parent.replies.insert(node.id, node);
            node = parent;
        }
        post.comments.insert(node.id, node);
        let map = PostMap::from([(post.id, post.clone())]);
        let bytes = serde_json::to_vec(&map).unwrap();

        let mut source: &[u8] = &bytes;
        let restored = restore(&mut source).await.unwrap();
        assert_eq!(restored, map);
        assert!(crate::tree::find(&restored[&post.id].comments, &deepest).is_some());
    }

    #[tokio::test]
    async fn restore_rejects_trailing_bytes() {
        let mut source: &[u8] = b"{} {}";
        let err = restore(&mut source).await.unwrap_err();
        assert!(matches!(err, StorageError::BadRestore(_)));
    }

    #[tokio::test]
    async fn dump_failure_is_reported() {
        let posts = RwLock::new(PostMap::new());
        let err = dump_once(&posts, &mut FailingSink).await.unwrap_err();
        assert!(matches!(err, StorageError::BadDump(msg) if msg.contains("disk full")));
    }

    #[tokio::test(start_paused = true)]
    async fn worker_reports_once_and_exits() {
        let posts = Arc::new(RwLock::new(PostMap::new()));
        let (tx, mut rx) = mpsc::channel(1);

        let mut worker = DumpWorker::spawn(
            posts.clone(),
            Box::new(FailingSink),
            Duration::from_secs(5),
            tx,
        );

        let err = rx.recv().await.unwrap();
        assert!(matches!(err, StorageError::BadDump(_)));

        // the worker dropped its sender on exit, so the channel drains to None
        assert!(rx.recv().await.is_none());
        let handle = worker.join_handle.take().unwrap();
        assert!(handle.await.is_ok());

        // the lock is free again
        assert!(posts.try_write().is_ok());
    }
}
