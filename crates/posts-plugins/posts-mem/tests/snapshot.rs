use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use posts_core::{Context, InComment, InPost, Post, PostStorage, StorageError};
use posts_mem::{MemPostStorage, SnapshotSink};
use tokio::fs::{File, OpenOptions};
use tokio::sync::mpsc;
use uuid::Uuid;

const INTERVAL: Duration = Duration::from_millis(20);

async fn open(path: &Path) -> File {
    OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(false)
        .open(path)
        .await
        .unwrap()
}

async fn persistent_store(path: &Path) -> (MemPostStorage, mpsc::Receiver<StorageError>) {
    let (tx, rx) = mpsc::channel(1);
    let file = open(path).await;
    let sink = file.try_clone().await.unwrap();

    let store = MemPostStorage::builder()
        .restore_from(file)
        .dump_to(sink, INTERVAL, tx)
        .build()
        .await
        .unwrap();
    (store, rx)
}

fn by_id(posts: Vec<Post>) -> HashMap<Uuid, Post> {
    posts.into_iter().map(|p| (p.id, p)).collect()
}

#[tokio::test]
async fn cold_start_from_empty_file() {
    let dir = tempfile::tempdir().unwrap();
    let (store, mut rx) = persistent_store(&dir.path().join("dump")).await;

    assert!(store.get_posts(&Context::background()).await.unwrap().is_empty());

    store.close().await;
    assert!(rx.try_recv().is_err());
}

#[tokio::test]
async fn restore_reproduces_dumped_store() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("dump");
    let ctx = Context::background();

    let (store, _rx) = persistent_store(&path).await;
    let post = store
        .insert_post(
            &ctx,
            InPost {
                user_id: Uuid::new_v4(),
                is_mute: false,
                content: "hello".into(),
            },
        )
        .await
        .unwrap();
    let comment = store
        .insert_comment(
            &ctx,
            post.id,
            None,
            InComment {
                user_id: Uuid::new_v4(),
                content: "top".into(),
            },
        )
        .await
        .unwrap();
    let reply = store
        .insert_comment(&ctx, post.id, Some(comment.id), InComment::default())
        .await
        .unwrap();
    store.delete_comment(&ctx, post.id, reply.id).await.unwrap();
    let muted = store
        .insert_post(
            &ctx,
            InPost {
                user_id: Uuid::new_v4(),
                is_mute: true,
                content: "quiet".into(),
            },
        )
        .await
        .unwrap();
    store.delete_post(&ctx, muted.id).await.unwrap();

    let before = by_id(store.get_posts(&ctx).await.unwrap());

    tokio::time::sleep(INTERVAL * 5).await;
    store.close().await;

    let (restored, _rx) = persistent_store(&path).await;
    let after = by_id(restored.get_posts(&ctx).await.unwrap());
    assert_eq!(after, before);

    let deep = restored.get_comment(&ctx, post.id, reply.id).await.unwrap();
    assert!(deep.is_deleted());

    restored.close().await;
}

#[tokio::test]
async fn deep_thread_survives_dump_and_restore() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("dump");
    let ctx = Context::background();

    let (store, _rx) = persistent_store(&path).await;
    let post = store.insert_post(&ctx, InPost::default()).await.unwrap();
    let mut parent = None;
    for depth in 0..150 {
        let comment = store
            .insert_comment(
                &ctx,
                post.id,
                parent,
                InComment {
                    user_id: Uuid::new_v4(),
                    content: depth.to_string(),
                },
            )
            .await
            .unwrap();
        parent = Some(comment.id);
    }
    let deepest = parent.unwrap();
    let before = store.get_post(&ctx, post.id).await.unwrap();

    tokio::time::sleep(INTERVAL * 5).await;
    store.close().await;

    let (restored, _rx) = persistent_store(&path).await;
    assert_eq!(restored.get_post(&ctx, post.id).await.unwrap(), before);
    let bottom = restored.get_comment(&ctx, post.id, deepest).await.unwrap();
    assert_eq!(bottom.input.content, "149");

    restored.close().await;
}

#[tokio::test]
async fn missing_snapshot_path_is_a_cold_start() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("never-written");

    let store = MemPostStorage::builder()
        .restore_from_path(&path)
        .build()
        .await
        .unwrap();

    assert!(store.get_posts(&Context::background()).await.unwrap().is_empty());
    assert!(!path.exists());
}

#[tokio::test]
async fn snapshot_path_restores_existing_dump() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("dump");
    let ctx = Context::background();

    let (store, _rx) = persistent_store(&path).await;
    let post = store.insert_post(&ctx, InPost::default()).await.unwrap();
    tokio::time::sleep(INTERVAL * 5).await;
    store.close().await;

    let restored = MemPostStorage::builder()
        .restore_from_path(&path)
        .build()
        .await
        .unwrap();
    assert_eq!(restored.get_post(&ctx, post.id).await.unwrap(), post);
}

#[tokio::test]
async fn unreadable_snapshot_path_fails_build() {
    let dir = tempfile::tempdir().unwrap();

    // a directory cannot be read as a snapshot
    let result = MemPostStorage::builder()
        .restore_from_path(dir.path())
        .build()
        .await;
    assert!(matches!(result, Err(StorageError::BadRestore(_))));
}

#[tokio::test]
async fn restore_rejects_corrupt_snapshot() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("dump");
    tokio::fs::write(&path, b"[1, 2").await.unwrap();

    let result = MemPostStorage::builder()
        .restore_from(open(&path).await)
        .build()
        .await;
    assert!(matches!(result, Err(StorageError::BadRestore(_))));
}

struct BrokenSink;

#[async_trait]
impl SnapshotSink for BrokenSink {
    async fn overwrite(&mut self, _bytes: &[u8]) -> std::io::Result<()> {
        Err(std::io::Error::new(
            std::io::ErrorKind::PermissionDenied,
            "read-only filesystem",
        ))
    }
}

#[tokio::test]
async fn dump_failure_escalates_and_store_keeps_serving() {
    let (tx, mut rx) = mpsc::channel(1);
    let store = MemPostStorage::builder()
        .dump_to(BrokenSink, INTERVAL, tx)
        .build()
        .await
        .unwrap();

    let err = rx.recv().await.unwrap();
    assert!(matches!(err, StorageError::BadDump(msg) if msg.contains("read-only")));
    // reported exactly once
    assert!(rx.recv().await.is_none());

    let ctx = Context::background();
    let post = store.insert_post(&ctx, InPost::default()).await.unwrap();
    assert_eq!(store.get_post(&ctx, post.id).await.unwrap(), post);
}
