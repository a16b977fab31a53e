//! In-process remote backend.
//!
//! Behaves like the hosted store (backend-assigned ids, newest-first reads,
//! a broadcast change feed, public image URLs) so two sessions sharing one
//! `MemoryRemote` see each other's changes. Can be switched offline to
//! exercise failure paths.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::Utc;
use parking_lot::Mutex;
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, warn};
use ulid::Ulid;

use super::{ChangeEvent, RemoteBackend, Subscription};
use crate::blobs::{object_path_from_url, ImageUpload, BUCKET};
use crate::error::{WishlistError, WishlistResult};
use crate::types::{ItemId, ItemPatch, NewItem, User, WishlistItem};

const FEED_CAPACITY: usize = 256;
const BASE_URL: &str = "memory://bilvin";

struct Inner {
    rows: Mutex<Vec<WishlistItem>>,
    objects: Mutex<HashMap<String, Bytes>>,
    feed: broadcast::Sender<ChangeEvent>,
    online: AtomicBool,
    calls: AtomicUsize,
}

/// Shared in-memory stand-in for the hosted store
#[derive(Clone)]
pub struct MemoryRemote {
    inner: Arc<Inner>,
}

impl Default for MemoryRemote {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryRemote {
    pub fn new() -> Self {
        let (feed, _) = broadcast::channel(FEED_CAPACITY);
        Self {
            inner: Arc::new(Inner {
                rows: Mutex::new(Vec::new()),
                objects: Mutex::new(HashMap::new()),
                feed,
                online: AtomicBool::new(true),
                calls: AtomicUsize::new(0),
            }),
        }
    }

    /// Simulate the network going away (or coming back)
    pub fn set_online(&self, online: bool) {
        self.inner.online.store(online, Ordering::SeqCst);
    }

    /// Number of backend calls made so far, failed ones included
    pub fn call_count(&self) -> usize {
        self.inner.calls.load(Ordering::SeqCst)
    }

    /// Current rows, newest first
    pub fn rows(&self) -> Vec<WishlistItem> {
        let mut rows = self.inner.rows.lock().clone();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        rows
    }

    pub fn has_object(&self, path: &str) -> bool {
        self.inner.objects.lock().contains_key(path)
    }

    pub fn object_count(&self) -> usize {
        self.inner.objects.lock().len()
    }

    /// Push a raw event to every subscriber, as if another writer made it
    pub fn emit(&self, event: ChangeEvent) {
        // No subscribers is fine.
        let _ = self.inner.feed.send(event);
    }

    fn begin_call(&self, op: &str) -> WishlistResult<()> {
        self.inner.calls.fetch_add(1, Ordering::SeqCst);
        if !self.inner.online.load(Ordering::SeqCst) {
            return Err(WishlistError::BackendUnavailable(format!(
                "{}: remote store unreachable",
                op
            )));
        }
        Ok(())
    }

    fn public_url(path: &str) -> String {
        format!("{}/storage/v1/object/public/{}/{}", BASE_URL, BUCKET, path)
    }
}

#[async_trait]
impl RemoteBackend for MemoryRemote {
    async fn fetch_all(&self) -> WishlistResult<Vec<WishlistItem>> {
        self.begin_call("fetch_all")?;
        Ok(self.rows())
    }

    async fn insert(&self, item: &NewItem) -> WishlistResult<WishlistItem> {
        self.begin_call("insert")?;
        let row = item
            .clone()
            .into_item(ItemId::from(Ulid::new().to_string().to_lowercase()), Utc::now());
        self.inner.rows.lock().push(row.clone());
        debug!(id = %row.id, "Row inserted");
        self.emit(ChangeEvent::Inserted(row.clone()));
        Ok(row)
    }

    async fn update(
        &self,
        id: &ItemId,
        patch: &ItemPatch,
        updated_by: User,
    ) -> WishlistResult<WishlistItem> {
        self.begin_call("update")?;
        let row = {
            let mut rows = self.inner.rows.lock();
            let row = rows.iter_mut().find(|r| &r.id == id).ok_or_else(|| {
                WishlistError::BackendUnavailable(format!("no row with id {}", id))
            })?;
            patch.apply_to(row);
            row.updated_by = Some(updated_by);
            row.updated_at = Utc::now();
            row.clone()
        };
        self.emit(ChangeEvent::Updated(row.clone()));
        Ok(row)
    }

    async fn delete(&self, id: &ItemId) -> WishlistResult<()> {
        self.begin_call("delete")?;
        let removed = {
            let mut rows = self.inner.rows.lock();
            let before = rows.len();
            rows.retain(|r| &r.id != id);
            rows.len() != before
        };
        if removed {
            self.emit(ChangeEvent::Deleted { id: id.clone() });
        }
        Ok(())
    }

    async fn upload_image(&self, upload: &ImageUpload, owner: User) -> WishlistResult<String> {
        self.begin_call("upload_image")?;
        let path = upload.object_path(owner, Utc::now().timestamp_millis());
        self.inner
            .objects
            .lock()
            .insert(path.clone(), upload.bytes.clone());
        Ok(Self::public_url(&path))
    }

    async fn delete_image(&self, url: &str) -> WishlistResult<()> {
        self.begin_call("delete_image")?;
        let path = object_path_from_url(url).ok_or_else(|| {
            WishlistError::Validation(format!("not a {} bucket URL: {}", BUCKET, url))
        })?;
        self.inner.objects.lock().remove(path);
        Ok(())
    }

    async fn subscribe(&self) -> WishlistResult<Subscription> {
        self.begin_call("subscribe")?;
        let mut feed = self.inner.feed.subscribe();
        let (tx, rx) = mpsc::unbounded_channel();

        let task = tokio::spawn(async move {
            loop {
                match feed.recv().await {
                    Ok(event) => {
                        if tx.send(event).is_err() {
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(skipped, "Change feed subscriber lagged");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        });

        Ok(Subscription::new(rx, task))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_insert_assigns_id_and_orders_newest_first() {
        let remote = MemoryRemote::new();
        let first = remote.insert(&NewItem::new("First", User::Bilqis)).await.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(2)).await;
        let second = remote.insert(&NewItem::new("Second", User::Kevin)).await.unwrap();

        assert_ne!(first.id, second.id);
        let rows = remote.fetch_all().await.unwrap();
        assert_eq!(rows[0].id, second.id);
        assert_eq!(rows[1].id, first.id);
    }

    #[tokio::test]
    async fn test_offline_calls_fail_and_are_counted() {
        let remote = MemoryRemote::new();
        remote.set_online(false);
        let err = remote.fetch_all().await.unwrap_err();
        assert!(matches!(err, WishlistError::BackendUnavailable(_)));
        assert_eq!(remote.call_count(), 1);
    }

    #[tokio::test]
    async fn test_subscription_receives_changes() {
        let remote = MemoryRemote::new();
        let mut sub = remote.subscribe().await.unwrap();

        let row = remote.insert(&NewItem::new("Feed me", User::Kevin)).await.unwrap();
        remote
            .update(&row.id, &ItemPatch::completed(true), User::Bilqis)
            .await
            .unwrap();
        remote.delete(&row.id).await.unwrap();

        assert!(matches!(sub.recv().await, Some(ChangeEvent::Inserted(_))));
        match sub.recv().await {
            Some(ChangeEvent::Updated(updated)) => {
                assert!(updated.completed);
                assert_eq!(updated.updated_by, Some(User::Bilqis));
            }
            other => panic!("expected update, got {:?}", other),
        }
        assert_eq!(sub.recv().await, Some(ChangeEvent::Deleted { id: row.id }));
    }

    #[tokio::test]
    async fn test_image_upload_and_delete() {
        let remote = MemoryRemote::new();
        let url = remote
            .upload_image(&ImageUpload::new("a.png", vec![1u8; 10]), User::Kevin)
            .await
            .unwrap();
        assert!(url.contains("/wishlist/wishlist-images/kevin-"));
        assert_eq!(remote.object_count(), 1);

        remote.delete_image(&url).await.unwrap();
        assert_eq!(remote.object_count(), 0);
    }

    #[tokio::test]
    async fn test_dropping_subscription_releases_it() {
        let remote = MemoryRemote::new();
        let sub = remote.subscribe().await.unwrap();
        assert!(sub.is_active());
        assert_eq!(remote.inner.feed.receiver_count(), 1);

        drop(sub);
        tokio::task::yield_now().await;
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        assert_eq!(remote.inner.feed.receiver_count(), 0);
    }
}
