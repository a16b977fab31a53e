//! Remote backend: hosted relational store, blob storage and change feed.
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │  RemoteBackend (trait)                                       │
//! │  ├── RestBackend    REST rows + storage objects + realtime   │
//! │  └── MemoryRemote   in-process store shared between sessions │
//! │                                                              │
//! │  subscribe() -> Subscription                                 │
//! │  └── ChangeEvent: Inserted | Updated | Deleted               │
//! └──────────────────────────────────────────────────────────────┘
//! ```

mod memory;
pub mod realtime;
mod rest;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::blobs::ImageUpload;
use crate::error::WishlistResult;
use crate::types::{ItemId, ItemPatch, NewItem, User, WishlistItem};

pub use memory::MemoryRemote;
pub use rest::RestBackend;

/// Table holding the wishlist rows
pub const TABLE: &str = "wishlist_items";

/// Name of the change-feed channel
pub const CHANNEL: &str = "wishlist_changes";

/// Row-level change pushed by the remote store
#[derive(Debug, Clone, PartialEq)]
pub enum ChangeEvent {
    /// A row was inserted (by anyone, including this session)
    Inserted(WishlistItem),
    /// A row was updated; carries the full new row
    Updated(WishlistItem),
    /// A row was deleted; the old row is only guaranteed to carry its key
    Deleted { id: ItemId },
}

impl ChangeEvent {
    pub fn item_id(&self) -> &ItemId {
        match self {
            ChangeEvent::Inserted(item) | ChangeEvent::Updated(item) => &item.id,
            ChangeEvent::Deleted { id } => id,
        }
    }
}

/// Operations the store needs from the hosted backend
///
/// Every call is a single attempt; callers decide what a failure means.
#[async_trait]
pub trait RemoteBackend: Send + Sync {
    /// All rows, newest `created_at` first
    async fn fetch_all(&self) -> WishlistResult<Vec<WishlistItem>>;

    /// Insert a row; the backend assigns `id` and timestamps
    async fn insert(&self, item: &NewItem) -> WishlistResult<WishlistItem>;

    /// Apply `patch` to the row, stamping `updated_by` and `updated_at`
    async fn update(
        &self,
        id: &ItemId,
        patch: &ItemPatch,
        updated_by: User,
    ) -> WishlistResult<WishlistItem>;

    async fn delete(&self, id: &ItemId) -> WishlistResult<()>;

    /// Store an image and return its public URL
    async fn upload_image(&self, upload: &ImageUpload, owner: User) -> WishlistResult<String>;

    async fn delete_image(&self, url: &str) -> WishlistResult<()>;

    /// Open the change feed for the wishlist table
    async fn subscribe(&self) -> WishlistResult<Subscription>;
}

/// Live change-feed subscription
///
/// Owns the background task pumping events; dropping the subscription
/// stops it.
pub struct Subscription {
    events: mpsc::UnboundedReceiver<ChangeEvent>,
    task: Option<JoinHandle<()>>,
}

impl Subscription {
    pub fn new(events: mpsc::UnboundedReceiver<ChangeEvent>, task: JoinHandle<()>) -> Self {
        Self {
            events,
            task: Some(task),
        }
    }

    /// Next event in feed order; `None` once the feed has ended
    pub async fn recv(&mut self) -> Option<ChangeEvent> {
        self.events.recv().await
    }

    /// Drain events that have already arrived
    pub fn try_recv(&mut self) -> Option<ChangeEvent> {
        self.events.try_recv().ok()
    }

    pub fn is_active(&self) -> bool {
        self.task.as_ref().is_some_and(|t| !t.is_finished())
    }

    /// Stop the feed
    pub fn close(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
            debug!("Change feed subscription released");
        }
        self.events.close();
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.close();
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.is_active())
            .finish()
    }
}
