//! WishlistStore - the single owner of a session's wishlist
//!
//! The store holds the canonical in-memory list and routes every operation
//! to the backend chosen when the session started:
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────┐
//! │                        WishlistStore                           │
//! │                                                                │
//! │  add / update / toggle / delete / upload_image                 │
//! │        │                                                       │
//! │        ▼                                                       │
//! │  ┌──────────────┐  confirmed   ┌───────────────┐               │
//! │  │   Backend    │ ───────────▶ │ WishlistState │ ──▶ StoreEvent│
//! │  │ Remote|Local │              └───────────────┘               │
//! │  └──────────────┘                      ▲                       │
//! │        │ subscribe()                   │ merge()               │
//! │        ▼                               │                       │
//! │   Subscription ─── ChangeEvent ────────┘                       │
//! └────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every mutation waits for the backend to confirm before memory changes.
//! Backend failures are logged, surfaced as a failure notice, and leave the
//! list untouched. Nothing is retried.
//!
//! # Example
//!
//! ```ignore
//! use bilvin_core::{Backend, NewItem, Session, User, WishlistStore};
//!
//! let session = Session::unlock("bicanosaurus", User::Bilqis)?;
//! let mut store = WishlistStore::new(session, backend);
//! store.load().await;
//! store.add(NewItem::new("Trip to Bali", User::Bilqis)).await?;
//! ```

use std::sync::Arc;

use chrono::Utc;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use crate::blobs::ImageUpload;
use crate::config::{BackendMode, RemoteConfig};
use crate::error::{WishlistError, WishlistResult};
use crate::local::LocalBackend;
use crate::remote::{ChangeEvent, RemoteBackend, RestBackend, Subscription};
use crate::session::Session;
use crate::sync::{MergeOutcome, Notice, StoreEvent, WishlistState};
use crate::types::{CategoryFilter, ItemId, ItemPatch, NewItem, Progress, User, WishlistItem};

/// Default capacity for event broadcast channel
const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Where a session's operations go. Chosen once, never re-evaluated.
#[derive(Clone)]
pub enum Backend {
    Remote(Arc<dyn RemoteBackend>),
    Local(LocalBackend),
}

impl Backend {
    /// Use the hosted store when `config` is present, local storage otherwise.
    pub fn select(config: Option<RemoteConfig>, local: LocalBackend) -> Self {
        let mode = BackendMode::from_config(config.as_ref());
        info!(%mode, "Selected wishlist backend");
        match config {
            Some(config) => Backend::Remote(Arc::new(RestBackend::new(config))),
            None => Backend::Local(local),
        }
    }

    pub fn remote(remote: impl RemoteBackend + 'static) -> Self {
        Backend::Remote(Arc::new(remote))
    }

    pub fn mode(&self) -> BackendMode {
        match self {
            Backend::Remote(_) => BackendMode::Remote,
            Backend::Local(_) => BackendMode::LocalOnly,
        }
    }
}

impl std::fmt::Debug for Backend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Backend({})", self.mode())
    }
}

/// Session-scoped wishlist store
pub struct WishlistStore {
    session: Session,
    backend: Backend,
    state: WishlistState,
    /// Change feed, remote mode only
    subscription: Option<Subscription>,
    event_tx: broadcast::Sender<StoreEvent>,
}

impl WishlistStore {
    pub fn new(session: Session, backend: Backend) -> Self {
        let (event_tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        info!(user = %session.user(), mode = %backend.mode(), "Wishlist store created");
        Self {
            session,
            backend,
            state: WishlistState::new(),
            subscription: None,
            event_tx,
        }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn mode(&self) -> BackendMode {
        self.backend.mode()
    }

    /// Current items, most recent first
    pub fn items(&self) -> &[WishlistItem] {
        self.state.items()
    }

    pub fn get(&self, id: &ItemId) -> Option<&WishlistItem> {
        self.state.get(id)
    }

    pub fn filtered(&self, filter: CategoryFilter) -> Vec<&WishlistItem> {
        self.state.filtered(filter)
    }

    pub fn progress(&self) -> Progress {
        self.state.progress()
    }

    /// Listen for list changes and notices
    pub fn subscribe_events(&self) -> broadcast::Receiver<StoreEvent> {
        self.event_tx.subscribe()
    }

    pub(crate) fn event_sender(&self) -> broadcast::Sender<StoreEvent> {
        self.event_tx.clone()
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Item Operations
    // ═══════════════════════════════════════════════════════════════════════

    /// Load the full list from the session's backend.
    ///
    /// Never fails: on a backend error the failure is logged and announced,
    /// and whatever is already in memory (usually nothing) is returned.
    pub async fn load(&mut self) -> Vec<WishlistItem> {
        let loaded = match &self.backend {
            Backend::Remote(remote) => remote.fetch_all().await,
            Backend::Local(local) => local.load(),
        };

        match loaded {
            Ok(items) => {
                info!(count = items.len(), mode = %self.mode(), "Wishlist loaded");
                self.state = WishlistState::from_items(items);
                self.items_changed();
            }
            Err(e) => {
                warn!(error = %e, "Failed to load wishlist");
                self.notify(Notice::failure("Couldn't load the wishlist"));
            }
        }
        self.state.items().to_vec()
    }

    /// Add a new item and return it as persisted.
    ///
    /// # Errors
    ///
    /// Returns `WishlistError::Validation` for an empty title (no backend
    /// call is made). Returns `WishlistError::BackendUnavailable` if the
    /// backend rejects the insert.
    pub async fn add(&mut self, item: NewItem) -> WishlistResult<WishlistItem> {
        let title = item.title.trim().to_string();
        if title.is_empty() {
            return Err(WishlistError::Validation("title must not be empty".into()));
        }
        let draft = NewItem { title, ..item }.normalized();

        let saved = match &self.backend {
            Backend::Remote(remote) => remote.insert(&draft).await,
            Backend::Local(local) => {
                let item = draft.into_item(ItemId::generate(), Utc::now());
                let mut next = Vec::with_capacity(self.state.len() + 1);
                next.push(item.clone());
                next.extend_from_slice(self.state.items());
                local.save(&next).map(|_| item)
            }
        };
        let saved = saved.map_err(|e| self.fail("add the wish", e))?;

        // The change feed may already have delivered it.
        self.state.prepend(saved.clone());
        self.items_changed();
        self.notify(Notice::success("New wish added! 🎉"));

        debug!(id = %saved.id, title = %saved.title, "Wish added");
        Ok(saved)
    }

    /// Apply `patch` to an existing item.
    ///
    /// # Errors
    ///
    /// Returns `WishlistError::NotFound` if `id` is not in the list, and
    /// `WishlistError::Validation` if the patch would empty the title.
    pub async fn update(
        &mut self,
        id: &ItemId,
        patch: ItemPatch,
        updated_by: User,
    ) -> WishlistResult<WishlistItem> {
        let current = self.require(id)?.clone();

        let mut patch = patch.normalized();
        if let Some(title) = patch.title.take() {
            let title = title.trim().to_string();
            if title.is_empty() {
                return Err(WishlistError::Validation("title must not be empty".into()));
            }
            patch.title = Some(title);
        }

        let saved = match &self.backend {
            Backend::Remote(remote) => remote.update(id, &patch, updated_by).await,
            Backend::Local(local) => {
                let mut item = current.clone();
                patch.apply_to(&mut item);
                item.updated_by = Some(updated_by);
                item.updated_at = Utc::now().max(current.updated_at);

                let next: Vec<WishlistItem> = self
                    .state
                    .items()
                    .iter()
                    .map(|existing| {
                        if existing.id == item.id {
                            item.clone()
                        } else {
                            existing.clone()
                        }
                    })
                    .collect();
                local.save(&next).map(|_| item)
            }
        };
        let saved = saved.map_err(|e| self.fail("update the wish", e))?;

        if !self.state.replace(saved.clone()) {
            // Deleted by the feed while the update was in flight.
            debug!(%id, "Updated wish no longer in list");
        }
        self.items_changed();
        let toggle_only = ItemPatch {
            completed: None,
            ..patch
        }
        .is_empty();
        if !toggle_only {
            self.notify(Notice::success("Wish updated! ✨"));
        }

        debug!(%id, by = %updated_by, "Wish updated");
        Ok(saved)
    }

    /// Flip an item's `completed` flag.
    pub async fn toggle_complete(
        &mut self,
        id: &ItemId,
        updated_by: User,
    ) -> WishlistResult<WishlistItem> {
        let completed = self.require(id)?.completed;
        self.update(id, ItemPatch::completed(!completed), updated_by)
            .await
    }

    /// Delete an item. Only its creator may do so.
    ///
    /// An attached image is removed afterwards on a best-effort basis.
    ///
    /// # Errors
    ///
    /// Returns `WishlistError::PermissionDenied` before touching the backend
    /// when `requested_by` did not create the item.
    pub async fn delete(&mut self, id: &ItemId, requested_by: User) -> WishlistResult<()> {
        let item = self.require(id)?.clone();
        if !item.can_delete(requested_by) {
            self.notify(Notice::info("Only the creator can delete this wish 😅"));
            return Err(WishlistError::PermissionDenied {
                item: id.clone(),
                requested_by,
                created_by: item.created_by,
            });
        }

        let deleted = match &self.backend {
            Backend::Remote(remote) => remote.delete(id).await,
            Backend::Local(local) => {
                let next: Vec<WishlistItem> = self
                    .state
                    .items()
                    .iter()
                    .filter(|existing| &existing.id != id)
                    .cloned()
                    .collect();
                local.save(&next)
            }
        };
        deleted.map_err(|e| self.fail("delete the wish", e))?;

        self.state.remove(id);
        self.items_changed();
        self.notify(Notice::success("Wish deleted"));
        debug!(%id, by = %requested_by, "Wish deleted");

        if let (Some(url), Backend::Remote(remote)) = (&item.image_url, &self.backend) {
            if let Err(e) = remote.delete_image(url).await {
                warn!(%id, %url, error = %e, "Failed to delete wish image");
            }
        }
        Ok(())
    }

    /// Upload an image and return its public URL.
    ///
    /// Returns `Ok(None)` when the upload fails or when there is no blob
    /// store (local-only mode).
    ///
    /// # Errors
    ///
    /// Returns `WishlistError::Validation` for payloads above 5 MiB; the
    /// backend is not contacted.
    pub async fn upload_image(
        &mut self,
        upload: ImageUpload,
        owner: User,
    ) -> WishlistResult<Option<String>> {
        if let Err(e) = upload.validate() {
            self.notify(Notice::info("Maximum file size is 5MB"));
            return Err(e);
        }

        let remote = match &self.backend {
            Backend::Remote(remote) => Arc::clone(remote),
            Backend::Local(_) => {
                debug!(file = %upload.file_name, "No blob store in local-only mode");
                return Ok(None);
            }
        };

        match remote.upload_image(&upload, owner).await {
            Ok(url) => {
                debug!(%url, size = upload.size(), "Image uploaded");
                Ok(Some(url))
            }
            Err(e) => {
                warn!(file = %upload.file_name, error = %e, "Image upload failed");
                self.notify(Notice::failure("Couldn't upload the image"));
                Ok(None)
            }
        }
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Change Feed
    // ═══════════════════════════════════════════════════════════════════════

    /// Open the change feed. Returns `false` in local-only mode.
    pub async fn start_feed(&mut self) -> WishlistResult<bool> {
        let Backend::Remote(remote) = &self.backend else {
            return Ok(false);
        };
        if self.subscription.is_some() {
            return Ok(true);
        }

        match remote.subscribe().await {
            Ok(subscription) => {
                info!(user = %self.session.user(), "Change feed started");
                self.subscription = Some(subscription);
                Ok(true)
            }
            Err(e) => Err(self.fail("connect to live updates", e)),
        }
    }

    pub fn feed_active(&self) -> bool {
        self.subscription.as_ref().is_some_and(Subscription::is_active)
    }

    /// Merge one change-feed event into the list.
    pub fn apply_change(&mut self, event: ChangeEvent) -> MergeOutcome {
        let id = event.item_id().clone();
        let title = match &event {
            ChangeEvent::Inserted(item) => Some(item.title.clone()),
            _ => None,
        };

        let outcome = self.state.merge(event, self.session.user());
        match outcome {
            MergeOutcome::Added { peer: Some(by) } => {
                self.notify(Notice::peer_added(by, title.as_deref().unwrap_or_default()));
            }
            MergeOutcome::Ignored(reason) => {
                debug!(%id, ?reason, "Change feed event ignored");
            }
            _ => {}
        }
        if outcome.changed() {
            self.items_changed();
        }
        outcome
    }

    /// Apply every change-feed event that has already arrived.
    ///
    /// Returns the number of events processed.
    pub fn process_pending_changes(&mut self) -> usize {
        let mut processed = 0;
        while let Some(event) = self.subscription.as_mut().and_then(Subscription::try_recv) {
            self.apply_change(event);
            processed += 1;
        }
        processed
    }

    /// Wait for the next change-feed event.
    ///
    /// Pends forever without a feed. When the feed ends the subscription is
    /// dropped, `FeedClosed` is emitted and `None` returned.
    pub async fn next_change(&mut self) -> Option<ChangeEvent> {
        let Some(subscription) = self.subscription.as_mut() else {
            return std::future::pending().await;
        };
        match subscription.recv().await {
            Some(event) => Some(event),
            None => {
                warn!("Change feed ended");
                self.subscription = None;
                self.emit(StoreEvent::FeedClosed);
                None
            }
        }
    }

    /// Release the change feed.
    pub fn shutdown(&mut self) {
        if let Some(mut subscription) = self.subscription.take() {
            subscription.close();
            self.emit(StoreEvent::FeedClosed);
        }
        let open_for = Utc::now() - self.session.opened_at();
        info!(
            user = %self.session.user(),
            open_secs = open_for.num_seconds(),
            "Wishlist store shut down"
        );
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Internal Helpers
    // ═══════════════════════════════════════════════════════════════════════

    fn require(&self, id: &ItemId) -> WishlistResult<&WishlistItem> {
        self.state.get(id).ok_or_else(|| {
            warn!(%id, "Wish not found");
            WishlistError::NotFound(id.clone())
        })
    }

    /// Log, announce and normalize a backend failure
    fn fail(&self, action: &str, err: WishlistError) -> WishlistError {
        warn!(action, error = %err, "Wishlist backend call failed");
        self.notify(Notice::failure(format!("Failed to {}", action)));
        match err {
            WishlistError::BackendUnavailable(_) => err,
            other => WishlistError::BackendUnavailable(other.to_string()),
        }
    }

    fn items_changed(&self) {
        self.emit(StoreEvent::ItemsChanged {
            count: self.state.len(),
        });
    }

    fn notify(&self, notice: Notice) {
        self.emit(StoreEvent::Notice(notice));
    }

    fn emit(&self, event: StoreEvent) {
        // No listeners is fine.
        let _ = self.event_tx.send(event);
    }
}
