//! Session actor: one task owns the store, everything else talks to it.
//!
//! ```text
//!   StoreHandle ──Command──▶ ┌──────────────────────────┐
//!   StoreHandle ──Command──▶ │ session task             │
//!          ▲                 │   select! {              │
//!          └──── oneshot ─── │     commands,            │
//!                            │     change feed,         │
//!                            │   }                      │
//!                            └──────────────────────────┘
//! ```
//!
//! Local operations and feed events are handled one at a time, so the store
//! never sees two writers.

use tokio::sync::{broadcast, mpsc, oneshot};
use tracing::{debug, info};

use crate::blobs::ImageUpload;
use crate::error::{WishlistError, WishlistResult};
use crate::store::WishlistStore;
use crate::sync::StoreEvent;
use crate::types::{CategoryFilter, ItemId, ItemPatch, NewItem, Progress, User, WishlistItem};

const COMMAND_CHANNEL_CAPACITY: usize = 64;

type Reply<T> = oneshot::Sender<T>;

enum Command {
    Load(Reply<Vec<WishlistItem>>),
    StartFeed(Reply<WishlistResult<bool>>),
    Items(CategoryFilter, Reply<Vec<WishlistItem>>),
    Progress(Reply<Progress>),
    Add(NewItem, Reply<WishlistResult<WishlistItem>>),
    Update(ItemId, ItemPatch, User, Reply<WishlistResult<WishlistItem>>),
    Toggle(ItemId, User, Reply<WishlistResult<WishlistItem>>),
    Delete(ItemId, User, Reply<WishlistResult<()>>),
    UploadImage(ImageUpload, User, Reply<WishlistResult<Option<String>>>),
    Shutdown(Reply<()>),
}

/// Cloneable handle to a running session
#[derive(Clone)]
pub struct StoreHandle {
    user: User,
    commands: mpsc::Sender<Command>,
    events: broadcast::Sender<StoreEvent>,
}

impl WishlistStore {
    /// Move the store into its own task and return a handle to it.
    ///
    /// Must be called inside a tokio runtime.
    pub fn spawn(self) -> StoreHandle {
        let (commands, rx) = mpsc::channel(COMMAND_CHANNEL_CAPACITY);
        let handle = StoreHandle {
            user: self.session().user(),
            commands,
            events: self.event_sender(),
        };
        tokio::spawn(run(self, rx));
        handle
    }
}

async fn run(mut store: WishlistStore, mut commands: mpsc::Receiver<Command>) {
    debug!(user = %store.session().user(), "Session task started");
    loop {
        tokio::select! {
            command = commands.recv() => match command {
                Some(Command::Shutdown(reply)) => {
                    store.shutdown();
                    let _ = reply.send(());
                    break;
                }
                Some(command) => handle(&mut store, command).await,
                None => {
                    store.shutdown();
                    break;
                }
            },
            Some(event) = store.next_change() => {
                store.apply_change(event);
            }
        }
    }
    info!(user = %store.session().user(), "Session task stopped");
}

// Dropped replies mean the caller went away; nothing to do.
async fn handle(store: &mut WishlistStore, command: Command) {
    match command {
        Command::Load(reply) => {
            let _ = reply.send(store.load().await);
        }
        Command::StartFeed(reply) => {
            let _ = reply.send(store.start_feed().await);
        }
        Command::Items(filter, reply) => {
            let items = store.filtered(filter).into_iter().cloned().collect();
            let _ = reply.send(items);
        }
        Command::Progress(reply) => {
            let _ = reply.send(store.progress());
        }
        Command::Add(item, reply) => {
            let _ = reply.send(store.add(item).await);
        }
        Command::Update(id, patch, by, reply) => {
            let _ = reply.send(store.update(&id, patch, by).await);
        }
        Command::Toggle(id, by, reply) => {
            let _ = reply.send(store.toggle_complete(&id, by).await);
        }
        Command::Delete(id, by, reply) => {
            let _ = reply.send(store.delete(&id, by).await);
        }
        Command::UploadImage(upload, owner, reply) => {
            let _ = reply.send(store.upload_image(upload, owner).await);
        }
        Command::Shutdown(reply) => {
            store.shutdown();
            let _ = reply.send(());
        }
    }
}

impl StoreHandle {
    /// User the session belongs to
    pub fn user(&self) -> User {
        self.user
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<StoreEvent> {
        self.events.subscribe()
    }

    pub fn is_closed(&self) -> bool {
        self.commands.is_closed()
    }

    async fn request<T>(&self, command: impl FnOnce(Reply<T>) -> Command) -> WishlistResult<T> {
        let (reply, rx) = oneshot::channel();
        self.commands
            .send(command(reply))
            .await
            .map_err(|_| WishlistError::SessionClosed)?;
        rx.await.map_err(|_| WishlistError::SessionClosed)
    }

    pub async fn load(&self) -> WishlistResult<Vec<WishlistItem>> {
        self.request(Command::Load).await
    }

    /// Open the change feed; `false` in local-only mode
    pub async fn start_feed(&self) -> WishlistResult<bool> {
        self.request(Command::StartFeed).await?
    }

    pub async fn items(&self, filter: CategoryFilter) -> WishlistResult<Vec<WishlistItem>> {
        self.request(|reply| Command::Items(filter, reply)).await
    }

    pub async fn progress(&self) -> WishlistResult<Progress> {
        self.request(Command::Progress).await
    }

    pub async fn add(&self, item: NewItem) -> WishlistResult<WishlistItem> {
        self.request(|reply| Command::Add(item, reply)).await?
    }

    pub async fn update(&self, id: ItemId, patch: ItemPatch) -> WishlistResult<WishlistItem> {
        let by = self.user;
        self.request(|reply| Command::Update(id, patch, by, reply))
            .await?
    }

    pub async fn toggle_complete(&self, id: ItemId) -> WishlistResult<WishlistItem> {
        let by = self.user;
        self.request(|reply| Command::Toggle(id, by, reply)).await?
    }

    pub async fn delete(&self, id: ItemId) -> WishlistResult<()> {
        let by = self.user;
        self.request(|reply| Command::Delete(id, by, reply)).await?
    }

    pub async fn upload_image(&self, upload: ImageUpload) -> WishlistResult<Option<String>> {
        let owner = self.user;
        self.request(|reply| Command::UploadImage(upload, owner, reply))
            .await?
    }

    /// Release the change feed and stop the session task.
    ///
    /// Idempotent: a session that already stopped is not an error.
    pub async fn shutdown(&self) {
        if self.request(Command::Shutdown).await.is_err() {
            debug!("Session already closed");
        }
    }
}
