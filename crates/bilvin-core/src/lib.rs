//! Bilvin Core Library
//!
//! Shared wishlist for two people, synced through a hosted store with a
//! realtime change feed, or kept locally when no store is configured.
//!
//! ## Overview
//!
//! A session is opened through a secret gate for one of the two users. The
//! session's [`WishlistStore`] loads the list once, applies local edits after
//! the backend confirms them, and merges every change the other person makes
//! as it arrives on the feed.
//!
//! ## Core Principles
//!
//! - **Confirm, then apply**: memory only changes after the backend agrees
//! - **One writer**: a session's store is owned by a single task
//! - **Offline fallback**: without credentials the list lives in local storage
//!
//! ## Quick Start
//!
//! ```ignore
//! use bilvin_core::{Backend, LocalBackend, NewItem, RemoteConfig, Session, Storage, User, WishlistStore};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let session = Session::unlock("bicanosaurus", User::Kevin)?;
//!     let local = LocalBackend::new(Arc::new(Storage::new("bilvin.redb")?));
//!     let backend = Backend::select(RemoteConfig::from_env(), local);
//!
//!     let handle = WishlistStore::new(session, backend).spawn();
//!     handle.load().await?;
//!     handle.start_feed().await?;
//!     handle.add(NewItem::new("Trip to Bali", User::Kevin)).await?;
//!
//!     handle.shutdown().await;
//!     Ok(())
//! }
//! ```

pub mod blobs;
pub mod config;
pub mod error;
pub mod local;
pub mod remote;
pub mod session;
pub mod storage;
pub mod store;
pub mod sync;
pub mod types;

// Re-exports
pub use blobs::{ImageUpload, MAX_IMAGE_SIZE};
pub use config::{BackendMode, RemoteConfig};
pub use error::{WishlistError, WishlistResult};
pub use local::{LocalBackend, LOCAL_STORAGE_KEY};
pub use remote::{ChangeEvent, MemoryRemote, RemoteBackend, RestBackend, Subscription};
pub use session::{check_code, Session, SECRET_CODE};
pub use storage::{KeyValueStore, MemoryStorage, Storage};
pub use store::{Backend, WishlistStore};
pub use sync::{MergeOutcome, Notice, NoticeKind, StoreEvent, StoreHandle, WishlistState};
pub use types::*;
