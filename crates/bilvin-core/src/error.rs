//! Error types for the Bilvin wishlist

use thiserror::Error;

use crate::types::{ItemId, User};

/// Main error type for wishlist operations
#[derive(Error, Debug)]
pub enum WishlistError {
    /// Input rejected before any backend call (empty title, oversized image)
    #[error("Validation error: {0}")]
    Validation(String),

    /// Item is not present in the in-memory collection
    #[error("Item not found: {0}")]
    NotFound(ItemId),

    /// Only the creator of an item may delete it
    #[error("Permission denied: {item} was created by {created_by}, not {requested_by}")]
    PermissionDenied {
        item: ItemId,
        requested_by: User,
        created_by: User,
    },

    /// Remote store unreachable or misconfigured
    #[error("Backend unavailable: {0}")]
    BackendUnavailable(String),

    /// Error during local storage operations (redb)
    #[error("Storage error: {0}")]
    Storage(String),

    /// Database creation/opening error
    #[error("Database error: {0}")]
    Database(#[from] redb::DatabaseError),

    /// Transaction error
    #[error("Transaction error: {0}")]
    Transaction(#[from] redb::TransactionError),

    /// Table error
    #[error("Table error: {0}")]
    Table(#[from] redb::TableError),

    /// Storage operation error
    #[error("Storage operation error: {0}")]
    StorageOp(#[from] redb::StorageError),

    /// Commit error
    #[error("Commit error: {0}")]
    Commit(#[from] redb::CommitError),

    /// Error during serialization/deserialization
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// General I/O error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Secret gate rejected the code
    #[error("That's not our magic word")]
    InvalidCode,

    /// The session actor has shut down
    #[error("Session closed")]
    SessionClosed,
}

impl WishlistError {
    /// Whether this error came from a backend call rather than local checks.
    pub fn is_backend(&self) -> bool {
        !matches!(
            self,
            WishlistError::Validation(_)
                | WishlistError::NotFound(_)
                | WishlistError::PermissionDenied { .. }
                | WishlistError::InvalidCode
                | WishlistError::SessionClosed
        )
    }
}

impl From<serde_json::Error> for WishlistError {
    fn from(e: serde_json::Error) -> Self {
        WishlistError::Serialization(e.to_string())
    }
}

impl From<reqwest::Error> for WishlistError {
    fn from(e: reqwest::Error) -> Self {
        WishlistError::BackendUnavailable(e.to_string())
    }
}

/// Result type alias using WishlistError
pub type WishlistResult<T> = Result<T, WishlistError>;
