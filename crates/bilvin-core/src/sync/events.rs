//! Events the store emits for the UI layer
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │  StoreEvent                                                     │
//! │  ├── ItemsChanged: in-memory list changed, re-render            │
//! │  ├── Notice: transient toast (success / peer activity / failure)│
//! │  └── FeedClosed: change feed ended                              │
//! └─────────────────────────────────────────────────────────────────┘
//! ```

use std::fmt;
use std::time::Duration;

use crate::types::User;

/// How long a toast stays on screen
pub const NOTICE_DURATION: Duration = Duration::from_secs(3);

/// Toast flavour
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeKind {
    Success,
    Info,
    Failure,
}

/// Transient user-facing message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub kind: NoticeKind,
    pub message: String,
}

impl Notice {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            kind: NoticeKind::Success,
            message: message.into(),
        }
    }

    pub fn info(message: impl Into<String>) -> Self {
        Self {
            kind: NoticeKind::Info,
            message: message.into(),
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            kind: NoticeKind::Failure,
            message: message.into(),
        }
    }

    /// "<partner> added a new wish!" shown when the feed brings a peer's item
    pub fn peer_added(by: User, title: &str) -> Self {
        Self::info(format!("{} added a new wish: {} 🎉", by.display_name(), title))
    }

    pub fn duration(&self) -> Duration {
        NOTICE_DURATION
    }
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

/// Event broadcast by a store to its listeners
#[derive(Debug, Clone, PartialEq)]
pub enum StoreEvent {
    /// The in-memory collection changed; `count` is its new length
    ItemsChanged { count: usize },
    Notice(Notice),
    /// The change feed ended (socket closed or subscription released)
    FeedClosed,
}
