//! Keeping a session's list in step with the backend and its change feed

mod actor;
mod events;
mod state;

pub use actor::StoreHandle;
pub use events::{Notice, NoticeKind, StoreEvent, NOTICE_DURATION};
pub use state::{IgnoreReason, MergeOutcome, WishlistState};
