//! In-memory wishlist collection and the change-feed merge rules.
//!
//! Order is most-recent-first. Items are matched by id only. Feed events are
//! applied in the order they arrive; `updated_at` is written by whichever
//! client made the change and is never compared.

use crate::remote::ChangeEvent;
use crate::types::{CategoryFilter, ItemId, Progress, User, WishlistItem};

/// Why a feed event left the collection untouched
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IgnoreReason {
    /// Insert for an id already present (usually our own add echoing back)
    Duplicate,
    /// Delete for an id we don't have
    Missing,
}

/// What a merged feed event did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeOutcome {
    /// Prepended; `peer` is set when someone other than the session user created it
    Added { peer: Option<User> },
    Replaced,
    /// Update for an unknown id, appended at the end
    Appended,
    Removed,
    Ignored(IgnoreReason),
}

impl MergeOutcome {
    pub fn changed(&self) -> bool {
        !matches!(self, MergeOutcome::Ignored(_))
    }
}

/// The session's canonical item list
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WishlistState {
    items: Vec<WishlistItem>,
}

impl WishlistState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take `items` as-is (callers pass them newest first)
    pub fn from_items(items: Vec<WishlistItem>) -> Self {
        Self { items }
    }

    pub fn items(&self) -> &[WishlistItem] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn get(&self, id: &ItemId) -> Option<&WishlistItem> {
        self.items.iter().find(|item| &item.id == id)
    }

    pub fn contains(&self, id: &ItemId) -> bool {
        self.get(id).is_some()
    }

    pub fn filtered(&self, filter: CategoryFilter) -> Vec<&WishlistItem> {
        self.items.iter().filter(|item| filter.matches(item)).collect()
    }

    pub fn progress(&self) -> Progress {
        Progress::of(&self.items)
    }

    /// Put a new item at the front; no-op returning `false` if the id exists
    pub fn prepend(&mut self, item: WishlistItem) -> bool {
        if self.contains(&item.id) {
            return false;
        }
        self.items.insert(0, item);
        true
    }

    /// Swap in a new copy of an existing item, keeping its position
    pub fn replace(&mut self, item: WishlistItem) -> bool {
        match self.items.iter_mut().find(|existing| existing.id == item.id) {
            Some(existing) => {
                *existing = item;
                true
            }
            None => false,
        }
    }

    pub fn remove(&mut self, id: &ItemId) -> Option<WishlistItem> {
        let pos = self.items.iter().position(|item| &item.id == id)?;
        Some(self.items.remove(pos))
    }

    /// Apply one change-feed event for a session belonging to `local_user`.
    pub fn merge(&mut self, event: ChangeEvent, local_user: User) -> MergeOutcome {
        match event {
            ChangeEvent::Inserted(item) => {
                let creator = item.created_by;
                if self.prepend(item) {
                    let peer = (creator != local_user).then_some(creator);
                    MergeOutcome::Added { peer }
                } else {
                    MergeOutcome::Ignored(IgnoreReason::Duplicate)
                }
            }
            ChangeEvent::Updated(item) => {
                if self.contains(&item.id) {
                    self.replace(item);
                    MergeOutcome::Replaced
                } else {
                    self.items.push(item);
                    MergeOutcome::Appended
                }
            }
            ChangeEvent::Deleted { id } => match self.remove(&id) {
                Some(_) => MergeOutcome::Removed,
                None => MergeOutcome::Ignored(IgnoreReason::Missing),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Category, NewItem};
    use chrono::{Duration, Utc};

    fn item(title: &str, by: User) -> WishlistItem {
        NewItem::new(title, by).into_item(ItemId::generate(), Utc::now())
    }

    #[test]
    fn test_prepend_keeps_newest_first_and_rejects_duplicates() {
        let mut state = WishlistState::new();
        let a = item("A", User::Bilqis);
        let b = item("B", User::Kevin);
        assert!(state.prepend(a.clone()));
        assert!(state.prepend(b.clone()));
        assert!(!state.prepend(a.clone()));
        let titles: Vec<_> = state.items().iter().map(|i| i.title.as_str()).collect();
        assert_eq!(titles, ["B", "A"]);
    }

    #[test]
    fn test_insert_from_peer_is_added_with_notice() {
        let mut state = WishlistState::new();
        let outcome = state.merge(ChangeEvent::Inserted(item("Peer", User::Kevin)), User::Bilqis);
        assert_eq!(outcome, MergeOutcome::Added { peer: Some(User::Kevin) });
        assert_eq!(state.len(), 1);
    }

    #[test]
    fn test_own_insert_echo_is_not_duplicated() {
        let mut state = WishlistState::new();
        let mine = item("Mine", User::Bilqis);
        state.prepend(mine.clone());

        let outcome = state.merge(ChangeEvent::Inserted(mine), User::Bilqis);
        assert_eq!(outcome, MergeOutcome::Ignored(IgnoreReason::Duplicate));
        assert_eq!(state.len(), 1);
    }

    #[test]
    fn test_own_insert_from_elsewhere_is_added_without_notice() {
        let mut state = WishlistState::new();
        let outcome = state.merge(ChangeEvent::Inserted(item("Other tab", User::Bilqis)), User::Bilqis);
        assert_eq!(outcome, MergeOutcome::Added { peer: None });
    }

    #[test]
    fn test_update_replaces_in_place() {
        let first = item("First", User::Bilqis);
        let second = item("Second", User::Bilqis);
        let mut state = WishlistState::from_items(vec![first.clone(), second.clone()]);

        let mut changed = first.clone();
        changed.category = Category::Life;
        changed.updated_at = first.updated_at + Duration::seconds(1);
        assert_eq!(
            state.merge(ChangeEvent::Updated(changed), User::Kevin),
            MergeOutcome::Replaced
        );
        assert_eq!(state.items()[0].category, Category::Life);
        assert_eq!(state.items()[1].id, second.id);
    }

    #[test]
    fn test_update_for_unknown_id_is_appended() {
        let mut state = WishlistState::from_items(vec![item("Known", User::Bilqis)]);
        let unknown = item("Raced the load", User::Kevin);
        assert_eq!(
            state.merge(ChangeEvent::Updated(unknown.clone()), User::Bilqis),
            MergeOutcome::Appended
        );
        assert_eq!(state.items().last().unwrap().id, unknown.id);
    }

    #[test]
    fn test_update_with_earlier_timestamp_still_applies() {
        // Held copy stamped by a clock running ahead of the peer's.
        let mut held = item("Held", User::Kevin);
        held.updated_at = Utc::now() + Duration::seconds(10);
        let mut state = WishlistState::from_items(vec![held.clone()]);

        let mut peer = held.clone();
        peer.completed = true;
        peer.updated_by = Some(User::Bilqis);
        peer.updated_at = held.updated_at - Duration::seconds(5);

        assert_eq!(
            state.merge(ChangeEvent::Updated(peer.clone()), User::Kevin),
            MergeOutcome::Replaced
        );
        assert_eq!(state.get(&held.id), Some(&peer));
    }

    #[test]
    fn test_delete_of_absent_id_is_noop() {
        let mut state = WishlistState::from_items(vec![item("Stay", User::Kevin)]);
        let before = state.clone();
        let outcome = state.merge(
            ChangeEvent::Deleted {
                id: ItemId::from("ghost"),
            },
            User::Kevin,
        );
        assert_eq!(outcome, MergeOutcome::Ignored(IgnoreReason::Missing));
        assert!(!outcome.changed());
        assert_eq!(state, before);
    }

    #[test]
    fn test_delete_removes() {
        let gone = item("Gone", User::Kevin);
        let mut state = WishlistState::from_items(vec![gone.clone()]);
        assert_eq!(
            state.merge(ChangeEvent::Deleted { id: gone.id }, User::Kevin),
            MergeOutcome::Removed
        );
        assert!(state.is_empty());
    }

    #[test]
    fn test_filter_and_progress() {
        let mut done = item("Done", User::Kevin).clone();
        done.completed = true;
        done.category = Category::Travel;
        let open = item("Open", User::Bilqis);
        let state = WishlistState::from_items(vec![done, open]);

        assert_eq!(state.filtered(CategoryFilter::Only(Category::Travel)).len(), 1);
        assert_eq!(state.filtered(CategoryFilter::All).len(), 2);
        assert_eq!(state.progress(), Progress { total: 2, completed: 1 });
    }
}
