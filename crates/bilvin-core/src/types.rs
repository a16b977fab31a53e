//! Core types for the Bilvin wishlist

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use ulid::Ulid;

use crate::error::{WishlistError, WishlistResult};

/// Unique identifier for a wishlist item
///
/// Opaque: the remote store assigns its own ids, local-only mode generates
/// `wish-<ulid>` so ids still sort by creation time.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ItemId(pub String);

impl ItemId {
    /// Generate a new id for an item created without the remote store
    pub fn generate() -> Self {
        Self(format!("wish-{}", Ulid::new()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ItemId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for ItemId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One of the two people sharing the wishlist
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum User {
    Bilqis,
    Kevin,
}

impl User {
    pub const ALL: [User; 2] = [User::Bilqis, User::Kevin];

    /// Wire/storage identifier
    pub fn as_str(&self) -> &'static str {
        match self {
            User::Bilqis => "bilqis",
            User::Kevin => "kevin",
        }
    }

    /// Name shown in notices and attributions
    pub fn display_name(&self) -> &'static str {
        match self {
            User::Bilqis => "Bilqis",
            User::Kevin => "Kevin",
        }
    }

    /// The other member of the pair
    pub fn partner(&self) -> User {
        match self {
            User::Bilqis => User::Kevin,
            User::Kevin => User::Bilqis,
        }
    }
}

impl fmt::Display for User {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for User {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "bilqis" => Ok(User::Bilqis),
            "kevin" => Ok(User::Kevin),
            other => Err(format!("unknown user '{}'", other)),
        }
    }
}

/// Wishlist category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Travel,
    #[default]
    Couple,
    Life,
}

impl Category {
    pub const ALL: [Category; 3] = [Category::Travel, Category::Couple, Category::Life];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Travel => "travel",
            Category::Couple => "couple",
            Category::Life => "life",
        }
    }

    pub fn icon(&self) -> &'static str {
        match self {
            Category::Travel => "✈️",
            Category::Couple => "💑",
            Category::Life => "🏠",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "travel" => Ok(Category::Travel),
            "couple" => Ok(Category::Couple),
            "life" => Ok(Category::Life),
            other => Err(format!("unknown category '{}'", other)),
        }
    }
}

/// Category tab selection for list views
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CategoryFilter {
    #[default]
    All,
    Only(Category),
}

impl CategoryFilter {
    pub fn matches(&self, item: &WishlistItem) -> bool {
        match self {
            CategoryFilter::All => true,
            CategoryFilter::Only(category) => item.category == *category,
        }
    }
}

impl FromStr for CategoryFilter {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.trim().eq_ignore_ascii_case("all") {
            return Ok(CategoryFilter::All);
        }
        s.parse().map(CategoryFilter::Only)
    }
}

pub const DEFAULT_EMOJI: &str = "✨";

fn default_emoji() -> String {
    DEFAULT_EMOJI.to_string()
}

/// A single wishlist entry, shaped like a `wishlist_items` row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WishlistItem {
    pub id: ItemId,
    #[serde(default = "default_emoji")]
    pub emoji: String,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub category: Category,
    #[serde(default)]
    pub image_url: Option<String>,
    /// Whole currency units
    #[serde(default)]
    pub budget: Option<u64>,
    #[serde(default, alias = "lokasi")]
    pub location: Option<String>,
    #[serde(default)]
    pub target_date: Option<NaiveDate>,
    #[serde(default)]
    pub completed: bool,
    pub created_by: User,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub updated_by: Option<User>,
    pub updated_at: DateTime<Utc>,
}

impl WishlistItem {
    /// Whether `user` may delete this item
    pub fn can_delete(&self, user: User) -> bool {
        self.created_by == user
    }
}

/// Payload for adding an item
///
/// Everything except the id, timestamps and `updated_by`, which are
/// assigned by whichever backend persists it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewItem {
    pub emoji: String,
    pub title: String,
    pub description: Option<String>,
    pub category: Category,
    pub image_url: Option<String>,
    pub budget: Option<u64>,
    pub location: Option<String>,
    pub target_date: Option<NaiveDate>,
    pub completed: bool,
    pub created_by: User,
}

impl NewItem {
    pub fn new(title: impl Into<String>, created_by: User) -> Self {
        Self {
            emoji: default_emoji(),
            title: title.into(),
            description: None,
            category: Category::default(),
            image_url: None,
            budget: None,
            location: None,
            target_date: None,
            completed: false,
            created_by,
        }
    }

    pub fn with_category(mut self, category: Category) -> Self {
        self.category = category;
        self
    }

    pub fn with_emoji(mut self, emoji: impl Into<String>) -> Self {
        self.emoji = emoji.into();
        self
    }

    pub fn with_image_url(mut self, url: impl Into<String>) -> Self {
        self.image_url = Some(url.into());
        self
    }

    /// Empty optional text becomes `None`, the way the form submits it
    pub fn normalized(mut self) -> Self {
        self.description = non_empty(self.description);
        self.location = non_empty(self.location);
        self.image_url = non_empty(self.image_url);
        if self.emoji.trim().is_empty() {
            self.emoji = default_emoji();
        }
        self
    }

    /// Materialize as a full row (local-only mode)
    pub fn into_item(self, id: ItemId, now: DateTime<Utc>) -> WishlistItem {
        WishlistItem {
            id,
            emoji: self.emoji,
            title: self.title,
            description: self.description,
            category: self.category,
            image_url: self.image_url,
            budget: self.budget,
            location: self.location,
            target_date: self.target_date,
            completed: self.completed,
            created_by: self.created_by,
            created_at: now,
            updated_by: None,
            updated_at: now,
        }
    }
}

/// Partial update of an item
///
/// `None` leaves a field untouched. For nullable columns `Some(None)` clears
/// the value, which serializes as an explicit `null`.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ItemPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub emoji: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<Option<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<Category>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_url: Option<Option<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub budget: Option<Option<u64>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<Option<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_date: Option<Option<NaiveDate>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed: Option<bool>,
}

impl ItemPatch {
    pub fn completed(completed: bool) -> Self {
        Self {
            completed: Some(completed),
            ..Default::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == ItemPatch::default()
    }

    /// Empty optional text becomes an explicit clear
    pub fn normalized(mut self) -> Self {
        self.description = self.description.map(non_empty);
        self.location = self.location.map(non_empty);
        self.image_url = self.image_url.map(non_empty);
        self
    }

    /// Merge the set fields into `item`
    pub fn apply_to(&self, item: &mut WishlistItem) {
        if let Some(emoji) = &self.emoji {
            item.emoji = emoji.clone();
        }
        if let Some(title) = &self.title {
            item.title = title.clone();
        }
        if let Some(description) = &self.description {
            item.description = description.clone();
        }
        if let Some(category) = self.category {
            item.category = category;
        }
        if let Some(image_url) = &self.image_url {
            item.image_url = image_url.clone();
        }
        if let Some(budget) = self.budget {
            item.budget = budget;
        }
        if let Some(location) = &self.location {
            item.location = location.clone();
        }
        if let Some(target_date) = self.target_date {
            item.target_date = target_date;
        }
        if let Some(completed) = self.completed {
            item.completed = completed;
        }
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|s| !s.trim().is_empty())
}

/// Parse a budget typed into the form ("Rp 1.500.000" -> 1500000)
///
/// Every non-digit is dropped; nothing left means no budget. An amount too
/// large for `u64` is a validation error.
pub fn parse_budget(input: &str) -> WishlistResult<Option<u64>> {
    let digits: String = input.chars().filter(|c| c.is_ascii_digit()).collect();
    if digits.is_empty() {
        return Ok(None);
    }
    digits
        .parse()
        .map(Some)
        .map_err(|_| WishlistError::Validation(format!("budget too large: {}", input.trim())))
}

/// Completion summary for a set of items
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Progress {
    pub total: usize,
    pub completed: usize,
}

impl Progress {
    pub fn of<'a>(items: impl IntoIterator<Item = &'a WishlistItem>) -> Self {
        items.into_iter().fold(Progress::default(), |mut p, item| {
            p.total += 1;
            if item.completed {
                p.completed += 1;
            }
            p
        })
    }
}

impl fmt::Display for Progress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{} done", self.completed, self.total)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_item() -> WishlistItem {
        NewItem::new("Trip to Bali", User::Bilqis)
            .with_category(Category::Travel)
            .into_item(ItemId::generate(), Utc::now())
    }

    #[test]
    fn test_item_id_generate() {
        let a = ItemId::generate();
        let b = ItemId::generate();
        assert_ne!(a, b);
        assert!(a.as_str().starts_with("wish-"));
    }

    #[test]
    fn test_user_roundtrip() {
        for user in User::ALL {
            assert_eq!(user.as_str().parse::<User>().unwrap(), user);
        }
        assert_eq!(" Kevin ".parse::<User>().unwrap(), User::Kevin);
        assert!("someone".parse::<User>().is_err());
        assert_eq!(User::Bilqis.partner(), User::Kevin);
    }

    #[test]
    fn test_category_default_is_couple() {
        assert_eq!(Category::default(), Category::Couple);
        assert_eq!("TRAVEL".parse::<Category>().unwrap(), Category::Travel);
    }

    #[test]
    fn test_category_filter() {
        let item = sample_item();
        assert!(CategoryFilter::All.matches(&item));
        assert!(CategoryFilter::Only(Category::Travel).matches(&item));
        assert!(!CategoryFilter::Only(Category::Life).matches(&item));
        assert_eq!("all".parse::<CategoryFilter>().unwrap(), CategoryFilter::All);
    }

    #[test]
    fn test_new_item_defaults() {
        let item = sample_item();
        assert_eq!(item.emoji, DEFAULT_EMOJI);
        assert!(!item.completed);
        assert!(item.updated_by.is_none());
        assert_eq!(item.created_at, item.updated_at);
    }

    #[test]
    fn test_new_item_normalized_drops_empty_text() {
        let mut draft = NewItem::new("Picnic", User::Kevin).with_emoji(" ");
        draft.description = Some("   ".into());
        draft.location = Some("Kebun Raya".into());
        let draft = draft.normalized();
        assert_eq!(draft.description, None);
        assert_eq!(draft.location.as_deref(), Some("Kebun Raya"));
        assert_eq!(draft.emoji, DEFAULT_EMOJI);
    }

    #[test]
    fn test_patch_applies_only_set_fields() {
        let mut item = sample_item();
        item.location = Some("Ubud".into());

        let patch = ItemPatch {
            title: Some("Trip to Lombok".into()),
            location: Some(None),
            budget: Some(Some(2_000_000)),
            ..Default::default()
        };
        patch.apply_to(&mut item);

        assert_eq!(item.title, "Trip to Lombok");
        assert_eq!(item.location, None);
        assert_eq!(item.budget, Some(2_000_000));
        assert_eq!(item.category, Category::Travel);
    }

    #[test]
    fn test_patch_serializes_clears_as_null() {
        let patch = ItemPatch {
            description: Some(None),
            completed: Some(true),
            ..Default::default()
        };
        let json = serde_json::to_value(&patch).unwrap();
        assert_eq!(json, serde_json::json!({"description": null, "completed": true}));
        assert!(ItemPatch::default().is_empty());
    }

    #[test]
    fn test_parse_budget() {
        assert_eq!(parse_budget("Rp 1.500.000").unwrap(), Some(1_500_000));
        assert_eq!(parse_budget("250000").unwrap(), Some(250_000));
        assert_eq!(parse_budget("").unwrap(), None);
        assert_eq!(parse_budget("Rp").unwrap(), None);
    }

    #[test]
    fn test_parse_budget_rejects_overflow() {
        let err = parse_budget("Rp 99.999.999.999.999.999.999").unwrap_err();
        assert!(matches!(err, WishlistError::Validation(_)));
        assert_eq!(parse_budget(&u64::MAX.to_string()).unwrap(), Some(u64::MAX));
    }

    #[test]
    fn test_row_accepts_legacy_location_column() {
        let row = serde_json::json!({
            "id": "7f1c",
            "emoji": "🌈",
            "title": "Sunset dinner",
            "description": null,
            "category": "couple",
            "image_url": null,
            "budget": 500000,
            "lokasi": "Jimbaran",
            "target_date": "2026-02-14",
            "completed": false,
            "created_by": "kevin",
            "created_at": "2026-01-01T10:00:00.123456+00:00",
            "updated_by": null,
            "updated_at": "2026-01-01T10:00:00.123456+00:00"
        });
        let item: WishlistItem = serde_json::from_value(row).unwrap();
        assert_eq!(item.location.as_deref(), Some("Jimbaran"));
        assert_eq!(item.target_date, NaiveDate::from_ymd_opt(2026, 2, 14));
        assert_eq!(item.created_by, User::Kevin);
    }

    #[test]
    fn test_progress() {
        let mut done = sample_item();
        done.completed = true;
        let open = sample_item();
        let progress = Progress::of([&done, &open]);
        assert_eq!(progress, Progress { total: 2, completed: 1 });
        assert_eq!(progress.to_string(), "1/2 done");
    }

    #[test]
    fn test_only_creator_can_delete() {
        let item = sample_item();
        assert!(item.can_delete(User::Bilqis));
        assert!(!item.can_delete(User::Kevin));
    }
}
