// Data model for tracked items

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Opaque unique item identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ItemId(String);

impl ItemId {
    /// Generate a fresh identifier (UUIDv7, time-ordered and collision free)
    pub fn generate() -> Self {
        ItemId(uuid::Uuid::now_v7().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ItemId {
    fn from(s: &str) -> Self {
        ItemId(s.to_string())
    }
}

impl From<String> for ItemId {
    fn from(s: String) -> Self {
        ItemId(s)
    }
}

impl AsRef<str> for ItemId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Item category (e.g. "Game", "Show"); the allowed set comes from `Config`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Category(String);

impl Category {
    pub(crate) fn new(name: impl Into<String>) -> Self {
        Category(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Status {
    #[default]
    Pending,
    Done,
}

impl Status {
    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Pending => "Pending",
            Status::Done => "Done",
        }
    }
}

impl FromStr for Status {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "pending" => Ok(Status::Pending),
            "done" => Ok(Status::Done),
            other => Err(format!("unknown status: {} (expected pending or done)", other)),
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Score in `0..=10`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Rating(u8);

impl Rating {
    pub const MAX: u8 = 10;

    /// Clamp any integer into the valid range
    pub fn clamped(value: i64) -> Self {
        Rating(value.clamp(0, i64::from(Self::MAX)) as u8)
    }

    /// Parse free-form rating input.
    ///
    /// Accepts an integer or a finite decimal (truncated toward zero), clamped
    /// into range. Returns `None` for anything non-numeric.
    pub fn parse(input: &str) -> Option<Self> {
        let s = input.trim();
        if let Ok(n) = s.parse::<i64>() {
            return Some(Self::clamped(n));
        }
        match s.parse::<f64>() {
            Ok(f) if f.is_finite() => Some(Self::clamped(f.trunc() as i64)),
            _ => None,
        }
    }

    /// Like `parse`, but non-numeric input becomes 0
    pub fn coerce(input: &str) -> Self {
        Self::parse(input).unwrap_or_default()
    }

    pub fn value(self) -> u8 {
        self.0
    }
}

impl fmt::Display for Rating {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.0, Self::MAX)
    }
}

/// Status together with the fields that only exist once an item is done.
///
/// Rating and review live inside `Done`, so a pending item cannot carry them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Completion {
    Pending,
    Done { rating: Rating, review: Option<String> },
}

impl Completion {
    pub fn done(rating: Rating, review: Option<&str>) -> Self {
        Completion::Done {
            rating,
            review: normalize_review(review),
        }
    }

    pub fn status(&self) -> Status {
        match self {
            Completion::Pending => Status::Pending,
            Completion::Done { .. } => Status::Done,
        }
    }
}

/// Trim a review, dropping it when blank
pub(crate) fn normalize_review(review: Option<&str>) -> Option<String> {
    review.map(str::trim).filter(|r| !r.is_empty()).map(str::to_string)
}

/// One tracked entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "ItemRecord", into = "ItemRecord")]
pub struct Item {
    id: ItemId,
    title: String,
    category: Category,
    completion: Completion,
    created_at: i64,
}

impl Item {
    /// Build a new item with a fresh id and the current timestamp.
    /// The caller is responsible for having validated `title` and `category`.
    pub(crate) fn new(title: &str, category: Category, completion: Completion) -> Self {
        Item {
            id: ItemId::generate(),
            title: title.trim().to_string(),
            category,
            completion,
            created_at: now_ms(),
        }
    }

    pub fn id(&self) -> &ItemId {
        &self.id
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn category(&self) -> &Category {
        &self.category
    }

    pub fn completion(&self) -> &Completion {
        &self.completion
    }

    pub fn status(&self) -> Status {
        self.completion.status()
    }

    pub fn rating(&self) -> Option<Rating> {
        match &self.completion {
            Completion::Done { rating, .. } => Some(*rating),
            Completion::Pending => None,
        }
    }

    pub fn review(&self) -> Option<&str> {
        match &self.completion {
            Completion::Done { review, .. } => review.as_deref(),
            Completion::Pending => None,
        }
    }

    /// Milliseconds since epoch
    pub fn created_at(&self) -> i64 {
        self.created_at
    }

    pub(crate) fn set_completion(&mut self, completion: Completion) {
        self.completion = completion;
    }
}

/// Flat persisted shape of an item
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ItemRecord {
    id: String,
    title: String,
    #[serde(rename = "type")]
    category: String,
    status: Status,
    #[serde(default)]
    rating: Option<i64>,
    #[serde(default)]
    review: Option<String>,
    #[serde(default)]
    created_at: i64,
}

impl TryFrom<ItemRecord> for Item {
    type Error = String;

    fn try_from(record: ItemRecord) -> Result<Self, Self::Error> {
        if record.id.trim().is_empty() {
            return Err("item id cannot be empty".to_string());
        }
        let title = record.title.trim();
        if title.is_empty() {
            return Err(format!("item {} has an empty title", record.id));
        }

        // Pending drops rating/review; Done always carries a rating
        let completion = match record.status {
            Status::Pending => Completion::Pending,
            Status::Done => Completion::done(
                Rating::clamped(record.rating.unwrap_or(0)),
                record.review.as_deref(),
            ),
        };

        Ok(Item {
            id: ItemId(record.id),
            title: title.to_string(),
            category: Category(record.category),
            completion,
            created_at: record.created_at,
        })
    }
}

impl From<Item> for ItemRecord {
    fn from(item: Item) -> Self {
        let status = item.status();
        let (rating, review) = match item.completion {
            Completion::Pending => (None, None),
            Completion::Done { rating, review } => (Some(i64::from(rating.value())), review),
        };
        ItemRecord {
            id: item.id.0,
            title: item.title,
            category: item.category.0,
            status,
            rating,
            review,
            created_at: item.created_at,
        }
    }
}

/// Raw item-creation request as produced by an input form
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CreateRequest {
    pub title: String,
    pub category: String,
    pub status: Status,
    /// Free-form rating text; non-numeric input counts as 0
    pub rating: String,
    pub review: String,
}

impl CreateRequest {
    pub fn pending(title: impl Into<String>, category: impl Into<String>) -> Self {
        CreateRequest {
            title: title.into(),
            category: category.into(),
            ..Default::default()
        }
    }

    pub fn done(
        title: impl Into<String>,
        category: impl Into<String>,
        rating: impl Into<String>,
        review: impl Into<String>,
    ) -> Self {
        CreateRequest {
            title: title.into(),
            category: category.into(),
            status: Status::Done,
            rating: rating.into(),
            review: review.into(),
        }
    }
}

/// Current timestamp in milliseconds
pub fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
