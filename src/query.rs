// Filtering the collection into the visible subset

use crate::item::{Category, Item, Status};
use std::fmt;
use std::str::FromStr;

/// Sentinel accepted wherever a filter may match everything
pub const ALL: &str = "ALL";

/// Either match everything or exactly one value
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selector<T> {
    All,
    Only(T),
}

impl<T> Default for Selector<T> {
    fn default() -> Self {
        Selector::All
    }
}

impl<T: PartialEq> Selector<T> {
    pub fn matches(&self, value: &T) -> bool {
        match self {
            Selector::All => true,
            Selector::Only(wanted) => wanted == value,
        }
    }
}

impl<T> Selector<T> {
    /// Parse `"ALL"` (any case) as `All`, anything else through `parse`
    pub fn parse_with<E>(input: &str, parse: impl FnOnce(&str) -> Result<T, E>) -> Result<Self, E> {
        let input = input.trim();
        if input.eq_ignore_ascii_case(ALL) {
            Ok(Selector::All)
        } else {
            parse(input).map(Selector::Only)
        }
    }
}

impl<T: FromStr> FromStr for Selector<T> {
    type Err = T::Err;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse_with(s, T::from_str)
    }
}

impl<T: fmt::Display> fmt::Display for Selector<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Selector::All => write!(f, "{}", ALL),
            Selector::Only(v) => write!(f, "{}", v),
        }
    }
}

/// Search, type and status constraints; all three must hold
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterCriteria {
    pub search_text: String,
    pub type_filter: Selector<Category>,
    pub status_filter: Selector<Status>,
}

impl FilterCriteria {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_search(mut self, text: impl Into<String>) -> Self {
        self.search_text = text.into();
        self
    }

    pub fn with_type(mut self, category: Category) -> Self {
        self.type_filter = Selector::Only(category);
        self
    }

    pub fn with_status(mut self, status: Status) -> Self {
        self.status_filter = Selector::Only(status);
        self
    }

    /// Reset to match everything
    pub fn clear(&mut self) {
        *self = Self::default();
    }

    pub fn is_unfiltered(&self) -> bool {
        self.search_text.trim().is_empty() && self.type_filter == Selector::All && self.status_filter == Selector::All
    }

    pub fn matches(&self, item: &Item) -> bool {
        Matcher::new(self).matches(item)
    }
}

/// Criteria with the search needle prepared once
struct Matcher<'c> {
    needle: String,
    criteria: &'c FilterCriteria,
}

impl<'c> Matcher<'c> {
    fn new(criteria: &'c FilterCriteria) -> Self {
        Self {
            needle: criteria.search_text.trim().to_lowercase(),
            criteria,
        }
    }

    fn matches(&self, item: &Item) -> bool {
        (self.needle.is_empty() || item.title().to_lowercase().contains(&self.needle))
            && self.criteria.type_filter.matches(item.category())
            && self.criteria.status_filter.matches(&item.status())
    }
}

/// Items matching `criteria`, in collection order
pub fn evaluate<'a>(items: &'a [Item], criteria: &FilterCriteria) -> Vec<&'a Item> {
    let matcher = Matcher::new(criteria);
    items.iter().filter(|item| matcher.matches(item)).collect()
}

/// What a renderer receives: the visible items and the full collection size
#[derive(Debug, Clone)]
pub struct View<'a> {
    pub items: Vec<&'a Item>,
    pub total: usize,
}

impl<'a> View<'a> {
    pub fn new(collection: &'a [Item], criteria: &FilterCriteria) -> Self {
        Self {
            items: evaluate(collection, criteria),
            total: collection.len(),
        }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Nothing has been added yet
    pub fn is_collection_empty(&self) -> bool {
        self.total == 0
    }

    /// The collection has items but the filters hide all of them
    pub fn is_filtered_out(&self) -> bool {
        self.items.is_empty() && self.total > 0
    }

    pub fn summary(&self) -> String {
        format!("Showing {} of {}", self.items.len(), self.total)
    }
}
