// Watchlist - Local tracking list with a rated done/pending workflow

pub mod app;
pub mod codec;
pub mod config;
pub mod error;
pub mod item;
pub mod kv;
pub mod query;
pub mod store;

// Re-export main types for convenience
pub use app::{Renderer, Tracker, UiEvent};
pub use config::{Backend, Config};
pub use error::TrackerError;
pub use item::{Category, Completion, CreateRequest, Item, ItemId, Rating, Status, now_ms};
pub use kv::{FileKv, KvStore, MemoryKv, SqliteKv};
pub use query::{FilterCriteria, Selector, View, evaluate};
pub use store::{ItemStore, ReviewPrompt, ToggleState, ToggleStep};
