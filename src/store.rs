// Item store: owns the collection and persists it after every mutation

use crate::codec;
use crate::config::Config;
use crate::error::{Result, TrackerError};
use crate::item::{Completion, CreateRequest, Item, ItemId, Rating, Status};
use crate::kv::KvStore;
use crate::query::{FilterCriteria, View};
use tracing::{debug, info, warn};

const EXAMPLE_TITLE: &str = "The Witcher 3";

/// Progress of a Pending -> Done transition waiting on user input
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToggleState {
    AwaitingRating { id: ItemId },
    AwaitingReview { id: ItemId, rating: Rating },
}

impl ToggleState {
    pub fn id(&self) -> &ItemId {
        match self {
            ToggleState::AwaitingRating { id } | ToggleState::AwaitingReview { id, .. } => id,
        }
    }
}

/// Result of advancing a status toggle
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToggleStep {
    AwaitingRating,
    AwaitingReview,
    /// The transition was applied; carries the updated item
    Committed(Item),
    /// The transition was dropped; nothing changed
    Aborted,
}

/// Source of the rating and review asked for when an item is marked done
pub trait ReviewPrompt {
    /// Raw rating text, `None` if the user cancelled
    fn rating(&mut self, item: &Item) -> Option<String>;

    /// `Some(None)` skips the review, `None` cancels the whole toggle
    fn review(&mut self, item: &Item) -> Option<Option<String>>;
}

/// Canonical ordered collection of items, backed by a `KvStore`.
///
/// Every successful mutation is followed by a save of the whole collection.
/// If that save fails the mutation still stands in memory, the store is
/// marked dirty and the error is returned as `TrackerError::Persistence`.
pub struct ItemStore<K: KvStore> {
    kv: K,
    config: Config,
    items: Vec<Item>,
    pending_delete: Option<ItemId>,
    toggle: Option<ToggleState>,
    dirty: bool,
}

impl<K: KvStore> ItemStore<K> {
    /// Create a store over `kv` and load the persisted collection
    pub fn open(kv: K, config: &Config) -> Result<Self> {
        let mut store = Self {
            kv,
            config: config.clone(),
            items: Vec::new(),
            pending_delete: None,
            toggle: None,
            dirty: false,
        };
        store.load()?;
        Ok(store)
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn kv(&self) -> &K {
        &self.kv
    }

    // ========================================================================
    // Persistence
    // ========================================================================

    /// Replace the in-memory collection with the persisted one.
    ///
    /// A missing or unreadable payload gives an empty collection, which is
    /// then seeded with one example item if configured. A failing backend
    /// read is an error so that seeding never overwrites data it could not see.
    ///
    /// Unsaved changes are flushed first; if that flush fails the reload is
    /// refused and memory stays as it is.
    pub fn load(&mut self) -> Result<usize> {
        if self.dirty {
            debug!("Flushing unsaved changes before reload");
            self.save()?;
        }

        let key = self.config.storage_key.clone();
        let raw = self.kv.load(&key).map_err(TrackerError::Persistence)?;

        let decoded = match &raw {
            Some(bytes) => codec::decode_collection(bytes),
            None => codec::Decoded::default(),
        };

        // Anything the decoder dropped would be gone after the next save
        if (decoded.corrupt || decoded.skipped > 0)
            && let Some(bytes) = &raw
        {
            self.preserve_corrupt(bytes);
        }

        self.items = decoded.items;
        self.dirty = false;
        info!(key = %key, count = self.items.len(), skipped = decoded.skipped, "Loaded collection");

        if self.items.is_empty() && self.config.seed_example {
            self.seed_example();
        }

        Ok(self.items.len())
    }

    /// Serialize and write the whole collection
    pub fn save(&mut self) -> Result<()> {
        let result = codec::encode_collection(&self.items).and_then(|bytes| self.kv.save(&self.config.storage_key, &bytes));

        match result {
            Ok(()) => {
                self.dirty = false;
                debug!(count = self.items.len(), "Persisted collection");
                Ok(())
            }
            Err(e) => {
                self.dirty = true;
                warn!(error = ?e, "Failed to persist collection, keeping in-memory state");
                Err(TrackerError::Persistence(e))
            }
        }
    }

    /// True when the last save failed and memory is ahead of storage
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    fn seed_example(&mut self) {
        let Some(category) = self.config.categories().into_iter().next() else {
            return;
        };

        let item = Item::new(EXAMPLE_TITLE, category, Completion::Pending);
        info!(id = %item.id(), "Seeding empty collection with example item");
        self.items.push(item);

        // Not fatal: the store stays usable and is left dirty
        if let Err(e) = self.save() {
            warn!(error = %e, "Seeded example item was not persisted");
        }
    }

    fn preserve_corrupt(&mut self, bytes: &[u8]) {
        let backup_key = format!("{}.corrupt", self.config.storage_key);
        match self.kv.save(&backup_key, bytes) {
            Ok(()) => warn!(key = %backup_key, "Copied unreadable collection aside"),
            Err(e) => warn!(error = ?e, "Failed to copy unreadable collection aside"),
        }
    }

    // ========================================================================
    // Reads
    // ========================================================================

    pub fn items(&self) -> &[Item] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn get(&self, id: &ItemId) -> Option<&Item> {
        self.items.iter().find(|item| item.id() == id)
    }

    /// Evaluate `criteria` against the current collection
    pub fn query(&self, criteria: &FilterCriteria) -> View<'_> {
        View::new(&self.items, criteria)
    }

    fn position(&self, id: &ItemId) -> Result<usize> {
        self.items
            .iter()
            .position(|item| item.id() == id)
            .ok_or_else(|| TrackerError::NotFound(id.clone()))
    }

    // ========================================================================
    // Create
    // ========================================================================

    /// Validate a raw request and append the new item
    pub fn create(&mut self, request: CreateRequest) -> Result<Item> {
        let title = request.title.trim();
        if title.is_empty() {
            return Err(TrackerError::validation("title cannot be empty"));
        }

        let category = self.config.category(&request.category).ok_or_else(|| {
            TrackerError::validation(format!(
                "unknown type: {} (expected one of {})",
                request.category,
                self.config.categories.join(", ")
            ))
        })?;

        let completion = match request.status {
            Status::Pending => Completion::Pending,
            Status::Done => Completion::done(Rating::coerce(&request.rating), Some(&request.review)),
        };

        let item = Item::new(title, category, completion);
        info!(id = %item.id(), title = item.title(), status = %item.status(), "Created item");

        self.items.push(item.clone());
        self.save()?;
        Ok(item)
    }

    // ========================================================================
    // Status toggle
    // ========================================================================

    /// Start toggling an item's status.
    ///
    /// A done item goes straight back to pending with rating and review
    /// cleared. A pending item enters `AwaitingRating`; any toggle already in
    /// progress is dropped.
    pub fn begin_toggle(&mut self, id: &ItemId) -> Result<ToggleStep> {
        let index = self.position(id)?;
        self.toggle = None;

        match self.items[index].status() {
            Status::Done => {
                self.items[index].set_completion(Completion::Pending);
                let item = self.items[index].clone();
                info!(id = %id, "Item reopened");
                self.save()?;
                Ok(ToggleStep::Committed(item))
            }
            Status::Pending => {
                debug!(id = %id, "Awaiting rating");
                self.toggle = Some(ToggleState::AwaitingRating { id: id.clone() });
                Ok(ToggleStep::AwaitingRating)
            }
        }
    }

    /// Provide the rating for the toggle in progress.
    /// Non-numeric input aborts the toggle.
    pub fn supply_rating(&mut self, input: &str) -> Result<ToggleStep> {
        let id = match self.toggle.take() {
            Some(ToggleState::AwaitingRating { id }) => id,
            other => {
                self.toggle = other;
                return Err(TrackerError::validation("no status change is waiting for a rating"));
            }
        };

        match Rating::parse(input) {
            Some(rating) => {
                debug!(id = %id, rating = rating.value(), "Awaiting review");
                self.toggle = Some(ToggleState::AwaitingReview { id, rating });
                Ok(ToggleStep::AwaitingReview)
            }
            None => {
                info!(id = %id, input, "Rating is not a number, toggle aborted");
                Ok(ToggleStep::Aborted)
            }
        }
    }

    /// Provide the review (`None` to skip) and commit the toggle
    pub fn supply_review(&mut self, review: Option<&str>) -> Result<ToggleStep> {
        let (id, rating) = match self.toggle.take() {
            Some(ToggleState::AwaitingReview { id, rating }) => (id, rating),
            other => {
                self.toggle = other;
                return Err(TrackerError::validation("no status change is waiting for a review"));
            }
        };

        let index = self.position(&id)?;
        self.items[index].set_completion(Completion::done(rating, review));
        let item = self.items[index].clone();
        info!(id = %id, rating = rating.value(), "Item marked done");

        self.save()?;
        Ok(ToggleStep::Committed(item))
    }

    /// Drop the toggle in progress, if any. Nothing was changed yet.
    pub fn abort_toggle(&mut self) -> bool {
        match self.toggle.take() {
            Some(state) => {
                debug!(id = %state.id(), "Toggle aborted");
                true
            }
            None => false,
        }
    }

    pub fn toggle_state(&self) -> Option<&ToggleState> {
        self.toggle.as_ref()
    }

    /// Run a whole toggle, asking `prompt` for input when marking done
    pub fn toggle_status(&mut self, id: &ItemId, prompt: &mut impl ReviewPrompt) -> Result<ToggleStep> {
        match self.begin_toggle(id)? {
            ToggleStep::AwaitingRating => {}
            step => return Ok(step),
        }

        let item = self.items[self.position(id)?].clone();

        let Some(rating) = prompt.rating(&item) else {
            self.abort_toggle();
            return Ok(ToggleStep::Aborted);
        };
        if self.supply_rating(&rating)? == ToggleStep::Aborted {
            return Ok(ToggleStep::Aborted);
        }

        let Some(review) = prompt.review(&item) else {
            self.abort_toggle();
            return Ok(ToggleStep::Aborted);
        };
        self.supply_review(review.as_deref())
    }

    // ========================================================================
    // Delete
    // ========================================================================

    /// Stage an item for deletion and return its title for confirmation
    pub fn request_delete(&mut self, id: &ItemId) -> Result<String> {
        let index = self.position(id)?;
        let title = self.items[index].title().to_string();

        if let Some(previous) = self.pending_delete.replace(id.clone()) {
            debug!(previous = %previous, "Replacing pending deletion");
        }
        debug!(id = %id, "Deletion awaiting confirmation");
        Ok(title)
    }

    /// Delete the staged item.
    ///
    /// Returns `None` when nothing was staged or the staged item is already
    /// gone; neither case touches storage.
    pub fn confirm_delete(&mut self) -> Result<Option<Item>> {
        let Some(id) = self.pending_delete.take() else {
            debug!("Confirm with no pending deletion");
            return Ok(None);
        };

        let Ok(index) = self.position(&id) else {
            debug!(id = %id, "Pending deletion already removed");
            return Ok(None);
        };

        let item = self.items.remove(index);
        if self.toggle.as_ref().is_some_and(|t| t.id() == &id) {
            self.toggle = None;
        }
        info!(id = %id, title = item.title(), "Deleted item");

        self.save()?;
        Ok(Some(item))
    }

    /// Drop the staged deletion without touching the collection
    pub fn cancel_delete(&mut self) -> Option<ItemId> {
        self.pending_delete.take()
    }

    pub fn pending_deletion(&self) -> Option<&ItemId> {
        self.pending_delete.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kv::{FileKv, MemoryKv};
    use crate::query::Selector;
    use eyre::eyre;
    use std::cell::Cell;
    use std::rc::Rc;
    use tempfile::TempDir;

    /// Memory store whose reads and writes can be made to fail
    #[derive(Default)]
    struct FlakyKv {
        inner: MemoryKv,
        fail_saves: Rc<Cell<bool>>,
        fail_loads: bool,
    }

    impl KvStore for FlakyKv {
        fn load(&self, key: &str) -> eyre::Result<Option<Vec<u8>>> {
            if self.fail_loads {
                return Err(eyre!("store unavailable"));
            }
            self.inner.load(key)
        }

        fn save(&mut self, key: &str, bytes: &[u8]) -> eyre::Result<()> {
            if self.fail_saves.get() {
                return Err(eyre!("store unavailable"));
            }
            self.inner.save(key, bytes)
        }
    }

    /// Prompt answering from fixed values
    struct Scripted {
        rating: Option<String>,
        review: Option<Option<String>>,
    }

    impl Scripted {
        fn answers(rating: Option<&str>, review: Option<Option<&str>>) -> Self {
            Self {
                rating: rating.map(str::to_string),
                review: review.map(|r| r.map(str::to_string)),
            }
        }
    }

    impl ReviewPrompt for Scripted {
        fn rating(&mut self, _item: &Item) -> Option<String> {
            self.rating.clone()
        }

        fn review(&mut self, _item: &Item) -> Option<Option<String>> {
            self.review.clone()
        }
    }

    fn unseeded() -> Config {
        Config {
            seed_example: false,
            ..Config::default()
        }
    }

    fn empty_store() -> ItemStore<MemoryKv> {
        ItemStore::open(MemoryKv::new(), &unseeded()).unwrap()
    }

    fn persisted(store: &ItemStore<MemoryKv>) -> Vec<Item> {
        let bytes = store.kv().get("myList").unwrap();
        codec::decode_collection(bytes).items
    }

    fn assert_invariant(store: &ItemStore<impl KvStore>) {
        for item in store.items() {
            if item.status() == Status::Pending {
                assert_eq!(item.rating(), None, "pending item {} has a rating", item.id());
                assert_eq!(item.review(), None, "pending item {} has a review", item.id());
            }
        }
    }

    // ------------------------------------------------------------------------
    // Load / seed
    // ------------------------------------------------------------------------

    #[test]
    fn test_open_empty_store_seeds_one_example() {
        let mut store = ItemStore::open(MemoryKv::new(), &Config::default()).unwrap();
        assert_eq!(store.len(), 1);

        let seeded = store.items()[0].clone();
        assert_eq!(seeded.title(), "The Witcher 3");
        assert_eq!(seeded.category().as_str(), "Game");
        assert_eq!(seeded.status(), Status::Pending);
        assert_eq!(seeded.rating(), None);
        assert_eq!(persisted(&store), vec![seeded.clone()]);

        // Reloading finds the persisted seed instead of seeding again
        assert_eq!(store.load().unwrap(), 1);
        assert_eq!(store.items(), &[seeded]);
    }

    #[test]
    fn test_open_without_seeding_stays_empty() {
        let store = empty_store();
        assert!(store.is_empty());
        assert!(store.kv().get("myList").is_none());
    }

    #[test]
    fn test_open_loads_existing_collection() {
        let payload = br#"[
            {"id":"a","title":"Hades","type":"Game","status":"Done","rating":9,"review":null,"createdAt":1},
            {"id":"b","title":"Dark","type":"Show","status":"Pending","rating":null,"review":null,"createdAt":2}
        ]"#;
        let kv = MemoryKv::new().with_entry("myList", &payload[..]);

        let store = ItemStore::open(kv, &Config::default()).unwrap();
        assert_eq!(store.len(), 2);
        assert_eq!(store.items()[0].title(), "Hades");
        assert_eq!(store.items()[1].title(), "Dark");
    }

    #[test]
    fn test_open_corrupt_payload_degrades_to_seed() {
        let kv = MemoryKv::new().with_entry("myList", &b"{definitely not json"[..]);

        let store = ItemStore::open(kv, &Config::default()).unwrap();
        assert_eq!(store.len(), 1);
        assert_eq!(store.items()[0].title(), "The Witcher 3");
        assert_eq!(store.kv().get("myList.corrupt"), Some(&b"{definitely not json"[..]));
    }

    #[test]
    fn test_open_all_invalid_elements_are_copied_aside() {
        let payload = br#"[
            {"id":"1","title":"Hades","type":"Game","status":"Visto","rating":8,"review":null,"createdAt":1},
            {"id":"2","title":"Dark","type":"Show","status":"Pendiente","rating":null,"review":null,"createdAt":2}
        ]"#;
        let kv = MemoryKv::new().with_entry("myList", &payload[..]);

        let store = ItemStore::open(kv, &Config::default()).unwrap();
        assert_eq!(store.len(), 1);
        assert_eq!(store.items()[0].title(), "The Witcher 3");
        assert_eq!(store.kv().get("myList.corrupt"), Some(&payload[..]));
    }

    #[test]
    fn test_open_partly_invalid_elements_are_copied_aside() {
        let payload = br#"[
            {"id":"1","title":"Hades","type":"Game","status":"Done","rating":8,"review":null,"createdAt":1},
            {"id":"2","title":"Dark","type":"Show","status":"Pendiente","rating":null,"review":null,"createdAt":2}
        ]"#;
        let kv = MemoryKv::new().with_entry("myList", &payload[..]);

        let store = ItemStore::open(kv, &Config::default()).unwrap();
        assert_eq!(store.len(), 1);
        assert_eq!(store.items()[0].title(), "Hades");
        assert_eq!(store.kv().get("myList.corrupt"), Some(&payload[..]));
    }

    #[test]
    fn test_open_clean_payload_makes_no_backup() {
        let payload = br#"[{"id":"1","title":"Hades","type":"Game","status":"Pending","rating":null,"review":null,"createdAt":1}]"#;
        let kv = MemoryKv::new().with_entry("myList", &payload[..]);

        let store = ItemStore::open(kv, &Config::default()).unwrap();
        assert!(store.kv().get("myList.corrupt").is_none());
    }

    #[test]
    fn test_reload_flushes_unsaved_changes() {
        let kv = FlakyKv::default();
        let fail_saves = kv.fail_saves.clone();
        let mut store = ItemStore::open(kv, &unseeded()).unwrap();
        store.create(CreateRequest::pending("Saved", "Game")).unwrap();

        fail_saves.set(true);
        assert!(store.create(CreateRequest::pending("Unsaved", "Game")).is_err());
        assert!(store.is_dirty());

        // Backend still down: reload is refused and memory is kept
        assert!(matches!(store.load(), Err(TrackerError::Persistence(_))));
        assert!(store.is_dirty());
        assert_eq!(store.len(), 2);

        // Backend back: the flush lands and the reload sees both items
        fail_saves.set(false);
        assert_eq!(store.load().unwrap(), 2);
        assert!(!store.is_dirty());
        let titles: Vec<&str> = store.items().iter().map(|i| i.title()).collect();
        assert_eq!(titles, vec!["Saved", "Unsaved"]);
    }

    #[test]
    fn test_file_backend_round_trip() {
        let temp = TempDir::new().unwrap();
        let config = unseeded();

        let id = {
            let mut store = ItemStore::open(FileKv::open(temp.path()).unwrap(), &config).unwrap();
            store.create(CreateRequest::pending("Hades", "Game")).unwrap();
            let item = store.create(CreateRequest::done("Dark", "Show", "9", "great")).unwrap();
            item.id().clone()
        };

        let store = ItemStore::open(FileKv::open(temp.path()).unwrap(), &config).unwrap();
        assert_eq!(store.len(), 2);
        assert_eq!(store.items()[0].title(), "Hades");
        let dark = store.get(&id).unwrap();
        assert_eq!(dark.status(), Status::Done);
        assert_eq!(dark.rating(), Some(Rating::clamped(9)));
        assert_eq!(dark.review(), Some("great"));
        assert!(!temp.path().join("myList.json.tmp").exists());
    }

    #[test]
    fn test_open_read_failure_is_persistence_error() {
        let kv = FlakyKv {
            fail_loads: true,
            ..Default::default()
        };

        let result = ItemStore::open(kv, &Config::default());
        assert!(matches!(result, Err(TrackerError::Persistence(_))));
    }

    #[test]
    fn test_seed_persist_failure_is_not_fatal() {
        let kv = FlakyKv::default();
        kv.fail_saves.set(true);

        let store = ItemStore::open(kv, &Config::default()).unwrap();
        assert_eq!(store.len(), 1);
        assert!(store.is_dirty());
    }

    // ------------------------------------------------------------------------
    // Create
    // ------------------------------------------------------------------------

    #[test]
    fn test_create_pending_item() {
        let mut store = empty_store();

        let item = store
            .create(CreateRequest {
                title: "  The Witcher 3  ".to_string(),
                category: "game".to_string(),
                status: Status::Pending,
                rating: "9".to_string(),
                review: "ignored".to_string(),
            })
            .unwrap();

        assert_eq!(item.title(), "The Witcher 3");
        assert_eq!(item.category().as_str(), "Game");
        assert_eq!(item.rating(), None);
        assert_eq!(item.review(), None);
        assert_eq!(store.len(), 1);
        assert_eq!(persisted(&store), vec![item]);
    }

    #[test]
    fn test_create_done_item_clamps_and_trims() {
        let mut store = empty_store();

        let item = store.create(CreateRequest::done("Dark", "Show", "15", "  superb ")).unwrap();
        assert_eq!(item.rating().map(Rating::value), Some(10));
        assert_eq!(item.review(), Some("superb"));

        let item = store.create(CreateRequest::done("Cats", "Movie", "awful", "   ")).unwrap();
        assert_eq!(item.rating().map(Rating::value), Some(0));
        assert_eq!(item.review(), None);
    }

    #[test]
    fn test_create_empty_title_is_rejected_without_persist() {
        let mut store = empty_store();

        let result = store.create(CreateRequest::pending("   ", "Game"));
        assert!(matches!(result, Err(TrackerError::Validation(_))));
        assert!(store.is_empty());
        assert!(store.kv().get("myList").is_none());
    }

    #[test]
    fn test_create_unknown_category_is_rejected() {
        let mut store = empty_store();

        let result = store.create(CreateRequest::pending("Dune", "Book"));
        assert!(matches!(result, Err(TrackerError::Validation(_))));
        assert!(store.is_empty());
    }

    #[test]
    fn test_create_appends_in_order_with_unique_ids() {
        let mut store = empty_store();
        for title in ["One", "Two", "Three"] {
            store.create(CreateRequest::pending(title, "Game")).unwrap();
        }

        let titles: Vec<&str> = store.items().iter().map(Item::title).collect();
        assert_eq!(titles, vec!["One", "Two", "Three"]);

        let ids: std::collections::HashSet<&ItemId> = store.items().iter().map(Item::id).collect();
        assert_eq!(ids.len(), 3);
    }

    #[test]
    fn test_create_persist_failure_keeps_item_in_memory() {
        let kv = FlakyKv::default();
        let fail = kv.fail_saves.clone();
        let mut store = ItemStore::open(kv, &unseeded()).unwrap();

        fail.set(true);
        let result = store.create(CreateRequest::pending("Outer Wilds", "Game"));
        assert!(result.as_ref().is_err_and(TrackerError::is_persistence));
        assert_eq!(store.len(), 1);
        assert!(store.is_dirty());

        // Next successful save catches storage up
        fail.set(false);
        store.create(CreateRequest::pending("Celeste", "Game")).unwrap();
        assert!(!store.is_dirty());
        assert_eq!(store.kv().inner.get("myList").map(|b| codec::decode_collection(b).items.len()), Some(2));
    }

    // ------------------------------------------------------------------------
    // Toggle
    // ------------------------------------------------------------------------

    #[test]
    fn test_toggle_scenario_done_and_back() {
        let mut store = empty_store();
        let item = store.create(CreateRequest::pending("The Witcher 3", "Game")).unwrap();
        assert_eq!(store.len(), 1);
        assert_eq!(item.rating(), None);

        let step = store
            .toggle_status(item.id(), &mut Scripted::answers(Some("9"), Some(Some("great"))))
            .unwrap();
        let ToggleStep::Committed(done) = step else {
            panic!("expected commit");
        };
        assert_eq!(done.status(), Status::Done);
        assert_eq!(done.rating().map(Rating::value), Some(9));
        assert_eq!(done.review(), Some("great"));
        assert_eq!(persisted(&store)[0], done);

        let step = store
            .toggle_status(item.id(), &mut Scripted::answers(None, None))
            .unwrap();
        let ToggleStep::Committed(reopened) = step else {
            panic!("expected commit");
        };
        assert_eq!(reopened.status(), Status::Pending);
        assert_eq!(reopened.rating(), None);
        assert_eq!(reopened.review(), None);
        assert_eq!(persisted(&store)[0], reopened);
    }

    #[test]
    fn test_step_by_step_toggle() {
        let mut store = empty_store();
        let item = store.create(CreateRequest::pending("Hades", "Game")).unwrap();

        assert_eq!(store.begin_toggle(item.id()).unwrap(), ToggleStep::AwaitingRating);
        assert_eq!(
            store.toggle_state(),
            Some(&ToggleState::AwaitingRating { id: item.id().clone() })
        );

        assert_eq!(store.supply_rating("12").unwrap(), ToggleStep::AwaitingReview);
        assert_eq!(
            store.toggle_state(),
            Some(&ToggleState::AwaitingReview {
                id: item.id().clone(),
                rating: Rating::clamped(10)
            })
        );
        // Nothing applied until the review step commits
        assert_eq!(store.get(item.id()).unwrap().status(), Status::Pending);

        let step = store.supply_review(None).unwrap();
        assert!(matches!(step, ToggleStep::Committed(_)));
        let done = store.get(item.id()).unwrap();
        assert_eq!(done.rating().map(Rating::value), Some(10));
        assert_eq!(done.review(), None);
        assert!(store.toggle_state().is_none());
    }

    #[test]
    fn test_non_numeric_rating_aborts_without_persist() {
        let mut store = empty_store();
        let item = store.create(CreateRequest::pending("Hades", "Game")).unwrap();
        let before = store.kv().get("myList").unwrap().to_vec();

        let step = store
            .toggle_status(item.id(), &mut Scripted::answers(Some("loved it"), Some(Some("x"))))
            .unwrap();
        assert_eq!(step, ToggleStep::Aborted);
        assert_eq!(store.get(item.id()).unwrap(), &item);
        assert_eq!(store.kv().get("myList").unwrap(), &before[..]);
        assert!(store.toggle_state().is_none());
    }

    #[test]
    fn test_cancelled_rating_prompt_aborts() {
        let mut store = empty_store();
        let item = store.create(CreateRequest::pending("Hades", "Game")).unwrap();

        let step = store.toggle_status(item.id(), &mut Scripted::answers(None, None)).unwrap();
        assert_eq!(step, ToggleStep::Aborted);
        assert_eq!(store.get(item.id()).unwrap().status(), Status::Pending);
        assert!(store.toggle_state().is_none());
    }

    #[test]
    fn test_cancelled_review_prompt_discards_rating() {
        let mut store = empty_store();
        let item = store.create(CreateRequest::pending("Hades", "Game")).unwrap();
        let before = store.kv().get("myList").unwrap().to_vec();

        let step = store.toggle_status(item.id(), &mut Scripted::answers(Some("8"), None)).unwrap();
        assert_eq!(step, ToggleStep::Aborted);
        assert_eq!(store.get(item.id()).unwrap(), &item);
        assert_eq!(store.kv().get("myList").unwrap(), &before[..]);
        assert!(store.toggle_state().is_none());
    }

    #[test]
    fn test_abort_toggle_midway() {
        let mut store = empty_store();
        let item = store.create(CreateRequest::pending("Hades", "Game")).unwrap();

        store.begin_toggle(item.id()).unwrap();
        store.supply_rating("7").unwrap();
        assert!(store.abort_toggle());
        assert!(!store.abort_toggle());

        assert_eq!(store.get(item.id()).unwrap(), &item);
        assert!(matches!(store.supply_review(Some("late")), Err(TrackerError::Validation(_))));
    }

    #[test]
    fn test_supply_out_of_order_is_validation_error() {
        let mut store = empty_store();
        let item = store.create(CreateRequest::pending("Hades", "Game")).unwrap();

        assert!(matches!(store.supply_rating("5"), Err(TrackerError::Validation(_))));
        assert!(matches!(store.supply_review(None), Err(TrackerError::Validation(_))));

        // Review before rating leaves the rating step in place
        store.begin_toggle(item.id()).unwrap();
        assert!(store.supply_review(Some("x")).is_err());
        assert_eq!(
            store.toggle_state(),
            Some(&ToggleState::AwaitingRating { id: item.id().clone() })
        );
    }

    #[test]
    fn test_toggle_unknown_id_is_not_found() {
        let mut store = empty_store();
        store.create(CreateRequest::pending("Hades", "Game")).unwrap();
        let before = store.items().to_vec();

        let result = store.toggle_status(&ItemId::from("missing"), &mut Scripted::answers(Some("5"), Some(None)));
        assert!(matches!(result, Err(TrackerError::NotFound(_))));
        assert_eq!(store.items(), &before[..]);
    }

    #[test]
    fn test_begin_toggle_replaces_previous_toggle() {
        let mut store = empty_store();
        let a = store.create(CreateRequest::pending("A", "Game")).unwrap();
        let b = store.create(CreateRequest::pending("B", "Game")).unwrap();

        store.begin_toggle(a.id()).unwrap();
        store.supply_rating("3").unwrap();
        store.begin_toggle(b.id()).unwrap();

        assert_eq!(store.toggle_state().map(ToggleState::id), Some(b.id()));
        store.supply_rating("6").unwrap();
        store.supply_review(None).unwrap();

        assert_eq!(store.get(a.id()).unwrap().status(), Status::Pending);
        assert_eq!(store.get(b.id()).unwrap().rating().map(Rating::value), Some(6));
    }

    #[test]
    fn test_item_deleted_mid_toggle_is_not_found() {
        let mut store = empty_store();
        let item = store.create(CreateRequest::pending("Hades", "Game")).unwrap();

        store.begin_toggle(item.id()).unwrap();
        store.supply_rating("9").unwrap();
        store.request_delete(item.id()).unwrap();
        store.confirm_delete().unwrap();

        // Deleting the item also dropped its toggle
        assert!(store.toggle_state().is_none());
        assert!(matches!(store.supply_review(None), Err(TrackerError::Validation(_))));
    }

    #[test]
    fn test_commit_for_vanished_item_is_not_found() {
        let mut store = empty_store();
        let item = store.create(CreateRequest::pending("Hades", "Game")).unwrap();

        store.begin_toggle(item.id()).unwrap();
        store.supply_rating("9").unwrap();
        store.items.clear();

        assert!(matches!(store.supply_review(None), Err(TrackerError::NotFound(_))));
        assert!(store.toggle_state().is_none());
    }

    // ------------------------------------------------------------------------
    // Delete
    // ------------------------------------------------------------------------

    #[test]
    fn test_request_then_cancel_leaves_collection_unchanged() {
        let mut store = empty_store();
        let item = store.create(CreateRequest::pending("Hades", "Game")).unwrap();
        let before = store.items().to_vec();

        assert_eq!(store.request_delete(item.id()).unwrap(), "Hades");
        assert_eq!(store.pending_deletion(), Some(item.id()));

        assert_eq!(store.cancel_delete(), Some(item.id().clone()));
        assert!(store.pending_deletion().is_none());
        assert_eq!(store.items(), &before[..]);

        // Confirm after cancel is a no-op
        assert_eq!(store.confirm_delete().unwrap(), None);
        assert_eq!(store.items(), &before[..]);
    }

    #[test]
    fn test_confirm_delete_preserves_order_and_persists() {
        let mut store = empty_store();
        let a = store.create(CreateRequest::pending("A", "Game")).unwrap();
        let b = store.create(CreateRequest::pending("B", "Show")).unwrap();
        let c = store.create(CreateRequest::pending("C", "Movie")).unwrap();

        store.request_delete(b.id()).unwrap();
        let removed = store.confirm_delete().unwrap();
        assert_eq!(removed, Some(b));

        assert_eq!(store.items(), &[a.clone(), c.clone()]);
        assert_eq!(persisted(&store), vec![a, c]);
        assert!(store.pending_deletion().is_none());
    }

    #[test]
    fn test_second_confirm_is_noop() {
        let mut store = empty_store();
        let a = store.create(CreateRequest::pending("A", "Game")).unwrap();

        store.request_delete(a.id()).unwrap();
        assert!(store.confirm_delete().unwrap().is_some());
        assert_eq!(store.confirm_delete().unwrap(), None);
        assert!(store.is_empty());
    }

    #[test]
    fn test_confirm_for_already_removed_item_is_noop() {
        let mut store = empty_store();
        store.create(CreateRequest::pending("A", "Game")).unwrap();
        let before = store.items().to_vec();

        store.pending_delete = Some(ItemId::from("gone"));
        assert_eq!(store.confirm_delete().unwrap(), None);
        assert!(store.pending_deletion().is_none());
        assert_eq!(store.items(), &before[..]);
    }

    #[test]
    fn test_request_delete_unknown_id() {
        let mut store = empty_store();
        let result = store.request_delete(&ItemId::from("nope"));
        assert!(matches!(result, Err(TrackerError::NotFound(_))));
        assert!(store.pending_deletion().is_none());
    }

    #[test]
    fn test_request_delete_overwrites_previous() {
        let mut store = empty_store();
        let a = store.create(CreateRequest::pending("A", "Game")).unwrap();
        let b = store.create(CreateRequest::pending("B", "Game")).unwrap();

        store.request_delete(a.id()).unwrap();
        store.request_delete(b.id()).unwrap();
        store.confirm_delete().unwrap();

        assert_eq!(store.items(), &[a]);
    }

    // ------------------------------------------------------------------------
    // Query + invariants
    // ------------------------------------------------------------------------

    #[test]
    fn test_query_through_store() {
        let mut store = empty_store();
        store.create(CreateRequest::pending("Hades", "Game")).unwrap();
        store.create(CreateRequest::done("Dark", "Show", "9", "")).unwrap();

        let mut criteria = FilterCriteria::default();
        assert_eq!(store.query(&criteria).len(), 2);

        criteria.status_filter = Selector::Only(Status::Done);
        let view = store.query(&criteria);
        assert_eq!(view.len(), 1);
        assert_eq!(view.total, 2);
        assert_eq!(view.items[0].title(), "Dark");
    }

    #[test]
    fn test_pending_invariant_holds_across_operations() {
        let mut store = empty_store();
        let mut ids = Vec::new();
        for (i, status) in [Status::Pending, Status::Done, Status::Pending, Status::Done].iter().enumerate() {
            let request = CreateRequest {
                title: format!("Item {}", i),
                category: "Game".to_string(),
                status: *status,
                rating: (i * 4).to_string(),
                review: "words".to_string(),
            };
            ids.push(store.create(request).unwrap().id().clone());
            assert_invariant(&store);
        }

        for (round, id) in ids.iter().cycle().take(12).enumerate() {
            let mut answers = match round % 3 {
                0 => Scripted::answers(Some("7"), Some(Some("again"))),
                1 => Scripted::answers(Some("nope"), None),
                _ => Scripted::answers(Some("2"), None),
            };
            store.toggle_status(id, &mut answers).unwrap();
            assert_invariant(&store);
        }

        store.request_delete(&ids[1]).unwrap();
        store.confirm_delete().unwrap();
        assert_invariant(&store);

        store.load().unwrap();
        assert_invariant(&store);
    }
}
