// Event loop glue: UI events -> store mutation -> re-query -> render

use crate::error::{Result, TrackerError};
use crate::item::{CreateRequest, Item, ItemId};
use crate::kv::KvStore;
use crate::query::{FilterCriteria, View};
use crate::store::{ItemStore, ToggleStep};
use tracing::debug;

/// Presentation collaborator
pub trait Renderer {
    /// Show the visible items; `view.total` is the full collection size
    fn render(&mut self, view: &View<'_>);

    /// A toggle to Done needs a rating for `item`
    fn ask_rating(&mut self, _item: &Item) {}

    /// The rating was accepted, a review (or skip) is next
    fn ask_review(&mut self, _item: &Item) {}

    /// A deletion of `title` awaits confirm or cancel
    fn ask_delete_confirmation(&mut self, _title: &str) {}
}

/// Everything the UI can ask for
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UiEvent {
    Add(CreateRequest),
    Toggle(ItemId),
    SupplyRating(String),
    SupplyReview(Option<String>),
    AbortToggle,
    RequestDelete(ItemId),
    ConfirmDelete,
    CancelDelete,
    FilterChanged(FilterCriteria),
    ClearFilters,
}

/// Owns the store, the current filter criteria and the renderer
pub struct Tracker<K: KvStore, R: Renderer> {
    store: ItemStore<K>,
    criteria: FilterCriteria,
    renderer: R,
}

impl<K: KvStore, R: Renderer> Tracker<K, R> {
    pub fn new(store: ItemStore<K>, renderer: R) -> Self {
        Self {
            store,
            criteria: FilterCriteria::default(),
            renderer,
        }
    }

    pub fn store(&self) -> &ItemStore<K> {
        &self.store
    }

    pub fn criteria(&self) -> &FilterCriteria {
        &self.criteria
    }

    pub fn renderer(&self) -> &R {
        &self.renderer
    }

    /// Re-evaluate the current criteria and render
    pub fn refresh(&mut self) {
        let view = self.store.query(&self.criteria);
        self.renderer.render(&view);
    }

    /// Apply one event, then render.
    ///
    /// Persistence failures still render because the in-memory change
    /// stands; validation and lookup failures leave the state as it was.
    pub fn handle(&mut self, event: UiEvent) -> Result<()> {
        debug!(?event, "Handling UI event");
        let result = self.apply(event);

        if matches!(result, Ok(()) | Err(TrackerError::Persistence(_))) {
            self.refresh();
        }
        result
    }

    fn apply(&mut self, event: UiEvent) -> Result<()> {
        match event {
            UiEvent::Add(request) => {
                self.store.create(request)?;
            }
            UiEvent::Toggle(id) => {
                if self.store.begin_toggle(&id)? == ToggleStep::AwaitingRating
                    && let Some(item) = self.store.get(&id)
                {
                    self.renderer.ask_rating(item);
                }
            }
            UiEvent::SupplyRating(input) => {
                let id = self.store.toggle_state().map(|t| t.id().clone());
                if self.store.supply_rating(&input)? == ToggleStep::AwaitingReview
                    && let Some(item) = id.as_ref().and_then(|id| self.store.get(id))
                {
                    self.renderer.ask_review(item);
                }
            }
            UiEvent::SupplyReview(review) => {
                self.store.supply_review(review.as_deref())?;
            }
            UiEvent::AbortToggle => {
                self.store.abort_toggle();
            }
            UiEvent::RequestDelete(id) => {
                let title = self.store.request_delete(&id)?;
                self.renderer.ask_delete_confirmation(&title);
            }
            UiEvent::ConfirmDelete => {
                self.store.confirm_delete()?;
            }
            UiEvent::CancelDelete => {
                self.store.cancel_delete();
            }
            UiEvent::FilterChanged(criteria) => {
                self.criteria = criteria;
            }
            UiEvent::ClearFilters => {
                self.criteria.clear();
            }
        }
        Ok(())
    }
}
