use crate::placeholder::{Placeholder, placeholder};
use crate::records::{FilterState, RecordStore, SeenMarker, SpeciesRecord};
use crate::resolver::ImageRef;
use chrono::NaiveDate;
use std::ops::Range;

pub const DEFAULT_STEP: usize = 40;

/// Identity of one rendered card. A record rendered again after a reset gets a
/// new instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct InstanceId(pub u64);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CardImage {
    /// Waiting for resolution.
    Skeleton,
    Resolved(ImageRef),
    Placeholder(Placeholder),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Card {
    pub instance: InstanceId,
    /// Index into the catalog.
    pub record: usize,
    pub image: CardImage,
}

/// Result of recomputing the filtered view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterOutcome {
    pub filtered: usize,
    pub window: usize,
    /// Cards rendered by this call (always a full rebuild).
    pub rendered: Range<usize>,
}

/// Owns the filtered view, the pagination window and the rendered cards.
pub struct ViewController {
    store: RecordStore,
    families: Vec<String>,
    filter: FilterState,
    filtered: Vec<usize>,
    step: usize,
    window: usize,
    cards: Vec<Card>,
    next_instance: u64,
}

impl ViewController {
    /// Start unfiltered with one page rendered.
    pub fn new(store: RecordStore, step: usize) -> Self {
        let step = step.max(1);
        let families = store.families();
        let mut view = Self {
            filtered: (0..store.len()).collect(),
            store,
            families,
            filter: FilterState::default(),
            step,
            window: step,
            cards: Vec::new(),
            next_instance: 0,
        };
        view.rerender();
        view
    }

    pub fn store(&self) -> &RecordStore {
        &self.store
    }

    pub fn filter(&self) -> &FilterState {
        &self.filter
    }

    pub fn families(&self) -> &[String] {
        &self.families
    }

    pub fn filtered_len(&self) -> usize {
        self.filtered.len()
    }

    pub fn window(&self) -> usize {
        self.window
    }

    pub fn cards(&self) -> &[Card] {
        &self.cards
    }

    pub fn record_of(&self, card: &Card) -> &SpeciesRecord {
        self.store.at(card.record)
    }

    /// Recompute the filtered view, clamp the window and rebuild the grid.
    pub fn apply_filters(&mut self) -> FilterOutcome {
        self.filtered = self.store.filter(&self.filter);
        self.window = self.step.max(self.window.min(self.filtered.len()));
        let rendered = self.rerender();
        FilterOutcome {
            filtered: self.filtered.len(),
            window: self.window,
            rendered,
        }
    }

    /// Grow the window by one step and append only the newly eligible cards.
    pub fn grow_window(&mut self) -> Option<Range<usize>> {
        let before = self.window;
        self.window = self.filtered.len().min(self.window + self.step);
        if self.window <= before {
            // Never shrink here; that is apply_filters' job.
            self.window = before;
            return None;
        }
        let start = self.cards.len();
        self.append_up_to(self.window);
        Some(start..self.cards.len())
    }

    /// Clear and rebuild the rendered cards, keeping the window.
    pub fn rerender(&mut self) -> Range<usize> {
        self.cards.clear();
        self.append_up_to(self.window);
        0..self.cards.len()
    }

    fn append_up_to(&mut self, window: usize) {
        let now = window.min(self.filtered.len());
        for &record in &self.filtered[self.cards.len().min(now)..now] {
            self.cards.push(Card {
                instance: InstanceId(self.next_instance),
                record,
                image: CardImage::Skeleton,
            });
            self.next_instance += 1;
        }
    }

    pub fn set_query(&mut self, query: &str) -> FilterOutcome {
        self.filter.query = query.to_string();
        self.apply_filters()
    }

    pub fn set_family(&mut self, family: Option<String>) -> FilterOutcome {
        self.filter.family = family;
        self.apply_filters()
    }

    /// Step through `All` followed by every family.
    pub fn cycle_family(&mut self, forward: bool) -> FilterOutcome {
        let len = self.families.len() + 1;
        let current = match &self.filter.family {
            Some(f) => self.families.iter().position(|x| x == f).map_or(0, |i| i + 1),
            None => 0,
        };
        let next = if forward {
            (current + 1) % len
        } else {
            (current + len - 1) % len
        };
        let family = next.checked_sub(1).map(|i| self.families[i].clone());
        self.set_family(family)
    }

    pub fn set_spotted_only(&mut self, spotted_only: bool) -> FilterOutcome {
        self.filter.spotted_only = spotted_only;
        self.apply_filters()
    }

    /// Flip the seen marker for `id` and refresh the grid.
    ///
    /// With spotted-only active the filter is re-applied, otherwise the visible
    /// set is re-rendered in place.
    pub fn toggle_seen(&mut self, id: &str, today: NaiveDate) -> (Option<SeenMarker>, Range<usize>) {
        let marker = self.store.toggle_seen(id, today);
        let rendered = if self.filter.spotted_only {
            self.apply_filters().rendered
        } else {
            self.rerender()
        };
        (marker, rendered)
    }

    /// Apply a finished resolution to the card it was started for.
    ///
    /// Returns `false` if that card is no longer rendered.
    pub fn apply_image(&mut self, instance: InstanceId, image: Option<ImageRef>) -> bool {
        let Ok(pos) = self.cards.binary_search_by_key(&instance, |c| c.instance) else {
            return false;
        };
        let image = match image {
            Some(image) => CardImage::Resolved(image),
            None => {
                let record = self.store.at(self.cards[pos].record);
                CardImage::Placeholder(placeholder(record.label_name()))
            }
        };
        self.cards[pos].image = image;
        true
    }
}
