//! Viewport-driven triggering of image resolution and pagination.
//!
//! Positions are measured in terminal rows from the top of the card grid.

use crate::view::InstanceId;
use std::collections::BTreeMap;

/// Vertical extent `[top, top + height)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Span {
    pub top: u32,
    pub height: u32,
}

impl Span {
    pub fn new(top: u32, height: u32) -> Self {
        Self { top, height }
    }

    pub fn bottom(&self) -> u32 {
        self.top.saturating_add(self.height)
    }

    /// Overlap test; zero-height spans count as a line at `top`.
    pub fn intersects(&self, other: &Span) -> bool {
        let self_bottom = self.bottom().max(self.top + 1);
        let other_bottom = other.bottom().max(other.top + 1);
        self.top < other_bottom && other.top < self_bottom
    }

    /// This span grown by `margin` rows on both sides.
    pub fn expand(&self, margin: u32) -> Span {
        let top = self.top.saturating_sub(margin);
        Span {
            top,
            height: self.bottom().saturating_add(margin) - top,
        }
    }
}

/// Card grid layout: fixed card height, fixed column count.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GridGeometry {
    pub columns: usize,
    pub card_height: u32,
}

impl GridGeometry {
    pub fn row_of(&self, index: usize) -> usize {
        index / self.columns.max(1)
    }

    pub fn span_of(&self, index: usize) -> Span {
        Span::new(self.row_of(index) as u32 * self.card_height, self.card_height)
    }

    /// Height of the grid holding `count` cards.
    pub fn content_height(&self, count: usize) -> u32 {
        count.div_ceil(self.columns.max(1)) as u32 * self.card_height
    }

    /// The pagination sentinel: one row directly after the last card.
    pub fn sentinel_span(&self, count: usize) -> Span {
        Span::new(self.content_height(count), 1)
    }
}

/// Tracks rendered cards that still need an image.
#[derive(Debug, Default)]
pub struct VisibilityScheduler {
    margin: u32,
    pending: BTreeMap<InstanceId, Span>,
}

impl VisibilityScheduler {
    pub fn new(margin: u32) -> Self {
        Self {
            margin,
            pending: BTreeMap::new(),
        }
    }

    /// Register interest in a card becoming (almost) visible.
    pub fn observe(&mut self, instance: InstanceId, span: Span) {
        self.pending.insert(instance, span);
    }

    /// Drop every registration; used when the grid is rebuilt.
    pub fn forget_all(&mut self) {
        self.pending.clear();
    }

    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    /// Cards within the look-ahead margin of `viewport`, in instance order.
    ///
    /// Returned cards are deregistered, so each instance is handed out once.
    pub fn take_due(&mut self, viewport: Span) -> Vec<InstanceId> {
        let reach = viewport.expand(self.margin);
        let due: Vec<InstanceId> = self
            .pending
            .iter()
            .filter(|(_, span)| span.intersects(&reach))
            .map(|(&id, _)| id)
            .collect();
        for id in &due {
            self.pending.remove(id);
        }
        due
    }
}

/// Fires when the end-of-list marker scrolls into view.
#[derive(Debug, Default)]
pub struct PaginationSentinel {
    visible: bool,
}

impl PaginationSentinel {
    /// `true` only on the transition from hidden to visible.
    pub fn update(&mut self, sentinel: Span, viewport: Span) -> bool {
        let now = sentinel.intersects(&viewport);
        let fired = now && !self.visible;
        self.visible = now;
        fired
    }

    /// Forget visibility so the next sighting fires again.
    pub fn reset(&mut self) {
        self.visible = false;
    }
}
