use crate::commands::{Action, CommandTable, Handler};
use crate::db::Database;
use crate::error::AppError;
use crate::photo::{self, PhotoSettings};
use crate::placeholder::placeholder;
use crate::records::{SeenMarker, SpeciesRecord};
use crate::resolver::providers::{INaturalist, ImageProvider, Wikipedia};
use crate::resolver::{ImageRef, Resolver};
use crate::scheduler::{GridGeometry, PaginationSentinel, Span, VisibilityScheduler};
use crate::store::{OverrideStore, ResolutionCache, SeenStore};
use crate::view::{Card, CardImage, FilterOutcome, InstanceId, ViewController};
use std::ops::Range;
use std::path::PathBuf;
use std::rc::Rc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

/// Which view is currently active.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum View {
    Grid,
    Detail,
}

/// What keystrokes are currently feeding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputMode {
    Normal,
    EditingQuery,
    PhotoPath,
}

/// Where a finished resolution should land.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageTarget {
    Card(InstanceId),
    Detail(String),
}

/// Results sent back to the main loop by background tasks.
#[derive(Debug)]
pub enum AppMessage {
    Resolved {
        target: ImageTarget,
        image: Option<ImageRef>,
    },
    PhotoSaved {
        id: String,
    },
    CacheCleared {
        id: String,
    },
    Failed(AppError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToastKind {
    Info,
    Error,
}

pub const TOAST_DURATION: Duration = Duration::from_millis(1800);

#[derive(Debug, Clone)]
pub struct Toast {
    pub message: String,
    pub kind: ToastKind,
    expires_at: Instant,
}

#[derive(Debug, Clone)]
pub struct DetailState {
    /// Catalog index of the record shown.
    pub record: usize,
    pub image: CardImage,
}

/// Rows used by header, filter bar, status bar and grid borders.
pub const GRID_OVERHEAD: u16 = 7;

pub const GRID: GridGeometry = GridGeometry {
    columns: 2,
    card_height: 6,
};

/// Anything that can back the app: seen markers, overrides and the cache.
pub trait Backend: SeenStore + OverrideStore + ResolutionCache + 'static {}

impl<T: SeenStore + OverrideStore + ResolutionCache + 'static> Backend for T {}

/// Main application state.
pub struct App<S = Database, P = INaturalist, W = Wikipedia> {
    pub grid: ViewController,
    store: Rc<S>,
    resolver: Rc<Resolver<S, P, W>>,
    scheduler: VisibilityScheduler,
    sentinel: PaginationSentinel,
    pub geometry: GridGeometry,

    pub selected: usize,
    pub scroll_top: u32,
    pub viewport_height: u32,

    pub view: View,
    pub input_mode: InputMode,
    pub path_input: String,
    pub detail: Option<DetailState>,
    pub toast: Option<Toast>,
    pub show_help: bool,
    pub should_quit: bool,

    photo: PhotoSettings,
    tx: UnboundedSender<AppMessage>,
    seen_tx: UnboundedSender<(String, Option<SeenMarker>)>,
}

impl<S, P, W> App<S, P, W> {
    pub fn selected_card(&self) -> Option<&Card> {
        self.grid.cards().get(self.selected)
    }

    pub fn detail_record(&self) -> Option<&SpeciesRecord> {
        self.detail.as_ref().map(|d| self.grid.store().at(d.record))
    }

    /// Record the next action applies to: the detail record, else the selection.
    pub fn current_record(&self) -> Option<&SpeciesRecord> {
        match self.view {
            View::Detail => self.detail_record(),
            View::Grid => self.selected_card().map(|c| self.grid.record_of(c)),
        }
    }

    pub fn has_more(&self) -> bool {
        self.grid.cards().len() < self.grid.filtered_len()
    }

    pub fn show_toast(&mut self, message: impl Into<String>, kind: ToastKind) {
        self.toast = Some(Toast {
            message: message.into(),
            kind,
            expires_at: Instant::now() + TOAST_DURATION,
        });
    }

    pub fn expire_toast(&mut self, now: Instant) {
        if self.toast.as_ref().is_some_and(|t| now >= t.expires_at) {
            self.toast = None;
        }
    }

    fn max_scroll(&self) -> u32 {
        // One extra row so the end-of-list marker can be scrolled into view.
        (self.geometry.content_height(self.grid.cards().len()) + 1).saturating_sub(self.viewport_height)
    }
}

impl<S, P, W> App<S, P, W>
where
    S: Backend,
    P: ImageProvider + 'static,
    W: ImageProvider + 'static,
{
    /// Must be called inside a `LocalSet`; the seen-marker writer is spawned here.
    pub fn new(
        grid: ViewController,
        store: Rc<S>,
        resolver: Resolver<S, P, W>,
        look_ahead: u32,
        photo: PhotoSettings,
    ) -> (Self, UnboundedReceiver<AppMessage>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let (seen_tx, seen_rx) = mpsc::unbounded_channel();
        tokio::task::spawn_local(write_seen_markers(Rc::clone(&store), seen_rx, tx.clone()));

        let mut app = Self {
            grid,
            store,
            resolver: Rc::new(resolver),
            scheduler: VisibilityScheduler::new(look_ahead),
            sentinel: PaginationSentinel::default(),
            geometry: GRID,
            selected: 0,
            scroll_top: 0,
            viewport_height: 0,
            view: View::Grid,
            input_mode: InputMode::Normal,
            path_input: String::new(),
            detail: None,
            toast: None,
            show_help: false,
            should_quit: false,
            photo,
            tx,
            seen_tx,
        };
        let rendered = 0..app.grid.cards().len();
        app.observe(rendered);
        (app, rx)
    }

    /// Build the validated key map for this app.
    pub fn command_table() -> Result<CommandTable<Self>, AppError> {
        let handlers: [(Action, Handler<Self>); 18] = [
            (Action::Quit, Self::quit),
            (Action::Help, Self::toggle_help),
            (Action::Back, Self::back),
            (Action::EditQuery, Self::edit_query),
            (Action::NextFamily, Self::next_family),
            (Action::PrevFamily, Self::prev_family),
            (Action::ToggleSpotted, Self::toggle_spotted),
            (Action::ToggleSeen, Self::toggle_seen),
            (Action::OpenDetail, Self::open_detail),
            (Action::UploadPhoto, Self::begin_photo_upload),
            (Action::OpenUrl, Self::open_url),
            (Action::RetryImage, Self::retry_image),
            (Action::Up, Self::up),
            (Action::Down, Self::down),
            (Action::Left, Self::left),
            (Action::Right, Self::right),
            (Action::PageUp, Self::page_up),
            (Action::PageDown, Self::page_down),
        ];
        CommandTable::new(&crate::commands::default_bindings(), &handlers)
    }

    /// Update the grid height from the terminal height.
    pub fn set_terminal_height(&mut self, height: u16) {
        self.viewport_height = u32::from(height.saturating_sub(GRID_OVERHEAD)).max(1);
        self.scroll_top = self.scroll_top.min(self.max_scroll());
        self.sync_viewport();
    }

    fn observe(&mut self, range: Range<usize>) {
        for index in range {
            let instance = self.grid.cards()[index].instance;
            self.scheduler.observe(instance, self.geometry.span_of(index));
        }
    }

    /// Re-register every card after the grid was rebuilt.
    fn after_rebuild(&mut self, rendered: Range<usize>) {
        self.scheduler.forget_all();
        self.sentinel.reset();
        self.observe(rendered);
        self.selected = self.selected.min(self.grid.cards().len().saturating_sub(1));
        self.scroll_top = self.scroll_top.min(self.max_scroll());
        self.sync_viewport();
    }

    fn after_filter(&mut self, outcome: FilterOutcome) {
        self.selected = 0;
        self.scroll_top = 0;
        tracing::debug!(
            filtered = outcome.filtered,
            window = outcome.window,
            "filters applied"
        );
        self.after_rebuild(outcome.rendered);
    }

    /// Grow the window while the sentinel is in view, then start resolution
    /// for every card within the look-ahead margin.
    pub fn sync_viewport(&mut self) {
        if self.viewport_height == 0 {
            return;
        }
        let viewport = Span::new(self.scroll_top, self.viewport_height);
        loop {
            let marker = self.geometry.sentinel_span(self.grid.cards().len());
            if !self.sentinel.update(marker, viewport) {
                break;
            }
            match self.grid.grow_window() {
                Some(range) => {
                    tracing::debug!(window = self.grid.window(), "window grown");
                    self.observe(range);
                    // The marker moved; let it fire again if it is still in view.
                    self.sentinel.reset();
                }
                None => break,
            }
        }

        let due = self.scheduler.take_due(viewport);
        if !due.is_empty() {
            tracing::trace!(due = due.len(), pending = self.scheduler.pending(), "starting resolution");
        }
        for instance in due {
            let Ok(pos) = self
                .grid
                .cards()
                .binary_search_by_key(&instance, |c| c.instance)
            else {
                continue;
            };
            let record = self.grid.record_of(&self.grid.cards()[pos]).clone();
            self.spawn_resolve(record, ImageTarget::Card(instance));
        }
    }

    fn spawn_resolve(&self, record: SpeciesRecord, target: ImageTarget) {
        let resolver = Rc::clone(&self.resolver);
        let tx = self.tx.clone();
        tokio::task::spawn_local(async move {
            let image = resolver.resolve(&record).await;
            let _ = tx.send(AppMessage::Resolved { target, image });
        });
    }

    pub fn handle_message(&mut self, message: AppMessage) {
        match message {
            AppMessage::Resolved {
                target: ImageTarget::Card(instance),
                image,
            } => {
                if !self.grid.apply_image(instance, image) {
                    tracing::trace!(?instance, "dropping result for a card no longer shown");
                }
            }
            AppMessage::Resolved {
                target: ImageTarget::Detail(id),
                image,
            } => {
                let Some(detail) = self.detail.as_mut() else {
                    return;
                };
                let record = self.grid.store().at(detail.record);
                if record.id != id {
                    return;
                }
                detail.image = match image {
                    Some(image) => CardImage::Resolved(image),
                    None => CardImage::Placeholder(placeholder(record.label_name())),
                };
            }
            AppMessage::PhotoSaved { id } => {
                self.show_toast("Photo saved", ToastKind::Info);
                self.refresh_record(id);
            }
            AppMessage::CacheCleared { id } => {
                self.show_toast("Looking up the image again", ToastKind::Info);
                self.refresh_record(id);
            }
            AppMessage::Failed(err) => {
                self.show_toast(err.user_message(), ToastKind::Error);
            }
        }
    }

    /// Resolve `id` again wherever it is shown.
    fn refresh_record(&mut self, id: String) {
        let rendered = self.grid.rerender();
        self.after_rebuild(rendered);
        if let Some(detail) = self.detail.as_mut() {
            let record = self.grid.store().at(detail.record);
            if record.id == id {
                detail.image = CardImage::Skeleton;
                let record = record.clone();
                self.spawn_resolve(record, ImageTarget::Detail(id));
            }
        }
    }

    /// Scroll so the selected card is fully visible, then re-sync.
    fn ensure_visible(&mut self) {
        let len = self.grid.cards().len();
        if len == 0 {
            self.scroll_top = 0;
            self.sync_viewport();
            return;
        }
        let mut span = self.geometry.span_of(self.selected);
        if self.geometry.row_of(self.selected) == self.geometry.row_of(len - 1) {
            span.height += 1;
        }
        if span.top < self.scroll_top {
            self.scroll_top = span.top;
        } else if span.bottom() > self.scroll_top + self.viewport_height {
            self.scroll_top = span.bottom().saturating_sub(self.viewport_height);
        }
        self.sync_viewport();
    }

    fn move_selection(&mut self, delta: isize) {
        if self.view != View::Grid {
            return;
        }
        let len = self.grid.cards().len();
        if len == 0 {
            return;
        }
        let target = self.selected as isize + delta;
        self.selected = target.clamp(0, len as isize - 1) as usize;
        self.ensure_visible();
    }

    fn page_cards(&self) -> isize {
        let rows = (self.viewport_height / self.geometry.card_height).max(1);
        rows as isize * self.geometry.columns as isize
    }

    pub fn quit(&mut self) {
        self.should_quit = true;
    }

    pub fn toggle_help(&mut self) {
        self.show_help = !self.show_help;
    }

    pub fn back(&mut self) {
        match self.view {
            View::Detail => {
                self.view = View::Grid;
                self.detail = None;
            }
            View::Grid => {
                if !self.grid.filter().query.is_empty() {
                    let outcome = self.grid.set_query("");
                    self.after_filter(outcome);
                }
            }
        }
    }

    pub fn edit_query(&mut self) {
        if self.view == View::Grid {
            self.input_mode = InputMode::EditingQuery;
        }
    }

    pub fn push_query_char(&mut self, c: char) {
        let mut query = self.grid.filter().query.clone();
        query.push(c);
        let outcome = self.grid.set_query(&query);
        self.after_filter(outcome);
    }

    pub fn pop_query_char(&mut self) {
        let mut query = self.grid.filter().query.clone();
        if query.pop().is_some() {
            let outcome = self.grid.set_query(&query);
            self.after_filter(outcome);
        }
    }

    pub fn next_family(&mut self) {
        let outcome = self.grid.cycle_family(true);
        self.after_filter(outcome);
    }

    pub fn prev_family(&mut self) {
        let outcome = self.grid.cycle_family(false);
        self.after_filter(outcome);
    }

    pub fn toggle_spotted(&mut self) {
        let spotted_only = !self.grid.filter().spotted_only;
        let outcome = self.grid.set_spotted_only(spotted_only);
        self.after_filter(outcome);
    }

    /// Flip the seen marker in memory now and queue the write.
    pub fn toggle_seen(&mut self) {
        let Some(id) = self.current_record().map(|r| r.id.clone()) else {
            return;
        };
        let today = chrono::Local::now().date_naive();
        let (marker, rendered) = self.grid.toggle_seen(&id, today);
        self.after_rebuild(rendered);
        let message = if marker.is_some() {
            "Marked as seen"
        } else {
            "Marked as not seen"
        };
        self.show_toast(message, ToastKind::Info);
        if self.seen_tx.send((id, marker)).is_err() {
            tracing::warn!("seen marker writer has stopped");
        }
    }

    pub fn open_detail(&mut self) {
        if self.view != View::Grid {
            return;
        }
        let Some(card) = self.selected_card() else {
            return;
        };
        let record = card.record;
        let image = card.image.clone();
        let resolve = image == CardImage::Skeleton;
        self.detail = Some(DetailState { record, image });
        self.view = View::Detail;
        if resolve {
            let record = self.grid.store().at(record).clone();
            let id = record.id.clone();
            self.spawn_resolve(record, ImageTarget::Detail(id));
        }
    }

    pub fn begin_photo_upload(&mut self) {
        if self.current_record().is_some() {
            self.path_input.clear();
            self.input_mode = InputMode::PhotoPath;
        }
    }

    /// Start saving the file named in the path prompt as the override photo.
    pub fn submit_photo_path(&mut self) {
        self.input_mode = InputMode::Normal;
        let raw = std::mem::take(&mut self.path_input);
        let raw = raw.trim();
        if raw.is_empty() {
            return;
        }
        let Some(id) = self.current_record().map(|r| r.id.clone()) else {
            return;
        };
        let path = expand_home(raw);
        let store = Rc::clone(&self.store);
        let tx = self.tx.clone();
        let settings = self.photo;
        tokio::task::spawn_local(async move {
            let message = match photo::capture(&*store, &id, &path, settings).await {
                Ok(_) => AppMessage::PhotoSaved { id },
                Err(e) => {
                    tracing::warn!(record = %id, path = %path.display(), error = %e, "photo not saved");
                    AppMessage::Failed(AppError::Photo(e))
                }
            };
            let _ = tx.send(message);
        });
        self.show_toast("Saving photo...", ToastKind::Info);
    }

    pub fn cancel_input(&mut self) {
        self.input_mode = InputMode::Normal;
        self.path_input.clear();
    }

    pub fn open_url(&mut self) {
        let image = match self.view {
            View::Detail => self.detail.as_ref().map(|d| d.image.clone()),
            View::Grid => self.selected_card().map(|c| c.image.clone()),
        };
        let Some(CardImage::Resolved(image)) = image else {
            self.show_toast("No image for this species", ToastKind::Info);
            return;
        };
        match image.url() {
            Some(url) => match std::process::Command::new("xdg-open").arg(url).spawn() {
                Ok(_) => self.show_toast(format!("Opening: {}", url), ToastKind::Info),
                Err(e) => self.show_toast(format!("Cannot open browser: {}", e), ToastKind::Error),
            },
            None => self.show_toast("This is your own photo", ToastKind::Info),
        }
    }

    /// Drop the memoized lookup for the current record and resolve it again.
    pub fn retry_image(&mut self) {
        let Some(id) = self.current_record().map(|r| r.id.clone()) else {
            return;
        };
        let store = Rc::clone(&self.store);
        let tx = self.tx.clone();
        tokio::task::spawn_local(async move {
            let message = match store.clear_cached(&id).await {
                Ok(()) => AppMessage::CacheCleared { id },
                Err(e) => {
                    tracing::warn!(record = %id, error = %e, "could not clear cached lookup");
                    AppMessage::Failed(AppError::Store(e))
                }
            };
            let _ = tx.send(message);
        });
    }

    pub fn up(&mut self) {
        let step = self.geometry.columns as isize;
        self.move_selection(-step);
    }

    pub fn down(&mut self) {
        let step = self.geometry.columns as isize;
        self.move_selection(step);
    }

    pub fn left(&mut self) {
        self.move_selection(-1);
    }

    pub fn right(&mut self) {
        self.move_selection(1);
    }

    pub fn page_up(&mut self) {
        let step = self.page_cards();
        self.move_selection(-step);
    }

    pub fn page_down(&mut self) {
        let step = self.page_cards();
        self.move_selection(step);
    }
}

/// Apply seen-marker writes one at a time, in the order they were made.
async fn write_seen_markers<S: SeenStore>(
    store: Rc<S>,
    mut rx: UnboundedReceiver<(String, Option<SeenMarker>)>,
    tx: UnboundedSender<AppMessage>,
) {
    while let Some((id, marker)) = rx.recv().await {
        let result = match marker {
            Some(marker) => store.set_seen(&id, marker).await,
            None => store.clear_seen(&id).await,
        };
        if let Err(e) = result {
            tracing::warn!(record = %id, error = %e, "could not persist seen marker");
            let _ = tx.send(AppMessage::Failed(AppError::Store(e)));
        }
    }
}

fn expand_home(raw: &str) -> PathBuf {
    if let Some(rest) = raw.strip_prefix("~/") {
        if let Some(dirs) = directories::BaseDirs::new() {
            return dirs.home_dir().join(rest);
        }
    }
    PathBuf::from(raw)
}
