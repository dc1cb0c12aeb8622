//! Book orchestrator
//!
//! A [`Book`] owns the page controllers of one book, the reader's current
//! page index, the drag gesture tracker, and batch flips ("cascades") to the
//! first or last page.
//!
//! ```
//! use folio_animation::FrameScheduler;
//! use folio_reader::{Book, HeadlessSurface, MeshHandle, PageSurface, ReaderConfig};
//! use std::time::Duration;
//!
//! let scheduler = FrameScheduler::with_virtual_clock();
//! let surfaces: Vec<Box<dyn PageSurface>> = (0..8)
//!     .map(|i| Box::new(HeadlessSurface::new(MeshHandle(i))) as Box<dyn PageSurface>)
//!     .collect();
//! let book = Book::new(scheduler.handle(), ReaderConfig::default(), surfaces)?;
//!
//! book.on_page_turn(|turn| println!("turned {turn:?}"));
//! let mut cascade = book.to_end().expect("no cascade running");
//! while cascade.try_outcome().is_none() {
//!     scheduler.advance(Duration::from_millis(16));
//! }
//! assert_eq!(book.current_index(), 8);
//! # Ok::<(), folio_reader::ReaderError>(())
//! ```

use crate::config::ReaderConfig;
use crate::error::{ReaderError, Result};
use crate::gesture::{GestureTracker, InputSource, PageTurn, TouchPoint};
use crate::page::{FlipHandle, FlipOutcome, PageFlip, PageParams};
use crate::surface::PageSurface;
use folio_animation::{SchedulerHandle, TickCallbackId, TickControl, TimerId};
use std::cell::{Cell, RefCell};
use std::future::Future;
use std::pin::Pin;
use std::rc::{Rc, Weak};
use std::task::{Context, Poll};
use tokio::sync::oneshot;
use tokio::sync::oneshot::error::TryRecvError;

/// Listener for page turns
pub type PageTurnListener = Box<dyn FnMut(PageTurn)>;

/// Which end of the book a cascade runs to
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CascadeDirection {
    /// Turn every page back onto the unflipped stack
    ToStart,
    /// Turn every page onto the flipped stack
    ToEnd,
}

/// How a cascade ended
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CascadeOutcome {
    /// Every page reached the end of the book it was sent to
    Completed,
    /// At least one page's run was cancelled before finishing
    Interrupted,
    /// The book was dropped before the cascade settled
    Abandoned,
}

/// Completion of a cascade
///
/// Await it, or poll it without blocking via [`CascadeHandle::try_outcome`].
#[derive(Debug)]
pub struct CascadeHandle {
    rx: Option<oneshot::Receiver<CascadeOutcome>>,
    outcome: Option<CascadeOutcome>,
}

impl CascadeHandle {
    fn pending(rx: oneshot::Receiver<CascadeOutcome>) -> Self {
        Self {
            rx: Some(rx),
            outcome: None,
        }
    }

    fn ready(outcome: CascadeOutcome) -> Self {
        Self {
            rx: None,
            outcome: Some(outcome),
        }
    }

    /// The outcome, if the cascade has settled
    pub fn try_outcome(&mut self) -> Option<CascadeOutcome> {
        if self.outcome.is_none() {
            if let Some(rx) = self.rx.as_mut() {
                match rx.try_recv() {
                    Ok(outcome) => self.outcome = Some(outcome),
                    Err(TryRecvError::Closed) => self.outcome = Some(CascadeOutcome::Abandoned),
                    Err(TryRecvError::Empty) => {}
                }
            }
        }
        self.outcome
    }
}

impl Future for CascadeHandle {
    type Output = CascadeOutcome;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        if let Some(outcome) = this.outcome {
            return Poll::Ready(outcome);
        }
        let Some(rx) = this.rx.as_mut() else {
            return Poll::Ready(CascadeOutcome::Abandoned);
        };
        match Pin::new(rx).poll(cx) {
            Poll::Ready(result) => {
                let outcome = result.unwrap_or(CascadeOutcome::Abandoned);
                this.outcome = Some(outcome);
                Poll::Ready(outcome)
            }
            Poll::Pending => Poll::Pending,
        }
    }
}

/// A running cascade
struct Cascade {
    direction: CascadeDirection,
    /// Pages the cascade launches, in launch order
    order: Vec<usize>,
    launched: Vec<FlipHandle>,
    timers: Vec<TimerId>,
    watcher: Option<TickCallbackId>,
    /// Gesture state to restore once the cascade settles
    restore_gestures: bool,
    done: oneshot::Sender<CascadeOutcome>,
}

impl Cascade {
    fn is_settled(&mut self) -> bool {
        self.launched.len() == self.order.len()
            && self.launched.iter_mut().all(|handle| handle.is_settled())
    }
}

struct BookShared {
    pages: Vec<PageFlip>,
    current_index: Cell<usize>,
    gesture: RefCell<GestureTracker>,
    listeners: RefCell<Vec<PageTurnListener>>,
    cascade: RefCell<Option<Cascade>>,
}

impl BookShared {
    fn total_pages(&self) -> usize {
        self.pages.len()
    }

    fn is_batch_in_progress(&self) -> bool {
        self.cascade.borrow().is_some()
    }

    fn notify(&self, turn: PageTurn) {
        tracing::debug!(?turn, current_index = self.current_index.get(), "page turn");
        let mut listeners = std::mem::take(&mut *self.listeners.borrow_mut());
        for listener in listeners.iter_mut() {
            listener(turn);
        }
        // Listeners registered during notification go after the existing ones
        let mut slot = self.listeners.borrow_mut();
        listeners.append(&mut slot);
        *slot = listeners;
    }

    fn launch(&self, index: usize, direction: CascadeDirection) -> FlipHandle {
        let page = &self.pages[index];
        tracing::debug!(page = index, mesh = ?page.mesh(), ?direction, "cascade launch");
        match direction {
            CascadeDirection::ToEnd => page.flip(),
            CascadeDirection::ToStart => page.backward(),
        }
    }

    fn launch_staggered(&self, index: usize) {
        let direction = match self.cascade.borrow().as_ref() {
            Some(cascade) => cascade.direction,
            None => return,
        };
        let handle = self.launch(index, direction);
        if let Some(cascade) = self.cascade.borrow_mut().as_mut() {
            cascade.launched.push(handle);
        }
    }

    /// Finish the cascade if every page has settled
    fn poll_cascade(&self) -> bool {
        let settled = match self.cascade.borrow_mut().as_mut() {
            Some(cascade) => cascade.is_settled(),
            None => return true,
        };
        if settled {
            self.finish_cascade();
        }
        settled
    }

    fn finish_cascade(&self) {
        let Some(cascade) = self.cascade.borrow_mut().take() else {
            return;
        };

        let interrupted = cascade
            .launched
            .into_iter()
            .filter_map(|mut handle| handle.try_outcome())
            .filter(|outcome| *outcome == FlipOutcome::Cancelled)
            .count();

        let index = if interrupted == 0 {
            match cascade.direction {
                CascadeDirection::ToStart => 0,
                CascadeDirection::ToEnd => self.total_pages(),
            }
        } else {
            self.pages
                .iter()
                .take_while(|page| page.flip_percent() >= 1.0)
                .count()
        };
        self.current_index.set(index);
        self.gesture.borrow_mut().set_enabled(cascade.restore_gestures);

        let outcome = if interrupted == 0 {
            CascadeOutcome::Completed
        } else {
            tracing::warn!(interrupted, "cascade finished with cancelled page runs");
            CascadeOutcome::Interrupted
        };
        tracing::debug!(
            direction = ?cascade.direction,
            pages = cascade.order.len(),
            current_index = index,
            ?outcome,
            "cascade settled"
        );
        let _ = cascade.done.send(outcome);
    }

    fn touch_session_id(&self) -> Option<u64> {
        match self.gesture.borrow().session()?.source {
            InputSource::Touch(id) => Some(id),
            InputSource::Pointer => None,
        }
    }

    fn gesture_move(&self, source: InputSource, x: f64) {
        let current_index = self.current_index.get();
        self.gesture
            .borrow_mut()
            .update(source, x, &self.pages, current_index);
    }

    fn gesture_release(&self, source: InputSource) -> Option<FlipHandle> {
        let release = self.gesture.borrow_mut().release(source, &self.pages)?;
        if let Some(turn) = release.turn() {
            self.current_index.set(turn.index_after());
            self.notify(turn);
        }
        Some(release.into_handle())
    }

    fn gesture_cancel(&self, source: InputSource) -> Option<FlipHandle> {
        self.gesture.borrow_mut().cancel(source, &self.pages)
    }

    /// Cancel the active drag, whichever page it is bound to
    fn cancel_active_gesture(&self) -> Option<FlipHandle> {
        let source = self.gesture.borrow().session()?.source;
        self.gesture_cancel(source)
    }
}

/// Page flip orchestrator for one book
pub struct Book {
    shared: Rc<BookShared>,
    scheduler: SchedulerHandle,
    config: ReaderConfig,
}

impl Book {
    /// Build a book with one page per surface, in page order
    ///
    /// All pages start unflipped and the reader is on page 0.
    pub fn new(
        scheduler: SchedulerHandle,
        config: ReaderConfig,
        surfaces: Vec<Box<dyn PageSurface>>,
    ) -> Result<Self> {
        config.validate()?;
        if surfaces.is_empty() {
            return Err(ReaderError::EmptyBook);
        }

        let total = surfaces.len();
        let params = PageParams::from_config(&config);
        let pages: Vec<PageFlip> = surfaces
            .into_iter()
            .enumerate()
            .map(|(index, surface)| {
                PageFlip::new(scheduler.clone(), index, total, surface, params)
            })
            .collect();

        tracing::debug!(
            pages = total,
            reading_direction = ?config.gesture.reading_direction,
            "book created"
        );

        Ok(Self {
            shared: Rc::new(BookShared {
                pages,
                current_index: Cell::new(0),
                gesture: RefCell::new(GestureTracker::new(config.gesture.clone())),
                listeners: RefCell::new(Vec::new()),
                cascade: RefCell::new(None),
            }),
            scheduler,
            config,
        })
    }

    pub fn config(&self) -> &ReaderConfig {
        &self.config
    }

    /// Index of the first unflipped page; `total_pages()` once every page
    /// is turned
    pub fn current_index(&self) -> usize {
        self.shared.current_index.get()
    }

    pub fn total_pages(&self) -> usize {
        self.shared.total_pages()
    }

    /// Check if a cascade is running
    pub fn is_batch_in_progress(&self) -> bool {
        self.shared.is_batch_in_progress()
    }

    pub fn page(&self, index: usize) -> Option<&PageFlip> {
        self.shared.pages.get(index)
    }

    pub fn pages(&self) -> &[PageFlip] {
        &self.shared.pages
    }

    /// Register a listener for committed page turns
    ///
    /// Called for gesture commits and for [`Book::go_next`] / [`Book::go_prev`].
    pub fn on_page_turn<F>(&self, listener: F)
    where
        F: FnMut(PageTurn) + 'static,
    {
        self.shared.listeners.borrow_mut().push(Box::new(listener));
    }

    /// Turn the current page forward
    ///
    /// Returns `None` while a cascade runs or on the last page. The current
    /// index moves as soon as the flip starts. An active drag is cancelled
    /// first and its page sent back where it started.
    pub fn go_next(&self) -> Option<FlipHandle> {
        if self.is_batch_in_progress() {
            tracing::warn!("go_next refused while a cascade is running");
            return None;
        }
        let index = self.current_index();
        let page = self.shared.pages.get(index)?;

        self.shared.cancel_active_gesture();
        self.shared.current_index.set(index + 1);
        let handle = page.flip();
        self.shared.notify(PageTurn::Flipped(index));
        Some(handle)
    }

    /// Turn the previous page back
    ///
    /// Returns `None` while a cascade runs or on the first page.
    pub fn go_prev(&self) -> Option<FlipHandle> {
        if self.is_batch_in_progress() {
            tracing::warn!("go_prev refused while a cascade is running");
            return None;
        }
        let index = self.current_index().checked_sub(1)?;
        let page = self.shared.pages.get(index)?;

        self.shared.cancel_active_gesture();
        self.shared.current_index.set(index);
        let handle = page.backward();
        self.shared.notify(PageTurn::Backward(index));
        Some(handle)
    }

    /// Cascade every turned page back to the start, last page first
    pub fn to_start(&self) -> Option<CascadeHandle> {
        self.cascade(CascadeDirection::ToStart)
    }

    /// Cascade every unturned page to the end, first page first
    pub fn to_end(&self) -> Option<CascadeHandle> {
        self.cascade(CascadeDirection::ToEnd)
    }

    fn cascade(&self, direction: CascadeDirection) -> Option<CascadeHandle> {
        if self.is_batch_in_progress() {
            tracing::warn!(?direction, "cascade refused while another is running");
            return None;
        }

        let restore_gestures = {
            let mut gesture = self.shared.gesture.borrow_mut();
            let enabled = gesture.is_enabled();
            gesture.set_enabled(false);
            enabled
        };

        let order: Vec<usize> = match direction {
            CascadeDirection::ToEnd => (0..self.total_pages())
                .filter(|&index| self.shared.pages[index].flip_percent() < 1.0)
                .collect(),
            CascadeDirection::ToStart => (0..self.total_pages())
                .rev()
                .filter(|&index| self.shared.pages[index].flip_percent() > 0.0)
                .collect(),
        };

        if order.is_empty() {
            self.shared.gesture.borrow_mut().set_enabled(restore_gestures);
            let index = match direction {
                CascadeDirection::ToStart => 0,
                CascadeDirection::ToEnd => self.total_pages(),
            };
            self.shared.current_index.set(index);
            tracing::debug!(?direction, "cascade has no pages to turn");
            return Some(CascadeHandle::ready(CascadeOutcome::Completed));
        }

        tracing::debug!(?direction, pages = order.len(), "cascade started");

        let (tx, rx) = oneshot::channel();
        *self.shared.cascade.borrow_mut() = Some(Cascade {
            direction,
            order: order.clone(),
            launched: Vec::with_capacity(order.len()),
            timers: Vec::new(),
            watcher: None,
            restore_gestures,
            done: tx,
        });

        // Page k launches k stagger delays after the cascade starts
        let stagger = self.config.cascade.stagger_delay();
        let mut timers = Vec::new();
        for (k, &index) in order.iter().enumerate() {
            if k == 0 {
                self.shared.launch_staggered(index);
                continue;
            }
            let weak: Weak<BookShared> = Rc::downgrade(&self.shared);
            let timer = self.scheduler.after(stagger * k as u32, move || {
                if let Some(shared) = weak.upgrade() {
                    shared.launch_staggered(index);
                }
            });
            match timer {
                Some(timer) => timers.push(timer),
                None => self.shared.launch_staggered(index),
            }
        }

        let weak = Rc::downgrade(&self.shared);
        let watcher = self.scheduler.on_tick(move |_frame| match weak.upgrade() {
            Some(shared) if !shared.poll_cascade() => TickControl::Continue,
            _ => TickControl::Done,
        });

        if let Some(cascade) = self.shared.cascade.borrow_mut().as_mut() {
            cascade.timers = timers;
            cascade.watcher = watcher;
        }
        if watcher.is_none() {
            // No frames will come; settle with whatever the pages resolved to
            self.shared.poll_cascade();
        }

        Some(CascadeHandle::pending(rx))
    }

    /// Check if drag gestures are accepted
    pub fn gestures_enabled(&self) -> bool {
        self.shared.gesture.borrow().is_enabled()
    }

    /// Enable or disable drag gestures
    ///
    /// Disabling mid-drag sends the dragged page back where it started.
    /// While a cascade runs gestures stay disabled; the value set here takes
    /// effect when it settles.
    pub fn set_gestures_enabled(&self, enabled: bool) {
        if let Some(cascade) = self.shared.cascade.borrow_mut().as_mut() {
            cascade.restore_gestures = enabled;
            return;
        }
        if !enabled {
            self.shared.cancel_active_gesture();
        }
        self.shared.gesture.borrow_mut().set_enabled(enabled);
        tracing::debug!(enabled, "gestures toggled");
    }

    /// Snap every page to the state for reading page `index`, without
    /// animation
    ///
    /// Pages before `index` end up turned, the rest flat. `index` may equal
    /// `total_pages()`. Listeners are not notified.
    pub fn jump_to(&self, index: usize) -> Result<()> {
        if self.is_batch_in_progress() {
            return Err(ReaderError::BatchInProgress);
        }
        let total = self.total_pages();
        if index > total {
            return Err(ReaderError::PageOutOfRange { index, total });
        }

        self.shared.gesture.borrow_mut().abandon();
        for page in &self.shared.pages {
            page.stop_flipping();
            let progress = if page.index() < index { 1.0 } else { 0.0 };
            page.set_flip_percent(true, progress);
        }
        self.shared.current_index.set(index);
        tracing::debug!(current_index = index, "jumped to page");
        Ok(())
    }

    /// Viewport width changed
    pub fn resize(&self, viewport_width: f64) {
        self.shared.gesture.borrow_mut().resize(viewport_width);
    }

    pub fn pointer_down(&self, x: f64) {
        self.shared.gesture.borrow_mut().begin(InputSource::Pointer, x);
    }

    pub fn pointer_move(&self, x: f64) {
        self.shared.gesture_move(InputSource::Pointer, x);
    }

    /// Release the pointer at `x`
    ///
    /// Returns the handle of the commit or revert animation if a page was
    /// being dragged.
    pub fn pointer_up(&self, x: f64) -> Option<FlipHandle> {
        self.shared.gesture_move(InputSource::Pointer, x);
        self.shared.gesture_release(InputSource::Pointer)
    }

    /// Abort the pointer drag, reverting the dragged page
    pub fn pointer_cancel(&self) -> Option<FlipHandle> {
        self.shared.gesture_cancel(InputSource::Pointer)
    }

    /// Touches began; only the first point of a new session is followed
    pub fn touch_start(&self, touches: &[TouchPoint]) {
        let Some(first) = touches.first() else {
            return;
        };
        self.shared
            .gesture
            .borrow_mut()
            .begin(InputSource::Touch(first.id), first.x);
    }

    /// Touches moved
    pub fn touch_move(&self, touches: &[TouchPoint]) {
        let Some(point) = self.followed_touch(touches) else {
            return;
        };
        self.shared.gesture_move(InputSource::Touch(point.id), point.x);
    }

    /// Touches lifted; `touches` are the points that ended
    pub fn touch_end(&self, touches: &[TouchPoint]) -> Option<FlipHandle> {
        let point = self.followed_touch(touches)?;
        let source = InputSource::Touch(point.id);
        self.shared.gesture_move(source, point.x);
        self.shared.gesture_release(source)
    }

    /// Touches cancelled; `touches` are the points that were cancelled
    pub fn touch_cancel(&self, touches: &[TouchPoint]) -> Option<FlipHandle> {
        let point = self.followed_touch(touches)?;
        self.shared.gesture_cancel(InputSource::Touch(point.id))
    }

    fn followed_touch(&self, touches: &[TouchPoint]) -> Option<TouchPoint> {
        let id = self.shared.touch_session_id()?;
        touches.iter().copied().find(|point| point.id == id)
    }
}

impl Drop for Book {
    fn drop(&mut self) {
        let Some(cascade) = self.shared.cascade.borrow_mut().take() else {
            return;
        };
        for timer in cascade.timers {
            self.scheduler.cancel_timer(timer);
        }
        if let Some(watcher) = cascade.watcher {
            self.scheduler.remove_tick(watcher);
        }
        tracing::debug!(direction = ?cascade.direction, "book dropped during cascade");
    }
}

impl std::fmt::Debug for Book {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Book")
            .field("pages", &self.total_pages())
            .field("current_index", &self.current_index())
            .field("batch_in_progress", &self.is_batch_in_progress())
            .field("gestures_enabled", &self.gestures_enabled())
            .finish()
    }
}
