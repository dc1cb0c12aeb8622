//! Drag gesture to flip progress mapping
//!
//! A [`GestureTracker`] follows one pointer or touch stream at a time:
//!
//! ```text
//! Idle ──down──▶ Dragging ──move (≥ threshold)──▶ bind page, set progress
//!                   │
//!                   └──up──▶ commit or revert ──▶ Idle
//! ```
//!
//! The page is bound on the first accepted move: a forward drag takes the
//! current page, a backward drag the one before it. Whether the page bends as
//! a forward or backward flip is decided once, at bind time, from where its
//! progress started, and does not follow later changes of drag direction.

use crate::config::GestureConfig;
use crate::page::{FlipHandle, PageFlip};

/// A page turn that a gesture or navigation call committed to
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PageTurn {
    /// Page turned onto the flipped stack
    Flipped(usize),
    /// Page turned back onto the unflipped stack
    Backward(usize),
}

impl PageTurn {
    /// Index of the page that turned
    pub fn page(self) -> usize {
        match self {
            PageTurn::Flipped(index) | PageTurn::Backward(index) => index,
        }
    }

    /// The book's current page index once this turn lands
    pub fn index_after(self) -> usize {
        match self {
            PageTurn::Flipped(index) => index + 1,
            PageTurn::Backward(index) => index,
        }
    }
}

/// Which input stream a session follows
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InputSource {
    Pointer,
    /// A touch point, by identifier
    Touch(u64),
}

/// One active touch point
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TouchPoint {
    pub id: u64,
    pub x: f64,
}

/// Drag direction relative to the reading direction
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DragDirection {
    Forward,
    Backward,
}

/// State of one press-drag-release interaction
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GestureSession {
    pub source: InputSource,
    pub start_x: f64,
    pub last_x: f64,
    /// Progress of the bound page when it was bound
    pub start_progress: f64,
    pub target_page: Option<usize>,
    pub direction: Option<DragDirection>,
}

/// What releasing a bound drag did
#[derive(Debug)]
pub enum GestureRelease {
    /// The drag fell short; the page animates back where it started
    Reverted { page: usize, handle: FlipHandle },
    /// The drag passed the commit threshold; the page completes its turn
    Committed { turn: PageTurn, handle: FlipHandle },
}

impl GestureRelease {
    pub fn page(&self) -> usize {
        match self {
            GestureRelease::Reverted { page, .. } => *page,
            GestureRelease::Committed { turn, .. } => turn.page(),
        }
    }

    pub fn turn(&self) -> Option<PageTurn> {
        match self {
            GestureRelease::Reverted { .. } => None,
            GestureRelease::Committed { turn, .. } => Some(*turn),
        }
    }

    pub fn into_handle(self) -> FlipHandle {
        match self {
            GestureRelease::Reverted { handle, .. } | GestureRelease::Committed { handle, .. } => {
                handle
            }
        }
    }
}

/// Maps drags onto page flip progress
#[derive(Debug)]
pub struct GestureTracker {
    config: GestureConfig,
    move_total_distance: f64,
    enabled: bool,
    session: Option<GestureSession>,
}

impl GestureTracker {
    pub fn new(config: GestureConfig) -> Self {
        let move_total_distance = config.move_total_distance(config.viewport_width);
        Self {
            config,
            move_total_distance,
            enabled: true,
            session: None,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Enable or disable new sessions
    ///
    /// Disabling abandons an active session where it is and returns it.
    pub fn set_enabled(&mut self, enabled: bool) -> Option<GestureSession> {
        self.enabled = enabled;
        if enabled {
            None
        } else {
            self.abandon()
        }
    }

    pub fn session(&self) -> Option<&GestureSession> {
        self.session.as_ref()
    }

    pub fn is_active(&self) -> bool {
        self.session.is_some()
    }

    /// Drag distance that maps to a full flip
    pub fn move_total_distance(&self) -> f64 {
        self.move_total_distance
    }

    /// Recompute the full-flip drag distance for a new viewport width
    pub fn resize(&mut self, viewport_width: f64) {
        self.move_total_distance = self.config.move_total_distance(viewport_width);
        tracing::trace!(
            viewport_width,
            distance = self.move_total_distance,
            "gesture distance resized"
        );
    }

    /// Start a session on press
    ///
    /// Ignored while disabled or while another session is active.
    pub fn begin(&mut self, source: InputSource, x: f64) -> bool {
        if !self.enabled || self.session.is_some() {
            return false;
        }
        self.session = Some(GestureSession {
            source,
            start_x: x,
            last_x: x,
            start_progress: 0.0,
            target_page: None,
            direction: None,
        });
        true
    }

    /// Feed a move sample
    ///
    /// Samples closer than the move threshold to the last accepted one are
    /// dropped. The first accepted sample binds a page; if the page it would
    /// bind does not exist, the sample has no effect.
    pub fn update(
        &mut self,
        source: InputSource,
        x: f64,
        pages: &[PageFlip],
        current_index: usize,
    ) {
        let threshold = self.config.move_threshold_px;
        let reading = self.config.reading_direction;
        let forward_bias = self.config.forward_bias;
        let distance = self.move_total_distance;

        let Some(session) = self.session.as_mut() else {
            return;
        };
        if session.source != source {
            return;
        }

        let delta = x - session.last_x;
        if delta.abs() < threshold {
            return;
        }
        session.last_x = x;

        let direction = if reading.forward_offset(delta) > 0.0 {
            DragDirection::Forward
        } else {
            DragDirection::Backward
        };
        session.direction = Some(direction);

        let index = match session.target_page {
            Some(index) => index,
            None => {
                let candidate = match direction {
                    DragDirection::Forward => Some(current_index),
                    DragDirection::Backward => current_index.checked_sub(1),
                };
                let Some(index) = candidate.filter(|&index| index < pages.len()) else {
                    tracing::trace!(current_index, ?direction, "no page to bind for drag");
                    return;
                };
                let page = &pages[index];
                page.stop_flipping();
                session.start_progress = page.flip_percent();
                session.target_page = Some(index);
                tracing::debug!(
                    page = index,
                    mesh = ?page.mesh(),
                    ?direction,
                    start_progress = session.start_progress,
                    "drag bound to page"
                );
                index
            }
        };

        let move_percent = reading.forward_offset(x - session.start_x) / distance;
        let percent = (session.start_progress + move_percent).clamp(0.0, 1.0);
        pages[index].set_flip_percent(session.start_progress <= forward_bias, percent);
    }

    /// End the session on release
    ///
    /// If a page was bound, it either completes the turn (when progress moved
    /// at least the commit threshold) or animates back to where it started.
    pub fn release(&mut self, source: InputSource, pages: &[PageFlip]) -> Option<GestureRelease> {
        if self.session.as_ref()?.source != source {
            return None;
        }
        let session = self.session.take()?;
        let index = session.target_page?;
        let page = pages.get(index)?;

        let moved = (page.flip_percent() - session.start_progress).abs();
        let origin = if session.start_progress < 0.5 { 0.0 } else { 1.0 };
        let is_forward = session.start_progress <= self.config.forward_bias;

        if moved < self.config.commit_threshold {
            tracing::debug!(page = index, moved, "drag released short, reverting");
            let handle = page.flip_from_current_percent(is_forward, origin);
            return Some(GestureRelease::Reverted {
                page: index,
                handle,
            });
        }

        let target = 1.0 - origin;
        let turn = if target >= 1.0 {
            PageTurn::Flipped(index)
        } else {
            PageTurn::Backward(index)
        };
        tracing::debug!(page = index, moved, ?turn, "drag committed");
        let handle = page.flip_from_current_percent(is_forward, target);
        Some(GestureRelease::Committed { turn, handle })
    }

    /// End the session without committing
    ///
    /// A bound page animates back to where it started.
    pub fn cancel(&mut self, source: InputSource, pages: &[PageFlip]) -> Option<FlipHandle> {
        if self.session.as_ref()?.source != source {
            return None;
        }
        let session = self.session.take()?;
        let index = session.target_page?;
        let page = pages.get(index)?;

        let origin = if session.start_progress < 0.5 { 0.0 } else { 1.0 };
        let is_forward = session.start_progress <= self.config.forward_bias;
        tracing::debug!(page = index, "drag cancelled, reverting");
        Some(page.flip_from_current_percent(is_forward, origin))
    }

    /// Drop the session without touching its page
    pub fn abandon(&mut self) -> Option<GestureSession> {
        let session = self.session.take();
        if let Some(session) = &session {
            tracing::debug!(page = ?session.target_page, "drag abandoned");
        }
        session
    }
}
