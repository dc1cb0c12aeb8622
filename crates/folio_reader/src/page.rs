//! Page flip state controller
//!
//! A [`PageFlip`] owns one page's flip progress and its [`PageSurface`].
//! Progress is written either directly ([`PageFlip::set_flip_percent`], used
//! by drags) or by an eased animation run played on the frame scheduler.
//!
//! Each page has at most one animation run. Starting a run cancels the
//! previous one first, so the newest request always wins and a cancelled run
//! never writes again.

use crate::config::ReaderConfig;
use crate::surface::{bend_force, MeshHandle, PageSurface, SpatialState};
use folio_animation::{
    scaled_steps, tween, CubicBezier, SchedulerHandle, Tween, TweenHandle, REFERENCE_FPS,
};
use std::cell::RefCell;
use std::future::Future;
use std::pin::Pin;
use std::rc::Rc;
use std::task::{Context, Poll};
use tokio::sync::oneshot;
use tokio::sync::oneshot::error::TryRecvError;

/// Per-page animation parameters
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PageParams {
    /// Frames a full flip takes at 60fps
    pub flip_steps: u32,
    pub bend_damping: f64,
    pub depth_offset: f64,
    pub curve: CubicBezier,
}

impl PageParams {
    pub fn from_config(config: &ReaderConfig) -> Self {
        Self {
            flip_steps: config.flip_steps,
            bend_damping: config.bend_damping,
            depth_offset: config.page_depth_offset,
            curve: config.curve(),
        }
    }
}

impl Default for PageParams {
    fn default() -> Self {
        Self::from_config(&ReaderConfig::default())
    }
}

/// How a flip request ended
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FlipOutcome {
    /// The animation reached its target
    Completed,
    /// The page was already at the target; nothing was animated
    AlreadyAtTarget,
    /// A newer request or `stop_flipping` interrupted the animation
    Cancelled,
}

/// Completion of a flip request
///
/// Await it, or poll it without blocking via [`FlipHandle::try_outcome`].
/// Dropping the handle does not stop the animation.
#[derive(Debug)]
pub struct FlipHandle {
    rx: Option<oneshot::Receiver<FlipOutcome>>,
    outcome: Option<FlipOutcome>,
}

impl FlipHandle {
    fn pending(rx: oneshot::Receiver<FlipOutcome>) -> Self {
        Self {
            rx: Some(rx),
            outcome: None,
        }
    }

    pub(crate) fn ready(outcome: FlipOutcome) -> Self {
        Self {
            rx: None,
            outcome: Some(outcome),
        }
    }

    /// The outcome, if the request has settled
    pub fn try_outcome(&mut self) -> Option<FlipOutcome> {
        if self.outcome.is_none() {
            if let Some(rx) = self.rx.as_mut() {
                match rx.try_recv() {
                    Ok(outcome) => self.outcome = Some(outcome),
                    Err(TryRecvError::Closed) => self.outcome = Some(FlipOutcome::Cancelled),
                    Err(TryRecvError::Empty) => {}
                }
            }
        }
        self.outcome
    }

    pub fn is_settled(&mut self) -> bool {
        self.try_outcome().is_some()
    }
}

impl Future for FlipHandle {
    type Output = FlipOutcome;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        if let Some(outcome) = this.outcome {
            return Poll::Ready(outcome);
        }
        let Some(rx) = this.rx.as_mut() else {
            return Poll::Ready(FlipOutcome::Cancelled);
        };
        match Pin::new(rx).poll(cx) {
            Poll::Ready(result) => {
                let outcome = result.unwrap_or(FlipOutcome::Cancelled);
                this.outcome = Some(outcome);
                Poll::Ready(outcome)
            }
            Poll::Pending => Poll::Pending,
        }
    }
}

/// The in-flight animation of one page
struct AnimationRun {
    id: u64,
    start: f64,
    end: f64,
    steps: usize,
    tween: TweenHandle,
    done: oneshot::Sender<FlipOutcome>,
}

impl AnimationRun {
    fn cancel(self) {
        self.tween.cancel();
        let _ = self.done.send(FlipOutcome::Cancelled);
    }

    fn complete(self) {
        let _ = self.done.send(FlipOutcome::Completed);
    }
}

struct PageInner {
    index: usize,
    total: usize,
    progress: f64,
    is_forward: bool,
    params: PageParams,
    surface: Box<dyn PageSurface>,
    run: Option<AnimationRun>,
    next_run_id: u64,
}

impl PageInner {
    fn write_progress(&mut self, is_forward: bool, percent: f64) {
        self.progress = clamp_progress(percent);
        self.is_forward = is_forward;

        let force = bend_force(self.progress, is_forward, self.params.bend_damping);
        let spatial = self.spatial_state();
        self.surface.set_bend_force(force);
        self.surface.set_transform(spatial);
        self.surface.apply();
    }

    fn spatial_state(&self) -> SpatialState {
        SpatialState::from_progress(
            self.progress,
            self.index,
            self.total,
            self.params.depth_offset,
        )
    }
}

/// Flip state controller for one page
pub struct PageFlip {
    inner: Rc<RefCell<PageInner>>,
    scheduler: SchedulerHandle,
}

impl PageFlip {
    /// Create page `index` of `total`, lying flat on the unflipped stack
    ///
    /// The surface is placed at its resting transform immediately.
    pub fn new(
        scheduler: SchedulerHandle,
        index: usize,
        total: usize,
        surface: Box<dyn PageSurface>,
        params: PageParams,
    ) -> Self {
        let mut inner = PageInner {
            index,
            total,
            progress: 0.0,
            is_forward: true,
            params,
            surface,
            run: None,
            next_run_id: 0,
        };
        inner.write_progress(true, 0.0);

        Self {
            inner: Rc::new(RefCell::new(inner)),
            scheduler,
        }
    }

    pub fn index(&self) -> usize {
        self.inner.borrow().index
    }

    pub fn mesh(&self) -> MeshHandle {
        self.inner.borrow().surface.mesh()
    }

    /// Current flip progress in [0, 1]
    pub fn flip_percent(&self) -> f64 {
        self.inner.borrow().progress
    }

    /// Bend force for the current progress and direction
    pub fn bend_force(&self) -> f64 {
        let inner = self.inner.borrow();
        bend_force(inner.progress, inner.is_forward, inner.params.bend_damping)
    }

    /// Rotation and depth for the current progress
    pub fn spatial_state(&self) -> SpatialState {
        self.inner.borrow().spatial_state()
    }

    /// Check if an animation run is in flight
    pub fn is_animating(&self) -> bool {
        self.inner.borrow().run.is_some()
    }

    /// Target of the in-flight animation run
    pub fn animation_target(&self) -> Option<f64> {
        self.inner.borrow().run.as_ref().map(|run| run.end)
    }

    /// Set progress directly and push the result to the surface
    ///
    /// `percent` is clamped to [0, 1] (NaN counts as 0). Does not cancel an
    /// in-flight animation; call [`PageFlip::stop_flipping`] first when taking
    /// over a page.
    pub fn set_flip_percent(&self, is_forward: bool, percent: f64) {
        self.inner.borrow_mut().write_progress(is_forward, percent);
    }

    /// Animate to fully turned
    pub fn flip(&self) -> FlipHandle {
        self.flip_from_current_percent(true, 1.0)
    }

    /// Animate back to flat
    pub fn backward(&self) -> FlipHandle {
        self.flip_from_current_percent(false, 0.0)
    }

    /// Animate from the current progress to `target`
    ///
    /// Any in-flight run is cancelled first. The step count covers the
    /// remaining distance at the measured frame rate. When the page is
    /// already at `target` the handle resolves immediately with
    /// [`FlipOutcome::AlreadyAtTarget`] and no frames are scheduled.
    pub fn flip_from_current_percent(&self, is_forward: bool, target: f64) -> FlipHandle {
        let target = clamp_progress(target);
        self.stop_flipping();

        let (index, start, params) = {
            let inner = self.inner.borrow();
            (inner.index, inner.progress, inner.params)
        };

        if (start - target).abs() <= f64::EPSILON {
            tracing::trace!(page = index, to = target, "flip requested at current progress");
            return FlipHandle::ready(FlipOutcome::AlreadyAtTarget);
        }

        let fps = self.scheduler.fps().unwrap_or(REFERENCE_FPS);
        let steps = scaled_steps(params.flip_steps, fps, target - start);
        let run_id = {
            let mut inner = self.inner.borrow_mut();
            inner.next_run_id += 1;
            inner.next_run_id
        };

        let weak = Rc::downgrade(&self.inner);
        let playback = tween::play(
            &self.scheduler,
            Tween::new(&params.curve, start, target, steps),
            move |value, is_last| {
                let Some(inner) = weak.upgrade() else {
                    return;
                };
                let mut inner = inner.borrow_mut();
                if inner.run.as_ref().map(|run| run.id) != Some(run_id) {
                    return;
                }
                tracing::trace!(page = inner.index, value, "flip frame");
                inner.write_progress(is_forward, value);
                if is_last {
                    if let Some(run) = inner.run.take() {
                        tracing::debug!(page = inner.index, to = run.end, "flip run completed");
                        run.complete();
                    }
                }
            },
        );

        let Some(playback) = playback else {
            tracing::warn!(page = index, "frame scheduler is gone, flip not started");
            return FlipHandle::ready(FlipOutcome::Cancelled);
        };

        tracing::debug!(
            page = index,
            from = start,
            to = target,
            steps,
            fps,
            "starting flip run"
        );

        let (tx, rx) = oneshot::channel();
        self.inner.borrow_mut().run = Some(AnimationRun {
            id: run_id,
            start,
            end: target,
            steps,
            tween: playback,
            done: tx,
        });
        FlipHandle::pending(rx)
    }

    /// Cancel the in-flight animation, leaving progress where it is
    ///
    /// Returns true if a run was cancelled. Its handle resolves to
    /// [`FlipOutcome::Cancelled`].
    pub fn stop_flipping(&self) -> bool {
        let run = self.inner.borrow_mut().run.take();
        match run {
            Some(run) => {
                tracing::debug!(
                    page = self.index(),
                    from = run.start,
                    to = run.end,
                    steps = run.steps,
                    at = self.flip_percent(),
                    "cancelled flip run"
                );
                run.cancel();
                true
            }
            None => false,
        }
    }
}

impl Drop for PageFlip {
    fn drop(&mut self) {
        self.stop_flipping();
    }
}

impl std::fmt::Debug for PageFlip {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.borrow();
        f.debug_struct("PageFlip")
            .field("index", &inner.index)
            .field("mesh", &inner.surface.mesh())
            .field("progress", &inner.progress)
            .field("animating", &inner.run.is_some())
            .finish()
    }
}

fn clamp_progress(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}
