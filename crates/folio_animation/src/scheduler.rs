//! Frame scheduler
//!
//! The frame clock that drives every frame-stepped animation. Hosts call
//! [`FrameScheduler::tick`] once per display frame on a monotonic clock, or
//! build the scheduler with [`FrameScheduler::with_virtual_clock`] and call
//! [`FrameScheduler::advance`] with a time step in tests and headless runs.
//! Each frame the scheduler:
//!
//! 1. samples the frame rate,
//! 2. fires one-shot timers whose due time has passed, in due order,
//! 3. invokes every tick callback that was registered before the frame began.
//!
//! Everything runs on one thread. Callbacks are taken out of the scheduler
//! while they run, so they may freely register or remove other callbacks and
//! timers through a [`SchedulerHandle`].

use crate::sampler::FrameRateSampler;
use slotmap::{new_key_type, SlotMap};
use std::cell::RefCell;
use std::rc::{Rc, Weak};
use std::time::{Duration, Instant};

new_key_type! {
    /// Handle to a registered per-frame callback
    pub struct TickCallbackId;
    /// Handle to a pending one-shot timer
    pub struct TimerId;
}

/// Returned by tick callbacks to stay subscribed or unsubscribe
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TickControl {
    Continue,
    Done,
}

/// Information about the frame being delivered
#[derive(Clone, Copy, Debug)]
pub struct FrameInfo {
    /// Frame counter, starting at 1 for the first frame
    pub frame: u64,
    /// Clock time of this frame
    pub now: Duration,
    /// Time since the previous frame
    pub delta: Duration,
    /// Measured frames-per-second
    pub fps: f64,
}

/// Callback invoked once per frame
pub type TickCallback = Box<dyn FnMut(&FrameInfo) -> TickControl>;

type TimerCallback = Box<dyn FnOnce()>;

struct TickEntry {
    // None while the callback is running
    callback: Option<TickCallback>,
}

struct TimerEntry {
    due: Duration,
    seq: u64,
    callback: Option<TimerCallback>,
}

/// Where clock time comes from
#[derive(Clone, Copy, Debug)]
enum Clock {
    /// Wall time since the scheduler was created
    Monotonic(Instant),
    /// Time moves only when frames are delivered
    Virtual,
}

struct SchedulerInner {
    clock: Clock,
    ticks: SlotMap<TickCallbackId, TickEntry>,
    timers: SlotMap<TimerId, TimerEntry>,
    sampler: FrameRateSampler,
    now: Duration,
    frame: u64,
    timer_seq: u64,
}

impl SchedulerInner {
    fn add_tick(&mut self, callback: TickCallback) -> TickCallbackId {
        self.ticks.insert(TickEntry {
            callback: Some(callback),
        })
    }

    /// Current clock time
    ///
    /// On the monotonic clock this keeps moving between frames, so work
    /// scheduled after the host has stopped ticking is measured from when it
    /// was requested, not from the last frame.
    fn clock_time(&self) -> Duration {
        match self.clock {
            Clock::Monotonic(origin) => self.now.max(origin.elapsed()),
            Clock::Virtual => self.now,
        }
    }

    fn add_timer(&mut self, delay: Duration, callback: TimerCallback) -> TimerId {
        self.timer_seq += 1;
        let due = self.clock_time() + delay;
        let seq = self.timer_seq;
        self.timers.insert(TimerEntry {
            due,
            seq,
            callback: Some(callback),
        })
    }

    fn has_active(&self) -> bool {
        !self.ticks.is_empty() || !self.timers.is_empty()
    }
}

/// The frame clock
///
/// Owns all tick subscriptions and timers. Components hold a
/// [`SchedulerHandle`], which stops doing anything once the scheduler is
/// dropped.
///
/// ```
/// use folio_animation::{FrameScheduler, TickControl};
/// use std::time::Duration;
///
/// let scheduler = FrameScheduler::with_virtual_clock();
/// let handle = scheduler.handle();
///
/// let mut frames = 0;
/// handle.on_tick(move |_| {
///     frames += 1;
///     if frames == 3 { TickControl::Done } else { TickControl::Continue }
/// });
///
/// for _ in 0..3 {
///     scheduler.advance(Duration::from_millis(16));
/// }
/// assert!(!scheduler.has_active());
/// ```
pub struct FrameScheduler {
    inner: Rc<RefCell<SchedulerInner>>,
}

impl FrameScheduler {
    /// Create a scheduler on the monotonic clock, driven by [`FrameScheduler::tick`]
    pub fn new() -> Self {
        Self::with_clock(Clock::Monotonic(Instant::now()))
    }

    /// Create a scheduler whose time only moves through
    /// [`FrameScheduler::advance`] and [`FrameScheduler::tick_at`]
    pub fn with_virtual_clock() -> Self {
        Self::with_clock(Clock::Virtual)
    }

    fn with_clock(clock: Clock) -> Self {
        Self {
            inner: Rc::new(RefCell::new(SchedulerInner {
                clock,
                ticks: SlotMap::with_key(),
                timers: SlotMap::with_key(),
                sampler: FrameRateSampler::new(),
                now: Duration::ZERO,
                frame: 0,
                timer_seq: 0,
            })),
        }
    }

    /// Get a handle to this scheduler for passing to components
    pub fn handle(&self) -> SchedulerHandle {
        SchedulerHandle {
            inner: Rc::downgrade(&self.inner),
        }
    }

    /// Run one frame at the current clock time
    ///
    /// On a virtual clock this repeats the previous frame time. Returns true
    /// if callbacks or timers are still pending.
    pub fn tick(&self) -> bool {
        let now = self.inner.borrow().clock_time();
        self.tick_at(now)
    }

    /// Run one frame `delta` after the previous one
    ///
    /// This is the virtual clock: nothing depends on wall time, so tests and
    /// headless hosts get fully deterministic playback.
    pub fn advance(&self, delta: Duration) -> bool {
        let now = self.inner.borrow().now + delta;
        self.tick_at(now)
    }

    /// Run one frame at clock time `now`
    ///
    /// Time never moves backwards; an earlier `now` is treated as a repeat of
    /// the previous frame time.
    pub fn tick_at(&self, now: Duration) -> bool {
        let info = {
            let mut inner = self.inner.borrow_mut();
            let now = now.max(inner.now);
            let delta = now - inner.now;
            inner.now = now;
            inner.frame += 1;
            inner.sampler.sample(now);
            FrameInfo {
                frame: inner.frame,
                now,
                delta,
                fps: inner.sampler.fps(),
            }
        };

        // Callbacks registered from here on, timers included, wait a frame
        let ids: Vec<TickCallbackId> = self.inner.borrow().ticks.keys().collect();
        self.fire_due_timers(info.now);
        self.run_tick_callbacks(ids, &info);

        let inner = self.inner.borrow();
        if info.frame % 120 == 0 {
            tracing::trace!(
                frame = info.frame,
                fps = info.fps,
                ticks = inner.ticks.len(),
                timers = inner.timers.len(),
                "frame scheduler heartbeat"
            );
        }
        inner.has_active()
    }

    fn fire_due_timers(&self, now: Duration) {
        let mut due: Vec<(Duration, u64, TimerId)> = self
            .inner
            .borrow()
            .timers
            .iter()
            .filter(|(_, timer)| timer.due <= now)
            .map(|(id, timer)| (timer.due, timer.seq, id))
            .collect();
        due.sort_by(|a, b| a.0.cmp(&b.0).then(a.1.cmp(&b.1)));

        for (_, _, id) in due {
            // A timer fired earlier in this frame may have cancelled this one
            let callback = self
                .inner
                .borrow_mut()
                .timers
                .remove(id)
                .and_then(|mut timer| timer.callback.take());
            if let Some(callback) = callback {
                callback();
            }
        }
    }

    fn run_tick_callbacks(&self, ids: Vec<TickCallbackId>, info: &FrameInfo) {
        for id in ids {
            let callback = self
                .inner
                .borrow_mut()
                .ticks
                .get_mut(id)
                .and_then(|entry| entry.callback.take());
            let Some(mut callback) = callback else {
                continue;
            };

            let control = callback(info);

            let mut inner = self.inner.borrow_mut();
            match control {
                TickControl::Continue => {
                    // Removed while running: drop the callback
                    if let Some(entry) = inner.ticks.get_mut(id) {
                        entry.callback = Some(callback);
                    }
                }
                TickControl::Done => {
                    inner.ticks.remove(id);
                }
            }
        }
    }

    /// Check if any tick callbacks or timers are pending
    pub fn has_active(&self) -> bool {
        self.inner.borrow().has_active()
    }

    /// Clock time of the most recent frame
    pub fn now(&self) -> Duration {
        self.inner.borrow().now
    }

    /// Number of frames delivered so far
    pub fn frame(&self) -> u64 {
        self.inner.borrow().frame
    }

    /// Measured frames-per-second
    pub fn fps(&self) -> f64 {
        self.inner.borrow().sampler.fps()
    }

    /// Get the number of registered tick callbacks
    pub fn tick_count(&self) -> usize {
        self.inner.borrow().ticks.len()
    }

    /// Get the number of pending timers
    pub fn timer_count(&self) -> usize {
        self.inner.borrow().timers.len()
    }
}

impl Default for FrameScheduler {
    fn default() -> Self {
        Self::new()
    }
}

/// Weak handle to a [`FrameScheduler`]
///
/// Cheap to clone. Every operation is a no-op (returning `None` where a value
/// is expected) once the scheduler has been dropped.
#[derive(Clone)]
pub struct SchedulerHandle {
    inner: Weak<RefCell<SchedulerInner>>,
}

impl SchedulerHandle {
    /// Subscribe `callback` to every frame until it returns [`TickControl::Done`]
    ///
    /// Callbacks registered while a frame is running first run on the next
    /// frame.
    pub fn on_tick<F>(&self, callback: F) -> Option<TickCallbackId>
    where
        F: FnMut(&FrameInfo) -> TickControl + 'static,
    {
        let inner = self.inner.upgrade()?;
        let id = inner.borrow_mut().add_tick(Box::new(callback));
        Some(id)
    }

    /// Unsubscribe a tick callback
    pub fn remove_tick(&self, id: TickCallbackId) {
        if let Some(inner) = self.inner.upgrade() {
            inner.borrow_mut().ticks.remove(id);
        }
    }

    /// Check if a tick callback is still subscribed
    pub fn is_tick_registered(&self, id: TickCallbackId) -> bool {
        self.inner
            .upgrade()
            .map(|inner| inner.borrow().ticks.contains_key(id))
            .unwrap_or(false)
    }

    /// Run `callback` on the first frame at least `delay` after the current
    /// clock time
    pub fn after<F>(&self, delay: Duration, callback: F) -> Option<TimerId>
    where
        F: FnOnce() + 'static,
    {
        let inner = self.inner.upgrade()?;
        let id = inner.borrow_mut().add_timer(delay, Box::new(callback));
        Some(id)
    }

    /// Cancel a pending timer
    pub fn cancel_timer(&self, id: TimerId) {
        if let Some(inner) = self.inner.upgrade() {
            inner.borrow_mut().timers.remove(id);
        }
    }

    /// Clock time of the most recent frame
    pub fn now(&self) -> Option<Duration> {
        self.inner.upgrade().map(|inner| inner.borrow().now)
    }

    /// Measured frames-per-second
    pub fn fps(&self) -> Option<f64> {
        self.inner.upgrade().map(|inner| inner.borrow().sampler.fps())
    }

    /// Check if the scheduler is still alive
    pub fn is_alive(&self) -> bool {
        self.inner.strong_count() > 0
    }
}

impl std::fmt::Debug for SchedulerHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SchedulerHandle")
            .field("alive", &self.is_alive())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    const FRAME: Duration = Duration::from_millis(16);

    #[test]
    fn test_tick_callback_runs_each_frame() {
        let scheduler = FrameScheduler::with_virtual_clock();
        let handle = scheduler.handle();
        let count = Rc::new(Cell::new(0));

        let seen = Rc::clone(&count);
        handle.on_tick(move |_| {
            seen.set(seen.get() + 1);
            TickControl::Continue
        });

        for _ in 0..5 {
            scheduler.advance(FRAME);
        }
        assert_eq!(count.get(), 5);
        assert_eq!(scheduler.tick_count(), 1);
    }

    #[test]
    fn test_done_unsubscribes() {
        let scheduler = FrameScheduler::with_virtual_clock();
        let handle = scheduler.handle();
        let count = Rc::new(Cell::new(0));

        let seen = Rc::clone(&count);
        handle.on_tick(move |_| {
            seen.set(seen.get() + 1);
            if seen.get() == 2 {
                TickControl::Done
            } else {
                TickControl::Continue
            }
        });

        assert!(scheduler.advance(FRAME));
        assert!(!scheduler.advance(FRAME));
        scheduler.advance(FRAME);
        assert_eq!(count.get(), 2);
    }

    #[test]
    fn test_remove_tick() {
        let scheduler = FrameScheduler::with_virtual_clock();
        let handle = scheduler.handle();
        let count = Rc::new(Cell::new(0));

        let seen = Rc::clone(&count);
        let id = handle
            .on_tick(move |_| {
                seen.set(seen.get() + 1);
                TickControl::Continue
            })
            .unwrap();

        scheduler.advance(FRAME);
        handle.remove_tick(id);
        assert!(!handle.is_tick_registered(id));
        scheduler.advance(FRAME);
        assert_eq!(count.get(), 1);
    }

    #[test]
    fn test_callback_can_remove_itself() {
        let scheduler = FrameScheduler::with_virtual_clock();
        let handle = scheduler.handle();
        let own_id: Rc<Cell<Option<TickCallbackId>>> = Rc::new(Cell::new(None));
        let count = Rc::new(Cell::new(0));

        let id_slot = Rc::clone(&own_id);
        let seen = Rc::clone(&count);
        let inner_handle = handle.clone();
        let id = handle
            .on_tick(move |_| {
                seen.set(seen.get() + 1);
                if let Some(id) = id_slot.get() {
                    inner_handle.remove_tick(id);
                }
                TickControl::Continue
            })
            .unwrap();
        own_id.set(Some(id));

        scheduler.advance(FRAME);
        scheduler.advance(FRAME);
        assert_eq!(count.get(), 1);
        assert_eq!(scheduler.tick_count(), 0);
    }

    #[test]
    fn test_registration_during_frame_runs_next_frame() {
        let scheduler = FrameScheduler::with_virtual_clock();
        let handle = scheduler.handle();
        let frames_seen: Rc<RefCell<Vec<u64>>> = Rc::new(RefCell::new(Vec::new()));

        let inner_handle = handle.clone();
        let log = Rc::clone(&frames_seen);
        handle.on_tick(move |_| {
            let log = Rc::clone(&log);
            inner_handle.on_tick(move |frame| {
                log.borrow_mut().push(frame.frame);
                TickControl::Done
            });
            TickControl::Done
        });

        scheduler.advance(FRAME);
        assert!(frames_seen.borrow().is_empty());
        scheduler.advance(FRAME);
        assert_eq!(*frames_seen.borrow(), vec![2]);
    }

    #[test]
    fn test_timer_fires_after_delay() {
        let scheduler = FrameScheduler::with_virtual_clock();
        let handle = scheduler.handle();
        let fired_at: Rc<Cell<Option<Duration>>> = Rc::new(Cell::new(None));

        let slot = Rc::clone(&fired_at);
        let clock = handle.clone();
        handle.after(Duration::from_millis(60), move || {
            slot.set(clock.now());
        });

        for _ in 0..3 {
            scheduler.advance(FRAME);
        }
        assert!(fired_at.get().is_none());

        scheduler.advance(FRAME);
        assert_eq!(fired_at.get(), Some(Duration::from_millis(64)));
        assert_eq!(scheduler.timer_count(), 0);
    }

    #[test]
    fn test_timers_fire_in_due_order() {
        let scheduler = FrameScheduler::with_virtual_clock();
        let handle = scheduler.handle();
        let order: Rc<RefCell<Vec<u32>>> = Rc::new(RefCell::new(Vec::new()));

        for (label, delay) in [(3, 30), (1, 10), (2, 20), (4, 30)] {
            let order = Rc::clone(&order);
            handle.after(Duration::from_millis(delay), move || {
                order.borrow_mut().push(label);
            });
        }

        scheduler.advance(Duration::from_millis(100));
        assert_eq!(*order.borrow(), vec![1, 2, 3, 4]);
    }

    #[test]
    fn test_cancel_timer() {
        let scheduler = FrameScheduler::with_virtual_clock();
        let handle = scheduler.handle();
        let fired = Rc::new(Cell::new(false));

        let flag = Rc::clone(&fired);
        let id = handle
            .after(Duration::from_millis(10), move || flag.set(true))
            .unwrap();
        handle.cancel_timer(id);

        scheduler.advance(Duration::from_millis(20));
        assert!(!fired.get());
    }

    #[test]
    fn test_clock_is_monotonic() {
        let scheduler = FrameScheduler::with_virtual_clock();
        scheduler.tick_at(Duration::from_millis(100));
        scheduler.tick_at(Duration::from_millis(50));
        assert_eq!(scheduler.now(), Duration::from_millis(100));
        assert_eq!(scheduler.frame(), 2);
    }

    #[test]
    fn test_fps_follows_virtual_clock() {
        let scheduler = FrameScheduler::with_virtual_clock();
        scheduler.advance(Duration::from_millis(8));
        scheduler.advance(Duration::from_millis(8));
        assert!((scheduler.fps() - 125.0).abs() < 1e-6);
    }

    #[test]
    fn test_timer_delay_counts_from_request_on_monotonic_clock() {
        let scheduler = FrameScheduler::new();
        let handle = scheduler.handle();
        scheduler.tick();

        // The host stops ticking while nothing is pending
        std::thread::sleep(Duration::from_millis(200));

        let fired = Rc::new(Cell::new(false));
        let flag = Rc::clone(&fired);
        handle.after(Duration::from_millis(150), move || flag.set(true));

        scheduler.tick();
        assert!(!fired.get());
        assert_eq!(scheduler.timer_count(), 1);
    }

    #[test]
    fn test_virtual_clock_ignores_wall_time() {
        let scheduler = FrameScheduler::with_virtual_clock();
        std::thread::sleep(Duration::from_millis(20));
        scheduler.tick();
        assert_eq!(scheduler.now(), Duration::ZERO);

        scheduler.advance(FRAME);
        assert_eq!(scheduler.now(), FRAME);
    }

    #[test]
    fn test_handle_weak_reference() {
        let handle = {
            let scheduler = FrameScheduler::with_virtual_clock();
            scheduler.handle()
        };

        assert!(!handle.is_alive());
        assert!(handle.on_tick(|_| TickControl::Continue).is_none());
        assert!(handle.after(Duration::ZERO, || {}).is_none());
        assert!(handle.fps().is_none());
    }
}
