//! Frame-stepped eased playback
//!
//! A [`Tween`] is a precomputed run of eased values between two endpoints.
//! [`play`] subscribes it to a scheduler and hands one value per frame to a
//! callback, along with whether it is the last one.

use crate::easing::CubicBezier;
use crate::scheduler::{SchedulerHandle, TickCallbackId, TickControl};
use std::cell::Cell;
use std::collections::VecDeque;
use std::rc::Rc;

/// A precomputed sequence of eased values
///
/// The sequence is `steps` rounded samples from
/// [`CubicBezier::positions_by_step`] followed by the exact `end` value, so
/// playback always lands precisely on its target.
#[derive(Clone, Debug)]
pub struct Tween {
    values: VecDeque<f64>,
}

impl Tween {
    pub fn new(curve: &CubicBezier, start: f64, end: f64, steps: usize) -> Self {
        let mut values: VecDeque<f64> = curve.positions_by_step(start, end, steps).into();
        values.push_back(end);
        Self { values }
    }

    /// Pop the next value and whether it is the final one
    pub fn next_value(&mut self) -> Option<(f64, bool)> {
        let value = self.values.pop_front()?;
        Some((value, self.values.is_empty()))
    }

    /// Number of values not yet delivered
    pub fn remaining(&self) -> usize {
        self.values.len()
    }
}

/// Playback state of a tween started with [`play`]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TweenStatus {
    Playing,
    Finished,
    Cancelled,
}

/// Cancellation handle for a playing tween
///
/// Dropping the handle does not stop playback; call [`TweenHandle::cancel`].
#[derive(Debug)]
pub struct TweenHandle {
    id: TickCallbackId,
    status: Rc<Cell<TweenStatus>>,
    scheduler: SchedulerHandle,
}

impl TweenHandle {
    /// Stop delivering values
    ///
    /// Takes effect before the next frame. A callback that is already running
    /// completes normally. Has no effect on a finished tween.
    pub fn cancel(&self) {
        if self.status.get() == TweenStatus::Playing {
            self.status.set(TweenStatus::Cancelled);
            self.scheduler.remove_tick(self.id);
        }
    }

    pub fn status(&self) -> TweenStatus {
        self.status.get()
    }

    pub fn is_playing(&self) -> bool {
        self.status.get() == TweenStatus::Playing
    }
}

/// Play `tween` on `scheduler`, one value per frame
///
/// `callback(value, is_last)` runs on each frame, starting with the next one.
/// Returns `None` if the scheduler is gone.
pub fn play<F>(
    scheduler: &SchedulerHandle,
    mut tween: Tween,
    mut callback: F,
) -> Option<TweenHandle>
where
    F: FnMut(f64, bool) + 'static,
{
    let status = Rc::new(Cell::new(TweenStatus::Playing));
    let flag = Rc::clone(&status);

    let id = scheduler.on_tick(move |_| {
        if flag.get() != TweenStatus::Playing {
            return TickControl::Done;
        }
        match tween.next_value() {
            Some((value, is_last)) => {
                if is_last {
                    flag.set(TweenStatus::Finished);
                }
                callback(value, is_last);
                if is_last || flag.get() != TweenStatus::Playing {
                    TickControl::Done
                } else {
                    TickControl::Continue
                }
            }
            None => {
                flag.set(TweenStatus::Finished);
                TickControl::Done
            }
        }
    })?;

    Some(TweenHandle {
        id,
        status,
        scheduler: scheduler.clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheduler::FrameScheduler;
    use std::cell::RefCell;
    use std::time::Duration;

    const FRAME: Duration = Duration::from_millis(16);

    fn recorder() -> (Rc<RefCell<Vec<(f64, bool)>>>, impl FnMut(f64, bool) + 'static) {
        let log = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&log);
        (log, move |value, is_last| sink.borrow_mut().push((value, is_last)))
    }

    #[test]
    fn test_tween_ends_on_exact_target() {
        let curve = CubicBezier::new(0.3, 0.1, 0.7, 0.9);
        for steps in 1..12 {
            let mut tween = Tween::new(&curve, 0.0, 1.0, steps);
            assert_eq!(tween.remaining(), steps + 1);
            let mut last = None;
            while let Some(item) = tween.next_value() {
                last = Some(item);
            }
            assert_eq!(last, Some((1.0, true)));
        }
    }

    #[test]
    fn test_tween_ends_on_unrounded_target() {
        let mut tween = Tween::new(&CubicBezier::linear(), 0.0, 0.123456, 3);
        let mut values = Vec::new();
        while let Some((value, _)) = tween.next_value() {
            values.push(value);
        }
        assert_eq!(values.last(), Some(&0.123456));
    }

    #[test]
    fn test_play_delivers_one_value_per_frame() {
        let scheduler = FrameScheduler::with_virtual_clock();
        let (log, callback) = recorder();
        let tween = Tween::new(&CubicBezier::linear(), 0.0, 1.0, 4);

        let handle = play(&scheduler.handle(), tween, callback).unwrap();
        assert!(log.borrow().is_empty());

        scheduler.advance(FRAME);
        assert_eq!(log.borrow().len(), 1);

        for _ in 0..10 {
            scheduler.advance(FRAME);
        }
        let log = log.borrow();
        assert_eq!(log.len(), 5);
        assert_eq!(log[0], (0.0, false));
        assert_eq!(log[4], (1.0, true));
        assert!(log[..4].iter().all(|(_, is_last)| !is_last));
        assert_eq!(handle.status(), TweenStatus::Finished);
        assert_eq!(scheduler.tick_count(), 0);
    }

    #[test]
    fn test_cancel_stops_delivery() {
        let scheduler = FrameScheduler::with_virtual_clock();
        let (log, callback) = recorder();
        let tween = Tween::new(&CubicBezier::linear(), 0.0, 1.0, 10);

        let handle = play(&scheduler.handle(), tween, callback).unwrap();
        scheduler.advance(FRAME);
        scheduler.advance(FRAME);
        handle.cancel();
        scheduler.advance(FRAME);
        scheduler.advance(FRAME);

        assert_eq!(log.borrow().len(), 2);
        assert_eq!(handle.status(), TweenStatus::Cancelled);
        assert!(!scheduler.has_active());
    }

    #[test]
    fn test_cancel_from_inside_callback_finishes_current_value() {
        let scheduler = FrameScheduler::with_virtual_clock();
        let slot: Rc<RefCell<Option<TweenHandle>>> = Rc::new(RefCell::new(None));
        let delivered = Rc::new(Cell::new(0));

        let own = Rc::clone(&slot);
        let count = Rc::clone(&delivered);
        let tween = Tween::new(&CubicBezier::linear(), 0.0, 1.0, 10);
        let handle = play(&scheduler.handle(), tween, move |_, _| {
            count.set(count.get() + 1);
            if let Some(handle) = own.borrow().as_ref() {
                handle.cancel();
            }
        })
        .unwrap();
        *slot.borrow_mut() = Some(handle);

        scheduler.advance(FRAME);
        scheduler.advance(FRAME);
        assert_eq!(delivered.get(), 1);
    }

    #[test]
    fn test_cancel_after_finish_is_noop() {
        let scheduler = FrameScheduler::with_virtual_clock();
        let tween = Tween::new(&CubicBezier::linear(), 0.0, 1.0, 1);
        let handle = play(&scheduler.handle(), tween, |_, _| {}).unwrap();

        scheduler.advance(FRAME);
        scheduler.advance(FRAME);
        handle.cancel();
        assert_eq!(handle.status(), TweenStatus::Finished);
    }
}
