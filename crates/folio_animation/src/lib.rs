//! Folio Animation
//!
//! Frame-stepped animation primitives used by the Folio page-flip reader.
//!
//! # Features
//!
//! - **Cubic Bezier Easing**: CSS-style timing curves solved with Newton's
//!   method and a bisection fallback
//! - **Frame Scheduler**: per-frame tick subscriptions and one-shot timers on
//!   a real or virtual clock
//! - **Frame-Rate Sampling**: step counts that adapt to the measured refresh
//!   rate so animations keep a constant duration
//! - **Tweens**: precomputed eased value runs played one step per frame, with
//!   cooperative cancellation

pub mod easing;
pub mod sampler;
pub mod scheduler;
pub mod tween;

pub use easing::CubicBezier;
pub use sampler::{scaled_steps, FrameRateSampler, REFERENCE_FPS};
pub use scheduler::{
    FrameInfo, FrameScheduler, SchedulerHandle, TickCallback, TickCallbackId, TickControl,
    TimerId,
};
pub use tween::{play, Tween, TweenHandle, TweenStatus};
