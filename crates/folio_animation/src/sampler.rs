//! Frame-rate sampling
//!
//! Measures the display's actual frame rate so frame-stepped animations can
//! scale their step count and keep a constant wall-clock duration.

use std::time::Duration;

/// Frame rate assumed before two frames have been observed
pub const REFERENCE_FPS: f64 = 60.0;

/// Bounds applied when scaling step counts by a measured frame rate
const MIN_SCALING_FPS: f64 = 1.0;
const MAX_SCALING_FPS: f64 = 480.0;

/// Tracks frames-per-second from successive frame timestamps
#[derive(Clone, Copy, Debug)]
pub struct FrameRateSampler {
    last_sample: Option<Duration>,
    fps: f64,
}

impl FrameRateSampler {
    pub fn new() -> Self {
        Self {
            last_sample: None,
            fps: REFERENCE_FPS,
        }
    }

    /// Record a frame at `now` and update the estimate to `1000 / Δt_ms`
    ///
    /// Frames that do not move time forward leave the estimate untouched.
    pub fn sample(&mut self, now: Duration) {
        if let Some(last) = self.last_sample {
            if now > last {
                let dt_ms = (now - last).as_secs_f64() * 1000.0;
                self.fps = 1000.0 / dt_ms;
            }
        }
        self.last_sample = Some(now);
    }

    /// Current frames-per-second estimate
    pub fn fps(&self) -> f64 {
        self.fps
    }

    /// Step count for an animation covering `fraction` of a full run
    ///
    /// `base_steps` is the number of frames a full run takes at 60fps. The
    /// result scales with the measured rate so duration stays constant, and is
    /// never less than one.
    pub fn scaled_steps(&self, base_steps: u32, fraction: f64) -> usize {
        scaled_steps(base_steps, self.fps, fraction)
    }
}

impl Default for FrameRateSampler {
    fn default() -> Self {
        Self::new()
    }
}

/// Scale `base_steps` (frames at 60fps) to `fps`, covering `fraction` of a run
pub fn scaled_steps(base_steps: u32, fps: f64, fraction: f64) -> usize {
    let fps = if fps.is_finite() {
        fps.clamp(MIN_SCALING_FPS, MAX_SCALING_FPS)
    } else {
        REFERENCE_FPS
    };
    let fraction = fraction.abs().min(1.0);
    let steps = (base_steps as f64 * (fps / REFERENCE_FPS) * fraction).ceil();
    steps.max(1.0) as usize
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_starts_at_reference_rate() {
        let sampler = FrameRateSampler::new();
        assert_eq!(sampler.fps(), REFERENCE_FPS);
    }

    #[test]
    fn test_first_sample_does_not_change_estimate() {
        let mut sampler = FrameRateSampler::new();
        sampler.sample(Duration::from_millis(500));
        assert_eq!(sampler.fps(), REFERENCE_FPS);
    }

    #[test]
    fn test_measures_frame_interval() {
        let mut sampler = FrameRateSampler::new();
        sampler.sample(Duration::from_millis(0));
        sampler.sample(Duration::from_millis(10));
        assert!((sampler.fps() - 100.0).abs() < 1e-9);

        sampler.sample(Duration::from_millis(35));
        assert!((sampler.fps() - 40.0).abs() < 1e-9);
    }

    #[test]
    fn test_ignores_stalled_clock() {
        let mut sampler = FrameRateSampler::new();
        sampler.sample(Duration::from_millis(0));
        sampler.sample(Duration::from_millis(20));
        sampler.sample(Duration::from_millis(20));
        assert!((sampler.fps() - 50.0).abs() < 1e-9);
    }

    #[test]
    fn test_scaled_steps_tracks_frame_rate() {
        assert_eq!(scaled_steps(50, 60.0, 1.0), 50);
        assert_eq!(scaled_steps(50, 120.0, 1.0), 100);
        assert_eq!(scaled_steps(50, 30.0, 1.0), 25);
        assert_eq!(scaled_steps(50, 60.0, 0.5), 25);
    }

    #[test]
    fn test_scaled_steps_never_zero() {
        assert_eq!(scaled_steps(50, 60.0, 0.0), 1);
        assert_eq!(scaled_steps(0, 60.0, 1.0), 1);
        assert_eq!(scaled_steps(50, f64::NAN, 1.0), 50);
    }
}
