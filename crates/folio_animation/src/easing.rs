//! Cubic bezier easing
//!
//! CSS-style `cubic-bezier()` timing curves with anchors fixed at (0,0) and
//! (1,1). The curve is solved for `y` given `x` with Newton's method, falling
//! back to bisection when the derivative flattens out.

/// Convergence tolerance for both the Newton and bisection passes
const EPSILON: f64 = 1e-6;

/// Newton iterations attempted before falling back to bisection
const NEWTON_ITERATIONS: usize = 8;

/// Upper bound on bisection steps; f64 runs out of resolution well before this
const BISECTION_ITERATIONS: usize = 64;

/// A cubic bezier timing curve
///
/// Control points are `(x1, y1)` and `(x2, y2)`. The polynomial coefficients
/// for `x(t)` and `y(t)` are precomputed on construction.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CubicBezier {
    ax: f64,
    bx: f64,
    cx: f64,
    ay: f64,
    by: f64,
    cy: f64,
}

impl CubicBezier {
    /// Create a curve from two control points
    pub fn new(x1: f64, y1: f64, x2: f64, y2: f64) -> Self {
        let cx = 3.0 * x1;
        let bx = 3.0 * (x2 - x1) - cx;
        let ax = 1.0 - cx - bx;

        let cy = 3.0 * y1;
        let by = 3.0 * (y2 - y1) - cy;
        let ay = 1.0 - cy - by;

        Self {
            ax,
            bx,
            cx,
            ay,
            by,
            cy,
        }
    }

    /// Create a curve from `[x1, y1, x2, y2]`
    pub fn from_points(points: [f64; 4]) -> Self {
        Self::new(points[0], points[1], points[2], points[3])
    }

    /// CSS `linear`
    pub fn linear() -> Self {
        Self::new(0.0, 0.0, 1.0, 1.0)
    }

    /// CSS `ease`
    pub fn ease() -> Self {
        Self::new(0.25, 0.1, 0.25, 1.0)
    }

    /// CSS `ease-in`
    pub fn ease_in() -> Self {
        Self::new(0.42, 0.0, 1.0, 1.0)
    }

    /// CSS `ease-out`
    pub fn ease_out() -> Self {
        Self::new(0.0, 0.0, 0.58, 1.0)
    }

    /// CSS `ease-in-out`
    pub fn ease_in_out() -> Self {
        Self::new(0.42, 0.0, 0.58, 1.0)
    }

    /// Returns the eased `y` for an input `x` in [0, 1]
    ///
    /// Inputs outside [0, 1] are clamped.
    pub fn solve(&self, x: f64) -> f64 {
        let x = x.clamp(0.0, 1.0);
        self.sample_y(self.solve_t(x))
    }

    /// Produce `steps` eased values between `start` and `end`
    ///
    /// Samples are taken at `t = i / steps` for `i` in `0..steps`, so the
    /// first value is always `start` and `end` itself is never reached. Each
    /// value is rounded to two decimal places.
    pub fn positions_by_step(&self, start: f64, end: f64, steps: usize) -> Vec<f64> {
        if steps == 0 {
            return Vec::new();
        }

        let span = end - start;
        (0..steps)
            .map(|i| {
                let t = i as f64 / steps as f64;
                round_to_hundredths(start + span * self.solve(t))
            })
            .collect()
    }

    fn solve_t(&self, x: f64) -> f64 {
        let mut t = x;
        for _ in 0..NEWTON_ITERATIONS {
            let error = self.sample_x(t) - x;
            if error.abs() < EPSILON {
                return t;
            }
            let slope = self.sample_x_derivative(t);
            if slope.abs() < EPSILON {
                break;
            }
            t -= error / slope;
        }

        let mut low = 0.0_f64;
        let mut high = 1.0_f64;
        t = x;
        for _ in 0..BISECTION_ITERATIONS {
            let estimate = self.sample_x(t);
            if (estimate - x).abs() < EPSILON {
                return t;
            }
            if x > estimate {
                low = t;
            } else {
                high = t;
            }
            t = low + (high - low) * 0.5;
        }
        t
    }

    fn sample_x(&self, t: f64) -> f64 {
        ((self.ax * t + self.bx) * t + self.cx) * t
    }

    fn sample_y(&self, t: f64) -> f64 {
        ((self.ay * t + self.by) * t + self.cy) * t
    }

    fn sample_x_derivative(&self, t: f64) -> f64 {
        (3.0 * self.ax * t + 2.0 * self.bx) * t + self.cx
    }
}

impl Default for CubicBezier {
    fn default() -> Self {
        Self::ease_in_out()
    }
}

fn round_to_hundredths(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
