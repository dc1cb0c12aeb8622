//! Reader configuration
//!
//! Tunables for page animation, drag gestures, and cascades. Every field has
//! a default, so a config file only needs the values it changes:
//!
//! ```toml
//! flip_steps = 40
//!
//! [gesture]
//! reading_direction = "left_to_right"
//! commit_threshold = 0.35
//!
//! [cascade]
//! stagger_delay_ms = 80
//! ```

use crate::error::{ReaderError, Result};
use folio_animation::CubicBezier;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

/// Top-level reader configuration
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ReaderConfig {
    /// Frames a full flip takes at 60fps
    pub flip_steps: u32,
    /// Scale applied to the bend force to keep the page from folding into itself
    pub bend_damping: f64,
    /// Depth between neighbouring pages in a stack
    pub page_depth_offset: f64,
    /// Flip timing curve as `[x1, y1, x2, y2]`
    pub easing: [f64; 4],
    pub gesture: GestureConfig,
    pub cascade: CascadeConfig,
}

impl Default for ReaderConfig {
    fn default() -> Self {
        Self {
            flip_steps: 50,
            bend_damping: 0.88,
            page_depth_offset: 0.002,
            easing: [0.42, 0.0, 0.58, 1.0],
            gesture: GestureConfig::default(),
            cascade: CascadeConfig::default(),
        }
    }
}

impl ReaderConfig {
    /// Parse and validate a config from TOML
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: ReaderConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a config file
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        let config = Self::from_toml_str(&content)?;
        tracing::debug!(path = %path.display(), "loaded reader config");
        Ok(config)
    }

    /// Serialize to TOML
    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|err| ReaderError::InvalidConfig {
            field: "<root>",
            reason: err.to_string(),
        })
    }

    /// Check every value is in range
    pub fn validate(&self) -> Result<()> {
        if self.flip_steps == 0 {
            return Err(invalid("flip_steps", "must be at least 1"));
        }
        if !(self.bend_damping.is_finite() && self.bend_damping >= 0.0) {
            return Err(invalid("bend_damping", "must be a non-negative number"));
        }
        if !(self.page_depth_offset.is_finite() && self.page_depth_offset >= 0.0) {
            return Err(invalid("page_depth_offset", "must be a non-negative number"));
        }
        let [x1, y1, x2, y2] = self.easing;
        if !(0.0..=1.0).contains(&x1) || !(0.0..=1.0).contains(&x2) {
            return Err(invalid("easing", "x control points must be within [0, 1]"));
        }
        if !(y1.is_finite() && y2.is_finite()) {
            return Err(invalid("easing", "y control points must be finite"));
        }
        self.gesture.validate()
    }

    /// The configured timing curve
    pub fn curve(&self) -> CubicBezier {
        CubicBezier::from_points(self.easing)
    }
}

/// Which way a drag turns pages forward
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReadingDirection {
    /// Western binding: drag leftward to go forward
    LeftToRight,
    /// Manga binding: drag rightward to go forward
    #[default]
    RightToLeft,
}

impl ReadingDirection {
    /// Signed horizontal offset, positive when moving forward
    pub fn forward_offset(self, dx: f64) -> f64 {
        match self {
            ReadingDirection::LeftToRight => -dx,
            ReadingDirection::RightToLeft => dx,
        }
    }
}

/// Drag gesture tuning
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct GestureConfig {
    /// Moves shorter than this since the last accepted sample are ignored
    pub move_threshold_px: f64,
    /// Progress change at release needed to complete a turn
    pub commit_threshold: f64,
    /// A bound page starting at or below this progress bends as a forward flip
    pub forward_bias: f64,
    /// Initial viewport width, updated by resize events
    pub viewport_width: f64,
    /// Fraction of the viewport a full drag covers
    pub distance_factor: f64,
    pub min_distance: f64,
    pub max_distance: f64,
    pub reading_direction: ReadingDirection,
}

impl Default for GestureConfig {
    fn default() -> Self {
        Self {
            move_threshold_px: 5.0,
            commit_threshold: 0.4,
            forward_bias: 0.3,
            viewport_width: 1280.0,
            distance_factor: 0.4,
            min_distance: 250.0,
            max_distance: 1920.0,
            reading_direction: ReadingDirection::default(),
        }
    }
}

impl GestureConfig {
    /// Drag distance that maps to a full flip for a viewport `width` wide
    pub fn move_total_distance(&self, width: f64) -> f64 {
        (width * self.distance_factor).clamp(self.min_distance, self.max_distance)
    }

    fn validate(&self) -> Result<()> {
        if !(self.move_threshold_px.is_finite() && self.move_threshold_px >= 0.0) {
            return Err(invalid(
                "gesture.move_threshold_px",
                "must be a non-negative number",
            ));
        }
        if !(self.commit_threshold > 0.0 && self.commit_threshold <= 1.0) {
            return Err(invalid("gesture.commit_threshold", "must be within (0, 1]"));
        }
        if !(0.0..=1.0).contains(&self.forward_bias) {
            return Err(invalid("gesture.forward_bias", "must be within [0, 1]"));
        }
        if !(self.min_distance > 0.0 && self.min_distance <= self.max_distance) {
            return Err(invalid(
                "gesture.min_distance",
                "must be positive and no larger than max_distance",
            ));
        }
        if !(self.distance_factor.is_finite() && self.distance_factor > 0.0) {
            return Err(invalid("gesture.distance_factor", "must be positive"));
        }
        Ok(())
    }
}

/// Batch flip tuning
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct CascadeConfig {
    /// Delay between successive page launches
    pub stagger_delay_ms: u64,
}

impl Default for CascadeConfig {
    fn default() -> Self {
        Self {
            stagger_delay_ms: 60,
        }
    }
}

impl CascadeConfig {
    pub fn stagger_delay(&self) -> Duration {
        Duration::from_millis(self.stagger_delay_ms)
    }
}

fn invalid(field: &'static str, reason: &str) -> ReaderError {
    ReaderError::InvalidConfig {
        field,
        reason: reason.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = ReaderConfig::default();
        config.validate().unwrap();
        assert_eq!(config.gesture.move_total_distance(1280.0), 512.0);
        assert_eq!(config.cascade.stagger_delay(), Duration::from_millis(60));
    }

    #[test]
    fn test_move_total_distance_is_clamped() {
        let gesture = GestureConfig::default();
        assert_eq!(gesture.move_total_distance(320.0), 250.0);
        assert_eq!(gesture.move_total_distance(10_000.0), 1920.0);
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = ReaderConfig::from_toml_str(
            r#"
            flip_steps = 40

            [gesture]
            reading_direction = "left_to_right"
            commit_threshold = 0.35
            "#,
        )
        .unwrap();

        assert_eq!(config.flip_steps, 40);
        assert_eq!(config.bend_damping, 0.88);
        assert_eq!(
            config.gesture.reading_direction,
            ReadingDirection::LeftToRight
        );
        assert_eq!(config.gesture.commit_threshold, 0.35);
        assert_eq!(config.gesture.move_threshold_px, 5.0);
        assert_eq!(config.cascade.stagger_delay_ms, 60);
    }

    #[test]
    fn test_rejects_out_of_range_values() {
        let err = ReaderConfig::from_toml_str("flip_steps = 0").unwrap_err();
        assert!(matches!(
            err,
            ReaderError::InvalidConfig {
                field: "flip_steps",
                ..
            }
        ));

        let err = ReaderConfig::from_toml_str("easing = [1.5, 0.0, 0.5, 1.0]").unwrap_err();
        assert!(matches!(err, ReaderError::InvalidConfig { field: "easing", .. }));

        let err = ReaderConfig::from_toml_str("[gesture]\ncommit_threshold = 0.0").unwrap_err();
        assert!(matches!(
            err,
            ReaderError::InvalidConfig {
                field: "gesture.commit_threshold",
                ..
            }
        ));
    }

    #[test]
    fn test_rejects_malformed_toml() {
        let err = ReaderConfig::from_toml_str("flip_steps = \"many\"").unwrap_err();
        assert!(matches!(err, ReaderError::Config(_)));
    }

    #[test]
    fn test_toml_roundtrip() {
        let mut config = ReaderConfig::default();
        config.cascade.stagger_delay_ms = 25;
        let text = config.to_toml_string().unwrap();
        assert_eq!(ReaderConfig::from_toml_str(&text).unwrap(), config);
    }

    #[test]
    fn test_forward_offset_follows_reading_direction() {
        assert_eq!(ReadingDirection::RightToLeft.forward_offset(12.0), 12.0);
        assert_eq!(ReadingDirection::LeftToRight.forward_offset(12.0), -12.0);
    }

    #[test]
    fn test_load_missing_file() {
        let err = ReaderConfig::load(Path::new("/nonexistent/folio.toml")).unwrap_err();
        assert!(matches!(err, ReaderError::Io(_)));
    }
}
