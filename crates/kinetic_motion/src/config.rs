//! Engine configuration (kinetic.toml)

use kinetic_animation::{DecayConfig, SpringConfig, Tolerance, TransitionSpec};
use kinetic_core::error::{ensure_non_negative, ensure_positive, ensure_within};
use kinetic_core::ConfigurationError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Configuration loading errors
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Config file could not be read
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Config file is not valid TOML for this schema
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    /// Config could not be written as TOML
    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    /// Config parsed but holds out-of-domain values
    #[error("invalid config: {0}")]
    Invalid(#[from] ConfigurationError),
}

/// Top-level engine configuration
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Upper bound for a single frame delta in seconds; unbounded if unset
    pub max_dt: Option<f32>,
    pub tolerance: Tolerance,
    pub gesture: GestureSettings,
    pub layout: LayoutSettings,
    pub presence: PresenceSettings,
}

/// Drag behavior defaults
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GestureSettings {
    /// Release velocity is measured over this trailing window
    pub velocity_window_ms: f32,
    /// Rubber band saturation distance, px
    pub rubber_band_extent: f32,
    /// Elastic factor for gestures that do not set their own
    pub elastic: f32,
    /// Movement needed before a direction lock picks an axis, px
    pub direction_lock_threshold: f32,
    /// Spring used to settle a release without momentum
    pub snap: TransitionSpec,
    /// Spring used when momentum runs into a constraint
    pub bounce_stiffness: f32,
    pub bounce_damping: f32,
    pub decay: DecayConfig,
}

impl GestureSettings {
    pub fn bounce_spring(&self) -> SpringConfig {
        SpringConfig {
            stiffness: self.bounce_stiffness,
            damping: self.bounce_damping,
            mass: 1.0,
        }
    }
}

impl Default for GestureSettings {
    fn default() -> Self {
        Self {
            velocity_window_ms: 100.0,
            rubber_band_extent: 300.0,
            elastic: 0.5,
            direction_lock_threshold: 3.0,
            snap: TransitionSpec::spring(0.3, 0.0),
            bounce_stiffness: 300.0,
            bounce_damping: 20.0,
            decay: DecayConfig::default(),
        }
    }
}

/// Layout morph defaults
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LayoutSettings {
    /// Transition of a shared element between two layouts
    pub morph: TransitionSpec,
    /// Opacity transition of a first appearance
    pub enter: TransitionSpec,
    /// Fade used when measurement is unavailable, seconds
    pub fade_duration: f32,
}

impl Default for LayoutSettings {
    fn default() -> Self {
        Self {
            morph: TransitionSpec::spring(0.35, 0.15),
            enter: TransitionSpec::spring(0.3, 0.0),
            fade_duration: 0.2,
        }
    }
}

/// Presence defaults for keys registered without explicit specs
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PresenceSettings {
    pub enter: TransitionSpec,
    pub exit: TransitionSpec,
}

impl Default for PresenceSettings {
    fn default() -> Self {
        Self {
            enter: TransitionSpec::spring(0.35, 0.1),
            exit: TransitionSpec::spring(0.35, 0.1),
        }
    }
}

impl EngineConfig {
    /// Parse and validate a TOML document
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: EngineConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a config file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_toml_str(&content)?;
        tracing::debug!(path = %path.display(), "loaded engine config");
        Ok(config)
    }

    /// Serialize to TOML string
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if let Some(max_dt) = self.max_dt {
            ensure_positive("max_dt", max_dt)?;
        }
        ensure_positive("tolerance.rest_delta", self.tolerance.rest_delta)?;
        ensure_positive("tolerance.rest_speed", self.tolerance.rest_speed)?;

        let gesture = &self.gesture;
        ensure_positive("gesture.velocity_window_ms", gesture.velocity_window_ms)?;
        ensure_positive("gesture.rubber_band_extent", gesture.rubber_band_extent)?;
        ensure_within("gesture.elastic", gesture.elastic, 0.0, 1.0)?;
        ensure_non_negative(
            "gesture.direction_lock_threshold",
            gesture.direction_lock_threshold,
        )?;
        gesture.snap.validate()?;
        gesture.bounce_spring().validate()?;
        gesture.decay.validate()?;

        self.layout.morph.validate()?;
        self.layout.enter.validate()?;
        ensure_non_negative("layout.fade_duration", self.layout.fade_duration)?;

        self.presence.enter.validate()?;
        self.presence.exit.validate()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kinetic_animation::Easing;

    #[test]
    fn test_empty_document_uses_defaults() {
        let config = EngineConfig::from_toml_str("").unwrap();
        assert_eq!(config, EngineConfig::default());
        assert_eq!(config.gesture.velocity_window_ms, 100.0);
        assert_eq!(config.gesture.rubber_band_extent, 300.0);
    }

    #[test]
    fn test_defaults_round_trip() {
        let text = EngineConfig::default().to_toml().unwrap();
        let parsed = EngineConfig::from_toml_str(&text).unwrap();
        assert_eq!(parsed, EngineConfig::default());
    }

    #[test]
    fn test_partial_sections() {
        let config = EngineConfig::from_toml_str(
            r#"
            max_dt = 0.1

            [gesture]
            elastic = 0.15

            [gesture.snap]
            kind = "tween"
            duration = 0.25
            easing = "easeOut"

            [presence.exit]
            kind = "physics"
            stiffness = 500.0
            damping = 40.0
            "#,
        )
        .unwrap();

        assert_eq!(config.max_dt, Some(0.1));
        assert_eq!(config.gesture.elastic, 0.15);
        assert_eq!(config.gesture.rubber_band_extent, 300.0);
        assert_eq!(
            config.gesture.snap,
            TransitionSpec::tween(0.25, Easing::EaseOut)
        );
        assert_eq!(
            config.presence.exit,
            TransitionSpec::physics(500.0, 40.0, 1.0)
        );
        assert_eq!(config.presence.enter, PresenceSettings::default().enter);
    }

    #[test]
    fn test_rejects_bad_values() {
        let err = EngineConfig::from_toml_str("[gesture]\nelastic = 1.5\n").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));

        let err = EngineConfig::from_toml_str(
            "[layout.morph]\nkind = \"spring\"\nvisual_duration = 0.3\nbounce = 1.0\n",
        )
        .unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Invalid(ConfigurationError::Bounce(_))
        ));

        let err = EngineConfig::from_toml_str("max_dt = \"soon\"").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_missing_file() {
        let err = EngineConfig::load(Path::new("/nonexistent/kinetic.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }
}
