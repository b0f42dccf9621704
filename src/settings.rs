//! Simulation settings
//!
//! Every physical constant, drag tuning value and screen measurement lives
//! here and is injected at construction. Optionally loaded from a JSON file.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::consts::*;

/// Environment variable naming an optional settings file
pub const SETTINGS_ENV: &str = "BOUNCE_SIM_SETTINGS";

/// Errors raised while loading or validating settings
#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("failed to read settings file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed settings file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to encode settings: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("invalid setting `{field}`: {reason}")]
    Invalid { field: &'static str, reason: String },
}

/// Which program the settings are tuned for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum Variant {
    /// Text-only run: 1 s primary step, precision monitor, stops after 3 bounces
    Console,
    /// Graphical run: adjustable step, drag-and-throw, runs until stopped
    #[default]
    Interactive,
}

impl Variant {
    pub fn as_str(&self) -> &'static str {
        match self {
            Variant::Console => "Console",
            Variant::Interactive => "Interactive",
        }
    }
}

/// Position update order for the integrator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum IntegrationOrder {
    /// `h ∓= v·dt`
    #[default]
    FirstOrder,
    /// `h ∓= v·dt − ½·g·dt²`
    SecondOrder,
}

/// When the integrator reports that the run is over
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum Termination {
    /// Run until externally stopped
    #[default]
    Never,
    /// Stop once this many floor contacts have happened
    AfterRebounds(u32),
}

impl Termination {
    /// Whether a run with `rebound_count` contacts is finished
    pub fn is_reached(&self, rebound_count: u32) -> bool {
        match *self {
            Termination::Never => false,
            Termination::AfterRebounds(limit) => rebound_count >= limit,
        }
    }
}

/// Physical constants for the integrator
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PhysicsConfig {
    /// Gravitational acceleration (m/s²)
    pub gravity: f32,
    /// Vertical rebound coefficient, 0..=1
    pub vertical_rebound: f32,
    /// Side-wall rebound coefficient, 0..=1
    pub horizontal_rebound: f32,
    /// Rebound speeds below this become exactly zero (0 disables)
    pub min_rebound_speed: f32,
    pub order: IntegrationOrder,
    pub termination: Termination,
    /// Horizontal velocity given on startup, reset and spawn (px/s)
    pub initial_horizontal_velocity: f32,
}

impl Default for PhysicsConfig {
    fn default() -> Self {
        Self {
            gravity: GRAVITY,
            vertical_rebound: REBOUND_COEFFICIENT,
            horizontal_rebound: REBOUND_COEFFICIENT,
            min_rebound_speed: MIN_REBOUND_SPEED,
            order: IntegrationOrder::FirstOrder,
            termination: Termination::Never,
            initial_horizontal_velocity: 0.0,
        }
    }
}

/// Drag-to-throw tuning
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DragConfig {
    /// Converts pointer px/ms into simulation units
    pub scale: f32,
    /// Extra multiplier on top of `scale`
    pub gain: f32,
    /// Per-component speed cap
    pub max_speed: f32,
    /// Release samples at or below this age are taps (ms)
    pub min_sample_interval_ms: f32,
}

impl Default for DragConfig {
    fn default() -> Self {
        Self {
            scale: THROW_SCALE,
            gain: THROW_GAIN,
            max_speed: THROW_MAX_SPEED,
            min_sample_interval_ms: MIN_SAMPLE_INTERVAL_MS,
        }
    }
}

/// Mapping between simulation height and screen pixels
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Viewport {
    pub width: f32,
    pub height: f32,
    /// Screen y of the ground line
    pub ground_y: f32,
    pub ball_radius: f32,
    /// Pixels per metre
    pub scale: f32,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            width: SCREEN_WIDTH,
            height: SCREEN_HEIGHT,
            ground_y: GROUND_Y,
            ball_radius: BALL_RADIUS,
            scale: SCALE_FACTOR,
        }
    }
}

impl Viewport {
    /// Leftmost legal ball centre
    #[inline]
    pub fn min_x(&self) -> f32 {
        self.ball_radius
    }

    /// Rightmost legal ball centre
    #[inline]
    pub fn max_x(&self) -> f32 {
        self.width - self.ball_radius
    }

    /// Screen y of the ball centre at `height` metres
    #[inline]
    pub fn ball_y(&self, height: f32) -> f32 {
        self.ground_y - self.ball_radius - height * self.scale
    }

    /// Height in metres whose ball centre sits at screen `y` (may be negative)
    #[inline]
    pub fn height_at(&self, y: f32) -> f32 {
        (self.ground_y - self.ball_radius - y) / self.scale
    }
}

/// Timing of the background loops
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoopConfig {
    /// Simulated seconds per primary tick
    pub time_step: f32,
    /// Wall-clock seconds slept per simulated second (1.0 = real time)
    pub pace: f32,
    /// Simulated seconds per precision monitor tick
    pub monitor_time_step: f32,
    /// Monitor ticks between reconciliation checks
    pub reconcile_every: u32,
    /// Height difference that forces a monitor resync (metres)
    pub monitor_tolerance: f32,
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            time_step: DEFAULT_TIME_STEP,
            pace: 1.0,
            monitor_time_step: MONITOR_TIME_STEP,
            reconcile_every: MONITOR_RECONCILE_EVERY,
            monitor_tolerance: MONITOR_TOLERANCE,
        }
    }
}

/// Complete simulation settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub variant: Variant,
    /// Starting height (metres)
    pub initial_height: f32,
    pub physics: PhysicsConfig,
    pub drag: DragConfig,
    pub viewport: Viewport,
    pub timing: LoopConfig,
}

impl Default for Settings {
    fn default() -> Self {
        Self::for_variant(Variant::Interactive)
    }
}

impl Settings {
    /// Settings reproducing one of the two program variants
    pub fn for_variant(variant: Variant) -> Self {
        match variant {
            Variant::Console => Self {
                variant,
                initial_height: DEFAULT_HEIGHT,
                physics: PhysicsConfig {
                    order: IntegrationOrder::SecondOrder,
                    termination: Termination::AfterRebounds(CONSOLE_REBOUND_LIMIT),
                    min_rebound_speed: 0.0,
                    ..PhysicsConfig::default()
                },
                drag: DragConfig::default(),
                viewport: Viewport::default(),
                timing: LoopConfig {
                    time_step: CONSOLE_TIME_STEP,
                    ..LoopConfig::default()
                },
            },
            Variant::Interactive => Self {
                variant,
                initial_height: DEFAULT_HEIGHT,
                physics: PhysicsConfig {
                    vertical_rebound: 1.0,
                    horizontal_rebound: 1.0,
                    ..PhysicsConfig::default()
                },
                drag: DragConfig::default(),
                viewport: Viewport::default(),
                timing: LoopConfig::default(),
            },
        }
    }

    /// Check ranges the engine relies on
    pub fn validate(&self) -> Result<(), SettingsError> {
        fn invalid(field: &'static str, reason: impl Into<String>) -> SettingsError {
            SettingsError::Invalid {
                field,
                reason: reason.into(),
            }
        }

        let p = &self.physics;
        if !p.gravity.is_finite() || p.gravity < 0.0 {
            return Err(invalid("physics.gravity", "must be finite and >= 0"));
        }
        if !(0.0..=1.0).contains(&p.vertical_rebound) {
            return Err(invalid("physics.vertical_rebound", "must be within 0..=1"));
        }
        if !(0.0..=1.0).contains(&p.horizontal_rebound) {
            return Err(invalid("physics.horizontal_rebound", "must be within 0..=1"));
        }
        if !p.min_rebound_speed.is_finite() || p.min_rebound_speed < 0.0 {
            return Err(invalid("physics.min_rebound_speed", "must be finite and >= 0"));
        }
        if !self.initial_height.is_finite() || self.initial_height <= 0.0 {
            return Err(invalid("initial_height", "must be finite and > 0"));
        }
        if !(self.drag.max_speed >= 0.0) {
            return Err(invalid("drag.max_speed", "must be >= 0"));
        }
        if self.viewport.max_x() < self.viewport.min_x() || !(self.viewport.scale > 0.0) {
            return Err(invalid(
                "viewport",
                "width must fit the ball and scale must be > 0",
            ));
        }
        let t = &self.timing;
        if !(MIN_TIME_STEP..=MAX_TIME_STEP).contains(&t.time_step) {
            return Err(invalid(
                "timing.time_step",
                format!("must be within {MIN_TIME_STEP}..={MAX_TIME_STEP}"),
            ));
        }
        if !(t.monitor_time_step > 0.0) || !t.monitor_time_step.is_finite() {
            return Err(invalid("timing.monitor_time_step", "must be finite and > 0"));
        }
        if !t.pace.is_finite() || t.pace < 0.0 {
            return Err(invalid("timing.pace", "must be finite and >= 0"));
        }
        if t.reconcile_every == 0 {
            return Err(invalid("timing.reconcile_every", "must be at least 1"));
        }
        Ok(())
    }

    /// Parse a settings document on top of the `variant` preset
    ///
    /// Fields the document leaves out keep the preset's values, so a file that
    /// only changes gravity still runs the console variant to its rebound
    /// limit. The document's own `variant` field never switches presets.
    pub fn from_json(json: &str, variant: Variant) -> Result<Self, serde_json::Error> {
        let overlay: Value = serde_json::from_str(json)?;
        if let Some(named) = overlay.get("variant") {
            match serde_json::from_value::<Variant>(named.clone()) {
                Ok(named) if named == variant => {}
                Ok(named) => log::warn!(
                    "Settings written for {}, applying them to {}",
                    named.as_str(),
                    variant.as_str()
                ),
                Err(e) => return Err(e),
            }
        }

        let mut merged = serde_json::to_value(Self::for_variant(variant))?;
        merge_json(&mut merged, overlay);
        let mut settings: Settings = serde_json::from_value(merged)?;
        settings.variant = variant;
        Ok(settings)
    }

    /// Load and validate settings from a JSON file over the `variant` preset
    pub fn load_from(path: impl AsRef<Path>, variant: Variant) -> Result<Self, SettingsError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|source| SettingsError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let settings =
            Self::from_json(&json, variant).map_err(|source| SettingsError::Parse {
                path: path.to_path_buf(),
                source,
            })?;
        settings.validate()?;
        log::info!("Loaded {} settings from {}", settings.variant.as_str(), path.display());
        Ok(settings)
    }

    /// Load from `$BOUNCE_SIM_SETTINGS` if set, otherwise variant defaults
    ///
    /// A broken file is logged and replaced by defaults; it never aborts startup.
    pub fn load(variant: Variant) -> Self {
        match std::env::var_os(SETTINGS_ENV) {
            Some(path) => match Self::load_from(&path, variant) {
                Ok(settings) => settings,
                Err(e) => {
                    log::warn!("{e}; using default settings");
                    Self::for_variant(variant)
                }
            },
            None => {
                log::info!("Using default {} settings", variant.as_str());
                Self::for_variant(variant)
            }
        }
    }

    /// Write settings as pretty JSON
    pub fn save_to(&self, path: impl AsRef<Path>) -> Result<(), SettingsError> {
        let path = path.as_ref();
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json).map_err(|source| SettingsError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        log::info!("Settings saved to {}", path.display());
        Ok(())
    }
}

/// Recursively overwrite `base` with every field present in `overlay`
fn merge_json(base: &mut Value, overlay: Value) {
    match (base, overlay) {
        (Value::Object(base), Value::Object(overlay)) => {
            for (key, value) in overlay {
                match base.get_mut(&key) {
                    Some(slot) => merge_json(slot, value),
                    None => {
                        base.insert(key, value);
                    }
                }
            }
        }
        (slot, value) => *slot = value,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_variant_defaults_validate() {
        for variant in [Variant::Console, Variant::Interactive] {
            let settings = Settings::for_variant(variant);
            assert!(settings.validate().is_ok(), "{} invalid", variant.as_str());
        }
    }

    #[test]
    fn test_console_variant_values() {
        let settings = Settings::for_variant(Variant::Console);
        assert_eq!(settings.timing.time_step, 1.0);
        assert_eq!(settings.physics.order, IntegrationOrder::SecondOrder);
        assert_eq!(settings.physics.termination, Termination::AfterRebounds(3));
        assert_eq!(settings.physics.vertical_rebound, 0.5);
    }

    #[test]
    fn test_termination() {
        assert!(!Termination::Never.is_reached(u32::MAX));
        assert!(!Termination::AfterRebounds(3).is_reached(2));
        assert!(Termination::AfterRebounds(3).is_reached(3));
    }

    #[test]
    fn test_viewport_height_mapping() {
        let vp = Viewport::default();
        // Resting on the ground
        assert_eq!(vp.ball_y(0.0), GROUND_Y - BALL_RADIUS);
        let y = vp.ball_y(42.0);
        assert!((vp.height_at(y) - 42.0).abs() < 1e-4);
        assert_eq!(vp.min_x(), 20.0);
        assert_eq!(vp.max_x(), 780.0);
    }

    #[test]
    fn test_validate_rejects_bad_coefficient() {
        let mut settings = Settings::default();
        settings.physics.vertical_rebound = 1.5;
        assert!(matches!(
            settings.validate(),
            Err(SettingsError::Invalid { field: "physics.vertical_rebound", .. })
        ));
    }

    #[test]
    fn test_partial_json_keeps_preset() {
        let json = r#"{ "physics": { "gravity": 1.62 } }"#;
        let settings = Settings::from_json(json, Variant::Console).unwrap();
        assert_eq!(settings.physics.gravity, 1.62);
        assert_eq!(
            settings,
            Settings {
                physics: PhysicsConfig {
                    gravity: 1.62,
                    ..Settings::for_variant(Variant::Console).physics
                },
                ..Settings::for_variant(Variant::Console)
            }
        );

        let settings = Settings::from_json(json, Variant::Interactive).unwrap();
        assert_eq!(settings.physics.vertical_rebound, 1.0);
        assert_eq!(settings.physics.termination, Termination::Never);
    }

    #[test]
    fn test_console_file_with_only_gravity_still_ends_after_three_rebounds() {
        let path = std::env::temp_dir()
            .join(format!("bounce-sim-gravity-{}.json", std::process::id()));
        std::fs::write(&path, r#"{"variant":"Console","physics":{"gravity":9.8}}"#).unwrap();
        let loaded = Settings::load_from(&path, Variant::Console);
        let _ = std::fs::remove_file(&path);

        let settings = loaded.unwrap();
        assert_eq!(settings.variant, Variant::Console);
        assert_eq!(settings.physics.termination, Termination::AfterRebounds(3));
        assert_eq!(settings.physics.order, IntegrationOrder::SecondOrder);
        assert_eq!(settings.physics.min_rebound_speed, 0.0);
        assert_eq!(settings.timing.time_step, 1.0);
    }

    #[test]
    fn test_file_variant_does_not_switch_preset() {
        let settings = Settings::from_json(r#"{ "variant": "Interactive" }"#, Variant::Console)
            .unwrap();
        assert_eq!(settings, Settings::for_variant(Variant::Console));
    }

    #[test]
    fn test_overlay_replaces_enum_values() {
        let json = r#"{ "physics": { "termination": { "AfterRebounds": 5 } } }"#;
        let settings = Settings::from_json(json, Variant::Console).unwrap();
        assert_eq!(settings.physics.termination, Termination::AfterRebounds(5));

        let json = r#"{ "physics": { "termination": "Never", "order": "FirstOrder" } }"#;
        let settings = Settings::from_json(json, Variant::Console).unwrap();
        assert_eq!(settings.physics.termination, Termination::Never);
        assert_eq!(settings.physics.order, IntegrationOrder::FirstOrder);
        assert_eq!(settings.timing.time_step, 1.0);
    }

    #[test]
    fn test_malformed_documents_are_rejected() {
        assert!(Settings::from_json("[1, 2]", Variant::Console).is_err());
        assert!(Settings::from_json(r#"{ "variant": "Pygame" }"#, Variant::Console).is_err());
        assert!(Settings::from_json(r#"{ "physics": { "gravity": "high" } }"#, Variant::Console).is_err());
    }

    #[test]
    fn test_save_and_load_file() {
        let path = std::env::temp_dir().join(format!("bounce-sim-{}.json", std::process::id()));
        let mut settings = Settings::for_variant(Variant::Console);
        settings.initial_height = 12.5;
        settings.save_to(&path).unwrap();
        let loaded = Settings::load_from(&path, Variant::Console).unwrap();
        let _ = std::fs::remove_file(&path);
        assert_eq!(loaded, settings);
    }

    #[test]
    fn test_load_missing_file_is_io_error() {
        let err = Settings::load_from("/nonexistent/bounce-sim.json", Variant::Console).unwrap_err();
        assert!(matches!(err, SettingsError::Io { .. }));
    }
}
