//! Speller settings loaded from TOML.
//!
//! - `parse_settings_toml(toml)` parses and validates a complete settings file
//! - `Settings::default()` parses the embedded `default_settings.toml`
//! - `ScanConfig` is the `[scan]` section, validated on its own so that live
//!   updates go through the same checks as startup

use std::collections::BTreeMap;

use serde::Deserialize;

pub const DEFAULT_SETTINGS_TOML: &str = include_str!("default_settings.toml");

/// Returns the embedded default settings TOML content.
pub fn default_toml() -> &'static str {
    DEFAULT_SETTINGS_TOML
}

/// Rejected configuration. Fatal to session creation, never raised mid-scan.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("TOML parse error: {0}")]
    Parse(String),
    #[error("invalid value for {field}: {reason}")]
    InvalidValue { field: String, reason: String },
}

impl ConfigError {
    pub(crate) fn invalid(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidValue {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

/// How a switch activation is interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivationMode {
    /// Activation advances the highlight; a second activation inside the
    /// confirm window selects.
    Step,
    /// Activation (on switch release) selects the highlighted target.
    SelectOnRelease,
}

/// Where scanning restarts after a leaf has been selected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReturnLevel {
    /// First child of the root group.
    Root,
    /// First child of the group the selected leaf belongs to.
    Group,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ScanConfig {
    pub dwell_ms: u64,
    pub activation_mode: ActivationMode,
    pub repeat_scan_count: u32,
    pub debounce_ms: u64,
    #[serde(default = "default_confirm_window_ms")]
    pub confirm_window_ms: u64,
    #[serde(default = "default_return_level")]
    pub return_level: ReturnLevel,
}

fn default_confirm_window_ms() -> u64 {
    600
}

fn default_return_level() -> ReturnLevel {
    ReturnLevel::Root
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            dwell_ms: 1000,
            activation_mode: ActivationMode::SelectOnRelease,
            repeat_scan_count: 3,
            debounce_ms: 50,
            confirm_window_ms: default_confirm_window_ms(),
            return_level: default_return_level(),
        }
    }
}

impl ScanConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.dwell_ms == 0 {
            return Err(ConfigError::invalid("scan.dwell_ms", "must be positive"));
        }
        if self.repeat_scan_count == 0 {
            return Err(ConfigError::invalid(
                "scan.repeat_scan_count",
                "must be positive",
            ));
        }
        // A debounce window as long as the dwell would swallow every
        // deliberate press that follows a highlight change.
        if self.debounce_ms >= self.dwell_ms {
            return Err(ConfigError::invalid(
                "scan.debounce_ms",
                "must be shorter than scan.dwell_ms",
            ));
        }
        if self.activation_mode == ActivationMode::Step && self.confirm_window_ms == 0 {
            return Err(ConfigError::invalid(
                "scan.confirm_window_ms",
                "must be positive in step mode",
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct PredictionSettings {
    pub max_candidates: usize,
    pub max_context_chars: usize,
    pub refresh_debounce_ms: u64,
    pub beam_width: usize,
    pub max_word_length: usize,
}

impl Default for PredictionSettings {
    fn default() -> Self {
        Self {
            max_candidates: 5,
            max_context_chars: 200,
            refresh_debounce_ms: 150,
            beam_width: 25,
            max_word_length: 10,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct KeyboardSettings {
    /// Name the `[keyboard]` table is switched to by; `main` when unset.
    /// Tables under `[keyboards]` are named by their key instead.
    #[serde(default)]
    pub name: Option<String>,
    pub rows: Vec<Vec<String>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ActionSettings {
    #[serde(default)]
    pub column: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub scan: ScanConfig,
    pub prediction: PredictionSettings,
    pub keyboard: KeyboardSettings,
    /// Further keyboards reachable through `{switch:<name>}` keys.
    #[serde(default)]
    pub keyboards: BTreeMap<String, KeyboardSettings>,
    #[serde(default = "empty_actions")]
    pub actions: ActionSettings,
}

fn empty_actions() -> ActionSettings {
    ActionSettings { column: Vec::new() }
}

impl Default for Settings {
    fn default() -> Self {
        parse_settings_toml(DEFAULT_SETTINGS_TOML).expect("embedded settings TOML must be valid")
    }
}

pub fn parse_settings_toml(toml_str: &str) -> Result<Settings, ConfigError> {
    let s: Settings = toml::from_str(toml_str).map_err(|e| ConfigError::Parse(e.to_string()))?;
    validate(&s)?;
    Ok(s)
}

fn validate(s: &Settings) -> Result<(), ConfigError> {
    macro_rules! check_positive_usize {
        ($section:ident . $field:ident) => {
            if s.$section.$field == 0 {
                return Err(ConfigError::invalid(
                    concat!(stringify!($section), ".", stringify!($field)),
                    "must be positive",
                ));
            }
        };
    }

    s.scan.validate()?;

    check_positive_usize!(prediction.max_candidates);
    check_positive_usize!(prediction.max_context_chars);
    check_positive_usize!(prediction.beam_width);
    check_positive_usize!(prediction.max_word_length);

    check_rows("keyboard", &s.keyboard)?;
    for (name, keyboard) in &s.keyboards {
        check_rows(&format!("keyboards.{name}"), keyboard)?;
    }

    // Key tokens and switch targets are checked when the layouts are built;
    // do it here too so a bad file is rejected before any session exists.
    crate::tree::KeyboardSet::from_settings(s)?;

    Ok(())
}

fn check_rows(section: &str, keyboard: &KeyboardSettings) -> Result<(), ConfigError> {
    if keyboard.rows.is_empty() {
        return Err(ConfigError::invalid(
            format!("{section}.rows"),
            "must not be empty",
        ));
    }
    for (i, row) in keyboard.rows.iter().enumerate() {
        if row.is_empty() {
            return Err(ConfigError::invalid(
                format!("{section}.rows[{i}]"),
                "must not be empty",
            ));
        }
    }
    Ok(())
}
