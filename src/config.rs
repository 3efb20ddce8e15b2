//! Configuration: settings and the position registry.
//!
//! Handles loading, validating, updating and saving the configuration file.
//! The file has two sections that matter to the card pipeline, `settings`
//! (flat key/value) and `positions` (keyed by position id), plus an optional
//! `processing` table.
//!
//! ## Config File
//!
//! ```toml
//! # All options are optional - defaults shown below
//!
//! [settings]
//! photos_dir = "photos"              # One sub-directory per product id
//! infographics_dir = "infografika"   # Overlay PNGs, referenced by name
//! output_dir = "output"              # Base output dir (suffixed _1, _2, ... if taken)
//! dataset_path = "data.xlsx"         # Workbook, CSV, or directory of CSVs
//! dataset_header_row = true          # First row of each sheet is a header
//! canvas_width = 900
//! canvas_height = 1200
//! margin = 30
//!
//! [positions.1]
//! x = "MARGIN"
//! y = "MARGIN"
//! anchor = "top-left"
//!
//! [processing]
//! max_processes = 4                  # Omit for auto = CPU cores
//! ```
//!
//! A file ending in `.json` is read and written as JSON with the same shape.
//! The legacy keys `infografika_dir` and `excel_file` are accepted as
//! aliases. Unknown keys in `settings` are rejected to catch typos early.

use crate::imaging::CanvasSpec;
use crate::position::{Anchor, PositionDefinition, PositionError, PositionRegistry};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::warn;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("TOML write error: {0}")]
    TomlSer(#[from] toml::ser::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
    #[error("Position '{0}' is not defined")]
    UnknownPosition(String),
    #[error("Position '{0}' already exists")]
    DuplicatePosition(String),
    #[error(transparent)]
    Formula(#[from] PositionError),
}

/// Default configuration file name.
pub const DEFAULT_CONFIG_FILE: &str = "infocard.toml";

/// Canvas sizes offered as presets, `(name, width, height)`.
pub const CANVAS_PRESETS: &[(&str, u32, u32)] = &[
    ("2000x3000", 2000, 3000),
    ("1000x1500", 1000, 1500),
    ("900x1200", 900, 1200),
];

/// Full configuration: settings, positions and processing options.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub settings: Settings,
    pub positions: PositionRegistry,
    pub processing: ProcessingConfig,
}

/// Canvas geometry and filesystem locations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    /// Root of the per-product photo folders.
    pub photos_dir: PathBuf,
    /// Directory of overlay PNGs.
    #[serde(alias = "infografika_dir")]
    pub infographics_dir: PathBuf,
    /// Base output directory.
    pub output_dir: PathBuf,
    /// Tabular dataset describing overlays per product and slide.
    #[serde(alias = "excel_file")]
    pub dataset_path: PathBuf,
    /// Whether the first row of every sheet is a header.
    pub dataset_header_row: bool,
    pub canvas_width: u32,
    pub canvas_height: u32,
    pub margin: u32,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            photos_dir: PathBuf::from("photos"),
            infographics_dir: PathBuf::from("infografika"),
            output_dir: PathBuf::from("output"),
            dataset_path: PathBuf::from("data.xlsx"),
            dataset_header_row: true,
            canvas_width: 900,
            canvas_height: 1200,
            margin: 30,
        }
    }
}

impl Settings {
    pub fn canvas(&self) -> CanvasSpec {
        CanvasSpec {
            width: self.canvas_width,
            height: self.canvas_height,
            margin: self.margin,
        }
    }

    /// Validate values are within acceptable ranges.
    ///
    /// A margin of half the shorter side or more is suspicious but allowed;
    /// it is logged rather than rejected.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.canvas_width == 0 || self.canvas_height == 0 {
            return Err(ConfigError::Validation(
                "settings.canvas_width and settings.canvas_height must be non-zero".into(),
            ));
        }
        if self.margin >= self.canvas_width.min(self.canvas_height) / 2 {
            warn!(
                margin = self.margin,
                width = self.canvas_width,
                height = self.canvas_height,
                "margin is at least half the shorter canvas side"
            );
        }
        Ok(())
    }
}

/// Partial settings update; `None` fields are left unchanged.
#[derive(Debug, Clone, Default)]
pub struct SettingsUpdate {
    pub photos_dir: Option<PathBuf>,
    pub infographics_dir: Option<PathBuf>,
    pub output_dir: Option<PathBuf>,
    pub dataset_path: Option<PathBuf>,
    pub dataset_header_row: Option<bool>,
    pub canvas_width: Option<u32>,
    pub canvas_height: Option<u32>,
    pub margin: Option<u32>,
}

impl SettingsUpdate {
    pub fn is_empty(&self) -> bool {
        self.photos_dir.is_none()
            && self.infographics_dir.is_none()
            && self.output_dir.is_none()
            && self.dataset_path.is_none()
            && self.dataset_header_row.is_none()
            && self.canvas_width.is_none()
            && self.canvas_height.is_none()
            && self.margin.is_none()
    }

    fn apply(self, settings: &mut Settings) {
        if let Some(v) = self.photos_dir {
            settings.photos_dir = v;
        }
        if let Some(v) = self.infographics_dir {
            settings.infographics_dir = v;
        }
        if let Some(v) = self.output_dir {
            settings.output_dir = v;
        }
        if let Some(v) = self.dataset_path {
            settings.dataset_path = v;
        }
        if let Some(v) = self.dataset_header_row {
            settings.dataset_header_row = v;
        }
        if let Some(v) = self.canvas_width {
            settings.canvas_width = v;
        }
        if let Some(v) = self.canvas_height {
            settings.canvas_height = v;
        }
        if let Some(v) = self.margin {
            settings.margin = v;
        }
    }
}

/// Parallel processing settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProcessingConfig {
    /// Maximum number of parallel workers.
    /// When absent, defaults to the number of CPU cores.
    /// Values larger than the core count are clamped down.
    pub max_processes: Option<usize>,
}

/// Resolve the effective thread count from config.
///
/// - `None` → use all available cores
/// - `Some(n)` → use `min(n, cores)`, at least 1
pub fn effective_threads(config: &ProcessingConfig) -> usize {
    let cores = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    config
        .max_processes
        .map(|n| n.clamp(1, cores))
        .unwrap_or(cores)
}

/// Parse a canvas size like `900x1200` (also accepts `900X1200`, `900×1200`).
pub fn parse_canvas_size(s: &str) -> Option<(u32, u32)> {
    let (w, h) = s.trim().split_once(['x', 'X', '×'])?;
    let w: u32 = w.trim().parse().ok()?;
    let h: u32 = h.trim().parse().ok()?;
    (w > 0 && h > 0).then_some((w, h))
}

fn is_json(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("json"))
}

impl Config {
    /// Parse configuration text. Missing keys take their defaults.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(content)?;
        config.settings.validate()?;
        Ok(config)
    }

    pub fn from_json_str(content: &str) -> Result<Self, ConfigError> {
        let config: Config = serde_json::from_str(content)?;
        config.settings.validate()?;
        Ok(config)
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Apply a partial update, rejecting it if the result is invalid.
    pub fn update_settings(&mut self, update: SettingsUpdate) -> Result<(), ConfigError> {
        let mut next = self.settings.clone();
        update.apply(&mut next);
        next.validate()?;
        self.settings = next;
        Ok(())
    }

    pub fn positions(&self) -> &PositionRegistry {
        &self.positions
    }

    /// Register a new position. Both formulas must compile.
    pub fn add_position(
        &mut self,
        id: &str,
        definition: PositionDefinition,
    ) -> Result<(), ConfigError> {
        if self.positions.contains(id) {
            return Err(ConfigError::DuplicatePosition(id.to_string()));
        }
        definition.compile(id)?;
        self.positions.insert(id, definition);
        Ok(())
    }

    /// Replace the formulas of an existing position; the anchor only
    /// changes when given.
    pub fn update_position(
        &mut self,
        id: &str,
        x: &str,
        y: &str,
        anchor: Option<Anchor>,
    ) -> Result<(), ConfigError> {
        let current = self
            .positions
            .get(id)
            .ok_or_else(|| ConfigError::UnknownPosition(id.to_string()))?;
        let updated = PositionDefinition::new(x, y, anchor.unwrap_or(current.anchor));
        updated.compile(id)?;
        self.positions.insert(id, updated);
        Ok(())
    }

    /// Remove a position; returns whether it existed.
    pub fn delete_position(&mut self, id: &str) -> bool {
        self.positions.remove(id).is_some()
    }

    /// Write the configuration, as JSON when the path ends in `.json`.
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let content = if is_json(path) {
            serde_json::to_string_pretty(self)?
        } else {
            toml::to_string_pretty(self)?
        };
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, content)?;
        Ok(())
    }
}

/// Load configuration from `path`.
///
/// Returns the defaults if the file does not exist. Returns `Err` if the
/// file exists but cannot be parsed or fails validation.
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    if !path.exists() {
        return Ok(Config::default());
    }
    let content = fs::read_to_string(path)?;
    if is_json(path) {
        Config::from_json_str(&content)
    } else {
        Config::from_toml_str(&content)
    }
}

/// Load configuration, falling back to the defaults when the file is
/// unreadable or invalid. The failure is logged.
pub fn load_config_or_default(path: &Path) -> Config {
    load_config(path).unwrap_or_else(|e| {
        warn!(path = %path.display(), error = %e, "falling back to default configuration");
        Config::default()
    })
}

/// Returns a fully-commented stock configuration with all keys explained.
///
/// Used by the `gen-config` CLI command.
pub fn stock_config_toml() -> &'static str {
    r##"# Infocard Configuration
# ======================
# All settings are optional. Values shown below are the defaults.
# Unknown keys in [settings] will cause an error.

[settings]
# Root directory holding one sub-directory per product id.
# Photos inside each product directory are ordered by file name.
photos_dir = "photos"

# Directory of overlay PNGs. The dataset refers to them by name
# without extension: "badge" -> infografika/badge.png
infographics_dir = "infografika"

# Base output directory. An existing directory is never overwritten:
# the run writes to output_1, output_2, ... instead.
output_dir = "output"

# Dataset: .xlsx/.xls/.ods workbook (every sheet is a pass), a .csv file,
# or a directory of .csv files (one sheet per file).
# Column 0 is the product id; then (overlay name, position id) pairs,
# one pair per photo in order.
dataset_path = "data.xlsx"

# Skip the first row of every sheet (column titles).
dataset_header_row = true

# Output canvas size in pixels. Presets: 2000x3000, 1000x1500, 900x1200.
canvas_width = 900
canvas_height = 1200

# Margin in pixels, available to position formulas as MARGIN.
margin = 30

# ---------------------------------------------------------------------------
# Positions
# ---------------------------------------------------------------------------
# Each position has an x and a y formula and an anchor.
# Formula variables: canvas_width, canvas_height, overlay_width,
# overlay_height, MARGIN. Operators: + - * // ( ).
# Anchors: top-left, top-center, top-right, middle-left, middle-center,
# middle-right, bottom-left, bottom-center, bottom-right.
#
# [positions.1]
# x = "MARGIN"
# y = "MARGIN"
# anchor = "top-left"
#
# [positions.2]
# x = "canvas_width - MARGIN"
# y = "canvas_height - MARGIN"
# anchor = "bottom-right"

# ---------------------------------------------------------------------------
# Processing
# ---------------------------------------------------------------------------
[processing]
# Maximum parallel workers.
# Omit or comment out to auto-detect (= number of CPU cores).
# max_processes = 4
"##
}
