//! Configuration for the toolpath preview
//!
//! Provides the tunables of the geometry compiler and render-path
//! assembler. Supports JSON and TOML file formats stored in
//! platform-specific directories.
//!
//! Configuration is organized into logical sections:
//! - Buffer limits (vertex and index caps)
//! - Geometry thresholds (corner classification, wipe lift)
//! - Layer detection (height tolerance)
//! - Display defaults (color mode, dimming, neutral colors)

use crate::error::{ConfigError, SettingsError, SettingsResult};
use gcodeview_core::{Color, ViewType};
use serde::{Deserialize, Serialize};
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Highest vertex count a 16-bit index can address
pub const MAX_ADDRESSABLE_VERTICES: usize = 65536;

/// Default cap of a single index array, in bytes
pub const DEFAULT_MAX_INDEX_BUFFER_BYTES: usize = 64 * 1024 * 1024;

/// Indices of a tube end cap (two triangles)
pub const END_CAP_INDICES: usize = 6;

/// Vertices of the first tube segment of a buffer, the largest per-segment need
pub const MAX_VERTICES_PER_SEGMENT: usize = 8;

/// Indices of one tube segment plus a trailing end cap, the largest per-segment need
pub const MAX_INDICES_PER_SEGMENT: usize = 30 + END_CAP_INDICES;

/// Size of one index element in bytes
pub const INDEX_SIZE_BYTES: usize = std::mem::size_of::<u16>();

/// cos(45°)
pub const DEFAULT_SHARP_TURN_COSINE: f32 = 0.707_106_8;

/// cos(179°); turns tighter than this have no usable bisector
pub const DEFAULT_STRAIGHT_TURN_COSINE: f32 = -0.999_847_7;

/// Default height tolerance when grouping extrusions into layers
pub const DEFAULT_LAYER_Z_EPSILON: f64 = 1e-4;

/// Height of wipe moves above the deposited material
pub const WIPE_HEIGHT: f32 = 0.05;

/// Geometry buffer size limits
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct BufferSettings {
    /// Max vertices per vertex array, at most 65536
    pub max_vertices_per_buffer: usize,
    /// Max bytes per index array
    pub max_index_buffer_bytes: usize,
}

impl Default for BufferSettings {
    fn default() -> Self {
        Self {
            max_vertices_per_buffer: MAX_ADDRESSABLE_VERTICES,
            max_index_buffer_bytes: DEFAULT_MAX_INDEX_BUFFER_BYTES,
        }
    }
}

/// Tube corner classification and placement
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeometrySettings {
    /// Turns whose direction cosine falls below this are sharp
    pub sharp_turn_cosine: f32,
    /// Turns whose direction cosine falls below this are treated as reversals
    pub straight_turn_cosine: f32,
    /// Indices of a tube end cap; fixed by the tube layout
    pub end_cap_indices: usize,
    /// Z offset applied to wipe tubes
    pub wipe_lift: f32,
}

impl Default for GeometrySettings {
    fn default() -> Self {
        Self {
            sharp_turn_cosine: DEFAULT_SHARP_TURN_COSINE,
            straight_turn_cosine: DEFAULT_STRAIGHT_TURN_COSINE,
            end_cap_indices: END_CAP_INDICES,
            wipe_lift: 0.5 * WIPE_HEIGHT,
        }
    }
}

/// Layer detection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LayerSettings {
    /// Extrusions within this distance of the previous layer height join it
    pub z_epsilon: f64,
}

impl Default for LayerSettings {
    fn default() -> Self {
        Self {
            z_epsilon: DEFAULT_LAYER_Z_EPSILON,
        }
    }
}

/// Display defaults
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplaySettings {
    /// Active color-coding mode after load
    pub view_type: ViewType,
    /// Dim everything below the top visible layer
    pub top_layer_only: bool,
    /// Snap scrub bounds to the nearest visible move
    pub skip_invisible_moves: bool,
    /// Color for extruders the stream gives no color for
    pub default_tool_color: String,
    /// Color for dimmed paths and out-of-range values
    pub neutral_color: String,
}

impl Default for DisplaySettings {
    fn default() -> Self {
        Self {
            view_type: ViewType::FeatureType,
            top_layer_only: false,
            skip_invisible_moves: false,
            default_tool_color: "#FF8000".to_string(),
            neutral_color: "#404040".to_string(),
        }
    }
}

impl DisplaySettings {
    pub fn default_tool_color(&self) -> SettingsResult<Color> {
        parse_color("display.default_tool_color", &self.default_tool_color)
    }

    pub fn neutral_color(&self) -> SettingsResult<Color> {
        parse_color("display.neutral_color", &self.neutral_color)
    }
}

fn parse_color(key: &str, value: &str) -> SettingsResult<Color> {
    Color::from_hex(value).map_err(|_| {
        ConfigError::InvalidColor {
            key: key.to_string(),
            value: value.to_string(),
        }
        .into()
    })
}

/// Complete preview configuration
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PreviewConfig {
    pub buffers: BufferSettings,
    pub geometry: GeometrySettings,
    pub layers: LayerSettings,
    pub display: DisplaySettings,
}

impl PreviewConfig {
    /// Create new default config
    pub fn new() -> Self {
        Self::default()
    }

    /// Default location: `<config dir>/gcodeview/preview.toml`
    pub fn default_path() -> SettingsResult<PathBuf> {
        let dir = dirs::config_dir().ok_or_else(|| {
            SettingsError::ConfigDirectory("No platform config directory".to_string())
        })?;
        Ok(dir.join("gcodeview").join("preview.toml"))
    }

    /// Load config from file (JSON or TOML)
    pub fn load_from_file(path: &Path) -> SettingsResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            SettingsError::LoadError(format!("{}: {}", path.display(), e))
        })?;

        let config: Self = match Format::from_path(path)? {
            Format::Json => serde_json::from_str(&content)?,
            Format::Toml => toml::from_str(&content)?,
        };

        config.validate()?;
        debug!(path = %path.display(), "Loaded preview config");
        Ok(config)
    }

    /// Load from `path` when it exists, defaults otherwise
    pub fn load_or_default(path: &Path) -> SettingsResult<Self> {
        if path.exists() {
            Self::load_from_file(path)
        } else {
            debug!(path = %path.display(), "No preview config, using defaults");
            Ok(Self::default())
        }
    }

    /// Save config to file (JSON or TOML)
    pub fn save_to_file(&self, path: &Path) -> SettingsResult<()> {
        self.validate()?;

        let content = match Format::from_path(path)? {
            Format::Json => serde_json::to_string_pretty(self)?,
            Format::Toml => toml::to_string_pretty(self)?,
        };

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, content)
            .map_err(|e| SettingsError::SaveError(format!("{}: {}", path.display(), e)))?;

        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> SettingsResult<()> {
        let out_of_range = |key: &str, value: String| -> SettingsError {
            ConfigError::ValueOutOfRange {
                key: key.to_string(),
                value,
            }
            .into()
        };

        let vertices = self.buffers.max_vertices_per_buffer;
        if !(MAX_VERTICES_PER_SEGMENT..=MAX_ADDRESSABLE_VERTICES).contains(&vertices) {
            return Err(out_of_range(
                "buffers.max_vertices_per_buffer",
                vertices.to_string(),
            ));
        }

        let index_bytes = self.buffers.max_index_buffer_bytes;
        if index_bytes < MAX_INDICES_PER_SEGMENT * INDEX_SIZE_BYTES {
            return Err(out_of_range(
                "buffers.max_index_buffer_bytes",
                index_bytes.to_string(),
            ));
        }

        let sharp = self.geometry.sharp_turn_cosine;
        if !(-1.0..=1.0).contains(&sharp) {
            return Err(out_of_range("geometry.sharp_turn_cosine", sharp.to_string()));
        }

        let straight = self.geometry.straight_turn_cosine;
        if !(-1.0..=1.0).contains(&straight) || straight > sharp {
            return Err(out_of_range(
                "geometry.straight_turn_cosine",
                straight.to_string(),
            ));
        }

        if self.geometry.end_cap_indices != END_CAP_INDICES {
            return Err(out_of_range(
                "geometry.end_cap_indices",
                self.geometry.end_cap_indices.to_string(),
            ));
        }

        if !self.geometry.wipe_lift.is_finite() {
            return Err(out_of_range(
                "geometry.wipe_lift",
                self.geometry.wipe_lift.to_string(),
            ));
        }

        if !(self.layers.z_epsilon > 0.0 && self.layers.z_epsilon < 1.0) {
            return Err(out_of_range(
                "layers.z_epsilon",
                self.layers.z_epsilon.to_string(),
            ));
        }

        self.display.default_tool_color()?;
        self.display.neutral_color()?;

        Ok(())
    }

    /// Hash of every setting that affects compiled geometry
    pub fn geometry_fingerprint(&self) -> u64 {
        let mut hasher = DefaultHasher::new();
        self.buffers.hash(&mut hasher);
        self.geometry.sharp_turn_cosine.to_bits().hash(&mut hasher);
        self.geometry.straight_turn_cosine.to_bits().hash(&mut hasher);
        self.geometry.wipe_lift.to_bits().hash(&mut hasher);
        self.layers.z_epsilon.to_bits().hash(&mut hasher);
        hasher.finish()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Format {
    Json,
    Toml,
}

impl Format {
    fn from_path(path: &Path) -> SettingsResult<Self> {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("json") => Ok(Format::Json),
            Some("toml") => Ok(Format::Toml),
            other => Err(ConfigError::UnsupportedFormat(other.unwrap_or("").to_string()).into()),
        }
    }
}
