//! GCodeView Settings Crate
//!
//! Handles the preview tunables and their persistence.

pub mod config;
pub mod error;

pub use config::{
    BufferSettings, DisplaySettings, GeometrySettings, LayerSettings, PreviewConfig,
    DEFAULT_MAX_INDEX_BUFFER_BYTES, END_CAP_INDICES, INDEX_SIZE_BYTES, MAX_ADDRESSABLE_VERTICES,
    MAX_INDICES_PER_SEGMENT, MAX_VERTICES_PER_SEGMENT,
};
pub use error::{ConfigError, SettingsError, SettingsResult};
