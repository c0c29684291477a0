//! # GCodeView
//!
//! Toolpath geometry buffering and selection engine for 3D-printer G-code
//! previews.
//!
//! ## Architecture
//!
//! GCodeView is organized as a workspace with multiple crates:
//!
//! 1. **gcodeview-core** - Move records, move kinds, extrusion roles, colors, errors
//! 2. **gcodeview-settings** - Preview tunables and their persistence
//! 3. **gcodeview-preview** - Geometry compiler, corner smoothing, path and layer
//!    indices, render-path assembler and the `ToolpathPreview` façade
//! 4. **gcodeview** - This crate and the `gcodeview` binary

pub use gcodeview_core::{
    Color, Error, ExtrusionRole, GeometryError, MoveKind, MoveRecord, MoveStream, Result,
    StreamError, StreamMetadata, Vec3, ViewType,
};
pub use gcodeview_preview::{
    render, toolpath, GeometryCompiler, RangeState, RenderFrame, SeqRange, SequentialView,
    ToolpathGeometry, ToolpathPreview, VisibilityFilter,
};
pub use gcodeview_settings::{PreviewConfig, SettingsError};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Build date (set at compile time)
pub const BUILD_DATE: &str = env!("BUILD_DATE");

/// Initialize logging with the default configuration
///
/// Sets up structured logging with:
/// - Console output with pretty formatting
/// - RUST_LOG environment variable support, INFO otherwise
pub fn init_logging() -> anyhow::Result<()> {
    use tracing_subscriber::fmt;
    use tracing_subscriber::prelude::*;
    use tracing_subscriber::EnvFilter;

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let fmt_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_level(true)
        .with_thread_ids(true)
        .with_thread_names(true)
        .with_line_number(true)
        .pretty();

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .try_init()?;

    Ok(())
}
