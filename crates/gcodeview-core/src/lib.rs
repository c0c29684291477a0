//! # GCodeView Core
//!
//! Core types shared by the GCodeView crates: the move records produced by
//! the slicing engine, RGBA colors, color-coding modes, and the error types
//! used across the preview engine.

pub mod color;
pub mod error;
pub mod moves;
pub mod view;

pub use color::Color;
pub use error::{ColorError, Error, GeometryError, Result, StreamError};
pub use moves::{
    round_to_bin, ExtrusionRole, MoveKind, MoveRecord, MoveStream, SpiralVaseLayer,
    StreamMetadata, MAX_EXTRUDERS,
};
pub use view::ViewType;

/// Re-export of the vector type used for positions
pub use glam::Vec3;
