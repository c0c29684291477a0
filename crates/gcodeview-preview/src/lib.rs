//! # GCodeView Preview
//!
//! Toolpath geometry buffering and selection for G-code previews.
//!
//! [`toolpath`] compiles a move stream once into per-kind vertex and index
//! buffers, paths, a layer table and a path index. [`render`] re-derives
//! the draw ranges for the current visibility flags, color mode and
//! sequential window. [`ToolpathPreview`] ties both together.

pub mod preview;
pub mod render;
pub mod toolpath;

pub use preview::{decode_tool_colors, ToolpathPreview};
pub use render::{
    assemble, AssemblyInput, ColorPolicy, CpuReadback, ExtrusionRanges, InstanceRange,
    PathColorizer, PositionQuery, RangeCap, RangeState, RenderFrame, RenderPath, SeqRange,
    SequentialView, ValueRange, VisibilityFilter,
};
pub use toolpath::{
    BoundingBox, CompileStats, GeometryCompiler, MoveLocation, PathIndex, ToolpathBuffer,
    ToolpathGeometry,
};
