//! Render side of the preview: what to draw, in which color, for the
//! current visibility flags and sequential window.

pub mod assembler;
pub mod color_policy;
pub mod palette;
pub mod readback;
pub mod sequential;
pub mod visibility;

pub use assembler::{
    assemble, is_move_visible, AssemblyInput, InstanceRange, RangeCap, RenderFrame, RenderPath,
};
pub use color_policy::{ColorPolicy, ExtrusionRanges, PathColorizer, RangeMetric, ValueRange};
pub use readback::{resolve_position, CpuReadback, IndexAddress, PositionQuery};
pub use sequential::{RangeState, SeqRange, SequentialView};
pub use visibility::VisibilityFilter;
