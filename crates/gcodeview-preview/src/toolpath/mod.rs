//! Toolpath geometry
//!
//! The compiled, read-only form of a move stream: per-kind buffers, the
//! sequential id map, the layer table and the path index.

pub mod bounds;
pub mod buffers;
pub mod compiler;
pub mod ids;
pub mod index;
pub mod layers;
pub mod paths;
pub mod smoothing;
pub mod tube;

pub use bounds::BoundingBox;
pub use buffers::{
    IndexBuffer, IndexType, InstanceBuffer, InstanceRecord, PrimitiveKind, ToolpathBuffer,
    VertexAddress, VertexFormat,
};
pub use compiler::GeometryCompiler;
pub use ids::SeqIdMap;
pub use index::{IndexEntry, MoveLocation, PathIndex};
pub use layers::{Layer, Layers};
pub use paths::{Endpoint, Path, SubPath};
pub use smoothing::smooth_corners;

use gcodeview_core::MoveKind;

/// Counters collected while compiling
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CompileStats {
    pub moves: usize,
    pub segments: usize,
    pub vertex_buffers: usize,
    pub index_buffers: usize,
    pub vertices: usize,
    pub indices: usize,
    pub instances: usize,
    pub paths: usize,
    pub layers: usize,
    /// Joints filled with two miter triangles
    pub mitered_corners: usize,
    /// Joints closed by moving side vertices
    pub welded_corners: usize,
    /// Joints whose lead slot holds degenerate triangles
    pub placeholder_corners: usize,
}

/// Compiled geometry of one move stream
#[derive(Debug, Clone, PartialEq)]
pub struct ToolpathGeometry {
    /// One buffer per [`MoveKind::BUFFERED`] kind, in slot order
    pub buffers: Vec<ToolpathBuffer>,
    pub ids: SeqIdMap,
    pub layers: Layers,
    pub index: PathIndex,
    /// Extrusions only
    pub bounds: BoundingBox,
    /// Every positioned move
    pub max_bounds: BoundingBox,
    pub stats: CompileStats,
}

impl Default for ToolpathGeometry {
    fn default() -> Self {
        Self {
            buffers: MoveKind::BUFFERED
                .iter()
                .map(|k| ToolpathBuffer::new(*k))
                .collect(),
            ids: SeqIdMap::default(),
            layers: Layers::default(),
            index: PathIndex::default(),
            bounds: BoundingBox::empty(),
            max_bounds: BoundingBox::empty(),
            stats: CompileStats::default(),
        }
    }
}

impl ToolpathGeometry {
    pub fn is_empty(&self) -> bool {
        self.buffers.iter().all(ToolpathBuffer::is_empty)
    }

    pub fn buffer(&self, kind: MoveKind) -> Option<&ToolpathBuffer> {
        self.buffers.get(kind.buffer_slot()?)
    }

    /// Index range or instance slot drawing move `s_id`
    pub fn locate(&self, s_id: usize) -> Option<MoveLocation> {
        self.index.locate(s_id, &self.buffers, &self.ids)
    }

    /// Sequential id drawn at `location`
    pub fn decode(&self, location: &MoveLocation) -> Option<usize> {
        self.index.decode(location, &self.buffers, &self.ids)
    }
}
