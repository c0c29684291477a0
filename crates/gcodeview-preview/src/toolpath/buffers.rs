//! # Geometry Buffers
//!
//! CPU-side vertex, index and instance arrays of one move kind, laid out
//! the way the draw layer uploads them.
//!
//! Vertex arrays are flat `f32` runs. Line vertices are 3 floats
//! (position); tube vertices are 4 floats where the last float carries a
//! normal packed into 3 bytes plus one padding byte. Every vertex array
//! holds at most 65536 vertices so its index arrays can use `u16`.

use super::paths::Path;
use bytemuck::{Pod, Zeroable};
use gcodeview_core::MoveKind;
use glam::Vec3;

/// Index element type of every index array
pub type IndexType = u16;

/// How a buffer's geometry is drawn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PrimitiveKind {
    Line,
    Triangle,
    InstancedModel,
}

impl PrimitiveKind {
    pub fn for_kind(kind: MoveKind) -> Self {
        if kind.is_line() {
            PrimitiveKind::Line
        } else if kind.is_tube() {
            PrimitiveKind::Triangle
        } else {
            PrimitiveKind::InstancedModel
        }
    }

    /// Vertices appended per straight segment, worst case
    pub fn max_vertices_per_segment(self) -> usize {
        match self {
            PrimitiveKind::Line => 2,
            PrimitiveKind::Triangle => 8,
            PrimitiveKind::InstancedModel => 0,
        }
    }

    /// Indices owned by one straight segment
    pub fn indices_per_segment(self) -> usize {
        match self {
            PrimitiveKind::Line => 2,
            PrimitiveKind::Triangle => 30,
            PrimitiveKind::InstancedModel => 0,
        }
    }
}

/// Per-vertex layout of a vertex array
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VertexFormat {
    /// position.xyz
    Position,
    /// position.xyz | normal packed as 3 bytes + padding
    PositionPackedNormal,
}

impl VertexFormat {
    pub fn floats(self) -> usize {
        match self {
            VertexFormat::Position => 3,
            VertexFormat::PositionPackedNormal => 4,
        }
    }

    pub fn size_bytes(self) -> usize {
        self.floats() * std::mem::size_of::<f32>()
    }
}

/// Explicit address of one vertex, stable across buffer growth
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct VertexAddress {
    /// Vertex array id within the owning buffer
    pub buffer: usize,
    /// Vertex index within that array
    pub vertex: usize,
}

impl VertexAddress {
    pub fn new(buffer: usize, vertex: usize) -> Self {
        Self { buffer, vertex }
    }

    pub fn offset(self, delta: usize) -> Self {
        Self {
            buffer: self.buffer,
            vertex: self.vertex + delta,
        }
    }
}

/// One index array and the vertex array it indexes
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IndexBuffer {
    pub vertex_buffer: usize,
    pub indices: Vec<IndexType>,
}

impl IndexBuffer {
    pub fn new(vertex_buffer: usize) -> Self {
        Self {
            vertex_buffer,
            indices: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.indices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    pub fn size_bytes(&self) -> usize {
        self.indices.len() * std::mem::size_of::<IndexType>()
    }
}

/// Marker instance: position.xyz | width | height
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct InstanceRecord {
    pub position: [f32; 3],
    pub width: f32,
    pub height: f32,
}

impl InstanceRecord {
    pub fn position(&self) -> Vec3 {
        Vec3::from_array(self.position)
    }
}

/// Instanced markers of one point-like move kind
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InstanceBuffer {
    pub records: Vec<InstanceRecord>,
    /// Sequential id per record, ascending
    pub s_ids: Vec<usize>,
    /// Offset from the marker to the previous tool position, per record
    pub offsets: Vec<Vec3>,
}

impl InstanceBuffer {
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn push(&mut self, record: InstanceRecord, s_id: usize, offset: Vec3) {
        self.records.push(record);
        self.s_ids.push(s_id);
        self.offsets.push(offset);
    }

    /// Index of the first record with id >= `s_id`
    pub fn lower_bound(&self, s_id: usize) -> usize {
        self.s_ids.partition_point(|&id| id < s_id)
    }

    /// Index of the first record with id > `s_id`
    pub fn upper_bound(&self, s_id: usize) -> usize {
        self.s_ids.partition_point(|&id| id <= s_id)
    }
}

/// All geometry of one move kind
#[derive(Debug, Clone, PartialEq)]
pub struct ToolpathBuffer {
    pub kind: MoveKind,
    pub primitive: PrimitiveKind,
    pub format: VertexFormat,
    pub vertices: Vec<Vec<f32>>,
    pub indices: Vec<IndexBuffer>,
    pub instances: InstanceBuffer,
    pub paths: Vec<Path>,
}

impl ToolpathBuffer {
    pub fn new(kind: MoveKind) -> Self {
        let primitive = PrimitiveKind::for_kind(kind);
        let format = match primitive {
            PrimitiveKind::Triangle => VertexFormat::PositionPackedNormal,
            _ => VertexFormat::Position,
        };
        Self {
            kind,
            primitive,
            format,
            vertices: Vec::new(),
            indices: Vec::new(),
            instances: InstanceBuffer::default(),
            paths: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty() && self.instances.is_empty()
    }

    pub fn vertex_count(&self, vertex_buffer: usize) -> usize {
        self.vertices
            .get(vertex_buffer)
            .map_or(0, |v| v.len() / self.format.floats())
    }

    pub fn total_vertices(&self) -> usize {
        (0..self.vertices.len()).map(|i| self.vertex_count(i)).sum()
    }

    pub fn total_indices(&self) -> usize {
        self.indices.iter().map(IndexBuffer::len).sum()
    }

    /// Vertex array `i` as raw bytes for upload
    pub fn vertex_bytes(&self, i: usize) -> Option<&[u8]> {
        self.vertices.get(i).map(|v| bytemuck::cast_slice(v.as_slice()))
    }

    /// Index array `i` as raw bytes for upload
    pub fn index_bytes(&self, i: usize) -> Option<&[u8]> {
        self.indices
            .get(i)
            .map(|b| bytemuck::cast_slice(b.indices.as_slice()))
    }

    pub fn instance_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(self.instances.records.as_slice())
    }

    pub fn index_at(&self, ibuffer: usize, offset: usize) -> Option<IndexType> {
        self.indices.get(ibuffer)?.indices.get(offset).copied()
    }

    pub fn position(&self, address: VertexAddress) -> Option<Vec3> {
        let stride = self.format.floats();
        let data = self.vertices.get(address.buffer)?;
        let start = address.vertex * stride;
        let p = data.get(start..start + 3)?;
        Some(Vec3::new(p[0], p[1], p[2]))
    }

    pub(crate) fn set_position(&mut self, address: VertexAddress, position: Vec3) -> bool {
        let stride = self.format.floats();
        let Some(data) = self.vertices.get_mut(address.buffer) else {
            return false;
        };
        let start = address.vertex * stride;
        match data.get_mut(start..start + 3) {
            Some(p) => {
                p.copy_from_slice(&position.to_array());
                true
            }
            None => false,
        }
    }

    /// Unpacked normal of a tube vertex
    pub fn normal(&self, address: VertexAddress) -> Option<Vec3> {
        if self.format != VertexFormat::PositionPackedNormal {
            return None;
        }
        let data = self.vertices.get(address.buffer)?;
        let packed = *data.get(address.vertex * 4 + 3)?;
        Some(unpack_normal(packed))
    }
}

/// Pack a unit normal into the bit pattern of one `f32`
pub fn pack_normal(normal: Vec3) -> f32 {
    let to_byte = |v: f32| ((v.clamp(-1.0, 1.0) + 1.0) * 127.5).round() as u8;
    f32::from_bits(u32::from_le_bytes([
        to_byte(normal.x),
        to_byte(normal.y),
        to_byte(normal.z),
        0,
    ]))
}

pub fn unpack_normal(packed: f32) -> Vec3 {
    let [x, y, z, _] = packed.to_bits().to_le_bytes();
    let from_byte = |b: u8| b as f32 / 127.5 - 1.0;
    Vec3::new(from_byte(x), from_byte(y), from_byte(z))
}
