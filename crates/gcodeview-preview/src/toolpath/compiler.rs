//! # Geometry Compiler
//!
//! Single pass over a move stream that fills one [`ToolpathBuffer`] per
//! move kind:
//! - travel moves become line segments (2 vertices, 2 indices each);
//! - extrude and wipe moves become tubes (30 indices per segment plus
//!   start/end caps), see [`super::tube`];
//! - point events become instance records.
//!
//! Buffers are split when a move would overflow the configured vertex or
//! index caps. A path that continues across a split gets a new sub-path.

use super::bounds::BoundingBox;
use super::buffers::{
    pack_normal, IndexBuffer, IndexType, InstanceRecord, PrimitiveKind, ToolpathBuffer,
    VertexAddress,
};
use super::ids::SeqIdMap;
use super::index::PathIndex;
use super::layers::Layers;
use super::paths::{Endpoint, Path};
use super::smoothing::smooth_corners;
use super::tube::{
    classify_corner, corner_indices, Corner, SegmentFrame, END_CAP, LEAD_INDICES, START_CAP,
    STEM_TRIANGLES,
};
use super::{CompileStats, ToolpathGeometry};
use gcodeview_core::{ExtrusionRole, GeometryError, MoveKind, MoveRecord, MoveStream, Result};
use gcodeview_settings::{
    BufferSettings, GeometrySettings, PreviewConfig, END_CAP_INDICES, INDEX_SIZE_BYTES,
};
use glam::Vec3;
use tracing::{debug, info, trace};

/// How the active buffer changed to make room for a move
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Split {
    None,
    /// New index array on the same vertex array
    Index,
    /// New vertex array and index array
    Vertex,
}

/// Last tube segment written to a buffer
#[derive(Debug, Clone, Copy)]
struct RingState {
    frame: SegmentFrame,
    half_width: f32,
}

/// Compiles move streams into toolpath geometry
#[derive(Debug, Clone)]
pub struct GeometryCompiler {
    limits: BufferSettings,
    geometry: GeometrySettings,
    z_epsilon: f64,
}

impl GeometryCompiler {
    pub fn new(config: &PreviewConfig) -> Self {
        Self {
            limits: config.buffers.clone(),
            geometry: config.geometry.clone(),
            z_epsilon: config.layers.z_epsilon,
        }
    }

    /// Reject streams with a move that cannot fit even an empty buffer
    pub fn check_capacity(&self, moves: &[MoveRecord]) -> std::result::Result<(), GeometryError> {
        for (move_index, record) in moves.iter().enumerate() {
            if !record.is_finite() {
                return Err(GeometryError::NonFinitePosition { move_index });
            }
            let (vertices, indices) = worst_case(record);
            let index_bytes = indices * INDEX_SIZE_BYTES;
            if vertices > self.limits.max_vertices_per_buffer
                || index_bytes > self.limits.max_index_buffer_bytes
            {
                return Err(GeometryError::MoveTooLarge {
                    move_index,
                    vertices,
                    index_bytes,
                    max_vertices: self.limits.max_vertices_per_buffer,
                    max_index_bytes: self.limits.max_index_buffer_bytes,
                });
            }
        }
        Ok(())
    }

    /// Build buffers, paths, layers and the path index for `stream`
    pub fn compile(&self, stream: &MoveStream) -> Result<ToolpathGeometry> {
        stream.validate()?;
        self.check_capacity(&stream.moves)?;

        let moves = stream.moves.as_slice();
        let ids = SeqIdMap::build(moves);
        let mut builder = Builder::new(&self.limits, &self.geometry);

        for (raw, record) in moves.iter().enumerate() {
            let (Some(slot), Some(s_id)) = (record.kind.buffer_slot(), ids.seq(raw)) else {
                continue;
            };
            builder.stats.moves += 1;

            if record.kind.is_marker() {
                let prev = raw.checked_sub(1).and_then(|p| moves.get(p));
                builder.add_marker(slot, record, prev, s_id);
                continue;
            }

            let Some(prev) = raw.checked_sub(1).and_then(|p| moves.get(p)) else {
                continue;
            };
            let next = moves.get(raw + 1);
            builder.add_move(slot, prev, record, next, s_id);
        }

        let Builder {
            mut buffers,
            mut stats,
            ..
        } = builder;

        for buffer in buffers.iter_mut().filter(|b| b.kind.is_tube()) {
            stats.welded_corners += smooth_corners(buffer, moves, &ids, &self.geometry);
        }

        let layers = if stream.metadata.spiral_vase_layers.is_empty() {
            Layers::build(moves, &ids, self.z_epsilon)
        } else {
            debug!(
                layers = stream.metadata.spiral_vase_layers.len(),
                "Using spiral vase layer table"
            );
            Layers::from_spiral_vase(&stream.metadata.spiral_vase_layers)
        };

        let (bounds, max_bounds) = toolpath_bounds(moves);
        let index = PathIndex::build(&buffers);

        stats.vertex_buffers = buffers.iter().map(|b| b.vertices.len()).sum();
        stats.index_buffers = buffers.iter().map(|b| b.indices.len()).sum();
        stats.vertices = buffers.iter().map(ToolpathBuffer::total_vertices).sum();
        stats.indices = buffers.iter().map(ToolpathBuffer::total_indices).sum();
        stats.instances = buffers.iter().map(|b| b.instances.len()).sum();
        stats.paths = buffers.iter().map(|b| b.paths.len()).sum();
        stats.layers = layers.len();

        info!(
            stream = stream.id,
            moves = stats.moves,
            segments = stats.segments,
            vertex_buffers = stats.vertex_buffers,
            index_buffers = stats.index_buffers,
            indices = stats.indices,
            paths = stats.paths,
            layers = stats.layers,
            mitered = stats.mitered_corners,
            welded = stats.welded_corners,
            "Compiled toolpaths"
        );

        Ok(ToolpathGeometry {
            buffers,
            ids,
            layers,
            index,
            bounds,
            max_bounds,
            stats,
        })
    }
}

/// Vertices and indices a move needs in the worst case
fn worst_case(record: &MoveRecord) -> (usize, usize) {
    let primitive = PrimitiveKind::for_kind(record.kind);
    let segments = record.segment_count();
    let cap = if primitive == PrimitiveKind::Triangle {
        END_CAP_INDICES
    } else {
        0
    };
    (
        segments * primitive.max_vertices_per_segment(),
        segments * primitive.indices_per_segment() + cap,
    )
}

/// Extrusion box and the box of every move
fn toolpath_bounds(moves: &[MoveRecord]) -> (BoundingBox, BoundingBox) {
    let mut bounds = BoundingBox::empty();
    let mut max_bounds = BoundingBox::empty();
    for record in moves.iter().filter(|m| m.kind != MoveKind::Noop) {
        max_bounds.merge(record.position);
        if record.kind == MoveKind::Extrude
            && record.role != ExtrusionRole::Custom
            && record.width != 0.0
            && record.height != 0.0
        {
            bounds.merge(record.position);
            for point in &record.interpolation_points {
                bounds.merge(*point);
            }
        }
    }
    (bounds, max_bounds)
}

struct Builder<'a> {
    limits: &'a BufferSettings,
    settings: &'a GeometrySettings,
    buffers: Vec<ToolpathBuffer>,
    rings: Vec<Option<RingState>>,
    stats: CompileStats,
}

impl<'a> Builder<'a> {
    fn new(limits: &'a BufferSettings, settings: &'a GeometrySettings) -> Self {
        Self {
            limits,
            settings,
            buffers: MoveKind::BUFFERED.iter().map(|k| ToolpathBuffer::new(*k)).collect(),
            rings: vec![None; MoveKind::BUFFER_COUNT],
            stats: CompileStats::default(),
        }
    }

    fn add_marker(
        &mut self,
        slot: usize,
        record: &MoveRecord,
        prev: Option<&MoveRecord>,
        s_id: usize,
    ) {
        let offset = prev.map_or(Vec3::ZERO, |p| p.position - record.position);
        self.buffers[slot].instances.push(
            InstanceRecord {
                position: record.position.to_array(),
                width: record.width,
                height: record.height,
            },
            s_id,
            offset,
        );
    }

    fn add_move(
        &mut self,
        slot: usize,
        prev: &MoveRecord,
        curr: &MoveRecord,
        next: Option<&MoveRecord>,
        s_id: usize,
    ) {
        let (vertices, indices) = worst_case(curr);
        let split = reserve(&mut self.buffers[slot], self.limits, vertices, indices);
        let buffer = &mut self.buffers[slot];

        let vbuffer = buffer.vertices.len() - 1;
        let ibuffer = buffer.indices.len() - 1;
        let vertex_start = VertexAddress::new(vbuffer, buffer.vertex_count(vbuffer));
        let first = Endpoint {
            ibuffer,
            offset: buffer.indices[ibuffer].len(),
            s_id: s_id - 1,
            position: prev.position,
        };

        let opens_path = match buffer.paths.last() {
            None => true,
            Some(path) => prev.kind != curr.kind || !path.matches(curr),
        };
        if opens_path {
            trace!(kind = %curr.kind, s_id, "Opening path");
            buffer.paths.push(Path::new(curr, first, vertex_start));
            self.rings[slot] = None;
        } else if split != Split::None {
            trace!(kind = %curr.kind, s_id, ?split, "Path continues across buffer split");
            if split == Split::Vertex {
                self.rings[slot] = None;
            }
            if let Some(path) = buffer.paths.last_mut() {
                path.add_sub_path(first, vertex_start, split == Split::Vertex);
            }
        }

        let points: Vec<Vec3> = std::iter::once(prev.position)
            .chain(curr.interpolation_points.iter().copied())
            .chain(std::iter::once(curr.position))
            .collect();
        self.stats.segments += points.len() - 1;

        let mut last_ring: Option<[usize; 8]> = None;
        for (j, pair) in points.windows(2).enumerate() {
            match buffer.primitive {
                PrimitiveKind::Line => push_line(buffer, pair[0], pair[1]),
                PrimitiveKind::Triangle => {
                    let start_cap = opens_path && j == 0;
                    let ring = &mut self.rings[slot];
                    last_ring = Some(push_tube(
                        buffer,
                        ring,
                        &mut self.stats,
                        self.settings,
                        curr,
                        pair[0],
                        pair[1],
                        start_cap,
                    ));
                }
                PrimitiveKind::InstancedModel => {}
            }
        }

        let end_offset = buffer.indices[ibuffer].len();
        let closes_path = match (next, buffer.paths.last()) {
            (Some(next), Some(path)) => next.kind != curr.kind || !path.matches(next),
            _ => true,
        };
        if let Some(v) = last_ring.filter(|_| closes_path) {
            buffer.indices[ibuffer]
                .indices
                .extend(END_CAP.iter().map(|&k| v[k] as IndexType));
        }

        if let Some(path) = buffer.paths.last_mut() {
            path.set_last(Endpoint {
                ibuffer,
                offset: end_offset,
                s_id,
                position: curr.position,
            });
        }
    }
}

/// Make room for a move in the active arrays of `buffer`
fn reserve(
    buffer: &mut ToolpathBuffer,
    limits: &BufferSettings,
    vertices: usize,
    indices: usize,
) -> Split {
    let Some(vbuffer) = buffer.vertices.len().checked_sub(1) else {
        buffer.vertices.push(Vec::new());
        buffer.indices.push(IndexBuffer::new(0));
        return Split::None;
    };

    if buffer.vertex_count(vbuffer) + vertices > limits.max_vertices_per_buffer {
        buffer.vertices.push(Vec::new());
        buffer.indices.push(IndexBuffer::new(vbuffer + 1));
        return Split::Vertex;
    }

    let index_bytes = buffer.indices.last().map_or(0, IndexBuffer::size_bytes);
    if index_bytes + indices * INDEX_SIZE_BYTES > limits.max_index_buffer_bytes {
        buffer.indices.push(IndexBuffer::new(vbuffer));
        return Split::Index;
    }

    Split::None
}

fn push_line(buffer: &mut ToolpathBuffer, a: Vec3, b: Vec3) {
    let vbuffer = buffer.vertices.len() - 1;
    let base = buffer.vertex_count(vbuffer);
    let data = &mut buffer.vertices[vbuffer];
    data.extend_from_slice(&a.to_array());
    data.extend_from_slice(&b.to_array());
    if let Some(ib) = buffer.indices.last_mut() {
        ib.indices.push(base as IndexType);
        ib.indices.push((base + 1) as IndexType);
    }
}

fn push_vertex(data: &mut Vec<f32>, position: Vec3, normal: Vec3) {
    data.extend_from_slice(&position.to_array());
    data.push(pack_normal(normal));
}

/// Append one tube segment and return its local-to-buffer vertex map
#[allow(clippy::too_many_arguments)]
fn push_tube(
    buffer: &mut ToolpathBuffer,
    ring: &mut Option<RingState>,
    stats: &mut CompileStats,
    settings: &GeometrySettings,
    record: &MoveRecord,
    a: Vec3,
    b: Vec3,
    start_cap: bool,
) -> [usize; 8] {
    let half_width = 0.5 * record.width;
    let half_height = 0.5 * record.height;
    let lift = if record.kind == MoveKind::Wipe {
        settings.wipe_lift
    } else {
        0.0
    };

    let frame = SegmentFrame::new(a, b);
    let start = frame.ring(a, half_width, half_height, lift);
    let end = frame.ring(b, half_width, half_height, lift);
    let normals = frame.ring_normals();

    let vbuffer = buffer.vertices.len() - 1;
    let base = buffer.vertex_count(vbuffer);
    let data = &mut buffer.vertices[vbuffer];

    let (v, lead) = match ring.as_ref() {
        None => {
            for k in 0..4 {
                push_vertex(data, start[k], normals[k]);
            }
            for k in 0..4 {
                push_vertex(data, end[k], normals[k]);
            }
            let v = [
                base,
                base + 1,
                base + 2,
                base + 3,
                base + 4,
                base + 5,
                base + 6,
                base + 7,
            ];
            let lead = if start_cap {
                START_CAP.map(|k| v[k])
            } else {
                stats.placeholder_corners += 1;
                [base; LEAD_INDICES]
            };
            (v, lead)
        }
        Some(prev) => {
            push_vertex(data, start[1], normals[1]);
            push_vertex(data, start[3], normals[3]);
            for k in 0..4 {
                push_vertex(data, end[k], normals[k]);
            }
            let v = [
                base - 4,
                base,
                base - 2,
                base + 1,
                base + 2,
                base + 3,
                base + 4,
                base + 5,
            ];
            let corner = classify_corner(&prev.frame, &frame, prev.half_width, settings);
            match corner {
                Corner::Mitered { .. } => stats.mitered_corners += 1,
                _ => stats.placeholder_corners += 1,
            }
            (v, corner_indices(&corner, base))
        }
    };

    if let Some(ib) = buffer.indices.last_mut() {
        ib.indices.extend(lead.iter().map(|&k| k as IndexType));
        for triangle in STEM_TRIANGLES {
            ib.indices.extend(triangle.iter().map(|&k| v[k] as IndexType));
        }
    }

    *ring = Some(RingState { frame, half_width });
    v
}

#[cfg(test)]
mod tests {
    use super::*;

    fn perimeter(x: f32, y: f32) -> MoveRecord {
        MoveRecord::extrude(Vec3::new(x, y, 0.2), ExtrusionRole::Perimeter, 0.4, 0.2)
            .with_feedrate(40.0)
    }

    fn square() -> MoveStream {
        MoveStream::new(
            1,
            vec![
                MoveRecord::travel(Vec3::new(0.0, 0.0, 0.2)),
                perimeter(10.0, 0.0),
                perimeter(10.0, 10.0),
                perimeter(0.0, 10.0),
            ],
        )
    }

    fn compile(stream: &MoveStream) -> ToolpathGeometry {
        GeometryCompiler::new(&PreviewConfig::default())
            .compile(stream)
            .unwrap()
    }

    #[test]
    fn test_right_angle_turns() {
        let geometry = compile(&square());
        let extrude = geometry.buffer(MoveKind::Extrude).unwrap();
        assert_eq!(extrude.total_indices(), 6 + 3 * 24 + 2 * 6 + 6);
        assert_eq!(extrude.total_vertices(), 8 + 6 + 6);
        assert_eq!(extrude.paths.len(), 1);
        assert_eq!(geometry.stats.mitered_corners, 2);
        assert_eq!(geometry.stats.welded_corners, 0);
    }

    #[test]
    fn test_travel_lines() {
        let stream = MoveStream::new(
            1,
            vec![
                MoveRecord::travel(Vec3::ZERO),
                MoveRecord::travel(Vec3::X),
                MoveRecord::travel(Vec3::Y).with_curve(vec![Vec3::ONE]),
            ],
        );
        let geometry = compile(&stream);
        let travel = geometry.buffer(MoveKind::Travel).unwrap();
        assert_eq!(travel.total_indices(), 2 * 3);
        assert_eq!(travel.total_vertices(), 2 * 3);
        assert_eq!(travel.index_at(0, 5), Some(5));
    }

    #[test]
    fn test_first_move_has_no_geometry() {
        let stream = MoveStream::new(1, vec![perimeter(1.0, 0.0)]);
        let geometry = compile(&stream);
        assert!(geometry.is_empty());
    }

    #[test]
    fn test_markers_become_instances() {
        let mut retract = MoveRecord::new(MoveKind::Retract, Vec3::new(10.0, 0.0, 0.2));
        retract.width = 0.4;
        let mut moves = square().moves;
        moves.insert(2, retract);
        let geometry = compile(&MoveStream::new(2, moves));

        let retracts = geometry.buffer(MoveKind::Retract).unwrap();
        assert_eq!(retracts.instances.len(), 1);
        assert_eq!(retracts.instances.s_ids, vec![2]);
        assert_eq!(retracts.instance_bytes().len(), 20);
        // the retraction splits the perimeter in two paths
        assert_eq!(geometry.buffer(MoveKind::Extrude).unwrap().paths.len(), 2);
    }

    #[test]
    fn test_role_change_opens_path_with_caps() {
        let mut moves = square().moves;
        moves[3].role = ExtrusionRole::ExternalPerimeter;
        let geometry = compile(&MoveStream::new(3, moves));
        let extrude = geometry.buffer(MoveKind::Extrude).unwrap();
        assert_eq!(extrude.paths.len(), 2);
        // path 1: cap + 2 segments + corner + cap, path 2: cap + 1 segment + cap
        assert_eq!(extrude.total_indices(), (6 + 48 + 6 + 6) + (6 + 24 + 6));
    }

    #[test]
    fn test_move_too_large_is_rejected() {
        let mut config = PreviewConfig::default();
        config.buffers.max_vertices_per_buffer = 16;
        let curve: Vec<Vec3> = (0..4).map(|i| Vec3::new(i as f32, 1.0, 0.2)).collect();
        let stream = MoveStream::new(
            1,
            vec![
                MoveRecord::travel(Vec3::new(0.0, 0.0, 0.2)),
                perimeter(5.0, 0.0).with_curve(curve),
            ],
        );
        let err = GeometryCompiler::new(&config).compile(&stream).unwrap_err();
        assert!(err.is_capacity_error());
    }

    #[test]
    fn test_bounds_cover_extrusions_only() {
        let geometry = compile(&square());
        let (min, max) = geometry.bounds.as_tuple().unwrap();
        assert_eq!(min, Vec3::new(0.0, 0.0, 0.2));
        assert_eq!(max, Vec3::new(10.0, 10.0, 0.2));
        assert!(!geometry.max_bounds.is_empty());
    }
}
