//! Position readback for the tool cursor

use crate::toolpath::{tube, MoveLocation, ToolpathGeometry, VertexAddress};
use gcodeview_core::MoveKind;
use glam::Vec3;

/// One element of one index array
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexAddress {
    pub kind: MoveKind,
    pub ibuffer: usize,
    pub offset: usize,
}

/// Resolves drawn geometry back to positions
pub trait PositionQuery {
    /// Position of the vertex referenced by the index at `address`
    fn position_at(&self, address: IndexAddress) -> Option<Vec3>;

    /// Position of marker instance `index`
    fn instance_position(&self, kind: MoveKind, index: usize) -> Option<Vec3>;
}

/// Reads the CPU-side copies kept in [`ToolpathGeometry`]
#[derive(Debug, Clone, Copy)]
pub struct CpuReadback<'a> {
    geometry: &'a ToolpathGeometry,
}

impl<'a> CpuReadback<'a> {
    pub fn new(geometry: &'a ToolpathGeometry) -> Self {
        Self { geometry }
    }
}

impl PositionQuery for CpuReadback<'_> {
    fn position_at(&self, address: IndexAddress) -> Option<Vec3> {
        let buffer = self.geometry.buffer(address.kind)?;
        let vertex = buffer.index_at(address.ibuffer, address.offset)?;
        let vertex_buffer = buffer.indices.get(address.ibuffer)?.vertex_buffer;
        buffer.position(VertexAddress::new(vertex_buffer, usize::from(vertex)))
    }

    fn instance_position(&self, kind: MoveKind, index: usize) -> Option<Vec3> {
        let buffer = self.geometry.buffer(kind)?;
        buffer.instances.records.get(index).map(|r| r.position())
    }
}

/// Index element holding the end vertex of the move at `location`
///
/// Lines end on the second index of their last segment. Tubes end on the
/// up vertex of the last segment's end ring, which sits at the nozzle.
pub fn end_vertex_address(
    geometry: &ToolpathGeometry,
    location: &MoveLocation,
) -> Option<IndexAddress> {
    let MoveLocation::Segment {
        kind,
        ibuffer,
        offset,
        count,
    } = *location
    else {
        return None;
    };
    let per_segment = geometry.buffer(kind)?.primitive.indices_per_segment();
    if per_segment == 0 || count < per_segment {
        return None;
    }
    let last_segment = offset + count - per_segment;
    let element = if kind.is_tube() {
        // local vertex 4 is the third index of the stem
        last_segment + tube::LEAD_INDICES + 2
    } else {
        last_segment + 1
    };
    Some(IndexAddress {
        kind,
        ibuffer,
        offset: element,
    })
}

/// Tool position at the end of move `s_id` and the marker offset applied to it
pub fn resolve_position(
    geometry: &ToolpathGeometry,
    query: &dyn PositionQuery,
    s_id: usize,
) -> Option<(Vec3, Vec3)> {
    let location = geometry.locate(s_id)?;
    match location {
        MoveLocation::Segment { .. } => {
            let address = end_vertex_address(geometry, &location)?;
            query.position_at(address).map(|p| (p, Vec3::ZERO))
        }
        MoveLocation::Instance { kind, index } => {
            let position = query.instance_position(kind, index)?;
            let offset = geometry
                .buffer(kind)
                .and_then(|b| b.instances.offsets.get(index).copied())
                .unwrap_or(Vec3::ZERO);
            Some((position + offset, offset))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::toolpath::GeometryCompiler;
    use gcodeview_core::{ExtrusionRole, MoveRecord, MoveStream};
    use gcodeview_settings::PreviewConfig;

    fn compile(moves: Vec<MoveRecord>) -> ToolpathGeometry {
        GeometryCompiler::new(&PreviewConfig::default())
            .compile(&MoveStream::new(1, moves))
            .unwrap()
    }

    #[test]
    fn test_line_end_vertex() {
        let geometry = compile(vec![
            MoveRecord::travel(Vec3::ZERO),
            MoveRecord::travel(Vec3::new(5.0, 0.0, 0.0)),
            MoveRecord::travel(Vec3::new(5.0, 5.0, 0.0)),
        ]);
        let query = CpuReadback::new(&geometry);
        let (position, offset) = resolve_position(&geometry, &query, 2).unwrap();
        assert_eq!(position, Vec3::new(5.0, 5.0, 0.0));
        assert_eq!(offset, Vec3::ZERO);
    }

    #[test]
    fn test_tube_end_vertex_is_nozzle() {
        let geometry = compile(vec![
            MoveRecord::travel(Vec3::new(0.0, 0.0, 0.2)),
            MoveRecord::extrude(Vec3::new(10.0, 0.0, 0.2), ExtrusionRole::Perimeter, 0.4, 0.2),
            MoveRecord::extrude(Vec3::new(10.0, 10.0, 0.2), ExtrusionRole::Perimeter, 0.4, 0.2),
        ]);
        let query = CpuReadback::new(&geometry);
        let (position, _) = resolve_position(&geometry, &query, 2).unwrap();
        assert!((position - Vec3::new(10.0, 10.0, 0.2)).length() < 1e-5);
    }

    #[test]
    fn test_marker_position_includes_offset() {
        let geometry = compile(vec![
            MoveRecord::travel(Vec3::ZERO),
            MoveRecord::travel(Vec3::new(2.0, 0.0, 0.0)),
            MoveRecord::new(MoveKind::Retract, Vec3::new(2.0, 0.0, 0.0)),
        ]);
        let query = CpuReadback::new(&geometry);
        let (position, offset) = resolve_position(&geometry, &query, 2).unwrap();
        assert_eq!(position, Vec3::new(2.0, 0.0, 0.0));
        assert_eq!(offset, Vec3::ZERO);
    }

    #[test]
    fn test_unknown_id() {
        let geometry = compile(vec![MoveRecord::travel(Vec3::ZERO)]);
        let query = CpuReadback::new(&geometry);
        assert!(resolve_position(&geometry, &query, 7).is_none());
    }
}
