//! Path index
//!
//! Maps a sequential id to the index range that draws it and back. Line
//! and tube moves resolve to a segment range inside one index array;
//! marker moves resolve to their instance slot.

use super::buffers::ToolpathBuffer;
use super::ids::SeqIdMap;
use super::paths::SubPath;
use gcodeview_core::MoveKind;

/// One sub-path, keyed by the ids it owns
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexEntry {
    /// Exclusive lower id bound
    pub first: usize,
    /// Inclusive upper id bound
    pub last: usize,
    pub slot: usize,
    pub path: usize,
    pub sub_path: usize,
    pub ibuffer: usize,
    pub offset: usize,
}

/// Where the geometry of one move lives
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveLocation {
    Segment {
        kind: MoveKind,
        ibuffer: usize,
        /// Element offset of the move's first index
        offset: usize,
        /// Index elements drawn for the move
        count: usize,
    },
    Instance {
        kind: MoveKind,
        index: usize,
    },
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PathIndex {
    entries: Vec<IndexEntry>,
    /// Entry positions per buffer slot, in index order
    by_slot: Vec<Vec<usize>>,
}

impl PathIndex {
    pub fn build(buffers: &[ToolpathBuffer]) -> Self {
        let mut entries = Vec::new();
        for (slot, buffer) in buffers.iter().enumerate() {
            for (p, path) in buffer.paths.iter().enumerate() {
                for (s, sp) in path.sub_paths.iter().enumerate() {
                    entries.push(IndexEntry {
                        first: sp.first.s_id,
                        last: sp.last.s_id,
                        slot,
                        path: p,
                        sub_path: s,
                        ibuffer: sp.first.ibuffer,
                        offset: sp.first.offset,
                    });
                }
            }
        }
        entries.sort_by_key(|e| e.first);

        let mut by_slot = vec![Vec::new(); buffers.len()];
        for (i, entry) in entries.iter().enumerate() {
            by_slot[entry.slot].push(i);
        }

        Self { entries, by_slot }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[IndexEntry] {
        &self.entries
    }

    /// Sub-path entry owning the geometry of `s_id`
    pub fn entry_owning(&self, s_id: usize) -> Option<&IndexEntry> {
        let pos = self.entries.partition_point(|e| e.last < s_id);
        self.entries
            .get(pos)
            .filter(|e| e.first < s_id && s_id <= e.last)
    }

    pub fn locate(
        &self,
        s_id: usize,
        buffers: &[ToolpathBuffer],
        ids: &SeqIdMap,
    ) -> Option<MoveLocation> {
        if let Some(entry) = self.entry_owning(s_id) {
            let buffer = buffers.get(entry.slot)?;
            let per_segment = buffer.primitive.indices_per_segment();
            let before = ids.segments_between(entry.first, s_id - 1);
            let own = ids.segments_between(s_id - 1, s_id);
            return Some(MoveLocation::Segment {
                kind: buffer.kind,
                ibuffer: entry.ibuffer,
                offset: entry.offset + per_segment * before,
                count: per_segment * own,
            });
        }

        // seams share their id with the move before them, so they come last
        let markers = buffers
            .iter()
            .filter(|b| b.kind.is_marker() && b.kind != MoveKind::Seam)
            .chain(buffers.iter().filter(|b| b.kind == MoveKind::Seam));
        for buffer in markers {
            let index = buffer.instances.lower_bound(s_id);
            if buffer.instances.s_ids.get(index) == Some(&s_id) {
                return Some(MoveLocation::Instance {
                    kind: buffer.kind,
                    index,
                });
            }
        }
        None
    }

    pub fn decode(
        &self,
        location: &MoveLocation,
        buffers: &[ToolpathBuffer],
        ids: &SeqIdMap,
    ) -> Option<usize> {
        match *location {
            MoveLocation::Instance { kind, index } => {
                let buffer = buffers.get(kind.buffer_slot()?)?;
                buffer.instances.s_ids.get(index).copied()
            }
            MoveLocation::Segment {
                kind,
                ibuffer,
                offset,
                ..
            } => {
                let slot = kind.buffer_slot()?;
                let buffer = buffers.get(slot)?;
                let list = self.by_slot.get(slot)?;
                let pos = list.partition_point(|&i| {
                    let e = &self.entries[i];
                    (e.ibuffer, e.offset) <= (ibuffer, offset)
                });
                let entry = &self.entries[*list.get(pos.checked_sub(1)?)?];
                if entry.ibuffer != ibuffer {
                    return None;
                }
                let per_segment = buffer.primitive.indices_per_segment();
                if per_segment == 0 {
                    return None;
                }
                let segment = (offset - entry.offset) / per_segment;
                ids.id_at_segment(entry.first, entry.last, segment)
            }
        }
    }

    /// Sub-path behind an entry
    pub fn sub_path<'a>(
        &self,
        entry: &IndexEntry,
        buffers: &'a [ToolpathBuffer],
    ) -> Option<&'a SubPath> {
        buffers
            .get(entry.slot)?
            .paths
            .get(entry.path)?
            .sub_paths
            .get(entry.sub_path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::toolpath::{GeometryCompiler, ToolpathGeometry};
    use gcodeview_core::{ExtrusionRole, MoveRecord, MoveStream, Vec3};
    use gcodeview_settings::PreviewConfig;

    fn perimeter(x: f32, y: f32) -> MoveRecord {
        MoveRecord::extrude(Vec3::new(x, y, 0.2), ExtrusionRole::Perimeter, 0.4, 0.2)
    }

    fn compile_with(config: &PreviewConfig, moves: Vec<MoveRecord>) -> ToolpathGeometry {
        GeometryCompiler::new(config)
            .compile(&MoveStream::new(1, moves))
            .unwrap()
    }

    #[test]
    fn test_entry_owning_at_sub_path_boundary() {
        let mut config = PreviewConfig::default();
        config.buffers.max_index_buffer_bytes = 200;
        let mut moves = vec![MoveRecord::travel(Vec3::new(0.0, 0.0, 0.2))];
        moves.extend((1..=6).map(|i| perimeter(i as f32 * 10.0, (i % 2) as f32 * 10.0)));
        let geometry = compile_with(&config, moves);
        let index = &geometry.index;
        assert_eq!(index.len(), 2);

        // the boundary id belongs to the sub-path it closes
        let entry = index.entry_owning(3).unwrap();
        assert_eq!((entry.first, entry.last, entry.sub_path), (0, 3, 0));
        let entry = index.entry_owning(4).unwrap();
        assert_eq!((entry.first, entry.last, entry.sub_path), (3, 6, 1));
        assert_eq!((entry.ibuffer, entry.offset), (1, 0));
        assert!(index.sub_path(entry, &geometry.buffers).is_some());

        assert!(index.entry_owning(0).is_none());
        assert!(index.entry_owning(7).is_none());

        let closing = geometry.locate(3).unwrap();
        assert_eq!(
            closing,
            MoveLocation::Segment {
                kind: MoveKind::Extrude,
                ibuffer: 0,
                offset: 60,
                count: 30,
            }
        );
        let opening = geometry.locate(4).unwrap();
        assert_eq!(
            opening,
            MoveLocation::Segment {
                kind: MoveKind::Extrude,
                ibuffer: 1,
                offset: 0,
                count: 30,
            }
        );
        assert_eq!(geometry.decode(&closing), Some(3));
        assert_eq!(geometry.decode(&opening), Some(4));
    }

    #[test]
    fn test_mixed_kinds_and_markers() {
        let geometry = compile_with(
            &PreviewConfig::default(),
            vec![
                MoveRecord::travel(Vec3::new(0.0, 0.0, 0.2)),
                perimeter(10.0, 0.0),
                MoveRecord::new(MoveKind::Retract, Vec3::new(10.0, 0.0, 0.2)),
                MoveRecord::travel(Vec3::new(20.0, 0.0, 0.2)),
                perimeter(30.0, 0.0),
            ],
        );
        let index = &geometry.index;
        assert_eq!(index.len(), 3);
        assert!(index.entries().windows(2).all(|w| w[0].first <= w[1].first));

        let travel_slot = MoveKind::Travel.buffer_slot().unwrap();
        let extrude_slot = MoveKind::Extrude.buffer_slot().unwrap();
        assert_eq!(index.entry_owning(1).map(|e| (e.slot, e.path)), Some((extrude_slot, 0)));
        assert_eq!(index.entry_owning(3).map(|e| e.slot), Some(travel_slot));
        assert_eq!(index.entry_owning(4).map(|e| (e.slot, e.path)), Some((extrude_slot, 1)));

        // the retract owns no segment and resolves to its instance slot
        assert!(index.entry_owning(2).is_none());
        let retract = geometry.locate(2).unwrap();
        assert_eq!(
            retract,
            MoveLocation::Instance {
                kind: MoveKind::Retract,
                index: 0,
            }
        );
        assert_eq!(geometry.decode(&retract), Some(2));

        let travel = geometry.locate(3).unwrap();
        assert_eq!(
            travel,
            MoveLocation::Segment {
                kind: MoveKind::Travel,
                ibuffer: 0,
                offset: 0,
                count: 2,
            }
        );
        assert_eq!(geometry.decode(&travel), Some(3));

        // second extrusion path follows the first one's start cap, stem and end cap
        let extrude = geometry.locate(4).unwrap();
        assert_eq!(
            extrude,
            MoveLocation::Segment {
                kind: MoveKind::Extrude,
                ibuffer: 0,
                offset: 36,
                count: 30,
            }
        );
        assert_eq!(geometry.decode(&extrude), Some(4));
    }

    #[test]
    fn test_empty_index() {
        let index = PathIndex::build(&[]);
        assert!(index.is_empty());
        assert!(index.entry_owning(0).is_none());
        assert!(index.locate(1, &[], &SeqIdMap::default()).is_none());
    }
}
