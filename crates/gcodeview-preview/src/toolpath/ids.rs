//! Sequential move ids
//!
//! Every move gets a sequential id except seams, which reuse the id of the
//! move before them. The map also keeps a prefix sum of straight segments
//! per id so that id spans convert to index spans in O(1).

use gcodeview_core::{MoveKind, MoveRecord};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SeqIdMap {
    seq_to_raw: Vec<usize>,
    raw_to_seq: Vec<usize>,
    /// `segment_prefix[s]` = segments of ids `1..=s`
    segment_prefix: Vec<usize>,
}

impl SeqIdMap {
    pub fn build(moves: &[MoveRecord]) -> Self {
        let mut map = Self {
            seq_to_raw: Vec::with_capacity(moves.len()),
            raw_to_seq: Vec::with_capacity(moves.len()),
            segment_prefix: Vec::with_capacity(moves.len()),
        };

        for (raw, record) in moves.iter().enumerate() {
            if record.kind == MoveKind::Seam && raw > 0 {
                let shared = map.seq_to_raw.len().saturating_sub(1);
                map.raw_to_seq.push(shared);
                continue;
            }

            let seq = map.seq_to_raw.len();
            let before = map.segment_prefix.last().copied().unwrap_or(0);
            map.segment_prefix.push(if seq == 0 {
                0
            } else {
                before + record.segment_count()
            });
            map.seq_to_raw.push(raw);
            map.raw_to_seq.push(seq);
        }

        map
    }

    pub fn len(&self) -> usize {
        self.seq_to_raw.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seq_to_raw.is_empty()
    }

    /// Highest sequential id, `None` for an empty stream
    pub fn last_id(&self) -> Option<usize> {
        self.len().checked_sub(1)
    }

    pub fn raw(&self, s_id: usize) -> Option<usize> {
        self.seq_to_raw.get(s_id).copied()
    }

    pub fn seq(&self, raw: usize) -> Option<usize> {
        self.raw_to_seq.get(raw).copied()
    }

    /// Straight segments owned by ids in `(from, to]`
    pub fn segments_between(&self, from: usize, to: usize) -> usize {
        if to <= from {
            return 0;
        }
        let at = |s: usize| self.segment_prefix.get(s).copied().unwrap_or(0);
        at(to).saturating_sub(at(from))
    }

    /// Smallest id `s` in `(from, to]` whose segments reach past `segments`
    /// counted from `from`
    pub fn id_at_segment(&self, from: usize, to: usize, segments: usize) -> Option<usize> {
        let base = *self.segment_prefix.get(from)?;
        let target = base + segments;
        let end = to.min(self.len().saturating_sub(1));
        let slice = self.segment_prefix.get(from + 1..=end)?;
        let pos = slice.partition_point(|&p| p <= target);
        (pos < slice.len()).then_some(from + 1 + pos)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;

    fn stream() -> Vec<MoveRecord> {
        vec![
            MoveRecord::travel(Vec3::ZERO),
            MoveRecord::travel(Vec3::X),
            MoveRecord::new(MoveKind::Seam, Vec3::X),
            MoveRecord::extrude(Vec3::Y, Default::default(), 0.4, 0.2)
                .with_curve(vec![Vec3::new(1.0, 0.5, 0.0), Vec3::new(0.5, 1.0, 0.0)]),
            MoveRecord::extrude(Vec3::ZERO, Default::default(), 0.4, 0.2),
        ]
    }

    #[test]
    fn test_seam_shares_predecessor_id() {
        let ids = SeqIdMap::build(&stream());
        assert_eq!(ids.len(), 4);
        assert_eq!(ids.seq(1), Some(1));
        assert_eq!(ids.seq(2), Some(1));
        assert_eq!(ids.seq(3), Some(2));
        assert_eq!(ids.raw(2), Some(3));
        assert_eq!(ids.raw(1), Some(1));
    }

    #[test]
    fn test_leading_seam_keeps_id_zero() {
        let moves = vec![
            MoveRecord::new(MoveKind::Seam, Vec3::ZERO),
            MoveRecord::travel(Vec3::X),
        ];
        let ids = SeqIdMap::build(&moves);
        assert_eq!(ids.seq(0), Some(0));
        assert_eq!(ids.seq(1), Some(1));
    }

    #[test]
    fn test_segment_prefix_counts_curves() {
        let ids = SeqIdMap::build(&stream());
        assert_eq!(ids.segments_between(0, 1), 1);
        assert_eq!(ids.segments_between(1, 2), 3);
        assert_eq!(ids.segments_between(1, 3), 4);
        assert_eq!(ids.segments_between(3, 1), 0);
    }

    #[test]
    fn test_id_at_segment() {
        let ids = SeqIdMap::build(&stream());
        assert_eq!(ids.id_at_segment(1, 3, 0), Some(2));
        assert_eq!(ids.id_at_segment(1, 3, 2), Some(2));
        assert_eq!(ids.id_at_segment(1, 3, 3), Some(3));
        assert_eq!(ids.id_at_segment(1, 3, 4), None);
    }

    #[test]
    fn test_empty() {
        let ids = SeqIdMap::build(&[]);
        assert!(ids.is_empty());
        assert_eq!(ids.last_id(), None);
        assert_eq!(ids.segments_between(0, 5), 0);
    }
}
