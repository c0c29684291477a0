//! Corner smoothing
//!
//! Moves the side vertices at every shallow tube joint onto the miter line
//! so neighbouring segments meet without a gap. Targets come from the move
//! geometry alone, never from current vertex contents, so the pass can be
//! repeated without drifting.

use super::buffers::{ToolpathBuffer, VertexAddress};
use super::ids::SeqIdMap;
use super::tube::{
    classify_corner, welded_sides, Corner, SegmentFrame, CONTINUED_RING_VERTICES,
    FULL_RING_VERTICES,
};
use gcodeview_core::{MoveKind, MoveRecord};
use gcodeview_settings::GeometrySettings;
use glam::Vec3;
use tracing::debug;

/// Straight piece of a tube path and where its vertices live
#[derive(Debug, Clone, Copy)]
struct PlacedSegment {
    a: Vec3,
    b: Vec3,
    start: VertexAddress,
    vertices: usize,
    half_width: f32,
    half_height: f32,
}

impl PlacedSegment {
    fn end_right(&self) -> VertexAddress {
        self.start.offset(self.vertices - 3)
    }

    fn end_left(&self) -> VertexAddress {
        self.start.offset(self.vertices - 1)
    }

    fn start_right(&self) -> VertexAddress {
        self.start.offset(if self.vertices == FULL_RING_VERTICES { 1 } else { 0 })
    }

    fn start_left(&self) -> VertexAddress {
        self.start.offset(if self.vertices == FULL_RING_VERTICES { 3 } else { 1 })
    }
}

/// Weld every shallow joint of the tube paths in `buffer`
///
/// Returns the number of welded joints. Line and marker buffers are left alone.
pub fn smooth_corners(
    buffer: &mut ToolpathBuffer,
    moves: &[MoveRecord],
    ids: &SeqIdMap,
    settings: &GeometrySettings,
) -> usize {
    if !buffer.kind.is_tube() {
        return 0;
    }
    let lift = if buffer.kind == MoveKind::Wipe {
        settings.wipe_lift
    } else {
        0.0
    };

    let mut writes: Vec<(VertexAddress, Vec3)> = Vec::new();
    let mut welded = 0;
    for path in &buffer.paths {
        let segments = placed_segments(path.sub_paths.as_slice(), moves, ids);
        for pair in segments.windows(2) {
            let (prev, curr) = (&pair[0], &pair[1]);
            let prev_frame = SegmentFrame::new(prev.a, prev.b);
            let curr_frame = SegmentFrame::new(curr.a, curr.b);
            let Corner::Welded {
                displacement,
                right_turn,
            } = classify_corner(&prev_frame, &curr_frame, prev.half_width, settings)
            else {
                continue;
            };

            let (right, left) = welded_sides(
                &prev_frame,
                prev.b,
                prev.half_width,
                prev.half_height,
                lift,
                displacement,
                right_turn,
            );
            writes.push((prev.end_right(), right));
            writes.push((prev.end_left(), left));
            writes.push((curr.start_right(), right));
            writes.push((curr.start_left(), left));
            welded += 1;
        }
    }

    let mut missed = 0;
    for (address, position) in writes {
        if !buffer.set_position(address, position) {
            missed += 1;
        }
    }
    if missed > 0 {
        tracing::warn!(kind = %buffer.kind, missed, "Smoothing addressed missing vertices");
    }

    debug!(kind = %buffer.kind, welded, "Smoothed tube corners");
    welded
}

fn placed_segments(
    sub_paths: &[super::paths::SubPath],
    moves: &[MoveRecord],
    ids: &SeqIdMap,
) -> Vec<PlacedSegment> {
    let mut segments = Vec::new();
    for sp in sub_paths {
        let first_size = if sp.full_ring {
            FULL_RING_VERTICES
        } else {
            CONTINUED_RING_VERTICES
        };
        let mut a = sp.first.position;
        let mut j = 0usize;
        for s_id in sp.segment_ids() {
            let Some(record) = ids.raw(s_id).and_then(|raw| moves.get(raw)) else {
                break;
            };
            let ends = record
                .interpolation_points
                .iter()
                .copied()
                .chain(std::iter::once(record.position));
            for b in ends {
                let (start, vertices) = if j == 0 {
                    (sp.vertex_start, first_size)
                } else {
                    (
                        sp.vertex_start
                            .offset(first_size + (j - 1) * CONTINUED_RING_VERTICES),
                        CONTINUED_RING_VERTICES,
                    )
                };
                segments.push(PlacedSegment {
                    a,
                    b,
                    start,
                    vertices,
                    half_width: 0.5 * record.width,
                    half_height: 0.5 * record.height,
                });
                a = b;
                j += 1;
            }
        }
    }
    segments
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::toolpath::{GeometryCompiler, ToolpathGeometry};
    use gcodeview_core::{ExtrusionRole, MoveStream};
    use gcodeview_settings::PreviewConfig;

    fn perimeter(x: f32, y: f32) -> MoveRecord {
        MoveRecord::extrude(Vec3::new(x, y, 0.2), ExtrusionRole::Perimeter, 0.4, 0.2)
    }

    fn compile_with(config: &PreviewConfig, moves: Vec<MoveRecord>) -> ToolpathGeometry {
        GeometryCompiler::new(config)
            .compile(&MoveStream::new(1, moves))
            .unwrap()
    }

    /// Distance in the XY plane from `p` to the line through `a` along `dir`
    fn line_distance(p: Vec3, a: Vec3, dir: Vec3) -> f32 {
        let d = (p - a).truncate();
        let dir = dir.truncate().normalize();
        (d.x * dir.y - d.y * dir.x).abs()
    }

    #[test]
    fn test_shallow_joint_lands_on_miter_line() {
        let (a, b, c) = (
            Vec3::new(0.0, 0.0, 0.2),
            Vec3::new(10.0, 0.0, 0.2),
            Vec3::new(20.0, 2.0, 0.2),
        );
        let geometry = compile_with(
            &PreviewConfig::default(),
            vec![MoveRecord::travel(a), perimeter(b.x, b.y), perimeter(c.x, c.y)],
        );
        assert_eq!(geometry.stats.welded_corners, 1);

        let extrude = geometry.buffer(MoveKind::Extrude).unwrap();
        let at = |v| extrude.position(VertexAddress::new(0, v)).unwrap();

        // first segment owns a full ring (0..8), the second continues it from 8
        let (end_right, end_left) = (at(5), at(7));
        assert_eq!(end_right, at(8));
        assert_eq!(end_left, at(9));

        for side in [end_right, end_left] {
            assert!((line_distance(side, a, b - a) - 0.2).abs() < 1e-4);
            assert!((line_distance(side, b, c - b) - 0.2).abs() < 1e-4);
            assert!((side.z - 0.1).abs() < 1e-6);
        }
        // the unsmoothed ring would sit square to the first segment
        assert!(end_right.x > b.x || end_left.x > b.x);
    }

    #[test]
    fn test_sharp_joint_is_not_welded() {
        let geometry = compile_with(
            &PreviewConfig::default(),
            vec![
                MoveRecord::travel(Vec3::new(0.0, 0.0, 0.2)),
                perimeter(10.0, 0.0),
                perimeter(10.0, 10.0),
            ],
        );
        assert_eq!(geometry.stats.welded_corners, 0);
        assert_eq!(geometry.stats.mitered_corners, 1);

        let extrude = geometry.buffer(MoveKind::Extrude).unwrap();
        let end_right = extrude.position(VertexAddress::new(0, 5)).unwrap();
        assert!((end_right - Vec3::new(10.0, -0.2, 0.1)).length() < 1e-5);
    }

    #[test]
    fn test_weld_spans_vertex_array_split() {
        let mut config = PreviewConfig::default();
        config.buffers.max_vertices_per_buffer = 40;
        let mut moves = vec![MoveRecord::travel(Vec3::new(0.0, 0.0, 0.2))];
        moves.extend((1..=12).map(|i| perimeter(i as f32 * 10.0, (i % 2) as f32)));
        let geometry = compile_with(&config, moves.clone());

        let extrude = geometry.buffer(MoveKind::Extrude).unwrap();
        assert_eq!(extrude.vertices.len(), 2);
        assert_eq!(geometry.stats.welded_corners, 11);

        let sub_paths = &extrude.paths[0].sub_paths;
        assert_eq!(sub_paths.len(), 2);
        assert!(sub_paths[1].full_ring);

        // end ring of the first array meets the start ring of the second
        let tail = extrude.vertex_count(0);
        let position = |buffer, v| extrude.position(VertexAddress::new(buffer, v)).unwrap();
        assert_eq!(position(0, tail - 3), position(1, 1));
        assert_eq!(position(0, tail - 1), position(1, 3));

        // targets come from the moves, so a second pass writes the same values
        let mut again = extrude.clone();
        let welded = smooth_corners(&mut again, &moves, &geometry.ids, &config.geometry);
        assert_eq!(welded, 11);
        assert_eq!(again.vertices, extrude.vertices);
    }

    #[test]
    fn test_line_buffers_are_skipped() {
        let config = PreviewConfig::default();
        let moves = vec![
            MoveRecord::travel(Vec3::ZERO),
            MoveRecord::travel(Vec3::new(10.0, 0.0, 0.0)),
            MoveRecord::travel(Vec3::new(20.0, 1.0, 0.0)),
        ];
        let geometry = compile_with(&config, moves.clone());
        let mut travel = geometry.buffer(MoveKind::Travel).unwrap().clone();
        assert_eq!(smooth_corners(&mut travel, &moves, &geometry.ids, &config.geometry), 0);
    }
}
