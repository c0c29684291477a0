//! Paths and sub-paths
//!
//! A [`Path`] is a run of consecutive moves of one kind that share every
//! property the color modes look at. Its geometry may be cut across index
//! arrays when a buffer fills up; each piece is a [`SubPath`].

use super::buffers::VertexAddress;
use gcodeview_core::{round_to_bin, ExtrusionRole, MoveKind, MoveRecord};
use glam::Vec3;

/// Allowed relative difference of volumetric rate inside one path
const VOLUMETRIC_RATE_TOLERANCE: f32 = 0.05;

/// One end of a sub-path
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Endpoint {
    /// Index array id
    pub ibuffer: usize,
    /// Element offset inside that index array
    pub offset: usize,
    pub s_id: usize,
    pub position: Vec3,
}

/// Part of a path that lies inside one index array
#[derive(Debug, Clone, PartialEq)]
pub struct SubPath {
    pub first: Endpoint,
    pub last: Endpoint,
    /// First vertex of the sub-path's first segment
    pub vertex_start: VertexAddress,
    /// Whether the first segment opens a new ring (8 vertices) or continues one (6)
    pub full_ring: bool,
}

impl SubPath {
    /// Whether `s_id` touches this sub-path, ends included
    pub fn contains(&self, s_id: usize) -> bool {
        self.first.s_id <= s_id && s_id <= self.last.s_id
    }

    /// Whether the geometry of move `s_id` lives in this sub-path
    pub fn owns(&self, s_id: usize) -> bool {
        self.first.s_id < s_id && s_id <= self.last.s_id
    }

    /// Ids whose geometry lives in this sub-path
    pub fn segment_ids(&self) -> std::ops::RangeInclusive<usize> {
        self.first.s_id + 1..=self.last.s_id
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Path {
    pub kind: MoveKind,
    pub role: ExtrusionRole,
    pub delta_extruder: f32,
    pub height: f32,
    pub width: f32,
    pub feedrate: f32,
    pub fan_speed: f32,
    pub temperature: f32,
    pub volumetric_rate: f32,
    pub layer_time: f32,
    pub extruder_id: u8,
    pub color_id: u8,
    pub sub_paths: Vec<SubPath>,
}

impl Path {
    /// Path opened by `record`, starting at `first`
    pub fn new(record: &MoveRecord, first: Endpoint, vertex_start: VertexAddress) -> Self {
        Self {
            kind: record.kind,
            role: record.role,
            delta_extruder: record.delta_extruder,
            height: round_to_bin(record.height),
            width: round_to_bin(record.width),
            feedrate: record.feedrate,
            fan_speed: record.fan_speed,
            temperature: record.temperature,
            volumetric_rate: record.volumetric_rate,
            layer_time: record.layer_duration,
            extruder_id: record.extruder_id,
            color_id: record.color_id,
            sub_paths: vec![SubPath {
                first,
                last: first,
                vertex_start,
                full_ring: true,
            }],
        }
    }

    /// Whether `record` can extend this path
    pub fn matches(&self, record: &MoveRecord) -> bool {
        if self.kind != record.kind {
            return false;
        }

        if record.kind == MoveKind::Travel {
            return self.feedrate == record.feedrate
                && self.extruder_id == record.extruder_id
                && self.color_id == record.color_id;
        }

        let start_z = self.first().map_or(f32::INFINITY, |e| e.position.z);
        self.extruder_id == record.extruder_id
            && self.color_id == record.color_id
            && self.role == record.role
            && record.position.z <= start_z
            && self.feedrate == record.feedrate
            && self.fan_speed == record.fan_speed
            && self.height == round_to_bin(record.height)
            && self.width == round_to_bin(record.width)
            && volumetric_rate_matches(self.volumetric_rate, record.volumetric_rate)
            && self.layer_time == record.layer_duration
    }

    pub fn first(&self) -> Option<&Endpoint> {
        self.sub_paths.first().map(|sp| &sp.first)
    }

    pub fn last(&self) -> Option<&Endpoint> {
        self.sub_paths.last().map(|sp| &sp.last)
    }

    pub fn first_s_id(&self) -> usize {
        self.first().map_or(0, |e| e.s_id)
    }

    pub fn last_s_id(&self) -> usize {
        self.last().map_or(0, |e| e.s_id)
    }

    pub fn contains(&self, s_id: usize) -> bool {
        self.first_s_id() <= s_id && s_id <= self.last_s_id()
    }

    /// Sub-path owning the geometry of `s_id`
    pub fn sub_path_owning(&self, s_id: usize) -> Option<usize> {
        self.sub_paths.iter().position(|sp| sp.owns(s_id))
    }

    /// Start a new sub-path at a buffer split
    pub(crate) fn add_sub_path(
        &mut self,
        first: Endpoint,
        vertex_start: VertexAddress,
        full_ring: bool,
    ) {
        self.sub_paths.push(SubPath {
            first,
            last: first,
            vertex_start,
            full_ring,
        });
    }

    pub(crate) fn set_last(&mut self, last: Endpoint) {
        if let Some(sp) = self.sub_paths.last_mut() {
            sp.last = last;
        }
    }
}

fn volumetric_rate_matches(path: f32, record: f32) -> bool {
    if path == 0.0 {
        return record == 0.0;
    }
    ((record - path) / path).abs() <= VOLUMETRIC_RATE_TOLERANCE
}

#[cfg(test)]
mod tests {
    use super::*;

    fn start(z: f32) -> Endpoint {
        Endpoint {
            position: Vec3::new(0.0, 0.0, z),
            ..Default::default()
        }
    }

    fn perimeter(z: f32) -> MoveRecord {
        let mut record =
            MoveRecord::extrude(Vec3::new(1.0, 0.0, z), ExtrusionRole::Perimeter, 0.45, 0.2)
                .with_feedrate(40.0);
        record.volumetric_rate = 2.0;
        record
    }

    #[test]
    fn test_extrusion_matching() {
        let path = Path::new(&perimeter(0.2), start(0.2), VertexAddress::default());
        assert!(path.matches(&perimeter(0.2)));

        let mut noisy = perimeter(0.2);
        noisy.width = 0.4501;
        noisy.volumetric_rate = 2.08;
        assert!(path.matches(&noisy));

        let mut faster = perimeter(0.2);
        faster.volumetric_rate = 2.2;
        assert!(!path.matches(&faster));

        assert!(!path.matches(&perimeter(0.4)));

        let mut infill = perimeter(0.2);
        infill.role = ExtrusionRole::InternalInfill;
        assert!(!path.matches(&infill));

        assert!(!path.matches(&perimeter(0.2).with_extruder(1)));
    }

    #[test]
    fn test_zero_volumetric_needs_zero() {
        let mut record = perimeter(0.2);
        record.volumetric_rate = 0.0;
        let path = Path::new(&record, start(0.2), VertexAddress::default());
        assert!(path.matches(&record));
        assert!(!path.matches(&perimeter(0.2)));
    }

    #[test]
    fn test_travel_matching_ignores_role() {
        let travel = MoveRecord::travel(Vec3::X).with_feedrate(120.0);
        let path = Path::new(&travel, start(0.2), VertexAddress::default());

        let mut other = MoveRecord::travel(Vec3::new(5.0, 0.0, 3.0)).with_feedrate(120.0);
        other.role = ExtrusionRole::Perimeter;
        assert!(path.matches(&other));
        assert!(!path.matches(&other.clone().with_feedrate(60.0)));
        assert!(!path.matches(&perimeter(0.2)));
    }

    #[test]
    fn test_sub_path_ownership() {
        let first = Endpoint {
            s_id: 4,
            ..start(0.2)
        };
        let mut path = Path::new(&perimeter(0.2), first, VertexAddress::default());
        path.set_last(Endpoint {
            s_id: 7,
            ..start(0.2)
        });

        let split = Endpoint {
            s_id: 7,
            ibuffer: 1,
            ..start(0.2)
        };
        path.add_sub_path(split, VertexAddress::new(1, 0), true);
        path.set_last(Endpoint {
            s_id: 9,
            ibuffer: 1,
            ..start(0.2)
        });

        assert_eq!(path.sub_path_owning(4), None);
        assert_eq!(path.sub_path_owning(5), Some(0));
        assert_eq!(path.sub_path_owning(7), Some(0));
        assert_eq!(path.sub_path_owning(8), Some(1));
        assert!(path.contains(4) && path.contains(9) && !path.contains(10));
        assert_eq!(path.sub_paths[1].segment_ids(), 8..=9);
    }
}
