//! Tube cross-section geometry
//!
//! A tube segment is a box with a diamond cross section: four ring
//! vertices (up, right, down, left) around a centre line that sits half a
//! layer height below the nozzle position. Consecutive segments share the
//! up/down vertices of their common ring; right/left are duplicated so
//! each segment keeps flat side normals.
//!
//! Local vertex numbering of one segment, as used by the index tables
//! below: 0..4 is the start ring and 4..8 the end ring, each ordered
//! up, right, down, left.

use gcodeview_settings::GeometrySettings;
use glam::Vec3;

/// Turns this close to straight need no corner geometry
const STRAIGHT_EPSILON: f32 = 1.0e-6;

/// Stem triangles connecting the start ring to the end ring
pub const STEM_TRIANGLES: [[usize; 3]; 8] = [
    [0, 1, 4],
    [1, 5, 4],
    [1, 2, 5],
    [2, 6, 5],
    [2, 3, 6],
    [3, 7, 6],
    [3, 0, 7],
    [0, 4, 7],
];

/// Start cap over the start ring
pub const START_CAP: [usize; 6] = [0, 2, 1, 0, 3, 2];

/// End cap over the end ring
pub const END_CAP: [usize; 6] = [4, 6, 7, 4, 5, 6];

/// Indices in the lead slot of a segment
pub const LEAD_INDICES: usize = 6;

/// Indices in the stem of a segment
pub const STEM_INDICES: usize = 24;

/// Indices owned by one tube segment
pub const SEGMENT_INDICES: usize = LEAD_INDICES + STEM_INDICES;

/// Vertices of a segment that opens a ring
pub const FULL_RING_VERTICES: usize = 8;

/// Vertices of a segment that continues a ring
pub const CONTINUED_RING_VERTICES: usize = 6;

/// Orthonormal frame of one straight segment
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SegmentFrame {
    pub dir: Vec3,
    pub right: Vec3,
    pub up: Vec3,
    pub length: f32,
}

impl SegmentFrame {
    pub fn new(a: Vec3, b: Vec3) -> Self {
        let delta = b - a;
        let length = delta.length();
        let dir = delta.normalize_or_zero();
        let right = Vec3::new(dir.y, -dir.x, 0.0).normalize_or_zero();
        let up = right.cross(dir);
        Self {
            dir,
            right,
            up,
            length,
        }
    }

    /// Zero-length or vertical segments have no usable side vector
    pub fn is_degenerate(&self) -> bool {
        self.dir == Vec3::ZERO || self.right == Vec3::ZERO
    }

    /// Centre line point under `p`
    pub fn center(&self, p: Vec3, half_height: f32, lift: f32) -> Vec3 {
        p - half_height * self.up + Vec3::Z * lift
    }

    /// Ring positions around `p`: up, right, down, left
    pub fn ring(&self, p: Vec3, half_width: f32, half_height: f32, lift: f32) -> [Vec3; 4] {
        let c = self.center(p, half_height, lift);
        [
            c + half_height * self.up,
            c + half_width * self.right,
            c - half_height * self.up,
            c - half_width * self.right,
        ]
    }

    /// Ring normals: up, right, down, left
    pub fn ring_normals(&self) -> [Vec3; 4] {
        [self.up, self.right, -self.up, -self.right]
    }
}

/// How the joint between two consecutive segments is closed
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Corner {
    /// One of the frames has no direction
    Degenerate,
    /// Collinear segments
    Straight,
    /// Shallow turn whose side vertices get moved onto the miter line
    Welded { displacement: f32, right_turn: bool },
    /// Sharp turn, or a miter that would overrun a segment; filled with two triangles
    Mitered { right_turn: bool },
}

impl Corner {
    /// Whether the compiler writes real triangles into the lead slot
    pub fn fills_lead(&self) -> bool {
        matches!(self, Corner::Mitered { .. })
    }
}

/// Classify the joint between `prev` and `curr`
pub fn classify_corner(
    prev: &SegmentFrame,
    curr: &SegmentFrame,
    half_width: f32,
    settings: &GeometrySettings,
) -> Corner {
    if prev.is_degenerate() || curr.is_degenerate() {
        return Corner::Degenerate;
    }

    let cos = prev.dir.dot(curr.dir);
    if cos >= 1.0 - STRAIGHT_EPSILON {
        return Corner::Straight;
    }

    let right_turn = prev.up.dot(prev.dir.cross(curr.dir)) <= 0.0;

    let mut displacement = 0.0;
    let mut valid = false;
    if cos > settings.straight_turn_cosine {
        let med = (prev.dir + curr.dir).normalize_or_zero();
        let angle = curr.dir.dot(med).clamp(-1.0, 1.0).acos();
        displacement = half_width * angle.tan();
        valid = displacement > 0.0
            && displacement < 0.5 * prev.length
            && displacement < 0.5 * curr.length;
    }

    let sharp = cos < settings.sharp_turn_cosine;
    if valid && !sharp {
        Corner::Welded {
            displacement,
            right_turn,
        }
    } else {
        Corner::Mitered { right_turn }
    }
}

/// Lead slot of a segment that continues a ring, relative to its first new vertex `base`
pub fn corner_indices(corner: &Corner, base: usize) -> [usize; 6] {
    match *corner {
        // outer side is the left one; fill between old and new left vertices
        Corner::Mitered { right_turn: true } => {
            [base - 4, base + 1, base - 1, base + 1, base - 2, base - 1]
        }
        Corner::Mitered { right_turn: false } => {
            [base - 4, base - 3, base, base - 3, base - 2, base]
        }
        _ => [base; 6],
    }
}

/// Side vertex positions of a welded joint at `p`, seen from the incoming segment
///
/// Returns `(right, left)`. The outer side moves forward along the incoming
/// direction and the inner side moves back, so both tubes meet on the miter line.
pub fn welded_sides(
    prev: &SegmentFrame,
    p: Vec3,
    half_width: f32,
    half_height: f32,
    lift: f32,
    displacement: f32,
    right_turn: bool,
) -> (Vec3, Vec3) {
    let center = prev.center(p, half_height, lift);
    let right = center + half_width * prev.right;
    let left = center - half_width * prev.right;
    let shift = displacement * prev.dir;
    if right_turn {
        (right - shift, left + shift)
    } else {
        (right + shift, left - shift)
    }
}
