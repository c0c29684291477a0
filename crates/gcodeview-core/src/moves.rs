//! Move records produced by the slicing engine
//!
//! A [`MoveStream`] is the ordered list of motion instructions of one
//! sliced plate. Every record carries the tool position after the move,
//! its kind and extrusion role, and the per-move metrics used for
//! color coding. Curved moves carry their intermediate points.

use crate::error::{GeometryError, Result, StreamError};
use glam::Vec3;
use serde::{Deserialize, Serialize};
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

/// Highest extruder count addressable by `u8` extruder ids
pub const MAX_EXTRUDERS: usize = 256;

/// Kind of a motion instruction
///
/// The order matters: every kind from [`MoveKind::Retract`] on owns one
/// geometry buffer, indexed by [`MoveKind::buffer_slot`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MoveKind {
    Noop,
    Retract,
    Unretract,
    Seam,
    ToolChange,
    ColorChange,
    PausePrint,
    CustomCode,
    Travel,
    Wipe,
    Extrude,
}

impl MoveKind {
    /// Kinds that own a geometry buffer, in slot order
    pub const BUFFERED: [MoveKind; 10] = [
        MoveKind::Retract,
        MoveKind::Unretract,
        MoveKind::Seam,
        MoveKind::ToolChange,
        MoveKind::ColorChange,
        MoveKind::PausePrint,
        MoveKind::CustomCode,
        MoveKind::Travel,
        MoveKind::Wipe,
        MoveKind::Extrude,
    ];

    /// Number of geometry buffers
    pub const BUFFER_COUNT: usize = Self::BUFFERED.len();

    /// Slot of this kind's geometry buffer, `None` for [`MoveKind::Noop`]
    pub fn buffer_slot(self) -> Option<usize> {
        match self {
            MoveKind::Noop => None,
            kind => Some(kind as usize - MoveKind::Retract as usize),
        }
    }

    /// Inverse of [`MoveKind::buffer_slot`]
    pub fn from_buffer_slot(slot: usize) -> Option<MoveKind> {
        Self::BUFFERED.get(slot).copied()
    }

    /// Point-like events drawn as instanced markers
    pub fn is_marker(self) -> bool {
        matches!(
            self,
            MoveKind::Retract
                | MoveKind::Unretract
                | MoveKind::Seam
                | MoveKind::ToolChange
                | MoveKind::ColorChange
                | MoveKind::PausePrint
                | MoveKind::CustomCode
        )
    }

    /// Material deposition drawn as tubes
    pub fn is_tube(self) -> bool {
        matches!(self, MoveKind::Extrude | MoveKind::Wipe)
    }

    pub fn is_line(self) -> bool {
        self == MoveKind::Travel
    }

    pub fn name(self) -> &'static str {
        match self {
            MoveKind::Noop => "noop",
            MoveKind::Retract => "retract",
            MoveKind::Unretract => "unretract",
            MoveKind::Seam => "seam",
            MoveKind::ToolChange => "tool_change",
            MoveKind::ColorChange => "color_change",
            MoveKind::PausePrint => "pause_print",
            MoveKind::CustomCode => "custom_code",
            MoveKind::Travel => "travel",
            MoveKind::Wipe => "wipe",
            MoveKind::Extrude => "extrude",
        }
    }
}

impl std::fmt::Display for MoveKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Purpose of an extrusion, as classified by the slicer
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum ExtrusionRole {
    #[default]
    None,
    Perimeter,
    ExternalPerimeter,
    OverhangPerimeter,
    InternalInfill,
    SolidInfill,
    TopSolidInfill,
    BottomSurface,
    Ironing,
    BridgeInfill,
    InternalBridgeInfill,
    GapFill,
    Skirt,
    Brim,
    SupportMaterial,
    SupportMaterialInterface,
    SupportTransition,
    WipeTower,
    Custom,
}

impl ExtrusionRole {
    pub const ALL: [ExtrusionRole; 19] = [
        ExtrusionRole::None,
        ExtrusionRole::Perimeter,
        ExtrusionRole::ExternalPerimeter,
        ExtrusionRole::OverhangPerimeter,
        ExtrusionRole::InternalInfill,
        ExtrusionRole::SolidInfill,
        ExtrusionRole::TopSolidInfill,
        ExtrusionRole::BottomSurface,
        ExtrusionRole::Ironing,
        ExtrusionRole::BridgeInfill,
        ExtrusionRole::InternalBridgeInfill,
        ExtrusionRole::GapFill,
        ExtrusionRole::Skirt,
        ExtrusionRole::Brim,
        ExtrusionRole::SupportMaterial,
        ExtrusionRole::SupportMaterialInterface,
        ExtrusionRole::SupportTransition,
        ExtrusionRole::WipeTower,
        ExtrusionRole::Custom,
    ];

    pub const COUNT: usize = Self::ALL.len();

    pub fn index(self) -> usize {
        self as usize
    }
}

/// One motion instruction
///
/// `position` is the tool position at the end of the move. The start is
/// the previous record's position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MoveRecord {
    pub kind: MoveKind,
    #[serde(default)]
    pub role: ExtrusionRole,
    pub position: Vec3,
    /// Extruder axis delta, negative for retractions
    #[serde(default)]
    pub delta_extruder: f32,
    #[serde(default)]
    pub width: f32,
    #[serde(default)]
    pub height: f32,
    /// mm/s
    #[serde(default)]
    pub feedrate: f32,
    /// percent
    #[serde(default)]
    pub fan_speed: f32,
    /// °C
    #[serde(default)]
    pub temperature: f32,
    /// mm³/s
    #[serde(default)]
    pub volumetric_rate: f32,
    /// Duration in seconds of the layer this move belongs to
    #[serde(default)]
    pub layer_duration: f32,
    #[serde(default)]
    pub extruder_id: u8,
    /// Color-print slot, changes on M600 style color swaps
    #[serde(default)]
    pub color_id: u8,
    /// Intermediate points of an arc move, excluding both endpoints
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub interpolation_points: Vec<Vec3>,
}

impl MoveRecord {
    fn hash_content<H: Hasher>(&self, state: &mut H) {
        self.kind.hash(state);
        self.role.hash(state);
        hash_vec3(self.position, state);
        for value in [
            self.delta_extruder,
            self.width,
            self.height,
            self.feedrate,
            self.fan_speed,
            self.temperature,
            self.volumetric_rate,
            self.layer_duration,
        ] {
            value.to_bits().hash(state);
        }
        self.extruder_id.hash(state);
        self.color_id.hash(state);
        self.interpolation_points.len().hash(state);
        for &point in &self.interpolation_points {
            hash_vec3(point, state);
        }
    }

    pub fn new(kind: MoveKind, position: Vec3) -> Self {
        Self {
            kind,
            role: ExtrusionRole::None,
            position,
            delta_extruder: 0.0,
            width: 0.0,
            height: 0.0,
            feedrate: 0.0,
            fan_speed: 0.0,
            temperature: 0.0,
            volumetric_rate: 0.0,
            layer_duration: 0.0,
            extruder_id: 0,
            color_id: 0,
            interpolation_points: Vec::new(),
        }
    }

    /// Extrusion move with the given cross section
    pub fn extrude(position: Vec3, role: ExtrusionRole, width: f32, height: f32) -> Self {
        Self {
            role,
            width,
            height,
            delta_extruder: 1.0,
            ..Self::new(MoveKind::Extrude, position)
        }
    }

    pub fn travel(position: Vec3) -> Self {
        Self::new(MoveKind::Travel, position)
    }

    pub fn with_feedrate(mut self, feedrate: f32) -> Self {
        self.feedrate = feedrate;
        self
    }

    pub fn with_extruder(mut self, extruder_id: u8) -> Self {
        self.extruder_id = extruder_id;
        self
    }

    pub fn with_curve(mut self, points: Vec<Vec3>) -> Self {
        self.interpolation_points = points;
        self
    }

    /// Number of straight sub-segments this move expands to
    pub fn segment_count(&self) -> usize {
        self.interpolation_points.len() + 1
    }

    pub fn is_curve(&self) -> bool {
        !self.interpolation_points.is_empty()
    }

    pub fn is_finite(&self) -> bool {
        self.position.is_finite() && self.interpolation_points.iter().all(|p| p.is_finite())
    }
}

/// Layer table entry supplied by spiral vase prints
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SpiralVaseLayer {
    pub z: f32,
    /// First sequential id of the layer
    pub first: usize,
    /// Last sequential id of the layer
    pub last: usize,
}

/// Plate-wide data supplied alongside the moves
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamMetadata {
    /// One `#RRGGBB` string per extruder
    pub extruder_colors: Vec<String>,
    pub filament_diameters: Vec<f32>,
    pub filament_densities: Vec<f32>,
    pub extruders_count: usize,
    pub spiral_vase_layers: Vec<SpiralVaseLayer>,
    /// Plate origin, added to reported marker positions
    pub bed_origin: Vec3,
}

impl StreamMetadata {
    fn hash_content<H: Hasher>(&self, state: &mut H) {
        self.extruder_colors.hash(state);
        self.filament_diameters.len().hash(state);
        self.filament_densities.len().hash(state);
        for value in self.filament_diameters.iter().chain(&self.filament_densities) {
            value.to_bits().hash(state);
        }
        self.extruders_count.hash(state);
        self.spiral_vase_layers.len().hash(state);
        for layer in &self.spiral_vase_layers {
            layer.z.to_bits().hash(state);
            layer.first.hash(state);
            layer.last.hash(state);
        }
        hash_vec3(self.bed_origin, state);
    }
}

fn hash_vec3<H: Hasher>(v: Vec3, state: &mut H) {
    for component in v.to_array() {
        component.to_bits().hash(state);
    }
}

/// Ordered move records of one sliced plate
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct MoveStream {
    /// Producer-assigned identity, zero when the producer gave none
    #[serde(default)]
    pub id: u64,
    pub moves: Vec<MoveRecord>,
    #[serde(default)]
    pub metadata: StreamMetadata,
}

impl MoveStream {
    pub fn new(id: u64, moves: Vec<MoveRecord>) -> Self {
        Self {
            id,
            moves,
            metadata: StreamMetadata::default(),
        }
    }

    /// Decode a stream from JSON
    pub fn from_json(json: &str) -> Result<Self> {
        let stream: MoveStream = serde_json::from_str(json).map_err(StreamError::Decode)?;
        stream.validate()?;
        Ok(stream)
    }

    pub fn from_reader<R: std::io::Read>(reader: R) -> Result<Self> {
        let stream: MoveStream = serde_json::from_reader(reader).map_err(StreamError::Decode)?;
        stream.validate()?;
        Ok(stream)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn is_empty(&self) -> bool {
        self.moves.is_empty()
    }

    /// Hash of the moves and metadata
    ///
    /// The producer id is left out, so two decodes of the same file hash
    /// equal while id-less streams with different moves do not.
    pub fn content_hash(&self) -> u64 {
        let mut hasher = DefaultHasher::new();
        self.moves.len().hash(&mut hasher);
        for record in &self.moves {
            record.hash_content(&mut hasher);
        }
        self.metadata.hash_content(&mut hasher);
        hasher.finish()
    }

    pub fn len(&self) -> usize {
        self.moves.len()
    }

    /// Reject streams that no geometry can be built from
    pub fn validate(&self) -> Result<()> {
        if self.metadata.extruders_count > MAX_EXTRUDERS {
            return Err(StreamError::TooManyExtruders {
                count: self.metadata.extruders_count,
                max: MAX_EXTRUDERS,
            }
            .into());
        }

        if let Some(move_index) = self.moves.iter().position(|m| !m.is_finite()) {
            tracing::warn!(move_index, "Rejecting stream with non-finite position");
            return Err(GeometryError::NonFinitePosition { move_index }.into());
        }

        Ok(())
    }
}

/// Round to a fixed-step bin
///
/// Values from 0.095 up keep two decimal places. Each decade below that
/// keeps one more, down to steps of 1e-6. Used to keep float noise from
/// splitting otherwise identical paths.
pub fn round_to_bin(value: f32) -> f32 {
    const SCALE: [f32; 5] = [100.0, 1000.0, 10000.0, 100000.0, 1000000.0];
    const INV_SCALE: [f32; 5] = [0.01, 0.001, 0.0001, 0.00001, 0.000001];
    const THRESHOLD: [f32; 5] = [0.095, 0.0095, 0.00095, 0.000095, 0.0000095];

    let mut i = 0;
    while i < 4 && value < THRESHOLD[i] {
        i += 1;
    }
    (value * SCALE[i]).round() * INV_SCALE[i]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_buffer_slots_are_dense() {
        assert_eq!(MoveKind::Noop.buffer_slot(), None);
        for (slot, kind) in MoveKind::BUFFERED.iter().enumerate() {
            assert_eq!(kind.buffer_slot(), Some(slot));
            assert_eq!(MoveKind::from_buffer_slot(slot), Some(*kind));
        }
        assert_eq!(MoveKind::from_buffer_slot(MoveKind::BUFFER_COUNT), None);
    }

    #[test]
    fn test_primitive_classification() {
        assert!(MoveKind::Seam.is_marker());
        assert!(MoveKind::Extrude.is_tube());
        assert!(MoveKind::Wipe.is_tube());
        assert!(MoveKind::Travel.is_line());
        assert!(!MoveKind::Noop.is_marker());
    }

    #[test]
    fn test_round_to_bin() {
        assert!((round_to_bin(0.4) - 0.4).abs() < 1e-6);
        assert!((round_to_bin(0.2049) - 0.2).abs() < 1e-6);
        assert!((round_to_bin(0.0123) - 0.012).abs() < 1e-6);
        assert!((round_to_bin(1.234) - 1.23).abs() < 1e-6);
        assert!((round_to_bin(5.678) - 5.68).abs() < 1e-5);
    }

    #[test]
    fn test_content_hash_ignores_id() {
        let moves = vec![
            MoveRecord::travel(Vec3::ZERO),
            MoveRecord::extrude(Vec3::X, ExtrusionRole::Perimeter, 0.4, 0.2),
        ];
        let a = MoveStream::new(0, moves.clone());
        let b = MoveStream::new(7, moves);
        assert_eq!(a.content_hash(), b.content_hash());

        let mut moved = a.clone();
        moved.moves[1].position.y = 1.0;
        assert_ne!(a.content_hash(), moved.content_hash());

        let mut recolored = a.clone();
        recolored.metadata.extruder_colors.push("#FF0000".to_string());
        assert_ne!(a.content_hash(), recolored.content_hash());
    }

    #[test]
    fn test_record_json_defaults() {
        let json = r#"{ "kind": "extrude", "position": [1.0, 2.0, 0.2] }"#;
        let record: MoveRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record.kind, MoveKind::Extrude);
        assert_eq!(record.role, ExtrusionRole::None);
        assert_eq!(record.position, Vec3::new(1.0, 2.0, 0.2));
        assert!(record.interpolation_points.is_empty());
        assert_eq!(record.segment_count(), 1);
    }

    #[test]
    fn test_stream_rejects_nan() {
        let mut stream = MoveStream::new(1, vec![MoveRecord::travel(Vec3::ZERO)]);
        stream.moves.push(MoveRecord::travel(Vec3::new(f32::NAN, 0.0, 0.0)));
        let err = stream.validate().unwrap_err();
        assert!(err.is_geometry_error());
    }

    #[test]
    fn test_stream_rejects_too_many_extruders() {
        let mut stream = MoveStream::default();
        stream.metadata.extruders_count = 300;
        assert!(stream.validate().unwrap_err().is_stream_error());
    }
}
