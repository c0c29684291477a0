//! # Color Policies
//!
//! Maps path metrics to colors for each [`ViewType`]. The policy is
//! resolved once per assembler run from the view type, the value ranges of
//! the loaded stream, and the tool colors.

use super::palette::{self, RANGE_COLORS};
use super::visibility::VisibilityFilter;
use crate::toolpath::Path;
use gcodeview_core::{round_to_bin, Color, ExtrusionRole, MoveKind, MoveRecord, ViewType};

/// Min/max of one metric over the loaded stream
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ValueRange {
    pub min: f32,
    pub max: f32,
    /// Distinct updates that moved neither bound
    pub count: u32,
    pub log_scale: bool,
}

impl Default for ValueRange {
    fn default() -> Self {
        Self::new(false)
    }
}

impl ValueRange {
    pub fn new(log_scale: bool) -> Self {
        Self {
            min: f32::MAX,
            max: f32::MIN,
            count: 0,
            log_scale,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.min > self.max
    }

    pub fn update_from(&mut self, value: f32) {
        if value != self.max && value != self.min {
            self.count += 1;
        }
        self.min = self.min.min(value);
        self.max = self.max.max(value);
    }

    /// Value span of one color bucket
    pub fn step_size(&self) -> f32 {
        let buckets = (RANGE_COLORS.len() - 1) as f32;
        if self.log_scale {
            let min = if self.min == 0.0 { 0.001 } else { self.min };
            (self.max / min).ln() / buckets
        } else {
            (self.max - self.min) / buckets
        }
    }

    /// Value at the lower edge of bucket `step`, for legends
    pub fn value_at_step(&self, step: usize) -> f32 {
        if self.log_scale {
            (self.min.ln() + step as f32 * self.step_size()).exp()
        } else {
            self.min + step as f32 * self.step_size()
        }
    }

    /// Bucket color of `value`, `neutral` when the value is outside the range
    pub fn color_at(&self, value: f32, neutral: Color) -> Color {
        if self.is_empty() || !value.is_finite() || value < self.min || value > self.max {
            return neutral;
        }
        let max_index = RANGE_COLORS.len() - 1;
        if value == self.max && self.max > self.min {
            return RANGE_COLORS[max_index];
        }

        let (value, min) = if self.log_scale {
            if value <= 0.0 || self.min <= 0.0 {
                return neutral;
            }
            (value.ln(), self.min.ln())
        } else {
            (value, self.min)
        };

        let step = self.step_size();
        let t = if step != 0.0 && step.is_finite() {
            (value - min).max(0.0) / step
        } else {
            0.0
        };

        let low = (t as usize).min(max_index);
        let high = (low + 1).min(max_index);
        Color::lerp(RANGE_COLORS[low], RANGE_COLORS[high], t - low as f32)
    }
}

/// Value ranges of every range view type
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExtrusionRanges {
    pub height: ValueRange,
    pub width: ValueRange,
    pub feedrate: ValueRange,
    pub fan_speed: ValueRange,
    pub temperature: ValueRange,
    pub volumetric_rate: ValueRange,
    pub layer_duration: ValueRange,
    pub layer_duration_log: ValueRange,
}

impl Default for ExtrusionRanges {
    fn default() -> Self {
        Self {
            height: ValueRange::default(),
            width: ValueRange::default(),
            feedrate: ValueRange::default(),
            fan_speed: ValueRange::default(),
            temperature: ValueRange::default(),
            volumetric_rate: ValueRange::default(),
            layer_duration: ValueRange::default(),
            layer_duration_log: ValueRange::new(true),
        }
    }
}

impl ExtrusionRanges {
    /// Collect the ranges of `moves`, skipping the first one
    pub fn from_moves(moves: &[MoveRecord], filter: &VisibilityFilter) -> Self {
        let mut ranges = Self::default();
        for record in moves.iter().skip(1) {
            match record.kind {
                MoveKind::Extrude => {
                    ranges.height.update_from(round_to_bin(record.height));
                    ranges.width.update_from(round_to_bin(record.width));
                    ranges.fan_speed.update_from(record.fan_speed);
                    ranges.temperature.update_from(record.temperature);
                    if record.role != ExtrusionRole::Custom
                        || filter.is_role_visible(ExtrusionRole::Custom)
                    {
                        ranges
                            .volumetric_rate
                            .update_from(round_to_bin(record.volumetric_rate));
                    }
                    if record.layer_duration > 0.0 {
                        ranges.layer_duration.update_from(record.layer_duration);
                        ranges.layer_duration_log.update_from(record.layer_duration);
                    }
                    if filter.is_kind_visible(MoveKind::Extrude) {
                        ranges.feedrate.update_from(record.feedrate);
                    }
                }
                MoveKind::Travel if filter.is_kind_visible(MoveKind::Travel) => {
                    ranges.feedrate.update_from(record.feedrate);
                }
                _ => {}
            }
        }
        ranges
    }
}

/// Path metric behind a range view type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RangeMetric {
    Height,
    Width,
    Feedrate,
    FanSpeed,
    Temperature,
    VolumetricRate,
    LayerTime,
}

impl RangeMetric {
    pub fn value(self, path: &Path) -> f32 {
        match self {
            RangeMetric::Height => path.height,
            RangeMetric::Width => path.width,
            RangeMetric::Feedrate => path.feedrate,
            RangeMetric::FanSpeed => path.fan_speed,
            RangeMetric::Temperature => path.temperature,
            RangeMetric::VolumetricRate => round_to_bin(path.volumetric_rate),
            RangeMetric::LayerTime => path.layer_time,
        }
    }
}

/// Extrusion color mapping of one view type
#[derive(Debug, Clone, PartialEq)]
pub enum ColorPolicy {
    Role,
    Range { metric: RangeMetric, range: ValueRange },
    Tool { colors: Vec<Color> },
    ColorPrint { colors: Vec<Color> },
    /// Extruder and role packed into the channels
    FilamentId,
}

impl ColorPolicy {
    pub fn for_view(view: ViewType, ranges: &ExtrusionRanges, tool_colors: &[Color]) -> Self {
        let range = |metric, range: ValueRange| ColorPolicy::Range { metric, range };
        match view {
            ViewType::FeatureType => ColorPolicy::Role,
            ViewType::Height => range(RangeMetric::Height, ranges.height),
            ViewType::Width => range(RangeMetric::Width, ranges.width),
            ViewType::Feedrate => range(RangeMetric::Feedrate, ranges.feedrate),
            ViewType::FanSpeed => range(RangeMetric::FanSpeed, ranges.fan_speed),
            ViewType::Temperature => range(RangeMetric::Temperature, ranges.temperature),
            ViewType::VolumetricRate => range(RangeMetric::VolumetricRate, ranges.volumetric_rate),
            ViewType::LayerTime => range(RangeMetric::LayerTime, ranges.layer_duration),
            ViewType::LayerTimeLog => range(RangeMetric::LayerTime, ranges.layer_duration_log),
            ViewType::Tool => ColorPolicy::Tool {
                colors: tool_colors.to_vec(),
            },
            ViewType::ColorPrint => ColorPolicy::ColorPrint {
                colors: tool_colors.to_vec(),
            },
            ViewType::FilamentId => ColorPolicy::FilamentId,
        }
    }

    pub fn color(&self, path: &Path, neutral: Color) -> Color {
        match self {
            ColorPolicy::Role => palette::role_color(path.role),
            ColorPolicy::Range { metric, range } => range.color_at(metric.value(path), neutral),
            ColorPolicy::Tool { colors } => colors
                .get(usize::from(path.extruder_id))
                .copied()
                .unwrap_or(neutral),
            ColorPolicy::ColorPrint { colors } => colors
                .get(usize::from(path.color_id))
                .copied()
                .unwrap_or(neutral),
            ColorPolicy::FilamentId => {
                let id = f32::from(path.extruder_id) / 256.0;
                let role = path.role.index() as f32 / 256.0;
                Color::rgb(id, role, id)
            }
        }
    }
}

/// Color of any path under the active view type
#[derive(Debug, Clone, PartialEq)]
pub struct PathColorizer {
    pub policy: ColorPolicy,
    pub view: ViewType,
    pub neutral: Color,
}

impl PathColorizer {
    pub fn new(
        view: ViewType,
        ranges: &ExtrusionRanges,
        tool_colors: &[Color],
        neutral: Color,
    ) -> Self {
        Self {
            policy: ColorPolicy::for_view(view, ranges, tool_colors),
            view,
            neutral,
        }
    }

    pub fn color(&self, path: &Path) -> Color {
        match path.kind {
            MoveKind::Extrude => self.policy.color(path, self.neutral),
            MoveKind::Travel => match self.view {
                ViewType::Feedrate | ViewType::Tool => self.policy.color(path, self.neutral),
                _ => palette::travel_color(path.delta_extruder),
            },
            MoveKind::Wipe => palette::WIPE,
            kind => palette::option_color(kind).unwrap_or(self.neutral),
        }
    }

    pub fn marker_color(&self, kind: MoveKind) -> Color {
        palette::option_color(kind).unwrap_or(self.neutral)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::toolpath::{Endpoint, VertexAddress};
    use glam::Vec3;

    fn path_with(record: &MoveRecord) -> Path {
        Path::new(record, Endpoint::default(), VertexAddress::default())
    }

    fn range(min: f32, max: f32) -> ValueRange {
        let mut r = ValueRange::default();
        r.update_from(min);
        r.update_from(max);
        r
    }

    #[test]
    fn test_range_endpoints_map_to_outer_colors() {
        let r = range(10.0, 100.0);
        assert_eq!(r.color_at(10.0, palette::NEUTRAL), RANGE_COLORS[0]);
        assert_eq!(r.color_at(100.0, palette::NEUTRAL), RANGE_COLORS[9]);
        assert_eq!(r.color_at(20.0, palette::NEUTRAL), RANGE_COLORS[1]);
        assert!((r.step_size() - 10.0).abs() < 1e-5);
        assert!((r.value_at_step(3) - 40.0).abs() < 1e-4);
    }

    #[test]
    fn test_out_of_range_is_neutral() {
        let r = range(10.0, 100.0);
        assert_eq!(r.color_at(5.0, palette::NEUTRAL), palette::NEUTRAL);
        assert_eq!(r.color_at(f32::NAN, palette::NEUTRAL), palette::NEUTRAL);
        assert_eq!(
            ValueRange::default().color_at(1.0, palette::NEUTRAL),
            palette::NEUTRAL
        );
    }

    #[test]
    fn test_single_value_range() {
        let r = range(42.0, 42.0);
        assert_eq!(r.step_size(), 0.0);
        assert_eq!(r.color_at(42.0, palette::NEUTRAL), RANGE_COLORS[0]);
    }

    #[test]
    fn test_log_range() {
        let mut r = ValueRange::new(true);
        r.update_from(1.0);
        r.update_from(1000.0);
        assert_eq!(r.color_at(1000.0, palette::NEUTRAL), RANGE_COLORS[9]);
        assert!((r.value_at_step(9) - 1000.0).abs() < 0.1);
    }

    #[test]
    fn test_ranges_from_moves() {
        let moves = vec![
            MoveRecord::travel(Vec3::ZERO).with_feedrate(500.0),
            MoveRecord::extrude(Vec3::X, ExtrusionRole::Perimeter, 0.45, 0.2).with_feedrate(40.0),
            MoveRecord::extrude(Vec3::Y, ExtrusionRole::Perimeter, 0.5, 0.3).with_feedrate(60.0),
            MoveRecord::travel(Vec3::ZERO).with_feedrate(150.0),
        ];
        let mut filter = VisibilityFilter::default();
        let ranges = ExtrusionRanges::from_moves(&moves, &filter);
        assert!((ranges.height.min - 0.2).abs() < 1e-6);
        assert!((ranges.width.max - 0.5).abs() < 1e-6);
        assert_eq!((ranges.feedrate.min, ranges.feedrate.max), (40.0, 150.0));
        assert!(ranges.layer_duration.is_empty());

        filter.set_kind_visible(MoveKind::Travel, false);
        let ranges = ExtrusionRanges::from_moves(&moves, &filter);
        assert_eq!(ranges.feedrate.max, 60.0);
    }

    #[test]
    fn test_unknown_tool_is_neutral() {
        let record =
            MoveRecord::extrude(Vec3::X, ExtrusionRole::Perimeter, 0.4, 0.2).with_extruder(3);
        let colorizer = PathColorizer::new(
            ViewType::Tool,
            &ExtrusionRanges::default(),
            &[palette::DEFAULT_TOOL],
            palette::NEUTRAL,
        );
        assert_eq!(colorizer.color(&path_with(&record)), palette::NEUTRAL);
        let first = MoveRecord::extrude(Vec3::X, ExtrusionRole::Perimeter, 0.4, 0.2);
        assert_eq!(colorizer.color(&path_with(&first)), palette::DEFAULT_TOOL);
    }

    #[test]
    fn test_travel_and_wipe_colors() {
        let colorizer = PathColorizer::new(
            ViewType::FeatureType,
            &ExtrusionRanges::default(),
            &[],
            palette::NEUTRAL,
        );
        let mut travel = MoveRecord::travel(Vec3::X);
        travel.delta_extruder = -1.0;
        assert_eq!(colorizer.color(&path_with(&travel)), palette::TRAVEL_RETRACT);

        let wipe = MoveRecord::new(MoveKind::Wipe, Vec3::X);
        assert_eq!(colorizer.color(&path_with(&wipe)), palette::WIPE);

        let perimeter = MoveRecord::extrude(Vec3::X, ExtrusionRole::Perimeter, 0.4, 0.2);
        assert_eq!(
            colorizer.color(&path_with(&perimeter)),
            palette::role_color(ExtrusionRole::Perimeter)
        );
        assert_eq!(colorizer.marker_color(MoveKind::Seam), palette::SEAM);
    }

    #[test]
    fn test_filament_id_packs_channels() {
        let record =
            MoveRecord::extrude(Vec3::X, ExtrusionRole::Perimeter, 0.4, 0.2).with_extruder(2);
        let color = ColorPolicy::FilamentId.color(&path_with(&record), palette::NEUTRAL);
        assert_eq!(color, Color::rgb(2.0 / 256.0, 1.0 / 256.0, 2.0 / 256.0));
    }
}
