//! Color-coding modes of the toolpath preview.

use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Which per-move metric drives the color of extrusion paths
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ViewType {
    /// Constant color per extrusion role
    #[default]
    FeatureType,
    Height,
    Width,
    Feedrate,
    FanSpeed,
    Temperature,
    VolumetricRate,
    /// Color of the active extruder
    Tool,
    /// Color of the active color-print slot
    ColorPrint,
    /// Extruder and role packed into the color channels, for picking
    FilamentId,
    LayerTime,
    LayerTimeLog,
}

impl ViewType {
    pub const ALL: [ViewType; 12] = [
        ViewType::FeatureType,
        ViewType::Height,
        ViewType::Width,
        ViewType::Feedrate,
        ViewType::FanSpeed,
        ViewType::Temperature,
        ViewType::VolumetricRate,
        ViewType::Tool,
        ViewType::ColorPrint,
        ViewType::FilamentId,
        ViewType::LayerTime,
        ViewType::LayerTimeLog,
    ];

    pub fn name(self) -> &'static str {
        match self {
            ViewType::FeatureType => "feature_type",
            ViewType::Height => "height",
            ViewType::Width => "width",
            ViewType::Feedrate => "feedrate",
            ViewType::FanSpeed => "fan_speed",
            ViewType::Temperature => "temperature",
            ViewType::VolumetricRate => "volumetric_rate",
            ViewType::Tool => "tool",
            ViewType::ColorPrint => "color_print",
            ViewType::FilamentId => "filament_id",
            ViewType::LayerTime => "layer_time",
            ViewType::LayerTimeLog => "layer_time_log",
        }
    }

    /// Human readable legend title
    pub fn label(self) -> &'static str {
        match self {
            ViewType::FeatureType => "Line Type",
            ViewType::Height => "Layer Height",
            ViewType::Width => "Line Width",
            ViewType::Feedrate => "Speed",
            ViewType::FanSpeed => "Fan Speed",
            ViewType::Temperature => "Temperature",
            ViewType::VolumetricRate => "Flow",
            ViewType::Tool => "Tool",
            ViewType::ColorPrint => "Filament",
            ViewType::FilamentId => "Filament Id",
            ViewType::LayerTime => "Layer Time",
            ViewType::LayerTimeLog => "Layer Time (log)",
        }
    }
}

impl std::fmt::Display for ViewType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ViewType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase().replace('-', "_");
        ViewType::ALL
            .into_iter()
            .find(|v| v.name() == wanted)
            .ok_or_else(|| format!("Unknown view type '{}'", s))
    }
}
