//! Fixed colors of the toolpath preview

use gcodeview_core::{Color, ExtrusionRole, MoveKind};

const fn hex_rgb(hex: u32) -> Color {
    Color::rgb(
        ((hex >> 16) & 0xff) as f32 / 255.0,
        ((hex >> 8) & 0xff) as f32 / 255.0,
        (hex & 0xff) as f32 / 255.0,
    )
}

/// One color per [`ExtrusionRole`], in declaration order
pub const ROLE_COLORS: [Color; ExtrusionRole::COUNT] = [
    Color::rgb(0.90, 0.70, 0.70), // None
    Color::rgb(1.00, 0.90, 0.30), // Perimeter
    Color::rgb(1.00, 0.49, 0.22), // ExternalPerimeter
    Color::rgb(0.12, 0.12, 1.00), // OverhangPerimeter
    Color::rgb(0.69, 0.19, 0.16), // InternalInfill
    Color::rgb(0.59, 0.33, 0.80), // SolidInfill
    Color::rgb(0.94, 0.25, 0.25), // TopSolidInfill
    Color::rgb(0.40, 0.36, 0.78), // BottomSurface
    Color::rgb(1.00, 0.55, 0.41), // Ironing
    Color::rgb(0.30, 0.40, 0.63), // BridgeInfill
    Color::rgb(0.30, 0.50, 0.73), // InternalBridgeInfill
    Color::rgb(1.00, 1.00, 1.00), // GapFill
    Color::rgb(0.00, 0.53, 0.43), // Skirt
    Color::rgb(0.00, 0.23, 0.43), // Brim
    Color::rgb(0.00, 1.00, 0.00), // SupportMaterial
    Color::rgb(0.00, 0.50, 0.00), // SupportMaterialInterface
    Color::rgb(0.00, 0.25, 0.00), // SupportTransition
    Color::rgb(0.70, 0.89, 0.67), // WipeTower
    Color::rgb(0.37, 0.82, 0.58), // Custom
];

pub const RETRACT: Color = Color::rgb(0.803, 0.135, 0.839);
pub const UNRETRACT: Color = Color::rgb(0.287, 0.679, 0.810);
pub const SEAM: Color = Color::rgb(0.900, 0.900, 0.900);
pub const TOOL_CHANGE: Color = Color::rgb(0.758, 0.744, 0.389);
pub const COLOR_CHANGE: Color = Color::rgb(0.856, 0.582, 0.546);
pub const PAUSE_PRINT: Color = Color::rgb(0.322, 0.942, 0.512);
pub const CUSTOM_CODE: Color = Color::rgb(0.886, 0.825, 0.262);

pub const TRAVEL_MOVE: Color = Color::rgb(0.219, 0.282, 0.609);
pub const TRAVEL_EXTRUDE: Color = Color::rgb(0.112, 0.422, 0.103);
pub const TRAVEL_RETRACT: Color = Color::rgb(0.505, 0.064, 0.028);

/// Blue to red buckets of the range view types
pub const RANGE_COLORS: [Color; 10] = [
    hex_rgb(0x0b2c7a),
    hex_rgb(0x135985),
    hex_rgb(0x1c8891),
    hex_rgb(0x04d60f),
    hex_rgb(0xaaf200),
    hex_rgb(0xfcf903),
    hex_rgb(0xf5ce0a),
    hex_rgb(0xd16830),
    hex_rgb(0xc2523c),
    hex_rgb(0x942616),
];

pub const WIPE: Color = Color::YELLOW;
pub const NEUTRAL: Color = Color::DARK_GRAY;
pub const DEFAULT_TOOL: Color = hex_rgb(0xff8000);

pub fn role_color(role: ExtrusionRole) -> Color {
    ROLE_COLORS[role.index()]
}

/// Marker color, `None` for kinds drawn as lines or tubes
pub fn option_color(kind: MoveKind) -> Option<Color> {
    match kind {
        MoveKind::Retract => Some(RETRACT),
        MoveKind::Unretract => Some(UNRETRACT),
        MoveKind::Seam => Some(SEAM),
        MoveKind::ToolChange => Some(TOOL_CHANGE),
        MoveKind::ColorChange => Some(COLOR_CHANGE),
        MoveKind::PausePrint => Some(PAUSE_PRINT),
        MoveKind::CustomCode => Some(CUSTOM_CODE),
        _ => None,
    }
}

/// Travel color by what the extruder does during the move
pub fn travel_color(delta_extruder: f32) -> Color {
    if delta_extruder < 0.0 {
        TRAVEL_RETRACT
    } else if delta_extruder > 0.0 {
        TRAVEL_EXTRUDE
    } else {
        TRAVEL_MOVE
    }
}
