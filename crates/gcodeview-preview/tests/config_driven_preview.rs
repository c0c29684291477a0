//! Preview driven by configuration files on disk

use gcodeview_core::{ExtrusionRole, MoveKind, MoveRecord, MoveStream, Vec3, ViewType};
use gcodeview_preview::{RangeState, ToolpathPreview};
use gcodeview_settings::PreviewConfig;
use std::io::Write;

fn square() -> MoveStream {
    let corner = |x: f32, y: f32| {
        MoveRecord::extrude(Vec3::new(x, y, 0.2), ExtrusionRole::Perimeter, 0.4, 0.2)
            .with_feedrate(30.0)
    };
    MoveStream::new(
        11,
        vec![
            MoveRecord::travel(Vec3::new(0.0, 0.0, 0.2)),
            corner(10.0, 0.0),
            corner(10.0, 10.0),
            corner(0.0, 10.0),
            corner(0.0, 0.0),
        ],
    )
}

#[test]
fn test_toml_config_drives_preview() {
    let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
    writeln!(
        file,
        "[display]\nview_type = \"feedrate\"\ntop_layer_only = false\n"
    )
    .unwrap();

    let config = PreviewConfig::load_or_default(file.path()).unwrap();
    assert_eq!(config.display.view_type, ViewType::Feedrate);

    let mut preview = ToolpathPreview::new(config).unwrap();
    preview.load(&square()).unwrap();
    assert_eq!(preview.view_type(), ViewType::Feedrate);
    assert_eq!(preview.sequential().state, RangeState::Full);

    preview.scrub(1, 2);
    assert_eq!(preview.sequential().state, RangeState::Partial);
    assert!(preview.frame().index_count(MoveKind::Extrude) > 0);
}

#[test]
fn test_missing_config_falls_back_to_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let config = PreviewConfig::load_or_default(&dir.path().join("absent.toml")).unwrap();
    assert_eq!(config, PreviewConfig::default());
}
