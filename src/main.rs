use anyhow::Context;
use clap::Parser;
use gcodeview::{init_logging, MoveKind, MoveStream, PreviewConfig, ToolpathPreview, ViewType};
use std::fs::File;
use std::io::BufReader;
use std::path::PathBuf;
use tracing::info;

const LONG_VERSION: &str = concat!(env!("CARGO_PKG_VERSION"), " (", env!("BUILD_DATE"), ")");

/// Compile a move stream into preview geometry and report the draw ranges
#[derive(Parser, Debug)]
#[command(name = "gcodeview")]
#[command(author, version = LONG_VERSION, about, long_about = None)]
struct Cli {
    /// Move stream (JSON)
    #[arg(value_name = "MOVES")]
    moves: PathBuf,

    /// Preview config (.json or .toml), the user config file otherwise
    #[arg(value_name = "CONFIG")]
    config: Option<PathBuf>,

    /// Sequential window to show, as FIRST:LAST
    #[arg(short, long, value_name = "FIRST:LAST", value_parser = parse_range)]
    range: Option<(usize, usize)>,

    /// Color mode, overriding the config (feature_type, height, feedrate, tool, ...)
    #[arg(long, value_name = "TYPE")]
    view: Option<ViewType>,

    /// Print the render frame as JSON on stdout
    #[arg(long)]
    json: bool,
}

fn parse_range(value: &str) -> Result<(usize, usize), String> {
    let (first, last) = value
        .split_once(':')
        .ok_or_else(|| format!("expected FIRST:LAST, got '{}'", value))?;
    let first = first
        .trim()
        .parse()
        .map_err(|e| format!("invalid range start '{}': {}", first, e))?;
    let last = last
        .trim()
        .parse()
        .map_err(|e| format!("invalid range end '{}': {}", last, e))?;
    Ok((first, last))
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    init_logging()?;
    info!(version = gcodeview::VERSION, built = gcodeview::BUILD_DATE, "Starting gcodeview");

    let config_path = match cli.config {
        Some(path) => path,
        None => PreviewConfig::default_path().context("Failed to resolve config path")?,
    };
    let mut config = PreviewConfig::load_or_default(&config_path)
        .with_context(|| format!("Failed to load config {}", config_path.display()))?;
    if let Some(view) = cli.view {
        config.display.view_type = view;
    }

    let file = File::open(&cli.moves)
        .with_context(|| format!("Failed to open {}", cli.moves.display()))?;
    let stream = MoveStream::from_reader(BufReader::new(file))
        .with_context(|| format!("Failed to parse {}", cli.moves.display()))?;

    let mut preview = ToolpathPreview::new(config).context("Invalid preview config")?;
    preview
        .load(&stream)
        .with_context(|| format!("Failed to build preview for {}", cli.moves.display()))?;

    if let Some((first, last)) = cli.range {
        preview.scrub(first, last);
    }

    let stats = preview.geometry().stats;
    for buffer in &preview.geometry().buffers {
        if buffer.is_empty() {
            continue;
        }
        info!(
            kind = %buffer.kind,
            vertex_arrays = buffer.vertices.len(),
            index_arrays = buffer.indices.len(),
            vertices = buffer.total_vertices(),
            indices = buffer.total_indices(),
            instances = buffer.instances.len(),
            paths = buffer.paths.len(),
            "Buffer"
        );
    }

    let frame = preview.frame();
    let sequential = preview.sequential();
    info!(
        moves = stats.moves,
        layers = stats.layers,
        view = %preview.view_type(),
        render_paths = frame.paths.len(),
        extrude_indices = frame.index_count(MoveKind::Extrude),
        caps = frame.caps.len(),
        instance_ranges = frame.instances.len(),
        current = %sequential.current,
        global = %sequential.global,
        state = ?sequential.state,
        position = ?preview.current_position(),
        "Preview ready"
    );

    if cli.json {
        let stdout = std::io::stdout();
        serde_json::to_writer_pretty(stdout.lock(), frame).context("Failed to write frame")?;
        println!();
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_full_command_line() {
        let cli = Cli::try_parse_from([
            "gcodeview",
            "moves.json",
            "preview.toml",
            "--range",
            "3:17",
            "--view",
            "layer-time",
            "--json",
        ])
        .unwrap();
        assert_eq!(cli.moves, PathBuf::from("moves.json"));
        assert_eq!(cli.config, Some(PathBuf::from("preview.toml")));
        assert_eq!(cli.range, Some((3, 17)));
        assert_eq!(cli.view, Some(ViewType::LayerTime));
        assert!(cli.json);
    }

    #[test]
    fn test_rejects_bad_input() {
        assert!(Cli::try_parse_from(["gcodeview"]).is_err());
        assert!(Cli::try_parse_from(["gcodeview", "a.json", "b.toml", "extra.json"]).is_err());
        assert!(Cli::try_parse_from(["gcodeview", "a.json", "--range", "3"]).is_err());
        assert!(Cli::try_parse_from(["gcodeview", "a.json", "--range", "a:4"]).is_err());
        assert!(Cli::try_parse_from(["gcodeview", "a.json", "--view", "bogus"]).is_err());
    }

    #[test]
    fn test_help_and_version_are_not_failures() {
        let help = Cli::try_parse_from(["gcodeview", "--help"]).unwrap_err();
        assert_eq!(help.kind(), clap::error::ErrorKind::DisplayHelp);
        let version = Cli::try_parse_from(["gcodeview", "-V"]).unwrap_err();
        assert_eq!(version.kind(), clap::error::ErrorKind::DisplayVersion);
        assert!(LONG_VERSION.starts_with(gcodeview::VERSION));
    }
}
