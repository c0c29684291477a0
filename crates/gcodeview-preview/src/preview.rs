//! # Toolpath Preview
//!
//! Owns the compiled geometry of one stream and the interaction state
//! around it: visibility flags, the color mode, the layer range and the
//! sequential window. Every mutation re-runs the assembler and replaces
//! the current [`RenderFrame`]. Value ranges and the colorizer are only
//! rebuilt on load and on filter or view changes, so scrubbing costs one
//! assembler run.

use crate::render::palette;
use crate::render::{
    assemble, is_move_visible, resolve_position, AssemblyInput, CpuReadback, ExtrusionRanges,
    PathColorizer, RangeState, RenderFrame, SeqRange, SequentialView, VisibilityFilter,
};
use crate::toolpath::{GeometryCompiler, ToolpathGeometry};
use gcodeview_core::{
    Color, ExtrusionRole, MoveKind, MoveRecord, MoveStream, Result, StreamMetadata, ViewType,
};
use gcodeview_settings::{PreviewConfig, SettingsResult};
use glam::Vec3;
use tracing::{debug, info, warn};

/// Interactive preview of one move stream
#[derive(Debug, Clone)]
pub struct ToolpathPreview {
    config: PreviewConfig,
    default_tool_color: Color,
    neutral_color: Color,
    geometry: ToolpathGeometry,
    moves: Vec<MoveRecord>,
    metadata: StreamMetadata,
    /// Content hash and geometry fingerprint of the loaded stream
    loaded: Option<(u64, u64)>,
    filter: VisibilityFilter,
    view_type: ViewType,
    layers: (usize, usize),
    top_layer_only: bool,
    skip_invisible_moves: bool,
    tool_colors: Vec<Color>,
    ranges: ExtrusionRanges,
    colorizer: PathColorizer,
    sequential: SequentialView,
    frame: RenderFrame,
}

impl Default for ToolpathPreview {
    fn default() -> Self {
        Self::with_colors(PreviewConfig::default(), palette::DEFAULT_TOOL, palette::NEUTRAL)
    }
}

impl ToolpathPreview {
    /// Preview with validated `config`
    pub fn new(config: PreviewConfig) -> SettingsResult<Self> {
        config.validate()?;
        let default_tool_color = config.display.default_tool_color()?;
        let neutral_color = config.display.neutral_color()?;
        Ok(Self::with_colors(config, default_tool_color, neutral_color))
    }

    fn with_colors(config: PreviewConfig, default_tool_color: Color, neutral_color: Color) -> Self {
        let colorizer = PathColorizer::new(
            config.display.view_type,
            &ExtrusionRanges::default(),
            &[],
            neutral_color,
        );
        Self {
            view_type: config.display.view_type,
            top_layer_only: config.display.top_layer_only,
            skip_invisible_moves: config.display.skip_invisible_moves,
            config,
            default_tool_color,
            neutral_color,
            geometry: ToolpathGeometry::default(),
            moves: Vec::new(),
            metadata: StreamMetadata::default(),
            loaded: None,
            filter: VisibilityFilter::default(),
            layers: (0, 0),
            tool_colors: Vec::new(),
            ranges: ExtrusionRanges::default(),
            colorizer,
            sequential: SequentialView::default(),
            frame: RenderFrame::default(),
        }
    }

    pub fn config(&self) -> &PreviewConfig {
        &self.config
    }

    pub fn geometry(&self) -> &ToolpathGeometry {
        &self.geometry
    }

    pub fn frame(&self) -> &RenderFrame {
        &self.frame
    }

    pub fn sequential(&self) -> &SequentialView {
        &self.sequential
    }

    pub fn filter(&self) -> &VisibilityFilter {
        &self.filter
    }

    pub fn ranges(&self) -> &ExtrusionRanges {
        &self.ranges
    }

    pub fn tool_colors(&self) -> &[Color] {
        &self.tool_colors
    }

    pub fn view_type(&self) -> ViewType {
        self.view_type
    }

    pub fn layers_range(&self) -> (usize, usize) {
        self.layers
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded.is_some()
    }

    /// Compile `stream` and show all of it
    ///
    /// Loading a stream with the same moves and metadata again, with
    /// unchanged geometry settings, only refreshes. On error the preview
    /// is left empty.
    pub fn load(&mut self, stream: &MoveStream) -> Result<()> {
        let key = (stream.content_hash(), self.config.geometry_fingerprint());
        if self.loaded == Some(key) {
            debug!(stream = stream.id, "Stream already compiled, refreshing");
            self.refresh();
            return Ok(());
        }

        self.reset();
        let geometry = GeometryCompiler::new(&self.config)
            .compile(stream)
            .inspect_err(|e| warn!(stream = stream.id, error = %e, "Failed to compile stream"))?;

        self.geometry = geometry;
        self.moves = stream.moves.clone();
        self.metadata = stream.metadata.clone();
        self.tool_colors = decode_tool_colors(&self.metadata, self.default_tool_color);
        self.layers = (0, self.geometry.layers.len().saturating_sub(1));
        self.loaded = Some(key);
        self.recolor();

        self.assemble_frame(SeqRange::EMPTY, false, false);
        info!(
            stream = stream.id,
            layers = self.geometry.layers.len(),
            global = %self.sequential.global,
            "Loaded toolpath preview"
        );
        Ok(())
    }

    /// Drop the loaded stream
    pub fn reset(&mut self) {
        self.geometry = ToolpathGeometry::default();
        self.moves.clear();
        self.metadata = StreamMetadata::default();
        self.loaded = None;
        self.tool_colors.clear();
        self.recolor();
        self.layers = (0, 0);
        self.sequential.reset();
        self.frame = RenderFrame::default();
    }

    /// Re-run the assembler, keeping a partial window
    pub fn refresh(&mut self) {
        let keep = self.sequential.state == RangeState::Partial;
        self.assemble_frame(self.sequential.current, keep, keep);
    }

    /// Move the sequential window to `[first, last]`
    pub fn scrub(&mut self, first: usize, last: usize) {
        if self.loaded.is_none() {
            return;
        }
        let (mut first, mut last) = (first.min(last), first.max(last));
        if self.skip_invisible_moves {
            let previous = self.sequential.current;
            first = self.nearest_visible(first, first >= previous.first || previous.is_empty());
            last = self.nearest_visible(last, last >= previous.last || previous.is_empty());
            if first > last {
                last = first;
            }
        }
        self.assemble_frame(SeqRange::new(first, last), true, true);
    }

    pub fn set_kind_visible(&mut self, kind: MoveKind, visible: bool) {
        self.filter.set_kind_visible(kind, visible);
        self.recolor();
        self.refresh();
    }

    pub fn set_role_visible(&mut self, role: ExtrusionRole, visible: bool) {
        self.filter.set_role_visible(role, visible);
        self.recolor();
        self.refresh();
    }

    pub fn set_extruder_visible(&mut self, extruder_id: u8, visible: bool) {
        self.filter.set_extruder_visible(extruder_id, visible);
        self.refresh();
    }

    /// Replace all visibility flags at once
    pub fn set_filter(&mut self, filter: VisibilityFilter) {
        self.filter = filter;
        self.recolor();
        self.refresh();
    }

    pub fn set_view_type(&mut self, view_type: ViewType) {
        self.view_type = view_type;
        self.recolor();
        self.refresh();
    }

    pub fn set_top_layer_only(&mut self, enabled: bool) {
        self.top_layer_only = enabled;
        self.refresh();
    }

    pub fn set_skip_invisible_moves(&mut self, enabled: bool) {
        self.skip_invisible_moves = enabled;
    }

    /// Show layers `low..=high` and reset the window to their full extent
    pub fn set_layers_range(&mut self, low: usize, high: usize) {
        let top = self.geometry.layers.len().saturating_sub(1);
        let high = high.min(top);
        self.layers = (low.min(high), high);
        self.assemble_frame(SeqRange::EMPTY, false, false);
    }

    /// Tool position at the end of the current window, bed origin included
    pub fn current_position(&self) -> Option<Vec3> {
        self.sequential.current_position
    }

    fn assemble_frame(&mut self, current: SeqRange, keep_first: bool, keep_last: bool) {
        if self.loaded.is_none() {
            return;
        }

        let frame = assemble(&AssemblyInput {
            geometry: &self.geometry,
            filter: &self.filter,
            colorizer: &self.colorizer,
            layers: self.layers,
            current,
            keep_first,
            keep_last,
            top_layer_only: self.top_layer_only,
        });

        self.sequential.update(frame.current, frame.global, frame.top_layer);
        let (position, offset) = self.locate_cursor(frame.current);
        self.sequential.current_position = position;
        self.sequential.current_offset = offset;
        self.frame = frame;
    }

    /// Rebuild the value ranges and the colorizer from the loaded moves
    fn recolor(&mut self) {
        self.ranges = ExtrusionRanges::from_moves(&self.moves, &self.filter);
        self.colorizer = PathColorizer::new(
            self.view_type,
            &self.ranges,
            &self.tool_colors,
            self.neutral_color,
        );
    }

    fn locate_cursor(&self, current: SeqRange) -> (Option<Vec3>, Vec3) {
        if current.is_empty() {
            return (None, Vec3::ZERO);
        }
        let query = CpuReadback::new(&self.geometry);
        let (position, offset) = resolve_position(&self.geometry, &query, current.last)
            .or_else(|| {
                let raw = self.geometry.ids.raw(current.last)?;
                self.moves.get(raw).map(|m| (m.position, Vec3::ZERO))
            })
            .unzip();
        (
            position.map(|p| p + self.metadata.bed_origin),
            offset.unwrap_or(Vec3::ZERO),
        )
    }

    /// Closest visible id from `s_id` walking up or down, bounded by the global extent
    fn nearest_visible(&self, s_id: usize, upward: bool) -> usize {
        let global = self.sequential.global;
        if global.is_empty() {
            return s_id;
        }
        let start = s_id.clamp(global.first, global.last);
        let visible = |s: &usize| is_move_visible(&self.geometry, &self.filter, *s);
        let found = if upward {
            (start..=global.last).find(visible)
        } else {
            (global.first..=start).rev().find(visible)
        };
        found.unwrap_or(start)
    }
}

/// One color per extruder, padded with `default` to at least one entry
pub fn decode_tool_colors(metadata: &StreamMetadata, default: Color) -> Vec<Color> {
    let count = metadata.extruders_count.max(metadata.extruder_colors.len()).max(1);
    let mut colors: Vec<Color> = metadata
        .extruder_colors
        .iter()
        .enumerate()
        .map(|(extruder, hex)| {
            Color::from_hex(hex).unwrap_or_else(|e| {
                warn!(extruder, color = %hex, error = %e, "Invalid extruder color, using default");
                default
            })
        })
        .collect();
    colors.resize(count, default);
    colors
}
