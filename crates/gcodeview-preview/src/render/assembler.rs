//! # Render-Path Assembler
//!
//! Re-derives what to draw from compiled geometry on every visibility,
//! color or range change. Nothing here touches vertex data; the output is
//! a list of index ranges per buffer and color, plus the small range caps
//! that close tubes cut by the current window.
//!
//! Moves own the segment that ends on them, so a window `[first, last]`
//! draws the segments owned by ids `first + 1..=last`. A single-id window
//! `[f, f]` draws the geometry of move `f` alone.

use super::color_policy::PathColorizer;
use super::sequential::SeqRange;
use super::visibility::VisibilityFilter;
use crate::toolpath::{
    tube, IndexType, Path, PrimitiveKind, SubPath, ToolpathBuffer, ToolpathGeometry,
};
use gcodeview_core::{Color, MoveKind};
use gcodeview_settings::{END_CAP_INDICES, INDEX_SIZE_BYTES};
use glam::Vec3;
use serde::Serialize;
use std::collections::HashMap;
use tracing::{debug, trace, warn};

/// Relative tolerance for joining travel paths that touch
const TRAVEL_JOIN_PRECISION: f32 = 1.0e-5;

/// Everything one assembly run depends on
#[derive(Debug, Clone, Copy)]
pub struct AssemblyInput<'a> {
    pub geometry: &'a ToolpathGeometry,
    pub filter: &'a VisibilityFilter,
    pub colorizer: &'a PathColorizer,
    /// Inclusive `(low, high)` layer indices
    pub layers: (usize, usize),
    /// Requested window, used when the keep flags are set
    pub current: SeqRange,
    pub keep_first: bool,
    pub keep_last: bool,
    pub top_layer_only: bool,
}

/// Index ranges of one index array drawn with one color
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RenderPath {
    pub kind: MoveKind,
    pub ibuffer: usize,
    pub color: Color,
    /// Byte offsets into the index array
    pub offsets: Vec<usize>,
    /// Index counts, parallel to `offsets`
    pub sizes: Vec<usize>,
}

impl RenderPath {
    fn new(kind: MoveKind, ibuffer: usize, color: Color) -> Self {
        Self {
            kind,
            ibuffer,
            color,
            offsets: Vec::new(),
            sizes: Vec::new(),
        }
    }

    /// Whether the index at `byte_offset` is drawn by this path
    pub fn contains(&self, byte_offset: usize) -> bool {
        self.offsets.iter().zip(&self.sizes).any(|(&offset, &size)| {
            offset <= byte_offset && byte_offset < offset + size * INDEX_SIZE_BYTES
        })
    }

    pub fn index_count(&self) -> usize {
        self.sizes.iter().sum()
    }

    fn push(&mut self, byte_offset: usize, count: usize) {
        if let (Some(&last_offset), Some(last_size)) =
            (self.offsets.last(), self.sizes.last_mut())
        {
            if last_offset + *last_size * INDEX_SIZE_BYTES == byte_offset {
                *last_size += count;
                return;
            }
        }
        self.offsets.push(byte_offset);
        self.sizes.push(count);
    }
}

/// Two triangles closing a tube where the window cuts it
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RangeCap {
    pub kind: MoveKind,
    pub ibuffer: usize,
    /// Vertex indices into the index array's vertex array
    pub indices: [IndexType; 6],
    pub color: Color,
}

/// Run of marker instances drawn with one color
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct InstanceRange {
    pub kind: MoveKind,
    pub offset: usize,
    pub count: usize,
    pub color: Color,
}

/// Output of one assembly run
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RenderFrame {
    pub paths: Vec<RenderPath>,
    pub caps: Vec<RangeCap>,
    pub instances: Vec<InstanceRange>,
    pub current: SeqRange,
    pub global: SeqRange,
    pub top_layer: SeqRange,
}

impl Default for RenderFrame {
    fn default() -> Self {
        Self {
            paths: Vec::new(),
            caps: Vec::new(),
            instances: Vec::new(),
            current: SeqRange::EMPTY,
            global: SeqRange::EMPTY,
            top_layer: SeqRange::EMPTY,
        }
    }
}

impl RenderFrame {
    pub fn is_empty(&self) -> bool {
        self.paths.is_empty() && self.caps.is_empty() && self.instances.is_empty()
    }

    /// Color of the render path drawing the index at `byte_offset`
    pub fn color_at(&self, kind: MoveKind, ibuffer: usize, byte_offset: usize) -> Option<Color> {
        self.paths
            .iter()
            .find(|p| p.kind == kind && p.ibuffer == ibuffer && p.contains(byte_offset))
            .map(|p| p.color)
    }

    /// Indices drawn for `kind`, range caps excluded
    pub fn index_count(&self, kind: MoveKind) -> usize {
        self.paths
            .iter()
            .filter(|p| p.kind == kind)
            .map(RenderPath::index_count)
            .sum()
    }
}

/// Cut position of a range cap, resolved to a color once all paths exist
struct PendingCap {
    kind: MoveKind,
    ibuffer: usize,
    stem: usize,
    indices: [IndexType; 6],
}

/// Build the render frame for `input`
pub fn assemble(input: &AssemblyInput<'_>) -> RenderFrame {
    let geometry = input.geometry;
    let filter = input.filter;
    let mut frame = RenderFrame::default();

    let Some(span) = geometry.layers.id_span(input.layers.0, input.layers.1) else {
        debug!("Layer range outside the layer table, nothing to draw");
        return frame;
    };
    let top_span = geometry.layers.id_span(input.layers.1, input.layers.1);

    // first pass: eligible paths and the global/top-layer extents
    let mut eligible: Vec<(usize, usize, bool)> = Vec::new();
    let mut global = SeqRange::EMPTY;
    let mut top_layer = SeqRange::EMPTY;
    for (slot, buffer) in geometry.buffers.iter().enumerate() {
        if !filter.is_kind_visible(buffer.kind) {
            continue;
        }

        if buffer.kind.is_marker() {
            let instances = &buffer.instances;
            let ids = instances
                .s_ids
                .get(instances.lower_bound(span.0)..instances.upper_bound(span.1))
                .unwrap_or_default();
            for &s_id in ids {
                global.extend(s_id, s_id);
                if top_span.is_some_and(|(low, high)| low <= s_id && s_id <= high) {
                    top_layer.extend(s_id, s_id);
                }
            }
            continue;
        }

        for (p, path) in buffer.paths.iter().enumerate() {
            if !filter.is_path_visible(path) {
                trace!(kind = %path.kind, role = ?path.role, "Path filtered out");
                continue;
            }
            if !path_in_span(buffer, p, span) {
                continue;
            }
            global.extend(path.first_s_id(), path.last_s_id());
            let in_top = top_span.is_some_and(|top| path_in_span(buffer, p, top));
            if in_top {
                top_layer.extend(path.first_s_id(), path.last_s_id());
            }
            eligible.push((slot, p, in_top));
        }
    }

    frame.global = global;
    frame.top_layer = top_layer;
    if global.is_empty() || global.last == 0 {
        debug!("No visible moves in layer range");
        return frame;
    }

    let requested = input.current;
    let keep = !requested.is_empty();
    let current = SeqRange {
        first: if keep && input.keep_first && !input.top_layer_only {
            requested.first.clamp(global.first, global.last)
        } else {
            global.first
        },
        last: if keep && input.keep_last {
            requested.last.clamp(global.first, global.last)
        } else {
            global.last
        },
    };
    frame.current = current;
    if current.is_empty() {
        return frame;
    }

    let single = current.first == current.last;
    let window = if single {
        (current.first.saturating_sub(1), current.last)
    } else {
        (current.first, current.last)
    };
    let dims_outside_top = input.top_layer_only && current.last != global.last;

    // second pass: clip sub-paths against the window
    let mut pending = Vec::new();
    let mut lookup: HashMap<(usize, usize, [u32; 4]), usize> = HashMap::new();
    for &(slot, p, in_top) in &eligible {
        let buffer = &geometry.buffers[slot];
        let path = &buffer.paths[p];
        let color = if dims_outside_top && !in_top {
            input.colorizer.neutral
        } else {
            input.colorizer.color(path)
        };

        let last_sub_path = path.sub_paths.len().saturating_sub(1);
        for (s, sp) in path.sub_paths.iter().enumerate() {
            let Some(clip) = clip_sub_path(geometry, buffer, sp, window, s == last_sub_path) else {
                continue;
            };

            let key = (slot, sp.first.ibuffer, color.to_array().map(f32::to_bits));
            let index = *lookup.entry(key).or_insert_with(|| {
                frame.paths.push(RenderPath::new(buffer.kind, sp.first.ibuffer, color));
                frame.paths.len() - 1
            });
            frame.paths[index].push(clip.offset * INDEX_SIZE_BYTES, clip.count);

            if buffer.primitive == PrimitiveKind::Triangle && !single {
                let path_ids = (path.first_s_id(), path.last_s_id());
                pending.extend(range_caps(buffer, sp, path_ids, window, &clip));
            }
        }
    }

    for cap in pending {
        let color = frame
            .color_at(cap.kind, cap.ibuffer, cap.stem * INDEX_SIZE_BYTES)
            .unwrap_or(input.colorizer.neutral);
        frame.caps.push(RangeCap {
            kind: cap.kind,
            ibuffer: cap.ibuffer,
            indices: cap.indices,
            color,
        });
    }

    for buffer in geometry.buffers.iter().filter(|b| b.kind.is_marker()) {
        if filter.is_kind_visible(buffer.kind) {
            push_instances(&mut frame, buffer, input, dims_outside_top);
        }
    }

    debug!(
        current = %current,
        global = %global,
        render_paths = frame.paths.len(),
        caps = frame.caps.len(),
        instances = frame.instances.len(),
        "Assembled render frame"
    );
    frame
}

/// Whether the move with id `s_id` passes the visibility filter
pub fn is_move_visible(
    geometry: &ToolpathGeometry,
    filter: &VisibilityFilter,
    s_id: usize,
) -> bool {
    if let Some(entry) = geometry.index.entry_owning(s_id) {
        return geometry
            .buffers
            .get(entry.slot)
            .and_then(|b| b.paths.get(entry.path))
            .is_some_and(|path| filter.is_path_visible(path));
    }
    geometry
        .buffers
        .iter()
        .filter(|b| b.kind.is_marker() && filter.is_kind_visible(b.kind))
        .any(|b| b.instances.s_ids.binary_search(&s_id).is_ok())
}

/// Index range of a sub-path inside the window
struct Clip {
    offset: usize,
    count: usize,
    /// Segments before the first visible one
    skipped: usize,
    segments: usize,
}

fn clip_sub_path(
    geometry: &ToolpathGeometry,
    buffer: &ToolpathBuffer,
    sp: &SubPath,
    (first, last): (usize, usize),
    closes_path: bool,
) -> Option<Clip> {
    let low = sp.first.s_id.max(first);
    let high = sp.last.s_id.min(last);
    if low >= high {
        return None;
    }

    let skipped = geometry.ids.segments_between(sp.first.s_id, low);
    let segments = geometry.ids.segments_between(low, high);
    if segments == 0 {
        return None;
    }

    let per_segment = buffer.primitive.indices_per_segment();
    let mut offset = sp.first.offset + per_segment * skipped;
    let mut count = per_segment * segments;
    if buffer.primitive == PrimitiveKind::Triangle {
        if skipped > 0 {
            offset += tube::LEAD_INDICES;
            count -= tube::LEAD_INDICES;
        }
        if closes_path && sp.last.s_id <= last {
            count += END_CAP_INDICES;
        }
    }

    Some(Clip {
        offset,
        count,
        skipped,
        segments,
    })
}

/// Caps for window ends strictly inside a tube path, placed in the sub-path
/// holding the cut segment
fn range_caps(
    buffer: &ToolpathBuffer,
    sp: &SubPath,
    (path_first, path_last): (usize, usize),
    (first, last): (usize, usize),
    clip: &Clip,
) -> Vec<PendingCap> {
    let ring_at = |stem: usize, elements: [usize; 4]| -> Option<[usize; 4]> {
        let mut ring = [0usize; 4];
        for (slot, element) in ring.iter_mut().zip(elements) {
            *slot = usize::from(buffer.index_at(sp.first.ibuffer, stem + element)?);
        }
        Some(ring)
    };

    let mut caps = Vec::new();
    let inside_path = |s_id: usize| path_first < s_id && s_id < path_last;
    if inside_path(first) && sp.first.s_id <= first && first < sp.last.s_id {
        let stem = sp.first.offset + tube::SEGMENT_INDICES * clip.skipped + tube::LEAD_INDICES;
        // up, right, down, left of the start ring
        match ring_at(stem, [0, 1, 7, 13]) {
            Some(ring) => caps.push(PendingCap {
                kind: buffer.kind,
                ibuffer: sp.first.ibuffer,
                stem,
                indices: tube::START_CAP.map(|k| ring[k] as IndexType),
            }),
            None => warn!(stem, "Range cap outside index array"),
        }
    }
    if inside_path(last) && sp.first.s_id < last && last <= sp.last.s_id {
        let segment = clip.skipped + clip.segments - 1;
        let stem = sp.first.offset + tube::SEGMENT_INDICES * segment + tube::LEAD_INDICES;
        // up, right, down, left of the end ring
        match ring_at(stem, [2, 4, 10, 16]) {
            Some(ring) => caps.push(PendingCap {
                kind: buffer.kind,
                ibuffer: sp.first.ibuffer,
                stem,
                indices: tube::END_CAP.map(|k| ring[k - 4] as IndexType),
            }),
            None => warn!(stem, "Range cap outside index array"),
        }
    }
    caps
}

fn push_instances(
    frame: &mut RenderFrame,
    buffer: &ToolpathBuffer,
    input: &AssemblyInput<'_>,
    dims_outside_top: bool,
) {
    let instances = &buffer.instances;
    let start = instances.lower_bound(frame.current.first);
    let end = instances.upper_bound(frame.current.last);
    if start >= end {
        return;
    }

    let color = input.colorizer.marker_color(buffer.kind);
    let split = if dims_outside_top && !frame.top_layer.is_empty() {
        instances.lower_bound(frame.top_layer.first).clamp(start, end)
    } else {
        start
    };

    if split > start {
        frame.instances.push(InstanceRange {
            kind: buffer.kind,
            offset: start,
            count: split - start,
            color: input.colorizer.neutral,
        });
    }
    if end > split {
        frame.instances.push(InstanceRange {
            kind: buffer.kind,
            offset: split,
            count: end - split,
            color,
        });
    }
}

/// Layer membership of path `index`; travels are joined with the travels they touch
fn path_in_span(buffer: &ToolpathBuffer, index: usize, (low, high): (usize, usize)) -> bool {
    let Some(path) = buffer.paths.get(index) else {
        return false;
    };
    let within = |s_id: usize| low <= s_id && s_id <= high;
    if buffer.kind != MoveKind::Travel {
        return within(path.first_s_id()) && within(path.last_s_id());
    }

    let (first, last) = joined_travel(&buffer.paths, index);
    within(first) || within(last)
}

/// First and last ids of the travel chain through `paths[index]`
fn joined_travel(paths: &[Path], index: usize) -> (usize, usize) {
    let endpoints = |p: &Path| Some((*p.first()?, *p.last()?));
    let Some((mut first, mut last)) = endpoints(&paths[index]) else {
        return (0, 0);
    };

    let mut i = index;
    while i > 0 {
        match endpoints(&paths[i - 1]) {
            Some((prev_first, prev_last)) if approx_eq(first.position, prev_last.position) => {
                first = prev_first;
                i -= 1;
            }
            _ => break,
        }
    }

    let mut j = index;
    while j + 1 < paths.len() {
        match endpoints(&paths[j + 1]) {
            Some((next_first, next_last)) if approx_eq(last.position, next_first.position) => {
                last = next_last;
                j += 1;
            }
            _ => break,
        }
    }

    (first.s_id, last.s_id)
}

fn approx_eq(a: Vec3, b: Vec3) -> bool {
    let tolerance = TRAVEL_JOIN_PRECISION * TRAVEL_JOIN_PRECISION;
    (a - b).length_squared() <= tolerance * a.length_squared().min(b.length_squared())
}
