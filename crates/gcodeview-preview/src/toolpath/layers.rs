//! Layer index
//!
//! Layers are kept in stream order with their owning inclusive id range.
//! Adjacent layers may share their boundary id (the travel between them).

use super::ids::SeqIdMap;
use gcodeview_core::{MoveKind, MoveRecord, SpiralVaseLayer};
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Layer {
    pub z: f64,
    pub first: usize,
    pub last: usize,
}

impl Layer {
    pub fn contains(&self, s_id: usize) -> bool {
        self.first <= s_id && s_id <= self.last
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Layers {
    layers: Vec<Layer>,
    /// Heights ascend with the layer order
    sorted: bool,
}

impl Layers {
    /// Group extrusions into layers by height
    pub fn build(moves: &[MoveRecord], ids: &SeqIdMap, z_epsilon: f64) -> Self {
        let mut layers: Vec<Layer> = Vec::new();
        let mut last_travel_s_id = 0usize;

        for (raw, record) in moves.iter().enumerate() {
            let Some(s_id) = ids.seq(raw) else {
                continue;
            };
            match record.kind {
                MoveKind::Travel => {
                    if s_id.saturating_sub(last_travel_s_id) > 1 {
                        if let Some(layer) = layers.last_mut() {
                            layer.last = s_id;
                        }
                    }
                    last_travel_s_id = s_id;
                }
                MoveKind::Extrude => {
                    let z = f64::from(record.position.z);
                    match layers.last_mut() {
                        Some(layer) if (layer.z - z).abs() <= z_epsilon => layer.last = s_id,
                        _ => layers.push(Layer {
                            z,
                            first: last_travel_s_id,
                            last: s_id,
                        }),
                    }
                }
                _ => {}
            }
        }

        debug!(layers = layers.len(), "Built layer index");
        Self::from_layers(layers)
    }

    /// Layer table supplied by a spiral vase print
    pub fn from_spiral_vase(table: &[SpiralVaseLayer]) -> Self {
        Self::from_layers(
            table
                .iter()
                .map(|l| Layer {
                    z: f64::from(l.z),
                    first: l.first,
                    last: l.last,
                })
                .collect(),
        )
    }

    pub fn from_layers(layers: Vec<Layer>) -> Self {
        let sorted = layers.windows(2).all(|w| w[0].z <= w[1].z);
        Self { layers, sorted }
    }

    pub fn len(&self) -> usize {
        self.layers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Layer> {
        self.layers.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Layer> {
        self.layers.iter()
    }

    pub fn is_sorted_by_height(&self) -> bool {
        self.sorted
    }

    /// Layer owning `s_id`; the lower layer wins on a shared boundary
    pub fn layer_of(&self, s_id: usize) -> Option<usize> {
        let index = self.layers.partition_point(|l| l.last < s_id);
        self.layers
            .get(index)
            .filter(|l| l.contains(s_id))
            .map(|_| index)
    }

    /// Layer whose height is within `epsilon` of `z`
    pub fn find_close(&self, z: f64, epsilon: f64) -> Option<usize> {
        if !self.sorted {
            return self.layers.iter().position(|l| (l.z - z).abs() <= epsilon);
        }
        let index = self.layers.partition_point(|l| l.z < z - epsilon);
        self.layers
            .get(index)
            .filter(|l| (l.z - z).abs() <= epsilon)
            .map(|_| index)
    }

    /// Topmost layer at or below `z`, the later one among equal heights
    pub fn layer_at(&self, z: f64) -> Option<usize> {
        if !self.sorted {
            return self
                .layers
                .iter()
                .enumerate()
                .filter(|(_, l)| l.z <= z)
                .max_by(|(_, a), (_, b)| a.z.total_cmp(&b.z))
                .map(|(i, _)| i);
        }
        self.layers
            .partition_point(|l| l.z <= z)
            .checked_sub(1)
    }

    /// Id span covered by layers `low..=high`
    pub fn id_span(&self, low: usize, high: usize) -> Option<(usize, usize)> {
        Some((self.layers.get(low)?.first, self.layers.get(high)?.last))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gcodeview_core::ExtrusionRole;
    use glam::Vec3;

    fn extrude(x: f32, z: f32) -> MoveRecord {
        MoveRecord::extrude(Vec3::new(x, 0.0, z), ExtrusionRole::Perimeter, 0.4, 0.2)
    }

    fn two_layers() -> Vec<MoveRecord> {
        vec![
            MoveRecord::travel(Vec3::new(0.0, 0.0, 0.2)),
            extrude(1.0, 0.2),
            extrude(2.0, 0.2),
            MoveRecord::travel(Vec3::new(0.0, 0.0, 0.4)),
            extrude(1.0, 0.4),
            extrude(2.0, 0.4),
        ]
    }

    #[test]
    fn test_layers_by_height() {
        let moves = two_layers();
        let layers = Layers::build(&moves, &SeqIdMap::build(&moves), 1e-4);
        assert_eq!(layers.len(), 2);
        assert_eq!(layers.get(0).map(|l| (l.first, l.last)), Some((0, 3)));
        assert_eq!(layers.get(1).map(|l| (l.first, l.last)), Some((3, 5)));
        assert!(layers.is_sorted_by_height());
    }

    #[test]
    fn test_layer_of_prefers_lower_layer() {
        let moves = two_layers();
        let layers = Layers::build(&moves, &SeqIdMap::build(&moves), 1e-4);
        assert_eq!(layers.layer_of(1), Some(0));
        assert_eq!(layers.layer_of(3), Some(0));
        assert_eq!(layers.layer_of(4), Some(1));
        assert_eq!(layers.layer_of(6), None);
    }

    #[test]
    fn test_height_lookups() {
        let moves = two_layers();
        let layers = Layers::build(&moves, &SeqIdMap::build(&moves), 1e-4);
        assert_eq!(layers.find_close(0.4, 1e-3), Some(1));
        assert_eq!(layers.find_close(0.3, 1e-3), None);
        assert_eq!(layers.layer_at(0.3), Some(0));
        assert_eq!(layers.layer_at(0.1), None);
        assert_eq!(layers.layer_at(5.0), Some(1));
    }

    #[test]
    fn test_epsilon_merges_noise() {
        let moves = vec![extrude(1.0, 0.2), extrude(2.0, 0.20001), extrude(3.0, 0.4)];
        let layers = Layers::build(&moves, &SeqIdMap::build(&moves), 1e-4);
        assert_eq!(layers.len(), 2);
    }

    #[test]
    fn test_unsorted_heights_scan_linearly() {
        let layers = Layers::from_layers(vec![
            Layer { z: 0.2, first: 0, last: 5 },
            Layer { z: 0.4, first: 5, last: 9 },
            Layer { z: 0.2, first: 9, last: 14 },
        ]);
        assert!(!layers.is_sorted_by_height());
        assert_eq!(layers.find_close(0.2, 1e-4), Some(0));
        assert_eq!(layers.layer_at(0.3), Some(2));
        assert_eq!(layers.layer_of(12), Some(2));
    }

    #[test]
    fn test_spiral_vase_table() {
        let table = [
            SpiralVaseLayer { z: 0.2, first: 0, last: 10 },
            SpiralVaseLayer { z: 0.4, first: 10, last: 20 },
        ];
        let layers = Layers::from_spiral_vase(&table);
        assert_eq!(layers.id_span(0, 1), Some((0, 20)));
        assert_eq!(layers.id_span(0, 2), None);
    }
}
