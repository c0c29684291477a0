//! Per-kind, per-role and per-extruder visibility flags

use crate::toolpath::Path;
use gcodeview_core::{ExtrusionRole, MoveKind};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VisibilityFilter {
    kinds: [bool; MoveKind::BUFFER_COUNT],
    roles: [bool; ExtrusionRole::COUNT],
    /// Extruders past the end of this list are visible
    extruders: Vec<bool>,
}

impl Default for VisibilityFilter {
    fn default() -> Self {
        let mut kinds = [false; MoveKind::BUFFER_COUNT];
        for kind in [MoveKind::Extrude, MoveKind::Travel, MoveKind::Wipe] {
            if let Some(slot) = kind.buffer_slot() {
                kinds[slot] = true;
            }
        }
        Self {
            kinds,
            roles: [true; ExtrusionRole::COUNT],
            extruders: Vec::new(),
        }
    }
}

impl VisibilityFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_kind_visible(&self, kind: MoveKind) -> bool {
        kind.buffer_slot()
            .and_then(|slot| self.kinds.get(slot).copied())
            .unwrap_or(false)
    }

    pub fn set_kind_visible(&mut self, kind: MoveKind, visible: bool) {
        if let Some(slot) = kind.buffer_slot() {
            self.kinds[slot] = visible;
        }
    }

    pub fn is_role_visible(&self, role: ExtrusionRole) -> bool {
        self.roles[role.index()]
    }

    pub fn set_role_visible(&mut self, role: ExtrusionRole, visible: bool) {
        self.roles[role.index()] = visible;
    }

    pub fn set_all_roles_visible(&mut self, visible: bool) {
        self.roles = [visible; ExtrusionRole::COUNT];
    }

    pub fn is_extruder_visible(&self, extruder_id: u8) -> bool {
        self.extruders
            .get(usize::from(extruder_id))
            .copied()
            .unwrap_or(true)
    }

    pub fn set_extruder_visible(&mut self, extruder_id: u8, visible: bool) {
        let index = usize::from(extruder_id);
        if index >= self.extruders.len() {
            self.extruders.resize(index + 1, true);
        }
        self.extruders[index] = visible;
    }

    /// Kind, role and extruder flags of a line or tube path
    pub fn is_path_visible(&self, path: &Path) -> bool {
        self.is_kind_visible(path.kind)
            && self.is_role_visible(path.role)
            && self.is_extruder_visible(path.extruder_id)
    }
}
