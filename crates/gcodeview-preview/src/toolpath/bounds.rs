use glam::Vec3;

/// Axis-aligned bounding box of toolpath positions
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub bounds_min: Vec3,
    pub bounds_max: Vec3,
}

impl Default for BoundingBox {
    fn default() -> Self {
        Self::empty()
    }
}

impl BoundingBox {
    /// Box that contains nothing; the first merge defines it
    pub fn empty() -> Self {
        Self {
            bounds_min: Vec3::splat(f32::MAX),
            bounds_max: Vec3::splat(f32::MIN),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.bounds_min.cmpgt(self.bounds_max).any()
    }

    pub fn merge(&mut self, point: Vec3) {
        self.bounds_min = self.bounds_min.min(point);
        self.bounds_max = self.bounds_max.max(point);
    }

    pub fn center(&self) -> Option<Vec3> {
        (!self.is_empty()).then(|| (self.bounds_min + self.bounds_max) * 0.5)
    }

    pub fn size(&self) -> Vec3 {
        if self.is_empty() {
            Vec3::ZERO
        } else {
            self.bounds_max - self.bounds_min
        }
    }

    pub fn as_tuple(&self) -> Option<(Vec3, Vec3)> {
        (!self.is_empty()).then_some((self.bounds_min, self.bounds_max))
    }
}
