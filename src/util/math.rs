//! Math type re-exports and bounding boxes.

pub use glam::{Mat3, Mat4, Quat, Vec2, Vec3, Vec4};

use bytemuck::{Pod, Zeroable};
use std::fmt;

/// Axis-aligned 3D bounding box with single precision.
#[derive(Clone, Copy, PartialEq, Pod, Zeroable)]
#[repr(C)]
pub struct BBox3f {
    pub min: Vec3,
    pub max: Vec3,
}

impl BBox3f {
    /// Empty bounding box (inverted, will expand on first point).
    pub const EMPTY: Self = Self {
        min: Vec3::splat(f32::INFINITY),
        max: Vec3::splat(f32::NEG_INFINITY),
    };

    /// Create a new bounding box from min and max points.
    #[inline]
    pub const fn new(min: Vec3, max: Vec3) -> Self {
        Self { min, max }
    }

    /// Create a bounding box from a single point.
    #[inline]
    pub fn from_point(p: Vec3) -> Self {
        Self { min: p, max: p }
    }

    /// Bounds of a point list, `None` for an empty list.
    pub fn from_points(points: &[Vec3]) -> Option<Self> {
        let mut bounds = Self::EMPTY;
        for &p in points {
            bounds.expand_by_point(p);
        }
        (!bounds.is_empty()).then_some(bounds)
    }

    /// Check if this box is empty (inverted on any axis).
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.min.x > self.max.x || self.min.y > self.max.y || self.min.z > self.max.z
    }

    /// Expand this box to include a point.
    #[inline]
    pub fn expand_by_point(&mut self, p: Vec3) {
        self.min = self.min.min(p);
        self.max = self.max.max(p);
    }

    /// Expand this box to include a sphere around `p`.
    #[inline]
    pub fn expand_by_sphere(&mut self, p: Vec3, radius: f32) {
        let r = Vec3::splat(radius.abs());
        self.min = self.min.min(p - r);
        self.max = self.max.max(p + r);
    }

    /// Expand this box to include another box.
    #[inline]
    pub fn expand_by_box(&mut self, other: &Self) {
        if !other.is_empty() {
            self.min = self.min.min(other.min);
            self.max = self.max.max(other.max);
        }
    }

    /// Component-wise union of two boxes.
    #[inline]
    pub fn union(mut self, other: &Self) -> Self {
        self.expand_by_box(other);
        self
    }

    /// Box enclosing the eight transformed corners.
    pub fn transformed(&self, matrix: &Mat4) -> Self {
        if self.is_empty() {
            return *self;
        }
        let mut result = Self::EMPTY;
        for i in 0..8 {
            let corner = Vec3::new(
                if i & 1 == 0 { self.min.x } else { self.max.x },
                if i & 2 == 0 { self.min.y } else { self.max.y },
                if i & 4 == 0 { self.min.z } else { self.max.z },
            );
            result.expand_by_point(matrix.transform_point3(corner));
        }
        result
    }

    /// Get the center of the box.
    #[inline]
    pub fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }

    /// Get the size (extents) of the box.
    #[inline]
    pub fn size(&self) -> Vec3 {
        self.max - self.min
    }
}

impl Default for BBox3f {
    fn default() -> Self {
        Self::EMPTY
    }
}

impl fmt::Debug for BBox3f {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BBox3f({:?} - {:?})", self.min, self.max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bbox3f() {
        let mut bbox = BBox3f::EMPTY;
        assert!(bbox.is_empty());

        bbox.expand_by_point(Vec3::new(0.0, 0.0, 0.0));
        bbox.expand_by_point(Vec3::new(1.0, 2.0, 3.0));

        assert!(!bbox.is_empty());
        assert_eq!(bbox.center(), Vec3::new(0.5, 1.0, 1.5));
        assert_eq!(bbox.size(), Vec3::new(1.0, 2.0, 3.0));
    }

    #[test]
    fn test_bbox3f_union_ignores_empty() {
        let a = BBox3f::new(Vec3::ZERO, Vec3::ONE);
        let b = a.union(&BBox3f::EMPTY);
        assert_eq!(a, b);

        let c = a.union(&BBox3f::new(Vec3::splat(-1.0), Vec3::splat(0.5)));
        assert_eq!(c.min, Vec3::splat(-1.0));
        assert_eq!(c.max, Vec3::ONE);
    }

    #[test]
    fn test_bbox3f_transformed() {
        let bbox = BBox3f::new(Vec3::ZERO, Vec3::ONE);
        let moved = bbox.transformed(&Mat4::from_translation(Vec3::new(2.0, 0.0, 0.0)));
        assert_eq!(moved.min, Vec3::new(2.0, 0.0, 0.0));
        assert_eq!(moved.max, Vec3::new(3.0, 1.0, 1.0));
    }

    #[test]
    fn test_from_points() {
        assert!(BBox3f::from_points(&[]).is_none());
        let b = BBox3f::from_points(&[Vec3::X, Vec3::Y]).unwrap();
        assert_eq!(b.max, Vec3::new(1.0, 1.0, 0.0));
    }
}
