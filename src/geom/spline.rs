//! Splines: the substructures of a [`CurveEval`](super::CurveEval).
//!
//! Each spline owns its control points, per-point custom data and a lazily
//! evaluated polyline. Bezier splines carry handles; NURBS splines carry
//! weights and an order.

use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::trace;

use crate::attribute::CustomData;
use crate::util::{BBox3f, Vec3};

/// Spline kind tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SplineType {
    Poly,
    Bezier,
    Nurbs,
}

/// Data only some spline kinds have.
#[derive(Debug, Clone, PartialEq)]
enum SplineKind {
    Poly,
    Bezier {
        handles_left: Vec<Vec3>,
        handles_right: Vec<Vec3>,
        resolution: i32,
    },
    Nurbs {
        weights: Vec<f32>,
        order: u8,
        resolution: i32,
    },
}

/// Memoized evaluated positions.
#[derive(Default)]
pub(crate) struct EvalCache(Mutex<Option<Arc<Vec<Vec3>>>>);

impl EvalCache {
    pub(crate) fn invalidate(&self) {
        *self.0.lock() = None;
    }

    fn get_or_compute(&self, compute: impl FnOnce() -> Vec<Vec3>) -> Arc<Vec<Vec3>> {
        let mut cache = self.0.lock();
        cache.get_or_insert_with(|| Arc::new(compute())).clone()
    }

    fn is_valid(&self) -> bool {
        self.0.lock().is_some()
    }
}

impl Clone for EvalCache {
    fn clone(&self) -> Self {
        Self(Mutex::new(self.0.lock().clone()))
    }
}

impl fmt::Debug for EvalCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EvalCache(valid: {})", self.is_valid())
    }
}

/// One curve substructure.
#[derive(Debug, Clone)]
pub struct Spline {
    positions: Vec<Vec3>,
    radii: Vec<f32>,
    tilts: Vec<f32>,
    cyclic: bool,
    kind: SplineKind,
    /// Per-point user layers. Every spline of a curve has the same set.
    pub(crate) attributes: CustomData,
    cache: EvalCache,
}

impl Spline {
    fn with_kind(positions: Vec<Vec3>, kind: SplineKind) -> Self {
        let size = positions.len();
        Self {
            positions,
            radii: vec![1.0; size],
            tilts: vec![0.0; size],
            cyclic: false,
            kind,
            attributes: CustomData::new(),
            cache: EvalCache::default(),
        }
    }

    /// Polyline through `positions`.
    pub fn poly(positions: Vec<Vec3>) -> Self {
        Self::with_kind(positions, SplineKind::Poly)
    }

    /// Bezier spline. Handles must match the point count.
    pub fn bezier(positions: Vec<Vec3>, handles_left: Vec<Vec3>, handles_right: Vec<Vec3>) -> Self {
        debug_assert_eq!(positions.len(), handles_left.len());
        debug_assert_eq!(positions.len(), handles_right.len());
        Self::with_kind(
            positions,
            SplineKind::Bezier {
                handles_left,
                handles_right,
                resolution: 12,
            },
        )
    }

    /// Uniform NURBS spline of order 4 with unit weights.
    pub fn nurbs(positions: Vec<Vec3>) -> Self {
        let weights = vec![1.0; positions.len()];
        Self::with_kind(
            positions,
            SplineKind::Nurbs {
                weights,
                order: 4,
                resolution: 12,
            },
        )
    }

    pub fn with_cyclic(mut self, cyclic: bool) -> Self {
        self.set_cyclic(cyclic);
        self
    }

    pub fn with_resolution(mut self, resolution: i32) -> Self {
        self.set_resolution(resolution);
        self
    }

    pub fn spline_type(&self) -> SplineType {
        match self.kind {
            SplineKind::Poly => SplineType::Poly,
            SplineKind::Bezier { .. } => SplineType::Bezier,
            SplineKind::Nurbs { .. } => SplineType::Nurbs,
        }
    }

    /// Number of control points.
    pub fn size(&self) -> usize {
        self.positions.len()
    }

    pub fn positions(&self) -> &[Vec3] {
        &self.positions
    }

    pub fn positions_mut(&mut self) -> &mut [Vec3] {
        self.cache.invalidate();
        &mut self.positions
    }

    pub fn radii(&self) -> &[f32] {
        &self.radii
    }

    pub fn radii_mut(&mut self) -> &mut [f32] {
        &mut self.radii
    }

    pub fn tilts(&self) -> &[f32] {
        &self.tilts
    }

    pub fn tilts_mut(&mut self) -> &mut [f32] {
        self.cache.invalidate();
        &mut self.tilts
    }

    /// Per-point user layers.
    pub fn attributes(&self) -> &CustomData {
        &self.attributes
    }

    pub fn is_cyclic(&self) -> bool {
        self.cyclic
    }

    /// Set the cyclic flag. The cache is dropped only when the flag changes.
    pub fn set_cyclic(&mut self, cyclic: bool) {
        if self.cyclic != cyclic {
            self.cyclic = cyclic;
            self.cache.invalidate();
        }
    }

    /// Samples per segment; always 1 for poly splines.
    pub fn resolution(&self) -> i32 {
        match self.kind {
            SplineKind::Poly => 1,
            SplineKind::Bezier { resolution, .. } | SplineKind::Nurbs { resolution, .. } => resolution,
        }
    }

    /// Set the resolution, at least 1. Ignored for poly splines.
    pub fn set_resolution(&mut self, value: i32) {
        let value = value.max(1);
        match &mut self.kind {
            SplineKind::Poly => {}
            SplineKind::Bezier { resolution, .. } | SplineKind::Nurbs { resolution, .. } => {
                if *resolution != value {
                    *resolution = value;
                    self.cache.invalidate();
                }
            }
        }
    }

    pub fn handles_left(&self) -> Option<&[Vec3]> {
        match &self.kind {
            SplineKind::Bezier { handles_left, .. } => Some(handles_left),
            _ => None,
        }
    }

    pub fn handles_right(&self) -> Option<&[Vec3]> {
        match &self.kind {
            SplineKind::Bezier { handles_right, .. } => Some(handles_right),
            _ => None,
        }
    }

    /// NURBS weights.
    pub fn weights(&self) -> Option<&[f32]> {
        match &self.kind {
            SplineKind::Nurbs { weights, .. } => Some(weights),
            _ => None,
        }
    }

    /// NURBS order, clamped to the point count when evaluating.
    pub fn order(&self) -> Option<u8> {
        match self.kind {
            SplineKind::Nurbs { order, .. } => Some(order),
            _ => None,
        }
    }

    pub fn set_order(&mut self, value: u8) {
        if let SplineKind::Nurbs { order, .. } = &mut self.kind {
            *order = value.max(2);
            self.cache.invalidate();
        }
    }

    pub fn mark_cache_invalid(&self) {
        self.cache.invalidate();
    }

    pub(crate) fn cache(&self) -> &EvalCache {
        &self.cache
    }

    /// Positions plus the cache, borrowed disjointly for writers.
    pub(crate) fn positions_for_write(&mut self) -> (&mut [Vec3], &EvalCache) {
        (&mut self.positions, &self.cache)
    }

    pub(crate) fn radii_for_write(&mut self) -> (&mut [f32], &EvalCache) {
        (&mut self.radii, &self.cache)
    }

    pub(crate) fn tilts_for_write(&mut self) -> (&mut [f32], &EvalCache) {
        (&mut self.tilts, &self.cache)
    }

    /// Left or right handles plus the cache, for Bezier splines.
    pub(crate) fn handles_for_write(&mut self, right: bool) -> (Option<&mut [Vec3]>, &EvalCache) {
        let handles = match &mut self.kind {
            SplineKind::Bezier { handles_right, .. } if right => Some(handles_right.as_mut_slice()),
            SplineKind::Bezier { handles_left, .. } => Some(handles_left.as_mut_slice()),
            _ => None,
        };
        (handles, &self.cache)
    }

    /// Move one control point. Bezier handles follow the point.
    pub(crate) fn move_point(&mut self, index: usize, position: Vec3) {
        let delta = position - self.positions[index];
        self.positions[index] = position;
        if let SplineKind::Bezier {
            handles_left,
            handles_right,
            ..
        } = &mut self.kind
        {
            handles_left[index] += delta;
            handles_right[index] += delta;
        }
        self.cache.invalidate();
    }

    // ------------------------------------------------------------------------
    // Evaluation
    // ------------------------------------------------------------------------

    /// Evaluated polyline, cached until the spline changes.
    pub fn evaluated_positions(&self) -> Arc<Vec<Vec3>> {
        self.cache.get_or_compute(|| {
            trace!(points = self.size(), kind = ?self.spline_type(), "evaluating spline");
            match &self.kind {
                SplineKind::Poly => self.positions.clone(),
                SplineKind::Bezier {
                    handles_left,
                    handles_right,
                    resolution,
                } => evaluate_bezier(&self.positions, handles_left, handles_right, *resolution, self.cyclic),
                SplineKind::Nurbs {
                    weights,
                    order,
                    resolution,
                } => evaluate_nurbs(&self.positions, weights, *order, *resolution, self.cyclic),
            }
        })
    }

    /// Bounds of the evaluated positions.
    pub fn bounds(&self) -> Option<BBox3f> {
        BBox3f::from_points(&self.evaluated_positions())
    }
}

fn bezier_point(p0: Vec3, p1: Vec3, p2: Vec3, p3: Vec3, t: f32) -> Vec3 {
    let s = 1.0 - t;
    p0 * (s * s * s) + p1 * (3.0 * s * s * t) + p2 * (3.0 * s * t * t) + p3 * (t * t * t)
}

fn evaluate_bezier(
    positions: &[Vec3],
    handles_left: &[Vec3],
    handles_right: &[Vec3],
    resolution: i32,
    cyclic: bool,
) -> Vec<Vec3> {
    let size = positions.len();
    if size < 2 {
        return positions.to_vec();
    }
    let resolution = resolution.max(1) as usize;
    let segments = if cyclic { size } else { size - 1 };
    let mut result = Vec::with_capacity(segments * resolution + 1);
    for i in 0..segments {
        let next = (i + 1) % size;
        let (p0, p1, p2, p3) = (positions[i], handles_right[i], handles_left[next], positions[next]);
        for step in 0..resolution {
            result.push(bezier_point(p0, p1, p2, p3, step as f32 / resolution as f32));
        }
    }
    if !cyclic {
        result.push(positions[size - 1]);
    }
    result
}

/// Uniform knots; clamped knots repeat the ends `order` times.
fn nurbs_knots(points: usize, order: usize, clamped: bool) -> Vec<f32> {
    let len = points + order;
    if clamped {
        let last = (points - order + 1) as f32;
        (0..len)
            .map(|i| ((i as f32) - (order as f32 - 1.0)).clamp(0.0, last))
            .collect()
    } else {
        (0..len).map(|i| i as f32).collect()
    }
}

/// Cox-de Boor basis values of every control point at `t`.
fn nurbs_basis(knots: &[f32], points: usize, order: usize, t: f32) -> Vec<f32> {
    let spans = knots.len() - 1;
    let mut basis: Vec<f32> = (0..spans)
        .map(|i| if knots[i] <= t && t < knots[i + 1] { 1.0 } else { 0.0 })
        .collect();
    for k in 2..=order {
        for i in 0..spans - (k - 1) {
            let left_span = knots[i + k - 1] - knots[i];
            let right_span = knots[i + k] - knots[i + 1];
            let left = if left_span > 0.0 { (t - knots[i]) / left_span * basis[i] } else { 0.0 };
            let right = if right_span > 0.0 {
                (knots[i + k] - t) / right_span * basis[i + 1]
            } else {
                0.0
            };
            basis[i] = left + right;
        }
    }
    basis.truncate(points);
    basis
}

fn evaluate_nurbs(positions: &[Vec3], weights: &[f32], order: u8, resolution: i32, cyclic: bool) -> Vec<Vec3> {
    let size = positions.len();
    if size < 2 {
        return positions.to_vec();
    }
    let order = usize::from(order).clamp(2, size);
    let resolution = resolution.max(1) as usize;

    // Cyclic splines wrap the first points around.
    let (points, point_weights): (Vec<Vec3>, Vec<f32>) = if cyclic {
        (0..size + order - 1)
            .map(|i| (positions[i % size], weights[i % size]))
            .unzip()
    } else {
        (positions.to_vec(), weights.to_vec())
    };
    let knots = nurbs_knots(points.len(), order, !cyclic);
    let start = knots[order - 1];
    let end = knots[points.len()];
    let segments = if cyclic { size } else { size - order + 1 };
    let samples = segments * resolution;

    let mut result = Vec::with_capacity(samples + 1);
    for step in 0..samples {
        let t = start + (end - start) * step as f32 / samples as f32;
        let basis = nurbs_basis(&knots, points.len(), order, t);
        let mut sum = Vec3::ZERO;
        let mut total = 0.0;
        for ((b, p), w) in basis.iter().zip(&points).zip(&point_weights) {
            sum += *p * (b * w);
            total += b * w;
        }
        result.push(if total > 0.0 { sum / total } else { sum });
    }
    if !cyclic {
        result.push(positions[size - 1]);
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(n: usize) -> Vec<Vec3> {
        (0..n).map(|i| Vec3::new(i as f32, 0.0, 0.0)).collect()
    }

    #[test]
    fn test_poly_evaluates_to_points() {
        let spline = Spline::poly(line(3));
        assert_eq!(*spline.evaluated_positions(), line(3));
        assert_eq!(spline.resolution(), 1);
        assert_eq!(spline.radii(), &[1.0, 1.0, 1.0]);
    }

    #[test]
    fn test_bezier_segments() {
        let positions = vec![Vec3::ZERO, Vec3::new(3.0, 0.0, 0.0)];
        let left = vec![Vec3::new(-1.0, 0.0, 0.0), Vec3::new(2.0, 0.0, 0.0)];
        let right = vec![Vec3::new(1.0, 0.0, 0.0), Vec3::new(4.0, 0.0, 0.0)];
        let spline = Spline::bezier(positions, left, right).with_resolution(4);
        let evaluated = spline.evaluated_positions();
        assert_eq!(evaluated.len(), 5);
        assert_eq!(evaluated[0], Vec3::ZERO);
        assert!((evaluated[2].x - 1.5).abs() < 1e-5);
        assert_eq!(evaluated[4], Vec3::new(3.0, 0.0, 0.0));

        let cyclic = spline.clone().with_cyclic(true);
        assert_eq!(cyclic.evaluated_positions().len(), 8);
    }

    #[test]
    fn test_nurbs_clamped_ends() {
        let spline = Spline::nurbs(line(5)).with_resolution(2);
        let evaluated = spline.evaluated_positions();
        // 5 points of order 4 give 2 segments.
        assert_eq!(evaluated.len(), 5);
        assert!(evaluated[0].distance(Vec3::ZERO) < 1e-5);
        assert_eq!(evaluated[4], Vec3::new(4.0, 0.0, 0.0));
        assert!(evaluated.windows(2).all(|w| w[0].x <= w[1].x));
    }

    #[test]
    fn test_cache_invalidation() {
        let mut spline = Spline::poly(line(2));
        let first = spline.evaluated_positions();
        assert!(Arc::ptr_eq(&first, &spline.evaluated_positions()));

        spline.set_cyclic(false);
        assert!(spline.cache().is_valid());
        spline.set_cyclic(true);
        assert!(!spline.cache().is_valid());

        spline.evaluated_positions();
        spline.positions_mut()[1] = Vec3::Y;
        assert_eq!(spline.evaluated_positions()[1], Vec3::Y);
    }

    #[test]
    fn test_resolution_rules() {
        let mut poly = Spline::poly(line(2));
        poly.set_resolution(8);
        assert_eq!(poly.resolution(), 1);

        let mut nurbs = Spline::nurbs(line(4));
        nurbs.set_resolution(-3);
        assert_eq!(nurbs.resolution(), 1);
    }

    #[test]
    fn test_move_point_carries_handles() {
        let mut spline = Spline::bezier(line(2), line(2), line(2));
        spline.move_point(1, Vec3::new(1.0, 2.0, 0.0));
        assert_eq!(spline.handles_left().unwrap()[1], Vec3::new(1.0, 2.0, 0.0));
        assert_eq!(spline.handles_right().unwrap()[0], Vec3::ZERO);
    }
}
