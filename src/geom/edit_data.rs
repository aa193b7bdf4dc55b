//! Side-channel data for edit-mode tools working on evaluated geometry.

use tracing::trace;

use crate::util::{Mat3, Vec3};

use super::component::{component_common, ComponentKind, GeometryComponent, GeometryComponentType};
use super::set::GeometrySet;

/// Deformation of the original curve points, recorded during evaluation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CurvesEditHints {
    /// Control point count of the original curve.
    pub point_count: usize,
    /// Deformed control point positions.
    pub positions: Option<Vec<Vec3>>,
    /// Per-point deformation matrices.
    pub deform_mats: Option<Vec<Mat3>>,
}

impl CurvesEditHints {
    pub fn new(point_count: usize) -> Self {
        Self {
            point_count,
            ..Self::default()
        }
    }

    /// Whether all recorded arrays match the original point count.
    pub fn is_valid(&self) -> bool {
        let len_ok = |len: Option<usize>| len.map_or(true, |len| len == self.point_count);
        len_ok(self.positions.as_ref().map(Vec::len)) && len_ok(self.deform_mats.as_ref().map(Vec::len))
    }
}

/// Component carrying edit hints. Holds no attributes and no borrowed data.
#[derive(Debug, Clone, Default)]
pub struct EditDataComponent {
    pub curves_edit_hints: Option<CurvesEditHints>,
}

impl EditDataComponent {
    pub fn new(curves_edit_hints: CurvesEditHints) -> Self {
        Self {
            curves_edit_hints: Some(curves_edit_hints),
        }
    }

    fn copy_component(&self) -> Self {
        self.clone()
    }

    /// Store the current curve positions as deformed positions, unless
    /// positions were already recorded or the point count changed.
    pub fn remember_deformed_curve_positions_if_necessary(geometry: &mut GeometrySet) {
        let Some(curve) = geometry.get_curve_for_read() else {
            return;
        };
        let Some(hints) = geometry
            .get_component_for_read::<EditDataComponent>()
            .and_then(|edit_data| edit_data.curves_edit_hints.as_ref())
        else {
            return;
        };
        if hints.positions.is_some() {
            return;
        }
        let points_num = curve.total_control_point_num();
        if points_num != hints.point_count {
            trace!(points_num, expected = hints.point_count, "curve topology changed, no edit hints");
            return;
        }
        let positions: Vec<Vec3> = curve
            .splines()
            .iter()
            .flat_map(|spline| spline.positions().iter().copied())
            .collect();

        let edit_data = geometry.get_component_for_write::<EditDataComponent>();
        if let Some(hints) = edit_data.curves_edit_hints.as_mut() {
            hints.positions = Some(positions);
        }
    }
}

impl ComponentKind for EditDataComponent {
    const TYPE: GeometryComponentType = GeometryComponentType::EditData;
}

impl GeometryComponent for EditDataComponent {
    component_common!();

    fn is_empty(&self) -> bool {
        self.curves_edit_hints.is_none()
    }

    fn clear(&mut self) {
        self.curves_edit_hints = None;
    }

    fn owns_direct_data(&self) -> bool {
        true
    }

    fn ensure_owns_direct_data(&mut self) {}
}
