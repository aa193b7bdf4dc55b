//! Volume payload and component.
//!
//! Grids are opaque to the geometry layer: only their names, voxel-space
//! extents and transforms are tracked. Volumes expose no attributes.

use crate::util::{BBox3f, Mat4};

use super::component::{
    component_common, ComponentKind, ComponentPayload, GeometryComponent, GeometryComponentType,
    PayloadComponent,
};

/// One named grid of a volume.
#[derive(Debug, Clone, PartialEq)]
pub struct VolumeGrid {
    pub name: String,
    /// Active voxel bounds in index space.
    pub index_bounds: BBox3f,
    /// Index space to object space.
    pub transform: Mat4,
}

impl VolumeGrid {
    pub fn new(name: impl Into<String>, index_bounds: BBox3f, transform: Mat4) -> Self {
        Self {
            name: name.into(),
            index_bounds,
            transform,
        }
    }

    /// Object space bounds of the active voxels.
    pub fn bounds(&self) -> BBox3f {
        self.index_bounds.transformed(&self.transform)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Volume {
    grids: Vec<VolumeGrid>,
}

impl Volume {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn grids(&self) -> &[VolumeGrid] {
        &self.grids
    }

    pub fn grids_num(&self) -> usize {
        self.grids.len()
    }

    pub fn grid(&self, name: &str) -> Option<&VolumeGrid> {
        self.grids.iter().find(|grid| grid.name == name)
    }

    /// Add a grid, replacing one with the same name.
    pub fn add_grid(&mut self, grid: VolumeGrid) {
        match self.grids.iter_mut().find(|g| g.name == grid.name) {
            Some(existing) => *existing = grid,
            None => self.grids.push(grid),
        }
    }

    pub fn remove_grid(&mut self, name: &str) -> bool {
        let len = self.grids.len();
        self.grids.retain(|grid| grid.name != name);
        self.grids.len() != len
    }

    pub fn bounds(&self) -> Option<BBox3f> {
        let bounds = self
            .grids
            .iter()
            .fold(BBox3f::EMPTY, |bounds, grid| bounds.union(&grid.bounds()));
        (!bounds.is_empty()).then_some(bounds)
    }
}

/// Component holding a [`Volume`].
#[derive(Debug, Default)]
pub struct VolumeComponent {
    payload: ComponentPayload<Volume>,
}

impl VolumeComponent {
    fn copy_component(&self) -> Self {
        Self {
            payload: self.payload.copy(),
        }
    }
}

impl ComponentKind for VolumeComponent {
    const TYPE: GeometryComponentType = GeometryComponentType::Volume;
}

impl PayloadComponent for VolumeComponent {
    type Payload = Volume;

    fn payload(&self) -> &ComponentPayload<Volume> {
        &self.payload
    }

    fn payload_mut(&mut self) -> &mut ComponentPayload<Volume> {
        &mut self.payload
    }
}

impl GeometryComponent for VolumeComponent {
    component_common!();

    fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }

    fn clear(&mut self) {
        self.payload.clear();
    }

    fn owns_direct_data(&self) -> bool {
        self.payload.owns_direct_data()
    }

    fn ensure_owns_direct_data(&mut self) {
        self.payload.ensure_owns_direct_data();
    }

    fn bounds(&self) -> Option<BBox3f> {
        self.payload.get().and_then(Volume::bounds)
    }
}
