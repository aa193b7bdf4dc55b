//! Geometry components and the geometry set.
//!
//! This module provides the typed payloads and their components:
//! - [`Mesh`] / [`MeshComponent`] - Polygon meshes
//! - [`CurveEval`] / [`CurveComponent`] - Poly, Bezier and NURBS splines
//! - [`PointCloud`] / [`PointCloudComponent`] - Unconnected points
//! - [`Volume`] / [`VolumeComponent`] - Named voxel grids
//! - [`Instances`] / [`InstancesComponent`] - Transformed references to other geometry
//! - [`EditDataComponent`] - Edit hints produced during evaluation
//!
//! [`GeometrySet`] holds at most one component of each type and shares them
//! copy-on-write through [`ComponentHandle`].

pub mod batch_cache;
pub mod component;
pub mod curve;
pub mod edit_data;
pub mod instances;
pub mod mesh;
mod mesh_attributes;
pub mod points;
pub mod set;
pub mod spline;
pub mod volume;

// Re-export component types
pub use component::{
    create_component, ComponentHandle, ComponentKind, ComponentPayload, GeometryComponent, GeometryComponentType,
    GeometryOwnershipType, PayloadComponent,
};

// Re-export payload types
pub use batch_cache::{BatchCache, BatchCacheHooks, BatchDirtyMode};
pub use curve::{CurveComponent, CurveEval, CurveRenderData};
pub use edit_data::{CurvesEditHints, EditDataComponent};
pub use instances::{InstanceReference, Instances, InstancesComponent};
pub use mesh::{DeformWeight, Mesh, MeshComponent, MeshCorner, MeshEdge, MeshFace, MeshVert};
pub use points::{PointCloud, PointCloudComponent};
pub use spline::{Spline, SplineType};
pub use volume::{Volume, VolumeComponent, VolumeGrid};

// Re-export the set
pub use set::{ComponentList, GeometrySet};
