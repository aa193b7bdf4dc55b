//! # geoset
//!
//! Copy-on-write geometry sets with a generic, domain-aware attribute API.
//!
//! A [`GeometrySet`](geom::GeometrySet) holds at most one component per
//! geometry type (mesh, curve, point cloud, volume, instances, edit data).
//! Components are shared between sets and copied only when written through a
//! set that does not own them exclusively. Per-element data on every
//! component is reached through the same
//! [`AttributeAccessor`](attribute::AttributeAccessor) surface, whatever the
//! storage behind it.
//!
//! ## Modules
//!
//! - [`util`] - Errors, math types, logging setup
//! - [`attribute`] - Domains, virtual arrays, providers and accessors
//! - [`geom`] - Geometry payloads, components and the geometry set
//! - [`config`] - Runtime settings
//!
//! ## Example
//!
//! ```
//! use std::sync::Arc;
//! use geoset::prelude::*;
//!
//! let points = PointCloud::from_positions(vec![Vec3::ZERO, Vec3::X, Vec3::Y]);
//! let mut geometry = GeometrySet::create_with_pointcloud(Arc::new(points), GeometryOwnershipType::Owned);
//!
//! let component = geometry.get_component_for_write::<PointCloudComponent>();
//! let mut attributes = component.attributes_for_write().unwrap();
//! assert!(attributes.add("weight", AttrDomain::Point, DataType::Float, AttributeInit::Default));
//! assert_eq!(attributes.domain_size(AttrDomain::Point), 3);
//! ```

pub mod util;
pub mod attribute;
pub mod geom;
pub mod config;

// Re-export commonly used types
pub use util::{Error, Result};
pub use config::Settings;
pub use geom::{GeometryComponentType, GeometrySet};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::util::{init_tracing, BBox3f, Error, Mat3, Mat4, Quat, Result, Vec2, Vec3, Vec4};
    pub use crate::attribute::{
        AttrDomain, AttributeAccessor, AttributeId, AttributeInit, AttributeMetaData, ColorGeometry4f, DataType,
        GArray, GVArray, MutableAttributeAccessor, VArray, VMutableArray,
    };
    pub use crate::config::Settings;
    pub use crate::geom::*;
}
