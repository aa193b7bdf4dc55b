//! The geometry set: at most one shared component per geometry type.
//!
//! Copying a [`GeometrySet`] only bumps the reference counts of its
//! components. Write access goes through
//! [`get_component_for_write`](GeometrySet::get_component_for_write), which
//! copies a component first when other sets still share it.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use rayon::prelude::*;
use rayon::ThreadPoolBuilder;
use smallvec::SmallVec;
use tracing::{debug, debug_span, warn};

use crate::attribute::{
    data_type_highest_complexity, domain_highest_priority, AnonymousAttributePropagationInfo, AttrDomain,
    AttributeId, AttributeMetaData,
};
use crate::config::Settings;
use crate::util::{BBox3f, Error, Result};

use super::component::{
    create_component, ComponentHandle, ComponentKind, GeometryComponent, GeometryComponentType,
    GeometryOwnershipType, PayloadComponent,
};
use super::{
    CurveComponent, CurveEval, InstanceReference, Instances, InstancesComponent, Mesh, MeshComponent, PointCloud,
    PointCloudComponent, Volume, VolumeComponent,
};

/// Present components, in type order.
pub type ComponentList<'a> = SmallVec<[&'a dyn GeometryComponent; GeometryComponentType::COUNT]>;

/// Container of geometry components, one slot per component type.
#[derive(Debug, Clone, Default)]
pub struct GeometrySet {
    components: [Option<ComponentHandle>; GeometryComponentType::COUNT],
}

/// Generates the typed helpers for one payload component.
macro_rules! payload_accessors {
    ($component:ty, $payload:ty, $create:ident, $replace:ident, $read:ident, $write:ident, $has:ident) => {
        /// New set holding only this payload.
        pub fn $create(data: Arc<$payload>, ownership: GeometryOwnershipType) -> Self {
            Self::create_with::<$component>(data, ownership)
        }

        /// Swap the payload. `None` removes the component.
        pub fn $replace(&mut self, data: Option<Arc<$payload>>, ownership: GeometryOwnershipType) {
            self.replace_payload::<$component>(data, ownership);
        }

        pub fn $read(&self) -> Option<&$payload> {
            self.get_component_for_read::<$component>()
                .and_then(|component| component.get_for_read())
        }

        /// Payload for writing, copying shared components and read-only data.
        pub fn $write(&mut self) -> Option<&mut $payload> {
            self.get_payload_for_write::<$component>()
        }

        /// Whether a non-empty component of this type is present.
        pub fn $has(&self) -> bool {
            self.has_non_empty(<$component as ComponentKind>::TYPE)
        }
    };
}

impl GeometrySet {
    pub fn new() -> Self {
        Self::default()
    }

    // ------------------------------------------------------------------------
    // Slots
    // ------------------------------------------------------------------------

    /// Handle in the slot of `component_type`.
    pub fn get_component(&self, component_type: GeometryComponentType) -> Option<&ComponentHandle> {
        self.components[component_type.index()].as_ref()
    }

    pub fn get_component_for_read<T: ComponentKind>(&self) -> Option<&T> {
        self.get_component(T::TYPE)?.downcast_ref::<T>()
    }

    /// Exclusive access to the component of type `T`.
    ///
    /// Installs an empty component when the slot is empty and copies the
    /// component when it is shared with another set.
    pub fn get_component_for_write<T: ComponentKind>(&mut self) -> &mut T {
        let handle = self.components[T::TYPE.index()].get_or_insert_with(|| ComponentHandle::new(T::default()));
        match handle.make_mut().as_any_mut().downcast_mut::<T>() {
            Some(component) => component,
            None => unreachable!("slot {} holds a different component type", T::TYPE),
        }
    }

    /// Whether a component, possibly empty, is installed.
    pub fn has(&self, component_type: GeometryComponentType) -> bool {
        self.components[component_type.index()].is_some()
    }

    pub fn has_component<T: ComponentKind>(&self) -> bool {
        self.has(T::TYPE)
    }

    fn has_non_empty(&self, component_type: GeometryComponentType) -> bool {
        self.get_component(component_type).is_some_and(|c| !c.is_empty())
    }

    /// Install a shared component. The slot must be empty.
    pub fn add(&mut self, component: &ComponentHandle) -> Result<()> {
        let component_type = component.component_type();
        let slot = &mut self.components[component_type.index()];
        if slot.is_some() {
            return Err(Error::SlotOccupied(component_type));
        }
        *slot = Some(component.clone());
        Ok(())
    }

    /// Install a new component. The slot must be empty.
    pub fn add_component(&mut self, component: impl GeometryComponent) -> Result<()> {
        self.add(&ComponentHandle::new(component))
    }

    /// Release the component of `component_type`. Returns whether one was present.
    pub fn remove(&mut self, component_type: GeometryComponentType) -> bool {
        self.components[component_type.index()].take().is_some()
    }

    pub fn remove_component<T: ComponentKind>(&mut self) -> bool {
        self.remove(T::TYPE)
    }

    pub fn clear(&mut self) {
        self.components = Default::default();
    }

    /// Release every component whose type is not listed.
    pub fn keep_only(&mut self, component_types: &[GeometryComponentType]) {
        for (slot, component_type) in self.components.iter_mut().zip(GeometryComponentType::ALL) {
            if !component_types.contains(&component_type) {
                *slot = None;
            }
        }
    }

    /// Like [`keep_only`](Self::keep_only), but instances and edit data
    /// always survive.
    pub fn keep_only_during_modify(&mut self, component_types: &[GeometryComponentType]) {
        let mut extended: SmallVec<[GeometryComponentType; GeometryComponentType::COUNT]> =
            component_types.iter().copied().collect();
        extended.push(GeometryComponentType::Instances);
        extended.push(GeometryComponentType::EditData);
        self.keep_only(&extended);
    }

    pub fn get_components_for_read(&self) -> ComponentList<'_> {
        self.components.iter().flatten().map(|handle| &**handle).collect()
    }

    /// Number of installed components.
    pub fn components_num(&self) -> usize {
        self.components.iter().flatten().count()
    }

    /// True if no component holds geometry. Edit data does not count.
    pub fn is_empty(&self) -> bool {
        ![
            GeometryComponentType::Mesh,
            GeometryComponentType::Curve,
            GeometryComponentType::PointCloud,
            GeometryComponentType::Volume,
            GeometryComponentType::Instances,
        ]
        .into_iter()
        .any(|component_type| self.has_non_empty(component_type))
    }

    /// Whether every component owns its payload. Instance contents are not checked.
    pub fn owns_direct_data(&self) -> bool {
        self.components.iter().flatten().all(|component| component.owns_direct_data())
    }

    /// Give every component a private, owned payload.
    pub fn ensure_owns_direct_data(&mut self) {
        for handle in self.components.iter_mut().flatten() {
            if !handle.owns_direct_data() {
                handle.make_mut().ensure_owns_direct_data();
            }
        }
    }

    /// Union of the bounds of all non-instance components.
    pub fn compute_boundbox_without_instances(&self) -> Option<BBox3f> {
        self.components
            .iter()
            .flatten()
            .filter(|component| component.component_type() != GeometryComponentType::Instances)
            .filter_map(|component| component.bounds())
            .reduce(|a, b| a.union(&b))
    }

    // ------------------------------------------------------------------------
    // Typed payload access
    // ------------------------------------------------------------------------

    fn create_with<C: PayloadComponent>(data: Arc<C::Payload>, ownership: GeometryOwnershipType) -> Self {
        let mut geometry = Self::default();
        geometry.get_component_for_write::<C>().replace(Some(data), ownership);
        geometry
    }

    fn replace_payload<C: PayloadComponent>(&mut self, data: Option<Arc<C::Payload>>, ownership: GeometryOwnershipType) {
        let current = self.get_component_for_read::<C>().and_then(|c| c.payload().arc());
        let unchanged = match (current, data.as_ref()) {
            (None, None) => true,
            (Some(current), Some(data)) => Arc::ptr_eq(current, data),
            _ => false,
        };
        if unchanged {
            return;
        }
        self.remove(C::TYPE);
        if let Some(data) = data {
            self.get_component_for_write::<C>().replace(Some(data), ownership);
        }
    }

    fn get_payload_for_write<C: PayloadComponent>(&mut self) -> Option<&mut C::Payload> {
        if !self.has(C::TYPE) {
            return None;
        }
        self.get_component_for_write::<C>().get_for_write()
    }

    payload_accessors!(
        MeshComponent,
        Mesh,
        create_with_mesh,
        replace_mesh,
        get_mesh_for_read,
        get_mesh_for_write,
        has_mesh
    );
    payload_accessors!(
        CurveComponent,
        CurveEval,
        create_with_curve,
        replace_curve,
        get_curve_for_read,
        get_curve_for_write,
        has_curve
    );
    payload_accessors!(
        PointCloudComponent,
        PointCloud,
        create_with_pointcloud,
        replace_pointcloud,
        get_pointcloud_for_read,
        get_pointcloud_for_write,
        has_pointcloud
    );
    payload_accessors!(
        VolumeComponent,
        Volume,
        create_with_volume,
        replace_volume,
        get_volume_for_read,
        get_volume_for_write,
        has_volume
    );
    payload_accessors!(
        InstancesComponent,
        Instances,
        create_with_instances,
        replace_instances,
        get_instances_for_read,
        get_instances_for_write,
        has_instances
    );

    /// New set owning `instances`.
    pub fn from_instances(instances: Instances) -> Self {
        Self::create_with_instances(Arc::new(instances), GeometryOwnershipType::Owned)
    }

    pub fn has_edit_data(&self) -> bool {
        self.has_non_empty(GeometryComponentType::EditData)
    }

    // ------------------------------------------------------------------------
    // Instance traversal
    // ------------------------------------------------------------------------

    /// Geometry sets embedded in this set's instances.
    fn child_geometry_sets(&self) -> impl DoubleEndedIterator<Item = &GeometrySet> {
        self.get_instances_for_read()
            .into_iter()
            .flat_map(|instances| instances.references())
            .filter_map(InstanceReference::geometry_set)
    }

    /// Call `callback` for every attribute on the listed component types.
    ///
    /// With `include_instances` the nested sets are visited depth first. A set
    /// referenced from several places is visited once per reference.
    pub fn attribute_foreach(
        &self,
        component_types: &[GeometryComponentType],
        include_instances: bool,
        mut callback: impl FnMut(&AttributeId, &AttributeMetaData, &dyn GeometryComponent),
    ) {
        let mut stack = vec![self];
        while let Some(geometry) = stack.pop() {
            for &component_type in component_types {
                let Some(component) = geometry.get_component(component_type) else {
                    continue;
                };
                if let Some(attributes) = component.attributes() {
                    attributes.for_all(|id, meta_data| {
                        callback(id, meta_data, &**component);
                        true
                    });
                }
            }
            if include_instances {
                stack.extend(geometry.child_geometry_sets().rev());
            }
        }
    }

    /// Collect the attributes a component of `dst_component_type` should get
    /// when built from the listed source components.
    ///
    /// Builtins only carry over when they are builtin on the destination too.
    /// Instance attributes land on points unless the destination is instances.
    /// Names found more than once get the highest priority domain and the
    /// most complex data type.
    pub fn gather_attributes_for_propagation(
        &self,
        component_types: &[GeometryComponentType],
        dst_component_type: GeometryComponentType,
        include_instances: bool,
        propagation_info: &AnonymousAttributePropagationInfo,
        attributes: &mut HashMap<AttributeId, AttributeMetaData>,
    ) {
        let _span = debug_span!("gather_attributes_for_propagation", dst = %dst_component_type).entered();
        let dummy = create_component(dst_component_type);
        self.attribute_foreach(component_types, include_instances, |id, meta_data, component| {
            if component.is_builtin_attribute(id) {
                if !dummy.is_builtin_attribute(id) {
                    return;
                }
            } else if id.is_anonymous() {
                if !propagation_info.propagate(id) {
                    return;
                }
            } else if id.is_internal() {
                return;
            }

            let domain = if dst_component_type != GeometryComponentType::Instances
                && meta_data.domain == AttrDomain::Instance
            {
                AttrDomain::Point
            } else {
                meta_data.domain
            };
            attributes
                .entry(id.clone())
                .and_modify(|kind| {
                    kind.domain = domain_highest_priority([kind.domain, domain]);
                    kind.data_type = data_type_highest_complexity([kind.data_type, meta_data.data_type]);
                })
                .or_insert(AttributeMetaData::new(domain, meta_data.data_type));
        });
        debug!(attributes = attributes.len(), "gathered attributes for propagation");
    }

    /// Distinct component types in this set and, optionally, nested sets.
    pub fn gather_component_types(&self, include_instances: bool, ignore_empty: bool) -> Vec<GeometryComponentType> {
        let mut types = Vec::new();
        let mut stack = vec![self];
        while let Some(geometry) = stack.pop() {
            for component in geometry.components.iter().flatten() {
                if ignore_empty && component.is_empty() {
                    continue;
                }
                if !types.contains(&component.component_type()) {
                    types.push(component.component_type());
                }
            }
            if include_instances {
                stack.extend(geometry.child_geometry_sets().rev());
            }
        }
        types
    }

    /// Run `callback` on this set and every geometry set nested in its
    /// instances, using the default [`Settings`].
    pub fn modify_geometry_sets<F>(&mut self, callback: F)
    where
        F: Fn(&mut GeometrySet) + Send + Sync,
    {
        self.modify_geometry_sets_with(&Settings::default(), callback);
    }

    /// Run `callback` once per geometry set reachable through instances.
    ///
    /// Object and collection references are turned into embedded geometry
    /// first. Nested sets are detached from their parents while the callbacks
    /// run, so a callback sees its own instances without their nested
    /// geometry. It may add instances but must not remove or reorder existing
    /// references. Callbacks run on the rayon pool without ordering guarantees
    /// unless there is a single node.
    pub fn modify_geometry_sets_with<F>(&mut self, settings: &Settings, callback: F)
    where
        F: Fn(&mut GeometrySet) + Send + Sync,
    {
        let _span = debug_span!("modify_geometry_sets").entered();
        let mut nodes = gather_mutable_geometry_sets(std::mem::take(self));

        if nodes.len() == 1 {
            callback(&mut nodes[0].geometry);
        } else if settings.use_parallel(nodes.len()) {
            debug!(nodes = nodes.len(), threads = ?settings.num_threads, "modifying geometry sets in parallel");
            let run = |nodes: &mut [ModifyNode]| {
                nodes.par_iter_mut().for_each(|node| callback(&mut node.geometry));
            };
            match settings.num_threads.map(|n| ThreadPoolBuilder::new().num_threads(n).build()) {
                Some(Ok(pool)) => pool.install(|| run(&mut nodes)),
                Some(Err(err)) => {
                    warn!(%err, "failed to build thread pool, using the global pool");
                    run(&mut nodes);
                }
                None => run(&mut nodes),
            }
        } else {
            for node in &mut nodes {
                callback(&mut node.geometry);
            }
        }

        *self = reassemble_geometry_sets(nodes);
    }
}

/// A geometry set detached from its parent during `modify_geometry_sets`.
struct ModifyNode {
    geometry: GeometrySet,
    /// Parent node and the reference index the geometry came from.
    parent: Option<(usize, usize)>,
}

/// Flatten the instance tree into owned nodes, parents before children.
fn gather_mutable_geometry_sets(root: GeometrySet) -> Vec<ModifyNode> {
    let mut nodes = vec![ModifyNode {
        geometry: root,
        parent: None,
    }];
    let mut index = 0;
    while index < nodes.len() {
        let mut children = Vec::new();
        if let Some(instances) = nodes[index].geometry.get_instances_for_write() {
            instances.ensure_geometry_instances();
            for (reference_index, reference) in instances.references_for_write().iter_mut().enumerate() {
                if let Some(child) = reference.geometry_set_mut() {
                    children.push(ModifyNode {
                        geometry: std::mem::take(child),
                        parent: Some((index, reference_index)),
                    });
                }
            }
        }
        nodes.extend(children);
        index += 1;
    }
    nodes
}

/// Put detached nodes back into their parents' references.
fn reassemble_geometry_sets(mut nodes: Vec<ModifyNode>) -> GeometrySet {
    while let Some(node) = nodes.pop() {
        let Some((parent, reference_index)) = node.parent else {
            return node.geometry;
        };
        let slot = nodes[parent]
            .geometry
            .get_instances_for_write()
            .and_then(|instances| instances.references_for_write().get_mut(reference_index))
            .and_then(InstanceReference::geometry_set_mut);
        match slot {
            Some(slot) => *slot = node.geometry,
            None => warn!(reference_index, "instance reference changed during modify, dropping nested geometry"),
        }
    }
    unreachable!("root geometry set missing from modify nodes")
}

/// Identity comparison: equal when every slot shares the same component.
impl PartialEq for GeometrySet {
    fn eq(&self, other: &Self) -> bool {
        self.components
            .iter()
            .zip(&other.components)
            .all(|(a, b)| match (a, b) {
                (None, None) => true,
                (Some(a), Some(b)) => a.ptr_eq(b),
                _ => false,
            })
    }
}

impl fmt::Display for GeometrySet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<GeometrySet at {:p}, {} components>", self, self.components_num())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::attribute::{AttributeInit, DataType, GArray, MutableAttributeAccessor};
    use crate::geom::mesh::tests::quad_and_triangle;
    use crate::geom::{EditDataComponent, Spline};
    use crate::util::{Mat4, Vec3};

    fn cloud(positions: Vec<Vec3>) -> GeometrySet {
        GeometrySet::create_with_pointcloud(
            Arc::new(PointCloud::from_positions(positions)),
            GeometryOwnershipType::Owned,
        )
    }

    fn instances_of(children: &[&GeometrySet]) -> GeometrySet {
        let mut instances = Instances::new();
        for child in children {
            let handle = instances.add_reference(InstanceReference::GeometrySet((*child).clone()));
            instances.add_instance(handle, Mat4::IDENTITY);
        }
        GeometrySet::from_instances(instances)
    }

    #[test]
    fn test_copy_is_shallow_and_write_is_private() {
        let original = cloud(vec![Vec3::ZERO, Vec3::X]);
        let mut copy = original.clone();
        assert_eq!(copy, original);
        assert_eq!(original.get_component(GeometryComponentType::PointCloud).unwrap().users(), 2);

        copy.get_pointcloud_for_write().unwrap().positions_for_write()[0] = Vec3::ONE;
        assert_eq!(original.get_pointcloud_for_read().unwrap().positions()[0], Vec3::ZERO);
        assert_eq!(copy.get_pointcloud_for_read().unwrap().positions()[0], Vec3::ONE);
        assert!(copy.get_component(GeometryComponentType::PointCloud).unwrap().is_mutable());
        assert!(original.get_component(GeometryComponentType::PointCloud).unwrap().is_mutable());
        assert_ne!(copy, original);
    }

    #[test]
    fn test_get_component_for_write_installs_empty() {
        let mut geometry = GeometrySet::new();
        assert!(geometry.get_mesh_for_write().is_none());
        let component = geometry.get_component_for_write::<MeshComponent>();
        assert!(component.is_empty());
        assert!(geometry.has(GeometryComponentType::Mesh));
        assert!(!geometry.has_mesh());
        assert!(geometry.is_empty());
    }

    #[test]
    fn test_add_rejects_occupied_slot() {
        let mut geometry = cloud(vec![Vec3::ZERO]);
        let other = cloud(vec![Vec3::ONE]);
        let handle = other.get_component(GeometryComponentType::PointCloud).unwrap();
        assert!(matches!(
            geometry.add(handle),
            Err(Error::SlotOccupied(GeometryComponentType::PointCloud))
        ));
        assert_eq!(geometry.get_pointcloud_for_read().unwrap().positions()[0], Vec3::ZERO);

        let mut empty = GeometrySet::new();
        empty.add(handle).unwrap();
        assert_eq!(handle.users(), 2);
    }

    #[test]
    fn test_keep_only_during_modify() {
        let mut geometry = GeometrySet::create_with_mesh(Arc::new(quad_and_triangle()), GeometryOwnershipType::Owned);
        geometry.replace_curve(Some(Arc::new(CurveEval::new())), GeometryOwnershipType::Owned);
        geometry.replace_instances(Some(Arc::new(Instances::new())), GeometryOwnershipType::Owned);
        geometry.add_component(EditDataComponent::default()).unwrap();
        assert_eq!(geometry.components_num(), 4);

        geometry.keep_only_during_modify(&[GeometryComponentType::Mesh]);
        let kept: Vec<_> = geometry.get_components_for_read().iter().map(|c| c.component_type()).collect();
        assert_eq!(
            kept,
            vec![
                GeometryComponentType::Mesh,
                GeometryComponentType::Instances,
                GeometryComponentType::EditData
            ]
        );

        geometry.keep_only(&[GeometryComponentType::Mesh]);
        assert_eq!(geometry.components_num(), 1);
        geometry.clear();
        assert_eq!(geometry.components_num(), 0);
    }

    #[test]
    fn test_replace_same_payload_is_noop() {
        let points = Arc::new(PointCloud::new(1));
        let mut geometry = GeometrySet::create_with_pointcloud(points.clone(), GeometryOwnershipType::ReadOnly);
        let before = geometry.clone();
        geometry.replace_pointcloud(Some(points), GeometryOwnershipType::Owned);
        assert_eq!(geometry, before);
        assert!(!geometry.owns_direct_data());

        geometry.replace_pointcloud(None, GeometryOwnershipType::Owned);
        assert!(!geometry.has(GeometryComponentType::PointCloud));
    }

    #[test]
    fn test_ensure_owns_direct_data_copies_read_only() {
        let points = Arc::new(PointCloud::new(2));
        let mut geometry = GeometrySet::create_with_pointcloud(points.clone(), GeometryOwnershipType::ReadOnly);
        let shared = geometry.clone();
        geometry.ensure_owns_direct_data();
        assert!(geometry.owns_direct_data());
        assert!(!shared.owns_direct_data());
        geometry.get_pointcloud_for_write().unwrap().positions_for_write()[0] = Vec3::ONE;
        assert_eq!(points.positions()[0], Vec3::ZERO);
        assert_eq!(shared.get_pointcloud_for_read().unwrap().positions()[0], Vec3::ZERO);
    }

    #[test]
    fn test_boundbox_union() {
        assert!(GeometrySet::new().compute_boundbox_without_instances().is_none());
        let mut geometry = cloud(vec![Vec3::new(-1.0, 5.0, 0.0)]);
        geometry.replace_mesh(Some(Arc::new(quad_and_triangle())), GeometryOwnershipType::Owned);
        let bounds = geometry.compute_boundbox_without_instances().unwrap();
        assert_eq!(bounds.min, Vec3::new(-1.0, 0.0, 0.0));
        assert_eq!(bounds.max, Vec3::new(2.0, 5.0, 0.0));

        let instanced = instances_of(&[&geometry]);
        assert!(instanced.compute_boundbox_without_instances().is_none());
    }

    #[test]
    fn test_attribute_foreach_visits_per_path() {
        let child = cloud(vec![Vec3::ZERO]);
        let mut instances = Instances::new();
        let handle = instances.add_reference(child.clone());
        instances.add_instance(handle, Mat4::IDENTITY);
        // Second reference to the same geometry through an object.
        let object = instances.add_reference(InstanceReference::object("Empty", child));
        instances.add_instance(object, Mat4::IDENTITY);
        instances.ensure_geometry_instances();
        let root = GeometrySet::from_instances(instances);

        let mut visits = 0;
        root.attribute_foreach(&[GeometryComponentType::PointCloud], true, |id, _, component| {
            assert_eq!(id.name(), "position");
            assert_eq!(component.component_type(), GeometryComponentType::PointCloud);
            visits += 1;
        });
        assert_eq!(visits, 2);

        let mut visits = 0;
        root.attribute_foreach(&[GeometryComponentType::PointCloud], false, |_, _, _| visits += 1);
        assert_eq!(visits, 0);
    }

    #[test]
    fn test_gather_component_types_deduplicates() {
        let child = cloud(vec![Vec3::ZERO]);
        let mut instances = Instances::new();
        let a = instances.add_reference(InstanceReference::object("A", child.clone()));
        let b = instances.add_reference(InstanceReference::object("B", child));
        instances.add_instance(a, Mat4::IDENTITY);
        instances.add_instance(b, Mat4::IDENTITY);
        instances.ensure_geometry_instances();
        let mut root = GeometrySet::from_instances(instances);
        root.get_component_for_write::<MeshComponent>();

        assert_eq!(
            root.gather_component_types(true, true),
            vec![GeometryComponentType::Instances, GeometryComponentType::PointCloud]
        );
        assert_eq!(
            root.gather_component_types(false, false),
            vec![GeometryComponentType::Mesh, GeometryComponentType::Instances]
        );
    }

    #[test]
    fn test_propagation_remaps_instance_domain() {
        let child = cloud(vec![Vec3::ZERO]);
        let mut instances = Instances::new();
        let handle = instances.add_reference(child);
        instances.add_instance(handle, Mat4::IDENTITY);
        {
            let mut attributes = MutableAttributeAccessor::new(&mut instances);
            assert!(attributes.add("scale", AttrDomain::Instance, DataType::Float, AttributeInit::Default));
            assert!(attributes.add(".a_17", AttrDomain::Instance, DataType::Bool, AttributeInit::Default));
        }
        let root = GeometrySet::from_instances(instances);

        let mut gathered = HashMap::new();
        root.gather_attributes_for_propagation(
            &[GeometryComponentType::Instances],
            GeometryComponentType::PointCloud,
            false,
            &AnonymousAttributePropagationInfo::only(Vec::<String>::new()),
            &mut gathered,
        );
        assert_eq!(
            gathered.get(&AttributeId::from("scale")),
            Some(&AttributeMetaData::new(AttrDomain::Point, DataType::Float))
        );
        // Builtin on both sides.
        assert_eq!(
            gathered.get(&AttributeId::from("position")),
            Some(&AttributeMetaData::new(AttrDomain::Point, DataType::Float3))
        );
        assert!(!gathered.contains_key(&AttributeId::from(".reference_index")));
        assert!(!gathered.contains_key(&AttributeId::from(".a_17")));

        let mut gathered = HashMap::new();
        root.gather_attributes_for_propagation(
            &[GeometryComponentType::Instances],
            GeometryComponentType::Instances,
            false,
            &AnonymousAttributePropagationInfo::default(),
            &mut gathered,
        );
        assert_eq!(gathered[&AttributeId::from("scale")].domain, AttrDomain::Instance);
        assert!(gathered.contains_key(&AttributeId::from(".a_17")));
    }

    #[test]
    fn test_propagation_merges_domains_and_types() {
        let mut geometry = cloud(vec![Vec3::ZERO, Vec3::X]);
        {
            let mut attributes = geometry
                .get_component_for_write::<PointCloudComponent>()
                .attributes_for_write()
                .unwrap();
            let ints = AttributeInit::MoveArray(GArray::from_vec(vec![1, 2]));
            assert!(attributes.add("value", AttrDomain::Point, DataType::Int32, ints));
        }

        let mut mesh = quad_and_triangle();
        {
            let mut mesh_attributes = MutableAttributeAccessor::new(&mut mesh);
            assert!(mesh_attributes.add("value", AttrDomain::Face, DataType::Float, AttributeInit::Default));
        }
        geometry.replace_mesh(Some(Arc::new(mesh)), GeometryOwnershipType::Owned);

        let mut gathered = HashMap::new();
        geometry.gather_attributes_for_propagation(
            &[GeometryComponentType::Mesh, GeometryComponentType::PointCloud],
            GeometryComponentType::Mesh,
            false,
            &AnonymousAttributePropagationInfo::default(),
            &mut gathered,
        );
        assert_eq!(
            gathered[&AttributeId::from("value")],
            AttributeMetaData::new(AttrDomain::Point, DataType::Float)
        );
        // Builtins shared with the destination are kept.
        assert!(gathered.contains_key(&AttributeId::from("material_index")));
        assert!(!gathered.contains_key(&AttributeId::from("radius")));
    }

    #[test]
    fn test_modify_single_node_runs_directly() {
        let mut geometry = cloud(vec![Vec3::ZERO]);
        let calls = AtomicUsize::new(0);
        geometry.modify_geometry_sets(|geometry| {
            calls.fetch_add(1, Ordering::Relaxed);
            geometry.get_pointcloud_for_write().unwrap().positions_for_write()[0] = Vec3::Z;
        });
        assert_eq!(calls.load(Ordering::Relaxed), 1);
        assert_eq!(geometry.get_pointcloud_for_read().unwrap().positions()[0], Vec3::Z);
    }

    #[test]
    fn test_modify_reaches_nested_sets() {
        let leaf = cloud(vec![Vec3::ZERO]);
        let middle = instances_of(&[&leaf]);
        let mut root = instances_of(&[&middle, &leaf]);
        root.replace_curve(
            Some(Arc::new(CurveEval::from_splines([Spline::poly(vec![Vec3::ZERO])]))),
            GeometryOwnershipType::Owned,
        );
        let original_leaf = leaf.clone();

        for settings in [
            Settings::default(),
            Settings { parallel_modify: false, ..Default::default() },
            Settings { num_threads: Some(2), ..Default::default() },
        ] {
            let mut root = root.clone();
            let calls = AtomicUsize::new(0);
            root.modify_geometry_sets_with(&settings, |geometry| {
                calls.fetch_add(1, Ordering::Relaxed);
                if let Some(points) = geometry.get_pointcloud_for_write() {
                    points.positions_for_write()[0] = Vec3::ONE;
                }
                geometry.keep_only_during_modify(&[GeometryComponentType::PointCloud]);
            });
            // root, middle, leaf under middle, leaf under root
            assert_eq!(calls.load(Ordering::Relaxed), 4);
            assert!(!root.has(GeometryComponentType::Curve));

            let instances = root.get_instances_for_read().unwrap();
            let nested_middle = instances.references()[0].geometry_set().unwrap();
            let nested_leaf = nested_middle.get_instances_for_read().unwrap().references()[0]
                .geometry_set()
                .unwrap();
            assert_eq!(nested_leaf.get_pointcloud_for_read().unwrap().positions()[0], Vec3::ONE);
            let direct_leaf = instances.references()[1].geometry_set().unwrap();
            assert_eq!(direct_leaf.get_pointcloud_for_read().unwrap().positions()[0], Vec3::ONE);
        }
        assert_eq!(original_leaf.get_pointcloud_for_read().unwrap().positions()[0], Vec3::ZERO);
        assert!(root.has_curve());
    }

    #[test]
    fn test_display_shows_identity_and_count() {
        let geometry = cloud(vec![Vec3::ZERO]);
        let text = geometry.to_string();
        assert!(text.starts_with("<GeometrySet at 0x"));
        assert!(text.ends_with(", 1 components>"));
    }
}
