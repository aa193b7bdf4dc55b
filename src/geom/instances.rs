//! Instances payload and component.
//!
//! An [`Instances`] payload stores a deduplicated list of [`InstanceReference`]s
//! and, per instance, a handle into that list plus a transform. References to
//! embedded geometry sets form the instance DAG walked by [`GeometrySet`].

use std::sync::OnceLock;

use tracing::trace;

use crate::attribute::{
    AttrDomain, AttributeAccessor, AttributeId, AttributeOwner, BuiltinAttributeProvider,
    BuiltinCustomDataProvider, BuiltinInfo, ChangeListener, ComponentAttributeProviders, ComputedProvider,
    CustomData, CustomDataAttributeProvider, CustomDataOwner, DataType, DerivedArrayProvider,
    DynamicAttributesProvider, MutableAttributeAccessor, VArray,
};
use crate::util::{Mat4, Vec3};

use super::component::{
    component_common, ComponentKind, ComponentPayload, GeometryComponent, GeometryComponentType,
    PayloadComponent,
};
use super::set::GeometrySet;

/// What an instance points at.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum InstanceReference {
    /// Placeholder that produces no geometry.
    #[default]
    None,
    /// An object and its evaluated geometry.
    Object { name: String, geometry: GeometrySet },
    /// A collection of objects or nested collections, each with its own transform.
    Collection {
        name: String,
        children: Vec<(Mat4, InstanceReference)>,
    },
    /// Geometry embedded directly into the instances.
    GeometrySet(GeometrySet),
}

impl InstanceReference {
    pub fn object(name: impl Into<String>, geometry: GeometrySet) -> Self {
        Self::Object {
            name: name.into(),
            geometry,
        }
    }

    pub fn collection(name: impl Into<String>, children: Vec<(Mat4, InstanceReference)>) -> Self {
        Self::Collection {
            name: name.into(),
            children,
        }
    }

    /// The embedded geometry, only for [`InstanceReference::GeometrySet`].
    pub fn geometry_set(&self) -> Option<&GeometrySet> {
        match self {
            Self::GeometrySet(geometry) => Some(geometry),
            _ => None,
        }
    }

    pub fn geometry_set_mut(&mut self) -> Option<&mut GeometrySet> {
        match self {
            Self::GeometrySet(geometry) => Some(geometry),
            _ => None,
        }
    }

    /// Turn object and collection references into embedded geometry.
    fn into_geometry_set(self) -> Self {
        match self {
            Self::Object { mut geometry, .. } => {
                if let Some(instances) = geometry.get_instances_for_write() {
                    instances.ensure_geometry_instances();
                }
                Self::GeometrySet(geometry)
            }
            Self::Collection { children, .. } => {
                let mut instances = Instances::new();
                for (transform, child) in children {
                    let handle = instances.add_reference(child);
                    instances.add_instance(handle, transform);
                }
                instances.ensure_geometry_instances();
                Self::GeometrySet(GeometrySet::from_instances(instances))
            }
            other => other,
        }
    }
}

impl From<GeometrySet> for InstanceReference {
    fn from(geometry: GeometrySet) -> Self {
        Self::GeometrySet(geometry)
    }
}

/// Transformed references to other geometry.
#[derive(Debug, Clone, Default)]
pub struct Instances {
    references: Vec<InstanceReference>,
    reference_handles: Vec<i32>,
    transforms: Vec<Mat4>,
    pub(crate) data: CustomData,
}

impl Instances {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn instances_num(&self) -> usize {
        self.transforms.len()
    }

    pub fn references_num(&self) -> usize {
        self.references.len()
    }

    pub fn references(&self) -> &[InstanceReference] {
        &self.references
    }

    /// References for in-place edits. Handles stay valid as long as the
    /// list is not reordered.
    pub fn references_for_write(&mut self) -> &mut [InstanceReference] {
        &mut self.references
    }

    pub fn reference_handles(&self) -> &[i32] {
        &self.reference_handles
    }

    pub fn transforms(&self) -> &[Mat4] {
        &self.transforms
    }

    pub fn transforms_for_write(&mut self) -> &mut [Mat4] {
        &mut self.transforms
    }

    /// Handle of `reference`, adding it unless an equal one exists.
    pub fn add_reference(&mut self, reference: impl Into<InstanceReference>) -> i32 {
        let reference = reference.into();
        if let Some(index) = self.references.iter().position(|r| *r == reference) {
            return index as i32;
        }
        self.references.push(reference);
        (self.references.len() - 1) as i32
    }

    /// Append one instance of the reference behind `handle`.
    pub fn add_instance(&mut self, handle: i32, transform: Mat4) {
        debug_assert!(
            usize::try_from(handle).is_ok_and(|h| h < self.references.len()),
            "invalid reference handle {handle}"
        );
        self.reference_handles.push(handle);
        self.transforms.push(transform);
        self.data.resize(self.transforms.len());
    }

    /// Drop references no instance uses and remap the handles.
    pub fn remove_unused_references(&mut self) {
        let mut used = vec![false; self.references.len()];
        for &handle in &self.reference_handles {
            if let Some(flag) = usize::try_from(handle).ok().and_then(|h| used.get_mut(h)) {
                *flag = true;
            }
        }
        if used.iter().all(|&u| u) {
            return;
        }

        let mut remap = vec![-1; used.len()];
        let mut kept = Vec::with_capacity(used.len());
        for (index, reference) in std::mem::take(&mut self.references).into_iter().enumerate() {
            if used[index] {
                remap[index] = kept.len() as i32;
                kept.push(reference);
            }
        }
        trace!(removed = used.len() - kept.len(), "removed unused instance references");
        self.references = kept;
        for handle in &mut self.reference_handles {
            if let Some(&new_handle) = usize::try_from(*handle).ok().and_then(|h| remap.get(h)) {
                *handle = new_handle;
            }
        }
    }

    /// Replace object and collection references by embedded geometry sets.
    ///
    /// Running it again is a no-op.
    pub fn ensure_geometry_instances(&mut self) {
        let needs_conversion = self
            .references
            .iter()
            .any(|r| matches!(r, InstanceReference::Object { .. } | InstanceReference::Collection { .. }));
        if !needs_conversion {
            return;
        }
        for reference in &mut self.references {
            *reference = std::mem::take(reference).into_geometry_set();
        }
    }

    /// Visit every embedded geometry set once per reference.
    pub fn foreach_referenced_geometry(&self, mut callback: impl FnMut(&GeometrySet)) {
        for reference in &self.references {
            if let Some(geometry) = reference.geometry_set() {
                callback(geometry);
            }
        }
    }
}

// ============================================================================
// Attributes
// ============================================================================

impl CustomDataOwner for Instances {
    fn custom_data(&self, domain: AttrDomain) -> Option<&CustomData> {
        (domain == AttrDomain::Instance).then_some(&self.data)
    }

    fn custom_data_for_write(&mut self, domain: AttrDomain) -> Option<(&mut CustomData, &dyn ChangeListener)> {
        if domain != AttrDomain::Instance {
            return None;
        }
        Some((&mut self.data, &()))
    }

    fn custom_data_size(&self, domain: AttrDomain) -> usize {
        self.attribute_domain_size(domain)
    }
}

fn transforms(instances: &Instances) -> &[Mat4] {
    &instances.transforms
}

fn transforms_for_write(instances: &mut Instances) -> (&mut [Mat4], &dyn ChangeListener) {
    (&mut instances.transforms, &())
}

fn reference_indices(instances: &Instances) -> VArray<'_, i32> {
    VArray::from_span(&instances.reference_handles)
}

fn create_attribute_providers() -> ComponentAttributeProviders<Instances> {
    let builtin: Vec<Box<dyn BuiltinAttributeProvider<Instances>>> = vec![
        Box::new(DerivedArrayProvider::new(
            BuiltinInfo::new("position", AttrDomain::Instance, DataType::Float3),
            transforms,
            transforms_for_write,
            |m: &Mat4| m.w_axis.truncate(),
            |m: &mut Mat4, p: Vec3| m.w_axis = p.extend(1.0),
        )),
        Box::new(ComputedProvider::new(
            BuiltinInfo::new(".reference_index", AttrDomain::Instance, DataType::Int32),
            reference_indices,
        )),
        Box::new(BuiltinCustomDataProvider::new(
            BuiltinInfo::new("id", AttrDomain::Instance, DataType::Int32).optional(),
        )),
    ];
    let dynamic: Vec<Box<dyn DynamicAttributesProvider<Instances>>> =
        vec![Box::new(CustomDataAttributeProvider::new(AttrDomain::Instance))];
    ComponentAttributeProviders::new(builtin, dynamic)
}

impl AttributeOwner for Instances {
    fn attribute_providers() -> &'static ComponentAttributeProviders<Self> {
        static PROVIDERS: OnceLock<ComponentAttributeProviders<Instances>> = OnceLock::new();
        PROVIDERS.get_or_init(create_attribute_providers)
    }

    fn attribute_domain_size(&self, domain: AttrDomain) -> usize {
        match domain {
            AttrDomain::Instance => self.instances_num(),
            _ => 0,
        }
    }
}

// ============================================================================
// Component
// ============================================================================

/// Component holding [`Instances`].
///
/// Owning the payload does not imply owning the referenced geometry.
#[derive(Debug, Default)]
pub struct InstancesComponent {
    payload: ComponentPayload<Instances>,
}

impl InstancesComponent {
    fn copy_component(&self) -> Self {
        Self {
            payload: self.payload.copy(),
        }
    }
}

impl ComponentKind for InstancesComponent {
    const TYPE: GeometryComponentType = GeometryComponentType::Instances;
}

impl PayloadComponent for InstancesComponent {
    type Payload = Instances;

    fn payload(&self) -> &ComponentPayload<Instances> {
        &self.payload
    }

    fn payload_mut(&mut self) -> &mut ComponentPayload<Instances> {
        &mut self.payload
    }
}

impl GeometryComponent for InstancesComponent {
    component_common!();

    fn is_empty(&self) -> bool {
        self.payload.get().map_or(true, |instances| instances.instances_num() == 0)
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

    fn attributes(&self) -> Option<AttributeAccessor<'_>> {
        self.payload.get().map(|instances| AttributeAccessor::new(instances))
    }

    fn attributes_for_write(&mut self) -> Option<MutableAttributeAccessor<'_>> {
        self.get_for_write().map(|instances| MutableAttributeAccessor::new(instances))
    }

    fn is_builtin_attribute(&self, id: &AttributeId) -> bool {
        Instances::attribute_providers().is_builtin(id)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::attribute::AttributeInit;
    use crate::geom::{GeometryOwnershipType, PointCloud};

    fn cloud(n: usize) -> GeometrySet {
        GeometrySet::create_with_pointcloud(Arc::new(PointCloud::new(n)), GeometryOwnershipType::Owned)
    }

    #[test]
    fn test_add_reference_deduplicates() {
        let geometry = cloud(2);
        let mut instances = Instances::new();
        let a = instances.add_reference(geometry.clone());
        let b = instances.add_reference(geometry);
        let c = instances.add_reference(cloud(2));
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(instances.references_num(), 2);
        assert_eq!(instances.add_reference(InstanceReference::None), 2);
        assert_eq!(instances.add_reference(InstanceReference::None), 2);
    }

    #[test]
    fn test_remove_unused_references_remaps_handles() {
        let mut instances = Instances::new();
        let unused = instances.add_reference(cloud(1));
        let used = instances.add_reference(cloud(2));
        instances.add_instance(used, Mat4::IDENTITY);
        instances.add_instance(used, Mat4::from_translation(Vec3::X));
        assert_eq!(unused, 0);

        instances.remove_unused_references();
        assert_eq!(instances.references_num(), 1);
        assert_eq!(instances.reference_handles(), &[0, 0]);
        let geometry = instances.references()[0].geometry_set().unwrap();
        assert_eq!(geometry.get_pointcloud_for_read().unwrap().points_num(), 2);
    }

    #[test]
    fn test_ensure_geometry_instances_is_idempotent() {
        let mut instances = Instances::new();
        let object = instances.add_reference(InstanceReference::object("Suzanne", cloud(3)));
        let collection = instances.add_reference(InstanceReference::collection(
            "Rocks",
            vec![
                (Mat4::IDENTITY, InstanceReference::object("Rock", cloud(1))),
                (Mat4::from_translation(Vec3::Y), InstanceReference::object("Rock", cloud(1))),
            ],
        ));
        instances.add_instance(object, Mat4::IDENTITY);
        instances.add_instance(collection, Mat4::IDENTITY);

        instances.ensure_geometry_instances();
        assert!(instances.references().iter().all(|r| r.geometry_set().is_some()));
        let nested = instances.references()[1].geometry_set().unwrap();
        let nested_instances = nested.get_instances_for_read().unwrap();
        assert_eq!(nested_instances.instances_num(), 2);
        assert!(nested_instances.references().iter().all(|r| r.geometry_set().is_some()));

        let before = instances.references().to_vec();
        instances.ensure_geometry_instances();
        assert_eq!(instances.references(), before.as_slice());

        let mut visited = 0;
        instances.foreach_referenced_geometry(|_| visited += 1);
        assert_eq!(visited, 2);
    }

    #[test]
    fn test_position_attribute_follows_transform() {
        let mut instances = Instances::new();
        let handle = instances.add_reference(cloud(1));
        instances.add_instance(handle, Mat4::from_translation(Vec3::new(1.0, 2.0, 3.0)));
        instances.add_instance(handle, Mat4::from_scale(Vec3::splat(2.0)));

        {
            let positions = AttributeAccessor::new(&instances).lookup_typed::<Vec3>("position", None).unwrap();
            assert_eq!(positions.varray.to_vec(), vec![Vec3::new(1.0, 2.0, 3.0), Vec3::ZERO]);
        }
        {
            let mut attributes = MutableAttributeAccessor::new(&mut instances);
            let mut writer = attributes.lookup_for_write_typed::<Vec3>("position").unwrap();
            writer.varray.set(1, Vec3::Z);
            writer.finish();
        }
        assert_eq!(instances.transforms()[1].w_axis, Vec3::Z.extend(1.0));
        assert_eq!(instances.transforms()[1].x_axis.x, 2.0);
    }

    #[test]
    fn test_instance_attributes() {
        let mut instances = Instances::new();
        let handle = instances.add_reference(cloud(1));
        instances.add_instance(handle, Mat4::IDENTITY);
        {
            let mut attributes = MutableAttributeAccessor::new(&mut instances);
            assert!(attributes.add("scale", AttrDomain::Instance, DataType::Float, AttributeInit::Default));
            assert!(!attributes.add("scale", AttrDomain::Point, DataType::Float, AttributeInit::Default));
            assert!(attributes.lookup_for_write(".reference_index").is_none());
            assert!(attributes.contains(".reference_index"));
            let names: Vec<String> = attributes.ids().iter().map(ToString::to_string).collect();
            assert_eq!(names, vec!["position", "scale"]);
        }

        instances.add_instance(handle, Mat4::IDENTITY);
        assert_eq!(instances.data.typed::<f32>("scale").map(<[f32]>::len), Some(2));
    }

    #[test]
    fn test_component_emptiness() {
        let mut component = InstancesComponent::default();
        assert!(component.is_empty());
        let mut instances = Instances::new();
        let handle = instances.add_reference(cloud(1));
        component.replace(Some(Arc::new(instances.clone())), GeometryOwnershipType::Owned);
        assert!(component.is_empty());
        instances.add_instance(handle, Mat4::IDENTITY);
        component.replace(Some(Arc::new(instances)), GeometryOwnershipType::Owned);
        assert!(!component.is_empty());
        assert_eq!(component.attribute_domain_size(AttrDomain::Instance), 1);
    }
}
