//! Geometry components and their shared-ownership handle.
//!
//! A component owns (or views) one payload of a given geometry type. It is
//! shared between geometry sets through [`ComponentHandle`], an `Arc` whose
//! strong count doubles as the mutability gate: a component is mutable only
//! while exactly one handle refers to it.

use std::any::Any;
use std::fmt;
use std::ops::Deref;
use std::sync::Arc;

use tracing::trace;

use crate::attribute::{AttrDomain, AttributeAccessor, AttributeId, MutableAttributeAccessor};
use crate::util::BBox3f;

use super::{
    CurveComponent, EditDataComponent, InstancesComponent, MeshComponent, PointCloudComponent,
    VolumeComponent,
};

// ============================================================================
// Component type
// ============================================================================

/// Kind of geometry held by a component. Doubles as a dense slot index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum GeometryComponentType {
    Mesh,
    Curve,
    PointCloud,
    Volume,
    Instances,
    EditData,
}

impl GeometryComponentType {
    /// Number of component types.
    pub const COUNT: usize = 6;

    /// All types in slot order.
    pub const ALL: [GeometryComponentType; Self::COUNT] = [
        GeometryComponentType::Mesh,
        GeometryComponentType::Curve,
        GeometryComponentType::PointCloud,
        GeometryComponentType::Volume,
        GeometryComponentType::Instances,
        GeometryComponentType::EditData,
    ];

    /// Slot index in a geometry set.
    #[inline]
    pub const fn index(self) -> usize {
        self as usize
    }

    /// Human readable name.
    pub fn name(self) -> &'static str {
        match self {
            GeometryComponentType::Mesh => "Mesh",
            GeometryComponentType::Curve => "Curve",
            GeometryComponentType::PointCloud => "PointCloud",
            GeometryComponentType::Volume => "Volume",
            GeometryComponentType::Instances => "Instances",
            GeometryComponentType::EditData => "EditData",
        }
    }
}

impl fmt::Display for GeometryComponentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ============================================================================
// Payload ownership
// ============================================================================

/// How a component relates to its payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GeometryOwnershipType {
    /// The component owns the payload.
    #[default]
    Owned,
    /// Someone else frees the payload, but the component may edit it.
    ///
    /// Edits happen in place only while the component holds the sole `Arc`.
    /// If the external owner still keeps a clone, the first write copies the
    /// payload and the owner's data stays unchanged.
    Editable,
    /// The payload must not be changed; writing copies it first.
    ReadOnly,
}

/// Nullable payload pointer plus its ownership tag.
///
/// Payload data is shared through an `Arc`, so copying a component is cheap
/// and the data is only duplicated on the first write.
#[derive(Debug)]
pub struct ComponentPayload<T> {
    data: Option<Arc<T>>,
    ownership: GeometryOwnershipType,
}

impl<T> Default for ComponentPayload<T> {
    fn default() -> Self {
        Self {
            data: None,
            ownership: GeometryOwnershipType::Owned,
        }
    }
}

impl<T> Clone for ComponentPayload<T> {
    fn clone(&self) -> Self {
        Self {
            data: self.data.clone(),
            ownership: self.ownership,
        }
    }
}

impl<T: Clone> ComponentPayload<T> {
    pub fn new(data: Arc<T>, ownership: GeometryOwnershipType) -> Self {
        Self {
            data: Some(data),
            ownership,
        }
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.data.is_none()
    }

    #[inline]
    pub fn ownership(&self) -> GeometryOwnershipType {
        self.ownership
    }

    /// The payload, never copied.
    #[inline]
    pub fn get(&self) -> Option<&T> {
        self.data.as_deref()
    }

    /// The shared pointer, for identity checks.
    #[inline]
    pub fn arc(&self) -> Option<&Arc<T>> {
        self.data.as_ref()
    }

    /// Mutable payload. Read-only data is copied and becomes owned; data
    /// shared with other handles, including an editable payload still held
    /// by its external owner, is copied by `Arc::make_mut`.
    pub fn get_for_write(&mut self) -> Option<&mut T> {
        let data = self.data.as_mut()?;
        if self.ownership == GeometryOwnershipType::ReadOnly {
            trace!("copying read-only payload for write");
            *data = Arc::new(T::clone(data));
            self.ownership = GeometryOwnershipType::Owned;
        }
        Some(Arc::make_mut(data))
    }

    /// Drop the payload.
    pub fn clear(&mut self) {
        self.data = None;
        self.ownership = GeometryOwnershipType::Owned;
    }

    /// Clear, then adopt `data`.
    pub fn replace(&mut self, data: Option<Arc<T>>, ownership: GeometryOwnershipType) {
        self.clear();
        self.data = data;
        self.ownership = ownership;
    }

    /// Hand the payload back to the caller and clear.
    pub fn release(&mut self) -> Option<Arc<T>> {
        self.ownership = GeometryOwnershipType::Owned;
        self.data.take()
    }

    /// Payload for a copied component: shared data, owned tag.
    pub fn copy(&self) -> Self {
        Self {
            data: self.data.clone(),
            ownership: GeometryOwnershipType::Owned,
        }
    }

    pub fn owns_direct_data(&self) -> bool {
        self.ownership == GeometryOwnershipType::Owned
    }

    /// Take a private copy of data owned elsewhere.
    pub fn ensure_owns_direct_data(&mut self) {
        if self.ownership == GeometryOwnershipType::Owned {
            return;
        }
        if let Some(data) = self.data.as_mut() {
            *data = Arc::new(T::clone(data));
        }
        self.ownership = GeometryOwnershipType::Owned;
    }
}

// ============================================================================
// Component trait
// ============================================================================

/// One piece of typed geometry inside a geometry set.
pub trait GeometryComponent: Send + Sync + fmt::Debug + 'static {
    fn component_type(&self) -> GeometryComponentType;

    /// New component of the same type sharing the payload, tagged as owned.
    fn copy(&self) -> Box<dyn GeometryComponent>;

    fn is_empty(&self) -> bool;

    /// Drop the payload. Requires a mutable component.
    fn clear(&mut self);

    /// Whether the payload is owned by this component. Instance contents are
    /// not considered.
    fn owns_direct_data(&self) -> bool;

    fn ensure_owns_direct_data(&mut self);

    /// Attribute access, `None` if unsupported or no payload.
    fn attributes(&self) -> Option<AttributeAccessor<'_>> {
        None
    }

    fn attributes_for_write(&mut self) -> Option<MutableAttributeAccessor<'_>> {
        None
    }

    /// Whether `id` names a builtin attribute of this component type.
    ///
    /// Answers for the type, so an empty component gives the same result.
    fn is_builtin_attribute(&self, _id: &AttributeId) -> bool {
        false
    }

    /// Elements in `domain`, 0 when empty or unsupported.
    fn attribute_domain_size(&self, domain: AttrDomain) -> usize {
        self.attributes().map_or(0, |attributes| attributes.domain_size(domain))
    }

    /// Bounds of the payload, excluding instances.
    fn bounds(&self) -> Option<BBox3f> {
        None
    }

    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

/// Static type tag of a concrete component.
pub trait ComponentKind: GeometryComponent + Default {
    const TYPE: GeometryComponentType;
}

/// Component that wraps a single [`ComponentPayload`].
pub trait PayloadComponent: ComponentKind {
    type Payload: Clone + Send + Sync + 'static;

    fn payload(&self) -> &ComponentPayload<Self::Payload>;
    fn payload_mut(&mut self) -> &mut ComponentPayload<Self::Payload>;

    /// Called before the payload is handed out for writing.
    fn on_write(&mut self) {}

    /// Payload for reading. Never copies.
    fn get_for_read(&self) -> Option<&Self::Payload> {
        self.payload().get()
    }

    /// Payload for writing. Copies read-only or shared data first.
    fn get_for_write(&mut self) -> Option<&mut Self::Payload> {
        self.on_write();
        self.payload_mut().get_for_write()
    }

    /// Clear, then adopt `data`.
    fn replace(&mut self, data: Option<Arc<Self::Payload>>, ownership: GeometryOwnershipType) {
        self.on_write();
        self.payload_mut().replace(data, ownership);
    }

    /// Hand the payload to the caller and clear.
    fn release(&mut self) -> Option<Arc<Self::Payload>> {
        self.on_write();
        self.payload_mut().release()
    }

    fn ownership(&self) -> GeometryOwnershipType {
        self.payload().ownership()
    }
}

/// Implements the bookkeeping part of [`GeometryComponent`].
macro_rules! component_common {
    () => {
        fn component_type(&self) -> GeometryComponentType {
            <Self as ComponentKind>::TYPE
        }

        fn copy(&self) -> Box<dyn GeometryComponent> {
            Box::new(self.copy_component())
        }

        fn as_any(&self) -> &dyn std::any::Any {
            self
        }

        fn as_any_mut(&mut self) -> &mut dyn std::any::Any {
            self
        }
    };
}

pub(crate) use component_common;

/// Fresh, empty component of the given type.
pub fn create_component(component_type: GeometryComponentType) -> Box<dyn GeometryComponent> {
    match component_type {
        GeometryComponentType::Mesh => Box::new(MeshComponent::default()),
        GeometryComponentType::Curve => Box::new(CurveComponent::default()),
        GeometryComponentType::PointCloud => Box::new(PointCloudComponent::default()),
        GeometryComponentType::Volume => Box::new(VolumeComponent::default()),
        GeometryComponentType::Instances => Box::new(InstancesComponent::default()),
        GeometryComponentType::EditData => Box::new(EditDataComponent::default()),
    }
}

// ============================================================================
// Handle
// ============================================================================

/// Shared, reference-counted component.
///
/// Cloning bumps the count. The component is mutable through the handle only
/// while the count is one.
#[derive(Clone)]
pub struct ComponentHandle(Arc<dyn GeometryComponent>);

impl ComponentHandle {
    pub fn new(component: impl GeometryComponent) -> Self {
        Self(Arc::new(component))
    }

    pub fn from_box(component: Box<dyn GeometryComponent>) -> Self {
        Self(Arc::from(component))
    }

    /// Number of handles sharing the component.
    #[inline]
    pub fn users(&self) -> usize {
        Arc::strong_count(&self.0)
    }

    #[inline]
    pub fn is_mutable(&self) -> bool {
        self.users() <= 1
    }

    /// Mutable access if this is the only handle.
    pub fn get_mut(&mut self) -> Option<&mut dyn GeometryComponent> {
        Arc::get_mut(&mut self.0)
    }

    /// Replace the component by a private copy unless already exclusive,
    /// then return it mutably.
    pub fn make_mut(&mut self) -> &mut dyn GeometryComponent {
        if !self.is_mutable() {
            trace!(component = %self.component_type(), users = self.users(), "copy-on-write");
            *self = Self::from_box(self.0.copy());
        }
        match Arc::get_mut(&mut self.0) {
            Some(component) => component,
            None => unreachable!("component handle is exclusive after copy"),
        }
    }

    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    pub fn downcast_ref<T: ComponentKind>(&self) -> Option<&T> {
        self.0.as_any().downcast_ref::<T>()
    }
}

impl Deref for ComponentHandle {
    type Target = dyn GeometryComponent;

    fn deref(&self) -> &Self::Target {
        &*self.0
    }
}

impl fmt::Debug for ComponentHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComponentHandle")
            .field("type", &self.component_type())
            .field("users", &self.users())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geom::PointCloud;

    #[test]
    fn test_type_index_order() {
        for (i, ty) in GeometryComponentType::ALL.iter().enumerate() {
            assert_eq!(ty.index(), i);
            assert_eq!(create_component(*ty).component_type(), *ty);
        }
    }

    #[test]
    fn test_payload_read_only_copies_on_write() {
        let shared = Arc::new(vec![1, 2, 3]);
        let mut payload = ComponentPayload::new(shared.clone(), GeometryOwnershipType::ReadOnly);
        assert!(!payload.owns_direct_data());
        payload.get_for_write().unwrap().push(4);
        assert_eq!(*shared, vec![1, 2, 3]);
        assert_eq!(payload.get(), Some(&vec![1, 2, 3, 4]));
        assert_eq!(payload.ownership(), GeometryOwnershipType::Owned);
    }

    #[test]
    fn test_payload_editable_writes_in_place_when_unique() {
        let mut payload = ComponentPayload::new(Arc::new(vec![1]), GeometryOwnershipType::Editable);
        let before = payload.arc().map(Arc::as_ptr).unwrap();
        payload.get_for_write().unwrap().push(2);
        assert_eq!(payload.arc().map(Arc::as_ptr), Some(before));
        assert_eq!(payload.ownership(), GeometryOwnershipType::Editable);

        // The external owner keeps a clone: the write goes to a private copy.
        let external = Arc::new(vec![1]);
        let mut payload = ComponentPayload::new(external.clone(), GeometryOwnershipType::Editable);
        payload.get_for_write().unwrap().push(2);
        assert_eq!(*external, vec![1]);
        assert_eq!(payload.get(), Some(&vec![1, 2]));
        assert!(!Arc::ptr_eq(payload.arc().unwrap(), &external));
        assert_eq!(payload.ownership(), GeometryOwnershipType::Editable);
    }

    #[test]
    fn test_payload_release_and_clear() {
        let mut payload = ComponentPayload::new(Arc::new(5u32), GeometryOwnershipType::Editable);
        let released = payload.release();
        assert_eq!(released.as_deref(), Some(&5));
        assert!(payload.is_empty());
        payload.replace(Some(Arc::new(7)), GeometryOwnershipType::ReadOnly);
        payload.ensure_owns_direct_data();
        assert!(payload.owns_direct_data());
        payload.clear();
        assert!(payload.get().is_none());
    }

    #[test]
    fn test_handle_make_mut_copies_when_shared() {
        let mut component = PointCloudComponent::default();
        component.replace(Some(Arc::new(PointCloud::new(2))), GeometryOwnershipType::Owned);
        let mut a = ComponentHandle::new(component);
        let b = a.clone();
        assert_eq!(a.users(), 2);
        assert!(!a.is_mutable());
        assert!(a.get_mut().is_none());

        a.make_mut();
        assert!(a.is_mutable());
        assert!(b.is_mutable());
        assert!(!a.ptr_eq(&b));
        assert!(a.downcast_ref::<PointCloudComponent>().is_some());
    }
}
