//! Uniform attribute access over any geometry type.
//!
//! [`AttributeAccessor`] and [`MutableAttributeAccessor`] pair a borrowed
//! owner with its provider table. The table is static per owner type and is
//! reached through the [`AttributeOwner`] impl.

use tracing::debug;

use crate::util::{Error, Result};

use super::{
    AttrDomain, AttributeId, AttributeInit, AttributeMetaData, AttributeReader, AttributeType,
    AttributeWriter, ComponentAttributeProviders, DataType, GAttributeReader, GAttributeWriter,
    GVArray, VArray,
};

/// Geometry payload that exposes attributes.
pub trait AttributeOwner: Send + Sync + Sized + 'static {
    /// Static provider table of this type.
    fn attribute_providers() -> &'static ComponentAttributeProviders<Self>;

    /// Number of elements in `domain`, 0 if unsupported.
    fn attribute_domain_size(&self, domain: AttrDomain) -> usize;

    /// Interpolate values between domains. Only the identity by default.
    fn adapt_attribute_domain<'a>(
        &'a self,
        varray: GVArray<'a>,
        from: AttrDomain,
        to: AttrDomain,
    ) -> Option<GVArray<'a>> {
        (from == to).then_some(varray)
    }
}

/// Object-safe operations behind the accessors.
///
/// Blanket implemented for every [`AttributeOwner`].
pub trait AttributeAccessorFunctions: Send + Sync {
    fn owner_name(&self) -> &'static str;
    fn domain_size(&self, domain: AttrDomain) -> usize;
    fn domain_supported(&self, domain: AttrDomain) -> bool;
    fn adapt_domain<'a>(&'a self, varray: GVArray<'a>, from: AttrDomain, to: AttrDomain) -> Option<GVArray<'a>>;
    fn lookup<'a>(&'a self, id: &AttributeId) -> Option<GAttributeReader<'a>>;
    fn for_all(&self, callback: &mut dyn FnMut(&AttributeId, &AttributeMetaData) -> bool) -> bool;
    fn is_builtin(&self, id: &AttributeId) -> bool;
    fn lookup_for_write<'a>(&'a mut self, id: &AttributeId) -> Option<GAttributeWriter<'a>>;
    fn add(&mut self, id: &AttributeId, domain: AttrDomain, data_type: DataType, init: AttributeInit<'_>) -> bool;
    fn remove(&mut self, id: &AttributeId) -> bool;
}

impl<O: AttributeOwner> AttributeAccessorFunctions for O {
    fn owner_name(&self) -> &'static str {
        let full = std::any::type_name::<O>();
        full.rsplit("::").next().unwrap_or(full)
    }

    fn domain_size(&self, domain: AttrDomain) -> usize {
        self.attribute_domain_size(domain)
    }

    fn domain_supported(&self, domain: AttrDomain) -> bool {
        O::attribute_providers().supported_domains().contains(&domain)
    }

    fn adapt_domain<'a>(&'a self, varray: GVArray<'a>, from: AttrDomain, to: AttrDomain) -> Option<GVArray<'a>> {
        if !self.domain_supported(from) || !self.domain_supported(to) {
            return None;
        }
        self.adapt_attribute_domain(varray, from, to)
    }

    fn lookup<'a>(&'a self, id: &AttributeId) -> Option<GAttributeReader<'a>> {
        O::attribute_providers().lookup(self, id)
    }

    fn for_all(&self, callback: &mut dyn FnMut(&AttributeId, &AttributeMetaData) -> bool) -> bool {
        O::attribute_providers().for_all(self, callback)
    }

    fn is_builtin(&self, id: &AttributeId) -> bool {
        O::attribute_providers().is_builtin(id)
    }

    fn lookup_for_write<'a>(&'a mut self, id: &AttributeId) -> Option<GAttributeWriter<'a>> {
        O::attribute_providers().lookup_for_write(self, id)
    }

    fn add(&mut self, id: &AttributeId, domain: AttrDomain, data_type: DataType, init: AttributeInit<'_>) -> bool {
        O::attribute_providers().add(self, id, domain, data_type, init)
    }

    fn remove(&mut self, id: &AttributeId) -> bool {
        O::attribute_providers().remove(self, id)
    }
}

// ============================================================================
// Read access
// ============================================================================

/// Read access to the attributes of one geometry.
#[derive(Clone, Copy)]
pub struct AttributeAccessor<'a> {
    owner: &'a dyn AttributeAccessorFunctions,
}

impl<'a> AttributeAccessor<'a> {
    pub fn new(owner: &'a dyn AttributeAccessorFunctions) -> Self {
        Self { owner }
    }

    pub fn domain_size(&self, domain: AttrDomain) -> usize {
        self.owner.domain_size(domain)
    }

    pub fn domain_supported(&self, domain: AttrDomain) -> bool {
        self.owner.domain_supported(domain)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.lookup(name).is_some()
    }

    /// Values on the attribute's own domain.
    pub fn lookup(&self, name: &str) -> Option<GAttributeReader<'a>> {
        self.owner.lookup(&AttributeId::from(name))
    }

    /// Values interpolated onto `domain`.
    pub fn lookup_on(&self, name: &str, domain: AttrDomain) -> Option<GVArray<'a>> {
        let reader = self.lookup(name)?;
        self.adapt_domain(reader.varray, reader.domain, domain)
    }

    /// Typed values, converted if needed and optionally moved to `domain`.
    pub fn lookup_typed<T: AttributeType>(
        &self,
        name: &str,
        domain: Option<AttrDomain>,
    ) -> Option<AttributeReader<'a, T>> {
        let reader = self.lookup(name)?;
        let (varray, domain) = match domain {
            Some(domain) => (self.adapt_domain(reader.varray, reader.domain, domain)?, domain),
            None => (reader.varray, reader.domain),
        };
        Some(AttributeReader {
            varray: varray.convert::<T>(),
            domain,
        })
    }

    /// Typed values on `domain`, or `default` repeated when unavailable.
    pub fn lookup_or_default<T: AttributeType>(&self, name: &str, domain: AttrDomain, default: T) -> VArray<'a, T> {
        match self.lookup_typed::<T>(name, Some(domain)) {
            Some(reader) => reader.varray,
            None => VArray::from_single(default, self.domain_size(domain)),
        }
    }

    pub fn lookup_meta_data(&self, name: &str) -> Option<AttributeMetaData> {
        self.lookup(name).map(|reader| reader.meta_data())
    }

    /// Move values between domains. `None` if either domain is unsupported or
    /// no interpolation exists.
    pub fn adapt_domain(&self, varray: GVArray<'a>, from: AttrDomain, to: AttrDomain) -> Option<GVArray<'a>> {
        self.owner.adapt_domain(varray, from, to)
    }

    /// Visit every attribute; returns false if `callback` stopped early.
    pub fn for_all(&self, mut callback: impl FnMut(&AttributeId, &AttributeMetaData) -> bool) -> bool {
        self.owner.for_all(&mut callback)
    }

    /// Names of all attributes, internal ones excluded.
    pub fn ids(&self) -> Vec<AttributeId> {
        let mut ids = Vec::new();
        self.for_all(|id, _| {
            if !id.is_internal() {
                ids.push(id.clone());
            }
            true
        });
        ids
    }

    pub fn is_builtin(&self, name: &str) -> bool {
        self.owner.is_builtin(&AttributeId::from(name))
    }
}

// ============================================================================
// Write access
// ============================================================================

/// Read/write access to the attributes of one geometry.
pub struct MutableAttributeAccessor<'a> {
    owner: &'a mut dyn AttributeAccessorFunctions,
}

impl<'a> MutableAttributeAccessor<'a> {
    pub fn new(owner: &'a mut dyn AttributeAccessorFunctions) -> Self {
        Self { owner }
    }

    pub fn as_read(&self) -> AttributeAccessor<'_> {
        AttributeAccessor::new(&*self.owner)
    }

    pub fn domain_size(&self, domain: AttrDomain) -> usize {
        self.owner.domain_size(domain)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.as_read().contains(name)
    }

    pub fn lookup(&self, name: &str) -> Option<GAttributeReader<'_>> {
        self.owner.lookup(&AttributeId::from(name))
    }

    pub fn ids(&self) -> Vec<AttributeId> {
        self.as_read().ids()
    }

    pub fn is_builtin(&self, name: &str) -> bool {
        self.owner.is_builtin(&AttributeId::from(name))
    }

    pub fn lookup_for_write(&mut self, name: &str) -> Option<GAttributeWriter<'_>> {
        self.owner.lookup_for_write(&AttributeId::from(name))
    }

    pub fn lookup_for_write_typed<T: AttributeType>(&mut self, name: &str) -> Option<AttributeWriter<'_, T>> {
        self.lookup_for_write(name)?.typed::<T>()
    }

    /// Create an attribute. Returns false if it exists or can't be created.
    pub fn add(&mut self, name: &str, domain: AttrDomain, data_type: DataType, init: AttributeInit<'_>) -> bool {
        let added = self.owner.add(&AttributeId::from(name), domain, data_type, init);
        if !added {
            debug!(name, %domain, %data_type, owner = self.owner.owner_name(), "attribute not added");
        }
        added
    }

    /// Like [`add`](Self::add), reporting why creation failed.
    pub fn try_add(&mut self, name: &str, domain: AttrDomain, data_type: DataType, init: AttributeInit<'_>) -> Result<()> {
        if !self.owner.domain_supported(domain) {
            return Err(Error::DomainUnsupported {
                domain: domain.to_string(),
                component: self.owner.owner_name().to_owned(),
            });
        }
        if self.contains(name) {
            return Err(Error::AttributeExists(name.to_owned()));
        }
        if !self.add(name, domain, data_type, init) {
            return Err(Error::NotCreatable(name.to_owned()));
        }
        Ok(())
    }

    /// Delete an attribute. Returns false if it is missing or required.
    pub fn remove(&mut self, name: &str) -> bool {
        self.owner.remove(&AttributeId::from(name))
    }

    /// Like [`remove`](Self::remove), reporting why deletion failed.
    pub fn try_remove(&mut self, name: &str) -> Result<()> {
        if !self.contains(name) {
            return Err(Error::AttributeNotFound(name.to_owned()));
        }
        if !self.remove(name) {
            return Err(Error::NotDeletable(name.to_owned()));
        }
        Ok(())
    }

    /// Writer for an existing attribute with matching domain and type, or
    /// for a newly created one.
    pub fn lookup_or_add_for_write<T: AttributeType>(
        &mut self,
        name: &str,
        domain: AttrDomain,
        init: AttributeInit<'_>,
    ) -> Option<AttributeWriter<'_, T>> {
        let meta = self.as_read().lookup_meta_data(name);
        match meta {
            Some(meta) if meta.domain != domain || meta.data_type != T::DATA_TYPE => return None,
            Some(_) => {}
            None => {
                if !self.add(name, domain, T::DATA_TYPE, init) {
                    return None;
                }
            }
        }
        self.lookup_for_write_typed::<T>(name)
    }
}
