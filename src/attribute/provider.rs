//! Attribute providers.
//!
//! A provider implements lookup, creation and removal for one builtin
//! attribute or for a whole class of user attributes on one geometry type.
//! [`ComponentAttributeProviders`] composes them into the table that backs an
//! [`AttributeAccessor`](super::AttributeAccessor).

use std::collections::HashSet;

use smallvec::SmallVec;
use tracing::{debug, trace, warn};

use crate::util::{Error, Result};

use super::{
    AttrDomain, AttributeId, AttributeInit, AttributeMetaData, AttributeType, CustomData, DataType,
    GArray, GVArray, GVMutableArray, VArray, VMutableArray,
};

// ============================================================================
// Change notification
// ============================================================================

/// Receives "attribute changed" notifications after a writer finishes.
///
/// Payloads implement this on the part that holds derived caches, so the
/// notification can run while the attribute storage itself is borrowed.
pub trait ChangeListener: Sync {
    fn attribute_changed(&self, name: &str);
}

impl ChangeListener for () {
    fn attribute_changed(&self, _name: &str) {}
}

/// Callback that runs once when a writer is finished or dropped.
#[derive(Default)]
pub struct FinishCallback<'a>(Option<Box<dyn FnOnce() + 'a>>);

impl<'a> FinishCallback<'a> {
    pub fn new(callback: impl FnOnce() + 'a) -> Self {
        Self(Some(Box::new(callback)))
    }

    pub fn none() -> Self {
        Self(None)
    }

    /// Notify `listener` that `name` changed.
    pub fn tag(listener: &'a dyn ChangeListener, name: &'a str) -> Self {
        Self::new(move || listener.attribute_changed(name))
    }

    fn run(&mut self) {
        if let Some(callback) = self.0.take() {
            callback();
        }
    }

    fn cancel(&mut self) {
        self.0 = None;
    }
}

impl Drop for FinishCallback<'_> {
    fn drop(&mut self) {
        if self.0.is_some() {
            trace!("attribute writer dropped without finish()");
        }
        self.run();
    }
}

// ============================================================================
// Readers and writers
// ============================================================================

/// Generic attribute values plus their domain.
#[derive(Debug, Clone)]
pub struct GAttributeReader<'a> {
    pub varray: GVArray<'a>,
    pub domain: AttrDomain,
}

impl GAttributeReader<'_> {
    pub fn meta_data(&self) -> AttributeMetaData {
        AttributeMetaData::new(self.domain, self.varray.data_type())
    }
}

/// Typed attribute values plus their domain.
#[derive(Debug, Clone)]
pub struct AttributeReader<'a, T: AttributeType> {
    pub varray: VArray<'a, T>,
    pub domain: AttrDomain,
}

/// Mutable generic attribute values.
///
/// Call [`finish`](Self::finish) after the last write; dropping the writer
/// runs the same callback.
pub struct GAttributeWriter<'a> {
    pub varray: GVMutableArray<'a>,
    pub domain: AttrDomain,
    finish: FinishCallback<'a>,
}

impl<'a> GAttributeWriter<'a> {
    pub fn new(varray: GVMutableArray<'a>, domain: AttrDomain, finish: FinishCallback<'a>) -> Self {
        Self { varray, domain, finish }
    }

    pub fn finish(mut self) {
        self.finish.run();
    }

    /// Typed writer, `None` if the data type differs.
    pub fn typed<T: AttributeType>(self) -> Option<AttributeWriter<'a, T>> {
        self.try_typed().ok()
    }

    pub fn try_typed<T: AttributeType>(self) -> Result<AttributeWriter<'a, T>> {
        let GAttributeWriter { varray, domain, mut finish } = self;
        match T::from_gvmutable(varray) {
            Ok(varray) => Ok(AttributeWriter { varray, domain, finish }),
            Err(other) => {
                finish.cancel();
                Err(Error::mismatch(T::DATA_TYPE, other.data_type()))
            }
        }
    }
}

/// Mutable typed attribute values.
pub struct AttributeWriter<'a, T: AttributeType> {
    pub varray: VMutableArray<'a, T>,
    pub domain: AttrDomain,
    finish: FinishCallback<'a>,
}

impl<T: AttributeType> AttributeWriter<'_, T> {
    pub fn finish(mut self) {
        self.finish.run();
    }
}

// ============================================================================
// Provider traits
// ============================================================================

/// Fixed properties of a builtin attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BuiltinInfo {
    pub name: &'static str,
    pub domain: AttrDomain,
    pub data_type: DataType,
    pub creatable: bool,
    pub deletable: bool,
    pub writable: bool,
}

impl BuiltinInfo {
    /// Writable attribute that always exists.
    pub const fn new(name: &'static str, domain: AttrDomain, data_type: DataType) -> Self {
        Self {
            name,
            domain,
            data_type,
            creatable: false,
            deletable: false,
            writable: true,
        }
    }

    /// Optional attribute that callers may add and remove.
    pub const fn optional(mut self) -> Self {
        self.creatable = true;
        self.deletable = true;
        self
    }

    pub const fn read_only(mut self) -> Self {
        self.writable = false;
        self
    }

    pub fn meta_data(&self) -> AttributeMetaData {
        AttributeMetaData::new(self.domain, self.data_type)
    }
}

/// One attribute with a reserved name and fixed domain and type.
pub trait BuiltinAttributeProvider<O>: Send + Sync {
    fn info(&self) -> &BuiltinInfo;
    fn try_get_for_read<'a>(&self, owner: &'a O) -> Option<GVArray<'a>>;
    fn try_get_for_write<'a>(&self, owner: &'a mut O) -> Option<GAttributeWriter<'a>>;
    fn try_delete(&self, owner: &mut O) -> bool;
    fn try_create(&self, owner: &mut O, init: AttributeInit<'_>) -> bool;
    fn exists(&self, owner: &O) -> bool;
}

/// User attributes with arbitrary names.
pub trait DynamicAttributesProvider<O>: Send + Sync {
    fn try_get_for_read<'a>(&self, owner: &'a O, id: &AttributeId) -> Option<GAttributeReader<'a>>;
    fn try_get_for_write<'a>(&self, owner: &'a mut O, id: &AttributeId) -> Option<GAttributeWriter<'a>>;
    fn try_create(
        &self,
        owner: &mut O,
        id: &AttributeId,
        domain: AttrDomain,
        data_type: DataType,
        init: AttributeInit<'_>,
    ) -> bool;
    fn try_delete(&self, owner: &mut O, id: &AttributeId) -> bool;
    fn contains(&self, owner: &O, id: &AttributeId) -> bool;
    /// Stops and returns false as soon as `callback` does.
    fn foreach_attribute(
        &self,
        owner: &O,
        callback: &mut dyn FnMut(&AttributeId, &AttributeMetaData) -> bool,
    ) -> bool;
    fn supported_domains(&self) -> &[AttrDomain];
}

// ============================================================================
// Provider table
// ============================================================================

/// All providers of one geometry type.
pub struct ComponentAttributeProviders<O> {
    builtin: Vec<Box<dyn BuiltinAttributeProvider<O>>>,
    dynamic: Vec<Box<dyn DynamicAttributesProvider<O>>>,
    domains: SmallVec<[AttrDomain; 4]>,
}

impl<O> ComponentAttributeProviders<O> {
    pub fn new(
        builtin: Vec<Box<dyn BuiltinAttributeProvider<O>>>,
        dynamic: Vec<Box<dyn DynamicAttributesProvider<O>>>,
    ) -> Self {
        let mut domains: SmallVec<[AttrDomain; 4]> = SmallVec::new();
        let all = builtin
            .iter()
            .map(|p| p.info().domain)
            .chain(dynamic.iter().flat_map(|p| p.supported_domains().iter().copied()));
        for domain in all {
            if !domains.contains(&domain) {
                domains.push(domain);
            }
        }
        Self { builtin, dynamic, domains }
    }

    pub fn supported_domains(&self) -> &[AttrDomain] {
        &self.domains
    }

    pub fn builtin(&self, name: &str) -> Option<&dyn BuiltinAttributeProvider<O>> {
        self.builtin
            .iter()
            .find(|p| p.info().name == name)
            .map(|p| p.as_ref())
    }

    pub fn is_builtin(&self, id: &AttributeId) -> bool {
        self.builtin(id.name()).is_some()
    }

    pub fn lookup<'a>(&self, owner: &'a O, id: &AttributeId) -> Option<GAttributeReader<'a>> {
        if let Some(provider) = self.builtin(id.name()) {
            let domain = provider.info().domain;
            return provider
                .try_get_for_read(owner)
                .map(|varray| GAttributeReader { varray, domain });
        }
        self.dynamic.iter().find_map(|p| p.try_get_for_read(owner, id))
    }

    pub fn lookup_for_write<'a>(&self, owner: &'a mut O, id: &AttributeId) -> Option<GAttributeWriter<'a>> {
        if let Some(provider) = self.builtin(id.name()) {
            return provider.try_get_for_write(owner);
        }
        let provider = self.dynamic.iter().find(|p| p.contains(owner, id))?;
        provider.try_get_for_write(owner, id)
    }

    pub fn add(
        &self,
        owner: &mut O,
        id: &AttributeId,
        domain: AttrDomain,
        data_type: DataType,
        init: AttributeInit<'_>,
    ) -> bool {
        if let Some(provider) = self.builtin(id.name()) {
            let info = provider.info();
            if info.domain != domain || info.data_type != data_type {
                debug!(name = id.name(), %domain, %data_type, "builtin attribute has a different layout");
                return false;
            }
            return provider.try_create(owner, init);
        }
        if self.dynamic.iter().any(|p| p.contains(owner, id)) {
            return false;
        }
        for provider in &self.dynamic {
            if provider.try_create(owner, id, domain, data_type, init.clone()) {
                return true;
            }
        }
        false
    }

    pub fn remove(&self, owner: &mut O, id: &AttributeId) -> bool {
        if let Some(provider) = self.builtin(id.name()) {
            return provider.try_delete(owner);
        }
        let mut success = false;
        for provider in &self.dynamic {
            success |= provider.try_delete(owner, id);
        }
        success
    }

    /// Visit every attribute once; builtins first. Returns false if stopped early.
    pub fn for_all(
        &self,
        owner: &O,
        callback: &mut dyn FnMut(&AttributeId, &AttributeMetaData) -> bool,
    ) -> bool {
        let mut handled: HashSet<AttributeId> = HashSet::new();
        for provider in &self.builtin {
            if !provider.exists(owner) {
                continue;
            }
            let info = provider.info();
            let id = AttributeId::from(info.name);
            if !callback(&id, &info.meta_data()) {
                return false;
            }
            handled.insert(id);
        }
        for provider in &self.dynamic {
            let keep_going = provider.foreach_attribute(owner, &mut |id: &AttributeId, meta: &AttributeMetaData| {
                if handled.insert(id.clone()) {
                    callback(id, meta)
                } else {
                    true
                }
            });
            if !keep_going {
                return false;
            }
        }
        true
    }
}

// ============================================================================
// Custom data backed providers
// ============================================================================

/// Payload that stores attributes as [`CustomData`] layers per domain.
pub trait CustomDataOwner: Send + Sync + 'static {
    fn custom_data(&self, domain: AttrDomain) -> Option<&CustomData>;
    /// Layers for writing, plus the listener for change notifications.
    fn custom_data_for_write(&mut self, domain: AttrDomain) -> Option<(&mut CustomData, &dyn ChangeListener)>;
    fn custom_data_size(&self, domain: AttrDomain) -> usize;
}

/// Add a layer of `size` elements initialized from `init`.
pub(crate) fn create_layer(
    data: &mut CustomData,
    id: &AttributeId,
    data_type: DataType,
    size: usize,
    init: AttributeInit<'_>,
) -> bool {
    if data.contains(id.name()) {
        return false;
    }
    if let Some(len) = init.len() {
        if len != size {
            warn!(name = id.name(), expected = size, actual = len, "attribute initializer has the wrong size");
            return false;
        }
    }
    let array = match init {
        AttributeInit::Default => GArray::new(data_type, size),
        AttributeInit::MoveArray(array) if array.data_type() == data_type => array,
        AttributeInit::MoveArray(array) => {
            let mut converted = GArray::new(data_type, size);
            if converted.as_mutable().set_all_from_array(&array).is_err() {
                return false;
            }
            converted
        }
        AttributeInit::VArray(varray) => {
            let mut array = GArray::new(data_type, size);
            if array.as_mutable().set_all_from(&varray).is_err() {
                return false;
            }
            array
        }
    };
    data.add(id.clone(), array)
}

/// Builtin attribute stored as a named custom data layer.
pub struct BuiltinCustomDataProvider {
    info: BuiltinInfo,
    tag_changes: bool,
}

impl BuiltinCustomDataProvider {
    pub fn new(info: BuiltinInfo) -> Self {
        Self { info, tag_changes: false }
    }

    /// Notify the owner's [`ChangeListener`] when values change.
    pub fn tagged(info: BuiltinInfo) -> Self {
        Self { info, tag_changes: true }
    }
}

impl<O: CustomDataOwner> BuiltinAttributeProvider<O> for BuiltinCustomDataProvider {
    fn info(&self) -> &BuiltinInfo {
        &self.info
    }

    fn try_get_for_read<'a>(&self, owner: &'a O) -> Option<GVArray<'a>> {
        let layer = owner.custom_data(self.info.domain)?.get(self.info.name)?;
        (layer.data_type() == self.info.data_type).then(|| layer.as_varray())
    }

    fn try_get_for_write<'a>(&self, owner: &'a mut O) -> Option<GAttributeWriter<'a>> {
        if !self.info.writable {
            return None;
        }
        let name = self.info.name;
        let (data, listener) = owner.custom_data_for_write(self.info.domain)?;
        let layer = data.get_mut(name)?;
        if layer.data_type() != self.info.data_type {
            return None;
        }
        let finish = if self.tag_changes {
            FinishCallback::tag(listener, name)
        } else {
            FinishCallback::none()
        };
        Some(GAttributeWriter::new(layer.as_mutable(), self.info.domain, finish))
    }

    fn try_delete(&self, owner: &mut O) -> bool {
        if !self.info.deletable {
            return false;
        }
        let Some((data, listener)) = owner.custom_data_for_write(self.info.domain) else {
            return false;
        };
        if !data.remove(self.info.name) {
            return false;
        }
        if self.tag_changes {
            listener.attribute_changed(self.info.name);
        }
        true
    }

    fn try_create(&self, owner: &mut O, init: AttributeInit<'_>) -> bool {
        if !self.info.creatable {
            return false;
        }
        let size = owner.custom_data_size(self.info.domain);
        let tag = self.tag_changes && !matches!(init, AttributeInit::Default);
        let Some((data, listener)) = owner.custom_data_for_write(self.info.domain) else {
            return false;
        };
        let id = AttributeId::from(self.info.name);
        if !create_layer(data, &id, self.info.data_type, size, init) {
            return false;
        }
        if tag {
            listener.attribute_changed(self.info.name);
        }
        true
    }

    fn exists(&self, owner: &O) -> bool {
        owner
            .custom_data(self.info.domain)
            .is_some_and(|data| data.contains(self.info.name))
    }
}

/// User attributes on one domain, stored as custom data layers.
pub struct CustomDataAttributeProvider {
    domains: [AttrDomain; 1],
}

impl CustomDataAttributeProvider {
    pub fn new(domain: AttrDomain) -> Self {
        Self { domains: [domain] }
    }

    #[inline]
    fn domain(&self) -> AttrDomain {
        self.domains[0]
    }
}

impl<O: CustomDataOwner> DynamicAttributesProvider<O> for CustomDataAttributeProvider {
    fn try_get_for_read<'a>(&self, owner: &'a O, id: &AttributeId) -> Option<GAttributeReader<'a>> {
        let layer = owner.custom_data(self.domain())?.get(id.name())?;
        Some(GAttributeReader {
            varray: layer.as_varray(),
            domain: self.domain(),
        })
    }

    fn try_get_for_write<'a>(&self, owner: &'a mut O, id: &AttributeId) -> Option<GAttributeWriter<'a>> {
        let domain = self.domain();
        let (data, _) = owner.custom_data_for_write(domain)?;
        let layer = data.get_mut(id.name())?;
        Some(GAttributeWriter::new(layer.as_mutable(), domain, FinishCallback::none()))
    }

    fn try_create(
        &self,
        owner: &mut O,
        id: &AttributeId,
        domain: AttrDomain,
        data_type: DataType,
        init: AttributeInit<'_>,
    ) -> bool {
        if domain != self.domain() {
            return false;
        }
        let size = owner.custom_data_size(domain);
        let Some((data, _)) = owner.custom_data_for_write(domain) else {
            return false;
        };
        create_layer(data, id, data_type, size, init)
    }

    fn try_delete(&self, owner: &mut O, id: &AttributeId) -> bool {
        owner
            .custom_data_for_write(self.domain())
            .is_some_and(|(data, _)| data.remove(id.name()))
    }

    fn contains(&self, owner: &O, id: &AttributeId) -> bool {
        owner
            .custom_data(self.domain())
            .is_some_and(|data| data.contains(id.name()))
    }

    fn foreach_attribute(
        &self,
        owner: &O,
        callback: &mut dyn FnMut(&AttributeId, &AttributeMetaData) -> bool,
    ) -> bool {
        let Some(data) = owner.custom_data(self.domain()) else {
            return true;
        };
        data.layers().iter().all(|layer| {
            callback(&layer.id, &AttributeMetaData::new(self.domain(), layer.data.data_type()))
        })
    }

    fn supported_domains(&self) -> &[AttrDomain] {
        &self.domains
    }
}

// ============================================================================
// Derived and computed providers
// ============================================================================

/// Builtin attribute projected from a field of a struct array.
///
/// Used when the payload stores elements as structs (vertices, faces, splines)
/// rather than as one array per attribute.
pub struct DerivedArrayProvider<O, S, T> {
    info: BuiltinInfo,
    data: fn(&O) -> &[S],
    data_for_write: fn(&mut O) -> (&mut [S], &dyn ChangeListener),
    get: fn(&S) -> T,
    set: fn(&mut S, T),
    tag_changes: bool,
}

impl<O, S, T> DerivedArrayProvider<O, S, T> {
    pub fn new(
        info: BuiltinInfo,
        data: fn(&O) -> &[S],
        data_for_write: fn(&mut O) -> (&mut [S], &dyn ChangeListener),
        get: fn(&S) -> T,
        set: fn(&mut S, T),
    ) -> Self {
        Self {
            info,
            data,
            data_for_write,
            get,
            set,
            tag_changes: false,
        }
    }

    /// Notify the owner's listener when a writer finishes.
    pub fn tagged(mut self) -> Self {
        self.tag_changes = true;
        self
    }
}

impl<O, S, T> BuiltinAttributeProvider<O> for DerivedArrayProvider<O, S, T>
where
    S: Send + Sync + 'static,
    T: AttributeType,
{
    fn info(&self) -> &BuiltinInfo {
        &self.info
    }

    fn try_get_for_read<'a>(&self, owner: &'a O) -> Option<GVArray<'a>> {
        let data = (self.data)(owner);
        Some(T::into_gvarray(VArray::from_derived_span(data, self.get)))
    }

    fn try_get_for_write<'a>(&self, owner: &'a mut O) -> Option<GAttributeWriter<'a>> {
        if !self.info.writable {
            return None;
        }
        let (data, listener) = (self.data_for_write)(owner);
        let varray = VMutableArray::from_derived_span(data, self.get, self.set);
        let finish = if self.tag_changes {
            FinishCallback::tag(listener, self.info.name)
        } else {
            FinishCallback::none()
        };
        Some(GAttributeWriter::new(T::into_gvmutable(varray), self.info.domain, finish))
    }

    fn try_delete(&self, _owner: &mut O) -> bool {
        false
    }

    fn try_create(&self, _owner: &mut O, _init: AttributeInit<'_>) -> bool {
        false
    }

    fn exists(&self, _owner: &O) -> bool {
        true
    }
}

/// Read-only builtin attribute computed on demand.
pub struct ComputedProvider<O, T: AttributeType> {
    info: BuiltinInfo,
    compute: fn(&O) -> VArray<'_, T>,
    exists: Option<fn(&O) -> bool>,
}

impl<O, T: AttributeType> ComputedProvider<O, T> {
    pub fn new(info: BuiltinInfo, compute: fn(&O) -> VArray<'_, T>) -> Self {
        Self {
            info: info.read_only(),
            compute,
            exists: None,
        }
    }

    /// Only report the attribute while `exists` holds.
    pub fn with_exists(mut self, exists: fn(&O) -> bool) -> Self {
        self.exists = Some(exists);
        self
    }
}

impl<O, T: AttributeType> BuiltinAttributeProvider<O> for ComputedProvider<O, T> {
    fn info(&self) -> &BuiltinInfo {
        &self.info
    }

    fn try_get_for_read<'a>(&self, owner: &'a O) -> Option<GVArray<'a>> {
        if !BuiltinAttributeProvider::exists(self, owner) {
            return None;
        }
        Some(T::into_gvarray((self.compute)(owner)))
    }

    fn try_get_for_write<'a>(&self, _owner: &'a mut O) -> Option<GAttributeWriter<'a>> {
        None
    }

    fn try_delete(&self, _owner: &mut O) -> bool {
        false
    }

    fn try_create(&self, _owner: &mut O, _init: AttributeInit<'_>) -> bool {
        false
    }

    fn exists(&self, owner: &O) -> bool {
        self.exists.map_or(true, |exists| exists(owner))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    #[derive(Default)]
    struct Counter(AtomicUsize);

    impl ChangeListener for Counter {
        fn attribute_changed(&self, _name: &str) {
            self.0.fetch_add(1, Ordering::Relaxed);
        }
    }

    #[derive(Default)]
    struct Points {
        data: CustomData,
        size: usize,
        changes: Counter,
    }

    impl CustomDataOwner for Points {
        fn custom_data(&self, domain: AttrDomain) -> Option<&CustomData> {
            (domain == AttrDomain::Point).then_some(&self.data)
        }

        fn custom_data_for_write(&mut self, domain: AttrDomain) -> Option<(&mut CustomData, &dyn ChangeListener)> {
            if domain != AttrDomain::Point {
                return None;
            }
            Some((&mut self.data, &self.changes))
        }

        fn custom_data_size(&self, domain: AttrDomain) -> usize {
            if domain == AttrDomain::Point { self.size } else { 0 }
        }
    }

    fn providers() -> ComponentAttributeProviders<Points> {
        ComponentAttributeProviders::new(
            vec![
                Box::new(BuiltinCustomDataProvider::tagged(BuiltinInfo::new(
                    "position",
                    AttrDomain::Point,
                    DataType::Float3,
                ))),
                Box::new(BuiltinCustomDataProvider::new(
                    BuiltinInfo::new("radius", AttrDomain::Point, DataType::Float).optional(),
                )),
            ],
            vec![Box::new(CustomDataAttributeProvider::new(AttrDomain::Point))],
        )
    }

    fn points(size: usize) -> Points {
        let mut p = Points { size, ..Default::default() };
        p.data.add_default("position".into(), DataType::Float3, size);
        p
    }

    #[test]
    fn test_builtin_rules() {
        let providers = providers();
        let mut owner = points(2);
        let position = AttributeId::from("position");
        assert!(providers.is_builtin(&position));
        assert!(!providers.remove(&mut owner, &position));
        assert!(!providers.add(&mut owner, &"radius".into(), AttrDomain::Point, DataType::Int32, AttributeInit::Default));
        assert!(providers.add(&mut owner, &"radius".into(), AttrDomain::Point, DataType::Float, AttributeInit::Default));
        assert!(providers.remove(&mut owner, &"radius".into()));
        assert_eq!(providers.supported_domains(), &[AttrDomain::Point]);
    }

    #[test]
    fn test_writer_finish_tags_once() {
        let providers = providers();
        let mut owner = points(2);
        {
            let writer = providers.lookup_for_write(&mut owner, &"position".into()).unwrap();
            let mut writer = writer.typed::<crate::util::Vec3>().unwrap();
            writer.varray.set(1, crate::util::Vec3::X);
            writer.finish();
        }
        assert_eq!(owner.changes.0.load(Ordering::Relaxed), 1);
        let values = owner.data.typed::<crate::util::Vec3>("position").unwrap();
        assert_eq!(values[1], crate::util::Vec3::X);
    }

    #[test]
    fn test_dynamic_and_for_all_dedup() {
        let providers = providers();
        let mut owner = points(3);
        let init = AttributeInit::MoveArray(GArray::from_vec(vec![1.0f32, 2.0, 3.0]));
        assert!(providers.add(&mut owner, &"weight".into(), AttrDomain::Point, DataType::Float, init));
        assert!(!providers.add(&mut owner, &"weight".into(), AttrDomain::Point, DataType::Float, AttributeInit::Default));

        let mut names = Vec::new();
        providers.for_all(&owner, &mut |id: &AttributeId, _: &AttributeMetaData| {
            names.push(id.to_string());
            true
        });
        assert_eq!(names, vec!["position", "weight"]);

        let reader = providers.lookup(&owner, &"weight".into()).unwrap();
        assert_eq!(reader.varray.convert::<f32>().to_vec(), vec![1.0, 2.0, 3.0]);
    }

    #[test]
    fn test_wrong_size_initializer() {
        let providers = providers();
        let mut owner = points(3);
        let init = AttributeInit::MoveArray(GArray::from_vec(vec![1i32]));
        assert!(!providers.add(&mut owner, &"id".into(), AttrDomain::Point, DataType::Int32, init));
        assert!(providers.lookup(&owner, &"id".into()).is_none());
    }

    #[test]
    fn test_typed_mismatch_cancels_finish() {
        let providers = providers();
        let mut owner = points(1);
        let writer = providers.lookup_for_write(&mut owner, &"position".into()).unwrap();
        assert!(matches!(writer.try_typed::<f32>(), Err(Error::TypeMismatch { .. })));
        assert_eq!(owner.changes.0.load(Ordering::Relaxed), 0);
    }
}
