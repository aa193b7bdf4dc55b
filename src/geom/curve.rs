//! Curve payload and component.
//!
//! A [`CurveEval`] is a list of [`Spline`]s. Point attributes live on the
//! splines and are exposed as one flat array through segmented views; curve
//! attributes live in one [`CustomData`] on the curve.

use std::sync::{Arc, OnceLock};

use parking_lot::Mutex;
use tracing::{debug, error, warn};

use crate::attribute::{
    all_true_segments, mix_segments, AttrDomain, AttributeAccessor, AttributeId, AttributeInit,
    AttributeMetaData, AttributeOwner, AttributeType, BuiltinAttributeProvider, BuiltinInfo, ChangeListener,
    ColorGeometry4f, ComponentAttributeProviders, CustomData, CustomDataAttributeProvider, CustomDataOwner,
    DataType, DerivedArrayProvider, DynamicAttributesProvider, FinishCallback, GArray, GAttributeReader,
    GAttributeWriter, GVArray, GVMutableArray, MutableAttributeAccessor, OffsetIndices, SegmentedView,
    SegmentedViewMut, VArray, VArrayImpl, VMutableArray, VMutableArrayImpl,
};
use crate::util::{BBox3f, Error, Result, Vec2, Vec3};

use super::component::{
    component_common, ComponentKind, ComponentPayload, GeometryComponent, GeometryComponentType,
    PayloadComponent,
};
use super::spline::{EvalCache, Spline, SplineType};

// ============================================================================
// CurveEval
// ============================================================================

/// Multi-spline curve.
#[derive(Debug, Clone, Default)]
pub struct CurveEval {
    splines: Vec<Spline>,
    /// Curve domain layers, one element per spline.
    pub(crate) attributes: CustomData,
}

impl CurveEval {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a curve from splines, unifying their point layers.
    pub fn from_splines(splines: impl IntoIterator<Item = Spline>) -> Self {
        let mut curve = Self::new();
        for spline in splines {
            curve.add_spline(spline);
        }
        curve
    }

    pub fn splines(&self) -> &[Spline] {
        &self.splines
    }

    pub fn splines_mut(&mut self) -> &mut [Spline] {
        &mut self.splines
    }

    pub fn splines_num(&self) -> usize {
        self.splines.len()
    }

    /// Append a spline. Its point layers are made to match the existing ones
    /// and every curve layer grows by one default element.
    pub fn add_spline(&mut self, mut spline: Spline) {
        if let Some(first) = self.splines.first() {
            let signature = first.attributes.signature();
            let stale: Vec<AttributeId> = spline
                .attributes
                .layers()
                .iter()
                .filter(|layer| !signature.iter().any(|(id, ty)| *id == layer.id && *ty == layer.data.data_type()))
                .map(|layer| layer.id.clone())
                .collect();
            for id in stale {
                debug!(name = id.name(), "dropping point layer missing on the curve");
                spline.attributes.remove(id.name());
            }
            let size = spline.size();
            for (id, data_type) in signature {
                if !spline.attributes.contains(id.name()) {
                    spline.attributes.add_default(id, data_type, size);
                }
            }
        }
        self.splines.push(spline);
        self.attributes.resize(self.splines.len());
    }

    pub fn has_spline_with_type(&self, spline_type: SplineType) -> bool {
        self.splines.iter().any(|s| s.spline_type() == spline_type)
    }

    /// Offsets of each spline's first control point in the flat point domain.
    pub fn control_point_offsets(&self) -> OffsetIndices {
        OffsetIndices::from_counts(self.splines.iter().map(Spline::size))
    }

    pub fn total_control_point_num(&self) -> usize {
        self.splines.iter().map(Spline::size).sum()
    }

    /// Bounds of all evaluated positions.
    pub fn bounds(&self) -> Option<BBox3f> {
        self.splines
            .iter()
            .filter_map(Spline::bounds)
            .reduce(|a, b| a.union(&b))
    }

    pub fn mark_cache_invalid(&self) {
        for spline in &self.splines {
            spline.mark_cache_invalid();
        }
    }

    /// Check that every spline has the same point layers with the same types.
    pub fn validate_point_layers(&self) -> Result<()> {
        let Some(first) = self.splines.first() else {
            return Ok(());
        };
        let signature = first.attributes.signature();
        for (i, spline) in self.splines.iter().enumerate().skip(1) {
            let other = spline.attributes.signature();
            if other.len() != signature.len() {
                return Err(Error::LayerMismatch(format!(
                    "spline {i} has {} point layers, expected {}",
                    other.len(),
                    signature.len()
                )));
            }
            for (id, data_type) in &signature {
                if !other.iter().any(|(o_id, o_ty)| o_id == id && o_ty == data_type) {
                    return Err(Error::LayerMismatch(format!("spline {i} lacks layer '{id}' of type {data_type}")));
                }
            }
        }
        Ok(())
    }
}

// ============================================================================
// Storage access
// ============================================================================

impl CustomDataOwner for CurveEval {
    fn custom_data(&self, domain: AttrDomain) -> Option<&CustomData> {
        (domain == AttrDomain::Curve).then_some(&self.attributes)
    }

    fn custom_data_for_write(&mut self, domain: AttrDomain) -> Option<(&mut CustomData, &dyn ChangeListener)> {
        (domain == AttrDomain::Curve).then_some((&mut self.attributes, &() as &dyn ChangeListener))
    }

    fn custom_data_size(&self, domain: AttrDomain) -> usize {
        self.attribute_domain_size(domain)
    }
}

impl AttributeOwner for CurveEval {
    fn attribute_providers() -> &'static ComponentAttributeProviders<Self> {
        static PROVIDERS: OnceLock<ComponentAttributeProviders<CurveEval>> = OnceLock::new();
        PROVIDERS.get_or_init(create_attribute_providers)
    }

    fn attribute_domain_size(&self, domain: AttrDomain) -> usize {
        match domain {
            AttrDomain::Point => self.total_control_point_num(),
            AttrDomain::Curve => self.splines.len(),
            _ => 0,
        }
    }

    fn adapt_attribute_domain<'a>(
        &'a self,
        varray: GVArray<'a>,
        from: AttrDomain,
        to: AttrDomain,
    ) -> Option<GVArray<'a>> {
        if from == to {
            return Some(varray);
        }
        if varray.len() != self.attribute_domain_size(from) {
            warn!(%from, len = varray.len(), "attribute size does not match the curve domain");
            return None;
        }
        let offsets = self.control_point_offsets();
        let adapted = match (from, to) {
            (AttrDomain::Point, AttrDomain::Curve) => match varray {
                GVArray::Bool(v) => GVArray::Bool(VArray::from_vec(all_true_segments(&v, &offsets))),
                GVArray::Int8(v) => GVArray::Int8(VArray::from_vec(mix_segments(&v, &offsets))),
                GVArray::Int32(v) => GVArray::Int32(VArray::from_vec(mix_segments(&v, &offsets))),
                GVArray::Float(v) => GVArray::Float(VArray::from_vec(mix_segments(&v, &offsets))),
                GVArray::Float2(v) => GVArray::Float2(VArray::from_vec(mix_segments(&v, &offsets))),
                GVArray::Float3(v) => GVArray::Float3(VArray::from_vec(mix_segments(&v, &offsets))),
                GVArray::Color(v) => GVArray::Color(VArray::from_vec(mix_segments(&v, &offsets))),
            },
            (AttrDomain::Curve, AttrDomain::Point) => match varray {
                GVArray::Bool(v) => GVArray::Bool(curve_to_point(v, offsets)),
                GVArray::Int8(v) => GVArray::Int8(curve_to_point(v, offsets)),
                GVArray::Int32(v) => GVArray::Int32(curve_to_point(v, offsets)),
                GVArray::Float(v) => GVArray::Float(curve_to_point(v, offsets)),
                GVArray::Float2(v) => GVArray::Float2(curve_to_point(v, offsets)),
                GVArray::Float3(v) => GVArray::Float3(curve_to_point(v, offsets)),
                GVArray::Color(v) => GVArray::Color(curve_to_point(v, offsets)),
            },
            _ => return None,
        };
        Some(adapted)
    }
}

/// Broadcast each spline value to its points.
fn curve_to_point<T: AttributeType>(src: VArray<'_, T>, offsets: OffsetIndices) -> VArray<'_, T> {
    VArray::from_func(offsets.total_size(), move |i| src.get(offsets.segment_of(i)))
}

// ============================================================================
// Providers
// ============================================================================

fn splines(curve: &CurveEval) -> &[Spline] {
    &curve.splines
}

fn splines_for_write(curve: &mut CurveEval) -> (&mut [Spline], &dyn ChangeListener) {
    (&mut curve.splines, &())
}

/// Flat read view over one slice per spline.
fn point_varray<'a, T: AttributeType>(curve: &'a CurveEval, segments: Vec<Option<&'a [T]>>) -> VArray<'a, T> {
    match segments[..] {
        [Some(span)] => VArray::from_span(span),
        [None] => VArray::from_single(T::default(), curve.total_control_point_num()),
        _ => VArray::Segmented(SegmentedView::new(curve.control_point_offsets(), segments)),
    }
}

/// Flat write view over one slice per spline.
fn point_varray_mut<'a, T: AttributeType>(
    offsets: OffsetIndices,
    mut segments: Vec<Option<&'a mut [T]>>,
) -> VMutableArray<'a, T> {
    if segments.len() == 1 {
        if let Some(span) = segments.pop().flatten() {
            return VMutableArray::from_span(span);
        }
    }
    VMutableArray::Segmented(SegmentedViewMut::new(offsets, segments))
}

fn invalidate_all(caches: Vec<&EvalCache>) -> FinishCallback<'_> {
    FinishCallback::new(move || {
        for cache in caches {
            cache.invalidate();
        }
    })
}

/// Builtin per-point attribute stored as a spline field.
struct SplinePointProvider<T: AttributeType> {
    info: BuiltinInfo,
    get: fn(&Spline) -> &[T],
    get_for_write: fn(&mut Spline) -> (&mut [T], &EvalCache),
    invalidate: bool,
}

impl<T: AttributeType> SplinePointProvider<T> {
    fn read<'a>(&self, curve: &'a CurveEval) -> VArray<'a, T> {
        point_varray(curve, curve.splines.iter().map(|s| Some((self.get)(s))).collect())
    }

    fn write<'a>(&self, curve: &'a mut CurveEval) -> GAttributeWriter<'a> {
        let offsets = curve.control_point_offsets();
        let mut segments = Vec::with_capacity(curve.splines.len());
        let mut caches = Vec::with_capacity(curve.splines.len());
        for spline in &mut curve.splines {
            let (values, cache) = (self.get_for_write)(spline);
            segments.push(Some(values));
            caches.push(cache);
        }
        let finish = if self.invalidate {
            invalidate_all(caches)
        } else {
            FinishCallback::none()
        };
        GAttributeWriter::new(
            T::into_gvmutable(point_varray_mut(offsets, segments)),
            self.info.domain,
            finish,
        )
    }
}

impl<T: AttributeType> BuiltinAttributeProvider<CurveEval> for SplinePointProvider<T> {
    fn info(&self) -> &BuiltinInfo {
        &self.info
    }

    fn try_get_for_read<'a>(&self, curve: &'a CurveEval) -> Option<GVArray<'a>> {
        if !self.exists(curve) {
            return None;
        }
        Some(T::into_gvarray(self.read(curve)))
    }

    fn try_get_for_write<'a>(&self, curve: &'a mut CurveEval) -> Option<GAttributeWriter<'a>> {
        if !self.exists(curve) {
            return None;
        }
        Some(self.write(curve))
    }

    fn try_delete(&self, _curve: &mut CurveEval) -> bool {
        false
    }

    fn try_create(&self, _curve: &mut CurveEval, _init: AttributeInit<'_>) -> bool {
        false
    }

    fn exists(&self, curve: &CurveEval) -> bool {
        curve.total_control_point_num() != 0
    }
}

/// Positions; writes move Bezier handles along with their points.
struct PositionProvider {
    plain: SplinePointProvider<Vec3>,
}

/// Writable positions of a curve with at least one Bezier spline.
struct BezierPositions<'a> {
    splines: &'a mut [Spline],
    offsets: OffsetIndices,
}

impl BezierPositions<'_> {
    fn locate(&self, index: usize) -> (usize, usize) {
        let spline = self.offsets.segment_of(index);
        (spline, index - self.offsets.range(spline).start)
    }
}

impl VArrayImpl<Vec3> for BezierPositions<'_> {
    fn len(&self) -> usize {
        self.offsets.total_size()
    }

    fn get(&self, index: usize) -> Vec3 {
        let (spline, point) = self.locate(index);
        self.splines[spline].positions()[point]
    }
}

impl VMutableArrayImpl<Vec3> for BezierPositions<'_> {
    fn set(&mut self, index: usize, value: Vec3) {
        let (spline, point) = self.locate(index);
        self.splines[spline].move_point(point, value);
    }
}

impl BuiltinAttributeProvider<CurveEval> for PositionProvider {
    fn info(&self) -> &BuiltinInfo {
        &self.plain.info
    }

    fn try_get_for_read<'a>(&self, curve: &'a CurveEval) -> Option<GVArray<'a>> {
        self.plain.try_get_for_read(curve)
    }

    fn try_get_for_write<'a>(&self, curve: &'a mut CurveEval) -> Option<GAttributeWriter<'a>> {
        if !self.plain.exists(curve) {
            return None;
        }
        if !curve.has_spline_with_type(SplineType::Bezier) {
            return Some(self.plain.write(curve));
        }
        let offsets = curve.control_point_offsets();
        let varray = VMutableArray::from_impl(BezierPositions {
            splines: &mut curve.splines,
            offsets,
        });
        Some(GAttributeWriter::new(
            GVMutableArray::Float3(varray),
            AttrDomain::Point,
            FinishCallback::none(),
        ))
    }

    fn try_delete(&self, _curve: &mut CurveEval) -> bool {
        false
    }

    fn try_create(&self, _curve: &mut CurveEval, _init: AttributeInit<'_>) -> bool {
        false
    }

    fn exists(&self, curve: &CurveEval) -> bool {
        self.plain.exists(curve)
    }
}

/// Bezier handles. Non-Bezier splines read zero and ignore writes.
struct HandleProvider {
    info: BuiltinInfo,
    right: bool,
}

impl HandleProvider {
    fn handles<'a>(&self, spline: &'a Spline) -> Option<&'a [Vec3]> {
        if self.right {
            spline.handles_right()
        } else {
            spline.handles_left()
        }
    }
}

impl BuiltinAttributeProvider<CurveEval> for HandleProvider {
    fn info(&self) -> &BuiltinInfo {
        &self.info
    }

    fn try_get_for_read<'a>(&self, curve: &'a CurveEval) -> Option<GVArray<'a>> {
        if !self.exists(curve) {
            return None;
        }
        let segments = curve.splines.iter().map(|s| self.handles(s)).collect();
        Some(GVArray::Float3(point_varray(curve, segments)))
    }

    fn try_get_for_write<'a>(&self, curve: &'a mut CurveEval) -> Option<GAttributeWriter<'a>> {
        if !self.exists(curve) {
            return None;
        }
        let offsets = curve.control_point_offsets();
        let mut segments = Vec::with_capacity(curve.splines.len());
        let mut caches = Vec::with_capacity(curve.splines.len());
        for spline in &mut curve.splines {
            let (handles, cache) = spline.handles_for_write(self.right);
            segments.push(handles);
            caches.push(cache);
        }
        Some(GAttributeWriter::new(
            GVMutableArray::Float3(point_varray_mut(offsets, segments)),
            AttrDomain::Point,
            invalidate_all(caches),
        ))
    }

    fn try_delete(&self, _curve: &mut CurveEval) -> bool {
        false
    }

    fn try_create(&self, _curve: &mut CurveEval, _init: AttributeInit<'_>) -> bool {
        false
    }

    fn exists(&self, curve: &CurveEval) -> bool {
        curve.has_spline_with_type(SplineType::Bezier)
    }
}

/// Split `init` into per-spline layers named `id` on every spline.
fn create_point_attribute(curve: &mut CurveEval, id: &AttributeId, data_type: DataType, init: AttributeInit<'_>) -> bool {
    if curve.splines.is_empty() {
        return false;
    }
    if curve.splines.iter().any(|s| s.attributes.contains(id.name())) {
        return false;
    }
    let total = curve.total_control_point_num();
    if let Some(len) = init.len() {
        if len != total {
            warn!(name = id.name(), expected = total, actual = len, "attribute initializer has the wrong size");
            return false;
        }
    }
    let values = match init {
        AttributeInit::Default => None,
        AttributeInit::MoveArray(array) if array.data_type() == data_type => Some(array),
        AttributeInit::MoveArray(array) => {
            let mut converted = GArray::new(data_type, total);
            if converted.as_mutable().set_all_from_array(&array).is_err() {
                return false;
            }
            Some(converted)
        }
        AttributeInit::VArray(varray) => {
            let mut array = GArray::new(data_type, total);
            if array.as_mutable().set_all_from(&varray).is_err() {
                return false;
            }
            Some(array)
        }
    };
    let offsets = curve.control_point_offsets();
    match values {
        // A single spline adopts the buffer.
        Some(array) if curve.splines.len() == 1 => curve.splines[0].attributes.add(id.clone(), array),
        Some(array) => {
            let mut success = true;
            for (i, spline) in curve.splines.iter_mut().enumerate() {
                success &= spline.attributes.add(id.clone(), array.slice(offsets.range(i)));
            }
            success
        }
        None => {
            let mut success = true;
            for spline in &mut curve.splines {
                let size = spline.size();
                success &= spline.attributes.add_default(id.clone(), data_type, size);
            }
            success
        }
    }
}

fn remove_point_attribute(curve: &mut CurveEval, id: &AttributeId) -> bool {
    let mut removed = false;
    for spline in &mut curve.splines {
        removed |= spline.attributes.remove(id.name());
    }
    removed
}

/// Typed per-spline layer views, `None` if any spline lacks the layer.
fn typed_layers<'a, T: AttributeType>(curve: &'a CurveEval, id: &AttributeId) -> Option<VArray<'a, T>> {
    let spans: Option<Vec<&'a [T]>> = curve.splines.iter().map(|s| s.attributes.typed::<T>(id.name())).collect();
    Some(point_varray(curve, spans?.into_iter().map(Some).collect()))
}

fn typed_layers_mut<'a, T: AttributeType>(curve: &'a mut CurveEval, id: &AttributeId) -> Option<VMutableArray<'a, T>> {
    let offsets = curve.control_point_offsets();
    let spans: Option<Vec<&'a mut [T]>> = curve
        .splines
        .iter_mut()
        .map(|s| s.attributes.typed_mut::<T>(id.name()))
        .collect();
    Some(point_varray_mut(offsets, spans?.into_iter().map(Some).collect()))
}

fn report_layer_mismatch(curve: &CurveEval, id: &AttributeId) {
    let reason = curve
        .validate_point_layers()
        .err()
        .map_or_else(|| format!("layer '{id}' is inconsistent"), |e| e.to_string());
    error!(name = id.name(), %reason, "point layers differ between splines");
}

/// Builtin point attribute stored as a named per-spline layer.
struct SplineLayerProvider {
    info: BuiltinInfo,
}

impl BuiltinAttributeProvider<CurveEval> for SplineLayerProvider {
    fn info(&self) -> &BuiltinInfo {
        &self.info
    }

    fn try_get_for_read<'a>(&self, curve: &'a CurveEval) -> Option<GVArray<'a>> {
        if !self.exists(curve) {
            return None;
        }
        PointLayersProvider.try_get_for_read(curve, &AttributeId::from(self.info.name)).map(|r| r.varray)
    }

    fn try_get_for_write<'a>(&self, curve: &'a mut CurveEval) -> Option<GAttributeWriter<'a>> {
        if !self.exists(curve) {
            return None;
        }
        PointLayersProvider.try_get_for_write(curve, &AttributeId::from(self.info.name))
    }

    fn try_delete(&self, curve: &mut CurveEval) -> bool {
        self.info.deletable && remove_point_attribute(curve, &AttributeId::from(self.info.name))
    }

    fn try_create(&self, curve: &mut CurveEval, init: AttributeInit<'_>) -> bool {
        self.info.creatable
            && create_point_attribute(curve, &AttributeId::from(self.info.name), self.info.data_type, init)
    }

    fn exists(&self, curve: &CurveEval) -> bool {
        curve.total_control_point_num() != 0
            && curve
                .splines
                .first()
                .is_some_and(|s| s.attributes.contains(self.info.name))
    }
}

/// User point attributes stored on every spline.
struct PointLayersProvider;

impl DynamicAttributesProvider<CurveEval> for PointLayersProvider {
    fn try_get_for_read<'a>(&self, curve: &'a CurveEval, id: &AttributeId) -> Option<GAttributeReader<'a>> {
        let data_type = curve.splines.first()?.attributes.get(id.name())?.data_type();
        let varray = match data_type {
            DataType::Bool => typed_layers::<bool>(curve, id).map(GVArray::Bool),
            DataType::Int8 => typed_layers::<i8>(curve, id).map(GVArray::Int8),
            DataType::Int32 => typed_layers::<i32>(curve, id).map(GVArray::Int32),
            DataType::Float => typed_layers::<f32>(curve, id).map(GVArray::Float),
            DataType::Float2 => typed_layers::<Vec2>(curve, id).map(GVArray::Float2),
            DataType::Float3 => typed_layers::<Vec3>(curve, id).map(GVArray::Float3),
            DataType::Color => typed_layers::<ColorGeometry4f>(curve, id).map(GVArray::Color),
        };
        if varray.is_none() {
            report_layer_mismatch(curve, id);
        }
        Some(GAttributeReader {
            varray: varray?,
            domain: AttrDomain::Point,
        })
    }

    fn try_get_for_write<'a>(&self, curve: &'a mut CurveEval, id: &AttributeId) -> Option<GAttributeWriter<'a>> {
        let data_type = curve.splines.first()?.attributes.get(id.name())?.data_type();
        if curve.validate_point_layers().is_err() {
            report_layer_mismatch(curve, id);
            return None;
        }
        let varray = match data_type {
            DataType::Bool => typed_layers_mut::<bool>(curve, id).map(GVMutableArray::Bool),
            DataType::Int8 => typed_layers_mut::<i8>(curve, id).map(GVMutableArray::Int8),
            DataType::Int32 => typed_layers_mut::<i32>(curve, id).map(GVMutableArray::Int32),
            DataType::Float => typed_layers_mut::<f32>(curve, id).map(GVMutableArray::Float),
            DataType::Float2 => typed_layers_mut::<Vec2>(curve, id).map(GVMutableArray::Float2),
            DataType::Float3 => typed_layers_mut::<Vec3>(curve, id).map(GVMutableArray::Float3),
            DataType::Color => typed_layers_mut::<ColorGeometry4f>(curve, id).map(GVMutableArray::Color),
        }?;
        Some(GAttributeWriter::new(varray, AttrDomain::Point, FinishCallback::none()))
    }

    fn try_create(
        &self,
        curve: &mut CurveEval,
        id: &AttributeId,
        domain: AttrDomain,
        data_type: DataType,
        init: AttributeInit<'_>,
    ) -> bool {
        domain == AttrDomain::Point && create_point_attribute(curve, id, data_type, init)
    }

    fn try_delete(&self, curve: &mut CurveEval, id: &AttributeId) -> bool {
        remove_point_attribute(curve, id)
    }

    fn contains(&self, curve: &CurveEval, id: &AttributeId) -> bool {
        curve
            .splines
            .first()
            .is_some_and(|s| s.attributes.contains(id.name()))
    }

    fn foreach_attribute(
        &self,
        curve: &CurveEval,
        callback: &mut dyn FnMut(&AttributeId, &AttributeMetaData) -> bool,
    ) -> bool {
        let Some(first) = curve.splines.first() else {
            return true;
        };
        if let Err(err) = curve.validate_point_layers() {
            error!(%err, "point layers differ between splines");
        }
        // The first spline stands in for all of them.
        first.attributes.layers().iter().all(|layer| {
            callback(&layer.id, &AttributeMetaData::new(AttrDomain::Point, layer.data.data_type()))
        })
    }

    fn supported_domains(&self) -> &[AttrDomain] {
        &[AttrDomain::Point]
    }
}

fn create_attribute_providers() -> ComponentAttributeProviders<CurveEval> {
    let builtin: Vec<Box<dyn BuiltinAttributeProvider<CurveEval>>> = vec![
        Box::new(PositionProvider {
            plain: SplinePointProvider {
                info: BuiltinInfo::new("position", AttrDomain::Point, DataType::Float3),
                get: Spline::positions,
                get_for_write: Spline::positions_for_write,
                invalidate: true,
            },
        }),
        Box::new(SplineLayerProvider {
            info: BuiltinInfo::new("id", AttrDomain::Point, DataType::Int32).optional(),
        }),
        Box::new(SplinePointProvider {
            info: BuiltinInfo::new("radius", AttrDomain::Point, DataType::Float),
            get: Spline::radii,
            get_for_write: Spline::radii_for_write,
            invalidate: false,
        }),
        Box::new(SplinePointProvider {
            info: BuiltinInfo::new("tilt", AttrDomain::Point, DataType::Float),
            get: Spline::tilts,
            get_for_write: Spline::tilts_for_write,
            invalidate: true,
        }),
        Box::new(HandleProvider {
            info: BuiltinInfo::new("handle_left", AttrDomain::Point, DataType::Float3),
            right: false,
        }),
        Box::new(HandleProvider {
            info: BuiltinInfo::new("handle_right", AttrDomain::Point, DataType::Float3),
            right: true,
        }),
        Box::new(DerivedArrayProvider::new(
            BuiltinInfo::new("resolution", AttrDomain::Curve, DataType::Int32),
            splines,
            splines_for_write,
            Spline::resolution,
            Spline::set_resolution,
        )),
        Box::new(DerivedArrayProvider::new(
            BuiltinInfo::new("cyclic", AttrDomain::Curve, DataType::Bool),
            splines,
            splines_for_write,
            Spline::is_cyclic,
            Spline::set_cyclic,
        )),
    ];
    let dynamic: Vec<Box<dyn DynamicAttributesProvider<CurveEval>>> = vec![
        Box::new(CustomDataAttributeProvider::new(AttrDomain::Curve)),
        Box::new(PointLayersProvider),
    ];
    ComponentAttributeProviders::new(builtin, dynamic)
}

// ============================================================================
// Component
// ============================================================================

/// Flattened evaluated curve, built for drawing.
#[derive(Debug, Clone, PartialEq)]
pub struct CurveRenderData {
    pub positions: Vec<Vec3>,
    /// Evaluated point ranges per spline.
    pub offsets: OffsetIndices,
}

/// Component holding a [`CurveEval`].
#[derive(Debug, Default)]
pub struct CurveComponent {
    payload: ComponentPayload<CurveEval>,
    render_cache: Mutex<Option<Arc<CurveRenderData>>>,
}

impl CurveComponent {
    fn copy_component(&self) -> Self {
        Self {
            payload: self.payload.copy(),
            render_cache: Mutex::new(self.render_cache.lock().clone()),
        }
    }

    /// Evaluated curve for drawing, built once per payload version.
    pub fn render_data(&self) -> Option<Arc<CurveRenderData>> {
        let curve = self.payload.get()?;
        let mut cache = self.render_cache.lock();
        let data = cache.get_or_insert_with(|| {
            let evaluated: Vec<Arc<Vec<Vec3>>> = curve.splines().iter().map(Spline::evaluated_positions).collect();
            Arc::new(CurveRenderData {
                offsets: OffsetIndices::from_counts(evaluated.iter().map(|p| p.len())),
                positions: evaluated.iter().flat_map(|p| p.iter().copied()).collect(),
            })
        });
        Some(data.clone())
    }
}

impl ComponentKind for CurveComponent {
    const TYPE: GeometryComponentType = GeometryComponentType::Curve;
}

impl PayloadComponent for CurveComponent {
    type Payload = CurveEval;

    fn payload(&self) -> &ComponentPayload<CurveEval> {
        &self.payload
    }

    fn payload_mut(&mut self) -> &mut ComponentPayload<CurveEval> {
        &mut self.payload
    }

    fn on_write(&mut self) {
        *self.render_cache.get_mut() = None;
    }
}

impl GeometryComponent for CurveComponent {
    component_common!();

    fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }

    fn clear(&mut self) {
        self.on_write();
        self.payload.clear();
    }

    fn owns_direct_data(&self) -> bool {
        self.payload.owns_direct_data()
    }

    fn ensure_owns_direct_data(&mut self) {
        self.payload.ensure_owns_direct_data();
    }

    fn attributes(&self) -> Option<AttributeAccessor<'_>> {
        self.payload.get().map(|curve| AttributeAccessor::new(curve))
    }

    fn attributes_for_write(&mut self) -> Option<MutableAttributeAccessor<'_>> {
        self.get_for_write().map(|curve| MutableAttributeAccessor::new(curve))
    }

    fn is_builtin_attribute(&self, id: &AttributeId) -> bool {
        CurveEval::attribute_providers().is_builtin(id)
    }

    fn bounds(&self) -> Option<BBox3f> {
        self.payload.get().and_then(CurveEval::bounds)
    }
}
