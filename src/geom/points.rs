//! Point cloud payload and component.

use std::sync::OnceLock;

use crate::attribute::{
    AttrDomain, AttributeAccessor, AttributeId, AttributeOwner, BuiltinAttributeProvider,
    BuiltinCustomDataProvider, BuiltinInfo, ChangeListener, ComponentAttributeProviders, CustomData,
    CustomDataAttributeProvider, CustomDataOwner, DataType, DynamicAttributesProvider, GArray,
    MutableAttributeAccessor,
};
use crate::util::{BBox3f, Vec3};

use super::batch_cache::{BatchCache, BatchDirtyMode};
use super::component::{
    component_common, ComponentKind, ComponentPayload, GeometryComponent, GeometryComponentType,
    PayloadComponent,
};

/// Draw hooks of a point cloud.
#[derive(Debug, Clone, Default)]
pub(crate) struct PointCloudRuntime {
    batch_cache: BatchCache,
}

impl ChangeListener for PointCloudRuntime {
    fn attribute_changed(&self, name: &str) {
        if matches!(name, "position" | "radius") {
            self.batch_cache.tag_dirty(BatchDirtyMode::All);
        }
    }
}

/// Unconnected points. All data lives in point custom data layers.
#[derive(Debug, Clone, Default)]
pub struct PointCloud {
    points_num: usize,
    pub(crate) data: CustomData,
    runtime: PointCloudRuntime,
}

impl PointCloud {
    /// `points_num` points at the origin.
    pub fn new(points_num: usize) -> Self {
        let mut data = CustomData::new();
        data.add_default(AttributeId::from("position"), DataType::Float3, points_num);
        Self {
            points_num,
            data,
            runtime: PointCloudRuntime::default(),
        }
    }

    pub fn from_positions(positions: Vec<Vec3>) -> Self {
        let points_num = positions.len();
        let mut data = CustomData::new();
        data.add(AttributeId::from("position"), GArray::from_vec(positions));
        Self {
            points_num,
            data,
            runtime: PointCloudRuntime::default(),
        }
    }

    pub fn points_num(&self) -> usize {
        self.points_num
    }

    pub fn positions(&self) -> &[Vec3] {
        self.data.typed("position").unwrap_or_default()
    }

    pub fn positions_for_write(&mut self) -> &mut [Vec3] {
        self.runtime.attribute_changed("position");
        self.data.typed_mut("position").unwrap_or_default()
    }

    /// Per-point radii, if the layer exists.
    pub fn radii(&self) -> Option<&[f32]> {
        self.data.typed("radius")
    }

    /// Grow with default values or truncate every layer.
    pub fn resize(&mut self, points_num: usize) {
        self.points_num = points_num;
        self.data.resize(points_num);
        self.runtime.attribute_changed("position");
    }

    pub fn set_batch_cache(&mut self, batch_cache: BatchCache) {
        self.runtime.batch_cache = batch_cache;
    }

    pub fn free_batch_cache(&self) {
        self.runtime.batch_cache.free();
    }

    /// Bounds of all points, grown by their radii when present.
    pub fn bounds(&self) -> Option<BBox3f> {
        let positions = self.positions();
        match self.radii() {
            Some(radii) => {
                let mut bounds = BBox3f::EMPTY;
                for (&p, &r) in positions.iter().zip(radii) {
                    bounds.expand_by_sphere(p, r);
                }
                (!bounds.is_empty()).then_some(bounds)
            }
            None => BBox3f::from_points(positions),
        }
    }
}

impl CustomDataOwner for PointCloud {
    fn custom_data(&self, domain: AttrDomain) -> Option<&CustomData> {
        (domain == AttrDomain::Point).then_some(&self.data)
    }

    fn custom_data_for_write(&mut self, domain: AttrDomain) -> Option<(&mut CustomData, &dyn ChangeListener)> {
        if domain != AttrDomain::Point {
            return None;
        }
        Some((&mut self.data, &self.runtime))
    }

    fn custom_data_size(&self, domain: AttrDomain) -> usize {
        self.attribute_domain_size(domain)
    }
}

fn create_attribute_providers() -> ComponentAttributeProviders<PointCloud> {
    let builtin: Vec<Box<dyn BuiltinAttributeProvider<PointCloud>>> = vec![
        Box::new(BuiltinCustomDataProvider::tagged(BuiltinInfo::new(
            "position",
            AttrDomain::Point,
            DataType::Float3,
        ))),
        Box::new(BuiltinCustomDataProvider::tagged(
            BuiltinInfo::new("radius", AttrDomain::Point, DataType::Float).optional(),
        )),
        Box::new(BuiltinCustomDataProvider::new(
            BuiltinInfo::new("id", AttrDomain::Point, DataType::Int32).optional(),
        )),
    ];
    let dynamic: Vec<Box<dyn DynamicAttributesProvider<PointCloud>>> =
        vec![Box::new(CustomDataAttributeProvider::new(AttrDomain::Point))];
    ComponentAttributeProviders::new(builtin, dynamic)
}

impl AttributeOwner for PointCloud {
    fn attribute_providers() -> &'static ComponentAttributeProviders<Self> {
        static PROVIDERS: OnceLock<ComponentAttributeProviders<PointCloud>> = OnceLock::new();
        PROVIDERS.get_or_init(create_attribute_providers)
    }

    fn attribute_domain_size(&self, domain: AttrDomain) -> usize {
        if domain == AttrDomain::Point {
            self.points_num
        } else {
            0
        }
    }
}

/// Component holding a [`PointCloud`].
#[derive(Debug, Default)]
pub struct PointCloudComponent {
    payload: ComponentPayload<PointCloud>,
}

impl PointCloudComponent {
    fn copy_component(&self) -> Self {
        Self {
            payload: self.payload.copy(),
        }
    }
}

impl ComponentKind for PointCloudComponent {
    const TYPE: GeometryComponentType = GeometryComponentType::PointCloud;
}

impl PayloadComponent for PointCloudComponent {
    type Payload = PointCloud;

    fn payload(&self) -> &ComponentPayload<PointCloud> {
        &self.payload
    }

    fn payload_mut(&mut self) -> &mut ComponentPayload<PointCloud> {
        &mut self.payload
    }
}

impl GeometryComponent for PointCloudComponent {
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

    fn attributes(&self) -> Option<AttributeAccessor<'_>> {
        self.payload.get().map(|points| AttributeAccessor::new(points))
    }

    fn attributes_for_write(&mut self) -> Option<MutableAttributeAccessor<'_>> {
        self.get_for_write().map(|points| MutableAttributeAccessor::new(points))
    }

    fn is_builtin_attribute(&self, id: &AttributeId) -> bool {
        PointCloud::attribute_providers().is_builtin(id)
    }

    fn bounds(&self) -> Option<BBox3f> {
        self.payload.get().and_then(PointCloud::bounds)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::Ordering;
    use std::sync::Arc;

    use super::*;
    use crate::attribute::AttributeInit;
    use crate::geom::batch_cache::tests::CountingHooks;

    #[test]
    fn test_position_required() {
        let mut points = PointCloud::new(3);
        let mut attributes = MutableAttributeAccessor::new(&mut points);
        assert_eq!(attributes.domain_size(AttrDomain::Point), 3);
        assert!(attributes.contains("position"));
        assert!(!attributes.remove("position"));
        assert!(attributes.contains("position"));
        assert!(!attributes.add("position", AttrDomain::Point, DataType::Float3, AttributeInit::Default));
    }

    #[test]
    fn test_radius_bounds() {
        let mut points = PointCloud::from_positions(vec![Vec3::ZERO, Vec3::new(2.0, 0.0, 0.0)]);
        assert_eq!(points.bounds().unwrap().min, Vec3::ZERO);

        let radii = AttributeInit::MoveArray(GArray::from_vec(vec![0.5f32, 1.0]));
        assert!(MutableAttributeAccessor::new(&mut points).add("radius", AttrDomain::Point, DataType::Float, radii));
        let bounds = points.bounds().unwrap();
        assert_eq!(bounds.min, Vec3::splat(-1.0).with_x(-0.5));
        assert_eq!(bounds.max, Vec3::new(3.0, 1.0, 1.0));
        assert!(PointCloud::new(0).bounds().is_none());
    }

    #[test]
    fn test_position_writer_tags_batch_cache() {
        let hooks = Arc::new(CountingHooks::default());
        let mut points = PointCloud::new(2);
        points.set_batch_cache(BatchCache::new(hooks.clone()));
        {
            let mut attributes = MutableAttributeAccessor::new(&mut points);
            let mut writer = attributes.lookup_for_write_typed::<Vec3>("position").unwrap();
            writer.varray.set(0, Vec3::ONE);
            writer.finish();
        }
        assert_eq!(hooks.dirty_all.load(Ordering::Relaxed), 1);
        assert_eq!(points.positions()[0], Vec3::ONE);
    }

    #[test]
    fn test_custom_and_id_attributes() {
        let mut points = PointCloud::new(2);
        let mut attributes = MutableAttributeAccessor::new(&mut points);
        assert!(attributes.add("id", AttrDomain::Point, DataType::Int32, AttributeInit::Default));
        assert!(attributes.add("weight", AttrDomain::Point, DataType::Float, AttributeInit::Default));
        assert!(!attributes.add("weight", AttrDomain::Point, DataType::Float, AttributeInit::Default));
        assert!(!attributes.add("edge_thing", AttrDomain::Edge, DataType::Float, AttributeInit::Default));
        let names: Vec<String> = attributes.ids().iter().map(ToString::to_string).collect();
        assert_eq!(names, vec!["position", "id", "weight"]);
        assert!(attributes.remove("id"));
    }
}
