//! Polygon mesh payload and component.
//!
//! A [`Mesh`] stores its topology as struct arrays (vertices, edges, faces,
//! corners) plus one [`CustomData`] per domain for everything else. Face
//! normals and bounds are cached lazily and dropped when positions change.

use std::collections::HashMap;
use std::ops::Range;
use std::sync::Arc;

use bytemuck::{Pod, Zeroable};
use parking_lot::Mutex;
use tracing::trace;

use crate::attribute::{
    AttributeAccessor, AttributeId, AttributeOwner, ChangeListener, CustomData,
    MutableAttributeAccessor,
};
use crate::util::{BBox3f, Vec3};

use super::batch_cache::{BatchCache, BatchDirtyMode};
use super::component::{
    component_common, ComponentKind, ComponentPayload, GeometryComponent, GeometryComponentType,
    PayloadComponent,
};

// ============================================================================
// Elements
// ============================================================================

/// Mesh vertex.
#[derive(Debug, Clone, Copy, Default, PartialEq, Pod, Zeroable)]
#[repr(C)]
pub struct MeshVert {
    pub co: Vec3,
}

/// Mesh edge between two vertices.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MeshEdge {
    pub v1: u32,
    pub v2: u32,
    /// Subdivision crease, 0..=255 mapped to 0..=1.
    pub crease: u8,
}

/// Mesh face, a run of corners.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MeshFace {
    pub loop_start: u32,
    pub loop_count: u32,
    pub material_index: i16,
    pub smooth: bool,
}

/// Face corner: the vertex it uses and the edge to the next corner.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MeshCorner {
    pub vert: u32,
    pub edge: u32,
}

/// Weight of one vertex in one vertex group.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DeformWeight {
    pub group: u32,
    pub weight: f32,
}

// ============================================================================
// Runtime caches
// ============================================================================

/// Derived data, rebuilt on demand.
#[derive(Default)]
pub(crate) struct MeshRuntime {
    face_normals: Mutex<Option<Arc<Vec<Vec3>>>>,
    bounds: Mutex<Option<Option<BBox3f>>>,
    batch_cache: BatchCache,
}

impl MeshRuntime {
    fn clear_geometry_caches(&self) {
        *self.face_normals.lock() = None;
        *self.bounds.lock() = None;
    }
}

impl Clone for MeshRuntime {
    fn clone(&self) -> Self {
        Self {
            face_normals: Mutex::new(self.face_normals.lock().clone()),
            bounds: Mutex::new(*self.bounds.lock()),
            batch_cache: self.batch_cache.clone(),
        }
    }
}

impl std::fmt::Debug for MeshRuntime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MeshRuntime")
            .field("normals_cached", &self.face_normals.lock().is_some())
            .field("bounds_cached", &self.bounds.lock().is_some())
            .field("batch_cache", &self.batch_cache)
            .finish()
    }
}

impl ChangeListener for MeshRuntime {
    fn attribute_changed(&self, name: &str) {
        match name {
            "position" => {
                self.clear_geometry_caches();
                self.batch_cache.tag_dirty(BatchDirtyMode::All);
            }
            "material_index" | "shade_smooth" => self.batch_cache.tag_dirty(BatchDirtyMode::Shading),
            _ => {}
        }
    }
}

// ============================================================================
// Mesh
// ============================================================================

/// Polygon mesh.
#[derive(Debug, Clone, Default)]
pub struct Mesh {
    pub(crate) verts: Vec<MeshVert>,
    pub(crate) edges: Vec<MeshEdge>,
    pub(crate) faces: Vec<MeshFace>,
    pub(crate) corners: Vec<MeshCorner>,
    pub(crate) vert_data: CustomData,
    pub(crate) edge_data: CustomData,
    pub(crate) face_data: CustomData,
    pub(crate) corner_data: CustomData,
    pub(crate) vertex_group_names: Vec<String>,
    /// Per-vertex group weights. Empty until a weight is written.
    pub(crate) deform_verts: Vec<Vec<DeformWeight>>,
    pub(crate) runtime: MeshRuntime,
}

impl Mesh {
    /// Create an empty mesh.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a mesh from vertex positions and face vertex lists.
    ///
    /// Edges are created for every distinct vertex pair used by a face.
    pub fn from_polygons<I, P>(positions: &[Vec3], polygons: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: AsRef<[u32]>,
    {
        let mut mesh = Self {
            verts: positions.iter().map(|&co| MeshVert { co }).collect(),
            ..Default::default()
        };
        let mut edge_lookup: HashMap<(u32, u32), u32> = HashMap::new();
        for polygon in polygons {
            let polygon = polygon.as_ref();
            let loop_start = mesh.corners.len() as u32;
            for (i, &vert) in polygon.iter().enumerate() {
                let next = polygon[(i + 1) % polygon.len()];
                let key = (vert.min(next), vert.max(next));
                let edges = &mut mesh.edges;
                let edge = *edge_lookup.entry(key).or_insert_with(|| {
                    edges.push(MeshEdge { v1: key.0, v2: key.1, crease: 0 });
                    edges.len() as u32 - 1
                });
                mesh.corners.push(MeshCorner { vert, edge });
            }
            mesh.faces.push(MeshFace {
                loop_start,
                loop_count: polygon.len() as u32,
                ..Default::default()
            });
        }
        mesh
    }

    /// Number of vertices.
    pub fn verts_num(&self) -> usize {
        self.verts.len()
    }

    /// Number of edges.
    pub fn edges_num(&self) -> usize {
        self.edges.len()
    }

    /// Number of faces.
    pub fn faces_num(&self) -> usize {
        self.faces.len()
    }

    /// Number of face corners.
    pub fn corners_num(&self) -> usize {
        self.corners.len()
    }

    pub fn verts(&self) -> &[MeshVert] {
        &self.verts
    }

    pub fn edges(&self) -> &[MeshEdge] {
        &self.edges
    }

    pub fn faces(&self) -> &[MeshFace] {
        &self.faces
    }

    pub fn corners(&self) -> &[MeshCorner] {
        &self.corners
    }

    /// Vertex positions.
    pub fn positions(&self) -> &[Vec3] {
        bytemuck::cast_slice(&self.verts)
    }

    /// Vertex positions for writing. Derived caches are dropped up front.
    pub fn positions_for_write(&mut self) -> &mut [Vec3] {
        self.tag_positions_changed();
        bytemuck::cast_slice_mut(&mut self.verts)
    }

    /// Corner range of a face.
    #[inline]
    pub fn face_corners(&self, face: usize) -> Range<usize> {
        let f = &self.faces[face];
        let start = f.loop_start as usize;
        start..start + f.loop_count as usize
    }

    /// Face index of every corner.
    pub fn corner_to_face_map(&self) -> Vec<usize> {
        let mut map = vec![0; self.corners.len()];
        for face in 0..self.faces.len() {
            for corner in self.face_corners(face) {
                map[corner] = face;
            }
        }
        map
    }

    /// Per-face normals, computed with Newell's method and cached.
    pub fn face_normals(&self) -> Arc<Vec<Vec3>> {
        let mut cache = self.runtime.face_normals.lock();
        if let Some(normals) = cache.as_ref() {
            return normals.clone();
        }
        trace!(faces = self.faces.len(), "computing face normals");
        let positions = self.positions();
        let normals: Vec<Vec3> = (0..self.faces.len())
            .map(|face| {
                let corners = &self.corners[self.face_corners(face)];
                let mut normal = Vec3::ZERO;
                for (i, corner) in corners.iter().enumerate() {
                    let a = positions[corner.vert as usize];
                    let b = positions[corners[(i + 1) % corners.len()].vert as usize];
                    normal += a.cross(b);
                }
                normal.normalize_or_zero()
            })
            .collect();
        let normals = Arc::new(normals);
        *cache = Some(normals.clone());
        normals
    }

    /// Bounds of the vertex positions, cached. `None` without vertices.
    pub fn bounds(&self) -> Option<BBox3f> {
        *self
            .runtime
            .bounds
            .lock()
            .get_or_insert_with(|| BBox3f::from_points(self.positions()))
    }

    /// Drop caches that depend on positions and notify the draw cache.
    pub fn tag_positions_changed(&self) {
        self.runtime.attribute_changed("position");
    }

    /// Install draw cache hooks.
    pub fn set_batch_cache(&mut self, batch_cache: BatchCache) {
        self.runtime.batch_cache = batch_cache;
    }

    /// Release draw data held for this mesh.
    pub fn free_batch_cache(&self) {
        self.runtime.batch_cache.free();
    }

    // ------------------------------------------------------------------------
    // Vertex groups
    // ------------------------------------------------------------------------

    /// Names of the vertex groups, in index order.
    pub fn vertex_group_names(&self) -> &[String] {
        &self.vertex_group_names
    }

    pub fn vertex_group_index(&self, name: &str) -> Option<usize> {
        self.vertex_group_names.iter().position(|n| n == name)
    }

    /// Add an empty vertex group. Returns false if the name is taken.
    pub fn add_vertex_group(&mut self, name: &str) -> bool {
        if self.vertex_group_index(name).is_some() {
            return false;
        }
        self.vertex_group_names.push(name.to_owned());
        true
    }

    /// Remove a vertex group and its weights. Higher group indices shift down.
    pub fn remove_vertex_group(&mut self, name: &str) -> bool {
        let Some(index) = self.vertex_group_index(name) else {
            return false;
        };
        self.vertex_group_names.remove(index);
        let index = index as u32;
        for weights in &mut self.deform_verts {
            weights.retain(|w| w.group != index);
            for w in weights.iter_mut() {
                if w.group > index {
                    w.group -= 1;
                }
            }
        }
        true
    }

    /// Weight of `vert` in `group`, 0 when unassigned.
    pub fn vertex_weight(&self, vert: usize, group: usize) -> f32 {
        self.deform_verts
            .get(vert)
            .and_then(|weights| weights.iter().find(|w| w.group as usize == group))
            .map_or(0.0, |w| w.weight)
    }

    /// Per-vertex weights for writing, allocated on first use.
    pub(crate) fn deform_verts_for_write(&mut self) -> &mut [Vec<DeformWeight>] {
        if self.deform_verts.len() != self.verts.len() {
            self.deform_verts.resize_with(self.verts.len(), Vec::new);
        }
        &mut self.deform_verts
    }
}

// ============================================================================
// Component
// ============================================================================

/// Component holding a [`Mesh`].
#[derive(Debug, Default)]
pub struct MeshComponent {
    payload: ComponentPayload<Mesh>,
}

impl MeshComponent {
    fn copy_component(&self) -> Self {
        Self {
            payload: self.payload.copy(),
        }
    }
}

impl ComponentKind for MeshComponent {
    const TYPE: GeometryComponentType = GeometryComponentType::Mesh;
}

impl PayloadComponent for MeshComponent {
    type Payload = Mesh;

    fn payload(&self) -> &ComponentPayload<Mesh> {
        &self.payload
    }

    fn payload_mut(&mut self) -> &mut ComponentPayload<Mesh> {
        &mut self.payload
    }
}

impl GeometryComponent for MeshComponent {
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
        self.payload.get().map(|mesh| AttributeAccessor::new(mesh))
    }

    fn attributes_for_write(&mut self) -> Option<MutableAttributeAccessor<'_>> {
        self.get_for_write().map(|mesh| MutableAttributeAccessor::new(mesh))
    }

    fn is_builtin_attribute(&self, id: &AttributeId) -> bool {
        Mesh::attribute_providers().is_builtin(id)
    }

    fn bounds(&self) -> Option<BBox3f> {
        self.payload.get().and_then(Mesh::bounds)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::sync::atomic::Ordering;

    use super::*;
    use crate::geom::batch_cache::tests::CountingHooks;

    pub(crate) fn quad_and_triangle() -> Mesh {
        let positions = [
            Vec3::new(0.0, 0.0, 0.0),
            Vec3::new(1.0, 0.0, 0.0),
            Vec3::new(1.0, 1.0, 0.0),
            Vec3::new(0.0, 1.0, 0.0),
            Vec3::new(2.0, 0.0, 0.0),
        ];
        Mesh::from_polygons(&positions, [vec![0, 1, 2, 3], vec![1, 4, 2]])
    }

    #[test]
    fn test_from_polygons_topology() {
        let mesh = quad_and_triangle();
        assert_eq!(mesh.verts_num(), 5);
        assert_eq!(mesh.faces_num(), 2);
        assert_eq!(mesh.corners_num(), 7);
        // The quad and the triangle share edge 1-2.
        assert_eq!(mesh.edges_num(), 6);
        assert_eq!(mesh.face_corners(1), 4..7);
        assert_eq!(mesh.corner_to_face_map(), vec![0, 0, 0, 0, 1, 1, 1]);
    }

    #[test]
    fn test_normals_and_bounds_cache() {
        let mut mesh = quad_and_triangle();
        let normals = mesh.face_normals();
        assert_eq!(normals[0], Vec3::Z);
        assert_eq!(normals[1], Vec3::Z);
        let bounds = mesh.bounds().unwrap();
        assert_eq!(bounds.max, Vec3::new(2.0, 1.0, 0.0));

        mesh.positions_for_write()[4] = Vec3::new(3.0, 0.0, 0.0);
        assert_eq!(mesh.bounds().unwrap().max.x, 3.0);
    }

    #[test]
    fn test_batch_cache_tagged_on_position_change() {
        let hooks = Arc::new(CountingHooks::default());
        let mut mesh = quad_and_triangle();
        mesh.set_batch_cache(BatchCache::new(hooks.clone()));
        mesh.positions_for_write();
        mesh.free_batch_cache();
        assert_eq!(hooks.dirty_all.load(Ordering::Relaxed), 1);
        assert_eq!(hooks.freed.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn test_vertex_groups() {
        let mut mesh = quad_and_triangle();
        assert!(mesh.add_vertex_group("a"));
        assert!(mesh.add_vertex_group("b"));
        assert!(!mesh.add_vertex_group("a"));
        mesh.deform_verts_for_write()[2].push(DeformWeight { group: 1, weight: 0.5 });
        assert_eq!(mesh.vertex_weight(2, 1), 0.5);

        assert!(mesh.remove_vertex_group("a"));
        assert_eq!(mesh.vertex_group_index("b"), Some(0));
        assert_eq!(mesh.vertex_weight(2, 0), 0.5);
    }
}
