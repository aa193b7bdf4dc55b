//! Attribute providers and domain interpolation for [`Mesh`].

use std::sync::OnceLock;

use tracing::warn;

use crate::attribute::{
    AttrDomain, AttributeId, AttributeInit, AttributeMetaData, AttributeOwner, AttributeType,
    BuiltinAttributeProvider, BuiltinCustomDataProvider, BuiltinInfo, ChangeListener,
    ComponentAttributeProviders, ComputedProvider, CustomData, CustomDataAttributeProvider,
    CustomDataOwner, DataType, DefaultMixer, DerivedArrayProvider, DynamicAttributesProvider,
    FinishCallback, GAttributeReader, GAttributeWriter, GVArray, GVMutableArray, VArray, VArrayImpl,
    VMutableArray, VMutableArrayImpl,
};
use crate::util::Vec3;

use super::mesh::{DeformWeight, Mesh, MeshEdge, MeshFace, MeshVert};

// ============================================================================
// Storage access
// ============================================================================

impl CustomDataOwner for Mesh {
    fn custom_data(&self, domain: AttrDomain) -> Option<&CustomData> {
        match domain {
            AttrDomain::Point => Some(&self.vert_data),
            AttrDomain::Edge => Some(&self.edge_data),
            AttrDomain::Face => Some(&self.face_data),
            AttrDomain::Corner => Some(&self.corner_data),
            _ => None,
        }
    }

    fn custom_data_for_write(&mut self, domain: AttrDomain) -> Option<(&mut CustomData, &dyn ChangeListener)> {
        let data = match domain {
            AttrDomain::Point => &mut self.vert_data,
            AttrDomain::Edge => &mut self.edge_data,
            AttrDomain::Face => &mut self.face_data,
            AttrDomain::Corner => &mut self.corner_data,
            _ => return None,
        };
        Some((data, &self.runtime))
    }

    fn custom_data_size(&self, domain: AttrDomain) -> usize {
        self.attribute_domain_size(domain)
    }
}

impl AttributeOwner for Mesh {
    fn attribute_providers() -> &'static ComponentAttributeProviders<Self> {
        static PROVIDERS: OnceLock<ComponentAttributeProviders<Mesh>> = OnceLock::new();
        PROVIDERS.get_or_init(create_attribute_providers)
    }

    fn attribute_domain_size(&self, domain: AttrDomain) -> usize {
        match domain {
            AttrDomain::Point => self.verts_num(),
            AttrDomain::Edge => self.edges_num(),
            AttrDomain::Face => self.faces_num(),
            AttrDomain::Corner => self.corners_num(),
            _ => 0,
        }
    }

    fn adapt_attribute_domain<'a>(
        &'a self,
        varray: GVArray<'a>,
        from: AttrDomain,
        to: AttrDomain,
    ) -> Option<GVArray<'a>> {
        adapt_mesh_domain(self, varray, from, to)
    }
}

fn verts(mesh: &Mesh) -> &[MeshVert] {
    &mesh.verts
}

fn verts_for_write(mesh: &mut Mesh) -> (&mut [MeshVert], &dyn ChangeListener) {
    (&mut mesh.verts, &mesh.runtime)
}

fn edges(mesh: &Mesh) -> &[MeshEdge] {
    &mesh.edges
}

fn edges_for_write(mesh: &mut Mesh) -> (&mut [MeshEdge], &dyn ChangeListener) {
    (&mut mesh.edges, &mesh.runtime)
}

fn faces(mesh: &Mesh) -> &[MeshFace] {
    &mesh.faces
}

fn faces_for_write(mesh: &mut Mesh) -> (&mut [MeshFace], &dyn ChangeListener) {
    (&mut mesh.faces, &mesh.runtime)
}

fn face_normals(mesh: &Mesh) -> VArray<'_, Vec3> {
    let normals = mesh.face_normals();
    VArray::from_func(normals.len(), move |i| normals[i])
}

fn has_faces(mesh: &Mesh) -> bool {
    mesh.faces_num() != 0
}

fn create_attribute_providers() -> ComponentAttributeProviders<Mesh> {
    use AttrDomain::{Corner, Edge, Face, Point};

    let builtin: Vec<Box<dyn BuiltinAttributeProvider<Mesh>>> = vec![
        Box::new(
            DerivedArrayProvider::new(
                BuiltinInfo::new("position", Point, DataType::Float3),
                verts,
                verts_for_write,
                |v: &MeshVert| v.co,
                |v: &mut MeshVert, co: Vec3| v.co = co,
            )
            .tagged(),
        ),
        Box::new(BuiltinCustomDataProvider::new(
            BuiltinInfo::new("id", Point, DataType::Int32).optional(),
        )),
        Box::new(
            DerivedArrayProvider::new(
                BuiltinInfo::new("material_index", Face, DataType::Int32),
                faces,
                faces_for_write,
                |f: &MeshFace| i32::from(f.material_index),
                |f: &mut MeshFace, index: i32| f.material_index = index.clamp(0, i32::from(i16::MAX)) as i16,
            )
            .tagged(),
        ),
        Box::new(
            DerivedArrayProvider::new(
                BuiltinInfo::new("shade_smooth", Face, DataType::Bool),
                faces,
                faces_for_write,
                |f: &MeshFace| f.smooth,
                |f: &mut MeshFace, smooth: bool| f.smooth = smooth,
            )
            .tagged(),
        ),
        Box::new(
            ComputedProvider::new(BuiltinInfo::new("normal", Face, DataType::Float3), face_normals)
                .with_exists(has_faces),
        ),
        Box::new(DerivedArrayProvider::new(
            BuiltinInfo::new("crease", Edge, DataType::Float),
            edges,
            edges_for_write,
            |e: &MeshEdge| f32::from(e.crease) / 255.0,
            |e: &mut MeshEdge, crease: f32| e.crease = (crease.clamp(0.0, 1.0) * 255.0).round() as u8,
        )),
    ];
    let dynamic: Vec<Box<dyn DynamicAttributesProvider<Mesh>>> = vec![
        Box::new(CustomDataAttributeProvider::new(Corner)),
        Box::new(VertexGroupsProvider),
        Box::new(CustomDataAttributeProvider::new(Point)),
        Box::new(CustomDataAttributeProvider::new(Edge)),
        Box::new(CustomDataAttributeProvider::new(Face)),
    ];
    ComponentAttributeProviders::new(builtin, dynamic)
}

// ============================================================================
// Vertex groups
// ============================================================================

fn find_weight(weights: &[DeformWeight], group: u32) -> Option<&DeformWeight> {
    weights.iter().find(|w| w.group == group)
}

/// Weights of one group, read-only.
struct VertexWeights<'a> {
    dverts: &'a [Vec<DeformWeight>],
    group: u32,
}

impl VArrayImpl<f32> for VertexWeights<'_> {
    fn len(&self) -> usize {
        self.dverts.len()
    }

    fn get(&self, index: usize) -> f32 {
        find_weight(&self.dverts[index], self.group).map_or(0.0, |w| w.weight)
    }
}

/// Weights of one group, writable. Zero never adds an entry.
struct VertexWeightsMut<'a> {
    dverts: &'a mut [Vec<DeformWeight>],
    group: u32,
}

impl VArrayImpl<f32> for VertexWeightsMut<'_> {
    fn len(&self) -> usize {
        self.dverts.len()
    }

    fn get(&self, index: usize) -> f32 {
        find_weight(&self.dverts[index], self.group).map_or(0.0, |w| w.weight)
    }
}

impl VMutableArrayImpl<f32> for VertexWeightsMut<'_> {
    fn set(&mut self, index: usize, value: f32) {
        let weights = &mut self.dverts[index];
        match weights.iter_mut().find(|w| w.group == self.group) {
            Some(w) => w.weight = value,
            None if value != 0.0 => weights.push(DeformWeight {
                group: self.group,
                weight: value,
            }),
            None => {}
        }
    }
}

/// Vertex groups exposed as float point attributes.
struct VertexGroupsProvider;

impl DynamicAttributesProvider<Mesh> for VertexGroupsProvider {
    fn try_get_for_read<'a>(&self, mesh: &'a Mesh, id: &AttributeId) -> Option<GAttributeReader<'a>> {
        let group = mesh.vertex_group_index(id.name())? as u32;
        let varray = if mesh.deform_verts.is_empty() {
            VArray::from_single(0.0, mesh.verts_num())
        } else {
            VArray::from_impl(VertexWeights {
                dverts: &mesh.deform_verts,
                group,
            })
        };
        Some(GAttributeReader {
            varray: GVArray::Float(varray),
            domain: AttrDomain::Point,
        })
    }

    fn try_get_for_write<'a>(&self, mesh: &'a mut Mesh, id: &AttributeId) -> Option<GAttributeWriter<'a>> {
        let group = mesh.vertex_group_index(id.name())? as u32;
        let dverts = mesh.deform_verts_for_write();
        let varray = VMutableArray::from_impl(VertexWeightsMut { dverts, group });
        Some(GAttributeWriter::new(
            GVMutableArray::Float(varray),
            AttrDomain::Point,
            FinishCallback::none(),
        ))
    }

    /// Groups are only added through [`Mesh::add_vertex_group`]; new float
    /// point attributes go to the point custom data.
    fn try_create(
        &self,
        _mesh: &mut Mesh,
        _id: &AttributeId,
        _domain: AttrDomain,
        _data_type: DataType,
        _init: AttributeInit<'_>,
    ) -> bool {
        false
    }

    fn try_delete(&self, mesh: &mut Mesh, id: &AttributeId) -> bool {
        mesh.remove_vertex_group(id.name())
    }

    fn contains(&self, mesh: &Mesh, id: &AttributeId) -> bool {
        mesh.vertex_group_index(id.name()).is_some()
    }

    fn foreach_attribute(
        &self,
        mesh: &Mesh,
        callback: &mut dyn FnMut(&AttributeId, &AttributeMetaData) -> bool,
    ) -> bool {
        let meta = AttributeMetaData::new(AttrDomain::Point, DataType::Float);
        mesh.vertex_group_names
            .iter()
            .all(|name| callback(&AttributeId::from(name.as_str()), &meta))
    }

    fn supported_domains(&self) -> &[AttrDomain] {
        &[AttrDomain::Point]
    }
}

// ============================================================================
// Domain interpolation
// ============================================================================

fn adapt_mesh_domain<'a>(mesh: &'a Mesh, varray: GVArray<'a>, from: AttrDomain, to: AttrDomain) -> Option<GVArray<'a>> {
    if from == to {
        return Some(varray);
    }
    if varray.len() != mesh.attribute_domain_size(from) {
        warn!(%from, len = varray.len(), "attribute size does not match the mesh domain");
        return None;
    }
    let adapted = match varray {
        GVArray::Bool(v) => GVArray::Bool(adapt_bool(mesh, v, from, to)?),
        GVArray::Int8(v) => GVArray::Int8(adapt_mixed(mesh, v, from, to)?),
        GVArray::Int32(v) => GVArray::Int32(adapt_mixed(mesh, v, from, to)?),
        GVArray::Float(v) => GVArray::Float(adapt_mixed(mesh, v, from, to)?),
        GVArray::Float2(v) => GVArray::Float2(adapt_mixed(mesh, v, from, to)?),
        GVArray::Float3(v) => GVArray::Float3(adapt_mixed(mesh, v, from, to)?),
        GVArray::Color(v) => GVArray::Color(adapt_mixed(mesh, v, from, to)?),
    };
    Some(adapted)
}

/// Corner values read from their vertex.
fn point_to_corner<'a, T: AttributeType>(mesh: &'a Mesh, src: VArray<'a, T>) -> VArray<'a, T> {
    VArray::from_func(mesh.corners_num(), move |c| src.get(mesh.corners[c].vert as usize))
}

/// Corner values read from their face.
fn face_to_corner<'a, T: AttributeType>(mesh: &Mesh, src: VArray<'a, T>) -> VArray<'a, T> {
    let corner_faces = mesh.corner_to_face_map();
    VArray::from_func(corner_faces.len(), move |c| src.get(corner_faces[c]))
}

/// Run `fill` against a mixer over `len` fresh elements.
fn mixed<'a, T: AttributeType>(len: usize, fill: impl FnOnce(&mut DefaultMixer<'_, T>)) -> VArray<'a, T> {
    let mut values = vec![T::default(); len];
    let mut mixer = DefaultMixer::new(&mut values);
    fill(&mut mixer);
    mixer.finalize();
    VArray::from_vec(values)
}

/// Corner after `c` within its face, wrapping.
#[inline]
fn next_corner(start: usize, len: usize, i: usize) -> usize {
    start + (i + 1) % len
}

/// Corner before `c` within its face, wrapping.
#[inline]
fn prev_corner(start: usize, len: usize, i: usize) -> usize {
    start + (i + len - 1) % len
}

fn adapt_mixed<'a, T: AttributeType>(
    mesh: &'a Mesh,
    src: VArray<'a, T>,
    from: AttrDomain,
    to: AttrDomain,
) -> Option<VArray<'a, T>> {
    use AttrDomain::{Corner, Edge, Face, Point};

    let corners = &mesh.corners;
    let varray = match (from, to) {
        (Point, Corner) => point_to_corner(mesh, src),
        (Face, Corner) => face_to_corner(mesh, src),
        (Corner, Point) => mixed(mesh.verts_num(), |m| {
            for (c, corner) in corners.iter().enumerate() {
                m.mix_in(corner.vert as usize, src.get(c), 1.0);
            }
        }),
        (Corner, Face) => mixed(mesh.faces_num(), |m| {
            for f in 0..mesh.faces_num() {
                for c in mesh.face_corners(f) {
                    m.mix_in(f, src.get(c), 1.0);
                }
            }
        }),
        (Corner, Edge) => mixed(mesh.edges_num(), |m| {
            for f in 0..mesh.faces_num() {
                let range = mesh.face_corners(f);
                for (i, c) in range.clone().enumerate() {
                    let next = next_corner(range.start, range.len(), i);
                    let edge = corners[c].edge as usize;
                    m.mix_in(edge, src.get(c), 1.0);
                    m.mix_in(edge, src.get(next), 1.0);
                }
            }
        }),
        (Point, Face) => mixed(mesh.faces_num(), |m| {
            for f in 0..mesh.faces_num() {
                for c in mesh.face_corners(f) {
                    m.mix_in(f, src.get(corners[c].vert as usize), 1.0);
                }
            }
        }),
        (Point, Edge) => mixed(mesh.edges_num(), |m| {
            for (e, edge) in mesh.edges.iter().enumerate() {
                m.mix_in(e, src.get(edge.v1 as usize), 1.0);
                m.mix_in(e, src.get(edge.v2 as usize), 1.0);
            }
        }),
        (Edge, Corner) => mixed(mesh.corners_num(), |m| {
            for f in 0..mesh.faces_num() {
                let range = mesh.face_corners(f);
                for (i, c) in range.clone().enumerate() {
                    let prev = prev_corner(range.start, range.len(), i);
                    m.mix_in(c, src.get(corners[c].edge as usize), 1.0);
                    m.mix_in(c, src.get(corners[prev].edge as usize), 1.0);
                }
            }
        }),
        (Edge, Point) => mixed(mesh.verts_num(), |m| {
            for (e, edge) in mesh.edges.iter().enumerate() {
                m.mix_in(edge.v1 as usize, src.get(e), 1.0);
                m.mix_in(edge.v2 as usize, src.get(e), 1.0);
            }
        }),
        (Edge, Face) => mixed(mesh.faces_num(), |m| {
            for f in 0..mesh.faces_num() {
                for c in mesh.face_corners(f) {
                    m.mix_in(f, src.get(corners[c].edge as usize), 1.0);
                }
            }
        }),
        (Face, Point) => mixed(mesh.verts_num(), |m| {
            for f in 0..mesh.faces_num() {
                for c in mesh.face_corners(f) {
                    m.mix_in(corners[c].vert as usize, src.get(f), 1.0);
                }
            }
        }),
        (Face, Edge) => mixed(mesh.edges_num(), |m| {
            for f in 0..mesh.faces_num() {
                for c in mesh.face_corners(f) {
                    m.mix_in(corners[c].edge as usize, src.get(f), 1.0);
                }
            }
        }),
        _ => return None,
    };
    Some(varray)
}

/// Face values that hold only if `element_true` holds for every corner.
fn faces_all(mesh: &Mesh, element_true: impl Fn(usize) -> bool) -> Vec<bool> {
    (0..mesh.faces_num())
        .map(|f| mesh.face_corners(f).all(&element_true))
        .collect()
}

fn adapt_bool<'a>(
    mesh: &'a Mesh,
    src: VArray<'a, bool>,
    from: AttrDomain,
    to: AttrDomain,
) -> Option<VArray<'a, bool>> {
    use AttrDomain::{Corner, Edge, Face, Point};

    let corners = &mesh.corners;
    let values = match (from, to) {
        (Point, Corner) => return Some(point_to_corner(mesh, src)),
        (Face, Corner) => return Some(face_to_corner(mesh, src)),
        // All corners true; loose vertices false.
        (Corner, Point) => {
            let mut values = vec![true; mesh.verts_num()];
            let mut used = vec![false; mesh.verts_num()];
            for (c, corner) in corners.iter().enumerate() {
                let v = corner.vert as usize;
                used[v] = true;
                if !src.get(c) {
                    values[v] = false;
                }
            }
            values.iter().zip(used).map(|(&value, used)| value && used).collect()
        }
        (Corner, Face) => faces_all(mesh, |c| src.get(c)),
        (Point, Face) => faces_all(mesh, |c| src.get(corners[c].vert as usize)),
        (Edge, Face) => faces_all(mesh, |c| src.get(corners[c].edge as usize)),
        // Both adjacent corners true; loose edges false.
        (Corner, Edge) => {
            let mut values = vec![true; mesh.edges_num()];
            let mut used = vec![false; mesh.edges_num()];
            for f in 0..mesh.faces_num() {
                let range = mesh.face_corners(f);
                for (i, c) in range.clone().enumerate() {
                    let next = next_corner(range.start, range.len(), i);
                    let edge = corners[c].edge as usize;
                    used[edge] = true;
                    if !(src.get(c) && src.get(next)) {
                        values[edge] = false;
                    }
                }
            }
            values.iter().zip(used).map(|(&value, used)| value && used).collect()
        }
        (Point, Edge) => mesh
            .edges
            .iter()
            .map(|edge| src.get(edge.v1 as usize) && src.get(edge.v2 as usize))
            .collect(),
        (Edge, Corner) => {
            let mut values = vec![false; mesh.corners_num()];
            for f in 0..mesh.faces_num() {
                let range = mesh.face_corners(f);
                for (i, c) in range.clone().enumerate() {
                    let prev = prev_corner(range.start, range.len(), i);
                    values[c] = src.get(corners[c].edge as usize) && src.get(corners[prev].edge as usize);
                }
            }
            values
        }
        // Any adjacent element true.
        (Edge, Point) => {
            let mut values = vec![false; mesh.verts_num()];
            for (e, edge) in mesh.edges.iter().enumerate() {
                if src.get(e) {
                    values[edge.v1 as usize] = true;
                    values[edge.v2 as usize] = true;
                }
            }
            values
        }
        (Face, Point) => {
            let mut values = vec![false; mesh.verts_num()];
            for f in (0..mesh.faces_num()).filter(|&f| src.get(f)) {
                for c in mesh.face_corners(f) {
                    values[corners[c].vert as usize] = true;
                }
            }
            values
        }
        (Face, Edge) => {
            let mut values = vec![false; mesh.edges_num()];
            for f in (0..mesh.faces_num()).filter(|&f| src.get(f)) {
                for c in mesh.face_corners(f) {
                    values[corners[c].edge as usize] = true;
                }
            }
            values
        }
        _ => return None,
    };
    Some(VArray::from_vec(values))
}
