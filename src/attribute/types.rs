//! Attribute domains, data types and the [`AttributeType`] value trait.

use std::fmt;

use bytemuck::{Pod, Zeroable};

use super::{GArray, GVArray, GVMutableArray, VArray, VMutableArray};
use crate::util::{Vec2, Vec3, Vec4};

// ============================================================================
// Domains
// ============================================================================

/// Element class an attribute is stored on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AttrDomain {
    Point,
    Edge,
    Face,
    Corner,
    Curve,
    Instance,
}

impl AttrDomain {
    /// All domains in declaration order.
    pub const ALL: [AttrDomain; 6] = [
        AttrDomain::Point,
        AttrDomain::Edge,
        AttrDomain::Face,
        AttrDomain::Corner,
        AttrDomain::Curve,
        AttrDomain::Instance,
    ];

    /// Human readable name.
    pub fn name(self) -> &'static str {
        match self {
            AttrDomain::Point => "Point",
            AttrDomain::Edge => "Edge",
            AttrDomain::Face => "Face",
            AttrDomain::Corner => "Corner",
            AttrDomain::Curve => "Curve",
            AttrDomain::Instance => "Instance",
        }
    }

    /// Rank used when the same attribute shows up on several domains.
    #[inline]
    fn priority(self) -> u8 {
        match self {
            AttrDomain::Instance => 0,
            AttrDomain::Curve => 1,
            AttrDomain::Face => 2,
            AttrDomain::Edge => 3,
            AttrDomain::Point => 4,
            AttrDomain::Corner => 5,
        }
    }
}

impl fmt::Display for AttrDomain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Domain that wins when merging attributes found on several domains.
///
/// Falls back to [`AttrDomain::Point`] for an empty input.
pub fn domain_highest_priority(domains: impl IntoIterator<Item = AttrDomain>) -> AttrDomain {
    domains
        .into_iter()
        .max_by_key(|d| d.priority())
        .unwrap_or(AttrDomain::Point)
}

// ============================================================================
// Data types
// ============================================================================

/// Value type of an attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DataType {
    Bool,
    Int8,
    Int32,
    Float,
    Float2,
    Float3,
    Color,
}

impl DataType {
    /// All data types, ordered from least to most complex.
    pub const ALL: [DataType; 7] = [
        DataType::Bool,
        DataType::Int8,
        DataType::Int32,
        DataType::Float,
        DataType::Float2,
        DataType::Float3,
        DataType::Color,
    ];

    /// Human readable name.
    pub fn name(self) -> &'static str {
        match self {
            DataType::Bool => "Bool",
            DataType::Int8 => "Int8",
            DataType::Int32 => "Int32",
            DataType::Float => "Float",
            DataType::Float2 => "Float2",
            DataType::Float3 => "Float3",
            DataType::Color => "Color",
        }
    }

    /// Size of one element in bytes.
    pub fn size_of(self) -> usize {
        match self {
            DataType::Bool | DataType::Int8 => 1,
            DataType::Int32 | DataType::Float => 4,
            DataType::Float2 => 8,
            DataType::Float3 => 12,
            DataType::Color => 16,
        }
    }

    #[inline]
    fn complexity(self) -> u8 {
        self as u8
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Type that can hold values of every input type without losing much.
///
/// Falls back to [`DataType::Bool`] for an empty input.
pub fn data_type_highest_complexity(types: impl IntoIterator<Item = DataType>) -> DataType {
    types
        .into_iter()
        .max_by_key(|t| t.complexity())
        .unwrap_or(DataType::Bool)
}

// ============================================================================
// Color
// ============================================================================

/// Linear RGBA color stored on geometry.
#[derive(Debug, Clone, Copy, Default, PartialEq, Pod, Zeroable)]
#[repr(C)]
pub struct ColorGeometry4f {
    pub r: f32,
    pub g: f32,
    pub b: f32,
    pub a: f32,
}

impl ColorGeometry4f {
    pub const fn new(r: f32, g: f32, b: f32, a: f32) -> Self {
        Self { r, g, b, a }
    }
}

impl From<ColorGeometry4f> for Vec4 {
    #[inline]
    fn from(c: ColorGeometry4f) -> Self {
        bytemuck::cast(c)
    }
}

impl From<Vec4> for ColorGeometry4f {
    #[inline]
    fn from(v: Vec4) -> Self {
        bytemuck::cast(v)
    }
}

// ============================================================================
// Value trait
// ============================================================================

/// A value type that can be stored in an attribute.
///
/// Besides the type tag this carries the mixing rule used by domain
/// interpolation and the component-wise conversion used by implicit
/// type conversion, plus the glue into the generic containers.
pub trait AttributeType: Copy + Default + PartialEq + fmt::Debug + Send + Sync + 'static {
    const DATA_TYPE: DataType;

    /// Running sum used while mixing.
    type Accumulator: Copy + Default + Send + Sync;

    fn accumulate(acc: &mut Self::Accumulator, value: Self, weight: f32);
    /// Turn a weighted sum into a value. `total_weight` is always positive.
    fn mix_finish(acc: Self::Accumulator, total_weight: f32) -> Self;

    fn to_vec4(self) -> Vec4;
    fn from_vec4(value: Vec4) -> Self;

    fn into_garray(values: Vec<Self>) -> GArray;
    fn garray_ref(array: &GArray) -> Option<&[Self]>;
    fn garray_mut(array: &mut GArray) -> Option<&mut Vec<Self>>;
    fn into_gvarray(varray: VArray<'_, Self>) -> GVArray<'_>;
    fn from_gvarray<'a>(varray: GVArray<'a>) -> Result<VArray<'a, Self>, GVArray<'a>>;
    fn into_gvmutable(varray: VMutableArray<'_, Self>) -> GVMutableArray<'_>;
    fn from_gvmutable<'a>(
        varray: GVMutableArray<'a>,
    ) -> Result<VMutableArray<'a, Self>, GVMutableArray<'a>>;
}

macro_rules! generic_plumbing {
    ($variant:ident) => {
        fn into_garray(values: Vec<Self>) -> GArray {
            GArray::$variant(values)
        }

        fn garray_ref(array: &GArray) -> Option<&[Self]> {
            match array {
                GArray::$variant(v) => Some(v),
                _ => None,
            }
        }

        fn garray_mut(array: &mut GArray) -> Option<&mut Vec<Self>> {
            match array {
                GArray::$variant(v) => Some(v),
                _ => None,
            }
        }

        fn into_gvarray(varray: VArray<'_, Self>) -> GVArray<'_> {
            GVArray::$variant(varray)
        }

        fn from_gvarray<'a>(varray: GVArray<'a>) -> Result<VArray<'a, Self>, GVArray<'a>> {
            match varray {
                GVArray::$variant(v) => Ok(v),
                other => Err(other),
            }
        }

        fn into_gvmutable(varray: VMutableArray<'_, Self>) -> GVMutableArray<'_> {
            GVMutableArray::$variant(varray)
        }

        fn from_gvmutable<'a>(
            varray: GVMutableArray<'a>,
        ) -> Result<VMutableArray<'a, Self>, GVMutableArray<'a>> {
            match varray {
                GVMutableArray::$variant(v) => Ok(v),
                other => Err(other),
            }
        }
    };
}

impl AttributeType for bool {
    const DATA_TYPE: DataType = DataType::Bool;
    type Accumulator = f32;

    fn accumulate(acc: &mut f32, value: Self, weight: f32) {
        if value {
            *acc += weight;
        }
    }

    fn mix_finish(acc: f32, total_weight: f32) -> Self {
        acc / total_weight >= 0.5
    }

    fn to_vec4(self) -> Vec4 {
        if self { Vec4::ONE } else { Vec4::new(0.0, 0.0, 0.0, 1.0) }
    }

    fn from_vec4(value: Vec4) -> Self {
        value.x > 0.0
    }

    generic_plumbing!(Bool);
}

impl AttributeType for i8 {
    const DATA_TYPE: DataType = DataType::Int8;
    type Accumulator = f32;

    fn accumulate(acc: &mut f32, value: Self, weight: f32) {
        *acc += value as f32 * weight;
    }

    fn mix_finish(acc: f32, total_weight: f32) -> Self {
        (acc / total_weight).round().clamp(i8::MIN as f32, i8::MAX as f32) as i8
    }

    fn to_vec4(self) -> Vec4 {
        let x = self as f32;
        Vec4::new(x, x, x, 1.0)
    }

    fn from_vec4(value: Vec4) -> Self {
        value.x.round().clamp(i8::MIN as f32, i8::MAX as f32) as i8
    }

    generic_plumbing!(Int8);
}

impl AttributeType for i32 {
    const DATA_TYPE: DataType = DataType::Int32;
    type Accumulator = f32;

    fn accumulate(acc: &mut f32, value: Self, weight: f32) {
        *acc += value as f32 * weight;
    }

    fn mix_finish(acc: f32, total_weight: f32) -> Self {
        (acc / total_weight).round() as i32
    }

    fn to_vec4(self) -> Vec4 {
        let x = self as f32;
        Vec4::new(x, x, x, 1.0)
    }

    fn from_vec4(value: Vec4) -> Self {
        value.x.round() as i32
    }

    generic_plumbing!(Int32);
}

impl AttributeType for f32 {
    const DATA_TYPE: DataType = DataType::Float;
    type Accumulator = f32;

    fn accumulate(acc: &mut f32, value: Self, weight: f32) {
        *acc += value * weight;
    }

    fn mix_finish(acc: f32, total_weight: f32) -> Self {
        acc / total_weight
    }

    fn to_vec4(self) -> Vec4 {
        Vec4::new(self, self, self, 1.0)
    }

    fn from_vec4(value: Vec4) -> Self {
        value.x
    }

    generic_plumbing!(Float);
}

impl AttributeType for Vec2 {
    const DATA_TYPE: DataType = DataType::Float2;
    type Accumulator = Vec2;

    fn accumulate(acc: &mut Vec2, value: Self, weight: f32) {
        *acc += value * weight;
    }

    fn mix_finish(acc: Vec2, total_weight: f32) -> Self {
        acc / total_weight
    }

    fn to_vec4(self) -> Vec4 {
        Vec4::new(self.x, self.y, 0.0, 1.0)
    }

    fn from_vec4(value: Vec4) -> Self {
        value.truncate().truncate()
    }

    generic_plumbing!(Float2);
}

impl AttributeType for Vec3 {
    const DATA_TYPE: DataType = DataType::Float3;
    type Accumulator = Vec3;

    fn accumulate(acc: &mut Vec3, value: Self, weight: f32) {
        *acc += value * weight;
    }

    fn mix_finish(acc: Vec3, total_weight: f32) -> Self {
        acc / total_weight
    }

    fn to_vec4(self) -> Vec4 {
        self.extend(1.0)
    }

    fn from_vec4(value: Vec4) -> Self {
        value.truncate()
    }

    generic_plumbing!(Float3);
}

impl AttributeType for ColorGeometry4f {
    const DATA_TYPE: DataType = DataType::Color;
    type Accumulator = Vec4;

    fn accumulate(acc: &mut Vec4, value: Self, weight: f32) {
        *acc += Vec4::from(value) * weight;
    }

    fn mix_finish(acc: Vec4, total_weight: f32) -> Self {
        (acc / total_weight).into()
    }

    fn to_vec4(self) -> Vec4 {
        self.into()
    }

    fn from_vec4(value: Vec4) -> Self {
        value.into()
    }

    generic_plumbing!(Color);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_domain_priority() {
        let d = domain_highest_priority([AttrDomain::Instance, AttrDomain::Point, AttrDomain::Face]);
        assert_eq!(d, AttrDomain::Point);
        assert_eq!(domain_highest_priority([AttrDomain::Curve, AttrDomain::Corner]), AttrDomain::Corner);
        assert_eq!(domain_highest_priority([]), AttrDomain::Point);
    }

    #[test]
    fn test_type_complexity() {
        let t = data_type_highest_complexity([DataType::Int32, DataType::Bool, DataType::Float]);
        assert_eq!(t, DataType::Float);
        assert_eq!(data_type_highest_complexity([DataType::Color, DataType::Float3]), DataType::Color);
    }

    #[test]
    fn test_color_cast() {
        let c = ColorGeometry4f::new(0.1, 0.2, 0.3, 1.0);
        let v: Vec4 = c.into();
        assert_eq!(v, Vec4::new(0.1, 0.2, 0.3, 1.0));
        assert_eq!(ColorGeometry4f::from(v), c);
    }

    #[test]
    fn test_mix_int_rounds() {
        let mut acc = 0.0;
        i32::accumulate(&mut acc, 1, 1.0);
        i32::accumulate(&mut acc, 2, 1.0);
        assert_eq!(i32::mix_finish(acc, 2.0), 2);
    }

    #[test]
    fn test_conversions() {
        assert_eq!(f32::from_vec4(true.to_vec4()), 1.0);
        assert!(!bool::from_vec4(0.0f32.to_vec4()));
        assert_eq!(Vec3::from_vec4(2.5f32.to_vec4()), Vec3::splat(2.5));
        assert_eq!(i8::from_vec4(Vec4::splat(1000.0)), i8::MAX);
    }
}
