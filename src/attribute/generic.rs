//! Type-erased attribute containers.
//!
//! [`GArray`] owns values of one [`DataType`]; [`GVArray`] and
//! [`GVMutableArray`] wrap the typed virtual arrays. Each is a closed enum
//! with one variant per data type, so code that needs the concrete type
//! matches once and then runs generic code.

use std::ops::Range;

use crate::util::{Error, Result, Vec2, Vec3, Vec4};

use super::{AttributeType, ColorGeometry4f, DataType, VArray, VMutableArray};

/// Run `$body` with `$v` bound to the typed payload of any variant.
macro_rules! gdispatch {
    ($value:expr, $enum:ident, $v:ident => $body:expr) => {
        match $value {
            $enum::Bool($v) => $body,
            $enum::Int8($v) => $body,
            $enum::Int32($v) => $body,
            $enum::Float($v) => $body,
            $enum::Float2($v) => $body,
            $enum::Float3($v) => $body,
            $enum::Color($v) => $body,
        }
    };
}

/// Like [`gdispatch`] but wraps the result in the same variant of `$to`.
macro_rules! gconvert {
    ($value:expr, $from:ident => $to:ident, $v:ident => $body:expr) => {
        match $value {
            $from::Bool($v) => $to::Bool($body),
            $from::Int8($v) => $to::Int8($body),
            $from::Int32($v) => $to::Int32($body),
            $from::Float($v) => $to::Float($body),
            $from::Float2($v) => $to::Float2($body),
            $from::Float3($v) => $to::Float3($body),
            $from::Color($v) => $to::Color($body),
        }
    };
}

pub(crate) use gconvert;
pub(crate) use gdispatch;

// ============================================================================
// GArray
// ============================================================================

/// Owned attribute values of one data type.
#[derive(Debug, Clone, PartialEq)]
pub enum GArray {
    Bool(Vec<bool>),
    Int8(Vec<i8>),
    Int32(Vec<i32>),
    Float(Vec<f32>),
    Float2(Vec<Vec2>),
    Float3(Vec<Vec3>),
    Color(Vec<ColorGeometry4f>),
}

impl GArray {
    /// Array of `len` default values.
    pub fn new(data_type: DataType, len: usize) -> Self {
        match data_type {
            DataType::Bool => GArray::Bool(vec![false; len]),
            DataType::Int8 => GArray::Int8(vec![0; len]),
            DataType::Int32 => GArray::Int32(vec![0; len]),
            DataType::Float => GArray::Float(vec![0.0; len]),
            DataType::Float2 => GArray::Float2(vec![Vec2::ZERO; len]),
            DataType::Float3 => GArray::Float3(vec![Vec3::ZERO; len]),
            DataType::Color => GArray::Color(vec![ColorGeometry4f::default(); len]),
        }
    }

    pub fn from_vec<T: AttributeType>(values: Vec<T>) -> Self {
        T::into_garray(values)
    }

    pub fn data_type(&self) -> DataType {
        match self {
            GArray::Bool(_) => DataType::Bool,
            GArray::Int8(_) => DataType::Int8,
            GArray::Int32(_) => DataType::Int32,
            GArray::Float(_) => DataType::Float,
            GArray::Float2(_) => DataType::Float2,
            GArray::Float3(_) => DataType::Float3,
            GArray::Color(_) => DataType::Color,
        }
    }

    pub fn len(&self) -> usize {
        gdispatch!(self, GArray, v => v.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Grow with default values or truncate.
    pub fn resize(&mut self, len: usize) {
        gdispatch!(self, GArray, v => v.resize(len, Default::default()))
    }

    pub fn typed<T: AttributeType>(&self) -> Option<&[T]> {
        T::garray_ref(self)
    }

    pub fn typed_mut<T: AttributeType>(&mut self) -> Option<&mut Vec<T>> {
        T::garray_mut(self)
    }

    /// Copy of the elements in `range`.
    pub fn slice(&self, range: Range<usize>) -> GArray {
        gconvert!(self, GArray => GArray, v => v[range.clone()].to_vec())
    }

    /// Borrow as a span-backed virtual array.
    pub fn as_varray(&self) -> GVArray<'_> {
        gconvert!(self, GArray => GVArray, v => VArray::from_span(v.as_slice()))
    }

    /// Borrow as a mutable span-backed virtual array.
    pub fn as_mutable(&mut self) -> GVMutableArray<'_> {
        gconvert!(self, GArray => GVMutableArray, v => VMutableArray::from_span(v.as_mut_slice()))
    }

    /// Memory used by the values.
    pub fn byte_size(&self) -> usize {
        self.len() * self.data_type().size_of()
    }
}

// ============================================================================
// GVArray
// ============================================================================

/// Type-erased read-only virtual array.
#[derive(Debug, Clone)]
pub enum GVArray<'a> {
    Bool(VArray<'a, bool>),
    Int8(VArray<'a, i8>),
    Int32(VArray<'a, i32>),
    Float(VArray<'a, f32>),
    Float2(VArray<'a, Vec2>),
    Float3(VArray<'a, Vec3>),
    Color(VArray<'a, ColorGeometry4f>),
}

impl<'a> GVArray<'a> {
    pub fn from_typed<T: AttributeType>(varray: VArray<'a, T>) -> Self {
        T::into_gvarray(varray)
    }

    /// `len` copies of the default value of `data_type`.
    pub fn default_of(data_type: DataType, len: usize) -> Self {
        match data_type {
            DataType::Bool => GVArray::Bool(VArray::from_single(false, len)),
            DataType::Int8 => GVArray::Int8(VArray::from_single(0, len)),
            DataType::Int32 => GVArray::Int32(VArray::from_single(0, len)),
            DataType::Float => GVArray::Float(VArray::from_single(0.0, len)),
            DataType::Float2 => GVArray::Float2(VArray::from_single(Vec2::ZERO, len)),
            DataType::Float3 => GVArray::Float3(VArray::from_single(Vec3::ZERO, len)),
            DataType::Color => GVArray::Color(VArray::from_single(ColorGeometry4f::default(), len)),
        }
    }

    pub fn data_type(&self) -> DataType {
        match self {
            GVArray::Bool(_) => DataType::Bool,
            GVArray::Int8(_) => DataType::Int8,
            GVArray::Int32(_) => DataType::Int32,
            GVArray::Float(_) => DataType::Float,
            GVArray::Float2(_) => DataType::Float2,
            GVArray::Float3(_) => DataType::Float3,
            GVArray::Color(_) => DataType::Color,
        }
    }

    pub fn len(&self) -> usize {
        gdispatch!(self, GVArray, v => v.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The typed array, if the data type is `T`.
    pub fn typed<T: AttributeType>(self) -> Option<VArray<'a, T>> {
        T::from_gvarray(self).ok()
    }

    /// The typed array, converting element-wise when the data type differs.
    pub fn convert<T: AttributeType>(self) -> VArray<'a, T> {
        match T::from_gvarray(self) {
            Ok(varray) => varray,
            Err(other) => {
                let len = other.len();
                VArray::from_func(len, move |i| T::from_vec4(other.get_vec4(i)))
            }
        }
    }

    /// Element as a four component vector, for conversions.
    pub fn get_vec4(&self, index: usize) -> Vec4 {
        gdispatch!(self, GVArray, v => v.get(index).to_vec4())
    }

    /// Materialize into owned storage.
    pub fn to_garray(&self) -> GArray {
        gconvert!(self, GVArray => GArray, v => v.to_vec())
    }
}

// ============================================================================
// GVMutableArray
// ============================================================================

/// Type-erased read/write virtual array.
#[derive(Debug)]
pub enum GVMutableArray<'a> {
    Bool(VMutableArray<'a, bool>),
    Int8(VMutableArray<'a, i8>),
    Int32(VMutableArray<'a, i32>),
    Float(VMutableArray<'a, f32>),
    Float2(VMutableArray<'a, Vec2>),
    Float3(VMutableArray<'a, Vec3>),
    Color(VMutableArray<'a, ColorGeometry4f>),
}

impl<'a> GVMutableArray<'a> {
    pub fn from_typed<T: AttributeType>(varray: VMutableArray<'a, T>) -> Self {
        T::into_gvmutable(varray)
    }

    pub fn data_type(&self) -> DataType {
        match self {
            GVMutableArray::Bool(_) => DataType::Bool,
            GVMutableArray::Int8(_) => DataType::Int8,
            GVMutableArray::Int32(_) => DataType::Int32,
            GVMutableArray::Float(_) => DataType::Float,
            GVMutableArray::Float2(_) => DataType::Float2,
            GVMutableArray::Float3(_) => DataType::Float3,
            GVMutableArray::Color(_) => DataType::Color,
        }
    }

    pub fn len(&self) -> usize {
        gdispatch!(self, GVMutableArray, v => v.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn typed<T: AttributeType>(self) -> Option<VMutableArray<'a, T>> {
        T::from_gvmutable(self).ok()
    }

    /// Overwrite every element from `src`, converting types if needed.
    pub fn set_all_from(&mut self, src: &GVArray<'_>) -> Result<()> {
        if src.len() != self.len() {
            return Err(Error::SizeMismatch {
                expected: self.len(),
                actual: src.len(),
            });
        }
        gdispatch!(self, GVMutableArray, dst => {
            let values = src.clone().convert();
            dst.set_from(&values);
        });
        Ok(())
    }

    /// Overwrite every element with the values of an owned array.
    pub fn set_all_from_array(&mut self, src: &GArray) -> Result<()> {
        self.set_all_from(&src.as_varray())
    }

    pub fn to_garray(&self) -> GArray {
        gconvert!(self, GVMutableArray => GArray, v => v.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_garray_basics() {
        let mut array = GArray::new(DataType::Float3, 2);
        assert_eq!(array.data_type(), DataType::Float3);
        assert_eq!(array.len(), 2);
        array.resize(4);
        assert_eq!(array.typed::<Vec3>().map(<[Vec3]>::len), Some(4));
        assert!(array.typed::<f32>().is_none());
        assert_eq!(array.byte_size(), 48);
    }

    #[test]
    fn test_convert_float_to_int() {
        let values = GArray::from_vec(vec![0.4f32, 1.6, -2.2]);
        let ints = values.as_varray().convert::<i32>();
        assert_eq!(ints.to_vec(), vec![0, 2, -2]);
    }

    #[test]
    fn test_set_all_from_converts() {
        let mut dst = GArray::new(DataType::Float, 3);
        let src = GArray::from_vec(vec![1, 2, 3]);
        dst.as_mutable().set_all_from_array(&src).unwrap();
        assert_eq!(dst.typed::<f32>().unwrap(), &[1.0, 2.0, 3.0]);
    }

    #[test]
    fn test_set_all_from_size_mismatch() {
        let mut dst = GArray::new(DataType::Bool, 2);
        let src = GArray::new(DataType::Bool, 3);
        assert!(matches!(
            dst.as_mutable().set_all_from_array(&src),
            Err(Error::SizeMismatch { expected: 2, actual: 3 })
        ));
    }
}
