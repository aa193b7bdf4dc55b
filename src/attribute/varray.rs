//! Virtual arrays.
//!
//! A virtual array is a read (or read/write) view over a domain's worth of
//! values that hides how they are stored. The backends form a closed set:
//!
//! - contiguous span (borrowed or owned)
//! - single value repeated
//! - segmented view over per-substructure buffers
//! - derived values computed from a span of other structs
//! - arbitrary index function

use std::borrow::Cow;
use std::fmt;
use std::mem::MaybeUninit;
use std::sync::Arc;

use super::{IndexMask, SegmentedView, SegmentedViewMut};

// ============================================================================
// Backend traits
// ============================================================================

/// Element access for custom read backends.
pub trait VArrayImpl<T>: Send + Sync {
    fn len(&self) -> usize;
    fn get(&self, index: usize) -> T;

    fn materialize(&self, mask: &IndexMask, dst: &mut [T]) {
        for i in mask {
            dst[i] = self.get(i);
        }
    }
}

/// Element access for custom read/write backends.
pub trait VMutableArrayImpl<T>: VArrayImpl<T> {
    fn set(&mut self, index: usize, value: T);

    fn set_all(&mut self, src: &[T])
    where
        T: Clone,
    {
        for (i, value) in src.iter().enumerate() {
            self.set(i, value.clone());
        }
    }
}

/// Values projected out of a span of structs through a getter.
pub struct DerivedSpan<'a, S, T> {
    data: &'a [S],
    get: fn(&S) -> T,
}

impl<'a, S, T> DerivedSpan<'a, S, T> {
    pub fn new(data: &'a [S], get: fn(&S) -> T) -> Self {
        Self { data, get }
    }
}

impl<S: Sync, T> VArrayImpl<T> for DerivedSpan<'_, S, T> {
    fn len(&self) -> usize {
        self.data.len()
    }

    #[inline]
    fn get(&self, index: usize) -> T {
        (self.get)(&self.data[index])
    }
}

/// Mutable projection with a getter/setter pair.
///
/// The setter runs on the live struct, so it can also update state that
/// depends on the value (cache flags and the like).
pub struct DerivedSpanMut<'a, S, T> {
    data: &'a mut [S],
    get: fn(&S) -> T,
    set: fn(&mut S, T),
}

impl<'a, S, T> DerivedSpanMut<'a, S, T> {
    pub fn new(data: &'a mut [S], get: fn(&S) -> T, set: fn(&mut S, T)) -> Self {
        Self { data, get, set }
    }
}

impl<S: Send + Sync, T> VArrayImpl<T> for DerivedSpanMut<'_, S, T> {
    fn len(&self) -> usize {
        self.data.len()
    }

    #[inline]
    fn get(&self, index: usize) -> T {
        (self.get)(&self.data[index])
    }
}

impl<S: Send + Sync, T> VMutableArrayImpl<T> for DerivedSpanMut<'_, S, T> {
    #[inline]
    fn set(&mut self, index: usize, value: T) {
        (self.set)(&mut self.data[index], value);
    }
}

// ============================================================================
// VArray
// ============================================================================

/// Read-only virtual array.
#[derive(Clone)]
pub enum VArray<'a, T: Clone> {
    Span(Cow<'a, [T]>),
    Single { value: T, len: usize },
    Segmented(SegmentedView<'a, T>),
    Derived(Arc<dyn VArrayImpl<T> + 'a>),
    Func {
        len: usize,
        func: Arc<dyn Fn(usize) -> T + Send + Sync + 'a>,
    },
}

impl<'a, T: Copy + Default + Send + Sync + 'a> VArray<'a, T> {
    #[inline]
    pub fn from_span(values: &'a [T]) -> Self {
        Self::Span(Cow::Borrowed(values))
    }

    #[inline]
    pub fn from_vec(values: Vec<T>) -> Self {
        Self::Span(Cow::Owned(values))
    }

    #[inline]
    pub fn from_single(value: T, len: usize) -> Self {
        Self::Single { value, len }
    }

    pub fn from_func(len: usize, func: impl Fn(usize) -> T + Send + Sync + 'a) -> Self {
        Self::Func { len, func: Arc::new(func) }
    }

    pub fn from_derived_span<S: Sync + 'a>(data: &'a [S], get: fn(&S) -> T) -> Self {
        Self::Derived(Arc::new(DerivedSpan::new(data, get)))
    }

    pub fn from_impl(imp: impl VArrayImpl<T> + 'a) -> Self {
        Self::Derived(Arc::new(imp))
    }

    pub fn len(&self) -> usize {
        match self {
            VArray::Span(values) => values.len(),
            VArray::Single { len, .. } => *len,
            VArray::Segmented(view) => view.len(),
            VArray::Derived(imp) => imp.len(),
            VArray::Func { len, .. } => *len,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Value at `index`. Panics when out of bounds.
    #[inline]
    pub fn get(&self, index: usize) -> T {
        match self {
            VArray::Span(values) => values[index],
            VArray::Single { value, len } => {
                assert!(index < *len, "index {index} out of bounds ({len})");
                *value
            }
            VArray::Segmented(view) => view.get(index),
            VArray::Derived(imp) => imp.get(index),
            VArray::Func { len, func } => {
                assert!(index < *len, "index {index} out of bounds ({len})");
                func(index)
            }
        }
    }

    /// Contiguous storage, if the array has one.
    pub fn as_span(&self) -> Option<&[T]> {
        match self {
            VArray::Span(values) => Some(values),
            _ => None,
        }
    }

    /// The repeated value of a single-value array.
    pub fn as_single(&self) -> Option<T> {
        match self {
            VArray::Single { value, .. } => Some(*value),
            _ => None,
        }
    }

    /// Copy the masked elements into `dst`.
    pub fn materialize(&self, mask: &IndexMask, dst: &mut [T]) {
        match self {
            VArray::Span(values) => {
                if let Some(range) = mask.as_range() {
                    dst[range.clone()].copy_from_slice(&values[range]);
                } else {
                    for i in mask {
                        dst[i] = values[i];
                    }
                }
            }
            VArray::Single { value, .. } => {
                for i in mask {
                    dst[i] = *value;
                }
            }
            VArray::Segmented(view) => view.materialize(mask, dst),
            VArray::Derived(imp) => imp.materialize(mask, dst),
            VArray::Func { func, .. } => {
                for i in mask {
                    dst[i] = func(i);
                }
            }
        }
    }

    /// Initialize the masked elements of `dst`.
    pub fn materialize_to_uninitialized(&self, mask: &IndexMask, dst: &mut [MaybeUninit<T>]) {
        match self {
            VArray::Segmented(view) => view.materialize_to_uninitialized(mask, dst),
            _ => {
                for i in mask {
                    dst[i].write(self.get(i));
                }
            }
        }
    }

    /// All values in a new vector.
    pub fn to_vec(&self) -> Vec<T> {
        match self {
            VArray::Span(values) => values.to_vec(),
            VArray::Single { value, len } => vec![*value; *len],
            _ => {
                let mut dst = vec![T::default(); self.len()];
                self.materialize(&IndexMask::full(dst.len()), &mut dst);
                dst
            }
        }
    }

    pub fn iter(&self) -> VArrayIter<'_, 'a, T> {
        VArrayIter {
            varray: self,
            index: 0,
        }
    }

    /// Lazily convert each element.
    pub fn map<U>(self, f: impl Fn(T) -> U + Send + Sync + 'a) -> VArray<'a, U>
    where
        U: Copy + Default + Send + Sync + 'a,
    {
        if let Some(value) = self.as_single() {
            return VArray::from_single(f(value), self.len());
        }
        let len = self.len();
        VArray::from_func(len, move |i| f(self.get(i)))
    }
}

/// Iterator over the elements of a [`VArray`].
pub struct VArrayIter<'s, 'a, T: Clone> {
    varray: &'s VArray<'a, T>,
    index: usize,
}

impl<'a, T: Copy + Default + Send + Sync + 'a> Iterator for VArrayIter<'_, 'a, T> {
    type Item = T;

    fn next(&mut self) -> Option<T> {
        if self.index >= self.varray.len() {
            return None;
        }
        let value = self.varray.get(self.index);
        self.index += 1;
        Some(value)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.varray.len() - self.index;
        (remaining, Some(remaining))
    }
}

impl<'a, T: Copy + Default + Send + Sync + 'a> ExactSizeIterator for VArrayIter<'_, 'a, T> {}

impl<T: Copy + Default + Send + Sync + fmt::Debug> fmt::Debug for VArray<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self {
            VArray::Span(_) => "Span",
            VArray::Single { .. } => "Single",
            VArray::Segmented(_) => "Segmented",
            VArray::Derived(_) => "Derived",
            VArray::Func { .. } => "Func",
        };
        write!(f, "VArray::{kind}(len={})", self.len())
    }
}

// ============================================================================
// VMutableArray
// ============================================================================

/// Read/write virtual array.
pub enum VMutableArray<'a, T> {
    Span(&'a mut [T]),
    Segmented(SegmentedViewMut<'a, T>),
    Derived(Box<dyn VMutableArrayImpl<T> + 'a>),
}

impl<'a, T: Copy + Default + Send + Sync + 'a> VMutableArray<'a, T> {
    #[inline]
    pub fn from_span(values: &'a mut [T]) -> Self {
        Self::Span(values)
    }

    pub fn from_derived_span<S: Send + Sync + 'a>(
        data: &'a mut [S],
        get: fn(&S) -> T,
        set: fn(&mut S, T),
    ) -> Self {
        Self::Derived(Box::new(DerivedSpanMut::new(data, get, set)))
    }

    pub fn from_impl(imp: impl VMutableArrayImpl<T> + 'a) -> Self {
        Self::Derived(Box::new(imp))
    }

    pub fn len(&self) -> usize {
        match self {
            VMutableArray::Span(values) => values.len(),
            VMutableArray::Segmented(view) => view.len(),
            VMutableArray::Derived(imp) => imp.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[inline]
    pub fn get(&self, index: usize) -> T {
        match self {
            VMutableArray::Span(values) => values[index],
            VMutableArray::Segmented(view) => view.get(index),
            VMutableArray::Derived(imp) => imp.get(index),
        }
    }

    #[inline]
    pub fn set(&mut self, index: usize, value: T) {
        match self {
            VMutableArray::Span(values) => values[index] = value,
            VMutableArray::Segmented(view) => view.set(index, value),
            VMutableArray::Derived(imp) => imp.set(index, value),
        }
    }

    /// Overwrite all values. `src` must match [`len`](Self::len).
    pub fn set_all(&mut self, src: &[T]) {
        debug_assert_eq!(src.len(), self.len());
        match self {
            VMutableArray::Span(values) => values.copy_from_slice(src),
            VMutableArray::Segmented(view) => view.set_all(src),
            VMutableArray::Derived(imp) => imp.set_all(src),
        }
    }

    /// Overwrite all values from another virtual array of the same length.
    pub fn set_from(&mut self, src: &VArray<'_, T>) {
        match src.as_span() {
            Some(values) => self.set_all(values),
            None => self.set_all(&src.to_vec()),
        }
    }

    pub fn fill(&mut self, value: T) {
        for i in 0..self.len() {
            self.set(i, value);
        }
    }

    /// Contiguous storage, if the array has one.
    pub fn as_span_mut(&mut self) -> Option<&mut [T]> {
        match self {
            VMutableArray::Span(values) => Some(values),
            _ => None,
        }
    }

    pub fn materialize(&self, mask: &IndexMask, dst: &mut [T]) {
        match self {
            VMutableArray::Segmented(view) => view.materialize(mask, dst),
            _ => {
                for i in mask {
                    dst[i] = self.get(i);
                }
            }
        }
    }

    pub fn to_vec(&self) -> Vec<T> {
        let mut dst = vec![T::default(); self.len()];
        self.materialize(&IndexMask::full(dst.len()), &mut dst);
        dst
    }
}

impl<T> fmt::Debug for VMutableArray<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self {
            VMutableArray::Span(_) => "Span",
            VMutableArray::Segmented(_) => "Segmented",
            VMutableArray::Derived(_) => "Derived",
        };
        write!(f, "VMutableArray::{kind}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attribute::OffsetIndices;

    #[derive(Clone, Copy, Default)]
    struct Item {
        value: i32,
        dirty: bool,
    }

    #[test]
    fn test_span_and_single() {
        let data = [1, 2, 3];
        let span = VArray::from_span(&data[..]);
        assert_eq!(span.get(1), 2);
        assert_eq!(span.as_span(), Some(&data[..]));

        let single = VArray::from_single(5.0f32, 3);
        assert_eq!(single.to_vec(), vec![5.0, 5.0, 5.0]);
        assert_eq!(single.as_single(), Some(5.0));
    }

    #[test]
    fn test_derived_span_roundtrip() {
        let mut items = vec![Item::default(); 3];
        {
            let mut varray = VMutableArray::from_derived_span(
                &mut items[..],
                |item: &Item| item.value,
                |item: &mut Item, v| {
                    if item.value != v {
                        item.value = v;
                        item.dirty = true;
                    }
                },
            );
            varray.set(0, 0);
            varray.set(2, 9);
            assert_eq!(varray.get(2), 9);
        }
        assert!(!items[0].dirty);
        assert!(items[2].dirty);

        let read = VArray::from_derived_span(&items[..], |item: &Item| item.value * 2);
        assert_eq!(read.to_vec(), vec![0, 0, 18]);
    }

    #[test]
    fn test_func_and_map() {
        let varray = VArray::from_func(4, |i| i as i32 * 10);
        assert_eq!(varray.get(3), 30);
        assert_eq!(varray.iter().len(), 4);
        assert_eq!(varray.iter().filter(|v| v % 20 == 0).collect::<Vec<_>>(), vec![0, 20]);
        let mapped = varray.map(|v| v as f32 / 10.0);
        assert_eq!(mapped.to_vec(), vec![0.0, 1.0, 2.0, 3.0]);
    }

    #[test]
    fn test_segmented_backend() {
        let a = [1.0f32];
        let b = [2.0f32, 3.0];
        let view = SegmentedView::new(OffsetIndices::from_counts([1, 2]), [Some(&a[..]), Some(&b[..])]);
        let varray = VArray::Segmented(view);
        assert_eq!(varray.to_vec(), vec![1.0, 2.0, 3.0]);
        assert!(varray.as_span().is_none());
    }

    #[test]
    fn test_mutable_set_from() {
        let mut data = vec![0; 3];
        {
            let mut varray = VMutableArray::from_span(&mut data[..]);
            varray.set_from(&VArray::from_single(4, 3));
            varray.set(1, 1);
        }
        assert_eq!(data, vec![4, 1, 4]);
    }
}
