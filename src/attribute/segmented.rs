//! Offset tables and segmented views.
//!
//! A segmented view exposes many per-substructure buffers (one per spline, for
//! example) as one flat sequence. The offset table `[0, n0, n0 + n1, ...]` maps
//! a flat index to its segment with a binary search.

use std::mem::MaybeUninit;
use std::ops::Range;
use std::sync::Arc;

use smallvec::SmallVec;

use super::IndexMask;

// ============================================================================
// Offsets
// ============================================================================

/// Shared, non-decreasing offset table. Always holds at least one entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OffsetIndices {
    offsets: Arc<[usize]>,
}

impl OffsetIndices {
    /// Build offsets from per-segment sizes.
    pub fn from_counts(counts: impl IntoIterator<Item = usize>) -> Self {
        let mut offsets = vec![0];
        let mut total = 0;
        for count in counts {
            total += count;
            offsets.push(total);
        }
        Self { offsets: offsets.into() }
    }

    /// Wrap an existing offset table. An empty table is treated as `[0]`.
    pub fn from_offsets(offsets: Vec<usize>) -> Self {
        debug_assert!(offsets.windows(2).all(|w| w[0] <= w[1]));
        if offsets.is_empty() {
            return Self::from_counts([]);
        }
        Self { offsets: offsets.into() }
    }

    /// Total number of elements over all segments.
    #[inline]
    pub fn total_size(&self) -> usize {
        self.offsets[self.offsets.len() - 1]
    }

    #[inline]
    pub fn segments_num(&self) -> usize {
        self.offsets.len() - 1
    }

    /// Flat index range of a segment.
    #[inline]
    pub fn range(&self, segment: usize) -> Range<usize> {
        self.offsets[segment]..self.offsets[segment + 1]
    }

    #[inline]
    pub fn size(&self, segment: usize) -> usize {
        self.offsets[segment + 1] - self.offsets[segment]
    }

    #[inline]
    pub fn as_slice(&self) -> &[usize] {
        &self.offsets
    }

    /// Segment containing the flat `index` (upper bound minus one).
    ///
    /// Empty segments never contain an index, so they are skipped.
    #[inline]
    pub fn segment_of(&self, index: usize) -> usize {
        debug_assert!(index < self.total_size());
        self.offsets.partition_point(|&o| o <= index) - 1
    }
}

// ============================================================================
// Shared read logic
// ============================================================================

trait SegmentSource<T: Copy + Default> {
    fn offsets(&self) -> &OffsetIndices;
    fn segment(&self, index: usize) -> Option<&[T]>;

    fn get_flat(&self, index: usize) -> T {
        let offsets = self.offsets();
        let segment = offsets.segment_of(index);
        match self.segment(segment) {
            Some(values) => values[index - offsets.as_slice()[segment]],
            None => T::default(),
        }
    }

    fn is_full(&self, mask: &IndexMask) -> bool {
        mask.as_range() == Some(0..self.offsets().total_size())
    }

    fn materialize_flat(&self, mask: &IndexMask, dst: &mut [T]) {
        let offsets = self.offsets();
        if self.is_full(mask) {
            for segment in 0..offsets.segments_num() {
                let range = offsets.range(segment);
                match self.segment(segment) {
                    Some(values) => dst[range].copy_from_slice(values),
                    None => dst[range].fill(T::default()),
                }
            }
            return;
        }
        debug_assert!(mask.is_monotonic());
        let bounds = offsets.as_slice();
        let mut segment = 0;
        for index in mask {
            while index >= bounds[segment + 1] {
                segment += 1;
            }
            dst[index] = match self.segment(segment) {
                Some(values) => values[index - bounds[segment]],
                None => T::default(),
            };
        }
    }

    fn materialize_flat_uninit(&self, mask: &IndexMask, dst: &mut [MaybeUninit<T>]) {
        let offsets = self.offsets();
        if self.is_full(mask) {
            for segment in 0..offsets.segments_num() {
                let range = offsets.range(segment);
                match self.segment(segment) {
                    Some(values) => {
                        for (slot, &value) in dst[range].iter_mut().zip(values) {
                            slot.write(value);
                        }
                    }
                    None => {
                        for slot in &mut dst[range] {
                            slot.write(T::default());
                        }
                    }
                }
            }
            return;
        }
        debug_assert!(mask.is_monotonic());
        let bounds = offsets.as_slice();
        let mut segment = 0;
        for index in mask {
            while index >= bounds[segment + 1] {
                segment += 1;
            }
            let value = match self.segment(segment) {
                Some(values) => values[index - bounds[segment]],
                None => T::default(),
            };
            dst[index].write(value);
        }
    }
}

fn check_segments(offsets: &OffsetIndices, sizes: impl ExactSizeIterator<Item = Option<usize>>) {
    debug_assert_eq!(sizes.len(), offsets.segments_num());
    for (i, size) in sizes.enumerate() {
        if let Some(size) = size {
            debug_assert_eq!(size, offsets.size(i), "segment {i} has the wrong length");
        }
    }
}

// ============================================================================
// Read-only view
// ============================================================================

/// Read-only flat view over several buffers.
///
/// A `None` segment reads as the type's default value.
#[derive(Debug, Clone)]
pub struct SegmentedView<'a, T> {
    segments: SmallVec<[Option<&'a [T]>; 4]>,
    offsets: OffsetIndices,
}

impl<'a, T: Copy + Default> SegmentedView<'a, T> {
    pub fn new(offsets: OffsetIndices, segments: impl IntoIterator<Item = Option<&'a [T]>>) -> Self {
        let segments: SmallVec<[Option<&'a [T]>; 4]> = segments.into_iter().collect();
        check_segments(&offsets, segments.iter().map(|s| s.map(<[T]>::len)));
        Self { segments, offsets }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.offsets.total_size()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[inline]
    pub fn offsets(&self) -> &OffsetIndices {
        &self.offsets
    }

    #[inline]
    pub fn get(&self, index: usize) -> T {
        self.get_flat(index)
    }

    /// Copy the selected values into `dst`, which must be large enough for the mask.
    pub fn materialize(&self, mask: &IndexMask, dst: &mut [T]) {
        self.materialize_flat(mask, dst);
    }

    /// Like [`materialize`](Self::materialize) but initializes the destination.
    pub fn materialize_to_uninitialized(&self, mask: &IndexMask, dst: &mut [MaybeUninit<T>]) {
        self.materialize_flat_uninit(mask, dst);
    }
}

impl<T: Copy + Default> SegmentSource<T> for SegmentedView<'_, T> {
    fn offsets(&self) -> &OffsetIndices {
        &self.offsets
    }

    fn segment(&self, index: usize) -> Option<&[T]> {
        self.segments[index]
    }
}

// ============================================================================
// Mutable view
// ============================================================================

/// Mutable flat view over several buffers. Writes into `None` segments are dropped.
#[derive(Debug)]
pub struct SegmentedViewMut<'a, T> {
    segments: SmallVec<[Option<&'a mut [T]>; 4]>,
    offsets: OffsetIndices,
}

impl<'a, T: Copy + Default> SegmentedViewMut<'a, T> {
    pub fn new(offsets: OffsetIndices, segments: impl IntoIterator<Item = Option<&'a mut [T]>>) -> Self {
        let segments: SmallVec<[Option<&'a mut [T]>; 4]> = segments.into_iter().collect();
        check_segments(&offsets, segments.iter().map(|s| s.as_ref().map(|s| s.len())));
        Self { segments, offsets }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.offsets.total_size()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[inline]
    pub fn offsets(&self) -> &OffsetIndices {
        &self.offsets
    }

    #[inline]
    pub fn get(&self, index: usize) -> T {
        self.get_flat(index)
    }

    pub fn set(&mut self, index: usize, value: T) {
        let segment = self.offsets.segment_of(index);
        let start = self.offsets.as_slice()[segment];
        if let Some(values) = self.segments[segment].as_deref_mut() {
            values[index - start] = value;
        }
    }

    /// Overwrite every element from a flat buffer of length [`len`](Self::len).
    pub fn set_all(&mut self, src: &[T]) {
        debug_assert_eq!(src.len(), self.len());
        for (segment, values) in self.segments.iter_mut().enumerate() {
            if let Some(values) = values.as_deref_mut() {
                values.copy_from_slice(&src[self.offsets.range(segment)]);
            }
        }
    }

    pub fn materialize(&self, mask: &IndexMask, dst: &mut [T]) {
        self.materialize_flat(mask, dst);
    }

    pub fn materialize_to_uninitialized(&self, mask: &IndexMask, dst: &mut [MaybeUninit<T>]) {
        self.materialize_flat_uninit(mask, dst);
    }
}

impl<T: Copy + Default> SegmentSource<T> for SegmentedViewMut<'_, T> {
    fn offsets(&self) -> &OffsetIndices {
        &self.offsets
    }

    fn segment(&self, index: usize) -> Option<&[T]> {
        self.segments[index].as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_offsets_with_empty_segment() {
        let offsets = OffsetIndices::from_counts([2, 0, 3]);
        assert_eq!(offsets.as_slice(), &[0, 2, 2, 5]);
        assert_eq!(offsets.segment_of(0), 0);
        assert_eq!(offsets.segment_of(1), 0);
        assert_eq!(offsets.segment_of(2), 2);
        assert_eq!(offsets.segment_of(4), 2);
        assert_eq!(offsets.range(1), 2..2);
    }

    #[test]
    fn test_full_materialize_fills_missing() {
        let a = [1.0f32, 2.0];
        let c = [3.0f32, 4.0, 5.0];
        let offsets = OffsetIndices::from_counts([2, 1, 3]);
        let view = SegmentedView::new(offsets, [Some(&a[..]), None, Some(&c[..])]);
        let mut dst = vec![-1.0; view.len()];
        view.materialize(&IndexMask::full(view.len()), &mut dst);
        assert_eq!(dst, vec![1.0, 2.0, 0.0, 3.0, 4.0, 5.0]);
    }

    #[test]
    fn test_masked_materialize() {
        let a = [1, 2];
        let c = [3, 4, 5];
        let view = SegmentedView::new(OffsetIndices::from_counts([2, 0, 3]), [Some(&a[..]), Some(&[][..]), Some(&c[..])]);
        let mut dst = vec![0; 5];
        view.materialize(&IndexMask::from_indices(vec![1, 4]), &mut dst);
        assert_eq!(dst, vec![0, 2, 0, 0, 5]);

        let mut uninit = vec![MaybeUninit::uninit(); 5];
        view.materialize_to_uninitialized(&IndexMask::full(5), &mut uninit);
        let values: Vec<i32> = uninit.into_iter().map(|v| unsafe { v.assume_init() }).collect();
        assert_eq!(values, vec![1, 2, 3, 4, 5]);
    }

    #[test]
    fn test_masked_materialize_crosses_segments() {
        let a = [1, 2];
        let c = [3, 4, 5];
        let e = [6];
        let offsets = OffsetIndices::from_counts([2, 0, 3, 1, 1]);
        let view = SegmentedView::new(offsets, [Some(&a[..]), Some(&[][..]), Some(&c[..]), None, Some(&e[..])]);

        // Partial range: not the whole-range fast path.
        let mut dst = vec![-1; 7];
        view.materialize(&IndexMask::Range(1..6), &mut dst);
        assert_eq!(dst, vec![-1, 2, 3, 4, 5, 0, -1]);

        // Sparse indices skipping whole segments.
        let mask = IndexMask::from_indices(vec![6, 0, 3, 5]);
        let mut uninit = vec![MaybeUninit::new(-1); 7];
        view.materialize_to_uninitialized(&mask, &mut uninit);
        let values: Vec<i32> = uninit.into_iter().map(|v| unsafe { v.assume_init() }).collect();
        assert_eq!(values, vec![1, -1, -1, 4, -1, 0, 6]);
    }

    #[test]
    fn test_mut_view_masked_materialize() {
        let mut a = [1.0f32, 2.0];
        let mut c = [3.0f32];
        let view = SegmentedViewMut::new(
            OffsetIndices::from_counts([2, 1, 1]),
            [Some(&mut a[..]), None, Some(&mut c[..])],
        );
        let mut dst = vec![9.0; 4];
        view.materialize(&IndexMask::from_indices(vec![1, 2, 3]), &mut dst);
        assert_eq!(dst, vec![9.0, 2.0, 0.0, 3.0]);

        let mut uninit = vec![MaybeUninit::new(9.0f32); 4];
        view.materialize_to_uninitialized(&IndexMask::from_indices(vec![0, 3]), &mut uninit);
        let values: Vec<f32> = uninit.into_iter().map(|v| unsafe { v.assume_init() }).collect();
        assert_eq!(values, vec![1.0, 9.0, 9.0, 3.0]);
    }

    #[test]
    fn test_mut_view_skips_missing() {
        let mut a = [0u8; 2];
        let mut c = [0u8; 1];
        {
            let mut view = SegmentedViewMut::new(
                OffsetIndices::from_counts([2, 2, 1]),
                [Some(&mut a[..]), None, Some(&mut c[..])],
            );
            view.set(1, 7);
            view.set(2, 9);
            view.set(4, 3);
            assert_eq!(view.get(2), 0);
            view.set_all(&[1, 1, 1, 1, 1]);
            view.set(0, 5);
        }
        assert_eq!(a, [5, 1]);
        assert_eq!(c, [1]);
    }
}
