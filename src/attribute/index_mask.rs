//! Sorted index selections used by masked materialization.

use std::ops::Range;

/// A set of element indices, either a contiguous range or a sorted list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IndexMask {
    Range(Range<usize>),
    Indices(Vec<usize>),
}

impl IndexMask {
    /// Mask covering `0..size`.
    #[inline]
    pub fn full(size: usize) -> Self {
        Self::Range(0..size)
    }

    /// Mask from explicit indices. The list is sorted and deduplicated.
    pub fn from_indices(mut indices: Vec<usize>) -> Self {
        indices.sort_unstable();
        indices.dedup();
        Self::Indices(indices)
    }

    /// Mask of all indices for which `predicate` is true.
    pub fn from_predicate(size: usize, predicate: impl Fn(usize) -> bool) -> Self {
        Self::Indices((0..size).filter(|&i| predicate(i)).collect())
    }

    /// Number of selected indices.
    pub fn len(&self) -> usize {
        match self {
            IndexMask::Range(r) => r.len(),
            IndexMask::Indices(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Contiguous range if the mask is one.
    pub fn as_range(&self) -> Option<Range<usize>> {
        match self {
            IndexMask::Range(r) => Some(r.clone()),
            IndexMask::Indices(v) => {
                let (&first, &last) = (v.first()?, v.last()?);
                (last - first + 1 == v.len()).then_some(first..last + 1)
            }
        }
    }

    /// Smallest buffer length that can hold every selected index.
    pub fn min_array_size(&self) -> usize {
        match self {
            IndexMask::Range(r) => r.end,
            IndexMask::Indices(v) => v.last().map_or(0, |&i| i + 1),
        }
    }

    /// True when indices only grow.
    pub fn is_monotonic(&self) -> bool {
        match self {
            IndexMask::Range(_) => true,
            IndexMask::Indices(v) => v.windows(2).all(|w| w[0] < w[1]),
        }
    }

    pub fn iter(&self) -> IndexMaskIter<'_> {
        match self {
            IndexMask::Range(r) => IndexMaskIter::Range(r.clone()),
            IndexMask::Indices(v) => IndexMaskIter::Slice(v.iter()),
        }
    }
}

/// Iterator over the indices of an [`IndexMask`].
pub enum IndexMaskIter<'a> {
    Range(Range<usize>),
    Slice(std::slice::Iter<'a, usize>),
}

impl Iterator for IndexMaskIter<'_> {
    type Item = usize;

    #[inline]
    fn next(&mut self) -> Option<usize> {
        match self {
            IndexMaskIter::Range(r) => r.next(),
            IndexMaskIter::Slice(s) => s.next().copied(),
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        match self {
            IndexMaskIter::Range(r) => r.size_hint(),
            IndexMaskIter::Slice(s) => s.size_hint(),
        }
    }
}

impl<'a> IntoIterator for &'a IndexMask {
    type Item = usize;
    type IntoIter = IndexMaskIter<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_indices_sorted() {
        let mask = IndexMask::from_indices(vec![4, 1, 1, 3]);
        assert_eq!(mask.iter().collect::<Vec<_>>(), vec![1, 3, 4]);
        assert_eq!(mask.min_array_size(), 5);
        assert!(mask.as_range().is_none());
        assert!(mask.is_monotonic());
    }

    #[test]
    fn test_contiguous_indices_as_range() {
        let mask = IndexMask::from_indices(vec![2, 3, 4]);
        assert_eq!(mask.as_range(), Some(2..5));
        assert_eq!(IndexMask::full(3).len(), 3);
    }

    #[test]
    fn test_predicate() {
        let mask = IndexMask::from_predicate(6, |i| i % 2 == 0);
        assert_eq!(mask.iter().collect::<Vec<_>>(), vec![0, 2, 4]);
    }
}
