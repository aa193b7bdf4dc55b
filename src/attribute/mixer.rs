//! Weighted mixing of attribute values, used by domain interpolation.

use super::{AttributeType, OffsetIndices, VArray};

/// Accumulates weighted values per destination element, then averages.
///
/// Elements that never receive a value keep the type's default.
pub struct DefaultMixer<'b, T: AttributeType> {
    buffer: &'b mut [T],
    accumulators: Vec<T::Accumulator>,
    weights: Vec<f32>,
}

impl<'b, T: AttributeType> DefaultMixer<'b, T> {
    pub fn new(buffer: &'b mut [T]) -> Self {
        let len = buffer.len();
        Self {
            buffer,
            accumulators: vec![T::Accumulator::default(); len],
            weights: vec![0.0; len],
        }
    }

    #[inline]
    pub fn mix_in(&mut self, index: usize, value: T, weight: f32) {
        T::accumulate(&mut self.accumulators[index], value, weight);
        self.weights[index] += weight;
    }

    /// Write the averages into the buffer.
    pub fn finalize(self) {
        for ((dst, acc), weight) in self.buffer.iter_mut().zip(self.accumulators).zip(self.weights) {
            *dst = if weight > 0.0 { T::mix_finish(acc, weight) } else { T::default() };
        }
    }
}

/// Mean of each segment of `src`. Empty segments get the default value.
pub fn mix_segments<T: AttributeType>(src: &VArray<'_, T>, offsets: &OffsetIndices) -> Vec<T> {
    let mut result = vec![T::default(); offsets.segments_num()];
    let mut mixer = DefaultMixer::new(&mut result);
    for segment in 0..offsets.segments_num() {
        for i in offsets.range(segment) {
            mixer.mix_in(segment, src.get(i), 1.0);
        }
    }
    mixer.finalize();
    result
}

/// True for a segment only if every value in it is true.
///
/// An empty segment has no false value, so it is true.
pub fn all_true_segments(src: &VArray<'_, bool>, offsets: &OffsetIndices) -> Vec<bool> {
    (0..offsets.segments_num())
        .map(|segment| offsets.range(segment).all(|i| src.get(i)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::util::Vec3;

    #[test]
    fn test_mean_per_segment() {
        let values = VArray::from_vec(vec![1.0f32, 3.0, 2.0, 2.0, 2.0]);
        let offsets = OffsetIndices::from_counts([2, 3]);
        assert_eq!(mix_segments(&values, &offsets), vec![2.0, 2.0]);
    }

    #[test]
    fn test_untouched_keep_default() {
        let mut buffer = vec![Vec3::ONE; 3];
        let mut mixer = DefaultMixer::new(&mut buffer);
        mixer.mix_in(0, Vec3::X, 1.0);
        mixer.mix_in(0, Vec3::Y, 3.0);
        mixer.finalize();
        assert_eq!(buffer[0], Vec3::new(0.25, 0.75, 0.0));
        assert_eq!(buffer[1], Vec3::ZERO);
    }

    #[test]
    fn test_all_true() {
        let values = VArray::from_vec(vec![true, true, true, false, true]);
        let offsets = OffsetIndices::from_counts([2, 3, 0]);
        assert_eq!(all_true_segments(&values, &offsets), vec![true, false, true]);
    }
}
