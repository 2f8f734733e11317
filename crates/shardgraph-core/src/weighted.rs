//! Weighted bags with O(1) sampling, plus interval draws over cumulative
//! weight arrays.

use rand::Rng;

use crate::alias::AliasTable;
use crate::error::{CoreError, Result};

/// Ids with per-id weights and an alias sampler over `weight / sum_weight`.
///
/// Sampling is with replacement and returns the stored (unnormalized) weight.
#[derive(Debug, Clone)]
pub struct WeightedCollection<T> {
    ids: Vec<T>,
    weights: Vec<f32>,
    sum_weight: f32,
    alias: AliasTable,
}

impl<T> Default for WeightedCollection<T> {
    fn default() -> Self {
        Self {
            ids: Vec::new(),
            weights: Vec::new(),
            sum_weight: 0.0,
            alias: AliasTable::default(),
        }
    }
}

impl<T: Copy> WeightedCollection<T> {
    pub fn new(ids: Vec<T>, weights: Vec<f32>) -> Result<Self> {
        if ids.len() != weights.len() {
            return Err(CoreError::LengthMismatch {
                ids: ids.len(),
                weights: weights.len(),
            });
        }
        if let Some((index, &weight)) = weights
            .iter()
            .enumerate()
            .find(|(_, w)| !w.is_finite() || **w < 0.0)
        {
            return Err(CoreError::InvalidWeight { index, weight });
        }

        let sum_weight: f32 = weights.iter().sum();
        let alias = if sum_weight > 0.0 {
            let normalized: Vec<f32> = weights.iter().map(|w| w / sum_weight).collect();
            AliasTable::new(&normalized)
        } else {
            AliasTable::default()
        };

        Ok(Self {
            ids,
            weights,
            sum_weight,
            alias,
        })
    }

    pub fn from_pairs<I>(pairs: I) -> Result<Self>
    where
        I: IntoIterator<Item = (T, f32)>,
    {
        let (ids, weights): (Vec<T>, Vec<f32>) = pairs.into_iter().unzip();
        Self::new(ids, weights)
    }

    /// Weighted draw with replacement. `None` when the bag is empty or
    /// carries no weight.
    pub fn sample(&self) -> Option<(T, f32)> {
        self.sample_with(&mut rand::thread_rng())
    }

    pub fn sample_with<R: Rng + ?Sized>(&self, rng: &mut R) -> Option<(T, f32)> {
        let column = self.alias.sample_with(rng)?;
        Some((self.ids[column], self.weights[column]))
    }

    pub fn get(&self, idx: usize) -> Option<(T, f32)> {
        Some((*self.ids.get(idx)?, self.weights[idx]))
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn sum_weight(&self) -> f32 {
        self.sum_weight
    }

    pub fn ids(&self) -> &[T] {
        &self.ids
    }

    pub fn weights(&self) -> &[f32] {
        &self.weights
    }

    pub fn iter(&self) -> impl Iterator<Item = (T, f32)> + '_ {
        self.ids.iter().copied().zip(self.weights.iter().copied())
    }
}

/// Running prefix sum of `weights`.
pub fn cumulative(weights: &[f32]) -> Vec<f32> {
    let mut acc = 0.0f32;
    weights
        .iter()
        .map(|w| {
            acc += w;
            acc
        })
        .collect()
}

/// Per-element weight at `i` of a cumulative array.
#[inline]
pub fn weight_at(cum_weights: &[f32], i: usize) -> f32 {
    if i == 0 {
        cum_weights[0]
    } else {
        cum_weights[i] - cum_weights[i - 1]
    }
}

/// Total weight of `cum_weights[begin..end]`.
#[inline]
pub fn interval_weight(cum_weights: &[f32], begin: usize, end: usize) -> f32 {
    if begin >= end {
        return 0.0;
    }
    let lo = if begin == 0 { 0.0 } else { cum_weights[begin - 1] };
    cum_weights[end - 1] - lo
}

/// Draw a position in `[begin, end)` with probability proportional to its
/// per-element weight, by binary search on the cumulative array.
///
/// Returns `None` for an empty or weightless interval.
pub fn random_select<R: Rng + ?Sized>(
    rng: &mut R,
    cum_weights: &[f32],
    begin: usize,
    end: usize,
) -> Option<usize> {
    if begin >= end || end > cum_weights.len() {
        return None;
    }
    let lo = if begin == 0 { 0.0 } else { cum_weights[begin - 1] };
    let hi = cum_weights[end - 1];
    if hi - lo <= 0.0 {
        return None;
    }
    let r = lo + rng.gen::<f32>() * (hi - lo);
    let cum = &cum_weights[begin..end];
    let mut offset = cum.partition_point(|&c| c <= r);
    if offset == cum.len() {
        // r rounded onto the upper bound: take the element that reached it
        offset = cum.partition_point(|&c| c < hi);
    }
    Some(begin + offset)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_rejects_length_mismatch() {
        let err = WeightedCollection::new(vec![1u64, 2], vec![1.0]).unwrap_err();
        assert_eq!(err, CoreError::LengthMismatch { ids: 2, weights: 1 });
    }

    #[test]
    fn test_rejects_negative_weight() {
        let err = WeightedCollection::new(vec![1u64, 2], vec![1.0, -2.0]).unwrap_err();
        assert!(matches!(err, CoreError::InvalidWeight { index: 1, .. }));
    }

    #[test]
    fn test_sample_returns_original_weight() {
        let c = WeightedCollection::new(vec![10u64, 20, 30], vec![1.0, 2.0, 3.0]).unwrap();
        assert_relative_eq!(c.sum_weight(), 6.0);
        for _ in 0..200 {
            let (id, w) = c.sample().unwrap();
            match id {
                10 => assert_eq!(w, 1.0),
                20 => assert_eq!(w, 2.0),
                30 => assert_eq!(w, 3.0),
                other => panic!("unexpected id {other}"),
            }
        }
    }

    #[test]
    fn test_weightless_collection_does_not_sample() {
        let c = WeightedCollection::new(vec![1u32, 2], vec![0.0, 0.0]).unwrap();
        assert_eq!(c.len(), 2);
        assert_eq!(c.sample(), None);
        assert_eq!(WeightedCollection::<u32>::default().sample(), None);
    }

    #[test]
    fn test_sample_frequencies_follow_weights() {
        let c = WeightedCollection::from_pairs([(0u32, 2.0), (1, 4.0), (2, 8.0)]).unwrap();
        let mut rng = StdRng::seed_from_u64(3);
        let mut counts = [0usize; 3];
        for _ in 0..100_000 {
            counts[c.sample_with(&mut rng).unwrap().0 as usize] += 1;
        }
        let r10 = counts[1] as f64 / counts[0] as f64;
        let r21 = counts[2] as f64 / counts[1] as f64;
        assert!((1.8..2.2).contains(&r10), "{r10}");
        assert!((1.8..2.2).contains(&r21), "{r21}");
    }

    #[test]
    fn test_cumulative_helpers() {
        let cum = cumulative(&[2.0, 4.0, 8.0]);
        assert_eq!(cum, vec![2.0, 6.0, 14.0]);
        assert_eq!(weight_at(&cum, 0), 2.0);
        assert_eq!(weight_at(&cum, 2), 8.0);
        assert_eq!(interval_weight(&cum, 1, 3), 12.0);
        assert_eq!(interval_weight(&cum, 2, 2), 0.0);
    }

    #[test]
    fn test_random_select_stays_in_interval() {
        let cum = cumulative(&[1.0, 1.0, 5.0, 1.0, 1.0]);
        let mut rng = StdRng::seed_from_u64(5);
        for _ in 0..1_000 {
            let pos = random_select(&mut rng, &cum, 1, 4).unwrap();
            assert!((1..4).contains(&pos));
        }
        assert_eq!(random_select(&mut rng, &cum, 2, 2), None);
    }

    /// Always yields the upper bound, as a rounded-up draw would.
    struct Ceiling;

    impl rand::RngCore for Ceiling {
        fn next_u32(&mut self) -> u32 {
            u32::MAX
        }

        fn next_u64(&mut self) -> u64 {
            u64::MAX
        }

        fn fill_bytes(&mut self, dest: &mut [u8]) {
            dest.fill(0xff);
        }

        fn try_fill_bytes(&mut self, dest: &mut [u8]) -> std::result::Result<(), rand::Error> {
            self.fill_bytes(dest);
            Ok(())
        }
    }

    #[test]
    fn test_random_select_upper_bound_skips_trailing_zero_weights() {
        let cum = cumulative(&[1.0, 3.0, 0.0, 0.0]);
        assert_eq!(random_select(&mut Ceiling, &cum, 0, 4), Some(1));
        // 1000 + 3 * (1 - 2^-24) rounds to exactly 1003
        let cum = cumulative(&[1000.0, 3.0, 0.0, 0.0]);
        assert_eq!(random_select(&mut Ceiling, &cum, 1, 4), Some(1));
        let cum = cumulative(&[2.0]);
        assert_eq!(random_select(&mut Ceiling, &cum, 0, 1), Some(0));
    }

    #[test]
    fn test_random_select_skips_zero_weight_positions() {
        let cum = cumulative(&[0.0, 3.0, 0.0, 1.0]);
        let mut rng = StdRng::seed_from_u64(9);
        for _ in 0..5_000 {
            let pos = random_select(&mut rng, &cum, 0, 4).unwrap();
            assert!(pos == 1 || pos == 3, "drew zero-weight position {pos}");
        }
    }
}
