//! Walker/Vose alias tables for O(1) weighted draws.
//!
//! Construction is a single small/large bucket sweep over the normalized
//! distribution. A draw picks a uniform column and flips a biased coin
//! between the column itself and its alias.

use rand::Rng;

/// Alias table over `n` outcomes.
///
/// Invariant: `prob.len() == alias.len()` and every `prob[i]` lies in `[0, 1]`.
#[derive(Debug, Clone, Default)]
pub struct AliasTable {
    prob: Vec<f32>,
    alias: Vec<u32>,
}

impl AliasTable {
    /// Build a table from probabilities that sum to (approximately) one.
    pub fn new(probabilities: &[f32]) -> Self {
        let n = probabilities.len();
        let mut prob = vec![0.0f32; n];
        let mut alias = vec![0u32; n];
        if n == 0 {
            return Self { prob, alias };
        }

        let avg = 1.0 / n as f64;
        let mut mass: Vec<f64> = probabilities.iter().map(|&p| f64::from(p)).collect();
        let mut small = Vec::with_capacity(n);
        let mut large = Vec::with_capacity(n);
        for (i, &p) in mass.iter().enumerate() {
            if p > avg {
                large.push(i);
            } else {
                small.push(i);
            }
        }

        while let (Some(&less), Some(&more)) = (small.last(), large.last()) {
            small.pop();
            large.pop();
            prob[less] = (mass[less] * n as f64).clamp(0.0, 1.0) as f32;
            alias[less] = more as u32;
            mass[more] = mass[more] + mass[less] - avg;
            if mass[more] > avg {
                large.push(more);
            } else {
                small.push(more);
            }
        }
        for i in small.into_iter().chain(large) {
            prob[i] = 1.0;
        }

        Self { prob, alias }
    }

    pub fn len(&self) -> usize {
        self.prob.len()
    }

    pub fn is_empty(&self) -> bool {
        self.prob.is_empty()
    }

    /// Draw one column index using the thread-local generator.
    ///
    /// Returns `None` for an empty table.
    pub fn sample(&self) -> Option<usize> {
        self.sample_with(&mut rand::thread_rng())
    }

    pub fn sample_with<R: Rng + ?Sized>(&self, rng: &mut R) -> Option<usize> {
        if self.prob.is_empty() {
            return None;
        }
        let column = rng.gen_range(0..self.prob.len());
        let coin: f32 = rng.gen();
        if coin < self.prob[column] {
            Some(column)
        } else {
            Some(self.alias[column] as usize)
        }
    }

    /// Per-column acceptance probabilities.
    pub fn probabilities(&self) -> &[f32] {
        &self.prob
    }

    pub fn aliases(&self) -> &[u32] {
        &self.alias
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_empty_table_never_samples() {
        let table = AliasTable::new(&[]);
        assert!(table.is_empty());
        assert_eq!(table.sample(), None);
    }

    #[test]
    fn test_probabilities_stay_in_unit_interval() {
        let table = AliasTable::new(&[0.05, 0.15, 0.3, 0.5]);
        assert_eq!(table.len(), 4);
        for &p in table.probabilities() {
            assert!((0.0..=1.0).contains(&p), "prob {p} out of range");
        }
        for &a in table.aliases() {
            assert!((a as usize) < table.len());
        }
    }

    #[test]
    fn test_draws_converge_to_distribution() {
        let dist = [0.1f32, 0.2, 0.3, 0.4];
        let table = AliasTable::new(&dist);
        let mut rng = StdRng::seed_from_u64(7);
        let draws = 100_000;
        let mut counts = [0usize; 4];
        for _ in 0..draws {
            counts[table.sample_with(&mut rng).unwrap()] += 1;
        }
        for (i, &expected) in dist.iter().enumerate() {
            let observed = counts[i] as f64 / draws as f64;
            let ratio = observed / f64::from(expected);
            assert!((0.9..1.1).contains(&ratio), "outcome {i}: ratio {ratio}");
        }
    }

    #[test]
    fn test_single_outcome_always_drawn() {
        let table = AliasTable::new(&[1.0]);
        for _ in 0..100 {
            assert_eq!(table.sample(), Some(0));
        }
    }

    #[test]
    fn test_zero_mass_outcome_is_never_drawn() {
        let table = AliasTable::new(&[0.0, 0.5, 0.5]);
        let mut rng = StdRng::seed_from_u64(11);
        for _ in 0..10_000 {
            assert_ne!(table.sample_with(&mut rng), Some(0));
        }
    }
}
