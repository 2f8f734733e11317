use proptest::prelude::*;
use rand::rngs::StdRng;
use rand::SeedableRng;
use shardgraph_core::{cumulative, interval_weight, random_select, AliasTable, WeightedCollection};

fn weights(min: usize, max: usize) -> impl Strategy<Value = Vec<f32>> {
    proptest::collection::vec(0.0f32..100.0, min..=max)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(128))]

    #[test]
    fn alias_table_is_well_formed(ws in weights(1, 64)) {
        let sum: f32 = ws.iter().sum();
        prop_assume!(sum > 0.0);
        let normalized: Vec<f32> = ws.iter().map(|w| w / sum).collect();
        let table = AliasTable::new(&normalized);
        prop_assert_eq!(table.len(), ws.len());
        for &p in table.probabilities() {
            prop_assert!((0.0..=1.0).contains(&p));
        }
        for &a in table.aliases() {
            prop_assert!((a as usize) < ws.len());
        }
    }

    #[test]
    fn collection_draws_carry_stored_weight(ws in weights(1, 32), seed in any::<u64>()) {
        let ids: Vec<u32> = (0..ws.len() as u32).collect();
        let c = WeightedCollection::new(ids, ws.clone()).unwrap();
        let mut rng = StdRng::seed_from_u64(seed);
        if c.sum_weight() > 0.0 {
            for _ in 0..64 {
                let (id, w) = c.sample_with(&mut rng).unwrap();
                prop_assert_eq!(w, ws[id as usize]);
            }
        } else {
            prop_assert!(c.sample_with(&mut rng).is_none());
        }
    }

    #[test]
    fn random_select_lands_on_weighted_position(
        ws in weights(1, 32),
        a in 0usize..32,
        b in 0usize..32,
        seed in any::<u64>(),
    ) {
        let cum = cumulative(&ws);
        let (begin, end) = (a.min(b).min(ws.len()), a.max(b).min(ws.len()));
        let mut rng = StdRng::seed_from_u64(seed);
        match random_select(&mut rng, &cum, begin, end) {
            Some(pos) => {
                prop_assert!(pos >= begin && pos < end);
                prop_assert!(interval_weight(&cum, begin, end) > 0.0);
            }
            None => prop_assert!(interval_weight(&cum, begin, end) <= 0.0),
        }
    }
}
