//! Integration tests for the shard serving path
//!
//! These tests cover behavior across crates:
//! - Partial segments on disk → IndexManager → predicate search
//! - Index results → set algebra → weighted sampling
//! - Node records → neighbor sampling restricted to index candidates
//!
//! Run with: cargo test --test integration_tests

use std::collections::BTreeSet;
use std::fs;
use std::path::Path;

use shardgraph_graph::{Direction, Node, NodeFeatures, WeightedAdjacency};
use shardgraph_index::{
    DataType, HashRangeSampleIndex, HashSampleIndex, IndexKind, IndexManager, IndexMeta,
    IndexResult, LoaderConfig, RangeSampleIndex, SampleIndex, SearchOp,
};
use tempfile::tempdir;

// ============================================================================
// Fixture: a small user graph split over three partial files
// ============================================================================

struct User {
    id: u64,
    city: &'static str,
    age: i32,
    weight: f32,
}

const USERS: &[User] = &[
    User { id: 1, city: "paris", age: 21, weight: 1.0 },
    User { id: 2, city: "paris", age: 35, weight: 2.0 },
    User { id: 3, city: "oslo", age: 42, weight: 1.0 },
    User { id: 4, city: "lima", age: 19, weight: 4.0 },
    User { id: 5, city: "oslo", age: 27, weight: 2.0 },
    User { id: 6, city: "paris", age: 64, weight: 8.0 },
];

fn city_code(city: &str) -> u64 {
    match city {
        "paris" => 1,
        "oslo" => 2,
        _ => 3,
    }
}

fn write_partials(root: &Path, parts: usize) {
    let city_dir = root.join("city");
    let age_dir = root.join("age");
    let city_age_dir = root.join("city_age");
    IndexMeta::new(IndexKind::Hash, DataType::UInt64, DataType::String)
        .write(&city_dir)
        .unwrap();
    IndexMeta::new(IndexKind::Range, DataType::UInt64, DataType::Int32)
        .write(&age_dir)
        .unwrap();
    IndexMeta::new(IndexKind::HashRange, DataType::UInt64, DataType::Int32)
        .write(&city_age_dir)
        .unwrap();

    for part in 0..parts {
        let users: Vec<&User> = USERS.iter().filter(|u| u.id as usize % parts == part).collect();

        let mut city = HashSampleIndex::<u64, String>::new("city");
        let names: BTreeSet<&str> = users.iter().map(|u| u.city).collect();
        for name in names {
            let members: Vec<&&User> = users.iter().filter(|u| u.city == name).collect();
            city.add_item(
                name.to_string(),
                members.iter().map(|u| u.id).collect(),
                members.iter().map(|u| u.weight).collect(),
            )
            .unwrap();
        }

        let age = RangeSampleIndex::<u64, i32>::build(
            "age",
            users.iter().map(|u| u.id).collect(),
            users.iter().map(|u| u.age).collect(),
            users.iter().map(|u| u.weight).collect(),
        )
        .unwrap();

        let mut city_age = HashRangeSampleIndex::<u64, i32>::new("city_age");
        let codes: BTreeSet<u64> = users.iter().map(|u| city_code(u.city)).collect();
        for code in codes {
            let members: Vec<&&User> = users.iter().filter(|u| city_code(u.city) == code).collect();
            city_age
                .add_item(
                    code,
                    members.iter().map(|u| u.id).collect(),
                    members.iter().map(|u| u.age).collect(),
                    members.iter().map(|u| u.weight).collect(),
                )
                .unwrap();
        }

        let file = format!("part_{part}.dat");
        fs::write(city_dir.join(&file), city.serialize().unwrap()).unwrap();
        fs::write(age_dir.join(&file), age.serialize().unwrap()).unwrap();
        fs::write(city_age_dir.join(&file), city_age.serialize().unwrap()).unwrap();
    }
}

fn ids(result: &IndexResult) -> Vec<u64> {
    result.sorted_ids()
}

// ============================================================================
// Loading and querying
// ============================================================================

#[test]
fn test_partials_merge_into_one_queryable_shard() {
    let dir = tempdir().unwrap();
    write_partials(dir.path(), 3);
    let manager = IndexManager::load(dir.path(), &LoaderConfig::default()).unwrap();
    assert_eq!(manager.names().collect::<Vec<_>>(), vec!["age", "city", "city_age"]);

    let city = manager.get("city").unwrap();
    assert_eq!(city.keys(), vec!["lima", "oslo", "paris"]);
    assert_eq!(ids(&city.search(SearchOp::Eq, "paris").unwrap()), vec![1, 2, 6]);
    assert_eq!(ids(&city.search_str("ne", "paris").unwrap()), vec![3, 4, 5]);
    assert_eq!(ids(&city.search(SearchOp::In, "lima::oslo").unwrap()), vec![3, 4, 5]);

    let age = manager.get("age").unwrap();
    let adults = age.search_str("GREATER_EQ", "30").unwrap();
    assert_eq!(adults.ids(), vec![2, 3, 6]);
    assert_eq!(adults.sum_weight(), 11.0);

    let city_age = manager.get("city_age").unwrap();
    let young_paris = city_age.search(SearchOp::Less, "1::40").unwrap();
    assert_eq!(ids(&young_paris), vec![1, 2]);
}

#[test]
fn test_shards_partition_the_data() {
    let dir = tempdir().unwrap();
    write_partials(dir.path(), 4);

    let mut seen = BTreeSet::new();
    for shard in 0..2 {
        let config = LoaderConfig::new(shard, 2);
        let manager = IndexManager::load(dir.path(), &config).unwrap();
        let all = manager.get("age").unwrap().search_all().unwrap();
        for id in all.ids() {
            assert!(seen.insert(id), "id {id} loaded by two shards");
            assert_eq!(id % 2, u64::from(shard));
        }
    }
    assert_eq!(seen, (1..=6).collect());
}

#[test]
fn test_combined_predicates_keep_left_weights() {
    let dir = tempdir().unwrap();
    write_partials(dir.path(), 2);
    let manager = IndexManager::load(dir.path(), &LoaderConfig::default()).unwrap();
    let city = manager.get("city").unwrap();
    let age = manager.get("age").unwrap();

    let paris = city.search(SearchOp::Eq, "paris").unwrap();
    let older = age.search(SearchOp::Greater, "30").unwrap();
    let both = older.intersection(&paris);
    assert_eq!(ids(&both), vec![2, 6]);
    assert_eq!(both.sum_weight(), 10.0);

    let either = paris.union(&age.search(SearchOp::LessEq, "19").unwrap());
    assert_eq!(ids(&either), vec![1, 2, 4, 6]);

    let draws = both.sample(2_000);
    assert_eq!(draws.len(), 2_000);
    let heavy = draws.iter().filter(|(id, _)| *id == 6).count();
    assert!(heavy > 1_500, "id 6 carries 80% of the weight, drew {heavy}");
}

#[test]
fn test_rejected_queries_leave_the_index_usable() {
    let dir = tempdir().unwrap();
    write_partials(dir.path(), 1);
    let manager = IndexManager::load(dir.path(), &LoaderConfig::default()).unwrap();
    let city = manager.get("city").unwrap();
    let age = manager.get("age").unwrap();
    let city_age = manager.get("city_age").unwrap();

    assert!(city.search(SearchOp::Less, "paris").unwrap_err().is_query_rejection());
    assert!(age.search(SearchOp::Eq, "old").unwrap_err().is_query_rejection());
    assert!(city_age.search(SearchOp::Eq, "1-40").unwrap_err().is_query_rejection());
    assert!(city_age.search_all().unwrap_err().is_query_rejection());
    assert!(age.search_str("between", "1").unwrap_err().is_query_rejection());

    assert_eq!(ids(&age.search(SearchOp::Eq, "27").unwrap()), vec![5]);
}

// ============================================================================
// Graph side
// ============================================================================

#[test]
fn test_neighbor_sampling_restricted_to_candidates() {
    let dir = tempdir().unwrap();
    write_partials(dir.path(), 1);
    let manager = IndexManager::load(dir.path(), &LoaderConfig::default()).unwrap();
    let candidates: BTreeSet<u64> = manager
        .get("age")
        .unwrap()
        .search(SearchOp::GreaterEq, "30")
        .unwrap()
        .ids()
        .into_iter()
        .collect();

    let follows = WeightedAdjacency::from_lists(
        vec![vec![2, 3, 4], vec![5, 6]],
        vec![vec![1.0, 1.0, 6.0], vec![2.0, 2.0]],
    )
    .unwrap();
    let node = Node::new(1, 0, 1.0)
        .with_out_neighbors(follows)
        .with_features(NodeFeatures::new(vec![vec![21]], vec![], vec![b"paris".to_vec()]).unwrap());
    let record = Node::deserialize(&node.serialize().unwrap()).unwrap();

    let sorted = record.get_sorted_full_neighbor(Direction::Out, &[0, 1]);
    let eligible: Vec<u64> = sorted
        .iter()
        .map(|n| n.id)
        .filter(|id| candidates.contains(id))
        .collect();
    assert_eq!(eligible, vec![2, 3, 6]);

    let top = record.get_top_k_neighbor(Direction::Out, &[0, 1], 2).unwrap();
    assert_eq!(top[0].id, 4);
    assert_eq!(top[1].weight, 2.0);

    let draws = record.sample_neighbor(Direction::Out, &[1], 50).unwrap();
    assert!(draws.iter().all(|n| n.id == 5 || n.id == 6));
    assert!(record.sample_neighbor(Direction::In, &[], 5).unwrap().is_empty());
    assert_eq!(record.features().uint64.get_vec(&[0]), vec![vec![21]]);
}
