//! The HNSW index is seeded deterministically: the same insert order and
//! the same query vector must produce the same neighbor list and scores
//! across independent databases.

use memora::{Memora, Node, NodeId, Vector};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tempfile::tempdir;

const DIMS: usize = 128;

fn random_raw_vectors(seed: u64, count: usize) -> Vec<Vec<f32>> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..count)
        .map(|_| (0..DIMS).map(|_| rng.gen_range(-1.0f32..1.0f32)).collect())
        .collect()
}

fn populate(dir: &std::path::Path, raw_vectors: &[Vec<f32>]) -> Memora {
    let mut db = Memora::open(dir).unwrap();
    for (i, dims) in raw_vectors.iter().enumerate() {
        let id = NodeId::new(i as u64 + 1);
        db.insert_node(Node::with_text_label(id, "")).unwrap();
        let mut vector = Vector {
            id,
            dims: dims.clone(),
        };
        vector.normalize();
        db.insert_vector(vector).unwrap();
    }
    db
}

#[test]
fn same_seed_yields_identical_top_k_across_fresh_databases() {
    let vectors = random_raw_vectors(42, 1_000);

    let dir_a = tempdir().unwrap();
    let db_a = populate(dir_a.path(), &vectors);
    let results_a = db_a.query_similar(NodeId::new(1), 5).unwrap();

    let dir_b = tempdir().unwrap();
    let db_b = populate(dir_b.path(), &vectors);
    let results_b = db_b.query_similar(NodeId::new(1), 5).unwrap();

    assert_eq!(results_a, results_b);
}

#[test]
fn query_similar_with_zero_k_returns_empty() {
    let vectors = random_raw_vectors(7, 10);
    let dir = tempdir().unwrap();
    let db = populate(dir.path(), &vectors);

    let results = db.query_similar(NodeId::new(1), 0).unwrap();
    assert!(results.is_empty());
}
