//! Similarity scoring for the vector index (spec §4.4).
//!
//! Stored vectors are unit-normalized at insert time (spec §3 invariant), so
//! cosine similarity and dot product coincide; `similarity` uses the cheaper
//! dot product and relies on that invariant rather than re-normalizing on
//! every comparison.

/// Dot product of two equal-length vectors. Higher is more similar.
pub fn similarity(a: &[f32], b: &[f32]) -> f32 {
    debug_assert_eq!(a.len(), b.len(), "dimension mismatch in similarity");
    a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_unit_vectors_score_one() {
        let v = [1.0, 0.0, 0.0];
        assert!((similarity(&v, &v) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn orthogonal_vectors_score_zero() {
        let a = [1.0, 0.0];
        let b = [0.0, 1.0];
        assert!(similarity(&a, &b).abs() < 1e-6);
    }

    #[test]
    fn opposite_vectors_score_negative_one() {
        let a = [1.0, 0.0];
        let b = [-1.0, 0.0];
        assert!((similarity(&a, &b) + 1.0).abs() < 1e-6);
    }
}
