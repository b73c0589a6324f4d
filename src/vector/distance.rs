//! Cosine distance, the only metric dense scores are defined over.

use crate::error::{RagError, Result};

/// Cosine distance (1 - cosine similarity), in [0, 2].
///
/// A zero vector is at distance 1.0 from everything. Dense retrieval turns
/// this into `dense_score = clamp(1 - distance)`.
pub fn cosine_distance(a: &[f32], b: &[f32]) -> Result<f32> {
    if a.len() != b.len() {
        return Err(RagError::invalid_argument(format!(
            "Vector dimensions must match for distance calculation: {} vs {}",
            a.len(),
            b.len()
        )));
    }

    let dot_product: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return Ok(1.0);
    }
    Ok(1.0 - (dot_product / (norm_a * norm_b)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cosine_distance() {
        let same = cosine_distance(&[1.0, 0.0], &[2.0, 0.0]).unwrap();
        assert!(same.abs() < 1e-6);

        let orthogonal = cosine_distance(&[1.0, 0.0], &[0.0, 1.0]).unwrap();
        assert!((orthogonal - 1.0).abs() < 1e-6);

        let opposite = cosine_distance(&[1.0, 0.0], &[-1.0, 0.0]).unwrap();
        assert!((opposite - 2.0).abs() < 1e-6);

        // zero vectors are maximally distant rather than NaN
        assert_eq!(cosine_distance(&[0.0, 0.0], &[1.0, 0.0]).unwrap(), 1.0);
    }

    #[test]
    fn test_dimension_mismatch() {
        assert!(cosine_distance(&[1.0], &[1.0, 2.0]).is_err());
    }
}
