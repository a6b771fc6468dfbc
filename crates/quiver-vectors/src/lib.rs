#![warn(clippy::pedantic)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_possible_wrap)]
#![allow(clippy::cast_sign_loss)]

pub mod codec;
pub mod math;

mod chunk;
mod heap;
mod index;
mod pool;

pub use heap::{HeapItem, LimitHeap};
pub use index::Vectors;
pub use pool::init_pool;

/// Identifier assigned to a stored vector. Ids are non-negative; `-1` never
/// appears as a valid id.
pub type VectorId = i64;

/// A fixed-length sequence of 32-bit floats.
pub type Vector = Vec<f32>;

/// Computes the cosine similarity of two vectors of equal length.
///
/// # Panics
///
/// Panics if the vectors have different lengths.
pub fn similarity(v1: &[f32], v2: &[f32]) -> f32 {
    assert_eq!(v1.len(), v2.len(), "vectors have different lengths");

    let scratch = pool::scratch();
    let mut tmp = scratch.get(v1.len());

    let norm1 = math::vector_norm(v1, &mut tmp);
    let norm2 = math::vector_norm(v2, &mut tmp);

    let s = math::cosine_similarity(v1, v2, norm1, norm2, &mut tmp);

    scratch.put(tmp);

    s as f32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn similarity_identical() {
        let s = similarity(&[1.0, 2.0, 3.0], &[1.0, 2.0, 3.0]);
        assert!((f64::from(s) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn similarity_parallel() {
        let s = similarity(&[1.0, 2.0, 3.0], &[2.0, 4.0, 6.0]);
        assert!((f64::from(s) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn similarity_orthogonal() {
        let s = similarity(&[1.0, 0.0, 0.0], &[0.0, 1.0, 0.0]);
        assert!(f64::from(s).abs() < 1e-6);
    }

    #[test]
    fn similarity_opposite() {
        let s = similarity(&[1.0, 2.0, 3.0], &[-1.0, -2.0, -3.0]);
        assert!((f64::from(s) + 1.0).abs() < 1e-6);
    }

    #[test]
    fn similarity_arbitrary() {
        let s = similarity(&[1.0, 2.0, 3.0], &[4.0, 5.0, 6.0]);
        assert!((f64::from(s) - 0.974_631_8).abs() < 1e-6);
    }

    #[test]
    #[should_panic(expected = "vectors have different lengths")]
    fn similarity_length_mismatch_panics() {
        similarity(&[1.0, 2.0, 3.0], &[1.0, 2.0]);
    }
}
