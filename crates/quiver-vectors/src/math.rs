//! Scalar vector math. Element-wise products are written into a scratch
//! slice before summation so the hot loops stay branch-free and
//! auto-vectorisable.

/// Calculates the Euclidean norm (magnitude) of a vector. The scratch slice
/// holds the intermediate products and must be at least as long as the
/// vector.
///
/// # Panics
///
/// Panics if the scratch slice is shorter than the vector.
pub fn vector_norm(vector: &[f32], tmp: &mut [f32]) -> f64 {
    assert!(
        tmp.len() >= vector.len(),
        "scratch slice is shorter than the vector"
    );

    for (dst, &v) in tmp.iter_mut().zip(vector) {
        *dst = v * v;
    }

    let sum: f32 = tmp[..vector.len()].iter().sum();

    f64::from(sum).sqrt()
}

/// Computes the cosine similarity of `a` and `b` given their precomputed
/// norms. Products are accumulated through the scratch slice.
///
/// # Panics
///
/// Panics if the scratch slice is shorter than the vectors.
pub fn cosine_similarity(a: &[f32], b: &[f32], norm_a: f64, norm_b: f64, tmp: &mut [f32]) -> f64 {
    let n = a.len().min(b.len());
    assert!(tmp.len() >= n, "scratch slice is shorter than the vectors");

    for (dst, (&x, &y)) in tmp.iter_mut().zip(a.iter().zip(b)) {
        *dst = x * y;
    }

    let sum: f32 = tmp[..n].iter().sum();

    f64::from(sum) / (norm_a * norm_b)
}

/// Reports whether two floats are within `tolerance` of each other.
pub fn approx_eq(a: f64, b: f64, tolerance: f64) -> bool {
    (a - b).abs() < tolerance
}

#[cfg(test)]
mod tests {
    use super::*;

    fn norm(v: &[f32]) -> f64 {
        let mut tmp = vec![0.0; v.len()];
        vector_norm(v, &mut tmp)
    }

    #[test]
    fn norm_of_unit_vector() {
        assert!(approx_eq(norm(&[1.0, 0.0, 0.0]), 1.0, 1e-9));
    }

    #[test]
    fn norm_of_pythagorean_triple() {
        assert!(approx_eq(norm(&[3.0, 4.0]), 5.0, 1e-6));
    }

    #[test]
    fn cosine_similarity_cases() {
        let cases: &[(&[f32], &[f32], f64)] = &[
            (&[1.0, 2.0, 3.0], &[2.0, 4.0, 6.0], 1.0),
            (&[1.0, 0.0, 0.0], &[0.0, 1.0, 0.0], 0.0),
            (&[1.0, 2.0, 3.0], &[-1.0, -2.0, -3.0], -1.0),
            (
                &[1.0, 2.0, 3.0],
                &[4.0, 5.0, 6.0],
                32.0 / (14.0_f64.sqrt() * 77.0_f64.sqrt()),
            ),
        ];

        for (a, b, want) in cases {
            let mut tmp = vec![0.0; a.len()];
            let norm_a = vector_norm(a, &mut tmp);
            let norm_b = vector_norm(b, &mut tmp);
            let got = cosine_similarity(a, b, norm_a, norm_b, &mut tmp);
            assert!(approx_eq(got, *want, 1e-6), "got {got}, want {want}");
        }
    }
}
