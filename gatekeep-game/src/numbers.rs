//! Numeric conversion helpers centralizing lossy casts.

use num_traits::cast::cast;

/// Convert a count to f64, allowing precision loss in a single location.
#[must_use]
pub fn usize_to_f64(value: usize) -> f64 {
    cast::<usize, f64>(value).unwrap_or(f64::MAX)
}

/// Fraction `part / whole`, or 0 when `whole` is zero.
#[must_use]
pub fn share(part: usize, whole: usize) -> f64 {
    if whole == 0 {
        return 0.0;
    }
    usize_to_f64(part) / usize_to_f64(whole)
}

/// Mean of `values`, or 0 for an empty slice.
#[must_use]
pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / usize_to_f64(values.len())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn share_handles_empty_whole() {
        assert!((share(3, 4) - 0.75).abs() < f64::EPSILON);
        assert!(share(3, 0).abs() < f64::EPSILON);
    }

    #[test]
    fn mean_of_empty_is_zero() {
        assert!(mean(&[]).abs() < f64::EPSILON);
        assert!((mean(&[1.0, 2.0, 6.0]) - 3.0).abs() < f64::EPSILON);
    }
}
