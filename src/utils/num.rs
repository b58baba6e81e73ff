//! Numeric utilities: safe and centralized integer conversions.
//!
//! Guidelines
//! - Prefer saturating conversions when clamping is safer than panicking or truncating
//!   (e.g., a skip offset handed to a slice, or a time span converted for logging).
//! - Prefer lossless widening with explicit helpers to keep call sites consistent and searchable.

#[inline]
#[must_use]
pub fn u64_to_usize_saturating(v: u64) -> usize {
    usize::try_from(v).unwrap_or(usize::MAX)
}

#[inline]
#[must_use]
pub fn usize_to_u64(v: usize) -> u64 {
    u64::try_from(v).unwrap_or(u64::MAX)
}

/// Truncates toward zero; NaN and negatives map to 0, overflow saturates.
#[inline]
#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss, clippy::cast_precision_loss)]
pub fn f64_to_u64_saturating(v: f64) -> u64 {
    if !v.is_finite() {
        return if v == f64::INFINITY { u64::MAX } else { 0 };
    }
    if v <= 0.0 {
        0
    } else if v >= u64::MAX as f64 {
        u64::MAX
    } else {
        v as u64
    }
}

#[inline]
#[must_use]
pub fn u128_to_u64_saturating(v: u128) -> u64 {
    u64::try_from(v).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn u64_to_usize_saturates() {
        assert_eq!(u64_to_usize_saturating(42), 42);
        assert_eq!(u64_to_usize_saturating(u64::MAX), usize::try_from(u64::MAX).unwrap_or(usize::MAX));
    }

    #[test]
    fn f64_saturating_behaves() {
        assert_eq!(f64_to_u64_saturating(f64::NAN), 0);
        assert_eq!(f64_to_u64_saturating(f64::NEG_INFINITY), 0);
        assert_eq!(f64_to_u64_saturating(-1.0), 0);
        assert_eq!(f64_to_u64_saturating(u64::MAX as f64 * 2.0), u64::MAX);
        assert_eq!(f64_to_u64_saturating(1234.56), 1234);
    }

    #[test]
    fn usize_to_u64_is_lossless() {
        for &v in &[0usize, 1, 42, 10_000] {
            assert_eq!(usize_to_u64(v), v as u64);
        }
    }

    #[test]
    fn u128_to_u64_saturating_edges() {
        assert_eq!(u128_to_u64_saturating(0), 0);
        assert_eq!(u128_to_u64_saturating(u128::from(u64::MAX)), u64::MAX);
        assert_eq!(u128_to_u64_saturating(u128::MAX), u64::MAX);
    }
}
