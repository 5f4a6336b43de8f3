// src/calc/sanitize.rs

/// Decimal places kept on every published number.
pub const DECIMALS: i32 = 6;

const SCALE: f64 = 1_000_000.0;
// past 2^52 every f64 is already an integer, nothing left to round
const EXACT_LIMIT: f64 = 4_503_599_627_370_496.0;

/// Non-finite -> `None`; finite -> rounded to [`DECIMALS`] places.
#[inline]
pub fn sanitize(v: f64) -> Option<f64> {
    if !v.is_finite() {
        return None;
    }
    let scaled = v * SCALE;
    if scaled.abs() >= EXACT_LIMIT {
        return Some(v);
    }
    Some(scaled.round() / SCALE)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn non_finite_is_absent() {
        assert_eq!(sanitize(f64::NAN), None);
        assert_eq!(sanitize(f64::INFINITY), None);
        assert_eq!(sanitize(f64::NEG_INFINITY), None);
    }

    #[test]
    fn rounds_to_six_places() {
        assert_eq!(sanitize(105.0 / 99.0 - 1.0), Some(0.060606));
        assert_eq!(sanitize(4.6 - 4.3), Some(0.3));
        assert_eq!(sanitize(-0.0123456789), Some(-0.012346));
    }

    #[test]
    fn idempotent_on_sanitized_values() {
        for v in [0.0, 1.5, -0.060606, 0.3, 123.456789, 98_765.432101, -1e-6, 1e12] {
            let once = sanitize(v).unwrap();
            assert_eq!(sanitize(once), Some(once), "value {v}");
        }
    }
}
