/// Maximum distance from the office, in meters, at which check-in is allowed.
pub const CHECK_IN_RADIUS_M: f64 = 200.0;

/// Inclusive: exactly `CHECK_IN_RADIUS_M` is still inside the fence.
pub fn within_threshold(distance_m: f64) -> bool {
    distance_m.is_finite() && distance_m <= CHECK_IN_RADIUS_M
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn boundary_is_inclusive() {
        assert!(within_threshold(200.0));
        assert!(!within_threshold(200.0001));
    }

    #[test]
    fn zero_and_far_away() {
        assert!(within_threshold(0.0));
        assert!(within_threshold(43.4));
        assert!(!within_threshold(111_195.0));
    }

    #[test]
    fn non_finite_distance_never_opens_the_gate() {
        assert!(!within_threshold(f64::NAN));
        assert!(!within_threshold(f64::INFINITY));
    }
}
