/// Wraparound-aware `a < b` for `u32` sequence numbers, treating wraparound
/// as occurring within a window of 2^31 (the standard TCP-style sequence
/// comparator). Two sequence numbers exactly 2^31 apart are ambiguous by
/// construction and this returns `false` for that case, matching
/// `i32::wrapping` semantics.
pub fn sequence_less_than(a: u32, b: u32) -> bool {
    (a.wrapping_sub(b) as i32) < 0
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn simple_ordering_without_wraparound() {
        assert!(sequence_less_than(1, 2));
        assert!(!sequence_less_than(2, 1));
        assert!(!sequence_less_than(5, 5));
    }

    #[test]
    fn wraparound_is_treated_as_continuation() {
        let near_max = u32::MAX - 1;
        assert!(sequence_less_than(near_max, 1));
        assert!(!sequence_less_than(1, near_max));
    }

    proptest! {
        #[test]
        fn comparator_is_antisymmetric_away_from_the_ambiguous_midpoint(
            a in any::<u32>(),
            delta in 1u32..(1u32 << 31),
        ) {
            let b = a.wrapping_add(delta);
            // delta in [1, 2^31) guarantees a != b and avoids the exact
            // antipodal point, where direction is inherently ambiguous.
            prop_assert_ne!(sequence_less_than(a, b), sequence_less_than(b, a));
        }

        #[test]
        fn comparator_is_reflexive_false(a in any::<u32>()) {
            prop_assert!(!sequence_less_than(a, a));
        }
    }
}
