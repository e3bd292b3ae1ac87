use crate::config::{FaultTable, PipelineConfig};

/// Derive rank `rank`'s partition: element `i` is `rank * len + i + 1`,
/// i.e. the rank-order slice of the logical array `1..=len * size`.
pub fn generate_partition(rank: usize, partition_len: usize) -> Vec<i32> {
    (0..partition_len)
        .map(|i| (rank * partition_len + i + 1) as i32)
        .collect()
}

/// The per-rank analysis stand-in: each element gains a sine-derived offset,
/// truncated toward zero. The offset depends only on the element's local
/// index, so every rank applies the same curve to its own slice. Any fault
/// override configured for `rank` is stored afterwards, clobbering the
/// transformed value at the override index.
pub fn local_transform(data: &mut [i32], rank: usize, faults: &FaultTable) {
    for (i, value) in data.iter_mut().enumerate() {
        *value += (10.0 * (((i + 1) as f64 * 0.5).sin() + 2.0)) as i32;
    }
    if let Some(fault) = faults.override_for(rank) {
        data[fault.index] = fault.value;
    }
}

/// Gate predicate: a partition may be collected iff no element is negative.
/// Zero passes; that is what lets the reference table's poisoned `0` through.
pub fn integrity_check(data: &[i32]) -> bool {
    data.iter().all(|&value| value >= 0)
}

/// The coordinator's aggregate transform: every element becomes
/// `1024 / element` (integer division). A zero element is a fatal arithmetic
/// fault and panics; the pipeline intentionally does not guard it.
pub fn finalize_in_place(data: &mut [i32]) {
    for value in data.iter_mut() {
        *value = 1024 / *value;
    }
}

/// Structural equality of the final array against the expectation.
pub fn validate(got: &[i32], expected: &[i32]) -> bool {
    got == expected
}

/// Replay the clean (fault-free) pipeline locally to derive the array the
/// coordinator should end up with for `cfg`. This is what the runtime verdict
/// compares against; the reference configuration's literal values are pinned
/// by the test suite.
pub fn expected_output(cfg: &PipelineConfig) -> Vec<i32> {
    let clean = FaultTable::empty();
    let mut full = Vec::with_capacity(cfg.total_len());
    for rank in 0..cfg.required_size {
        let mut part = generate_partition(rank, cfg.partition_len);
        local_transform(&mut part, rank, &clean);
        full.extend_from_slice(&part);
    }
    finalize_in_place(&mut full);
    full
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{FAULT_RANK_A, FAULT_RANK_B, FaultOverride};

    /// The 80-value reference array from the original analysis exercise
    /// (size 4, partition length 20, no faults).
    const REFERENCE_OUTPUT: [i32; 80] = [
        40, 34, 32, 31, 34, 37, 44, 51, 53, 51, 44, 35, 29, 25, 23, 22, 23, 24, 26, 30, //
        22, 20, 19, 19, 20, 21, 23, 25, 26, 25, 23, 20, 18, 17, 16, 15, 16, 16, 17, 18, //
        15, 14, 14, 14, 14, 15, 16, 17, 17, 17, 16, 14, 13, 12, 12, 12, 12, 12, 13, 13, //
        12, 11, 11, 11, 11, 11, 12, 12, 12, 12, 12, 11, 10, 10, 9, 9, 9, 10, 10, 10,
    ];

    #[test]
    fn test_generator_formula() {
        for rank in 0..4 {
            let part = generate_partition(rank, 20);
            assert_eq!(part.len(), 20);
            for (i, &value) in part.iter().enumerate() {
                assert_eq!(value, (rank * 20 + i + 1) as i32);
            }
        }
        assert_eq!(generate_partition(0, 3), vec![1, 2, 3]);
        assert_eq!(generate_partition(2, 5), vec![11, 12, 13, 14, 15]);
    }

    #[test]
    fn test_transform_known_offsets() {
        // trunc(10 * (sin(0.5) + 2)) = 24, sin(1.0) -> 28, sin(1.5) -> 29
        let mut data = vec![1, 2, 3];
        local_transform(&mut data, 0, &FaultTable::empty());
        assert_eq!(data, vec![25, 30, 32]);
    }

    #[test]
    fn test_transform_is_deterministic() {
        let table = FaultTable::reference();
        let mut a = generate_partition(1, 20);
        let mut b = generate_partition(1, 20);
        local_transform(&mut a, 1, &table);
        local_transform(&mut b, 1, &table);
        assert_eq!(a, b);
    }

    #[test]
    fn test_transform_applies_fault_overrides() {
        let table = FaultTable::reference();

        let mut gate_breaker = generate_partition(FAULT_RANK_A, 20);
        local_transform(&mut gate_breaker, FAULT_RANK_A, &table);
        assert_eq!(gate_breaker[2], -1);

        let mut divider_poison = generate_partition(FAULT_RANK_B, 20);
        local_transform(&mut divider_poison, FAULT_RANK_B, &table);
        assert_eq!(divider_poison[2], 0);

        // Ranks outside the table keep the plain transform.
        let mut clean = generate_partition(0, 20);
        local_transform(&mut clean, 0, &table);
        assert_eq!(clean[2], 3 + 29);
    }

    #[test]
    fn test_transform_custom_override() {
        let mut table = FaultTable::empty();
        table.insert(1, FaultOverride { index: 0, value: 999 });
        let mut data = vec![1, 2, 3];
        local_transform(&mut data, 1, &table);
        assert_eq!(data, vec![999, 30, 32]);
    }

    #[test]
    fn test_gate_rejects_negatives_only() {
        assert!(integrity_check(&[1, 2, 3]));
        assert!(integrity_check(&[]));
        // Zero is not negative: the poisoned value passes the gate.
        assert!(integrity_check(&[0, 5, 7]));
        assert!(!integrity_check(&[5, -1, 7]));
        assert!(!integrity_check(&[-1]));
    }

    #[test]
    fn test_gate_matches_reference_fault_outcome() {
        let table = FaultTable::reference();
        for rank in 0..4 {
            let mut part = generate_partition(rank, 20);
            local_transform(&mut part, rank, &table);
            let expected = rank != FAULT_RANK_A;
            assert_eq!(integrity_check(&part), expected, "rank {}", rank);
        }
    }

    #[test]
    fn test_finalize_divides_in_place() {
        let mut data = vec![1024, 512, 2, -4];
        finalize_in_place(&mut data);
        assert_eq!(data, vec![1, 2, 512, -256]);
    }

    #[test]
    #[should_panic(expected = "divide by zero")]
    fn test_finalize_zero_is_fatal() {
        let mut data = vec![25, 0, 30];
        finalize_in_place(&mut data);
    }

    #[test]
    fn test_validate_structural_equality() {
        assert!(validate(&[1, 2, 3], &[1, 2, 3]));
        assert!(!validate(&[1, 2, 4], &[1, 2, 3]));
        assert!(!validate(&[1, 2], &[1, 2, 3]));
        assert!(validate(&[], &[]));
    }

    #[test]
    fn test_expected_output_small_config() {
        let cfg = PipelineConfig {
            partition_len: 3,
            required_size: 2,
            ..PipelineConfig::reference()
        };
        assert_eq!(expected_output(&cfg), vec![40, 34, 32, 36, 31, 29]);
    }

    #[test]
    fn test_expected_output_matches_reference_fixture() {
        let cfg = PipelineConfig::reference();
        assert_eq!(expected_output(&cfg), REFERENCE_OUTPUT);
    }
}
