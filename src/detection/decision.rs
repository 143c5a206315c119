/// Presence verdict: strictly more changed pixels than `presence_threshold`
pub fn decide(changed_pixels: u64, presence_threshold: u64) -> bool {
    changed_pixels > presence_threshold
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn comparison_is_strict() {
        assert!(!decide(0, 100));
        assert!(!decide(100, 100));
        assert!(decide(101, 100));
        assert!(decide(1, 0));
    }

    #[test]
    fn raising_threshold_only_clears_verdicts() {
        for count in [0, 50, 100, 150, 10_000] {
            let mut was_present = true;
            for threshold in (0..=20_000).step_by(250) {
                let present = decide(count, threshold);
                assert!(was_present || !present, "count {count} threshold {threshold}");
                was_present = present;
            }
        }
    }
}
