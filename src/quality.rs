//! Data-quality scoring.
//!
//! A completeness score in `[0, 1]` computed from a fixed, ordered set of
//! required-field checks. Every check carries equal weight (`1 / n`), so the
//! score is monotonic in field presence: each additional present field can
//! only raise it. Pure and total — malformed or absent input must be mapped
//! to `false` by the caller before it gets here.

/// Sum the weights of the checks that passed. An empty check set scores 0.0.
pub fn score(checks: &[bool]) -> f64 {
    if checks.is_empty() {
        return 0.0;
    }
    let weight = 1.0 / checks.len() as f64;
    checks.iter().filter(|&&c| c).count() as f64 * weight
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_present_scores_one() {
        assert_eq!(score(&[true, true, true, true]), 1.0);
    }

    #[test]
    fn test_none_present_scores_zero() {
        assert_eq!(score(&[false, false, false, false]), 0.0);
    }

    #[test]
    fn test_half_present() {
        assert_eq!(score(&[true, true, false, false]), 0.5);
    }

    #[test]
    fn test_empty_checks() {
        assert_eq!(score(&[]), 0.0);
    }

    #[test]
    fn test_monotonic_in_presence() {
        let mut prev = score(&[false, false, false, false]);
        for present in 1..=4 {
            let checks: Vec<bool> = (0..4).map(|i| i < present).collect();
            let s = score(&checks);
            assert!(s > prev);
            prev = s;
        }
    }

    #[test]
    fn test_always_in_unit_interval() {
        for n in 1..8 {
            for k in 0..=n {
                let checks: Vec<bool> = (0..n).map(|i| i < k).collect();
                let s = score(&checks);
                assert!((0.0..=1.0).contains(&s), "score {} out of range", s);
            }
        }
    }
}
