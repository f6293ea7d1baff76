//! The pod mapper: a pure `domain -> pod_id` function shared by every
//! fetcher, parser, and the orchestrator. Stable across process restarts for
//! a fixed pod count — no process-local randomness is involved.

use xxhash_rust::xxh3::xxh3_64;

/// Maps `domain` to a pod index in `[0, pod_count)` using the low 32 bits of
/// a non-cryptographic hash, per spec.md §4.2. `pod_count` must be > 0.
pub fn pod_for_domain(domain: &str, pod_count: usize) -> usize {
    assert!(pod_count > 0, "pod_count must be positive");
    let hash = xxh3_64(domain.as_bytes());
    let low32 = (hash & 0xFFFF_FFFF) as u32;
    (low32 as usize) % pod_count
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stable_across_calls() {
        let a = pod_for_domain("example.com", 16);
        let b = pod_for_domain("example.com", 16);
        assert_eq!(a, b);
    }

    #[test]
    fn within_range() {
        for n in 1..16 {
            let p = pod_for_domain("example.com", n);
            assert!(p < n);
        }
    }

    #[test]
    fn single_pod_always_zero() {
        assert_eq!(pod_for_domain("anything.test", 1), 0);
        assert_eq!(pod_for_domain("other.test", 1), 0);
    }

    #[test]
    fn distributes_across_pods() {
        use std::collections::HashSet;
        let mut seen = HashSet::new();
        for i in 0..500 {
            let domain = format!("site{i}.test");
            seen.insert(pod_for_domain(&domain, 16));
        }
        // with 500 distinct domains over 16 pods we expect broad coverage,
        // not a degenerate hash collapsing everything onto one pod.
        assert!(seen.len() > 8);
    }
}
