//! Sampler seed resolution.

use chrono::{DateTime, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Seed value meaning "caller did not pin a seed".
pub const UNPINNED_SEED: u64 = 0;

/// Resolve a requested seed against the current wall clock.
pub fn resolve_seed(requested: u64) -> u64 {
    resolve_seed_at(requested, Utc::now())
}

/// Resolve a requested seed.
///
/// A pinned seed passes through unchanged. [`UNPINNED_SEED`] is replaced by a
/// uniformly distributed non-zero `u64` drawn from a generator seeded with
/// `now` at nanosecond resolution.
pub fn resolve_seed_at(requested: u64, now: DateTime<Utc>) -> u64 {
    if requested != UNPINNED_SEED {
        return requested;
    }

    let entropy = now
        .timestamp_nanos_opt()
        .unwrap_or_else(|| now.timestamp()) as u64;
    let mut rng = StdRng::seed_from_u64(entropy);

    loop {
        let seed: u64 = rng.random();
        if seed != UNPINNED_SEED {
            return seed;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    #[test]
    fn test_pinned_seed_passes_through() {
        assert_eq!(resolve_seed(42), 42);
        assert_eq!(resolve_seed(u64::MAX), u64::MAX);
    }

    #[test]
    fn test_unpinned_seed_is_non_zero() {
        assert_ne!(resolve_seed(UNPINNED_SEED), 0);
    }

    #[test]
    fn test_unpinned_seed_is_deterministic_for_same_instant() {
        let now = Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap();
        assert_eq!(resolve_seed_at(0, now), resolve_seed_at(0, now));
    }

    #[test]
    fn test_unpinned_seed_differs_across_instants() {
        let first = Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap();
        let later = first + Duration::seconds(1);
        let slightly_later = first + Duration::nanoseconds(1);

        let a = resolve_seed_at(0, first);
        assert_ne!(a, resolve_seed_at(0, later));
        assert_ne!(a, resolve_seed_at(0, slightly_later));
    }
}
