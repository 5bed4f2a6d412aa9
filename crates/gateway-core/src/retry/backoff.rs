//! Exponential backoff delay calculation.

use std::time::Duration;

/// Computes the delay before retry attempt `n` (1-indexed, matching the
/// retry engine's attempt numbering): `min(base * multiplier^(n-1),
/// max_delay)`, optionally scaled by a uniform jitter factor in `[1.0,
/// 1.25]` so concurrent retries against the same provider don't all wake at
/// once.
pub fn delay_for_attempt(attempt: u32, base: Duration, multiplier: f64, max_delay: Duration, jitter: bool) -> Duration {
    let exponent = attempt.saturating_sub(1) as i32;
    let base_delay = base.as_secs_f64() * multiplier.powi(exponent);
    let capped = base_delay.min(max_delay.as_secs_f64());
    let factor = if jitter { 1.0 + fastrand::f64() * 0.25 } else { 1.0 };
    Duration::from_secs_f64(capped * factor)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grows_exponentially_without_jitter() {
        let base = Duration::from_millis(100);
        let max = Duration::from_secs(10);
        let d1 = delay_for_attempt(1, base, 2.0, max, false);
        let d2 = delay_for_attempt(2, base, 2.0, max, false);
        let d3 = delay_for_attempt(3, base, 2.0, max, false);
        assert_eq!(d1, Duration::from_millis(100));
        assert_eq!(d2, Duration::from_millis(200));
        assert_eq!(d3, Duration::from_millis(400));
    }

    #[test]
    fn caps_at_max_delay() {
        let base = Duration::from_secs(1);
        let max = Duration::from_secs(5);
        let d = delay_for_attempt(10, base, 2.0, max, false);
        assert_eq!(d, max);
    }

    #[test]
    fn jitter_stays_within_documented_range() {
        let base = Duration::from_secs(1);
        let max = Duration::from_secs(60);
        for _ in 0..200 {
            let d = delay_for_attempt(1, base, 2.0, max, true);
            assert!(d >= base);
            assert!(d <= Duration::from_secs_f64(1.25));
        }
    }
}
