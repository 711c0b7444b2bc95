//! Reconnect spacing with exponential growth and jitter.

use rand::Rng;
use std::time::Duration;

/// Delay before reconnect attempt number `attempt` (1-based) to the same node.
///
/// Never below `spacing_ms`; doubles per attempt up to `max_ms`, plus up to
/// 10% jitter so supervisors of co-located nodes do not retry in lockstep.
pub fn reconnect_delay(attempt: u32, spacing_ms: u64, max_ms: u64) -> Duration {
    let spacing_ms = spacing_ms.max(1);
    let max_ms = max_ms.max(spacing_ms);

    let exponent = attempt.saturating_sub(1).min(32);
    let delay_ms = spacing_ms.saturating_mul(1u64 << exponent).min(max_ms);

    let jitter_range = delay_ms / 10;
    let jitter = if jitter_range > 0 {
        rand::thread_rng().gen_range(0..jitter_range)
    } else {
        0
    };

    Duration::from_millis(delay_ms + jitter)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_retry_respects_spacing() {
        for attempt in [0, 1] {
            let delay = reconnect_delay(attempt, 30, 2000);
            assert!(delay >= Duration::from_millis(30));
            assert!(delay < Duration::from_millis(34));
        }
    }

    #[test]
    fn test_growth_and_cap() {
        assert!(reconnect_delay(3, 30, 2000) >= Duration::from_millis(120));

        let capped = reconnect_delay(40, 30, 2000);
        assert!(capped >= Duration::from_millis(2000));
        assert!(capped < Duration::from_millis(2200));
    }

    #[test]
    fn test_cap_below_spacing_uses_spacing() {
        let delay = reconnect_delay(5, 100, 10);
        assert!(delay >= Duration::from_millis(100));
    }
}
