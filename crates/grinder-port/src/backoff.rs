//! Jittered exponential backoff for HTTP retry policies.
//!
//! Pure function of `(attempt, base_ms, cap_ms, jitter_seed)` — the caller
//! supplies the jitter source (e.g. a counter or hash of the request id) so
//! the delay schedule stays reproducible in tests and replay.

/// Delay before retry attempt number `attempt` (1-indexed: the first retry
/// is `attempt == 1`). Doubles each attempt up to `cap_ms`, then adds up to
/// 50% jitter derived from `jitter_seed` so concurrent retries don't
/// synchronize.
pub fn backoff_delay_ms(attempt: u32, base_ms: u64, cap_ms: u64, jitter_seed: u64) -> u64 {
    let exp = attempt.saturating_sub(1).min(20);
    let raw = base_ms.saturating_mul(1u64 << exp);
    let capped = raw.min(cap_ms);
    let jitter = (jitter_seed.wrapping_mul(2654435761) % (capped / 2 + 1)) as u64;
    capped.saturating_sub(jitter / 2)
}
