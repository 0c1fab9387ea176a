use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use rand::Rng;

/// Upper bound of the random jitter added to exponential delays.
const MAX_JITTER_MS: u64 = 1_000;
/// Exponent cap so the delay cannot overflow.
const MAX_EXPONENT: u32 = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum BackoffKind {
    /// Wait the same cooldown before every retry.
    Fixed,
    /// `base * 2^retry` plus up to one second of jitter.
    Exponential,
}

impl fmt::Display for BackoffKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackoffKind::Fixed => f.write_str("fixed"),
            BackoffKind::Exponential => f.write_str("exponential"),
        }
    }
}

impl FromStr for BackoffKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "fixed" => Ok(BackoffKind::Fixed),
            "exponential" => Ok(BackoffKind::Exponential),
            other => anyhow::bail!("unknown backoff kind: {}", other),
        }
    }
}

/// Cooldown schedule for rate-limited calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub kind: BackoffKind,
    pub base: Duration,
    /// Retries after the first attempt; the call is made at most
    /// `max_retries + 1` times.
    pub max_retries: u32,
}

impl RetryPolicy {
    pub fn fixed(base: Duration, max_retries: u32) -> Self {
        Self {
            kind: BackoffKind::Fixed,
            base,
            max_retries,
        }
    }

    pub fn exponential(base: Duration, max_retries: u32) -> Self {
        Self {
            kind: BackoffKind::Exponential,
            base,
            max_retries,
        }
    }

    /// Delay before retry number `retry` (0-based).
    pub fn delay_for(&self, retry: u32) -> Duration {
        match self.kind {
            BackoffKind::Fixed => self.base,
            BackoffKind::Exponential => {
                let factor = 1u32 << retry.min(MAX_EXPONENT);
                let jitter = rand::thread_rng().gen_range(0..=MAX_JITTER_MS);
                self.base
                    .saturating_mul(factor)
                    .saturating_add(Duration::from_millis(jitter))
            }
        }
    }
}

#[cfg(test)]
mod backoff_tests {
    use super::*;

    #[test]
    fn fixed_delay_is_constant() {
        let policy = RetryPolicy::fixed(Duration::from_secs(10), 3);
        assert_eq!(policy.delay_for(0), Duration::from_secs(10));
        assert_eq!(policy.delay_for(5), Duration::from_secs(10));
    }

    #[test]
    fn exponential_delay_doubles_with_bounded_jitter() {
        let policy = RetryPolicy::exponential(Duration::from_millis(500), 3);
        for retry in 0..4u32 {
            let base = Duration::from_millis(500 * 2u64.pow(retry));
            let delay = policy.delay_for(retry);
            assert!(delay >= base, "retry {retry}: {delay:?} < {base:?}");
            assert!(delay <= base + Duration::from_millis(MAX_JITTER_MS));
        }
    }

    #[test]
    fn huge_retry_counts_do_not_overflow() {
        let policy = RetryPolicy::exponential(Duration::from_secs(u64::MAX / 2), 3);
        let _ = policy.delay_for(u32::MAX);
    }

    #[test]
    fn parses_kind() {
        assert_eq!("Fixed".parse::<BackoffKind>().unwrap(), BackoffKind::Fixed);
        assert_eq!("exponential".parse::<BackoffKind>().unwrap(), BackoffKind::Exponential);
        assert!("linear".parse::<BackoffKind>().is_err());
    }
}
