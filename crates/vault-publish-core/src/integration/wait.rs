//! Bounded polling for asynchronous renderers.
//!
//! External renderers give no completion callback; the caller polls a
//! predicate at a fixed interval up to a capped number of attempts and
//! accepts whatever state it finds when the cap is hit.

use std::time::Duration;

/// Interval between two predicate checks.
pub const POLL_INTERVAL: Duration = Duration::from_millis(5);

/// Default attempt cap (about half a second at [`POLL_INTERVAL`]).
pub const DEFAULT_POLL_ATTEMPTS: u32 = 100;

/// Poll `predicate` until it holds or `max_attempts` sleeps have passed.
///
/// Returns whether the predicate held. The predicate is checked once more
/// after the last sleep, so it runs at most `max_attempts + 1` times.
pub async fn wait_until<F>(mut predicate: F, interval: Duration, max_attempts: u32) -> bool
where
    F: FnMut() -> bool,
{
    for _ in 0..max_attempts {
        if predicate() {
            return true;
        }
        tokio::time::sleep(interval).await;
    }
    predicate()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn returns_immediately_when_ready() {
        let mut calls = 0;
        let settled = wait_until(
            || {
                calls += 1;
                true
            },
            Duration::from_secs(10),
            100,
        )
        .await;
        assert!(settled);
        assert_eq!(calls, 1);
    }

    #[tokio::test]
    async fn gives_up_after_the_cap() {
        let mut calls = 0;
        let settled = wait_until(
            || {
                calls += 1;
                false
            },
            Duration::from_millis(1),
            3,
        )
        .await;
        assert!(!settled);
        assert_eq!(calls, 4);
    }

    #[tokio::test]
    async fn settles_midway() {
        let mut calls = 0;
        let settled = wait_until(
            || {
                calls += 1;
                calls == 3
            },
            Duration::from_millis(1),
            10,
        )
        .await;
        assert!(settled);
        assert_eq!(calls, 3);
    }
}
