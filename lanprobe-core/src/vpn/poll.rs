//! Bounded polling of client state
//!
//! Both controllers wait for the client by re-querying it at a fixed
//! interval until a condition holds or a deadline passes.

use std::future::Future;
use std::time::{Duration, Instant};

use crate::error::ControlError;

/// How a polling loop ended without error
#[derive(Debug)]
pub enum PollOutcome<T> {
    /// The condition held; carries the satisfying observation
    Settled(T),
    /// The deadline passed; carries the last observation and elapsed time
    TimedOut { last: T, elapsed: Duration },
}

/// Query `observe` every `interval` until `done` accepts an observation
///
/// The first query happens immediately. Query errors abort the wait. The
/// loop never sleeps past the deadline, and at least one query always runs
/// even with a zero timeout.
pub async fn poll_until<T, F, Fut, P>(
    interval: Duration,
    timeout: Duration,
    mut observe: F,
    done: P,
) -> Result<PollOutcome<T>, ControlError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, ControlError>>,
    P: Fn(&T) -> bool,
{
    let start = Instant::now();
    let deadline = start + timeout;

    loop {
        let observed = observe().await?;
        if done(&observed) {
            return Ok(PollOutcome::Settled(observed));
        }

        let now = Instant::now();
        if now >= deadline {
            return Ok(PollOutcome::TimedOut {
                last: observed,
                elapsed: now - start,
            });
        }

        tokio::time::sleep(interval.min(deadline - now)).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[tokio::test]
    async fn test_settles_after_a_few_polls() {
        let calls = Cell::new(0u32);
        let outcome = poll_until(
            Duration::from_millis(1),
            Duration::from_secs(5),
            || {
                calls.set(calls.get() + 1);
                let n = calls.get();
                async move { Ok::<_, ControlError>(n) }
            },
            |n| *n >= 3,
        )
        .await
        .unwrap();

        assert!(matches!(outcome, PollOutcome::Settled(3)));
    }

    #[tokio::test]
    async fn test_times_out_with_last_observation() {
        let outcome = poll_until(
            Duration::from_millis(5),
            Duration::from_millis(30),
            || async { Ok::<_, ControlError>("connecting") },
            |s| *s == "connected",
        )
        .await
        .unwrap();

        match outcome {
            PollOutcome::TimedOut { last, elapsed } => {
                assert_eq!(last, "connecting");
                assert!(elapsed >= Duration::from_millis(30));
            }
            PollOutcome::Settled(_) => panic!("Expected timeout"),
        }
    }

    #[tokio::test]
    async fn test_query_error_aborts() {
        let result = poll_until(
            Duration::from_millis(1),
            Duration::from_secs(1),
            || async {
                Err::<u32, _>(ControlError::ControllerUnavailable {
                    reason: "gone".to_string(),
                })
            },
            |_| true,
        )
        .await;

        assert!(matches!(
            result,
            Err(ControlError::ControllerUnavailable { .. })
        ));
    }
}
