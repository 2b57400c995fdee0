//! Timing primitives shared by every retry and pacing decision.
use std::time::Duration;

use tokio_util::sync::CancellationToken;

const BACKOFF_FACTOR: f64 = 1.5;
const STAGGER_FACTOR: f64 = 0.5;

/// Delay before retry number `attempt + 1`: `base * 1.5^attempt`.
pub fn backoff_delay(base: Duration, attempt: u32) -> Duration {
    base.mul_f64(BACKOFF_FACTOR.powi(attempt as i32))
}

/// Soft ramp inside a batch: `base * position * 0.5`.
pub fn stagger_delay(base: Duration, position: usize) -> Duration {
    base.mul_f64(position as f64 * STAGGER_FACTOR)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("cancelled")]
pub struct Cancelled;

/// Sleep for `duration`, waking early with [`Cancelled`] when the token fires.
pub async fn sleep_or_cancel(duration: Duration, token: &CancellationToken) -> Result<(), Cancelled> {
    if token.is_cancelled() {
        return Err(Cancelled);
    }
    if duration.is_zero() {
        return Ok(());
    }
    tokio::select! {
        biased;
        _ = token.cancelled() => Err(Cancelled),
        _ = tokio::time::sleep(duration) => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_grows_strictly() {
        let base = Duration::from_millis(2000);
        let delays: Vec<_> = (0..6).map(|i| backoff_delay(base, i)).collect();
        assert_eq!(delays[0], Duration::from_millis(2000));
        assert_eq!(delays[1], Duration::from_millis(3000));
        assert_eq!(delays[2], Duration::from_millis(4500));
        assert!(delays.windows(2).all(|w| w[1] > w[0]));
    }

    #[test]
    fn stagger_is_half_base_per_position() {
        let base = Duration::from_millis(1000);
        assert_eq!(stagger_delay(base, 0), Duration::ZERO);
        assert_eq!(stagger_delay(base, 1), Duration::from_millis(500));
        assert_eq!(stagger_delay(base, 4), Duration::from_millis(2000));
    }

    #[tokio::test(start_paused = true)]
    async fn sleep_completes_without_cancel() {
        let token = CancellationToken::new();
        let start = tokio::time::Instant::now();
        sleep_or_cancel(Duration::from_secs(3), &token).await.unwrap();
        assert!(start.elapsed() >= Duration::from_secs(3));
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_wakes_sleeper_early() {
        let token = CancellationToken::new();
        let trigger = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            trigger.cancel();
        });
        let start = tokio::time::Instant::now();
        let result = sleep_or_cancel(Duration::from_secs(60), &token).await;
        assert_eq!(result, Err(Cancelled));
        assert!(start.elapsed() < Duration::from_secs(60));
    }

    #[tokio::test]
    async fn already_cancelled_returns_immediately() {
        let token = CancellationToken::new();
        token.cancel();
        assert_eq!(
            sleep_or_cancel(Duration::from_secs(60), &token).await,
            Err(Cancelled)
        );
    }
}
