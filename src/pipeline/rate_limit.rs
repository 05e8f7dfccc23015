//! Per-provider sliding-window rate limiting.
//!
//! The limiter is an admission gate, not an error path: a full window
//! delays the caller until the oldest admission ages out, it never
//! rejects. The timestamp list is shared by every concurrent task calling
//! the same provider, so admission decisions serialize behind one lock.

use std::collections::VecDeque;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;

/// Rolling admission window.
const WINDOW: Duration = Duration::from_secs(60);

/// Added to computed waits so a re-check lands just after the oldest
/// admission has actually left the window.
const SAFETY_MARGIN: Duration = Duration::from_millis(250);

/// Sliding-window admission gate for one provider.
pub struct RateLimiter {
    provider: String,
    max_per_window: u32,
    window: Duration,
    admissions: Mutex<VecDeque<Instant>>,
}

impl RateLimiter {
    /// Limiter admitting `max_per_minute` requests per rolling minute.
    pub fn per_minute(provider: impl Into<String>, max_per_minute: u32) -> Self {
        Self::with_window(provider, max_per_minute, WINDOW)
    }

    /// Limiter with an explicit window, for tests and unusual providers.
    pub fn with_window(provider: impl Into<String>, max_per_window: u32, window: Duration) -> Self {
        Self {
            provider: provider.into(),
            max_per_window: max_per_window.max(1),
            window,
            admissions: Mutex::new(VecDeque::new()),
        }
    }

    /// Wait until the window has room, then record this admission.
    ///
    /// Suspends the calling task while the window is full; sibling tasks
    /// keep making progress. Never returns an error.
    pub async fn acquire(&self) {
        loop {
            let wait = {
                let mut admissions = self.admissions.lock().await;
                let now = Instant::now();

                while admissions
                    .front()
                    .is_some_and(|t| now.duration_since(*t) >= self.window)
                {
                    admissions.pop_front();
                }

                if (admissions.len() as u32) < self.max_per_window {
                    admissions.push_back(now);
                    return;
                }

                let Some(oldest) = admissions.front().copied() else {
                    continue;
                };
                self.window.saturating_sub(now.duration_since(oldest)) + SAFETY_MARGIN
            };

            tracing::debug!(
                provider = %self.provider,
                wait_ms = wait.as_millis() as u64,
                "Rate limit window full, delaying admission"
            );
            tokio::time::sleep(wait).await;
        }
    }

    /// Admissions currently inside the window (diagnostic).
    pub async fn in_flight(&self) -> usize {
        let admissions = self.admissions.lock().await;
        let now = Instant::now();
        admissions
            .iter()
            .filter(|t| now.duration_since(**t) < self.window)
            .count()
    }
}
