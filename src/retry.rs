use std::time::{Duration, Instant};

/// Explicit retry policy for the barrier waits.
///
/// Both barriers (startup and readiness) are sleep-and-poll loops; the policy
/// bounds them in two ways at once: a hard attempt count and a wall-clock
/// budget. Whichever runs out first ends the wait.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub backoff: Duration,
    pub timeout: Duration,
}

/// Returned when a poll loop exhausts its policy.
#[derive(Debug, Clone, Copy)]
pub struct PollTimedOut {
    pub attempts: u32,
    pub waited: Duration,
}

impl RetryPolicy {
    pub const fn new(max_attempts: u32, backoff: Duration, timeout: Duration) -> Self {
        Self { max_attempts, backoff, timeout }
    }

    /// Zero-backoff policy for tests; the attempt count is the only bound.
    pub const fn immediate(max_attempts: u32) -> Self {
        Self::new(max_attempts, Duration::ZERO, Duration::MAX)
    }

    /// Runs `poll` until it returns true, sleeping one backoff between
    /// attempts. The closure does the whole attempt (issue a request, read
    /// the cache, decide) so the policy stays free of domain knowledge.
    pub async fn run_until<F>(&self, mut poll: F) -> Result<(), PollTimedOut>
    where
        F: FnMut() -> bool,
    {
        let started = Instant::now();
        for attempt in 1..=self.max_attempts {
            if poll() {
                return Ok(());
            }
            if started.elapsed() >= self.timeout {
                return Err(PollTimedOut { attempts: attempt, waited: started.elapsed() });
            }
            tokio::time::sleep(self.backoff).await;
        }
        Err(PollTimedOut { attempts: self.max_attempts, waited: started.elapsed() })
    }
}
