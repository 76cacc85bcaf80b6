use std::time::Duration;

use keel::retry::RetryPolicy;

#[tokio::test]
async fn succeeds_once_the_condition_holds() {
    let policy = RetryPolicy::immediate(10);
    let mut calls = 0;
    let result = policy
        .run_until(|| {
            calls += 1;
            calls == 4
        })
        .await;
    assert!(result.is_ok());
    assert_eq!(calls, 4, "polling stops at the first success");
}

#[tokio::test]
async fn exhausting_attempts_times_out() {
    let policy = RetryPolicy::immediate(5);
    let err = policy.run_until(|| false).await.unwrap_err();
    assert_eq!(err.attempts, 5);
}

#[tokio::test]
async fn wall_clock_budget_bounds_the_wait() {
    // Generous attempt count but a zero time budget: the first failed poll
    // must end the wait.
    let policy = RetryPolicy::new(1_000_000, Duration::ZERO, Duration::ZERO);
    let err = policy.run_until(|| false).await.unwrap_err();
    assert_eq!(err.attempts, 1, "the time budget must cut the loop short");
}
