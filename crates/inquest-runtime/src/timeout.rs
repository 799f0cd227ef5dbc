//! Deadline races with cooperative cancellation.
//!
//! [`TimeoutController::with_timeout`] drops the operation when the deadline
//! wins. [`TimeoutController::with_timeout_abortable`] runs the operation as
//! its own task and cancels its token when the race resolves; an operation
//! that ignores the token keeps running in the background until it finishes
//! on its own.

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use tokio::task::JoinError;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error};

use crate::errors::{TaskAborted, TimeoutError};

#[derive(Debug, Default)]
struct TimerCounters {
    armed: AtomicU64,
    released: AtomicU64,
}

/// Released exactly once, on drop.
struct TimerGuard {
    counters: Arc<TimerCounters>,
}

impl Drop for TimerGuard {
    fn drop(&mut self) {
        let _ = self.counters.released.fetch_add(1, Ordering::Relaxed);
    }
}

/// Races operations against deadlines and counts the timers it arms.
///
/// Clones share counters, so one controller per run gives a run-wide view.
#[derive(Clone, Debug, Default)]
pub struct TimeoutController {
    counters: Arc<TimerCounters>,
}

impl TimeoutController {
    /// Fresh controller with zeroed counters.
    pub fn new() -> Self {
        Self::default()
    }

    /// Timers armed so far.
    pub fn armed(&self) -> u64 {
        self.counters.armed.load(Ordering::Relaxed)
    }

    /// Timers released so far.
    pub fn released(&self) -> u64 {
        self.counters.released.load(Ordering::Relaxed)
    }

    /// Timers currently armed.
    pub fn active(&self) -> u64 {
        self.armed().saturating_sub(self.released())
    }

    fn arm(&self) -> TimerGuard {
        let _ = self.counters.armed.fetch_add(1, Ordering::Relaxed);
        TimerGuard {
            counters: Arc::clone(&self.counters),
        }
    }

    /// Race `operation` against `deadline`.
    ///
    /// The operation's own result or error comes back unaltered; if the
    /// deadline wins the operation is dropped and a [`TimeoutError`] is
    /// returned through `E`.
    pub async fn with_timeout<F, T, E>(&self, label: &str, deadline: Duration, operation: F) -> Result<T, E>
    where
        F: Future<Output = Result<T, E>>,
        E: From<TimeoutError>,
    {
        let _timer = self.arm();
        if let Ok(result) = tokio::time::timeout(deadline, operation).await {
            result
        } else {
            debug!(label, deadline_ms = deadline.as_millis(), "deadline elapsed");
            Err(TimeoutError::new(label, deadline).into())
        }
    }

    /// Race an operation that receives a cancellation token.
    ///
    /// The token is cancelled on every exit path. A panic inside the
    /// operation is resumed on the caller; a task the runtime cancels
    /// comes back as [`TaskAborted`].
    pub async fn with_timeout_abortable<F, Fut, T, E>(
        &self,
        label: &str,
        deadline: Duration,
        operation: F,
    ) -> Result<T, E>
    where
        F: FnOnce(CancellationToken) -> Fut,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
        T: Send + 'static,
        E: From<TimeoutError> + From<TaskAborted> + Send + 'static,
    {
        self.with_timeout_abortable_under(&CancellationToken::new(), label, deadline, operation)
            .await
    }

    /// Like [`with_timeout_abortable`](Self::with_timeout_abortable), with
    /// the operation's token derived from `parent`, so cancelling the parent
    /// also reaches the operation.
    pub async fn with_timeout_abortable_under<F, Fut, T, E>(
        &self,
        parent: &CancellationToken,
        label: &str,
        deadline: Duration,
        operation: F,
    ) -> Result<T, E>
    where
        F: FnOnce(CancellationToken) -> Fut,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
        T: Send + 'static,
        E: From<TimeoutError> + From<TaskAborted> + Send + 'static,
    {
        let token = parent.child_token();
        let _cancel_on_exit = token.clone().drop_guard();
        let _timer = self.arm();
        let mut task = tokio::spawn(operation(token));

        tokio::select! {
            joined = &mut task => settle(label, joined),
            () = tokio::time::sleep(deadline) => {
                debug!(label, deadline_ms = deadline.as_millis(), "deadline elapsed, cancelling operation");
                Err(TimeoutError::new(label, deadline).into())
            }
        }
    }
}

fn settle<T, E>(label: &str, joined: Result<Result<T, E>, JoinError>) -> Result<T, E>
where
    E: From<TaskAborted>,
{
    match joined {
        Ok(result) => result,
        Err(join_err) if join_err.is_panic() => std::panic::resume_unwind(join_err.into_panic()),
        Err(join_err) => {
            error!(label, error = %join_err, "operation task cancelled by the runtime");
            Err(TaskAborted {
                label: label.to_owned(),
            }
            .into())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicBool;

    use assert_matches::assert_matches;
    use tokio::time::Instant;

    #[derive(Debug, PartialEq)]
    enum OpError {
        Business(&'static str),
        Timeout(TimeoutError),
        Aborted(TaskAborted),
    }

    impl From<TimeoutError> for OpError {
        fn from(e: TimeoutError) -> Self {
            Self::Timeout(e)
        }
    }

    impl From<TaskAborted> for OpError {
        fn from(e: TaskAborted) -> Self {
            Self::Aborted(e)
        }
    }

    #[tokio::test(start_paused = true)]
    async fn slow_operation_times_out_at_deadline() {
        let ctl = TimeoutController::new();
        let start = Instant::now();
        let result: Result<u32, OpError> = ctl
            .with_timeout("slow", Duration::from_secs(2), async {
                tokio::time::sleep(Duration::from_secs(10)).await;
                Ok(1)
            })
            .await;

        assert_matches!(result, Err(OpError::Timeout(e)) if e.label == "slow");
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_secs(2) && elapsed < Duration::from_secs(3), "{elapsed:?}");
        assert_eq!((ctl.armed(), ctl.released()), (1, 1));
    }

    #[tokio::test(start_paused = true)]
    async fn fast_operation_result_is_unaltered() {
        let ctl = TimeoutController::new();
        let ok: Result<u32, OpError> = ctl
            .with_timeout("fast", Duration::from_secs(2), async { Ok(7) })
            .await;
        let err: Result<u32, OpError> = ctl
            .with_timeout("fast", Duration::from_secs(2), async { Err(OpError::Business("nope")) })
            .await;

        assert_eq!(ok, Ok(7));
        assert_eq!(err, Err(OpError::Business("nope")));
        assert_eq!(ctl.armed(), 2);
        assert_eq!(ctl.released(), 2);
        assert_eq!(ctl.active(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn dropped_race_still_releases_timer() {
        let ctl = TimeoutController::new();
        let race = ctl.with_timeout::<_, (), OpError>("dropped", Duration::from_secs(5), async {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(())
        });
        let outer = tokio::time::timeout(Duration::from_secs(1), race).await;
        assert!(outer.is_err());
        assert_eq!(ctl.active(), 0);
        assert_eq!(ctl.released(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn abortable_cancels_token_on_timeout() {
        let ctl = TimeoutController::new();
        let observed = Arc::new(AtomicBool::new(false));
        let seen = Arc::clone(&observed);

        let result: Result<(), OpError> = ctl
            .with_timeout_abortable("cooperative", Duration::from_secs(1), move |token| async move {
                token.cancelled().await;
                seen.store(true, Ordering::SeqCst);
                Ok(())
            })
            .await;

        assert_matches!(result, Err(OpError::Timeout(_)));
        tokio::time::sleep(Duration::from_millis(1)).await;
        assert!(observed.load(Ordering::SeqCst));
        assert_eq!(ctl.active(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn abortable_cancels_token_on_success() {
        let ctl = TimeoutController::new();
        let (tx, rx) = tokio::sync::oneshot::channel();

        let result: Result<u8, OpError> = ctl
            .with_timeout_abortable("quick", Duration::from_secs(5), move |token| async move {
                let _ = tx.send(token);
                Ok(3)
            })
            .await;

        assert_eq!(result, Ok(3));
        let token = rx.await.unwrap();
        assert!(token.is_cancelled());
    }

    #[tokio::test(start_paused = true)]
    async fn non_cooperative_operation_keeps_running_after_losing() {
        let ctl = TimeoutController::new();
        let finished = Arc::new(AtomicBool::new(false));
        let done = Arc::clone(&finished);

        let result: Result<(), OpError> = ctl
            .with_timeout_abortable("stubborn", Duration::from_secs(1), move |_token| async move {
                tokio::time::sleep(Duration::from_secs(3)).await;
                done.store(true, Ordering::SeqCst);
                Ok(())
            })
            .await;

        assert_matches!(result, Err(OpError::Timeout(_)));
        assert!(!finished.load(Ordering::SeqCst));
        assert_eq!(ctl.active(), 0);

        // Ignored the token, so it completes in the background.
        tokio::time::sleep(Duration::from_secs(5)).await;
        assert!(finished.load(Ordering::SeqCst));
    }

    #[tokio::test(start_paused = true)]
    async fn parent_cancellation_reaches_operation() {
        let ctl = TimeoutController::new();
        let parent = CancellationToken::new();
        let trigger = parent.clone();

        let handle = tokio::spawn({
            let ctl = ctl.clone();
            async move {
                ctl.with_timeout_abortable_under(&parent, "child", Duration::from_secs(30), |token| async move {
                    token.cancelled().await;
                    Err::<(), OpError>(OpError::Business("cancelled"))
                })
                .await
            }
        });
        tokio::time::sleep(Duration::from_secs(1)).await;
        trigger.cancel();

        assert_eq!(handle.await.unwrap(), Err(OpError::Business("cancelled")));
        assert_eq!(ctl.active(), 0);
    }

    #[tokio::test]
    async fn runtime_cancelled_task_is_not_a_timeout() {
        let task = tokio::spawn(std::future::pending::<Result<(), OpError>>());
        task.abort();
        let joined = task.await;

        let result = settle::<(), OpError>("gone", joined);

        assert_matches!(result, Err(OpError::Aborted(e)) if e.label == "gone");
    }

    #[tokio::test]
    #[should_panic(expected = "exploded")]
    async fn abortable_resumes_panics() {
        let ctl = TimeoutController::new();
        let _: Result<(), OpError> = ctl
            .with_timeout_abortable("panicky", Duration::from_secs(1), |_token| async {
                if true {
                    panic!("exploded");
                }
                Ok(())
            })
            .await;
    }
}
