//! Global crawl budget
//!
//! The guarded work runs as its own task. If the budget runs out first the
//! task is detached, not aborted: it may keep running and its side effects
//! may still land, but nobody waits for it any more.

use std::future::Future;
use std::time::Duration;

use crate::error::{CrawlError, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeadlineOutcome<T> {
    /// The work settled within the budget
    Finished(T),
    /// The budget ran out first
    Abandoned { budget: Duration },
}

impl<T> DeadlineOutcome<T> {
    pub fn is_abandoned(&self) -> bool {
        matches!(self, DeadlineOutcome::Abandoned { .. })
    }
}

/// Race `work` against `budget`
pub async fn race_deadline<F>(budget: Duration, work: F) -> Result<DeadlineOutcome<F::Output>>
where
    F: Future + Send + 'static,
    F::Output: Send + 'static,
{
    let task = tokio::spawn(work);

    tokio::select! {
        joined = task => joined
            .map(DeadlineOutcome::Finished)
            .map_err(|e| CrawlError::Task(e.to_string())),
        _ = tokio::time::sleep(budget) => {
            tracing::warn!("Crawl budget of {:?} exhausted, abandoning crawl", budget);
            Ok(DeadlineOutcome::Abandoned { budget })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;
    use tokio::time::Instant;

    #[tokio::test(start_paused = true)]
    async fn test_never_settling_work_is_abandoned_at_budget() {
        let started = Instant::now();

        let outcome = race_deadline(Duration::from_secs(180), std::future::pending::<()>())
            .await
            .unwrap();

        assert!(outcome.is_abandoned());
        assert_eq!(started.elapsed(), Duration::from_secs(180));
    }

    #[tokio::test(start_paused = true)]
    async fn test_quick_work_finishes() {
        let started = Instant::now();

        let outcome = race_deadline(Duration::from_secs(10), async {
            tokio::time::sleep(Duration::from_secs(2)).await;
            "done"
        })
        .await
        .unwrap();

        assert_eq!(outcome, DeadlineOutcome::Finished("done"));
        assert_eq!(started.elapsed(), Duration::from_secs(2));
    }

    #[tokio::test(start_paused = true)]
    async fn test_abandoned_work_keeps_running() {
        let landed = Arc::new(AtomicBool::new(false));
        let flag = landed.clone();

        let outcome = race_deadline(Duration::from_secs(1), async move {
            tokio::time::sleep(Duration::from_secs(5)).await;
            flag.store(true, Ordering::SeqCst);
        })
        .await
        .unwrap();
        assert!(outcome.is_abandoned());
        assert!(!landed.load(Ordering::SeqCst));

        tokio::time::sleep(Duration::from_secs(10)).await;
        assert!(landed.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_panicking_work_is_task_error() {
        let result = race_deadline(Duration::from_secs(10), async {
            panic!("crawler blew up");
        })
        .await;

        assert!(matches!(result, Err(CrawlError::Task(_))));
    }
}
