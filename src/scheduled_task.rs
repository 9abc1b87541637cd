use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use chrono::{DateTime, Utc};
use rocket::tokio::{
    self,
    sync::Notify,
    task::{JoinError, JoinHandle},
    time::Duration,
};

/// A future that starts running at a given time, unless it is triggered
/// early or cancelled first.
pub struct ScheduledTask<T> {
    task_handle: JoinHandle<T>,
    timer_handle: JoinHandle<()>,
    start: Arc<Notify>,
}

impl<T> ScheduledTask<T>
where
    T: Send + 'static,
{
    /// Run `task` at `run_at`, or straight away if that is already past.
    pub fn new<Fut>(task: Fut, run_at: DateTime<Utc>) -> Self
    where
        Fut: Future<Output = T> + Send + 'static,
    {
        let start = Arc::new(Notify::new());

        let task_start = start.clone();
        let task_handle = tokio::spawn(async move {
            task_start.notified().await;
            task.await
        });

        let delay = until(run_at);
        let timer_start = start.clone();
        let timer_handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            timer_start.notify_one();
        });

        Self {
            task_handle,
            timer_handle,
            start,
        }
    }

    /// Run `task` once `delay` has elapsed.
    pub fn after<Fut>(task: Fut, delay: chrono::Duration) -> Self
    where
        Fut: Future<Output = T> + Send + 'static,
    {
        Self::new(task, Utc::now() + delay)
    }

    /// Abort the task. Returns true iff it had already run to completion.
    pub async fn cancel(self) -> bool {
        self.task_handle.abort();
        self.timer_handle.abort();
        self.task_handle.await.is_ok()
    }

    /// Start the task now rather than at its scheduled time.
    pub fn trigger_now(&self) {
        self.timer_handle.abort();
        self.start.notify_one();
    }

    pub fn is_finished(&self) -> bool {
        self.task_handle.is_finished()
    }
}

impl<T> Future for ScheduledTask<T> {
    type Output = Result<T, JoinError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.task_handle).poll(cx)
    }
}

/// Time from now until `datetime`, or zero if it has passed.
fn until(datetime: DateTime<Utc>) -> Duration {
    (datetime - Utc::now()).to_std().unwrap_or(Duration::ZERO)
}
