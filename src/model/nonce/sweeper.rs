use std::sync::Arc;

use chrono::{Duration, Utc};
use rocket::futures::future::{BoxFuture, FutureExt};
use rocket::tokio::sync::Mutex;

use crate::scheduled_task::ScheduledTask;

use super::NonceAuthority;

#[derive(Default)]
struct State {
    next: Option<ScheduledTask<()>>,
    completed: usize,
    stopped: bool,
}

/// Periodically drops expired nonces to bound memory.
///
/// Expired nonces are rejected whether or not they have been swept.
#[derive(Clone)]
pub struct NonceSweeper {
    state: Arc<Mutex<State>>,
}

impl NonceSweeper {
    /// Schedule the first sweep one `interval` from now. Each sweep schedules
    /// the next.
    pub async fn start(authority: NonceAuthority, interval: Duration) -> Self {
        let state = Arc::new(Mutex::new(State::default()));
        let sweep = Self::sweep(authority, interval, state.clone());
        state.lock().await.next = Some(ScheduledTask::after(sweep, interval));
        Self { state }
    }

    /// Run the pending sweep now instead of waiting for it.
    pub async fn trigger_now(&self) {
        if let Some(next) = &self.state.lock().await.next {
            next.trigger_now();
        }
    }

    /// Number of sweeps that have run so far.
    pub async fn completed(&self) -> usize {
        self.state.lock().await.completed
    }

    /// Cancel the pending sweep and stop rescheduling.
    pub async fn stop(&self) {
        let mut state = self.state.lock().await;
        state.stopped = true;
        if let Some(next) = state.next.take() {
            next.cancel().await;
        }
    }

    /// Recursive async, hence the `BoxFuture`.
    fn sweep(
        authority: NonceAuthority,
        interval: Duration,
        state: Arc<Mutex<State>>,
    ) -> BoxFuture<'static, ()> {
        async move {
            let removed = authority.sweep(Utc::now());
            if removed > 0 {
                debug!("Swept {removed} expired nonces, {} outstanding", authority.len());
            } else {
                trace!("Nonce sweep had nothing to do");
            }

            let mut state_locked = state.lock().await;
            state_locked.completed += 1;
            if state_locked.stopped {
                return;
            }
            let next = Self::sweep(authority, interval, state.clone());
            state_locked.next = Some(ScheduledTask::after(next, interval));
        }
        .boxed()
    }
}
