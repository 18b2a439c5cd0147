use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tokio::runtime::Handle;
use tokio_util::sync::CancellationToken;

use crate::TimerId;

/// One-shot timers keyed by id, each with its own cancellation token.
///
/// Cancelling one id never affects another, so independent flows can each
/// hold a live timer.
#[derive(Debug, Clone, Default)]
pub struct TimerRegistry {
    tokens: Arc<Mutex<HashMap<TimerId, CancellationToken>>>,
}

impl TimerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Runs `on_fire` after `delay` unless `timer_id` is cancelled first.
    /// Re-scheduling a live id replaces (and cancels) the previous timer.
    pub fn schedule<F>(&self, runtime: &Handle, timer_id: TimerId, delay: Duration, on_fire: F)
    where
        F: FnOnce(TimerId) + Send + 'static,
    {
        let token = CancellationToken::new();
        if let Some(previous) = self.lock().insert(timer_id, token.clone()) {
            previous.cancel();
        }
        let registry = self.clone();
        runtime.spawn(async move {
            tokio::select! {
                _ = token.cancelled() => {}
                _ = tokio::time::sleep(delay) => {
                    if registry.finish(timer_id, &token) {
                        on_fire(timer_id);
                    }
                }
            }
        });
    }

    /// Returns false when the timer already fired or was never scheduled.
    pub fn cancel(&self, timer_id: TimerId) -> bool {
        match self.lock().remove(&timer_id) {
            Some(token) => {
                token.cancel();
                true
            }
            None => false,
        }
    }

    pub fn cancel_all(&self) {
        for (_, token) in self.lock().drain() {
            token.cancel();
        }
    }

    fn finish(&self, timer_id: TimerId, token: &CancellationToken) -> bool {
        let mut tokens = self.lock();
        if token.is_cancelled() {
            return false;
        }
        tokens.remove(&timer_id);
        true
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<TimerId, CancellationToken>> {
        self.tokens
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
