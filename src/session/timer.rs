//! Single-shot refresh timer.

use std::future::Future;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::debug;

/// Holds at most one pending refresh task.
///
/// Every `arm` cancels the previous task first. Each arm gets a new
/// generation number so the firing task can tell whether it is still the
/// current one.
#[derive(Debug, Default)]
pub(crate) struct RefreshTimer {
    handle: Option<JoinHandle<()>>,
    generation: u64,
}

impl RefreshTimer {
    /// Abort the pending task, if any.
    pub(crate) fn cancel(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
            debug!(generation = self.generation, "Refresh timer cancelled");
        }
    }

    /// Cancel, then schedule `on_fire(generation)` after `delay`.
    pub(crate) fn arm<F, Fut>(&mut self, delay: Duration, on_fire: F)
    where
        F: FnOnce(u64) -> Fut,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.cancel();
        self.generation += 1;
        let fire = on_fire(self.generation);
        self.handle = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            fire.await;
        }));
        debug!(
            generation = self.generation,
            delay_secs = delay.as_secs(),
            "Refresh timer armed"
        );
    }

    /// Called by the firing task. Detaches the handle so that re-arming from
    /// inside the refresh does not abort the task doing the refresh.
    ///
    /// Returns false if `generation` is no longer current.
    pub(crate) fn take_fired(&mut self, generation: u64) -> bool {
        if self.generation == generation && self.handle.is_some() {
            self.handle = None;
            true
        } else {
            false
        }
    }

    pub(crate) fn is_armed(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }
}

impl Drop for RefreshTimer {
    fn drop(&mut self) {
        self.cancel();
    }
}
