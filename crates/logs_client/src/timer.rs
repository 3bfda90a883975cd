use std::{future::Future, time::Duration};

use tokio::task::JoinHandle;

/// A cancellable timer with at most one pending callback.
///
/// Arming cancels whatever was pending; the callback never runs after
/// `cancel` or drop.
#[derive(Debug, Default)]
pub struct SingleSlotTimer {
    pending: Option<JoinHandle<()>>,
}

impl SingleSlotTimer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn arm<F>(&mut self, delay: Duration, callback: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.cancel();
        self.pending = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            callback.await;
        }));
    }

    /// Returns whether a callback was still pending.
    pub fn cancel(&mut self) -> bool {
        match self.pending.take() {
            Some(handle) => {
                let was_pending = !handle.is_finished();
                handle.abort();
                was_pending
            }
            None => false,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.pending
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }
}

impl Drop for SingleSlotTimer {
    fn drop(&mut self) {
        self.cancel();
    }
}
