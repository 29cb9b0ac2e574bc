//! Cooperative cancellation for long-running aggregations.
//!
//! A [`CancelHandle`] and its [`CancelToken`]s share a `watch` channel. Firing
//! the handle wakes every token; tokens created after the fact observe the
//! cancellation immediately.

use tokio::sync::watch;

/// Sender side. Dropping it without calling [`CancelHandle::cancel`] never
/// cancels anything.
#[derive(Debug)]
pub struct CancelHandle {
    tx: watch::Sender<bool>,
}

/// Receiver side, cheap to clone and hand to an aggregation.
#[derive(Debug, Clone)]
pub struct CancelToken {
    rx: watch::Receiver<bool>,
}

impl CancelHandle {
    pub fn pair() -> (Self, CancelToken) {
        let (tx, rx) = watch::channel(false);
        (Self { tx }, CancelToken { rx })
    }

    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }

    pub fn token(&self) -> CancelToken {
        CancelToken {
            rx: self.tx.subscribe(),
        }
    }
}

impl CancelToken {
    /// A token whose handle is already gone; it never fires.
    pub fn never() -> Self {
        let (_handle, token) = CancelHandle::pair();
        token
    }

    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolves once cancellation is requested. Pends forever if the handle
    /// is dropped first.
    pub async fn cancelled(&mut self) {
        if self.rx.wait_for(|cancelled| *cancelled).await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}
