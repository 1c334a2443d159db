use std::{
    future::Future,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
};

use tokio::{runtime, sync::Notify};

use crate::error::Error;

/// The single event loop of a run.
///
/// Every async fixture and every concurrent group is driven by this loop, one
/// `block_on` at a time.
#[derive(Debug)]
pub struct EventLoop {
    runtime: runtime::Runtime,
}

impl EventLoop {
    pub fn new() -> Result<Self, Error> {
        let runtime = runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(Error::EventLoop)?;
        Ok(Self { runtime })
    }

    pub fn block_on<F: Future>(&self, future: F) -> F::Output {
        self.runtime.block_on(future)
    }
}

/// A handle to stop a run from the outside, for example from a signal handler.
///
/// Triggering cancels a running call phase and keeps the run loop from
/// starting another item.
#[derive(Debug, Clone, Default)]
pub struct Interrupt(Arc<InterruptInner>);

#[derive(Debug, Default)]
struct InterruptInner {
    triggered: AtomicBool,
    notify: Notify,
}

impl Interrupt {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn trigger(&self) {
        self.0.triggered.store(true, Ordering::SeqCst);
        self.0.notify.notify_waiters();
    }

    pub fn is_triggered(&self) -> bool {
        self.0.triggered.load(Ordering::SeqCst)
    }

    /// Resolves once [`trigger`](Self::trigger) was called.
    pub async fn triggered(&self) {
        loop {
            let notified = self.0.notify.notified();
            if self.is_triggered() {
                return;
            }
            notified.await;
        }
    }
}
