//! Serial execution context for listener callbacks.

use futures::FutureExt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::pin::Pin;
use tokio::sync::{mpsc, oneshot};

type Job = Pin<Box<dyn Future<Output = ()> + Send + 'static>>;

enum Command {
    Run(Job),
    Flush(oneshot::Sender<()>),
}

/// Cloneable handle that queues jobs onto one [`DeliveryLoop`].
///
/// Jobs run one at a time in submission order.
#[derive(Clone, Debug)]
pub struct DeliveryContext {
    tx: mpsc::UnboundedSender<Command>,
}

/// Drains the queue. Ends once every [`DeliveryContext`] handle is dropped.
pub struct DeliveryLoop {
    rx: mpsc::UnboundedReceiver<Command>,
}

impl std::fmt::Debug for DeliveryLoop {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeliveryLoop").finish_non_exhaustive()
    }
}

impl DeliveryContext {
    /// The host drives the returned loop on its own task (e.g. its UI task).
    ///
    /// The queue is unbounded: jobs accumulate in memory until the loop runs,
    /// so a host that never drives it leaks every queued callback.
    pub fn channel() -> (Self, DeliveryLoop) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, DeliveryLoop { rx })
    }

    /// Runs the loop on the current tokio runtime. Must be called within one.
    pub fn spawn() -> Self {
        let (context, delivery_loop) = Self::channel();
        tokio::spawn(delivery_loop.run());
        context
    }

    pub fn dispatch<F>(&self, job: F) -> bool
    where
        F: FnOnce() + Send + 'static,
    {
        self.dispatch_async(async move { job() })
    }

    pub fn dispatch_async<Fut>(&self, job: Fut) -> bool
    where
        Fut: Future<Output = ()> + Send + 'static,
    {
        if self.tx.send(Command::Run(Box::pin(job))).is_err() {
            log::warn!("delivery loop has stopped; dropping queued job");
            return false;
        }
        true
    }

    /// Resolves after every job queued before this call has run.
    pub async fn flush(&self) {
        let (done_tx, done_rx) = oneshot::channel();
        if self.tx.send(Command::Flush(done_tx)).is_err() {
            return;
        }
        let _ = done_rx.await;
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

impl DeliveryLoop {
    pub async fn run(mut self) {
        while let Some(command) = self.rx.recv().await {
            match command {
                Command::Run(job) => {
                    if let Err(panic) = AssertUnwindSafe(job).catch_unwind().await {
                        log::warn!("delivery job panicked: {}", panic_message(panic.as_ref()));
                    }
                }
                Command::Flush(done) => {
                    let _ = done.send(());
                }
            }
        }
        log::debug!("delivery loop finished");
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> &str {
    panic
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| panic.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("non-string panic payload")
}
