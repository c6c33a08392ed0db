use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::sync::oneshot;

/// Creates a linked pair: dropping the handle resolves the signal.
///
/// `CommandServer::run` serves until its signal resolves. The controller's reconcile worker
/// takes one too and exits between jobs once it resolves, discarding whatever is still queued.
pub fn shutdown_signal() -> (ShutdownHandle, ShutdownSignal) {
    let (tx, rx) = oneshot::channel();

    (ShutdownHandle { _tx: tx }, ShutdownSignal { rx })
}

/// Whoever owns this decides when the task waiting on the matching signal stops. There is no
/// explicit trigger; drop it.
pub struct ShutdownHandle {
    _tx: oneshot::Sender<()>,
}

/// Resolves once, when the matching handle is dropped.
pub struct ShutdownSignal {
    rx: oneshot::Receiver<()>,
}

impl Future for ShutdownSignal {
    type Output = ();

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let rx = Pin::new(&mut self.rx);

        match rx.poll(cx) {
            Poll::Pending => Poll::Pending,
            // Sent or dropped, either means stop.
            Poll::Ready(_) => Poll::Ready(()),
        }
    }
}
