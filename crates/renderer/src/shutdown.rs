use std::sync::{Arc, Mutex, PoisonError};
use std::time::Instant;

use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender, TryRecvError};

/// Fires the shutdown signal. Cloneable; the first `trigger` wins.
#[derive(Clone)]
pub struct Shutdown {
    sender: Arc<Mutex<Option<Sender<()>>>>,
    receiver: Receiver<()>,
}

/// Observes the shutdown signal. Nothing is ever sent on the channel; it
/// fires by disconnecting.
#[derive(Clone)]
pub struct ShutdownSignal {
    receiver: Receiver<()>,
}

pub fn shutdown_channel() -> (Shutdown, ShutdownSignal) {
    let (sender, receiver) = bounded(0);
    (
        Shutdown {
            sender: Arc::new(Mutex::new(Some(sender))),
            receiver: receiver.clone(),
        },
        ShutdownSignal { receiver },
    )
}

impl Shutdown {
    pub fn trigger(&self) {
        let mut sender = self.sender.lock().unwrap_or_else(PoisonError::into_inner);
        if sender.take().is_some() {
            tracing::debug!("shutdown triggered");
        }
    }

    /// A new listener for this shutdown.
    pub fn subscribe(&self) -> ShutdownSignal {
        ShutdownSignal {
            receiver: self.receiver.clone(),
        }
    }
}

impl ShutdownSignal {
    pub fn is_triggered(&self) -> bool {
        matches!(self.receiver.try_recv(), Err(TryRecvError::Disconnected))
    }

    /// Sleeps until `deadline` or shutdown, whichever comes first.
    /// Returns `true` when shutdown fired.
    pub fn wait_until(&self, deadline: Instant) -> bool {
        match self.receiver.recv_deadline(deadline) {
            Err(RecvTimeoutError::Timeout) => false,
            Err(RecvTimeoutError::Disconnected) | Ok(()) => true,
        }
    }

    /// Channel to use in `select!`; it becomes ready on shutdown.
    pub fn receiver(&self) -> &Receiver<()> {
        &self.receiver
    }
}
