//! Subscription pump.
//!
//! Forwards events from a notification-source subscription into a consumer
//! closure on a dedicated thread until shut down. The closure typically owns
//! a debouncer; dropping the pump tears both down in order.

use std::thread::{self, JoinHandle};

use crossbeam_channel::{bounded, Receiver, Sender};

use super::events::ChangeEvent;

pub(crate) struct EventPump {
    shutdown_tx: Sender<()>,
    worker: Option<JoinHandle<()>>,
}

impl EventPump {
    /// Starts forwarding `events` into `forward` until shutdown or until the
    /// source hangs up.
    pub(crate) fn start<F>(events: Receiver<ChangeEvent>, mut forward: F) -> Self
    where
        F: FnMut(ChangeEvent) + Send + 'static,
    {
        let (shutdown_tx, shutdown_rx) = bounded::<()>(1);
        let worker = thread::spawn(move || loop {
            crossbeam_channel::select! {
                recv(events) -> event => match event {
                    Ok(event) => forward(event),
                    Err(_) => break,
                },
                recv(shutdown_rx) -> _ => break,
            }
        });
        Self {
            shutdown_tx,
            worker: Some(worker),
        }
    }
}

impl Drop for EventPump {
    fn drop(&mut self) {
        let _ = self.shutdown_tx.send(());
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}
