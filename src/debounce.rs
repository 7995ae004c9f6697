//! Event debouncing.
//!
//! Filesystem notifications arrive in bursts - a bulk import or an external
//! tool rewriting files produces dozens of events in a few milliseconds.
//! [`DelayBatcher`] coalesces them: every `trigger` records its payload and
//! re-arms a timer, and only once no trigger has arrived for a full quiet
//! interval does the accumulated batch get delivered in one callback.

use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam_channel::{unbounded, RecvTimeoutError, Sender};

/// Default quiet interval before a batch is delivered.
pub const DEFAULT_DEBOUNCE_DELAY: Duration = Duration::from_millis(250);

/// What the batch callback wants the timer to do next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchControl {
    /// Disarm until the next trigger.
    Disarm,
    /// Stay armed with the quiet-interval clock reset. Useful while an
    /// interactive operation is still in progress; the next delivery may
    /// carry an empty batch.
    Rearm,
}

enum Msg<T> {
    Trigger(T),
    Shutdown,
}

/// Coalesces rapid `trigger` calls into one callback per quiet interval.
///
/// A worker thread polls at half the configured delay. On each poll it
/// compares the time elapsed since the most recent trigger against the full
/// delay; once the quiet interval has passed it drains the pending batch into
/// the callback. While triggers keep arriving faster than the delay, no
/// callback fires; after the last trigger, one fires within the delay plus
/// one poll tick.
///
/// Dropping the batcher shuts the worker down and joins it.
pub struct DelayBatcher<T: Send + 'static> {
    tx: Sender<Msg<T>>,
    worker: Option<JoinHandle<()>>,
}

impl<T: Send + 'static> DelayBatcher<T> {
    pub fn new<F>(delay: Duration, mut on_batch: F) -> Self
    where
        F: FnMut(Vec<T>) -> BatchControl + Send + 'static,
    {
        let (tx, rx) = unbounded::<Msg<T>>();
        let poll = (delay / 2).max(Duration::from_millis(1));
        let worker = thread::spawn(move || {
            let mut pending: Vec<T> = Vec::new();
            let mut armed = false;
            let mut last_trigger = Instant::now();
            loop {
                let msg = if armed {
                    rx.recv_timeout(poll)
                } else {
                    rx.recv().map_err(|_| RecvTimeoutError::Disconnected)
                };
                match msg {
                    Ok(Msg::Trigger(item)) => {
                        pending.push(item);
                        last_trigger = Instant::now();
                        armed = true;
                    }
                    Ok(Msg::Shutdown) | Err(RecvTimeoutError::Disconnected) => break,
                    Err(RecvTimeoutError::Timeout) => {
                        if last_trigger.elapsed() >= delay {
                            match on_batch(std::mem::take(&mut pending)) {
                                BatchControl::Rearm => last_trigger = Instant::now(),
                                BatchControl::Disarm => armed = false,
                            }
                        }
                    }
                }
            }
        });
        Self {
            tx,
            worker: Some(worker),
        }
    }

    /// Records a payload and (re)arms the delivery timer.
    pub fn trigger(&self, item: T) {
        let _ = self.tx.send(Msg::Trigger(item));
    }
}

impl<T: Send + 'static> Drop for DelayBatcher<T> {
    fn drop(&mut self) {
        let _ = self.tx.send(Msg::Shutdown);
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    fn collecting_batcher(delay: Duration) -> (DelayBatcher<u32>, Arc<Mutex<Vec<Vec<u32>>>>) {
        let batches: Arc<Mutex<Vec<Vec<u32>>>> = Arc::new(Mutex::new(Vec::new()));
        let sink = batches.clone();
        let batcher = DelayBatcher::new(delay, move |batch| {
            sink.lock().unwrap().push(batch);
            BatchControl::Disarm
        });
        (batcher, batches)
    }

    #[test]
    fn burst_of_triggers_delivers_one_batch_with_every_payload() {
        let (batcher, batches) = collecting_batcher(Duration::from_millis(40));
        for value in 0..10 {
            batcher.trigger(value);
        }
        thread::sleep(Duration::from_millis(150));

        let batches = batches.lock().unwrap();
        assert_eq!(batches.len(), 1);
        assert_eq!(batches[0], (0..10).collect::<Vec<_>>());
    }

    #[test]
    fn no_delivery_while_triggers_keep_arriving() {
        let (batcher, batches) = collecting_batcher(Duration::from_millis(150));
        // keep triggering faster than the delay
        for value in 0..6 {
            batcher.trigger(value);
            thread::sleep(Duration::from_millis(25));
        }
        assert_eq!(batches.lock().unwrap().len(), 0);

        // then go quiet and expect exactly one delivery
        thread::sleep(Duration::from_millis(400));
        let batches = batches.lock().unwrap();
        assert_eq!(batches.len(), 1);
        assert_eq!(batches[0].len(), 6);
    }

    #[test]
    fn disarmed_timer_does_not_fire_again() {
        let (batcher, batches) = collecting_batcher(Duration::from_millis(30));
        batcher.trigger(1);
        thread::sleep(Duration::from_millis(200));
        assert_eq!(batches.lock().unwrap().len(), 1);
    }

    #[test]
    fn rearm_keeps_the_timer_running() {
        let deliveries: Arc<Mutex<Vec<Vec<u32>>>> = Arc::new(Mutex::new(Vec::new()));
        let sink = deliveries.clone();
        let batcher = DelayBatcher::new(Duration::from_millis(30), move |batch| {
            let mut sink = sink.lock().unwrap();
            sink.push(batch);
            // ask for one extra firing, then stop
            if sink.len() == 1 {
                BatchControl::Rearm
            } else {
                BatchControl::Disarm
            }
        });
        batcher.trigger(7);
        thread::sleep(Duration::from_millis(250));

        let deliveries = deliveries.lock().unwrap();
        assert_eq!(deliveries.len(), 2);
        assert_eq!(deliveries[0], vec![7]);
        assert!(deliveries[1].is_empty());
    }

    #[test]
    fn drop_joins_the_worker_without_delivering() {
        let (batcher, batches) = collecting_batcher(Duration::from_millis(500));
        batcher.trigger(1);
        drop(batcher);
        assert_eq!(batches.lock().unwrap().len(), 0);
    }
}
