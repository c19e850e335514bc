use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use crossbeam::channel::{self, Receiver, RecvTimeoutError, Sender, TryRecvError, TrySendError};
use crate::types::RawSample;
/// Producer side of the raw-sample hand-off.
///
/// Never blocks: when the queue is full the oldest queued sample is discarded to make
/// room, so a stalled consumer costs live samples instead of memory.
#[derive(Clone)]
pub struct SampleSender {
    tx: Sender<RawSample>,
    // only used to evict the oldest entry on overflow
    evict: Receiver<RawSample>,
    shared: Arc<Shared>,
}
struct Shared {
    dropped: AtomicU64,
    closed: AtomicBool,
}
/// Consumer side of the raw-sample hand-off. Samples come out in production order.
pub struct SampleReceiver {
    rx: Receiver<RawSample>,
    shared: Arc<Shared>,
}
/// Build a FIFO hand-off holding at most `capacity` samples.
pub fn bounded(capacity: usize) -> (SampleSender, SampleReceiver) {
    let (tx, rx) = channel::bounded(capacity.max(1));
    let shared = Arc::new(Shared {
        dropped: AtomicU64::new(0),
        closed: AtomicBool::new(false),
    });
    (
        SampleSender {
            tx,
            evict: rx.clone(),
            shared: Arc::clone(&shared),
        },
        SampleReceiver { rx, shared },
    )
}
impl SampleSender {
    /// Queue `sample`. Returns `false` once the consumer has gone away.
    pub fn send(&self, sample: RawSample) -> bool {
        if self.shared.closed.load(Ordering::Acquire) {
            return false;
        }
        let mut pending = sample;
        loop {
            match self.tx.try_send(pending) {
                Ok(()) => return true,
                Err(TrySendError::Full(back)) => {
                    if self.evict.try_recv().is_ok() {
                        self.shared.dropped.fetch_add(1, Ordering::Relaxed);
                    }
                    pending = back;
                }
                Err(TrySendError::Disconnected(_)) => return false,
            }
        }
    }
    pub fn dropped(&self) -> u64 {
        self.shared.dropped.load(Ordering::Relaxed)
    }
}
impl SampleReceiver {
    pub fn try_recv(&self) -> Option<RawSample> {
        match self.rx.try_recv() {
            Ok(sample) => Some(sample),
            Err(TryRecvError::Empty | TryRecvError::Disconnected) => None,
        }
    }
    pub fn recv_timeout(&self, timeout: Duration) -> Option<RawSample> {
        match self.rx.recv_timeout(timeout) {
            Ok(sample) => Some(sample),
            Err(RecvTimeoutError::Timeout | RecvTimeoutError::Disconnected) => None,
        }
    }
    /// Underlying channel, for use in `select!`.
    pub fn channel(&self) -> &Receiver<RawSample> {
        &self.rx
    }
    pub fn len(&self) -> usize {
        self.rx.len()
    }
    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }
    pub fn dropped(&self) -> u64 {
        self.shared.dropped.load(Ordering::Relaxed)
    }
}
impl Drop for SampleReceiver {
    fn drop(&mut self) {
        self.shared.closed.store(true, Ordering::Release);
    }
}
