//! Bounded queue between a subscriber's receive task and its dispatch task.
//!
//! Receipt never waits on the handler unless the policy is `Block`; with the
//! drop policies a slow handler costs frames, not socket reads.
//!
//! `DropNewest` and `Block` are a plain `tokio::sync::mpsc` channel
//! (`try_send` and `send`). `DropOldest` has to evict from the far end, which
//! mpsc cannot do, so it uses a small ring guarded by a mutex.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use serde::Deserialize;
use tokio::sync::Notify;
use tokio::sync::mpsc::{self, error::TrySendError};

/// What `push` does when the queue is full.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverflowPolicy {
    /// Discard the incoming frame.
    #[default]
    DropNewest,
    /// Discard the oldest queued frame to make room.
    DropOldest,
    /// Wait for the dispatcher to free a slot.
    Block,
}

/// Frames discarded by the overflow policy. Cloned into whoever reports it.
#[derive(Debug, Clone, Default)]
pub struct DropCounter(Arc<AtomicU64>);

impl DropCounter {
    fn bump(&self) {
        self.0.fetch_add(1, Ordering::Relaxed);
    }

    pub fn get(&self) -> u64 {
        self.0.load(Ordering::Relaxed)
    }
}

/// Creates a queue holding at most `capacity` frames (at least one).
pub fn channel(capacity: usize, policy: OverflowPolicy) -> (DispatchSender, DispatchReceiver) {
    let capacity = capacity.max(1);
    let dropped = DropCounter::default();

    let (tx, rx) = match policy {
        OverflowPolicy::DropNewest | OverflowPolicy::Block => {
            let (tx, rx) = mpsc::channel(capacity);
            (SenderKind::Channel(tx), ReceiverKind::Channel(rx))
        }
        OverflowPolicy::DropOldest => {
            let ring = Arc::new(Ring::new(capacity));
            (SenderKind::Ring(ring.clone()), ReceiverKind::Ring(ring))
        }
    };

    (
        DispatchSender {
            kind: tx,
            policy,
            dropped,
        },
        DispatchReceiver { kind: rx },
    )
}

/// Producer half, owned by the receive task. Dropping it ends the queue once
/// the receiver has drained what is left.
#[derive(Debug)]
pub struct DispatchSender {
    kind: SenderKind,
    policy: OverflowPolicy,
    dropped: DropCounter,
}

#[derive(Debug)]
enum SenderKind {
    Channel(mpsc::Sender<String>),
    Ring(Arc<Ring>),
}

impl DispatchSender {
    /// Queues a frame, applying the overflow policy if the queue is full.
    /// Only `Block` ever waits.
    pub async fn push(&self, frame: String) {
        match &self.kind {
            SenderKind::Channel(tx) if self.policy == OverflowPolicy::Block => {
                // Err only means the dispatcher is gone; nothing left to deliver to.
                let _ = tx.send(frame).await;
            }
            SenderKind::Channel(tx) => match tx.try_send(frame) {
                Ok(()) | Err(TrySendError::Closed(_)) => {}
                Err(TrySendError::Full(_)) => self.dropped.bump(),
            },
            SenderKind::Ring(ring) => {
                if ring.push_evicting(frame) {
                    self.dropped.bump();
                }
            }
        }
    }

    pub fn policy(&self) -> OverflowPolicy {
        self.policy
    }

    pub fn dropped(&self) -> u64 {
        self.dropped.get()
    }

    pub fn drop_counter(&self) -> DropCounter {
        self.dropped.clone()
    }
}

impl Drop for DispatchSender {
    fn drop(&mut self) {
        if let SenderKind::Ring(ring) = &self.kind {
            ring.close();
        }
    }
}

/// Consumer half, owned by the dispatch task.
#[derive(Debug)]
pub struct DispatchReceiver {
    kind: ReceiverKind,
}

#[derive(Debug)]
enum ReceiverKind {
    Channel(mpsc::Receiver<String>),
    Ring(Arc<Ring>),
}

impl DispatchReceiver {
    /// Waits for the next frame. `None` once the sender is gone and the
    /// queue is empty.
    pub async fn pop(&mut self) -> Option<String> {
        match &mut self.kind {
            ReceiverKind::Channel(rx) => rx.recv().await,
            ReceiverKind::Ring(ring) => ring.pop().await,
        }
    }
}

#[derive(Debug)]
struct Ring {
    state: Mutex<RingState>,
    capacity: usize,
    frame_ready: Notify,
}

#[derive(Debug)]
struct RingState {
    frames: VecDeque<String>,
    closed: bool,
}

impl Ring {
    fn new(capacity: usize) -> Self {
        Self {
            state: Mutex::new(RingState {
                frames: VecDeque::with_capacity(capacity.min(1024)),
                closed: false,
            }),
            capacity,
            frame_ready: Notify::new(),
        }
    }

    fn state(&self) -> MutexGuard<'_, RingState> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Returns true when a queued frame had to be evicted.
    fn push_evicting(&self, frame: String) -> bool {
        let evicted = {
            let mut state = self.state();
            let evicted = if state.frames.len() >= self.capacity {
                state.frames.pop_front().is_some()
            } else {
                false
            };
            state.frames.push_back(frame);
            evicted
        };
        self.frame_ready.notify_one();
        evicted
    }

    fn close(&self) {
        self.state().closed = true;
        self.frame_ready.notify_one();
    }

    async fn pop(&self) -> Option<String> {
        loop {
            {
                let mut state = self.state();
                if let Some(frame) = state.frames.pop_front() {
                    return Some(frame);
                }
                if state.closed {
                    return None;
                }
            }
            self.frame_ready.notified().await;
        }
    }
}
