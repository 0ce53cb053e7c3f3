//! Parameter updates from the control side to the audio thread.
//!
//! A thin layer over the SPSC [`ring_buffer`](crate::ring_buffer): updates
//! are plain `Copy` records addressed by node and parameter index, and a
//! full queue drops the update instead of blocking. Drops are counted on the
//! sender so the control side can surface them.

use strata_types::{NodeId, ParamIndex};

use crate::ring_buffer::{ring_buffer, Consumer, Producer};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParamUpdate {
    pub node_id: NodeId,
    pub param_index: ParamIndex,
    pub value: f32,
}

/// Control-side half. One sender per queue; share it behind a lock if
/// several control threads need it.
pub struct ParamSender {
    producer: Producer<ParamUpdate>,
    dropped: u64,
}

/// Audio-side half.
pub struct ParamReceiver {
    consumer: Consumer<ParamUpdate>,
}

/// Create a parameter queue holding at least `capacity` pending updates.
pub fn parameter_queue(capacity: usize) -> (ParamSender, ParamReceiver) {
    let (producer, consumer) = ring_buffer(capacity);
    (
        ParamSender {
            producer,
            dropped: 0,
        },
        ParamReceiver { consumer },
    )
}

impl ParamSender {
    /// Queue an update. Returns false, and counts the drop, when the queue is
    /// full.
    pub fn enqueue(&mut self, node_id: NodeId, param_index: ParamIndex, value: f32) -> bool {
        let update = ParamUpdate {
            node_id,
            param_index,
            value,
        };
        match self.producer.push(update) {
            Ok(()) => true,
            Err(_) => {
                self.dropped += 1;
                log::warn!(
                    target: "engine",
                    "parameter queue full, dropped update {}:{} = {}",
                    node_id,
                    param_index,
                    value
                );
                false
            }
        }
    }

    pub fn dropped_updates(&self) -> u64 {
        self.dropped
    }

    pub fn pending(&self) -> usize {
        self.producer.len()
    }

    pub fn capacity(&self) -> usize {
        self.producer.capacity()
    }
}

impl ParamReceiver {
    /// Apply every queued update in FIFO order. Returns the number applied.
    pub fn process_updates(&mut self, f: impl FnMut(ParamUpdate)) -> usize {
        self.consumer.drain(f)
    }

    pub fn is_empty(&self) -> bool {
        self.consumer.is_empty()
    }
}
