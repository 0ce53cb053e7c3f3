//! Bounded lock-free single-producer/single-consumer ring buffer.
//!
//! Capacity is rounded up to a power of two so slot lookup is a mask.
//! The producer owns `tail`, the consumer owns `head`; each publishes its
//! index with release ordering and reads the other's with acquire ordering.
//! Neither operation blocks or allocates, which makes both halves safe to
//! call from the audio thread.

use std::cell::UnsafeCell;
use std::mem::MaybeUninit;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

struct Shared<T> {
    slots: Box<[UnsafeCell<MaybeUninit<T>>]>,
    mask: usize,
    /// Next slot to read. Written only by the consumer.
    head: AtomicUsize,
    /// Next slot to write. Written only by the producer.
    tail: AtomicUsize,
}

// Safety: a slot is written only by the producer while it is outside
// [head, tail) and read only by the consumer while it is inside.
unsafe impl<T: Send> Send for Shared<T> {}
unsafe impl<T: Send> Sync for Shared<T> {}

impl<T> Shared<T> {
    fn capacity(&self) -> usize {
        self.mask + 1
    }

    fn len(&self) -> usize {
        let tail = self.tail.load(Ordering::Acquire);
        let head = self.head.load(Ordering::Acquire);
        tail.wrapping_sub(head)
    }
}

impl<T> Drop for Shared<T> {
    fn drop(&mut self) {
        let head = *self.head.get_mut();
        let tail = *self.tail.get_mut();
        let mut i = head;
        while i != tail {
            // Safety: every slot in [head, tail) holds an initialized value.
            unsafe { (*self.slots[i & self.mask].get()).assume_init_drop() };
            i = i.wrapping_add(1);
        }
    }
}

/// Writing half of a ring buffer.
pub struct Producer<T> {
    shared: Arc<Shared<T>>,
}

/// Reading half of a ring buffer.
pub struct Consumer<T> {
    shared: Arc<Shared<T>>,
}

/// Create a ring buffer holding at least `capacity` items (minimum one).
pub fn ring_buffer<T>(capacity: usize) -> (Producer<T>, Consumer<T>) {
    let capacity = capacity.max(1).next_power_of_two();
    let slots = (0..capacity)
        .map(|_| UnsafeCell::new(MaybeUninit::uninit()))
        .collect::<Vec<_>>()
        .into_boxed_slice();
    let shared = Arc::new(Shared {
        slots,
        mask: capacity - 1,
        head: AtomicUsize::new(0),
        tail: AtomicUsize::new(0),
    });
    (
        Producer {
            shared: Arc::clone(&shared),
        },
        Consumer { shared },
    )
}

impl<T> Producer<T> {
    /// Append `item`. Hands it back when the buffer is full.
    pub fn push(&mut self, item: T) -> Result<(), T> {
        let shared = &*self.shared;
        let tail = shared.tail.load(Ordering::Relaxed);
        let head = shared.head.load(Ordering::Acquire);
        if tail.wrapping_sub(head) == shared.capacity() {
            return Err(item);
        }
        // Safety: the slot at `tail` is outside [head, tail) and so not
        // visible to the consumer until the store below.
        unsafe { (*shared.slots[tail & shared.mask].get()).write(item) };
        shared.tail.store(tail.wrapping_add(1), Ordering::Release);
        Ok(())
    }

    pub fn capacity(&self) -> usize {
        self.shared.capacity()
    }

    pub fn len(&self) -> usize {
        self.shared.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_full(&self) -> bool {
        self.len() == self.capacity()
    }
}

impl<T> Consumer<T> {
    /// Remove the oldest item, or `None` when the buffer is empty.
    pub fn pop(&mut self) -> Option<T> {
        let shared = &*self.shared;
        let head = shared.head.load(Ordering::Relaxed);
        let tail = shared.tail.load(Ordering::Acquire);
        if head == tail {
            return None;
        }
        // Safety: the slot at `head` is inside [head, tail), fully written
        // by the producer before its release store of `tail`.
        let item = unsafe { (*shared.slots[head & shared.mask].get()).assume_init_read() };
        shared.head.store(head.wrapping_add(1), Ordering::Release);
        Some(item)
    }

    /// Pop until empty, handing each item to `f`. Returns how many were
    /// drained.
    pub fn drain(&mut self, mut f: impl FnMut(T)) -> usize {
        let mut count = 0;
        while let Some(item) = self.pop() {
            f(item);
            count += 1;
        }
        count
    }

    pub fn capacity(&self) -> usize {
        self.shared.capacity()
    }

    pub fn len(&self) -> usize {
        self.shared.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capacity_rounds_up_to_power_of_two() {
        let (p, _c) = ring_buffer::<u8>(5);
        assert_eq!(p.capacity(), 8);
        let (p, _c) = ring_buffer::<u8>(0);
        assert_eq!(p.capacity(), 1);
    }

    #[test]
    fn fifo_order() {
        let (mut p, mut c) = ring_buffer(4);
        for i in 0..4 {
            p.push(i).unwrap();
        }
        for i in 0..4 {
            assert_eq!(c.pop(), Some(i));
        }
        assert_eq!(c.pop(), None);
    }

    #[test]
    fn full_buffer_returns_item() {
        let (mut p, mut c) = ring_buffer(2);
        p.push(1).unwrap();
        p.push(2).unwrap();
        assert!(p.is_full());
        assert_eq!(p.push(3), Err(3));
        assert_eq!(c.pop(), Some(1));
        p.push(3).unwrap();
        assert_eq!(c.pop(), Some(2));
        assert_eq!(c.pop(), Some(3));
    }

    #[test]
    fn wraps_around_many_times() {
        let (mut p, mut c) = ring_buffer(4);
        for i in 0..1000 {
            p.push(i).unwrap();
            assert_eq!(c.pop(), Some(i));
        }
        assert!(c.is_empty());
    }

    #[test]
    fn drain_empties_in_order() {
        let (mut p, mut c) = ring_buffer(8);
        for i in 0..5 {
            p.push(i).unwrap();
        }
        let mut seen = Vec::new();
        assert_eq!(c.drain(|x| seen.push(x)), 5);
        assert_eq!(seen, vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn drops_unread_items() {
        let marker = Arc::new(());
        {
            let (mut p, _c) = ring_buffer(4);
            p.push(Arc::clone(&marker)).unwrap();
            p.push(Arc::clone(&marker)).unwrap();
            assert_eq!(Arc::strong_count(&marker), 3);
        }
        assert_eq!(Arc::strong_count(&marker), 1);
    }

    #[test]
    fn spsc_across_threads_preserves_order() {
        let (mut p, mut c) = ring_buffer(64);
        let producer = std::thread::spawn(move || {
            let mut i = 0u32;
            while i < 100_000 {
                if p.push(i).is_ok() {
                    i += 1;
                }
            }
        });
        let mut expected = 0u32;
        while expected < 100_000 {
            if let Some(v) = c.pop() {
                assert_eq!(v, expected);
                expected += 1;
            }
        }
        producer.join().unwrap();
    }
}
