//! Lock-free triple buffer for handing whole snapshots between two threads.
//!
//! Three slots rotate between the writer (back), the reader (front) and a
//! shared middle slot. Publishing swaps the back slot into the middle;
//! reading swaps the middle into the front when it carries fresh data. Each
//! side only ever touches the slot it owns, so neither side waits and the
//! reader never observes a half-written value.
//!
//! Used to move [`Timeline`](strata_types::Timeline) snapshots onto the
//! audio thread and [`EngineStatus`](crate::EngineStatus) back off it.

use std::cell::UnsafeCell;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

/// Low two bits: index of the middle slot.
const INDEX_MASK: u8 = 0b11;
/// Set when the middle slot holds a value the reader has not seen yet.
const FRESH: u8 = 0b100;

struct Shared<T> {
    slots: [UnsafeCell<T>; 3],
    middle: AtomicU8,
}

// Safety: a slot is only accessed by the half that currently owns its index,
// and ownership changes hands through the atomic swap on `middle`.
unsafe impl<T: Send> Send for Shared<T> {}
unsafe impl<T: Send> Sync for Shared<T> {}

/// Writer half. Owns the back slot.
pub struct TripleBufferWriter<T> {
    shared: Arc<Shared<T>>,
    back: usize,
}

/// Reader half. Owns the front slot.
pub struct TripleBufferReader<T> {
    shared: Arc<Shared<T>>,
    front: usize,
}

/// Create a triple buffer whose three slots start out as `initial`.
pub fn triple_buffer<T: Clone>(initial: T) -> (TripleBufferWriter<T>, TripleBufferReader<T>) {
    let shared = Arc::new(Shared {
        slots: [
            UnsafeCell::new(initial.clone()),
            UnsafeCell::new(initial.clone()),
            UnsafeCell::new(initial),
        ],
        middle: AtomicU8::new(1),
    });
    (
        TripleBufferWriter {
            shared: Arc::clone(&shared),
            back: 2,
        },
        TripleBufferReader { shared, front: 0 },
    )
}

impl<T> TripleBufferWriter<T> {
    /// Replace the back slot with `value` and publish it.
    ///
    /// The value previously held by the recycled slot is dropped here, on the
    /// writer's thread.
    pub fn write(&mut self, value: T) {
        *self.back_mut() = value;
        self.publish();
    }

    /// Modify the back slot in place, then publish it. The back slot holds
    /// whatever the reader handed back last, not necessarily the latest
    /// written value.
    pub fn modify(&mut self, f: impl FnOnce(&mut T)) {
        f(self.back_mut());
        self.publish();
    }

    fn back_mut(&mut self) -> &mut T {
        // Safety: `back` is owned exclusively by this writer.
        unsafe { &mut *self.shared.slots[self.back].get() }
    }

    fn publish(&mut self) {
        let previous = self
            .shared
            .middle
            .swap(self.back as u8 | FRESH, Ordering::AcqRel);
        self.back = (previous & INDEX_MASK) as usize;
    }
}

impl<T> TripleBufferReader<T> {
    /// True when the writer has published since the last [`read`](Self::read).
    pub fn has_fresh(&self) -> bool {
        self.shared.middle.load(Ordering::Acquire) & FRESH != 0
    }

    /// Take the latest published value if any, and return the front slot.
    pub fn read(&mut self) -> &T {
        self.update();
        self.current()
    }

    /// Swap in the latest published value. Returns whether anything changed.
    pub fn update(&mut self) -> bool {
        if !self.has_fresh() {
            return false;
        }
        let previous = self
            .shared
            .middle
            .swap(self.front as u8, Ordering::AcqRel);
        self.front = (previous & INDEX_MASK) as usize;
        true
    }

    /// The front slot as of the last update, without checking for news.
    pub fn current(&self) -> &T {
        // Safety: `front` is owned exclusively by this reader.
        unsafe { &*self.shared.slots[self.front].get() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reader_sees_initial_value() {
        let (_w, mut r) = triple_buffer(7u32);
        assert!(!r.has_fresh());
        assert_eq!(*r.read(), 7);
    }

    #[test]
    fn reader_sees_latest_write() {
        let (mut w, mut r) = triple_buffer(0u32);
        w.write(1);
        w.write(2);
        w.write(3);
        assert!(r.has_fresh());
        assert_eq!(*r.read(), 3);
        assert!(!r.has_fresh());
        assert_eq!(*r.read(), 3);
    }

    #[test]
    fn update_reports_freshness() {
        let (mut w, mut r) = triple_buffer(String::from("a"));
        assert!(!r.update());
        w.write(String::from("b"));
        assert!(r.update());
        assert_eq!(r.current(), "b");
        assert!(!r.update());
    }

    #[test]
    fn modify_publishes() {
        let (mut w, mut r) = triple_buffer(vec![1, 2]);
        w.modify(|v| v.push(3));
        assert_eq!(r.read().last(), Some(&3));
    }

    #[test]
    fn values_cross_threads_in_order() {
        let (mut w, mut r) = triple_buffer(0u64);
        let writer = std::thread::spawn(move || {
            for i in 1..=10_000u64 {
                w.write(i);
            }
        });
        let mut last = 0;
        while last < 10_000 {
            let v = *r.read();
            assert!(v >= last, "went backwards: {} after {}", v, last);
            last = v;
        }
        writer.join().unwrap();
    }
}
