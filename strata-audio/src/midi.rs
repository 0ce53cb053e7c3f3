//! Sample-offset note events exchanged between the sequencer and the synth.

/// What happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MidiMessage {
    NoteOn { note: u8, velocity: u8 },
    NoteOff { note: u8 },
}

/// A message stamped with its sample offset inside the current block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MidiEvent {
    pub offset: u32,
    pub message: MidiMessage,
}

impl MidiEvent {
    pub fn note_on(offset: u32, note: u8, velocity: u8) -> Self {
        Self {
            offset,
            message: MidiMessage::NoteOn { note, velocity },
        }
    }

    pub fn note_off(offset: u32, note: u8) -> Self {
        Self {
            offset,
            message: MidiMessage::NoteOff { note },
        }
    }

    pub fn note(&self) -> u8 {
        match self.message {
            MidiMessage::NoteOn { note, .. } | MidiMessage::NoteOff { note } => note,
        }
    }

    pub fn is_note_on(&self) -> bool {
        matches!(self.message, MidiMessage::NoteOn { .. })
    }

    pub fn is_note_off(&self) -> bool {
        matches!(self.message, MidiMessage::NoteOff { .. })
    }
}

/// Fixed-capacity event list kept ordered by offset.
///
/// Insertion is stable: an event lands after every event already present at
/// the same offset. The buffer never reallocates after construction; a push
/// into a full buffer is refused.
#[derive(Debug, Clone, Default)]
pub struct MidiBuffer {
    events: Vec<MidiEvent>,
}

impl MidiBuffer {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            events: Vec::with_capacity(capacity),
        }
    }

    /// Grow the reservation to at least `capacity`. Allocates; call outside
    /// the audio callback.
    pub fn reserve_capacity(&mut self, capacity: usize) {
        if capacity > self.events.capacity() {
            self.events.reserve_exact(capacity - self.events.len());
        }
    }

    /// Insert `event` in offset order. Returns false when the buffer is full.
    pub fn push(&mut self, event: MidiEvent) -> bool {
        if self.is_full() {
            return false;
        }
        let at = self.events.partition_point(|e| e.offset <= event.offset);
        self.events.insert(at, event);
        true
    }

    pub fn clear(&mut self) {
        self.events.clear();
    }

    pub fn events(&self) -> &[MidiEvent] {
        &self.events
    }

    pub fn iter(&self) -> std::slice::Iter<'_, MidiEvent> {
        self.events.iter()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.events.capacity()
    }

    pub fn is_full(&self) -> bool {
        self.events.len() == self.events.capacity()
    }
}

impl<'a> IntoIterator for &'a MidiBuffer {
    type Item = &'a MidiEvent;
    type IntoIter = std::slice::Iter<'a, MidiEvent>;

    fn into_iter(self) -> Self::IntoIter {
        self.events.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_keeps_offset_order_stably() {
        let mut buf = MidiBuffer::with_capacity(8);
        buf.push(MidiEvent::note_on(10, 60, 100));
        buf.push(MidiEvent::note_on(0, 62, 100));
        buf.push(MidiEvent::note_off(10, 64));
        buf.push(MidiEvent::note_on(5, 65, 100));

        let offsets: Vec<u32> = buf.iter().map(|e| e.offset).collect();
        assert_eq!(offsets, vec![0, 5, 10, 10]);
        // Equal offsets keep insertion order.
        assert_eq!(buf.events()[2].note(), 60);
        assert_eq!(buf.events()[3].note(), 64);
    }

    #[test]
    fn full_buffer_refuses_push() {
        let mut buf = MidiBuffer::with_capacity(1);
        let cap = buf.capacity();
        for i in 0..cap {
            assert!(buf.push(MidiEvent::note_on(i as u32, 60, 1)));
        }
        assert!(!buf.push(MidiEvent::note_off(0, 60)));
        assert_eq!(buf.len(), cap);
    }

    #[test]
    fn reserve_does_not_shrink() {
        let mut buf = MidiBuffer::with_capacity(64);
        buf.reserve_capacity(8);
        assert!(buf.capacity() >= 64);
        buf.reserve_capacity(256);
        assert!(buf.capacity() >= 256);
    }
}
