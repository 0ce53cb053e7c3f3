//! Voice selection for a fixed pool.
//!
//! Order of preference for a note-on:
//! 1. Same-pitch retrigger: the active voice already playing that note
//! 2. The first inactive voice
//! 3. Steal: the oldest voice in release, else the oldest voice overall
//!
//! Age is the note-on serial number, so stealing is deterministic.

use super::voices::SynthVoice;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Allocation {
    Retrigger(usize),
    Free(usize),
    Steal(usize),
}

impl Allocation {
    pub fn index(self) -> usize {
        match self {
            Allocation::Retrigger(i) | Allocation::Free(i) | Allocation::Steal(i) => i,
        }
    }
}

#[derive(Debug, Clone)]
pub struct VoiceAllocator {
    next_serial: u64,
    stealing: bool,
}

impl Default for VoiceAllocator {
    fn default() -> Self {
        Self::new(true)
    }
}

impl VoiceAllocator {
    pub fn new(stealing: bool) -> Self {
        Self {
            next_serial: 0,
            stealing,
        }
    }

    pub fn stealing_enabled(&self) -> bool {
        self.stealing
    }

    pub fn set_stealing(&mut self, stealing: bool) {
        self.stealing = stealing;
    }

    /// Serial for the next note-on. Strictly increasing.
    pub fn next_serial(&mut self) -> u64 {
        self.next_serial += 1;
        self.next_serial
    }

    /// Pick the voice for `note`, or `None` when the note has to be dropped.
    pub fn allocate(&self, voices: &[SynthVoice], note: u8) -> Option<Allocation> {
        if let Some(i) = voices
            .iter()
            .position(|v| v.is_active() && v.current_note() == note)
        {
            return Some(Allocation::Retrigger(i));
        }
        if let Some(i) = voices.iter().position(|v| !v.is_active()) {
            return Some(Allocation::Free(i));
        }
        if !self.stealing {
            return None;
        }
        Self::find_steal_candidate(voices).map(Allocation::Steal)
    }

    /// Releasing voices go first; ties break on age.
    fn find_steal_candidate(voices: &[SynthVoice]) -> Option<usize> {
        voices
            .iter()
            .enumerate()
            .min_by_key(|(_, v)| (!v.is_releasing(), v.serial()))
            .map(|(i, _)| i)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pool(n: usize) -> Vec<SynthVoice> {
        (0..n).map(|_| SynthVoice::new(48_000.0)).collect()
    }

    fn play(voices: &mut [SynthVoice], alloc: &mut VoiceAllocator, note: u8) -> Option<Allocation> {
        let choice = alloc.allocate(voices, note)?;
        let serial = alloc.next_serial();
        voices[choice.index()].note_on(note, 100, serial);
        Some(choice)
    }

    #[test]
    fn free_voices_fill_in_order() {
        let mut voices = pool(3);
        let mut alloc = VoiceAllocator::new(true);
        assert_eq!(play(&mut voices, &mut alloc, 60), Some(Allocation::Free(0)));
        assert_eq!(play(&mut voices, &mut alloc, 62), Some(Allocation::Free(1)));
        assert_eq!(play(&mut voices, &mut alloc, 64), Some(Allocation::Free(2)));
    }

    #[test]
    fn same_note_retriggers() {
        let mut voices = pool(3);
        let mut alloc = VoiceAllocator::new(true);
        play(&mut voices, &mut alloc, 60);
        play(&mut voices, &mut alloc, 62);
        assert_eq!(play(&mut voices, &mut alloc, 60), Some(Allocation::Retrigger(0)));
    }

    #[test]
    fn steals_oldest_releasing_voice_first() {
        let mut voices = pool(3);
        let mut alloc = VoiceAllocator::new(true);
        play(&mut voices, &mut alloc, 60);
        play(&mut voices, &mut alloc, 62);
        play(&mut voices, &mut alloc, 64);
        voices[2].note_off();
        assert_eq!(play(&mut voices, &mut alloc, 65), Some(Allocation::Steal(2)));
    }

    #[test]
    fn steals_oldest_voice_when_none_release() {
        let mut voices = pool(2);
        let mut alloc = VoiceAllocator::new(true);
        play(&mut voices, &mut alloc, 60);
        play(&mut voices, &mut alloc, 62);
        assert_eq!(play(&mut voices, &mut alloc, 64), Some(Allocation::Steal(0)));
        assert_eq!(play(&mut voices, &mut alloc, 65), Some(Allocation::Steal(1)));
    }

    #[test]
    fn no_stealing_drops_note() {
        let mut voices = pool(1);
        let mut alloc = VoiceAllocator::new(false);
        play(&mut voices, &mut alloc, 60);
        assert_eq!(alloc.allocate(&voices, 61), None);
        assert_eq!(alloc.allocate(&voices, 60), Some(Allocation::Retrigger(0)));
    }

    #[test]
    fn empty_pool_allocates_nothing() {
        let alloc = VoiceAllocator::new(true);
        assert_eq!(alloc.allocate(&[], 60), None);
    }
}
