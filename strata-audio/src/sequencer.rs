//! Transport and sample-accurate event generation.
//!
//! The [`Sequencer`] walks a [`Timeline`] one audio block at a time and turns
//! the notes that start inside the block into note-on events stamped with
//! their sample offset. Every note it starts is tracked as an
//! [`ActiveNote`] until the matching note-off has been emitted, so stopping,
//! relocating or wrapping around the loop never leaves a note hanging.
//!
//! All per-block storage is reserved in [`Sequencer::prepare`]; nothing in
//! [`Sequencer::process_midi`] allocates.

use strata_types::{
    clamp_tempo, quantize_time, value_at, NoteEvent, PlayState, Timeline, TransportState,
};

use crate::midi::{MidiBuffer, MidiEvent};

/// Upper bound on simultaneously sounding sequenced notes.
pub const MAX_ACTIVE_NOTES: usize = 256;
/// Upper bound on note starts gathered from the timeline per block.
pub const MAX_NOTES_PER_BLOCK: usize = 1024;

pub const DEFAULT_SAMPLE_RATE: f64 = 44_100.0;
pub const DEFAULT_BLOCK_SIZE: usize = 512;

pub type NoteCallback = Box<dyn FnMut(&NoteEvent) + Send>;
pub type ParameterCallback = Box<dyn FnMut(&str, f32) + Send>;

/// A sequenced note between its note-on and note-off. Times are absolute
/// timeline beats.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ActiveNote {
    pub note: u8,
    pub velocity: u8,
    pub start_time: f64,
    pub end_time: f64,
}

pub struct Sequencer {
    transport: TransportState,
    sample_rate: f64,
    block_size: usize,
    last_event_position: f64,
    active_notes: Vec<ActiveNote>,
    /// Note-offs staged outside a block; flushed at offset 0 of the next one.
    pending: Vec<MidiEvent>,
    scratch: Vec<NoteEvent>,
    note_callback: Option<NoteCallback>,
    parameter_callback: Option<ParameterCallback>,
}

impl Default for Sequencer {
    fn default() -> Self {
        Self::new()
    }
}

fn reserve_to<T>(v: &mut Vec<T>, capacity: usize) {
    if v.capacity() < capacity {
        v.reserve_exact(capacity - v.len());
    }
}

impl Sequencer {
    pub fn new() -> Self {
        let mut sequencer = Self {
            transport: TransportState::default(),
            sample_rate: DEFAULT_SAMPLE_RATE,
            block_size: DEFAULT_BLOCK_SIZE,
            last_event_position: 0.0,
            active_notes: Vec::new(),
            pending: Vec::new(),
            scratch: Vec::new(),
            note_callback: None,
            parameter_callback: None,
        };
        sequencer.prepare(DEFAULT_SAMPLE_RATE, DEFAULT_BLOCK_SIZE);
        sequencer
    }

    /// Set the stream format and reserve every per-block buffer. Allocates;
    /// call before the audio callback starts.
    pub fn prepare(&mut self, sample_rate: f64, block_size: usize) {
        self.sample_rate = if sample_rate.is_finite() && sample_rate > 0.0 {
            sample_rate
        } else {
            DEFAULT_SAMPLE_RATE
        };
        self.block_size = block_size.max(1);
        reserve_to(&mut self.active_notes, MAX_ACTIVE_NOTES);
        reserve_to(&mut self.pending, MAX_ACTIVE_NOTES);
        reserve_to(&mut self.scratch, MAX_NOTES_PER_BLOCK);
    }

    pub fn sample_rate(&self) -> f64 {
        self.sample_rate
    }

    pub fn block_size(&self) -> usize {
        self.block_size
    }

    // --- Callbacks ---

    /// Called with every note-on, carrying the note's absolute start time.
    pub fn set_note_event_callback(&mut self, f: impl FnMut(&NoteEvent) + Send + 'static) {
        self.note_callback = Some(Box::new(f));
    }

    /// Called with every automated parameter value, once per block.
    pub fn set_parameter_callback(&mut self, f: impl FnMut(&str, f32) + Send + 'static) {
        self.parameter_callback = Some(Box::new(f));
    }

    pub fn clear_callbacks(&mut self) {
        self.note_callback = None;
        self.parameter_callback = None;
    }

    // --- Transport ---

    pub fn play(&mut self) {
        if self.transport.is_playing() {
            return;
        }
        self.active_notes.clear();
        self.last_event_position = self.transport.position_beats;
        self.transport.play_state = PlayState::Playing;
    }

    /// Stop playback. Note-offs for every sounding note are staged before
    /// this returns and go out at the start of the next block.
    pub fn stop(&mut self) {
        self.stage_all_notes_off();
        self.transport.play_state = PlayState::Stopped;
    }

    pub fn toggle_play_stop(&mut self) {
        if self.transport.is_playing() {
            self.stop();
        } else {
            self.play();
        }
    }

    pub fn is_playing(&self) -> bool {
        self.transport.is_playing()
    }

    pub fn position(&self) -> f64 {
        self.transport.position_beats
    }

    pub fn last_event_position(&self) -> f64 {
        self.last_event_position
    }

    /// Relocate the playhead. Sounding notes are released.
    pub fn set_position(&mut self, beats: f64) {
        self.stage_all_notes_off();
        let beats = if beats.is_finite() { beats.max(0.0) } else { 0.0 };
        self.transport.position_beats = beats;
        self.last_event_position = beats;
    }

    pub fn tempo(&self) -> f64 {
        self.transport.tempo_bpm
    }

    /// Clamped to [1, 999] BPM. Takes effect from the next block.
    pub fn set_tempo(&mut self, bpm: f64) {
        self.transport.tempo_bpm = clamp_tempo(bpm);
    }

    pub fn time_signature(&self) -> (u32, u32) {
        self.transport.time_signature
    }

    pub fn set_time_signature(&mut self, numerator: u32, denominator: u32) {
        self.transport.time_signature = (numerator.max(1), denominator.max(1));
    }

    pub fn is_looping(&self) -> bool {
        self.transport.looping
    }

    pub fn set_looping(&mut self, looping: bool) {
        self.transport.looping = looping;
    }

    pub fn loop_range(&self) -> (f64, f64) {
        (self.transport.loop_start, self.transport.loop_end)
    }

    /// Rejects non-finite bounds, a negative start, and `start >= end`.
    pub fn set_loop(&mut self, start: f64, end: f64) -> bool {
        if !start.is_finite() || !end.is_finite() || start < 0.0 || start >= end {
            return false;
        }
        self.transport.loop_start = start;
        self.transport.loop_end = end;
        true
    }

    pub fn quantize_grid(&self) -> f64 {
        self.transport.quantize_grid
    }

    pub fn set_quantize_grid(&mut self, grid: f64) {
        self.transport.quantize_grid = if grid.is_finite() { grid.max(0.0) } else { 0.0 };
    }

    pub fn quantize_time(&self, time: f64) -> f64 {
        quantize_time(time, self.transport.quantize_grid)
    }

    pub fn transport(&self) -> &TransportState {
        &self.transport
    }

    pub fn create_state(&self) -> TransportState {
        self.transport
    }

    /// Adopt a saved transport. The play state is kept; sounding notes are
    /// released.
    pub fn restore_state(&mut self, state: &TransportState) {
        self.stage_all_notes_off();
        let play_state = self.transport.play_state;
        self.transport = TransportState {
            play_state,
            ..state.sanitized()
        };
        self.last_event_position = self.transport.position_beats;
    }

    // --- Conversions ---

    pub fn beats_to_seconds(&self, beats: f64) -> f64 {
        beats * 60.0 / self.transport.tempo_bpm
    }

    pub fn seconds_to_beats(&self, seconds: f64) -> f64 {
        seconds * self.transport.tempo_bpm / 60.0
    }

    pub fn beats_to_samples(&self, beats: f64) -> f64 {
        self.beats_to_seconds(beats) * self.sample_rate
    }

    pub fn samples_per_beat(&self) -> f64 {
        self.beats_to_samples(1.0)
    }

    /// 1-based (bar, beat) of the playhead plus the fraction into the beat.
    /// Beats count in units of the time signature's denominator.
    pub fn bar_beat_position(&self) -> (u32, u32, f64) {
        let beats_per_bar = self.transport.beats_per_bar();
        let beat_length = 4.0 / self.transport.time_signature.1 as f64;
        let position = self.transport.position_beats;

        let bar = (position / beats_per_bar).floor();
        let within_bar = (position - bar * beats_per_bar) / beat_length;
        let beat = within_bar.floor();
        (bar as u32 + 1, beat as u32 + 1, within_bar - beat)
    }

    // --- Inspection ---

    pub fn active_notes(&self) -> &[ActiveNote] {
        &self.active_notes
    }

    /// Note-offs waiting for the next block.
    pub fn pending_events(&self) -> &[MidiEvent] {
        &self.pending
    }

    // --- Block processing ---

    /// Generate one block of `block_size` frames. See [`Sequencer::process_block`].
    pub fn process_midi(&mut self, timeline: &Timeline, incoming: &[MidiEvent], out: &mut MidiBuffer) {
        self.process_block(timeline, incoming, out, self.block_size);
    }

    /// Fill `out` with the events for the next `frames` samples: staged
    /// note-offs first, then `incoming`, then whatever the timeline
    /// contributes while playing. `out` is cleared first and stays ordered by
    /// offset.
    pub fn process_block(
        &mut self,
        timeline: &Timeline,
        incoming: &[MidiEvent],
        out: &mut MidiBuffer,
        frames: usize,
    ) {
        let frames = frames.max(1);
        out.clear();
        self.pending.retain(|event| !out.push(*event));
        let last_offset = frames as u32 - 1;
        for event in incoming {
            out.push(MidiEvent {
                offset: event.offset.min(last_offset),
                ..*event
            });
        }

        if !self.transport.is_playing() {
            return;
        }

        let block_beats = self.seconds_to_beats(frames as f64 / self.sample_rate);
        let range_start = self.last_event_position;
        let next = self.transport.position_beats + block_beats;
        let TransportState {
            looping,
            loop_start,
            loop_end,
            ..
        } = self.transport;

        let position = if looping && next >= loop_end {
            // Nothing past the loop end is generated before the wrap.
            let boundary = loop_end.max(range_start);
            self.generate_events(timeline, range_start, boundary, 0.0, frames, out);
            self.release_ended_notes(range_start, boundary, 0.0, frames, out);

            let boundary_samples = self.beats_to_samples(boundary - range_start);
            let boundary_offset = self.offset_at(boundary_samples, frames);
            self.force_notes_off(boundary_offset, out);

            // A block never covers more beats than it spans, even when the
            // playhead was parked past the loop end.
            let remaining = (block_beats - (boundary - range_start)).max(0.0);
            let position = loop_start + remaining % (loop_end - loop_start);
            self.generate_events(timeline, loop_start, position, boundary_samples, frames, out);
            self.release_ended_notes(loop_start, position, boundary_samples, frames, out);
            position
        } else {
            self.generate_events(timeline, range_start, next, 0.0, frames, out);
            self.release_ended_notes(range_start, next, 0.0, frames, out);
            next
        };

        self.emit_automation(timeline, position);
        self.transport.position_beats = position;
        self.last_event_position = position;
    }

    fn offset_at(&self, samples: f64, frames: usize) -> u32 {
        (samples.max(0.0) as usize).min(frames - 1) as u32
    }

    /// Note-ons for every note starting in `[start, end)`. `base_samples` is
    /// the block offset that `start` maps to.
    fn generate_events(
        &mut self,
        timeline: &Timeline,
        start: f64,
        end: f64,
        base_samples: f64,
        frames: usize,
        out: &mut MidiBuffer,
    ) {
        if end <= start {
            return;
        }
        let mut notes = std::mem::take(&mut self.scratch);
        timeline.collect_notes_in_range(start, end, &mut notes);

        for note in &notes {
            let offset = self.offset_at(base_samples + self.beats_to_samples(note.start_time), frames);
            let absolute_start = start + note.start_time;

            if let Some(idx) = self.active_notes.iter().position(|a| a.note == note.note) {
                if !out.push(MidiEvent::note_off(offset, note.note)) {
                    continue;
                }
                self.active_notes.swap_remove(idx);
            }
            if self.active_notes.len() == self.active_notes.capacity() {
                continue;
            }
            if !out.push(MidiEvent::note_on(offset, note.note, note.velocity)) {
                continue;
            }
            self.active_notes.push(ActiveNote {
                note: note.note,
                velocity: note.velocity,
                start_time: absolute_start,
                end_time: absolute_start + note.duration,
            });
            if let Some(callback) = self.note_callback.as_mut() {
                callback(&NoteEvent {
                    start_time: absolute_start,
                    ..*note
                });
            }
        }

        self.scratch = notes;
    }

    /// Note-offs for every active note ending at or before `end`. A note-off
    /// that does not fit in `out` stays active and is retried next block.
    fn release_ended_notes(
        &mut self,
        start: f64,
        end: f64,
        base_samples: f64,
        frames: usize,
        out: &mut MidiBuffer,
    ) {
        let mut i = 0;
        while i < self.active_notes.len() {
            let note = self.active_notes[i];
            if note.end_time <= end {
                let samples = base_samples + self.beats_to_samples(note.end_time - start);
                let offset = self.offset_at(samples, frames);
                if out.push(MidiEvent::note_off(offset, note.note)) {
                    self.active_notes.swap_remove(i);
                    continue;
                }
            }
            i += 1;
        }
    }

    fn force_notes_off(&mut self, offset: u32, out: &mut MidiBuffer) {
        for note in self.active_notes.drain(..) {
            let event = MidiEvent::note_off(offset, note.note);
            if !out.push(event) && self.pending.len() < self.pending.capacity() {
                self.pending.push(MidiEvent { offset: 0, ..event });
            }
        }
    }

    fn stage_all_notes_off(&mut self) {
        for note in self.active_notes.drain(..) {
            if self.pending.len() < self.pending.capacity() {
                self.pending.push(MidiEvent::note_off(0, note.note));
            }
        }
    }

    fn emit_automation(&mut self, timeline: &Timeline, at: f64) {
        let Some(callback) = self.parameter_callback.as_mut() else {
            return;
        };
        for (instance, pattern) in timeline.instances_at(at) {
            let local = at - instance.start_time();
            for (param, points) in pattern.automation() {
                if let Some(value) = value_at(points, local) {
                    callback(param, value);
                }
            }
        }
    }
}
