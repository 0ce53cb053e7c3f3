//! Messages between the control side and the engine.

use crate::telemetry::TelemetrySummary;

/// Control-side requests drained by the engine at the start of each block.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum EngineCommand {
    Play,
    Stop,
    TogglePlayStop,
    SetPosition(f64),
    SetTempo(f64),
    SetTimeSignature(u32, u32),
    SetLoop { start: f64, end: f64 },
    SetLooping(bool),
    SetQuantizeGrid(f64),
    /// Live note from outside the timeline, played at the start of the next block.
    NoteOn { note: u8, velocity: u8 },
    NoteOff { note: u8 },
    /// Release every sounding voice and every sequenced note.
    AllNotesOff,
}

/// Snapshot the engine publishes after every block.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct EngineStatus {
    pub position_beats: f64,
    pub tempo_bpm: f64,
    pub playing: bool,
    pub active_voices: usize,
    pub dropped_notes: u64,
    /// Parameter updates lost to a full queue. Filled in by the handle.
    pub dropped_updates: u64,
    /// Parameter updates addressed to an unknown node or parameter.
    pub rejected_updates: u64,
    pub blocks_processed: u64,
    pub telemetry: TelemetrySummary,
}
