//! Control-side half of the engine.

use strata_types::{NodeId, ParamIndex, Timeline};

use crate::audio_thread::Engine;
use crate::commands::{EngineCommand, EngineStatus};
use crate::dsp::EffectKind;
use crate::engine::{SynthParam, DEFAULT_VOICES};
use crate::param_queue::{parameter_queue, ParamSender};
use crate::ring_buffer::{ring_buffer, Producer};
use crate::triple_buffer::{triple_buffer, TripleBufferReader, TripleBufferWriter};

#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    pub sample_rate: f64,
    pub block_size: usize,
    pub voices: usize,
    pub voice_stealing: bool,
    pub master_gain: f32,
    /// Master effects in processing order; slot `i` is node `i + 1`.
    pub effects: Vec<EffectKind>,
    pub param_queue_capacity: usize,
    pub command_queue_capacity: usize,
    pub max_events_per_block: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            sample_rate: 44_100.0,
            block_size: 512,
            voices: DEFAULT_VOICES,
            voice_stealing: true,
            master_gain: 0.5,
            effects: Vec::new(),
            param_queue_capacity: 1024,
            command_queue_capacity: 256,
            max_events_per_block: 1024,
        }
    }
}

/// Create a connected handle/engine pair. The engine goes to the audio
/// thread; the handle stays with the control side.
pub fn engine_pair(config: &EngineConfig) -> (EngineHandle, Engine) {
    let (params_tx, params_rx) = parameter_queue(config.param_queue_capacity);
    let (commands_tx, commands_rx) = ring_buffer(config.command_queue_capacity);
    let (timeline_tx, timeline_rx) = triple_buffer(Timeline::new());
    let (status_tx, status_rx) = triple_buffer(EngineStatus::default());

    let engine = Engine::new(config, params_rx, commands_rx, timeline_rx, status_tx);
    log::info!(
        target: "engine",
        "engine ready: {} voices, {} Hz, {} frame blocks, {} effects",
        config.voices,
        config.sample_rate,
        config.block_size,
        config.effects.len()
    );

    let handle = EngineHandle {
        params: params_tx,
        commands: commands_tx,
        timeline: timeline_tx,
        status: status_rx,
        dropped_commands: 0,
    };
    (handle, engine)
}

pub struct EngineHandle {
    params: ParamSender,
    commands: Producer<EngineCommand>,
    timeline: TripleBufferWriter<Timeline>,
    status: TripleBufferReader<EngineStatus>,
    dropped_commands: u64,
}

impl EngineHandle {
    // --- Parameters ---

    pub fn enqueue_param(&mut self, node_id: NodeId, param_index: ParamIndex, value: f32) -> bool {
        self.params.enqueue(node_id, param_index, value)
    }

    pub fn set_synth_param(&mut self, param: SynthParam, value: f32) -> bool {
        self.enqueue_param(NodeId::SYNTH, ParamIndex::new(param.index()), value)
    }

    pub fn set_effect_param(&mut self, slot: usize, param_index: u32, value: f32) -> bool {
        self.enqueue_param(NodeId::effect(slot), ParamIndex::new(param_index), value)
    }

    pub fn dropped_updates(&self) -> u64 {
        self.params.dropped_updates()
    }

    // --- Commands ---

    /// Queue a command for the next block. Returns false when the queue is
    /// full.
    pub fn send(&mut self, command: EngineCommand) -> bool {
        match self.commands.push(command) {
            Ok(()) => true,
            Err(command) => {
                self.dropped_commands += 1;
                log::warn!(target: "engine", "command queue full, dropped {:?}", command);
                false
            }
        }
    }

    pub fn dropped_commands(&self) -> u64 {
        self.dropped_commands
    }

    pub fn play(&mut self) -> bool {
        self.send(EngineCommand::Play)
    }

    pub fn stop(&mut self) -> bool {
        self.send(EngineCommand::Stop)
    }

    pub fn toggle_play_stop(&mut self) -> bool {
        self.send(EngineCommand::TogglePlayStop)
    }

    pub fn set_position(&mut self, beats: f64) -> bool {
        self.send(EngineCommand::SetPosition(beats))
    }

    pub fn set_tempo(&mut self, bpm: f64) -> bool {
        self.send(EngineCommand::SetTempo(bpm))
    }

    pub fn set_time_signature(&mut self, numerator: u32, denominator: u32) -> bool {
        self.send(EngineCommand::SetTimeSignature(numerator, denominator))
    }

    /// Rejected here, without queueing, when `start >= end`.
    pub fn set_loop(&mut self, start: f64, end: f64) -> bool {
        if !(start.is_finite() && end.is_finite()) || start < 0.0 || start >= end {
            log::warn!(target: "engine", "ignoring invalid loop {}..{}", start, end);
            return false;
        }
        self.send(EngineCommand::SetLoop { start, end })
    }

    pub fn set_looping(&mut self, looping: bool) -> bool {
        self.send(EngineCommand::SetLooping(looping))
    }

    pub fn set_quantize_grid(&mut self, grid: f64) -> bool {
        self.send(EngineCommand::SetQuantizeGrid(grid))
    }

    pub fn note_on(&mut self, note: u8, velocity: u8) -> bool {
        self.send(EngineCommand::NoteOn { note, velocity })
    }

    pub fn note_off(&mut self, note: u8) -> bool {
        self.send(EngineCommand::NoteOff { note })
    }

    pub fn all_notes_off(&mut self) -> bool {
        self.send(EngineCommand::AllNotesOff)
    }

    // --- Snapshots ---

    /// Hand a copy of `timeline` to the audio thread. The engine picks it up
    /// at the start of its next block.
    pub fn publish_timeline(&mut self, timeline: &Timeline) {
        self.timeline.write(timeline.clone());
        log::debug!(
            target: "timeline",
            "published timeline: {} patterns, {} instances, {:.2} beats",
            timeline.pattern_count(),
            timeline.get_pattern_instances().len(),
            timeline.get_length()
        );
    }

    /// Latest status published by the engine.
    pub fn status(&mut self) -> EngineStatus {
        EngineStatus {
            dropped_updates: self.params.dropped_updates(),
            ..*self.status.read()
        }
    }
}
