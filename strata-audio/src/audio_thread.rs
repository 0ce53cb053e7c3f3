//! Audio-thread half of the engine.
//!
//! [`Engine`] owns the sequencer, the synth and the master effects, and is
//! driven by whoever owns the output stream: the device callback, the
//! offline renderer, or a test. Each block starts by draining the parameter
//! queue and then the command queue, picks up the newest published timeline,
//! generates events and renders. Nothing on this path locks, allocates or
//! logs.

use std::time::Instant;

use strata_types::Timeline;

use crate::commands::{EngineCommand, EngineStatus};
use crate::dsp::EffectChain;
use crate::engine::{SynthModule, SynthParam};
use crate::handle::EngineConfig;
use crate::midi::{MidiBuffer, MidiEvent};
use crate::param_queue::ParamReceiver;
use crate::ring_buffer::{ring_buffer, Consumer};
use crate::sequencer::Sequencer;
use crate::telemetry::BlockTelemetry;
use crate::triple_buffer::{TripleBufferReader, TripleBufferWriter};

/// Automation values routed from the sequencer to the synth per block.
const AUTOMATION_QUEUE: usize = 256;
/// Live notes buffered between blocks.
const LIVE_NOTES: usize = 128;

pub struct Engine {
    sequencer: Sequencer,
    synth: SynthModule,
    effects: EffectChain,
    params: ParamReceiver,
    commands: Consumer<EngineCommand>,
    timeline: TripleBufferReader<Timeline>,
    status: TripleBufferWriter<EngineStatus>,
    automation: Consumer<(SynthParam, f32)>,
    telemetry: BlockTelemetry,
    live: MidiBuffer,
    events: MidiBuffer,
    mono_scratch: Vec<f32>,
    sample_rate: f64,
    block_size: usize,
    max_events: usize,
    blocks_processed: u64,
    rejected_updates: u64,
}

impl Engine {
    pub(crate) fn new(
        config: &EngineConfig,
        params: ParamReceiver,
        commands: Consumer<EngineCommand>,
        timeline: TripleBufferReader<Timeline>,
        status: TripleBufferWriter<EngineStatus>,
    ) -> Self {
        let mut synth = SynthModule::new(config.sample_rate as f32, config.voices);
        synth.set_voice_stealing(config.voice_stealing);
        synth.set_master_gain(config.master_gain);

        let mut engine = Self {
            sequencer: Sequencer::new(),
            synth,
            effects: EffectChain::new(&config.effects),
            params,
            commands,
            timeline,
            status,
            automation: ring_buffer(1).1,
            telemetry: BlockTelemetry::new(),
            live: MidiBuffer::default(),
            events: MidiBuffer::default(),
            mono_scratch: Vec::new(),
            sample_rate: config.sample_rate,
            block_size: config.block_size,
            max_events: config.max_events_per_block.max(1),
            blocks_processed: 0,
            rejected_updates: 0,
        };
        engine.set_parameter_listener(|_, _| {});
        engine.prepare(config.sample_rate, config.block_size);
        engine
    }

    /// Adopt a stream format and size every buffer for it. Allocates; call
    /// before the stream starts or whenever the device reconfigures.
    pub fn prepare(&mut self, sample_rate: f64, block_size: usize) {
        let sample_rate = if sample_rate.is_finite() && sample_rate > 0.0 {
            sample_rate
        } else {
            self.sample_rate
        };
        self.sample_rate = sample_rate;
        self.block_size = block_size.max(1);
        self.sequencer.prepare(sample_rate, self.block_size);
        self.synth.set_sample_rate(sample_rate as f32);
        self.effects.prepare(sample_rate as f32);
        self.events.reserve_capacity(self.max_events);
        self.live.reserve_capacity(LIVE_NOTES);
        self.mono_scratch.resize(self.block_size, 0.0);
    }

    pub fn sample_rate(&self) -> f64 {
        self.sample_rate
    }

    pub fn block_size(&self) -> usize {
        self.block_size
    }

    pub fn sequencer(&self) -> &Sequencer {
        &self.sequencer
    }

    pub fn synth(&self) -> &SynthModule {
        &self.synth
    }

    pub fn effects(&self) -> &EffectChain {
        &self.effects
    }

    // --- Callbacks ---

    /// Forwarded from the sequencer: called with every sequenced note-on.
    pub fn set_note_event_callback(
        &mut self,
        f: impl FnMut(&strata_types::NoteEvent) + Send + 'static,
    ) {
        self.sequencer.set_note_event_callback(f);
    }

    /// Called with every automation value the sequencer produces. Values
    /// whose lane names a [`SynthParam`] are also applied to the synth.
    /// Allocates; call before the stream starts.
    pub fn set_parameter_listener(&mut self, mut f: impl FnMut(&str, f32) + Send + 'static) {
        let (mut tx, rx) = ring_buffer(AUTOMATION_QUEUE);
        self.automation = rx;
        self.sequencer.set_parameter_callback(move |name, value| {
            if let Some(param) = SynthParam::from_name(name) {
                // A full queue drops the value; the lane is re-read next block.
                let _ = tx.push((param, value));
            }
            f(name, value);
        });
    }

    // --- Rendering ---

    /// Render interleaving-free stereo. Long buffers are split into blocks of
    /// at most `block_size` frames.
    pub fn process_stereo(&mut self, left: &mut [f32], right: &mut [f32]) {
        let frames = left.len().min(right.len());
        let mut start = 0;
        while start < frames {
            let end = (start + self.block_size).min(frames);
            self.render_block(&mut left[start..end], &mut right[start..end]);
            start = end;
        }
    }

    /// Render mono (the left channel of the stereo mix).
    pub fn process(&mut self, output: &mut [f32]) {
        let mut scratch = std::mem::take(&mut self.mono_scratch);
        let frames = output.len();
        let mut start = 0;
        while start < frames {
            let end = (start + self.block_size).min(frames);
            let len = (end - start).min(scratch.len());
            if len == 0 {
                break;
            }
            self.render_block(&mut output[start..start + len], &mut scratch[..len]);
            start += len;
        }
        self.mono_scratch = scratch;
    }

    fn render_block(&mut self, left: &mut [f32], right: &mut [f32]) {
        let started = Instant::now();
        let frames = left.len();

        self.drain_params();
        self.drain_commands();

        let timeline = self.timeline.read();
        self.sequencer
            .process_block(timeline, self.live.events(), &mut self.events, frames);
        self.live.clear();

        while let Some((param, value)) = self.automation.pop() {
            self.synth.apply_normalized(param, value);
        }

        self.synth
            .process_stereo_block(self.events.events(), left, right, frames);
        self.effects.process(left, right);

        self.blocks_processed += 1;
        self.telemetry.record(
            started.elapsed(),
            BlockTelemetry::budget_us(frames, self.sample_rate),
        );
        self.publish_status();
    }

    fn drain_params(&mut self) {
        let synth = &mut self.synth;
        let effects = &mut self.effects;
        let rejected = &mut self.rejected_updates;
        self.params.process_updates(|update| {
            let index = update.param_index.get();
            let applied = match update.node_id.effect_slot() {
                None => synth.apply_param(index, update.value),
                Some(slot) => effects.set_param(slot, index, update.value),
            };
            if !applied {
                *rejected += 1;
            }
        });
    }

    fn drain_commands(&mut self) {
        while let Some(command) = self.commands.pop() {
            self.apply_command(command);
        }
    }

    fn apply_command(&mut self, command: EngineCommand) {
        match command {
            EngineCommand::Play => self.sequencer.play(),
            EngineCommand::Stop => self.sequencer.stop(),
            EngineCommand::TogglePlayStop => self.sequencer.toggle_play_stop(),
            EngineCommand::SetPosition(beats) => self.sequencer.set_position(beats),
            EngineCommand::SetTempo(bpm) => self.sequencer.set_tempo(bpm),
            EngineCommand::SetTimeSignature(num, den) => self.sequencer.set_time_signature(num, den),
            EngineCommand::SetLoop { start, end } => {
                self.sequencer.set_loop(start, end);
            }
            EngineCommand::SetLooping(looping) => self.sequencer.set_looping(looping),
            EngineCommand::SetQuantizeGrid(grid) => self.sequencer.set_quantize_grid(grid),
            EngineCommand::NoteOn { note, velocity } => {
                self.live.push(MidiEvent::note_on(0, note, velocity));
            }
            EngineCommand::NoteOff { note } => {
                self.live.push(MidiEvent::note_off(0, note));
            }
            EngineCommand::AllNotesOff => {
                let position = self.sequencer.position();
                self.sequencer.set_position(position);
                self.synth.all_notes_off();
            }
        }
    }

    /// The status as of the last rendered block.
    pub fn current_status(&self) -> EngineStatus {
        EngineStatus {
            position_beats: self.sequencer.position(),
            tempo_bpm: self.sequencer.tempo(),
            playing: self.sequencer.is_playing(),
            active_voices: self.synth.active_voice_count(),
            dropped_notes: self.synth.dropped_notes(),
            dropped_updates: 0,
            rejected_updates: self.rejected_updates,
            blocks_processed: self.blocks_processed,
            telemetry: self.telemetry.summary(),
        }
    }

    fn publish_status(&mut self) {
        let status = self.current_status();
        self.status.write(status);
    }
}
