//! # strata-audio
//!
//! The real-time half of Strata: the sequencer that turns a [`Timeline`] into
//! sample-accurate note events, the polyphonic synthesizer that renders them,
//! and the lock-free plumbing that lets a control thread steer both without
//! ever blocking the audio callback.
//!
//! [`Timeline`]: strata_types::Timeline

pub mod audio_thread;
pub mod commands;
pub mod dsp;
pub mod engine;
pub mod handle;
pub mod midi;
pub mod param_queue;
pub mod ring_buffer;
pub mod sequencer;
pub mod telemetry;
pub mod triple_buffer;

pub use audio_thread::Engine;
pub use commands::{EngineCommand, EngineStatus};
pub use engine::{SynthModule, SynthParam};
pub use handle::{engine_pair, EngineConfig, EngineHandle};
pub use midi::{MidiBuffer, MidiEvent, MidiMessage};
pub use param_queue::{parameter_queue, ParamReceiver, ParamSender, ParamUpdate};
pub use sequencer::{ActiveNote, Sequencer};
