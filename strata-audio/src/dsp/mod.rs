//! Per-sample building blocks: oscillators, envelopes, the voice filter and
//! the master effects. Everything here is allocation-free once constructed
//! (delay lines are sized in [`effect::Effect::prepare`]).

pub mod effect;
pub mod envelope;
pub mod filter;
pub mod oscillator;

pub use effect::{Effect, EffectChain, EffectKind};
pub use envelope::{Envelope, EnvelopeParams, EnvelopeStage};
pub use filter::{Filter, FilterMode};
pub use oscillator::{Oscillator, Waveform};

/// Frequency of a MIDI note in 12-TET, A4 = 440 Hz.
pub fn midi_to_freq(note: u8) -> f32 {
    440.0 * 2f32.powf((note as f32 - 69.0) / 12.0)
}
