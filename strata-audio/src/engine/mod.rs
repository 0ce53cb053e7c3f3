//! Polyphonic synthesizer: a fixed pool of [`SynthVoice`]s driven by
//! sample-offset MIDI events.

pub mod params;
pub mod voice_allocator;
pub mod voices;

pub use params::SynthParam;
pub use voice_allocator::{Allocation, VoiceAllocator};
pub use voices::SynthVoice;

use crate::dsp::{EnvelopeParams, FilterMode, Waveform};
use crate::midi::{MidiEvent, MidiMessage};

pub const DEFAULT_VOICES: usize = 16;
pub const MAX_MASTER_GAIN: f32 = 2.0;

/// Current value of every broadcast setting. Voices hold their own copies;
/// this is the readback and the source for partial envelope updates.
#[derive(Debug, Clone, PartialEq)]
pub struct SynthSettings {
    pub waveforms: [Waveform; 2],
    pub detune_cents: [f32; 2],
    pub levels: [f32; 2],
    pub filter_mode: FilterMode,
    pub filter_cutoff: f32,
    pub filter_resonance: f32,
    pub filter_env_amount: f32,
    pub amp_envelope: EnvelopeParams,
    pub filter_envelope: EnvelopeParams,
    pub master_gain: f32,
}

impl Default for SynthSettings {
    fn default() -> Self {
        Self {
            waveforms: [Waveform::Saw, Waveform::Saw],
            detune_cents: [0.0, 0.0],
            levels: [1.0, 0.0],
            filter_mode: FilterMode::LowPass,
            filter_cutoff: 1_000.0,
            filter_resonance: 0.0,
            filter_env_amount: 0.0,
            amp_envelope: EnvelopeParams::default(),
            filter_envelope: EnvelopeParams::default(),
            master_gain: 0.5,
        }
    }
}

pub struct SynthModule {
    voices: Vec<SynthVoice>,
    allocator: VoiceAllocator,
    settings: SynthSettings,
    sample_rate: f32,
    dropped_notes: u64,
}

impl SynthModule {
    /// A pool of exactly `num_voices` voices. The pool never grows.
    pub fn new(sample_rate: f32, num_voices: usize) -> Self {
        let mut synth = Self {
            voices: (0..num_voices).map(|_| SynthVoice::new(sample_rate)).collect(),
            allocator: VoiceAllocator::new(true),
            settings: SynthSettings::default(),
            sample_rate: sample_rate.max(1.0),
            dropped_notes: 0,
        };
        synth.apply_settings(&SynthSettings::default());
        synth
    }

    pub fn sample_rate(&self) -> f32 {
        self.sample_rate
    }

    /// Retune every voice for a new stream rate and silence them.
    pub fn set_sample_rate(&mut self, sample_rate: f32) {
        self.sample_rate = sample_rate.max(1.0);
        for voice in &mut self.voices {
            voice.set_sample_rate(self.sample_rate);
        }
        self.reset();
    }

    pub fn set_voice_stealing(&mut self, enabled: bool) {
        self.allocator.set_stealing(enabled);
    }

    pub fn voice_stealing(&self) -> bool {
        self.allocator.stealing_enabled()
    }

    pub fn num_voices(&self) -> usize {
        self.voices.len()
    }

    pub fn voices(&self) -> &[SynthVoice] {
        &self.voices
    }

    pub fn active_voice_count(&self) -> usize {
        self.voices.iter().filter(|v| v.is_active()).count()
    }

    /// Note-ons that found no voice.
    pub fn dropped_notes(&self) -> u64 {
        self.dropped_notes
    }

    pub fn settings(&self) -> &SynthSettings {
        &self.settings
    }

    // --- Events ---

    /// Velocity 0 is treated as a note-off.
    pub fn note_on(&mut self, note: u8, velocity: u8) {
        if velocity == 0 {
            self.note_off(note);
            return;
        }
        match self.allocator.allocate(&self.voices, note) {
            Some(choice) => {
                let serial = self.allocator.next_serial();
                self.voices[choice.index()].note_on(note, velocity, serial);
            }
            None => self.dropped_notes += 1,
        }
    }

    /// Release the voice holding `note`. It keeps sounding through its
    /// release tail.
    pub fn note_off(&mut self, note: u8) {
        for voice in &mut self.voices {
            if voice.is_active() && voice.current_note() == note && !voice.is_releasing() {
                voice.note_off();
            }
        }
    }

    pub fn handle_event(&mut self, event: &MidiEvent) {
        match event.message {
            MidiMessage::NoteOn { note, velocity } => self.note_on(note, velocity),
            MidiMessage::NoteOff { note } => self.note_off(note),
        }
    }

    /// Release every voice.
    pub fn all_notes_off(&mut self) {
        for voice in &mut self.voices {
            voice.note_off();
        }
    }

    /// Silence every voice immediately.
    pub fn reset(&mut self) {
        for voice in &mut self.voices {
            voice.kill();
        }
    }

    // --- Rendering ---

    /// Render `num_samples` mono samples into `output`, applying each event
    /// at its sample offset. `events` must be ordered by offset; events past
    /// the end of the block are applied after the last sample.
    pub fn process_block(&mut self, events: &[MidiEvent], output: &mut [f32], num_samples: usize) {
        let n = num_samples.min(output.len());
        let out = &mut output[..n];
        out.fill(0.0);

        let mut events = events.iter().peekable();
        for (i, sample) in out.iter_mut().enumerate() {
            while let Some(event) = events.next_if(|e| e.offset as usize <= i) {
                self.handle_event(event);
            }
            let mut sum = 0.0;
            for voice in &mut self.voices {
                sum += voice.next_sample();
            }
            *sample = sum * self.settings.master_gain;
        }
        for event in events {
            self.handle_event(event);
        }
    }

    /// Stereo form of [`SynthModule::process_block`]; the voices are mono, so
    /// both channels carry the same signal.
    pub fn process_stereo_block(
        &mut self,
        events: &[MidiEvent],
        left: &mut [f32],
        right: &mut [f32],
        num_samples: usize,
    ) {
        let n = num_samples.min(left.len()).min(right.len());
        self.process_block(events, &mut left[..n], n);
        right[..n].copy_from_slice(&left[..n]);
    }

    // --- Settings (broadcast to every voice) ---

    fn apply_settings(&mut self, settings: &SynthSettings) {
        for i in 0..2 {
            self.set_oscillator_waveform(i, settings.waveforms[i]);
            self.set_oscillator_detune(i, settings.detune_cents[i]);
            self.set_oscillator_level(i, settings.levels[i]);
        }
        self.set_filter_mode(settings.filter_mode);
        self.set_filter_cutoff(settings.filter_cutoff);
        self.set_filter_resonance(settings.filter_resonance);
        self.set_filter_env_amount(settings.filter_env_amount);
        self.set_envelope_parameters(settings.amp_envelope);
        self.set_filter_envelope_parameters(settings.filter_envelope);
        self.set_master_gain(settings.master_gain);
    }

    pub fn set_oscillator_waveform(&mut self, index: usize, waveform: Waveform) {
        if index >= 2 {
            return;
        }
        self.settings.waveforms[index] = waveform;
        for voice in &mut self.voices {
            voice.set_oscillator_waveform(index, waveform);
        }
    }

    pub fn set_oscillator_detune(&mut self, index: usize, cents: f32) {
        if index >= 2 {
            return;
        }
        for voice in &mut self.voices {
            voice.set_oscillator_detune(index, cents);
        }
        self.settings.detune_cents[index] = clamp_or_zero(cents, -1200.0, 1200.0);
    }

    pub fn set_oscillator_level(&mut self, index: usize, level: f32) {
        if index >= 2 {
            return;
        }
        for voice in &mut self.voices {
            voice.set_oscillator_level(index, level);
        }
        self.settings.levels[index] = clamp_or_zero(level, 0.0, 1.0);
    }

    pub fn set_filter_cutoff(&mut self, hz: f32) {
        for voice in &mut self.voices {
            voice.set_filter_cutoff(hz);
        }
        self.settings.filter_cutoff = match self.voices.first() {
            Some(voice) => voice.filter().cutoff(),
            None if hz.is_finite() => hz,
            None => self.settings.filter_cutoff,
        };
    }

    pub fn set_filter_resonance(&mut self, resonance: f32) {
        for voice in &mut self.voices {
            voice.set_filter_resonance(resonance);
        }
        self.settings.filter_resonance = clamp_or_zero(resonance, 0.0, 1.0);
    }

    pub fn set_filter_mode(&mut self, mode: FilterMode) {
        self.settings.filter_mode = mode;
        for voice in &mut self.voices {
            voice.set_filter_mode(mode);
        }
    }

    pub fn set_filter_env_amount(&mut self, octaves: f32) {
        for voice in &mut self.voices {
            voice.set_filter_env_amount(octaves);
        }
        self.settings.filter_env_amount = clamp_or_zero(octaves, -8.0, 8.0);
    }

    /// Amplitude envelope.
    pub fn set_envelope_parameters(&mut self, params: EnvelopeParams) {
        let params = params.sanitized();
        self.settings.amp_envelope = params;
        for voice in &mut self.voices {
            voice.set_amp_envelope(params);
        }
    }

    pub fn set_filter_envelope_parameters(&mut self, params: EnvelopeParams) {
        let params = params.sanitized();
        self.settings.filter_envelope = params;
        for voice in &mut self.voices {
            voice.set_filter_envelope(params);
        }
    }

    pub fn master_gain(&self) -> f32 {
        self.settings.master_gain
    }

    pub fn set_master_gain(&mut self, gain: f32) {
        if gain.is_finite() {
            self.settings.master_gain = gain.clamp(0.0, MAX_MASTER_GAIN);
        }
    }

    /// Apply a parameter-queue value in the parameter's own unit. Returns
    /// false for an unknown index or an unusable value.
    pub fn apply_param(&mut self, index: u32, value: f32) -> bool {
        let Some(param) = SynthParam::from_index(index) else {
            return false;
        };
        if !value.is_finite() {
            return false;
        }
        let choice = value.round().max(0.0) as usize;
        let amp = self.settings.amp_envelope;
        let fenv = self.settings.filter_envelope;
        match param {
            SynthParam::Osc1Waveform | SynthParam::Osc2Waveform => {
                let Some(waveform) = Waveform::from_index(choice) else {
                    return false;
                };
                let osc = if param == SynthParam::Osc1Waveform { 0 } else { 1 };
                self.set_oscillator_waveform(osc, waveform);
            }
            SynthParam::Osc1Detune => self.set_oscillator_detune(0, value),
            SynthParam::Osc2Detune => self.set_oscillator_detune(1, value),
            SynthParam::Osc1Level => self.set_oscillator_level(0, value),
            SynthParam::Osc2Level => self.set_oscillator_level(1, value),
            SynthParam::FilterMode => {
                let Some(mode) = FilterMode::from_index(choice) else {
                    return false;
                };
                self.set_filter_mode(mode);
            }
            SynthParam::FilterCutoff => self.set_filter_cutoff(value),
            SynthParam::FilterResonance => self.set_filter_resonance(value),
            SynthParam::FilterEnvAmount => self.set_filter_env_amount(value),
            SynthParam::AmpAttack => {
                self.set_envelope_parameters(EnvelopeParams { attack_ms: value, ..amp })
            }
            SynthParam::AmpDecay => {
                self.set_envelope_parameters(EnvelopeParams { decay_ms: value, ..amp })
            }
            SynthParam::AmpSustain => {
                self.set_envelope_parameters(EnvelopeParams { sustain_level: value, ..amp })
            }
            SynthParam::AmpRelease => {
                self.set_envelope_parameters(EnvelopeParams { release_ms: value, ..amp })
            }
            SynthParam::FilterAttack => {
                self.set_filter_envelope_parameters(EnvelopeParams { attack_ms: value, ..fenv })
            }
            SynthParam::FilterDecay => {
                self.set_filter_envelope_parameters(EnvelopeParams { decay_ms: value, ..fenv })
            }
            SynthParam::FilterSustain => {
                self.set_filter_envelope_parameters(EnvelopeParams { sustain_level: value, ..fenv })
            }
            SynthParam::FilterRelease => {
                self.set_filter_envelope_parameters(EnvelopeParams { release_ms: value, ..fenv })
            }
            SynthParam::MasterGain => self.set_master_gain(value),
        }
        true
    }

    /// Apply a normalized 0..1 automation value.
    pub fn apply_normalized(&mut self, param: SynthParam, normalized: f32) -> bool {
        self.apply_param(param.index(), param.denormalize(normalized))
    }
}

fn clamp_or_zero(value: f32, min: f32, max: f32) -> f32 {
    if value.is_finite() {
        value.clamp(min, max)
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SR: f32 = 48_000.0;

    fn synth(voices: usize) -> SynthModule {
        let mut synth = SynthModule::new(SR, voices);
        synth.set_envelope_parameters(EnvelopeParams::new(1.0, 1.0, 1.0, 5.0));
        synth
    }

    #[test]
    fn pool_never_exceeds_voice_count() {
        let mut s = synth(4);
        for note in 60..65 {
            s.note_on(note, 100);
        }
        assert_eq!(s.active_voice_count(), 4);
        assert_eq!(s.num_voices(), 4);
        assert_eq!(s.dropped_notes(), 0);
    }

    #[test]
    fn disabled_stealing_drops_and_counts() {
        let mut s = synth(2);
        s.set_voice_stealing(false);
        s.note_on(60, 100);
        s.note_on(62, 100);
        s.note_on(64, 100);
        assert_eq!(s.active_voice_count(), 2);
        assert_eq!(s.dropped_notes(), 1);
        assert!(s.voices().iter().all(|v| v.current_note() != 64));
    }

    #[test]
    fn empty_pool_drops_everything() {
        let mut s = SynthModule::new(SR, 0);
        s.note_on(60, 100);
        assert_eq!(s.dropped_notes(), 1);
        let mut out = [1.0f32; 16];
        s.process_block(&[], &mut out, 16);
        assert!(out.iter().all(|&x| x == 0.0));
    }

    #[test]
    fn retrigger_reuses_voice() {
        let mut s = synth(4);
        s.note_on(60, 100);
        s.note_on(60, 80);
        assert_eq!(s.active_voice_count(), 1);
    }

    #[test]
    fn note_off_keeps_voice_through_release() {
        let mut s = synth(2);
        let mut out = vec![0.0f32; 512];
        s.process_block(&[MidiEvent::note_on(0, 60, 100)], &mut out, 512);
        s.process_block(&[MidiEvent::note_off(0, 60)], &mut out, 1);
        assert_eq!(s.active_voice_count(), 1);
        // 5 ms release
        s.process_block(&[], &mut out, 512);
        assert_eq!(s.active_voice_count(), 0);
    }

    #[test]
    fn events_apply_at_their_offsets() {
        let mut s = synth(1);
        let mut out = vec![0.0f32; 256];
        s.process_block(&[MidiEvent::note_on(100, 69, 127)], &mut out, 256);
        assert!(out[..100].iter().all(|&x| x == 0.0));
        assert!(out[101..].iter().any(|&x| x != 0.0));
    }

    #[test]
    fn process_clears_output_first() {
        let mut s = synth(1);
        let mut out = vec![9.0f32; 64];
        s.process_block(&[], &mut out, 64);
        assert!(out.iter().all(|&x| x == 0.0));
    }

    #[test]
    fn stereo_channels_match() {
        let mut s = synth(2);
        let mut left = vec![0.0f32; 128];
        let mut right = vec![0.0f32; 128];
        s.process_stereo_block(&[MidiEvent::note_on(0, 57, 100)], &mut left, &mut right, 128);
        assert_eq!(left, right);
        assert!(left.iter().any(|&x| x != 0.0));
    }

    #[test]
    fn all_notes_off_and_reset() {
        let mut s = synth(4);
        s.note_on(60, 100);
        s.note_on(64, 100);
        s.all_notes_off();
        assert!(s.voices().iter().filter(|v| v.is_active()).all(|v| v.is_releasing()));
        s.reset();
        assert_eq!(s.active_voice_count(), 0);
    }

    #[test]
    fn zero_velocity_is_note_off() {
        let mut s = synth(2);
        s.note_on(60, 100);
        s.note_on(60, 0);
        assert!(s.voices()[0].is_releasing());
    }

    #[test]
    fn apply_param_routes_by_index() {
        let mut s = synth(2);
        assert!(s.apply_param(SynthParam::FilterCutoff.index(), 2_500.0));
        assert_eq!(s.settings().filter_cutoff, 2_500.0);
        assert!(s.voices().iter().all(|v| v.filter().cutoff() == 2_500.0));

        assert!(s.apply_param(SynthParam::Osc2Waveform.index(), 3.0));
        assert_eq!(s.settings().waveforms[1], Waveform::Triangle);

        assert!(s.apply_param(SynthParam::AmpRelease.index(), 750.0));
        assert_eq!(s.settings().amp_envelope.release_ms, 750.0);
        assert_eq!(s.settings().amp_envelope.attack_ms, 1.0);

        assert!(!s.apply_param(99, 1.0));
        assert!(!s.apply_param(SynthParam::FilterMode.index(), 7.0));
        assert!(!s.apply_param(SynthParam::MasterGain.index(), f32::INFINITY));
    }

    #[test]
    fn apply_normalized_maps_range() {
        let mut s = synth(1);
        assert!(s.apply_normalized(SynthParam::MasterGain, 0.5));
        assert_eq!(s.master_gain(), 1.0);
    }
}
