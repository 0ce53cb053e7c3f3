//! One polyphonic voice: two oscillators into a filter, shaped by an
//! amplitude envelope and a filter envelope.

use crate::dsp::{midi_to_freq, Envelope, EnvelopeParams, Filter, FilterMode, Oscillator, Waveform};

pub const OSCILLATORS_PER_VOICE: usize = 2;

#[derive(Debug, Clone)]
pub struct SynthVoice {
    active: bool,
    current_note: u8,
    velocity: f32,
    /// Note-on serial number; lower is older.
    serial: u64,
    oscillators: [Oscillator; OSCILLATORS_PER_VOICE],
    amp_envelope: Envelope,
    filter_envelope: Envelope,
    filter: Filter,
    /// Filter envelope depth in octaves.
    filter_env_amount: f32,
}

impl SynthVoice {
    pub fn new(sample_rate: f32) -> Self {
        let mut voice = Self {
            active: false,
            current_note: 0,
            velocity: 0.0,
            serial: 0,
            oscillators: [Oscillator::new(sample_rate), Oscillator::new(sample_rate)],
            amp_envelope: Envelope::new(sample_rate),
            filter_envelope: Envelope::new(sample_rate),
            filter: Filter::new(sample_rate),
            filter_env_amount: 0.0,
        };
        voice.oscillators[1].set_level(0.0);
        voice
    }

    pub fn set_sample_rate(&mut self, sample_rate: f32) {
        for osc in &mut self.oscillators {
            osc.set_sample_rate(sample_rate);
        }
        self.amp_envelope.set_sample_rate(sample_rate);
        self.filter_envelope.set_sample_rate(sample_rate);
        self.filter.set_sample_rate(sample_rate);
    }

    // --- State ---

    /// Sounding, including the release tail.
    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn is_releasing(&self) -> bool {
        self.active && self.amp_envelope.stage() == crate::dsp::EnvelopeStage::Release
    }

    pub fn current_note(&self) -> u8 {
        self.current_note
    }

    pub fn velocity(&self) -> f32 {
        self.velocity
    }

    pub fn serial(&self) -> u64 {
        self.serial
    }

    pub fn amp_envelope(&self) -> &Envelope {
        &self.amp_envelope
    }

    pub fn filter_envelope(&self) -> &Envelope {
        &self.filter_envelope
    }

    // --- Events ---

    pub fn note_on(&mut self, note: u8, velocity: u8, serial: u64) {
        if !self.active {
            for osc in &mut self.oscillators {
                osc.reset();
            }
            self.filter.reset();
        }
        let freq = midi_to_freq(note.min(127));
        for osc in &mut self.oscillators {
            osc.set_frequency(freq);
        }
        self.active = true;
        self.current_note = note;
        self.velocity = velocity.min(127) as f32 / 127.0;
        self.serial = serial;
        self.amp_envelope.note_on();
        self.filter_envelope.note_on();
    }

    pub fn note_off(&mut self) {
        self.amp_envelope.note_off();
        self.filter_envelope.note_off();
    }

    /// Silence immediately, skipping the release.
    pub fn kill(&mut self) {
        self.active = false;
        self.amp_envelope.reset();
        self.filter_envelope.reset();
        self.filter.reset();
    }

    // --- Settings ---

    pub fn oscillator(&self, index: usize) -> Option<&Oscillator> {
        self.oscillators.get(index)
    }

    pub fn set_oscillator_waveform(&mut self, index: usize, waveform: Waveform) {
        if let Some(osc) = self.oscillators.get_mut(index) {
            osc.set_waveform(waveform);
        }
    }

    pub fn set_oscillator_detune(&mut self, index: usize, cents: f32) {
        if let Some(osc) = self.oscillators.get_mut(index) {
            osc.set_detune(cents);
        }
    }

    pub fn set_oscillator_level(&mut self, index: usize, level: f32) {
        if let Some(osc) = self.oscillators.get_mut(index) {
            osc.set_level(level);
        }
    }

    pub fn filter(&self) -> &Filter {
        &self.filter
    }

    pub fn set_filter_cutoff(&mut self, hz: f32) {
        self.filter.set_cutoff(hz);
    }

    pub fn set_filter_resonance(&mut self, resonance: f32) {
        self.filter.set_resonance(resonance);
    }

    pub fn set_filter_mode(&mut self, mode: FilterMode) {
        self.filter.set_mode(mode);
    }

    pub fn filter_env_amount(&self) -> f32 {
        self.filter_env_amount
    }

    /// Clamped to ±8 octaves.
    pub fn set_filter_env_amount(&mut self, octaves: f32) {
        self.filter_env_amount = if octaves.is_finite() { octaves.clamp(-8.0, 8.0) } else { 0.0 };
    }

    pub fn set_amp_envelope(&mut self, params: EnvelopeParams) {
        self.amp_envelope.set_params(params);
    }

    pub fn set_filter_envelope(&mut self, params: EnvelopeParams) {
        self.filter_envelope.set_params(params);
    }

    // --- Rendering ---

    #[inline]
    pub fn next_sample(&mut self) -> f32 {
        if !self.active {
            return 0.0;
        }
        let mix: f32 = self.oscillators.iter_mut().map(Oscillator::next_sample).sum();

        let filter_env = self.filter_envelope.next_sample();
        let filtered = if self.filter_env_amount == 0.0 {
            self.filter.process(mix)
        } else {
            let cutoff = self.filter.cutoff() * (filter_env * self.filter_env_amount).exp2();
            self.filter.process_modulated(mix, cutoff)
        };

        let amp = self.amp_envelope.next_sample();
        if self.amp_envelope.is_idle() {
            self.active = false;
        }
        filtered * amp * self.velocity
    }
}
