//! Phase-accumulator oscillator with PolyBLEP correction on the
//! discontinuous waveforms.

use std::f32::consts::TAU;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Waveform {
    Sine,
    #[default]
    Saw,
    Square,
    Triangle,
    Noise,
}

impl Waveform {
    pub const ALL: [Waveform; 5] = [
        Waveform::Sine,
        Waveform::Saw,
        Waveform::Square,
        Waveform::Triangle,
        Waveform::Noise,
    ];

    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn name(self) -> &'static str {
        match self {
            Waveform::Sine => "sine",
            Waveform::Saw => "saw",
            Waveform::Square => "square",
            Waveform::Triangle => "triangle",
            Waveform::Noise => "noise",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|w| w.name() == name)
    }
}

/// Residual that smooths a unit step at phase 0 over one sample.
fn poly_blep(phase: f32, dt: f32) -> f32 {
    if phase < dt {
        let t = phase / dt;
        2.0 * t - t * t - 1.0
    } else if phase > 1.0 - dt {
        let t = (phase - 1.0) / dt;
        t * t + 2.0 * t + 1.0
    } else {
        0.0
    }
}

#[derive(Debug, Clone)]
pub struct Oscillator {
    waveform: Waveform,
    sample_rate: f32,
    frequency: f32,
    detune_cents: f32,
    level: f32,
    phase: f32,
    phase_inc: f32,
    noise_state: u32,
}

impl Oscillator {
    pub fn new(sample_rate: f32) -> Self {
        let mut osc = Self {
            waveform: Waveform::default(),
            sample_rate: sample_rate.max(1.0),
            frequency: 440.0,
            detune_cents: 0.0,
            level: 1.0,
            phase: 0.0,
            phase_inc: 0.0,
            noise_state: 0x1234_5678,
        };
        osc.update_increment();
        osc
    }

    pub fn set_sample_rate(&mut self, sample_rate: f32) {
        self.sample_rate = sample_rate.max(1.0);
        self.update_increment();
    }

    pub fn waveform(&self) -> Waveform {
        self.waveform
    }

    pub fn set_waveform(&mut self, waveform: Waveform) {
        self.waveform = waveform;
    }

    pub fn frequency(&self) -> f32 {
        self.frequency
    }

    pub fn set_frequency(&mut self, hz: f32) {
        self.frequency = if hz.is_finite() { hz.max(0.0) } else { 0.0 };
        self.update_increment();
    }

    pub fn detune_cents(&self) -> f32 {
        self.detune_cents
    }

    /// Clamped to ±1200 cents.
    pub fn set_detune(&mut self, cents: f32) {
        self.detune_cents = if cents.is_finite() { cents.clamp(-1200.0, 1200.0) } else { 0.0 };
        self.update_increment();
    }

    pub fn level(&self) -> f32 {
        self.level
    }

    pub fn set_level(&mut self, level: f32) {
        self.level = if level.is_finite() { level.clamp(0.0, 1.0) } else { 0.0 };
    }

    pub fn reset(&mut self) {
        self.phase = 0.0;
    }

    fn update_increment(&mut self) {
        let hz = self.frequency * 2f32.powf(self.detune_cents / 1200.0);
        // Stay below Nyquist so the PolyBLEP window never exceeds half a cycle.
        self.phase_inc = (hz / self.sample_rate).min(0.5);
    }

    fn next_noise(&mut self) -> f32 {
        self.noise_state = self
            .noise_state
            .wrapping_mul(1_664_525)
            .wrapping_add(1_013_904_223);
        (self.noise_state >> 8) as f32 / (1u32 << 23) as f32 - 1.0
    }

    /// Next sample scaled by the oscillator level.
    #[inline]
    pub fn next_sample(&mut self) -> f32 {
        let phase = self.phase;
        let dt = self.phase_inc;
        let raw = match self.waveform {
            Waveform::Sine => (phase * TAU).sin(),
            Waveform::Saw => 2.0 * phase - 1.0 - poly_blep(phase, dt),
            Waveform::Square => {
                let naive = if phase < 0.5 { 1.0 } else { -1.0 };
                naive + poly_blep(phase, dt) - poly_blep((phase + 0.5) % 1.0, dt)
            }
            Waveform::Triangle => 1.0 - 4.0 * (phase - 0.5).abs(),
            Waveform::Noise => self.next_noise(),
        };

        self.phase += dt;
        if self.phase >= 1.0 {
            self.phase -= 1.0;
        }
        raw * self.level
    }
}
