//! Topology-preserving-transform state-variable filter.
//!
//! One structure gives all four responses; the integrator states are kept
//! across cutoff changes, so the voice can sweep the cutoff every sample
//! without zipper noise or blow-ups. The band-pass output is normalized to
//! unity gain at the cutoff.

use std::f32::consts::PI;

pub const MIN_CUTOFF: f32 = 10.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FilterMode {
    #[default]
    LowPass,
    HighPass,
    BandPass,
    Notch,
}

impl FilterMode {
    pub const ALL: [FilterMode; 4] = [
        FilterMode::LowPass,
        FilterMode::HighPass,
        FilterMode::BandPass,
        FilterMode::Notch,
    ];

    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    pub fn index(self) -> usize {
        self as usize
    }
}

#[derive(Debug, Clone)]
pub struct Filter {
    mode: FilterMode,
    sample_rate: f32,
    cutoff: f32,
    resonance: f32,
    // Coefficients for `coeff_cutoff`
    coeff_cutoff: f32,
    k: f32,
    a1: f32,
    a2: f32,
    a3: f32,
    // Integrator states
    ic1eq: f32,
    ic2eq: f32,
}

impl Filter {
    pub fn new(sample_rate: f32) -> Self {
        let mut filter = Self {
            mode: FilterMode::LowPass,
            sample_rate: sample_rate.max(1.0),
            cutoff: 1_000.0,
            resonance: 0.0,
            coeff_cutoff: 0.0,
            k: 2.0,
            a1: 0.0,
            a2: 0.0,
            a3: 0.0,
            ic1eq: 0.0,
            ic2eq: 0.0,
        };
        filter.update_coefficients(filter.cutoff);
        filter
    }

    pub fn set_sample_rate(&mut self, sample_rate: f32) {
        self.sample_rate = sample_rate.max(1.0);
        self.cutoff = self.clamp_cutoff(self.cutoff);
        self.update_coefficients(self.cutoff);
    }

    pub fn mode(&self) -> FilterMode {
        self.mode
    }

    pub fn set_mode(&mut self, mode: FilterMode) {
        self.mode = mode;
    }

    pub fn cutoff(&self) -> f32 {
        self.cutoff
    }

    /// Clamped into (10 Hz, 0.49 × sample rate).
    pub fn set_cutoff(&mut self, hz: f32) {
        self.cutoff = self.clamp_cutoff(hz);
        self.update_coefficients(self.cutoff);
    }

    pub fn resonance(&self) -> f32 {
        self.resonance
    }

    /// 0.0 is a flat (Q = 0.5) response, 1.0 is close to self-oscillation.
    pub fn set_resonance(&mut self, resonance: f32) {
        self.resonance = if resonance.is_finite() { resonance.clamp(0.0, 1.0) } else { 0.0 };
        self.k = 2.0 - 1.96 * self.resonance;
        self.update_coefficients(self.coeff_cutoff);
    }

    pub fn reset(&mut self) {
        self.ic1eq = 0.0;
        self.ic2eq = 0.0;
    }

    fn clamp_cutoff(&self, hz: f32) -> f32 {
        let hz = if hz.is_finite() { hz } else { MIN_CUTOFF };
        hz.clamp(MIN_CUTOFF, self.sample_rate * 0.49)
    }

    fn update_coefficients(&mut self, cutoff: f32) {
        let g = (PI * cutoff / self.sample_rate).tan();
        self.coeff_cutoff = cutoff;
        self.a1 = 1.0 / (1.0 + g * (g + self.k));
        self.a2 = g * self.a1;
        self.a3 = g * self.a2;
    }

    /// Filter one sample at the configured cutoff.
    #[inline]
    pub fn process(&mut self, input: f32) -> f32 {
        if self.coeff_cutoff != self.cutoff {
            self.update_coefficients(self.cutoff);
        }
        self.tick(input)
    }

    /// Filter one sample at a modulated cutoff. The configured cutoff is left
    /// alone; coefficients are only recomputed when the cutoff moves.
    #[inline]
    pub fn process_modulated(&mut self, input: f32, cutoff: f32) -> f32 {
        let cutoff = self.clamp_cutoff(cutoff);
        if cutoff != self.coeff_cutoff {
            self.update_coefficients(cutoff);
        }
        self.tick(input)
    }

    #[inline]
    fn tick(&mut self, v0: f32) -> f32 {
        let v3 = v0 - self.ic2eq;
        let v1 = self.a1 * self.ic1eq + self.a2 * v3;
        let v2 = self.ic2eq + self.a2 * self.ic1eq + self.a3 * v3;
        self.ic1eq = 2.0 * v1 - self.ic1eq;
        self.ic2eq = 2.0 * v2 - self.ic2eq;

        match self.mode {
            FilterMode::LowPass => v2,
            FilterMode::BandPass => self.k * v1,
            FilterMode::HighPass => v0 - self.k * v1 - v2,
            FilterMode::Notch => v0 - self.k * v1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dsp::oscillator::{Oscillator, Waveform};

    const SR: f32 = 48_000.0;

    /// Peak output amplitude for a sine at `hz` after the filter settles.
    fn response(mode: FilterMode, cutoff: f32, hz: f32) -> f32 {
        let mut filter = Filter::new(SR);
        filter.set_mode(mode);
        filter.set_cutoff(cutoff);
        let mut osc = Oscillator::new(SR);
        osc.set_waveform(Waveform::Sine);
        osc.set_frequency(hz);
        let mut peak = 0.0f32;
        for i in 0..48_000 {
            let y = filter.process(osc.next_sample());
            if i > 24_000 {
                peak = peak.max(y.abs());
            }
        }
        peak
    }

    #[test]
    fn lowpass_passes_lows_and_cuts_highs() {
        assert!(response(FilterMode::LowPass, 1_000.0, 100.0) > 0.9);
        assert!(response(FilterMode::LowPass, 1_000.0, 10_000.0) < 0.05);
    }

    #[test]
    fn highpass_cuts_lows() {
        assert!(response(FilterMode::HighPass, 1_000.0, 50.0) < 0.05);
        assert!(response(FilterMode::HighPass, 1_000.0, 10_000.0) > 0.9);
    }

    #[test]
    fn notch_removes_center_frequency() {
        assert!(response(FilterMode::Notch, 2_000.0, 2_000.0) < 0.05);
        assert!(response(FilterMode::BandPass, 2_000.0, 2_000.0) > 0.9);
    }

    #[test]
    fn cutoff_is_clamped() {
        let mut filter = Filter::new(SR);
        filter.set_cutoff(1.0);
        assert_eq!(filter.cutoff(), MIN_CUTOFF);
        filter.set_cutoff(1e9);
        assert_eq!(filter.cutoff(), SR * 0.49);
        filter.set_cutoff(f32::NAN);
        assert_eq!(filter.cutoff(), MIN_CUTOFF);
    }

    #[test]
    fn high_resonance_stays_stable() {
        let mut filter = Filter::new(SR);
        filter.set_resonance(1.0);
        let mut osc = Oscillator::new(SR);
        osc.set_frequency(220.0);
        for i in 0..48_000 {
            let cutoff = 200.0 + (i % 480) as f32 * 30.0;
            let y = filter.process_modulated(osc.next_sample(), cutoff);
            assert!(y.is_finite() && y.abs() < 1_000.0);
        }
    }
}
