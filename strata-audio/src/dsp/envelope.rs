//! ADSR envelope generator.
//!
//! - Attack: smoothstep from wherever the envelope was to 1.0
//! - Decay: linear from 1.0 to the sustain level
//! - Sustain: holds until note-off
//! - Release: linear from the level at note-off to 0.0
//!
//! Stage lengths are whole samples, at least one each, so every stage
//! lands exactly on its target value.

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EnvelopeStage {
    #[default]
    Idle,
    Attack,
    Decay,
    Sustain,
    Release,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EnvelopeParams {
    pub attack_ms: f32,
    pub decay_ms: f32,
    /// 0.0..=1.0
    pub sustain_level: f32,
    pub release_ms: f32,
}

impl Default for EnvelopeParams {
    fn default() -> Self {
        Self {
            attack_ms: 10.0,
            decay_ms: 100.0,
            sustain_level: 0.7,
            release_ms: 200.0,
        }
    }
}

impl EnvelopeParams {
    pub fn new(attack_ms: f32, decay_ms: f32, sustain_level: f32, release_ms: f32) -> Self {
        Self {
            attack_ms,
            decay_ms,
            sustain_level,
            release_ms,
        }
        .sanitized()
    }

    pub fn sanitized(self) -> Self {
        let ms = |v: f32| if v.is_finite() { v.max(0.0) } else { 0.0 };
        Self {
            attack_ms: ms(self.attack_ms),
            decay_ms: ms(self.decay_ms),
            sustain_level: if self.sustain_level.is_finite() {
                self.sustain_level.clamp(0.0, 1.0)
            } else {
                0.0
            },
            release_ms: ms(self.release_ms),
        }
    }
}

fn stage_samples(ms: f32, sample_rate: f32) -> u32 {
    ((ms * sample_rate / 1000.0).round() as u32).max(1)
}

#[derive(Debug, Clone)]
pub struct Envelope {
    params: EnvelopeParams,
    sample_rate: f32,
    stage: EnvelopeStage,
    value: f32,
    attack_start_value: f32,
    release_start_value: f32,
    stage_pos: u32,
    attack_samples: u32,
    decay_samples: u32,
    release_samples: u32,
}

impl Envelope {
    pub fn new(sample_rate: f32) -> Self {
        let mut env = Self {
            params: EnvelopeParams::default(),
            sample_rate: sample_rate.max(1.0),
            stage: EnvelopeStage::Idle,
            value: 0.0,
            attack_start_value: 0.0,
            release_start_value: 0.0,
            stage_pos: 0,
            attack_samples: 1,
            decay_samples: 1,
            release_samples: 1,
        };
        env.update_stage_lengths();
        env
    }

    pub fn set_sample_rate(&mut self, sample_rate: f32) {
        self.sample_rate = sample_rate.max(1.0);
        self.update_stage_lengths();
    }

    pub fn params(&self) -> EnvelopeParams {
        self.params
    }

    /// Takes effect immediately, including mid-stage.
    pub fn set_params(&mut self, params: EnvelopeParams) {
        self.params = params.sanitized();
        self.update_stage_lengths();
    }

    fn update_stage_lengths(&mut self) {
        self.attack_samples = stage_samples(self.params.attack_ms, self.sample_rate);
        self.decay_samples = stage_samples(self.params.decay_ms, self.sample_rate);
        self.release_samples = stage_samples(self.params.release_ms, self.sample_rate);
    }

    pub fn stage(&self) -> EnvelopeStage {
        self.stage
    }

    pub fn value(&self) -> f32 {
        self.value
    }

    pub fn is_idle(&self) -> bool {
        self.stage == EnvelopeStage::Idle
    }

    /// Start the attack from the current value, so a retrigger never clicks.
    pub fn note_on(&mut self) {
        self.attack_start_value = self.value;
        self.stage = EnvelopeStage::Attack;
        self.stage_pos = 0;
    }

    pub fn note_off(&mut self) {
        if self.stage == EnvelopeStage::Idle {
            return;
        }
        self.release_start_value = self.value;
        self.stage = EnvelopeStage::Release;
        self.stage_pos = 0;
    }

    /// Drop straight to idle at zero.
    pub fn reset(&mut self) {
        self.stage = EnvelopeStage::Idle;
        self.value = 0.0;
        self.stage_pos = 0;
    }

    #[inline]
    pub fn next_sample(&mut self) -> f32 {
        match self.stage {
            EnvelopeStage::Idle => {
                self.value = 0.0;
            }
            EnvelopeStage::Attack => {
                self.stage_pos += 1;
                if self.stage_pos >= self.attack_samples {
                    self.value = 1.0;
                    self.enter(EnvelopeStage::Decay);
                } else {
                    let t = self.stage_pos as f32 / self.attack_samples as f32;
                    let shaped = t * t * (3.0 - 2.0 * t);
                    self.value = self.attack_start_value + (1.0 - self.attack_start_value) * shaped;
                }
            }
            EnvelopeStage::Decay => {
                self.stage_pos += 1;
                let sustain = self.params.sustain_level;
                if self.stage_pos >= self.decay_samples {
                    self.value = sustain;
                    self.enter(EnvelopeStage::Sustain);
                } else {
                    let t = self.stage_pos as f32 / self.decay_samples as f32;
                    self.value = 1.0 + (sustain - 1.0) * t;
                }
            }
            EnvelopeStage::Sustain => {
                self.value = self.params.sustain_level;
            }
            EnvelopeStage::Release => {
                self.stage_pos += 1;
                if self.stage_pos >= self.release_samples {
                    self.value = 0.0;
                    self.enter(EnvelopeStage::Idle);
                } else {
                    let t = self.stage_pos as f32 / self.release_samples as f32;
                    self.value = self.release_start_value * (1.0 - t);
                }
            }
        }
        self.value
    }

    fn enter(&mut self, stage: EnvelopeStage) {
        self.stage = stage;
        self.stage_pos = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn envelope(attack: f32, decay: f32, sustain: f32, release: f32) -> Envelope {
        let mut env = Envelope::new(1_000.0);
        env.set_params(EnvelopeParams::new(attack, decay, sustain, release));
        env
    }

    #[test]
    fn idle_outputs_zero() {
        let mut env = Envelope::new(48_000.0);
        assert_eq!(env.next_sample(), 0.0);
        env.note_off();
        assert!(env.is_idle());
    }

    #[test]
    fn attack_is_monotonic_and_ends_at_one() {
        // 1 kHz: 20 ms is 20 samples.
        let mut env = envelope(20.0, 50.0, 0.5, 30.0);
        env.note_on();
        let mut last = env.value();
        for _ in 0..20 {
            let v = env.next_sample();
            assert!(v >= last, "attack went down: {} -> {}", last, v);
            last = v;
        }
        assert_eq!(last, 1.0);
        assert_eq!(env.stage(), EnvelopeStage::Decay);
    }

    #[test]
    fn decay_reaches_sustain_and_holds() {
        let mut env = envelope(1.0, 10.0, 0.4, 10.0);
        env.note_on();
        for _ in 0..11 {
            env.next_sample();
        }
        assert_eq!(env.stage(), EnvelopeStage::Sustain);
        assert_eq!(env.value(), 0.4);
        assert_eq!(env.next_sample(), 0.4);
    }

    #[test]
    fn release_is_monotonic_and_ends_at_zero() {
        let mut env = envelope(5.0, 5.0, 0.8, 25.0);
        env.note_on();
        for _ in 0..20 {
            env.next_sample();
        }
        env.note_off();
        let mut last = env.value();
        assert!(last > 0.0);
        for _ in 0..25 {
            let v = env.next_sample();
            assert!(v <= last, "release went up: {} -> {}", last, v);
            last = v;
        }
        assert_eq!(last, 0.0);
        assert!(env.is_idle());
    }

    #[test]
    fn retrigger_starts_from_current_value() {
        let mut env = envelope(10.0, 10.0, 0.5, 100.0);
        env.note_on();
        for _ in 0..30 {
            env.next_sample();
        }
        env.note_off();
        for _ in 0..10 {
            env.next_sample();
        }
        let before = env.value();
        env.note_on();
        assert_eq!(env.stage(), EnvelopeStage::Attack);
        let first = env.next_sample();
        assert!(first >= before);
        assert!(first < 1.0);
    }

    #[test]
    fn zero_length_stages_take_one_sample() {
        let mut env = envelope(0.0, 0.0, 0.3, 0.0);
        env.note_on();
        assert_eq!(env.next_sample(), 1.0);
        assert_eq!(env.next_sample(), 0.3);
        env.note_off();
        assert_eq!(env.next_sample(), 0.0);
        assert!(env.is_idle());
    }

    #[test]
    fn params_are_sanitized() {
        let p = EnvelopeParams::new(-5.0, f32::NAN, 2.0, 10.0);
        assert_eq!(p.attack_ms, 0.0);
        assert_eq!(p.decay_ms, 0.0);
        assert_eq!(p.sustain_level, 1.0);
    }
}
