//! Addressable synth parameters.
//!
//! Parameter-queue updates for [`NodeId::SYNTH`](strata_types::NodeId::SYNTH)
//! carry a [`SynthParam`] index and a plain value in the parameter's own
//! unit (Hz, cents, milliseconds...). Timeline automation carries a
//! normalized 0..1 value instead, mapped through [`SynthParam::denormalize`].

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SynthParam {
    Osc1Waveform,
    Osc1Detune,
    Osc1Level,
    Osc2Waveform,
    Osc2Detune,
    Osc2Level,
    FilterMode,
    FilterCutoff,
    FilterResonance,
    FilterEnvAmount,
    AmpAttack,
    AmpDecay,
    AmpSustain,
    AmpRelease,
    FilterAttack,
    FilterDecay,
    FilterSustain,
    FilterRelease,
    MasterGain,
}

/// How a normalized value maps onto a parameter's range.
#[derive(Debug, Clone, Copy, PartialEq)]
enum Scale {
    Linear(f32, f32),
    /// Equal ratios per step; both bounds positive.
    Exponential(f32, f32),
    /// Index into a list of `n` choices.
    Choice(usize),
}

impl SynthParam {
    pub const ALL: [SynthParam; 19] = [
        SynthParam::Osc1Waveform,
        SynthParam::Osc1Detune,
        SynthParam::Osc1Level,
        SynthParam::Osc2Waveform,
        SynthParam::Osc2Detune,
        SynthParam::Osc2Level,
        SynthParam::FilterMode,
        SynthParam::FilterCutoff,
        SynthParam::FilterResonance,
        SynthParam::FilterEnvAmount,
        SynthParam::AmpAttack,
        SynthParam::AmpDecay,
        SynthParam::AmpSustain,
        SynthParam::AmpRelease,
        SynthParam::FilterAttack,
        SynthParam::FilterDecay,
        SynthParam::FilterSustain,
        SynthParam::FilterRelease,
        SynthParam::MasterGain,
    ];

    pub fn from_index(index: u32) -> Option<Self> {
        Self::ALL.get(index as usize).copied()
    }

    pub fn index(self) -> u32 {
        self as u32
    }

    /// Identifier used for automation lanes and config files.
    pub fn name(self) -> &'static str {
        match self {
            SynthParam::Osc1Waveform => "osc1_waveform",
            SynthParam::Osc1Detune => "osc1_detune",
            SynthParam::Osc1Level => "osc1_level",
            SynthParam::Osc2Waveform => "osc2_waveform",
            SynthParam::Osc2Detune => "osc2_detune",
            SynthParam::Osc2Level => "osc2_level",
            SynthParam::FilterMode => "filter_mode",
            SynthParam::FilterCutoff => "filter_cutoff",
            SynthParam::FilterResonance => "filter_resonance",
            SynthParam::FilterEnvAmount => "filter_env_amount",
            SynthParam::AmpAttack => "amp_attack",
            SynthParam::AmpDecay => "amp_decay",
            SynthParam::AmpSustain => "amp_sustain",
            SynthParam::AmpRelease => "amp_release",
            SynthParam::FilterAttack => "filter_attack",
            SynthParam::FilterDecay => "filter_decay",
            SynthParam::FilterSustain => "filter_sustain",
            SynthParam::FilterRelease => "filter_release",
            SynthParam::MasterGain => "master_gain",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|p| p.name() == name)
    }

    fn scale(self) -> Scale {
        match self {
            SynthParam::Osc1Waveform | SynthParam::Osc2Waveform => Scale::Choice(5),
            SynthParam::FilterMode => Scale::Choice(4),
            SynthParam::Osc1Detune | SynthParam::Osc2Detune => Scale::Linear(-1200.0, 1200.0),
            SynthParam::Osc1Level
            | SynthParam::Osc2Level
            | SynthParam::FilterResonance
            | SynthParam::AmpSustain
            | SynthParam::FilterSustain => Scale::Linear(0.0, 1.0),
            SynthParam::FilterCutoff => Scale::Exponential(20.0, 20_000.0),
            SynthParam::FilterEnvAmount => Scale::Linear(-8.0, 8.0),
            SynthParam::AmpAttack
            | SynthParam::AmpDecay
            | SynthParam::AmpRelease
            | SynthParam::FilterAttack
            | SynthParam::FilterDecay
            | SynthParam::FilterRelease => Scale::Exponential(1.0, 10_000.0),
            SynthParam::MasterGain => Scale::Linear(0.0, 2.0),
        }
    }

    /// Map a normalized 0..1 value onto the parameter's range.
    pub fn denormalize(self, normalized: f32) -> f32 {
        let t = if normalized.is_finite() { normalized.clamp(0.0, 1.0) } else { 0.0 };
        match self.scale() {
            Scale::Linear(min, max) => min + (max - min) * t,
            Scale::Exponential(min, max) => min * (max / min).powf(t),
            Scale::Choice(n) => ((t * n as f32) as usize).min(n - 1) as f32,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn index_roundtrip() {
        for (i, param) in SynthParam::ALL.iter().enumerate() {
            assert_eq!(param.index(), i as u32);
            assert_eq!(SynthParam::from_index(i as u32), Some(*param));
            assert_eq!(SynthParam::from_name(param.name()), Some(*param));
        }
        assert_eq!(SynthParam::from_index(SynthParam::ALL.len() as u32), None);
    }

    #[test]
    fn denormalize_ranges() {
        assert_eq!(SynthParam::Osc1Detune.denormalize(0.5), 0.0);
        assert!((SynthParam::FilterCutoff.denormalize(0.0) - 20.0).abs() < 1e-3);
        assert!((SynthParam::FilterCutoff.denormalize(1.0) - 20_000.0).abs() < 1.0);
        assert_eq!(SynthParam::FilterMode.denormalize(1.0), 3.0);
        assert_eq!(SynthParam::Osc2Waveform.denormalize(0.0), 0.0);
        assert_eq!(SynthParam::MasterGain.denormalize(f32::NAN), 0.0);
    }
}
