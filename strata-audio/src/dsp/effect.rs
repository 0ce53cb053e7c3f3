//! Master effects. A closed set of processors dispatched by `match`; each
//! variant carries its own settings and state.

/// Longest delay time a delay line is sized for.
pub const MAX_DELAY_MS: f32 = 2_000.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EffectKind {
    Distortion,
    Delay,
    Gain,
}

impl EffectKind {
    pub const ALL: [EffectKind; 3] = [EffectKind::Distortion, EffectKind::Delay, EffectKind::Gain];

    pub fn name(self) -> &'static str {
        match self {
            EffectKind::Distortion => "distortion",
            EffectKind::Delay => "delay",
            EffectKind::Gain => "gain",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.name() == name)
    }

    /// Parameter names in index order.
    pub fn param_names(self) -> &'static [&'static str] {
        match self {
            EffectKind::Distortion => &["drive", "mix"],
            EffectKind::Delay => &["time_ms", "feedback", "mix"],
            EffectKind::Gain => &["level"],
        }
    }
}

fn finite_clamp(value: f32, min: f32, max: f32) -> Option<f32> {
    value.is_finite().then(|| value.clamp(min, max))
}

/// tanh waveshaper.
#[derive(Debug, Clone, PartialEq)]
pub struct Distortion {
    /// 1.0..=50.0
    pub drive: f32,
    /// 0.0 dry ..= 1.0 wet
    pub mix: f32,
}

impl Default for Distortion {
    fn default() -> Self {
        Self { drive: 4.0, mix: 0.5 }
    }
}

impl Distortion {
    #[inline]
    fn shape(&self, x: f32) -> f32 {
        let wet = (x * self.drive).tanh();
        x + (wet - x) * self.mix
    }
}

/// Stereo feedback delay.
#[derive(Debug, Clone, PartialEq)]
pub struct Delay {
    pub time_ms: f32,
    /// 0.0..=0.95
    pub feedback: f32,
    pub mix: f32,
    sample_rate: f32,
    left: Vec<f32>,
    right: Vec<f32>,
    write_pos: usize,
}

impl Default for Delay {
    fn default() -> Self {
        Self {
            time_ms: 375.0,
            feedback: 0.35,
            mix: 0.3,
            sample_rate: 0.0,
            left: Vec::new(),
            right: Vec::new(),
            write_pos: 0,
        }
    }
}

impl Delay {
    fn prepare(&mut self, sample_rate: f32) {
        let len = (MAX_DELAY_MS / 1000.0 * sample_rate).ceil() as usize + 1;
        self.sample_rate = sample_rate;
        self.left = vec![0.0; len];
        self.right = vec![0.0; len];
        self.write_pos = 0;
    }

    fn reset(&mut self) {
        self.left.fill(0.0);
        self.right.fill(0.0);
        self.write_pos = 0;
    }

    fn process(&mut self, left: &mut [f32], right: &mut [f32]) {
        let len = self.left.len();
        if len < 2 {
            return;
        }
        let delay = ((self.time_ms * self.sample_rate / 1000.0).round() as usize).clamp(1, len - 1);
        for (l, r) in left.iter_mut().zip(right.iter_mut()) {
            let read = (self.write_pos + len - delay) % len;
            let (dl, dr) = (self.left[read], self.right[read]);
            self.left[self.write_pos] = *l + dl * self.feedback;
            self.right[self.write_pos] = *r + dr * self.feedback;
            *l += (dl - *l) * self.mix;
            *r += (dr - *r) * self.mix;
            self.write_pos = (self.write_pos + 1) % len;
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Gain {
    /// Linear, 0.0..=4.0
    pub level: f32,
}

impl Default for Gain {
    fn default() -> Self {
        Self { level: 1.0 }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    Distortion(Distortion),
    Delay(Delay),
    Gain(Gain),
}

impl Effect {
    pub fn new(kind: EffectKind) -> Self {
        match kind {
            EffectKind::Distortion => Effect::Distortion(Distortion::default()),
            EffectKind::Delay => Effect::Delay(Delay::default()),
            EffectKind::Gain => Effect::Gain(Gain::default()),
        }
    }

    pub fn kind(&self) -> EffectKind {
        match self {
            Effect::Distortion(_) => EffectKind::Distortion,
            Effect::Delay(_) => EffectKind::Delay,
            Effect::Gain(_) => EffectKind::Gain,
        }
    }

    /// Size any internal buffers for `sample_rate`. Allocates.
    pub fn prepare(&mut self, sample_rate: f32) {
        if let Effect::Delay(delay) = self {
            delay.prepare(sample_rate);
        }
    }

    /// Clear internal state without touching settings.
    pub fn reset(&mut self) {
        if let Effect::Delay(delay) = self {
            delay.reset();
        }
    }

    pub fn param(&self, index: u32) -> Option<f32> {
        match (self, index) {
            (Effect::Distortion(d), 0) => Some(d.drive),
            (Effect::Distortion(d), 1) => Some(d.mix),
            (Effect::Delay(d), 0) => Some(d.time_ms),
            (Effect::Delay(d), 1) => Some(d.feedback),
            (Effect::Delay(d), 2) => Some(d.mix),
            (Effect::Gain(g), 0) => Some(g.level),
            _ => None,
        }
    }

    /// Set parameter `index` (see [`EffectKind::param_names`]). Returns false
    /// for an unknown index or a non-finite value.
    pub fn set_param(&mut self, index: u32, value: f32) -> bool {
        let (slot, min, max) = match (self, index) {
            (Effect::Distortion(d), 0) => (&mut d.drive, 1.0, 50.0),
            (Effect::Distortion(d), 1) => (&mut d.mix, 0.0, 1.0),
            (Effect::Delay(d), 0) => (&mut d.time_ms, 1.0, MAX_DELAY_MS),
            (Effect::Delay(d), 1) => (&mut d.feedback, 0.0, 0.95),
            (Effect::Delay(d), 2) => (&mut d.mix, 0.0, 1.0),
            (Effect::Gain(g), 0) => (&mut g.level, 0.0, 4.0),
            _ => return false,
        };
        match finite_clamp(value, min, max) {
            Some(v) => {
                *slot = v;
                true
            }
            None => false,
        }
    }

    /// Process a stereo block in place.
    pub fn process(&mut self, left: &mut [f32], right: &mut [f32]) {
        match self {
            Effect::Distortion(d) => {
                for s in left.iter_mut().chain(right.iter_mut()) {
                    *s = d.shape(*s);
                }
            }
            Effect::Delay(d) => d.process(left, right),
            Effect::Gain(g) => {
                for s in left.iter_mut().chain(right.iter_mut()) {
                    *s *= g.level;
                }
            }
        }
    }
}

/// Ordered master effects, addressed by slot.
#[derive(Debug, Clone, Default)]
pub struct EffectChain {
    effects: Vec<Effect>,
}

impl EffectChain {
    pub fn new(kinds: &[EffectKind]) -> Self {
        Self {
            effects: kinds.iter().copied().map(Effect::new).collect(),
        }
    }

    pub fn prepare(&mut self, sample_rate: f32) {
        for effect in &mut self.effects {
            effect.prepare(sample_rate);
        }
    }

    pub fn reset(&mut self) {
        for effect in &mut self.effects {
            effect.reset();
        }
    }

    pub fn len(&self) -> usize {
        self.effects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.effects.is_empty()
    }

    pub fn get(&self, slot: usize) -> Option<&Effect> {
        self.effects.get(slot)
    }

    pub fn set_param(&mut self, slot: usize, index: u32, value: f32) -> bool {
        self.effects
            .get_mut(slot)
            .is_some_and(|effect| effect.set_param(index, value))
    }

    pub fn process(&mut self, left: &mut [f32], right: &mut [f32]) {
        for effect in &mut self.effects {
            effect.process(left, right);
        }
    }
}
