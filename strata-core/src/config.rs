use std::path::PathBuf;

use serde::Deserialize;

use strata_audio::EngineConfig;
use strata_types::{clamp_tempo, TransportState};

const DEFAULT_CONFIG: &str = include_str!("../config.toml");

#[derive(Deserialize, Default)]
struct ConfigFile {
    #[serde(default)]
    audio: AudioConfig,
    #[serde(default)]
    synth: SynthConfig,
    #[serde(default)]
    transport: TransportConfig,
    #[serde(default)]
    queues: QueueConfig,
}

#[derive(Deserialize, Default)]
struct AudioConfig {
    sample_rate: Option<u32>,
    block_size: Option<usize>,
}

#[derive(Deserialize, Default)]
struct SynthConfig {
    voices: Option<usize>,
    voice_stealing: Option<bool>,
    master_gain: Option<f32>,
}

#[derive(Deserialize, Default)]
struct TransportConfig {
    bpm: Option<f64>,
    time_signature: Option<[u32; 2]>,
    loop_beats: Option<f64>,
    quantize_grid: Option<f64>,
}

#[derive(Deserialize, Default)]
struct QueueConfig {
    param_capacity: Option<usize>,
    command_capacity: Option<usize>,
}

pub struct Config {
    audio: AudioConfig,
    synth: SynthConfig,
    transport: TransportConfig,
    queues: QueueConfig,
}

impl Config {
    /// Embedded defaults overlaid with `~/.config/strata/config.toml` when it
    /// exists. A broken user file is logged and skipped.
    pub fn load() -> Self {
        if let Some(path) = user_config_path() {
            if path.exists() {
                match std::fs::read_to_string(&path) {
                    Ok(contents) => match Self::with_overrides(&contents) {
                        Ok(config) => {
                            log::debug!(target: "config", "loaded {}", path.display());
                            return config;
                        }
                        Err(e) => {
                            log::warn!(target: "config", "ignoring malformed config {}: {}", path.display(), e)
                        }
                    },
                    Err(e) => {
                        log::warn!(target: "config", "could not read config {}: {}", path.display(), e)
                    }
                }
            }
        }
        Self::defaults()
    }

    /// The embedded configuration alone.
    pub fn defaults() -> Self {
        let base: ConfigFile =
            toml::from_str(DEFAULT_CONFIG).expect("Failed to parse embedded config.toml");
        Self::from_file(base)
    }

    /// Embedded defaults with every key present in `user` taking precedence.
    pub fn with_overrides(user: &str) -> Result<Self, String> {
        let user: ConfigFile = toml::from_str(user).map_err(|e| e.to_string())?;
        let mut base: ConfigFile =
            toml::from_str(DEFAULT_CONFIG).expect("Failed to parse embedded config.toml");
        merge_audio(&mut base.audio, user.audio);
        merge_synth(&mut base.synth, user.synth);
        merge_transport(&mut base.transport, user.transport);
        merge_queues(&mut base.queues, user.queues);
        Ok(Self::from_file(base))
    }

    fn from_file(file: ConfigFile) -> Self {
        Config {
            audio: file.audio,
            synth: file.synth,
            transport: file.transport,
            queues: file.queues,
        }
    }

    /// Output sample rate in Hz (clamped to 8000..192000).
    pub fn sample_rate(&self) -> u32 {
        self.audio.sample_rate.unwrap_or(44_100).clamp(8_000, 192_000)
    }

    /// Frames per processing block (clamped to 16..8192).
    pub fn block_size(&self) -> usize {
        self.audio.block_size.unwrap_or(512).clamp(16, 8_192)
    }

    pub fn voices(&self) -> usize {
        self.synth.voices.unwrap_or(16).clamp(1, 128)
    }

    pub fn voice_stealing(&self) -> bool {
        self.synth.voice_stealing.unwrap_or(true)
    }

    pub fn master_gain(&self) -> f32 {
        let gain = self.synth.master_gain.unwrap_or(0.5);
        if gain.is_finite() {
            gain.clamp(0.0, 2.0)
        } else {
            0.5
        }
    }

    pub fn bpm(&self) -> f64 {
        clamp_tempo(self.transport.bpm.unwrap_or(120.0))
    }

    pub fn time_signature(&self) -> (u32, u32) {
        self.transport
            .time_signature
            .map(|ts| (ts[0].clamp(1, 32), ts[1].clamp(1, 32)))
            .unwrap_or((4, 4))
    }

    /// Default loop length in beats, starting at beat 0.
    pub fn loop_beats(&self) -> f64 {
        match self.transport.loop_beats {
            Some(beats) if beats.is_finite() && beats > 0.0 => beats,
            _ => 16.0,
        }
    }

    pub fn quantize_grid(&self) -> f64 {
        match self.transport.quantize_grid {
            Some(grid) if grid.is_finite() && grid >= 0.0 => grid,
            _ => 0.25,
        }
    }

    pub fn param_capacity(&self) -> usize {
        self.queues.param_capacity.unwrap_or(1024).clamp(16, 65_536)
    }

    pub fn command_capacity(&self) -> usize {
        self.queues.command_capacity.unwrap_or(256).clamp(16, 65_536)
    }

    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            sample_rate: self.sample_rate() as f64,
            block_size: self.block_size(),
            voices: self.voices(),
            voice_stealing: self.voice_stealing(),
            master_gain: self.master_gain(),
            param_queue_capacity: self.param_capacity(),
            command_queue_capacity: self.command_capacity(),
            ..EngineConfig::default()
        }
    }

    /// Transport settings for a new session.
    pub fn transport(&self) -> TransportState {
        TransportState {
            tempo_bpm: self.bpm(),
            time_signature: self.time_signature(),
            loop_start: 0.0,
            loop_end: self.loop_beats(),
            quantize_grid: self.quantize_grid(),
            ..TransportState::default()
        }
    }
}

fn user_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("strata").join("config.toml"))
}

fn merge_audio(base: &mut AudioConfig, user: AudioConfig) {
    if user.sample_rate.is_some() {
        base.sample_rate = user.sample_rate;
    }
    if user.block_size.is_some() {
        base.block_size = user.block_size;
    }
}

fn merge_synth(base: &mut SynthConfig, user: SynthConfig) {
    if user.voices.is_some() {
        base.voices = user.voices;
    }
    if user.voice_stealing.is_some() {
        base.voice_stealing = user.voice_stealing;
    }
    if user.master_gain.is_some() {
        base.master_gain = user.master_gain;
    }
}

fn merge_transport(base: &mut TransportConfig, user: TransportConfig) {
    if user.bpm.is_some() {
        base.bpm = user.bpm;
    }
    if user.time_signature.is_some() {
        base.time_signature = user.time_signature;
    }
    if user.loop_beats.is_some() {
        base.loop_beats = user.loop_beats;
    }
    if user.quantize_grid.is_some() {
        base.quantize_grid = user.quantize_grid;
    }
}

fn merge_queues(base: &mut QueueConfig, user: QueueConfig) {
    if user.param_capacity.is_some() {
        base.param_capacity = user.param_capacity;
    }
    if user.command_capacity.is_some() {
        base.command_capacity = user.command_capacity;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn embedded_config_parses() {
        let config = Config::defaults();
        assert_eq!(config.sample_rate(), 44_100);
        assert_eq!(config.block_size(), 512);
        assert_eq!(config.voices(), 16);
        assert!(config.voice_stealing());
        assert_eq!(config.bpm(), 120.0);
        assert_eq!(config.time_signature(), (4, 4));
    }

    #[test]
    fn user_keys_override_only_what_they_name() {
        let config = Config::with_overrides("[synth]\nvoices = 8\n").unwrap();
        assert_eq!(config.voices(), 8);
        assert!(config.voice_stealing());
        assert_eq!(config.sample_rate(), 44_100);
    }

    #[test]
    fn malformed_user_config_is_an_error() {
        assert!(Config::with_overrides("[synth\nvoices = ").is_err());
        assert!(Config::with_overrides("[synth]\nvoices = \"many\"\n").is_err());
    }

    #[test]
    fn accessors_clamp_out_of_range_values() {
        let config = Config::with_overrides(
            "[audio]\nsample_rate = 1\nblock_size = 1000000\n\
             [synth]\nvoices = 0\nmaster_gain = 9.0\n\
             [transport]\nbpm = 5000.0\nloop_beats = -4.0\nquantize_grid = -1.0\n",
        )
        .unwrap();
        assert_eq!(config.sample_rate(), 8_000);
        assert_eq!(config.block_size(), 8_192);
        assert_eq!(config.voices(), 1);
        assert_eq!(config.master_gain(), 2.0);
        assert_eq!(config.bpm(), 999.0);
        assert_eq!(config.loop_beats(), 16.0);
        assert_eq!(config.quantize_grid(), 0.25);
    }

    #[test]
    fn engine_config_carries_settings() {
        let config =
            Config::with_overrides("[audio]\nsample_rate = 48000\n[queues]\nparam_capacity = 64\n")
                .unwrap();
        let engine = config.engine_config();
        assert_eq!(engine.sample_rate, 48_000.0);
        assert_eq!(engine.param_queue_capacity, 64);
        assert!(engine.effects.is_empty());
    }

    #[test]
    fn transport_uses_loop_and_meter() {
        let config = Config::with_overrides(
            "[transport]\ntime_signature = [3, 4]\nloop_beats = 6.0\n",
        )
        .unwrap();
        let transport = config.transport();
        assert_eq!(transport.time_signature, (3, 4));
        assert_eq!(transport.loop_end, 6.0);
        assert!(!transport.is_playing());
    }
}
