//! Offline bounce to WAV.

use std::path::Path;

use strata_audio::Engine;

use crate::config::Config;
use crate::demo;
use crate::session::Session;

/// Frames rendered per pull from the source.
const RENDER_CHUNK: usize = 4096;

/// Anything that can produce non-interleaved stereo on demand. The offline
/// renderer and the live device driver both pull through this.
pub trait AudioSource {
    fn sample_rate(&self) -> u32;

    /// Fill `left` and `right` (equal lengths) with the next frames.
    fn render(&mut self, left: &mut [f32], right: &mut [f32]);
}

impl AudioSource for Engine {
    fn sample_rate(&self) -> u32 {
        Engine::sample_rate(self).round() as u32
    }

    fn render(&mut self, left: &mut [f32], right: &mut [f32]) {
        self.process_stereo(left, right);
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderSummary {
    pub frames: u64,
    pub peak: f32,
}

/// Pull `seconds` of audio from `source` into a 32-bit float stereo WAV.
pub fn render_to_wav<S: AudioSource + ?Sized>(
    source: &mut S,
    path: &Path,
    seconds: f64,
) -> Result<RenderSummary, String> {
    if !seconds.is_finite() || seconds <= 0.0 {
        return Err(format!("Render length must be positive, got {}", seconds));
    }
    let sample_rate = source.sample_rate();
    let spec = hound::WavSpec {
        channels: 2,
        sample_rate,
        bits_per_sample: 32,
        sample_format: hound::SampleFormat::Float,
    };
    let mut writer = hound::WavWriter::create(path, spec)
        .map_err(|e| format!("Failed to create WAV writer: {}", e))?;

    let total = (seconds * sample_rate as f64).round() as u64;
    let mut left = vec![0.0f32; RENDER_CHUNK];
    let mut right = vec![0.0f32; RENDER_CHUNK];
    let mut written = 0u64;
    let mut peak = 0.0f32;
    while written < total {
        let frames = (total - written).min(RENDER_CHUNK as u64) as usize;
        source.render(&mut left[..frames], &mut right[..frames]);
        for (&l, &r) in left[..frames].iter().zip(&right[..frames]) {
            peak = peak.max(l.abs()).max(r.abs());
            writer
                .write_sample(l)
                .map_err(|e| format!("Failed to write sample: {}", e))?;
            writer
                .write_sample(r)
                .map_err(|e| format!("Failed to write sample: {}", e))?;
        }
        written += frames as u64;
    }

    writer
        .finalize()
        .map_err(|e| format!("Failed to finalize WAV: {}", e))?;

    log::info!(
        target: "render",
        "wrote {} ({} frames at {} Hz, peak {:.3})",
        path.display(),
        written,
        sample_rate,
        peak
    );
    Ok(RenderSummary { frames: written, peak })
}

/// Render the built-in arrangement.
pub fn render_demo(
    config: &Config,
    path: &Path,
    seconds: f64,
    bpm: Option<f64>,
) -> Result<RenderSummary, String> {
    let (session, mut engine) = demo::demo_session(config);
    bounce(session, &mut engine, path, seconds, bpm)
}

/// Render a saved project file.
pub fn render_project(
    config: &Config,
    project: &Path,
    path: &Path,
    seconds: f64,
    bpm: Option<f64>,
) -> Result<RenderSummary, String> {
    let (session, mut engine) = Session::from_project(&config.engine_config(), project)?;
    bounce(session, &mut engine, path, seconds, bpm)
}

fn bounce(
    mut session: Session,
    engine: &mut Engine,
    path: &Path,
    seconds: f64,
    bpm: Option<f64>,
) -> Result<RenderSummary, String> {
    if let Some(bpm) = bpm {
        session.set_tempo(bpm);
    }
    if !session.play() {
        return Err("Engine command queue is full".to_string());
    }
    render_to_wav(engine, path, seconds)
}
