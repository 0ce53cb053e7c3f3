//! Live playback on the default output device via cpal.

use std::time::Duration;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{SampleFormat, StreamConfig};

use strata_audio::Engine;

use crate::render::AudioSource;

/// Largest callback chunk rendered in one pull; bigger device buffers are
/// split.
const MAX_CALLBACK_FRAMES: usize = 8192;

/// Stream `engine` to the default output device for `seconds`, then stop.
/// The engine is re-prepared for the device's sample rate before the stream
/// starts.
pub fn play(mut engine: Engine, seconds: f64) -> Result<(), String> {
    if !seconds.is_finite() || seconds <= 0.0 {
        return Err(format!("Playback length must be positive, got {}", seconds));
    }
    let host = cpal::default_host();
    let device = host
        .default_output_device()
        .ok_or_else(|| "No output device available".to_string())?;
    let config = device
        .default_output_config()
        .map_err(|e| format!("Failed to get output config: {}", e))?;
    if config.sample_format() != SampleFormat::F32 {
        return Err(format!(
            "Unsupported output sample format {:?}",
            config.sample_format()
        ));
    }

    let channels = config.channels() as usize;
    if channels == 0 {
        return Err("Output device reports no channels".to_string());
    }
    let sample_rate = config.sample_rate().0;
    let stream_config: StreamConfig = config.into();
    if sample_rate != engine.sample_rate() as u32 {
        let block_size = engine.block_size();
        engine.prepare(sample_rate as f64, block_size);
    }
    log::info!(
        target: "device",
        "output: {} ({} Hz, {} channels)",
        device.name().unwrap_or_else(|_| "unknown".to_string()),
        sample_rate,
        channels
    );

    let mut left = vec![0.0f32; MAX_CALLBACK_FRAMES];
    let mut right = vec![0.0f32; MAX_CALLBACK_FRAMES];
    let stream = device
        .build_output_stream(
            &stream_config,
            move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                for chunk in data.chunks_mut(MAX_CALLBACK_FRAMES * channels) {
                    let frames = chunk.len() / channels;
                    engine.render(&mut left[..frames], &mut right[..frames]);
                    write_interleaved(chunk, channels, &left[..frames], &right[..frames]);
                }
            },
            |err| {
                log::error!(target: "device", "output stream error: {}", err);
            },
            None,
        )
        .map_err(|e| format!("Failed to build output stream: {}", e))?;

    stream
        .play()
        .map_err(|e| format!("Failed to start output stream: {}", e))?;
    std::thread::sleep(Duration::from_secs_f64(seconds));
    Ok(())
}

/// Spread a stereo pair across `channels`: mono folds down, extra channels
/// get silence.
fn write_interleaved(out: &mut [f32], channels: usize, left: &[f32], right: &[f32]) {
    for (frame, (&l, &r)) in out.chunks_mut(channels).zip(left.iter().zip(right)) {
        match frame {
            [mono] => *mono = 0.5 * (l + r),
            [a, b, rest @ ..] => {
                *a = l;
                *b = r;
                rest.fill(0.0);
            }
            [] => {}
        }
    }
}
