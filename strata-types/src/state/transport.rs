//! Transport settings: tempo, meter, loop region, quantization grid.

use serde::{Deserialize, Serialize};

use super::pattern::finite_or;

pub const MIN_TEMPO: f64 = 1.0;
pub const MAX_TEMPO: f64 = 999.0;
pub const DEFAULT_TEMPO: f64 = 120.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum PlayState {
    #[default]
    Stopped,
    Playing,
}

/// Snap `time` to the nearest multiple of `grid`. Identity for `grid <= 0`.
pub fn quantize_time(time: f64, grid: f64) -> f64 {
    if grid > 0.0 && grid.is_finite() {
        (time / grid).round() * grid
    } else {
        time
    }
}

pub fn clamp_tempo(bpm: f64) -> f64 {
    finite_or(bpm, DEFAULT_TEMPO).clamp(MIN_TEMPO, MAX_TEMPO)
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransportState {
    pub position_beats: f64,
    pub tempo_bpm: f64,
    pub time_signature: (u32, u32),
    #[serde(skip)]
    pub play_state: PlayState,
    pub looping: bool,
    pub loop_start: f64,
    pub loop_end: f64,
    pub quantize_grid: f64,
}

impl Default for TransportState {
    fn default() -> Self {
        Self {
            position_beats: 0.0,
            tempo_bpm: DEFAULT_TEMPO,
            time_signature: (4, 4),
            play_state: PlayState::Stopped,
            looping: false,
            loop_start: 0.0,
            loop_end: 16.0, // 4 bars in 4/4
            quantize_grid: 0.25,
        }
    }
}

impl TransportState {
    pub fn is_playing(&self) -> bool {
        self.play_state == PlayState::Playing
    }

    /// Clamp every field into its valid range. An inverted loop region falls
    /// back to the default one.
    pub fn sanitized(self) -> Self {
        let defaults = Self::default();
        let loop_start = finite_or(self.loop_start, 0.0).max(0.0);
        let loop_end = finite_or(self.loop_end, defaults.loop_end);
        let (loop_start, loop_end) = if loop_start < loop_end {
            (loop_start, loop_end)
        } else {
            (defaults.loop_start, defaults.loop_end)
        };
        Self {
            position_beats: finite_or(self.position_beats, 0.0).max(0.0),
            tempo_bpm: clamp_tempo(self.tempo_bpm),
            time_signature: (self.time_signature.0.max(1), self.time_signature.1.max(1)),
            play_state: self.play_state,
            looping: self.looping,
            loop_start,
            loop_end,
            quantize_grid: finite_or(self.quantize_grid, 0.0).max(0.0),
        }
    }

    pub fn loop_length(&self) -> f64 {
        self.loop_end - self.loop_start
    }

    /// Beats per bar for the current time signature (quarter-note beats).
    pub fn beats_per_bar(&self) -> f64 {
        self.time_signature.0 as f64 * 4.0 / self.time_signature.1 as f64
    }

    pub fn quantize_time(&self, time: f64) -> f64 {
        quantize_time(time, self.quantize_grid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quantize_snaps_to_grid() {
        assert_eq!(quantize_time(0.3, 0.25), 0.25);
        assert_eq!(quantize_time(0.4, 0.25), 0.5);
        assert_eq!(quantize_time(0.4, 0.0), 0.4);
    }

    #[test]
    fn quantize_is_idempotent() {
        for grid in [0.0, 0.1, 0.25, 1.0 / 3.0, 0.75, 1.5] {
            let mut t = 0.0;
            while t < 20.0 {
                let once = quantize_time(t, grid);
                assert_eq!(quantize_time(once, grid), once, "t={} grid={}", t, grid);
                t += 0.037;
            }
        }
    }

    #[test]
    fn sanitized_clamps_fields() {
        let s = TransportState {
            position_beats: -4.0,
            tempo_bpm: 5000.0,
            time_signature: (0, 0),
            play_state: PlayState::Stopped,
            looping: true,
            loop_start: 8.0,
            loop_end: 2.0,
            quantize_grid: -1.0,
        }
        .sanitized();
        assert_eq!(s.position_beats, 0.0);
        assert_eq!(s.tempo_bpm, MAX_TEMPO);
        assert_eq!(s.time_signature, (1, 1));
        assert!(s.loop_start < s.loop_end);
        assert_eq!(s.quantize_grid, 0.0);
    }

    #[test]
    fn beats_per_bar_follows_meter() {
        let mut s = TransportState::default();
        assert_eq!(s.beats_per_bar(), 4.0);
        s.time_signature = (6, 8);
        assert_eq!(s.beats_per_bar(), 3.0);
    }
}
