//! Render-time bookkeeping for the audio callback.
//!
//! Keeps the last few hundred block render times in a fixed array so the
//! audio thread can record without allocating. The control side reads a
//! [`TelemetrySummary`] through the published engine status.

use std::time::Duration;

const WINDOW: usize = 256;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TelemetrySummary {
    pub avg_us: u32,
    pub max_us: u32,
    pub p95_us: u32,
    /// Blocks whose render time exceeded their real-time budget. Cumulative.
    pub overruns: u64,
}

pub struct BlockTelemetry {
    durations_us: [u32; WINDOW],
    next: usize,
    filled: usize,
    max_us: u32,
    overruns: u64,
}

impl Default for BlockTelemetry {
    fn default() -> Self {
        Self::new()
    }
}

impl BlockTelemetry {
    pub fn new() -> Self {
        Self {
            durations_us: [0; WINDOW],
            next: 0,
            filled: 0,
            max_us: 0,
            overruns: 0,
        }
    }

    /// Real-time budget in microseconds for `frames` at `sample_rate`.
    pub fn budget_us(frames: usize, sample_rate: f64) -> u32 {
        if sample_rate <= 0.0 {
            return u32::MAX;
        }
        (frames as f64 / sample_rate * 1_000_000.0).min(u32::MAX as f64) as u32
    }

    #[inline]
    pub fn record(&mut self, elapsed: Duration, budget_us: u32) {
        let us = elapsed.as_micros().min(u32::MAX as u128) as u32;
        self.durations_us[self.next] = us;
        self.next = (self.next + 1) % WINDOW;
        self.filled = (self.filled + 1).min(WINDOW);
        self.max_us = self.max_us.max(us);
        if us > budget_us {
            self.overruns += 1;
        }
    }

    /// Summarize the current window. The max resets; overruns keep counting.
    pub fn take_summary(&mut self) -> TelemetrySummary {
        let summary = self.summary();
        self.max_us = 0;
        summary
    }

    pub fn summary(&self) -> TelemetrySummary {
        if self.filled == 0 {
            return TelemetrySummary {
                overruns: self.overruns,
                ..TelemetrySummary::default()
            };
        }
        let window = &self.durations_us[..self.filled];
        let sum: u64 = window.iter().map(|&us| us as u64).sum();

        let mut sorted = self.durations_us;
        sorted[..self.filled].sort_unstable();
        let p95_idx = (self.filled * 95 / 100).max(1) - 1;

        TelemetrySummary {
            avg_us: (sum / self.filled as u64) as u32,
            max_us: self.max_us,
            p95_us: sorted[p95_idx],
            overruns: self.overruns,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn summary_of_empty_window() {
        let t = BlockTelemetry::new();
        assert_eq!(t.summary(), TelemetrySummary::default());
    }

    #[test]
    fn averages_and_counts_overruns() {
        let mut t = BlockTelemetry::new();
        t.record(Duration::from_micros(100), 250);
        t.record(Duration::from_micros(200), 250);
        t.record(Duration::from_micros(300), 250);

        let s = t.take_summary();
        assert_eq!(s.avg_us, 200);
        assert_eq!(s.max_us, 300);
        assert_eq!(s.overruns, 1);
        assert_eq!(t.summary().max_us, 0);
        assert_eq!(t.summary().overruns, 1);
    }

    #[test]
    fn window_wraps() {
        let mut t = BlockTelemetry::new();
        for _ in 0..WINDOW {
            t.record(Duration::from_micros(1000), u32::MAX);
        }
        for _ in 0..WINDOW {
            t.record(Duration::from_micros(10), u32::MAX);
        }
        let s = t.summary();
        assert_eq!(s.avg_us, 10);
        assert_eq!(s.p95_us, 10);
    }

    #[test]
    fn budget_from_block_length() {
        assert_eq!(BlockTelemetry::budget_us(480, 48_000.0), 10_000);
    }
}
