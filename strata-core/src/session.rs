//! Control-thread session: the editable timeline, the transport settings, and
//! the handle that keeps the engine in step with both.

use std::path::Path;

use strata_audio::{engine_pair, Engine, EngineConfig, EngineHandle};
use strata_types::{ProjectState, Timeline, TransportState};

pub struct Session {
    handle: EngineHandle,
    timeline: Timeline,
    transport: TransportState,
}

impl Session {
    /// Build a session and the engine it drives. The engine is handed to
    /// whatever owns the audio callback.
    pub fn new(config: &EngineConfig, transport: TransportState) -> (Self, Engine) {
        let (handle, engine) = engine_pair(config);
        let mut session = Session {
            handle,
            timeline: Timeline::new(),
            transport: transport.sanitized(),
        };
        session.sync_transport();
        (session, engine)
    }

    /// A fresh session restored from a project file.
    pub fn from_project(config: &EngineConfig, path: &Path) -> Result<(Self, Engine), String> {
        let (mut session, engine) = Self::new(config, TransportState::default());
        session.load(path)?;
        Ok((session, engine))
    }

    pub fn handle(&mut self) -> &mut EngineHandle {
        &mut self.handle
    }

    pub fn timeline(&self) -> &Timeline {
        &self.timeline
    }

    pub fn transport(&self) -> &TransportState {
        &self.transport
    }

    /// Edit the timeline and publish the result to the engine.
    pub fn edit_timeline<R>(&mut self, f: impl FnOnce(&mut Timeline) -> R) -> R {
        let result = f(&mut self.timeline);
        self.handle.publish_timeline(&self.timeline);
        result
    }

    pub fn set_tempo(&mut self, bpm: f64) {
        self.transport.tempo_bpm = strata_types::clamp_tempo(bpm);
        self.handle.set_tempo(self.transport.tempo_bpm);
    }

    pub fn play(&mut self) -> bool {
        self.handle.play()
    }

    pub fn stop(&mut self) -> bool {
        self.handle.stop()
    }

    pub fn set_loop(&mut self, start: f64, end: f64) -> bool {
        if !self.handle.set_loop(start, end) {
            return false;
        }
        self.transport.loop_start = start;
        self.transport.loop_end = end;
        true
    }

    pub fn set_looping(&mut self, looping: bool) {
        self.transport.looping = looping;
        self.handle.set_looping(looping);
    }

    /// Snapshot of everything needed to reproduce the session. The playhead
    /// comes from the engine's latest status once it has rendered a block.
    pub fn project_state(&mut self) -> ProjectState {
        let status = self.handle.status();
        let mut transport = self.transport;
        if status.blocks_processed > 0 {
            transport.position_beats = status.position_beats;
        }
        ProjectState {
            timeline: self.timeline.create_state(),
            transport,
        }
    }

    /// Replace timeline and transport with `state`. Instances that point at
    /// unknown patterns are dropped with a warning.
    pub fn restore(&mut self, state: &ProjectState) {
        let (timeline, complete) = Timeline::from_state(&state.timeline);
        if !complete {
            log::warn!(target: "timeline", "project referenced missing patterns; instances skipped");
        }
        self.timeline = timeline;
        self.transport = state.transport.sanitized();
        self.handle.publish_timeline(&self.timeline);
        self.sync_transport();
    }

    pub fn load(&mut self, path: &Path) -> Result<(), String> {
        let state = load_project(path)?;
        self.restore(&state);
        log::info!(
            target: "timeline",
            "loaded {}: {} patterns, {} instances",
            path.display(),
            self.timeline.pattern_count(),
            self.timeline.get_pattern_instances().len()
        );
        Ok(())
    }

    pub fn save(&mut self, path: &Path) -> Result<(), String> {
        save_project(path, &self.project_state())
    }

    fn sync_transport(&mut self) {
        let t = self.transport;
        let sent = self.handle.set_tempo(t.tempo_bpm)
            & self.handle.set_time_signature(t.time_signature.0, t.time_signature.1)
            & self.handle.set_loop(t.loop_start, t.loop_end)
            & self.handle.set_looping(t.looping)
            & self.handle.set_quantize_grid(t.quantize_grid)
            & self.handle.set_position(t.position_beats);
        if !sent {
            log::warn!(target: "engine", "transport settings did not all reach the engine");
        }
    }
}

pub fn load_project(path: &Path) -> Result<ProjectState, String> {
    let contents = std::fs::read_to_string(path)
        .map_err(|e| format!("Failed to read {}: {}", path.display(), e))?;
    serde_json::from_str(&contents).map_err(|e| format!("Failed to parse {}: {}", path.display(), e))
}

pub fn save_project(path: &Path, state: &ProjectState) -> Result<(), String> {
    let json = serde_json::to_string_pretty(state)
        .map_err(|e| format!("Failed to serialize project: {}", e))?;
    std::fs::write(path, json).map_err(|e| format!("Failed to write {}: {}", path.display(), e))
}
