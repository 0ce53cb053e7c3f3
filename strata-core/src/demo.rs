//! A short built-in arrangement used by `strata render` when no project file
//! is given.

use strata_audio::dsp::EffectKind;
use strata_audio::{Engine, EngineConfig, SynthParam};
use strata_types::{AutomationPoint, CurveType, NoteEvent, Pattern, Timeline};

use crate::config::Config;
use crate::session::Session;

/// A session loaded with the demo arrangement and its effects, plus the
/// engine that plays it.
pub fn demo_session(config: &Config) -> (Session, Engine) {
    let engine_config = EngineConfig {
        effects: demo_effects(),
        ..config.engine_config()
    };
    let (mut session, engine) = Session::new(&engine_config, config.transport());
    session.edit_timeline(|timeline| *timeline = demo_timeline());
    (session, engine)
}

/// Bass line, chord stabs and a lead phrase, eight bars of 4/4.
pub fn demo_timeline() -> Timeline {
    let mut timeline = Timeline::new();

    let bass = timeline.add_pattern(bass_pattern());
    let chords = timeline.add_pattern(chord_pattern());
    let lead = timeline.add_pattern(lead_pattern());

    for bar in 0..8 {
        let start = bar as f64 * 4.0;
        timeline.add_pattern_instance(bass, start, false);
        if bar % 2 == 0 {
            timeline.add_pattern_instance(chords, start, false);
        }
    }
    timeline.add_pattern_instance(lead, 16.0, false);
    timeline.add_pattern_instance(lead, 24.0, false);
    timeline
}

/// Master effects the demo is voiced for.
pub fn demo_effects() -> Vec<EffectKind> {
    vec![EffectKind::Distortion, EffectKind::Delay]
}

fn bass_pattern() -> Pattern {
    let mut p = Pattern::new("bass", 4.0);
    for (i, note) in [36u8, 36, 48, 36, 39, 36, 43, 41].iter().enumerate() {
        p.add_note(NoteEvent::new(*note, 110, i as f64 * 0.5, 0.4));
    }
    let cutoff = SynthParam::FilterCutoff.name();
    p.add_automation_point(cutoff, AutomationPoint::with_curve(0.0, 0.35, CurveType::Exponential));
    p.add_automation_point(cutoff, AutomationPoint::with_curve(2.0, 0.7, CurveType::SCurve));
    p.add_automation_point(cutoff, AutomationPoint::new(4.0, 0.35));
    p
}

fn chord_pattern() -> Pattern {
    let mut p = Pattern::new("stabs", 8.0);
    for (start, chord) in [(0.0, [60u8, 63, 67]), (3.0, [58, 62, 65]), (6.0, [56, 60, 63])] {
        for note in chord {
            p.add_note(NoteEvent::new(note, 70, start, 1.5));
        }
    }
    p
}

fn lead_pattern() -> Pattern {
    let mut p = Pattern::new("lead", 8.0);
    let phrase = [
        (72u8, 0.0, 1.0),
        (75, 1.0, 0.5),
        (74, 1.5, 0.5),
        (72, 2.0, 2.0),
        (70, 4.5, 0.5),
        (67, 5.0, 3.0),
    ];
    for (note, start, duration) in phrase {
        p.add_note(NoteEvent::new(note, 95, start, duration));
    }
    p
}
