//! Plain snapshot structs read and written by an external serializer.
//!
//! Restoring always goes through the validating setters on [`Pattern`] and
//! [`Timeline`], so a hand-edited or truncated snapshot cannot produce an
//! unsorted automation list, a non-positive length, or a dangling instance.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::automation::AutomationPoint;
use super::pattern::{NoteEvent, Pattern};
use super::timeline::Timeline;
use super::transport::TransportState;
use crate::PatternId;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatternState {
    pub name: String,
    pub length: f64,
    #[serde(default)]
    pub notes: Vec<NoteEvent>,
    #[serde(default)]
    pub automation: BTreeMap<String, Vec<AutomationPoint>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatternEntry {
    pub id: PatternId,
    pub pattern: PatternState,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstanceState {
    pub pattern_id: PatternId,
    pub start_time: f64,
    #[serde(default)]
    pub muted: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TimelineState {
    #[serde(default)]
    pub patterns: Vec<PatternEntry>,
    #[serde(default)]
    pub instances: Vec<InstanceState>,
}

/// Everything the core needs to reproduce a session.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProjectState {
    #[serde(default)]
    pub timeline: TimelineState,
    #[serde(default)]
    pub transport: TransportState,
}

impl Pattern {
    pub fn create_state(&self) -> PatternState {
        PatternState {
            name: self.name().to_string(),
            length: self.length(),
            notes: self.notes().to_vec(),
            automation: self
                .automation()
                .map(|(param, points)| (param.to_string(), points.to_vec()))
                .collect(),
        }
    }

    pub fn from_state(state: &PatternState) -> Self {
        let mut pattern = Pattern::new(state.name.clone(), state.length);
        for note in &state.notes {
            pattern.add_note(*note);
        }
        for (param, points) in &state.automation {
            for point in points {
                pattern.add_automation_point(param, *point);
            }
        }
        pattern
    }
}

impl Timeline {
    pub fn create_state(&self) -> TimelineState {
        TimelineState {
            patterns: self
                .patterns()
                .map(|(id, pattern)| PatternEntry {
                    id,
                    pattern: pattern.create_state(),
                })
                .collect(),
            instances: self
                .get_pattern_instances()
                .iter()
                .map(|i| InstanceState {
                    pattern_id: i.pattern_id(),
                    start_time: i.start_time(),
                    muted: i.muted(),
                })
                .collect(),
        }
    }

    /// Replace the whole timeline with `state`. Returns false when some
    /// instance referenced an unknown pattern and was skipped.
    pub fn restore_state(&mut self, state: &TimelineState) -> bool {
        self.clear();
        for entry in &state.patterns {
            self.insert_pattern(entry.id, Pattern::from_state(&entry.pattern));
        }
        let mut complete = true;
        for instance in &state.instances {
            if self
                .add_pattern_instance(instance.pattern_id, instance.start_time, instance.muted)
                .is_none()
            {
                complete = false;
            }
        }
        complete
    }

    pub fn from_state(state: &TimelineState) -> (Self, bool) {
        let mut timeline = Timeline::new();
        let complete = timeline.restore_state(state);
        (timeline, complete)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::CurveType;

    fn sample_timeline() -> Timeline {
        let mut tl = Timeline::new();
        let mut p = Pattern::new("Lead", 4.0);
        p.add_note(NoteEvent::new(60, 100, 0.0, 1.0));
        p.add_note(NoteEvent::new(67, 80, 2.0, 0.5));
        p.add_automation_point("cutoff", AutomationPoint::with_curve(0.0, 0.1, CurveType::SCurve));
        p.add_automation_point("cutoff", AutomationPoint::new(4.0, 0.9));
        let id = tl.add_pattern(p);
        tl.add_pattern_instance(id, 0.0, false);
        tl.add_pattern_instance(id, 8.0, true);
        tl
    }

    #[test]
    fn timeline_state_roundtrips_through_json() {
        let tl = sample_timeline();
        let json = serde_json::to_string(&tl.create_state()).unwrap();
        let state: TimelineState = serde_json::from_str(&json).unwrap();
        let (restored, complete) = Timeline::from_state(&state);
        assert!(complete);
        assert_eq!(restored, tl);
    }

    #[test]
    fn restore_skips_dangling_instances() {
        let state = TimelineState {
            patterns: vec![],
            instances: vec![InstanceState {
                pattern_id: PatternId::new(3),
                start_time: 0.0,
                muted: false,
            }],
        };
        let (tl, complete) = Timeline::from_state(&state);
        assert!(!complete);
        assert!(tl.get_pattern_instances().is_empty());
    }

    #[test]
    fn restore_resorts_unsorted_automation() {
        let mut automation = BTreeMap::new();
        automation.insert(
            "gain".to_string(),
            vec![AutomationPoint::new(3.0, 0.3), AutomationPoint::new(1.0, 0.1)],
        );
        let state = PatternState {
            name: "messy".to_string(),
            length: -2.0,
            notes: vec![],
            automation,
        };
        let p = Pattern::from_state(&state);
        assert!(p.length() > 0.0);
        assert_eq!(p.automation_points("gain")[0].time, 1.0);
    }

    #[test]
    fn project_state_defaults_missing_sections() {
        let state: ProjectState = serde_json::from_str("{}").unwrap();
        assert!(state.timeline.patterns.is_empty());
        assert_eq!(state.transport, TransportState::default());
    }
}
