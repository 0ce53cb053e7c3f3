//! Patterns: reusable, fixed-length phrases of notes and automation.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::automation::{self, AutomationPoint};

/// Shortest note duration, in beats. Durations are floored to this.
pub const MIN_DURATION: f64 = 1e-4;

/// Shortest pattern length, in beats.
pub const MIN_LENGTH: f64 = 1e-3;

/// Replace NaN/infinite input with `fallback`.
pub(crate) fn finite_or(value: f64, fallback: f64) -> f64 {
    if value.is_finite() {
        value
    } else {
        fallback
    }
}

/// A timed note. Times are in beats relative to the owning pattern's start.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NoteEvent {
    pub note: u8,
    pub velocity: u8,
    pub start_time: f64,
    pub duration: f64,
}

impl NoteEvent {
    pub fn new(note: u8, velocity: u8, start_time: f64, duration: f64) -> Self {
        Self {
            note,
            velocity,
            start_time,
            duration,
        }
        .sanitized()
    }

    /// Clamp every field into its valid range.
    pub fn sanitized(self) -> Self {
        Self {
            note: self.note.min(127),
            velocity: self.velocity.clamp(1, 127),
            start_time: finite_or(self.start_time, 0.0).max(0.0),
            duration: finite_or(self.duration, MIN_DURATION).max(MIN_DURATION),
        }
    }

    pub fn end_time(&self) -> f64 {
        self.start_time + self.duration
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Pattern {
    name: String,
    length: f64,
    notes: Vec<NoteEvent>,
    /// Per-parameter point lists, each kept sorted by time
    automation: BTreeMap<String, Vec<AutomationPoint>>,
}

impl Default for Pattern {
    fn default() -> Self {
        Self::new("Pattern", 4.0)
    }
}

impl Pattern {
    pub fn new(name: impl Into<String>, length: f64) -> Self {
        Self {
            name: name.into(),
            length: Self::valid_length(length),
            notes: Vec::new(),
            automation: BTreeMap::new(),
        }
    }

    fn valid_length(length: f64) -> f64 {
        finite_or(length, MIN_LENGTH).max(MIN_LENGTH)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    /// Length in beats, always > 0.
    pub fn length(&self) -> f64 {
        self.length
    }

    pub fn set_length(&mut self, length: f64) {
        self.length = Self::valid_length(length);
    }

    // --- Notes ---

    pub fn notes(&self) -> &[NoteEvent] {
        &self.notes
    }

    pub fn note(&self, index: usize) -> Option<&NoteEvent> {
        self.notes.get(index)
    }

    pub fn note_count(&self) -> usize {
        self.notes.len()
    }

    /// Append a note and return its index.
    pub fn add_note(&mut self, note: NoteEvent) -> usize {
        self.notes.push(note.sanitized());
        self.notes.len() - 1
    }

    /// Replace the note at `index`. Returns false for a bad index.
    pub fn edit_note(&mut self, index: usize, note: NoteEvent) -> bool {
        match self.notes.get_mut(index) {
            Some(slot) => {
                *slot = note.sanitized();
                true
            }
            None => false,
        }
    }

    pub fn remove_note(&mut self, index: usize) -> bool {
        if index < self.notes.len() {
            self.notes.remove(index);
            true
        } else {
            false
        }
    }

    pub fn clear_notes(&mut self) {
        self.notes.clear();
    }

    /// Notes whose pattern-relative start falls in `[start, end)`.
    pub fn notes_in_range(&self, start: f64, end: f64) -> impl Iterator<Item = &NoteEvent> + '_ {
        self.notes
            .iter()
            .filter(move |n| n.start_time >= start && n.start_time < end)
    }

    /// Snap every note start to `grid` beats. No-op for a non-positive grid.
    pub fn quantize_notes(&mut self, grid: f64) {
        if grid.is_nan() || grid <= 0.0 {
            return;
        }
        for note in &mut self.notes {
            note.start_time = ((note.start_time / grid).round() * grid).max(0.0);
        }
    }

    /// Shift every note by `semitones`, clamping into the MIDI range.
    pub fn transpose(&mut self, semitones: i32) {
        for note in &mut self.notes {
            note.note = (note.note as i32 + semitones).clamp(0, 127) as u8;
        }
    }

    // --- Automation ---

    /// Insert a point, keeping the parameter's list sorted by time.
    /// Returns the point's index within that list.
    pub fn add_automation_point(&mut self, param: &str, point: AutomationPoint) -> usize {
        let point = AutomationPoint::with_curve(point.time, point.value, point.curve);
        let points = self.automation.entry(param.to_string()).or_default();
        // Equal times keep insertion order
        let pos = points.partition_point(|p| p.time <= point.time);
        points.insert(pos, point);
        pos
    }

    /// Replace the point at `index` and re-sort. Returns false for an unknown
    /// parameter or bad index.
    pub fn edit_automation_point(&mut self, param: &str, index: usize, point: AutomationPoint) -> bool {
        let Some(points) = self.automation.get_mut(param) else {
            return false;
        };
        if index >= points.len() {
            return false;
        }
        points[index] = AutomationPoint::with_curve(point.time, point.value, point.curve);
        points.sort_by(|a, b| a.time.total_cmp(&b.time));
        true
    }

    /// Remove the point at `index`. A parameter left without points is
    /// dropped from the automation map.
    pub fn remove_automation_point(&mut self, param: &str, index: usize) -> bool {
        let Some(points) = self.automation.get_mut(param) else {
            return false;
        };
        if index >= points.len() {
            return false;
        }
        points.remove(index);
        if points.is_empty() {
            self.automation.remove(param);
        }
        true
    }

    pub fn clear_automation(&mut self, param: &str) -> bool {
        self.automation.remove(param).is_some()
    }

    pub fn automation_points(&self, param: &str) -> &[AutomationPoint] {
        self.automation.get(param).map_or(&[], Vec::as_slice)
    }

    pub fn automated_parameters(&self) -> impl Iterator<Item = &str> + '_ {
        self.automation.keys().map(String::as_str)
    }

    /// All automated parameters with their sorted points.
    pub fn automation(&self) -> impl Iterator<Item = (&str, &[AutomationPoint])> + '_ {
        self.automation
            .iter()
            .map(|(param, points)| (param.as_str(), points.as_slice()))
    }

    pub fn has_automation(&self) -> bool {
        !self.automation.is_empty()
    }

    /// Automated value of `param` at pattern-relative `time`, or `default`
    /// when the parameter has no points.
    pub fn get_parameter_value_at_time(&self, param: &str, time: f64, default: f32) -> f32 {
        self.automation
            .get(param)
            .and_then(|points| automation::value_at(points, time))
            .unwrap_or(default)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::CurveType;

    fn ramp_pattern(curve: CurveType) -> Pattern {
        let mut p = Pattern::new("ramp", 4.0);
        p.add_automation_point("cutoff", AutomationPoint::with_curve(0.0, 0.0, curve));
        p.add_automation_point("cutoff", AutomationPoint::new(2.0, 1.0));
        p
    }

    #[test]
    fn length_is_always_positive() {
        let mut p = Pattern::new("p", 0.0);
        assert!(p.length() > 0.0);
        p.set_length(-3.0);
        assert!(p.length() > 0.0);
        p.set_length(f64::NAN);
        assert!(p.length() > 0.0);
        p.set_length(8.0);
        assert_eq!(p.length(), 8.0);
    }

    #[test]
    fn add_note_clamps_fields() {
        let mut p = Pattern::new("p", 4.0);
        let idx = p.add_note(NoteEvent {
            note: 200,
            velocity: 0,
            start_time: -1.0,
            duration: 0.0,
        });
        let n = p.note(idx).unwrap();
        assert_eq!(n.note, 127);
        assert_eq!(n.velocity, 1);
        assert_eq!(n.start_time, 0.0);
        assert_eq!(n.duration, MIN_DURATION);
    }

    #[test]
    fn edit_and_remove_reject_bad_index() {
        let mut p = Pattern::new("p", 4.0);
        assert!(!p.edit_note(0, NoteEvent::new(60, 100, 0.0, 1.0)));
        assert!(!p.remove_note(0));
        p.add_note(NoteEvent::new(60, 100, 0.0, 1.0));
        assert!(p.edit_note(0, NoteEvent::new(62, 90, 1.0, 0.5)));
        assert_eq!(p.notes()[0].note, 62);
        assert!(p.remove_note(0));
        assert_eq!(p.note_count(), 0);
    }

    #[test]
    fn automation_insert_keeps_time_order() {
        let mut p = Pattern::new("p", 4.0);
        p.add_automation_point("gain", AutomationPoint::new(3.0, 0.3));
        p.add_automation_point("gain", AutomationPoint::new(1.0, 0.1));
        let idx = p.add_automation_point("gain", AutomationPoint::new(2.0, 0.2));
        assert_eq!(idx, 1);
        let times: Vec<f64> = p.automation_points("gain").iter().map(|pt| pt.time).collect();
        assert_eq!(times, vec![1.0, 2.0, 3.0]);
    }

    #[test]
    fn edit_automation_point_resorts() {
        let mut p = Pattern::new("p", 4.0);
        p.add_automation_point("gain", AutomationPoint::new(0.0, 0.0));
        p.add_automation_point("gain", AutomationPoint::new(1.0, 0.5));
        assert!(p.edit_automation_point("gain", 0, AutomationPoint::new(2.0, 2.0)));
        let pts = p.automation_points("gain");
        assert_eq!(pts[0].time, 1.0);
        assert_eq!(pts[1].time, 2.0);
        assert_eq!(pts[1].value, 1.0);
        assert!(!p.edit_automation_point("gain", 5, AutomationPoint::new(0.0, 0.0)));
        assert!(!p.edit_automation_point("missing", 0, AutomationPoint::new(0.0, 0.0)));
    }

    #[test]
    fn removing_last_point_drops_parameter() {
        let mut p = Pattern::new("p", 4.0);
        p.add_automation_point("gain", AutomationPoint::new(0.0, 0.5));
        assert!(p.remove_automation_point("gain", 0));
        assert!(!p.has_automation());
        assert!(!p.remove_automation_point("gain", 0));
    }

    #[test]
    fn note_indices_follow_insertion_order() {
        let mut p = Pattern::new("p", 4.0);
        let late = p.add_note(NoteEvent::new(67, 100, 3.0, 0.5));
        let early = p.add_note(NoteEvent::new(60, 100, 0.0, 0.5));
        assert_eq!((late, early), (0, 1));
        assert_eq!(p.note(late).unwrap().note, 67);
        assert!(p.edit_note(early, NoteEvent::new(62, 100, 0.5, 0.5)));
        assert_eq!(p.note(early).unwrap().note, 62);
    }

    #[test]
    fn non_finite_point_values_stay_in_range() {
        let mut p = Pattern::new("nan", 4.0);
        p.add_automation_point(
            "x",
            AutomationPoint {
                time: 0.0,
                value: f32::NAN,
                curve: CurveType::Linear,
            },
        );
        p.add_automation_point("x", AutomationPoint::new(2.0, 1.0));
        let v = p.get_parameter_value_at_time("x", 1.0, 0.5);
        assert!((0.0..=1.0).contains(&v));
        assert!((v - 0.5).abs() < 1e-6);
    }

    #[test]
    fn value_defaults_without_automation() {
        let p = Pattern::new("p", 4.0);
        assert_eq!(p.get_parameter_value_at_time("cutoff", 1.0, 0.42), 0.42);
    }

    #[test]
    fn value_interpolates_per_curve() {
        let linear = ramp_pattern(CurveType::Linear);
        assert!((linear.get_parameter_value_at_time("cutoff", 1.0, 0.0) - 0.5).abs() < 1e-6);

        let expo = ramp_pattern(CurveType::Exponential);
        assert!((expo.get_parameter_value_at_time("cutoff", 1.0, 0.0) - 0.25).abs() < 1e-6);

        let log = ramp_pattern(CurveType::Logarithmic);
        assert!((log.get_parameter_value_at_time("cutoff", 0.5, 0.0) - 0.5).abs() < 1e-6);

        let s = ramp_pattern(CurveType::SCurve);
        assert!((s.get_parameter_value_at_time("cutoff", 0.5, 0.0) - 0.15625).abs() < 1e-6);
    }

    #[test]
    fn value_stays_within_point_bounds() {
        let mut p = Pattern::new("p", 8.0);
        p.add_automation_point("x", AutomationPoint::with_curve(0.0, 0.2, CurveType::SCurve));
        p.add_automation_point("x", AutomationPoint::with_curve(1.5, 0.9, CurveType::Logarithmic));
        p.add_automation_point("x", AutomationPoint::with_curve(3.0, 0.4, CurveType::Exponential));
        p.add_automation_point("x", AutomationPoint::new(6.0, 0.7));

        let mut t = 0.0;
        while t <= 6.0 {
            let v = p.get_parameter_value_at_time("x", t, -1.0);
            assert!((0.2..=0.9).contains(&v), "value {} at {} out of bounds", v, t);
            t += 0.01;
        }
    }

    #[test]
    fn quantize_and_transpose() {
        let mut p = Pattern::new("p", 4.0);
        p.add_note(NoteEvent::new(126, 100, 0.26, 0.25));
        p.quantize_notes(0.25);
        p.transpose(5);
        assert_eq!(p.notes()[0].start_time, 0.25);
        assert_eq!(p.notes()[0].note, 127);
    }

    #[test]
    fn notes_in_range_is_half_open() {
        let mut p = Pattern::new("p", 4.0);
        p.add_note(NoteEvent::new(60, 100, 0.0, 1.0));
        p.add_note(NoteEvent::new(62, 100, 1.0, 1.0));
        let found: Vec<u8> = p.notes_in_range(0.0, 1.0).map(|n| n.note).collect();
        assert_eq!(found, vec![60]);
    }
}
