//! Timeline: a pattern library plus the arrangement of pattern instances.

use std::collections::BTreeMap;

use super::pattern::{finite_or, NoteEvent, Pattern};
use crate::PatternId;

/// A placement of a pattern on the timeline. Multiple instances can share a
/// pattern. `end_time` is derived from the pattern's length and kept current
/// by the owning [`Timeline`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PatternInstance {
    pattern_id: PatternId,
    start_time: f64,
    end_time: f64,
    muted: bool,
}

impl PatternInstance {
    pub fn pattern_id(&self) -> PatternId {
        self.pattern_id
    }

    /// Absolute start in beats.
    pub fn start_time(&self) -> f64 {
        self.start_time
    }

    /// Absolute end in beats (start + pattern length).
    pub fn end_time(&self) -> f64 {
        self.end_time
    }

    pub fn muted(&self) -> bool {
        self.muted
    }

    pub fn covers(&self, time: f64) -> bool {
        time >= self.start_time && time < self.end_time
    }

    pub fn overlaps(&self, start: f64, end: f64) -> bool {
        self.start_time < end && self.end_time > start
    }
}

/// Top-level arrangement state. Owned by the control thread; the audio
/// thread reads published copies.
#[derive(Debug, Clone, PartialEq)]
pub struct Timeline {
    patterns: BTreeMap<PatternId, Pattern>,
    /// Sorted by start time; equal starts keep insertion order
    instances: Vec<PatternInstance>,
    next_pattern_id: u32,
}

impl Default for Timeline {
    fn default() -> Self {
        Self::new()
    }
}

impl Timeline {
    pub fn new() -> Self {
        Self {
            patterns: BTreeMap::new(),
            instances: Vec::new(),
            next_pattern_id: 1,
        }
    }

    // --- Pattern library ---

    pub fn add_pattern(&mut self, pattern: Pattern) -> PatternId {
        let id = PatternId::new(self.next_pattern_id);
        self.next_pattern_id += 1;
        self.patterns.insert(id, pattern);
        id
    }

    /// Insert a pattern under a fixed id (used when restoring a snapshot).
    /// Returns the pattern it replaced, if any.
    pub fn insert_pattern(&mut self, id: PatternId, pattern: Pattern) -> Option<Pattern> {
        self.next_pattern_id = self.next_pattern_id.max(id.get().saturating_add(1));
        let replaced = self.patterns.insert(id, pattern);
        self.refresh_instance_bounds(id);
        replaced
    }

    /// Remove a pattern and every instance that references it.
    pub fn remove_pattern(&mut self, id: PatternId) -> Option<Pattern> {
        let removed = self.patterns.remove(&id)?;
        // Cascade delete instances
        self.instances.retain(|i| i.pattern_id != id);
        Some(removed)
    }

    pub fn pattern(&self, id: PatternId) -> Option<&Pattern> {
        self.patterns.get(&id)
    }

    pub fn contains_pattern(&self, id: PatternId) -> bool {
        self.patterns.contains_key(&id)
    }

    pub fn patterns(&self) -> impl Iterator<Item = (PatternId, &Pattern)> + '_ {
        self.patterns.iter().map(|(id, p)| (*id, p))
    }

    pub fn pattern_count(&self) -> usize {
        self.patterns.len()
    }

    /// Mutate a pattern in place. Instance end times are refreshed afterwards,
    /// so length edits can never leave a stale instance behind.
    pub fn edit_pattern<R>(&mut self, id: PatternId, f: impl FnOnce(&mut Pattern) -> R) -> Option<R> {
        let pattern = self.patterns.get_mut(&id)?;
        let result = f(pattern);
        self.refresh_instance_bounds(id);
        Some(result)
    }

    pub fn set_pattern_length(&mut self, id: PatternId, length: f64) -> bool {
        self.edit_pattern(id, |p| p.set_length(length)).is_some()
    }

    fn refresh_instance_bounds(&mut self, id: PatternId) {
        let Some(length) = self.patterns.get(&id).map(Pattern::length) else {
            return;
        };
        for instance in self.instances.iter_mut().filter(|i| i.pattern_id == id) {
            instance.end_time = instance.start_time + length;
        }
    }

    // --- Instances ---

    pub fn get_pattern_instances(&self) -> &[PatternInstance] {
        &self.instances
    }

    pub fn instance(&self, index: usize) -> Option<&PatternInstance> {
        self.instances.get(index)
    }

    fn insert_sorted(&mut self, instance: PatternInstance) -> usize {
        let pos = self
            .instances
            .partition_point(|i| i.start_time <= instance.start_time);
        self.instances.insert(pos, instance);
        pos
    }

    /// Place `pattern_id` at `start_time`. Returns the new instance's index,
    /// or `None` when the pattern is unknown.
    pub fn add_pattern_instance(&mut self, pattern_id: PatternId, start_time: f64, muted: bool) -> Option<usize> {
        let length = self.patterns.get(&pattern_id)?.length();
        let start_time = finite_or(start_time, 0.0).max(0.0);
        Some(self.insert_sorted(PatternInstance {
            pattern_id,
            start_time,
            end_time: start_time + length,
            muted,
        }))
    }

    pub fn remove_pattern_instance(&mut self, index: usize) -> bool {
        if index < self.instances.len() {
            self.instances.remove(index);
            true
        } else {
            false
        }
    }

    /// Move an instance to `new_start`. Returns its index after re-sorting.
    pub fn move_pattern_instance(&mut self, index: usize, new_start: f64) -> Option<usize> {
        if index >= self.instances.len() {
            return None;
        }
        let mut instance = self.instances.remove(index);
        let length = instance.end_time - instance.start_time;
        instance.start_time = finite_or(new_start, 0.0).max(0.0);
        instance.end_time = instance.start_time + length;
        Some(self.insert_sorted(instance))
    }

    pub fn set_instance_muted(&mut self, index: usize, muted: bool) -> bool {
        match self.instances.get_mut(index) {
            Some(instance) => {
                instance.muted = muted;
                true
            }
            None => false,
        }
    }

    /// Unmuted instances covering `time`, paired with their patterns.
    pub fn instances_at(&self, time: f64) -> impl Iterator<Item = (&PatternInstance, &Pattern)> + '_ {
        self.instances
            .iter()
            .take_while(move |i| i.start_time <= time)
            .filter(move |i| !i.muted && i.covers(time))
            .filter_map(move |i| self.patterns.get(&i.pattern_id).map(|p| (i, p)))
    }

    // --- Queries ---

    /// Every note whose absolute start lies in `[start, end)`, across all
    /// unmuted instances overlapping the range. Start times in the result are
    /// relative to `start`. Notes starting at or past their pattern's length
    /// are stored but never returned.
    pub fn get_notes_in_range(&self, start: f64, end: f64) -> Vec<NoteEvent> {
        let capacity = self
            .instances
            .iter()
            .filter_map(|i| self.patterns.get(&i.pattern_id))
            .map(Pattern::note_count)
            .sum();
        let mut out = Vec::with_capacity(capacity);
        self.collect_notes_in_range(start, end, &mut out);
        out
    }

    /// Allocation-free form of [`Timeline::get_notes_in_range`]: clears `out`
    /// and refills it. `out` never grows; notes beyond its capacity are
    /// dropped.
    pub fn collect_notes_in_range(&self, start: f64, end: f64, out: &mut Vec<NoteEvent>) {
        out.clear();
        for instance in &self.instances {
            if instance.start_time >= end {
                break;
            }
            if instance.muted || !instance.overlaps(start, end) {
                continue;
            }
            let Some(pattern) = self.patterns.get(&instance.pattern_id) else {
                continue;
            };
            let length = pattern.length();
            for note in pattern.notes() {
                if note.start_time >= length {
                    continue;
                }
                let absolute = instance.start_time + note.start_time;
                if absolute >= start && absolute < end {
                    if out.len() == out.capacity() {
                        return;
                    }
                    out.push(NoteEvent {
                        start_time: absolute - start,
                        ..*note
                    });
                }
            }
        }
    }

    /// Automated value of `param` at absolute `time`, resolved through the
    /// first unmuted instance covering it.
    pub fn get_parameter_value_at_time(&self, param: &str, time: f64, default: f32) -> f32 {
        self.instances_at(time)
            .next()
            .map(|(instance, pattern)| {
                pattern.get_parameter_value_at_time(param, time - instance.start_time, default)
            })
            .unwrap_or(default)
    }

    /// Latest instance end, or 0 when empty.
    pub fn get_length(&self) -> f64 {
        self.instances
            .iter()
            .map(PatternInstance::end_time)
            .fold(0.0, f64::max)
    }

    pub fn clear(&mut self) {
        self.patterns.clear();
        self.instances.clear();
        self.next_pattern_id = 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::AutomationPoint;

    fn one_note_pattern(length: f64) -> Pattern {
        let mut p = Pattern::new("p", length);
        p.add_note(NoteEvent::new(60, 100, 0.0, 1.0));
        p
    }

    #[test]
    fn test_add_remove_pattern() {
        let mut tl = Timeline::new();
        let id = tl.add_pattern(Pattern::new("Test", 4.0));
        assert_eq!(tl.pattern(id).unwrap().name(), "Test");
        assert!(tl.remove_pattern(id).is_some());
        assert!(tl.pattern(id).is_none());
        assert!(tl.remove_pattern(id).is_none());
    }

    #[test]
    fn test_cascade_delete() {
        let mut tl = Timeline::new();
        let a = tl.add_pattern(Pattern::new("A", 4.0));
        let b = tl.add_pattern(Pattern::new("B", 4.0));
        tl.add_pattern_instance(a, 0.0, false);
        tl.add_pattern_instance(b, 4.0, false);
        tl.add_pattern_instance(a, 8.0, false);

        tl.remove_pattern(a);
        assert_eq!(tl.get_pattern_instances().len(), 1);
        assert!(tl.get_pattern_instances().iter().all(|i| i.pattern_id() != a));
    }

    #[test]
    fn test_unknown_pattern_instance_rejected() {
        let mut tl = Timeline::new();
        assert_eq!(tl.add_pattern_instance(PatternId::new(99), 0.0, false), None);
        assert!(tl.get_pattern_instances().is_empty());
    }

    #[test]
    fn test_instances_sorted_by_start() {
        let mut tl = Timeline::new();
        let id = tl.add_pattern(Pattern::new("p", 2.0));
        tl.add_pattern_instance(id, 8.0, false);
        tl.add_pattern_instance(id, 0.0, false);
        let idx = tl.add_pattern_instance(id, 4.0, false);
        assert_eq!(idx, Some(1));
        let starts: Vec<f64> = tl.get_pattern_instances().iter().map(|i| i.start_time()).collect();
        assert_eq!(starts, vec![0.0, 4.0, 8.0]);
    }

    #[test]
    fn test_move_instance_recomputes_end_and_resorts() {
        let mut tl = Timeline::new();
        let id = tl.add_pattern(Pattern::new("p", 2.0));
        tl.add_pattern_instance(id, 0.0, false);
        tl.add_pattern_instance(id, 4.0, false);

        let new_idx = tl.move_pattern_instance(0, 10.0);
        assert_eq!(new_idx, Some(1));
        let moved = tl.instance(1).unwrap();
        assert_eq!(moved.start_time(), 10.0);
        assert_eq!(moved.end_time(), 12.0);
        assert_eq!(tl.move_pattern_instance(5, 0.0), None);
    }

    #[test]
    fn test_length_edit_refreshes_instance_ends() {
        let mut tl = Timeline::new();
        let id = tl.add_pattern(Pattern::new("p", 2.0));
        tl.add_pattern_instance(id, 0.0, false);
        tl.add_pattern_instance(id, 4.0, false);

        assert!(tl.set_pattern_length(id, 3.0));
        for instance in tl.get_pattern_instances() {
            assert_eq!(instance.end_time() - instance.start_time(), 3.0);
        }

        tl.edit_pattern(id, |p| p.set_length(1.0));
        assert_eq!(tl.get_length(), 5.0);
    }

    #[test]
    fn test_notes_in_range_relative_to_start() {
        let mut tl = Timeline::new();
        let id = tl.add_pattern(one_note_pattern(4.0));
        tl.add_pattern_instance(id, 0.0, false);
        tl.add_pattern_instance(id, 4.0, false);

        let notes = tl.get_notes_in_range(3.0, 5.0);
        assert_eq!(notes.len(), 1);
        assert_eq!(notes[0].note, 60);
        assert_eq!(notes[0].start_time, 1.0);

        assert!(tl.get_notes_in_range(0.5, 4.0).is_empty());
        assert_eq!(tl.get_notes_in_range(0.0, 8.0).len(), 2);
    }

    #[test]
    fn test_notes_past_pattern_length_never_play() {
        let mut p = Pattern::new("short", 2.0);
        p.add_note(NoteEvent::new(60, 100, 0.0, 1.0));
        p.add_note(NoteEvent::new(72, 100, 3.0, 0.5));
        let mut tl = Timeline::new();
        let id = tl.add_pattern(p);
        tl.add_pattern_instance(id, 0.0, false);

        let wide: Vec<u8> = tl.get_notes_in_range(0.0, 8.0).iter().map(|n| n.note).collect();
        assert_eq!(wide, vec![60]);
        assert!(tl.get_notes_in_range(2.5, 3.5).is_empty());
        assert_eq!(tl.pattern(id).unwrap().note_count(), 2);
    }

    #[test]
    fn test_muted_instances_are_silent() {
        let mut tl = Timeline::new();
        let id = tl.add_pattern(one_note_pattern(4.0));
        tl.add_pattern_instance(id, 0.0, true);
        assert!(tl.get_notes_in_range(0.0, 4.0).is_empty());
        assert!(tl.set_instance_muted(0, false));
        assert_eq!(tl.get_notes_in_range(0.0, 4.0).len(), 1);
    }

    #[test]
    fn test_collect_never_grows_buffer() {
        let mut tl = Timeline::new();
        let mut p = Pattern::new("dense", 4.0);
        for i in 0..8 {
            p.add_note(NoteEvent::new(60 + i, 100, i as f64 * 0.25, 0.25));
        }
        let id = tl.add_pattern(p);
        tl.add_pattern_instance(id, 0.0, false);

        let mut out = Vec::with_capacity(3);
        tl.collect_notes_in_range(0.0, 4.0, &mut out);
        assert_eq!(out.len(), 3);
        assert_eq!(out.capacity(), 3);
    }

    #[test]
    fn test_parameter_value_through_instance() {
        let mut tl = Timeline::new();
        let mut p = Pattern::new("auto", 4.0);
        p.add_automation_point("cutoff", AutomationPoint::new(0.0, 0.0));
        p.add_automation_point("cutoff", AutomationPoint::new(4.0, 1.0));
        let id = tl.add_pattern(p);
        tl.add_pattern_instance(id, 8.0, false);

        assert!((tl.get_parameter_value_at_time("cutoff", 10.0, 0.5) - 0.5).abs() < 1e-6);
        assert!((tl.get_parameter_value_at_time("cutoff", 9.0, 0.0) - 0.25).abs() < 1e-6);
        // Outside any instance
        assert_eq!(tl.get_parameter_value_at_time("cutoff", 2.0, 0.7), 0.7);
    }

    #[test]
    fn test_length_empty_and_populated() {
        let mut tl = Timeline::new();
        assert_eq!(tl.get_length(), 0.0);
        let id = tl.add_pattern(Pattern::new("p", 3.0));
        tl.add_pattern_instance(id, 0.0, false);
        tl.add_pattern_instance(id, 6.0, true);
        assert_eq!(tl.get_length(), 9.0);
    }

    #[test]
    fn test_insert_pattern_advances_next_id() {
        let mut tl = Timeline::new();
        tl.insert_pattern(PatternId::new(7), Pattern::new("restored", 4.0));
        let fresh = tl.add_pattern(Pattern::new("fresh", 4.0));
        assert_eq!(fresh.get(), 8);
    }
}
