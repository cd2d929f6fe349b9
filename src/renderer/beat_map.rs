//! Tick timing and position computation for cross-voice alignment.

use std::collections::BTreeMap;

/// A tick offset where at least one tickable starts, with the room the
/// widest of them needs.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(super) struct TickSlot {
    pub(super) tick: u64,
    pub(super) min_width: f64,
}

/// Merge the `(start tick, min width)` lists of several voices into sorted,
/// unique slots.
pub(super) fn collect_slots(voices: &[Vec<(u64, f64)>]) -> Vec<TickSlot> {
    let mut slots: BTreeMap<u64, f64> = BTreeMap::new();
    for voice in voices {
        for &(tick, width) in voice {
            let w = slots.entry(tick).or_insert(0.0);
            *w = w.max(width);
        }
    }
    slots.into_iter().map(|(tick, min_width)| TickSlot { tick, min_width }).collect()
}

/// Build a sorted tick → x mapping across all voices. This is the core of
/// vertical alignment: every voice starting a tickable at the same tick gets
/// the same x.
///
/// Distances are proportional to ticks, widened where a slot needs more
/// room, then rescaled so the last slot's span ends at `usable`. Returned
/// x values are relative to the start of the music.
pub(super) fn compute_tick_x_map(slots: &[TickSlot], end_tick: u64, usable: f64) -> Vec<(u64, f64)> {
    let Some(first) = slots.first() else { return vec![] };
    let last_tick = slots.last().map_or(first.tick, |s| s.tick);
    let end_tick = end_tick.max(last_tick + 1);
    let span = (end_tick - first.tick) as f64;

    let mut min_dists = Vec::with_capacity(slots.len());
    let mut total_min = 0.0f64;
    for (i, slot) in slots.iter().enumerate() {
        let next = slots.get(i + 1).map_or(end_tick, |s| s.tick);
        let prop_dist = (next - slot.tick) as f64 / span * usable;
        let min_dist = prop_dist.max(slot.min_width);
        min_dists.push(min_dist);
        total_min += min_dist;
    }

    let scale = if total_min > 0.0 { usable / total_min } else { 1.0 };

    let mut result = Vec::with_capacity(slots.len());
    let mut x = 0.0;
    for (slot, dist) in slots.iter().zip(&min_dists) {
        result.push((slot.tick, x));
        x += dist * scale;
    }
    result
}

/// Y of a diatonic step on a stave whose bottom line sits at `bottom_y` and
/// carries diatonic number `first_line`.
pub(super) fn staff_step_y(bottom_y: f64, diatonic: i32, first_line: i32, spacing: f64) -> f64 {
    bottom_y - (diatonic - first_line) as f64 * spacing / 2.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slots_merge_across_voices() {
        let a = vec![(0, 20.0), (4096, 20.0)];
        let b = vec![(0, 30.0), (2048, 10.0), (4096, 5.0)];
        let slots = collect_slots(&[a, b]);
        let ticks: Vec<u64> = slots.iter().map(|s| s.tick).collect();
        assert_eq!(ticks, vec![0, 2048, 4096]);
        assert_eq!(slots[0].min_width, 30.0);
    }

    #[test]
    fn equal_durations_get_equal_spacing() {
        let slots = collect_slots(&[vec![(0, 1.0), (4096, 1.0), (8192, 1.0), (12288, 1.0)]]);
        let map = compute_tick_x_map(&slots, 16384, 200.0);
        let xs: Vec<f64> = map.iter().map(|&(_, x)| x).collect();
        assert_eq!(xs, vec![0.0, 50.0, 100.0, 150.0]);
    }

    #[test]
    fn wide_slots_push_neighbours_apart() {
        let slots = collect_slots(&[vec![(0, 120.0), (4096, 1.0)]]);
        let map = compute_tick_x_map(&slots, 8192, 200.0);
        // 120 + 100 = 220 rescaled into 200
        let x1 = map[1].1;
        assert!((x1 - 120.0 * 200.0 / 220.0).abs() < 1e-9);
    }

    #[test]
    fn step_positions() {
        // treble bottom line is E4 = 31; G4 sits one line up
        assert_eq!(staff_step_y(80.0, 33, 31, 10.0), 70.0);
        assert_eq!(staff_step_y(80.0, 31, 31, 10.0), 80.0);
    }
}
