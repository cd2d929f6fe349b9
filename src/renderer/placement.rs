//! Placement — determines where measures without explicit geometry go:
//! side by side within a system, systems stacked downwards, parts stacked
//! within a system. Measures that continue a system stop repeating clef,
//! key and time signature unless they change them.

use std::collections::HashMap;

use serde::Serialize;

use crate::config::LayoutConfig;
use crate::model::*;
use super::staff::{estimate_staff_length, StaffAttributes};
use super::Shape;

/// Geometry computed for one measure.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Placement {
    pub left: f64,
    pub top: f64,
    pub width: f64,
    pub system_index: usize,
    /// False for the first measure of a system
    pub continues_system: bool,
}

impl Placement {
    /// Fill whatever `options` leaves open. An explicit system index is kept
    /// when it is later than the computed one.
    pub fn apply(&self, measure: &Stream, options: &mut RenderOptions) {
        options.left.get_or_insert(self.left);
        options.top.get_or_insert(self.top);
        options.width.get_or_insert(self.width);
        options.system_index = options.system_index.max(self.system_index);
        if self.continues_system {
            hide_repeated_signatures(measure, options);
        }
    }
}

fn hide_repeated_signatures(measure: &Stream, options: &mut RenderOptions) {
    options.display_clef &= measure.clef.is_some();
    options.display_key_signature &= measure.key.is_some();
    options.display_time_signature &= measure.time_signature.is_some();
}

/// Place every measure of `root`.
///
/// Measure `i` of every part gets the same left edge and width (the widest
/// any part needs), so barlines line up across parts. The first part's
/// measures decide where systems break.
pub fn place_measures(root: &Stream, config: &LayoutConfig) -> HashMap<StreamId, Placement> {
    let parts: Vec<&Stream> = match Shape::of(root) {
        Shape::Scorelike => root.sub_streams().collect(),
        Shape::Partlike => vec![root],
        Shape::Flat => return HashMap::new(),
    };

    let breaks: Vec<bool> = parts.first().map_or_else(Vec::new, |p| {
        p.sub_streams()
            .enumerate()
            .map(|(i, m)| i > 0 && m.render_options.start_new_system)
            .collect()
    });
    let continues = |i: usize| i > 0 && !breaks.get(i).copied().unwrap_or(false);

    // widest requirement per measure index
    let mut widths: Vec<f64> = Vec::new();
    for part in &parts {
        let mut running = StaffAttributes::default().updated_by(part);
        for (i, measure) in part.sub_streams().enumerate() {
            running = running.updated_by(measure);
            let mut options = measure.render_options.clone();
            if continues(i) {
                hide_repeated_signatures(measure, &mut options);
            }
            let width = options.width.unwrap_or_else(|| {
                estimate_staff_length(measure, &running, &options, config) + options.staff_padding
            });
            if widths.len() <= i {
                widths.resize(i + 1, 0.0);
            }
            widths[i] = widths[i].max(width);
        }
    }

    let system_height = parts.len() as f64 * config.staff_distance + config.system_gap;
    let mut slots = Vec::with_capacity(widths.len());
    let mut system = 0usize;
    let mut left = config.default_left;
    for (i, &width) in widths.iter().enumerate() {
        if breaks.get(i).copied().unwrap_or(false) {
            system += 1;
            left = config.default_left;
        }
        slots.push((left, width, system, continues(i)));
        left += width;
    }

    let mut placements = HashMap::new();
    for (part_index, part) in parts.iter().enumerate() {
        for (measure, &(left, width, system_index, continues_system)) in part.sub_streams().zip(&slots) {
            let top = config.default_top
                + system_index as f64 * system_height
                + part_index as f64 * config.staff_distance;
            placements.insert(measure.id, Placement { left, top, width, system_index, continues_system });
        }
    }
    log::debug!("placed {} measures on {} systems", placements.len(), system + 1);
    placements
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bar(n: usize) -> Stream {
        let notes = (0..n)
            .map(|_| GeneralNote::note(Pitch::new(Step::G, 4), Duration::new(DurationType::Quarter)))
            .collect();
        Stream::measure(notes)
    }

    #[test]
    fn measures_line_up_across_parts() {
        let config = LayoutConfig::default();
        let score = Stream::score(vec![
            Stream::part(vec![bar(1), bar(4)]),
            Stream::part(vec![bar(4), bar(1)]),
        ]);
        let placed = place_measures(&score, &config);
        let mut parts = score.sub_streams();
        let (top, bottom) = (parts.next().unwrap(), parts.next().unwrap());

        let m = |part: &Stream, i: usize| placed[&part.sub_streams().nth(i).unwrap().id];
        assert_eq!(m(top, 0).width, m(bottom, 0).width);
        assert_eq!(m(top, 1).left, m(bottom, 1).left);
        assert_eq!(m(top, 1).left, config.default_left + m(top, 0).width);
        assert_eq!(m(bottom, 0).top - m(top, 0).top, config.staff_distance);
    }

    #[test]
    fn system_breaks_restart_the_row() {
        let config = LayoutConfig::default();
        let second = bar(2).with_render_options(RenderOptions { start_new_system: true, ..Default::default() });
        let part = Stream::part(vec![bar(2), second]);
        let placed = place_measures(&part, &config);
        let p = placed[&part.sub_streams().nth(1).unwrap().id];
        assert_eq!(p.system_index, 1);
        assert_eq!(p.left, config.default_left);
        assert_eq!(p.top, config.default_top + config.staff_distance + config.system_gap);
    }

    #[test]
    fn explicit_geometry_wins() {
        let placement = Placement { left: 50.0, top: 60.0, width: 70.0, system_index: 1, continues_system: false };
        let mut options = RenderOptions { left: Some(5.0), system_index: 3, ..Default::default() };
        placement.apply(&bar(1), &mut options);
        assert_eq!(options.left, Some(5.0));
        assert_eq!(options.top, Some(60.0));
        assert_eq!(options.width, Some(70.0));
        assert_eq!(options.system_index, 3);
        assert!(options.display_clef);
    }

    #[test]
    fn continuing_measures_only_show_changes() {
        let placement = Placement { left: 0.0, top: 0.0, width: 0.0, system_index: 0, continues_system: true };
        let mut plain = RenderOptions::default();
        placement.apply(&bar(1), &mut plain);
        assert!(!plain.display_clef && !plain.display_key_signature && !plain.display_time_signature);

        let mut changed = RenderOptions::default();
        placement.apply(&bar(1).with_time_signature(3, 4), &mut changed);
        assert!(changed.display_time_signature);
        assert!(!changed.display_clef);
    }

    #[test]
    fn flat_streams_are_not_placed() {
        assert!(place_measures(&bar(3), &LayoutConfig::default()).is_empty());
    }
}
