//! Stave construction and decoration: size, staff lines, clef, key and
//! time signatures, measure numbers and barlines.

use crate::config::LayoutConfig;
use crate::model::*;
use super::backend::{BackendResult, BarlineType, NotationBackend, StaveId};

// ═══════════════════════════════════════════════════════════════════════
// Running attributes
// ═══════════════════════════════════════════════════════════════════════

/// Clef, key and time signature in effect for a stream.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct StaffAttributes {
    pub clef: Clef,
    pub key: Option<Key>,
    pub time: Option<TimeSignature>,
}

impl StaffAttributes {
    /// The attributes in effect inside `stream`: its own where it declares
    /// them, these otherwise.
    pub fn updated_by(&self, stream: &Stream) -> Self {
        Self {
            clef: stream.clef.clone().unwrap_or_else(|| self.clef.clone()),
            key: stream.key.clone().or_else(|| self.key.clone()),
            time: stream.time_signature.or(self.time),
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════
// Staff lines
// ═══════════════════════════════════════════════════════════════════════

/// How a stave shows its lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StaffLines {
    /// The backend's five-line default.
    Default,
    /// The backend's own "show N lines" behaviour.
    Count(u32),
    /// Explicit visibility of the five line positions, top first.
    Visible([bool; 5]),
}

/// Map a requested line count to a stave configuration.
///
/// One to three lines are centred on the middle line; the backend's line
/// count would show the outer lines instead.
pub fn staff_line_visibility(lines: u32) -> StaffLines {
    match lines {
        5 => StaffLines::Default,
        1 => StaffLines::Visible([false, false, true, false, false]),
        2 => StaffLines::Visible([false, false, true, true, false]),
        3 => StaffLines::Visible([false, true, true, true, false]),
        n => StaffLines::Count(n),
    }
}

// ═══════════════════════════════════════════════════════════════════════
// Stave construction
// ═══════════════════════════════════════════════════════════════════════

/// Approximate horizontal room a stream needs, before padding.
pub fn estimate_staff_length(
    stream: &Stream,
    attrs: &StaffAttributes,
    options: &RenderOptions,
    config: &LayoutConfig,
) -> f64 {
    if stream.has_voices() {
        return stream
            .sub_streams()
            .map(|v| {
                let attrs = attrs.updated_by(v);
                estimate_staff_length(v, &attrs, options, config) + v.render_options.staff_padding
            })
            .fold(0.0, f64::max);
    }

    if stream.has_sub_streams() {
        let mut total = 0.0;
        let mut running = attrs.clone();
        for (i, child) in stream.sub_streams().enumerate() {
            if i > 0 && child.render_options.start_new_system {
                break;
            }
            running = running.updated_by(child);
            total += estimate_staff_length(child, &running, &child.render_options, config);
        }
        return total;
    }

    let mut length = config.note_width_estimate * stream.notes().count() as f64;
    if options.display_clef {
        length += config.signature_width_estimate;
    }
    if let (true, Some(key)) = (options.display_key_signature, &attrs.key) {
        length += config.key_accidental_width * key.fifths.unsigned_abs() as f64;
    }
    if options.display_time_signature && attrs.time.is_some() {
        length += config.signature_width_estimate;
    }
    length
}

/// Create a stave for `stream`, sized from its content unless the options
/// give an explicit width.
pub(super) fn new_stave<B: NotationBackend>(
    backend: &mut B,
    stream: &Stream,
    attrs: &StaffAttributes,
    options: &RenderOptions,
    config: &LayoutConfig,
) -> StaveId {
    let width = options.width.unwrap_or_else(|| {
        estimate_staff_length(stream, attrs, options, config) + options.staff_padding
    });
    let top = options.top.unwrap_or(config.default_top);
    let left = options.left.unwrap_or(config.default_left);
    log::debug!("creating new stave: left {left}, top {top}, width {width}");
    backend.new_stave(left, top, width)
}

/// Apply staff lines, measure number, clef, key, time and right barline.
pub(super) fn set_clef_etc<B: NotationBackend>(
    backend: &mut B,
    stave: StaveId,
    options: &RenderOptions,
    attrs: &StaffAttributes,
) -> BackendResult<()> {
    match staff_line_visibility(options.staff_lines) {
        StaffLines::Default => {}
        StaffLines::Count(n) => backend.set_num_lines(stave, n)?,
        StaffLines::Visible(lines) => backend.set_line_config(stave, &lines)?,
    }

    if options.show_measure_number {
        backend.set_measure_number(stave, options.measure_index + 1)?;
    }

    if options.display_clef {
        let ottava = match attrs.clef.octave_shift() {
            1 => Some("8va"),
            -1 => Some("8vb"),
            _ => None,
        };
        backend.add_clef(stave, attrs.clef.name(), ottava)?;
    }

    if let (true, Some(key)) = (options.display_key_signature, &attrs.key) {
        backend.add_key_signature(stave, &key.backend_name())?;
    }

    if let (true, Some(time)) = (options.display_time_signature, attrs.time) {
        backend.add_time_signature(stave, &time.to_string())?;
    }

    // unknown barline names are ignored
    if let Some(barline) = options.right_barline.as_deref().and_then(BarlineType::from_name) {
        backend.set_end_barline(stave, barline)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quarter() -> GeneralNote {
        GeneralNote::note(Pitch::new(Step::C, 5), Duration::new(DurationType::Quarter))
    }

    #[test]
    fn low_line_counts_keep_the_middle_line() {
        for n in 1..=3 {
            match staff_line_visibility(n) {
                StaffLines::Visible(lines) => {
                    assert!(lines[2], "middle line hidden for {n} lines");
                    assert_eq!(lines.iter().filter(|&&v| v).count(), n as usize);
                }
                other => panic!("{n} lines gave {other:?}"),
            }
        }
        assert_eq!(staff_line_visibility(0), StaffLines::Count(0));
        assert_eq!(staff_line_visibility(5), StaffLines::Default);
        assert_eq!(staff_line_visibility(4), StaffLines::Count(4));
        assert_eq!(staff_line_visibility(6), StaffLines::Count(6));
    }

    #[test]
    fn estimate_counts_notes_and_signatures() {
        let config = LayoutConfig::default();
        let m = Stream::measure(vec![quarter(), quarter(), quarter()]);
        let attrs = StaffAttributes {
            key: Some(Key::new(-3)),
            time: Some(TimeSignature { beats: 3, beat_type: 4 }),
            ..Default::default()
        };
        let options = RenderOptions::default();
        // 3 notes + clef + 3 flats + time
        assert_eq!(estimate_staff_length(&m, &attrs, &options, &config), 90.0 + 30.0 + 30.0 + 30.0);

        let bare = RenderOptions {
            display_clef: false,
            display_key_signature: false,
            display_time_signature: false,
            ..Default::default()
        };
        assert_eq!(estimate_staff_length(&m, &attrs, &bare, &config), 90.0);
    }

    #[test]
    fn estimate_of_a_part_stops_at_the_next_system() {
        let config = LayoutConfig::default();
        let bare = RenderOptions {
            display_clef: false,
            display_key_signature: false,
            display_time_signature: false,
            ..Default::default()
        };
        let m1 = Stream::measure(vec![quarter(), quarter()]).with_render_options(bare.clone());
        let m2 = Stream::measure(vec![quarter()]).with_render_options(bare.clone());
        let m3 = Stream::measure(vec![quarter()])
            .with_render_options(RenderOptions { start_new_system: true, ..bare.clone() });
        let part = Stream::part(vec![m1, m2, m3]);
        let attrs = StaffAttributes::default();
        assert_eq!(estimate_staff_length(&part, &attrs, &bare, &config), 90.0);
    }

    #[test]
    fn attributes_inherit_what_a_stream_does_not_declare() {
        let running = StaffAttributes {
            clef: Clef::bass(),
            key: Some(Key::new(1)),
            time: Some(TimeSignature { beats: 4, beat_type: 4 }),
        };
        let m = Stream::measure(vec![]).with_time_signature(6, 8);
        let updated = running.updated_by(&m);
        assert_eq!(updated.clef, Clef::bass());
        assert_eq!(updated.key, Some(Key::new(1)));
        assert_eq!(updated.time, Some(TimeSignature { beats: 6, beat_type: 8 }));
    }
}
