//! Joint formatting of a render stack: shared glyph start, one formatter
//! pass over every voice, then automatic beaming.

use crate::config::LayoutConfig;
use crate::model::TimeSignature;
use super::backend::{BackendResult, BeamId, BeatGroup, FormatterId, NotationBackend};
use super::stack::RenderStack;

pub(super) struct Formatted {
    pub(super) formatter: FormatterId,
    pub(super) beams: Vec<BeamId>,
}

/// Beam groups for a meter.
///
/// Eighth-based and shorter meters group in threes while at least five
/// beats remain; a remainder of four splits 2+2. Meters of five or more
/// quarter (or longer) beats are first counted in eighths. Everything else
/// beams by the beat.
pub fn beat_groups(time: Option<&TimeSignature>, default: BeatGroup) -> Vec<BeatGroup> {
    let Some(time) = time else { return vec![default] };
    if time.beats == 0 || time.beat_type == 0 {
        return vec![default];
    }

    let (mut beats, beat_value) = if time.beat_type >= 8 {
        (time.beats, time.beat_type)
    } else if time.beats >= 5 {
        (time.beats * 8 / time.beat_type, 8)
    } else {
        return vec![BeatGroup::new(1, time.beat_type)];
    };

    let mut groups = Vec::new();
    while beats >= 5 {
        groups.push(BeatGroup::new(3, beat_value));
        beats -= 3;
    }
    match beats {
        0 => {}
        4 => groups.extend([BeatGroup::new(2, beat_value), BeatGroup::new(2, beat_value)]),
        n => groups.push(BeatGroup::new(n, beat_value)),
    }
    groups
}

pub(super) fn format_stack<B: NotationBackend>(
    backend: &mut B,
    stack: &RenderStack<'_>,
    config: &LayoutConfig,
) -> BackendResult<Formatted> {
    let formatter = backend.new_formatter();
    let Some(first) = stack.voices.first() else {
        return Ok(Formatted { formatter, beams: Vec::new() });
    };

    // staves sharing a system start their music at the widest glyph start
    let all = stack.all_tickables();
    let mut max_glyph_start = 0.0f64;
    for &(_, stave) in &all {
        max_glyph_start = max_glyph_start.max(backend.glyph_start_x(stave)?);
    }
    for &(_, stave) in &all {
        backend.set_glyph_start_x(stave, max_glyph_start)?;
    }

    let voices: Vec<_> = all.iter().map(|&(voice, _)| voice).collect();
    backend.format_to_stave(formatter, &voices, first.stave)?;
    log::debug!(
        "formatted {} voices ({} lyric) at glyph start {max_glyph_start}",
        voices.len(),
        stack.text_voices.len()
    );

    let auto_beam = config
        .auto_beam
        .unwrap_or_else(|| stack.streams.first().map_or(false, |s| s.auto_beam));
    let mut beams = Vec::new();
    if auto_beam {
        for track in &stack.voices {
            let groups = beat_groups(track.time_signature.as_ref(), config.default_beat_group);
            beams.extend(backend.auto_beam(track.voice, &groups)?);
        }
    }

    Ok(Formatted { formatter, beams })
}
