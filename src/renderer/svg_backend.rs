//! Self-contained [`NotationBackend`] that does its own spacing and draws
//! plain SVG.
//!
//! Tick contexts are placed with the proportional spacing in `beat_map`;
//! glyphs are drawn with simple shapes and Unicode music symbols.

use std::collections::BTreeMap;

use crate::error::BackendError;
use crate::model::{Accidental, DurationType, Key, ScaleFactor, StemDirection};
use super::backend::*;
use super::beat_map::{collect_slots, compute_tick_x_map, staff_step_y};
use super::constants::*;
use super::svg_builder::{empty_svg, SvgBuilder};

// ═══════════════════════════════════════════════════════════════════════
// Backend objects
// ═══════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone)]
struct Stave {
    x: f64,
    y: f64,
    width: f64,
    num_lines: u32,
    line_config: Option<Vec<bool>>,
    measure: Option<usize>,
    clef: Option<(String, Option<String>)>,
    key: Option<Key>,
    time: Option<String>,
    end_barline: Option<BarlineType>,
    glyph_start: Option<f64>,
}

impl Stave {
    fn new(x: f64, y: f64, width: f64) -> Self {
        Self {
            x,
            y,
            width,
            num_lines: 5,
            line_config: None,
            measure: None,
            clef: None,
            key: None,
            time: None,
            end_barline: None,
            glyph_start: None,
        }
    }

    /// Y of staff line `line`, counted from the top line.
    fn line_y(&self, line: f64) -> f64 {
        self.y + (SPACE_ABOVE_STAFF + line) * STAFF_LINE_SPACING
    }

    fn bottom_y(&self) -> f64 {
        self.line_y(self.num_lines.max(1) as f64 - 1.0)
    }

    fn end_x(&self) -> f64 {
        self.x + self.width
    }

    fn key_width(&self) -> f64 {
        self.key.as_ref().map_or(0.0, |k| k.fifths.unsigned_abs() as f64 * KEY_SIG_ACCIDENTAL_SPACE)
    }

    fn natural_glyph_start(&self) -> f64 {
        let mut x = self.x + STAVE_BEGIN_PADDING;
        if self.clef.is_some() {
            x += CLEF_SPACE;
        }
        x += self.key_width();
        if self.time.is_some() {
            x += TIME_SIG_SPACE;
        }
        x
    }

    fn glyph_start(&self) -> f64 {
        self.glyph_start.unwrap_or_else(|| self.natural_glyph_start())
    }

    fn visible_lines(&self) -> Vec<bool> {
        self.line_config
            .clone()
            .unwrap_or_else(|| vec![true; self.num_lines as usize])
    }

    /// Vertical shift of key-signature accidentals relative to the treble
    /// layout, in line spaces.
    fn key_shift(&self) -> Option<f64> {
        match self.clef.as_ref().map(|(name, _)| name.as_str()) {
            None | Some("treble") | Some("french") => Some(0.0),
            Some("bass") | Some("baritone-f") | Some("subbass") => Some(1.0),
            Some("percussion") => None,
            Some(_) => Some(0.5),
        }
    }
}

#[derive(Debug, Clone)]
enum TickableKind {
    Note {
        /// Diatonic number; None for a rest
        diatonic: Option<i32>,
        first_line: i32,
        duration_type: DurationType,
        dots: u8,
        accidental: Option<Accidental>,
        stem: Option<StemDirection>,
    },
    Text {
        text: String,
        family: String,
        size: f64,
        weight: String,
        line: f64,
        justification: Justification,
    },
}

#[derive(Debug, Clone)]
struct Tickable {
    kind: TickableKind,
    ticks: u64,
    stave: StaveId,
    /// Offset from the stave's glyph start, set by the formatter
    x: Option<f64>,
    min_width: f64,
    beam: Option<BeamId>,
    stem_tip: Option<f64>,
    stem_up: Option<bool>,
}

#[derive(Debug, Clone)]
struct Voice {
    time: VoiceTime,
    mode: VoiceMode,
    stave: Option<StaveId>,
    tickables: Vec<TickableId>,
}

#[derive(Debug, Clone, Default)]
struct Formatter {
    contexts: BTreeMap<u64, TickContext>,
}

#[derive(Debug, Clone)]
struct Beam {
    tickables: Vec<TickableId>,
    stem_up: bool,
    tip_y: f64,
    levels: u8,
}

#[derive(Debug, Clone, Copy)]
struct Connector {
    top: StaveId,
    bottom: StaveId,
    kind: ConnectorKind,
}

fn lookup<'a, T>(items: &'a [T], index: usize, kind: &'static str) -> BackendResult<&'a T> {
    items.get(index).ok_or(BackendError::UnknownHandle { kind, index })
}

fn lookup_mut<'a, T>(items: &'a mut [T], index: usize, kind: &'static str) -> BackendResult<&'a mut T> {
    items.get_mut(index).ok_or(BackendError::UnknownHandle { kind, index })
}

// ═══════════════════════════════════════════════════════════════════════
// SvgBackend
// ═══════════════════════════════════════════════════════════════════════

/// Builds everything in memory; call [`SvgBackend::build`] after drawing.
#[derive(Debug, Default)]
pub struct SvgBackend {
    contexts: Vec<ScaleFactor>,
    staves: Vec<Stave>,
    tickables: Vec<Tickable>,
    voices: Vec<Voice>,
    formatters: Vec<Formatter>,
    beams: Vec<Beam>,
    ties: Vec<TieSpec>,
    tuplets: Vec<TupletSpec>,
    connectors: Vec<Connector>,
    svg: SvgBuilder,
}

impl SvgBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// The finished document, sized to fit every stave.
    pub fn build(&self) -> String {
        if self.staves.is_empty() {
            return empty_svg("Nothing to render");
        }
        let scale = self.contexts.first().copied().unwrap_or(ScaleFactor { x: 1.0, y: 1.0 });
        let width = self.staves.iter().map(Stave::end_x).fold(0.0, f64::max) + PAGE_MARGIN;
        let height = self
            .staves
            .iter()
            .map(|s| s.y + (SPACE_ABOVE_STAFF + 4.0 + SPACE_BELOW_STAFF) * STAFF_LINE_SPACING)
            .fold(0.0, f64::max)
            + PAGE_MARGIN;
        self.svg.build(width, height, scale)
    }

    /// Number of SVG elements drawn so far.
    pub fn element_count(&self) -> usize {
        self.svg.len()
    }

    // ── Inspection ──────────────────────────────────────────────────

    pub fn stave_count(&self) -> usize {
        self.staves.len()
    }

    pub fn stave_origin(&self, stave: StaveId) -> Option<(f64, f64)> {
        self.staves.get(stave.0).map(|s| (s.x, s.y))
    }

    pub fn num_lines(&self, stave: StaveId) -> Option<u32> {
        self.staves.get(stave.0).map(|s| s.num_lines)
    }

    pub fn line_config(&self, stave: StaveId) -> Option<&[bool]> {
        self.staves.get(stave.0)?.line_config.as_deref()
    }

    pub fn measure_number(&self, stave: StaveId) -> Option<usize> {
        self.staves.get(stave.0)?.measure
    }

    pub fn clef(&self, stave: StaveId) -> Option<(&str, Option<&str>)> {
        let (name, annotation) = self.staves.get(stave.0)?.clef.as_ref()?;
        Some((name.as_str(), annotation.as_deref()))
    }

    pub fn key_signature(&self, stave: StaveId) -> Option<&Key> {
        self.staves.get(stave.0)?.key.as_ref()
    }

    pub fn time_signature(&self, stave: StaveId) -> Option<&str> {
        self.staves.get(stave.0)?.time.as_deref()
    }

    pub fn end_barline(&self, stave: StaveId) -> Option<BarlineType> {
        self.staves.get(stave.0)?.end_barline
    }

    pub fn voice_tickables(&self, voice: VoiceId) -> Option<&[TickableId]> {
        self.voices.get(voice.0).map(|v| v.tickables.as_slice())
    }

    pub fn voice_stave(&self, voice: VoiceId) -> Option<StaveId> {
        self.voices.get(voice.0)?.stave
    }

    pub fn tickable_stave(&self, tickable: TickableId) -> Option<StaveId> {
        self.tickables.get(tickable.0).map(|t| t.stave)
    }

    /// The text of a text tickable.
    pub fn text(&self, tickable: TickableId) -> Option<&str> {
        match &self.tickables.get(tickable.0)?.kind {
            TickableKind::Text { text, .. } => Some(text),
            TickableKind::Note { .. } => None,
        }
    }

    pub fn beam_tickables(&self, beam: BeamId) -> Option<&[TickableId]> {
        self.beams.get(beam.0).map(|b| b.tickables.as_slice())
    }

    pub fn tie(&self, tie: TieId) -> Option<&TieSpec> {
        self.ties.get(tie.0)
    }

    pub fn tuplet(&self, tuplet: TupletId) -> Option<&TupletSpec> {
        self.tuplets.get(tuplet.0)
    }

    pub fn connector(&self, connector: ConnectorId) -> Option<(StaveId, StaveId, ConnectorKind)> {
        self.connectors.get(connector.0).map(|c| (c.top, c.bottom, c.kind))
    }

    /// Final stem direction of a pitched note.
    pub fn stem_up(&self, tickable: TickableId) -> Option<bool> {
        let t = self.tickables.get(tickable.0)?;
        match t.kind {
            TickableKind::Note { diatonic: Some(_), .. } => Some(self.is_stem_up(t)),
            _ => None,
        }
    }

    // ── Internal geometry ───────────────────────────────────────────

    fn stave(&self, id: StaveId) -> BackendResult<&Stave> {
        lookup(&self.staves, id.0, "stave")
    }

    fn stave_mut(&mut self, id: StaveId) -> BackendResult<&mut Stave> {
        lookup_mut(&mut self.staves, id.0, "stave")
    }

    fn tickable(&self, id: TickableId) -> BackendResult<&Tickable> {
        lookup(&self.tickables, id.0, "tickable")
    }

    fn voice(&self, id: VoiceId) -> BackendResult<&Voice> {
        lookup(&self.voices, id.0, "voice")
    }

    fn check_context(&self, ctx: ContextId) -> BackendResult<()> {
        lookup(&self.contexts, ctx.0, "context").map(|_| ())
    }

    fn tickable_x(&self, t: &Tickable) -> f64 {
        let start = self.staves.get(t.stave.0).map_or(0.0, Stave::glyph_start);
        start + t.x.unwrap_or(0.0)
    }

    /// Centre of the notehead (or of the text anchor).
    fn head_x(&self, t: &Tickable) -> f64 {
        self.tickable_x(t) + NOTEHEAD_RX
    }

    fn note_y(&self, t: &Tickable) -> Option<f64> {
        let TickableKind::Note { diatonic: Some(d), first_line, .. } = t.kind else {
            return None;
        };
        let stave = self.staves.get(t.stave.0)?;
        Some(staff_step_y(stave.line_y(4.0), d, first_line, STAFF_LINE_SPACING))
    }

    fn is_stem_up(&self, t: &Tickable) -> bool {
        if let Some(up) = t.stem_up {
            return up;
        }
        match t.kind {
            TickableKind::Note { stem: Some(dir), .. } => dir == StemDirection::Up,
            TickableKind::Note { diatonic: Some(d), first_line, .. } => d < first_line + 4,
            _ => true,
        }
    }

    fn stem_x(&self, t: &Tickable, up: bool) -> f64 {
        let cx = self.head_x(t);
        if up {
            cx + NOTEHEAD_RX - 0.6
        } else {
            cx - NOTEHEAD_RX + 0.6
        }
    }

    /// Where a tie attaches: beside the notehead, on the side away from the stem.
    fn tie_anchor(&self, t: &Tickable) -> Option<(f64, f64, bool)> {
        let y = self.note_y(t)?;
        Some((self.head_x(t), y, !self.is_stem_up(t)))
    }
}

// ═══════════════════════════════════════════════════════════════════════
// NotationBackend
// ═══════════════════════════════════════════════════════════════════════

impl NotationBackend for SvgBackend {
    fn new_context(&mut self, scale: ScaleFactor) -> ContextId {
        self.contexts.push(scale);
        ContextId(self.contexts.len() - 1)
    }

    // ── Staves ──────────────────────────────────────────────────────

    fn new_stave(&mut self, x: f64, y: f64, width: f64) -> StaveId {
        self.staves.push(Stave::new(x, y, width));
        StaveId(self.staves.len() - 1)
    }

    fn set_num_lines(&mut self, stave: StaveId, lines: u32) -> BackendResult<()> {
        self.stave_mut(stave)?.num_lines = lines;
        Ok(())
    }

    fn set_line_config(&mut self, stave: StaveId, visible: &[bool]) -> BackendResult<()> {
        self.stave_mut(stave)?.line_config = Some(visible.to_vec());
        Ok(())
    }

    fn set_measure_number(&mut self, stave: StaveId, number: usize) -> BackendResult<()> {
        self.stave_mut(stave)?.measure = Some(number);
        Ok(())
    }

    fn add_clef(&mut self, stave: StaveId, clef: &str, annotation: Option<&str>) -> BackendResult<()> {
        self.stave_mut(stave)?.clef = Some((clef.to_string(), annotation.map(str::to_string)));
        Ok(())
    }

    fn add_key_signature(&mut self, stave: StaveId, key: &str) -> BackendResult<()> {
        let key = Key::from_backend_name(key)
            .ok_or_else(|| BackendError::InvalidKey(key.to_string()))?;
        self.stave_mut(stave)?.key = Some(key);
        Ok(())
    }

    fn add_time_signature(&mut self, stave: StaveId, time: &str) -> BackendResult<()> {
        self.stave_mut(stave)?.time = Some(time.to_string());
        Ok(())
    }

    fn set_end_barline(&mut self, stave: StaveId, barline: BarlineType) -> BackendResult<()> {
        self.stave_mut(stave)?.end_barline = Some(barline);
        Ok(())
    }

    fn glyph_start_x(&self, stave: StaveId) -> BackendResult<f64> {
        Ok(self.stave(stave)?.glyph_start())
    }

    fn set_glyph_start_x(&mut self, stave: StaveId, x: f64) -> BackendResult<()> {
        self.stave_mut(stave)?.glyph_start = Some(x);
        Ok(())
    }

    fn stave_width(&self, stave: StaveId) -> BackendResult<f64> {
        Ok(self.stave(stave)?.width)
    }

    fn bottom_y(&self, stave: StaveId) -> BackendResult<f64> {
        Ok(self.stave(stave)?.bottom_y())
    }

    fn line_spacing(&self, stave: StaveId) -> BackendResult<f64> {
        self.stave(stave)?;
        Ok(STAFF_LINE_SPACING)
    }

    // ── Tickables ───────────────────────────────────────────────────

    fn note_tickable(&mut self, spec: &NoteSpec<'_>, stave: StaveId) -> BackendResult<TickableId> {
        self.stave(stave)?;
        let ticks = spec.duration.ticks() as u64;
        if ticks == 0 {
            return Err(BackendError::InvalidDuration(spec.duration.backend_code()));
        }
        if let Some(pitch) = spec.pitch {
            if !(-1..=9).contains(&pitch.octave) || pitch.alter.abs() > 2.0 {
                return Err(BackendError::InvalidPitch(pitch.backend_key()));
            }
        }

        let mut min_width = NOTE_MIN_WIDTH + spec.duration.dots as f64 * DOT_WIDTH;
        if spec.accidental.is_some() {
            min_width += ACCIDENTAL_WIDTH;
        }
        self.tickables.push(Tickable {
            kind: TickableKind::Note {
                diatonic: spec.pitch.map(|p| p.diatonic_note_num()),
                first_line: spec.clef.first_line(),
                duration_type: spec.duration.duration_type,
                dots: spec.duration.dots,
                accidental: spec.accidental,
                stem: spec.stem,
            },
            ticks,
            stave,
            x: None,
            min_width,
            beam: None,
            stem_tip: None,
            stem_up: None,
        });
        Ok(TickableId(self.tickables.len() - 1))
    }

    fn text_tickable(&mut self, spec: &TextSpec, stave: StaveId) -> BackendResult<TickableId> {
        self.stave(stave)?;
        let ticks = spec.duration.ticks() as u64;
        if ticks == 0 {
            return Err(BackendError::InvalidDuration(spec.duration.backend_code()));
        }
        let min_width = spec.text.chars().count() as f64 * spec.font.size * TEXT_CHAR_WIDTH;
        self.tickables.push(Tickable {
            kind: TickableKind::Text {
                text: spec.text.clone(),
                family: spec.font.family.clone(),
                size: spec.font.size,
                weight: spec.font.weight.clone(),
                line: spec.line,
                justification: spec.justification,
            },
            ticks,
            stave,
            x: None,
            min_width,
            beam: None,
            stem_tip: None,
            stem_up: None,
        });
        Ok(TickableId(self.tickables.len() - 1))
    }

    fn ticks(&self, tickable: TickableId) -> BackendResult<u64> {
        Ok(self.tickable(tickable)?.ticks)
    }

    fn absolute_x(&self, tickable: TickableId) -> BackendResult<f64> {
        Ok(self.tickable_x(self.tickable(tickable)?))
    }

    // ── Voices and formatting ───────────────────────────────────────

    fn new_voice(&mut self, time: VoiceTime, mode: VoiceMode) -> VoiceId {
        self.voices.push(Voice { time, mode, stave: None, tickables: Vec::new() });
        VoiceId(self.voices.len() - 1)
    }

    fn set_voice_stave(&mut self, voice: VoiceId, stave: StaveId) -> BackendResult<()> {
        self.stave(stave)?;
        lookup_mut(&mut self.voices, voice.0, "voice")?.stave = Some(stave);
        Ok(())
    }

    fn add_tickables(&mut self, voice: VoiceId, tickables: &[TickableId]) -> BackendResult<()> {
        let mut added = 0u64;
        for &t in tickables {
            added += self.tickable(t)?.ticks;
        }
        let v = self.voice(voice)?;
        if v.mode != VoiceMode::Soft {
            let mut used = 0u64;
            for &t in &v.tickables {
                used += self.tickable(t)?.ticks;
            }
            let capacity = v.time.ticks();
            if used + added > capacity {
                return Err(BackendError::VoiceOverflow { ticks: used + added, capacity });
            }
        }
        lookup_mut(&mut self.voices, voice.0, "voice")?.tickables.extend_from_slice(tickables);
        Ok(())
    }

    fn new_formatter(&mut self) -> FormatterId {
        self.formatters.push(Formatter::default());
        FormatterId(self.formatters.len() - 1)
    }

    fn format_to_stave(&mut self, formatter: FormatterId, voices: &[VoiceId], stave: StaveId) -> BackendResult<()> {
        lookup(&self.formatters, formatter.0, "formatter")?;
        let st = self.stave(stave)?;
        let start = st.glyph_start();
        let usable = (st.end_x() - STAVE_END_PADDING - start).max(0.0);

        let mut starts: Vec<Vec<(u64, f64)>> = Vec::with_capacity(voices.len());
        let mut placements: Vec<(TickableId, u64)> = Vec::new();
        let mut end_tick = 0u64;
        for &v in voices {
            let mut tick = 0u64;
            let mut voice_starts = Vec::new();
            for &t in &self.voice(v)?.tickables {
                let tickable = self.tickable(t)?;
                voice_starts.push((tick, tickable.min_width));
                placements.push((t, tick));
                tick += tickable.ticks;
            }
            end_tick = end_tick.max(tick);
            starts.push(voice_starts);
        }

        let slots = collect_slots(&starts);
        let xs = compute_tick_x_map(&slots, end_tick, usable);
        let mut contexts = BTreeMap::new();
        for (slot, &(tick, x)) in slots.iter().zip(&xs) {
            contexts.insert(tick, TickContext { x, width: slot.min_width });
        }

        for (t, tick) in placements {
            let x = contexts.get(&tick).map(|c| c.x);
            lookup_mut(&mut self.tickables, t.0, "tickable")?.x = x;
        }
        log::debug!("formatted {} voices into {} tick contexts", voices.len(), contexts.len());
        lookup_mut(&mut self.formatters, formatter.0, "formatter")?.contexts = contexts;
        Ok(())
    }

    fn tick_context(&self, formatter: FormatterId, tick: u64) -> Option<TickContext> {
        self.formatters.get(formatter.0)?.contexts.get(&tick).copied()
    }

    // ── Spanners ────────────────────────────────────────────────────

    fn auto_beam(&mut self, voice: VoiceId, groups: &[BeatGroup]) -> BackendResult<Vec<BeamId>> {
        if groups.is_empty() || groups.iter().any(|g| g.ticks() == 0) {
            return Ok(Vec::new());
        }
        let ids = self.voice(voice)?.tickables.clone();

        let mut runs: Vec<Vec<TickableId>> = Vec::new();
        let mut current: Vec<TickableId> = Vec::new();
        let flush = |current: &mut Vec<TickableId>, runs: &mut Vec<Vec<TickableId>>| {
            if current.len() >= 2 {
                runs.push(std::mem::take(current));
            } else {
                current.clear();
            }
        };

        let mut group = 0usize;
        let mut group_end = groups[0].ticks();
        let mut tick = 0u64;
        for id in ids {
            let t = self.tickable(id)?;
            while tick >= group_end {
                flush(&mut current, &mut runs);
                group = (group + 1) % groups.len();
                group_end += groups[group].ticks();
            }
            let beamable = matches!(
                t.kind,
                TickableKind::Note { diatonic: Some(_), duration_type, .. } if duration_type.flags() > 0
            );
            if beamable {
                current.push(id);
            } else {
                flush(&mut current, &mut runs);
            }
            tick += t.ticks;
        }
        flush(&mut current, &mut runs);

        let mut beams = Vec::with_capacity(runs.len());
        for run in runs {
            let mut diatonic_sum = 0i32;
            let mut middle_sum = 0i32;
            let mut ys = Vec::with_capacity(run.len());
            let mut levels = u8::MAX;
            for &id in &run {
                let t = self.tickable(id)?;
                if let TickableKind::Note { diatonic: Some(d), first_line, duration_type, .. } = t.kind {
                    diatonic_sum += d;
                    middle_sum += first_line + 4;
                    levels = levels.min(duration_type.flags());
                }
                ys.extend(self.note_y(t));
            }
            let stem_up = diatonic_sum < middle_sum;
            let tip_y = if stem_up {
                ys.iter().copied().fold(f64::INFINITY, f64::min) - STEM_LENGTH
            } else {
                ys.iter().copied().fold(f64::NEG_INFINITY, f64::max) + STEM_LENGTH
            };

            let beam = BeamId(self.beams.len());
            for &id in &run {
                let t = lookup_mut(&mut self.tickables, id.0, "tickable")?;
                t.beam = Some(beam);
                t.stem_up = Some(stem_up);
                t.stem_tip = Some(tip_y);
            }
            self.beams.push(Beam { tickables: run, stem_up, tip_y, levels });
            beams.push(beam);
        }
        Ok(beams)
    }

    fn new_tie(&mut self, spec: TieSpec) -> BackendResult<TieId> {
        for t in spec.first_note.iter().chain(&spec.last_note) {
            self.tickable(*t)?;
        }
        self.ties.push(spec);
        Ok(TieId(self.ties.len() - 1))
    }

    fn new_tuplet(&mut self, spec: TupletSpec) -> BackendResult<TupletId> {
        for t in &spec.tickables {
            self.tickable(*t)?;
        }
        self.tuplets.push(spec);
        Ok(TupletId(self.tuplets.len() - 1))
    }

    fn new_connector(&mut self, top: StaveId, bottom: StaveId, kind: ConnectorKind) -> BackendResult<ConnectorId> {
        self.stave(top)?;
        self.stave(bottom)?;
        self.connectors.push(Connector { top, bottom, kind });
        Ok(ConnectorId(self.connectors.len() - 1))
    }

    // ── Drawing ─────────────────────────────────────────────────────

    fn draw_stave(&mut self, ctx: ContextId, stave: StaveId) -> BackendResult<()> {
        self.check_context(ctx)?;
        let st = self.stave(stave)?.clone();
        render_stave(&mut self.svg, &st);
        Ok(())
    }

    fn draw_voice(&mut self, ctx: ContextId, voice: VoiceId, stave: StaveId) -> BackendResult<()> {
        self.check_context(ctx)?;
        let st = self.stave(stave)?.clone();
        let ids = self.voice(voice)?.tickables.clone();
        for id in ids {
            let t = self.tickable(id)?.clone();
            self.render_tickable(&st, &t);
        }
        Ok(())
    }

    fn draw_beam(&mut self, ctx: ContextId, beam: BeamId) -> BackendResult<()> {
        self.check_context(ctx)?;
        let b = lookup(&self.beams, beam.0, "beam")?.clone();
        let (Some(&first), Some(&last)) = (b.tickables.first(), b.tickables.last()) else {
            return Ok(());
        };
        let x1 = self.stem_x(self.tickable(first)?, b.stem_up);
        let x2 = self.stem_x(self.tickable(last)?, b.stem_up);
        let step = if b.stem_up { BEAM_SPACING } else { -BEAM_SPACING };
        for level in 0..b.levels {
            let y = b.tip_y + level as f64 * step;
            self.svg.beam_line(x1, y, x2, y, BEAM_THICKNESS);
        }
        Ok(())
    }

    fn draw_tie(&mut self, ctx: ContextId, tie: TieId) -> BackendResult<()> {
        self.check_context(ctx)?;
        let spec = lookup(&self.ties, tie.0, "tie")?.clone();
        let first = spec.first_note.map(|t| self.tickable(t)).transpose()?;
        let last = spec.last_note.map(|t| self.tickable(t)).transpose()?;

        let (start, end) = match (first, last) {
            (Some(a), Some(b)) => match (self.tie_anchor(a), self.tie_anchor(b)) {
                (Some(s), Some((ex, ey, _))) => (s, (ex, ey)),
                _ => return Ok(()),
            },
            (Some(a), None) => match self.tie_anchor(a) {
                Some(s) => {
                    let end_x = self.stave(a.stave)?.end_x();
                    (s, (end_x, s.1))
                }
                None => return Ok(()),
            },
            (None, Some(b)) => match self.tie_anchor(b) {
                Some((ex, ey, above)) => {
                    let start_x = self.stave(b.stave)?.glyph_start() - HALF_TIE_LEAD;
                    ((start_x, ey, above), (ex, ey))
                }
                None => return Ok(()),
            },
            (None, None) => return Ok(()),
        };
        render_tie(&mut self.svg, start, end);
        Ok(())
    }

    fn draw_tuplet(&mut self, ctx: ContextId, tuplet: TupletId) -> BackendResult<()> {
        self.check_context(ctx)?;
        let spec = lookup(&self.tuplets, tuplet.0, "tuplet")?.clone();
        let (Some(&first), Some(&last)) = (spec.tickables.first(), spec.tickables.last()) else {
            return Ok(());
        };
        let first = self.tickable(first)?;
        let last = self.tickable(last)?;
        let x1 = self.head_x(first) - NOTEHEAD_RX;
        let x2 = self.head_x(last) + NOTEHEAD_RX;
        let y = self.stave(first.stave)?.line_y(0.0) - TUPLET_BRACKET_OFFSET;
        let label = if spec.ratioed {
            format!("{}:{}", spec.num_notes, spec.beats_occupied)
        } else {
            spec.num_notes.to_string()
        };

        let mid = (x1 + x2) / 2.0;
        let gap = 6.0 + label.len() as f64 * 3.0;
        let path = format!(
            "M{:.1},{:.1} L{:.1},{:.1} L{:.1},{:.1} M{:.1},{:.1} L{:.1},{:.1} L{:.1},{:.1}",
            x1, y + 5.0, x1, y, mid - gap, y,
            mid + gap, y, x2, y, x2, y + 5.0,
        );
        self.svg.path(&path, "none", NOTE_COLOR, 1.0);
        self.svg.text(mid, y + 4.0, &label, 11.0, "bold", NOTE_COLOR, "middle");
        Ok(())
    }

    fn draw_connector(&mut self, ctx: ContextId, connector: ConnectorId) -> BackendResult<()> {
        self.check_context(ctx)?;
        let c = *lookup(&self.connectors, connector.0, "connector")?;
        let top = self.stave(c.top)?;
        let bottom = self.stave(c.bottom)?;
        let (x, top_y, bottom_y) = (top.x, top.line_y(0.0), bottom.bottom_y());
        match c.kind {
            ConnectorKind::Single => {
                self.svg.line(x, top_y, x, bottom_y, BARLINE_COLOR, BARLINE_WIDTH);
            }
            ConnectorKind::Double => {
                self.svg.line(x - 3.0, top_y, x - 3.0, bottom_y, BARLINE_COLOR, BARLINE_WIDTH);
                self.svg.line(x, top_y, x, bottom_y, BARLINE_COLOR, BARLINE_WIDTH);
            }
            ConnectorKind::Brace => render_brace(&mut self.svg, x - 4.0, top_y, bottom_y),
            ConnectorKind::Bracket => {
                let bx = x - 8.0;
                self.svg.rect(bx, top_y, 3.0, bottom_y - top_y, NOTE_COLOR);
                self.svg.line(bx, top_y, x, top_y - 4.0, NOTE_COLOR, 1.5);
                self.svg.line(bx, bottom_y, x, bottom_y + 4.0, NOTE_COLOR, 1.5);
            }
        }
        Ok(())
    }
}

// ═══════════════════════════════════════════════════════════════════════
// Glyph rendering
// ═══════════════════════════════════════════════════════════════════════

impl SvgBackend {
    fn render_tickable(&mut self, st: &Stave, t: &Tickable) {
        let x = self.tickable_x(t);
        match &t.kind {
            TickableKind::Text { text, family, size, weight, line, justification } => {
                let anchor = match justification {
                    Justification::Left => "start",
                    Justification::Center => "middle",
                    Justification::Right => "end",
                };
                self.svg.styled_text(x, st.line_y(*line), text, family, *size, weight, anchor);
            }
            TickableKind::Note { diatonic: None, duration_type, .. } => {
                render_rest(&mut self.svg, st, x + NOTEHEAD_RX, *duration_type);
            }
            TickableKind::Note { diatonic: Some(d), first_line, duration_type, dots, accidental, .. } => {
                let cx = x + NOTEHEAD_RX;
                let y = staff_step_y(st.line_y(4.0), *d, *first_line, STAFF_LINE_SPACING);
                render_ledger_lines(&mut self.svg, st, cx, *d, *first_line);

                let filled = !matches!(duration_type, DurationType::Breve | DurationType::Whole | DurationType::Half);
                self.svg.notehead(cx, y, filled);
                if let Some(acc) = accidental {
                    self.svg.text(cx - NOTEHEAD_RX - 3.0, y + 4.0, accidental_glyph(*acc), 14.0, "normal", NOTE_COLOR, "end");
                }
                for i in 0..*dots {
                    let dot_y = if (d - first_line) % 2 == 0 { y - STAFF_LINE_SPACING / 2.0 } else { y };
                    self.svg.circle(cx + NOTEHEAD_RX + 4.0 + i as f64 * DOT_WIDTH, dot_y, 1.5, NOTE_COLOR);
                }

                if matches!(duration_type, DurationType::Breve | DurationType::Whole) {
                    return;
                }
                let up = self.is_stem_up(t);
                let sx = self.stem_x(t, up);
                let tip = t.stem_tip.unwrap_or(if up { y - STEM_LENGTH } else { y + STEM_LENGTH });
                self.svg.line(sx, y, sx, tip, NOTE_COLOR, STEM_WIDTH);
                if t.beam.is_none() {
                    render_flags(&mut self.svg, sx, tip, up, duration_type.flags());
                }
            }
        }
    }
}

fn render_stave(svg: &mut SvgBuilder, st: &Stave) {
    for (i, visible) in st.visible_lines().into_iter().enumerate() {
        if visible {
            let y = st.line_y(i as f64);
            svg.line(st.x, y, st.end_x(), y, STAFF_COLOR, STAFF_LINE_WIDTH);
        }
    }

    if st.num_lines > 0 {
        let (top, bottom) = (st.line_y(0.0), st.bottom_y());
        svg.line(st.x, top, st.x, bottom, BARLINE_COLOR, BARLINE_WIDTH);
        let end = st.end_x();
        match st.end_barline.unwrap_or(BarlineType::Single) {
            BarlineType::Single => svg.line(end, top, end, bottom, BARLINE_COLOR, BARLINE_WIDTH),
            BarlineType::Double => {
                svg.line(end - 3.0, top, end - 3.0, bottom, BARLINE_COLOR, BARLINE_WIDTH);
                svg.line(end, top, end, bottom, BARLINE_COLOR, BARLINE_WIDTH);
            }
            BarlineType::End => {
                svg.line(end - 6.0, top, end - 6.0, bottom, BARLINE_COLOR, BARLINE_WIDTH);
                svg.rect(end - 3.0, top, 3.0, bottom - top, BARLINE_COLOR);
            }
        }
    }

    if let Some(number) = st.measure {
        svg.text(st.x, st.line_y(0.0) - 8.0, &number.to_string(), 9.0, "normal", TEXT_COLOR, "start");
    }

    let mut cursor = st.x + STAVE_BEGIN_PADDING;
    if let Some((name, annotation)) = &st.clef {
        render_clef(svg, st, cursor, name, annotation.as_deref());
        cursor += CLEF_SPACE;
    }
    if let (Some(key), Some(shift)) = (&st.key, st.key_shift()) {
        render_key_signature(svg, st, cursor, key.fifths, shift);
    }
    cursor += st.key_width();
    if let Some(time) = &st.time {
        let cx = cursor + TIME_SIG_SPACE / 2.0;
        let (num, den) = time.split_once('/').unwrap_or((time.as_str(), ""));
        svg.text(cx, st.line_y(2.0) - 2.0, num, 20.0, "bold", NOTE_COLOR, "middle");
        svg.text(cx, st.line_y(4.0) - 2.0, den, 20.0, "bold", NOTE_COLOR, "middle");
    }
}

fn render_clef(svg: &mut SvgBuilder, st: &Stave, x: f64, name: &str, annotation: Option<&str>) {
    match name {
        "treble" | "french" => svg.text(x, st.line_y(4.0) + 8.0, "\u{1D11E}", 38.0, "normal", NOTE_COLOR, "start"),
        "bass" | "baritone-f" | "subbass" => {
            svg.text(x, st.line_y(2.0) + 2.0, "\u{1D122}", 34.0, "normal", NOTE_COLOR, "start")
        }
        "percussion" => {
            svg.rect(x + 6.0, st.line_y(1.0), 3.0, STAFF_LINE_SPACING * 2.0, NOTE_COLOR);
            svg.rect(x + 12.0, st.line_y(1.0), 3.0, STAFF_LINE_SPACING * 2.0, NOTE_COLOR);
        }
        _ => svg.text(x, st.line_y(4.0), "\u{1D121}", 34.0, "normal", NOTE_COLOR, "start"),
    }
    match annotation {
        Some("8va") => svg.text(x + 8.0, st.line_y(0.0) - 12.0, "8", 10.0, "normal", NOTE_COLOR, "middle"),
        Some("8vb") => svg.text(x + 8.0, st.line_y(4.0) + 22.0, "8", 10.0, "normal", NOTE_COLOR, "middle"),
        _ => {}
    }
}

/// Sharps and flats in signature order, placed for a treble stave and
/// shifted down by `shift` line spaces for other clefs.
fn render_key_signature(svg: &mut SvgBuilder, st: &Stave, x: f64, fifths: i32, shift: f64) {
    // Line positions counted down from the top line: F5 C5 G5 D5 A4 E5 B4
    const SHARP_LINES: [f64; 7] = [0.0, 1.5, -0.5, 1.0, 2.5, 0.5, 2.0];
    // B4 E5 A4 D5 G4 C5 F4
    const FLAT_LINES: [f64; 7] = [2.0, 0.5, 2.5, 1.0, 3.0, 1.5, 3.5];

    let (lines, glyph) = if fifths >= 0 { (&SHARP_LINES, "\u{266F}") } else { (&FLAT_LINES, "\u{266D}") };
    let count = fifths.unsigned_abs().min(7) as usize;
    for (i, line) in lines.iter().take(count).enumerate() {
        let y = st.line_y(line + shift) + 4.0;
        svg.text(x + i as f64 * KEY_SIG_ACCIDENTAL_SPACE, y, glyph, 14.0, "normal", NOTE_COLOR, "start");
    }
}

fn render_ledger_lines(svg: &mut SvgBuilder, st: &Stave, cx: f64, diatonic: i32, first_line: i32) {
    let (x1, x2) = (cx - NOTEHEAD_RX - LEDGER_LINE_EXTEND, cx + NOTEHEAD_RX + LEDGER_LINE_EXTEND);
    let bottom = st.line_y(4.0);
    let mut step = first_line - 2;
    while step >= diatonic {
        let y = staff_step_y(bottom, step, first_line, STAFF_LINE_SPACING);
        svg.line(x1, y, x2, y, STAFF_COLOR, LEDGER_LINE_WIDTH);
        step -= 2;
    }
    let mut step = first_line + 10;
    while step <= diatonic {
        let y = staff_step_y(bottom, step, first_line, STAFF_LINE_SPACING);
        svg.line(x1, y, x2, y, STAFF_COLOR, LEDGER_LINE_WIDTH);
        step += 2;
    }
}

fn render_rest(svg: &mut SvgBuilder, st: &Stave, cx: f64, duration_type: DurationType) {
    match duration_type {
        DurationType::Breve => svg.rect(cx - 3.0, st.line_y(1.0), 6.0, STAFF_LINE_SPACING, NOTE_COLOR),
        DurationType::Whole => svg.rect(cx - 5.0, st.line_y(1.0), 10.0, 5.0, NOTE_COLOR),
        DurationType::Half => svg.rect(cx - 5.0, st.line_y(2.0) - 5.0, 10.0, 5.0, NOTE_COLOR),
        other => {
            let glyph = match other {
                DurationType::Quarter => "\u{1D13D}",
                DurationType::Eighth => "\u{1D13E}",
                DurationType::Sixteenth => "\u{1D13F}",
                DurationType::ThirtySecond => "\u{1D140}",
                DurationType::SixtyFourth => "\u{1D141}",
                _ => "\u{1D142}",
            };
            svg.text(cx, st.line_y(2.5), glyph, 30.0, "normal", NOTE_COLOR, "middle");
        }
    }
}

fn render_flags(svg: &mut SvgBuilder, stem_x: f64, tip: f64, up: bool, flags: u8) {
    let dir = if up { 1.0 } else { -1.0 };
    for i in 0..flags {
        let y = tip + dir * i as f64 * 7.0;
        let path = format!(
            "M{:.1},{:.1} C{:.1},{:.1} {:.1},{:.1} {:.1},{:.1}",
            stem_x, y,
            stem_x + 2.0, y + dir * 8.0,
            stem_x + 10.0, y + dir * 10.0,
            stem_x + 8.0, y + dir * 20.0,
        );
        svg.path(&path, "none", NOTE_COLOR, 1.5);
    }
}

/// A filled tie arc from `start` to `end`, curving above when `start.2`.
fn render_tie(svg: &mut SvgBuilder, start: (f64, f64, bool), end: (f64, f64)) {
    let (sx, sy, above) = start;
    let y_dir = if above { -1.0 } else { 1.0 };

    let sy = sy + y_dir * TIE_NOTEHEAD_Y_OFFSET;
    let (ex, ey) = (end.0, end.1 + y_dir * TIE_NOTEHEAD_Y_OFFSET);

    let dx = (ex - sx).abs().max(1.0);
    let height = (dx * TIE_HEIGHT_FACTOR).clamp(TIE_MIN_HEIGHT, TIE_MAX_HEIGHT);
    let mid_y = (sy + ey) / 2.0;

    let cp1x = sx + dx * 0.25;
    let cp1y = mid_y + y_dir * height;
    let cp2x = sx + dx * 0.75;
    let cp2y = mid_y + y_dir * height;

    let ep_off = TIE_ENDPOINT_THICKNESS * y_dir;
    let cp_off = TIE_MID_THICKNESS * y_dir;

    let path = format!(
        "M{:.1},{:.1} C{:.1},{:.1} {:.1},{:.1} {:.1},{:.1} L{:.1},{:.1} C{:.1},{:.1} {:.1},{:.1} {:.1},{:.1} Z",
        sx, sy,
        cp1x, cp1y,
        cp2x, cp2y,
        ex, ey,
        ex, ey + ep_off,
        cp2x, cp2y + cp_off,
        cp1x, cp1y + cp_off,
        sx, sy + ep_off,
    );
    svg.path(&path, NOTE_COLOR, "none", 0.0);
}

fn render_brace(svg: &mut SvgBuilder, x: f64, top_y: f64, bottom_y: f64) {
    let mid_y = (top_y + bottom_y) / 2.0;
    let h = bottom_y - top_y;
    let w = BRACE_WIDTH;

    // Two mirrored C-curves meeting at the tip
    let path = format!(
        "M{:.1},{:.1} C{:.1},{:.1} {:.1},{:.1} {:.1},{:.1} \
         C{:.1},{:.1} {:.1},{:.1} {:.1},{:.1}",
        x, top_y,
        x, top_y + h * 0.28,
        x - w, mid_y - h * 0.08,
        x - w, mid_y,
        x - w, mid_y + h * 0.08,
        x, bottom_y - h * 0.28,
        x, bottom_y,
    );
    svg.path(&path, "none", NOTE_COLOR, 2.5);
}

fn accidental_glyph(acc: Accidental) -> &'static str {
    match acc {
        Accidental::DoubleFlat => "\u{1D12B}",
        Accidental::Flat => "\u{266D}",
        Accidental::Natural => "\u{266E}",
        Accidental::Sharp => "\u{266F}",
        Accidental::DoubleSharp => "\u{1D12A}",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FontSpec;
    use crate::model::{Clef, Duration, Pitch};

    fn quarter(backend: &mut SvgBackend, stave: StaveId, pitch: &str) -> TickableId {
        let pitch: Pitch = pitch.parse().unwrap();
        let clef = Clef::treble();
        let duration = Duration::new(DurationType::Quarter);
        let spec = NoteSpec { pitch: Some(&pitch), clef: &clef, duration: &duration, accidental: None, stem: None };
        backend.note_tickable(&spec, stave).unwrap()
    }

    fn eighth(backend: &mut SvgBackend, stave: StaveId, pitch: &str) -> TickableId {
        let pitch: Pitch = pitch.parse().unwrap();
        let clef = Clef::treble();
        let duration = Duration::new(DurationType::Eighth);
        let spec = NoteSpec { pitch: Some(&pitch), clef: &clef, duration: &duration, accidental: None, stem: None };
        backend.note_tickable(&spec, stave).unwrap()
    }

    #[test]
    fn glyph_start_accounts_for_signatures() {
        let mut b = SvgBackend::new();
        let s = b.new_stave(0.0, 0.0, 300.0);
        assert_eq!(b.glyph_start_x(s).unwrap(), STAVE_BEGIN_PADDING);
        b.add_clef(s, "treble", None).unwrap();
        b.add_key_signature(s, "D").unwrap();
        b.add_time_signature(s, "4/4").unwrap();
        let expected = STAVE_BEGIN_PADDING + CLEF_SPACE + 2.0 * KEY_SIG_ACCIDENTAL_SPACE + TIME_SIG_SPACE;
        assert_eq!(b.glyph_start_x(s).unwrap(), expected);
        b.set_glyph_start_x(s, 100.0).unwrap();
        assert_eq!(b.glyph_start_x(s).unwrap(), 100.0);
    }

    #[test]
    fn out_of_range_pitch_is_rejected() {
        let mut b = SvgBackend::new();
        let s = b.new_stave(0.0, 0.0, 300.0);
        let pitch: Pitch = "C12".parse().unwrap();
        let clef = Clef::treble();
        let duration = Duration::new(DurationType::Quarter);
        let spec = NoteSpec { pitch: Some(&pitch), clef: &clef, duration: &duration, accidental: None, stem: None };
        assert!(matches!(b.note_tickable(&spec, s), Err(BackendError::InvalidPitch(_))));
        assert!(matches!(
            b.note_tickable(&spec, StaveId(7)),
            Err(BackendError::UnknownHandle { kind: "stave", index: 7 })
        ));
    }

    #[test]
    fn full_voice_rejects_overflow() {
        let mut b = SvgBackend::new();
        let s = b.new_stave(0.0, 0.0, 300.0);
        let notes: Vec<TickableId> = (0..3).map(|_| quarter(&mut b, s, "C4")).collect();
        let v = b.new_voice(VoiceTime { num_beats: 2, beat_value: 4 }, VoiceMode::Full);
        assert!(matches!(b.add_tickables(v, &notes), Err(BackendError::VoiceOverflow { .. })));
        let soft = b.new_voice(VoiceTime { num_beats: 2, beat_value: 4 }, VoiceMode::Soft);
        assert!(b.add_tickables(soft, &notes).is_ok());
    }

    #[test]
    fn voices_align_at_shared_ticks() {
        let mut b = SvgBackend::new();
        let top = b.new_stave(0.0, 0.0, 400.0);
        let bottom = b.new_stave(0.0, 100.0, 400.0);
        let upper: Vec<TickableId> = (0..2).map(|_| quarter(&mut b, top, "E5")).collect();
        let lower: Vec<TickableId> = (0..4).map(|_| eighth(&mut b, bottom, "C4")).collect();
        let v1 = b.new_voice(VoiceTime { num_beats: 1, beat_value: 2 }, VoiceMode::Soft);
        let v2 = b.new_voice(VoiceTime { num_beats: 1, beat_value: 2 }, VoiceMode::Soft);
        b.add_tickables(v1, &upper).unwrap();
        b.add_tickables(v2, &lower).unwrap();

        let f = b.new_formatter();
        b.format_to_stave(f, &[v1, v2], top).unwrap();
        assert_eq!(b.absolute_x(upper[1]).unwrap(), b.absolute_x(lower[2]).unwrap());
        assert!(b.absolute_x(lower[1]).unwrap() > b.absolute_x(lower[0]).unwrap());
        assert!(b.tick_context(f, 2048).is_some());
        assert!(b.tick_context(f, 1000).is_none());
    }

    #[test]
    fn eighths_are_beamed_per_group() {
        let mut b = SvgBackend::new();
        let s = b.new_stave(0.0, 0.0, 400.0);
        let mut notes: Vec<TickableId> = (0..4).map(|_| eighth(&mut b, s, "G4")).collect();
        notes.push(quarter(&mut b, s, "G4"));
        let v = b.new_voice(VoiceTime { num_beats: 3, beat_value: 4 }, VoiceMode::Soft);
        b.add_tickables(v, &notes).unwrap();

        let beams = b.auto_beam(v, &[BeatGroup::new(2, 8)]).unwrap();
        assert_eq!(beams.len(), 2);
        assert_eq!(b.beam_tickables(beams[0]).unwrap(), &notes[0..2]);
        assert_eq!(b.beam_tickables(beams[1]).unwrap(), &notes[2..4]);
        // G4 sits below the middle line
        assert_eq!(b.stem_up(notes[0]), Some(true));
    }

    #[test]
    fn half_ties_are_accepted_and_drawn() {
        let mut b = SvgBackend::new();
        let ctx = b.new_context(ScaleFactor::default());
        let s = b.new_stave(0.0, 0.0, 400.0);
        let n = quarter(&mut b, s, "A4");
        let tie = b
            .new_tie(TieSpec { first_note: Some(n), last_note: None, first_indices: vec![0], last_indices: vec![0] })
            .unwrap();
        let before = b.element_count();
        b.draw_tie(ctx, tie).unwrap();
        assert_eq!(b.element_count(), before + 1);
        assert!(matches!(b.draw_tie(ContextId(3), tie), Err(BackendError::UnknownHandle { kind: "context", .. })));
    }

    #[test]
    fn text_tickables_need_a_duration() {
        let mut b = SvgBackend::new();
        let s = b.new_stave(0.0, 0.0, 400.0);
        let spec = TextSpec {
            text: "la".into(),
            font: FontSpec::default(),
            duration: Duration::new(DurationType::Quarter),
            line: 11.0,
            justification: Justification::Left,
        };
        let t = b.text_tickable(&spec, s).unwrap();
        assert_eq!(b.text(t), Some("la"));
        assert_eq!(b.ticks(t).unwrap(), 4096);
    }

    #[test]
    fn build_without_staves_is_placeholder() {
        let svg = SvgBackend::new().build();
        assert!(svg.contains("Nothing to render"));
    }
}
