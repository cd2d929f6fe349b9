//! Score layout engine — turns a stream hierarchy into staves, aligned voice
//! tracks, beams, ties, tuplets and staff connectors on a
//! [`NotationBackend`], and records where every note landed.
//!
//! A pass runs strictly in order: walk the hierarchy, prepare every measure,
//! format each system, then (for [`Renderer::render`]) draw ties, measures,
//! beams, tuplets and connectors.

pub mod backend;
pub mod svg_backend;

mod annotate;
mod beat_map;
mod constants;
mod duration;
mod format;
mod lyrics;
mod notes;
mod placement;
mod stack;
mod staff;
mod svg_builder;
mod ties;

use std::collections::{HashMap, HashSet};

use crate::accidentals::{AccidentalSpeller, KeyAccidentals};
use crate::config::LayoutConfig;
use crate::diagnostics::{DiagnosticKind, Diagnostics};
use crate::error::{LayoutError, Result};
use crate::model::*;
use backend::*;

pub use annotate::{Annotations, NoteLayout};
pub use duration::voice_time;
pub use format::beat_groups;
pub use notes::TupletGroup;
pub use placement::{place_measures, Placement};
pub use stack::{LyricTrack, RenderStack, Track};
pub use staff::{estimate_staff_length, staff_line_visibility, StaffAttributes, StaffLines};
pub use ties::{crosses_break, TieArc, TieEnd};

/// Every side table is keyed by id, so a note or stream reachable twice
/// would overwrite its own entries.
fn check_unique_ids(root: &Stream) -> Result<()> {
    fn walk(s: &Stream, streams: &mut HashSet<StreamId>, notes: &mut HashSet<NoteId>) -> Result<()> {
        if !streams.insert(s.id) {
            return Err(LayoutError::DuplicateStream(s.id));
        }
        for element in &s.elements {
            match element {
                Element::Note(n) if !notes.insert(n.id) => return Err(LayoutError::DuplicateNote(n.id)),
                Element::Note(_) => {}
                Element::Stream(child) => walk(child, streams, notes)?,
            }
        }
        Ok(())
    }
    walk(root, &mut HashSet::new(), &mut HashSet::new())
}

// ═══════════════════════════════════════════════════════════════════════
// Stream shape
// ═══════════════════════════════════════════════════════════════════════

/// How the walker treats a root stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shape {
    /// Parts stacked vertically.
    Scorelike,
    /// Measures side by side.
    Partlike,
    /// A single bare sequence of notes (or voices).
    Flat,
}

impl Shape {
    /// Tagged streams are classified by kind. Generic streams are probed: a
    /// first child that itself holds streams makes the stream score-like, any
    /// other sub-stream makes it part-like.
    pub fn of(stream: &Stream) -> Self {
        match stream.kind {
            StreamKind::Score => Shape::Scorelike,
            StreamKind::Part => Shape::Partlike,
            StreamKind::Measure | StreamKind::Voice => Shape::Flat,
            StreamKind::Generic => {
                if !stream.has_sub_streams() {
                    Shape::Flat
                } else if stream
                    .elements
                    .first()
                    .and_then(Element::as_stream)
                    .map_or(false, Stream::has_sub_streams)
                {
                    Shape::Scorelike
                } else {
                    Shape::Partlike
                }
            }
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════
// Renderer
// ═══════════════════════════════════════════════════════════════════════

/// Lays out one stream at a time on a backend.
///
/// Accumulators are reset at the start of every pass; a renderer must not be
/// shared between concurrent passes.
pub struct Renderer<'s, B: NotationBackend> {
    backend: B,
    config: LayoutConfig,
    speller: Box<dyn AccidentalSpeller>,
    ctx: Option<ContextId>,
    stream: Option<&'s Stream>,

    stacks: Vec<RenderStack<'s>>,
    staves: Vec<StaveId>,
    beam_groups: Vec<BeamId>,
    ties: Vec<TieArc>,
    tuplets: Vec<TupletGroup>,
    connectors: Vec<ConnectorId>,
    formatters: Vec<FormatterId>,
    system_break_offsets: Vec<f64>,
    tickables: HashMap<NoteId, TickableId>,
    placements: HashMap<StreamId, Placement>,

    annotations: Annotations,
    diagnostics: Diagnostics,
}

impl<'s, B: NotationBackend> Renderer<'s, B> {
    pub fn new(backend: B) -> Self {
        Self::with_config(backend, LayoutConfig::default())
    }

    pub fn with_config(backend: B, config: LayoutConfig) -> Self {
        Self {
            backend,
            config,
            speller: Box::new(KeyAccidentals),
            ctx: None,
            stream: None,
            stacks: Vec::new(),
            staves: Vec::new(),
            beam_groups: Vec::new(),
            ties: Vec::new(),
            tuplets: Vec::new(),
            connectors: Vec::new(),
            formatters: Vec::new(),
            system_break_offsets: Vec::new(),
            tickables: HashMap::new(),
            placements: HashMap::new(),
            annotations: Annotations::new(),
            diagnostics: Diagnostics::new(),
        }
    }

    /// Draw on an existing context instead of creating one.
    pub fn with_context(mut self, ctx: ContextId) -> Self {
        self.ctx = Some(ctx);
        self
    }

    pub fn with_speller(mut self, speller: Box<dyn AccidentalSpeller>) -> Self {
        self.speller = speller;
        self
    }

    // ── Entry points ────────────────────────────────────────────────

    /// Lay out `s` and draw it.
    pub fn render(&mut self, s: &'s Stream) -> Result<()> {
        self.layout(s)?;
        let ctx = self.context();
        self.draw_ties(ctx)?;
        self.draw_measure_stacks(ctx)?;
        self.draw_beam_groups(ctx)?;
        self.draw_tuplets(ctx)?;
        self.draw_connectors(ctx)?;
        Ok(())
    }

    /// Walk, prepare, format and annotate `s` without drawing.
    pub fn layout(&mut self, s: &'s Stream) -> Result<()> {
        self.config.validate()?;
        check_unique_ids(s)?;
        self.reset();
        self.stream = Some(s);
        if self.config.place_measures {
            self.placements = place_measures(s, &self.config);
        }

        match Shape::of(s) {
            Shape::Scorelike => self.prepare_scorelike(s)?,
            Shape::Partlike => self.prepare_partlike(s)?,
            Shape::Flat => self.prepare_arrived_flat(s)?,
        }
        self.format_measure_stacks()
    }

    fn reset(&mut self) {
        self.stacks.clear();
        self.staves.clear();
        self.beam_groups.clear();
        self.ties.clear();
        self.tuplets.clear();
        self.connectors.clear();
        self.formatters.clear();
        self.system_break_offsets.clear();
        self.tickables.clear();
        self.placements.clear();
        self.diagnostics.clear();
    }

    /// The drawing context, created on first use with the root stream's scale.
    pub fn context(&mut self) -> ContextId {
        if let Some(ctx) = self.ctx {
            return ctx;
        }
        let scale = self.stream.map(|s| s.render_options.scale_factor).unwrap_or_default();
        let ctx = self.backend.new_context(scale);
        self.ctx = Some(ctx);
        ctx
    }

    // ── Hierarchy walker ────────────────────────────────────────────

    fn prepare_scorelike(&mut self, s: &'s Stream) -> Result<()> {
        for part in s.sub_streams() {
            self.prepare_partlike(part)?;
        }
        self.add_staff_connectors(s)
    }

    fn prepare_partlike(&mut self, p: &'s Stream) -> Result<()> {
        self.system_break_offsets.clear();
        let children: Vec<&'s Stream> = p.sub_streams().collect();
        let last = children.len().saturating_sub(1);
        let mut running = StaffAttributes::default().updated_by(p);

        for (i, &child) in children.iter().enumerate() {
            if child.render_options.start_new_system {
                self.system_break_offsets.push(child.offset);
            }
            let mut options = child.render_options.clone();
            if let Some(placement) = self.placements.get(&child.id) {
                placement.apply(child, &mut options);
            }
            if i == last {
                options.right_barline = Some("end".into());
            }
            running = running.updated_by(child);
            if self.stacks.len() <= i {
                self.stacks.resize_with(i + 1, RenderStack::new);
            }
            self.prepare_measure(child, &options, &running, i)?;
        }

        self.prepare_ties(p)
    }

    fn prepare_arrived_flat(&mut self, m: &'s Stream) -> Result<()> {
        self.stacks = vec![RenderStack::new()];
        let attrs = StaffAttributes::default().updated_by(m);
        let options = m.render_options.clone();
        self.prepare_measure(m, &options, &attrs, 0)?;
        self.prepare_ties(m)
    }

    // ── Measure / flat preparation ──────────────────────────────────

    /// Prepare a measure into stack `slot`. Voices of one measure share a
    /// single stave built from the measure's options.
    fn prepare_measure(
        &mut self,
        m: &'s Stream,
        options: &RenderOptions,
        attrs: &StaffAttributes,
        slot: usize,
    ) -> Result<()> {
        if !m.has_voices() {
            self.prepare_flat(m, options, attrs, slot, None)?;
            return Ok(());
        }

        let mut stave = None;
        for voice in m.sub_streams() {
            let voice_attrs = attrs.updated_by(voice);
            let shared = match stave {
                Some(st) => st,
                None => self.render_stave(m, options, attrs)?,
            };
            stave = Some(self.prepare_flat(voice, options, &voice_attrs, slot, Some(shared))?);
        }
        if let Some(stave) = stave {
            self.annotations.set_stave(m.id, stave);
        }
        Ok(())
    }

    fn prepare_flat(
        &mut self,
        s: &'s Stream,
        options: &RenderOptions,
        attrs: &StaffAttributes,
        slot: usize,
        stave: Option<StaveId>,
    ) -> Result<StaveId> {
        let notes: Vec<&GeneralNote> = s.notes().collect();
        let accidentals = self.speller.make_accidentals(&notes, attrs.key.as_ref());

        let stave = match stave {
            Some(stave) => stave,
            None => self.render_stave(s, options, attrs)?,
        };
        self.annotations.set_stave(s.id, stave);

        let extracted = notes::extract_tickables(
            &mut self.backend,
            s,
            stave,
            &attrs.clef,
            &accidentals,
            &self.config,
            &mut self.diagnostics,
        )?;
        self.tickables.extend(extracted.tickables.iter().copied());
        self.tuplets.extend(extracted.tuplets);

        let voice = self.new_voice(s, stave)?;
        let ids: Vec<TickableId> = extracted.tickables.iter().map(|&(_, t)| t).collect();
        self.backend.add_tickables(voice, &ids)?;

        let track = Track {
            voice,
            stave,
            tickables: extracted.tickables,
            system_index: options.system_index,
            clef: attrs.clef.clone(),
            time_signature: attrs.time,
        };
        self.stacks[slot].push(track, s);

        if s.has_lyrics() {
            let lyrics = lyrics::extract_lyrics(&mut self.backend, s, stave, &self.config)?;
            let voice = self.new_voice(s, stave)?;
            self.backend.add_tickables(voice, &lyrics)?;
            self.stacks[slot].text_voices.push(LyricTrack { voice, stave, tickables: lyrics });
        }

        Ok(stave)
    }

    fn render_stave(
        &mut self,
        s: &Stream,
        options: &RenderOptions,
        attrs: &StaffAttributes,
    ) -> Result<StaveId> {
        let stave = staff::new_stave(&mut self.backend, s, attrs, options, &self.config);
        staff::set_clef_etc(&mut self.backend, stave, options, attrs)?;
        self.staves.push(stave);
        Ok(stave)
    }

    /// A soft voice sized to the stream's total length.
    fn new_voice(&mut self, s: &Stream, stave: StaveId) -> Result<VoiceId> {
        let time = voice_time(s.quarter_length(), self.config.duration_resolution);
        log::debug!("new voice, num_beats: {} beat_value: {}", time.num_beats, time.beat_value);
        let voice = self.backend.new_voice(time, VoiceMode::Soft);
        self.backend.set_voice_stave(voice, stave)?;
        Ok(voice)
    }

    fn prepare_ties(&mut self, p: &Stream) -> Result<()> {
        let arcs = ties::resolve_ties(
            &mut self.backend,
            p,
            &self.system_break_offsets,
            &self.tickables,
            &mut self.diagnostics,
        )?;
        self.ties.extend(arcs);
        Ok(())
    }

    /// Connect the first and last part at the start of every system.
    fn add_staff_connectors(&mut self, s: &Stream) -> Result<()> {
        let parts: Vec<&Stream> = s.sub_streams().collect();
        let (Some(&first), Some(&last)) = (parts.first(), parts.last()) else {
            return Ok(());
        };
        if parts.len() < 2 {
            return Ok(());
        }

        for (index, top_measure) in first.sub_streams().enumerate() {
            if index > 0 && !top_measure.render_options.start_new_system {
                continue;
            }
            let Some(bottom_measure) = last.sub_streams().nth(index) else { continue };
            let (Some(top), Some(bottom)) = (
                self.annotations.stave(top_measure.id),
                self.annotations.stave(bottom_measure.id),
            ) else {
                continue;
            };
            for tag in &s.render_options.staff_connectors {
                match ConnectorKind::from_tag(tag) {
                    Some(kind) => {
                        let connector = self.backend.new_connector(top, bottom, kind)?;
                        self.connectors.push(connector);
                    }
                    None => self.diagnostics.warn(
                        DiagnosticKind::UnknownConnector { kind: tag.clone() },
                        format!("unknown staff connector '{tag}'"),
                    ),
                }
            }
        }
        Ok(())
    }

    // ── Formatting and annotation ───────────────────────────────────

    fn format_measure_stacks(&mut self) -> Result<()> {
        for stack in &self.stacks {
            let formatted = format::format_stack(&mut self.backend, stack, &self.config)?;
            self.beam_groups.extend(formatted.beams);
            for (track, stream) in stack.voices.iter().zip(&stack.streams) {
                annotate::apply_formatter_information(
                    &self.backend,
                    track,
                    stream,
                    formatted.formatter,
                    &mut self.annotations,
                )?;
            }
            self.formatters.push(formatted.formatter);
        }
        Ok(())
    }

    /// Drop the annotations of `s` (and with `recursive`, of everything below
    /// it) so it can be laid out again from scratch.
    pub fn remove_formatter_information(&mut self, s: &Stream, recursive: bool) {
        self.annotations.clear_stream(s, recursive);
        let notes: Vec<NoteId> = if recursive {
            s.flat_notes().into_iter().map(|(_, n)| n.id).collect()
        } else {
            s.notes().map(|n| n.id).collect()
        };
        for id in notes {
            self.tickables.remove(&id);
        }
    }

    // ── Drawing ─────────────────────────────────────────────────────

    fn draw_ties(&mut self, ctx: ContextId) -> Result<()> {
        for tie in &self.ties {
            self.backend.draw_tie(ctx, tie.handle)?;
        }
        Ok(())
    }

    /// Staves first, then every voice (music and lyrics) of every stack.
    fn draw_measure_stacks(&mut self, ctx: ContextId) -> Result<()> {
        let mut drawn = HashSet::new();
        for stave in &self.staves {
            if drawn.insert(*stave) {
                self.backend.draw_stave(ctx, *stave)?;
            }
        }
        for stack in &self.stacks {
            for (voice, stave) in stack.all_tickables() {
                self.backend.draw_voice(ctx, voice, stave)?;
            }
        }
        Ok(())
    }

    fn draw_beam_groups(&mut self, ctx: ContextId) -> Result<()> {
        for beam in &self.beam_groups {
            self.backend.draw_beam(ctx, *beam)?;
        }
        Ok(())
    }

    fn draw_tuplets(&mut self, ctx: ContextId) -> Result<()> {
        for tuplet in &self.tuplets {
            self.backend.draw_tuplet(ctx, tuplet.handle)?;
        }
        Ok(())
    }

    fn draw_connectors(&mut self, ctx: ContextId) -> Result<()> {
        for connector in &self.connectors {
            self.backend.draw_connector(ctx, *connector)?;
        }
        Ok(())
    }

    // ── Accessors ───────────────────────────────────────────────────

    pub fn stacks(&self) -> &[RenderStack<'s>] {
        &self.stacks
    }

    pub fn staves(&self) -> &[StaveId] {
        &self.staves
    }

    pub fn beam_groups(&self) -> &[BeamId] {
        &self.beam_groups
    }

    pub fn ties(&self) -> &[TieArc] {
        &self.ties
    }

    pub fn tuplets(&self) -> &[TupletGroup] {
        &self.tuplets
    }

    pub fn connectors(&self) -> &[ConnectorId] {
        &self.connectors
    }

    pub fn formatters(&self) -> &[FormatterId] {
        &self.formatters
    }

    /// Offsets where the most recently walked part starts a new system.
    pub fn system_break_offsets(&self) -> &[f64] {
        &self.system_break_offsets
    }

    /// Geometry assigned to a measure before layout, if it needed any.
    pub fn placement(&self, measure: StreamId) -> Option<&Placement> {
        self.placements.get(&measure)
    }

    /// The tickable built for a note in the current pass.
    pub fn tickable(&self, note: NoteId) -> Option<TickableId> {
        self.tickables.get(&note).copied()
    }

    pub fn annotations(&self) -> &Annotations {
        &self.annotations
    }

    pub fn diagnostics(&self) -> &Diagnostics {
        &self.diagnostics
    }

    pub fn config(&self) -> &LayoutConfig {
        &self.config
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    pub fn into_backend(self) -> B {
        self.backend
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn q(name: &str) -> GeneralNote {
        GeneralNote::note(name.parse().unwrap(), Duration::new(DurationType::Quarter))
    }

    #[test]
    fn tagged_streams_classify_by_kind() {
        let m = Stream::measure(vec![q("C4")]);
        assert_eq!(Shape::of(&m), Shape::Flat);
        let part = Stream::part(vec![m.clone()]);
        assert_eq!(Shape::of(&part), Shape::Partlike);
        assert_eq!(Shape::of(&Stream::score(vec![part])), Shape::Scorelike);
        let voiced = Stream::measure_with_voices(vec![Stream::voice(vec![q("C4")])]);
        assert_eq!(Shape::of(&voiced), Shape::Flat);
    }

    #[test]
    fn generic_streams_are_probed() {
        let mut flat = Stream::new(StreamKind::Generic);
        flat.append(q("D4"));
        assert_eq!(Shape::of(&flat), Shape::Flat);

        let mut partlike = Stream::new(StreamKind::Generic);
        partlike.append(Stream::measure(vec![q("D4")]));
        assert_eq!(Shape::of(&partlike), Shape::Partlike);

        let mut scorelike = Stream::new(StreamKind::Generic);
        scorelike.insert(0.0, partlike.clone());
        assert_eq!(Shape::of(&scorelike), Shape::Scorelike);
    }
}
