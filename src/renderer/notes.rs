//! Tickable extraction: one backend tickable per note or rest, with tuplet
//! brackets grouped along the way.

use std::collections::HashMap;

use serde::Serialize;

use crate::config::LayoutConfig;
use crate::diagnostics::{DiagnosticKind, Diagnostics};
use crate::model::*;
use super::backend::{BackendResult, NotationBackend, NoteSpec, StaveId, TickableId, TupletId, TupletSpec};

/// A tuplet bracket and the notes under it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TupletGroup {
    pub handle: TupletId,
    pub notes: Vec<NoteId>,
}

/// Tickables of one flat stream, in stream order, plus the tuplet brackets
/// closed while walking it.
#[derive(Debug, Default)]
pub(super) struct Extracted {
    pub(super) tickables: Vec<(NoteId, TickableId)>,
    pub(super) tuplets: Vec<TupletGroup>,
}

/// Tuplet group still waiting for its last note.
struct OpenTuplet<'a> {
    tuplet: &'a Tuplet,
    length: f64,
    notes: Vec<NoteId>,
    tickables: Vec<TickableId>,
}

pub(super) fn extract_tickables<B: NotationBackend>(
    backend: &mut B,
    stream: &Stream,
    stave: StaveId,
    clef: &Clef,
    accidentals: &HashMap<NoteId, Accidental>,
    config: &LayoutConfig,
    diagnostics: &mut Diagnostics,
) -> BackendResult<Extracted> {
    let mut out = Extracted::default();
    let mut open: Option<OpenTuplet<'_>> = None;

    for note in stream.notes() {
        let Some(ref duration) = note.duration else { continue };

        let spec = NoteSpec {
            pitch: note.pitch.as_ref(),
            clef,
            duration,
            accidental: accidentals.get(&note.id).copied(),
            stem: note.stem,
        };
        let tickable = match backend.note_tickable(&spec, stave) {
            Ok(t) => t,
            Err(e) => {
                diagnostics.error(
                    DiagnosticKind::TickableConversion { note: note.id, reason: e.to_string() },
                    format!("cannot create a tickable from {} in {}: {e}", note.id, stream.id),
                );
                continue;
            }
        };
        out.tickables.push((note.id, tickable));

        // only the first tuplet of a note is honoured
        let Some(tuplet) = duration.tuplets.first() else { continue };
        let group = open.get_or_insert_with(|| OpenTuplet {
            tuplet,
            length: 0.0,
            notes: Vec::new(),
            tickables: Vec::new(),
        });
        group.notes.push(note.id);
        group.tickables.push(tickable);
        group.length += duration.quarter_length();

        let total = group.tuplet.total_tuplet_length();
        if group.length >= total || (group.length - total).abs() < config.tuplet_tolerance {
            if let Some(done) = open.take() {
                let handle = backend.new_tuplet(TupletSpec {
                    tickables: done.tickables,
                    num_notes: done.tuplet.number_notes_actual,
                    beats_occupied: done.tuplet.number_notes_normal,
                    ratioed: done.tuplet.normal_show == TupletShow::Ratio,
                })?;
                out.tuplets.push(TupletGroup { handle, notes: done.notes });
            }
        }
    }

    if let Some(group) = open {
        diagnostics.warn(
            DiagnosticKind::IncompleteTuplet { stream: stream.id, notes: group.notes.len() },
            format!(
                "incomplete tuplet found in {}: {} of {} quarter lengths",
                stream.id,
                group.length,
                group.tuplet.total_tuplet_length()
            ),
        );
    }

    Ok(out)
}
