//! Post-layout annotations: where each note ended up.
//!
//! Results are kept in a side table keyed by [`NoteId`] rather than written
//! onto the notes, so the same score can be laid out repeatedly.

use std::collections::HashMap;

use serde::Serialize;

use crate::model::*;
use super::backend::{BackendResult, FormatterId, NotationBackend, StaveId, TickableId};
use super::stack::Track;

/// Resolved position of one note or rest.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NoteLayout {
    pub tickable: TickableId,
    /// Absolute x in pixels
    pub x: f64,
    /// Vertical position; rests and notes the formatter has no slot for have none
    pub y: Option<f64>,
    /// Display width; None if the formatter has no slot at this tick
    pub width: Option<f64>,
    pub system_index: usize,
}

/// Side table of everything one layout pass wrote back.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Annotations {
    notes: HashMap<NoteId, NoteLayout>,
    staves: HashMap<StreamId, StaveId>,
}

impl Annotations {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn note(&self, id: NoteId) -> Option<&NoteLayout> {
        self.notes.get(&id)
    }

    pub fn notes(&self) -> impl Iterator<Item = (&NoteId, &NoteLayout)> {
        self.notes.iter()
    }

    /// The stave a stream was laid out on.
    pub fn stave(&self, stream: StreamId) -> Option<StaveId> {
        self.staves.get(&stream).copied()
    }

    pub fn len(&self) -> usize {
        self.notes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.notes.is_empty()
    }

    pub fn clear(&mut self) {
        self.notes.clear();
        self.staves.clear();
    }

    pub(super) fn set_stave(&mut self, stream: StreamId, stave: StaveId) {
        self.staves.insert(stream, stave);
    }

    /// Forget everything recorded for `stream`'s notes, and with `recursive`
    /// for every stream below it too.
    pub fn clear_stream(&mut self, stream: &Stream, recursive: bool) {
        self.staves.remove(&stream.id);
        for element in &stream.elements {
            match element {
                Element::Note(n) => {
                    self.notes.remove(&n.id);
                }
                Element::Stream(s) if recursive => self.clear_stream(s, recursive),
                Element::Stream(_) => {}
            }
        }
    }
}

/// Record position, width, height and system of every note in `stream`
/// that produced a tickable in `track`.
///
/// Formatter slots are looked up by the cumulative tick offset of each
/// tickable in the track.
pub(super) fn apply_formatter_information<B: NotationBackend>(
    backend: &B,
    track: &Track,
    stream: &Stream,
    formatter: FormatterId,
    annotations: &mut Annotations,
) -> BackendResult<()> {
    let bottom_y = backend.bottom_y(track.stave)?;
    let spacing = backend.line_spacing(track.stave)?;
    let tickables: HashMap<NoteId, TickableId> = track.tickables.iter().copied().collect();

    let mut next_ticks = 0u64;
    for note in stream.notes() {
        let Some(&tickable) = tickables.get(&note.id) else { continue };
        let slot = backend.tick_context(formatter, next_ticks);
        next_ticks += backend.ticks(tickable)?;

        let mut layout = NoteLayout {
            tickable,
            x: backend.absolute_x(tickable)?,
            y: None,
            width: None,
            system_index: track.system_index,
        };
        if let Some(slot) = slot {
            layout.width = Some(slot.width);
            if let Some(ref pitch) = note.pitch {
                let steps = track.clef.first_line() - pitch.diatonic_note_num();
                layout.y = Some(bottom_y - steps as f64 * spacing);
            }
        }
        annotations.notes.insert(note.id, layout);
    }

    annotations.set_stave(stream.id, track.stave);
    Ok(())
}
