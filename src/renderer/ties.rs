//! Tie resolution across a part, including ties severed by a system break.

use std::collections::HashMap;

use serde::Serialize;

use crate::diagnostics::{DiagnosticKind, Diagnostics};
use crate::model::*;
use super::backend::{BackendResult, NotationBackend, TickableId, TieId, TieSpec};

/// One side of a tie arc.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TieEnd {
    pub note: NoteId,
    pub tickable: TickableId,
    /// Note-head index within the tickable
    pub index: usize,
}

/// A tie curve. A tie cut by a system break becomes two arcs, one with only
/// a start and one with only an end.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TieArc {
    pub handle: TieId,
    pub start: Option<TieEnd>,
    pub end: Option<TieEnd>,
}

impl TieArc {
    pub fn is_half(&self) -> bool {
        self.start.is_none() || self.end.is_none()
    }
}

/// True when some break lies in `(first, second]`.
pub fn crosses_break(first: f64, second: f64, breaks: &[f64]) -> bool {
    breaks.iter().any(|&b| first < b && second >= b)
}

/// Pair every `start`/`continue` tie in `part` with the next note in
/// flattened order.
pub(super) fn resolve_ties<B: NotationBackend>(
    backend: &mut B,
    part: &Stream,
    breaks: &[f64],
    tickables: &HashMap<NoteId, TickableId>,
    diagnostics: &mut Diagnostics,
) -> BackendResult<Vec<TieArc>> {
    let flat = part.flat_notes();
    let mut arcs = Vec::new();

    for (i, &(offset, note)) in flat.iter().enumerate() {
        if !matches!(note.tie, Some(TieType::Start) | Some(TieType::Continue)) {
            continue;
        }
        let Some(&(next_offset, next)) = flat.get(i + 1) else {
            diagnostics.warn(
                DiagnosticKind::DanglingTie { note: note.id },
                format!("tie on {} has no following note", note.id),
            );
            continue;
        };

        let end_of = |n: &GeneralNote| {
            tickables.get(&n.id).map(|&tickable| TieEnd { note: n.id, tickable, index: 0 })
        };
        let (start, end) = (end_of(note), end_of(next));

        if crosses_break(offset, next_offset, breaks) {
            log::debug!("tie {} → {} crosses a system break", note.id, next.id);
            if let Some(start) = start {
                arcs.push(new_arc(backend, Some(start), None)?);
            }
            if let Some(end) = end {
                arcs.push(new_arc(backend, None, Some(end))?);
            }
        } else if let (Some(start), Some(end)) = (start, end) {
            log::debug!("tie {} → {}", note.id, next.id);
            arcs.push(new_arc(backend, Some(start), Some(end))?);
        } else {
            log::debug!("tie {} → {} skipped: a note has no tickable", note.id, next.id);
        }
    }

    Ok(arcs)
}

fn new_arc<B: NotationBackend>(
    backend: &mut B,
    start: Option<TieEnd>,
    end: Option<TieEnd>,
) -> BackendResult<TieArc> {
    let handle = backend.new_tie(TieSpec {
        first_note: start.map(|s| s.tickable),
        last_note: end.map(|e| e.tickable),
        first_indices: start.map(|s| vec![s.index]).unwrap_or_default(),
        last_indices: end.map(|e| vec![e.index]).unwrap_or_default(),
    })?;
    Ok(TieArc { handle, start, end })
}
