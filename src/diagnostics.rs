//! Diagnostics collected during one layout pass.
//!
//! Problems that only affect a single note or group (a note the backend
//! rejects, an unterminated tuplet) do not abort layout. They are recorded
//! here and mirrored to the `log` facade.

use serde::Serialize;

use crate::model::{NoteId, StreamId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Severity {
    Warning,
    Error,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum DiagnosticKind {
    /// The backend could not build a tickable for this note.
    TickableConversion { note: NoteId, reason: String },
    /// The stream ended while a tuplet group was still open.
    IncompleteTuplet { stream: StreamId, notes: usize },
    /// A tie starts on the last note of a part.
    DanglingTie { note: NoteId },
    UnknownConnector { kind: String },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Diagnostic {
    pub severity: Severity,
    pub kind: DiagnosticKind,
    pub message: String,
}

/// Sink for per-note and structural anomalies.
#[derive(Debug, Default, Clone, Serialize)]
pub struct Diagnostics {
    entries: Vec<Diagnostic>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn error(&mut self, kind: DiagnosticKind, message: impl Into<String>) {
        let message = message.into();
        log::error!("{message}");
        self.entries.push(Diagnostic { severity: Severity::Error, kind, message });
    }

    pub fn warn(&mut self, kind: DiagnosticKind, message: impl Into<String>) {
        let message = message.into();
        log::warn!("{message}");
        self.entries.push(Diagnostic { severity: Severity::Warning, kind, message });
    }

    pub fn entries(&self) -> &[Diagnostic] {
        &self.entries
    }

    pub fn errors(&self) -> impl Iterator<Item = &Diagnostic> {
        self.entries.iter().filter(|d| d.severity == Severity::Error)
    }

    pub fn warnings(&self) -> impl Iterator<Item = &Diagnostic> {
        self.entries.iter().filter(|d| d.severity == Severity::Warning)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn severities_are_filtered() {
        let mut d = Diagnostics::new();
        d.warn(DiagnosticKind::UnknownConnector { kind: "wavy".into() }, "unknown connector 'wavy'");
        d.error(
            DiagnosticKind::TickableConversion { note: NoteId(7), reason: "bad".into() },
            "note#7: bad",
        );
        assert_eq!(d.len(), 2);
        assert_eq!(d.errors().count(), 1);
        assert_eq!(d.warnings().count(), 1);
        d.clear();
        assert!(d.is_empty());
    }
}
