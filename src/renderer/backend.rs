//! Interface to the notation-rendering backend.
//!
//! The layout engine never touches backend objects directly. Every stave,
//! tickable, voice, formatter and spanner is created through
//! [`NotationBackend`] and referred to by a typed index handle afterwards.

use serde::{Deserialize, Serialize};

use crate::config::FontSpec;
use crate::error::BackendError;
use crate::model::{Accidental, Clef, Duration, Pitch, ScaleFactor, StemDirection};

/// Backend ticks per whole note.
pub const RESOLUTION: u64 = 16384;

macro_rules! handle {
    ($($(#[$meta:meta])* $name:ident;)*) => {
        $(
            $(#[$meta])*
            #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
            pub struct $name(pub usize);
        )*
    };
}

handle! {
    /// A drawing context bound to a surface.
    ContextId;
    StaveId;
    /// A note, rest or text note occupying a slot in a voice.
    TickableId;
    VoiceId;
    FormatterId;
    BeamId;
    TieId;
    TupletId;
    ConnectorId;
}

// ═══════════════════════════════════════════════════════════════════════
// Records passed to the backend
// ═══════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BarlineType {
    Single,
    Double,
    End,
}

impl BarlineType {
    /// `single`, `double` and `end`; anything else has no barline type.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "single" => Some(BarlineType::Single),
            "double" => Some(BarlineType::Double),
            "end" => Some(BarlineType::End),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConnectorKind {
    Brace,
    Single,
    Double,
    Bracket,
}

impl ConnectorKind {
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "brace" => Some(ConnectorKind::Brace),
            "single" => Some(ConnectorKind::Single),
            "double" => Some(ConnectorKind::Double),
            "bracket" => Some(ConnectorKind::Bracket),
            _ => None,
        }
    }
}

/// How strictly a voice checks the ticks added to it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VoiceMode {
    /// Ticks must fill the voice exactly.
    Strict,
    /// Ticks are added without restriction.
    Soft,
    /// Ticks may underfill but not exceed the voice.
    Full,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Justification {
    Left,
    Center,
    Right,
}

/// Nominal length of a voice as a time-signature-like pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoiceTime {
    pub num_beats: u32,
    pub beat_value: u32,
}

impl VoiceTime {
    pub fn ticks(&self) -> u64 {
        RESOLUTION * self.num_beats as u64 / self.beat_value.max(1) as u64
    }
}

/// A beam grouping expressed as a fraction of a whole note (2/8 = a quarter).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BeatGroup {
    pub numerator: u32,
    pub denominator: u32,
}

impl BeatGroup {
    pub const fn new(numerator: u32, denominator: u32) -> Self {
        Self { numerator, denominator }
    }

    pub fn ticks(&self) -> u64 {
        RESOLUTION * self.numerator as u64 / self.denominator.max(1) as u64
    }
}

/// Horizontal slot assigned by a formatter to one tick offset.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TickContext {
    pub x: f64,
    pub width: f64,
}

/// Everything the backend needs to build a note or rest tickable.
#[derive(Debug, Clone)]
pub struct NoteSpec<'a> {
    /// None for a rest
    pub pitch: Option<&'a Pitch>,
    pub clef: &'a Clef,
    pub duration: &'a Duration,
    /// Accidental to display, if any
    pub accidental: Option<Accidental>,
    pub stem: Option<StemDirection>,
}

#[derive(Debug, Clone)]
pub struct TextSpec {
    pub text: String,
    pub font: FontSpec,
    pub duration: Duration,
    /// Stave line the text sits on
    pub line: f64,
    pub justification: Justification,
}

/// A tie between two tickables; a half tie leaves one side empty.
#[derive(Debug, Clone, PartialEq)]
pub struct TieSpec {
    pub first_note: Option<TickableId>,
    pub last_note: Option<TickableId>,
    pub first_indices: Vec<usize>,
    pub last_indices: Vec<usize>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TupletSpec {
    pub tickables: Vec<TickableId>,
    pub num_notes: u32,
    pub beats_occupied: u32,
    pub ratioed: bool,
}

// ═══════════════════════════════════════════════════════════════════════
// Backend trait
// ═══════════════════════════════════════════════════════════════════════

pub type BackendResult<T> = std::result::Result<T, BackendError>;

/// Operations the layout engine needs from a notation renderer.
pub trait NotationBackend {
    /// Create a drawing context with a uniform scale.
    fn new_context(&mut self, scale: ScaleFactor) -> ContextId;

    // ── Staves ──────────────────────────────────────────────────────

    fn new_stave(&mut self, x: f64, y: f64, width: f64) -> StaveId;
    fn set_num_lines(&mut self, stave: StaveId, lines: u32) -> BackendResult<()>;
    /// Per-line visibility, top line first.
    fn set_line_config(&mut self, stave: StaveId, visible: &[bool]) -> BackendResult<()>;
    fn set_measure_number(&mut self, stave: StaveId, number: usize) -> BackendResult<()>;
    /// `annotation` is an octave marker such as `"8va"`.
    fn add_clef(&mut self, stave: StaveId, clef: &str, annotation: Option<&str>) -> BackendResult<()>;
    fn add_key_signature(&mut self, stave: StaveId, key: &str) -> BackendResult<()>;
    fn add_time_signature(&mut self, stave: StaveId, time: &str) -> BackendResult<()>;
    fn set_end_barline(&mut self, stave: StaveId, barline: BarlineType) -> BackendResult<()>;

    /// Where musical content starts, after clef, key and time glyphs.
    fn glyph_start_x(&self, stave: StaveId) -> BackendResult<f64>;
    fn set_glyph_start_x(&mut self, stave: StaveId, x: f64) -> BackendResult<()>;
    fn stave_width(&self, stave: StaveId) -> BackendResult<f64>;
    fn bottom_y(&self, stave: StaveId) -> BackendResult<f64>;
    fn line_spacing(&self, stave: StaveId) -> BackendResult<f64>;

    // ── Tickables ───────────────────────────────────────────────────

    fn note_tickable(&mut self, spec: &NoteSpec<'_>, stave: StaveId) -> BackendResult<TickableId>;
    fn text_tickable(&mut self, spec: &TextSpec, stave: StaveId) -> BackendResult<TickableId>;
    fn ticks(&self, tickable: TickableId) -> BackendResult<u64>;
    /// Absolute x of a formatted tickable.
    fn absolute_x(&self, tickable: TickableId) -> BackendResult<f64>;

    // ── Voices and formatting ───────────────────────────────────────

    fn new_voice(&mut self, time: VoiceTime, mode: VoiceMode) -> VoiceId;
    fn set_voice_stave(&mut self, voice: VoiceId, stave: StaveId) -> BackendResult<()>;
    fn add_tickables(&mut self, voice: VoiceId, tickables: &[TickableId]) -> BackendResult<()>;

    fn new_formatter(&mut self) -> FormatterId;
    /// Join `voices` and position all their tickables against `stave`.
    fn format_to_stave(&mut self, formatter: FormatterId, voices: &[VoiceId], stave: StaveId) -> BackendResult<()>;
    /// The slot computed for a cumulative tick offset, if any tickable starts there.
    fn tick_context(&self, formatter: FormatterId, tick: u64) -> Option<TickContext>;

    // ── Spanners ────────────────────────────────────────────────────

    /// Beam the voice's notes within each beat group. Stem directions of
    /// beamed notes are overridden.
    fn auto_beam(&mut self, voice: VoiceId, groups: &[BeatGroup]) -> BackendResult<Vec<BeamId>>;
    fn new_tie(&mut self, spec: TieSpec) -> BackendResult<TieId>;
    fn new_tuplet(&mut self, spec: TupletSpec) -> BackendResult<TupletId>;
    fn new_connector(&mut self, top: StaveId, bottom: StaveId, kind: ConnectorKind) -> BackendResult<ConnectorId>;

    // ── Drawing ─────────────────────────────────────────────────────

    fn draw_stave(&mut self, ctx: ContextId, stave: StaveId) -> BackendResult<()>;
    fn draw_voice(&mut self, ctx: ContextId, voice: VoiceId, stave: StaveId) -> BackendResult<()>;
    fn draw_beam(&mut self, ctx: ContextId, beam: BeamId) -> BackendResult<()>;
    fn draw_tie(&mut self, ctx: ContextId, tie: TieId) -> BackendResult<()>;
    fn draw_tuplet(&mut self, ctx: ContextId, tuplet: TupletId) -> BackendResult<()>;
    fn draw_connector(&mut self, ctx: ContextId, connector: ConnectorId) -> BackendResult<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn voice_time_ticks() {
        assert_eq!(VoiceTime { num_beats: 4, beat_value: 4 }.ticks(), RESOLUTION);
        assert_eq!(VoiceTime { num_beats: 6, beat_value: 32 }.ticks(), 3072);
        assert_eq!(BeatGroup::new(3, 8).ticks(), 6144);
    }

    #[test]
    fn barline_and_connector_tables() {
        assert_eq!(BarlineType::from_name("end"), Some(BarlineType::End));
        assert_eq!(BarlineType::from_name("dashed"), None);
        assert_eq!(ConnectorKind::from_tag("bracket"), Some(ConnectorKind::Bracket));
        assert_eq!(ConnectorKind::from_tag("wavy"), None);
    }
}
