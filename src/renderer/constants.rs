//! Shared constants for the SVG backend (all in SVG user units).

// ── Stave geometry ──────────────────────────────────────────────────
pub(super) const STAFF_LINE_SPACING: f64 = 10.0; // distance between staff lines
pub(super) const SPACE_ABOVE_STAFF: f64 = 4.0; // in line spaces, above the top line
pub(super) const SPACE_BELOW_STAFF: f64 = 4.0;
pub(super) const STAVE_BEGIN_PADDING: f64 = 10.0;
pub(super) const STAVE_END_PADDING: f64 = 10.0;
pub(super) const PAGE_MARGIN: f64 = 10.0;
pub(super) const BRACE_WIDTH: f64 = 10.0;

// ── Prefix widths ───────────────────────────────────────────────────
pub(super) const CLEF_SPACE: f64 = 32.0; // horizontal space for the clef
pub(super) const KEY_SIG_ACCIDENTAL_SPACE: f64 = 10.0;
pub(super) const TIME_SIG_SPACE: f64 = 24.0;

// ── Note dimensions ─────────────────────────────────────────────────
pub(super) const NOTEHEAD_RX: f64 = 5.5; // notehead ellipse x-radius
pub(super) const NOTEHEAD_RY: f64 = 4.0; // notehead ellipse y-radius
pub(super) const STEM_LENGTH: f64 = 30.0;
pub(super) const STEM_WIDTH: f64 = 1.2;
pub(super) const BEAM_THICKNESS: f64 = 4.0;
pub(super) const BEAM_SPACING: f64 = 6.0;
pub(super) const BARLINE_WIDTH: f64 = 1.0;
pub(super) const STAFF_LINE_WIDTH: f64 = 0.8;
pub(super) const LEDGER_LINE_WIDTH: f64 = 0.8;
pub(super) const LEDGER_LINE_EXTEND: f64 = 5.0;

// ── Minimum tickable widths ─────────────────────────────────────────
pub(super) const NOTE_MIN_WIDTH: f64 = 22.0;
pub(super) const ACCIDENTAL_WIDTH: f64 = 10.0;
pub(super) const DOT_WIDTH: f64 = 5.0;
pub(super) const TEXT_CHAR_WIDTH: f64 = 0.6; // fraction of the font size

// ── Spanners ────────────────────────────────────────────────────────
pub(super) const TUPLET_BRACKET_OFFSET: f64 = 15.0; // above the top line
pub(super) const HALF_TIE_LEAD: f64 = 10.0;
pub(super) const TIE_NOTEHEAD_Y_OFFSET: f64 = 6.0;
pub(super) const TIE_HEIGHT_FACTOR: f64 = 0.15;
pub(super) const TIE_MIN_HEIGHT: f64 = 3.0;
pub(super) const TIE_MAX_HEIGHT: f64 = 12.0;
pub(super) const TIE_ENDPOINT_THICKNESS: f64 = 0.8;
pub(super) const TIE_MID_THICKNESS: f64 = 2.0;

// ── Colors ──────────────────────────────────────────────────────────
pub(super) const NOTE_COLOR: &str = "#1a1a1a";
pub(super) const STAFF_COLOR: &str = "#555555";
pub(super) const BARLINE_COLOR: &str = "#333333";
pub(super) const TEXT_COLOR: &str = "#1a1a1a";
