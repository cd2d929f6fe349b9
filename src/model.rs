//! Data model for the score hierarchy handed to the layout engine.
//!
//! Streams nest as Score → Part → Measure → (Voice) → notes. The engine only
//! reads these structures; everything it computes lives in side tables keyed
//! by [`NoteId`] and [`StreamId`].

use std::cmp::Ordering as CmpOrdering;
use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

/// Ticks per quarter note (the backend works at 16384 ticks per whole note).
pub const TICKS_PER_QUARTER: f64 = 4096.0;

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

fn next_id() -> u64 {
    NEXT_ID.fetch_add(1, Ordering::Relaxed)
}

/// Stable identity of a note or rest. `clone()` hands out a new id;
/// [`GeneralNote::duplicate`] keeps it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NoteId(pub u64);

/// Stable identity of a stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct StreamId(pub u64);

impl NoteId {
    pub fn next() -> Self {
        Self(next_id())
    }
}

impl StreamId {
    pub fn next() -> Self {
        Self(next_id())
    }
}

impl fmt::Display for NoteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "note#{}", self.0)
    }
}

impl fmt::Display for StreamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "stream#{}", self.0)
    }
}

// ═══════════════════════════════════════════════════════════════════════
// Streams
// ═══════════════════════════════════════════════════════════════════════

/// What a stream represents in the score hierarchy. Fixed at construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StreamKind {
    Score,
    Part,
    Measure,
    Voice,
    /// Untagged container; its shape is probed structurally.
    Generic,
}

/// A child of a stream.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Element {
    Note(GeneralNote),
    Stream(Stream),
}

impl Element {
    /// Offset from the start of the containing stream, in quarter lengths.
    pub fn offset(&self) -> f64 {
        match self {
            Element::Note(n) => n.offset,
            Element::Stream(s) => s.offset,
        }
    }

    fn set_offset(&mut self, offset: f64) {
        match self {
            Element::Note(n) => n.offset = offset,
            Element::Stream(s) => s.offset = offset,
        }
    }

    pub fn quarter_length(&self) -> f64 {
        match self {
            Element::Note(n) => n.quarter_length(),
            Element::Stream(s) => s.quarter_length(),
        }
    }

    /// Id-preserving copy, see [`Stream::duplicate`].
    pub fn duplicate(&self) -> Self {
        match self {
            Element::Note(n) => Element::Note(n.duplicate()),
            Element::Stream(s) => Element::Stream(s.duplicate()),
        }
    }

    pub fn as_note(&self) -> Option<&GeneralNote> {
        match self {
            Element::Note(n) => Some(n),
            Element::Stream(_) => None,
        }
    }

    pub fn as_stream(&self) -> Option<&Stream> {
        match self {
            Element::Stream(s) => Some(s),
            Element::Note(_) => None,
        }
    }
}

impl From<GeneralNote> for Element {
    fn from(n: GeneralNote) -> Self {
        Element::Note(n)
    }
}

impl From<Stream> for Element {
    fn from(s: Stream) -> Self {
        Element::Stream(s)
    }
}

/// An ordered container of notes and sub-streams.
///
/// Cloning a stream clones every child, and each copy gets a fresh id, so a
/// cloned measure can sit in a second part without sharing layout entries.
#[derive(Debug, Serialize, Deserialize)]
pub struct Stream {
    pub id: StreamId,
    pub kind: StreamKind,
    /// Offset from the start of the containing stream, in quarter lengths
    pub offset: f64,
    /// Ordered children
    pub elements: Vec<Element>,
    /// Clef in effect from the start of this stream (None = inherit)
    pub clef: Option<Clef>,
    /// Key signature in effect from the start of this stream (None = inherit)
    pub key: Option<Key>,
    /// Time signature in effect from the start of this stream (None = inherit)
    pub time_signature: Option<TimeSignature>,
    /// Whether eighth notes and shorter are beamed automatically
    pub auto_beam: bool,
    /// Layout overrides and display flags
    pub render_options: RenderOptions,
}

impl Clone for Stream {
    fn clone(&self) -> Self {
        self.copy_as(StreamId::next(), self.elements.clone())
    }
}

impl Stream {
    pub fn new(kind: StreamKind) -> Self {
        Self {
            id: StreamId::next(),
            kind,
            offset: 0.0,
            elements: Vec::new(),
            clef: None,
            key: None,
            time_signature: None,
            auto_beam: true,
            render_options: RenderOptions::default(),
        }
    }

    /// A score whose parts all start at offset 0.
    pub fn score(parts: Vec<Stream>) -> Self {
        let mut s = Self::new(StreamKind::Score);
        for part in parts {
            s.insert(0.0, part);
        }
        s
    }

    /// A part whose measures follow one another.
    pub fn part(measures: Vec<Stream>) -> Self {
        let mut s = Self::new(StreamKind::Part);
        for m in measures {
            s.append(m);
        }
        s
    }

    /// A measure of consecutive notes and rests.
    pub fn measure(notes: Vec<GeneralNote>) -> Self {
        let mut s = Self::new(StreamKind::Measure);
        for n in notes {
            s.append(n);
        }
        s
    }

    /// A measure holding simultaneous voices, all starting at offset 0.
    pub fn measure_with_voices(voices: Vec<Stream>) -> Self {
        let mut s = Self::new(StreamKind::Measure);
        for v in voices {
            s.insert(0.0, v);
        }
        s
    }

    pub fn voice(notes: Vec<GeneralNote>) -> Self {
        let mut s = Self::new(StreamKind::Voice);
        for n in notes {
            s.append(n);
        }
        s
    }

    /// Copy that keeps this stream's id and the ids of everything below it.
    pub fn duplicate(&self) -> Self {
        self.copy_as(self.id, self.elements.iter().map(Element::duplicate).collect())
    }

    fn copy_as(&self, id: StreamId, elements: Vec<Element>) -> Self {
        Self {
            id,
            kind: self.kind,
            offset: self.offset,
            elements,
            clef: self.clef.clone(),
            key: self.key.clone(),
            time_signature: self.time_signature,
            auto_beam: self.auto_beam,
            render_options: self.render_options.clone(),
        }
    }

    pub fn with_clef(mut self, clef: Clef) -> Self {
        self.clef = Some(clef);
        self
    }

    pub fn with_key(mut self, key: Key) -> Self {
        self.key = Some(key);
        self
    }

    pub fn with_time_signature(mut self, beats: u32, beat_type: u32) -> Self {
        self.time_signature = Some(TimeSignature { beats, beat_type });
        self
    }

    pub fn with_render_options(mut self, options: RenderOptions) -> Self {
        self.render_options = options;
        self
    }

    /// Place an element at the current highest time.
    pub fn append(&mut self, element: impl Into<Element>) {
        let offset = self.highest_time();
        self.insert(offset, element);
    }

    /// Place an element at an explicit offset.
    pub fn insert(&mut self, offset: f64, element: impl Into<Element>) {
        let mut element = element.into();
        element.set_offset(offset);
        self.elements.push(element);
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Element> {
        self.elements.get(index)
    }

    /// End of the last-sounding element, in quarter lengths.
    pub fn highest_time(&self) -> f64 {
        self.elements
            .iter()
            .map(|e| e.offset() + e.quarter_length())
            .fold(0.0, f64::max)
    }

    pub fn quarter_length(&self) -> f64 {
        self.highest_time()
    }

    /// Direct child notes and rests.
    pub fn notes(&self) -> impl Iterator<Item = &GeneralNote> {
        self.elements.iter().filter_map(Element::as_note)
    }

    /// Direct child streams.
    pub fn sub_streams(&self) -> impl Iterator<Item = &Stream> {
        self.elements.iter().filter_map(Element::as_stream)
    }

    pub fn has_sub_streams(&self) -> bool {
        self.sub_streams().next().is_some()
    }

    pub fn has_voices(&self) -> bool {
        self.sub_streams().any(|s| s.kind == StreamKind::Voice)
    }

    pub fn has_lyrics(&self) -> bool {
        self.notes().any(|n| !n.lyrics.is_empty())
    }

    /// Every note and rest below this stream with its absolute offset,
    /// sorted by offset (ties keep document order).
    pub fn flat_notes(&self) -> Vec<(f64, &GeneralNote)> {
        let mut out = Vec::new();
        self.collect_notes(0.0, &mut out);
        out.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(CmpOrdering::Equal));
        out
    }

    fn collect_notes<'a>(&'a self, base: f64, out: &mut Vec<(f64, &'a GeneralNote)>) {
        for element in &self.elements {
            match element {
                Element::Note(n) => out.push((base + n.offset, n)),
                Element::Stream(s) => s.collect_notes(base + s.offset, out),
            }
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════
// Render options
// ═══════════════════════════════════════════════════════════════════════

/// Per-stream layout geometry and display flags.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderOptions {
    /// Explicit stave width; estimated from content when absent
    pub width: Option<f64>,
    pub top: Option<f64>,
    pub left: Option<f64>,
    /// Extra width added to the estimated staff length
    pub staff_padding: f64,
    /// Number of visible staff lines
    pub staff_lines: u32,
    /// This stream begins a new system (line)
    pub start_new_system: bool,
    /// "single", "double" or "end"; anything else is ignored
    pub right_barline: Option<String>,
    pub display_clef: bool,
    pub display_key_signature: bool,
    pub display_time_signature: bool,
    /// Zero-based index of the measure, shown as `measure_index + 1`
    pub measure_index: usize,
    pub show_measure_number: bool,
    /// Which system this stream is drawn on
    pub system_index: usize,
    /// Connector tags drawn between the first and last part of a system
    pub staff_connectors: Vec<String>,
    pub scale_factor: ScaleFactor,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            width: None,
            top: None,
            left: None,
            staff_padding: 60.0,
            staff_lines: 5,
            start_new_system: false,
            right_barline: None,
            display_clef: true,
            display_key_signature: true,
            display_time_signature: true,
            measure_index: 0,
            show_measure_number: false,
            system_index: 0,
            staff_connectors: vec!["single".into(), "brace".into()],
            scale_factor: ScaleFactor::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScaleFactor {
    pub x: f64,
    pub y: f64,
}

impl Default for ScaleFactor {
    fn default() -> Self {
        Self { x: 0.7, y: 0.7 }
    }
}

// ═══════════════════════════════════════════════════════════════════════
// Notes
// ═══════════════════════════════════════════════════════════════════════

/// A single note or rest.
#[derive(Debug, Serialize, Deserialize)]
pub struct GeneralNote {
    pub id: NoteId,
    /// Offset from the start of the containing stream, in quarter lengths
    pub offset: f64,
    /// None for zero-length elements such as grace notes
    pub duration: Option<Duration>,
    /// Pitch (None if this is a rest)
    pub pitch: Option<Pitch>,
    /// Tie marker: start, continue or stop
    pub tie: Option<TieType>,
    pub lyrics: Vec<Lyric>,
    /// Explicit stem direction
    pub stem: Option<StemDirection>,
}

impl Clone for GeneralNote {
    fn clone(&self) -> Self {
        Self { id: NoteId::next(), ..self.duplicate() }
    }
}

impl GeneralNote {
    /// Copy that keeps the id.
    pub fn duplicate(&self) -> Self {
        Self {
            id: self.id,
            offset: self.offset,
            duration: self.duration.clone(),
            pitch: self.pitch.clone(),
            tie: self.tie,
            lyrics: self.lyrics.clone(),
            stem: self.stem,
        }
    }

    pub fn note(pitch: Pitch, duration: Duration) -> Self {
        Self {
            id: NoteId::next(),
            offset: 0.0,
            duration: Some(duration),
            pitch: Some(pitch),
            tie: None,
            lyrics: Vec::new(),
            stem: None,
        }
    }

    pub fn rest(duration: Duration) -> Self {
        Self {
            pitch: None,
            ..Self::note(Pitch::new(Step::B, 4), duration)
        }
    }

    /// A note without a duration (e.g. a grace note).
    pub fn unmeasured(pitch: Pitch) -> Self {
        Self {
            duration: None,
            ..Self::note(pitch, Duration::new(DurationType::Eighth))
        }
    }

    pub fn with_tie(mut self, tie: TieType) -> Self {
        self.tie = Some(tie);
        self
    }

    pub fn with_lyric(mut self, lyric: Lyric) -> Self {
        self.lyrics.push(lyric);
        self
    }

    pub fn with_stem(mut self, stem: StemDirection) -> Self {
        self.stem = Some(stem);
        self
    }

    pub fn is_rest(&self) -> bool {
        self.pitch.is_none()
    }

    pub fn quarter_length(&self) -> f64 {
        self.duration.as_ref().map_or(0.0, Duration::quarter_length)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TieType {
    Start,
    Continue,
    Stop,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StemDirection {
    Up,
    Down,
}

// ═══════════════════════════════════════════════════════════════════════
// Durations and tuplets
// ═══════════════════════════════════════════════════════════════════════

/// Notated duration type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DurationType {
    Breve,
    Whole,
    Half,
    Quarter,
    Eighth,
    Sixteenth,
    ThirtySecond,
    SixtyFourth,
    OneTwentyEighth,
}

impl DurationType {
    /// Longest first.
    pub const ALL: [DurationType; 9] = [
        DurationType::Breve,
        DurationType::Whole,
        DurationType::Half,
        DurationType::Quarter,
        DurationType::Eighth,
        DurationType::Sixteenth,
        DurationType::ThirtySecond,
        DurationType::SixtyFourth,
        DurationType::OneTwentyEighth,
    ];

    pub fn quarter_length(self) -> f64 {
        match self {
            DurationType::Breve => 8.0,
            DurationType::Whole => 4.0,
            DurationType::Half => 2.0,
            DurationType::Quarter => 1.0,
            DurationType::Eighth => 0.5,
            DurationType::Sixteenth => 0.25,
            DurationType::ThirtySecond => 0.125,
            DurationType::SixtyFourth => 0.0625,
            DurationType::OneTwentyEighth => 0.03125,
        }
    }

    pub fn backend_code(self) -> &'static str {
        match self {
            DurationType::Breve => "1/2",
            DurationType::Whole => "w",
            DurationType::Half => "h",
            DurationType::Quarter => "q",
            DurationType::Eighth => "8",
            DurationType::Sixteenth => "16",
            DurationType::ThirtySecond => "32",
            DurationType::SixtyFourth => "64",
            DurationType::OneTwentyEighth => "128",
        }
    }

    /// The next shorter type (half the length).
    pub fn shorter(self) -> Option<Self> {
        let idx = Self::ALL.iter().position(|&t| t == self)?;
        Self::ALL.get(idx + 1).copied()
    }

    /// Number of flags/beams an unbeamed note of this type carries.
    pub fn flags(self) -> u8 {
        match self {
            DurationType::Eighth => 1,
            DurationType::Sixteenth => 2,
            DurationType::ThirtySecond => 3,
            DurationType::SixtyFourth => 4,
            DurationType::OneTwentyEighth => 5,
            _ => 0,
        }
    }
}

/// A notated duration: type, dots and (at most one honoured) tuplet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Duration {
    pub duration_type: DurationType,
    pub dots: u8,
    pub tuplets: Vec<Tuplet>,
}

impl Duration {
    pub fn new(duration_type: DurationType) -> Self {
        Self { duration_type, dots: 0, tuplets: Vec::new() }
    }

    pub fn dotted(duration_type: DurationType, dots: u8) -> Self {
        Self { duration_type, dots, tuplets: Vec::new() }
    }

    pub fn with_tuplet(mut self, tuplet: Tuplet) -> Self {
        self.tuplets.push(tuplet);
        self
    }

    /// Find the plain (non-tuplet) duration with up to three dots that lasts
    /// exactly `ql` quarter notes.
    pub fn from_quarter_length(ql: f64) -> Option<Self> {
        DurationType::ALL.iter().find_map(|&t| {
            (0..=3u8)
                .map(|dots| Self::dotted(t, dots))
                .find(|d| (d.quarter_length() - ql).abs() < 1e-9)
        })
    }

    pub fn quarter_length(&self) -> f64 {
        let dot_factor = 2.0 - 0.5f64.powi(self.dots as i32);
        let tuplet_factor: f64 = self.tuplets.iter().map(Tuplet::ratio).product();
        self.duration_type.quarter_length() * dot_factor * tuplet_factor
    }

    pub fn ticks(&self) -> u32 {
        (self.quarter_length() * TICKS_PER_QUARTER).round() as u32
    }

    /// Backend duration code, e.g. `"q"`, `"8d"`, `"16"`.
    pub fn backend_code(&self) -> String {
        let mut code = self.duration_type.backend_code().to_string();
        for _ in 0..self.dots {
            code.push('d');
        }
        code
    }

    /// One type shorter with the same dots and tuplets: exactly half as long.
    pub fn halved(&self) -> Option<Self> {
        Some(Self {
            duration_type: self.duration_type.shorter()?,
            dots: self.dots,
            tuplets: self.tuplets.clone(),
        })
    }
}

/// How a tuplet bracket labels itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TupletShow {
    Number,
    Ratio,
    None,
}

/// `number_notes_actual` notes in the time of `number_notes_normal` notes of
/// `duration_type`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tuplet {
    pub number_notes_actual: u32,
    pub number_notes_normal: u32,
    pub duration_type: DurationType,
    pub normal_show: TupletShow,
}

impl Tuplet {
    pub fn new(actual: u32, normal: u32, duration_type: DurationType) -> Self {
        Self {
            number_notes_actual: actual,
            number_notes_normal: normal,
            duration_type,
            normal_show: TupletShow::Number,
        }
    }

    pub fn triplet(duration_type: DurationType) -> Self {
        Self::new(3, 2, duration_type)
    }

    pub fn with_show(mut self, show: TupletShow) -> Self {
        self.normal_show = show;
        self
    }

    pub fn ratio(&self) -> f64 {
        if self.number_notes_actual == 0 {
            return 1.0;
        }
        self.number_notes_normal as f64 / self.number_notes_actual as f64
    }

    /// Quarter length the whole tuplet group sums to.
    pub fn total_tuplet_length(&self) -> f64 {
        self.number_notes_normal as f64 * self.duration_type.quarter_length()
    }
}

// ═══════════════════════════════════════════════════════════════════════
// Pitch, clef, key, time
// ═══════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Step {
    C,
    D,
    E,
    F,
    G,
    A,
    B,
}

impl Step {
    /// C = 0 … B = 6
    pub fn index(self) -> i32 {
        match self {
            Step::C => 0,
            Step::D => 1,
            Step::E => 2,
            Step::F => 3,
            Step::G => 4,
            Step::A => 5,
            Step::B => 6,
        }
    }

    pub fn name(self) -> char {
        match self {
            Step::C => 'C',
            Step::D => 'D',
            Step::E => 'E',
            Step::F => 'F',
            Step::G => 'G',
            Step::A => 'A',
            Step::B => 'B',
        }
    }

    fn from_char(c: char) -> Option<Self> {
        match c.to_ascii_uppercase() {
            'C' => Some(Step::C),
            'D' => Some(Step::D),
            'E' => Some(Step::E),
            'F' => Some(Step::F),
            'G' => Some(Step::G),
            'A' => Some(Step::A),
            'B' => Some(Step::B),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Accidental {
    DoubleFlat,
    Flat,
    Natural,
    Sharp,
    DoubleSharp,
}

impl Accidental {
    /// The accidental that spells `alter`; naturals are never implied.
    pub fn from_alter(alter: f64) -> Option<Self> {
        match alter.round() as i32 {
            -2 => Some(Accidental::DoubleFlat),
            -1 => Some(Accidental::Flat),
            1 => Some(Accidental::Sharp),
            2 => Some(Accidental::DoubleSharp),
            _ => None,
        }
    }

    /// Backend code: `"bb"`, `"b"`, `"n"`, `"#"`, `"##"`.
    pub fn code(self) -> &'static str {
        match self {
            Accidental::DoubleFlat => "bb",
            Accidental::Flat => "b",
            Accidental::Natural => "n",
            Accidental::Sharp => "#",
            Accidental::DoubleSharp => "##",
        }
    }
}

/// Pitch of a note.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pitch {
    pub step: Step,
    /// Octave number (middle C = C4)
    pub octave: i32,
    /// Chromatic alteration: -1.0 = flat, 1.0 = sharp, 0.0 = natural
    pub alter: f64,
}

impl Pitch {
    pub fn new(step: Step, octave: i32) -> Self {
        Self { step, octave, alter: 0.0 }
    }

    pub fn with_alter(mut self, alter: f64) -> Self {
        self.alter = alter;
        self
    }

    /// Diatonic number: C4 = 29, E4 = 31, G2 = 19.
    pub fn diatonic_note_num(&self) -> i32 {
        self.step.index() + 1 + 7 * self.octave
    }

    /// Backend key name, e.g. `"c#/4"`.
    pub fn backend_key(&self) -> String {
        let acc = Accidental::from_alter(self.alter).map_or("", Accidental::code);
        format!("{}{}/{}", self.step.name().to_ascii_lowercase(), acc, self.octave)
    }
}

impl FromStr for Pitch {
    type Err = String;

    /// Parse names like `"C4"`, `"F#5"`, `"Bb3"`, `"E--2"`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut chars = s.chars();
        let step = chars
            .next()
            .and_then(Step::from_char)
            .ok_or_else(|| format!("Invalid pitch name '{s}'"))?;
        let rest: String = chars.collect();
        let split = rest.find(|c: char| c.is_ascii_digit()).unwrap_or(rest.len());
        let (acc, octave) = rest.split_at(split);
        let alter = match acc {
            "" => 0.0,
            "#" => 1.0,
            "##" => 2.0,
            "b" | "-" => -1.0,
            "bb" | "--" => -2.0,
            _ => return Err(format!("Invalid accidental in pitch '{s}'")),
        };
        let octave = octave
            .parse::<i32>()
            .map_err(|e| format!("Invalid octave in pitch '{s}': {e}"))?;
        Ok(Self { step, octave, alter })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ClefSign {
    G,
    F,
    C,
    Percussion,
}

/// Clef definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Clef {
    pub sign: ClefSign,
    /// Staff line the clef sits on (1 = bottom)
    pub line: i32,
    /// Octave transposition (e.g. -1 for the guitar's octave-lower treble clef)
    pub octave_change: i32,
}

impl Clef {
    pub fn treble() -> Self {
        Self { sign: ClefSign::G, line: 2, octave_change: 0 }
    }

    pub fn bass() -> Self {
        Self { sign: ClefSign::F, line: 4, octave_change: 0 }
    }

    pub fn alto() -> Self {
        Self { sign: ClefSign::C, line: 3, octave_change: 0 }
    }

    pub fn tenor() -> Self {
        Self { sign: ClefSign::C, line: 4, octave_change: 0 }
    }

    pub fn percussion() -> Self {
        Self { sign: ClefSign::Percussion, line: 3, octave_change: 0 }
    }

    pub fn with_octave_change(mut self, octave_change: i32) -> Self {
        self.octave_change = octave_change;
        self
    }

    /// Backend clef name.
    pub fn name(&self) -> &'static str {
        match (self.sign, self.line) {
            (ClefSign::G, 1) => "french",
            (ClefSign::G, _) => "treble",
            (ClefSign::F, 3) => "baritone-f",
            (ClefSign::F, 5) => "subbass",
            (ClefSign::F, _) => "bass",
            (ClefSign::C, 1) => "soprano",
            (ClefSign::C, 2) => "mezzo-soprano",
            (ClefSign::C, 4) => "tenor",
            (ClefSign::C, 5) => "baritone-c",
            (ClefSign::C, _) => "alto",
            (ClefSign::Percussion, _) => "percussion",
        }
    }

    /// Diatonic number of the bottom staff line (treble = 31, bass = 19).
    pub fn first_line(&self) -> i32 {
        let reference = match self.sign {
            ClefSign::G => 33, // G4
            ClefSign::F => 25, // F3
            ClefSign::C => 29, // C4
            ClefSign::Percussion => return 31 + 7 * self.octave_change,
        };
        reference - 2 * (self.line - 1) + 7 * self.octave_change
    }

    pub fn octave_shift(&self) -> i32 {
        self.octave_change
    }
}

impl Default for Clef {
    fn default() -> Self {
        Self::treble()
    }
}

/// Key signature.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Key {
    /// Number of sharps (positive) or flats (negative)
    pub fifths: i32,
    /// Mode (e.g., "major", "minor")
    pub mode: Option<String>,
}

const MAJOR_KEYS: [&str; 15] = [
    "Cb", "Gb", "Db", "Ab", "Eb", "Bb", "F", "C", "G", "D", "A", "E", "B", "F#", "C#",
];
const MINOR_KEYS: [&str; 15] = [
    "Ab", "Eb", "Bb", "F", "C", "G", "D", "A", "E", "B", "F#", "C#", "G#", "D#", "A#",
];
const SHARP_ORDER: [Step; 7] = [Step::F, Step::C, Step::G, Step::D, Step::A, Step::E, Step::B];

impl Key {
    pub fn new(fifths: i32) -> Self {
        Self { fifths, mode: None }
    }

    pub fn minor(fifths: i32) -> Self {
        Self { fifths, mode: Some("minor".into()) }
    }

    /// Backend key name, e.g. `"Bb"` or `"F#m"`.
    pub fn backend_name(&self) -> String {
        let idx = (self.fifths.clamp(-7, 7) + 7) as usize;
        if self.mode.as_deref() == Some("minor") {
            format!("{}m", MINOR_KEYS[idx])
        } else {
            MAJOR_KEYS[idx].to_string()
        }
    }

    /// Inverse of [`Key::backend_name`].
    pub fn from_backend_name(name: &str) -> Option<Self> {
        let (table, tonic, mode) = match name.strip_suffix('m') {
            Some(tonic) => (&MINOR_KEYS, tonic, Some("minor".to_string())),
            None => (&MAJOR_KEYS, name, None),
        };
        let idx = table.iter().position(|&k| k == tonic)?;
        Some(Self { fifths: idx as i32 - 7, mode })
    }

    /// Alteration the signature applies to `step`.
    pub fn alter_for(&self, step: Step) -> f64 {
        let count = self.fifths.unsigned_abs().min(7) as usize;
        if self.fifths > 0 && SHARP_ORDER[..count].contains(&step) {
            1.0
        } else if self.fifths < 0 && SHARP_ORDER.iter().rev().take(count).any(|&s| s == step) {
            -1.0
        } else {
            0.0
        }
    }
}

/// Time signature.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeSignature {
    /// Numerator (e.g., 3 in 3/4)
    pub beats: u32,
    /// Denominator (e.g., 4 in 3/4)
    pub beat_type: u32,
}

impl TimeSignature {
    pub fn bar_quarter_length(&self) -> f64 {
        self.beats as f64 * 4.0 / self.beat_type.max(1) as f64
    }
}

impl fmt::Display for TimeSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.beats, self.beat_type)
    }
}

// ═══════════════════════════════════════════════════════════════════════
// Lyrics
// ═══════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Syllabic {
    Begin,
    Middle,
    End,
    Single,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Lyric {
    pub text: Option<String>,
    pub syllabic: Option<Syllabic>,
    /// Glyph joining this syllable to the next (usually a hyphen)
    pub connector: String,
}

impl Lyric {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: Some(text.into()), syllabic: None, connector: "-".into() }
    }

    pub fn syllable(text: impl Into<String>, syllabic: Syllabic) -> Self {
        Self { syllabic: Some(syllabic), ..Self::new(text) }
    }
}
