//! Per-system aggregate of the voice and lyric tracks laid out together.

use crate::model::{Clef, NoteId, Stream, TimeSignature};
use super::backend::{StaveId, TickableId, VoiceId};

/// A backend voice holding the tickables of one source stream.
#[derive(Debug, Clone)]
pub struct Track {
    pub voice: VoiceId,
    pub stave: StaveId,
    /// Source note → tickable, in stream order
    pub tickables: Vec<(NoteId, TickableId)>,
    pub system_index: usize,
    /// Clef in effect, for vertical positions
    pub clef: Clef,
    /// Time signature in effect, for beam groups
    pub time_signature: Option<TimeSignature>,
}

#[derive(Debug, Clone)]
pub struct LyricTrack {
    pub voice: VoiceId,
    pub stave: StaveId,
    pub tickables: Vec<TickableId>,
}

/// `voices[i]` and `streams[i]` always describe the same source stream.
#[derive(Debug, Clone, Default)]
pub struct RenderStack<'s> {
    pub voices: Vec<Track>,
    pub streams: Vec<&'s Stream>,
    pub text_voices: Vec<LyricTrack>,
}

impl<'s> RenderStack<'s> {
    pub fn new() -> Self {
        Self { voices: Vec::new(), streams: Vec::new(), text_voices: Vec::new() }
    }

    pub(super) fn push(&mut self, track: Track, stream: &'s Stream) {
        self.voices.push(track);
        self.streams.push(stream);
    }

    /// Music voices followed by lyric voices, each with its stave.
    pub fn all_tickables(&self) -> Vec<(VoiceId, StaveId)> {
        self.voices
            .iter()
            .map(|t| (t.voice, t.stave))
            .chain(self.text_voices.iter().map(|t| (t.voice, t.stave)))
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.voices.is_empty()
    }
}
