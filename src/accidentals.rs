//! Accidental display.
//!
//! Which notes show an accidental is decided once per flat note sequence and
//! returned as a side table; the notes themselves are left untouched.

use std::collections::HashMap;

use crate::model::{Accidental, GeneralNote, Key, NoteId, Step, TieType};

/// Decides which notes in a flat sequence display an accidental.
pub trait AccidentalSpeller {
    fn make_accidentals(&self, notes: &[&GeneralNote], key: Option<&Key>) -> HashMap<NoteId, Accidental>;
}

/// Shows an accidental when a pitch's alteration differs from what the key
/// signature and the earlier notes of the sequence imply for that step and
/// octave. Notes continuing a tie never show one.
#[derive(Debug, Default, Clone, Copy)]
pub struct KeyAccidentals;

impl AccidentalSpeller for KeyAccidentals {
    fn make_accidentals(&self, notes: &[&GeneralNote], key: Option<&Key>) -> HashMap<NoteId, Accidental> {
        let mut in_effect: HashMap<(Step, i32), f64> = HashMap::new();
        let mut shown = HashMap::new();

        for note in notes {
            let Some(ref pitch) = note.pitch else { continue };
            let slot = (pitch.step, pitch.octave);
            let expected = in_effect
                .get(&slot)
                .copied()
                .unwrap_or_else(|| key.map_or(0.0, |k| k.alter_for(pitch.step)));
            in_effect.insert(slot, pitch.alter);

            if matches!(note.tie, Some(TieType::Continue) | Some(TieType::Stop)) {
                continue;
            }
            if (pitch.alter - expected).abs() > 1e-9 {
                let acc = Accidental::from_alter(pitch.alter).unwrap_or(Accidental::Natural);
                shown.insert(note.id, acc);
            }
        }
        shown
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Duration, DurationType, Pitch};

    fn note(name: &str) -> GeneralNote {
        GeneralNote::note(name.parse::<Pitch>().unwrap(), Duration::new(DurationType::Quarter))
    }

    #[test]
    fn key_signature_suppresses_accidentals() {
        let notes = [note("F#4"), note("C#5"), note("G4")];
        let refs: Vec<&GeneralNote> = notes.iter().collect();
        let shown = KeyAccidentals.make_accidentals(&refs, Some(&Key::new(2)));
        assert!(shown.is_empty());
    }

    #[test]
    fn accidentals_carry_through_the_sequence() {
        let notes = [note("F#4"), note("F#4"), note("F4"), note("F#5")];
        let refs: Vec<&GeneralNote> = notes.iter().collect();
        let shown = KeyAccidentals.make_accidentals(&refs, None);
        assert_eq!(shown.get(&notes[0].id), Some(&Accidental::Sharp));
        assert_eq!(shown.get(&notes[1].id), None);
        assert_eq!(shown.get(&notes[2].id), Some(&Accidental::Natural));
        assert_eq!(shown.get(&notes[3].id), Some(&Accidental::Sharp));
    }

    #[test]
    fn tied_continuation_shows_nothing() {
        let notes = [note("Bb4").with_tie(TieType::Start), note("Bb4").with_tie(TieType::Stop)];
        let refs: Vec<&GeneralNote> = notes.iter().collect();
        let shown = KeyAccidentals.make_accidentals(&refs, None);
        assert_eq!(shown.len(), 1);
        assert_eq!(shown.get(&notes[0].id), Some(&Accidental::Flat));
    }
}
