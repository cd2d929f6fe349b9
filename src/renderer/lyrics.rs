//! Lyric extraction: text tickables that line up under the notes.

use crate::config::LayoutConfig;
use crate::error::{LayoutError, Result};
use crate::model::*;
use super::backend::{Justification, NotationBackend, StaveId, TextSpec, TickableId};

/// Build the text tickables for one flat stream.
///
/// Every element yields one tickable spanning its duration. A `begin` or
/// `middle` syllable is split into the syllable and its connector, each at
/// half the duration.
pub(super) fn extract_lyrics<B: NotationBackend>(
    backend: &mut B,
    stream: &Stream,
    stave: StaveId,
    config: &LayoutConfig,
) -> Result<Vec<TickableId>> {
    let mut out = Vec::with_capacity(stream.len());

    for (index, element) in stream.elements.iter().enumerate() {
        let duration = element
            .as_note()
            .and_then(|n| n.duration.as_ref().map(|d| (n, d)));
        let Some((note, duration)) = duration else {
            return Err(LayoutError::MissingDuration { stream: stream.id, index });
        };

        let (text, connector) = match note.lyrics.first() {
            None => (String::new(), None),
            Some(lyric) => {
                let text = lyric.text.clone().unwrap_or_default();
                match lyric.syllabic {
                    Some(Syllabic::Begin) | Some(Syllabic::Middle) => {
                        (text, Some(format!(" {}", lyric.connector)))
                    }
                    _ => (text, None),
                }
            }
        };

        let duration = if connector.is_some() {
            half_of(duration)
        } else {
            duration.clone()
        };

        out.push(text_note(backend, text, &duration, stave, config)?);
        if let Some(connector) = connector {
            out.push(text_note(backend, connector, &duration, stave, config)?);
        }
    }

    Ok(out)
}

/// Exactly half of `duration`. Below the shortest notated type the half is
/// written as a 2:1 tuplet.
fn half_of(duration: &Duration) -> Duration {
    duration
        .halved()
        .or_else(|| Duration::from_quarter_length(duration.quarter_length() / 2.0))
        .unwrap_or_else(|| duration.clone().with_tuplet(Tuplet::new(2, 1, duration.duration_type)))
}

fn text_note<B: NotationBackend>(
    backend: &mut B,
    text: String,
    duration: &Duration,
    stave: StaveId,
    config: &LayoutConfig,
) -> Result<TickableId> {
    let spec = TextSpec {
        text,
        font: config.lyric_font.clone(),
        duration: duration.clone(),
        line: config.lyric_line,
        justification: Justification::Left,
    };
    Ok(backend.text_tickable(&spec, stave)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::renderer::svg_backend::SvgBackend;

    fn ticks_of(stream: &Stream) -> Vec<u64> {
        let mut backend = SvgBackend::new();
        let stave = backend.new_stave(0.0, 0.0, 300.0);
        let lyrics = extract_lyrics(&mut backend, stream, stave, &LayoutConfig::default()).unwrap();
        lyrics.iter().map(|&t| backend.ticks(t).unwrap()).collect()
    }

    #[test]
    fn split_syllable_keeps_the_note_length() {
        let dotted = GeneralNote::note(Pitch::new(Step::C, 5), Duration::dotted(DurationType::Quarter, 1))
            .with_lyric(Lyric::syllable("so", Syllabic::Middle));
        assert_eq!(ticks_of(&Stream::measure(vec![dotted])), vec![3072, 3072]);
    }

    #[test]
    fn shortest_note_still_splits_in_half() {
        let note = GeneralNote::note(Pitch::new(Step::C, 5), Duration::new(DurationType::OneTwentyEighth))
            .with_lyric(Lyric::syllable("la", Syllabic::Begin));
        assert_eq!(ticks_of(&Stream::measure(vec![note])), vec![64, 64]);
    }
}
