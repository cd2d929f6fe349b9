//! Rendering tests — build streams in code and draw them to SVG.

use scorelayout::*;
use std::path::PathBuf;

fn output_dir() -> PathBuf {
    let dir = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("test_output");
    std::fs::create_dir_all(&dir).ok();
    dir
}

fn write_output(name: &str, svg: &str) {
    let out = output_dir().join(name);
    std::fs::write(&out, svg).expect("Failed to write SVG");
    println!("✓ Rendered {name} ({} bytes)", svg.len());
    println!("  Output: {}", out.display());
}

fn notes(pitches: &[&str], duration_type: DurationType) -> Vec<GeneralNote> {
    pitches
        .iter()
        .map(|p| GeneralNote::note(p.parse().unwrap(), Duration::new(duration_type)))
        .collect()
}

/// A short lead sheet: melody with lyrics over a bass line, two systems.
fn lead_sheet() -> Stream {
    let mut first = notes(&["G4", "G4", "A4", "G4"], DurationType::Quarter);
    first[0] = first[0].clone().with_lyric(Lyric::syllable("Hap", Syllabic::Begin));
    first[1] = first[1].clone().with_lyric(Lyric::syllable("py", Syllabic::End));
    first[2] = first[2].clone().with_lyric(Lyric::new("birth"));
    first[3] = first[3].clone().with_lyric(Lyric::new("day"));

    let mut second = notes(&["C5", "B4"], DurationType::Half);
    second[1] = second[1].clone().with_tie(TieType::Start);
    let mut third = notes(&["B4", "A4"], DurationType::Half);
    third[0] = third[0].clone().with_tie(TieType::Stop);

    let melody = Stream::part(vec![
        Stream::measure(first).with_time_signature(4, 4).with_key(Key::new(1)),
        Stream::measure(second),
        Stream::measure(third)
            .with_render_options(RenderOptions { start_new_system: true, ..Default::default() }),
    ]);
    let bass = Stream::part(vec![
        Stream::measure(notes(&["G2"], DurationType::Whole))
            .with_clef(Clef::bass())
            .with_time_signature(4, 4)
            .with_key(Key::new(1)),
        Stream::measure(notes(&["C3", "D3"], DurationType::Half)),
        Stream::measure(notes(&["G2"], DurationType::Whole))
            .with_render_options(RenderOptions { start_new_system: true, ..Default::default() }),
    ]);
    Stream::score(vec![melody, bass])
}

#[test]
fn render_lead_sheet_svg() {
    let score = lead_sheet();
    let svg = render_stream_to_svg(&score, &LayoutConfig::default()).expect("Failed to render lead sheet");

    // Basic SVG structure checks
    assert!(svg.starts_with("<svg"), "Output should be SVG");
    assert!(svg.contains("</svg>"), "SVG should be closed");

    // Should have staff lines
    assert!(svg.contains("<line"), "SVG should contain lines (staff lines)");

    // Should have noteheads
    assert!(svg.contains("<ellipse"), "SVG should contain ellipses (noteheads)");

    // Lyrics and the hyphen between syllables
    assert!(svg.contains(">Hap<"), "SVG should contain lyric syllables");
    assert!(svg.contains("> -<"), "SVG should contain the syllable connector");

    // Ties and braces are paths
    assert!(svg.contains("<path"), "SVG should contain tie curves");

    write_output("lead-sheet.svg", &svg);
}

#[test]
fn render_triplets_and_beams_svg() {
    let triplet = Tuplet::triplet(DurationType::Eighth);
    let mut bar: Vec<GeneralNote> = ["E5", "D5", "C5"]
        .iter()
        .map(|p| {
            GeneralNote::note(
                p.parse().unwrap(),
                Duration::new(DurationType::Eighth).with_tuplet(triplet.clone()),
            )
        })
        .collect();
    bar.extend(notes(&["B4", "C5", "D5", "E5", "F5", "G5"], DurationType::Eighth));
    let measure = Stream::measure(bar).with_time_signature(4, 4);

    let svg = render_stream_to_svg(&measure, &LayoutConfig::default()).unwrap();
    assert!(svg.starts_with("<svg"));
    assert!(svg.contains(">3<"), "SVG should contain the tuplet number");
    write_output("triplets.svg", &svg);
}

#[test]
fn render_produces_valid_svg_dimensions() {
    let score = lead_sheet();
    let svg = render_stream_to_svg(&score, &LayoutConfig::default()).unwrap();

    assert!(svg.contains("viewBox="), "SVG should have viewBox");
    assert!(svg.contains("width="), "SVG should have width");
    assert!(svg.contains("height="), "SVG should have height");
}

#[test]
fn scale_factor_of_the_root_reaches_the_svg() {
    let options = RenderOptions { scale_factor: ScaleFactor { x: 0.5, y: 0.5 }, ..Default::default() };
    let measure = Stream::measure(notes(&["C4"], DurationType::Whole)).with_render_options(options);
    let svg = render_stream_to_svg(&measure, &LayoutConfig::default()).unwrap();
    assert!(svg.contains("scale(0.5,0.5)"));
}

#[test]
fn empty_stream_renders_placeholder() {
    let svg = render_stream_to_svg(&Stream::score(Vec::new()), &LayoutConfig::default()).unwrap();
    assert!(svg.starts_with("<svg"));
    assert!(svg.contains("Nothing to render"));
}

#[test]
fn render_all_clefs_svg() {
    let clefs = [Clef::treble(), Clef::bass(), Clef::alto(), Clef::tenor(), Clef::percussion()];
    let measures = clefs
        .into_iter()
        .enumerate()
        .map(|(i, clef)| {
            let options = RenderOptions { start_new_system: i > 0, ..Default::default() };
            Stream::measure(notes(&["C4", "E4", "G4", "C5"], DurationType::Quarter))
                .with_clef(clef)
                .with_render_options(options)
        })
        .collect();
    let part = Stream::part(measures);

    let mut renderer = Renderer::new(SvgBackend::new());
    renderer.render(&part).expect("Failed to render clefs");
    assert_eq!(renderer.backend().stave_count(), 5);
    assert!(renderer.diagnostics().is_empty());

    let svg = renderer.into_backend().build();
    write_output("clefs.svg", &svg);
}
