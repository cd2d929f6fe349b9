//! scorelayout — lays out notation streams (scores, parts, measures, voices)
//! on a pluggable notation backend and records where every note landed.
//!
//! The crate ships [`SvgBackend`], a self-contained backend that draws plain
//! SVG, so a stream can be rendered without any external engraver.
//!
//! # Example
//! ```
//! use scorelayout::{render_stream_to_svg, Duration, DurationType, GeneralNote, LayoutConfig, Stream};
//!
//! let notes = ["C4", "E4", "G4", "C5"]
//!     .iter()
//!     .map(|p| GeneralNote::note(p.parse().unwrap(), Duration::new(DurationType::Quarter)))
//!     .collect();
//! let measure = Stream::measure(notes).with_time_signature(4, 4);
//! let svg = render_stream_to_svg(&measure, &LayoutConfig::default()).unwrap();
//! assert!(svg.starts_with("<svg"));
//! ```

pub mod accidentals;
pub mod config;
pub mod diagnostics;
pub mod error;
pub mod model;
pub mod renderer;

pub use accidentals::{AccidentalSpeller, KeyAccidentals};
pub use config::{FontSpec, LayoutConfig};
pub use diagnostics::{Diagnostic, DiagnosticKind, Diagnostics, Severity};
pub use error::{BackendError, LayoutError, Result};
pub use model::*;
pub use renderer::backend::NotationBackend;
pub use renderer::svg_backend::SvgBackend;
pub use renderer::{Annotations, NoteLayout, Renderer};

/// Lay out and draw a stream with the SVG backend.
pub fn render_stream_to_svg(stream: &Stream, config: &LayoutConfig) -> Result<String> {
    let mut renderer = Renderer::with_config(SvgBackend::new(), config.clone());
    renderer.render(stream)?;
    Ok(renderer.into_backend().build())
}

/// Serialize layout results to JSON.
/// Useful for handing positions to another process.
pub fn annotations_to_json(annotations: &Annotations) -> Result<String> {
    Ok(serde_json::to_string_pretty(annotations)?)
}
