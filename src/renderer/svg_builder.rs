//! SVG builder — accumulates SVG elements and produces the final string.

use std::fmt::Write;

use crate::model::ScaleFactor;
use super::constants::*;

// ═══════════════════════════════════════════════════════════════════════
// SvgBuilder
// ═══════════════════════════════════════════════════════════════════════

#[derive(Debug, Default, Clone)]
pub(super) struct SvgBuilder {
    pub(super) elements: Vec<String>,
}

/// Attribute value, rendered with one decimal for numbers.
enum Attr<'a> {
    Num(f64),
    Str(&'a str),
}

fn escape(content: &str) -> String {
    content
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

impl SvgBuilder {
    pub(super) fn new() -> Self {
        Self { elements: Vec::new() }
    }

    /// One element; self-closing when `body` is `None`.
    fn element(&mut self, tag: &str, attrs: &[(&str, Attr<'_>)], body: Option<&str>) {
        let mut el = format!("<{tag}");
        for (name, value) in attrs {
            // writing to a String cannot fail
            let _ = match value {
                Attr::Num(n) => write!(el, r#" {name}="{n:.1}""#),
                Attr::Str(s) => write!(el, r#" {name}="{}""#, escape(s)),
            };
        }
        match body {
            Some(body) => {
                let _ = write!(el, ">{}</{tag}>", escape(body));
            }
            None => el.push_str("/>"),
        }
        self.elements.push(el);
    }

    /// Wrap the elements in a document of the given unscaled size.
    pub(super) fn build(&self, width: f64, height: f64, scale: ScaleFactor) -> String {
        let (w, h) = (width * scale.x, height * scale.y);
        let mut svg = format!(
            r#"<svg xmlns="http://www.w3.org/2000/svg" viewBox="0 0 {w:.1} {h:.1}" width="{w:.1}" height="{h:.1}" style="font-family: serif;">"#
        );
        let _ = writeln!(svg);
        let _ = writeln!(svg, r#"<g transform="scale({},{})">"#, scale.x, scale.y);
        for el in &self.elements {
            let _ = writeln!(svg, "  {el}");
        }
        svg.push_str("</g>\n</svg>\n");
        svg
    }

    pub(super) fn line(&mut self, x1: f64, y1: f64, x2: f64, y2: f64, color: &str, width: f64) {
        use Attr::*;
        self.element(
            "line",
            &[
                ("x1", Num(x1)),
                ("y1", Num(y1)),
                ("x2", Num(x2)),
                ("y2", Num(y2)),
                ("stroke", Str(color)),
                ("stroke-width", Num(width)),
            ],
            None,
        );
    }

    pub(super) fn rect(&mut self, x: f64, y: f64, w: f64, h: f64, fill: &str) {
        use Attr::*;
        self.element(
            "rect",
            &[("x", Num(x)), ("y", Num(y)), ("width", Num(w)), ("height", Num(h)), ("fill", Str(fill))],
            None,
        );
    }

    pub(super) fn circle(&mut self, cx: f64, cy: f64, r: f64, fill: &str) {
        use Attr::*;
        self.element("circle", &[("cx", Num(cx)), ("cy", Num(cy)), ("r", Num(r)), ("fill", Str(fill))], None);
    }

    pub(super) fn text(&mut self, x: f64, y: f64, content: &str, size: f64, weight: &str, fill: &str, anchor: &str) {
        use Attr::*;
        self.element(
            "text",
            &[
                ("x", Num(x)),
                ("y", Num(y)),
                ("font-size", Num(size)),
                ("font-weight", Str(weight)),
                ("fill", Str(fill)),
                ("text-anchor", Str(anchor)),
            ],
            Some(content),
        );
    }

    /// Text in an explicit font family (lyrics).
    pub(super) fn styled_text(&mut self, x: f64, y: f64, content: &str, family: &str, size: f64, weight: &str, anchor: &str) {
        use Attr::*;
        let weight = if weight.is_empty() { "normal" } else { weight };
        self.element(
            "text",
            &[
                ("x", Num(x)),
                ("y", Num(y)),
                ("font-family", Str(family)),
                ("font-size", Num(size)),
                ("font-weight", Str(weight)),
                ("fill", Str(TEXT_COLOR)),
                ("text-anchor", Str(anchor)),
            ],
            Some(content),
        );
    }

    pub(super) fn path(&mut self, d: &str, fill: &str, stroke: &str, stroke_width: f64) {
        use Attr::*;
        self.element(
            "path",
            &[("d", Str(d)), ("fill", Str(fill)), ("stroke", Str(stroke)), ("stroke-width", Num(stroke_width))],
            None,
        );
    }

    /// Tilted oval; hollow heads are stroked instead of filled.
    pub(super) fn notehead(&mut self, cx: f64, cy: f64, filled: bool) {
        use Attr::*;
        let rotate = format!("rotate(-15,{cx:.1},{cy:.1})");
        if filled {
            self.element(
                "ellipse",
                &[
                    ("cx", Num(cx)),
                    ("cy", Num(cy)),
                    ("rx", Num(NOTEHEAD_RX)),
                    ("ry", Num(NOTEHEAD_RY)),
                    ("fill", Str(NOTE_COLOR)),
                    ("transform", Str(&rotate)),
                ],
                None,
            );
        } else {
            let stroke = 2.0;
            self.element(
                "ellipse",
                &[
                    ("cx", Num(cx)),
                    ("cy", Num(cy)),
                    ("rx", Num(NOTEHEAD_RX - stroke / 2.0)),
                    ("ry", Num(NOTEHEAD_RY - stroke / 2.0)),
                    ("fill", Str("none")),
                    ("stroke", Str(NOTE_COLOR)),
                    ("stroke-width", Num(stroke)),
                    ("transform", Str(&rotate)),
                ],
                None,
            );
        }
    }

    /// A filled parallelogram of the given thickness between two points.
    pub(super) fn beam_line(&mut self, x1: f64, y1: f64, x2: f64, y2: f64, thickness: f64) {
        let (dx, dy) = (x2 - x1, y2 - y1);
        let len = dx.hypot(dy).max(0.1);
        let (nx, ny) = (-dy / len * thickness / 2.0, dx / len * thickness / 2.0);
        let corners = [(x1 + nx, y1 + ny), (x2 + nx, y2 + ny), (x2 - nx, y2 - ny), (x1 - nx, y1 - ny)];

        let mut d = String::new();
        for (i, (x, y)) in corners.iter().enumerate() {
            let _ = write!(d, "{}{x:.1},{y:.1} ", if i == 0 { 'M' } else { 'L' });
        }
        d.push('Z');
        self.element("path", &[("d", Attr::Str(&d)), ("fill", Attr::Str(NOTE_COLOR))], None);
    }

    pub(super) fn len(&self) -> usize {
        self.elements.len()
    }
}

// ═══════════════════════════════════════════════════════════════════════
// Empty SVG fallback
// ═══════════════════════════════════════════════════════════════════════

/// A small document carrying only `message`.
pub(super) fn empty_svg(message: &str) -> String {
    let mut svg = SvgBuilder::new();
    svg.text(200.0, 50.0, message, 14.0, "normal", "gray", "middle");
    svg.build(400.0, 100.0, ScaleFactor { x: 1.0, y: 1.0 })
}
