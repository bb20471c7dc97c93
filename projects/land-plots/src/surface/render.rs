//! Drawing backends for the capture surface.
//!
//! [`Canvas`] is the small set of primitives a full redraw needs. The surface
//! decides what to draw; a canvas decides how. [`SvgCanvas`] produces a
//! standalone SVG document that the web layer serves as-is.
//!
//! Coordinates are surface pixels with the origin at the top-left corner.

use crate::surface::color::Color;
use crate::surface::types::Point;
use std::fmt::Write;

pub const LABEL_FONT_SIZE: f64 = 12.0;

pub trait Canvas {
    /// Wipe the surface and set its size.
    fn clear(&mut self, width: u32, height: u32);

    /// Fill the closed polygon through `points`.
    fn fill_polygon(&mut self, points: &[Point], color: Color);

    /// Stroke a path through `points`, joining last to first when `closed`.
    fn stroke_path(&mut self, points: &[Point], color: Color, width: f64, closed: bool);

    /// Draw `text` centered at `at`.
    fn fill_text(&mut self, text: &str, at: Point, color: Color);
}

/// Canvas that writes SVG markup
#[derive(Debug, Default)]
pub struct SvgCanvas {
    width: u32,
    height: u32,
    body: String,
}

impl SvgCanvas {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn finish(self) -> String {
        format!(
            "<svg xmlns=\"http://www.w3.org/2000/svg\" width=\"{w}\" height=\"{h}\" viewBox=\"0 0 {w} {h}\">\n{body}</svg>\n",
            w = self.width,
            h = self.height,
            body = self.body
        )
    }
}

fn points_attr(points: &[Point]) -> String {
    points
        .iter()
        .map(|p| format!("{},{}", p.x, p.y))
        .collect::<Vec<_>>()
        .join(" ")
}

fn escape_xml(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            _ => out.push(c),
        }
    }
    out
}

impl Canvas for SvgCanvas {
    fn clear(&mut self, width: u32, height: u32) {
        self.width = width;
        self.height = height;
        self.body.clear();
    }

    fn fill_polygon(&mut self, points: &[Point], color: Color) {
        let _ = writeln!(
            self.body,
            "<polygon points=\"{}\" fill=\"{}\" fill-opacity=\"{:.3}\" stroke=\"none\"/>",
            points_attr(points),
            color.to_rgb_hex(),
            color.opacity()
        );
    }

    fn stroke_path(&mut self, points: &[Point], color: Color, width: f64, closed: bool) {
        let element = if closed { "polygon" } else { "polyline" };
        let _ = writeln!(
            self.body,
            "<{} points=\"{}\" fill=\"none\" stroke=\"{}\" stroke-opacity=\"{:.3}\" stroke-width=\"{}\" stroke-linejoin=\"round\"/>",
            element,
            points_attr(points),
            color.to_rgb_hex(),
            color.opacity(),
            width
        );
    }

    fn fill_text(&mut self, text: &str, at: Point, color: Color) {
        let _ = writeln!(
            self.body,
            "<text x=\"{}\" y=\"{}\" fill=\"{}\" font-size=\"{}\" font-family=\"sans-serif\" text-anchor=\"middle\" dominant-baseline=\"middle\">{}</text>",
            at.x,
            at.y,
            color.to_rgb_hex(),
            LABEL_FONT_SIZE,
            escape_xml(text)
        );
    }
}
