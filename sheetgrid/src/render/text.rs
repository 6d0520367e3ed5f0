//! FILENAME: sheetgrid/src/render/text.rs
//! PURPOSE: Text measurement and wrap-line computation.
//! CONTEXT: The component runs headless, so measurement goes through a
//! trait the host can back with real canvas metrics. The bundled
//! approximate measurer prices glyphs by their Unicode display width,
//! which keeps CJK and emoji from underflowing the wrap math.

use unicode_width::UnicodeWidthStr;

/// Measures rendered text width in logical pixels for a font key.
pub trait TextMeasurer {
    fn measure_width(&self, text: &str, font: &str) -> f32;
}

/// Width-table measurer: average glyph advance scaled by Unicode width.
/// Bold text gets a small positive bias.
#[derive(Debug, Clone)]
pub struct ApproxMeasurer {
    /// Advance of a single-width glyph, in pixels.
    pub glyph_advance: f32,
}

impl Default for ApproxMeasurer {
    fn default() -> Self {
        ApproxMeasurer { glyph_advance: 7.2 }
    }
}

impl TextMeasurer for ApproxMeasurer {
    fn measure_width(&self, text: &str, font: &str) -> f32 {
        let cells = UnicodeWidthStr::width(text) as f32;
        let bias = if font.contains("bold") { 1.05 } else { 1.0 };
        cells * self.glyph_advance * bias
    }
}

/// Greedy word wrap: break on whitespace where possible, hard-break words
/// wider than the column. Always yields at least one line.
pub fn wrap_lines(text: &str, max_width: f32, font: &str, measurer: &dyn TextMeasurer) -> Vec<String> {
    if text.is_empty() {
        return vec![String::new()];
    }

    let mut lines = Vec::new();

    for paragraph in text.split('\n') {
        let mut current = String::new();

        for word in paragraph.split(' ') {
            let candidate = if current.is_empty() {
                word.to_string()
            } else {
                format!("{} {}", current, word)
            };

            if measurer.measure_width(&candidate, font) <= max_width || current.is_empty() {
                if measurer.measure_width(word, font) > max_width && current.is_empty() {
                    // Hard-break an overlong word.
                    let mut chunk = String::new();
                    for c in word.chars() {
                        let mut extended = chunk.clone();
                        extended.push(c);
                        if !chunk.is_empty()
                            && measurer.measure_width(&extended, font) > max_width
                        {
                            lines.push(chunk);
                            chunk = c.to_string();
                        } else {
                            chunk = extended;
                        }
                    }
                    current = chunk;
                } else {
                    current = candidate;
                }
            } else {
                lines.push(current);
                current = word.to_string();
            }
        }

        lines.push(current);
    }

    if lines.is_empty() {
        lines.push(String::new());
    }
    lines
}
