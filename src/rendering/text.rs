//! Font selection and glyph rasterization for the drawing surface.
//!
//! Fonts are the embedded DejaVu faces; CSS family names are mapped onto them.
//! Glyph coverage comes from fontdue and is turned into one small premultiplied
//! pixmap per glyph, which the surface composites under its current transform.

use std::sync::{Arc, OnceLock};

use fontdue::{Font, FontSettings};
use tiny_skia::{Color, Pixmap, PremultipliedColorU8};

/// Size in pixels used until the script assigns a font.
pub const DEFAULT_FONT_SIZE: f32 = 10.0;

/// Largest accepted font size in pixels; larger assignments are ignored.
pub const MAX_FONT_SIZE: f32 = 1024.0;

const SANS: &[u8] = include_bytes!("../../assets/fonts/DejaVuSans.ttf");
const SANS_BOLD: &[u8] = include_bytes!("../../assets/fonts/DejaVuSans-Bold.ttf");
const SERIF: &[u8] = include_bytes!("../../assets/fonts/DejaVuSerif.ttf");
const MONO: &[u8] = include_bytes!("../../assets/fonts/DejaVuSansMono.ttf");

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Face {
    Sans,
    SansBold,
    Serif,
    Mono,
}

/// The parsed embedded faces, shared by every surface in the process.
pub struct FontBook {
    sans: Font,
    sans_bold: Font,
    serif: Font,
    mono: Font,
}

impl FontBook {
    /// Parse the embedded faces once; later calls share the result.
    pub fn shared() -> Result<Arc<FontBook>, String> {
        static BOOK: OnceLock<Result<Arc<FontBook>, String>> = OnceLock::new();
        BOOK.get_or_init(|| FontBook::load().map(Arc::new)).clone()
    }

    fn load() -> Result<Self, String> {
        let parse = |name: &str, bytes: &[u8]| {
            Font::from_bytes(bytes, FontSettings::default()).map_err(|e| format!("embedded font {}: {}", name, e))
        };
        Ok(Self {
            sans: parse("DejaVuSans", SANS)?,
            sans_bold: parse("DejaVuSans-Bold", SANS_BOLD)?,
            serif: parse("DejaVuSerif", SERIF)?,
            mono: parse("DejaVuSansMono", MONO)?,
        })
    }

    pub fn face(&self, face: Face) -> &Font {
        match face {
            Face::Sans => &self.sans,
            Face::SansBold => &self.sans_bold,
            Face::Serif => &self.serif,
            Face::Mono => &self.mono,
        }
    }
}

/// The face and size currently selected on a surface.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FontChoice {
    pub face: Face,
    pub size: f32,
}

impl Default for FontChoice {
    fn default() -> Self {
        Self {
            face: Face::Sans,
            size: DEFAULT_FONT_SIZE,
        }
    }
}

/// Parse a CSS font shorthand: `[style] [variant] [weight] <size>(px|pt) <family>[, ...]`.
///
/// Returns `None` when no usable size can be found (missing, not positive or
/// above [`MAX_FONT_SIZE`]), in which case the assignment is ignored. An
/// unrecognized family keeps `current.face` with the new size.
pub fn parse_font(value: &str, current: FontChoice) -> Option<FontChoice> {
    let mut bold = false;
    let mut size = None;
    let mut rest = "";

    let trimmed = value.trim();
    let mut cursor = trimmed;
    while !cursor.is_empty() {
        let (token, tail) = match cursor.find(char::is_whitespace) {
            Some(i) => (&cursor[..i], cursor[i..].trim_start()),
            None => (cursor, ""),
        };
        if let Some(px) = parse_size(token) {
            size = Some(px);
            rest = tail;
            break;
        }
        match token {
            "bold" | "bolder" | "600" | "700" | "800" | "900" => bold = true,
            "normal" | "italic" | "oblique" | "small-caps" | "lighter" | "100" | "200" | "300" | "400"
            | "500" => {}
            _ => return None,
        }
        cursor = tail;
    }

    let size = size?;
    let face = rest
        .split(',')
        .find_map(|family| family_face(family.trim().trim_matches(|c| c == '"' || c == '\'')))
        .unwrap_or(current.face);
    let face = match (face, bold) {
        (Face::Sans, true) => Face::SansBold,
        (f, _) => f,
    };
    Some(FontChoice { face, size })
}

// "12px", "9pt" and "12px/1.2" (line height is ignored)
fn parse_size(token: &str) -> Option<f32> {
    let token = token.split('/').next()?;
    let (number, points) = if let Some(n) = token.strip_suffix("px") {
        (n, false)
    } else if let Some(n) = token.strip_suffix("pt") {
        (n, true)
    } else {
        return None;
    };
    let v: f32 = number.parse().ok()?;
    let px = if points { v * 4.0 / 3.0 } else { v };
    if !px.is_finite() || px <= 0.0 || px > MAX_FONT_SIZE {
        return None;
    }
    Some(px)
}

fn family_face(family: &str) -> Option<Face> {
    let lower = family.to_ascii_lowercase();
    match lower.as_str() {
        "sans-serif" | "helvetica" | "helvetica neue" | "arial" | "verdana" | "system-ui" | "dejavu sans" => {
            Some(Face::Sans)
        }
        "serif" | "times" | "times new roman" | "georgia" | "dejavu serif" => Some(Face::Serif),
        "monospace" | "courier" | "courier new" | "menlo" | "consolas" | "dejavu sans mono" => Some(Face::Mono),
        _ => None,
    }
}

/// Ascent and descent (both positive) for `font` at `size`.
pub fn vertical_metrics(font: &Font, size: f32) -> (f32, f32) {
    match font.horizontal_line_metrics(size) {
        Some(m) => (m.ascent, -m.descent),
        None => (size * 0.8, size * 0.2),
    }
}

/// Advance width of `text`, including kerning.
pub fn measure(font: &Font, text: &str, size: f32) -> f32 {
    let mut width = 0.0;
    let mut prev = None;
    for ch in text.chars() {
        if let Some(p) = prev {
            width += font.horizontal_kern(p, ch, size).unwrap_or(0.0);
        }
        width += font.metrics(ch, size).advance_width;
        prev = Some(ch);
    }
    width
}

/// A glyph of a laid-out line, placed relative to the pen start on the baseline.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlacedGlyph {
    pub ch: char,
    /// Left edge of the glyph's coverage box
    pub left: f32,
    /// Top edge of the coverage box; negative above the baseline
    pub top: f32,
    pub width: u32,
    pub height: u32,
}

/// Lay out `text` as a single line. Glyphs without coverage (spaces) are
/// skipped; their advance still moves the pen.
pub fn layout(font: &Font, text: &str, size: f32) -> Vec<PlacedGlyph> {
    let mut glyphs = Vec::new();
    let mut pen = 0.0;
    let mut prev = None;
    for ch in text.chars() {
        if let Some(p) = prev {
            pen += font.horizontal_kern(p, ch, size).unwrap_or(0.0);
        }
        let metrics = font.metrics(ch, size);
        if metrics.width > 0 && metrics.height > 0 {
            glyphs.push(PlacedGlyph {
                ch,
                left: (pen + metrics.xmin as f32).round(),
                top: -(metrics.height as f32 + metrics.ymin as f32),
                width: metrics.width as u32,
                height: metrics.height as u32,
            });
        }
        pen += metrics.advance_width;
        prev = Some(ch);
    }
    glyphs
}

/// Rasterize one glyph in `color` into a pixmap the size of its coverage box.
pub fn rasterize_glyph(font: &Font, ch: char, size: f32, color: Color) -> Option<Pixmap> {
    let (metrics, coverage) = font.rasterize(ch, size);
    let mut pixmap = Pixmap::new(metrics.width as u32, metrics.height as u32)?;
    let c = color.to_color_u8();
    for (px, cov) in pixmap.pixels_mut().iter_mut().zip(coverage) {
        if cov == 0 {
            continue;
        }
        let a = (cov as u32 * c.alpha() as u32 / 255) as u8;
        let premul = |v: u8| (v as u32 * a as u32 / 255) as u8;
        if let Some(value) = PremultipliedColorU8::from_rgba(premul(c.red()), premul(c.green()), premul(c.blue()), a) {
            *px = value;
        }
    }
    Some(pixmap)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn embedded_fonts_parse() {
        let book = FontBook::shared().unwrap();
        assert!(measure(book.face(Face::Sans), "abc", 12.0) > 0.0);
    }

    #[test]
    fn font_shorthand_variants() {
        let cur = FontChoice::default();
        assert_eq!(parse_font("12px sans-serif", cur), Some(FontChoice { face: Face::Sans, size: 12.0 }));
        assert_eq!(
            parse_font("bold 14px Helvetica Neue, sans-serif", cur),
            Some(FontChoice { face: Face::SansBold, size: 14.0 })
        );
        assert_eq!(
            parse_font("italic normal 9pt 'Courier New'", cur),
            Some(FontChoice { face: Face::Mono, size: 12.0 })
        );
        assert_eq!(parse_font("11px/1.5 serif", cur).unwrap().face, Face::Serif);
    }

    #[test]
    fn unknown_family_keeps_face_but_takes_size() {
        let cur = FontChoice { face: Face::Serif, size: 10.0 };
        assert_eq!(parse_font("20px Papyrus", cur), Some(FontChoice { face: Face::Serif, size: 20.0 }));
    }

    #[test]
    fn unparseable_font_is_rejected() {
        let cur = FontChoice::default();
        assert_eq!(parse_font("", cur), None);
        assert_eq!(parse_font("sans-serif", cur), None);
        assert_eq!(parse_font("-4px sans-serif", cur), None);
    }

    #[test]
    fn rasterized_glyph_has_ink() {
        let book = FontBook::shared().unwrap();
        let glyph = rasterize_glyph(book.face(Face::Sans), 'H', 16.0, Color::BLACK).unwrap();
        assert!(glyph.pixels().iter().any(|p| p.alpha() > 0));
    }

    #[test]
    fn layout_advances_and_skips_blank_glyphs() {
        let book = FontBook::shared().unwrap();
        let font = book.face(Face::Sans);
        let glyphs = layout(font, "H H", 16.0);
        assert_eq!(glyphs.len(), 2);
        assert!(glyphs[1].left > glyphs[0].left + glyphs[0].width as f32);
        // cap height sits above the baseline
        assert!(glyphs[0].top < 0.0);
        assert!(layout(font, "", 16.0).is_empty());
    }

    #[test]
    fn oversized_font_is_rejected() {
        let cur = FontChoice::default();
        assert_eq!(parse_font("1024px serif", cur).map(|f| f.size), Some(MAX_FONT_SIZE));
        assert_eq!(parse_font("3000px sans-serif", cur), None);
        assert_eq!(parse_font("800pt sans-serif", cur), None);
    }
}
