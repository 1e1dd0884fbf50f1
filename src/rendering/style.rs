//! Style state for the drawing surface.
//!
//! `StyleMirror` keeps the last value applied for every script-visible style
//! property, because the rasterizer has no getters for them. The parse helpers
//! turn canvas strings into rasterizer values; `None` means the canvas rules
//! say the assignment is ignored.

use tiny_skia::{BlendMode, Color, LineCap, LineJoin};

/// A fill or stroke style as the script last set it.
#[derive(Debug, Clone, PartialEq)]
pub enum StyleValue {
    /// A CSS color string, stored exactly as given
    Color(String),
    /// A gradient created on this surface, by id
    Gradient(usize),
}

/// Last-applied values of every style property exposed to scripts.
#[derive(Debug, Clone, PartialEq)]
pub struct StyleMirror {
    pub fill_style: StyleValue,
    pub stroke_style: StyleValue,
    pub global_alpha: f64,
    pub shadow_color: String,
    pub shadow_blur: f64,
    pub shadow_offset_x: f64,
    pub shadow_offset_y: f64,
    pub font: String,
    pub text_align: String,
    pub text_baseline: String,
    pub line_cap: String,
    pub line_join: String,
    pub line_width: f64,
    pub miter_limit: f64,
    pub line_dash_offset: f64,
    pub line_dash: Vec<f64>,
    pub global_composite_operation: String,
    pub image_smoothing_enabled: bool,
}

impl Default for StyleMirror {
    fn default() -> Self {
        Self {
            fill_style: StyleValue::Color("#FFFFFF".to_string()),
            stroke_style: StyleValue::Color("#000000".to_string()),
            global_alpha: 1.0,
            shadow_color: "rgba(0, 0, 0, 0)".to_string(),
            shadow_blur: 0.0,
            shadow_offset_x: 0.0,
            shadow_offset_y: 0.0,
            font: format!("{}px sans-serif", super::text::DEFAULT_FONT_SIZE),
            text_align: "start".to_string(),
            text_baseline: "alphabetic".to_string(),
            line_cap: "butt".to_string(),
            line_join: "miter".to_string(),
            line_width: 1.0,
            miter_limit: 10.0,
            line_dash_offset: 0.0,
            line_dash: Vec::new(),
            global_composite_operation: "source-over".to_string(),
            image_smoothing_enabled: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextAlign {
    Start,
    End,
    Left,
    Right,
    Center,
}

impl TextAlign {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "start" => Some(Self::Start),
            "end" => Some(Self::End),
            "left" => Some(Self::Left),
            "right" => Some(Self::Right),
            "center" => Some(Self::Center),
            _ => None,
        }
    }

    /// Horizontal shift applied to a run of `width` pixels (left-to-right text).
    pub fn offset(self, width: f32) -> f32 {
        match self {
            Self::Start | Self::Left => 0.0,
            Self::Center => -width / 2.0,
            Self::End | Self::Right => -width,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextBaseline {
    Alphabetic,
    Top,
    Hanging,
    Middle,
    Ideographic,
    Bottom,
}

impl TextBaseline {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "alphabetic" => Some(Self::Alphabetic),
            "top" => Some(Self::Top),
            "hanging" => Some(Self::Hanging),
            "middle" => Some(Self::Middle),
            "ideographic" => Some(Self::Ideographic),
            "bottom" => Some(Self::Bottom),
            _ => None,
        }
    }

    /// Distance from the anchor y to the alphabetic baseline, given the
    /// font's ascent and descent (both positive).
    pub fn baseline_shift(self, ascent: f32, descent: f32) -> f32 {
        match self {
            Self::Alphabetic => 0.0,
            Self::Top => ascent,
            Self::Hanging => ascent * 0.8,
            Self::Middle => (ascent - descent) / 2.0,
            Self::Ideographic | Self::Bottom => -descent,
        }
    }
}

pub fn parse_line_cap(value: &str) -> Option<LineCap> {
    match value {
        "butt" => Some(LineCap::Butt),
        "round" => Some(LineCap::Round),
        "square" => Some(LineCap::Square),
        _ => None,
    }
}

pub fn parse_line_join(value: &str) -> Option<LineJoin> {
    match value {
        "miter" => Some(LineJoin::Miter),
        "round" => Some(LineJoin::Round),
        "bevel" => Some(LineJoin::Bevel),
        _ => None,
    }
}

pub fn parse_composite(value: &str) -> Option<BlendMode> {
    let mode = match value {
        "source-over" => BlendMode::SourceOver,
        "source-in" => BlendMode::SourceIn,
        "source-out" => BlendMode::SourceOut,
        "source-atop" => BlendMode::SourceAtop,
        "destination-over" => BlendMode::DestinationOver,
        "destination-in" => BlendMode::DestinationIn,
        "destination-out" => BlendMode::DestinationOut,
        "destination-atop" => BlendMode::DestinationAtop,
        "lighter" => BlendMode::Plus,
        "copy" => BlendMode::Source,
        "xor" => BlendMode::Xor,
        "multiply" => BlendMode::Multiply,
        "screen" => BlendMode::Screen,
        "overlay" => BlendMode::Overlay,
        "darken" => BlendMode::Darken,
        "lighten" => BlendMode::Lighten,
        "color-dodge" => BlendMode::ColorDodge,
        "color-burn" => BlendMode::ColorBurn,
        "hard-light" => BlendMode::HardLight,
        "soft-light" => BlendMode::SoftLight,
        "difference" => BlendMode::Difference,
        "exclusion" => BlendMode::Exclusion,
        "hue" => BlendMode::Hue,
        "saturation" => BlendMode::Saturation,
        "color" => BlendMode::Color,
        "luminosity" => BlendMode::Luminosity,
        _ => return None,
    };
    Some(mode)
}

/// Parse any CSS color string (hex, rgb[a], hsl[a], named, `transparent`).
pub fn parse_color(value: &str) -> Option<Color> {
    let c = csscolorparser::parse(value.trim()).ok()?;
    Color::from_rgba(
        c.r.clamp(0.0, 1.0) as f32,
        c.g.clamp(0.0, 1.0) as f32,
        c.b.clamp(0.0, 1.0) as f32,
        c.a.clamp(0.0, 1.0) as f32,
    )
}

/// Multiply a color's alpha by `alpha` (the surface's global alpha).
pub fn with_alpha(color: Color, alpha: f32) -> Color {
    Color::from_rgba(color.red(), color.green(), color.blue(), (color.alpha() * alpha).clamp(0.0, 1.0))
        .unwrap_or(Color::TRANSPARENT)
}

/// Canvas `setLineDash`: negative or non-finite entries reject the whole list,
/// odd-length lists are repeated once.
pub fn normalize_dash(segments: &[f64]) -> Option<Vec<f64>> {
    if segments.iter().any(|v| !v.is_finite() || *v < 0.0) {
        return None;
    }
    let mut out = segments.to_vec();
    if out.len() % 2 == 1 {
        out.extend_from_slice(segments);
    }
    Some(out)
}
