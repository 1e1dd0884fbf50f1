//! Native drawing surface
//!
//! [`Surface`] owns a tiny-skia pixmap and implements the subset of the 2D
//! canvas context that chart renderers use. It is exposed to scripts through
//! [`binding::create_canvas_object`].

use std::sync::Arc;

use tiny_skia::{
    BlendMode, Color, FillRule, FilterQuality, GradientStop, IntRect, LinearGradient, Mask, Paint, Path,
    PathBuilder, Pixmap, PixmapPaint, Point, RadialGradient, Rect, Shader, SpreadMode, Stroke, StrokeDash, Transform,
};

use crate::error::{Error, Result};

pub mod binding;
pub mod path;
pub mod style;
pub mod text;

use path::CanvasPath;
use style::{StyleMirror, StyleValue, TextAlign, TextBaseline};
use text::{FontBook, FontChoice};

/// Geometry of a gradient in user space.
#[derive(Debug, Clone, PartialEq)]
pub enum GradientKind {
    Linear { x0: f64, y0: f64, x1: f64, y1: f64 },
    Radial { x0: f64, y0: f64, r0: f64, x1: f64, y1: f64, r1: f64 },
}

#[derive(Debug, Clone)]
pub struct Gradient {
    pub kind: GradientKind,
    stops: Vec<(f32, Color)>,
}

/// A parsed fill or stroke source.
#[derive(Debug, Clone, Copy)]
enum Source {
    Solid(Color),
    Gradient(usize),
}

/// Everything `save`/`restore` covers.
#[derive(Clone)]
struct DrawState {
    mirror: StyleMirror,
    fill: Source,
    stroke: Source,
    shadow: Color,
    transform: Transform,
    clip: Option<Mask>,
    font: FontChoice,
    align: TextAlign,
    baseline: TextBaseline,
    line_cap: tiny_skia::LineCap,
    line_join: tiny_skia::LineJoin,
    composite: BlendMode,
}

impl Default for DrawState {
    fn default() -> Self {
        Self {
            mirror: StyleMirror::default(),
            fill: Source::Solid(Color::WHITE),
            stroke: Source::Solid(Color::BLACK),
            shadow: Color::TRANSPARENT,
            transform: Transform::identity(),
            clip: None,
            font: FontChoice::default(),
            align: TextAlign::Start,
            baseline: TextBaseline::Alphabetic,
            line_cap: tiny_skia::LineCap::Butt,
            line_join: tiny_skia::LineJoin::Miter,
            composite: BlendMode::SourceOver,
        }
    }
}

/// Text measurement returned by `measureText`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TextMetrics {
    pub width: f64,
    pub ascent: f64,
    pub descent: f64,
}

/// A fixed-size RGBA drawing surface with canvas semantics.
pub struct Surface {
    pixmap: Pixmap,
    fonts: Arc<FontBook>,
    state: DrawState,
    stack: Vec<DrawState>,
    path: CanvasPath,
    gradients: Vec<Gradient>,
}

impl Surface {
    /// Create a transparent surface with the default font at its default size
    /// and a white fill.
    pub fn new(width: u32, height: u32) -> Result<Self> {
        let pixmap = Pixmap::new(width, height)
            .ok_or_else(|| Error::SurfaceError(format!("cannot allocate a {}x{} surface", width, height)))?;
        let fonts = FontBook::shared().map_err(Error::SurfaceError)?;
        log::debug!("created {}x{} drawing surface", width, height);
        Ok(Self {
            pixmap,
            fonts,
            state: DrawState::default(),
            stack: Vec::new(),
            path: CanvasPath::default(),
            gradients: Vec::new(),
        })
    }

    pub fn width(&self) -> u32 {
        self.pixmap.width()
    }

    pub fn height(&self) -> u32 {
        self.pixmap.height()
    }

    /// Last-applied values of the script-visible style properties.
    pub fn style(&self) -> &StyleMirror {
        &self.state.mirror
    }

    pub fn transform(&self) -> Transform {
        self.state.transform
    }

    pub fn pixmap(&self) -> &Pixmap {
        &self.pixmap
    }

    /// Copy a rectangle of pixels out of the surface.
    pub fn read_pixels(&self, x: u32, y: u32, width: u32, height: u32) -> Result<Pixmap> {
        let inside = x.checked_add(width).is_some_and(|r| r <= self.width())
            && y.checked_add(height).is_some_and(|b| b <= self.height());
        let rect = IntRect::from_xywh(x as i32, y as i32, width, height)
            .filter(|_| inside)
            .ok_or_else(|| {
                Error::SurfaceError(format!(
                    "read rectangle {}x{} at ({}, {}) is outside the {}x{} surface",
                    width,
                    height,
                    x,
                    y,
                    self.width(),
                    self.height()
                ))
            })?;
        self.pixmap
            .clone_rect(rect)
            .ok_or_else(|| Error::SurfaceError("failed to copy surface pixels".into()))
    }

    /// Unpremultiplied RGBA bytes of a rectangle, row-major.
    pub fn image_data(&self, x: u32, y: u32, width: u32, height: u32) -> Result<Vec<u8>> {
        let region = self.read_pixels(x, y, width, height)?;
        let mut out = Vec::with_capacity(region.pixels().len() * 4);
        for px in region.pixels() {
            let c = px.demultiply();
            out.extend_from_slice(&[c.red(), c.green(), c.blue(), c.alpha()]);
        }
        Ok(out)
    }

    // ---- style properties ----

    pub fn set_fill_style(&mut self, value: &str) {
        if let Some(color) = style::parse_color(value) {
            self.state.fill = Source::Solid(color);
            self.state.mirror.fill_style = StyleValue::Color(value.to_string());
        }
    }

    pub fn set_stroke_style(&mut self, value: &str) {
        if let Some(color) = style::parse_color(value) {
            self.state.stroke = Source::Solid(color);
            self.state.mirror.stroke_style = StyleValue::Color(value.to_string());
        }
    }

    pub fn set_fill_gradient(&mut self, id: usize) {
        if id < self.gradients.len() {
            self.state.fill = Source::Gradient(id);
            self.state.mirror.fill_style = StyleValue::Gradient(id);
        }
    }

    pub fn set_stroke_gradient(&mut self, id: usize) {
        if id < self.gradients.len() {
            self.state.stroke = Source::Gradient(id);
            self.state.mirror.stroke_style = StyleValue::Gradient(id);
        }
    }

    pub fn set_global_alpha(&mut self, value: f64) {
        if value.is_finite() && (0.0..=1.0).contains(&value) {
            self.state.mirror.global_alpha = value;
        }
    }

    pub fn set_shadow_color(&mut self, value: &str) {
        if let Some(color) = style::parse_color(value) {
            self.state.shadow = color;
            self.state.mirror.shadow_color = value.to_string();
        }
    }

    pub fn set_shadow_blur(&mut self, value: f64) {
        if value.is_finite() && value >= 0.0 {
            self.state.mirror.shadow_blur = value;
        }
    }

    pub fn set_shadow_offset_x(&mut self, value: f64) {
        if value.is_finite() {
            self.state.mirror.shadow_offset_x = value;
        }
    }

    pub fn set_shadow_offset_y(&mut self, value: f64) {
        if value.is_finite() {
            self.state.mirror.shadow_offset_y = value;
        }
    }

    /// Select face and size from a CSS font shorthand.
    pub fn set_font(&mut self, value: &str) {
        match text::parse_font(value, self.state.font) {
            Some(choice) => {
                self.state.font = choice;
                self.state.mirror.font = value.to_string();
            }
            None => log::debug!("ignoring unparseable font {:?}", value),
        }
    }

    pub fn set_text_align(&mut self, value: &str) {
        if let Some(align) = TextAlign::parse(value) {
            self.state.align = align;
            self.state.mirror.text_align = value.to_string();
        }
    }

    pub fn set_text_baseline(&mut self, value: &str) {
        if let Some(baseline) = TextBaseline::parse(value) {
            self.state.baseline = baseline;
            self.state.mirror.text_baseline = value.to_string();
        }
    }

    pub fn set_line_cap(&mut self, value: &str) {
        if let Some(cap) = style::parse_line_cap(value) {
            self.state.line_cap = cap;
            self.state.mirror.line_cap = value.to_string();
        }
    }

    pub fn set_line_join(&mut self, value: &str) {
        if let Some(join) = style::parse_line_join(value) {
            self.state.line_join = join;
            self.state.mirror.line_join = value.to_string();
        }
    }

    pub fn set_line_width(&mut self, value: f64) {
        if value.is_finite() && value > 0.0 {
            self.state.mirror.line_width = value;
        }
    }

    pub fn set_miter_limit(&mut self, value: f64) {
        if value.is_finite() && value > 0.0 {
            self.state.mirror.miter_limit = value;
        }
    }

    pub fn set_line_dash_offset(&mut self, value: f64) {
        if value.is_finite() {
            self.state.mirror.line_dash_offset = value;
        }
    }

    pub fn set_line_dash(&mut self, segments: &[f64]) {
        if let Some(dash) = style::normalize_dash(segments) {
            self.state.mirror.line_dash = dash;
        }
    }

    pub fn set_global_composite_operation(&mut self, value: &str) {
        if let Some(mode) = style::parse_composite(value) {
            self.state.composite = mode;
            self.state.mirror.global_composite_operation = value.to_string();
        }
    }

    pub fn set_image_smoothing_enabled(&mut self, value: bool) {
        self.state.mirror.image_smoothing_enabled = value;
    }

    // ---- state stack and transform ----

    pub fn save(&mut self) {
        self.stack.push(self.state.clone());
    }

    /// Pop the last saved state; a restore without a matching save does nothing.
    pub fn restore(&mut self) {
        if let Some(state) = self.stack.pop() {
            self.state = state;
        }
    }

    pub fn translate(&mut self, x: f64, y: f64) {
        if x.is_finite() && y.is_finite() {
            self.state.transform = self.state.transform.pre_translate(x as f32, y as f32);
        }
    }

    pub fn scale(&mut self, x: f64, y: f64) {
        if x.is_finite() && y.is_finite() {
            self.state.transform = self.state.transform.pre_scale(x as f32, y as f32);
        }
    }

    /// Rotate by `angle` radians.
    pub fn rotate(&mut self, angle: f64) {
        if angle.is_finite() {
            let (sin, cos) = (angle as f32).sin_cos();
            let rotation = Transform::from_row(cos, sin, -sin, cos, 0.0, 0.0);
            self.state.transform = self.state.transform.pre_concat(rotation);
        }
    }

    /// Multiply the current transform by the matrix `[a c e; b d f]`.
    pub fn apply_transform(&mut self, m: [f64; 6]) {
        if m.iter().all(|v| v.is_finite()) {
            let t = Transform::from_row(m[0] as f32, m[1] as f32, m[2] as f32, m[3] as f32, m[4] as f32, m[5] as f32);
            self.state.transform = self.state.transform.pre_concat(t);
        }
    }

    pub fn set_transform(&mut self, m: [f64; 6]) {
        if m.iter().all(|v| v.is_finite()) {
            self.state.transform =
                Transform::from_row(m[0] as f32, m[1] as f32, m[2] as f32, m[3] as f32, m[4] as f32, m[5] as f32);
        }
    }

    pub fn reset_transform(&mut self) {
        self.state.transform = Transform::identity();
    }

    // ---- path construction ----

    pub fn begin_path(&mut self) {
        self.path.clear();
    }

    pub fn close_path(&mut self) {
        self.path.close();
    }

    pub fn move_to(&mut self, x: f64, y: f64) {
        if finite(&[x, y]) {
            self.path.move_to(&self.state.transform, x, y);
        }
    }

    pub fn line_to(&mut self, x: f64, y: f64) {
        if finite(&[x, y]) {
            self.path.line_to(&self.state.transform, x, y);
        }
    }

    pub fn quadratic_curve_to(&mut self, cpx: f64, cpy: f64, x: f64, y: f64) {
        if finite(&[cpx, cpy, x, y]) {
            self.path.quad_to(&self.state.transform, cpx, cpy, x, y);
        }
    }

    pub fn bezier_curve_to(&mut self, c: [f64; 6]) {
        if finite(&c) {
            self.path.cubic_to(&self.state.transform, c[0], c[1], c[2], c[3], c[4], c[5]);
        }
    }

    pub fn rect(&mut self, x: f64, y: f64, w: f64, h: f64) {
        if finite(&[x, y, w, h]) {
            self.path.rect(&self.state.transform, x, y, w, h);
        }
    }

    /// Returns false for a negative radius.
    pub fn arc(&mut self, x: f64, y: f64, r: f64, start: f64, end: f64, anticlockwise: bool) -> bool {
        if !finite(&[x, y, r, start, end]) {
            return true;
        }
        self.path
            .ellipse(&self.state.transform, x, y, r, r, 0.0, start, end, anticlockwise)
    }

    /// Returns false for a negative radius.
    pub fn ellipse(&mut self, e: [f64; 7], anticlockwise: bool) -> bool {
        if !finite(&e) {
            return true;
        }
        self.path
            .ellipse(&self.state.transform, e[0], e[1], e[2], e[3], e[4], e[5], e[6], anticlockwise)
    }

    /// Returns false for a negative radius.
    pub fn arc_to(&mut self, x1: f64, y1: f64, x2: f64, y2: f64, r: f64) -> bool {
        if !finite(&[x1, y1, x2, y2, r]) {
            return true;
        }
        self.path.arc_to(&self.state.transform, x1, y1, x2, y2, r)
    }

    pub fn is_point_in_path(&self, x: f64, y: f64, rule: FillRule) -> bool {
        finite(&[x, y]) && self.path.contains(x, y, rule)
    }

    // ---- drawing ----

    pub fn fill(&mut self, rule: FillRule) {
        if let Some(p) = self.path.to_path() {
            self.fill_device_path(&p, rule, Transform::identity());
        }
    }

    pub fn stroke(&mut self) {
        let Some(p) = self.path.to_path() else { return };
        // Stroke geometry follows the current transform, so map back to user space first.
        let ts = self.state.transform;
        if let Some(user) = ts.invert().and_then(|inv| p.transform(inv)) {
            self.stroke_user_path(&user, ts);
        }
    }

    /// Intersect the clip region with the current path.
    pub fn clip(&mut self, rule: FillRule) {
        let Some(p) = self.path.to_path() else {
            self.state.clip = Mask::new(self.width(), self.height());
            return;
        };
        let Some(mut mask) = Mask::new(self.width(), self.height()) else { return };
        mask.fill_path(&p, rule, true, Transform::identity());
        if let Some(prev) = &self.state.clip {
            for (dst, src) in mask.data_mut().iter_mut().zip(prev.data()) {
                *dst = ((*dst as u16 * *src as u16) / 255) as u8;
            }
        }
        self.state.clip = Some(mask);
    }

    pub fn fill_rect(&mut self, x: f64, y: f64, w: f64, h: f64) {
        if let Some(p) = rect_path(x, y, w, h) {
            self.fill_device_path(&p, FillRule::Winding, self.state.transform);
        }
    }

    pub fn stroke_rect(&mut self, x: f64, y: f64, w: f64, h: f64) {
        if !finite(&[x, y, w, h]) {
            return;
        }
        let mut pb = PathBuilder::new();
        pb.move_to(x as f32, y as f32);
        pb.line_to((x + w) as f32, y as f32);
        pb.line_to((x + w) as f32, (y + h) as f32);
        pb.line_to(x as f32, (y + h) as f32);
        pb.close();
        if let Some(p) = pb.finish() {
            self.stroke_user_path(&p, self.state.transform);
        }
    }

    /// Set the pixels under the rectangle to transparent black.
    pub fn clear_rect(&mut self, x: f64, y: f64, w: f64, h: f64) {
        let Some(p) = rect_path(x, y, w, h) else { return };
        let mut paint = Paint::default();
        paint.blend_mode = BlendMode::Clear;
        paint.anti_alias = false;
        self.pixmap
            .fill_path(&p, &paint, FillRule::Winding, self.state.transform, self.state.clip.as_ref());
    }

    pub fn fill_text(&mut self, content: &str, x: f64, y: f64, max_width: Option<f64>) {
        self.draw_text(content, x, y, max_width, self.state.fill);
    }

    /// Drawn as filled glyphs in the stroke style.
    pub fn stroke_text(&mut self, content: &str, x: f64, y: f64, max_width: Option<f64>) {
        self.draw_text(content, x, y, max_width, self.state.stroke);
    }

    /// Composite `image` (premultiplied) into the `dst` rectangle `[x, y, w, h]`
    /// under the current transform. `src` crops the image first.
    pub fn draw_image(&mut self, image: &Pixmap, src: Option<[f64; 4]>, dst: [f64; 4]) {
        let [dx, dy, dw, dh] = dst;
        if !finite(&dst) || dw == 0.0 || dh == 0.0 {
            return;
        }
        let cropped;
        let source = match src {
            None => image,
            Some(rect) => {
                if !finite(&rect) {
                    return;
                }
                let [sx, sy, sw, sh] = rect;
                let (l, r) = (sx.min(sx + sw).max(0.0), sx.max(sx + sw).min(image.width() as f64));
                let (t, b) = (sy.min(sy + sh).max(0.0), sy.max(sy + sh).min(image.height() as f64));
                let crop = IntRect::from_ltrb(l.floor() as i32, t.floor() as i32, r.ceil() as i32, b.ceil() as i32);
                match crop.and_then(|c| image.clone_rect(c)) {
                    Some(pixmap) => {
                        cropped = pixmap;
                        &cropped
                    }
                    None => return,
                }
            }
        };
        let ts = self.state.transform.pre_translate(dx as f32, dy as f32).pre_scale(
            dw as f32 / source.width() as f32,
            dh as f32 / source.height() as f32,
        );
        let quality = if self.state.mirror.image_smoothing_enabled {
            FilterQuality::Bilinear
        } else {
            FilterQuality::Nearest
        };
        let paint = PixmapPaint {
            opacity: self.alpha(),
            blend_mode: self.state.composite,
            quality,
        };
        self.pixmap
            .draw_pixmap(0, 0, source.as_ref(), &paint, ts, self.state.clip.as_ref());
    }

    pub fn measure_text(&self, content: &str) -> TextMetrics {
        let font = self.fonts.face(self.state.font.face);
        let size = self.state.font.size;
        let (ascent, descent) = text::vertical_metrics(font, size);
        TextMetrics {
            width: text::measure(font, content, size) as f64,
            ascent: ascent as f64,
            descent: descent as f64,
        }
    }

    // ---- gradients ----

    pub fn create_gradient(&mut self, kind: GradientKind) -> usize {
        self.gradients.push(Gradient { kind, stops: Vec::new() });
        self.gradients.len() - 1
    }

    /// Add a color stop. Errors carry the message the script sees.
    pub fn add_color_stop(&mut self, id: usize, offset: f64, color: &str) -> std::result::Result<(), String> {
        if !(0.0..=1.0).contains(&offset) {
            return Err(format!("color stop offset {} is outside [0, 1]", offset));
        }
        let color = style::parse_color(color).ok_or_else(|| format!("invalid color stop color {:?}", color))?;
        let gradient = self.gradients.get_mut(id).ok_or_else(|| format!("unknown gradient {}", id))?;
        gradient.stops.push((offset as f32, color));
        gradient.stops.sort_by(|a, b| a.0.total_cmp(&b.0));
        Ok(())
    }

    // ---- internals ----

    fn alpha(&self) -> f32 {
        self.state.mirror.global_alpha as f32
    }

    fn paint_for(&self, source: Source) -> Option<Paint<'static>> {
        let mut paint = Paint::default();
        paint.anti_alias = true;
        paint.blend_mode = self.state.composite;
        match source {
            Source::Solid(color) => paint.set_color(style::with_alpha(color, self.alpha())),
            Source::Gradient(id) => paint.shader = self.gradient_shader(id)?,
        }
        Some(paint)
    }

    fn gradient_shader(&self, id: usize) -> Option<Shader<'static>> {
        let gradient = self.gradients.get(id)?;
        let stops: Vec<GradientStop> = gradient
            .stops
            .iter()
            .map(|(pos, color)| GradientStop::new(*pos, style::with_alpha(*color, self.alpha())))
            .collect();
        if stops.is_empty() {
            return None;
        }
        let ts = self.state.transform;
        match gradient.kind {
            GradientKind::Linear { x0, y0, x1, y1 } => LinearGradient::new(
                Point::from_xy(x0 as f32, y0 as f32),
                Point::from_xy(x1 as f32, y1 as f32),
                stops,
                SpreadMode::Pad,
                ts,
            ),
            GradientKind::Radial { x0, y0, x1, y1, r1, .. } => RadialGradient::new(
                Point::from_xy(x0 as f32, y0 as f32),
                Point::from_xy(x1 as f32, y1 as f32),
                r1 as f32,
                stops,
                SpreadMode::Pad,
                ts,
            ),
        }
    }

    // No shadow unless it is blurred or displaced, whatever its color.
    fn shadow_paint(&self) -> Option<Paint<'static>> {
        let m = &self.state.mirror;
        if !(m.shadow_blur > 0.0 || m.shadow_offset_x != 0.0 || m.shadow_offset_y != 0.0) {
            return None;
        }
        let color = style::with_alpha(self.state.shadow, self.alpha());
        if color.alpha() <= 0.0 {
            return None;
        }
        let mut paint = Paint::default();
        paint.anti_alias = true;
        paint.blend_mode = self.state.composite;
        paint.set_color(color);
        Some(paint)
    }

    fn shadow_offset(&self) -> Transform {
        let m = &self.state.mirror;
        Transform::from_translate(m.shadow_offset_x as f32, m.shadow_offset_y as f32)
    }

    fn fill_device_path(&mut self, p: &Path, rule: FillRule, ts: Transform) {
        let shadow = self.shadow_paint();
        let paint = self.paint_for(self.state.fill);
        let shadow_ts = ts.post_concat(self.shadow_offset());
        let clip = self.state.clip.as_ref();
        if let Some(shadow) = shadow {
            self.pixmap.fill_path(p, &shadow, rule, shadow_ts, clip);
        }
        if let Some(paint) = paint {
            self.pixmap.fill_path(p, &paint, rule, ts, clip);
        }
    }

    fn stroke_props(&self) -> Stroke {
        let m = &self.state.mirror;
        let dash = if m.line_dash.is_empty() {
            None
        } else {
            StrokeDash::new(m.line_dash.iter().map(|v| *v as f32).collect(), m.line_dash_offset as f32)
        };
        Stroke {
            width: m.line_width as f32,
            miter_limit: m.miter_limit as f32,
            line_cap: self.state.line_cap,
            line_join: self.state.line_join,
            dash,
        }
    }

    fn stroke_user_path(&mut self, p: &Path, ts: Transform) {
        let stroke = self.stroke_props();
        let shadow = self.shadow_paint();
        let paint = self.paint_for(self.state.stroke);
        let shadow_ts = ts.post_concat(self.shadow_offset());
        let clip = self.state.clip.as_ref();
        if let Some(shadow) = shadow {
            self.pixmap.stroke_path(p, &shadow, &stroke, shadow_ts, clip);
        }
        if let Some(paint) = paint {
            self.pixmap.stroke_path(p, &paint, &stroke, ts, clip);
        }
    }

    fn draw_text(&mut self, content: &str, x: f64, y: f64, max_width: Option<f64>, source: Source) {
        if content.is_empty() || !finite(&[x, y]) {
            return;
        }
        let color = match source {
            Source::Solid(c) => c,
            // Gradient text takes the first stop's color.
            Source::Gradient(id) => match self.gradients.get(id).and_then(|g| g.stops.first()) {
                Some((_, c)) => *c,
                None => return,
            },
        };
        let color = style::with_alpha(color, self.alpha());
        let font = self.fonts.face(self.state.font.face);
        let size = self.state.font.size;
        let width = text::measure(font, content, size);
        let (ascent, descent) = text::vertical_metrics(font, size);

        let squeeze = match max_width {
            Some(max) if max.is_finite() && max > 0.0 && (width as f64) > max => max as f32 / width,
            Some(max) if !max.is_finite() || max <= 0.0 => return,
            _ => 1.0,
        };
        let dx = x as f32 + self.state.align.offset(width * squeeze);
        let baseline = y as f32 + self.state.baseline.baseline_shift(ascent, descent);
        let line = self.state.transform.pre_translate(dx, baseline).pre_scale(squeeze, 1.0);

        let quality = if self.state.mirror.image_smoothing_enabled {
            FilterQuality::Bilinear
        } else {
            FilterQuality::Nearest
        };
        let paint = PixmapPaint {
            opacity: 1.0,
            blend_mode: self.state.composite,
            quality,
        };
        let Some(visible) = Rect::from_xywh(0.0, 0.0, self.width() as f32, self.height() as f32) else {
            return;
        };
        for glyph in text::layout(font, content, size) {
            let on_surface = Rect::from_xywh(glyph.left, glyph.top, glyph.width as f32, glyph.height as f32)
                .and_then(|r| r.transform(line))
                .is_some_and(|r| r.intersect(&visible).is_some());
            if !on_surface {
                continue;
            }
            let Some(pixmap) = text::rasterize_glyph(font, glyph.ch, size, color) else {
                continue;
            };
            let ts = line.pre_translate(glyph.left, glyph.top);
            self.pixmap
                .draw_pixmap(0, 0, pixmap.as_ref(), &paint, ts, self.state.clip.as_ref());
        }
    }
}

fn finite(values: &[f64]) -> bool {
    values.iter().all(|v| v.is_finite())
}

// Canvas rects accept negative sizes; normalize to positive extents.
fn rect_path(x: f64, y: f64, w: f64, h: f64) -> Option<Path> {
    if !finite(&[x, y, w, h]) || w == 0.0 || h == 0.0 {
        return None;
    }
    let (l, r) = (x.min(x + w), x.max(x + w));
    let (t, b) = (y.min(y + h), y.max(y + h));
    let rect = Rect::from_ltrb(l as f32, t as f32, r as f32, b as f32)?;
    Some(PathBuilder::from_rect(rect))
}
