//! Canvas path construction.
//!
//! Points are mapped through the transform in effect when each segment is
//! added, so the stored path is in device space. Arcs and ellipses become
//! cubic Béziers of at most a quarter turn each.

use std::f64::consts::{FRAC_PI_2, TAU};

use tiny_skia::{FillRule, Mask, Path, PathBuilder, Point, Transform};

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Segment {
    MoveTo(Point),
    LineTo(Point),
    QuadTo(Point, Point),
    CubicTo(Point, Point, Point),
    Close,
}

/// Apply `ts` to a user-space point.
pub fn map(ts: &Transform, x: f64, y: f64) -> Point {
    let (x, y) = (x as f32, y as f32);
    Point::from_xy(ts.sx * x + ts.kx * y + ts.tx, ts.ky * x + ts.sy * y + ts.ty)
}

/// The current default path of a surface.
#[derive(Debug, Clone, Default)]
pub struct CanvasPath {
    segments: Vec<Segment>,
    current: Option<Point>,
    subpath_start: Option<Point>,
}

impl CanvasPath {
    pub fn clear(&mut self) {
        self.segments.clear();
        self.current = None;
        self.subpath_start = None;
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    fn push_move(&mut self, p: Point) {
        self.segments.push(Segment::MoveTo(p));
        self.current = Some(p);
        self.subpath_start = Some(p);
    }

    fn push_line(&mut self, p: Point) {
        if self.current.is_none() {
            self.push_move(p);
            return;
        }
        self.segments.push(Segment::LineTo(p));
        self.current = Some(p);
    }

    pub fn move_to(&mut self, ts: &Transform, x: f64, y: f64) {
        self.push_move(map(ts, x, y));
    }

    /// Without a current point this starts a subpath instead.
    pub fn line_to(&mut self, ts: &Transform, x: f64, y: f64) {
        self.push_line(map(ts, x, y));
    }

    pub fn quad_to(&mut self, ts: &Transform, cpx: f64, cpy: f64, x: f64, y: f64) {
        let cp = map(ts, cpx, cpy);
        if self.current.is_none() {
            self.push_move(cp);
        }
        let p = map(ts, x, y);
        self.segments.push(Segment::QuadTo(cp, p));
        self.current = Some(p);
    }

    #[allow(clippy::too_many_arguments)]
    pub fn cubic_to(&mut self, ts: &Transform, c1x: f64, c1y: f64, c2x: f64, c2y: f64, x: f64, y: f64) {
        let c1 = map(ts, c1x, c1y);
        if self.current.is_none() {
            self.push_move(c1);
        }
        let (c2, p) = (map(ts, c2x, c2y), map(ts, x, y));
        self.segments.push(Segment::CubicTo(c1, c2, p));
        self.current = Some(p);
    }

    pub fn close(&mut self) {
        if self.current.is_some() {
            self.segments.push(Segment::Close);
            self.current = self.subpath_start;
        }
    }

    pub fn rect(&mut self, ts: &Transform, x: f64, y: f64, w: f64, h: f64) {
        self.move_to(ts, x, y);
        self.line_to(ts, x + w, y);
        self.line_to(ts, x + w, y + h);
        self.line_to(ts, x, y + h);
        self.close();
    }

    /// Canvas `ellipse`. Returns false (and adds nothing) for a negative radius.
    #[allow(clippy::too_many_arguments)]
    pub fn ellipse(
        &mut self,
        ts: &Transform,
        cx: f64,
        cy: f64,
        rx: f64,
        ry: f64,
        rotation: f64,
        start: f64,
        end: f64,
        anticlockwise: bool,
    ) -> bool {
        if rx < 0.0 || ry < 0.0 {
            return false;
        }
        let (sin_r, cos_r) = rotation.sin_cos();
        let point = |t: f64| {
            let (x, y) = (rx * t.cos(), ry * t.sin());
            (cx + x * cos_r - y * sin_r, cy + x * sin_r + y * cos_r)
        };
        let tangent = |t: f64| {
            let (dx, dy) = (-rx * t.sin(), ry * t.cos());
            (dx * cos_r - dy * sin_r, dx * sin_r + dy * cos_r)
        };

        let (x0, y0) = point(start);
        self.push_line(map(ts, x0, y0));

        let sweep = arc_sweep(start, end, anticlockwise);
        if sweep == 0.0 {
            return true;
        }
        let pieces = (sweep.abs() / FRAC_PI_2).ceil().max(1.0) as usize;
        let step = sweep / pieces as f64;
        let k = 4.0 / 3.0 * (step / 4.0).tan();
        for i in 0..pieces {
            let t0 = start + step * i as f64;
            let t1 = t0 + step;
            let (p0, p3) = (point(t0), point(t1));
            let (d0, d1) = (tangent(t0), tangent(t1));
            self.cubic_to(
                ts,
                p0.0 + k * d0.0,
                p0.1 + k * d0.1,
                p3.0 - k * d1.0,
                p3.1 - k * d1.1,
                p3.0,
                p3.1,
            );
        }
        true
    }

    /// Canvas `arcTo`: a line toward `(x1, y1)` ending in a tangent arc of
    /// `radius` that turns toward `(x2, y2)`. Returns false for a negative radius.
    #[allow(clippy::too_many_arguments)]
    pub fn arc_to(&mut self, ts: &Transform, x1: f64, y1: f64, x2: f64, y2: f64, radius: f64) -> bool {
        if radius < 0.0 {
            return false;
        }
        let Some(current) = self.current else {
            self.move_to(ts, x1, y1);
            return true;
        };
        let Some(inverse) = ts.invert() else {
            self.line_to(ts, x1, y1);
            return true;
        };
        let p0 = map(&inverse, current.x as f64, current.y as f64);
        let (x0, y0) = (p0.x as f64, p0.y as f64);

        let (v1x, v1y) = (x0 - x1, y0 - y1);
        let (v2x, v2y) = (x2 - x1, y2 - y1);
        let (l1, l2) = (v1x.hypot(v1y), v2x.hypot(v2y));
        let cross = v1x * v2y - v1y * v2x;
        if radius == 0.0 || l1 == 0.0 || l2 == 0.0 || cross.abs() < 1e-9 * l1 * l2 {
            self.line_to(ts, x1, y1);
            return true;
        }

        let (u1x, u1y, u2x, u2y) = (v1x / l1, v1y / l1, v2x / l2, v2y / l2);
        let theta = (u1x * u2x + u1y * u2y).clamp(-1.0, 1.0).acos();
        let tangent_len = radius / (theta / 2.0).tan();
        let (t1x, t1y) = (x1 + u1x * tangent_len, y1 + u1y * tangent_len);
        let (t2x, t2y) = (x1 + u2x * tangent_len, y1 + u2y * tangent_len);

        let (bx, by) = (u1x + u2x, u1y + u2y);
        let bl = bx.hypot(by);
        let center_dist = radius / (theta / 2.0).sin();
        let (cx, cy) = (x1 + bx / bl * center_dist, y1 + by / bl * center_dist);

        let start = (t1y - cy).atan2(t1x - cx);
        let end = (t2y - cy).atan2(t2x - cx);
        self.line_to(ts, t1x, t1y);
        self.ellipse(ts, cx, cy, radius, radius, 0.0, start, end, cross > 0.0)
    }

    /// Build the rasterizer path, or `None` when nothing drawable was added.
    pub fn to_path(&self) -> Option<Path> {
        let mut pb = PathBuilder::new();
        for seg in &self.segments {
            match *seg {
                Segment::MoveTo(p) => pb.move_to(p.x, p.y),
                Segment::LineTo(p) => pb.line_to(p.x, p.y),
                Segment::QuadTo(c, p) => pb.quad_to(c.x, c.y, p.x, p.y),
                Segment::CubicTo(c1, c2, p) => pb.cubic_to(c1.x, c1.y, c2.x, c2.y, p.x, p.y),
                Segment::Close => pb.close(),
            }
        }
        pb.finish()
    }

    /// Whether the device-space point lies inside the path under `rule`.
    pub fn contains(&self, x: f64, y: f64, rule: FillRule) -> bool {
        let (Some(path), Some(mut sample)) = (self.to_path(), Mask::new(1, 1)) else {
            return false;
        };
        let ts = Transform::from_translate(0.5 - x as f32, 0.5 - y as f32);
        sample.fill_path(&path, rule, false, ts);
        sample.data()[0] > 0
    }
}

/// Signed sweep of a canvas arc from `start` to `end`.
///
/// Clockwise sweeps lie in `[0, 2π]` and anticlockwise ones in `[-2π, 0]`; a
/// requested span of a full turn or more draws the whole circle.
pub fn arc_sweep(start: f64, end: f64, anticlockwise: bool) -> f64 {
    if !anticlockwise {
        let d = end - start;
        if d >= TAU {
            TAU
        } else {
            d.rem_euclid(TAU)
        }
    } else {
        let d = start - end;
        if d >= TAU {
            -TAU
        } else {
            -d.rem_euclid(TAU)
        }
    }
}
