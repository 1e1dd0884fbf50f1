//! Exposes a [`Surface`] to scripts as a 2D canvas context object.
//!
//! Style properties are accessors driven by the `PROPERTIES` table and
//! drawing calls are plain functions from the `METHODS` table. Every native
//! closure captures the shared surface plus its table index.

use std::cell::RefCell;
use std::rc::Rc;

use boa_engine::{
    js_string,
    native_function::NativeFunction,
    object::{builtins::JsArray, FunctionObjectBuilder, ObjectInitializer},
    property::Attribute,
    Context, JsArgs, JsError, JsNativeError, JsObject, JsResult, JsString, JsValue,
};
use boa_gc::{Finalize, Trace};
use tiny_skia::{ColorU8, FillRule, Pixmap};

use super::{style::StyleValue, GradientKind, Surface};
use crate::MAX_DIMENSION;

/// Longer dash lists are ignored.
const MAX_DASH_SEGMENTS: u64 = 1024;
/// Largest `drawImage` source, in pixels.
const MAX_IMAGE_PIXELS: u64 = 1 << 24;

/// A surface shared between the host and the script binding.
pub type SharedSurface = Rc<RefCell<Surface>>;

#[derive(Trace, Finalize, Clone)]
struct SurfaceRef {
    #[unsafe_ignore_trace]
    surface: SharedSurface,
    index: usize,
}

type Getter = fn(&SharedSurface, &mut Context) -> JsResult<JsValue>;
type Setter = fn(&SharedSurface, &JsValue, &mut Context) -> JsResult<()>;
type MethodFn = fn(&SharedSurface, &[JsValue], &mut Context) -> JsResult<JsValue>;

struct Property {
    name: &'static str,
    get: Getter,
    set: Option<Setter>,
}

struct Method {
    name: &'static str,
    length: usize,
    call: MethodFn,
}

static PROPERTIES: &[Property] = &[
    Property {
        name: "fillStyle",
        get: |s, ctx| {
            let value = s.borrow().style().fill_style.clone();
            style_to_js(s, value, ctx)
        },
        set: Some(|s, v, ctx| set_paint_style(s, v, ctx, PaintTarget::Fill)),
    },
    Property {
        name: "strokeStyle",
        get: |s, ctx| {
            let value = s.borrow().style().stroke_style.clone();
            style_to_js(s, value, ctx)
        },
        set: Some(|s, v, ctx| set_paint_style(s, v, ctx, PaintTarget::Stroke)),
    },
    Property {
        name: "globalAlpha",
        get: |s, _| Ok(JsValue::from(s.borrow().style().global_alpha)),
        set: Some(|s, v, ctx| {
            let n = v.to_number(ctx)?;
            s.borrow_mut().set_global_alpha(n);
            Ok(())
        }),
    },
    Property {
        name: "shadowColor",
        get: |s, _| Ok(text_value(&s.borrow().style().shadow_color)),
        set: Some(|s, v, ctx| {
            let text = text_arg(v, ctx)?;
            s.borrow_mut().set_shadow_color(&text);
            Ok(())
        }),
    },
    Property {
        name: "shadowBlur",
        get: |s, _| Ok(JsValue::from(s.borrow().style().shadow_blur)),
        set: Some(|s, v, ctx| {
            let n = v.to_number(ctx)?;
            s.borrow_mut().set_shadow_blur(n);
            Ok(())
        }),
    },
    Property {
        name: "shadowOffsetX",
        get: |s, _| Ok(JsValue::from(s.borrow().style().shadow_offset_x)),
        set: Some(|s, v, ctx| {
            let n = v.to_number(ctx)?;
            s.borrow_mut().set_shadow_offset_x(n);
            Ok(())
        }),
    },
    Property {
        name: "shadowOffsetY",
        get: |s, _| Ok(JsValue::from(s.borrow().style().shadow_offset_y)),
        set: Some(|s, v, ctx| {
            let n = v.to_number(ctx)?;
            s.borrow_mut().set_shadow_offset_y(n);
            Ok(())
        }),
    },
    Property {
        name: "font",
        get: |s, _| Ok(text_value(&s.borrow().style().font)),
        set: Some(|s, v, ctx| {
            let text = text_arg(v, ctx)?;
            s.borrow_mut().set_font(&text);
            Ok(())
        }),
    },
    Property {
        name: "textAlign",
        get: |s, _| Ok(text_value(&s.borrow().style().text_align)),
        set: Some(|s, v, ctx| {
            let text = text_arg(v, ctx)?;
            s.borrow_mut().set_text_align(&text);
            Ok(())
        }),
    },
    Property {
        name: "textBaseline",
        get: |s, _| Ok(text_value(&s.borrow().style().text_baseline)),
        set: Some(|s, v, ctx| {
            let text = text_arg(v, ctx)?;
            s.borrow_mut().set_text_baseline(&text);
            Ok(())
        }),
    },
    Property {
        name: "lineCap",
        get: |s, _| Ok(text_value(&s.borrow().style().line_cap)),
        set: Some(|s, v, ctx| {
            let text = text_arg(v, ctx)?;
            s.borrow_mut().set_line_cap(&text);
            Ok(())
        }),
    },
    Property {
        name: "lineJoin",
        get: |s, _| Ok(text_value(&s.borrow().style().line_join)),
        set: Some(|s, v, ctx| {
            let text = text_arg(v, ctx)?;
            s.borrow_mut().set_line_join(&text);
            Ok(())
        }),
    },
    Property {
        name: "lineWidth",
        get: |s, _| Ok(JsValue::from(s.borrow().style().line_width)),
        set: Some(|s, v, ctx| {
            let n = v.to_number(ctx)?;
            s.borrow_mut().set_line_width(n);
            Ok(())
        }),
    },
    Property {
        name: "miterLimit",
        get: |s, _| Ok(JsValue::from(s.borrow().style().miter_limit)),
        set: Some(|s, v, ctx| {
            let n = v.to_number(ctx)?;
            s.borrow_mut().set_miter_limit(n);
            Ok(())
        }),
    },
    Property {
        name: "lineDashOffset",
        get: |s, _| Ok(JsValue::from(s.borrow().style().line_dash_offset)),
        set: Some(|s, v, ctx| {
            let n = v.to_number(ctx)?;
            s.borrow_mut().set_line_dash_offset(n);
            Ok(())
        }),
    },
    Property {
        name: "globalCompositeOperation",
        get: |s, _| Ok(text_value(&s.borrow().style().global_composite_operation)),
        set: Some(|s, v, ctx| {
            let text = text_arg(v, ctx)?;
            s.borrow_mut().set_global_composite_operation(&text);
            Ok(())
        }),
    },
    Property {
        name: "imageSmoothingEnabled",
        get: |s, _| Ok(JsValue::from(s.borrow().style().image_smoothing_enabled)),
        set: Some(|s, v, _| {
            s.borrow_mut().set_image_smoothing_enabled(v.to_boolean());
            Ok(())
        }),
    },
    Property {
        name: "width",
        get: |s, _| Ok(JsValue::from(s.borrow().width())),
        set: None,
    },
    Property {
        name: "height",
        get: |s, _| Ok(JsValue::from(s.borrow().height())),
        set: None,
    },
];

static METHODS: &[Method] = &[
    Method {
        name: "save",
        length: 0,
        call: |s, _, _| {
            s.borrow_mut().save();
            Ok(JsValue::undefined())
        },
    },
    Method {
        name: "restore",
        length: 0,
        call: |s, _, _| {
            s.borrow_mut().restore();
            Ok(JsValue::undefined())
        },
    },
    Method {
        name: "beginPath",
        length: 0,
        call: |s, _, _| {
            s.borrow_mut().begin_path();
            Ok(JsValue::undefined())
        },
    },
    Method {
        name: "closePath",
        length: 0,
        call: |s, _, _| {
            s.borrow_mut().close_path();
            Ok(JsValue::undefined())
        },
    },
    Method {
        name: "moveTo",
        length: 2,
        call: |s, args, ctx| {
            let [x, y] = numbers(args, ctx)?;
            s.borrow_mut().move_to(x, y);
            Ok(JsValue::undefined())
        },
    },
    Method {
        name: "lineTo",
        length: 2,
        call: |s, args, ctx| {
            let [x, y] = numbers(args, ctx)?;
            s.borrow_mut().line_to(x, y);
            Ok(JsValue::undefined())
        },
    },
    Method {
        name: "bezierCurveTo",
        length: 6,
        call: |s, args, ctx| {
            let c = numbers(args, ctx)?;
            s.borrow_mut().bezier_curve_to(c);
            Ok(JsValue::undefined())
        },
    },
    Method {
        name: "quadraticCurveTo",
        length: 4,
        call: |s, args, ctx| {
            let [cpx, cpy, x, y] = numbers(args, ctx)?;
            s.borrow_mut().quadratic_curve_to(cpx, cpy, x, y);
            Ok(JsValue::undefined())
        },
    },
    Method {
        name: "arc",
        length: 5,
        call: |s, args, ctx| {
            let [x, y, r, start, end] = numbers(args, ctx)?;
            let ccw = args.get_or_undefined(5).to_boolean();
            if !s.borrow_mut().arc(x, y, r, start, end, ccw) {
                return Err(negative_radius(r));
            }
            Ok(JsValue::undefined())
        },
    },
    Method {
        name: "arcTo",
        length: 5,
        call: |s, args, ctx| {
            let [x1, y1, x2, y2, r] = numbers(args, ctx)?;
            if !s.borrow_mut().arc_to(x1, y1, x2, y2, r) {
                return Err(negative_radius(r));
            }
            Ok(JsValue::undefined())
        },
    },
    Method {
        name: "ellipse",
        length: 7,
        call: |s, args, ctx| {
            let e = numbers::<7>(args, ctx)?;
            let ccw = args.get_or_undefined(7).to_boolean();
            if !s.borrow_mut().ellipse(e, ccw) {
                return Err(negative_radius(e[2].min(e[3])));
            }
            Ok(JsValue::undefined())
        },
    },
    Method {
        name: "rect",
        length: 4,
        call: |s, args, ctx| {
            let [x, y, w, h] = numbers(args, ctx)?;
            s.borrow_mut().rect(x, y, w, h);
            Ok(JsValue::undefined())
        },
    },
    Method {
        name: "fill",
        length: 0,
        call: |s, args, ctx| {
            let rule = fill_rule(args.get_or_undefined(0), ctx)?;
            s.borrow_mut().fill(rule);
            Ok(JsValue::undefined())
        },
    },
    Method {
        name: "stroke",
        length: 0,
        call: |s, _, _| {
            s.borrow_mut().stroke();
            Ok(JsValue::undefined())
        },
    },
    Method {
        name: "clip",
        length: 0,
        call: |s, args, ctx| {
            let rule = fill_rule(args.get_or_undefined(0), ctx)?;
            s.borrow_mut().clip(rule);
            Ok(JsValue::undefined())
        },
    },
    Method {
        name: "isPointInPath",
        length: 2,
        call: |s, args, ctx| {
            let [x, y] = numbers(args, ctx)?;
            let rule = fill_rule(args.get_or_undefined(2), ctx)?;
            Ok(JsValue::from(s.borrow().is_point_in_path(x, y, rule)))
        },
    },
    Method {
        name: "fillRect",
        length: 4,
        call: |s, args, ctx| {
            let [x, y, w, h] = numbers(args, ctx)?;
            s.borrow_mut().fill_rect(x, y, w, h);
            Ok(JsValue::undefined())
        },
    },
    Method {
        name: "strokeRect",
        length: 4,
        call: |s, args, ctx| {
            let [x, y, w, h] = numbers(args, ctx)?;
            s.borrow_mut().stroke_rect(x, y, w, h);
            Ok(JsValue::undefined())
        },
    },
    Method {
        name: "clearRect",
        length: 4,
        call: |s, args, ctx| {
            let [x, y, w, h] = numbers(args, ctx)?;
            s.borrow_mut().clear_rect(x, y, w, h);
            Ok(JsValue::undefined())
        },
    },
    Method {
        name: "fillText",
        length: 3,
        call: |s, args, ctx| {
            let (content, x, y, max_width) = text_call_args(args, ctx)?;
            s.borrow_mut().fill_text(&content, x, y, max_width);
            Ok(JsValue::undefined())
        },
    },
    Method {
        name: "strokeText",
        length: 3,
        call: |s, args, ctx| {
            let (content, x, y, max_width) = text_call_args(args, ctx)?;
            s.borrow_mut().stroke_text(&content, x, y, max_width);
            Ok(JsValue::undefined())
        },
    },
    Method {
        name: "measureText",
        length: 1,
        call: |s, args, ctx| {
            let content = text_arg(args.get_or_undefined(0), ctx)?;
            let m = s.borrow().measure_text(&content);
            let metrics = ObjectInitializer::new(ctx)
                .property(js_string!("width"), m.width, Attribute::all())
                .property(js_string!("actualBoundingBoxAscent"), m.ascent, Attribute::all())
                .property(js_string!("actualBoundingBoxDescent"), m.descent, Attribute::all())
                .property(js_string!("fontBoundingBoxAscent"), m.ascent, Attribute::all())
                .property(js_string!("fontBoundingBoxDescent"), m.descent, Attribute::all())
                .build();
            Ok(metrics.into())
        },
    },
    Method {
        name: "translate",
        length: 2,
        call: |s, args, ctx| {
            let [x, y] = numbers(args, ctx)?;
            s.borrow_mut().translate(x, y);
            Ok(JsValue::undefined())
        },
    },
    Method {
        name: "rotate",
        length: 1,
        call: |s, args, ctx| {
            let [angle] = numbers(args, ctx)?;
            s.borrow_mut().rotate(angle);
            Ok(JsValue::undefined())
        },
    },
    Method {
        name: "scale",
        length: 2,
        call: |s, args, ctx| {
            let [x, y] = numbers(args, ctx)?;
            s.borrow_mut().scale(x, y);
            Ok(JsValue::undefined())
        },
    },
    Method {
        name: "transform",
        length: 6,
        call: |s, args, ctx| {
            let m = numbers(args, ctx)?;
            s.borrow_mut().apply_transform(m);
            Ok(JsValue::undefined())
        },
    },
    Method {
        name: "setTransform",
        length: 0,
        call: |s, args, ctx| {
            if args.is_empty() {
                s.borrow_mut().reset_transform();
            } else {
                let m = numbers(args, ctx)?;
                s.borrow_mut().set_transform(m);
            }
            Ok(JsValue::undefined())
        },
    },
    Method {
        name: "resetTransform",
        length: 0,
        call: |s, _, _| {
            s.borrow_mut().reset_transform();
            Ok(JsValue::undefined())
        },
    },
    Method {
        name: "setLineDash",
        length: 1,
        call: |s, args, ctx| {
            let Some(obj) = args.get_or_undefined(0).as_object() else {
                return Err(JsNativeError::typ().with_message("setLineDash expects an array").into());
            };
            let list = JsArray::from_object(obj.clone())?;
            let len = list.length(ctx)?;
            if len > MAX_DASH_SEGMENTS {
                log::debug!("setLineDash with {} segments ignored", len);
                return Ok(JsValue::undefined());
            }
            let mut segments = Vec::new();
            for i in 0..len {
                segments.push(list.get(i, ctx)?.to_number(ctx)?);
            }
            s.borrow_mut().set_line_dash(&segments);
            Ok(JsValue::undefined())
        },
    },
    Method {
        name: "getLineDash",
        length: 0,
        call: |s, _, ctx| {
            let dash = s.borrow().style().line_dash.clone();
            Ok(JsArray::from_iter(dash.into_iter().map(JsValue::from), ctx).into())
        },
    },
    Method {
        name: "createLinearGradient",
        length: 4,
        call: |s, args, ctx| {
            let [x0, y0, x1, y1] = numbers(args, ctx)?;
            if ![x0, y0, x1, y1].iter().all(|v| v.is_finite()) {
                return Err(JsNativeError::typ().with_message("gradient coordinates must be finite").into());
            }
            let id = s.borrow_mut().create_gradient(GradientKind::Linear { x0, y0, x1, y1 });
            Ok(gradient_handle(s, id, ctx).into())
        },
    },
    Method {
        name: "createRadialGradient",
        length: 6,
        call: |s, args, ctx| {
            let [x0, y0, r0, x1, y1, r1] = numbers(args, ctx)?;
            if ![x0, y0, r0, x1, y1, r1].iter().all(|v| v.is_finite()) {
                return Err(JsNativeError::typ().with_message("gradient coordinates must be finite").into());
            }
            if r0 < 0.0 || r1 < 0.0 {
                return Err(negative_radius(r0.min(r1)));
            }
            let id = s.borrow_mut().create_gradient(GradientKind::Radial { x0, y0, r0, x1, y1, r1 });
            Ok(gradient_handle(s, id, ctx).into())
        },
    },
    Method {
        name: "drawImage",
        length: 3,
        call: |s, args, ctx| {
            let image = image_source(args.get_or_undefined(0), ctx)?;
            let (w, h) = (image.width() as f64, image.height() as f64);
            let (src, dst) = match args.len() {
                3 => {
                    let [dx, dy] = numbers(&args[1..], ctx)?;
                    (None, [dx, dy, w, h])
                }
                5 => (None, numbers(&args[1..], ctx)?),
                9 => {
                    let [sx, sy, sw, sh, dx, dy, dw, dh] = numbers(&args[1..], ctx)?;
                    (Some([sx, sy, sw, sh]), [dx, dy, dw, dh])
                }
                n => {
                    return Err(JsNativeError::typ()
                        .with_message(format!("drawImage expects 3, 5 or 9 arguments, got {}", n))
                        .into())
                }
            };
            s.borrow_mut().draw_image(&image, src, dst);
            Ok(JsValue::undefined())
        },
    },
    Method {
        name: "getImageData",
        length: 4,
        call: |s, args, ctx| {
            let [x, y, w, h] = numbers(args, ctx)?;
            if ![x, y, w, h].iter().all(|v| v.is_finite() && *v >= 0.0) || w < 1.0 || h < 1.0 {
                return Err(JsNativeError::range().with_message("invalid image data rectangle").into());
            }
            let (w, h) = (w as u32, h as u32);
            let bytes = s
                .borrow()
                .image_data(x as u32, y as u32, w, h)
                .map_err(|e| JsNativeError::range().with_message(e.to_string()))?;
            let data = JsArray::from_iter(bytes.into_iter().map(|b| JsValue::from(i32::from(b))), ctx);
            let image = ObjectInitializer::new(ctx)
                .property(js_string!("width"), w, Attribute::all())
                .property(js_string!("height"), h, Attribute::all())
                .property(js_string!("data"), data, Attribute::all())
                .build();
            Ok(image.into())
        },
    },
];

/// Build the script-facing canvas context for `surface`.
pub fn create_canvas_object(surface: &SharedSurface, context: &mut Context) -> JsObject {
    let realm = context.realm().clone();
    let mut accessors = Vec::with_capacity(PROPERTIES.len());
    for (index, property) in PROPERTIES.iter().enumerate() {
        let capture = SurfaceRef {
            surface: surface.clone(),
            index,
        };
        let getter = FunctionObjectBuilder::new(
            &realm,
            NativeFunction::from_copy_closure_with_captures(
                |_this, _args, cap: &SurfaceRef, ctx| (PROPERTIES[cap.index].get)(&cap.surface, ctx),
                capture.clone(),
            ),
        )
        .name(JsString::from(format!("get {}", property.name).as_str()))
        .length(0)
        .build();
        let setter = FunctionObjectBuilder::new(
            &realm,
            NativeFunction::from_copy_closure_with_captures(
                |_this, args, cap: &SurfaceRef, ctx| {
                    // Read-only properties swallow assignments.
                    if let Some(set) = PROPERTIES[cap.index].set {
                        set(&cap.surface, args.get_or_undefined(0), ctx)?;
                    }
                    Ok(JsValue::undefined())
                },
                capture,
            ),
        )
        .name(JsString::from(format!("set {}", property.name).as_str()))
        .length(1)
        .build();
        accessors.push((property.name, getter, setter));
    }

    let mut init = ObjectInitializer::new(context);
    for (name, getter, setter) in accessors {
        init.accessor(
            JsString::from(name),
            Some(getter),
            Some(setter),
            Attribute::CONFIGURABLE | Attribute::ENUMERABLE,
        );
    }
    for (index, method) in METHODS.iter().enumerate() {
        init.function(
            NativeFunction::from_copy_closure_with_captures(
                |_this, args, cap: &SurfaceRef, ctx| (METHODS[cap.index].call)(&cap.surface, args, ctx),
                SurfaceRef {
                    surface: surface.clone(),
                    index,
                },
            ),
            (JsString::from(method.name), JsString::from(method.name)),
            method.length,
        );
    }
    init.build()
}

#[derive(Clone, Copy)]
enum PaintTarget {
    Fill,
    Stroke,
}

// Gradient handles carry their id; anything else is treated as a color string.
fn set_paint_style(s: &SharedSurface, value: &JsValue, ctx: &mut Context, target: PaintTarget) -> JsResult<()> {
    if let Some(obj) = value.as_object() {
        let id = obj.get(js_string!("__gradientId"), ctx)?;
        if id.is_number() {
            let id = id.to_number(ctx)? as usize;
            let mut surface = s.borrow_mut();
            match target {
                PaintTarget::Fill => surface.set_fill_gradient(id),
                PaintTarget::Stroke => surface.set_stroke_gradient(id),
            }
            return Ok(());
        }
    }
    let text = text_arg(value, ctx)?;
    let mut surface = s.borrow_mut();
    match target {
        PaintTarget::Fill => surface.set_fill_style(&text),
        PaintTarget::Stroke => surface.set_stroke_style(&text),
    }
    Ok(())
}

fn style_to_js(s: &SharedSurface, value: StyleValue, ctx: &mut Context) -> JsResult<JsValue> {
    match value {
        StyleValue::Color(text) => Ok(text_value(&text)),
        StyleValue::Gradient(id) => Ok(gradient_handle(s, id, ctx).into()),
    }
}

fn gradient_handle(s: &SharedSurface, id: usize, ctx: &mut Context) -> JsObject {
    let add_stop = NativeFunction::from_copy_closure_with_captures(
        |_this, args, cap: &SurfaceRef, ctx| {
            let offset = args.get_or_undefined(0).to_number(ctx)?;
            let color = text_arg(args.get_or_undefined(1), ctx)?;
            cap.surface
                .borrow_mut()
                .add_color_stop(cap.index, offset, &color)
                .map_err(|msg| JsError::from_native(JsNativeError::range().with_message(msg)))?;
            Ok(JsValue::undefined())
        },
        SurfaceRef {
            surface: s.clone(),
            index: id,
        },
    );
    ObjectInitializer::new(ctx)
        .property(js_string!("__gradientId"), id as f64, Attribute::READONLY)
        .function(add_stop, (js_string!("addColorStop"), js_string!("addColorStop")), 2)
        .build()
}

/// Read an ImageData-shaped object (`width`, `height` and a `data` list of
/// unpremultiplied RGBA bytes) into a pixmap.
fn image_source(value: &JsValue, ctx: &mut Context) -> JsResult<Pixmap> {
    let unsupported = || JsNativeError::typ().with_message("drawImage source must be ImageData-like");
    let obj = value.as_object().ok_or_else(unsupported)?;
    let width = obj.get(js_string!("width"), ctx)?.to_number(ctx)?;
    let height = obj.get(js_string!("height"), ctx)?.to_number(ctx)?;
    let data = obj.get(js_string!("data"), ctx)?;
    let data = data.as_object().ok_or_else(unsupported)?;
    let in_range = |v: f64| v.fract() == 0.0 && v >= 1.0 && v <= MAX_DIMENSION as f64;
    if !in_range(width) || !in_range(height) || width * height > MAX_IMAGE_PIXELS as f64 {
        return Err(JsNativeError::range()
            .with_message(format!("drawImage source size {}x{} is out of range", width, height))
            .into());
    }
    let (width, height) = (width as u32, height as u32);
    let expected = width as u64 * height as u64 * 4;
    let len = data.get(js_string!("length"), ctx)?.to_length(ctx)?;
    if len != expected {
        return Err(JsNativeError::typ()
            .with_message(format!("drawImage data holds {} bytes, expected {}", len, expected))
            .into());
    }
    let mut pixmap = Pixmap::new(width, height).ok_or_else(unsupported)?;
    let mut index: u32 = 0;
    for px in pixmap.pixels_mut() {
        let mut rgba = [0u8; 4];
        for channel in &mut rgba {
            let v = data.get(index, ctx)?.to_number(ctx)?;
            *channel = if v.is_nan() { 0 } else { v.round().clamp(0.0, 255.0) as u8 };
            index += 1;
        }
        *px = ColorU8::from_rgba(rgba[0], rgba[1], rgba[2], rgba[3]).premultiply();
    }
    Ok(pixmap)
}

fn text_value(text: &str) -> JsValue {
    JsValue::from(JsString::from(text))
}

fn text_arg(value: &JsValue, ctx: &mut Context) -> JsResult<String> {
    Ok(value.to_string(ctx)?.to_std_string_escaped())
}

/// Convert the first `N` arguments to numbers; missing ones become NaN.
fn numbers<const N: usize>(args: &[JsValue], ctx: &mut Context) -> JsResult<[f64; N]> {
    let mut out = [0.0; N];
    for (i, slot) in out.iter_mut().enumerate() {
        *slot = args.get_or_undefined(i).to_number(ctx)?;
    }
    Ok(out)
}

fn fill_rule(value: &JsValue, ctx: &mut Context) -> JsResult<FillRule> {
    if value.is_undefined() {
        return Ok(FillRule::Winding);
    }
    Ok(match text_arg(value, ctx)?.as_str() {
        "evenodd" => FillRule::EvenOdd,
        _ => FillRule::Winding,
    })
}

fn text_call_args(args: &[JsValue], ctx: &mut Context) -> JsResult<(String, f64, f64, Option<f64>)> {
    let content = text_arg(args.get_or_undefined(0), ctx)?;
    let x = args.get_or_undefined(1).to_number(ctx)?;
    let y = args.get_or_undefined(2).to_number(ctx)?;
    let max_width = match args.get(3) {
        Some(v) if !v.is_undefined() => Some(v.to_number(ctx)?),
        _ => None,
    };
    Ok((content, x, y, max_width))
}

fn negative_radius(r: f64) -> JsError {
    JsNativeError::range()
        .with_message(format!("the radius provided ({}) is negative", r))
        .into()
}
