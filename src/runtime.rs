//! Script runtime host
//!
//! A Boa `Context` is not `Send`, so each VM owns one dedicated worker thread
//! that builds the context, loads the script bundle once and then runs render
//! jobs from a channel strictly one at a time.

use std::cell::RefCell;
use std::fmt;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::sync::{mpsc, Arc};
use std::thread::{self, JoinHandle};

use boa_engine::{
    native_function::NativeFunction, object::builtins::JsFunction, Context, JsArgs, JsString, JsValue, Script,
    Source,
};
use boa_gc::{Finalize, Trace};
use tiny_skia::Pixmap;

use tokio::sync::oneshot;

use crate::bridge::{CancelToken, CompletionSender, Payload};
use crate::error::{Error, Result};
use crate::rendering::binding::{create_canvas_object, SharedSurface};
use crate::rendering::Surface;
use crate::{LogSink, Resolution, VmConfig};

/// Global function the entry script defines.
pub const ENTRY_POINT: &str = "renderChart";
/// Global the drawing surface is bound to (null for vector output).
pub const CANVAS_GLOBAL: &str = "hostCanvas";
/// Environment variable naming the directory holding the vendor scripts.
pub const ASSETS_DIR_ENV: &str = "VEGAVM_ASSETS_DIR";
/// Used when `VEGAVM_ASSETS_DIR` is unset.
pub const DEFAULT_ASSETS_DIR: &str = "assets/vendor";

const PUMP_FN: &str = "__vegavmPump";
const CLEAR_TIMERS_FN: &str = "__vegavmClearTimers";

const PRELUDE: &str = include_str!("../assets/prelude.js");
const ENTRY_SCRIPT: &str = include_str!("../assets/index.js");

// Boa re-enters the interpreter natively for callbacks; deep chart specs need room.
const WORKER_STACK_SIZE: usize = 32 * 1024 * 1024;

#[derive(Clone)]
enum AssetSource {
    File(PathBuf),
    Inline(Arc<str>),
}

/// One script loaded into the runtime at construction.
#[derive(Clone)]
pub struct ScriptAsset {
    name: String,
    source: AssetSource,
    optional: bool,
}

impl ScriptAsset {
    /// A script read from disk; missing files fail construction.
    pub fn file(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        Self {
            name: asset_name(&path),
            source: AssetSource::File(path),
            optional: false,
        }
    }

    /// A script read from disk that is skipped when the file does not exist.
    pub fn optional_file(path: impl Into<PathBuf>) -> Self {
        Self {
            optional: true,
            ..Self::file(path)
        }
    }

    /// A script held in memory.
    pub fn inline(name: impl Into<String>, source: impl Into<Arc<str>>) -> Self {
        Self {
            name: name.into(),
            source: AssetSource::Inline(source.into()),
            optional: false,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_optional(&self) -> bool {
        self.optional
    }

    /// Read the source text. `Ok(None)` means an optional file is absent.
    fn load(&self) -> Result<Option<Arc<str>>> {
        match &self.source {
            AssetSource::Inline(text) => Ok(Some(text.clone())),
            AssetSource::File(path) => match std::fs::read_to_string(path) {
                Ok(text) => Ok(Some(text.into())),
                Err(e) if self.optional && e.kind() == std::io::ErrorKind::NotFound => Ok(None),
                Err(e) => Err(Error::AssetLoad {
                    asset: self.name.clone(),
                    reason: format!("{}: {}", path.display(), e),
                }),
            },
        }
    }
}

impl fmt::Debug for ScriptAsset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let source = match &self.source {
            AssetSource::File(path) => path.display().to_string(),
            AssetSource::Inline(text) => format!("<inline, {} bytes>", text.len()),
        };
        f.debug_struct("ScriptAsset")
            .field("name", &self.name)
            .field("source", &source)
            .field("optional", &self.optional)
            .finish()
    }
}

fn asset_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// Ordered scripts executed into a fresh runtime.
///
/// The usual bundle is [`ScriptBundle::vega`]: optional polyfills, the
/// optional engine runtime, the Vega library, then the embedded entry script
/// that defines `renderChart`.
#[derive(Clone, Debug, Default)]
pub struct ScriptBundle {
    assets: Vec<ScriptAsset>,
}

impl ScriptBundle {
    /// An empty bundle. Add assets with [`ScriptBundle::push`].
    pub fn new() -> Self {
        Self::default()
    }

    /// The Vega bundle read from `dir`.
    pub fn vega(dir: impl AsRef<Path>) -> Self {
        let dir = dir.as_ref();
        Self::new()
            .push(ScriptAsset::optional_file(dir.join("polyfill.min.js")))
            .push(ScriptAsset::optional_file(dir.join("runtime.min.js")))
            .push(ScriptAsset::file(dir.join("vega.min.js")))
            .push(Self::entry_script())
    }

    /// The Vega bundle from `$VEGAVM_ASSETS_DIR`, or `assets/vendor`.
    ///
    /// Nothing is read until a VM is constructed.
    pub fn from_env() -> Self {
        let dir = std::env::var_os(ASSETS_DIR_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_ASSETS_DIR));
        Self::vega(dir)
    }

    /// A charting library supplied in memory, followed by the entry script.
    pub fn with_library(name: impl Into<String>, source: impl Into<Arc<str>>) -> Self {
        Self::new()
            .push(ScriptAsset::inline(name, source))
            .push(Self::entry_script())
    }

    /// The embedded script defining `renderChart`.
    pub fn entry_script() -> ScriptAsset {
        ScriptAsset::inline("index.js", ENTRY_SCRIPT)
    }

    pub fn push(mut self, asset: ScriptAsset) -> Self {
        self.assets.push(asset);
        self
    }

    pub fn assets(&self) -> &[ScriptAsset] {
        &self.assets
    }

    pub fn is_empty(&self) -> bool {
        self.assets.is_empty()
    }
}

/// What a render job draws into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Target {
    Vector,
    Raster(Resolution),
}

/// One render request handed to the worker. Not retained after it runs.
pub(crate) struct RenderJob {
    pub spec: String,
    pub data: String,
    pub target: Target,
    pub cancel: CancelToken,
    /// Entry point accepted the job, or the synchronous failure
    pub accepted: oneshot::Sender<Result<()>>,
    pub completion: CompletionSender,
    /// Surface pixels after the script goes idle (raster jobs only)
    pub pixels: Option<oneshot::Sender<Pixmap>>,
}

/// Native state the host callbacks close over.
#[derive(Trace, Finalize, Clone)]
struct HostCells {
    #[unsafe_ignore_trace]
    completion: Rc<RefCell<Option<CompletionSender>>>,
    #[unsafe_ignore_trace]
    log_sink: LogSink,
}

impl HostCells {
    fn deliver(&self, callback: &str, outcome: impl FnOnce(CompletionSender)) {
        match self.completion.borrow_mut().take() {
            Some(sender) => outcome(sender),
            None => log::warn!("{}() called with no render waiting; ignored", callback),
        }
    }
}

/// A booted runtime: context, host callbacks and resolved entry points.
pub(crate) struct ScriptHost {
    context: Context,
    cells: HostCells,
    entry: JsFunction,
    pump: JsFunction,
    clear_timers: JsFunction,
    max_pump_turns: usize,
}

impl ScriptHost {
    pub fn new(config: &VmConfig) -> Result<Self> {
        let mut context = Context::default();
        if config.script_loop_iteration_limit > 0 {
            context
                .runtime_limits_mut()
                .set_loop_iteration_limit(config.script_loop_iteration_limit);
        }
        if config.script_recursion_limit < usize::MAX {
            context
                .runtime_limits_mut()
                .set_recursion_limit(config.script_recursion_limit);
        }

        let cells = HostCells {
            completion: Rc::new(RefCell::new(None)),
            log_sink: config.log_sink(),
        };
        register_callbacks(&mut context, &cells)?;
        run_script(&mut context, "prelude.js", PRELUDE)?;

        for asset in config.bundle.assets() {
            match asset.load()? {
                Some(source) => {
                    log::debug!("loading script asset {} ({} bytes)", asset.name(), source.len());
                    run_script(&mut context, asset.name(), &source)?;
                }
                None => log::debug!("optional script asset {} not found; skipped", asset.name()),
            }
        }

        let entry = global_function(&mut context, ENTRY_POINT)
            .ok_or_else(|| Error::MissingEntryPoint(ENTRY_POINT.to_string()))?;
        let pump = global_function(&mut context, PUMP_FN)
            .ok_or_else(|| Error::InitializationError(format!("{} is not defined", PUMP_FN)))?;
        let clear_timers = global_function(&mut context, CLEAR_TIMERS_FN)
            .ok_or_else(|| Error::InitializationError(format!("{} is not defined", CLEAR_TIMERS_FN)))?;

        Ok(Self {
            context,
            cells,
            entry,
            pump,
            clear_timers,
            max_pump_turns: config.max_pump_turns,
        })
    }

    /// Run one job to idle, replying through its channels.
    pub fn run(&mut self, job: RenderJob) {
        let RenderJob {
            spec,
            data,
            target,
            cancel,
            accepted,
            completion,
            pixels,
        } = job;

        if let Some(reason) = cancel.reason() {
            log::debug!("skipping render cancelled before it started");
            let _ = accepted.send(Err(reason.into()));
            return;
        }

        let (surface, width, height) = match target {
            Target::Vector => (None, 0, 0),
            Target::Raster(res) => match Surface::new(res.width, res.height) {
                Ok(s) => (Some(Rc::new(RefCell::new(s))), res.width, res.height),
                Err(e) => {
                    let _ = accepted.send(Err(e));
                    return;
                }
            },
        };

        let canvas = match &surface {
            Some(s) => create_canvas_object(s, &mut self.context).into(),
            None => JsValue::null(),
        };
        if let Err(e) = self.bind_canvas(canvas) {
            let _ = accepted.send(Err(e));
            return;
        }

        *self.cells.completion.borrow_mut() = Some(completion);
        if let Err(text) = self.invoke_entry(&spec, &data, width, height) {
            self.cells.completion.borrow_mut().take();
            let _ = accepted.send(Err(Error::RenderError(text)));
            self.finish();
            return;
        }
        let _ = accepted.send(Ok(()));

        self.drain(&cancel);
        if self.cells.completion.borrow_mut().take().is_some() && !cancel.is_cancelled() {
            log::warn!("script went idle without calling success or failure");
        }

        if let (Some(surface), Some(pixels)) = (surface, pixels) {
            read_back(&surface, width, height, pixels);
        }
        self.finish();
    }

    fn bind_canvas(&mut self, value: JsValue) -> Result<()> {
        let global = self.context.global_object();
        global
            .set(JsString::from(CANVAS_GLOBAL), value, true, &mut self.context)
            .map_err(|e| Error::InitializationError(format!("failed to bind {}: {}", CANVAS_GLOBAL, e)))?;
        Ok(())
    }

    // The entry must return the literal "true"; anything else (or a throw) is the failure text.
    fn invoke_entry(&mut self, spec: &str, data: &str, width: u32, height: u32) -> std::result::Result<(), String> {
        let args = [
            JsValue::from(JsString::from(spec)),
            JsValue::from(JsString::from(data)),
            JsValue::from(width),
            JsValue::from(height),
        ];
        match self.entry.call(&JsValue::undefined(), &args, &mut self.context) {
            Ok(value) => {
                let text = display_text(&value, &mut self.context);
                if text == "true" {
                    Ok(())
                } else {
                    Err(text)
                }
            }
            Err(e) => Err(e.to_string()),
        }
    }

    /// Alternate promise jobs and timers until both are idle, the result has
    /// been delivered, or the turn budget runs out.
    fn drain(&mut self, cancel: &CancelToken) {
        for _ in 0..self.max_pump_turns {
            self.context.run_jobs();
            if self.cells.completion.borrow().is_none() {
                return;
            }
            if cancel.is_cancelled() {
                log::debug!("render cancelled while draining script work");
                return;
            }
            match self.pump.call(&JsValue::undefined(), &[], &mut self.context) {
                Ok(fired) if fired.as_number().unwrap_or(0.0) > 0.0 => {}
                Ok(_) => {
                    self.context.run_jobs();
                    return;
                }
                Err(e) => {
                    log::error!("timer pump failed: {}", e);
                    return;
                }
            }
        }
        log::warn!("script still busy after {} pump turns", self.max_pump_turns);
    }

    // Leave the runtime clean for the next job.
    fn finish(&mut self) {
        match self.clear_timers.call(&JsValue::undefined(), &[], &mut self.context) {
            Ok(dropped) => {
                let dropped = dropped.as_number().unwrap_or(0.0);
                if dropped > 0.0 {
                    log::debug!("dropped {} pending timers after render", dropped);
                }
            }
            Err(e) => log::warn!("failed to clear timers: {}", e),
        }
        self.context.run_jobs();
        if let Err(e) = self.bind_canvas(JsValue::null()) {
            log::warn!("{}", e);
        }
    }
}

fn read_back(surface: &SharedSurface, width: u32, height: u32, pixels: oneshot::Sender<Pixmap>) {
    match surface.borrow().read_pixels(0, 0, width, height) {
        Ok(pixmap) => {
            if pixels.send(pixmap).is_err() {
                log::debug!("surface pixels dropped; the caller stopped waiting");
            }
        }
        Err(e) => log::error!("failed to read back surface: {}", e),
    }
}

fn register_callbacks(context: &mut Context, cells: &HostCells) -> Result<()> {
    let log_fn = NativeFunction::from_copy_closure_with_captures(
        |_this, args, cells: &HostCells, ctx| {
            let line = args.iter().map(|a| display_text(a, ctx)).collect::<Vec<_>>().join(" ");
            (cells.log_sink)(&line);
            Ok(JsValue::undefined())
        },
        cells.clone(),
    );
    let success_fn = NativeFunction::from_copy_closure_with_captures(
        |_this, args, cells: &HostCells, _ctx| {
            let payload = payload_of(args.get_or_undefined(0));
            cells.deliver("success", |sender| sender.succeed(payload));
            Ok(JsValue::undefined())
        },
        cells.clone(),
    );
    let failure_fn = NativeFunction::from_copy_closure_with_captures(
        |_this, args, cells: &HostCells, _ctx| {
            let payload = payload_of(args.get_or_undefined(0));
            cells.deliver("failure", |sender| sender.fail(payload));
            Ok(JsValue::undefined())
        },
        cells.clone(),
    );

    for (name, function) in [("log", log_fn), ("success", success_fn), ("failure", failure_fn)] {
        context
            .register_global_builtin_callable(JsString::from(name), 1, function)
            .map_err(|e| Error::InitializationError(format!("failed to register {}: {}", name, e)))?;
    }
    Ok(())
}

fn run_script(context: &mut Context, name: &str, source: &str) -> Result<()> {
    let script = Script::parse(Source::from_bytes(source), None, context).map_err(|e| Error::AssetParse {
        asset: name.to_string(),
        reason: e.to_string(),
    })?;
    script.evaluate(context).map_err(|e| Error::AssetExecution {
        asset: name.to_string(),
        reason: e.to_string(),
    })?;
    context.run_jobs();
    Ok(())
}

fn global_function(context: &mut Context, name: &str) -> Option<JsFunction> {
    let global = context.global_object();
    let value = global.get(JsString::from(name), context).ok()?;
    value.as_object().and_then(|obj| JsFunction::from_object(obj.clone()))
}

fn payload_of(value: &JsValue) -> Payload {
    if value.is_undefined() || value.is_null() {
        Payload::Absent
    } else if let Some(text) = value.as_string() {
        Payload::Text(text.to_std_string_escaped())
    } else {
        Payload::Other(type_name(value))
    }
}

fn type_name(value: &JsValue) -> &'static str {
    if value.is_boolean() {
        "boolean"
    } else if value.is_number() {
        "number"
    } else if value.is_bigint() {
        "bigint"
    } else if value.is_symbol() {
        "symbol"
    } else if value.as_callable().is_some() {
        "function"
    } else {
        "object"
    }
}

fn display_text(value: &JsValue, ctx: &mut Context) -> String {
    if let Some(text) = value.as_string() {
        return text.to_std_string_escaped();
    }
    match value.to_string(ctx) {
        Ok(text) => text.to_std_string_escaped(),
        Err(_) => value.display().to_string(),
    }
}

/// The worker thread owning a [`ScriptHost`].
pub(crate) struct Worker {
    tx: mpsc::Sender<RenderJob>,
    handle: JoinHandle<()>,
}

impl Worker {
    /// Spawn the runtime thread and wait until the bundle has loaded.
    pub fn spawn(config: &VmConfig) -> Result<Self> {
        let (tx, rx) = mpsc::channel::<RenderJob>();
        let (ready_tx, ready_rx) = oneshot::channel::<Result<()>>();
        let config = config.clone();

        let handle = thread::Builder::new()
            .name("vegavm-runtime".into())
            .stack_size(WORKER_STACK_SIZE)
            .spawn(move || {
                let mut host = match ScriptHost::new(&config) {
                    Ok(host) => {
                        let _ = ready_tx.send(Ok(()));
                        host
                    }
                    Err(e) => {
                        let _ = ready_tx.send(Err(e));
                        return;
                    }
                };
                while let Ok(job) = rx.recv() {
                    host.run(job);
                }
                log::debug!("runtime worker exiting");
            })
            .map_err(|e| Error::InitializationError(format!("failed to spawn runtime thread: {}", e)))?;

        match ready_rx.blocking_recv() {
            Ok(Ok(())) => Ok(Self { tx, handle }),
            Ok(Err(e)) => {
                let _ = handle.join();
                Err(e)
            }
            Err(_) => {
                let _ = handle.join();
                Err(Error::InitializationError("runtime thread exited during startup".into()))
            }
        }
    }

    pub fn submit(&self, job: RenderJob) -> Result<()> {
        self.tx.send(job).map_err(|_| Error::RuntimeUnavailable)
    }

    /// Stop accepting jobs and wait for the thread to finish its current one.
    pub fn close(self) {
        let Worker { tx, handle } = self;
        drop(tx);
        if handle.join().is_err() {
            log::error!("runtime worker panicked");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bridge::{completion, wait};
    use std::sync::Mutex;

    const FAKE_VEGA: &str = r##"
        var vega = {
            parse: function (spec) {
                if (!Array.isArray(spec.marks)) { throw new Error("spec has no marks"); }
                return spec;
            },
            View: function (runtime) {
                this.runtime = runtime;
                this.toSVG = function () {
                    var names = runtime.data.map(function (d) { return d.name; }).join(",");
                    return new Promise(function (resolve) {
                        setTimeout(function () { resolve("<svg data=\"" + names + "\"></svg>"); }, 5);
                    });
                };
                this.toCanvas = function (scale, opts) {
                    opts.externalContext.fillStyle = "#ff0000";
                    opts.externalContext.fillRect(0, 0, 2, 2);
                    return Promise.resolve(null);
                };
                this.finalize = function () {};
            }
        };
    "##;

    fn config(bundle: ScriptBundle) -> VmConfig {
        VmConfig {
            bundle,
            ..Default::default()
        }
    }

    fn run(host: &mut ScriptHost, spec: &str, data: &str, target: Target) -> (Result<()>, Option<crate::bridge::Outcome>, Option<Pixmap>) {
        let (accepted_tx, accepted_rx) = oneshot::channel();
        let (done_tx, done_rx) = completion();
        let (pixels_tx, pixels_rx) = oneshot::channel();
        let cancel = CancelToken::new();
        host.run(RenderJob {
            spec: spec.into(),
            data: data.into(),
            target,
            cancel: cancel.clone(),
            accepted: accepted_tx,
            completion: done_tx,
            pixels: Some(pixels_tx),
        });
        let accepted = wait(accepted_rx, &cancel).unwrap();
        let outcome = done_rx.wait(&cancel).ok();
        let pixels = wait(pixels_rx, &cancel).ok();
        (accepted, outcome, pixels)
    }

    #[test]
    fn vector_render_merges_data_tables() {
        let mut host = ScriptHost::new(&config(ScriptBundle::with_library("vega.js", FAKE_VEGA))).unwrap();
        let spec = r#"{"data":[{"name":"table"}],"marks":[]}"#;
        let (accepted, outcome, _) = run(&mut host, spec, r#"{"table":[1],"extra":[2]}"#, Target::Vector);
        assert!(accepted.is_ok());
        assert_eq!(outcome.unwrap().unwrap(), r#"<svg data="table,extra"></svg>"#);
    }

    #[test]
    fn engine_failure_is_reported_verbatim() {
        let mut host = ScriptHost::new(&config(ScriptBundle::with_library("vega.js", FAKE_VEGA))).unwrap();
        let (accepted, outcome, _) = run(&mut host, "{}", "", Target::Vector);
        assert!(accepted.is_ok());
        assert_eq!(outcome.unwrap().unwrap_err(), "Error: spec has no marks");
    }

    #[test]
    fn raster_render_hands_back_pixels() {
        let mut host = ScriptHost::new(&config(ScriptBundle::with_library("vega.js", FAKE_VEGA))).unwrap();
        let (accepted, outcome, pixels) = run(&mut host, r#"{"marks":[]}"#, "", Target::Raster(Resolution::new(4, 4)));
        assert!(accepted.is_ok());
        assert_eq!(outcome.unwrap().unwrap(), "");
        let pixels = pixels.unwrap();
        assert_eq!((pixels.width(), pixels.height()), (4, 4));
        let px = pixels.pixel(0, 0).unwrap();
        assert_eq!((px.red(), px.alpha()), (255, 255));
        assert_eq!(pixels.pixel(3, 3).unwrap().alpha(), 0);
    }

    #[test]
    fn non_true_entry_result_is_synchronous_failure() {
        let bundle = ScriptBundle::new().push(ScriptAsset::inline("entry.js", "function renderChart() { return 'nope'; }"));
        let mut host = ScriptHost::new(&config(bundle)).unwrap();
        let (accepted, outcome, _) = run(&mut host, "{}", "", Target::Vector);
        assert!(matches!(accepted, Err(Error::RenderError(ref t)) if t == "nope"));
        assert!(outcome.is_none());
    }

    #[test]
    fn idle_script_without_callback_closes_completion() {
        let bundle = ScriptBundle::new().push(ScriptAsset::inline("entry.js", "function renderChart() { return true; }"));
        let mut host = ScriptHost::new(&config(bundle)).unwrap();
        let (accepted, outcome, _) = run(&mut host, "{}", "", Target::Vector);
        assert!(accepted.is_ok());
        assert!(outcome.is_none());
    }

    #[test]
    fn missing_entry_point_fails_construction() {
        let bundle = ScriptBundle::new().push(ScriptAsset::inline("lib.js", "var x = 1;"));
        assert!(matches!(ScriptHost::new(&config(bundle)), Err(Error::MissingEntryPoint(_))));
    }

    #[test]
    fn broken_assets_name_the_asset() {
        let parse = ScriptBundle::new().push(ScriptAsset::inline("broken.js", "function ("));
        match ScriptHost::new(&config(parse)) {
            Err(Error::AssetParse { asset, .. }) => assert_eq!(asset, "broken.js"),
            other => panic!("expected AssetParse, got {:?}", other.err()),
        }
        let exec = ScriptBundle::new().push(ScriptAsset::inline("throws.js", "throw new Error('boom');"));
        match ScriptHost::new(&config(exec)) {
            Err(Error::AssetExecution { asset, reason }) => {
                assert_eq!(asset, "throws.js");
                assert!(reason.contains("boom"));
            }
            other => panic!("expected AssetExecution, got {:?}", other.err()),
        }
    }

    #[test]
    fn vega_bundle_reads_files_and_skips_optional_ones() {
        let dir = std::env::temp_dir().join(format!("vegavm-runtime-test-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let bundle = ScriptBundle::vega(&dir);
        let names: Vec<_> = bundle.assets().iter().map(|a| a.name().to_string()).collect();
        assert_eq!(names, ["polyfill.min.js", "runtime.min.js", "vega.min.js", "index.js"]);

        assert!(matches!(ScriptHost::new(&config(bundle.clone())), Err(Error::AssetLoad { .. })));

        std::fs::write(dir.join("vega.min.js"), FAKE_VEGA).unwrap();
        assert!(ScriptHost::new(&config(bundle)).is_ok());
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn timers_fire_in_due_order_and_logs_reach_the_sink() {
        let lines = Arc::new(Mutex::new(Vec::new()));
        let captured = lines.clone();
        let entry = r#"
            function renderChart() {
                setTimeout(function () { console.log("late"); success("done"); }, 20);
                setTimeout(function () { log("early", 1); }, 10);
                queueMicrotask(function () { console.info({ first: true }); });
                return true;
            }
        "#;
        let cfg = VmConfig {
            bundle: ScriptBundle::new().push(ScriptAsset::inline("entry.js", entry)),
            log_sink: Some(Arc::new(move |l: &str| captured.lock().unwrap().push(l.to_string()))),
            ..Default::default()
        };
        let mut host = ScriptHost::new(&cfg).unwrap();
        let (_, outcome, _) = run(&mut host, "{}", "", Target::Vector);
        assert_eq!(outcome.unwrap().unwrap(), "done");
        assert_eq!(
            lines.lock().unwrap().as_slice(),
            ["[info] {\"first\":true}", "early 1", "[log] late"]
        );
    }

    #[test]
    fn non_string_payload_is_a_type_failure() {
        let entry = "function renderChart() { success(42); return true; }";
        let bundle = ScriptBundle::new().push(ScriptAsset::inline("entry.js", entry));
        let mut host = ScriptHost::new(&config(bundle)).unwrap();
        let (_, outcome, _) = run(&mut host, "{}", "", Target::Vector);
        assert_eq!(outcome.unwrap().unwrap_err(), "invalid response type number");
    }

    #[test]
    fn worker_boots_and_reports_startup_errors() {
        let bad = ScriptBundle::new().push(ScriptAsset::inline("lib.js", "var x = 1;"));
        assert!(matches!(Worker::spawn(&config(bad)), Err(Error::MissingEntryPoint(_))));

        let worker = Worker::spawn(&config(ScriptBundle::with_library("vega.js", FAKE_VEGA))).unwrap();
        worker.close();
    }
}
