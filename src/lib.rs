//! vegavm
//!
//! Render Vega chart specifications to SVG text or PNG images by running the
//! Vega library inside an embedded JavaScript runtime (Boa).
//!
//! # Features
//!
//! - **One runtime per VM**: the script bundle is parsed and executed once, then
//!   reused for every render
//! - **Blocking calls over async scripts**: promise and timer work inside the
//!   runtime is drained to completion while the caller waits under a
//!   [`CancelToken`]
//! - **Native canvas**: PNG output is painted onto a tiny-skia surface exposed
//!   to the script as a 2D canvas context
//!
//! # Example
//!
//! ```no_run
//! use std::time::Duration;
//! use vegavm::{CancelToken, Resolution, ScriptBundle, VegaVm, VmConfig};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = VmConfig {
//!     bundle: ScriptBundle::vega("assets/vendor"),
//!     png_resolution: Resolution { width: 800, height: 600 },
//!     ..Default::default()
//! };
//!
//! let vm = VegaVm::new(config)?;
//! let spec = std::fs::read("bar-chart.vg.json")?;
//! let cancel = CancelToken::with_timeout(Duration::from_secs(30));
//! let svg = vm.render_svg(&spec, None::<&serde_json::Value>, &cancel)?;
//! assert!(svg.starts_with("<svg"));
//! # Ok(())
//! # }
//! ```

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

pub mod error;
pub use error::{Error, Result};

pub mod bridge;
pub use bridge::{CancelReason, CancelToken};

// Native 2D canvas surface and its script binding
pub mod rendering;

// Boa runtime host (script bundle, host callbacks, worker thread)
pub mod runtime;
pub use runtime::{ScriptAsset, ScriptBundle};

mod vm;
pub use vm::VegaVm;

// Async-friendly wrapper for tokio callers
pub mod async_api;
pub use async_api::AsyncVegaVm;

/// Receives each line the script passes to `log(...)`.
pub type LogSink = Arc<dyn Fn(&str) + Send + Sync>;

/// Largest width or height accepted for a raster surface.
pub const MAX_DIMENSION: u32 = 16_384;

/// Configuration for a [`VegaVm`]
///
/// Defaults are chosen so that only the script bundle location usually needs
/// attention:
/// - `log_sink` unset forwards script logging to the `log` crate
/// - a zero `png_resolution` is replaced with [`Resolution::default`]
///
/// # Examples
///
/// ```
/// let cfg = vegavm::VmConfig::default();
/// assert_eq!(cfg.png_resolution.width, 1024);
/// assert!(!cfg.reset_on_cancel);
/// ```
#[derive(Clone)]
pub struct VmConfig {
    /// Where `log(...)` calls from the script go (None => `log::info!`)
    pub log_sink: Option<LogSink>,
    /// Output size used by `render_png`
    pub png_resolution: Resolution,
    /// Ordered scripts loaded into the runtime at construction
    pub bundle: ScriptBundle,
    /// Maximum loop iterations before Boa throws an error (0 => disabled)
    pub script_loop_iteration_limit: u64,
    /// Maximum recursion depth before Boa throws (usize::MAX => disabled)
    pub script_recursion_limit: usize,
    /// Upper bound on promise/timer drain rounds per render
    pub max_pump_turns: usize,
    /// Discard and reboot the runtime when a render is cancelled
    pub reset_on_cancel: bool,
}

impl Default for VmConfig {
    fn default() -> Self {
        Self {
            log_sink: None,
            png_resolution: Resolution::default(),
            bundle: ScriptBundle::from_env(),
            script_loop_iteration_limit: 0,
            script_recursion_limit: 4096,
            max_pump_turns: 10_000,
            reset_on_cancel: false,
        }
    }
}

impl fmt::Debug for VmConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VmConfig")
            .field("log_sink", &self.log_sink.as_ref().map(|_| "custom"))
            .field("png_resolution", &self.png_resolution)
            .field("bundle", &self.bundle)
            .field("script_loop_iteration_limit", &self.script_loop_iteration_limit)
            .field("script_recursion_limit", &self.script_recursion_limit)
            .field("max_pump_turns", &self.max_pump_turns)
            .field("reset_on_cancel", &self.reset_on_cancel)
            .finish()
    }
}

impl VmConfig {
    /// Resolve defaults and reject invalid settings.
    ///
    /// Called once by [`VegaVm::new`]; the returned config is what the VM keeps.
    pub fn validated(mut self) -> Result<Self> {
        self.png_resolution = self.png_resolution.resolve()?;
        if self.max_pump_turns == 0 {
            return Err(Error::ConfigError("max_pump_turns must be at least 1".into()));
        }
        if self.bundle.is_empty() {
            return Err(Error::ConfigError("script bundle is empty".into()));
        }
        Ok(self)
    }

    /// The sink script logging goes to, falling back to the `log` crate.
    pub fn log_sink(&self) -> LogSink {
        if let Some(sink) = &self.log_sink {
            return sink.clone();
        }
        let fallback: LogSink = Arc::new(|line: &str| log::info!(target: "vegavm::script", "{}", line));
        fallback
    }
}

/// Raster output dimensions in pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

impl Default for Resolution {
    fn default() -> Self {
        Self {
            width: 1024,
            height: 768,
        }
    }
}

impl Resolution {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Replace an unset (0x0) resolution with the default and validate the rest.
    pub fn resolve(self) -> Result<Self> {
        match (self.width, self.height) {
            (0, 0) => Ok(Self::default()),
            (0, _) | (_, 0) => Err(Error::ConfigError(format!(
                "resolution {}x{} must have a positive width and height",
                self.width, self.height
            ))),
            (w, h) if w > MAX_DIMENSION || h > MAX_DIMENSION => Err(Error::ConfigError(format!(
                "resolution {}x{} exceeds the {}px limit",
                w, h, MAX_DIMENSION
            ))),
            _ => Ok(self),
        }
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = VmConfig::default();
        assert_eq!(config.png_resolution, Resolution { width: 1024, height: 768 });
        assert_eq!(config.max_pump_turns, 10_000);
        assert!(config.log_sink.is_none());
    }

    #[test]
    fn zero_resolution_falls_back_to_default() {
        let r = Resolution::new(0, 0).resolve().unwrap();
        assert_eq!(r, Resolution::default());
    }

    #[test]
    fn partial_or_oversized_resolution_is_rejected() {
        assert!(matches!(Resolution::new(0, 600).resolve(), Err(Error::ConfigError(_))));
        assert!(matches!(Resolution::new(800, 0).resolve(), Err(Error::ConfigError(_))));
        assert!(matches!(
            Resolution::new(MAX_DIMENSION + 1, 10).resolve(),
            Err(Error::ConfigError(_))
        ));
        assert_eq!(Resolution::new(800, 600).resolve().unwrap(), Resolution::new(800, 600));
    }

    #[test]
    fn validated_resolves_resolution_and_checks_pump_turns() {
        let cfg = VmConfig {
            png_resolution: Resolution::new(0, 0),
            bundle: ScriptBundle::with_library("lib.js", "var x = 1;"),
            ..Default::default()
        };
        let cfg = cfg.validated().unwrap();
        assert_eq!(cfg.png_resolution, Resolution::default());

        let bad = VmConfig {
            max_pump_turns: 0,
            bundle: ScriptBundle::with_library("lib.js", "var x = 1;"),
            ..Default::default()
        };
        assert!(matches!(bad.validated(), Err(Error::ConfigError(_))));
    }

    #[test]
    fn resolution_serde_and_display() {
        let r: Resolution = serde_json::from_str(r#"{"width":800,"height":600}"#).unwrap();
        assert_eq!(r.to_string(), "800x600");
        assert_eq!(serde_json::to_string(&r).unwrap(), r#"{"width":800,"height":600}"#);
    }

    #[test]
    fn custom_log_sink_is_used() {
        let lines = Arc::new(std::sync::Mutex::new(Vec::new()));
        let captured = lines.clone();
        let cfg = VmConfig {
            log_sink: Some(Arc::new(move |l: &str| captured.lock().unwrap().push(l.to_string()))),
            ..Default::default()
        };
        (cfg.log_sink())("hello");
        assert_eq!(lines.lock().unwrap().as_slice(), ["hello".to_string()]);
    }
}
