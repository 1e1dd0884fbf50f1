//! Render orchestrator
//!
//! `VegaVm` serializes callers onto its runtime worker, waits on the reply
//! channels under the caller's [`CancelToken`] and post-processes the result.

use std::sync::{Mutex, MutexGuard, PoisonError};

use serde::Serialize;
use tiny_skia::Pixmap;
use tokio::sync::oneshot;

use crate::bridge::{self, CancelToken, Completion, WaitError};
use crate::error::{Error, Result};
use crate::runtime::{RenderJob, Target, Worker};
use crate::{Resolution, VmConfig, MAX_DIMENSION};

/// A Vega renderer backed by one embedded script runtime.
///
/// Safe to share between threads; calls are serialized, so renders on one VM
/// never overlap. Use several VMs for parallel rendering.
///
/// Every call blocks the current thread and must not run on an async
/// executor thread; async callers use [`crate::AsyncVegaVm`].
pub struct VegaVm {
    config: VmConfig,
    worker: Mutex<Option<Worker>>,
}

impl VegaVm {
    /// Validate `config`, boot the runtime and load the script bundle.
    pub fn new(config: VmConfig) -> Result<Self> {
        let config = config.validated()?;
        let worker = Worker::spawn(&config)?;
        log::debug!(
            "vega runtime ready ({} script assets, png {})",
            config.bundle.assets().len(),
            config.png_resolution
        );
        Ok(Self {
            config,
            worker: Mutex::new(Some(worker)),
        })
    }

    /// The validated configuration this VM runs with.
    pub fn config(&self) -> &VmConfig {
        &self.config
    }

    /// Render `spec` to SVG text.
    ///
    /// `data` is serialized to JSON and merged into the spec's data tables by
    /// name; `None`, `null` and `{}` leave the spec's own data untouched.
    pub fn render_svg<D>(&self, spec: &[u8], data: Option<&D>, cancel: &CancelToken) -> Result<String>
    where
        D: Serialize + ?Sized,
    {
        let (text, _) = self.render(spec, data, Target::Vector, cancel)?;
        Ok(text)
    }

    /// Render `spec` to a PNG at the configured resolution.
    pub fn render_png<D>(&self, spec: &[u8], data: Option<&D>, cancel: &CancelToken) -> Result<Vec<u8>>
    where
        D: Serialize + ?Sized,
    {
        self.render_png_sized(spec, data, self.config.png_resolution, cancel)
    }

    /// Render `spec` to a PNG of `resolution`.
    pub fn render_png_sized<D>(
        &self,
        spec: &[u8],
        data: Option<&D>,
        resolution: Resolution,
        cancel: &CancelToken,
    ) -> Result<Vec<u8>>
    where
        D: Serialize + ?Sized,
    {
        let pixmap = self.render_raster(spec, data, resolution, cancel)?;
        pixmap.encode_png().map_err(|e| Error::EncodeError(e.to_string()))
    }

    /// Render `spec` onto a fresh surface and return its pixels (premultiplied RGBA).
    pub fn render_raster<D>(
        &self,
        spec: &[u8],
        data: Option<&D>,
        resolution: Resolution,
        cancel: &CancelToken,
    ) -> Result<Pixmap>
    where
        D: Serialize + ?Sized,
    {
        check_resolution(resolution)?;
        let (_, pixels) = self.render(spec, data, Target::Raster(resolution), cancel)?;
        pixels.ok_or_else(|| Error::SurfaceError("runtime returned no pixels".into()))
    }

    /// Discard the runtime and boot a fresh one from the same configuration.
    pub fn reset(&self) -> Result<()> {
        let mut guard = self.lock_worker();
        *guard = None;
        *guard = Some(Worker::spawn(&self.config)?);
        log::debug!("vega runtime reset");
        Ok(())
    }

    /// Shut the runtime down. Later calls fail with [`Error::RuntimeUnavailable`].
    pub fn close(&self) {
        let worker = self.lock_worker().take();
        if let Some(worker) = worker {
            worker.close();
        }
    }

    fn lock_worker(&self) -> MutexGuard<'_, Option<Worker>> {
        self.worker.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn render<D>(
        &self,
        spec: &[u8],
        data: Option<&D>,
        target: Target,
        cancel: &CancelToken,
    ) -> Result<(String, Option<Pixmap>)>
    where
        D: Serialize + ?Sized,
    {
        let spec = std::str::from_utf8(spec)
            .map_err(|e| Error::InvalidInput(format!("specification is not valid UTF-8: {}", e)))?
            .to_string();
        let data = encode_data(data)?;

        let mut guard = self.lock_worker();
        if let Some(reason) = cancel.reason() {
            return Err(reason.into());
        }
        let worker = guard.as_ref().ok_or(Error::RuntimeUnavailable)?;

        let (accepted_tx, accepted_rx) = oneshot::channel();
        let (completion_tx, completion) = bridge::completion();
        let (pixels_tx, pixels_rx) = match target {
            Target::Vector => (None, None),
            Target::Raster(_) => {
                let (tx, rx) = oneshot::channel();
                (Some(tx), Some(rx))
            }
        };
        worker.submit(RenderJob {
            spec,
            data,
            target,
            cancel: cancel.clone(),
            accepted: accepted_tx,
            completion: completion_tx,
            pixels: pixels_tx,
        })?;

        let result = await_job(accepted_rx, completion, pixels_rx, cancel);
        if let Err(e) = &result {
            if e.is_cancellation() && self.config.reset_on_cancel {
                log::debug!("render cancelled; rebooting runtime");
                *guard = None;
                match Worker::spawn(&self.config) {
                    Ok(worker) => *guard = Some(worker),
                    Err(err) => log::error!("failed to reboot runtime after cancellation: {}", err),
                }
            }
        }
        result
    }
}

fn await_job(
    accepted: oneshot::Receiver<Result<()>>,
    completion: Completion,
    pixels: Option<oneshot::Receiver<Pixmap>>,
    cancel: &CancelToken,
) -> Result<(String, Option<Pixmap>)> {
    match bridge::wait(accepted, cancel) {
        Ok(Ok(())) => {}
        Ok(Err(e)) => return Err(e),
        Err(WaitError::Cancelled(reason)) => return Err(reason.into()),
        Err(WaitError::Closed) => return Err(Error::RuntimeUnavailable),
    }

    let text = match completion.wait(cancel) {
        Ok(Ok(text)) => text,
        Ok(Err(reason)) => return Err(Error::RenderError(reason)),
        Err(WaitError::Cancelled(reason)) => return Err(reason.into()),
        Err(WaitError::Closed) => return Err(Error::NoCompletion),
    };

    let pixels = match pixels {
        None => None,
        Some(rx) => match bridge::wait(rx, cancel) {
            Ok(pixmap) => Some(pixmap),
            Err(WaitError::Cancelled(reason)) => return Err(reason.into()),
            Err(WaitError::Closed) => return Err(Error::SurfaceError("surface pixels were not returned".into())),
        },
    };
    Ok((text, pixels))
}

/// Compact JSON for the data payload; absent, `null` and `{}` become "".
fn encode_data<D>(data: Option<&D>) -> Result<String>
where
    D: Serialize + ?Sized,
{
    let Some(data) = data else {
        return Ok(String::new());
    };
    let value = serde_json::to_value(data)?;
    match &value {
        serde_json::Value::Null => Ok(String::new()),
        serde_json::Value::Object(map) if map.is_empty() => Ok(String::new()),
        _ => Ok(serde_json::to_string(&value)?),
    }
}

fn check_resolution(resolution: Resolution) -> Result<()> {
    let Resolution { width, height } = resolution;
    if width == 0 || height == 0 {
        return Err(Error::ConfigError(format!(
            "resolution {} must have a positive width and height",
            resolution
        )));
    }
    if width > MAX_DIMENSION || height > MAX_DIMENSION {
        return Err(Error::ConfigError(format!(
            "resolution {} exceeds the {}px limit",
            resolution, MAX_DIMENSION
        )));
    }
    Ok(())
}
