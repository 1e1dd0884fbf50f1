use std::sync::Arc;

use serde::Serialize;
use tiny_skia::Pixmap;
use tokio::sync::oneshot;

use crate::{CancelToken, Error, Resolution, Result, VegaVm, VmConfig};

/// An async-friendly handle around a [`VegaVm`].
///
/// Each call runs on tokio's blocking pool and completes through a oneshot
/// channel, so async tasks never block on the runtime. Dropping a pending
/// future cancels the token it was given, which releases the VM for the next
/// caller.
#[derive(Clone)]
pub struct AsyncVegaVm {
    inner: Arc<VegaVm>,
}

impl AsyncVegaVm {
    /// Boot a VM without blocking the calling task.
    pub async fn new(config: VmConfig) -> Result<Self> {
        let vm = run_blocking("startup", move || VegaVm::new(config)).await?;
        Ok(Self { inner: Arc::new(vm) })
    }

    /// Wrap an already constructed VM.
    pub fn from_vm(vm: VegaVm) -> Self {
        Self { inner: Arc::new(vm) }
    }

    /// The underlying blocking VM.
    pub fn blocking(&self) -> &VegaVm {
        &self.inner
    }

    /// Render `spec` to SVG text.
    pub async fn render_svg<D>(&self, spec: &[u8], data: Option<&D>, cancel: &CancelToken) -> Result<String>
    where
        D: Serialize + ?Sized,
    {
        let (spec, data) = owned_input(spec, data)?;
        let vm = self.inner.clone();
        let token = cancel.clone();
        let guard = CancelOnDrop::new(cancel);
        let out = run_blocking("render_svg", move || vm.render_svg(&spec, data.as_ref(), &token)).await;
        guard.disarm();
        out
    }

    /// Render `spec` to a PNG at the configured resolution.
    pub async fn render_png<D>(&self, spec: &[u8], data: Option<&D>, cancel: &CancelToken) -> Result<Vec<u8>>
    where
        D: Serialize + ?Sized,
    {
        let resolution = self.inner.config().png_resolution;
        self.render_png_sized(spec, data, resolution, cancel).await
    }

    /// Render `spec` to a PNG of `resolution`.
    pub async fn render_png_sized<D>(
        &self,
        spec: &[u8],
        data: Option<&D>,
        resolution: Resolution,
        cancel: &CancelToken,
    ) -> Result<Vec<u8>>
    where
        D: Serialize + ?Sized,
    {
        let (spec, data) = owned_input(spec, data)?;
        let vm = self.inner.clone();
        let token = cancel.clone();
        let guard = CancelOnDrop::new(cancel);
        let out = run_blocking("render_png", move || {
            vm.render_png_sized(&spec, data.as_ref(), resolution, &token)
        })
        .await;
        guard.disarm();
        out
    }

    /// Render `spec` and return the raw surface pixels.
    pub async fn render_raster<D>(
        &self,
        spec: &[u8],
        data: Option<&D>,
        resolution: Resolution,
        cancel: &CancelToken,
    ) -> Result<Pixmap>
    where
        D: Serialize + ?Sized,
    {
        let (spec, data) = owned_input(spec, data)?;
        let vm = self.inner.clone();
        let token = cancel.clone();
        let guard = CancelOnDrop::new(cancel);
        let out = run_blocking("render_raster", move || {
            vm.render_raster(&spec, data.as_ref(), resolution, &token)
        })
        .await;
        guard.disarm();
        out
    }

    /// Discard the runtime and boot a fresh one.
    pub async fn reset(&self) -> Result<()> {
        let vm = self.inner.clone();
        run_blocking("reset", move || vm.reset()).await
    }

    /// Shut the runtime down and wait for its thread to exit.
    pub async fn close(&self) -> Result<()> {
        let vm = self.inner.clone();
        run_blocking("close", move || {
            vm.close();
            Ok(())
        })
        .await
    }
}

// Data is serialized up front so the blocking task owns everything it touches.
fn owned_input<D>(spec: &[u8], data: Option<&D>) -> Result<(Vec<u8>, Option<serde_json::Value>)>
where
    D: Serialize + ?Sized,
{
    let data = data.map(serde_json::to_value).transpose()?;
    Ok((spec.to_vec(), data))
}

async fn run_blocking<T, F>(label: &'static str, f: F) -> Result<T>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T> + Send + 'static,
{
    let (tx, rx) = oneshot::channel();
    tokio::task::spawn_blocking(move || {
        let _ = tx.send(f());
    });
    rx.await.map_err(|e| {
        log::error!("{} task ended without a result: {}", label, e);
        Error::RuntimeUnavailable
    })?
}

/// Cancels the wrapped token if the owning future is dropped before finishing.
struct CancelOnDrop {
    token: Option<CancelToken>,
}

impl CancelOnDrop {
    fn new(token: &CancelToken) -> Self {
        Self { token: Some(token.clone()) }
    }

    fn disarm(mut self) {
        self.token = None;
    }
}

impl Drop for CancelOnDrop {
    fn drop(&mut self) {
        if let Some(token) = self.token.take() {
            token.cancel();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ScriptBundle;
    use serde_json::json;
    use std::time::Duration;

    const SLOW_LIB: &str = r#"
        var vega = {
            parse: function (spec) { return spec; },
            View: function (spec) {
                this.toSVG = function () {
                    if (spec.hang) {
                        // keep the drain loop busy on wall time until cancelled
                        return new Promise(function () {
                            setInterval(function () {
                                var start = Date.now();
                                while (Date.now() - start < 5) {}
                            }, 1);
                        });
                    }
                    return Promise.resolve("<svg n=\"" + (spec.data ? spec.data.length : 0) + "\"></svg>");
                };
                this.toCanvas = function () { return Promise.resolve(null); };
                this.finalize = function () {};
            }
        };
    "#;

    fn config() -> VmConfig {
        VmConfig {
            bundle: ScriptBundle::with_library("slow.js", SLOW_LIB),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn renders_without_blocking_the_runtime() {
        let vm = AsyncVegaVm::new(config()).await.unwrap();
        let svg = vm
            .render_svg(br#"{"marks":[]}"#, Some(&json!({"a": [1], "b": [2]})), &CancelToken::new())
            .await
            .unwrap();
        assert_eq!(svg, "<svg n=\"2\"></svg>");
        vm.close().await.unwrap();
    }

    #[tokio::test]
    async fn startup_errors_surface_from_new() {
        let cfg = VmConfig {
            bundle: ScriptBundle::new().push(crate::ScriptAsset::inline("empty.js", "var x = 1;")),
            ..Default::default()
        };
        let err = AsyncVegaVm::new(cfg).await.err().unwrap();
        assert!(matches!(err, Error::MissingEntryPoint(_)));
    }

    #[tokio::test]
    async fn dropped_future_cancels_its_token() {
        let vm = AsyncVegaVm::new(config()).await.unwrap();
        let cancel = CancelToken::new();
        let pending = vm.render_svg(br#"{"marks":[],"hang":true}"#, None::<&()>, &cancel);
        let timed_out = tokio::time::timeout(Duration::from_millis(50), pending).await;
        assert!(timed_out.is_err());
        assert!(cancel.is_cancelled());

        let svg = vm
            .render_svg(br#"{"marks":[]}"#, None::<&()>, &CancelToken::with_timeout(Duration::from_secs(10)))
            .await
            .unwrap();
        assert_eq!(svg, "<svg n=\"0\"></svg>");
    }

    #[tokio::test]
    async fn png_uses_configured_resolution() {
        let cfg = VmConfig {
            png_resolution: Resolution::new(12, 7),
            ..config()
        };
        let vm = AsyncVegaVm::new(cfg).await.unwrap();
        let pixmap = vm
            .render_raster(br#"{"marks":[]}"#, None::<&()>, Resolution::new(12, 7), &CancelToken::new())
            .await
            .unwrap();
        assert_eq!((pixmap.width(), pixmap.height()), (12, 7));
        let png = vm.render_png(br#"{"marks":[]}"#, None::<&()>, &CancelToken::new()).await.unwrap();
        assert_eq!(&png[..4], b"\x89PNG");
    }
}
