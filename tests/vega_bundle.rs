//! Renders against the real Vega bundle. Point VEGAVM_ASSETS_DIR at a
//! directory holding vega.min.js and run with `--ignored`.

use std::path::PathBuf;
use std::time::Duration;

use vegavm::{CancelToken, Resolution, ScriptBundle, VegaVm, VmConfig};

fn vega_vm() -> Option<VegaVm> {
    let dir = std::env::var_os("VEGAVM_ASSETS_DIR")?;
    Some(
        VegaVm::new(VmConfig {
            bundle: ScriptBundle::vega(PathBuf::from(dir)),
            ..Default::default()
        })
        .expect("vega bundle should load"),
    )
}

fn bar_chart() -> Vec<u8> {
    let path = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures/specs/bar-chart.vg.json");
    std::fs::read(path).unwrap()
}

#[test]
#[ignore] // Requires the Vega bundle
fn real_vega_renders_svg() {
    let Some(vm) = vega_vm() else {
        println!("VEGAVM_ASSETS_DIR not set; skipping");
        return;
    };
    let svg = vm
        .render_svg(&bar_chart(), None::<&()>, &CancelToken::with_timeout(Duration::from_secs(60)))
        .unwrap();
    assert!(svg.starts_with("<svg"));
    assert!(svg.contains("steelblue"));
}

#[test]
#[ignore] // Requires the Vega bundle
fn real_vega_renders_png() {
    let Some(vm) = vega_vm() else {
        println!("VEGAVM_ASSETS_DIR not set; skipping");
        return;
    };
    let png = vm
        .render_png_sized(
            &bar_chart(),
            None::<&()>,
            Resolution::new(320, 240),
            &CancelToken::with_timeout(Duration::from_secs(60)),
        )
        .unwrap();
    let pixmap = tiny_skia::Pixmap::decode_png(&png).unwrap();
    assert_eq!((pixmap.width(), pixmap.height()), (320, 240));
    assert!(pixmap.pixels().iter().any(|p| p.alpha() > 0));
}
