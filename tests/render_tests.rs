//! End-to-end renders through the public API against a mock charting library

use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use serde_json::json;
use sha2::{Digest, Sha256};
use vegavm::{CancelToken, Error, Resolution, ScriptAsset, ScriptBundle, VegaVm, VmConfig};

const PNG_SIGNATURE: &[u8] = b"\x89PNG\r\n\x1a\n";
const STEELBLUE: (u8, u8, u8) = (70, 130, 180);

fn fixture(rel: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures").join(rel)
}

fn mock_bundle() -> ScriptBundle {
    ScriptBundle::new()
        .push(ScriptAsset::file(fixture("mock_vega.js")))
        .push(ScriptBundle::entry_script())
}

fn mock_vm() -> VegaVm {
    VegaVm::new(VmConfig {
        bundle: mock_bundle(),
        ..Default::default()
    })
    .expect("mock runtime should boot")
}

fn bar_chart() -> Vec<u8> {
    std::fs::read(fixture("specs/bar-chart.vg.json")).expect("read bar chart fixture")
}

fn none() -> Option<&'static serde_json::Value> {
    None
}

#[test]
fn svg_render_uses_spec_data() {
    let vm = mock_vm();
    let svg = vm.render_svg(&bar_chart(), none(), &CancelToken::new()).unwrap();
    assert!(svg.starts_with("<svg"));
    assert_eq!(svg.matches("<rect").count(), 3);
    assert!(svg.contains(r#"height="55""#));
}

#[test]
fn caller_data_replaces_matching_table() {
    let vm = mock_vm();
    let data = json!({"table": [10, 20, 30, 40, 50]});
    let svg = vm.render_svg(&bar_chart(), Some(&data), &CancelToken::new()).unwrap();
    assert_eq!(svg.matches("<rect").count(), 5);
    assert!(!svg.contains(r#"height="55""#));
}

#[test]
fn png_render_paints_the_surface() {
    let vm = mock_vm();
    let res = Resolution::new(100, 100);
    let pixmap = vm
        .render_raster(&bar_chart(), none(), res, &CancelToken::new())
        .unwrap();
    assert_eq!((pixmap.width(), pixmap.height()), (100, 100));

    let bar = pixmap.pixel(15, 90).unwrap();
    assert_eq!((bar.red(), bar.green(), bar.blue(), bar.alpha()), (STEELBLUE.0, STEELBLUE.1, STEELBLUE.2, 255));
    let background = pixmap.pixel(95, 50).unwrap();
    assert_eq!((background.red(), background.green(), background.blue()), (255, 255, 255));

    let png = vm
        .render_png_sized(&bar_chart(), none(), res, &CancelToken::new())
        .unwrap();
    assert!(png.starts_with(PNG_SIGNATURE));
    let decoded = tiny_skia::Pixmap::decode_png(&png).unwrap();
    assert_eq!(decoded.data(), pixmap.data());
}

#[test]
fn identical_renders_are_byte_identical() {
    let vm = mock_vm();
    let digest = |bytes: &[u8]| hex::encode(Sha256::digest(bytes));
    let res = Resolution::new(64, 64);
    let first = vm.render_png_sized(&bar_chart(), none(), res, &CancelToken::new()).unwrap();
    let svg = vm.render_svg(&bar_chart(), none(), &CancelToken::new()).unwrap();
    let second = vm.render_png_sized(&bar_chart(), none(), res, &CancelToken::new()).unwrap();
    assert_eq!(digest(&first), digest(&second));
    assert_eq!(svg, vm.render_svg(&bar_chart(), none(), &CancelToken::new()).unwrap());
}

#[test]
fn unparseable_spec_reports_the_engine_message() {
    let vm = mock_vm();
    let garbage = std::fs::read(fixture("specs/garbage.json")).unwrap();
    match vm.render_svg(&garbage, none(), &CancelToken::new()) {
        Err(Error::RenderError(msg)) => assert!(msg.starts_with("SyntaxError"), "{}", msg),
        other => panic!("expected a render error, got {:?}", other),
    }

    match vm.render_svg(br#"{"width": 10}"#, none(), &CancelToken::new()) {
        Err(Error::RenderError(msg)) => assert_eq!(msg, "Error: spec has no marks"),
        other => panic!("expected a render error, got {:?}", other),
    }
}

#[test]
fn async_rejection_is_verbatim() {
    let vm = mock_vm();
    let err = vm
        .render_svg(br#"{"marks": [], "fail": "scale domain is empty"}"#, none(), &CancelToken::new())
        .unwrap_err();
    assert_eq!(err.to_string(), "Error: scale domain is empty");
}

#[test]
fn deadline_interrupts_a_hung_render_and_vm_recovers() {
    let vm = mock_vm();
    let start = Instant::now();
    let err = vm
        .render_svg(
            br#"{"marks": [], "hang": true}"#,
            none(),
            &CancelToken::with_timeout(Duration::from_millis(100)),
        )
        .unwrap_err();
    assert!(matches!(err, Error::DeadlineExceeded));
    assert!(start.elapsed() < Duration::from_secs(10));

    let svg = vm
        .render_svg(&bar_chart(), none(), &CancelToken::with_timeout(Duration::from_secs(30)))
        .unwrap();
    assert!(svg.contains("<rect"));
}

#[test]
fn explicit_cancel_from_another_thread() {
    let vm = Arc::new(VegaVm::new(VmConfig {
        bundle: mock_bundle(),
        reset_on_cancel: true,
        ..Default::default()
    })
    .unwrap());
    let cancel = CancelToken::new();
    let remote = cancel.clone();
    let canceller = thread::spawn(move || {
        thread::sleep(Duration::from_millis(50));
        remote.cancel();
    });
    let err = vm
        .render_svg(br#"{"marks": [], "hang": true}"#, none(), &cancel)
        .unwrap_err();
    canceller.join().unwrap();
    assert!(matches!(err, Error::Cancelled));
    assert!(err.is_cancellation());

    // rebooted runtime serves the next render
    assert!(vm.render_svg(&bar_chart(), none(), &CancelToken::new()).is_ok());
}

#[test]
fn leftover_timers_do_not_leak_into_the_next_render() {
    let lines = Arc::new(Mutex::new(Vec::<String>::new()));
    let sink = lines.clone();
    let vm = VegaVm::new(VmConfig {
        bundle: mock_bundle(),
        log_sink: Some(Arc::new(move |line: &str| sink.lock().unwrap().push(line.to_string()))),
        ..Default::default()
    })
    .unwrap();

    vm.render_svg(br#"{"marks": [], "stray": true}"#, none(), &CancelToken::new())
        .unwrap();
    vm.render_raster(&bar_chart(), none(), Resolution::new(32, 32), &CancelToken::new())
        .unwrap();
    // canvas is unbound again, so this is a vector render
    let svg = vm.render_svg(&bar_chart(), none(), &CancelToken::new()).unwrap();
    assert!(svg.starts_with("<svg"));

    let lines = lines.lock().unwrap();
    assert!(!lines.iter().any(|l| l.contains("stray timer fired")), "{:?}", lines);
}

#[test]
fn concurrent_callers_are_serialized() {
    let vm = Arc::new(mock_vm());
    let handles: Vec<_> = (0..4)
        .map(|i| {
            let vm = vm.clone();
            thread::spawn(move || {
                let values: Vec<u32> = (0..=i).map(|n| 10 + n).collect();
                let data = json!({ "table": values });
                vm.render_svg(&bar_chart(), Some(&data), &CancelToken::new())
                    .map(|svg| svg.matches("<rect").count())
            })
        })
        .collect();
    for (i, h) in handles.into_iter().enumerate() {
        assert_eq!(h.join().unwrap().unwrap(), i + 1);
    }
}

#[test]
fn missing_library_file_fails_construction() {
    let err = VegaVm::new(VmConfig {
        bundle: ScriptBundle::vega(fixture("no-such-dir")),
        ..Default::default()
    })
    .err()
    .unwrap();
    assert!(matches!(err, Error::AssetLoad { .. }), "{:?}", err);
}

#[tokio::test]
async fn async_facade_renders() {
    let vm = vegavm::AsyncVegaVm::new(VmConfig {
        bundle: mock_bundle(),
        png_resolution: Resolution::new(40, 30),
        ..Default::default()
    })
    .await
    .unwrap();
    let svg = vm.render_svg(&bar_chart(), none(), &CancelToken::new()).await.unwrap();
    assert!(svg.contains("<rect"));
    let png = vm.render_png(&bar_chart(), none(), &CancelToken::new()).await.unwrap();
    let decoded = tiny_skia::Pixmap::decode_png(&png).unwrap();
    assert_eq!((decoded.width(), decoded.height()), (40, 30));
    vm.close().await.unwrap();
}
