use std::io::{self, Read, Write};
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::{Parser, ValueEnum};
use vegavm::{CancelToken, Resolution, ScriptBundle, VegaVm, VmConfig};

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
enum Format {
    Svg,
    Png,
}

/// Render a Vega chart specification to SVG or PNG.
#[derive(Parser, Debug)]
#[command(name = "vegavm", version, about)]
struct Args {
    /// Chart specification file ("-" reads stdin)
    #[arg(short, long, default_value = "-")]
    spec: String,

    /// JSON object mapping data table names to their values
    #[arg(short, long)]
    data: Option<PathBuf>,

    #[arg(short, long, value_enum, default_value_t = Format::Svg)]
    format: Format,

    /// Output file (stdout when omitted)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// PNG width in pixels
    #[arg(long, default_value_t = 1024)]
    width: u32,

    /// PNG height in pixels
    #[arg(long, default_value_t = 768)]
    height: u32,

    /// Give up after this many milliseconds (0 waits forever)
    #[arg(long, default_value_t = 30_000)]
    timeout_ms: u64,

    /// Directory holding vega.min.js and its optional polyfills
    #[arg(long, env = "VEGAVM_ASSETS_DIR", default_value = "assets/vendor")]
    assets: PathBuf,
}

fn read_spec(source: &str) -> Result<Vec<u8>> {
    if source == "-" {
        let mut buf = Vec::new();
        io::stdin().read_to_end(&mut buf).context("failed to read spec from stdin")?;
        return Ok(buf);
    }
    std::fs::read(source).with_context(|| format!("failed to read spec {}", source))
}

fn read_data(path: Option<&PathBuf>) -> Result<Option<serde_json::Value>> {
    let Some(path) = path else {
        return Ok(None);
    };
    let text = std::fs::read_to_string(path).with_context(|| format!("failed to read data {}", path.display()))?;
    let value: serde_json::Value =
        serde_json::from_str(&text).with_context(|| format!("{} is not valid JSON", path.display()))?;
    if !value.is_object() && !value.is_null() {
        bail!("{} must contain a JSON object of data tables", path.display());
    }
    Ok(Some(value))
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    let spec = read_spec(&args.spec)?;
    let data = read_data(args.data.as_ref())?;
    let resolution = Resolution::new(args.width, args.height);

    let vm = VegaVm::new(VmConfig {
        bundle: ScriptBundle::vega(&args.assets),
        png_resolution: resolution,
        ..Default::default()
    })
    .context("failed to start the vega runtime")?;

    let cancel = if args.timeout_ms == 0 {
        CancelToken::new()
    } else {
        CancelToken::with_timeout(Duration::from_millis(args.timeout_ms))
    };

    let bytes = match args.format {
        Format::Svg => vm.render_svg(&spec, data.as_ref(), &cancel)?.into_bytes(),
        Format::Png => vm.render_png_sized(&spec, data.as_ref(), resolution, &cancel)?,
    };
    vm.close();

    match &args.output {
        Some(path) => {
            std::fs::write(path, &bytes).with_context(|| format!("failed to write {}", path.display()))?;
            log::info!("wrote {} bytes to {}", bytes.len(), path.display());
        }
        None => {
            let mut out = io::stdout().lock();
            out.write_all(&bytes)?;
            out.flush()?;
        }
    }
    Ok(())
}
