use std::fs;
use std::path::PathBuf;

use clap::Parser;
use serde_json::json;
use textspot::{OutputMode, SourceImage, SpotterConfig, TextSpotter};

#[derive(Parser)]
#[command(name = "textspot")]
#[command(about = "EAST scene-text detection: box, extract, mask and inverse-mask rendering", long_about = None)]
struct Cli {
    /// Path to the EAST detection model (ONNX)
    #[arg(long)]
    model: PathBuf,

    /// Input image paths
    #[arg(required = true)]
    images: Vec<PathBuf>,

    /// How the results should be rendered
    #[arg(short, long, value_enum, default_value_t = OutputMode::Mask)]
    mode: OutputMode,

    /// Score threshold for the EAST decoder
    #[arg(long, default_value_t = 0.5)]
    score_threshold: f32,

    /// Non-maximum suppression overlap threshold
    #[arg(long, default_value_t = 0.4)]
    nms_threshold: f32,

    /// Side length images are scaled to for inference (must be divisible by 4)
    #[arg(long, default_value_t = 512)]
    input_size: u32,

    /// Padding around detections, in output pixels
    #[arg(long, default_value_t = 0)]
    padding: i32,

    /// Report originals as discardable after successful processing
    #[arg(long)]
    discard_original: bool,

    /// Directory output images are written to
    #[arg(short, long, default_value = "out")]
    out_dir: PathBuf,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();
    let cli = Cli::parse();

    let mut cfg = SpotterConfig::new(cli.model);
    cfg.score_threshold = cli.score_threshold;
    cfg.nms_threshold = cli.nms_threshold;
    cfg.input_size = cli.input_size;
    cfg.output_mode = cli.mode;
    cfg.padding = cli.padding;
    cfg.discard_original = cli.discard_original;

    let spotter = TextSpotter::new(cfg)?;

    // Unreadable files are reported alongside pipeline failures rather than
    // aborting the whole batch.
    let mut images = Vec::new();
    let mut load_failures = Vec::new();
    for path in &cli.images {
        let id = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        match image::open(path) {
            Ok(img) => images.push(SourceImage::new(id, img.to_rgb8())),
            Err(e) => load_failures.push(json!({ "source": id, "error": e.to_string() })),
        }
    }

    let batch = spotter.process_batch(&images);

    fs::create_dir_all(&cli.out_dir)?;
    let mut artifacts = Vec::new();
    for (i, artifact) in batch.artifacts.iter().enumerate() {
        let file_name = format!(
            "{}_{}_{}.png",
            artifact.source_id,
            artifact.mode.to_string().to_lowercase(),
            i
        );
        let out_path = cli.out_dir.join(&file_name);
        artifact.image.save(&out_path)?;

        artifacts.push(json!({
            "path": out_path,
            "source": artifact.source_id,
            "mode": artifact.mode.to_string(),
            "description": artifact.description(),
            "region": artifact.region,
        }));
    }

    let mut failures = load_failures;
    failures.extend(
        batch
            .failures
            .iter()
            .map(|f| json!({ "source": f.source_id, "error": f.error.to_string() })),
    );

    let summary = json!({
        "artifacts": artifacts,
        "discard": batch.discard,
        "failures": failures,
    });
    println!("{}", serde_json::to_string_pretty(&summary)?);

    let attempted = cli.images.len();
    if attempted > 0 && failures.len() == attempted {
        return Err("all images failed to process".into());
    }

    Ok(())
}
