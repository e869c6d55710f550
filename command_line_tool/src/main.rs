use anyhow::{bail, Context, Result};
use clap::{Parser, ValueEnum};
use daisymap::features::{DescriptorExtractor, FeatureDetector};
use daisymap::grid_detector::GridDetector;
use daisymap::{DaisyDescriptorExtractor, GeometricParams, KeyPoint, Matrix};
use image::GenericImageView;
use log::info;
use rand::Rng;

use std::fs::File;
use std::io::{BufWriter, Write};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    /// One descriptor per line, values separated by spaces.
    Text,
    /// The serialized descriptor matrix.
    Binary,
}

/// Command line arguments structure.
#[derive(Parser, Debug)]
#[command(author, version, about = "CLI for computing dense and sparse DAISY descriptors.")]
struct Args {
    /// Input image filename; colour images are converted to grayscale
    #[arg()]
    image: String,

    /// Text file with one `x y` query point per line
    #[arg(long)]
    query_points: Option<String>,

    /// Describe this many random keypoints
    #[arg(long)]
    sample: Option<usize>,

    /// Describe keypoints on a grid with this step
    #[arg(long)]
    grid_step: Option<usize>,

    /// Write the full dense field (one descriptor per pixel)
    #[arg(long)]
    dense: bool,

    /// JSON file with geometric parameters
    #[arg(long)]
    config: Option<String>,

    /// Descriptor radius in pixels
    #[arg(long)]
    radius: Option<f64>,

    /// Number of sample rings
    #[arg(long)]
    radial_q: Option<usize>,

    /// Number of samples per ring
    #[arg(long)]
    angular_q: Option<usize>,

    /// Number of orientation bins
    #[arg(long)]
    histogram_q: Option<usize>,

    /// Output filename
    #[arg(long, default_value = "descriptors.txt")]
    output: String,

    /// Output format
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    format: OutputFormat,

    /// Log filter, e.g. "info" or "daisymap=debug"
    #[arg(long)]
    log_level: Option<String>,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let mut logger =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"));
    if let Some(level) = &args.log_level {
        logger.parse_filters(level);
    }
    logger.init();

    let params = load_params(&args)?;
    let image = read_image(&args.image)?;
    let mut extractor = DaisyDescriptorExtractor::new(params)
        .context("invalid descriptor parameters")?;

    let mut descriptors = Matrix::empty();
    if args.dense {
        extractor.compute_dense(&image, &mut descriptors)?;
    } else if let Some(path) = &args.query_points {
        let query = read_query_points(path)?;
        info!("Describing {} query points from {path}", query.rows());
        extractor.compute_query_points(&image, &query, &mut descriptors)?;
    } else {
        let keypoints = match (args.sample, args.grid_step) {
            (Some(n), _) => sample_keypoints(&image, n),
            (None, Some(step)) => GridDetector::new(step).detect(&image, None)?,
            (None, None) => bail!("nothing to describe: pass --dense, --query-points, --sample or --grid-step"),
        };
        info!("Describing {} keypoints", keypoints.len());
        extractor.compute(&image, &keypoints, &mut descriptors)?;
    }

    info!(
        "Computed {} descriptors of length {}",
        descriptors.rows(),
        extractor.feature_length()
    );
    write_descriptors(&descriptors, &args.output, args.format)?;
    info!("Descriptors written to {}", args.output);
    Ok(())
}

/// Starts from defaults or `--config`, then applies individual flags.
fn load_params(args: &Args) -> Result<GeometricParams> {
    let mut params = match &args.config {
        Some(path) => {
            let file = File::open(path).with_context(|| format!("could not open config {path}"))?;
            serde_json::from_reader(file).with_context(|| format!("could not parse config {path}"))?
        }
        None => GeometricParams::default(),
    };
    if let Some(radius) = args.radius {
        params.radius = radius;
    }
    if let Some(radial_q) = args.radial_q {
        params.radial_q = radial_q;
    }
    if let Some(angular_q) = args.angular_q {
        params.angular_q = angular_q;
    }
    if let Some(histogram_q) = args.histogram_q {
        params.histogram_q = histogram_q;
    }
    Ok(params)
}

fn read_image(filename: &str) -> Result<Matrix> {
    info!("Reading image file: {filename}");
    let img = image::open(filename).with_context(|| format!("could not load image {filename}"))?;
    let (width, height) = img.dimensions();
    let pixel_data = img.to_luma8().into_raw();
    Ok(Matrix::new(height as usize, width as usize, pixel_data)?)
}

/// Reads `x y` pairs, one per line. Blank lines and `#` comments are skipped.
fn read_query_points(filename: &str) -> Result<Matrix> {
    let text = std::fs::read_to_string(filename)
        .with_context(|| format!("could not read query points {filename}"))?;
    let mut values = Vec::new();
    for (line_no, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let coords: Vec<f32> = line
            .split(|c: char| c.is_whitespace() || c == ',')
            .filter(|s| !s.is_empty())
            .map(str::parse)
            .collect::<std::result::Result<_, _>>()
            .with_context(|| format!("{filename}:{}: invalid number", line_no + 1))?;
        if coords.len() != 2 {
            bail!("{filename}:{}: expected 2 values, got {}", line_no + 1, coords.len());
        }
        values.extend(coords);
    }
    Ok(Matrix::new(values.len() / 2, 2, values)?)
}

fn sample_keypoints(image: &Matrix, count: usize) -> Vec<KeyPoint> {
    let mut rng = rand::thread_rng();
    (0..count)
        .map(|_| {
            KeyPoint::new(
                rng.gen_range(0.0..image.cols() as f32),
                rng.gen_range(0.0..image.rows() as f32),
            )
        })
        .collect()
}

fn write_descriptors(descriptors: &Matrix, filename: &str, format: OutputFormat) -> Result<()> {
    let file = File::create(filename).with_context(|| format!("could not create {filename}"))?;
    let mut out = BufWriter::new(file);
    match format {
        OutputFormat::Binary => out.write_all(&descriptors.serialize())?,
        OutputFormat::Text => {
            for row in 0..descriptors.rows() {
                let Some(values) = descriptors.row_f32(row) else {
                    bail!("descriptors are not an F32 matrix");
                };
                let line: Vec<String> = values.iter().map(|v| format!("{v:.6}")).collect();
                writeln!(out, "{}", line.join(" "))?;
            }
        }
    }
    out.flush()?;
    Ok(())
}
