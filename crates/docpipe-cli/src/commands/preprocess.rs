//! Preprocess command - run document images through the processor chain.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;

use clap::{Args, ValueEnum};
use console::style;
use glob::glob;
use image::{DynamicImage, ImageFormat};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{debug, error, info, warn};

use docpipe_core::{ColorFormat, DocpipeConfig, DocumentPipeline};

use super::config::load_config;

/// Image extensions picked up from the input pattern.
const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "webp", "tiff", "tif", "bmp", "gif"];

/// Arguments for the preprocess command.
#[derive(Args)]
pub struct PreprocessArgs {
    /// Input file or glob pattern
    #[arg(required = true)]
    input: String,

    /// Output directory
    #[arg(short, long, default_value = "processed")]
    output_dir: PathBuf,

    /// Output image format
    #[arg(short, long, value_enum, default_value = "png")]
    format: OutputFormat,

    /// Target colour format (rgb8, rgba8, luma8, luma_alpha8)
    #[arg(long)]
    color: Option<ColorFormat>,

    /// Skip colour format conversion
    #[arg(long)]
    no_convert: bool,

    /// Skip resizing
    #[arg(long)]
    no_resize: bool,

    /// Continue on error
    #[arg(long)]
    continue_on_error: bool,
}

/// Output image format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Png,
    Jpeg,
}

impl OutputFormat {
    fn extension(self) -> &'static str {
        match self {
            OutputFormat::Png => "png",
            OutputFormat::Jpeg => "jpg",
        }
    }

    fn image_format(self) -> ImageFormat {
        match self {
            OutputFormat::Png => ImageFormat::Png,
            OutputFormat::Jpeg => ImageFormat::Jpeg,
        }
    }
}

/// Result of preprocessing a single file.
struct FileResult {
    path: PathBuf,
    output: Option<PathBuf>,
    error: Option<String>,
}

pub async fn run(args: PreprocessArgs, config_path: Option<&str>) -> anyhow::Result<()> {
    let start = Instant::now();

    let mut config = load_config(config_path)?;
    apply_overrides(&mut config, &args);

    let files = expand_input(&args.input, config.loader.input_dir.as_deref())?;
    if files.is_empty() {
        anyhow::bail!("No matching images found for pattern: {}", args.input);
    }

    println!("{} Found {} images to process", style("ℹ").blue(), files.len());

    let pipeline = DocumentPipeline::builder().with_config(&config).build()?;
    info!(
        "Processor chain: [{}]",
        pipeline
            .processors()
            .iter()
            .map(|p| p.name())
            .collect::<Vec<_>>()
            .join(", ")
    );

    fs::create_dir_all(&args.output_dir)?;

    let progress = ProgressBar::new(files.len() as u64);
    progress.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} images")?
            .progress_chars("=>-"),
    );

    let outputs = plan_outputs(&files, &args.output_dir, args.format);
    let mut results = Vec::with_capacity(files.len());

    for (path, output) in files.into_iter().zip(outputs) {
        let result = output
            .map_err(anyhow::Error::msg)
            .and_then(|output| process_single_file(&pipeline, &path, &output, args.format));

        match result {
            Ok(output) => {
                debug!("Wrote {}", output.display());
                results.push(FileResult {
                    path,
                    output: Some(output),
                    error: None,
                });
            }
            Err(e) => {
                let error_msg = e.to_string();
                if args.continue_on_error {
                    warn!("Failed to process {}: {}", path.display(), error_msg);
                    results.push(FileResult {
                        path,
                        output: None,
                        error: Some(error_msg),
                    });
                } else {
                    progress.abandon();
                    error!("Failed to process {}: {}", path.display(), error_msg);
                    anyhow::bail!("Processing failed: {}", error_msg);
                }
            }
        }

        progress.inc(1);
    }

    progress.finish_and_clear();

    let successful = results.iter().filter(|r| r.output.is_some()).count();
    let failed: Vec<_> = results.iter().filter(|r| r.error.is_some()).collect();

    println!(
        "{} Processed {} images in {:?}",
        style("✓").green(),
        results.len(),
        start.elapsed()
    );
    println!(
        "   {} successful, {} failed",
        style(successful).green(),
        style(failed.len()).red()
    );
    println!("   Output directory: {}", args.output_dir.display());

    if !failed.is_empty() {
        println!();
        println!("{}", style("Failed files:").red());
        for result in &failed {
            println!(
                "  - {}: {}",
                result.path.display(),
                result.error.as_deref().unwrap_or("unknown error")
            );
        }
    }

    Ok(())
}

/// Fold command-line switches into the loaded configuration.
fn apply_overrides(config: &mut DocpipeConfig, args: &PreprocessArgs) {
    if let Some(color) = args.color {
        config.processing.target_format = color;
        config.processing.convert_format = true;
    }
    if args.no_convert {
        config.processing.convert_format = false;
    }
    if args.no_resize {
        config.processing.resize = false;
    }
}

/// Expand the input pattern into absolute image paths.
///
/// Relative patterns are resolved against the configured input directory.
fn expand_input(pattern: &str, input_dir: Option<&Path>) -> anyhow::Result<Vec<PathBuf>> {
    let pattern = match input_dir {
        Some(dir) if Path::new(pattern).is_relative() => dir.join(pattern).to_string_lossy().into_owned(),
        _ => pattern.to_string(),
    };

    let cwd = std::env::current_dir()?;
    let mut files: Vec<PathBuf> = glob(&pattern)?
        .filter_map(|r| r.ok())
        .filter(|p| p.is_file() && is_image(p))
        .map(|p| if p.is_absolute() { p } else { cwd.join(p) })
        .collect();
    files.sort();

    Ok(files)
}

fn is_image(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| IMAGE_EXTENSIONS.contains(&e.to_lowercase().as_str()))
        .unwrap_or(false)
}

/// Choose an output path for every input.
///
/// Inputs sharing a file stem keep their source extension in the output name.
/// An input whose output name is still taken gets an error instead of
/// overwriting another image.
fn plan_outputs(
    files: &[PathBuf],
    output_dir: &Path,
    format: OutputFormat,
) -> Vec<Result<PathBuf, String>> {
    let mut stems: HashMap<String, usize> = HashMap::new();
    for path in files {
        *stems.entry(file_stem(path)).or_default() += 1;
    }

    let mut claimed: HashMap<String, &Path> = HashMap::new();
    files
        .iter()
        .map(|path| {
            let stem = file_stem(path);
            let name = if stems[&stem] > 1 {
                let source_ext = path
                    .extension()
                    .and_then(|e| e.to_str())
                    .unwrap_or_default()
                    .to_lowercase();
                format!("{}_{}.{}", stem, source_ext, format.extension())
            } else {
                format!("{}.{}", stem, format.extension())
            };

            if let Some(other) = claimed.get(&name) {
                return Err(format!(
                    "Output {} is already written for {}",
                    name,
                    other.display()
                ));
            }
            claimed.insert(name.clone(), path.as_path());
            Ok(output_dir.join(name))
        })
        .collect()
}

fn file_stem(path: &Path) -> String {
    path.file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("image")
        .to_string()
}

fn process_single_file(
    pipeline: &DocumentPipeline,
    path: &Path,
    output_path: &Path,
    format: OutputFormat,
) -> anyhow::Result<PathBuf> {
    let image = pipeline.preprocess(path.to_path_buf())?;

    // JPEG has no alpha channel.
    let image = match (format, image.color().has_alpha()) {
        (OutputFormat::Jpeg, true) => DynamicImage::ImageRgb8(image.to_rgb8()),
        _ => image,
    };

    image.save_with_format(output_path, format.image_format())?;

    Ok(output_path.to_path_buf())
}
