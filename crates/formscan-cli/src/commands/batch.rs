//! Batch processing command for multiple OCR result files.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use clap::Args;
use console::style;
use glob::glob;
use indicatif::{ProgressBar, ProgressStyle};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, error, warn};

use formscan_core::{ExtractionReport, ExtractionResult, Extractor, TableSource};

use super::config::load_config;
use super::process::{extract_file, format_result, OutputFormat};

/// Arguments for the batch command.
#[derive(Args)]
pub struct BatchArgs {
    /// Input files or glob pattern
    #[arg(required = true)]
    input: String,

    /// Output directory
    #[arg(short, long)]
    output_dir: Option<PathBuf>,

    /// Output format for each file
    #[arg(short, long, value_enum, default_value = "json")]
    format: OutputFormat,

    /// Also generate a summary CSV
    #[arg(long)]
    summary: bool,

    /// Number of parallel workers
    #[arg(short = 'j', long, default_value = "4")]
    jobs: usize,

    /// Continue on error
    #[arg(long)]
    continue_on_error: bool,
}

/// Result of processing a single file.
struct FileOutcome {
    path: PathBuf,
    record: Option<(ExtractionResult, ExtractionReport)>,
    error: Option<String>,
    processing_time_ms: u64,
}

pub async fn run(args: BatchArgs, config_path: Option<&str>) -> anyhow::Result<()> {
    let start = Instant::now();

    let config = load_config(config_path)?;

    let mut files: Vec<PathBuf> = glob(&args.input)?
        .filter_map(|r| r.ok())
        .filter(|p| {
            p.extension()
                .and_then(|e| e.to_str())
                .is_some_and(|ext| ext.eq_ignore_ascii_case("json"))
        })
        .collect();
    files.sort();

    if files.is_empty() {
        anyhow::bail!("No matching files found for pattern: {}", args.input);
    }

    println!(
        "{} Found {} files to process",
        style("ℹ").blue(),
        files.len()
    );

    if let Some(ref output_dir) = args.output_dir {
        fs::create_dir_all(output_dir)?;
    }

    let progress = ProgressBar::new(files.len() as u64);
    progress.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} files")?
            .progress_chars("=>-"),
    );

    let extractor = Arc::new(Extractor::from_config(&config));
    let permits = Arc::new(Semaphore::new(args.jobs.max(1)));
    let mut tasks = JoinSet::new();

    for path in files {
        let extractor = Arc::clone(&extractor);
        let permits = Arc::clone(&permits);
        tasks.spawn(async move {
            let _permit = permits.acquire_owned().await;
            tokio::task::spawn_blocking(move || process_single_file(&extractor, path)).await
        });
    }

    let mut results = Vec::new();
    while let Some(joined) = tasks.join_next().await {
        let outcome = joined??;
        progress.inc(1);

        if let Some(message) = &outcome.error {
            if args.continue_on_error {
                warn!("Failed to process {}: {}", outcome.path.display(), message);
            } else {
                error!("Failed to process {}: {}", outcome.path.display(), message);
                tasks.abort_all();
                progress.abandon();
                anyhow::bail!("Processing failed: {}", message);
            }
        }
        results.push(outcome);
    }

    progress.finish_with_message("Complete");
    results.sort_by(|a, b| a.path.cmp(&b.path));

    let successful = results.iter().filter(|r| r.record.is_some()).count();
    let failed: Vec<_> = results.iter().filter(|r| r.error.is_some()).collect();

    if let Some(output_dir) = &args.output_dir {
        let written: Vec<_> = results.iter().filter(|r| r.record.is_some()).collect();
        let paths: Vec<&Path> = written.iter().map(|r| r.path.as_path()).collect();
        let names = output_names(&paths);

        for (outcome, name) in written.iter().zip(&names) {
            if let Some((record, _)) = &outcome.record {
                let output_path = output_dir.join(format!("{}.{}", name, args.format.extension()));
                fs::write(&output_path, format_result(record, args.format)?)?;
                debug!("Wrote output to {}", output_path.display());
            }
        }
    }

    if args.summary {
        let summary_path = args
            .output_dir
            .as_ref()
            .map(|d| d.join("summary.csv"))
            .unwrap_or_else(|| PathBuf::from("summary.csv"));

        let fields: Vec<&str> = extractor.field_names().collect();
        write_summary(&summary_path, &fields, &results)?;
        println!(
            "{} Summary written to {}",
            style("✓").green(),
            summary_path.display()
        );
    }

    println!();
    println!(
        "{} Processed {} files in {:?}",
        style("✓").green(),
        results.len(),
        start.elapsed()
    );
    println!(
        "   {} successful, {} failed",
        style(successful).green(),
        style(failed.len()).red()
    );

    if !failed.is_empty() {
        println!();
        println!("{}", style("Failed files:").red());
        for outcome in &failed {
            println!(
                "  - {}: {}",
                outcome.path.display(),
                outcome.error.as_deref().unwrap_or("unknown error")
            );
        }
    }

    Ok(())
}

fn process_single_file(extractor: &Extractor, path: PathBuf) -> FileOutcome {
    let file_start = Instant::now();
    let result = extract_file(extractor, &path);
    let processing_time_ms = file_start.elapsed().as_millis() as u64;

    match result {
        Ok(record) => FileOutcome {
            path,
            record: Some(record),
            error: None,
            processing_time_ms,
        },
        Err(e) => FileOutcome {
            path,
            record: None,
            error: Some(e.to_string()),
            processing_time_ms,
        },
    }
}

/// Output stem for each input, distinct across the batch.
///
/// `scan_01_res.json` is written as `scan_01.<ext>`. When that name is
/// already taken the full stem is kept, then a numeric suffix is added.
fn output_names(paths: &[&Path]) -> Vec<String> {
    let mut used = HashSet::new();

    paths
        .iter()
        .map(|path| {
            let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or("record");
            let short = stem.strip_suffix("_res").unwrap_or(stem);

            let name = [short.to_string(), stem.to_string()]
                .into_iter()
                .chain((2..).map(|n| format!("{}_{}", stem, n)))
                .find(|candidate| !used.contains(candidate))
                .unwrap_or_else(|| stem.to_string());

            if name != short {
                warn!(
                    "Output name {} already used, writing {} as {}",
                    short,
                    path.display(),
                    name
                );
            }
            used.insert(name.clone());
            name
        })
        .collect()
}

fn write_summary(path: &Path, fields: &[&str], results: &[FileOutcome]) -> anyhow::Result<()> {
    let mut wtr = csv::Writer::from_path(path)?;

    let mut header = vec!["filename", "status"];
    header.extend(fields);
    header.extend(["detected_rows", "filled_rows", "processing_time_ms", "error"]);
    wtr.write_record(&header)?;

    for outcome in results {
        let filename = outcome
            .path
            .file_name()
            .and_then(|s| s.to_str())
            .unwrap_or("")
            .to_string();
        let elapsed = outcome.processing_time_ms.to_string();

        let mut record = vec![filename];
        match &outcome.record {
            Some((result, report)) => {
                record.push("success".to_string());
                for name in fields {
                    record.push(result.field(name).unwrap_or_default().to_string());
                }
                let filled = match report.table {
                    TableSource::Reconstructed { filled, .. } => filled,
                    TableSource::Template => result.table.len(),
                };
                let detected = report.detected_rows();
                record.extend([detected.to_string(), filled.to_string(), elapsed, String::new()]);
            }
            None => {
                record.push("error".to_string());
                record.extend(fields.iter().map(|_| String::new()));
                record.extend([
                    String::new(),
                    String::new(),
                    elapsed,
                    outcome.error.clone().unwrap_or_default(),
                ]);
            }
        }
        wtr.write_record(&record)?;
    }

    wtr.flush()?;
    Ok(())
}
