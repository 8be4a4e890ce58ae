//! Process command - extract the record from a single OCR result file.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;

use clap::Args;
use console::style;
use tracing::{debug, info};

use formscan_core::{ExtractionReport, ExtractionResult, Extractor, OcrDocument};

use super::config::load_config;

/// Arguments for the process command.
#[derive(Args)]
pub struct ProcessArgs {
    /// PaddleOCR result file (*_res.json)
    #[arg(required = true)]
    input: PathBuf,

    /// Output file (default: stdout)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "json")]
    format: OutputFormat,

    /// Show which strategy produced each value
    #[arg(long)]
    show_sources: bool,
}

#[derive(Clone, Copy, Debug, clap::ValueEnum)]
pub enum OutputFormat {
    /// JSON output
    Json,
    /// CSV output, one line per table row
    Csv,
    /// Plain text summary
    Text,
}

impl OutputFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Json => "json",
            OutputFormat::Csv => "csv",
            OutputFormat::Text => "txt",
        }
    }
}

pub async fn run(args: ProcessArgs, config_path: Option<&str>) -> anyhow::Result<()> {
    let start = Instant::now();

    let config = load_config(config_path)?;

    if !args.input.exists() {
        anyhow::bail!("Input file not found: {}", args.input.display());
    }

    info!("Processing file: {}", args.input.display());

    let extractor = Extractor::from_config(&config);
    let (result, report) = extract_file(&extractor, &args.input)?;

    let output = format_result(&result, args.format)?;

    if let Some(output_path) = &args.output {
        fs::write(output_path, &output)?;
        println!(
            "{} Output written to {}",
            style("✓").green(),
            output_path.display()
        );
    } else {
        println!("{}", output);
    }

    if args.show_sources {
        eprintln!();
        eprintln!("{}", format_sources(&report));
    }

    debug!("Total processing time: {:?}", start.elapsed());

    Ok(())
}

/// Load one OCR result file and extract its record.
pub fn extract_file(
    extractor: &Extractor,
    path: &Path,
) -> anyhow::Result<(ExtractionResult, ExtractionReport)> {
    let stream = OcrDocument::from_file(path)
        .and_then(|doc| doc.into_stream())
        .map_err(|e| anyhow::anyhow!("Failed to read OCR result {}: {}", path.display(), e))?;

    debug!("Loaded {} tokens from {}", stream.len(), path.display());

    Ok(extractor.extract_detailed(&stream))
}

pub fn format_result(result: &ExtractionResult, format: OutputFormat) -> anyhow::Result<String> {
    match format {
        OutputFormat::Json => Ok(serde_json::to_string_pretty(result)?),
        OutputFormat::Csv => format_csv(result),
        OutputFormat::Text => Ok(format_text(result)),
    }
}

fn format_csv(result: &ExtractionResult) -> anyhow::Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);

    let mut header: Vec<&str> = result.fields.keys().map(String::as_str).collect();
    header.extend(["min", "max", "count"]);
    wtr.write_record(&header)?;

    for row in &result.table {
        let mut record: Vec<&str> = result.fields.values().map(String::as_str).collect();
        record.extend([row.min.as_str(), row.max.as_str(), row.count.as_str()]);
        wtr.write_record(&record)?;
    }

    let data = String::from_utf8(wtr.into_inner()?)?;
    Ok(data)
}

fn format_text(result: &ExtractionResult) -> String {
    let mut output = String::new();

    for (name, value) in &result.fields {
        output.push_str(&format!("{}: {}\n", name, value));
    }
    output.push('\n');

    output.push_str(&format!("{:<10} {:<10} {}\n", "Min", "Max", "Count"));
    for row in &result.table {
        output.push_str(&format!("{:<10} {:<10} {}\n", row.min, row.max, row.count));
    }

    output
}

fn format_sources(report: &ExtractionReport) -> String {
    let mut output = String::new();

    output.push_str(&format!("{} Sources ({} tokens)\n", style("ℹ").blue(), report.token_count));
    for (name, source) in &report.fields {
        let source = if source.is_match() {
            style(source.as_str()).green()
        } else {
            style(source.as_str()).yellow()
        };
        output.push_str(&format!("  {}: {}\n", name, source));
    }

    match report.table {
        formscan_core::TableSource::Reconstructed { detected, filled } => {
            output.push_str(&format!(
                "  table: {} rows detected, {} from template",
                detected, filled
            ));
        }
        formscan_core::TableSource::Template => {
            output.push_str(&format!("  table: {}", style("template fallback").yellow()));
        }
    }

    output
}
