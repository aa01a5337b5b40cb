//! Fraudscope CLI Module
//!
//! Command-line interface for serving the upload page and scoring files
//! directly from the terminal.

use anyhow::Context;
use clap::{Parser, Subcommand};
use colored::*;
use console::measure_text_width;
use std::path::{Path, PathBuf};
use std::time::Instant;

use crate::inference::{DetectorConfig, ScoreReport, TrainedDetector};
use crate::preprocessing::FeatureSchema;
use crate::server::{run_server, ServerConfig};
use crate::utils::DataLoader;

// ─── Output helpers ────────────────────────────────────────────────────────────

/// Banner width between the two border glyphs
const BANNER_WIDTH: usize = 58;

fn dim(s: &str) -> ColoredString    { s.truecolor(100, 100, 100) }
fn accent(s: &str) -> ColoredString { s.truecolor(120, 170, 255) }
fn muted(s: &str) -> ColoredString  { s.truecolor(140, 140, 140) }
fn ok(s: &str) -> ColoredString     { s.truecolor(100, 210, 120) }
fn alert(s: &str) -> ColoredString  { s.truecolor(235, 90, 90) }

enum BannerLine {
    Blank,
    Rule,
    Center(String),
    Field(&'static str, String),
}

/// Pad possibly styled `text` to `width` visible columns
fn fit(text: &str, width: usize, center: bool) -> String {
    let gap = width.saturating_sub(measure_text_width(text));
    let left = if center { gap / 2 } else { 0 };
    format!("{}{}{}", " ".repeat(left), text, " ".repeat(gap - left))
}

fn banner_row(line: &BannerLine) -> String {
    let inner = BANNER_WIDTH - 2;
    let framed = |text: String| format!("{} {} {}", dim("│"), text, dim("│"));
    match line {
        BannerLine::Blank => framed(" ".repeat(inner)),
        BannerLine::Rule => dim(&format!("├{}┤", "─".repeat(BANNER_WIDTH))).to_string(),
        BannerLine::Center(text) => framed(fit(text, inner, true)),
        BannerLine::Field(key, value) => {
            let text = format!("{} {}", muted(&format!("{:<7}", key)), value.white());
            framed(fit(&text, inner, false))
        }
    }
}

fn print_banner(lines: &[BannerLine]) {
    let edge = "─".repeat(BANNER_WIDTH);
    println!("  {}", dim(&format!("┌{}┐", edge)));
    for line in lines {
        println!("  {}", banner_row(line));
    }
    println!("  {}", dim(&format!("└{}┘", edge)));
}

fn step_run(msg: &str) {
    print!("  {} {}... ", accent("›"), msg);
}

fn step_done(detail: &str) {
    println!("{} {}", ok("done"), dim(detail));
}

fn section(title: &str) {
    println!();
    println!("  {}", title.white().bold());
    println!("  {}", dim(&"─".repeat(BANNER_WIDTH - 2)));
}

// ─── CLI definition ────────────────────────────────────────────────────────────

#[derive(Parser)]
#[command(name = "fraudscope")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Credit card fraud detection with an isolation forest")]
#[command(long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Train on the training table and serve the upload page
    Serve {
        /// Training table (defaults to TRAINING_DATA or data/creditcard_train.xlsx)
        #[arg(short, long)]
        training: Option<PathBuf>,

        /// Host to bind (defaults to API_HOST or 0.0.0.0)
        #[arg(long)]
        host: Option<String>,

        /// Port to bind (defaults to API_PORT or 8080)
        #[arg(short, long)]
        port: Option<u16>,

        /// Detector configuration (JSON)
        #[arg(short, long)]
        config: Option<PathBuf>,
    },

    /// Train on the training table and score a file from the terminal
    Score {
        /// Training table (defaults to TRAINING_DATA or data/creditcard_train.xlsx)
        #[arg(short, long)]
        training: Option<PathBuf>,

        /// Table to score
        #[arg(short, long)]
        data: PathBuf,

        /// Detector configuration (JSON)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Write the full report as JSON
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Show which columns of a table would be used as features
    Info {
        /// Input table
        #[arg(short, long)]
        data: PathBuf,

        /// Label column excluded from the features
        #[arg(long, default_value = "Class")]
        label: String,
    },
}

fn load_detector_config(path: Option<&Path>) -> anyhow::Result<DetectorConfig> {
    match path {
        Some(path) => DetectorConfig::from_json_file(path)
            .with_context(|| format!("invalid detector config {}", path.display())),
        None => Ok(DetectorConfig::default()),
    }
}

/// Train the detector, failing with the training path in the error chain
pub fn train_detector(training: &Path, config: DetectorConfig) -> anyhow::Result<TrainedDetector> {
    step_run(&format!("Training on {}", training.display()));
    let start = Instant::now();
    let detector = TrainedDetector::from_path(training, config)
        .with_context(|| format!("failed to train on {}", training.display()))?;
    step_done(&format!(
        "{} rows × {} features in {:?}",
        detector.training_rows(),
        detector.schema().n_features(),
        start.elapsed()
    ));
    Ok(detector)
}

// ─── Serve ─────────────────────────────────────────────────────────────────────

pub async fn cmd_serve(
    training: Option<PathBuf>,
    host: Option<String>,
    port: Option<u16>,
    config: Option<PathBuf>,
) -> anyhow::Result<()> {
    let mut server_config = ServerConfig::default();
    if let Some(training) = training {
        server_config = server_config.with_training_data(training);
    }
    if let Some(host) = host {
        server_config = server_config.with_host(host);
    }
    if let Some(port) = port {
        server_config = server_config.with_port(port);
    }

    let detector_config = load_detector_config(config.as_deref())?;

    section("Startup");
    let detector = train_detector(&server_config.training_data, detector_config)?;

    let (host, port) = (&server_config.host, server_config.port);
    let base = format!("http://{}:{}", host, port);
    println!();
    print_banner(&[
        BannerLine::Blank,
        BannerLine::Center("Fraudscope".white().bold().to_string()),
        BannerLine::Center(dim(&format!("v{}", env!("CARGO_PKG_VERSION"))).to_string()),
        BannerLine::Blank,
        BannerLine::Rule,
        BannerLine::Blank,
        BannerLine::Field("Web UI", base.clone()),
        BannerLine::Field("API", format!("{}/api/score", base)),
        BannerLine::Field("Health", format!("{}/api/health", base)),
        BannerLine::Blank,
        BannerLine::Rule,
        BannerLine::Blank,
        BannerLine::Center(dim("ctrl+c to stop").to_string()),
        BannerLine::Blank,
    ]);
    println!();

    run_server(server_config, detector).await
}

// ─── Score ─────────────────────────────────────────────────────────────────────

pub fn cmd_score(
    training: Option<PathBuf>,
    data: &Path,
    config: Option<PathBuf>,
    output: Option<&Path>,
) -> anyhow::Result<()> {
    let training = training.unwrap_or_else(|| ServerConfig::default().training_data);
    let detector_config = load_detector_config(config.as_deref())?;

    section("Score");
    let detector = train_detector(&training, detector_config)?;

    step_run(&format!("Scoring {}", data.display()));
    let start = Instant::now();
    let df = DataLoader::new()
        .load_path(data)
        .with_context(|| format!("failed to read {}", data.display()))?;
    let report = detector.score(&df)?;
    step_done(&format!("{} rows in {:?}", report.rows, start.elapsed()));

    print_report(&report);

    if let Some(output) = output {
        let json = serde_json::to_string_pretty(&report)?;
        std::fs::write(output, json)
            .with_context(|| format!("failed to write {}", output.display()))?;
        println!("  {} {}", muted("Report"), output.display());
        println!();
    }

    Ok(())
}

fn print_report(report: &ScoreReport) {
    println!();
    let count = format!("{}", report.flagged_count);
    println!(
        "  {:<16} {}",
        muted("Flagged"),
        if report.flagged_count > 0 { alert(&count).bold() } else { ok(&count).bold() }
    );
    println!("  {:<16} {}", muted("Rows"), report.rows.to_string().white());
    println!("  {:<16} {}", muted("Threshold"), format!("{:.4}", report.threshold).white());
    println!();

    if report.flagged.is_empty() {
        return;
    }

    println!("  {:>8} {:>8} {:>10} {:>10}  {}", muted("Row"), muted("Score"), muted("PCA1"), muted("PCA2"), muted("Values"));
    println!("  {}", dim(&"─".repeat(56)));
    for row in &report.flagged {
        let values = report
            .columns
            .iter()
            .zip(&row.values)
            .map(|(c, v)| format!("{}={}", c, v))
            .collect::<Vec<_>>()
            .join(" ");
        println!(
            "  {:>8} {:>8.4} {:>10.3} {:>10.3}  {}",
            row.row, row.score, row.pca1, row.pca2, dim(&values)
        );
    }
    println!();
}

// ─── Info ──────────────────────────────────────────────────────────────────────

pub fn cmd_info(data: &Path, label: &str) -> anyhow::Result<()> {
    section("Data Info");

    let df = DataLoader::new()
        .load_path(data)
        .with_context(|| format!("failed to read {}", data.display()))?;

    println!("  {:<12} {}", muted("File"), data.display());
    println!("  {:<12} {}", muted("Rows"), df.height());
    println!("  {:<12} {}", muted("Columns"), df.width());
    println!();

    let schema = FeatureSchema::infer(&df, label)?;

    println!("  {:<20} {:<12} {:>6}  {}", muted("Column"), muted("Type"), muted("Nulls"), muted("Role"));
    println!("  {}", dim(&"─".repeat(50)));

    for col in df.get_columns() {
        let name = col.name().as_str();
        let role = if schema.label() == Some(name) {
            muted("label")
        } else if schema.columns().iter().any(|c| c == name) {
            ok("feature")
        } else {
            dim("dropped")
        };
        println!(
            "  {:<20} {:<12} {:>6}  {}",
            name,
            format!("{:?}", col.dtype()).truecolor(140, 140, 140),
            col.null_count(),
            role
        );
    }

    println!();
    println!("  {:<12} {}", muted("Schema"), schema.fingerprint());
    println!();
    Ok(())
}
