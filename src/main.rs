use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand, ValueEnum};
use colored::*;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tabled::{settings::Style, Table, Tabled};

use strainrs::classifier::FatigueLabel;
use strainrs::config::AnalysisConfig;
use strainrs::export;
use strainrs::import::{ActivityLoader, ImportSummary};
use strainrs::logging::{init_logging, LogFormat};
use strainrs::models::{StrainMetrics, DATE_FORMAT};
use strainrs::{assess_window, select_window, StrainExtractor};

/// strainrs - Easy-ride strain analysis CLI
///
/// Extracts per-activity strain metrics from recorded streams, compares easy
/// rides against a personal baseline and reports whether strain on easy
/// days points to accumulating fatigue.
#[derive(Parser)]
#[command(name = "strainrs")]
#[command(version)]
#[command(about = "Easy-ride strain analysis CLI", long_about = None)]
struct Cli {
    /// Sets a custom config file
    #[arg(short, long, value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    /// Increase verbosity of output
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Log output format (pretty, json, compact)
    #[arg(long, value_name = "FORMAT", global = true)]
    log_format: Option<LogFormat>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct WindowArgs {
    /// Directory of <id>.json metadata and <id>.csv stream files
    #[arg(short, long, value_name = "DIR")]
    dir: PathBuf,

    /// Last day of the window (YYYY-MM-DD, default: latest activity)
    #[arg(short, long)]
    end: Option<NaiveDate>,

    /// Window length in days (default from config)
    #[arg(long, conflicts_with = "weeks")]
    days: Option<u32>,

    /// Window length in weeks
    #[arg(long)]
    weeks: Option<u32>,

    /// Show a progress bar while loading
    #[arg(long)]
    progress: bool,
}

#[derive(Clone, Copy, ValueEnum)]
enum ExtractFormat {
    Table,
    Json,
    Csv,
}

#[derive(Subcommand)]
enum Commands {
    /// Extract strain metrics for every activity in a directory
    Extract {
        /// Directory of <id>.json metadata and <id>.csv stream files
        #[arg(short, long, value_name = "DIR")]
        dir: PathBuf,

        /// Output format
        #[arg(short, long, value_enum, default_value = "table")]
        format: ExtractFormat,

        /// Write to a file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Assess a window and print the full result as JSON
    Analyze {
        #[command(flatten)]
        window: WindowArgs,

        /// Write to a file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Assess a window and print the plain-text summary
    Summary {
        #[command(flatten)]
        window: WindowArgs,
    },

    /// Print strain gauges in Prometheus text format
    Gauges {
        #[command(flatten)]
        window: WindowArgs,

        /// Write to a file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Manage the configuration file
    Config {
        /// Write the default configuration
        #[arg(long)]
        init: bool,

        /// Overwrite an existing file with --init
        #[arg(long, requires = "init")]
        force: bool,

        /// Print the effective configuration
        #[arg(long)]
        show: bool,
    },
}

#[derive(Tabled)]
struct MetricsRow {
    #[tabled(rename = "Date")]
    date: String,
    #[tabled(rename = "Type")]
    activity_type: String,
    #[tabled(rename = "Method")]
    method: String,
    #[tabled(rename = "Min")]
    minutes: String,
    #[tabled(rename = "Avg HR")]
    avg_heartrate: String,
    #[tabled(rename = "Drift")]
    hr_drift: String,
    #[tabled(rename = "NP")]
    normalized_power: String,
    #[tabled(rename = "IF")]
    intensity_factor: String,
    #[tabled(rename = "TSS")]
    tss: String,
}

impl MetricsRow {
    fn from_metrics(metrics: &StrainMetrics) -> Self {
        Self {
            date: metrics.date.clone().unwrap_or_else(|| "-".to_string()),
            activity_type: metrics.activity_type.to_string(),
            method: format!("{:?}", metrics.estimate_method),
            minutes: cell(metrics.total_time.map(|t| t / 60.0), 0),
            avg_heartrate: cell(metrics.avg_heartrate, 1),
            hr_drift: cell(metrics.hr_drift, 1),
            normalized_power: cell(metrics.normalized_power, 0),
            intensity_factor: cell(metrics.intensity_factor, 2),
            tss: cell(metrics.tss, 1),
        }
    }
}

fn cell(value: Option<f64>, precision: usize) -> String {
    value.map_or_else(|| "-".to_string(), |v| format!("{:.*}", precision, v))
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => AnalysisConfig::load_from_file(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => AnalysisConfig::load_or_default(),
    };

    config.logging.level = config.logging.level.raised_by(cli.verbose);
    if let Some(format) = cli.log_format {
        config.logging.format = format;
    }
    init_logging(&config.logging).context("Failed to initialize logging")?;

    if cli.verbose > 0 {
        eprintln!(
            "{}",
            format!("Log level: {}", config.logging.level.to_filter()).dimmed()
        );
    }

    match cli.command {
        Commands::Extract {
            dir,
            format,
            output,
        } => {
            eprintln!("{}", "Extracting strain metrics...".green().bold());
            let (mut activities, summary) = load_activities(&dir, &config, false)?;
            activities.sort_by(|a, b| a.date.cmp(&b.date));
            report_import(&summary);

            let rendered = match format {
                ExtractFormat::Table => {
                    let rows: Vec<MetricsRow> =
                        activities.iter().map(MetricsRow::from_metrics).collect();
                    let mut table = Table::new(rows);
                    table.with(Style::rounded());
                    format!("{}\n", table)
                }
                ExtractFormat::Json => format!("{}\n", export::to_json(&activities)?),
                ExtractFormat::Csv => {
                    let mut buffer = Vec::new();
                    export::write_metrics_csv(&mut buffer, &activities)?;
                    String::from_utf8(buffer).context("CSV output was not UTF-8")?
                }
            };
            emit(&rendered, output.as_deref())?;
            eprintln!("{}", "✓ Extraction completed".green());
        }

        Commands::Analyze { window, output } => {
            let activities = load_window(&window, &config)?;
            let assessment = assess_window(&activities, &config);
            emit(
                &format!("{}\n", export::to_json(&assessment)?),
                output.as_deref(),
            )?;
            announce(assessment.classification.label);
        }

        Commands::Summary { window } => {
            let activities = load_window(&window, &config)?;
            let assessment = assess_window(&activities, &config);
            emit(&assessment.summary, None)?;
            announce(assessment.classification.label);
        }

        Commands::Gauges { window, output } => {
            let activities = load_window(&window, &config)?;
            let text = export::render_exposition(&config.gauges, &activities)
                .context("Failed to render gauges")?;
            emit(&text, output.as_deref())?;
        }

        Commands::Config { init, force, show } => {
            if !init && !show {
                bail!("Nothing to do: pass --init or --show");
            }

            if init {
                let path = cli
                    .config
                    .clone()
                    .unwrap_or_else(AnalysisConfig::default_config_path);
                if path.exists() && !force {
                    bail!(
                        "Config file {} already exists (use --force to overwrite)",
                        path.display()
                    );
                }
                AnalysisConfig::default()
                    .save_to_file(&path)
                    .with_context(|| format!("Failed to write config to {}", path.display()))?;
                eprintln!(
                    "{}",
                    format!("✓ Wrote default configuration to {}", path.display()).white()
                );
            }

            if show {
                let text = toml::to_string_pretty(&config)
                    .context("Failed to serialize configuration")?;
                emit(&text, None)?;
            }
        }
    }

    Ok(())
}

fn load_activities(
    dir: &Path,
    config: &AnalysisConfig,
    progress: bool,
) -> Result<(Vec<StrainMetrics>, ImportSummary)> {
    let loader = ActivityLoader::new(
        StrainExtractor::new(&config.extraction),
        config.stream_columns.clone(),
    )
    .with_progress(progress);

    loader
        .load_directory(dir)
        .map_err(|err| anyhow::anyhow!(err.user_message()))
        .with_context(|| format!("Failed to load activities from {}", dir.display()))
}

fn load_window(window: &WindowArgs, config: &AnalysisConfig) -> Result<Vec<StrainMetrics>> {
    let (activities, summary) = load_activities(&window.dir, config, window.progress)?;
    report_import(&summary);

    let days = match (window.days, window.weeks) {
        (_, Some(weeks)) => weeks.saturating_mul(7),
        (Some(days), None) => days,
        (None, None) => config.window_gate.window_days,
    };
    if days == 0 {
        bail!("Window length must be at least one day");
    }

    let end = window
        .end
        .or_else(|| {
            activities
                .iter()
                .filter_map(|a| a.calendar_date().and_then(|d| d.ok()))
                .max()
        })
        .unwrap_or_else(|| chrono::Local::now().date_naive());

    let selected = select_window(&activities, end, days);
    eprintln!(
        "{}",
        format!(
            "Window: {} days ending {} ({} of {} activities)",
            days,
            end.format(DATE_FORMAT),
            selected.len(),
            activities.len()
        )
        .dimmed()
    );
    Ok(selected)
}

fn report_import(summary: &ImportSummary) {
    eprintln!(
        "{}",
        format!(
            "Loaded {} of {} activities in {} ms",
            summary.extracted, summary.total_files, summary.duration_ms
        )
        .dimmed()
    );
    for skipped in &summary.skipped {
        eprintln!(
            "{} {}: {}",
            "⚠ Skipped".yellow(),
            skipped.path.display(),
            skipped.reason
        );
    }
    if summary.coerced_cells > 0 {
        eprintln!(
            "{}",
            format!(
                "⚠ {} non-numeric stream cells were read as missing",
                summary.coerced_cells
            )
            .yellow()
        );
    }
}

fn announce(label: FatigueLabel) {
    let text = format!("Assessment: {}", label);
    let colored = match label {
        FatigueLabel::NeutralNoisy => text.cyan(),
        FatigueLabel::AbsorbingWell => text.green(),
        FatigueLabel::NonTrainingFatigueLikely => text.yellow(),
        FatigueLabel::FatigueAccumulating => text.red(),
    };
    eprintln!("{}", colored.bold());
}

fn emit(text: &str, output: Option<&Path>) -> Result<()> {
    match output {
        Some(path) => {
            fs::write(path, text)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            eprintln!("{}", format!("✓ Wrote {}", path.display()).green());
        }
        None => {
            let mut stdout = io::stdout().lock();
            stdout.write_all(text.as_bytes())?;
            stdout.flush()?;
        }
    }
    Ok(())
}
