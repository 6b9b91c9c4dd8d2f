use log::{debug, info, warn};

use vote_correlation::*;

use snafu::{prelude::*, Snafu};

use std::fs;
use std::path::{Path, PathBuf};

use crate::args::Args;
use crate::corr::config_reader::*;
use crate::corr::io_common::resolve_path;

pub mod config_reader;
pub mod io_common;
pub mod io_demographics;
#[cfg(feature = "postgres")]
pub mod io_postgres;
pub mod io_votes;
pub mod report_chart;
pub mod report_csv;
pub mod report_xlsx;
pub mod summary;

#[cfg(feature = "postgres")]
pub type PostgresError = postgres::Error;
#[cfg(not(feature = "postgres"))]
pub type PostgresError = std::convert::Infallible;
#[cfg(feature = "postgres")]
pub type TlsError = native_tls::Error;
#[cfg(not(feature = "postgres"))]
pub type TlsError = std::convert::Infallible;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum CorrError {
    #[snafu(display("Error opening file {path}"))]
    OpeningJson {
        source: std::io::Error,
        path: String,
    },
    #[snafu(display("Error parsing json"))]
    ParsingJson { source: serde_json::Error },
    #[snafu(display("Error opening excel file {path}"))]
    OpeningExcel {
        source: calamine::XlsxError,
        path: String,
    },
    #[snafu(display("Excel file {path} has no worksheet or no header row"))]
    EmptyExcel { path: String },
    #[snafu(display("Error opening csv file {path}"))]
    CsvOpen { source: csv::Error, path: String },
    #[snafu(display("Error parsing line {lineno} of csv file {path}"))]
    CsvLineParse {
        source: csv::Error,
        path: String,
        lineno: usize,
    },
    #[snafu(display("Error writing csv file {path}"))]
    CsvWrite { source: csv::Error, path: String },
    #[snafu(display("Column {column:?} not found in {path}"))]
    MissingColumn { column: String, path: String },
    #[snafu(display("Database error: {message}"))]
    Database { message: String },
    #[snafu(display("Database error: {what}"))]
    Postgres { source: PostgresError, what: String },
    #[snafu(display("Error building the TLS connector"))]
    Tls { source: TlsError },
    #[snafu(display("Error creating directory {path}"))]
    CreatingDirectory {
        source: std::io::Error,
        path: String,
    },
    #[snafu(display("Error writing excel report {path}"))]
    WritingXlsx {
        source: rust_xlsxwriter::XlsxError,
        path: String,
    },
    #[snafu(display("Error writing file {path}"))]
    WritingFile {
        source: std::io::Error,
        path: String,
    },
    #[snafu(display("The summary differs from the reference {path}"))]
    ReferenceMismatch { path: String },
    #[snafu(display("Error drawing chart {path}: {message}"))]
    Chart { message: String, path: String },
    #[snafu(display("Correlation analysis failed"))]
    Analysis { source: CorrelationErrors },

    #[snafu(whatever, display("{message}"))]
    Whatever {
        message: String,
        #[snafu(source(from(Box<dyn std::error::Error>, Some)))]
        source: Option<Box<dyn std::error::Error>>,
    },
}

pub type CorrResult<T> = Result<T, CorrError>;

/// What a run produced.
#[derive(Debug)]
pub struct AnalysisOutcome {
    pub joined_districts: usize,
    pub ranked: RankedResults,
    pub written: Vec<PathBuf>,
}

/// The output formats that can be requested.
pub const ALL_FORMATS: [&str; 4] = ["xlsx", "csv", "json", "chart"];

fn validate_rules(settings: &AnalysisSettings, has_selection: bool) -> CorrResult<AnalysisRules> {
    let mut rules = match settings.preset.as_deref() {
        Some("fullSweep") => AnalysisRules::FULL_SWEEP,
        Some("focused") => AnalysisRules::FOCUSED,
        None if has_selection => AnalysisRules::FOCUSED,
        None => AnalysisRules::FULL_SWEEP,
        Some(x) => {
            whatever!("Unknown preset {:?} (expected fullSweep or focused)", x)
        }
    };
    if let Some(n) = settings.min_sample_size {
        rules.min_sample_size = n;
    }
    if let Some(alpha) = settings.significance_level {
        rules.significance_level = alpha;
    }
    if let Some(b) = settings.compute_spearman {
        rules.compute_spearman = b;
    }
    rules.duplicate_policy = match settings.duplicate_policy.as_deref() {
        None => rules.duplicate_policy,
        Some("lastWriteWins") => DuplicatePolicy::LastWriteWins,
        Some("reject") => DuplicatePolicy::Reject,
        Some(x) => {
            whatever!(
                "Unknown duplicate policy {:?} (expected lastWriteWins or reject)",
                x
            )
        }
    };
    rules.validate().context(AnalysisSnafu {})?;
    Ok(rules)
}

fn validate_formats(settings: &OutputSettings) -> CorrResult<Vec<String>> {
    let formats: Vec<String> = match &settings.formats {
        Some(fs) if !fs.is_empty() => fs.clone(),
        _ => ALL_FORMATS.iter().map(|s| s.to_string()).collect(),
    };
    for f in formats.iter() {
        if !ALL_FORMATS.contains(&f.as_str()) {
            whatever!(
                "Unknown output format {:?} (expected one of {:?})",
                f,
                ALL_FORMATS
            )
        }
    }
    Ok(formats)
}

/// Runs the analysis described by the configuration.
///
/// Arguments:
/// * `config` the analysis description
/// * `root` the directory against which the relative paths of the configuration are resolved
/// * `check_summary_path` if provided, a reference summary that the computed summary must match
pub fn run_analysis_config(
    config: &AnalysisConfig,
    root: &Path,
    check_summary_path: Option<String>,
) -> CorrResult<AnalysisOutcome> {
    let selection: Option<Vec<String>> = config
        .analysis
        .attribute_ids
        .clone()
        .filter(|ids| !ids.is_empty());
    let rules = validate_rules(&config.analysis, selection.is_some())?;
    let formats = validate_formats(&config.output_settings)?;
    let top_n = config.analysis.top_count();
    info!("rules: {:?}, formats: {:?}", rules, formats);

    // Load
    let vote_path = resolve_path(root, &config.vote_source.file_path);
    let districts = io_votes::read_vote_table(&vote_path, &config.vote_source)?;
    let target = config.vote_source.target();
    let demographics =
        io_demographics::read_demographics(&config.demographic_source, root, selection.as_deref())?;

    // Join and compute
    let table = join_districts(
        &districts,
        &demographics.records,
        &target,
        rules.duplicate_policy,
    )
    .context(AnalysisSnafu {})?;
    info!(
        "Merged data: {} districts with both vote and demographic data",
        table.len()
    );
    let results = run_correlations(
        &table,
        &demographics.attributes,
        selection.as_deref(),
        &rules,
    )
    .context(AnalysisSnafu {})?;
    let ranked = rank_results(&results);

    summary::log_summary(&ranked, top_n);

    // The reference may sit in the output directory: check it before rendering.
    let summary_js = summary::build_summary_js(config, &rules, table.len(), &ranked);
    if let Some(summary_p) = &check_summary_path {
        summary::check_against_reference(&summary_js, summary_p)?;
    }

    // Render
    let out_dir = resolve_path(
        root,
        config
            .output_settings
            .output_directory
            .as_deref()
            .unwrap_or("."),
    );
    fs::create_dir_all(&out_dir).context(CreatingDirectorySnafu {
        path: out_dir.display().to_string(),
    })?;
    let stem = io_common::sanitize_file_stem(&config.output_settings.analysis_name);
    let target_label = config
        .output_settings
        .target_label
        .clone()
        .unwrap_or_else(|| target.clone());

    let mut written: Vec<PathBuf> = Vec::new();
    for f in formats.iter() {
        match f.as_str() {
            "xlsx" => {
                let p = out_dir.join(format!("{}_correlation_report.xlsx", stem));
                report_xlsx::write_report(&p, &ranked, rules.significance_level)?;
                written.push(p);
            }
            "csv" => {
                let p = out_dir.join(format!("{}_correlations.csv", stem));
                report_csv::write_results_csv(&p, &ranked.all, rules.significance_level)?;
                written.push(p);
                let p = out_dir.join(format!("{}_merged_data.csv", stem));
                report_csv::write_joined_csv(&p, &table)?;
                written.push(p);
            }
            "json" => {
                let p = out_dir.join(format!("{}_summary.json", stem));
                summary::write_summary(&p, &summary_js)?;
                written.push(p);
            }
            "chart" => {
                let p = out_dir.join(format!("{}_top_correlations.svg", stem));
                let title = format!("Top and bottom correlations with {}", target_label);
                if report_chart::write_chart(&p, &ranked, top_n, &title)? {
                    written.push(p);
                }
            }
            x => whatever!("Unknown output format {:?}", x),
        }
    }
    for p in written.iter() {
        info!("Saved {}", p.display());
    }

    Ok(AnalysisOutcome {
        joined_districts: table.len(),
        ranked,
        written,
    })
}

/// Builds the configuration from the config file (if any) and the command line flags.
/// Flags take precedence over the file.
fn build_config(args: &Args) -> CorrResult<(AnalysisConfig, PathBuf)> {
    let (mut config, root) = match &args.config {
        Some(config_path) => {
            let config = read_config(config_path)?;
            let root = Path::new(config_path.as_str())
                .parent()
                .map(|p| p.to_path_buf())
                .unwrap_or_else(|| PathBuf::from("."));
            (config, root)
        }
        None => {
            let input = match &args.input {
                Some(x) => x.clone(),
                None => whatever!("Either --config or --input must be provided"),
            };
            (AnalysisConfig::from_input(&input), PathBuf::from("."))
        }
    };

    // Paths given on the command line are relative to the working directory.
    let cwd = |p: &String| -> String {
        let pb = PathBuf::from(p);
        if pb.is_absolute() {
            p.clone()
        } else {
            std::env::current_dir()
                .map(|d| d.join(&pb).display().to_string())
                .unwrap_or_else(|_| p.clone())
        }
    };

    if let Some(input) = &args.input {
        config.vote_source.file_path = cwd(input);
    }
    if let Some(t) = &args.input_type {
        config.vote_source.provider = Some(t.clone());
    }
    if let Some(ws) = &args.excel_worksheet_name {
        config.vote_source.worksheet_name = Some(ws.clone());
    }
    if let Some(t) = &args.target {
        config.vote_source.target_column = Some(t.clone());
    }
    if let Some(r) = &args.rates {
        config.demographic_source.provider = "csv".to_string();
        config.demographic_source.rates_file_path = Some(cwd(r));
    }
    if let Some(a) = &args.attributes {
        config.demographic_source.attributes_file_path = Some(cwd(a));
    }
    if let Some(uri) = &args.source_uri {
        config.demographic_source.source_uri = Some(uri.clone());
        if args.rates.is_none() && config.demographic_source.rates_file_path.is_none() {
            config.demographic_source.provider = "postgres".to_string();
        }
    }
    if !args.select.is_empty() {
        config.analysis.attribute_ids = Some(args.select.clone());
    }
    if let Some(p) = &args.preset {
        config.analysis.preset = Some(p.clone());
    }
    if let Some(n) = args.min_sample_size {
        config.analysis.min_sample_size = Some(n);
    }
    if args.spearman {
        config.analysis.compute_spearman = Some(true);
    }
    if let Some(n) = args.top_n {
        config.analysis.top_n = Some(n);
    }
    if let Some(out) = &args.out {
        config.output_settings.output_directory = Some(cwd(out));
    }
    if let Some(fs) = &args.formats {
        config.output_settings.formats = Some(fs.clone());
    }
    debug!("build_config: root: {:?}", root);
    Ok((config, root))
}

pub fn run_from_args(args: &Args) -> CorrResult<AnalysisOutcome> {
    let (config, root) = build_config(args)?;
    info!(
        "Running analysis {:?} on {:?}",
        config.output_settings.analysis_name, config.vote_source.file_path
    );
    let outcome = run_analysis_config(&config, &root, args.reference.clone())?;
    if outcome.ranked.all.is_empty() {
        warn!("No attribute passed the sample size and variance filters");
    }
    Ok(outcome)
}
