use log::{debug, info, warn};

use county_counts::*;
use snafu::prelude::*;

use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::Serialize;
use serde_json::Value as JSValue;
use text_diff::print_diff;

use crate::args::Args;
use crate::report::config_reader::*;
use crate::report::io_common::write_atomic;
use crate::report::io_excel::read_workbook_bytes;
use crate::report::io_fetch::fetch_workbook;
use crate::report::io_population::*;

pub mod config_reader;
mod io_common;
mod io_excel;
mod io_fetch;
mod io_population;

#[derive(Debug, Snafu)]
pub enum ReportError {
    #[snafu(display("Unable to retrieve {url}"))]
    Fetch { source: reqwest::Error, url: String },
    #[snafu(display("Unable to retrieve {url}. Status code: {status}"))]
    FetchStatus { url: String, status: u16 },
    #[snafu(display("Error opening workbook {path}"))]
    OpeningExcel {
        source: calamine::XlsxError,
        path: String,
    },
    #[snafu(display("Sheet {name:?} is listed in workbook {path} but cannot be read"))]
    MissingSheet { name: String, path: String },
    #[snafu(display("Error reading {path}"))]
    ReadingFile {
        source: std::io::Error,
        path: String,
    },
    #[snafu(display("Error opening CSV file {path}"))]
    CsvOpen { source: csv::Error, path: String },
    #[snafu(display("Error parsing line {lineno} of {path}"))]
    CsvLineParse {
        source: csv::Error,
        path: String,
        lineno: usize,
    },
    #[snafu(display("Line {lineno} of {path} is too short"))]
    CsvLineTooShort { path: String, lineno: usize },
    #[snafu(display("Column {column:?} is missing from {path}"))]
    MissingColumn { column: String, path: String },
    #[snafu(display("Invalid population on line {lineno} of {path}: {reason}"))]
    InvalidPopulation {
        path: String,
        lineno: usize,
        reason: String,
    },
    #[snafu(display("Error opening JSON file {path}"))]
    OpeningJson {
        source: std::io::Error,
        path: String,
    },
    #[snafu(display("Error parsing JSON"))]
    ParsingJson { source: serde_json::Error },
    #[snafu(display("Cannot understand the cell or column address {address:?}"))]
    InvalidAddress { address: String },
    #[snafu(display("Cannot build the report"))]
    Counts { source: CountsError },
    #[snafu(display("Error writing {path}"))]
    WritingOutput {
        source: std::io::Error,
        path: String,
    },
    #[snafu(display("Error moving the output into place at {path}"))]
    PersistingOutput {
        source: tempfile::PersistError,
        path: String,
    },

    #[snafu(whatever, display("{message}"))]
    Whatever {
        message: String,
        #[snafu(source(from(Box<dyn std::error::Error>, Some)))]
        source: Option<Box<dyn std::error::Error>>,
    },
}

pub type ReportResult<T> = Result<T, ReportError>;

#[derive(Eq, PartialEq, Debug, Clone)]
pub enum OutputTarget {
    Stdout,
    File(String),
}

/// The configuration of one run, after merging the configuration file and
/// the command line.
#[derive(PartialEq, Debug, Clone)]
pub struct Settings {
    pub url: String,
    pub workbook_path: String,
    /// A local workbook, read instead of fetching `url`.
    pub input: Option<String>,
    pub timeout: Duration,
    pub attempts: u32,
    pub population_path: String,
    pub population_columns: PopulationColumns,
    pub output: OutputTarget,
    pub reference: Option<String>,
    pub rules: ExtractionRules,
    pub names: NameRules,
}

impl Settings {
    /// Relative paths of the configuration file are resolved against `root`.
    pub fn from_config(config: &ReportConfig, root: Option<&Path>) -> ReportResult<Settings> {
        let resolve = |p: &str| -> String {
            match root {
                Some(r) if Path::new(p).is_relative() => r.join(p).display().to_string(),
                _ => p.to_string(),
            }
        };
        let output = match config.output_path.as_deref() {
            Some("stdout") => OutputTarget::Stdout,
            Some(p) => OutputTarget::File(resolve(p)),
            None => OutputTarget::File(resolve(DEFAULT_OUTPUT_PATH)),
        };
        Ok(Settings {
            url: config
                .source
                .url
                .clone()
                .unwrap_or_else(|| DEFAULT_URL.to_string()),
            workbook_path: resolve(
                config
                    .source
                    .workbook_path
                    .as_deref()
                    .unwrap_or(DEFAULT_WORKBOOK_PATH),
            ),
            input: None,
            timeout: Duration::from_secs(config.source.timeout_seconds.unwrap_or(60)),
            attempts: config.source.attempts.unwrap_or(3).max(1),
            population_path: resolve(
                config
                    .population
                    .file_path
                    .as_deref()
                    .unwrap_or(DEFAULT_POPULATION_PATH),
            ),
            population_columns: config.population_columns(),
            output,
            reference: None,
            rules: config.extraction_rules()?,
            names: config.name_rules(),
        })
    }

    /// The command line takes precedence over the configuration file.
    pub fn with_args(mut self, args: &Args) -> Settings {
        if let Some(url) = &args.url {
            self.url = url.clone();
        }
        if let Some(p) = &args.population {
            self.population_path = p.clone();
        }
        match args.out.as_deref() {
            Some("stdout") => self.output = OutputTarget::Stdout,
            Some(p) => self.output = OutputTarget::File(p.to_string()),
            None => {}
        }
        self.input = args.input.clone();
        self.reference = args.reference.clone();
        self
    }
}

pub fn resolve_settings(args: &Args) -> ReportResult<Settings> {
    let settings = match &args.config {
        Some(config_path) => {
            info!("Reading configuration {:?}", config_path);
            let config = read_config(config_path)?;
            debug!("config: {:?}", config);
            let root = Path::new(config_path.as_str()).parent();
            Settings::from_config(&config, root)?
        }
        None => Settings::from_config(&ReportConfig::default(), None)?,
    };
    Ok(settings.with_args(args))
}

#[derive(Serialize, Debug)]
struct CountyCountJs<'a> {
    county: &'a str,
    cases: u64,
    fatalities: u64,
    population: u64,
}

/// The published document. The key order matters to the readers of the file.
#[derive(Serialize, Debug)]
struct CountsDocument<'a> {
    date: &'a str,
    hospitalizations: Option<u64>,
    #[serde(rename = "positivity rate")]
    positivity_rate: Option<f64>,
    counts: Vec<CountyCountJs<'a>>,
}

fn build_document(report: &Report) -> CountsDocument<'_> {
    CountsDocument {
        date: report.date.as_str(),
        hospitalizations: report.hospitalizations,
        positivity_rate: report.positivity_rate,
        counts: report
            .counts
            .iter()
            .map(|c| CountyCountJs {
                county: c.county.as_str(),
                cases: c.cases,
                fatalities: c.fatalities,
                population: c.population,
            })
            .collect(),
    }
}

pub fn report_to_json(report: &Report) -> ReportResult<String> {
    serde_json::to_string(&build_document(report)).context(ParsingJsonSnafu {})
}

pub fn report_to_js(report: &Report) -> ReportResult<JSValue> {
    serde_json::to_value(build_document(report)).context(ParsingJsonSnafu {})
}

/// Fails if the report differs from the reference document.
pub fn check_reference(reference_path: &str, report: &Report) -> ReportResult<()> {
    let summary_ref = read_summary(reference_path)?;
    let pretty_js_summary_ref =
        serde_json::to_string_pretty(&summary_ref).context(ParsingJsonSnafu {})?;
    let pretty_js_stats =
        serde_json::to_string_pretty(&report_to_js(report)?).context(ParsingJsonSnafu {})?;
    if pretty_js_summary_ref != pretty_js_stats {
        warn!("Found differences with the reference document");
        print_diff(
            pretty_js_summary_ref.as_str(),
            pretty_js_stats.as_ref(),
            "\n",
        );
        whatever!("Difference detected between the report and the reference document")
    }
    Ok(())
}

fn summary_lines(report: &Report) -> Vec<String> {
    let mut lines = vec![report.date.clone()];
    if let Some(total) = report.total() {
        lines.push(format!("Cases: {}", total.cases));
        lines.push(format!("Deaths: {}", total.fatalities));
    }
    lines.push(format!(
        "Hospitalizations: {}",
        report
            .hospitalizations
            .map(|h| h.to_string())
            .unwrap_or_else(|| "n/a".to_string())
    ));
    lines.push(format!(
        "Positivity Rate: {}",
        report
            .positivity_rate
            .map(|r| r.to_string())
            .unwrap_or_else(|| "n/a".to_string())
    ));
    lines
}

/// Reads the workbook, either from the local input or from the network. A
/// downloaded workbook is saved next to the report.
fn obtain_workbook(settings: &Settings) -> ReportResult<(Vec<u8>, String)> {
    match &settings.input {
        Some(path) => {
            info!("Reading workbook {:?}", path);
            let bytes = fs::read(path).context(ReadingFileSnafu { path })?;
            Ok((bytes, path.clone()))
        }
        None => {
            let bytes = fetch_workbook(&settings.url, settings.timeout, settings.attempts)?;
            write_atomic(&settings.workbook_path, &bytes)?;
            info!("Saved workbook to {:?}", settings.workbook_path);
            Ok((bytes, settings.url.clone()))
        }
    }
}

/// Runs the extraction and the assembly on a decoded workbook.
pub fn process_workbook(
    workbook: &Workbook,
    populations: &PopulationTable,
    settings: &Settings,
) -> ReportResult<Assembly> {
    let assembly = build_report(workbook, populations, &settings.rules, &settings.names)
        .context(CountsSnafu {})?;
    if !assembly.warnings.is_empty() {
        warn!(
            "{} row(s) of the workbook were left out of the report",
            assembly.warnings.len()
        );
    }
    Ok(assembly)
}

pub fn run_report(args: &Args) -> ReportResult<()> {
    let settings = resolve_settings(args)?;
    debug!("settings: {:?}", settings);

    let (bytes, source_name) = obtain_workbook(&settings)?;

    let populations = load_population_reference(
        &settings.population_path,
        &settings.population_columns,
        &settings.names,
    )?;

    let workbook = read_workbook_bytes(bytes, &source_name)?;
    let assembly = process_workbook(&workbook, &populations, &settings)?;
    let report = assembly.report;

    if let Some(reference_path) = &settings.reference {
        check_reference(reference_path, &report)?;
    }

    match &settings.output {
        OutputTarget::Stdout => {
            let pretty_js = serde_json::to_string_pretty(&report_to_js(&report)?)
                .context(ParsingJsonSnafu {})?;
            println!("{}", pretty_js);
            for l in summary_lines(&report) {
                info!("{}", l);
            }
        }
        OutputTarget::File(path) => {
            write_atomic(path, report_to_json(&report)?.as_bytes())?;
            info!("Wrote {:?}", path);
            for l in summary_lines(&report) {
                println!("{}", l);
            }
        }
    }
    Ok(())
}
