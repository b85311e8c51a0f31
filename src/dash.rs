pub mod config_reader;
pub mod io_common;
pub mod io_csv;
pub mod io_excel;
pub mod io_kobo;
pub mod panels;

use log::{debug, info, warn};

use snafu::{prelude::*, ErrorCompat, Snafu};
use std::fs;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::json;
use serde_json::Value as JSValue;
use text_diff::print_diff;

use survey_tally::filter::*;
use survey_tally::schema::*;
use survey_tally::*;

use crate::args::Args;
use crate::dash::config_reader::*;
use crate::dash::io_common::simplify_file_name;
use crate::dash::panels::*;

#[derive(Debug, Snafu)]
pub enum DashError {
    #[snafu(display("Error opening Excel file {path}"))]
    OpeningExcel {
        source: calamine::XlsxError,
        path: String,
    },
    #[snafu(display("Worksheet {worksheet:?} not found in {path}"))]
    MissingWorksheet { path: String, worksheet: String },
    #[snafu(display(
        "{path} has {count} worksheets, the name of the worksheet to read must be given"
    ))]
    AmbiguousWorksheet { path: String, count: usize },
    #[snafu(display("No header row found in {path}"))]
    EmptyInput { path: String },
    #[snafu(display("Error reading CSV file {path}"))]
    CsvOpen { source: csv::Error, path: String },
    #[snafu(display("Error parsing CSV line {lineno}"))]
    CsvLineParse { source: csv::Error, lineno: usize },
    #[snafu(display("Error opening file {path}"))]
    OpeningJson {
        source: std::io::Error,
        path: String,
    },
    #[snafu(display("Error parsing JSON"))]
    ParsingJson { source: serde_json::Error },
    #[snafu(display("Error writing file {path}"))]
    WritingOutput {
        source: std::io::Error,
        path: String,
    },
    #[snafu(display(""))]
    MissingParentDir {},

    #[snafu(display("Could not create the HTTP client"))]
    HttpClient { source: reqwest::Error },
    #[snafu(display("Request to {url} failed"))]
    Network { source: reqwest::Error, url: String },
    #[snafu(display("Request to {url} timed out after {seconds} seconds"))]
    Timeout {
        source: reqwest::Error,
        url: String,
        seconds: u64,
    },
    #[snafu(display("Request to {url} returned status {status}"))]
    HttpStatus { url: String, status: u16 },
    #[snafu(display("The answer of {url} is not valid JSON"))]
    InvalidResponse {
        source: serde_json::Error,
        url: String,
    },
    #[snafu(display("The answer of {url} has no 'results' list"))]
    MissingResults { url: String },
    #[snafu(display("No API token: set 'token' in the configuration or the {env_var} variable"))]
    MissingToken { env_var: String },

    #[snafu(display("Unknown data provider {provider:?}, expected csv, excel or kobo"))]
    UnknownProvider { provider: String },
    #[snafu(display("Invalid date {value:?}, expected YYYY-MM-DD"))]
    InvalidDate {
        source: chrono::ParseError,
        value: String,
    },
    #[snafu(display("Invalid gender {value:?}, expected Both, Gabo or Gore"))]
    InvalidGender { value: String },
    #[snafu(display("Missing parameter {name}"))]
    MissingParameter { name: String },

    #[snafu(whatever, display("{message}"))]
    Whatever {
        message: String,
        #[snafu(source(from(Box<dyn std::error::Error>, Some)))]
        source: Option<Box<dyn std::error::Error>>,
    },
}

impl DashError {
    /// A stable identifier of the kind of failure, written in the diagnostics.
    pub fn code(&self) -> &'static str {
        match self {
            DashError::OpeningExcel { .. } => "excel_open",
            DashError::MissingWorksheet { .. } => "missing_worksheet",
            DashError::AmbiguousWorksheet { .. } => "ambiguous_worksheet",
            DashError::EmptyInput { .. } => "empty_input",
            DashError::CsvOpen { .. } => "csv_open",
            DashError::CsvLineParse { .. } => "csv_parse",
            DashError::OpeningJson { .. } => "json_open",
            DashError::ParsingJson { .. } => "json_parse",
            DashError::WritingOutput { .. } => "write_output",
            DashError::MissingParentDir {} => "missing_parent_dir",
            DashError::HttpClient { .. } => "http_client",
            DashError::Network { .. } => "network",
            DashError::Timeout { .. } => "timeout",
            DashError::HttpStatus { .. } => "http_status",
            DashError::InvalidResponse { .. } => "invalid_response",
            DashError::MissingResults { .. } => "missing_results",
            DashError::MissingToken { .. } => "missing_token",
            DashError::UnknownProvider { .. } => "unknown_provider",
            DashError::InvalidDate { .. } => "invalid_date",
            DashError::InvalidGender { .. } => "invalid_gender",
            DashError::MissingParameter { .. } => "missing_parameter",
            DashError::Whatever { .. } => "other",
        }
    }
}

pub type DashResult<T> = Result<T, DashError>;

/// The message of an error followed by the messages of its causes.
pub fn error_chain(e: &DashError) -> String {
    e.iter_chain()
        .map(|x| x.to_string())
        .filter(|s| !s.is_empty())
        .collect::<Vec<String>>()
        .join(": ")
}

/// A problem shown to the viewer next to the dashboard. It does not stop the rendering.
#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct Diagnostic {
    pub level: String,
    pub code: String,
    pub message: String,
}

impl Diagnostic {
    fn warning(code: &str, message: String) -> Diagnostic {
        Diagnostic {
            level: "warning".to_string(),
            code: code.to_string(),
            message,
        }
    }

    fn error(code: &str, message: String) -> Diagnostic {
        Diagnostic {
            level: "error".to_string(),
            code: code.to_string(),
            message,
        }
    }
}

fn filter_diagnostic(w: &FilterWarning) -> Diagnostic {
    match w {
        FilterWarning::MissingGenderColumn(c) => Diagnostic::warning(
            "missing_gender_column",
            format!("Column {:?} not found, the gender filter was not applied", c),
        ),
        FilterWarning::MissingDateColumn(c) => Diagnostic::warning(
            "missing_date_column",
            format!("Column {:?} not found, the date filter was not applied", c),
        ),
        FilterWarning::NoValidDates => Diagnostic::warning(
            "no_valid_dates",
            "No valid submission date, the date range defaults to the current date".to_string(),
        ),
    }
}

#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
struct OutputConfig {
    dashboard: String,
    gender: String,
    #[serde(rename = "startDate")]
    start_date: String,
    #[serde(rename = "endDate")]
    end_date: String,
    submissions: String,
    #[serde(rename = "filteredSubmissions")]
    filtered_submissions: String,
}

fn acquire(source: &DataSource) -> DashResult<RowSet> {
    match source {
        DataSource::Csv { path } => io_csv::read_csv_rows(path),
        DataSource::Excel { path, worksheet } => {
            io_excel::read_excel_rows(path, worksheet.as_deref())
        }
        DataSource::Kobo {
            url,
            token,
            token_env,
            timeout,
        } => {
            let token = match token {
                Some(t) => t.clone(),
                None => std::env::var(token_env)
                    .ok()
                    .context(MissingTokenSnafu { env_var: token_env })?,
            };
            let client = io_kobo::KoboClient::new(token, *timeout)?;
            client.fetch_rows(url)
        }
    }
}

fn filter_columns(registry: &SchemaRegistry) -> FilterColumns {
    FilterColumns {
        gender: registry.column("gender").unwrap_or_else(|| GENDER.to_string()),
        submission_time: registry
            .column("submission_time")
            .unwrap_or_else(|| SUBMISSION_TIME.to_string()),
    }
}

/// Runs one render cycle: acquisition, filters, panels.
///
/// Configuration problems are returned as errors. Problems with the data are
/// written as diagnostics in the document.
pub fn render_dashboard(config: &DashboardConfig, today: NaiveDate) -> DashResult<JSValue> {
    let settings = config.filters.validate()?;
    let source = config.data_source()?;
    info!(
        "render_dashboard: reading {} with filters {:?}",
        source.location(),
        settings
    );

    let mut diagnostics: Vec<Diagnostic> = Vec::new();
    let (rows, acquired) = match acquire(&source) {
        Ok(rows) => (rows, true),
        Err(e) => {
            warn!("render_dashboard: no data from {}: {:?}", source.location(), e);
            diagnostics.push(Diagnostic::error(e.code(), error_chain(&e)));
            (RowSet::empty(), false)
        }
    };
    debug!(
        "render_dashboard: {} rows, columns: {:?}",
        rows.len(),
        rows.columns()
    );

    let registry = SchemaRegistry::standard();
    let outcome = apply_filters(&rows, &filter_columns(&registry), &settings, today);
    let panels = standard_panels(&outcome.rows, &config.panel_settings());

    // Without data every panel is empty: the acquisition error is enough.
    if acquired {
        diagnostics.extend(outcome.warnings.iter().map(filter_diagnostic));
        for p in panels.iter() {
            if let PanelBody::Skipped { missing } = &p.body {
                diagnostics.push(Diagnostic::warning(
                    "missing_columns",
                    format!("{}: missing column(s) {}", p.title, missing.join(", ")),
                ));
            }
        }
    }

    let c = OutputConfig {
        dashboard: config.dashboard_name(),
        gender: match &settings.gender {
            GenderFilter::All => "Both".to_string(),
            GenderFilter::Only(g) => g.clone(),
        },
        start_date: outcome.range.start.format("%Y-%m-%d").to_string(),
        end_date: outcome.range.end.format("%Y-%m-%d").to_string(),
        submissions: rows.len().to_string(),
        filtered_submissions: outcome.rows.len().to_string(),
    };
    let panels_js: Vec<JSValue> = panels.iter().map(panel_to_json).collect();
    Ok(json!({
        "config": c,
        "diagnostics": diagnostics,
        "panels": panels_js
    }))
}

fn read_reference(path: &str) -> DashResult<JSValue> {
    let contents = fs::read_to_string(path).context(OpeningJsonSnafu { path })?;
    let js: JSValue = serde_json::from_str(contents.as_str()).context(ParsingJsonSnafu {})?;
    Ok(js)
}

/// Compares a rendered dashboard with a reference file. Differences are printed as a line diff.
pub fn check_reference(path: &str, result_js: &JSValue) -> DashResult<()> {
    let reference_js = read_reference(path)?;
    if &reference_js != result_js {
        let pretty_ref = serde_json::to_string_pretty(&reference_js).context(ParsingJsonSnafu {})?;
        let pretty_res = serde_json::to_string_pretty(result_js).context(ParsingJsonSnafu {})?;
        warn!(
            "check_reference: found differences with the reference {}",
            simplify_file_name(path)
        );
        print_diff(pretty_ref.as_str(), pretty_res.as_str(), "\n");
        whatever!(
            "Difference detected between the computed dashboard and the reference {}",
            path
        )
    }
    Ok(())
}

fn write_output(config: &DashboardConfig, result_js: &JSValue) -> DashResult<()> {
    let pretty_js = serde_json::to_string_pretty(result_js).context(ParsingJsonSnafu {})?;
    match config.output_settings.output_path.as_deref() {
        None | Some("") | Some("stdout") => {
            println!("{}", pretty_js);
        }
        Some(path) => {
            fs::write(path, pretty_js).context(WritingOutputSnafu { path })?;
            info!("write_output: dashboard written to {}", path);
        }
    }
    Ok(())
}

pub fn run_dashboard(
    config: &DashboardConfig,
    today: NaiveDate,
    reference_path: Option<&str>,
) -> DashResult<()> {
    let result_js = render_dashboard(config, today)?;
    write_output(config, &result_js)?;
    if let Some(p) = reference_path {
        check_reference(p, &result_js)?;
    }
    Ok(())
}

pub fn run_dashboard_with_args(args: &Args) -> DashResult<()> {
    let mut config = match &args.config {
        Some(p) => read_config(p)?,
        None => DashboardConfig::default(),
    };
    apply_args(&mut config, args);
    debug!("run_dashboard_with_args: config: {:?}", config);
    let today = chrono::Local::now().date_naive();
    run_dashboard(&config, today, args.reference.as_deref())
}

#[cfg(test)]
fn run_dashboard_test(test_name: &str) {
    let _ = env_logger::builder().is_test(true).try_init();
    let test_dir = format!("{}/tests/{}", env!("CARGO_MANIFEST_DIR"), test_name);
    info!("Running test {}", test_name);
    let res = read_config(format!("{}/{}_config.json", test_dir, test_name).as_str())
        .and_then(|config| render_dashboard(&config, test_today()))
        .and_then(|js| {
            check_reference(
                format!("{}/{}_expected_summary.json", test_dir, test_name).as_str(),
                &js,
            )
        });
    if let Err(e) = res {
        eprintln!("An error occured {}", error_chain(&e));
        if let Some(bt) = ErrorCompat::backtrace(&e) {
            eprintln!("trace: {}", bt);
        }
        panic!("test {} failed: {:?}", test_name, e);
    }
}

#[cfg(test)]
fn test_today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 6, 1).unwrap()
}
