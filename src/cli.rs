use std::path::PathBuf;
use structopt::StructOpt;
use thiserror::Error;

use crate::qc::MissingPolicy;

/// QC reports and helpers for LIMS production metrics
#[derive(Debug, StructOpt)]
#[structopt(name = "pmutils")]
pub struct Cli {
    #[structopt(subcommand)]
    pub command: Command,
}

#[derive(Debug, StructOpt)]
pub enum Command {
    /// QC report from an Exemplar LIMS merge report.
    ///
    /// Generates an Excel workbook with two sheets: tab3 with the
    /// weekly production metrics and tm_qc with QC metrics and
    /// results PASS or FAIL.
    #[structopt(name = "merged-qc")]
    MergedQc(MergedQcArgs),

    /// QC report combining the merge report with 90x metrics.
    ///
    /// The merge report is joined with the R&D 90x metrics on
    /// sample id and evaluated with the high-depth thresholds.
    #[structopt(name = "report-90x")]
    Report90x(Report90xArgs),

    /// LIMS search string from a list of sample ids.
    #[structopt(name = "exemplar-input")]
    ExemplarInput(ExemplarInputArgs),

    /// Split file paths into components.
    #[structopt(name = "path-components")]
    PathComponents(PathComponentsArgs),
}

#[derive(Debug, StructOpt)]
pub struct MergedQcArgs {
    /// Merge report (*.xlsx), usually downloaded from Exemplar LIMS
    #[structopt(parse(from_os_str))]
    pub merge_report: PathBuf,

    /// Output workbook, should end with .xlsx
    #[structopt(parse(from_os_str))]
    pub output: PathBuf,

    #[structopt(flatten)]
    pub opts: ReportOpts,
}

#[derive(Debug, StructOpt)]
pub struct Report90xArgs {
    /// Merge report (*.xlsx), usually generated by the QC group
    #[structopt(parse(from_os_str))]
    pub merge_report: PathBuf,

    /// 90x metrics (*.xlsx), usually generated by the R&D group
    #[structopt(parse(from_os_str))]
    pub metrics_90x: PathBuf,

    /// Output workbook, should end with .xlsx
    #[structopt(parse(from_os_str))]
    pub output: PathBuf,

    #[structopt(flatten)]
    pub opts: ReportOpts,
}

/// Options shared by the QC reports
#[derive(Debug, StructOpt)]
pub struct ReportOpts {
    /// QC result of rows with missing metrics.
    ///
    /// undetermined: leave the results cell empty;
    /// fail: report the row as FAIL
    #[structopt(
        short,
        long,
        value_name = "undetermined|fail",
        default_value = "undetermined",
        parse(try_from_str = parse_missing_policy),
        possible_values = &["undetermined", "fail"],
        case_insensitive = true,
        hide_possible_values = true
    )]
    pub missing: MissingPolicy,

    /// Summary to stderr [multiple, up to -vv]
    #[structopt(
        short,
        long,
        parse(from_occurrences = parse_verbosity)
    )]
    pub verbose: u64,

    /// Summary report output file (JSON).
    #[structopt(short, long, parse(from_os_str))]
    pub report: Option<PathBuf>,
}

#[derive(Debug, StructOpt)]
pub struct ExemplarInputArgs {
    /// Sample ids separated by whitespace (e.g. "SPIDxxx01 SPIDxxx02")
    pub inp_dump: String,
}

#[derive(Debug, StructOpt)]
pub struct PathComponentsArgs {
    /// n: file name; s: file stem; g: grandparent; d: parent; p: file path
    ///
    /// Components are printed tab separated in the order given,
    /// e.g. "sdp".
    #[structopt(value_name = "nsgdp", parse(try_from_str = parse_components))]
    pub components: Components,

    /// Text file with one file path per line
    #[structopt(parse(from_os_str))]
    pub file: PathBuf,
}

/// A single path component selected on the command line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Component {
    Name,
    Stem,
    GrandParent,
    Parent,
    Path,
}

/// Ordered path components
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Components(pub Vec<Component>);

/// A collection of custom errors relating to the command line interface for this package.
#[derive(Error, Debug, PartialEq)]
pub enum CliError {
    /// Indicates that a string cannot be parsed into a [`MissingPolicy`](#missingpolicy).
    #[error("{0} is not a valid missing value policy")]
    InvalidMissingPolicy(String),

    /// Indicates that a string contains letters other than n, s, g, d and p.
    #[error("{0} is not a valid component list, use only 'n', 's', 'g', 'd', 'p'")]
    InvalidComponents(String),
}

/// Utility function to parse verbosity occurences
///
/// Up to two verbosity flags are allowed (-vv), if more
/// are specified (-vvv) the highest allowed value is returned
pub fn parse_verbosity(v: u64) -> u64 {
    match v {
        0 | 1 | 2 => v,
        _ => 2,
    }
}

/// Utility function to parse the missing value policy
fn parse_missing_policy(s: &str) -> Result<MissingPolicy, CliError> {
    match s.to_ascii_lowercase().as_str() {
        "undetermined" => Ok(MissingPolicy::Undetermined),
        "fail" => Ok(MissingPolicy::Fail),
        _ => Err(CliError::InvalidMissingPolicy(s.to_string())),
    }
}

/// Utility function to parse and validate path components
fn parse_components(s: &str) -> Result<Components, CliError> {
    if s.is_empty() {
        return Err(CliError::InvalidComponents(s.to_string()));
    }
    s.chars()
        .map(|c| match c {
            'n' => Ok(Component::Name),
            's' => Ok(Component::Stem),
            'g' => Ok(Component::GrandParent),
            'd' => Ok(Component::Parent),
            'p' => Ok(Component::Path),
            _ => Err(CliError::InvalidComponents(s.to_string())),
        })
        .collect::<Result<Vec<Component>, CliError>>()
        .map(Components)
}
