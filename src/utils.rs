use indoc::eprintdoc;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fs::File;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::qc::Verdict;
use crate::report::QcReport;
use crate::table::{JoinStats, Value};

/// A collection of custom errors relating to the utility components for this package.
#[derive(Error, Debug)]
pub enum UtilityError {
    /// Indicates an invalid verbosity for summary output
    #[error("{0} is not a valid level of verbosity")]
    InvalidVerbosity(String),

    /// Indicates that the summary report file could not be created
    #[error("failed to create summary report {path}")]
    ReportFile {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Indicates that the summary could not be serialized
    #[error("failed to write summary report")]
    Serialize(#[from] serde_json::Error),
}

const UNKNOWN_COLLECTION: &str = "(unknown)";
const METRICS_ONLY: &str = "(90x metrics only)";

/// Verdict counts
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct VerdictCounts {
    pub pass: usize,
    pub fail: usize,
    pub undetermined: usize,
}

impl VerdictCounts {
    fn add(&mut self, verdict: Verdict) {
        match verdict {
            Verdict::Pass => self.pass += 1,
            Verdict::Fail => self.fail += 1,
            Verdict::Undetermined => self.undetermined += 1,
        }
    }
}

/// Create a QC summary object
///
/// Rows without a known collection are counted under
/// `(unknown)` when they come from the merge report and
/// under `(90x metrics only)` when they only exist in
/// the 90x metrics.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QcSummary {
    pub report: &'static str,
    pub samples: usize,
    #[serde(flatten)]
    pub verdicts: VerdictCounts,
    pub unknown_collections: usize,
    pub collections: BTreeMap<String, VerdictCounts>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub join: Option<JoinStats>,
}

impl QcSummary {
    pub fn from_report(report: &QcReport) -> Self {
        let mut verdicts = VerdictCounts::default();
        let mut by_collection: BTreeMap<String, VerdictCounts> = BTreeMap::new();
        let mut unknown_collections = 0;

        for (i, verdict) in report.verdicts.iter().enumerate() {
            verdicts.add(*verdict);

            let collection = report.table.get(i, "collection").ok().and_then(Value::as_str);
            let from_merge_report = report
                .table
                .get(i, "merge_name")
                .map_or(false, |v| !v.is_null());
            let key = match collection {
                Some(name) => name,
                None if from_merge_report => {
                    unknown_collections += 1;
                    UNKNOWN_COLLECTION
                }
                None => METRICS_ONLY,
            };
            by_collection.entry(key.to_string()).or_default().add(*verdict);
        }

        QcSummary {
            report: report.kind.name(),
            samples: report.verdicts.len(),
            verdicts,
            unknown_collections,
            collections: by_collection,
            join: report.join,
        }
    }
    /// Print a summary of the QC run to stderr
    ///
    /// * `verbosity` - detail of summary message
    ///     * 0: no summary
    ///     * 1: verdict counts and join statistics
    ///     * 2: add verdict counts per collection
    pub fn summary(&self, verbosity: u64) -> Result<(), UtilityError> {
        match verbosity {
            0 => Ok(()),
            1 | 2 => {
                eprintdoc! {"\n
                    QC Report Summary
                    =================

                    Report:               {report}
                    Samples:              {samples}
                    PASS:                 {pass}
                    FAIL:                 {fail}
                    UNDETERMINED:         {undetermined}
                    Unknown collection:   {unknown}
                    ",
                    report = self.report,
                    samples = self.samples,
                    pass = self.verdicts.pass,
                    fail = self.verdicts.fail,
                    undetermined = self.verdicts.undetermined,
                    unknown = self.unknown_collections,
                }
                if let Some(join) = self.join {
                    eprintdoc! {"
                        Matched samples:      {matched}
                        Merge report only:    {left}
                        90x metrics only:     {right}
                        ",
                        matched = join.matched,
                        left = join.left_only,
                        right = join.right_only,
                    }
                }
                if verbosity > 1 {
                    self.print_collections();
                }
                eprintln!();
                Ok(())
            }
            _ => Err(UtilityError::InvalidVerbosity(verbosity.to_string())),
        }
    }

    fn print_collections(&self) {
        eprintdoc! {"\n
            {name:<48} {pass:>6} {fail:>6} {undet:>6}
            ",
            name = "Collection",
            pass = "PASS",
            fail = "FAIL",
            undet = "UNDET",
        }
        for (name, counts) in self.collections.iter() {
            eprintln!(
                "{:<48} {:>6} {:>6} {:>6}",
                name, counts.pass, counts.fail, counts.undetermined
            );
        }
    }
    /// Warn on stderr when some rows could not be decided
    pub fn warn_undetermined(&self) {
        if self.verdicts.undetermined > 0 {
            eprintln!(
                "Warning: {} of {} rows have missing metrics and an undetermined QC result",
                self.verdicts.undetermined, self.samples
            );
        }
    }
    /// Write the summary as pretty JSON
    pub fn write_json(&self, path: &Path) -> Result<(), UtilityError> {
        let file = File::create(path).map_err(|source| UtilityError::ReportFile {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::to_writer_pretty(file, self)?;
        Ok(())
    }
}
