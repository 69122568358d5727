use std::fmt;

use crate::table::{Table, TableError, Value};

/// A metric compared against a fixed threshold with strict less-than
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Check {
    pub column: &'static str,
    pub threshold: f64,
}

const fn check(column: &'static str, threshold: f64) -> Check {
    Check { column, threshold }
}

/// Threshold battery of one report vintage
///
/// A row passes when every positive check holds (metric below
/// its threshold) and no negative check is triggered (no metric
/// below its minimum).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Thresholds {
    pub negative: &'static [Check],
    pub positive: &'static [Check],
}

const POSITIVE_CHECKS: &[Check] = &[
    check("contamination_pct", 3.0),
    check("chimeric_rate", 5.0),
];

pub const STANDARD: Thresholds = Thresholds {
    negative: &[
        check("unique_aligned_gb", 90.0),
        check("aligned_bases_pct", 90.0),
        check("average_coverage", 30.0),
        check("per_ten_coverage_bases", 95.0),
        check("per_twenty_coverage_bases", 90.0),
        check("q20_bases", 87_000_000_000.0),
    ],
    positive: POSITIVE_CHECKS,
};

pub const HIGH_DEPTH: Thresholds = Thresholds {
    negative: &[
        check("unique_aligned_gb", 90.0),
        check("aligned_bases_pct", 90.0),
        check("average_coverage", 90.0),
        check("per_ten_coverage_bases", 95.0),
        check("per_twenty_coverage_bases", 90.0),
        check("per_sixty_coverage_bases", 95.0),
        check("per_seventy_coverage_bases", 90.0),
        check("q20_bases", 205_000_000_000.0),
    ],
    positive: POSITIVE_CHECKS,
};

/// QC verdict of a single row
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Verdict {
    Pass,
    Fail,
    /// A metric needed to decide is missing
    Undetermined,
}

impl Verdict {
    /// Cell value written to the `results` column
    ///
    /// Undetermined rows are left empty.
    pub fn to_value(self) -> Value {
        match self {
            Verdict::Pass => Value::Str("PASS".to_string()),
            Verdict::Fail => Value::Str("FAIL".to_string()),
            Verdict::Undetermined => Value::Null,
        }
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Verdict::Pass => "PASS",
            Verdict::Fail => "FAIL",
            Verdict::Undetermined => "UNDETERMINED",
        };
        write!(f, "{}", s)
    }
}

/// How undetermined verdicts are reported
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MissingPolicy {
    /// Keep the third state, written as an empty cell
    Undetermined,
    /// Treat rows with missing metrics as failing
    Fail,
}

impl Default for MissingPolicy {
    fn default() -> Self {
        MissingPolicy::Undetermined
    }
}

impl Thresholds {
    /// Decide a single row from its metric values
    ///
    /// `metric` returns the value of a named column or `None` when
    /// missing. Three-valued logic: a definite failure wins over a
    /// missing metric, a missing metric wins over a pass.
    pub fn verdict<F>(&self, mut metric: F) -> Result<Verdict, TableError>
    where
        F: FnMut(&str) -> Result<Option<f64>, TableError>,
    {
        let mut failed = false;
        let mut unknown = false;
        for c in self.negative {
            match metric(c.column)? {
                Some(x) => failed |= x < c.threshold,
                None => unknown = true,
            }
        }
        for c in self.positive {
            match metric(c.column)? {
                Some(x) => failed |= x >= c.threshold,
                None => unknown = true,
            }
        }
        Ok(if failed {
            Verdict::Fail
        } else if unknown {
            Verdict::Undetermined
        } else {
            Verdict::Pass
        })
    }
    /// Evaluate every row of a table
    ///
    /// # Errors
    ///
    /// `TableError::MissingColumn` if a checked column is absent and
    /// `TableError::NonNumeric` if a checked value is not a number
    pub fn evaluate(&self, table: &Table, policy: MissingPolicy) -> Result<Vec<Verdict>, TableError> {
        let checks: Vec<(&str, usize)> = self
            .negative
            .iter()
            .chain(self.positive.iter())
            .map(|c| Ok((c.column, table.column_index(c.column)?)))
            .collect::<Result<_, TableError>>()?;

        table
            .rows()
            .iter()
            .map(|row| {
                let verdict = self.verdict(|column| {
                    match checks.iter().find(|(name, _)| *name == column) {
                        Some((_, idx)) => row[*idx].to_f64(column),
                        None => Ok(None),
                    }
                })?;
                Ok(match (verdict, policy) {
                    (Verdict::Undetermined, MissingPolicy::Fail) => Verdict::Fail,
                    (v, _) => v,
                })
            })
            .collect()
    }
}

/// Add the `results` column to a table from its verdicts
pub fn add_results(table: &mut Table, verdicts: &[Verdict]) {
    let values = verdicts.iter().map(|v| v.to_value()).collect();
    table.set_column("results", values);
}
