use std::path::Path;
use thiserror::Error;

use crate::qc::{self, MissingPolicy, Thresholds, Verdict};
use crate::table::{outer_join, JoinStats, Table, TableError, Value};
use crate::workbook::{self, WorkbookError};

/// A collection of custom errors relating to building QC reports.
#[derive(Error, Debug)]
pub enum ReportError {
    /// Indicates a merge name with fewer than four underscore-delimited fields
    #[error("malformed merge name '{0}': expected at least 4 '_' delimited fields")]
    MalformedIdentifier(String),

    #[error(transparent)]
    Table(#[from] TableError),

    #[error(transparent)]
    Workbook(#[from] WorkbookError),
}

pub const MERGE_REPORT_SHEET: &str = "table ref";
pub const METRICS_90X_SHEET: &str = "_90x";
pub const TAB3_SHEET: &str = "tab3";
pub const TMQC_SHEET: &str = "tm_qc";

/// Columns kept from the LIMS merge report
pub const MERGE_REPORT_COLUMNS: &[&str] = &[
    "merge_name",
    "merge_finished_date",
    "results_path",
    "unique_aligned_bases",
    "duplicate_bases",
    "aligned_bases_pct",
    "average_coverage",
    "chimeric_rate",
    "per_ten_coverage_bases",
    "per_twenty_coverage_bases",
    "q20_bases",
    "contamination_rate",
    "mean_insert_size",
    "pf_hq_aligned_q20_bases",
    "wgs_het_snp_q",
    "wgs_het_snp_sensitivity",
];

/// Columns kept from the R&D 90x metrics
pub const METRICS_90X_COLUMNS: &[&str] = &[
    "sample_id",
    "samples",
    "per_sixty_coverage_bases",
    "per_seventy_coverage_bases",
];

/// Weekly production metrics
pub const TAB3_COLUMNS: &[&str] = &[
    "sample_id",
    "collection",
    "pf_hq_aligned_q20_bases",
    "mean_insert_size",
    "average_coverage",
    "wgs_het_snp_q",
    "wgs_het_snp_sensitivity",
    "per_ten_coverage_bases",
    "per_twenty_coverage_bases",
    "q20_bases",
    "contamination_pct",
];

pub const TMQC_COLUMNS: &[&str] = &[
    "sample_id",
    "collection",
    "pf_hq_aligned_q20_bases",
    "mean_insert_size",
    "average_coverage",
    "wgs_het_snp_q",
    "wgs_het_snp_sensitivity",
    "per_ten_coverage_bases",
    "per_twenty_coverage_bases",
    "q20_bases",
    "contamination_pct",
    // internal qc only
    "unique_aligned_gb",
    "aligned_bases_pct",
    "chimeric_rate",
    "merge_name",
    "merge_finished_date",
    "results_path",
    "results",
];

pub const TMQC_90X_COLUMNS: &[&str] = &[
    "sample_id",
    "collection",
    "pf_hq_aligned_q20_bases",
    "mean_insert_size",
    "average_coverage",
    "wgs_het_snp_q",
    "wgs_het_snp_sensitivity",
    "per_ten_coverage_bases",
    "per_twenty_coverage_bases",
    "per_sixty_coverage_bases",
    "per_seventy_coverage_bases",
    "q20_bases",
    "contamination_pct",
    // internal qc only
    "unique_aligned_gb",
    "aligned_bases_pct",
    "chimeric_rate",
    "merge_name",
    "merge_finished_date",
    "results_path",
    "results",
];

/// Merge name abbreviation to study or cohort name
pub const COLLECTIONS: &[(&str, &str)] = &[
    ("Legacy", "TOPMed Control"),
    ("TMHASC", "Harvard SCD"),
    ("TMCGVC", "Causal Genetic Variants of Cardiomyopathy"),
    ("TMGCUC", "Genetic Causes of Unexplained Cardiomyopathies"),
    ("TMREDS", "Sickle Cell Disease REDS III"),
];

/// Look up the collection name of an abbreviation, exact match only
pub fn lookup_collection(abbrev: &str) -> Option<&'static str> {
    COLLECTIONS
        .iter()
        .find(|(a, _)| *a == abbrev)
        .map(|(_, name)| *name)
}

/// Fields embedded in a merge name
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MergeName<'a> {
    pub collection: &'a str,
    pub sample_id: &'a str,
}

/// Split a merge name into its collection abbreviation (field 2)
/// and sample id (field 3)
///
/// # Example
///
/// ```compile
/// let name = decode_merge_name("PROJ_X_TMHASC_SAMPLE007_extra")?;
/// assert_eq!(name.collection, "TMHASC");
/// assert_eq!(name.sample_id, "SAMPLE007");
/// ```
pub fn decode_merge_name(merge_name: &str) -> Result<MergeName<'_>, ReportError> {
    let mut fields = merge_name.split('_').skip(2);
    match (fields.next(), fields.next()) {
        (Some(collection), Some(sample_id)) => Ok(MergeName {
            collection,
            sample_id,
        }),
        _ => Err(ReportError::MalformedIdentifier(merge_name.to_string())),
    }
}

/// Report vintage, selecting thresholds and the tm_qc layout
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportKind {
    Standard,
    HighDepth,
}

impl ReportKind {
    pub fn name(self) -> &'static str {
        match self {
            ReportKind::Standard => "standard",
            ReportKind::HighDepth => "90x",
        }
    }

    pub fn thresholds(self) -> &'static Thresholds {
        match self {
            ReportKind::Standard => &qc::STANDARD,
            ReportKind::HighDepth => &qc::HIGH_DEPTH,
        }
    }

    pub fn tmqc_columns(self) -> &'static [&'static str] {
        match self {
            ReportKind::Standard => TMQC_COLUMNS,
            ReportKind::HighDepth => TMQC_90X_COLUMNS,
        }
    }
}

/// Load the LIMS merge report
///
/// Headers are normalized, the merge report columns are selected
/// and `collection`, `sample_id`, `contamination_pct` and
/// `unique_aligned_gb` are derived.
///
/// # Errors
///
/// Missing sheet or columns, unreadable file, malformed merge names
/// and non-numeric metrics all abort the load
pub fn load_merge_report(path: &Path) -> Result<Table, ReportError> {
    let mut rtm = workbook::read_sheet(path, MERGE_REPORT_SHEET)?;
    rtm.normalize_headers();

    let mut rtm_sub = rtm.select(MERGE_REPORT_COLUMNS)?;
    derive_merge_name_columns(&mut rtm_sub)?;
    rtm_sub.derive_numeric("contamination_rate", "contamination_pct", |x| x * 100.0)?;
    rtm_sub.derive_numeric("unique_aligned_bases", "unique_aligned_gb", |x| {
        x / 1_000_000_000.0
    })?;
    Ok(rtm_sub)
}

/// Add `collection` and `sample_id` columns decoded from `merge_name`
///
/// Unknown abbreviations give a null collection, the row is kept.
pub fn derive_merge_name_columns(table: &mut Table) -> Result<(), ReportError> {
    let mut collections = Vec::with_capacity(table.len());
    let mut sample_ids = Vec::with_capacity(table.len());

    for value in table.column("merge_name")? {
        let text = match value {
            Value::Str(s) => s.as_str(),
            Value::Null => "",
            other => return Err(ReportError::MalformedIdentifier(other.to_string())),
        };
        let name = decode_merge_name(text)?;
        collections.push(
            lookup_collection(name.collection).map_or(Value::Null, |c| Value::Str(c.to_string())),
        );
        sample_ids.push(Value::Str(name.sample_id.to_string()));
    }

    table.set_column("collection", collections);
    table.set_column("sample_id", sample_ids);
    Ok(())
}

/// Load the R&D 90x metrics
///
/// Coverage fractions are converted to percentages before
/// the 90x columns are selected.
pub fn load_metrics_90x(path: &Path) -> Result<Table, ReportError> {
    let mut nm = workbook::read_sheet(path, METRICS_90X_SHEET)?;
    nm.normalize_headers();
    nm.derive_numeric("pct_of_bases_with_60x_coverage", "per_sixty_coverage_bases", |x| {
        x * 100.0
    })?;
    nm.derive_numeric("pct_of_bases_with_70x_coverage", "per_seventy_coverage_bases", |x| {
        x * 100.0
    })?;
    Ok(nm.select(METRICS_90X_COLUMNS)?)
}

/// Evaluated QC table
///
/// The table carries the `results` column, `verdicts` holds
/// the same verdicts row by row.
#[derive(Debug, Clone)]
pub struct QcReport {
    pub kind: ReportKind,
    pub table: Table,
    pub verdicts: Vec<Verdict>,
    pub join: Option<JoinStats>,
}

impl QcReport {
    /// Project the tab3 and tm_qc sheets
    pub fn views(&self) -> Result<(Table, Table), ReportError> {
        let tab3 = self.table.select(TAB3_COLUMNS)?;
        let tmqc = self.table.select(self.kind.tmqc_columns())?;
        Ok((tab3, tmqc))
    }
}

/// Add QC results `PASS` or `FAIL` to a loaded table
pub fn qc_results(mut table: Table, kind: ReportKind, policy: MissingPolicy) -> Result<QcReport, ReportError> {
    let verdicts = kind.thresholds().evaluate(&table, policy)?;
    qc::add_results(&mut table, &verdicts);
    Ok(QcReport {
        kind,
        table,
        verdicts,
        join: None,
    })
}

/// Outer join merge report and 90x metrics on `sample_id`
/// and evaluate with the high-depth thresholds
pub fn merge_qc_results(rtm_sub: &Table, nm_sub: &Table, policy: MissingPolicy) -> Result<QcReport, ReportError> {
    let (merged, stats) = outer_join(rtm_sub, nm_sub, "sample_id")?;
    let mut report = qc_results(merged, ReportKind::HighDepth, policy)?;
    report.join = Some(stats);
    Ok(report)
}

/// Write the tab3 and tm_qc sheets, replacing any existing file
pub fn output_results(output: &Path, tab3: &Table, tmqc: &Table) -> Result<(), ReportError> {
    workbook::write_sheets(output, &[(TAB3_SHEET, tab3), (TMQC_SHEET, tmqc)])?;
    Ok(())
}

/// Standard QC report from a single merge report
///
/// Nothing is written unless every step before it succeeded.
pub fn run_merged_qc(merge_report: &Path, output: &Path, policy: MissingPolicy) -> Result<QcReport, ReportError> {
    let rtm_sub = load_merge_report(merge_report)?;
    let report = qc_results(rtm_sub, ReportKind::Standard, policy)?;
    let (tab3, tmqc) = report.views()?;
    output_results(output, &tab3, &tmqc)?;
    Ok(report)
}

/// High-depth QC report from a merge report and 90x metrics
pub fn run_90x(
    merge_report: &Path,
    metrics_90x: &Path,
    output: &Path,
    policy: MissingPolicy,
) -> Result<QcReport, ReportError> {
    let rtm_sub = load_merge_report(merge_report)?;
    let nm_sub = load_metrics_90x(metrics_90x)?;
    let report = merge_qc_results(&rtm_sub, &nm_sub, policy)?;
    let (tab3, tmqc) = report.views()?;
    output_results(output, &tab3, &tmqc)?;
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use float_eq::assert_float_eq;
    use tempfile::tempdir;

    const MERGE_REPORT_HEADERS: [&str; 16] = [
        "Merge Name",
        "Merge Finished Date",
        "Results Path",
        "Unique Aligned Bases",
        "Duplicate Bases",
        "Aligned Bases Pct",
        "Average Coverage",
        "Chimeric Rate",
        "Per Ten Coverage Bases",
        "Per Twenty Coverage Bases",
        "Q20 Bases",
        "Contamination Rate",
        "Mean Insert Size",
        "PF HQ Aligned Q20 Bases",
        "WGS Het SNP Q",
        "WGS Het SNP Sensitivity",
    ];

    fn s(v: &str) -> Value {
        Value::Str(v.to_string())
    }

    fn merge_report_row(merge_name: &str, contamination_rate: f64) -> Vec<Value> {
        vec![
            s(merge_name),
            Value::Date(45200.5),
            s("/results/path"),
            Value::Float(95_000_000_000.0),
            Value::Float(1_000_000.0),
            Value::Float(95.0),
            Value::Float(35.0),
            Value::Float(1.0),
            Value::Float(96.0),
            Value::Float(91.0),
            Value::Float(90_000_000_000.0),
            Value::Float(contamination_rate),
            Value::Float(420.0),
            Value::Float(88_000_000_000.0),
            Value::Float(50.0),
            Value::Float(0.97),
        ]
    }

    fn write_merge_report(path: &Path, headers: &[&str], rows: Vec<Vec<Value>>) {
        let mut t = Table::new(headers.iter().map(|h| h.to_string()).collect());
        for row in rows {
            t.push_row(row);
        }
        workbook::write_sheets(path, &[(MERGE_REPORT_SHEET, &t)]).unwrap();
    }

    #[test]
    fn decode_merge_name_fields() {
        let name = decode_merge_name("PROJ_X_TMHASC_SAMPLE007_extra").unwrap();
        assert_eq!(name.collection, "TMHASC");
        assert_eq!(name.sample_id, "SAMPLE007");
        assert_eq!(lookup_collection(name.collection), Some("Harvard SCD"));
    }

    #[test]
    fn decode_merge_name_exactly_four_fields() {
        let name = decode_merge_name("a_b_Legacy_S1").unwrap();
        assert_eq!(name.sample_id, "S1");
        assert_eq!(lookup_collection(name.collection), Some("TOPMed Control"));
    }

    #[test]
    fn decode_merge_name_too_short() {
        for bad in ["PROJ_X_TMHASC", "", "no-underscores"].iter() {
            assert!(matches!(
                decode_merge_name(bad),
                Err(ReportError::MalformedIdentifier(ref m)) if m == bad
            ));
        }
    }

    #[test]
    fn unknown_collection_is_null() {
        assert_eq!(lookup_collection("ZZZZZZ"), None);
        assert_eq!(lookup_collection("tmhasc"), None);

        let mut t = Table::new(vec!["merge_name".to_string()]);
        t.push_row(vec![s("P_X_ZZZZZZ_S9")]);
        derive_merge_name_columns(&mut t).unwrap();
        assert_eq!(t.len(), 1);
        assert_eq!(t.get(0, "collection").unwrap(), &Value::Null);
        assert_eq!(t.get(0, "sample_id").unwrap(), &s("S9"));
    }

    #[test]
    fn null_merge_name_is_malformed() {
        let mut t = Table::new(vec!["merge_name".to_string(), "x".to_string()]);
        t.push_row(vec![Value::Null, s("x")]);
        assert!(matches!(
            derive_merge_name_columns(&mut t),
            Err(ReportError::MalformedIdentifier(_))
        ));
    }

    #[test]
    fn numeric_merge_name_is_reported_as_cell_text() {
        let mut t = Table::new(vec!["merge_name".to_string()]);
        t.push_row(vec![Value::Int(5)]);
        let err = derive_merge_name_columns(&mut t).unwrap_err();
        assert!(matches!(err, ReportError::MalformedIdentifier(ref m) if m == "5"));
        assert_eq!(
            err.to_string(),
            "malformed merge name '5': expected at least 4 '_' delimited fields"
        );
    }

    #[test]
    fn load_merge_report_derives_columns() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("merge.xlsx");
        write_merge_report(
            &path,
            &MERGE_REPORT_HEADERS,
            vec![merge_report_row("PROJ_X_TMHASC_SAMPLE007_extra", 0.02)],
        );

        let t = load_merge_report(&path).unwrap();
        assert_eq!(t.get(0, "sample_id").unwrap(), &s("SAMPLE007"));
        assert_eq!(t.get(0, "collection").unwrap(), &s("Harvard SCD"));
        match t.get(0, "contamination_pct").unwrap() {
            Value::Float(f) => assert_float_eq!(*f, 0.02 * 100.0, ulps <= 0),
            other => panic!("unexpected {:?}", other),
        }
        match t.get(0, "unique_aligned_gb").unwrap() {
            Value::Float(f) => assert_float_eq!(*f, 95_000_000_000.0 / 1_000_000_000.0, ulps <= 0),
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(t.get(0, "merge_finished_date").unwrap(), &Value::Date(45200.5));
    }

    #[test]
    fn load_merge_report_missing_column() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("merge.xlsx");
        let headers: Vec<&str> = MERGE_REPORT_HEADERS
            .iter()
            .copied()
            .filter(|h| *h != "Average Coverage")
            .collect();
        let mut row = merge_report_row("P_X_TMHASC_S1", 0.01);
        row.remove(6);
        write_merge_report(&path, &headers, vec![row]);

        match load_merge_report(&path) {
            Err(ReportError::Table(TableError::MissingColumn { column })) => {
                assert_eq!(column, "average_coverage")
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn load_merge_report_missing_sheet() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("merge.xlsx");
        let t = Table::new(vec!["Merge Name".to_string()]);
        workbook::write_sheets(&path, &[("Sheet1", &t)]).unwrap();
        assert!(matches!(
            load_merge_report(&path),
            Err(ReportError::Workbook(WorkbookError::MissingSheet { .. }))
        ));
    }

    #[test]
    fn standard_scenarios() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("merge.xlsx");
        write_merge_report(
            &path,
            &MERGE_REPORT_HEADERS,
            vec![
                merge_report_row("P_X_TMHASC_PASS1", 0.02),
                merge_report_row("P_X_TMHASC_FAIL1", 0.04),
                merge_report_row("P_X_ZZZZZZ_PASS2", 0.01),
            ],
        );
        let rtm = load_merge_report(&path).unwrap();
        let report = qc_results(rtm, ReportKind::Standard, MissingPolicy::default()).unwrap();

        assert_eq!(report.verdicts, vec![Verdict::Pass, Verdict::Fail, Verdict::Pass]);
        assert_eq!(report.table.get(0, "results").unwrap(), &s("PASS"));
        assert_eq!(report.table.get(1, "results").unwrap(), &s("FAIL"));
        assert_eq!(report.table.get(2, "collection").unwrap(), &Value::Null);

        let (tab3, tmqc) = report.views().unwrap();
        assert_eq!(tab3.columns().len(), TAB3_COLUMNS.len());
        assert_eq!(tmqc.columns().last().map(String::as_str), Some("results"));
        assert_eq!(tmqc.len(), 3);
    }

    #[test]
    fn merge_with_90x_metrics() {
        let mut rtm = Table::new(vec!["merge_name".to_string()]);
        rtm.push_row(vec![s("P_X_TMREDS_S1")]);
        rtm.push_row(vec![s("P_X_TMREDS_S2")]);
        derive_merge_name_columns(&mut rtm).unwrap();
        for (column, value) in [
            ("unique_aligned_gb", 100.0),
            ("aligned_bases_pct", 95.0),
            ("average_coverage", 95.0),
            ("per_ten_coverage_bases", 99.0),
            ("per_twenty_coverage_bases", 98.0),
            ("q20_bases", 210_000_000_000.0),
            ("contamination_pct", 1.0),
            ("chimeric_rate", 1.0),
        ]
        .iter()
        {
            rtm.set_column(column, vec![Value::Float(*value); 2]);
        }

        let mut nm = Table::new(METRICS_90X_COLUMNS.iter().map(|c| c.to_string()).collect());
        nm.push_row(vec![s("S1"), s("1"), Value::Float(96.0), Value::Float(91.0)]);
        nm.push_row(vec![s("S3"), s("1"), Value::Float(96.0), Value::Float(91.0)]);

        let report = merge_qc_results(&rtm, &nm, MissingPolicy::Undetermined).unwrap();
        assert_eq!(report.table.len(), 3);
        assert_eq!(
            report.join,
            Some(JoinStats {
                matched: 1,
                left_only: 1,
                right_only: 1
            })
        );
        assert_eq!(
            report.verdicts,
            vec![Verdict::Pass, Verdict::Undetermined, Verdict::Undetermined]
        );
        assert_eq!(report.table.get(2, "sample_id").unwrap(), &s("S3"));
        assert_eq!(report.table.get(1, "results").unwrap(), &Value::Null);
    }

    #[test]
    fn load_metrics_90x_converts_fractions() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("90x.xlsx");
        let mut t = Table::new(
            ["Sample ID", "Samples", "PCT of bases with 60x coverage", "PCT of bases with 70x coverage"]
                .iter()
                .map(|h| h.to_string())
                .collect(),
        );
        t.push_row(vec![s("S1"), s("S1-a"), Value::Float(0.96), Value::Float(0.5)]);
        workbook::write_sheets(&path, &[(METRICS_90X_SHEET, &t)]).unwrap();

        let nm = load_metrics_90x(&path).unwrap();
        assert_eq!(nm.columns().len(), METRICS_90X_COLUMNS.len());
        match nm.get(0, "per_sixty_coverage_bases").unwrap() {
            Value::Float(f) => assert_float_eq!(*f, 96.0, abs <= 1e-9),
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(nm.get(0, "per_seventy_coverage_bases").unwrap(), &Value::Float(50.0));
    }

    #[test]
    fn failed_load_writes_nothing() {
        let dir = tempdir().unwrap();
        let input = dir.path().join("merge.xlsx");
        let output = dir.path().join("out.xlsx");
        write_merge_report(
            &input,
            &MERGE_REPORT_HEADERS,
            vec![merge_report_row("too_short", 0.01)],
        );

        assert!(matches!(
            run_merged_qc(&input, &output, MissingPolicy::default()),
            Err(ReportError::MalformedIdentifier(_))
        ));
        assert!(!output.exists());
    }

    #[test]
    fn run_merged_qc_writes_two_sheets() {
        let dir = tempdir().unwrap();
        let input = dir.path().join("merge.xlsx");
        let output = dir.path().join("out.xlsx");
        write_merge_report(
            &input,
            &MERGE_REPORT_HEADERS,
            vec![merge_report_row("P_X_TMCGVC_S1", 0.01)],
        );

        let report = run_merged_qc(&input, &output, MissingPolicy::default()).unwrap();
        assert_eq!(report.verdicts, vec![Verdict::Pass]);

        let tab3 = workbook::read_sheet(&output, TAB3_SHEET).unwrap();
        let tmqc = workbook::read_sheet(&output, TMQC_SHEET).unwrap();
        assert_eq!(tab3.columns(), TAB3_COLUMNS);
        assert_eq!(tmqc.columns(), TMQC_COLUMNS);
        assert_eq!(tmqc.get(0, "results").unwrap(), &s("PASS"));
        assert_eq!(
            tab3.get(0, "collection").unwrap(),
            &s("Causal Genetic Variants of Cardiomyopathy")
        );
    }
}
