use anyhow::{Context, Result};
use std::io::stdout;
use structopt::StructOpt;

mod cli;
mod qc;
mod report;
mod table;
mod textutils;
mod utils;
mod workbook;

use crate::cli::{Cli, Command, ReportOpts};
use crate::report::QcReport;
use crate::utils::QcSummary;

/// pmutils application
///
/// Run the application from arguments provided
/// by the command line interface
fn main() -> Result<()> {
    let cli: Cli = Cli::from_args();

    match cli.command {
        Command::MergedQc(args) => {
            let report = report::run_merged_qc(&args.merge_report, &args.output, args.opts.missing)
                .with_context(|| format!("failed to create QC report {}", args.output.display()))?;
            summarize(&report, &args.opts)?;
        }
        Command::Report90x(args) => {
            let report = report::run_90x(
                &args.merge_report,
                &args.metrics_90x,
                &args.output,
                args.opts.missing,
            )
            .with_context(|| format!("failed to create 90x QC report {}", args.output.display()))?;
            summarize(&report, &args.opts)?;
        }
        Command::ExemplarInput(args) => {
            println!("{}", textutils::exemplar_input_string(&args.inp_dump));
        }
        Command::PathComponents(args) => {
            let stdout = stdout();
            textutils::write_path_components(&args.file, &args.components.0, stdout.lock())
                .with_context(|| format!("failed to split paths from {}", args.file.display()))?;
        }
    }

    Ok(())
}

/// Report the run summary after the output workbook was written
fn summarize(report: &QcReport, opts: &ReportOpts) -> Result<()> {
    let summary = QcSummary::from_report(report);
    summary.warn_undetermined();
    summary.summary(opts.verbose)?;
    if let Some(path) = &opts.report {
        summary
            .write_json(path)
            .with_context(|| format!("failed to write summary report {}", path.display()))?;
    }
    Ok(())
}
