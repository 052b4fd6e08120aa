//! Command implementations

pub mod firehose;
pub mod flash;
pub mod mode;
pub mod parse;
#[cfg(feature = "gpio")]
pub mod reset;

use qflasher_core::firehose::FirehoseReport;

/// Print the outcome of a Firehose run
fn print_report(report: &FirehoseReport) {
    println!(
        "Erased {} partitions, programmed {} images",
        report.erased, report.programmed
    );
    if report.patches_ignored > 0 {
        println!("Ignored {} patch entries", report.patches_ignored);
    }
    if !report.is_clean() {
        println!(
            "WARNING: {} erase and {} program commands failed",
            report.erase_failed, report.program_failed
        );
    }
}
