//! Script dry run

use std::io::Write;
use std::path::Path;

use qflasher_core::firehose::{load_script, FirehoseCommand};

/// Totals of a dry run
#[derive(Debug, Default, PartialEq, Eq)]
pub struct ParseSummary {
    pub erases: usize,
    pub programs: usize,
    pub invalid_programs: usize,
    pub patches: usize,
}

/// Parse `script` and print its command table
///
/// Program entries that would be sent are validated against the files next
/// to the script, the same way a live run does.
pub fn run_parse(script: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let mut commands = load_script(script)?;
    let dir = script.parent().unwrap_or(Path::new("."));

    let stdout = std::io::stdout();
    let summary = describe(&mut commands, dir, &mut stdout.lock())?;
    println!(
        "\n{} commands: {} erase, {} program ({} invalid), {} patch",
        commands.len(),
        summary.erases,
        summary.programs,
        summary.invalid_programs,
        summary.patches
    );
    if summary.invalid_programs > 0 {
        return Err(format!(
            "{} program entries failed validation",
            summary.invalid_programs
        )
        .into());
    }
    Ok(())
}

/// Validate program entries and write one line per command
pub fn describe<W: Write>(
    commands: &mut [FirehoseCommand],
    dir: &Path,
    out: &mut W,
) -> std::io::Result<ParseSummary> {
    let mut summary = ParseSummary::default();

    for (idx, cmd) in commands.iter_mut().enumerate() {
        match cmd {
            FirehoseCommand::Erase(erase) => {
                summary.erases += 1;
                writeln!(out, "{:3}: {}", idx, erase.xml)?;
            }
            FirehoseCommand::Program(program) if program.start_sector == Some(0) => {
                summary.programs += 1;
                match program.validate(dir) {
                    Ok(_) => writeln!(out, "{:3}: {}", idx, program.xml)?,
                    Err(e) => {
                        summary.invalid_programs += 1;
                        writeln!(out, "{:3}: {} [invalid: {}]", idx, program.xml, e)?;
                    }
                }
            }
            FirehoseCommand::Program(program) => {
                writeln!(out, "{:3}: {} [continuation, not sent]", idx, program.xml)?;
            }
            FirehoseCommand::Patch(patch) => {
                summary.patches += 1;
                writeln!(out, "{:3}: {} [ignored]", idx, patch.xml)?;
            }
            other => writeln!(out, "{:3}: {}", idx, other.to_xml())?,
        }
    }
    Ok(summary)
}
