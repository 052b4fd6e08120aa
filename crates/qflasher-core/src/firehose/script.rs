//! Rawprogram script ingestion

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use crate::error::{Error, Result};

use super::command::FirehoseCommand;

/// Capacity of the command table
pub const MAX_COMMANDS: usize = 256;

const COMMAND_TAGS: [&str; 3] = ["<erase ", "<program ", "<patch "];
const CONTAINER_TAGS: [&str; 5] = ["<?xml", "<data>", "</data>", "<patches>", "</patches>"];

const COMMENT_OPEN: &str = "<!--";
const COMMENT_CLOSE: &str = "-->";

/// Removes XML comments from a stream of lines
///
/// A comment opened without a close on the same line swallows every
/// following line up to the close marker.
#[derive(Debug, Default)]
pub struct CommentStripper {
    in_comment: bool,
}

impl CommentStripper {
    /// Returns true while inside an unterminated comment
    pub fn in_comment(&self) -> bool {
        self.in_comment
    }

    /// Blank every commented span of `line`
    pub fn strip(&mut self, line: &str) -> String {
        let mut out = String::with_capacity(line.len());
        let mut rest = line;

        loop {
            if self.in_comment {
                let Some(end) = rest.find(COMMENT_CLOSE) else {
                    return out;
                };
                out.extend(std::iter::repeat(' ').take(end + COMMENT_CLOSE.len()));
                rest = &rest[end + COMMENT_CLOSE.len()..];
                self.in_comment = false;
            } else {
                let Some(start) = rest.find(COMMENT_OPEN) else {
                    out.push_str(rest);
                    return out;
                };
                out.push_str(&rest[..start]);
                out.extend(std::iter::repeat(' ').take(COMMENT_OPEN.len()));
                rest = &rest[start + COMMENT_OPEN.len()..];
                self.in_comment = true;
            }
        }
    }
}

/// Parse a rawprogram script into the command table
///
/// Only `<erase>`, `<program>` and `<patch>` tags produce commands; the XML
/// prologue and container tags are accepted and ignored. Any other tag is
/// an error.
pub fn parse_script<R: BufRead>(reader: R) -> Result<Vec<FirehoseCommand>> {
    let mut stripper = CommentStripper::default();
    let mut commands = Vec::new();
    let mut skipped = 0;

    for (idx, line) in reader.lines().enumerate() {
        let line = line?;
        let stripped = stripper.strip(&line);
        let text = stripped.trim();
        if text.is_empty() {
            continue;
        }

        let Some(start) = COMMAND_TAGS.iter().filter_map(|tag| text.find(tag)).min() else {
            if CONTAINER_TAGS.iter().any(|tag| text.starts_with(tag)) {
                continue;
            }
            log::error!("Unsupported rawprogram line {}: {}", idx + 1, text);
            return Err(Error::MalformedScript {
                line: idx + 1,
                text: text.to_string(),
            });
        };

        let fragment = &text[start..];
        let fragment = match fragment.find("/>") {
            Some(end) => &fragment[..end + 2],
            None => fragment,
        };

        match FirehoseCommand::from_script_tag(fragment)? {
            Some(cmd) => {
                if commands.len() == MAX_COMMANDS {
                    log::error!("Rawprogram script exceeds {} commands", MAX_COMMANDS);
                    return Err(Error::TooManyCommands(MAX_COMMANDS));
                }
                log::trace!("Parsed {} at line {}", cmd.kind(), idx + 1);
                commands.push(cmd);
            }
            None => skipped += 1,
        }
    }

    if stripper.in_comment() {
        log::warn!("Rawprogram script ends inside a comment");
    }
    log::debug!(
        "Parsed {} rawprogram commands, skipped {} entries",
        commands.len(),
        skipped
    );
    Ok(commands)
}

/// Load and parse a rawprogram script file
pub fn load_script(path: &Path) -> Result<Vec<FirehoseCommand>> {
    log::info!("Loading rawprogram script {}", path.display());
    let file = File::open(path).map_err(|source| {
        log::error!("Failed to open {}: {}", path.display(), source);
        Error::ImageOpen {
            path: path.to_path_buf(),
            source,
        }
    })?;
    parse_script(BufReader::new(file))
}
