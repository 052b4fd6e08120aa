//! Firehose XML flashing protocol
//!
//! The programmer loaded over Sahara speaks Firehose: the host sends small
//! XML documents (`<configure>`, `<erase>`, `<program>`, `<power>`) and the
//! target answers with `<response>` documents, interleaved with `<log>`
//! messages. Program commands switch the pipe into raw mode, during which the
//! host streams the image data.
//!
//! A session is driven from a rawprogram script:
//!
//! 1. configure, renegotiating the payload size once if the target asks
//! 2. every erase entry, in script order
//! 3. every program entry starting at sector 0, after checking its file
//! 4. reset

mod command;
mod response;
mod script;
mod session;
pub mod xml;

pub use command::{
    resolve_path, ConfigureCommand, EraseCommand, FirehoseCommand, PatchCommand,
    ProgramCommand, ResponseCommand, ResponseValue, MAX_COMMAND_LEN, MAX_FRAGMENT_LEN,
    PATCH_TARGET_DISK,
};
pub use response::parse_messages;
pub use script::{load_script, parse_script, CommentStripper, MAX_COMMANDS};
pub use session::{FirehoseReport, FirehoseSession, DEFAULT_MAX_PAYLOAD_SIZE};
