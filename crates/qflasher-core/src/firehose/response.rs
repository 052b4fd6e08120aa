//! Parsing of messages received from the Firehose target
//!
//! One bulk read may carry several XML documents back to back, each holding
//! `<response>` or `<log>` elements.

use super::command::FirehoseCommand;

const DOCUMENT_START: &str = "<?xml version=";
const ELEMENT_TAGS: [&str; 2] = ["<response ", "<log "];

/// Split received bytes into target messages
///
/// Each document is parsed on its own. Documents that are truncated or carry
/// no recognised element are logged and skipped; the messages of every
/// other document in the buffer are kept.
pub fn parse_messages(buf: &[u8]) -> Vec<FirehoseCommand> {
    let text = String::from_utf8_lossy(buf);
    let text = text.trim_end_matches('\0');

    let mut messages = Vec::new();
    for doc in text.split(DOCUMENT_START).map(str::trim) {
        if doc.is_empty() {
            continue;
        }
        match parse_document(doc) {
            Some(found) => messages.extend(found),
            None => log::warn!("Skipping unreadable target message: {}", doc),
        }
    }
    messages
}

/// Elements of one document, or `None` when it holds nothing usable
fn parse_document(doc: &str) -> Option<Vec<FirehoseCommand>> {
    let mut found = Vec::new();
    let mut rest = doc;
    while let Some(start) = ELEMENT_TAGS.iter().filter_map(|tag| rest.find(tag)).min() {
        let element = &rest[start..];
        let Some(end) = element.find("/>").map(|e| e + 2) else {
            log::debug!("Unterminated element: {}", element);
            break;
        };
        match FirehoseCommand::from_target_element(&element[..end]) {
            Ok(cmd) => found.push(cmd),
            Err(e) => log::debug!("Skipping element: {}", e),
        }
        rest = &element[end..];
    }

    if found.is_empty() {
        None
    } else {
        Some(found)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::firehose::command::{ResponseCommand, ResponseValue};

    fn doc(body: &str) -> String {
        format!(
            "<?xml version=\"1.0\" encoding=\"UTF-8\" ?>\n<data>\n{}\n</data>",
            body
        )
    }

    fn ack() -> String {
        doc(r#"<response value="ACK" rawmode="false" />"#)
    }

    #[test]
    fn test_single_response() {
        let buf = doc(r#"<response value="ACK" rawmode="true" />"#);
        let msgs = parse_messages(buf.as_bytes());
        assert_eq!(
            msgs,
            vec![FirehoseCommand::Response(ResponseCommand {
                value: ResponseValue::Ack,
                raw_mode: true,
                max_payload_size_to_target: None,
            })]
        );
    }

    #[test]
    fn test_logs_then_response() {
        let buf = format!(
            "{}{}{}",
            doc(r#"<log value="INFO: Calling handler for configure" />"#),
            doc(r#"<log value="INFO: Storage type set to value NAND" />"#),
            doc(concat!(
                r#"<response value="ACK" MinVersionSupported="1" "#,
                r#"MaxPayloadSizeToTargetInBytes="8192" />"#
            ))
        );
        let msgs = parse_messages(buf.as_bytes());
        assert_eq!(msgs.len(), 3);
        assert_eq!(msgs[0].kind(), "log");
        assert_eq!(msgs[1].kind(), "log");
        let FirehoseCommand::Response(r) = &msgs[2] else {
            panic!("expected response");
        };
        assert!(r.is_ack());
        assert_eq!(r.max_payload_size_to_target, Some(8192));
    }

    #[test]
    fn test_trailing_nuls_ignored() {
        let mut buf = doc(r#"<response value="NAK" />"#).into_bytes();
        buf.extend_from_slice(&[0u8; 32]);
        assert_eq!(parse_messages(&buf).len(), 1);
    }

    #[test]
    fn test_unknown_document_skipped() {
        assert!(parse_messages(doc("<getsha256digest />").as_bytes()).is_empty());
    }

    #[test]
    fn test_response_kept_before_truncated_log() {
        let buf = format!(
            "{}<?xml version=\"1.0\" ?>\n<data>\n<log value=\"INFO: partial",
            ack()
        );
        let msgs = parse_messages(buf.as_bytes());
        assert_eq!(msgs.len(), 1);
        assert_eq!(msgs[0].kind(), "response");
    }

    #[test]
    fn test_response_kept_around_unknown_document() {
        let buf = format!("{}{}{}", ack(), doc("<getsha256digest />"), ack());
        let msgs = parse_messages(buf.as_bytes());
        assert_eq!(msgs.len(), 2);
        assert!(msgs.iter().all(|m| m.kind() == "response"));
    }

    #[test]
    fn test_empty() {
        assert!(parse_messages(b"").is_empty());
    }
}
