//! Reader cursors (§3, §6): `{file_name, offset}`, persisted as
//! `reader_state_<queueName>_<readerName>.json`, except for ephemeral
//! (`ws_`-prefixed) readers which never touch disk.

use serde::{Deserialize, Serialize};

/// A reader's position: which log file, and the byte offset into it.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ReaderState {
    #[serde(rename = "file_name")]
    pub file_name: String,
    #[serde(rename = "offset")]
    pub offset: u64,
}

impl ReaderState {
    pub fn is_empty(&self) -> bool {
        self.file_name.is_empty()
    }
}

/// The `ws_` prefix convention for in-memory-only readers (§4.1, §9).
pub fn is_ephemeral(reader_name: &str) -> bool {
    reader_name.starts_with("ws_")
}

pub fn reader_state_file_name(queue_name: &str, reader_name: &str) -> String {
    format!("reader_state_{queue_name}_{reader_name}.json")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ws_prefixed_names_are_ephemeral() {
        assert!(is_ephemeral("ws_dashboard"));
        assert!(!is_ephemeral("alerts-forwarder"));
    }

    #[test]
    fn file_name_matches_spec_pattern() {
        assert_eq!(
            reader_state_file_name("telemetry", "archiver"),
            "reader_state_telemetry_archiver.json"
        );
    }
}
