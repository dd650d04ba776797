//! Date-based log file naming and listing (§3, §4.1).
//!
//! File names are `<name>_queue_<YYYYMMDD>.log`. Lexicographic order on the
//! name is chronological order because the date suffix is fixed-width.

use std::path::Path;

use chrono::Local;

use crate::os_provider::OsProvider;
use crate::Result;

pub fn today_suffix() -> String {
    Local::now().format("%Y%m%d").to_string()
}

pub fn log_file_name(queue_name: &str, date_suffix: &str) -> String {
    format!("{queue_name}_queue_{date_suffix}.log")
}

/// Extracts the `YYYYMMDD` suffix from a `<name>_queue_<date>.log` name.
pub fn date_suffix_of(queue_name: &str, file_name: &str) -> Option<String> {
    let prefix = format!("{queue_name}_queue_");
    let rest = file_name.strip_prefix(&prefix)?;
    let date = rest.strip_suffix(".log")?;
    if date.len() == 8 && date.chars().all(|c| c.is_ascii_digit()) {
        Some(date.to_string())
    } else {
        None
    }
}

/// Every `<name>_queue_*.log` file in `dir`, sorted ascending (oldest
/// first).
pub fn list_queue_files(
    os: &dyn OsProvider,
    dir: &Path,
    queue_name: &str,
) -> Result<Vec<String>> {
    let entries = match os.read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Vec::new(),
        Err(e) => return Err(crate::Error::io(dir, e)),
    };
    let mut files: Vec<String> = entries
        .into_iter()
        .filter_map(|entry| {
            date_suffix_of(queue_name, &entry.file_name).map(|_| entry.file_name)
        })
        .collect();
    files.sort();
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_and_parses_file_names() {
        let name = log_file_name("alerts", "20250103");
        assert_eq!(name, "alerts_queue_20250103.log");
        assert_eq!(
            date_suffix_of("alerts", &name),
            Some("20250103".to_string())
        );
    }

    #[test]
    fn rejects_unrelated_names() {
        assert_eq!(date_suffix_of("alerts", "alerts_queue_abc.log"), None);
        assert_eq!(date_suffix_of("alerts", "other_queue_20250103.log"), None);
        assert_eq!(
            date_suffix_of("alerts", "reader_state_alerts_r1.json"),
            None
        );
    }

    #[test]
    fn lexicographic_order_is_chronological() {
        let mut files = vec![
            "q_queue_20250103.log".to_string(),
            "q_queue_20250101.log".to_string(),
            "q_queue_20250102.log".to_string(),
        ];
        files.sort();
        assert_eq!(
            files,
            vec![
                "q_queue_20250101.log",
                "q_queue_20250102.log",
                "q_queue_20250103.log",
            ]
        );
    }
}
