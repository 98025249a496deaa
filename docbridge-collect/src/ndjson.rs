//! Streaming reader for newline-delimited JSON sample files.
//!
//! The file is streamed twice: once to count lines so progress can be
//! reported as a fraction, then again to parse documents. Progress is
//! logged every 100 lines until line 1000, then every 1000 lines.

use std::path::Path;

use serde_json::Value;
use tokio::fs::File;
use tokio::io::{AsyncBufReadExt, BufReader};

use docbridge_core::error::{DocBridgeError, Result};
use docbridge_core::logging::ProgressReporter;

fn should_log(line: u64) -> bool {
    if line < 1000 {
        line % 100 == 0
    } else {
        line % 1000 == 0
    }
}

async fn count_lines(path: &Path) -> Result<u64> {
    let file = File::open(path).await.map_err(|e| file_error(path, e))?;
    let mut lines = BufReader::new(file).lines();
    let mut count = 0;
    while lines
        .next_line()
        .await
        .map_err(|e| file_error(path, e))?
        .is_some()
    {
        count += 1;
    }
    Ok(count)
}

/// Reads one JSON document per line, skipping blank lines.
///
/// # Errors
///
/// I/O failures are tagged as [`DocBridgeError::FileRead`] so bulk-load
/// failures stay attributable; a malformed line fails with its line number.
pub async fn read_documents(path: &Path, progress: &dyn ProgressReporter) -> Result<Vec<Value>> {
    let total = count_lines(path).await?;

    let file = File::open(path).await.map_err(|e| file_error(path, e))?;
    let mut lines = BufReader::new(file).lines();
    let mut documents = Vec::new();
    let mut line_number: u64 = 0;

    while let Some(line) = lines.next_line().await.map_err(|e| file_error(path, e))? {
        line_number += 1;

        if should_log(line_number) {
            progress.progress(
                &format!("Reading sample file: {line_number} / {total} lines"),
                "",
                "",
            );
        }

        if line.trim().is_empty() {
            continue;
        }

        let document: Value = serde_json::from_str(&line).map_err(|e| {
            DocBridgeError::serialization(format!("sample file line {line_number}"), e)
        })?;
        documents.push(document);
    }

    progress.progress(
        &format!("Reading sample file: {line_number} / {total} lines"),
        "",
        "",
    );

    Ok(documents)
}

fn file_error(path: &Path, error: std::io::Error) -> DocBridgeError {
    DocBridgeError::FileRead {
        path: path.display().to_string(),
        source: error,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use docbridge_core::logging::LogProgress;
    use std::io::Write;

    #[tokio::test]
    async fn test_reads_one_document_per_line() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "{{\"a\": 1}}").unwrap();
        writeln!(file).unwrap();
        writeln!(file, "{{\"a\": 2}}").unwrap();

        let documents = read_documents(file.path(), &LogProgress).await.unwrap();
        assert_eq!(documents.len(), 2);
        assert_eq!(documents[1]["a"], 2);
    }

    #[tokio::test]
    async fn test_missing_file_is_a_file_read_error() {
        let error = read_documents(Path::new("/nonexistent/samples.ndjson"), &LogProgress)
            .await
            .unwrap_err();
        assert!(matches!(error, DocBridgeError::FileRead { .. }));
    }

    #[tokio::test]
    async fn test_malformed_line_names_its_line_number() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "{{\"a\": 1}}").unwrap();
        writeln!(file, "not json").unwrap();

        let error = read_documents(file.path(), &LogProgress).await.unwrap_err();
        assert!(error.to_string().contains("line 2"));
    }

    #[test]
    fn test_log_cadence() {
        assert!(should_log(100));
        assert!(should_log(900));
        assert!(!should_log(950));
        assert!(should_log(1000));
        assert!(!should_log(1100));
        assert!(should_log(2000));
    }
}
