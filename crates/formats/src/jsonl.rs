//! Streaming JSONL harvest-file reader
//!
//! Reads one record document per line with automatic gzip decompression,
//! for loading harvested catalog dumps into the document store.

use crate::{Record, Result};
use flate2::read::GzDecoder;
use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::path::Path;
use tracing::{debug, warn};

/// Configuration for the JSONL reader
#[derive(Debug, Clone)]
pub struct JsonlConfig {
    /// Buffer size for BufReader
    pub buffer_size: usize,
}

impl Default for JsonlConfig {
    fn default() -> Self {
        Self {
            buffer_size: 64 * 1024, // 64KB buffer
        }
    }
}

/// Streaming reader yielding one [`Record`] per input line
pub struct JsonlReader<R: Read> {
    reader: BufReader<R>,
    line_number: usize,
    bytes_read: u64,
    skipped_lines: usize,
    total_bytes: Option<u64>,
}

impl JsonlReader<Box<dyn Read>> {
    /// Open a JSONL file, auto-detecting gzip compression
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path)?;
        let total_bytes = file.metadata()?.len();

        match path.extension().and_then(|e| e.to_str()) {
            Some("gz") => {
                debug!("Opening gzip-compressed harvest file: {:?}", path);
                let reader: Box<dyn Read> = Box::new(GzDecoder::new(file));
                Ok(Self::with_config(reader, JsonlConfig::default(), None))
            }
            _ => {
                debug!("Opening plain harvest file: {:?}", path);
                let reader: Box<dyn Read> = Box::new(file);
                Ok(Self::with_config(
                    reader,
                    JsonlConfig::default(),
                    Some(total_bytes),
                ))
            }
        }
    }
}

impl<R: Read> JsonlReader<R> {
    /// Create a reader from any byte source
    pub fn new(reader: R) -> Self {
        Self::with_config(reader, JsonlConfig::default(), None)
    }

    /// Create a reader with custom configuration
    pub fn with_config(reader: R, config: JsonlConfig, total_bytes: Option<u64>) -> Self {
        Self {
            reader: BufReader::with_capacity(config.buffer_size, reader),
            line_number: 0,
            bytes_read: 0,
            skipped_lines: 0,
            total_bytes,
        }
    }

    /// Number of lines consumed so far
    pub fn lines_processed(&self) -> usize {
        self.line_number
    }

    /// Number of malformed lines skipped so far
    pub fn lines_skipped(&self) -> usize {
        self.skipped_lines
    }

    /// Bytes consumed so far
    pub fn bytes_processed(&self) -> u64 {
        self.bytes_read
    }

    /// Total input size when known (uncompressed input only)
    pub fn total_bytes(&self) -> Option<u64> {
        self.total_bytes
    }
}

impl<R: Read> Iterator for JsonlReader<R> {
    type Item = Result<Record>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let mut line = String::new();
            match self.reader.read_line(&mut line) {
                Ok(0) => return None,
                Ok(n) => {
                    self.line_number += 1;
                    self.bytes_read += n as u64;

                    let trimmed = line.trim();
                    if trimmed.is_empty() {
                        continue;
                    }

                    match serde_json::from_str::<Record>(trimmed) {
                        Ok(record) => return Some(Ok(record)),
                        Err(e) => {
                            // A bad line should not abort a multi-million
                            // record harvest load
                            warn!("Skipping malformed line {}: {}", self.line_number, e);
                            self.skipped_lines += 1;
                            continue;
                        }
                    }
                }
                Err(e) => return Some(Err(e.into())),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn reader_for(content: &str) -> JsonlReader<Cursor<Vec<u8>>> {
        JsonlReader::new(Cursor::new(content.as_bytes().to_vec()))
    }

    #[test]
    fn test_read_records() {
        let content = concat!(
            r#"{"id":"a.1","source_id":"a","format":"dc","raw":{"title":"x"}}"#,
            "\n",
            r#"{"id":"a.2","source_id":"a","format":"dc","raw":{"title":"y"}}"#,
            "\n",
        );
        let records: Vec<Record> = reader_for(content).map(|r| r.unwrap()).collect();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].id, "a.1");
        assert_eq!(records[1].raw["title"], "y");
    }

    #[test]
    fn test_skips_malformed_and_blank_lines() {
        let content = concat!(
            "\n",
            "{not json}\n",
            r#"{"id":"a.1","source_id":"a","format":"dc","raw":{}}"#,
            "\n",
        );
        let mut reader = reader_for(content);
        let records: Vec<Record> = reader.by_ref().map(|r| r.unwrap()).collect();
        assert_eq!(records.len(), 1);
        assert_eq!(reader.lines_skipped(), 1);
        assert_eq!(reader.lines_processed(), 3);
    }

    #[test]
    fn test_optional_fields_default() {
        let content = concat!(
            r#"{"id":"a.1","source_id":"a","format":"marc","oai_id":"oai:a:1","raw":{"fields":[]}}"#,
            "\n",
        );
        let records: Vec<Record> = reader_for(content).map(|r| r.unwrap()).collect();
        assert_eq!(records[0].oai_id, "oai:a:1");
        assert!(!records[0].deleted);
        assert!(records[0].host_record_id.is_empty());
        assert!(records[0].title_keys.is_none());
    }

    #[test]
    fn test_byte_accounting() {
        let content = r#"{"id":"a.1","source_id":"a","format":"dc","raw":{}}"#.to_string() + "\n";
        let mut reader = reader_for(&content);
        assert!(reader.next().is_some());
        assert_eq!(reader.bytes_processed(), content.len() as u64);
    }
}
