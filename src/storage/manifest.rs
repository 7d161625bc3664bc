//! Append-only JSON Lines manifest of every completed capture

use serde::Serialize;
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::Path;

use crate::capture::CaptureRecord;
use crate::error::Result;

#[derive(Serialize)]
struct ManifestEntry<'a> {
    #[serde(flatten)]
    record: &'a CaptureRecord,
    /// False when the budget rolled the capture back
    retained: bool,
}

/// JSONL capture manifest writer
pub struct CaptureManifest {
    writer: BufWriter<File>,
}

impl std::fmt::Debug for CaptureManifest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CaptureManifest").finish_non_exhaustive()
    }
}

impl CaptureManifest {
    /// Open (or create) the manifest for appending
    pub fn open(path: &Path) -> Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            writer: BufWriter::new(file),
        })
    }

    /// Append one capture and flush it to disk
    pub fn append(&mut self, record: &CaptureRecord, retained: bool) -> Result<()> {
        serde_json::to_writer(&mut self.writer, &ManifestEntry { record, retained })?;
        self.writer.write_all(b"\n")?;
        self.writer.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use std::path::PathBuf;
    use tempfile::TempDir;

    fn record(is_video: bool) -> CaptureRecord {
        CaptureRecord {
            timestamp: Utc.with_ymd_and_hms(2024, 3, 20, 12, 0, 8).unwrap(),
            file_path: PathBuf::from("images/20240320-120008.jpg"),
            size_bytes: 5_242_880,
            is_video,
        }
    }

    #[test]
    fn test_append_writes_json_lines() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("captures.jsonl");

        let mut manifest = CaptureManifest::open(&path).unwrap();
        manifest.append(&record(false), true).unwrap();
        manifest.append(&record(true), false).unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<serde_json::Value> = contents
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect();

        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0]["file_path"], "images/20240320-120008.jpg");
        assert_eq!(lines[0]["size_bytes"], 5_242_880);
        assert_eq!(lines[0]["is_video"], false);
        assert_eq!(lines[0]["retained"], true);
        assert_eq!(lines[1]["is_video"], true);
        assert_eq!(lines[1]["retained"], false);
        assert_eq!(lines[0]["timestamp"], "2024-03-20T12:00:08Z");
    }

    #[test]
    fn test_reopen_appends() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("captures.jsonl");

        CaptureManifest::open(&path).unwrap().append(&record(false), true).unwrap();
        CaptureManifest::open(&path).unwrap().append(&record(false), true).unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        assert_eq!(contents.lines().count(), 2);
    }
}
