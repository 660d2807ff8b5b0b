//! Output file naming

use crate::utils::RecorderResult;
use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// Container extension for recordings
pub const RECORDING_EXTENSION: &str = "mp4";

/// `recording-20250102-030405-1a2b3c4d.mp4`
pub fn recording_file_name(started_at: DateTime<Utc>, id: Uuid) -> String {
    let short_id = id.simple().to_string();
    format!(
        "recording-{}-{}.{}",
        started_at.format("%Y%m%d-%H%M%S"),
        &short_id[..8],
        RECORDING_EXTENSION
    )
}

/// A fresh, unique output path inside `dir`, creating the directory if needed
pub fn next_output_path(dir: &Path, started_at: DateTime<Utc>) -> RecorderResult<PathBuf> {
    std::fs::create_dir_all(dir)?;

    loop {
        let candidate = dir.join(recording_file_name(started_at, Uuid::new_v4()));
        if !candidate.exists() {
            return Ok(candidate);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use tempfile::tempdir;

    #[test]
    fn test_file_name_format() {
        let started_at = Utc.with_ymd_and_hms(2025, 1, 2, 3, 4, 5).unwrap();
        let id = Uuid::parse_str("1a2b3c4d-0000-4000-8000-000000000000").unwrap();
        assert_eq!(
            recording_file_name(started_at, id),
            "recording-20250102-030405-1a2b3c4d.mp4"
        );
    }

    #[test]
    fn test_output_paths_are_unique() {
        let dir = tempdir().unwrap();
        let output_dir = dir.path().join("Movies");
        let now = Utc::now();

        let first = next_output_path(&output_dir, now).unwrap();
        let second = next_output_path(&output_dir, now).unwrap();

        assert!(output_dir.is_dir());
        assert_ne!(first, second);
        assert_eq!(first.parent(), Some(output_dir.as_path()));
    }
}
