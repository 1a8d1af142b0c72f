//! Session memory
//!
//! A bounded, append-only JSON log of past analysis sessions. The newest 20
//! records are kept; a corrupt or missing log file is treated as empty and
//! silently reset on the next write.

use crate::error::Result;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::warn;

const MAX_RECORDS: usize = 20;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionRecord {
    pub timestamp: String,
    pub goal: String,
    pub completed_stages: Vec<String>,
    pub feedback_log: Vec<String>,
    /// (rows, columns) of the dataset the session ran against.
    pub df_shape: (usize, usize),
}

impl SessionRecord {
    pub fn new(goal: impl Into<String>, df_shape: (usize, usize)) -> Self {
        Self {
            timestamp: Utc::now().to_rfc3339(),
            goal: goal.into(),
            completed_stages: Vec::new(),
            feedback_log: Vec::new(),
            df_shape,
        }
    }
}

/// Handle to the on-disk session log.
#[derive(Debug, Clone)]
pub struct SessionLog {
    path: PathBuf,
}

impl SessionLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// All stored records, oldest first. Missing or unparseable files read
    /// as an empty log.
    pub fn load(&self) -> Vec<SessionRecord> {
        let text = match std::fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(_) => return Vec::new(),
        };
        match serde_json::from_str(&text) {
            Ok(records) => records,
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "Session log unreadable, resetting");
                Vec::new()
            }
        }
    }

    /// Append a record, evicting the oldest entries beyond the cap.
    pub fn append(&self, record: SessionRecord) -> Result<()> {
        let mut records = self.load();
        records.push(record);
        if records.len() > MAX_RECORDS {
            let excess = records.len() - MAX_RECORDS;
            records.drain(0..excess);
        }

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        std::fs::write(&self.path, serde_json::to_string_pretty(&records)?)?;
        Ok(())
    }

    /// The newest `limit` records, oldest first.
    pub fn recent(&self, limit: usize) -> Vec<SessionRecord> {
        let records = self.load();
        let skip = records.len().saturating_sub(limit);
        records.into_iter().skip(skip).collect()
    }

    /// Standalone feedback entry, used when a summary is regenerated
    /// outside a full session.
    pub fn log_feedback(
        &self,
        goal: &str,
        df_shape: (usize, usize),
        feedback: &str,
    ) -> Result<()> {
        let mut record = SessionRecord::new(goal, df_shape);
        record.feedback_log.push(feedback.to_string());
        self.append(record)
    }
}

/// Render recent records as prompt context.
pub fn render_records(records: &[SessionRecord]) -> String {
    if records.is_empty() {
        return "No prior sessions found.".to_string();
    }
    records
        .iter()
        .map(|r| {
            format!(
                "[{}] Goal: {} | Stages: {} | Feedback: {}",
                r.timestamp,
                r.goal,
                if r.completed_stages.is_empty() {
                    "None".to_string()
                } else {
                    r.completed_stages.join(", ")
                },
                if r.feedback_log.is_empty() {
                    "None".to_string()
                } else {
                    r.feedback_log.join("; ")
                }
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_log() -> (tempfile::TempDir, SessionLog) {
        let dir = tempfile::tempdir().unwrap();
        let log = SessionLog::new(dir.path().join("memory/memory_log.json"));
        (dir, log)
    }

    #[test]
    fn test_append_and_recent() {
        let (_dir, log) = temp_log();
        for i in 0..5 {
            log.append(SessionRecord::new(format!("goal {}", i), (10, 2)))
                .unwrap();
        }
        let recent = log.recent(3);
        assert_eq!(recent.len(), 3);
        assert_eq!(recent[0].goal, "goal 2");
        assert_eq!(recent[2].goal, "goal 4");
    }

    #[test]
    fn test_cap_evicts_oldest() {
        let (_dir, log) = temp_log();
        for i in 0..25 {
            log.append(SessionRecord::new(format!("goal {}", i), (1, 1)))
                .unwrap();
        }
        let records = log.load();
        assert_eq!(records.len(), MAX_RECORDS);
        assert_eq!(records[0].goal, "goal 5");
    }

    #[test]
    fn test_corrupt_log_reads_as_empty() {
        let (_dir, log) = temp_log();
        std::fs::create_dir_all(log.path().parent().unwrap()).unwrap();
        std::fs::write(log.path(), "{not valid json").unwrap();
        assert!(log.load().is_empty());

        // And the next append resets the file cleanly.
        log.append(SessionRecord::new("fresh", (2, 2))).unwrap();
        assert_eq!(log.load().len(), 1);
    }

    #[test]
    fn test_missing_file_is_empty() {
        let (_dir, log) = temp_log();
        assert!(log.load().is_empty());
        assert!(log.recent(3).is_empty());
    }

    #[test]
    fn test_render_records() {
        let mut record = SessionRecord::new("find trends", (100, 5));
        record.completed_stages.push("eda".to_string());
        let text = render_records(&[record]);
        assert!(text.contains("find trends"));
        assert!(text.contains("eda"));
        assert_eq!(render_records(&[]), "No prior sessions found.");
    }
}
