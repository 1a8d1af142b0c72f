//! Folder watcher
//!
//! One optional background task polls a directory at a fixed interval and
//! re-runs the analysis pipeline for new or changed tabular files. At most
//! one watcher runs per process; asking again while one is alive is a
//! no-op. The watcher shares no mutable state with the interactive path —
//! it only writes results through the same output store.

use crate::ingest;
use polars::prelude::DataFrame;
use std::collections::HashMap;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::{Duration, SystemTime};
use tracing::{info, warn};

const WATCHED_EXTENSIONS: &[&str] = &["csv", "tsv", "json", "xlsx", "xls"];

#[derive(Default)]
pub struct FolderWatcher {
    handle: Mutex<Option<tokio::task::JoinHandle<()>>>,
}

impl FolderWatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_running(&self) -> bool {
        self.handle
            .lock()
            .unwrap()
            .as_ref()
            .map(|h| !h.is_finished())
            .unwrap_or(false)
    }

    /// Start polling `dir` every `interval`. `on_dataset` runs for each new
    /// or modified file that loads successfully. Returns a status line; a
    /// second start request while the watcher is alive changes nothing.
    pub fn start<F, Fut>(&self, dir: PathBuf, interval: Duration, on_dataset: F) -> String
    where
        F: Fn(DataFrame, String) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send,
    {
        let mut guard = self.handle.lock().unwrap();
        if let Some(handle) = guard.as_ref() {
            if !handle.is_finished() {
                return "Watcher already running.".to_string();
            }
        }

        let status = format!("Watching {} every {}s.", dir.display(), interval.as_secs());
        let handle = tokio::spawn(async move {
            let mut seen: HashMap<PathBuf, SystemTime> = HashMap::new();
            loop {
                for path in list_tabular_files(&dir) {
                    let modified = match std::fs::metadata(&path).and_then(|m| m.modified()) {
                        Ok(modified) => modified,
                        Err(_) => continue,
                    };
                    if seen.get(&path) == Some(&modified) {
                        continue;
                    }

                    info!(path = %path.display(), "Watcher picked up file");
                    match ingest::load_from_path(&path) {
                        Ok(df) => {
                            let name = path
                                .file_name()
                                .and_then(|n| n.to_str())
                                .unwrap_or("dataset")
                                .to_string();
                            on_dataset(df, name).await;
                            seen.insert(path, modified);
                        }
                        Err(e) => {
                            warn!(path = %path.display(), error = %e, "Watcher could not load file");
                            // Remember the attempt so a broken file is not
                            // retried every tick until it changes.
                            seen.insert(path, modified);
                        }
                    }
                }
                tokio::time::sleep(interval).await;
            }
        });
        *guard = Some(handle);
        status
    }

    pub fn stop(&self) {
        if let Some(handle) = self.handle.lock().unwrap().take() {
            handle.abort();
        }
    }
}

fn list_tabular_files(dir: &Path) -> Vec<PathBuf> {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(_) => return Vec::new(),
    };
    let mut files: Vec<PathBuf> = entries
        .flatten()
        .map(|e| e.path())
        .filter(|p| {
            p.extension()
                .and_then(|e| e.to_str())
                .map(|e| WATCHED_EXTENSIONS.contains(&e.to_lowercase().as_str()))
                .unwrap_or(false)
        })
        .collect();
    files.sort();
    files
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[tokio::test]
    async fn test_watcher_processes_new_files_once() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("data.csv"), "a,b\n1,2\n").unwrap();

        let counter = Arc::new(AtomicUsize::new(0));
        let counter_clone = counter.clone();

        let watcher = FolderWatcher::new();
        watcher.start(
            dir.path().to_path_buf(),
            Duration::from_millis(50),
            move |_df, _name| {
                let counter = counter_clone.clone();
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                }
            },
        );

        tokio::time::sleep(Duration::from_millis(300)).await;
        watcher.stop();
        // Picked up exactly once despite several polling ticks.
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_second_start_is_a_no_op() {
        let dir = tempfile::tempdir().unwrap();
        let watcher = FolderWatcher::new();

        let first = watcher.start(dir.path().to_path_buf(), Duration::from_secs(60), |_, _| async {});
        assert!(first.starts_with("Watching"));
        assert!(watcher.is_running());

        let second = watcher.start(dir.path().to_path_buf(), Duration::from_secs(60), |_, _| async {});
        assert_eq!(second, "Watcher already running.");

        watcher.stop();
    }

    #[test]
    fn test_list_tabular_files_filters_extensions() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.csv"), "x\n").unwrap();
        std::fs::write(dir.path().join("b.log"), "x\n").unwrap();
        std::fs::write(dir.path().join("c.json"), "[]").unwrap();

        let files = list_tabular_files(dir.path());
        assert_eq!(files.len(), 2);
    }
}
