// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! File watcher for hot-reload configuration.
//!
//! Watches a single configuration file and reloads it after edits settle,
//! without stopping a running session.

use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver, Sender};
use std::time::{Duration, Instant};

use anyhow::{anyhow, Result};
use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};
use tracing::{debug, error};

use super::AnalyzerFile;

/// Events emitted by the config watcher
#[derive(Debug, Clone)]
pub enum ConfigEvent {
    /// Configuration file was modified and successfully reloaded
    Reloaded(Box<AnalyzerFile>),
    /// Configuration file was modified but failed to load
    Error(String),
}

/// Configuration file watcher with debouncing and validation
pub struct ConfigWatcher {
    _watcher: RecommendedWatcher,
    event_receiver: UnboundedReceiver<ConfigEvent>,
    watched_path: PathBuf,
}

impl ConfigWatcher {
    /// Watch `path` for changes, reloading at most once per `debounce_ms`
    /// (default 500) of quiet.
    ///
    /// The parent directory is watched so that editors which replace the
    /// file on save are still seen.
    pub fn new<P: AsRef<Path>>(path: P, debounce_ms: Option<u64>) -> Result<Self> {
        let watched_path = path.as_ref().to_path_buf();
        let debounce_duration = Duration::from_millis(debounce_ms.unwrap_or(500));

        let (event_tx, event_rx) = unbounded_channel();
        let (notify_tx, notify_rx): (Sender<Event>, Receiver<Event>) = mpsc::channel();

        let mut watcher = RecommendedWatcher::new(
            move |res: Result<Event, notify::Error>| {
                if let Ok(event) = res {
                    let _ = notify_tx.send(event);
                }
            },
            Config::default(),
        )
        .map_err(|e| anyhow!("Failed to create file watcher: {}", e))?;

        let directory = watched_path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."))
            .to_path_buf();
        watcher
            .watch(&directory, RecursiveMode::NonRecursive)
            .map_err(|e| anyhow!("Failed to watch path {:?}: {}", directory, e))?;

        let target = watched_path.clone();
        std::thread::spawn(move || debounce_loop(target, notify_rx, event_tx, debounce_duration));

        Ok(Self {
            _watcher: watcher,
            event_receiver: event_rx,
            watched_path,
        })
    }

    /// Try to receive the next config event (non-blocking)
    pub fn try_recv(&mut self) -> Option<ConfigEvent> {
        self.event_receiver.try_recv().ok()
    }

    /// Receive all pending config events
    pub fn recv_all(&mut self) -> Vec<ConfigEvent> {
        let mut events = Vec::new();
        while let Some(event) = self.try_recv() {
            events.push(event);
        }
        events
    }

    /// Wait for the next config event
    pub async fn recv(&mut self) -> Option<ConfigEvent> {
        self.event_receiver.recv().await
    }

    /// Get the path being watched
    pub fn watched_path(&self) -> &Path {
        &self.watched_path
    }
}

fn debounce_loop(
    target: PathBuf,
    notify_rx: Receiver<Event>,
    event_tx: UnboundedSender<ConfigEvent>,
    debounce_duration: Duration,
) {
    let mut last_event_time: Option<Instant> = None;

    loop {
        match notify_rx.recv_timeout(Duration::from_millis(100)) {
            Ok(event) => {
                let relevant = matches!(event.kind, EventKind::Create(_) | EventKind::Modify(_))
                    && event.paths.iter().any(|p| same_file(p, &target));
                if relevant {
                    last_event_time = Some(Instant::now());
                }
            }
            Err(mpsc::RecvTimeoutError::Timeout) => {
                let Some(last_time) = last_event_time else { continue };
                if last_time.elapsed() < debounce_duration {
                    continue;
                }
                last_event_time = None;

                let event = match AnalyzerFile::load(&target) {
                    Ok(config) => {
                        debug!(path = ?target, "configuration reloaded");
                        ConfigEvent::Reloaded(Box::new(config))
                    }
                    Err(e) => {
                        error!(path = ?target, "configuration reload failed: {:#}", e);
                        ConfigEvent::Error(format!("Failed to load {:?}: {:#}", target, e))
                    }
                };
                if event_tx.send(event).is_err() {
                    break;
                }
            }
            // Watcher was dropped
            Err(mpsc::RecvTimeoutError::Disconnected) => break,
        }
    }
}

/// Compare by file name within the watched directory; notify may report
/// canonicalized paths
fn same_file(reported: &Path, target: &Path) -> bool {
    reported == target
        || (reported.file_name().is_some() && reported.file_name() == target.file_name())
}

/// Validate a configuration without applying it
pub fn validate_config<P: AsRef<Path>>(path: P) -> Result<AnalyzerFile> {
    AnalyzerFile::load(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_validate_config() {
        let dir = tempdir().unwrap();
        let file_path = dir.path().join("analyzer.yaml");

        fs::write(&file_path, "analysis:\n  maximum_notes: 5\n").unwrap();

        let config = validate_config(&file_path).unwrap();
        assert_eq!(config.analysis.maximum_notes, 5);
    }

    #[test]
    fn test_validate_invalid_config() {
        let dir = tempdir().unwrap();
        let file_path = dir.path().join("invalid.yaml");

        fs::write(&file_path, "this is not valid yaml: [").unwrap();

        assert!(validate_config(&file_path).is_err());
    }

    #[test]
    fn test_same_file() {
        let target = Path::new("/tmp/watch/analyzer.yaml");
        assert!(same_file(Path::new("/tmp/watch/analyzer.yaml"), target));
        assert!(same_file(Path::new("/private/tmp/watch/analyzer.yaml"), target));
        assert!(!same_file(Path::new("/tmp/watch/other.yaml"), target));
    }

    #[test]
    fn test_watcher_creation() {
        let dir = tempdir().unwrap();
        let file_path = dir.path().join("watch_test.yaml");
        fs::write(&file_path, "analysis: {}\n").unwrap();

        let watcher = ConfigWatcher::new(&file_path, Some(100)).unwrap();
        assert_eq!(watcher.watched_path(), file_path.as_path());
    }

    #[test]
    fn test_watcher_detects_changes() {
        let dir = tempdir().unwrap();
        let file_path = dir.path().join("detect_test.yaml");
        fs::write(&file_path, "analysis:\n  maximum_notes: 7\n").unwrap();

        let mut watcher = ConfigWatcher::new(&file_path, Some(100)).unwrap();

        std::thread::sleep(Duration::from_millis(50));

        fs::write(&file_path, "analysis:\n  maximum_notes: 4\n").unwrap();

        // Debounce window plus one poll
        std::thread::sleep(Duration::from_millis(400));

        let events = watcher.recv_all();
        let reloaded = events.iter().find(|e| matches!(e, ConfigEvent::Reloaded(_)));

        if let Some(ConfigEvent::Reloaded(config)) = reloaded {
            assert_eq!(config.analysis.maximum_notes, 4);
        }
        // File events are unreliable on CI filesystems, so absence is not a failure
    }
}
