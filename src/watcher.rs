// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Folder watcher that tells watch mode when new images arrive

use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::path::{Path, PathBuf};
use std::sync::mpsc::{channel, Receiver};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use crate::batch::is_supported;
use crate::Result;

/// Events emitted by the watcher
#[derive(Debug, Clone, PartialEq)]
pub enum WatchEvent {
    /// A new file was created
    FileCreated(PathBuf),
    /// A file was modified
    FileModified(PathBuf),
    /// Watcher error
    Error(String),
}

/// Non-recursive watcher over a single folder
pub struct FolderWatcher {
    _watcher: RecommendedWatcher,
    folder: PathBuf,
    event_rx: Receiver<notify::Result<Event>>,
}

impl FolderWatcher {
    pub fn new(folder: &Path) -> Result<Self> {
        let (tx, rx) = channel();

        let config = Config::default().with_poll_interval(Duration::from_secs(2));
        let mut watcher = RecommendedWatcher::new(tx, config)?;

        if !folder.exists() {
            std::fs::create_dir_all(folder)?;
            info!("Created watch directory: {:?}", folder);
        }
        watcher.watch(folder, RecursiveMode::NonRecursive)?;
        info!("Watching: {:?}", folder);

        Ok(Self {
            _watcher: watcher,
            folder: folder.to_path_buf(),
            event_rx: rx,
        })
    }

    /// Get the next event (blocking with timeout)
    pub fn next_event(&self, timeout: Duration) -> Option<WatchEvent> {
        match self.event_rx.recv_timeout(timeout) {
            Ok(Ok(event)) => convert_event(event),
            Ok(Err(e)) => Some(WatchEvent::Error(e.to_string())),
            Err(std::sync::mpsc::RecvTimeoutError::Timeout) => None,
            Err(std::sync::mpsc::RecvTimeoutError::Disconnected) => {
                Some(WatchEvent::Error("Watcher disconnected".to_string()))
            }
        }
    }

    pub fn folder(&self) -> &Path {
        &self.folder
    }
}

fn convert_event(event: Event) -> Option<WatchEvent> {
    match event.kind {
        EventKind::Create(_) => event.paths.first().map(|p| WatchEvent::FileCreated(p.clone())),
        EventKind::Modify(_) => event.paths.last().map(|p| WatchEvent::FileModified(p.clone())),
        _ => None,
    }
}

/// Whether a path looks like a finished image worth a rescan
pub fn should_process(path: &Path, formats: &[String]) -> bool {
    let filename = match path.file_name().and_then(|n| n.to_str()) {
        Some(n) => n,
        None => return false,
    };

    // Hidden files, including our own temp files
    if filename.starts_with('.') {
        return false;
    }

    is_supported(filename, formats)
}

/// Images touched since the last batch, released once events go quiet
#[derive(Debug)]
pub struct SettleTracker {
    settle: Duration,
    pending: Vec<PathBuf>,
    last_event: Option<Instant>,
}

impl SettleTracker {
    pub fn new(settle: Duration) -> Self {
        Self {
            settle,
            pending: Vec::new(),
            last_event: None,
        }
    }

    pub fn note(&mut self, path: PathBuf, now: Instant) {
        if !self.pending.contains(&path) {
            self.pending.push(path);
        }
        self.last_event = Some(now);
    }

    /// Pending paths once `settle` has passed without new events
    pub fn take_settled(&mut self, now: Instant) -> Option<Vec<PathBuf>> {
        let last = self.last_event?;
        if now.duration_since(last) < self.settle {
            return None;
        }
        self.last_event = None;
        Some(std::mem::take(&mut self.pending))
    }

    pub fn is_idle(&self) -> bool {
        self.last_event.is_none()
    }
}

/// Wait for file to be stable (not being written)
pub async fn wait_for_stable(path: &Path, max_wait: Duration) -> bool {
    let check_interval = Duration::from_millis(500);
    let start = Instant::now();

    let mut last_size = match std::fs::metadata(path) {
        Ok(m) => m.len(),
        Err(_) => return false,
    };

    loop {
        tokio::time::sleep(check_interval).await;

        if start.elapsed() > max_wait {
            warn!("File stability check timed out for {:?}", path);
            return true;
        }

        let current_size = match std::fs::metadata(path) {
            Ok(m) => m.len(),
            Err(_) => return false,
        };

        if current_size == last_size {
            return true;
        }

        last_size = current_size;
        debug!("File {:?} still being written, size: {}", path, current_size);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn formats() -> Vec<String> {
        crate::config::BatchConfig::default().formats
    }

    #[test]
    fn test_should_process_filters_hidden_and_foreign() {
        let formats = formats();
        assert!(should_process(Path::new("/photos/cat.jpg"), &formats));
        assert!(!should_process(Path::new("/photos/.cat.jpg"), &formats));
        assert!(!should_process(Path::new("/photos/.categorized.json.tmp"), &formats));
        assert!(!should_process(Path::new("/photos/cat.jpg.crdownload"), &formats));
        assert!(!should_process(Path::new("/photos/notes.md"), &formats));
    }

    #[test]
    fn test_settle_tracker_waits_for_quiet() {
        let start = Instant::now();
        let mut tracker = SettleTracker::new(Duration::from_secs(2));
        assert!(tracker.take_settled(start).is_none());

        tracker.note(PathBuf::from("/a.jpg"), start);
        tracker.note(PathBuf::from("/a.jpg"), start + Duration::from_secs(1));
        assert!(tracker.take_settled(start + Duration::from_secs(2)).is_none());

        let settled = tracker.take_settled(start + Duration::from_secs(3)).unwrap();
        assert_eq!(settled, vec![PathBuf::from("/a.jpg")]);
        assert!(tracker.is_idle());
    }

    #[test]
    fn test_convert_event_kinds() {
        let created = Event::new(EventKind::Create(notify::event::CreateKind::File))
            .add_path(PathBuf::from("/a.jpg"));
        assert_eq!(
            convert_event(created),
            Some(WatchEvent::FileCreated(PathBuf::from("/a.jpg")))
        );

        let removed = Event::new(EventKind::Remove(notify::event::RemoveKind::File))
            .add_path(PathBuf::from("/a.jpg"));
        assert_eq!(convert_event(removed), None);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_next_event_off_the_runtime_worker() {
        let dir = tempfile::tempdir().unwrap();
        let watcher = FolderWatcher::new(dir.path()).unwrap();
        let ticker = tokio::spawn(async {
            tokio::time::sleep(Duration::from_millis(10)).await;
            true
        });

        std::fs::write(dir.path().join("new.jpg"), b"x").unwrap();
        let mut seen = false;
        for _ in 0..20 {
            match tokio::task::block_in_place(|| watcher.next_event(Duration::from_millis(250))) {
                Some(WatchEvent::FileCreated(_)) | Some(WatchEvent::FileModified(_)) => {
                    seen = true;
                    break;
                }
                _ => {}
            }
        }

        assert!(seen);
        assert!(ticker.await.unwrap());
    }

    #[tokio::test]
    async fn test_wait_for_stable_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        assert!(!wait_for_stable(&dir.path().join("gone.jpg"), Duration::from_secs(1)).await);
    }

    #[tokio::test]
    async fn test_wait_for_stable_static_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("still.jpg");
        std::fs::write(&path, b"data").unwrap();
        assert!(wait_for_stable(&path, Duration::from_secs(5)).await);
    }
}
