//! File system watcher for the registry root.
//!
//! Debounced file events are turned into force triggers for the
//! scheduler, so edits converge without waiting for the next tick.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use notify::{RecommendedWatcher, RecursiveMode};
use notify_debouncer_mini::{new_debouncer, DebouncedEvent, Debouncer};
use tokio::sync::broadcast;

use crate::error::{Result, SyncError};

/// Debounce window for registry file events.
const DEBOUNCE_DELAY: Duration = Duration::from_millis(500);

/// Watches the registry root and emits a trigger per debounced change.
pub struct RegistryWatcher {
    registry_root: PathBuf,
    sender: broadcast::Sender<()>,
    shutdown: Arc<AtomicBool>,
}

impl RegistryWatcher {
    /// Creates a new registry watcher.
    pub fn new(registry_root: impl Into<PathBuf>) -> Self {
        let (sender, _) = broadcast::channel(16);
        Self {
            registry_root: registry_root.into(),
            sender,
            shutdown: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Returns a receiver suitable as the scheduler's trigger input.
    pub fn subscribe(&self) -> broadcast::Receiver<()> {
        self.sender.subscribe()
    }

    /// Returns the trigger sender, e.g. for an explicit force signal.
    pub fn sender(&self) -> broadcast::Sender<()> {
        self.sender.clone()
    }

    pub fn registry_root(&self) -> &Path {
        &self.registry_root
    }

    /// Starts watching the registry root.
    ///
    /// This function blocks until the shutdown flag is set.
    pub fn watch(&self) -> Result<()> {
        let sender = self.sender.clone();
        let shutdown = Arc::clone(&self.shutdown);

        let (tx, rx) = std::sync::mpsc::channel();

        let mut debouncer: Debouncer<RecommendedWatcher> = new_debouncer(DEBOUNCE_DELAY, tx)
            .map_err(|e| SyncError::WatchError(e.to_string()))?;

        debouncer
            .watcher()
            .watch(&self.registry_root, RecursiveMode::Recursive)
            .map_err(|e| SyncError::WatchError(e.to_string()))?;

        log::info!(
            "Started watching registry root: {}",
            self.registry_root.display()
        );

        loop {
            if shutdown.load(Ordering::Relaxed) {
                break;
            }

            // Use timeout to allow checking the shutdown flag
            match rx.recv_timeout(Duration::from_millis(100)) {
                Ok(Ok(events)) => {
                    if events.iter().any(is_relevant) {
                        let _ = sender.send(());
                    }
                }
                Ok(Err(e)) => {
                    log::error!("Watch error: {e}");
                }
                Err(std::sync::mpsc::RecvTimeoutError::Timeout) => {
                    // Continue loop
                }
                Err(std::sync::mpsc::RecvTimeoutError::Disconnected) => {
                    break;
                }
            }
        }

        log::info!("Stopped watching registry root");
        Ok(())
    }

    /// Signals the watcher to stop.
    pub fn stop(&self) {
        self.shutdown.store(true, Ordering::Relaxed);
    }

    /// Returns whether the watcher has been signaled to stop.
    pub fn is_stopped(&self) -> bool {
        self.shutdown.load(Ordering::Relaxed)
    }
}

fn is_relevant(event: &DebouncedEvent) -> bool {
    // directory-only churn still means the tree changed; let the cycle's
    // change detection sort out whether any artefact is affected
    !event.path.as_os_str().is_empty()
}

/// Thread-backed wrapper around [`RegistryWatcher`].
pub struct BackgroundRegistryWatcher {
    watcher: Arc<RegistryWatcher>,
    watch_handle: Option<std::thread::JoinHandle<Result<()>>>,
}

impl BackgroundRegistryWatcher {
    /// Creates a new background watcher.
    pub fn new(registry_root: impl Into<PathBuf>) -> Self {
        Self {
            watcher: Arc::new(RegistryWatcher::new(registry_root)),
            watch_handle: None,
        }
    }

    /// Starts watching in a background thread.
    pub fn start(&mut self) {
        if self.watch_handle.is_some() {
            return;
        }

        let watcher = Arc::clone(&self.watcher);
        self.watch_handle = Some(std::thread::spawn(move || watcher.watch()));
    }

    /// Returns a receiver suitable as the scheduler's trigger input.
    pub fn subscribe(&self) -> broadcast::Receiver<()> {
        self.watcher.subscribe()
    }

    /// Returns the trigger sender.
    pub fn sender(&self) -> broadcast::Sender<()> {
        self.watcher.sender()
    }

    /// Stops the watcher and joins the thread.
    pub fn stop(&mut self) {
        self.watcher.stop();
        if let Some(handle) = self.watch_handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for BackgroundRegistryWatcher {
    fn drop(&mut self) {
        self.stop();
    }
}

// ============================================================================
// Tests
// ============================================================================
