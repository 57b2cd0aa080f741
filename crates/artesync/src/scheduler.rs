//! Periodic cycle scheduler.
//!
//! Drives the coordinator either on a fixed tick or on demand via a
//! broadcast trigger (file-watch event, explicit API call). The
//! coordinator's own guard makes overlapping cycles impossible; a
//! trigger arriving mid-cycle yields a skipped report.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use tokio::sync::broadcast;

use crate::coordinator::{CycleReport, SyncCoordinator};
use crate::scanner::RegistryScanner;

/// Periodic reconciliation scheduler.
pub struct SyncScheduler {
    coordinator: Arc<SyncCoordinator>,
    scanner: Arc<dyn RegistryScanner>,
    interval: Duration,
    shutdown: Arc<AtomicBool>,
    report_sender: broadcast::Sender<CycleReport>,
}

impl SyncScheduler {
    /// Creates a new scheduler.
    pub fn new(
        coordinator: Arc<SyncCoordinator>,
        scanner: Arc<dyn RegistryScanner>,
        interval: Duration,
    ) -> Self {
        let (report_sender, _) = broadcast::channel(16);
        Self {
            coordinator,
            scanner,
            interval,
            shutdown: Arc::new(AtomicBool::new(false)),
            report_sender,
        }
    }

    /// Returns a receiver for completed cycle reports, for external
    /// problems/reporting surfaces.
    pub fn subscribe(&self) -> broadcast::Receiver<CycleReport> {
        self.report_sender.subscribe()
    }

    /// Starts the cycle loop in a background thread.
    /// Accepts a trigger receiver for forced cycles.
    pub fn start(&self, mut trigger_rx: broadcast::Receiver<()>) -> JoinHandle<()> {
        let coordinator = Arc::clone(&self.coordinator);
        let scanner = Arc::clone(&self.scanner);
        let shutdown = Arc::clone(&self.shutdown);
        let interval = self.interval;
        let report_sender = self.report_sender.clone();

        std::thread::spawn(move || {
            let rt = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .expect("failed to build scheduler runtime");

            rt.block_on(async {
                let mut interval_timer = tokio::time::interval(interval);
                interval_timer.tick().await; // skip immediate first tick

                loop {
                    if shutdown.load(Ordering::Acquire) {
                        break;
                    }

                    tokio::select! {
                        _ = interval_timer.tick() => {},
                        Ok(()) = trigger_rx.recv() => {
                            log::info!("Forced reconciliation cycle triggered");
                        },
                    }

                    if shutdown.load(Ordering::Acquire) {
                        break;
                    }

                    let snapshot = match scanner.snapshot() {
                        Ok(snapshot) => snapshot,
                        Err(e) => {
                            log::error!("Registry scan failed: {e}");
                            continue;
                        }
                    };

                    match coordinator.run_cycle(&snapshot) {
                        Ok(report) => {
                            if !report.errors.is_empty() {
                                log::warn!(
                                    "Cycle finished with {} errors",
                                    report.errors.len()
                                );
                            }
                            let _ = report_sender.send(report);
                        }
                        Err(e) => log::error!("Reconciliation cycle failed: {e}"),
                    }
                }
            });
        })
    }

    /// Signals the scheduler to stop.
    pub fn stop(&self) {
        self.shutdown.store(true, Ordering::Release);
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coordinator::RegistrySnapshot;
    use crate::error::Result;
    use crate::registry::SynchronizerRegistry;
    use crate::store::InMemoryDefinitionStore;

    struct EmptyScanner;

    impl RegistryScanner for EmptyScanner {
        fn snapshot(&self) -> Result<RegistrySnapshot> {
            Ok(RegistrySnapshot::default())
        }
    }

    #[test]
    fn test_scheduler_shutdown() {
        let registry = Arc::new(SynchronizerRegistry::new());
        let definitions = Arc::new(InMemoryDefinitionStore::new());
        let coordinator = Arc::new(SyncCoordinator::new(registry, definitions));
        let scheduler = SyncScheduler::new(
            coordinator,
            Arc::new(EmptyScanner),
            Duration::from_millis(50),
        );

        let (trigger_tx, trigger_rx) = broadcast::channel(16);
        let handle = scheduler.start(trigger_rx);

        // Let it run briefly then stop
        std::thread::sleep(Duration::from_millis(100));
        scheduler.stop();

        // Send a trigger to wake up the select loop so it sees the shutdown
        let _ = trigger_tx.send(());

        handle.join().expect("scheduler thread panicked");
    }

    #[test]
    fn test_forced_cycle_emits_report() {
        let registry = Arc::new(SynchronizerRegistry::new());
        let definitions = Arc::new(InMemoryDefinitionStore::new());
        let coordinator = Arc::new(SyncCoordinator::new(registry, definitions));
        let scheduler = SyncScheduler::new(
            coordinator,
            Arc::new(EmptyScanner),
            Duration::from_secs(3600),
        );

        let (trigger_tx, trigger_rx) = broadcast::channel(16);
        let mut reports = scheduler.subscribe();
        let handle = scheduler.start(trigger_rx);

        std::thread::sleep(Duration::from_millis(50));
        trigger_tx.send(()).unwrap();

        let mut received = false;
        for _ in 0..50 {
            if reports.try_recv().is_ok() {
                received = true;
                break;
            }
            std::thread::sleep(Duration::from_millis(20));
        }

        scheduler.stop();
        let _ = trigger_tx.send(());
        handle.join().expect("scheduler thread panicked");

        assert!(received, "expected a cycle report after a forced trigger");
    }
}
