//! Dynamic directory watcher that triggers reconciliation.

use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{sleep_until, Instant};

use crate::observability::metrics;
use crate::rules::RuleError;
use crate::service::{RulesService, SyncReport};
use crate::storage::fs::is_yaml_path;
use crate::watch::debounce::Debouncer;

/// Something the watcher can ask to reconcile.
pub trait Reconcile: Send + Sync + 'static {
    fn reconcile(&self) -> impl Future<Output = Result<SyncReport, RuleError>> + Send;
}

impl Reconcile for RulesService {
    fn reconcile(&self) -> impl Future<Output = Result<SyncReport, RuleError>> + Send {
        self.sync_from_disk()
    }
}

#[derive(Debug)]
enum WatchSignal {
    Changed,
    Stop,
}

/// Watches the flat set of YAML files in a directory and runs one reconciliation
/// per burst of changes.
pub struct FileWatcher {
    signals: mpsc::UnboundedSender<WatchSignal>,
    task: JoinHandle<()>,
    _watcher: Option<RecommendedWatcher>,
}

impl FileWatcher {
    /// Subscribe to `dir` and start the debounce loop.
    pub fn start<T: Reconcile>(
        dir: &Path,
        delay: Duration,
        target: Arc<T>,
    ) -> Result<Self, notify::Error> {
        let (signals, rx) = mpsc::unbounded_channel();
        let tx = signals.clone();
        let watched: PathBuf = dir.to_path_buf();

        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| match res {
                Ok(event) => {
                    if is_relevant(&event) {
                        metrics::record_watch_event();
                        tracing::debug!(paths = ?event.paths, kind = ?event.kind, "Rule file change detected");
                        let _ = tx.send(WatchSignal::Changed);
                    }
                }
                Err(e) => tracing::error!("Watch error: {:?}", e),
            },
            Config::default(),
        )?;
        watcher.watch(&watched, RecursiveMode::NonRecursive)?;

        tracing::info!(path = %watched.display(), delay_ms = delay.as_millis() as u64, "Rule watcher started");

        let task = tokio::spawn(debounce_loop(rx, delay, target));
        Ok(Self {
            signals,
            task,
            _watcher: Some(watcher),
        })
    }

    /// Start the debounce loop without a filesystem subscription.
    ///
    /// Changes are reported only through [`FileWatcher::trigger`].
    pub fn manual<T: Reconcile>(delay: Duration, target: Arc<T>) -> Self {
        let (signals, rx) = mpsc::unbounded_channel();
        let task = tokio::spawn(debounce_loop(rx, delay, target));
        Self {
            signals,
            task,
            _watcher: None,
        }
    }

    /// Report a change as if the filesystem had produced one.
    pub fn trigger(&self) {
        let _ = self.signals.send(WatchSignal::Changed);
    }

    /// Drop the subscription, cancel any pending reconciliation and wait for the loop.
    pub async fn stop(self) {
        let _ = self.signals.send(WatchSignal::Stop);
        drop(self._watcher);
        if let Err(e) = self.task.await {
            tracing::error!(error = %e, "Rule watcher task failed");
        }
        tracing::info!("Rule watcher stopped");
    }
}

fn is_relevant(event: &Event) -> bool {
    let kind_matches = matches!(
        event.kind,
        EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_)
    );
    kind_matches && event.paths.iter().any(|p| is_yaml_path(p))
}

async fn debounce_loop<T: Reconcile>(
    mut rx: mpsc::UnboundedReceiver<WatchSignal>,
    delay: Duration,
    target: Arc<T>,
) {
    let mut debouncer = Debouncer::new(delay);

    loop {
        let deadline = debouncer.deadline();
        tokio::select! {
            signal = rx.recv() => match signal {
                Some(WatchSignal::Changed) => {
                    debouncer.trigger(Instant::now());
                }
                Some(WatchSignal::Stop) | None => {
                    debouncer.cancel();
                    break;
                }
            },
            _ = sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => {
                if debouncer.fire(Instant::now()) {
                    match target.reconcile().await {
                        Ok(report) => tracing::debug!(rules = report.count, "Watcher-triggered reconciliation finished"),
                        Err(e) => tracing::error!(error = %e, "Watcher-triggered reconciliation failed"),
                    }
                }
            }
        }
    }
}
