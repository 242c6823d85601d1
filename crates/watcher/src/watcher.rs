use crate::settle::{affected_widget, settle, Trigger, WatchEvent};
use notify::{Config as NotifyConfig, Event, EventKind, PollWatcher, RecursiveMode, Watcher};
use nxui_core::{WidgetError, WidgetResult};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};
use tokio::sync::mpsc::UnboundedSender;

const IDLE_WAIT: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WatcherConfig {
    /// Quiet period required before a change is emitted.
    pub stability_window: Duration,
    /// Interval for the polling fallback backend.
    pub poll_interval: Duration,
}

impl Default for WatcherConfig {
    fn default() -> Self {
        Self {
            stability_window: Duration::from_millis(500),
            poll_interval: Duration::from_millis(100),
        }
    }
}

enum Message {
    Paths(Vec<PathBuf>),
    Stop,
}

fn make_event_handler(
    tx: Sender<Message>,
) -> impl Fn(Result<Event, notify::Error>) + Send + 'static {
    move |result: Result<Event, notify::Error>| match result {
        Ok(event) => {
            if matches!(event.kind, EventKind::Access(_)) || event.paths.is_empty() {
                return;
            }
            // Worker gone means the watcher is shutting down.
            let _ = tx.send(Message::Paths(event.paths));
        }
        Err(e) => tracing::warn!("Widget watch error: {}", e),
    }
}

fn create_watcher(
    tx: Sender<Message>,
    poll_interval: Duration,
) -> WidgetResult<Box<dyn Watcher + Send>> {
    match notify::recommended_watcher(make_event_handler(tx.clone())) {
        Ok(watcher) => {
            tracing::debug!("Widget watcher: using native backend");
            Ok(Box::new(watcher))
        }
        Err(e) => {
            tracing::warn!(
                "Widget watcher: native backend unavailable ({}); falling back to polling",
                e
            );
            let config = NotifyConfig::default().with_poll_interval(poll_interval);
            let watcher = PollWatcher::new(make_event_handler(tx), config)
                .map_err(|e| WidgetError::Watch(e.to_string()))?;
            Ok(Box::new(watcher))
        }
    }
}

struct Debouncer {
    roots: Vec<PathBuf>,
    known: HashSet<String>,
    pending: HashMap<String, (Instant, Trigger)>,
    window: Duration,
}

impl Debouncer {
    fn note(&mut self, path: &Path) {
        let Some((id, trigger)) = self
            .roots
            .iter()
            .find_map(|root| affected_widget(root, path))
        else {
            return;
        };
        let now = Instant::now();
        self.pending
            .entry(id)
            .and_modify(|(seen, current)| {
                *seen = now;
                *current = current.merge(trigger);
            })
            .or_insert((now, trigger));
    }

    /// How long the worker may sleep before something becomes due.
    fn next_wait(&self) -> Duration {
        let now = Instant::now();
        self.pending
            .values()
            .map(|(seen, _)| (*seen + self.window).saturating_duration_since(now))
            .min()
            .unwrap_or(IDLE_WAIT)
    }

    fn drain_due(&mut self) -> Vec<WatchEvent> {
        let now = Instant::now();
        let mut due: Vec<(String, Trigger)> = self
            .pending
            .iter()
            .filter(|(_, (seen, _))| now.duration_since(*seen) >= self.window)
            .map(|(id, (_, trigger))| (id.clone(), *trigger))
            .collect();
        due.sort_by(|a, b| a.0.cmp(&b.0));
        for (id, _) in &due {
            self.pending.remove(id);
        }

        let root = self.roots[0].clone();
        due.into_iter()
            .filter_map(|(id, trigger)| settle(&root, &id, trigger, &mut self.known))
            .collect()
    }
}

fn run_worker(mut debouncer: Debouncer, rx: Receiver<Message>, tx: UnboundedSender<WatchEvent>) {
    loop {
        match rx.recv_timeout(debouncer.next_wait()) {
            Ok(Message::Paths(paths)) => {
                for path in &paths {
                    debouncer.note(path);
                }
            }
            Ok(Message::Stop) | Err(RecvTimeoutError::Disconnected) => break,
            Err(RecvTimeoutError::Timeout) => {}
        }

        for event in debouncer.drain_due() {
            tracing::info!("Widget {:?}: {}", event.kind, event.id);
            if tx.send(event).is_err() {
                tracing::debug!("Watch consumer dropped; stopping worker");
                return;
            }
        }
    }
}

/// Recursive watch over the widget root that reports settled per-widget changes.
pub struct WidgetWatcher {
    root: PathBuf,
    watcher: Option<Box<dyn Watcher + Send>>,
    control: Sender<Message>,
    worker: Option<JoinHandle<()>>,
}

impl std::fmt::Debug for WidgetWatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WidgetWatcher")
            .field("root", &self.root)
            .field("running", &self.worker.is_some())
            .finish()
    }
}

impl WidgetWatcher {
    /// Start watching `root`. `known` holds the identifiers already loaded so
    /// that existing widgets produce no initial events.
    pub fn start(
        root: &Path,
        known: HashSet<String>,
        config: WatcherConfig,
        events: UnboundedSender<WatchEvent>,
    ) -> WidgetResult<Self> {
        if !root.is_dir() {
            return Err(WidgetError::NotFound(root.to_path_buf()));
        }

        let mut roots = vec![root.to_path_buf()];
        if let Ok(canonical) = root.canonicalize() {
            if canonical != root {
                roots.push(canonical);
            }
        }

        let (tx, rx) = mpsc::channel();
        let mut watcher = create_watcher(tx.clone(), config.poll_interval)?;
        watcher
            .watch(root, RecursiveMode::Recursive)
            .map_err(|e| WidgetError::Watch(format!("{}: {}", root.display(), e)))?;

        let debouncer = Debouncer {
            roots,
            known,
            pending: HashMap::new(),
            window: config.stability_window,
        };
        let worker = std::thread::Builder::new()
            .name("nxui-watcher".to_string())
            .spawn(move || run_worker(debouncer, rx, events))
            .map_err(WidgetError::Io)?;

        tracing::info!("Watching widget directory {}", root.display());
        Ok(Self {
            root: root.to_path_buf(),
            watcher: Some(watcher),
            control: tx,
            worker: Some(worker),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn is_running(&self) -> bool {
        self.worker.is_some()
    }

    /// Release the OS watch and wait for the worker to exit. Safe to call twice.
    pub fn stop(&mut self) {
        let Some(worker) = self.worker.take() else {
            return;
        };
        drop(self.watcher.take());
        let _ = self.control.send(Message::Stop);
        if worker.join().is_err() {
            tracing::error!("Widget watcher worker panicked");
        }
        tracing::info!("Stopped watching {}", self.root.display());
    }
}

impl Drop for WidgetWatcher {
    fn drop(&mut self) {
        self.stop();
    }
}
