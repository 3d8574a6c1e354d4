// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use crate::config::WatchConfig;
use crossbeam_channel::{Receiver, RecvTimeoutError};
use ember_core::ChangeSource;
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, Instant};
use thiserror::Error;

/// An error raised while establishing a [`FileWatcher`].
#[derive(Debug, Error)]
pub enum WatchError {
    /// The platform backend could not be initialized.
    #[error("failed to initialize the file watcher: {0}")]
    Init(#[source] notify::Error),
    /// A directory could not be resolved or subscribed to.
    #[error("failed to watch '{}': {source}", .path.display())]
    Watch {
        /// The directory that was requested.
        path: PathBuf,
        /// The backend's error.
        #[source]
        source: notify::Error,
    },
}

/// A debounced view of filesystem notifications under a set of directories.
///
/// Notifications are delivered by the backend's own thread into a channel;
/// every query drains that channel on the caller's thread.
pub struct FileWatcher {
    /// Keeps the subscriptions alive. `None` when events are injected.
    _watcher: Option<RecommendedWatcher>,
    events: Receiver<notify::Result<Event>>,
    config: WatchConfig,
    consecutive_errors: u32,
    degraded: bool,
}

/// Resolves `path` the way the backend reports it, even if it does not exist yet.
fn resolve(path: &Path) -> PathBuf {
    path.canonicalize().unwrap_or_else(|_| {
        std::env::current_dir()
            .map(|cwd| cwd.join(path))
            .unwrap_or_else(|_| path.to_path_buf())
    })
}

impl FileWatcher {
    /// Watches a single directory with the default configuration.
    pub fn init(path: impl Into<PathBuf>) -> Result<Self, WatchError> {
        Self::new(WatchConfig::for_dir(path))
    }

    /// Subscribes to every directory of `config`, recursively.
    ///
    /// # Errors
    ///
    /// Fails if the backend cannot start or any directory cannot be watched.
    /// Both are fatal for the host.
    pub fn new(mut config: WatchConfig) -> Result<Self, WatchError> {
        let (tx, rx) = crossbeam_channel::unbounded();
        let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| {
            // The receiver only goes away with the watcher itself.
            let _ = tx.send(res);
        })
        .map_err(WatchError::Init)?;

        for dir in &mut config.dirs {
            let path = dir
                .canonicalize()
                .map_err(|e| WatchError::Watch {
                    path: dir.clone(),
                    source: notify::Error::io(e),
                })?;
            watcher
                .watch(&path, RecursiveMode::Recursive)
                .map_err(|source| WatchError::Watch {
                    path: dir.clone(),
                    source,
                })?;
            log::info!("Watching '{}' for changes", path.display());
            *dir = path;
        }

        for dir in &mut config.ignore_dirs {
            *dir = resolve(dir);
        }

        Ok(Self {
            _watcher: Some(watcher),
            events: rx,
            config,
            consecutive_errors: 0,
            degraded: false,
        })
    }

    /// Builds a watcher fed from an existing channel instead of the OS backend.
    ///
    /// Paths in the config are used verbatim.
    pub fn from_receiver(events: Receiver<notify::Result<Event>>, config: WatchConfig) -> Self {
        Self {
            _watcher: None,
            events,
            config,
            consecutive_errors: 0,
            degraded: false,
        }
    }

    /// The effective configuration, with resolved directories.
    pub fn config(&self) -> &WatchConfig {
        &self.config
    }

    /// Waits up to the configured poll timeout for a change.
    ///
    /// See [`FileWatcher::changed_within`].
    pub fn changed(&mut self) -> bool {
        self.changed_within(self.config.poll_timeout())
    }

    /// Waits up to `timeout` for a relevant notification.
    ///
    /// Once one arrives, the wait is cut down to the debounce window, which
    /// restarts with every further relevant notification. The call returns
    /// `true` when a window passes quietly, so a burst of writes yields a
    /// single `true`. Returns `false` if `timeout` passes with nothing relevant.
    pub fn changed_within(&mut self, timeout: Duration) -> bool {
        let mut deadline = Instant::now() + timeout;
        let mut changed = false;

        loop {
            match self.events.recv_deadline(deadline) {
                Ok(Ok(event)) => {
                    self.consecutive_errors = 0;
                    if self.is_relevant(&event) {
                        log::trace!("Change detected: {:?} {:?}", event.kind, event.paths);
                        changed = true;
                        deadline = Instant::now() + self.config.debounce();
                    }
                }
                Ok(Err(err)) => self.record_error(err),
                Err(RecvTimeoutError::Timeout) => return changed,
                Err(RecvTimeoutError::Disconnected) => {
                    if !self.degraded {
                        log::error!("File watcher channel closed, changes will no longer be detected");
                        self.degraded = true;
                    }
                    // Still honor the wait, the loop relies on it to sleep.
                    let now = Instant::now();
                    if deadline > now {
                        thread::sleep(deadline - now);
                    }
                    return changed;
                }
            }
        }
    }

    /// Returns `true` once the backend has failed repeatedly or gone away.
    pub fn is_degraded(&self) -> bool {
        self.degraded
    }

    fn is_relevant(&self, event: &Event) -> bool {
        let kind_counts = matches!(
            event.kind,
            EventKind::Any | EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_)
        );
        kind_counts
            && (event.paths.is_empty()
                || event.paths.iter().any(|path| !self.config.is_ignored(path)))
    }

    fn record_error(&mut self, err: notify::Error) {
        self.consecutive_errors += 1;
        log::warn!("File watcher error: {err}");

        if !self.degraded && self.consecutive_errors >= self.config.max_consecutive_errors {
            log::error!(
                "File watcher failed {} times in a row, change detection is unreliable",
                self.consecutive_errors
            );
            self.degraded = true;
        }
    }
}

impl ChangeSource for FileWatcher {
    fn wait_for_change(&mut self, timeout: Duration) -> bool {
        self.changed_within(timeout)
    }
}

impl std::fmt::Debug for FileWatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileWatcher")
            .field("config", &self.config)
            .field("consecutive_errors", &self.consecutive_errors)
            .field("degraded", &self.degraded)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam_channel::Sender;
    use notify::event::{AccessKind, CreateKind, DataChange, ModifyKind};

    type Tx = Sender<notify::Result<Event>>;

    fn watcher() -> (Tx, FileWatcher) {
        let (tx, rx) = crossbeam_channel::unbounded();
        let config = WatchConfig {
            debounce_ms: 20,
            poll_timeout_ms: 40,
            max_consecutive_errors: 3,
            ..WatchConfig::for_dir("/proj/src")
        };
        (tx, FileWatcher::from_receiver(rx, config))
    }

    fn modify(path: &str) -> notify::Result<Event> {
        Ok(Event::new(EventKind::Modify(ModifyKind::Data(DataChange::Content)))
            .add_path(PathBuf::from(path)))
    }

    #[test]
    fn test_quiet_poll_is_false() {
        let (_tx, mut w) = watcher();
        let start = Instant::now();
        assert!(!w.changed());
        assert!(start.elapsed() >= Duration::from_millis(40));
    }

    #[test]
    fn test_burst_collapses_into_one_change() {
        let (tx, mut w) = watcher();
        for _ in 0..5 {
            tx.send(modify("/proj/src/main.rs")).unwrap();
        }
        tx.send(Ok(Event::new(EventKind::Create(CreateKind::File))
            .add_path(PathBuf::from("/proj/src/new.rs"))))
            .unwrap();

        assert!(w.changed_within(Duration::from_secs(1)));
        assert!(!w.changed());
    }

    #[test]
    fn test_events_spread_within_window_still_collapse() {
        let (tx, mut w) = watcher();
        let sender = thread::spawn(move || {
            for _ in 0..3 {
                tx.send(modify("/proj/src/main.rs")).unwrap();
                thread::sleep(Duration::from_millis(5));
            }
            tx
        });

        assert!(w.changed_within(Duration::from_secs(1)));
        let _tx = sender.join().unwrap();
        assert!(!w.changed());
    }

    #[test]
    fn test_ignored_and_access_events_do_not_count() {
        let (tx, mut w) = watcher();
        tx.send(modify("/proj/src/asset.h")).unwrap();
        tx.send(Ok(Event::new(EventKind::Access(AccessKind::Any))
            .add_path(PathBuf::from("/proj/src/main.rs"))))
            .unwrap();
        assert!(!w.changed());
    }

    #[test]
    fn test_event_without_paths_counts() {
        let (tx, mut w) = watcher();
        tx.send(Ok(Event::new(EventKind::Any))).unwrap();
        assert!(w.changed());
    }

    #[test]
    fn test_repeated_errors_degrade_the_watcher() {
        let (tx, mut w) = watcher();
        for _ in 0..2 {
            tx.send(Err(notify::Error::generic("backend hiccup"))).unwrap();
        }
        assert!(!w.changed());
        assert!(!w.is_degraded());

        tx.send(Err(notify::Error::generic("backend hiccup"))).unwrap();
        assert!(!w.changed());
        assert!(w.is_degraded());
    }

    #[test]
    fn test_successful_event_resets_error_streak() {
        let (tx, mut w) = watcher();
        tx.send(Err(notify::Error::generic("a"))).unwrap();
        tx.send(Err(notify::Error::generic("b"))).unwrap();
        tx.send(modify("/proj/src/lib.rs")).unwrap();
        tx.send(Err(notify::Error::generic("c"))).unwrap();
        assert!(w.changed());
        assert!(!w.is_degraded());
    }

    #[test]
    fn test_disconnected_channel_still_waits() {
        let (tx, mut w) = watcher();
        drop(tx);
        let start = Instant::now();
        assert!(!w.changed_within(Duration::from_millis(30)));
        assert!(start.elapsed() >= Duration::from_millis(30));
        assert!(w.is_degraded());
    }
}
