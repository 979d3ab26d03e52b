use std::path::Path;

use notify::{recommended_watcher, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tracing::debug;

use session_store::SessionStore;

use crate::bus::{SessionSyncEvent, SyncEventBus};

/// Bridges external storage mutations onto the sync bus.
///
/// Another process writing the same storage root (the "other tab")
/// surfaces here as `updated`/`cleared` events. The bus API itself is
/// transport independent; this watcher is just one notifier. No lock
/// spans processes, so a narrow divergence window is accepted and
/// self-heals on the next read.
pub struct StorageWatcher {
    _watcher: RecommendedWatcher,
}

impl StorageWatcher {
    /// Watch `root` and republish record changes. The watcher stops
    /// when the returned value is dropped.
    pub fn spawn(root: &Path, store: SessionStore, bus: SyncEventBus) -> notify::Result<Self> {
        std::fs::create_dir_all(root).map_err(notify::Error::io)?;

        let mut watcher = recommended_watcher(move |result: notify::Result<Event>| {
            let Ok(event) = result else {
                return;
            };
            if !matches!(
                event.kind,
                EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_)
            ) {
                return;
            }

            // Re-read through the store so malformed external writes
            // fail closed exactly like local reads do.
            match store.load() {
                Some(record) => {
                    debug!(session_id = %record.session_id, "external storage write observed");
                    bus.publish(SessionSyncEvent::Updated {
                        session_id: record.session_id,
                    });
                }
                None => bus.publish(SessionSyncEvent::Cleared),
            }
        })?;

        watcher.watch(root, RecursiveMode::NonRecursive)?;
        Ok(Self { _watcher: watcher })
    }
}
