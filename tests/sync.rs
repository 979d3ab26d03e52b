use std::sync::Arc;

use parley::{
    storage_root, FileStorage, SessionStore, SessionSyncEvent, StorageBackend, StorageWatcher,
    StoredSession, SyncEventBus,
};
use tokio::sync::broadcast;
use tokio::time::Duration;

async fn wait_for(
    events: &mut broadcast::Receiver<SessionSyncEvent>,
    want_kind: &str,
    want_id: Option<&str>,
) -> bool {
    tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            match events.recv().await {
                Ok(event) => {
                    if event.kind() == want_kind
                        && (want_id.is_none() || event.session_id() == want_id)
                    {
                        return true;
                    }
                }
                Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => return false,
            }
        }
    })
    .await
    .unwrap_or(false)
}

#[tokio::test]
async fn external_storage_write_is_republished_as_updated() {
    let dir = tempfile::tempdir().expect("tempdir should be created");
    let root = storage_root(dir.path());
    let store = SessionStore::new(Arc::new(FileStorage::new(&root)) as Arc<dyn StorageBackend>);

    let bus = SyncEventBus::default();
    let mut events = bus.subscribe();
    let _watcher =
        StorageWatcher::spawn(&root, store.clone(), bus.clone()).expect("watcher should start");

    // Another process sharing the storage root: a separate store handle.
    let other = SessionStore::new(Arc::new(FileStorage::new(&root)) as Arc<dyn StorageBackend>);
    other
        .save(&StoredSession::new("session-external", Some("user-1"), true))
        .expect("external write should succeed");

    assert!(
        wait_for(&mut events, "updated", Some("session-external")).await,
        "expected an updated event for the external write"
    );
}

#[tokio::test]
async fn external_storage_clear_is_republished_as_cleared() {
    let dir = tempfile::tempdir().expect("tempdir should be created");
    let root = storage_root(dir.path());
    let store = SessionStore::new(Arc::new(FileStorage::new(&root)) as Arc<dyn StorageBackend>);
    store
        .save(&StoredSession::new("session-1", Some("user-1"), true))
        .expect("seed record");

    let bus = SyncEventBus::default();
    let mut events = bus.subscribe();
    let _watcher =
        StorageWatcher::spawn(&root, store.clone(), bus.clone()).expect("watcher should start");

    let other = SessionStore::new(Arc::new(FileStorage::new(&root)) as Arc<dyn StorageBackend>);
    other.clear().expect("external clear should succeed");

    assert!(
        wait_for(&mut events, "cleared", None).await,
        "expected a cleared event for the external remove"
    );
}

#[tokio::test]
async fn malformed_external_write_fails_closed_to_cleared() {
    let dir = tempfile::tempdir().expect("tempdir should be created");
    let root = storage_root(dir.path());
    let backend = Arc::new(FileStorage::new(&root));
    let store = SessionStore::new(Arc::clone(&backend) as Arc<dyn StorageBackend>);

    let bus = SyncEventBus::default();
    let mut events = bus.subscribe();
    let _watcher =
        StorageWatcher::spawn(&root, store.clone(), bus.clone()).expect("watcher should start");

    backend
        .write(parley::SESSION_STORAGE_KEY, "{corrupt")
        .expect("raw write should succeed");

    assert!(
        wait_for(&mut events, "cleared", None).await,
        "malformed external write should read as cleared"
    );
}
