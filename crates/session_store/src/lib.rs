mod error;
mod paths;
mod schema;
mod storage;
mod store;

pub use error::SessionStoreError;
pub use paths::storage_root;
pub use schema::StoredSession;
pub use storage::{FileStorage, MemoryStorage, StorageBackend};
pub use store::{utc_now_rfc3339, SessionStore, SESSION_STORAGE_KEY};
