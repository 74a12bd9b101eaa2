// Per-path mutual exclusion for shared ledger files
// Author: kelexine (https://github.com/kelexine)
//
// The call log and the daily rollup are shared files that several workers in
// one process may write at once. Every writer takes the lock registered for
// the file's absolute path, so two handles on the same file serialize even if
// they were constructed independently.

use once_cell::sync::Lazy;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

/// Global path → lock registry.
///
/// Entries are never removed: the registry holds one lock per distinct path
/// for the life of the process.
static PATH_LOCKS: Lazy<Mutex<HashMap<PathBuf, Arc<Mutex<()>>>>> =
    Lazy::new(|| Mutex::new(HashMap::new()));

/// Normalize a path so `logs/daily.json` and `./logs/daily.json` share a lock.
pub fn lock_key(path: &Path) -> PathBuf {
    let absolute = std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf());
    absolute.components().collect()
}

/// Return the lock guarding `path`, creating it on first use.
///
/// Every call with a new path adds a registry entry that lives until exit.
pub fn lock_for(path: &Path) -> Arc<Mutex<()>> {
    let key = lock_key(path);
    let mut registry = PATH_LOCKS.lock();
    registry
        .entry(key)
        .or_insert_with_key(|k| {
            debug!("Registering write lock for {}", k.display());
            Arc::new(Mutex::new(()))
        })
        .clone()
}
