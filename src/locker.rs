// CLASSIFICATION: COMMUNITY
// Filename: locker.rs v0.4
// Author: Lukas Bower
// Date Modified: 2026-08-01

//! Process-wide path-conflict coordinator.
//!
//! Two reference-counted key spaces are maintained under one mutex: exact
//! keys (a single point on disk) and subtree keys (a point plus all its
//! descendants). A request acquires all of its keys atomically or blocks on
//! the shared condition variable until it can; release broadcasts so every
//! waiter re-checks its predicate. All-or-nothing acquisition is what rules
//! out inverse-order deadlock between multi-key requests.
//!
//! Keys are lexically canonicalized, deduplicated, and sorted before
//! acquisition, so equivalent spellings of a path conflict and a duplicate
//! key in one request counts once.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

use log::debug;
use parking_lot::{Condvar, Mutex};

use crate::sandbox::lexical_clean;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LockMode {
    Exact,
    Subtree,
}

#[derive(Debug, Default)]
struct LockTables {
    exact: HashMap<PathBuf, usize>,
    subtree: HashMap<PathBuf, usize>,
}

impl LockTables {
    fn can_acquire(&self, mode: LockMode, keys: &[PathBuf]) -> bool {
        match mode {
            LockMode::Exact => keys.iter().all(|key| {
                !self.exact.contains_key(key)
                    && !self
                        .subtree
                        .keys()
                        .any(|held| is_same_or_descendant(key, held))
            }),
            LockMode::Subtree => keys.iter().all(|key| {
                !self
                    .exact
                    .keys()
                    .any(|held| is_same_or_descendant(held, key))
                    && !self.subtree.keys().any(|held| subtrees_overlap(key, held))
            }),
        }
    }

    fn map_mut(&mut self, mode: LockMode) -> &mut HashMap<PathBuf, usize> {
        match mode {
            LockMode::Exact => &mut self.exact,
            LockMode::Subtree => &mut self.subtree,
        }
    }
}

/// Coordinator for conflicting exact-path and directory-subtree mutations.
///
/// Construct exactly one per process and share it by reference; the conflict
/// rules are cross-mode, so both key spaces must live under the same mutex.
#[derive(Default)]
pub struct PathLocker {
    tables: Mutex<LockTables>,
    freed: Condvar,
}

impl PathLocker {
    /// Create an empty coordinator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquire exclusive access to each listed point, not including
    /// descendants or ancestors. Blocks until no conflicting keys are held.
    pub fn lock_exact<I, P>(&self, paths: I) -> PathGuard<'_>
    where
        I: IntoIterator<Item = P>,
        P: AsRef<Path>,
    {
        self.lock(LockMode::Exact, normalize_lock_paths(paths))
    }

    /// Acquire exclusive access to each listed root together with all of its
    /// descendants. Blocks until no conflicting keys are held.
    pub fn lock_subtree<I, P>(&self, paths: I) -> PathGuard<'_>
    where
        I: IntoIterator<Item = P>,
        P: AsRef<Path>,
    {
        self.lock(LockMode::Subtree, normalize_lock_paths(paths))
    }

    fn lock(&self, mode: LockMode, keys: Vec<PathBuf>) -> PathGuard<'_> {
        if keys.is_empty() {
            return PathGuard {
                locker: self,
                mode,
                keys,
                released: AtomicBool::new(true),
            };
        }

        let mut tables = self.tables.lock();
        if !tables.can_acquire(mode, &keys) {
            debug!("lock request for {keys:?} waiting on conflicting holders");
            while !tables.can_acquire(mode, &keys) {
                self.freed.wait(&mut tables);
            }
        }
        for key in &keys {
            *tables.map_mut(mode).entry(key.clone()).or_insert(0) += 1;
        }
        drop(tables);

        PathGuard {
            locker: self,
            mode,
            keys,
            released: AtomicBool::new(false),
        }
    }

    fn unlock(&self, mode: LockMode, keys: &[PathBuf]) {
        let mut tables = self.tables.lock();
        let map = tables.map_mut(mode);
        for key in keys {
            if let Some(count) = map.get_mut(key) {
                *count -= 1;
                if *count == 0 {
                    map.remove(key);
                }
            }
        }
        self.freed.notify_all();
    }

    #[cfg(test)]
    fn is_idle(&self) -> bool {
        let tables = self.tables.lock();
        tables.exact.is_empty() && tables.subtree.is_empty()
    }

    #[cfg(test)]
    fn exact_count(&self, path: &str) -> usize {
        let tables = self.tables.lock();
        tables
            .exact
            .get(&canonical_key(Path::new(path)))
            .copied()
            .unwrap_or(0)
    }
}

/// Handle for a held set of lock keys.
///
/// The keys are released when the guard drops; [`PathGuard::release`] may be
/// called early and is idempotent — each key is decremented exactly once no
/// matter how often or through which path release happens.
pub struct PathGuard<'l> {
    locker: &'l PathLocker,
    mode: LockMode,
    keys: Vec<PathBuf>,
    released: AtomicBool,
}

impl PathGuard<'_> {
    /// Release the held keys now instead of at drop time.
    pub fn release(&self) {
        if self.released.swap(true, Ordering::AcqRel) {
            return;
        }
        if !self.keys.is_empty() {
            self.locker.unlock(self.mode, &self.keys);
        }
    }
}

impl Drop for PathGuard<'_> {
    fn drop(&mut self) {
        self.release();
    }
}

fn normalize_lock_paths<I, P>(paths: I) -> Vec<PathBuf>
where
    I: IntoIterator<Item = P>,
    P: AsRef<Path>,
{
    let mut keys: Vec<PathBuf> = paths
        .into_iter()
        .map(|path| canonical_key(path.as_ref()))
        .collect();
    keys.sort();
    keys.dedup();
    keys
}

/// Canonical map key for a path: lexically cleaned, rendered absolute.
fn canonical_key(path: &Path) -> PathBuf {
    let cleaned = lexical_clean(path);
    if cleaned.is_absolute() {
        return cleaned;
    }
    match std::env::current_dir() {
        Ok(cwd) => lexical_clean(&cwd.join(&cleaned)),
        Err(_) => cleaned,
    }
}

/// Equality counts as descendant; computed lexically, component-wise.
fn is_same_or_descendant(path: &Path, root: &Path) -> bool {
    path.starts_with(root)
}

fn subtrees_overlap(a: &Path, b: &Path) -> bool {
    is_same_or_descendant(a, b) || is_same_or_descendant(b, a)
}
