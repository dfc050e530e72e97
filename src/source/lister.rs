//! Object listing: the discovery side of a [`FileSource`](super::FileSource).

use anyhow::{Result, bail};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::SystemTime;

use crate::ObjectDescriptor;

/// Result of one list call.
#[derive(Clone, Debug)]
pub struct Listing {
    /// Direct children of the prefix in lexicographic order; subdirectories appear once each as
    /// prefix markers.
    pub objects: Vec<ObjectDescriptor>,
    /// The store's own notion of "now" for this listing.
    pub checkpoint: SystemTime,
}

/// Enumerates objects under a prefix.
///
/// Objects with a known modification time older than `since` are left out. Objects with no
/// modification time are always returned; callers dedupe.
pub trait ObjectLister: Send + Sync {
    fn list(&self, prefix: &str, since: SystemTime) -> Result<Listing>;
}

/// Keep `updated` unless it is known to be older than `since`.
pub(crate) fn modified_since(updated: Option<SystemTime>, since: SystemTime) -> bool {
    updated.is_none_or(|t| t >= since)
}

/// In-memory object store keyed by full path. Thread-safe; objects may be added while a
/// dispatcher is draining it.
#[derive(Default)]
pub struct MemoryLister {
    objects: Mutex<BTreeMap<String, Option<SystemTime>>>,
    fail_next: AtomicUsize,
    calls: AtomicUsize,
}

impl MemoryLister {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, path: impl Into<String>, updated: Option<SystemTime>) {
        if let Ok(mut objects) = self.objects.lock() {
            objects.insert(path.into(), updated);
        }
    }

    pub fn remove(&self, path: &str) {
        if let Ok(mut objects) = self.objects.lock() {
            objects.remove(path);
        }
    }

    /// Make the next `n` list calls fail.
    pub fn fail_next(&self, n: usize) {
        self.fail_next.store(n, Ordering::SeqCst);
    }

    /// Number of list calls made so far, failed ones included.
    pub fn list_calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl ObjectLister for MemoryLister {
    fn list(&self, prefix: &str, since: SystemTime) -> Result<Listing> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self
            .fail_next
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
        {
            bail!("injected list failure for {prefix}");
        }

        let checkpoint = SystemTime::now();
        let Ok(objects) = self.objects.lock() else {
            bail!("memory lister lock poisoned");
        };
        let mut out = Vec::new();
        let mut subdirs = BTreeSet::new();
        for (path, updated) in objects.range(prefix.to_string()..) {
            let Some(rest) = path.strip_prefix(prefix) else {
                break;
            };
            if let Some(slash) = rest.find('/') {
                let subdir = format!("{prefix}{}", &rest[..=slash]);
                if subdirs.insert(subdir.clone()) {
                    out.push(ObjectDescriptor::prefix(subdir));
                }
                continue;
            }
            if modified_since(*updated, since) {
                out.push(ObjectDescriptor::object(path.clone(), *updated));
            }
        }
        Ok(Listing {
            objects: out,
            checkpoint,
        })
    }
}
