//! Local-directory lister: treats a directory as an object prefix.

use anyhow::{Context, Result};
use log::{trace, warn};
use std::fs::Metadata;
use std::time::SystemTime;
use walkdir::WalkDir;

use super::lister::{Listing, ObjectLister, modified_since};
use crate::ObjectDescriptor;

/// Lists the direct children of a directory. Subdirectories become prefix markers (with a
/// trailing `/`), files become objects carrying their arrival time.
///
/// Names that are not valid UTF-8 are skipped with a warning: the path could not be handed to a
/// runner unchanged.
#[derive(Clone, Copy, Debug, Default)]
pub struct LocalLister {
    pub follow_links: bool,
}

impl LocalLister {
    pub fn new() -> Self {
        Self::default()
    }
}

/// When the file landed in the directory. Moves and mtime-preserving copies keep an old mtime,
/// so on Unix the inode change time is taken when it is later.
#[cfg(unix)]
fn arrival_time(meta: &Metadata) -> Option<SystemTime> {
    use std::os::unix::fs::MetadataExt;
    use std::time::{Duration, UNIX_EPOCH};

    let changed = u64::try_from(meta.ctime())
        .ok()
        .and_then(|secs| {
            let nanos = u32::try_from(meta.ctime_nsec()).unwrap_or(0);
            UNIX_EPOCH.checked_add(Duration::new(secs, nanos))
        });
    match (meta.modified().ok(), changed) {
        (Some(m), Some(c)) => Some(m.max(c)),
        (m, c) => m.or(c),
    }
}

#[cfg(not(unix))]
fn arrival_time(meta: &Metadata) -> Option<SystemTime> {
    meta.modified().ok()
}

impl ObjectLister for LocalLister {
    fn list(&self, prefix: &str, since: SystemTime) -> Result<Listing> {
        let checkpoint = SystemTime::now();
        let mut objects = Vec::new();
        let walker = WalkDir::new(prefix)
            .min_depth(1)
            .max_depth(1)
            .follow_links(self.follow_links)
            .sort_by_file_name();
        for entry in walker {
            let entry = entry.with_context(|| format!("list {prefix}"))?;
            let Some(path) = entry.path().to_str() else {
                warn!("Skipping non-UTF-8 name: {}", entry.path().display());
                continue;
            };
            if entry.file_type().is_dir() {
                objects.push(ObjectDescriptor::prefix(format!("{path}/")));
                continue;
            }
            let updated = entry.metadata().ok().as_ref().and_then(arrival_time);
            if modified_since(updated, since) {
                objects.push(ObjectDescriptor::object(path, updated));
            } else {
                trace!("unchanged since checkpoint: {path}");
            }
        }
        Ok(Listing {
            objects,
            checkpoint,
        })
    }
}
