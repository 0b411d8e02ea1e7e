//! Folder scanning and pending-scan bookkeeping

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use futures::future::join_all;
use parking_lot::Mutex;
use stencil_common::{format_error, SyncMap};
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::definition::DefinitionStore;
use crate::engine::TemplateEngineRegistry;
use crate::error::{IoOperation, TemplateError, TemplateResult};
use crate::model::Template;

/// Cache of parsed templates keyed by absolute file path
pub type TemplateCache = SyncMap<PathBuf, Arc<Template>>;

/// Handle for one in-flight scan, returned by [`ScanTracker::begin`]
#[derive(Debug)]
pub struct ScanTicket {
    id: u64,
    done: watch::Sender<bool>,
}

/// Tracks in-flight scans so callers can wait for them and so the end of
/// a batch is detected exactly once.
#[derive(Debug, Default)]
pub struct ScanTracker {
    next_id: AtomicU64,
    pending: Mutex<HashMap<u64, watch::Receiver<bool>>>,
}

impl ScanTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a scan as pending. Call before spawning it.
    pub fn begin(&self) -> ScanTicket {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (done, rx) = watch::channel(false);
        self.pending.lock().insert(id, rx);
        ScanTicket { id, done }
    }

    /// Mark a scan finished. The completion that leaves no scans pending
    /// runs `on_batch_complete` (the check and the removal share one lock)
    /// and returns `true`. Waiters are released afterwards.
    pub fn finish<F>(&self, ticket: ScanTicket, on_batch_complete: F) -> bool
    where
        F: FnOnce(),
    {
        let last = {
            let mut pending = self.pending.lock();
            pending.remove(&ticket.id);
            pending.is_empty()
        };
        if last {
            on_batch_complete();
        }
        let _ = ticket.done.send(true);
        last
    }

    pub fn pending_count(&self) -> usize {
        self.pending.lock().len()
    }

    /// Wait for the scans pending right now. Scans started later are not
    /// waited on.
    pub async fn wait_for_pending(&self) {
        let receivers: Vec<watch::Receiver<bool>> = self.pending.lock().values().cloned().collect();
        if receivers.is_empty() {
            return;
        }
        debug!(count = receivers.len(), "Waiting for pending template scans");
        join_all(receivers.into_iter().map(|mut rx| async move {
            // A dropped sender also means the scan is over
            let _ = rx.wait_for(|done| *done).await;
        }))
        .await;
    }
}

/// Parse a single file with the engine registered for its extension.
///
/// `None` when no engine handles the extension, when the engine declines the
/// file, or when the file is malformed (logged as a warning).
pub fn load_template_file(path: &Path, engines: &TemplateEngineRegistry) -> Option<Template> {
    let extension = path.extension()?.to_string_lossy().to_lowercase();
    let engine = engines.by_file_extension(&extension)?;
    match engine.create_template_from_file(path) {
        Ok(template) => Some(template),
        Err(e) if e.is_not_a_template() => {
            debug!(path = %path.display(), engine = engine.id(), "Not a template");
            None
        }
        Err(e) => {
            warn!(engine = engine.id(), error = %format_error(&e), "Skipping malformed template");
            None
        }
    }
}

/// Walk `folder` recursively and add every new template to the cache.
/// Returns the paths this scan added. Errors are logged, never returned.
pub fn scan_folder(
    folder: &Path,
    engines: &TemplateEngineRegistry,
    cache: &TemplateCache,
) -> Vec<PathBuf> {
    let mut added = Vec::new();
    match scan_directory(folder, engines, cache, &mut added) {
        Ok(()) => info!(folder = %folder.display(), added = added.len(), "Scanned template folder"),
        Err(e) => warn!(
            folder = %folder.display(),
            error = %format_error(&e),
            "Template folder scan failed"
        ),
    }
    added
}

fn scan_directory(
    dir: &Path,
    engines: &TemplateEngineRegistry,
    cache: &TemplateCache,
    added: &mut Vec<PathBuf>,
) -> TemplateResult<()> {
    let mut subdirectories = Vec::new();
    let mut files = Vec::new();
    for entry in fs::read_dir(dir).map_err(|e| TemplateError::io(dir, IoOperation::Read, e))? {
        let path = entry.map_err(|e| TemplateError::io(dir, IoOperation::Read, e))?.path();
        if path.is_dir() {
            subdirectories.push(path);
        } else if path.is_file() {
            files.push(path);
        }
    }
    subdirectories.sort();
    files.sort();

    for subdirectory in &subdirectories {
        if let Err(e) = scan_directory(subdirectory, engines, cache, added) {
            warn!(error = %format_error(&e), "Skipping template subfolder");
        }
    }

    for file in files {
        if DefinitionStore::is_definition_file(&file) || cache.contains(&file) {
            continue;
        }
        let Some(template) = load_template_file(&file, engines) else {
            continue;
        };
        let id = template.id.clone();
        if cache.insert_if_absent(file.clone(), Arc::new(template)) {
            debug!(template = %id, path = %file.display(), "Cached template");
            added.push(file);
        }
    }
    Ok(())
}
