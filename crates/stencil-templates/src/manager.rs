//! Template manager
//!
//! Owns the registered template folders, the template cache and the path
//! resolver. Registering a folder starts a background scan; scans run on
//! Tokio's blocking pool, bounded by a semaphore, and the end of each batch
//! is announced once on a broadcast channel.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use tokio::runtime::Handle;
use tokio::sync::{broadcast, Semaphore};
use tracing::{debug, error, info};

use crate::engine::TemplateEngineRegistry;
use crate::error::{TemplateError, TemplateResult};
use crate::identifier::TemplateIdentifierSyntax;
use crate::model::{Template, TemplateType};
use crate::resolver::{absolute_path, TemplatePathResolver};
use crate::scan::{load_template_file, scan_folder, ScanTicket, ScanTracker, TemplateCache};
use crate::settings::{TemplateSettings, DEFAULT_MAX_CONCURRENT_SCANS};

const EVENT_CAPACITY: usize = 16;

/// Notifications published by [`TemplateManager`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TemplateManagerEvent {
    /// The last pending scan of a batch finished
    TemplatesLoaded {
        /// Templates cached at that moment
        template_count: usize,
    },
}

/// Discovers, caches and looks up templates. Cheap to clone; clones share state.
#[derive(Clone)]
pub struct TemplateManager {
    inner: Arc<Inner>,
}

struct Inner {
    resolver: RwLock<TemplatePathResolver>,
    engines: Arc<TemplateEngineRegistry>,
    cache: TemplateCache,
    /// Workspace templates folder, when registered, is always first
    folders: Mutex<Vec<PathBuf>>,
    scans: ScanTracker,
    events: broadcast::Sender<TemplateManagerEvent>,
    permits: Arc<Semaphore>,
}

impl Inner {
    /// A scan whose folder was unregistered while it ran drops what it
    /// added, except files that a registered folder still covers. Holding
    /// the folder lock keeps a re-registration from slipping in between.
    fn discard_stale_scan(&self, folder: &Path, added: &[PathBuf]) {
        let folders = self.folders.lock();
        if added.is_empty() || folders.iter().any(|f| f == folder) {
            return;
        }
        let discarded = added
            .iter()
            .filter(|path| !folders.iter().any(|f| path.starts_with(f)))
            .filter(|path| self.cache.remove(path).is_some())
            .count();
        debug!(folder = %folder.display(), discarded, "Discarded templates from stale scan");
    }

    fn complete_scan(&self, ticket: ScanTicket) {
        self.scans.finish(ticket, || {
            let template_count = self.cache.len();
            info!(template_count, "Templates loaded");
            // No subscribers is fine
            let _ = self.events.send(TemplateManagerEvent::TemplatesLoaded { template_count });
        });
    }
}

impl TemplateManager {
    pub fn new(engines: Arc<TemplateEngineRegistry>) -> Self {
        Self::with_max_concurrent_scans(engines, DEFAULT_MAX_CONCURRENT_SCANS)
    }

    /// Manager running at most `max_concurrent_scans` folder scans at once
    pub fn with_max_concurrent_scans(
        engines: Arc<TemplateEngineRegistry>,
        max_concurrent_scans: usize,
    ) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            inner: Arc::new(Inner {
                resolver: RwLock::new(TemplatePathResolver::new()),
                engines,
                cache: TemplateCache::new(),
                folders: Mutex::new(Vec::new()),
                scans: ScanTracker::new(),
                events,
                permits: Arc::new(Semaphore::new(max_concurrent_scans.max(1))),
            }),
        }
    }

    /// Build a manager and apply settings: special folders and required
    /// templates first, then the default folder and the workspace.
    pub fn from_settings(
        settings: &TemplateSettings,
        engines: Arc<TemplateEngineRegistry>,
    ) -> TemplateResult<Self> {
        let manager = Self::with_max_concurrent_scans(engines, settings.max_concurrent_scans);
        for folder in &settings.special_folders {
            manager.register_special_folder(&folder.name, folder.parent.as_deref());
        }
        manager.register_required_templates(&settings.required_templates)?;
        if settings.default_template_folder.is_some() {
            manager.set_default_template_folder(settings.default_template_folder.clone());
        }
        if settings.workspace_directory.is_some() {
            manager.set_workspace_directory(settings.workspace_directory.clone());
        }
        Ok(manager)
    }

    pub fn engines(&self) -> &Arc<TemplateEngineRegistry> {
        &self.inner.engines
    }

    /// Receive [`TemplateManagerEvent`]s
    pub fn subscribe(&self) -> broadcast::Receiver<TemplateManagerEvent> {
        self.inner.events.subscribe()
    }

    /// Register a folder and scan it in the background. Relative folders
    /// are made absolute first.
    pub fn register_template_folder(&self, folder: impl AsRef<Path>) -> TemplateResult<()> {
        let folder = absolute_path(folder.as_ref());
        if !folder.is_dir() {
            return Err(TemplateError::DirectoryNotFound(folder));
        }

        let added = {
            let mut folders = self.inner.folders.lock();
            if folders.contains(&folder) {
                false
            } else {
                folders.push(folder.clone());
                true
            }
        };
        if added {
            info!(folder = %folder.display(), "Registered template folder");
            self.spawn_scan(folder);
        }
        Ok(())
    }

    /// Remove a folder and evict templates whose directory is exactly that
    /// folder. Returns the number of evicted templates.
    pub fn unregister_template_folder(&self, folder: impl AsRef<Path>) -> usize {
        let folder = absolute_path(folder.as_ref());
        self.inner
            .folders
            .lock()
            .retain(|f| !same_path_ignore_case(f, &folder));

        let evicted = self.inner.cache.retain(|path, _| {
            !path
                .parent()
                .is_some_and(|parent| same_path_ignore_case(parent, &folder))
        });
        info!(folder = %folder.display(), evicted, "Unregistered template folder");
        evicted
    }

    pub fn set_default_template_folder(&self, folder: Option<PathBuf>) {
        let folder = {
            let mut resolver = self.inner.resolver.write();
            resolver.set_default_template_folder(folder);
            resolver.default_template_folder().map(Path::to_path_buf)
        };
        if let Some(folder) = folder.filter(|f| f.is_dir()) {
            // Already registered folders are not rescanned
            let _ = self.register_template_folder(folder);
        }
    }

    /// Switch workspaces. The previous workspace's templates are dropped and
    /// the new `Templates` folder is registered in front of all others. A
    /// scan of the previous workspace still running discards its results.
    pub fn set_workspace_directory(&self, directory: Option<PathBuf>) {
        let (old_root, new_root) = {
            let mut resolver = self.inner.resolver.write();
            let old_root = resolver.workspace_templates_root();
            resolver.set_workspace_directory(directory);
            (old_root, resolver.workspace_templates_root())
        };

        if let Some(old_root) = old_root.filter(|old| Some(old) != new_root.as_ref()) {
            self.inner.folders.lock().retain(|f| f != &old_root);
            let evicted = self.inner.cache.retain(|path, _| !path.starts_with(&old_root));
            debug!(root = %old_root.display(), evicted, "Dropped previous workspace templates");
        }

        let Some(new_root) = new_root.filter(|root| root.is_dir()) else {
            return;
        };
        {
            let mut folders = self.inner.folders.lock();
            folders.retain(|f| f != &new_root);
            folders.insert(0, new_root.clone());
        }
        info!(root = %new_root.display(), "Workspace template folder registered");
        self.spawn_scan(new_root);
    }

    /// Clear the cache and rescan every registered folder
    pub fn refresh_templates(&self) {
        self.inner.cache.clear();
        for folder in self.registered_folders() {
            self.spawn_scan(folder);
        }
    }

    /// Wait for the scans pending at the time of the call
    pub async fn wait_for_pending_scans(&self) {
        self.inner.scans.wait_for_pending().await;
    }

    pub fn pending_scan_count(&self) -> usize {
        self.inner.scans.pending_count()
    }

    /// Registered folders, workspace folder first
    pub fn registered_folders(&self) -> Vec<PathBuf> {
        self.inner.folders.lock().clone()
    }

    /// Snapshot of every cached template, ordered by file path
    pub fn get_all_templates(&self) -> Vec<Arc<Template>> {
        sorted(self.inner.cache.values())
    }

    pub fn get_templates_by_type(&self, template_type: TemplateType) -> Vec<Arc<Template>> {
        self.get_templates_by_types(&[template_type])
    }

    pub fn get_templates_by_types(&self, template_types: &[TemplateType]) -> Vec<Arc<Template>> {
        sorted(
            self.inner
                .cache
                .filter_values(|_, t| template_types.contains(&t.template_type)),
        )
    }

    /// Look up a template.
    ///
    /// Special-folder identifiers are resolved on disk and loaded into the
    /// cache if needed. Anything else, or a failed resolution, falls back to
    /// searching the cache by id, then by bare template name.
    pub fn get_template_by_id(&self, identifier: &str) -> Option<Arc<Template>> {
        if TemplateIdentifierSyntax::has_special_folder_syntax(identifier) {
            if let Some(template) = self.load_resolved(identifier) {
                return Some(template);
            }
        }
        self.find_cached(identifier)
    }

    pub fn resolve_template_id_to_path(&self, identifier: &str) -> Option<PathBuf> {
        self.inner.resolver.read().resolve_template_id(identifier)
    }

    pub fn resolve_template_id_to_folder_path(&self, identifier: &str) -> Option<PathBuf> {
        self.inner.resolver.read().resolve_template_folder_id(identifier)
    }

    pub fn template_exists(&self, identifier: &str) -> bool {
        self.inner.resolver.read().template_exists(identifier)
    }

    pub fn get_expected_template_path(
        &self,
        identifier: &str,
        prefer_workspace: bool,
    ) -> TemplateResult<PathBuf> {
        self.inner
            .resolver
            .read()
            .get_expected_template_path(identifier, prefer_workspace)
    }

    pub fn get_possible_locations(&self, identifier: &str) -> Vec<PathBuf> {
        self.inner.resolver.read().get_possible_locations(identifier)
    }

    pub fn register_special_folder(
        &self,
        folder_name: &str,
        parent_folder_name: Option<&str>,
    ) -> bool {
        self.inner
            .resolver
            .write()
            .register_special_folder(folder_name, parent_folder_name)
    }

    pub fn register_required_template(&self, identifier: &str) -> TemplateResult<()> {
        self.inner.resolver.write().register_required_template(identifier)
    }

    pub fn register_required_templates<I, S>(&self, identifiers: I) -> TemplateResult<()>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.inner.resolver.write().register_required_templates(identifiers)
    }

    fn load_resolved(&self, identifier: &str) -> Option<Arc<Template>> {
        let path = self.resolve_template_id_to_path(identifier)?;
        if let Some(template) = self.inner.cache.get(&path) {
            return Some(template);
        }

        let template = Arc::new(load_template_file(&path, &self.inner.engines)?);
        if self.inner.cache.insert_if_absent(path.clone(), template.clone()) {
            debug!(identifier, path = %path.display(), "Loaded template on demand");
        }
        self.inner.cache.get(&path).or(Some(template))
    }

    fn find_cached(&self, identifier: &str) -> Option<Arc<Template>> {
        let cache = &self.inner.cache;
        if let Some(template) = first(cache.filter_values(|_, t| t.id == identifier)) {
            return Some(template);
        }

        let parsed = TemplateIdentifierSyntax::parse(identifier);
        let name = if parsed.is_valid() {
            parsed.template_name().to_string()
        } else {
            identifier.trim().to_string()
        };
        if name.is_empty() {
            return None;
        }
        let suffix = format!("/{}", name);
        first(cache.filter_values(|_, t| {
            t.id == name || t.name() == name || t.id.ends_with(&suffix)
        }))
    }

    fn spawn_scan(&self, folder: PathBuf) {
        let ticket = self.inner.scans.begin();
        let inner = self.inner.clone();

        let Ok(handle) = Handle::try_current() else {
            debug!(folder = %folder.display(), "No async runtime, scanning inline");
            let added = scan_folder(&folder, &inner.engines, &inner.cache);
            inner.discard_stale_scan(&folder, &added);
            inner.complete_scan(ticket);
            return;
        };

        handle.spawn(async move {
            let permit = inner.permits.clone().acquire_owned().await;
            let scan_inner = inner.clone();
            let scan_target = folder.clone();
            let result = tokio::task::spawn_blocking(move || {
                scan_folder(&scan_target, &scan_inner.engines, &scan_inner.cache)
            })
            .await;
            drop(permit);
            match result {
                Ok(added) => inner.discard_stale_scan(&folder, &added),
                Err(e) => {
                    error!(folder = %folder.display(), error = %e, "Template scan task failed")
                }
            }
            inner.complete_scan(ticket);
        });
    }
}

impl std::fmt::Debug for TemplateManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TemplateManager")
            .field("folders", &*self.inner.folders.lock())
            .field("templates", &self.inner.cache.len())
            .field("pending_scans", &self.inner.scans.pending_count())
            .finish()
    }
}

fn sorted(mut templates: Vec<Arc<Template>>) -> Vec<Arc<Template>> {
    templates.sort_by(|a, b| a.file_path.cmp(&b.file_path));
    templates
}

/// Deterministic pick among several matches
fn first(templates: Vec<Arc<Template>>) -> Option<Arc<Template>> {
    sorted(templates).into_iter().next()
}

fn same_path_ignore_case(a: &Path, b: &Path) -> bool {
    let normalize = |p: &Path| -> Vec<String> {
        p.components()
            .map(|c| c.as_os_str().to_string_lossy().to_lowercase())
            .collect()
    };
    normalize(a) == normalize(b)
}
