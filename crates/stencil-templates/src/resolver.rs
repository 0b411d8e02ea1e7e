//! Template identifier to path resolution
//!
//! Two roots are searched: the workspace root (`<workspace>/Templates`) and the
//! default template folder. The workspace root always wins. Registering
//! special folders or required templates materializes their folder trees
//! under every configured root; creation is idempotent and failures are
//! logged per folder.

use std::collections::HashSet;
use std::fs;
use std::path::{Component, Path, PathBuf};

use stencil_common::format_error;
use tracing::{debug, info, warn};

use crate::definition::DefinitionStore;
use crate::error::{IoOperation, TemplateError, TemplateResult};
use crate::identifier::{
    is_special_segment, strip_special_prefix, ParsedTemplateIdentifier, TemplateIdentifierSyntax,
};
use crate::special_folders::SpecialFolderRegistry;

/// Subfolder of a workspace directory holding its templates
pub const WORKSPACE_TEMPLATES_FOLDER: &str = "Templates";

/// Resolves template identifiers against the workspace and default roots
#[derive(Debug, Clone, Default)]
pub struct TemplatePathResolver {
    workspace_directory: Option<PathBuf>,
    default_template_folder: Option<PathBuf>,
    special_folders: SpecialFolderRegistry,
    required_templates: Vec<String>,
    /// Auto-registered special folders that sit below a plain folder in the
    /// identifier that introduced them. They have no directory of their own
    /// beside their parent, so only the identifier's own tree is created.
    detached_special_folders: HashSet<String>,
}

impl TemplatePathResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn workspace_directory(&self) -> Option<&Path> {
        self.workspace_directory.as_deref()
    }

    pub fn default_template_folder(&self) -> Option<&Path> {
        self.default_template_folder.as_deref()
    }

    /// `<workspace>/Templates`, when a workspace is set
    pub fn workspace_templates_root(&self) -> Option<PathBuf> {
        self.workspace_directory
            .as_ref()
            .map(|dir| dir.join(WORKSPACE_TEMPLATES_FOLDER))
    }

    /// Configured roots, workspace root first
    pub fn template_roots(&self) -> Vec<PathBuf> {
        self.workspace_templates_root()
            .into_iter()
            .chain(self.default_template_folder.clone())
            .collect()
    }

    pub fn special_folders(&self) -> &SpecialFolderRegistry {
        &self.special_folders
    }

    /// Required identifiers in registration order
    pub fn required_templates(&self) -> &[String] {
        &self.required_templates
    }

    /// Set or clear the workspace directory. A new workspace gets its
    /// `Templates` root and every known folder tree created.
    pub fn set_workspace_directory(&mut self, directory: Option<PathBuf>) {
        self.workspace_directory = non_empty(directory);
        if let Some(root) = self.workspace_templates_root() {
            info!(root = %root.display(), "Workspace template root set");
            self.ensure_root(&root);
        }
    }

    /// Set or clear the default template folder. Folder trees are created
    /// directly under it.
    pub fn set_default_template_folder(&mut self, folder: Option<PathBuf>) {
        self.default_template_folder = non_empty(folder);
        if let Some(root) = self.default_template_folder.clone() {
            info!(root = %root.display(), "Default template folder set");
            self.ensure_root(&root);
        }
    }

    /// Register a special folder and create it under each root. Returns
    /// `false` when it was already registered.
    pub fn register_special_folder(
        &mut self,
        folder_name: &str,
        parent_folder_name: Option<&str>,
    ) -> bool {
        if !self.special_folders.register(folder_name, parent_folder_name) {
            return false;
        }
        for root in self.template_roots() {
            self.ensure_special_folder(&root, folder_name);
        }
        true
    }

    /// Declare an identifier the application needs. Unknown special folders
    /// in it are registered, each nested under the special segment before
    /// it, and the folder tree down to the template's own folder is created
    /// under each root. A special folder that follows a plain folder in the
    /// identifier is registered but gets no directory of its own.
    pub fn register_required_template(&mut self, identifier: &str) -> TemplateResult<()> {
        let parsed = TemplateIdentifierSyntax::parse(identifier);
        if !parsed.is_valid() {
            return Err(TemplateError::invalid_identifier(
                identifier,
                parsed.error_message().unwrap_or_default(),
            ));
        }

        let mut parent: Option<String> = None;
        let mut after_plain_folder = false;
        for segment in parsed.path_segments() {
            if !is_special_segment(segment) {
                after_plain_folder = true;
                continue;
            }
            let name = strip_special_prefix(segment);
            if !self.special_folders.contains(name) {
                if after_plain_folder {
                    self.special_folders.register(name, parent.as_deref());
                    self.detached_special_folders.insert(name.to_string());
                } else {
                    self.register_special_folder(name, parent.as_deref());
                }
            }
            parent = Some(name.to_string());
            after_plain_folder = false;
        }

        if !self.required_templates.iter().any(|r| r == identifier) {
            self.required_templates.push(identifier.to_string());
        }

        for root in self.template_roots() {
            ensure_directory(&template_folder(&root, &parsed));
        }
        Ok(())
    }

    /// Register several identifiers. All valid ones are registered; the
    /// first failure is returned.
    pub fn register_required_templates<I, S>(&mut self, identifiers: I) -> TemplateResult<()>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut first_error = None;
        for identifier in identifiers {
            if let Err(e) = self.register_required_template(identifier.as_ref()) {
                warn!(identifier = identifier.as_ref(), error = %e, "Skipping required template");
                first_error.get_or_insert(e);
            }
        }
        first_error.map_or(Ok(()), Err)
    }

    /// Resolve an identifier to a template file.
    ///
    /// Identifiers without special-folder syntax are literal paths. Otherwise
    /// the template's folder is located under each root in turn and the first
    /// `.def` file (by name) recording a matching template id wins.
    pub fn resolve_template_id(&self, identifier: &str) -> Option<PathBuf> {
        if !TemplateIdentifierSyntax::has_special_folder_syntax(identifier) {
            let literal = Path::new(identifier.trim());
            let found = !identifier.trim().is_empty() && literal.exists();
            return found.then(|| absolute_path(literal));
        }

        let parsed = TemplateIdentifierSyntax::parse(identifier);
        if !parsed.is_valid() {
            debug!(identifier, "Cannot resolve invalid identifier");
            return None;
        }

        self.template_roots().iter().find_map(|root| {
            let folder = template_folder(root, &parsed);
            if folder.is_dir() {
                find_definition_match(&folder, parsed.template_name())
            } else {
                None
            }
        })
    }

    /// Resolve an identifier to its per-template folder, first root that has it
    pub fn resolve_template_folder_id(&self, identifier: &str) -> Option<PathBuf> {
        let parsed = TemplateIdentifierSyntax::parse(identifier);
        if !parsed.is_valid() {
            return None;
        }
        self.template_roots()
            .iter()
            .map(|root| template_folder(root, &parsed))
            .find(|folder| folder.is_dir())
    }

    /// Where a template should live: `<root>/<folders>/<name>/<name>`.
    /// Nothing is checked on disk.
    pub fn get_expected_template_path(
        &self,
        identifier: &str,
        prefer_workspace: bool,
    ) -> TemplateResult<PathBuf> {
        let parsed = TemplateIdentifierSyntax::parse(identifier);
        if !parsed.is_valid() {
            return Err(TemplateError::invalid_identifier(
                identifier,
                parsed.error_message().unwrap_or_default(),
            ));
        }

        let workspace = self.workspace_templates_root();
        let default = self.default_template_folder.clone();
        let root = if prefer_workspace {
            workspace.or(default)
        } else {
            default.or(workspace)
        }
        .ok_or(TemplateError::NoTemplateRoot)?;

        Ok(template_folder(&root, &parsed).join(parsed.template_name()))
    }

    pub fn template_exists(&self, identifier: &str) -> bool {
        self.resolve_template_id(identifier).is_some()
    }

    /// Per-template folder under each configured root, workspace first
    pub fn get_possible_locations(&self, identifier: &str) -> Vec<PathBuf> {
        let parsed = TemplateIdentifierSyntax::parse(identifier);
        if !parsed.is_valid() {
            return Vec::new();
        }
        self.template_roots()
            .iter()
            .map(|root| template_folder(root, &parsed))
            .collect()
    }

    fn ensure_root(&self, root: &Path) {
        ensure_directory(root);
        for folder in self.special_folders.all_folders() {
            if !self.detached_special_folders.contains(&folder.folder_name) {
                self.ensure_special_folder(root, &folder.folder_name);
            }
        }
        for identifier in &self.required_templates {
            let parsed = TemplateIdentifierSyntax::parse(identifier);
            ensure_directory(&template_folder(root, &parsed));
        }
    }

    fn ensure_special_folder(&self, root: &Path, folder_name: &str) {
        match self.special_folders.resolve_folder_path(root, folder_name) {
            Ok(Some(path)) => {
                ensure_directory(&path);
            }
            Ok(None) => debug!(folder = folder_name, "Special folder has an unregistered ancestor"),
            Err(e) => warn!(folder = folder_name, error = %e, "Cannot create special folder"),
        }
    }
}

/// Empty paths clear a root; others are made absolute
fn non_empty(path: Option<PathBuf>) -> Option<PathBuf> {
    path.filter(|p| !p.as_os_str().is_empty())
        .map(|p| absolute_path(&p))
}

/// Absolute form of `path` with `.` and `..` folded away lexically.
/// Symlinks are not resolved.
pub(crate) fn absolute_path(path: &Path) -> PathBuf {
    let absolute = std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf());
    let mut normalized = PathBuf::new();
    for component in absolute.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                normalized.pop();
            }
            other => normalized.push(other.as_os_str()),
        }
    }
    normalized
}

/// `<root>/<folders, @ stripped>/<template name>`
fn template_folder(root: &Path, parsed: &ParsedTemplateIdentifier) -> PathBuf {
    let mut folder = root.to_path_buf();
    for name in parsed.folder_names() {
        folder.push(name);
    }
    folder.push(parsed.template_name());
    folder
}

/// Create a directory if missing. Returns whether it exists afterwards.
pub(crate) fn ensure_directory(path: &Path) -> bool {
    if path.is_dir() {
        return true;
    }
    match fs::create_dir_all(path) {
        Ok(()) => {
            debug!(path = %path.display(), "Created template folder");
            true
        }
        Err(e) => {
            let error = TemplateError::io(path, IoOperation::CreateDir, e);
            warn!(error = %format_error(&error), "Failed to create template folder");
            false
        }
    }
}

/// First `.def` in `folder`, by file name, whose template id matches
fn find_definition_match(folder: &Path, template_name: &str) -> Option<PathBuf> {
    let entries = match fs::read_dir(folder) {
        Ok(entries) => entries,
        Err(e) => {
            let error = TemplateError::io(folder, IoOperation::Read, e);
            warn!(error = %format_error(&error), "Failed to list template folder");
            return None;
        }
    };

    let mut definitions: Vec<PathBuf> = entries
        .filter_map(Result::ok)
        .map(|entry| entry.path())
        .filter(|path| path.is_file() && DefinitionStore::is_definition_file(path))
        .collect();
    definitions.sort();

    definitions.into_iter().find_map(|path| match DefinitionStore::load(&path) {
        Ok(Some(definition)) if definition.template_id.eq_ignore_ascii_case(template_name) => {
            DefinitionStore::template_path_for(&path)
        }
        Ok(_) => None,
        Err(e) => {
            warn!(error = %format_error(&e), "Skipping unreadable definition");
            None
        }
    })
}
