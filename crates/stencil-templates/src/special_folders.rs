//! Registry of special folders
//!
//! Special folders form a forest: each registration names an optional parent.
//! The registry only records the tree; creating the folders on disk is the
//! path resolver's job.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::{TemplateError, TemplateResult};
use crate::identifier::{special, strip_special_prefix};

/// A registered special folder
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpecialFolderRegistration {
    /// Folder name without `@`
    pub folder_name: String,
    /// Parent folder name without `@`; `None` for roots
    pub parent_special_folder: Option<String>,
}

impl SpecialFolderRegistration {
    pub fn is_root(&self) -> bool {
        self.parent_special_folder.is_none()
    }
}

/// In-memory tree of special folders
#[derive(Debug, Clone)]
pub struct SpecialFolderRegistry {
    folders: HashMap<String, SpecialFolderRegistration>,
    /// Registration order, so enumeration is stable
    order: Vec<String>,
}

impl SpecialFolderRegistry {
    /// Create a registry holding the built-in roots
    pub fn new() -> Self {
        let mut registry = Self {
            folders: HashMap::new(),
            order: Vec::new(),
        };
        for name in special::BUILT_IN {
            registry.register(name, None);
        }
        registry
    }

    /// Register a folder. Returns `false` if it was already known.
    pub fn register(&mut self, folder_name: &str, parent_folder_name: Option<&str>) -> bool {
        let name = strip_special_prefix(folder_name).to_string();
        let parent = parent_folder_name
            .map(strip_special_prefix)
            .filter(|p| !p.is_empty())
            .map(str::to_string);

        if let Some(existing) = self.folders.get(&name) {
            debug!(
                folder = %name,
                parent = ?existing.parent_special_folder,
                "Special folder already registered"
            );
            return false;
        }

        debug!(folder = %name, parent = ?parent, "Registering special folder");
        self.order.push(name.clone());
        self.folders.insert(
            name.clone(),
            SpecialFolderRegistration {
                folder_name: name,
                parent_special_folder: parent,
            },
        );
        true
    }

    pub fn contains(&self, folder_name: &str) -> bool {
        self.folders.contains_key(strip_special_prefix(folder_name))
    }

    pub fn get(&self, folder_name: &str) -> Option<&SpecialFolderRegistration> {
        self.folders.get(strip_special_prefix(folder_name))
    }

    /// Folders without a parent, in registration order
    pub fn root_folders(&self) -> Vec<&SpecialFolderRegistration> {
        self.all_folders().into_iter().filter(|f| f.is_root()).collect()
    }

    /// Every folder, in registration order
    pub fn all_folders(&self) -> Vec<&SpecialFolderRegistration> {
        self.order.iter().filter_map(|name| self.folders.get(name)).collect()
    }

    /// Absolute path of a special folder under `templates_root`.
    ///
    /// Returns `Ok(None)` when the folder or one of its ancestors is not
    /// registered, and an error when the parent chain loops.
    pub fn resolve_folder_path(
        &self,
        templates_root: &Path,
        folder_name: &str,
    ) -> TemplateResult<Option<PathBuf>> {
        let mut chain = Vec::new();
        let mut seen = HashSet::new();
        let mut current = strip_special_prefix(folder_name);

        loop {
            let Some(registration) = self.folders.get(current) else {
                return Ok(None);
            };
            if !seen.insert(registration.folder_name.as_str()) {
                return Err(TemplateError::SpecialFolderCycle {
                    folder: registration.folder_name.clone(),
                });
            }
            chain.push(registration.folder_name.as_str());
            match registration.parent_special_folder.as_deref() {
                Some(parent) => current = parent,
                None => break,
            }
        }

        let path = chain
            .iter()
            .rev()
            .fold(templates_root.to_path_buf(), |acc, name| acc.join(name));
        Ok(Some(path))
    }
}

impl Default for SpecialFolderRegistry {
    fn default() -> Self {
        Self::new()
    }
}
