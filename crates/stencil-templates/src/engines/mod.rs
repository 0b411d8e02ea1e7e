//! Built-in template engines

mod handlebars_engine;
mod static_file;

pub use self::handlebars_engine::HandlebarsEngine;
pub use self::static_file::StaticFileEngine;

use std::path::Path;

use stencil_common::format_error;

use crate::definition::{DefinitionStore, TemplateDefinition};
use crate::error::LoadError;

/// Lowercase extension of a path, without the dot
pub(crate) fn extension_of(path: &Path) -> Option<String> {
    path.extension().map(|e| e.to_string_lossy().to_lowercase())
}

/// Check the file exists and load its definition, mapping failures onto
/// [`LoadError`] the way every file engine reports them.
pub(crate) fn load_definition_for(path: &Path) -> Result<Option<TemplateDefinition>, LoadError> {
    if let Err(source) = std::fs::metadata(path) {
        return Err(LoadError::Io {
            path: path.to_path_buf(),
            source,
        });
    }
    DefinitionStore::load_for_template(path).map_err(|e| LoadError::Malformed {
        path: path.to_path_buf(),
        message: format_error(&e),
    })
}
