//! Template identifier resolution and template management for stencil
//!
//! Turns logical identifiers such as `@Workspace/@Invoice/print` into template
//! files, keeps required folder trees present under the workspace and default
//! template roots, and scans registered folders for templates in the
//! background.

pub mod definition;
pub mod engine;
pub mod engines;
pub mod error;
pub mod identifier;
pub mod manager;
pub mod model;
pub mod resolver;
pub mod scan;
pub mod settings;
pub mod special_folders;

// Re-export public API
pub use definition::{
    DefinitionStore, TemplateDefinition, TemplateParameter, DATA_SOURCE_TYPE, DEFINITION_SUFFIX,
};
pub use engine::{FileTemplateEngine, TemplateEngine, TemplateEngineRegistry};
pub use engines::{HandlebarsEngine, StaticFileEngine};
pub use error::{
    IoOperation, LoadError, SettingsError, SettingsResult, TemplateError, TemplateResult,
};
pub use identifier::{ParsedTemplateIdentifier, TemplateIdentifierSyntax};
pub use manager::{TemplateManager, TemplateManagerEvent};
pub use model::{OutputContent, Template, TemplateInstance, TemplateOutput, TemplateType};
pub use resolver::{TemplatePathResolver, WORKSPACE_TEMPLATES_FOLDER};
pub use scan::{ScanTracker, TemplateCache};
pub use settings::{SettingsManager, SpecialFolderSetting, TemplateSettings};
pub use special_folders::{SpecialFolderRegistration, SpecialFolderRegistry};

// Re-export so callers can pass cancellation tokens to `render`
pub use tokio_util::sync::CancellationToken;
