//! Core data models for templates

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::definition::TemplateDefinition;

/// Kind of template, which decides how its output is used
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TemplateType {
    /// Executes a script to produce output
    Script,
    /// Produces text from a template body
    GeneratedText,
    /// Structured data copied or transformed
    DataFile,
    /// Opaque binary content
    BinaryFile,
    /// Image content
    ImageFile,
    /// A folder whose contents form the template
    FolderTemplate,
    /// A whole project scaffold
    ProjectTemplate,
}

impl TemplateType {
    /// Icon name shown next to templates of this type
    pub fn default_icon(&self) -> &'static str {
        match self {
            TemplateType::Script => "file-code",
            TemplateType::GeneratedText => "file-text",
            TemplateType::DataFile => "database",
            TemplateType::BinaryFile => "file-binary",
            TemplateType::ImageFile => "file-image",
            TemplateType::FolderTemplate => "folder",
            TemplateType::ProjectTemplate => "package",
        }
    }
}

impl fmt::Display for TemplateType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TemplateType::Script => "script",
            TemplateType::GeneratedText => "generated text",
            TemplateType::DataFile => "data file",
            TemplateType::BinaryFile => "binary file",
            TemplateType::ImageFile => "image file",
            TemplateType::FolderTemplate => "folder template",
            TemplateType::ProjectTemplate => "project template",
        };
        f.write_str(name)
    }
}

/// A template discovered on disk. Built by a template engine.
#[derive(Debug, Clone, PartialEq)]
pub struct Template {
    pub id: String,
    pub display_name: String,
    pub template_type: TemplateType,
    pub file_path: PathBuf,
    /// Id of the engine that created this template
    pub engine_id: String,
    pub use_caching: bool,
    pub icon: String,
    pub definition: Option<TemplateDefinition>,
}

impl Template {
    /// Build a template for `file_path`, taking id and display name from the
    /// definition when there is one, otherwise from the file stem.
    pub fn from_file(
        file_path: &Path,
        template_type: TemplateType,
        engine_id: &str,
        definition: Option<TemplateDefinition>,
    ) -> Self {
        let stem = file_stem(file_path);
        let id = definition
            .as_ref()
            .map(|d| d.template_id.clone())
            .filter(|id| !id.is_empty())
            .unwrap_or_else(|| stem.clone());
        let display_name = definition
            .as_ref()
            .map(|d| d.display_name.clone())
            .filter(|n| !n.is_empty())
            .unwrap_or_else(|| id.clone());

        Self {
            id,
            display_name,
            template_type,
            file_path: file_path.to_path_buf(),
            engine_id: engine_id.to_string(),
            use_caching: true,
            icon: template_type.default_icon().to_string(),
            definition,
        }
    }

    /// File name without extension
    pub fn name(&self) -> String {
        file_stem(&self.file_path)
    }

    /// Lowercase extension without the dot
    pub fn extension(&self) -> Option<String> {
        self.file_path
            .extension()
            .map(|e| e.to_string_lossy().to_lowercase())
    }

    /// Directory holding the template file
    pub fn directory(&self) -> Option<&Path> {
        self.file_path.parent()
    }
}

fn file_stem(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// A template plus the parameter values for one render
#[derive(Debug, Clone)]
pub struct TemplateInstance {
    pub template: Arc<Template>,
    pub parameters: HashMap<String, Value>,
}

impl TemplateInstance {
    pub fn new(template: Arc<Template>) -> Self {
        Self {
            template,
            parameters: HashMap::new(),
        }
    }

    /// Set a parameter value
    pub fn with_parameter(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.parameters.insert(name.into(), value.into());
        self
    }

    pub fn set_parameter(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.parameters.insert(name.into(), value.into());
    }

    /// Parameter value by name (case-insensitive)
    pub fn parameter(&self, name: &str) -> Option<&Value> {
        self.parameters.get(name).or_else(|| {
            self.parameters
                .iter()
                .find(|(k, _)| k.eq_ignore_ascii_case(name))
                .map(|(_, v)| v)
        })
    }
}

/// Rendered content
#[derive(Debug, Clone, PartialEq)]
pub enum OutputContent {
    Text(String),
    Binary(Vec<u8>),
}

/// Result of rendering a template instance
#[derive(Debug, Clone, PartialEq)]
pub struct TemplateOutput {
    pub template_id: String,
    pub success: bool,
    pub content: Option<OutputContent>,
    pub errors: Vec<String>,
}

impl TemplateOutput {
    /// Successful text output
    pub fn text(template_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            template_id: template_id.into(),
            success: true,
            content: Some(OutputContent::Text(content.into())),
            errors: Vec::new(),
        }
    }

    /// Successful binary output
    pub fn binary(template_id: impl Into<String>, content: Vec<u8>) -> Self {
        Self {
            template_id: template_id.into(),
            success: true,
            content: Some(OutputContent::Binary(content)),
            errors: Vec::new(),
        }
    }

    /// Failed output carrying an error message
    pub fn failure(template_id: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            template_id: template_id.into(),
            success: false,
            content: None,
            errors: vec![error.into()],
        }
    }

    /// Failed output carrying several error messages
    pub fn failures(template_id: impl Into<String>, errors: Vec<String>) -> Self {
        Self {
            template_id: template_id.into(),
            success: false,
            content: None,
            errors,
        }
    }

    /// Text content, if the output is text
    pub fn as_text(&self) -> Option<&str> {
        match &self.content {
            Some(OutputContent::Text(text)) => Some(text),
            _ => None,
        }
    }
}
