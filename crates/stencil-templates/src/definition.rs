//! Template definition files
//!
//! Every template file may carry a sidecar `<template file>.def` holding its
//! metadata and parameters as camelCase JSON. Keys are matched
//! case-insensitively on read. The sidecar follows its template on rename.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use stencil_common::{json_store, KeyMap};
use tracing::{debug, info};

use crate::error::{IoOperation, TemplateError, TemplateResult};

/// Suffix appended to a template file path to locate its definition
pub const DEFINITION_SUFFIX: &str = ".def";

/// Type tag for parameters whose rows come from an external data source
pub const DATA_SOURCE_TYPE: &str = "Stencil.DataSource";

/// Metadata describing one template
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TemplateDefinition {
    pub template_id: String,
    pub display_name: String,
    pub description: String,
    pub category: String,
    pub tags: Vec<String>,
    pub version: String,
    pub author: String,
    pub parameters: Vec<TemplateParameter>,
}

impl Default for TemplateDefinition {
    fn default() -> Self {
        Self {
            template_id: String::new(),
            display_name: String::new(),
            description: String::new(),
            category: String::new(),
            tags: Vec::new(),
            version: "1.0.0".to_string(),
            author: String::new(),
            parameters: Vec::new(),
        }
    }
}

impl TemplateDefinition {
    pub fn parameter(&self, name: &str) -> Option<&TemplateParameter> {
        self.parameters
            .iter()
            .find(|p| p.name.eq_ignore_ascii_case(name))
    }
}

/// One input a template accepts
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TemplateParameter {
    pub name: String,
    /// Type tag; [`DATA_SOURCE_TYPE`] marks a data-source parameter
    pub fully_qualified_type_name: String,
    pub required: bool,
    pub default_value: Option<Value>,
    pub allowed_values: Vec<String>,
    pub display_name: String,
    pub description: String,
    pub category: String,
    pub min_value: Option<f64>,
    pub max_value: Option<f64>,
    pub min_length: Option<usize>,
    pub max_length: Option<usize>,
    /// Regular expression a string value must match
    pub pattern: Option<String>,
    /// Only meaningful for data-source parameters
    pub row_filter: Option<String>,
    /// Only meaningful for data-source parameters
    pub max_rows: Option<usize>,
}

impl Default for TemplateParameter {
    fn default() -> Self {
        Self {
            name: String::new(),
            fully_qualified_type_name: "System.String".to_string(),
            required: false,
            default_value: None,
            allowed_values: Vec::new(),
            display_name: String::new(),
            description: String::new(),
            category: String::new(),
            min_value: None,
            max_value: None,
            min_length: None,
            max_length: None,
            pattern: None,
            row_filter: None,
            max_rows: None,
        }
    }
}

impl TemplateParameter {
    pub fn new(name: impl Into<String>, type_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fully_qualified_type_name: type_name.into(),
            ..Self::default()
        }
    }

    pub fn is_data_source(&self) -> bool {
        self.fully_qualified_type_name == DATA_SOURCE_TYPE
    }

    /// Check a supplied value (or its absence) against this parameter's rules.
    ///
    /// Data-source parameters only check presence and the row cap; their
    /// rows are not primitive values.
    pub fn validate(&self, value: Option<&Value>) -> Result<(), String> {
        let value = match value {
            None | Some(Value::Null) => {
                if self.required && self.default_value.is_none() {
                    return Err(format!("Missing required parameter '{}'", self.name));
                }
                return Ok(());
            }
            Some(v) => v,
        };

        if self.is_data_source() {
            if let (Some(max_rows), Value::Array(rows)) = (self.max_rows, value) {
                if rows.len() > max_rows {
                    return Err(format!(
                        "Parameter '{}' has {} rows, maximum is {}",
                        self.name,
                        rows.len(),
                        max_rows
                    ));
                }
            }
            return Ok(());
        }

        if !self.allowed_values.is_empty() {
            let text = value_as_text(value);
            if !self.allowed_values.iter().any(|allowed| *allowed == text) {
                return Err(format!(
                    "Parameter '{}' value '{}' is not one of {:?}",
                    self.name, text, self.allowed_values
                ));
            }
        }

        if let Some(number) = value.as_f64() {
            if let Some(min) = self.min_value {
                if number < min {
                    return Err(format!("Parameter '{}' must be >= {}", self.name, min));
                }
            }
            if let Some(max) = self.max_value {
                if number > max {
                    return Err(format!("Parameter '{}' must be <= {}", self.name, max));
                }
            }
        }

        if let Some(text) = value.as_str() {
            let length = text.chars().count();
            if let Some(min) = self.min_length {
                if length < min {
                    return Err(format!(
                        "Parameter '{}' must be at least {} characters",
                        self.name, min
                    ));
                }
            }
            if let Some(max) = self.max_length {
                if length > max {
                    return Err(format!(
                        "Parameter '{}' must be at most {} characters",
                        self.name, max
                    ));
                }
            }
            if let Some(pattern) = &self.pattern {
                let regex = Regex::new(pattern).map_err(|e| {
                    format!("Parameter '{}' has an invalid pattern: {}", self.name, e)
                })?;
                if !regex.is_match(text) {
                    return Err(format!(
                        "Parameter '{}' value '{}' does not match pattern {}",
                        self.name, text, pattern
                    ));
                }
            }
        }

        Ok(())
    }
}

fn value_as_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Keys of the definition object and of each parameter entry. Parameter
/// values such as `defaultValue` are user data and keep their keys.
fn definition_keys() -> &'static KeyMap {
    static KEYS: OnceLock<KeyMap> = OnceLock::new();
    KEYS.get_or_init(|| {
        let parameter = KeyMap::new([
            "name",
            "fullyQualifiedTypeName",
            "required",
            "defaultValue",
            "allowedValues",
            "displayName",
            "description",
            "category",
            "minValue",
            "maxValue",
            "minLength",
            "maxLength",
            "pattern",
            "rowFilter",
            "maxRows",
        ]);
        KeyMap::new([
            "templateId",
            "displayName",
            "description",
            "category",
            "tags",
            "version",
            "author",
            "parameters",
        ])
        .with_alias("templateName", "templateId")
        .with_nested("parameters", parameter)
    })
}

/// Load, save and move `.def` files
pub struct DefinitionStore;

impl DefinitionStore {
    /// `<template file>.def`
    pub fn definition_path_for(template_file_path: &Path) -> PathBuf {
        let mut path = template_file_path.as_os_str().to_owned();
        path.push(DEFINITION_SUFFIX);
        PathBuf::from(path)
    }

    /// Whether a path names a definition file
    pub fn is_definition_file(path: &Path) -> bool {
        path.to_string_lossy()
            .to_lowercase()
            .ends_with(DEFINITION_SUFFIX)
    }

    /// Template file a definition belongs to
    pub fn template_path_for(definition_path: &Path) -> Option<PathBuf> {
        let text = definition_path.to_str()?;
        let cut = text.len().checked_sub(DEFINITION_SUFFIX.len())?;
        if !text.is_char_boundary(cut) || !text[cut..].eq_ignore_ascii_case(DEFINITION_SUFFIX) {
            return None;
        }
        Some(PathBuf::from(&text[..cut]))
    }

    /// Load a definition. Absent file is `Ok(None)`; malformed content is an error.
    pub fn load(definition_path: &Path) -> TemplateResult<Option<TemplateDefinition>> {
        if !definition_path.is_file() {
            return Ok(None);
        }
        json_store::load_json_with_keys(definition_path, definition_keys())
            .map(Some)
            .map_err(|e| TemplateError::definition(definition_path, e))
    }

    pub fn load_for_template(
        template_file_path: &Path,
    ) -> TemplateResult<Option<TemplateDefinition>> {
        Self::load(&Self::definition_path_for(template_file_path))
    }

    /// Write a definition, replacing any existing file
    pub fn save(definition: &TemplateDefinition, definition_path: &Path) -> TemplateResult<()> {
        json_store::save_json_atomic(definition_path, definition)
            .map_err(|e| TemplateError::definition(definition_path, e))?;
        debug!(path = %definition_path.display(), "Saved template definition");
        Ok(())
    }

    /// Save the definition next to its template, then rename the template to
    /// match `definition.template_id`. Returns the template's final path.
    pub fn save_for_template(
        definition: &TemplateDefinition,
        template_file_path: &Path,
    ) -> TemplateResult<PathBuf> {
        Self::save(definition, &Self::definition_path_for(template_file_path))?;

        let current_stem = template_file_path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        if definition.template_id.is_empty() || definition.template_id == current_stem {
            return Ok(template_file_path.to_path_buf());
        }

        let mut file_name = definition.template_id.clone();
        if let Some(ext) = template_file_path.extension() {
            file_name.push('.');
            file_name.push_str(&ext.to_string_lossy());
        }
        let target = template_file_path.with_file_name(file_name);
        Self::rename_template(template_file_path, &target)?;
        Ok(target)
    }

    /// Move the definition belonging to `old_template_path` so it belongs to
    /// `new_template_path`. Without an existing `.def`, a default one is
    /// written at the new location.
    pub fn rename_definition_file(
        old_template_path: &Path,
        new_template_path: &Path,
    ) -> TemplateResult<()> {
        if old_template_path.as_os_str().is_empty() {
            return Err(TemplateError::InvalidArgument(
                "old template path must not be empty".to_string(),
            ));
        }
        if new_template_path.as_os_str().is_empty() {
            return Err(TemplateError::InvalidArgument(
                "new template path must not be empty".to_string(),
            ));
        }

        let old_def = Self::definition_path_for(old_template_path);
        let new_def = Self::definition_path_for(new_template_path);

        if old_def.is_file() {
            fs::rename(&old_def, &new_def)
                .map_err(|e| TemplateError::io(&old_def, IoOperation::Move, e))?;
            debug!(from = %old_def.display(), to = %new_def.display(), "Moved template definition");
        } else {
            let definition = Self::create_default(new_template_path);
            Self::save(&definition, &new_def)?;
            info!(path = %new_def.display(), "Created default template definition");
        }
        Ok(())
    }

    /// Rename a template file and carry its definition along
    pub fn rename_template(
        old_template_path: &Path,
        new_template_path: &Path,
    ) -> TemplateResult<()> {
        if old_template_path.as_os_str().is_empty() || new_template_path.as_os_str().is_empty() {
            return Err(TemplateError::InvalidArgument(
                "template paths must not be empty".to_string(),
            ));
        }
        if old_template_path == new_template_path {
            return Ok(());
        }
        if new_template_path.exists() {
            return Err(TemplateError::AlreadyExists(new_template_path.to_path_buf()));
        }

        fs::rename(old_template_path, new_template_path)
            .map_err(|e| TemplateError::io(old_template_path, IoOperation::Move, e))?;
        Self::rename_definition_file(old_template_path, new_template_path)
    }

    /// Default definition derived from the template's file name
    pub fn create_default(template_file_path: &Path) -> TemplateDefinition {
        let stem = template_file_path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        TemplateDefinition {
            template_id: stem.clone(),
            display_name: stem.clone(),
            description: format!("Template {}", stem),
            ..TemplateDefinition::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn write_template(dir: &Path, name: &str) -> PathBuf {
        let path = dir.join(name);
        fs::write(&path, "Hello {{name}}").unwrap();
        path
    }

    #[test]
    fn test_definition_path_for() {
        assert_eq!(
            DefinitionStore::definition_path_for(Path::new("/t/print.scriban")),
            PathBuf::from("/t/print.scriban.def")
        );
        assert_eq!(
            DefinitionStore::template_path_for(Path::new("/t/print.scriban.def")),
            Some(PathBuf::from("/t/print.scriban"))
        );
        assert_eq!(DefinitionStore::template_path_for(Path::new("/t/print.scriban")), None);
        assert!(DefinitionStore::is_definition_file(Path::new("a.hbs.DEF")));
    }

    #[test]
    fn test_load_missing_returns_none() {
        let dir = TempDir::new().unwrap();
        let result = DefinitionStore::load(&dir.path().join("x.def")).unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn test_load_is_case_insensitive() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("print.hbs.def");
        fs::write(
            &path,
            r#"{
                "TemplateName": "print",
                "DISPLAYNAME": "Print invoice",
                "Parameters": [{"Name": "customer", "Required": true, "MAXLENGTH": 40}]
            }"#,
        )
        .unwrap();

        let definition = DefinitionStore::load(&path).unwrap().unwrap();
        assert_eq!(definition.template_id, "print");
        assert_eq!(definition.display_name, "Print invoice");
        assert_eq!(definition.version, "1.0.0");
        let param = definition.parameter("CUSTOMER").unwrap();
        assert!(param.required);
        assert_eq!(param.max_length, Some(40));
    }

    #[test]
    fn test_load_malformed_is_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("bad.def");
        fs::write(&path, "{ broken").unwrap();
        assert!(matches!(
            DefinitionStore::load(&path),
            Err(TemplateError::Definition { .. })
        ));
    }

    #[test]
    fn test_save_then_load() {
        let dir = TempDir::new().unwrap();
        let template = write_template(dir.path(), "report.hbs");
        let mut definition = DefinitionStore::create_default(&template);
        definition.tags = vec!["finance".into()];
        definition.parameters.push(TemplateParameter::new("year", "System.Int32"));

        let definition_path = DefinitionStore::definition_path_for(&template);
        DefinitionStore::save(&definition, &definition_path).unwrap();
        let loaded = DefinitionStore::load_for_template(&template).unwrap().unwrap();
        assert_eq!(loaded, definition);

        let raw = fs::read_to_string(DefinitionStore::definition_path_for(&template)).unwrap();
        assert!(raw.find("\"templateId\"").unwrap() < raw.find("\"displayName\"").unwrap());
    }

    #[test]
    fn test_object_default_value_keeps_its_keys() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("letter.hbs.def");
        let mut customer = TemplateParameter::new("customer", "System.Object");
        customer.default_value = Some(json!({
            "DESCRIPTION": "y",
            "Name": "x",
            "Other": 1,
            "nested": [{"TemplateId": "z"}],
        }));
        let definition = TemplateDefinition {
            template_id: "letter".to_string(),
            parameters: vec![customer],
            ..TemplateDefinition::default()
        };

        DefinitionStore::save(&definition, &path).unwrap();
        let loaded = DefinitionStore::load(&path).unwrap().unwrap();
        assert_eq!(loaded, definition);
    }

    #[test]
    fn test_create_default() {
        let definition = DefinitionStore::create_default(Path::new("/t/print.scriban"));
        assert_eq!(definition.template_id, "print");
        assert_eq!(definition.display_name, "print");
        assert!(!definition.description.is_empty());
        assert!(definition.parameters.is_empty());
    }

    #[test]
    fn test_rename_moves_existing_definition() {
        let dir = TempDir::new().unwrap();
        let old = write_template(dir.path(), "old.hbs");
        let mut definition = DefinitionStore::create_default(&old);
        definition.author = "someone".into();
        DefinitionStore::save(&definition, &DefinitionStore::definition_path_for(&old)).unwrap();

        let new = dir.path().join("new.hbs");
        DefinitionStore::rename_template(&old, &new).unwrap();

        assert!(!old.exists());
        assert!(new.exists());
        assert!(!DefinitionStore::definition_path_for(&old).exists());
        let moved = DefinitionStore::load_for_template(&new).unwrap().unwrap();
        assert_eq!(moved.author, "someone");
    }

    #[test]
    fn test_rename_without_definition_writes_default() {
        let dir = TempDir::new().unwrap();
        let old = write_template(dir.path(), "old.hbs");
        let new = dir.path().join("fresh.hbs");

        DefinitionStore::rename_template(&old, &new).unwrap();

        let created = DefinitionStore::load_for_template(&new).unwrap().unwrap();
        assert_eq!(created.template_id, "fresh");
    }

    #[test]
    fn test_rename_definition_rejects_empty_paths() {
        let result = DefinitionStore::rename_definition_file(Path::new(""), Path::new("/t/a"));
        assert!(matches!(result, Err(TemplateError::InvalidArgument(_))));
        let result = DefinitionStore::rename_definition_file(Path::new("/t/a"), Path::new(""));
        assert!(matches!(result, Err(TemplateError::InvalidArgument(_))));
    }

    #[test]
    fn test_rename_refuses_to_overwrite() {
        let dir = TempDir::new().unwrap();
        let a = write_template(dir.path(), "a.hbs");
        let b = write_template(dir.path(), "b.hbs");
        assert!(matches!(
            DefinitionStore::rename_template(&a, &b),
            Err(TemplateError::AlreadyExists(_))
        ));
    }

    #[test]
    fn test_save_for_template_renames_to_template_id() {
        let dir = TempDir::new().unwrap();
        let template = write_template(dir.path(), "draft.hbs");
        let mut definition = DefinitionStore::create_default(&template);
        definition.template_id = "final".into();

        let final_path = DefinitionStore::save_for_template(&definition, &template).unwrap();

        assert_eq!(final_path, dir.path().join("final.hbs"));
        assert!(final_path.exists());
        assert!(!template.exists());
        let loaded = DefinitionStore::load_for_template(&final_path).unwrap().unwrap();
        assert_eq!(loaded.template_id, "final");
        assert!(!DefinitionStore::definition_path_for(&template).exists());
    }

    #[test]
    fn test_save_for_template_same_id_keeps_path() {
        let dir = TempDir::new().unwrap();
        let template = write_template(dir.path(), "same.hbs");
        let definition = DefinitionStore::create_default(&template);
        let final_path = DefinitionStore::save_for_template(&definition, &template).unwrap();
        assert_eq!(final_path, template);
        assert!(DefinitionStore::definition_path_for(&template).exists());
    }

    #[test]
    fn test_parameter_validation() {
        let mut param = TemplateParameter::new("code", "System.String");
        param.required = true;
        param.pattern = Some("^[A-Z]{3}$".into());
        param.max_length = Some(3);

        assert!(param.validate(None).is_err());
        assert!(param.validate(Some(&json!("EUR"))).is_ok());
        assert!(param.validate(Some(&json!("eur"))).is_err());
        assert!(param.validate(Some(&json!("EURO"))).is_err());

        param.default_value = Some(json!("USD"));
        assert!(param.validate(None).is_ok());
    }

    #[test]
    fn test_parameter_numeric_and_allowed_values() {
        let mut count = TemplateParameter::new("count", "System.Int32");
        count.min_value = Some(1.0);
        count.max_value = Some(10.0);
        assert!(count.validate(Some(&json!(5))).is_ok());
        assert!(count.validate(Some(&json!(0))).is_err());
        assert!(count.validate(Some(&json!(11))).is_err());

        let mut mode = TemplateParameter::new("mode", "System.String");
        mode.allowed_values = vec!["draft".into(), "final".into()];
        assert!(mode.validate(Some(&json!("draft"))).is_ok());
        assert!(mode.validate(Some(&json!("other"))).is_err());
    }

    #[test]
    fn test_data_source_parameter_checks_row_cap_only() {
        let mut rows = TemplateParameter::new("lines", DATA_SOURCE_TYPE);
        rows.max_rows = Some(2);
        rows.pattern = Some("never-applied".into());
        assert!(rows.is_data_source());
        assert!(rows.validate(Some(&json!([{"a": 1}, {"a": 2}]))).is_ok());
        assert!(rows.validate(Some(&json!([1, 2, 3]))).is_err());
    }
}
