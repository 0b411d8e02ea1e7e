//! Handlebars engine for generated-text templates
//!
//! Parameters declared in the template's definition supply defaults and are
//! validated before rendering. Instance parameters are passed to Handlebars
//! as the root JSON context.

use std::path::Path;

use async_trait::async_trait;
use handlebars::{Handlebars, Template as CompiledTemplate};
use serde_json::{Map, Value};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::{extension_of, load_definition_for};
use crate::engine::{FileTemplateEngine, TemplateEngine};
use crate::error::LoadError;
use crate::model::{Template, TemplateInstance, TemplateOutput, TemplateType};

const ENGINE_ID: &str = "handlebars";
const EXTENSIONS: [&str; 2] = ["hbs", "handlebars"];

/// Renders `.hbs` / `.handlebars` files
#[derive(Debug, Default)]
pub struct HandlebarsEngine {
    strict: bool,
}

impl HandlebarsEngine {
    pub fn new() -> Self {
        Self { strict: false }
    }

    /// Fail rendering on references to missing values
    pub fn strict() -> Self {
        Self { strict: true }
    }

    /// Definition defaults overlaid with the instance's values
    fn build_context(instance: &TemplateInstance) -> Result<Map<String, Value>, Vec<String>> {
        let mut context = Map::new();
        let mut errors = Vec::new();

        if let Some(definition) = &instance.template.definition {
            for parameter in &definition.parameters {
                let supplied = instance.parameter(&parameter.name);
                if let Err(message) = parameter.validate(supplied) {
                    errors.push(message);
                    continue;
                }
                if let Some(value) = supplied.or(parameter.default_value.as_ref()) {
                    context.insert(parameter.name.clone(), value.clone());
                }
            }
        }

        for (name, value) in &instance.parameters {
            let declared = instance
                .template
                .definition
                .as_ref()
                .and_then(|d| d.parameter(name))
                .map(|p| p.name.clone());
            context.insert(declared.unwrap_or_else(|| name.clone()), value.clone());
        }

        if errors.is_empty() {
            Ok(context)
        } else {
            Err(errors)
        }
    }
}

#[async_trait]
impl TemplateEngine for HandlebarsEngine {
    fn id(&self) -> &str {
        ENGINE_ID
    }

    fn display_name(&self) -> &str {
        "Handlebars"
    }

    fn supports_template(&self, template: &Template) -> bool {
        template.engine_id.eq_ignore_ascii_case(ENGINE_ID)
            || (template.template_type == TemplateType::GeneratedText
                && template
                    .extension()
                    .is_some_and(|ext| self.supports_template_file_extension(&ext)))
    }

    fn supports_template_type(&self, template_type: TemplateType) -> bool {
        template_type == TemplateType::GeneratedText
    }

    fn supports_template_file_extension(&self, extension: &str) -> bool {
        EXTENSIONS
            .iter()
            .any(|e| e.eq_ignore_ascii_case(extension.trim_start_matches('.')))
    }

    fn create_template_from_file(&self, path: &Path) -> Result<Template, LoadError> {
        let supported =
            extension_of(path).is_some_and(|ext| self.supports_template_file_extension(&ext));
        if !supported {
            return Err(LoadError::NotATemplate {
                path: path.to_path_buf(),
                reason: "not a handlebars file".to_string(),
            });
        }

        let definition = load_definition_for(path)?;

        let source = std::fs::read_to_string(path).map_err(|source| LoadError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        CompiledTemplate::compile(&source).map_err(|e| LoadError::Malformed {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;

        Ok(Template::from_file(
            path,
            TemplateType::GeneratedText,
            ENGINE_ID,
            definition,
        ))
    }

    async fn render(
        &self,
        instance: &TemplateInstance,
        cancel: CancellationToken,
    ) -> TemplateOutput {
        let template = &instance.template;
        if cancel.is_cancelled() {
            return TemplateOutput::failure(&template.id, "Rendering cancelled");
        }

        let source = tokio::select! {
            _ = cancel.cancelled() => {
                return TemplateOutput::failure(&template.id, "Rendering cancelled");
            }
            read = tokio::fs::read_to_string(&template.file_path) => match read {
                Ok(source) => source,
                Err(e) => {
                    return TemplateOutput::failure(
                        &template.id,
                        format!("Failed to read {}: {}", template.file_path.display(), e),
                    );
                }
            },
        };

        let context = match Self::build_context(instance) {
            Ok(context) => context,
            Err(errors) => return TemplateOutput::failures(&template.id, errors),
        };

        let mut registry = Handlebars::new();
        registry.set_strict_mode(self.strict);
        match registry.render_template(&source, &Value::Object(context)) {
            Ok(rendered) => {
                debug!(
                    template = %template.id,
                    bytes = rendered.len(),
                    "Rendered handlebars template"
                );
                TemplateOutput::text(&template.id, rendered)
            }
            Err(e) => TemplateOutput::failure(&template.id, format!("Render error: {}", e)),
        }
    }
}

impl FileTemplateEngine for HandlebarsEngine {
    fn supported_file_extensions(&self) -> &[&'static str] {
        &EXTENSIONS
    }

    fn default_file_extension(&self) -> &'static str {
        EXTENSIONS[0]
    }
}
