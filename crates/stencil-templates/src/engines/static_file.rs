//! Engine for files copied verbatim: data, images and raw binaries

use std::path::Path;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use super::{extension_of, load_definition_for};
use crate::engine::{FileTemplateEngine, TemplateEngine};
use crate::error::LoadError;
use crate::model::{Template, TemplateInstance, TemplateOutput, TemplateType};

const ENGINE_ID: &str = "static";

const DATA_EXTENSIONS: [&str; 6] = ["json", "csv", "xml", "yaml", "yml", "txt"];
const IMAGE_EXTENSIONS: [&str; 5] = ["png", "jpg", "jpeg", "gif", "svg"];
const BINARY_EXTENSIONS: [&str; 1] = ["bin"];

const ALL_EXTENSIONS: [&str; 12] = [
    "json", "csv", "xml", "yaml", "yml", "txt", "png", "jpg", "jpeg", "gif", "svg", "bin",
];

/// Serves file contents without transformation
#[derive(Debug, Default)]
pub struct StaticFileEngine;

impl StaticFileEngine {
    pub fn new() -> Self {
        Self
    }

    /// Template type implied by an extension
    pub fn template_type_for(extension: &str) -> Option<TemplateType> {
        let extension = extension.trim_start_matches('.').to_lowercase();
        let ext = extension.as_str();
        if DATA_EXTENSIONS.contains(&ext) {
            Some(TemplateType::DataFile)
        } else if IMAGE_EXTENSIONS.contains(&ext) {
            Some(TemplateType::ImageFile)
        } else if BINARY_EXTENSIONS.contains(&ext) {
            Some(TemplateType::BinaryFile)
        } else {
            None
        }
    }
}

#[async_trait]
impl TemplateEngine for StaticFileEngine {
    fn id(&self) -> &str {
        ENGINE_ID
    }

    fn display_name(&self) -> &str {
        "Static file"
    }

    fn supports_template(&self, template: &Template) -> bool {
        template.engine_id.eq_ignore_ascii_case(ENGINE_ID)
    }

    fn supports_template_type(&self, template_type: TemplateType) -> bool {
        matches!(
            template_type,
            TemplateType::DataFile | TemplateType::ImageFile | TemplateType::BinaryFile
        )
    }

    fn supports_template_file_extension(&self, extension: &str) -> bool {
        Self::template_type_for(extension).is_some()
    }

    fn create_template_from_file(&self, path: &Path) -> Result<Template, LoadError> {
        let Some(template_type) = extension_of(path).and_then(|ext| Self::template_type_for(&ext))
        else {
            return Err(LoadError::NotATemplate {
                path: path.to_path_buf(),
                reason: "unsupported static file extension".to_string(),
            });
        };

        let definition = load_definition_for(path)?;
        let mut template = Template::from_file(path, template_type, ENGINE_ID, definition);
        // Binary payloads can be large; read them on demand.
        template.use_caching = template_type == TemplateType::DataFile;
        Ok(template)
    }

    async fn render(
        &self,
        instance: &TemplateInstance,
        cancel: CancellationToken,
    ) -> TemplateOutput {
        let template = &instance.template;
        let bytes = tokio::select! {
            _ = cancel.cancelled() => {
                return TemplateOutput::failure(&template.id, "Rendering cancelled");
            }
            read = tokio::fs::read(&template.file_path) => match read {
                Ok(bytes) => bytes,
                Err(e) => {
                    return TemplateOutput::failure(
                        &template.id,
                        format!("Failed to read {}: {}", template.file_path.display(), e),
                    );
                }
            },
        };

        if template.template_type == TemplateType::DataFile {
            match String::from_utf8(bytes) {
                Ok(text) => TemplateOutput::text(&template.id, text),
                Err(e) => {
                    TemplateOutput::failure(&template.id, format!("Data file is not UTF-8: {}", e))
                }
            }
        } else {
            TemplateOutput::binary(&template.id, bytes)
        }
    }
}

impl FileTemplateEngine for StaticFileEngine {
    fn supported_file_extensions(&self) -> &[&'static str] {
        &ALL_EXTENSIONS
    }

    fn default_file_extension(&self) -> &'static str {
        "json"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::OutputContent;
    use std::fs;
    use std::sync::Arc;
    use tempfile::TempDir;

    #[test]
    fn test_template_type_for_extension() {
        assert_eq!(StaticFileEngine::template_type_for("JSON"), Some(TemplateType::DataFile));
        assert_eq!(StaticFileEngine::template_type_for(".svg"), Some(TemplateType::ImageFile));
        assert_eq!(StaticFileEngine::template_type_for("bin"), Some(TemplateType::BinaryFile));
        assert_eq!(StaticFileEngine::template_type_for("hbs"), None);
    }

    #[test]
    fn test_extension_tables_agree() {
        let engine = StaticFileEngine::new();
        for ext in engine.supported_file_extensions() {
            assert!(engine.supports_template_file_extension(ext), "{}", ext);
        }
        assert!(engine.supports_template_path("logo.PNG"));
        assert!(!engine.supports_template_path("logo.exe"));
    }

    #[tokio::test]
    async fn test_render_data_file_as_text() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("rates.json");
        fs::write(&path, r#"{"vat": 21}"#).unwrap();

        let engine = StaticFileEngine::new();
        let template = Arc::new(engine.create_template_from_file(&path).unwrap());
        assert_eq!(template.template_type, TemplateType::DataFile);
        assert!(template.use_caching);

        let output = engine
            .render(&TemplateInstance::new(template), CancellationToken::new())
            .await;
        assert_eq!(output.as_text(), Some(r#"{"vat": 21}"#));
    }

    #[tokio::test]
    async fn test_render_image_as_binary() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("logo.png");
        fs::write(&path, [0x89, b'P', b'N', b'G']).unwrap();

        let engine = StaticFileEngine::new();
        let template = Arc::new(engine.create_template_from_file(&path).unwrap());
        let output = engine
            .render(&TemplateInstance::new(template), CancellationToken::new())
            .await;
        assert!(output.success);
        assert_eq!(output.content, Some(OutputContent::Binary(vec![0x89, b'P', b'N', b'G'])));
    }

    #[tokio::test]
    async fn test_render_missing_file_fails() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("gone.csv");
        fs::write(&path, "a,b").unwrap();
        let engine = StaticFileEngine::new();
        let template = Arc::new(engine.create_template_from_file(&path).unwrap());
        fs::remove_file(&path).unwrap();

        let output = engine
            .render(&TemplateInstance::new(template), CancellationToken::new())
            .await;
        assert!(!output.success);
    }

    #[test]
    fn test_unknown_extension_is_not_a_template() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("tool.exe");
        fs::write(&path, "MZ").unwrap();
        let err = StaticFileEngine::new().create_template_from_file(&path).unwrap_err();
        assert!(err.is_not_a_template());
    }
}
