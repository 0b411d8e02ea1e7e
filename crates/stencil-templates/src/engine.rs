//! Template engine contract and registry
//!
//! Engines recognise template files, turn them into [`Template`] values and
//! render [`TemplateInstance`]s. The registry picks an engine by id, by file
//! extension, or by asking each engine whether it supports a template.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

use crate::engines::{HandlebarsEngine, StaticFileEngine};
use crate::error::LoadError;
use crate::model::{Template, TemplateInstance, TemplateOutput, TemplateType};

/// Capability object that parses and renders templates
#[async_trait]
pub trait TemplateEngine: Send + Sync {
    /// Stable identifier, compared case-insensitively
    fn id(&self) -> &str;

    fn display_name(&self) -> &str;

    /// Whether this engine can render the given template
    fn supports_template(&self, template: &Template) -> bool;

    fn supports_template_type(&self, template_type: TemplateType) -> bool;

    /// Extension without the dot
    fn supports_template_file_extension(&self, extension: &str) -> bool;

    /// Turn a file into a template.
    ///
    /// [`LoadError::NotATemplate`] means "not mine"; [`LoadError::Malformed`]
    /// means the file is a template of this engine but cannot be used.
    fn create_template_from_file(&self, path: &Path) -> Result<Template, LoadError>;

    fn create_template_instance(&self, template: Arc<Template>) -> TemplateInstance {
        TemplateInstance::new(template)
    }

    /// Render an instance. Failures are reported in the output, not as errors.
    async fn render(
        &self,
        instance: &TemplateInstance,
        cancel: CancellationToken,
    ) -> TemplateOutput;
}

/// Engines whose templates are single files identified by extension
pub trait FileTemplateEngine: TemplateEngine {
    /// Extensions without the dot, lowercase
    fn supported_file_extensions(&self) -> &[&'static str];

    fn default_file_extension(&self) -> &'static str;

    /// Whether a file name or path has one of the supported extensions
    fn supports_template_path(&self, name_or_path: &str) -> bool {
        Path::new(name_or_path)
            .extension()
            .map(|ext| {
                let ext = ext.to_string_lossy().to_lowercase();
                self.supported_file_extensions().iter().any(|s| *s == ext)
            })
            .unwrap_or(false)
    }
}

/// Lookup of template engines
#[derive(Clone, Default)]
pub struct TemplateEngineRegistry {
    engines: Vec<Arc<dyn TemplateEngine>>,
}

impl TemplateEngineRegistry {
    /// Empty registry
    pub fn new() -> Self {
        Self { engines: Vec::new() }
    }

    /// Registry holding the built-in Handlebars and static-file engines
    pub fn with_default_engines() -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(HandlebarsEngine::new()));
        registry.register(Arc::new(StaticFileEngine::new()));
        registry
    }

    /// Add an engine. Earlier engines win extension lookups.
    pub fn register(&mut self, engine: Arc<dyn TemplateEngine>) {
        debug!(engine = engine.id(), "Registering template engine");
        self.engines.push(engine);
    }

    pub fn engines(&self) -> &[Arc<dyn TemplateEngine>] {
        &self.engines
    }

    pub fn by_id(&self, id: &str) -> Option<Arc<dyn TemplateEngine>> {
        let found = self
            .engines
            .iter()
            .find(|e| e.id().eq_ignore_ascii_case(id))
            .cloned();
        if found.is_none() {
            warn!(engine = id, "Template engine not found");
        }
        found
    }

    /// First engine supporting the extension. Absence is common while
    /// scanning, so it is not logged.
    pub fn by_file_extension(&self, extension: &str) -> Option<Arc<dyn TemplateEngine>> {
        let extension = extension.trim_start_matches('.');
        self.engines
            .iter()
            .find(|e| e.supports_template_file_extension(extension))
            .cloned()
    }

    pub fn engines_supporting(&self, template: &Template) -> Vec<Arc<dyn TemplateEngine>> {
        self.engines
            .iter()
            .filter(|e| e.supports_template(template))
            .cloned()
            .collect()
    }

    pub fn engines_supporting_instance(
        &self,
        instance: &TemplateInstance,
    ) -> Vec<Arc<dyn TemplateEngine>> {
        self.engines_supporting(&instance.template)
    }

    /// Render with the first engine that supports the instance's template
    pub async fn render(
        &self,
        instance: &TemplateInstance,
        cancel: CancellationToken,
    ) -> TemplateOutput {
        let template = &instance.template;
        let Some(engine) = self.engines_supporting_instance(instance).into_iter().next() else {
            let message = format!(
                "No template engine supports template '{}' ({}, {})",
                template.id,
                template.template_type,
                template.file_path.display()
            );
            error!(template = %template.id, "{}", message);
            return TemplateOutput::failure(&template.id, message);
        };

        debug!(template = %template.id, engine = engine.id(), "Rendering template");
        engine.render(instance, cancel).await
    }
}

impl std::fmt::Debug for TemplateEngineRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TemplateEngineRegistry")
            .field("engines", &self.engines.iter().map(|e| e.id()).collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    struct FakeEngine {
        id: &'static str,
        extension: &'static str,
    }

    #[async_trait]
    impl TemplateEngine for FakeEngine {
        fn id(&self) -> &str {
            self.id
        }

        fn display_name(&self) -> &str {
            self.id
        }

        fn supports_template(&self, template: &Template) -> bool {
            template.engine_id.eq_ignore_ascii_case(self.id)
        }

        fn supports_template_type(&self, template_type: TemplateType) -> bool {
            template_type == TemplateType::GeneratedText
        }

        fn supports_template_file_extension(&self, extension: &str) -> bool {
            extension.eq_ignore_ascii_case(self.extension)
        }

        fn create_template_from_file(&self, path: &Path) -> Result<Template, LoadError> {
            Ok(Template::from_file(path, TemplateType::GeneratedText, self.id, None))
        }

        async fn render(
            &self,
            instance: &TemplateInstance,
            _cancel: CancellationToken,
        ) -> TemplateOutput {
            TemplateOutput::text(&instance.template.id, format!("rendered by {}", self.id))
        }
    }

    impl FileTemplateEngine for FakeEngine {
        fn supported_file_extensions(&self) -> &[&'static str] {
            std::slice::from_ref(&self.extension)
        }

        fn default_file_extension(&self) -> &'static str {
            self.extension
        }
    }

    fn registry() -> TemplateEngineRegistry {
        let mut registry = TemplateEngineRegistry::new();
        registry.register(Arc::new(FakeEngine { id: "alpha", extension: "alp" }));
        registry.register(Arc::new(FakeEngine { id: "beta", extension: "bet" }));
        registry
    }

    fn template_for(engine_id: &str) -> Arc<Template> {
        Arc::new(Template::from_file(
            &PathBuf::from("/t/x.alp"),
            TemplateType::GeneratedText,
            engine_id,
            None,
        ))
    }

    #[test]
    fn test_by_id_is_case_insensitive() {
        let registry = registry();
        assert_eq!(registry.by_id("ALPHA").unwrap().id(), "alpha");
        assert!(registry.by_id("gamma").is_none());
    }

    #[test]
    fn test_by_file_extension() {
        let registry = registry();
        assert_eq!(registry.by_file_extension("bet").unwrap().id(), "beta");
        assert_eq!(registry.by_file_extension(".ALP").unwrap().id(), "alpha");
        assert!(registry.by_file_extension("txt").is_none());
    }

    #[test]
    fn test_supports_template_path() {
        let engine = FakeEngine { id: "alpha", extension: "alp" };
        assert!(engine.supports_template_path("dir/print.alp"));
        assert!(engine.supports_template_path("PRINT.ALP"));
        assert!(!engine.supports_template_path("print.bet"));
        assert!(!engine.supports_template_path("print"));
    }

    #[test]
    fn test_engines_supporting() {
        let registry = registry();
        let engines = registry.engines_supporting(&template_for("beta"));
        assert_eq!(engines.len(), 1);
        assert_eq!(engines[0].id(), "beta");
    }

    #[tokio::test]
    async fn test_render_dispatches_to_supporting_engine() {
        let registry = registry();
        let instance = TemplateInstance::new(template_for("beta"));
        let output = registry.render(&instance, CancellationToken::new()).await;
        assert!(output.success);
        assert_eq!(output.as_text(), Some("rendered by beta"));
    }

    #[tokio::test]
    async fn test_render_without_engine_fails_softly() {
        let registry = registry();
        let instance = TemplateInstance::new(template_for("gamma"));
        let output = registry.render(&instance, CancellationToken::new()).await;
        assert!(!output.success);
        assert!(output.errors[0].contains("No template engine"));
    }

    #[test]
    fn test_default_engines_present() {
        let registry = TemplateEngineRegistry::with_default_engines();
        assert!(registry.by_file_extension("hbs").is_some());
        assert!(registry.by_file_extension("json").is_some());
        assert!(registry.by_file_extension("exe").is_none());
    }
}
