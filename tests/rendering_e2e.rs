//! Scan, look up and render templates end to end

use std::fs;
use std::sync::Arc;

use serde_json::json;
use stencil_templates::{
    CancellationToken, DefinitionStore, OutputContent, TemplateDefinition, TemplateEngineRegistry,
    TemplateManager, TemplateParameter,
};
use tempfile::TempDir;

#[tokio::test]
async fn test_render_scanned_template() {
    let root = TempDir::new().unwrap();
    let folder = root.path().join("Workspace/Invoice/print");
    fs::create_dir_all(&folder).unwrap();
    let file = folder.join("print.hbs");
    fs::write(&file, "Invoice {{number}} for {{customer}}").unwrap();

    let mut customer = TemplateParameter::new("customer", "System.String");
    customer.default_value = Some(json!("ACME"));
    let mut number = TemplateParameter::new("number", "System.Int32");
    number.required = true;
    number.min_value = Some(1.0);
    let definition = TemplateDefinition {
        template_id: "print".into(),
        parameters: vec![number, customer],
        ..TemplateDefinition::default()
    };
    DefinitionStore::save(&definition, &DefinitionStore::definition_path_for(&file)).unwrap();

    let engines = Arc::new(TemplateEngineRegistry::with_default_engines());
    let manager = TemplateManager::new(engines.clone());
    manager.set_default_template_folder(Some(root.path().to_path_buf()));
    manager.wait_for_pending_scans().await;

    let template = manager.get_template_by_id("@Workspace/@Invoice/print").unwrap();
    let engine = engines.engines_supporting(&template).into_iter().next().unwrap();

    let instance = engine.create_template_instance(template.clone()).with_parameter("number", 42);
    let output = engines.render(&instance, CancellationToken::new()).await;
    assert!(output.success, "{:?}", output.errors);
    assert_eq!(output.content, Some(OutputContent::Text("Invoice 42 for ACME".to_string())));

    let invalid = engine.create_template_instance(template).with_parameter("number", 0);
    let output = engines.render(&invalid, CancellationToken::new()).await;
    assert!(!output.success);
}

#[tokio::test]
async fn test_render_static_data_file() {
    let root = TempDir::new().unwrap();
    fs::write(root.path().join("rates.json"), r#"{"vat":21}"#).unwrap();

    let engines = Arc::new(TemplateEngineRegistry::with_default_engines());
    let manager = TemplateManager::new(engines.clone());
    manager.register_template_folder(root.path()).unwrap();
    manager.wait_for_pending_scans().await;

    let template = manager.get_template_by_id("rates").unwrap();
    let instance = stencil_templates::TemplateInstance::new(template);
    let output = engines.render(&instance, CancellationToken::new()).await;
    assert_eq!(output.as_text(), Some(r#"{"vat":21}"#));
}
