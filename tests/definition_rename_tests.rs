//! Renaming templates keeps their definitions attached

use std::fs;

use stencil_templates::{DefinitionStore, TemplateDefinition, TemplateError};
use tempfile::TempDir;

#[test]
fn test_rename_moves_existing_definition() {
    let dir = TempDir::new().unwrap();
    let old = dir.path().join("print.hbs");
    let new = dir.path().join("invoice.hbs");
    fs::write(&old, "body").unwrap();
    let definition = TemplateDefinition {
        template_id: "print".into(),
        description: "Prints an invoice".into(),
        ..TemplateDefinition::default()
    };
    DefinitionStore::save(&definition, &DefinitionStore::definition_path_for(&old)).unwrap();

    DefinitionStore::rename_template(&old, &new).unwrap();

    assert!(!old.exists());
    assert!(!DefinitionStore::definition_path_for(&old).exists());
    assert_eq!(fs::read_to_string(&new).unwrap(), "body");
    let moved = DefinitionStore::load_for_template(&new).unwrap().unwrap();
    assert_eq!(moved.description, "Prints an invoice");
}

#[test]
fn test_rename_without_definition_writes_default() {
    let dir = TempDir::new().unwrap();
    let old = dir.path().join("print.hbs");
    let new = dir.path().join("receipt.hbs");
    fs::write(&old, "body").unwrap();

    DefinitionStore::rename_template(&old, &new).unwrap();

    let created = DefinitionStore::load_for_template(&new).unwrap().unwrap();
    assert_eq!(created.template_id, "receipt");
    assert!(created.parameters.is_empty());
}

#[test]
fn test_save_for_template_renames_to_template_id() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("draft.hbs");
    fs::write(&path, "body").unwrap();

    let definition = TemplateDefinition {
        template_id: "final".into(),
        ..TemplateDefinition::default()
    };
    let saved = DefinitionStore::save_for_template(&definition, &path).unwrap();

    assert_eq!(saved, dir.path().join("final.hbs"));
    assert!(saved.is_file());
    assert!(!path.exists());
    assert_eq!(
        DefinitionStore::load_for_template(&saved).unwrap().unwrap().template_id,
        "final"
    );
}

#[test]
fn test_rename_rejects_empty_paths() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("a.hbs");
    let result = DefinitionStore::rename_definition_file(std::path::Path::new(""), &path);
    assert!(matches!(result, Err(TemplateError::InvalidArgument(_))));
}
