//! Scan and cache consistency across registered folders

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use stencil_templates::{TemplateEngineRegistry, TemplateManager, TemplateManagerEvent};
use tempfile::TempDir;

fn write(path: &Path, content: &str) {
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, content).unwrap();
}

/// Files under `dir` an engine will accept
fn populate(dir: &Path, count: usize) -> Vec<PathBuf> {
    let mut expected = Vec::new();
    for i in 0..count {
        let text = dir.join(format!("group{}/item{}.hbs", i % 3, i));
        write(&text, "{{value}}");
        expected.push(text);
        let data = dir.join(format!("group{}/nested/data{}.json", i % 3, i));
        write(&data, "{}");
        expected.push(data);
        // Ignored: definition files and unknown extensions
        write(
            &dir.join(format!("group{}/item{}.hbs.def", i % 3, i)),
            &format!(r#"{{"templateId":"item{}"}}"#, i),
        );
        write(&dir.join(format!("group{}/notes{}.md", i % 3, i)), "notes");
    }
    expected
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_overlapping_folders_cache_each_file_once() {
    let root = TempDir::new().unwrap();
    let expected: HashSet<PathBuf> = populate(root.path(), 12).into_iter().collect();

    let manager = TemplateManager::with_max_concurrent_scans(
        Arc::new(TemplateEngineRegistry::with_default_engines()),
        2,
    );
    manager.register_template_folder(root.path()).unwrap();
    for group in 0..3 {
        manager.register_template_folder(root.path().join(format!("group{}", group))).unwrap();
        manager
            .register_template_folder(root.path().join(format!("group{}/nested", group)))
            .unwrap();
    }
    manager.wait_for_pending_scans().await;

    let templates = manager.get_all_templates();
    let cached: HashSet<PathBuf> = templates.iter().map(|t| t.file_path.clone()).collect();
    assert_eq!(templates.len(), expected.len());
    assert_eq!(cached, expected);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_batch_completion_is_announced() {
    let root = TempDir::new().unwrap();
    populate(root.path(), 6);

    let manager = TemplateManager::new(Arc::new(TemplateEngineRegistry::with_default_engines()));
    let mut events = manager.subscribe();
    for group in 0..3 {
        manager.register_template_folder(root.path().join(format!("group{}", group))).unwrap();
    }
    manager.wait_for_pending_scans().await;

    // Batches may split if a scan finishes before the next one starts,
    // but the final announcement always reports the full cache.
    let mut last = None;
    while let Ok(Ok(event)) =
        tokio::time::timeout(Duration::from_millis(100), events.recv()).await
    {
        last = Some(event);
    }
    assert_eq!(last, Some(TemplateManagerEvent::TemplatesLoaded { template_count: 12 }));
}

#[tokio::test]
async fn test_refresh_after_external_changes() {
    let root = TempDir::new().unwrap();
    populate(root.path(), 3);

    let manager = TemplateManager::new(Arc::new(TemplateEngineRegistry::with_default_engines()));
    manager.register_template_folder(root.path()).unwrap();
    manager.wait_for_pending_scans().await;
    assert_eq!(manager.get_all_templates().len(), 6);

    fs::remove_dir_all(root.path().join("group0")).unwrap();
    manager.refresh_templates();
    manager.wait_for_pending_scans().await;
    assert_eq!(manager.get_all_templates().len(), 4);
}
