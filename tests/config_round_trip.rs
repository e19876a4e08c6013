//! Framework policy file round trips and live reloads.
//!
//! Each test writes to its own tempdir so nothing touches the working
//! directory.

use std::sync::Arc;

use async_trait::async_trait;
use tempfile::tempdir;

use psyframe::error::LlmError;
use psyframe::{
    CompletionRequest, CompletionResponse, Engine, EngineConfig, FrameworkConfig, FrameworkKind,
    FrameworkManager, FrameworksFile, InMemorySnapshotStore, LlmProvider,
};

struct Silent;

#[async_trait]
impl LlmProvider for Silent {
    fn model_name(&self) -> &str {
        "silent"
    }

    async fn complete(&self, _: CompletionRequest) -> Result<CompletionResponse, LlmError> {
        Ok(CompletionResponse::text("NONE"))
    }
}

#[test]
fn policy_file_survives_save_and_load() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("frameworks.toml");

    let mut file = FrameworksFile::default();
    file.set(
        FrameworkKind::CognitiveBehavioral,
        FrameworkConfig::default()
            .with_interval(2)
            .with_threshold(0.45)
            .with_window(4)
            .with_model_hint("small"),
    );
    file.set(FrameworkKind::Archetypal, FrameworkConfig::default().disabled());
    file.save_to_path(&path).unwrap();

    let loaded = FrameworksFile::load_from_path(&path).unwrap();
    assert_eq!(loaded, file);

    let resolved = loaded.resolve().unwrap();
    assert_eq!(resolved.len(), 2);
    assert_eq!(resolved[&FrameworkKind::CognitiveBehavioral].analysis_interval, 2);
    assert!(!resolved[&FrameworkKind::Archetypal].enabled);
    assert_eq!(
        loaded.config_for(FrameworkKind::Narrative).unwrap(),
        FrameworkConfig::default()
    );
}

#[test]
fn hand_written_policy_uses_defaults_for_missing_fields() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("frameworks.toml");
    std::fs::write(
        &path,
        "[frameworks.attachment]\nconfidence_threshold = 0.6\n\n[frameworks.narrative]\nenabled = false\n",
    )
    .unwrap();

    let file = FrameworksFile::load_from_path(&path).unwrap();
    let attachment = file.config_for(FrameworkKind::Attachment).unwrap();
    assert_eq!(attachment.confidence_threshold, 0.6);
    assert_eq!(attachment.analysis_interval, 1);
    assert_eq!(attachment.window_size, 6);
    assert!(!file.config_for(FrameworkKind::Narrative).unwrap().enabled);
}

#[test]
fn invalid_policy_file_is_rejected_whole() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("frameworks.toml");
    std::fs::write(&path, "[frameworks.parts_work]\nanalysis_interval = 0\n").unwrap();

    assert!(FrameworksFile::load_from_path(&path).is_err());
}

#[tokio::test]
async fn reload_applies_on_the_next_call() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("frameworks.toml");
    FrameworksFile::default().save_to_path(&path).unwrap();

    let manager = FrameworkManager::with_builtin(&FrameworksFile::load_from_path(&path).unwrap())
        .await
        .unwrap();
    assert_eq!(manager.get_enabled().await.len(), 5);

    let mut file = FrameworksFile::default();
    file.set(FrameworkKind::PartsWork, FrameworkConfig::default().disabled());
    file.set(
        FrameworkKind::Attachment,
        FrameworkConfig::default().with_threshold(0.8),
    );
    file.save_to_path(&path).unwrap();

    manager.reload_from_path(&path).await.unwrap();
    let enabled: Vec<_> = manager
        .get_enabled()
        .await
        .iter()
        .map(|f| f.kind())
        .collect();
    assert!(!enabled.contains(&FrameworkKind::PartsWork));
    assert_eq!(
        manager
            .get_config(FrameworkKind::Attachment)
            .await
            .unwrap()
            .confidence_threshold,
        0.8
    );
    assert_eq!(
        manager.disabled_reason(FrameworkKind::PartsWork).await.as_deref(),
        Some("disabled by configuration")
    );
}

#[tokio::test]
async fn broken_reload_keeps_previous_policy() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("frameworks.toml");
    let mut file = FrameworksFile::default();
    file.set(FrameworkKind::Narrative, FrameworkConfig::default().with_interval(4));
    file.save_to_path(&path).unwrap();

    let config = EngineConfig {
        frameworks: file,
        frameworks_file: Some(path.clone()),
        ..EngineConfig::default()
    };
    let engine = Engine::from_config(
        config,
        Arc::new(Silent),
        Arc::new(InMemorySnapshotStore::new()),
    )
    .await
    .unwrap();

    std::fs::write(&path, "[frameworks.narrative]\nconfidence_threshold = 7.0\n").unwrap();
    assert!(engine.reload_config().await.is_err());
    assert_eq!(
        engine
            .manager()
            .get_config(FrameworkKind::Narrative)
            .await
            .unwrap()
            .analysis_interval,
        4
    );

    std::fs::write(&path, "[frameworks.narrative]\nanalysis_interval = 2\n").unwrap();
    engine.reload_config().await.unwrap();
    assert_eq!(
        engine
            .manager()
            .get_config(FrameworkKind::Narrative)
            .await
            .unwrap()
            .analysis_interval,
        2
    );
}
