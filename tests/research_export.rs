//! Research views over snapshots produced by real turns.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Duration, Utc};
use pretty_assertions::assert_eq;

use psyframe::conversation::from_user_texts;
use psyframe::error::LlmError;
use psyframe::{
    CompletionRequest, CompletionResponse, Engine, EngineConfig, FrameworkKind,
    InMemorySnapshotStore, LlmProvider, ResearchExport, ResearchFilters,
};

struct FixedLlm;

#[async_trait]
impl LlmProvider for FixedLlm {
    fn model_name(&self) -> &str {
        "fixed"
    }

    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError> {
        let answer = match request.metadata.get("framework").map(String::as_str) {
            Some("cognitive_behavioral") => {
                "ELEMENT|catastrophizing|0.8|0.9|the worst will happen\n\
                 ELEMENT|overgeneralization|0.4|0.35|I always"
            }
            Some("attachment") => "ELEMENT|anxious|0.7|0.6|leave me",
            _ => "NONE",
        };
        Ok(CompletionResponse::text(answer))
    }
}

async fn engine() -> Engine {
    Engine::from_config(
        EngineConfig::default(),
        Arc::new(FixedLlm),
        Arc::new(InMemorySnapshotStore::new()),
    )
    .await
    .unwrap()
}

/// Two conversations: c1 hits cognitive patterns twice, c2 hits attachment once.
async fn seeded() -> Engine {
    let engine = engine().await;
    engine
        .process_turn("c1", &from_user_texts(&["I always think the worst will happen"]))
        .await;
    engine
        .process_turn(
            "c1",
            &from_user_texts(&["I always think the worst will happen", "yes, always"]),
        )
        .await;
    engine
        .process_turn("c2", &from_user_texts(&["I'm scared my partner will leave me"]))
        .await;
    engine
}

#[tokio::test]
async fn conversation_aggregate_counts_occurrences() {
    let engine = seeded().await;
    let aggregate = engine
        .data_collector()
        .aggregate_conversation_data("c1")
        .await
        .unwrap()
        .unwrap();

    assert_eq!(aggregate.snapshot_count, 2);
    assert_eq!(aggregate.analysis_count, 2);
    assert_eq!(aggregate.last_analyzed_message_id.as_deref(), Some("m2"));

    let cbt = &aggregate.frameworks[&FrameworkKind::CognitiveBehavioral];
    assert_eq!(cbt.element_count, 2);
    assert_eq!(cbt.subtype_frequency["catastrophizing"], 2);
    assert_eq!(cbt.subtype_frequency["overgeneralization"], 2);
    assert_eq!(cbt.confidence.count, 2);
    assert_eq!(cbt.confidence.min, 0.35);
    assert_eq!(cbt.confidence.max, 0.9);
    assert_eq!(cbt.last_analyzed_count, Some(2));
    assert!(cbt.first_seen <= cbt.last_seen);

    // Frameworks that analyzed but found nothing still appear, empty.
    let narrative = &aggregate.frameworks[&FrameworkKind::Narrative];
    assert_eq!(narrative.element_count, 0);
    assert_eq!(narrative.first_seen, None);
}

#[tokio::test]
async fn unknown_conversation_has_no_aggregate() {
    let engine = seeded().await;
    assert!(
        engine
            .data_collector()
            .aggregate_conversation_data("nobody")
            .await
            .unwrap()
            .is_none()
    );
}

#[tokio::test]
async fn export_applies_every_filter() {
    let engine = seeded().await;
    let collector = engine.data_collector();

    let everything = collector
        .export_research_data(&ResearchFilters::default())
        .await
        .unwrap();
    assert_eq!(everything.conversation_count, 2);
    assert_eq!(everything.records.len(), 3);
    assert_eq!(everything.totals[&FrameworkKind::CognitiveBehavioral].records, 2);
    assert_eq!(everything.totals[&FrameworkKind::CognitiveBehavioral].occurrences, 4);
    assert_eq!(everything.totals[&FrameworkKind::Attachment].records, 1);

    let only_c2 = collector
        .export_research_data(&ResearchFilters {
            conversation_ids: vec!["c2".to_string()],
            ..ResearchFilters::default()
        })
        .await
        .unwrap();
    assert_eq!(only_c2.records.len(), 1);
    assert_eq!(only_c2.records[0].subtype, "anxious");

    let confident_cbt = collector
        .export_research_data(&ResearchFilters {
            frameworks: vec![FrameworkKind::CognitiveBehavioral],
            min_confidence: Some(0.5),
            ..ResearchFilters::default()
        })
        .await
        .unwrap();
    assert_eq!(confident_cbt.conversation_count, 1);
    let subtypes: Vec<_> = confident_cbt.records.iter().map(|r| r.subtype.as_str()).collect();
    assert_eq!(subtypes, vec!["catastrophizing"]);

    let future = collector
        .export_research_data(&ResearchFilters {
            since: Some(Utc::now() + Duration::hours(1)),
            ..ResearchFilters::default()
        })
        .await
        .unwrap();
    assert!(future.records.is_empty());
    assert_eq!(future.conversation_count, 0);
    assert!(future.totals.is_empty());

    let past = collector
        .export_research_data(&ResearchFilters {
            until: Some(Utc::now()),
            ..ResearchFilters::default()
        })
        .await
        .unwrap();
    assert_eq!(past.records.len(), 3);
}

#[tokio::test]
async fn json_export_parses_back() {
    let engine = seeded().await;
    let filters = ResearchFilters {
        frameworks: vec![FrameworkKind::Attachment],
        ..ResearchFilters::default()
    };
    let json = engine
        .data_collector()
        .export_research_json(&filters)
        .await
        .unwrap();

    let export: ResearchExport = serde_json::from_str(&json).unwrap();
    assert_eq!(export.filters, filters);
    assert_eq!(export.records.len(), 1);
    assert_eq!(export.records[0].evidence, "leave me");

    let value: serde_json::Value = serde_json::from_str(&json).unwrap();
    assert!(value["totals"]["attachment"]["records"].is_number());
}
