// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use super::helpers::{engine_set, orchestrator, page, FixedScorer, StubEngine};
use crawlpilot::domain::models::crawl_result::AttemptOutcome;
use crawlpilot::domain::models::site_profile::{AntiBotRisk, SiteProfile, SiteType};
use crawlpilot::domain::services::quality_scorer::{QualityInput, QualityScorer};
use crawlpilot::utils::retry_policy::RetryPolicy;
use crawlpilot::{
    CrawlRequest, CrawlStatus, EngineError, EngineKind, EngineSelector, FallbackOrchestrator,
    OrchestratorConfig,
};
use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

fn request() -> CrawlRequest {
    CrawlRequest::new("https://news.example/article").unwrap()
}

fn not_found() -> EngineError {
    EngineError::Http {
        status: 404,
        message: "not found".to_string(),
    }
}

#[test]
fn test_selector_returns_every_engine_once_for_all_profiles() {
    let selector = EngineSelector::default();
    let site_types = [SiteType::Static, SiteType::ServerRendered, SiteType::SinglePageApp];
    let risks = [AntiBotRisk::Low, AntiBotRisk::Medium, AntiBotRisk::High];
    let hints = [None, Some("product prices")];

    for site_type in site_types {
        for risk in risks {
            for js_score in [0, 25, 45, 90] {
                for hint in hints {
                    let profile = SiteProfile::new(site_type, js_score, risk);
                    let mut request = request();
                    if let Some(hint) = hint {
                        request = request.with_target_content(hint);
                    }
                    let selection = selector.select(&request, Some(&profile));
                    let unique: HashSet<EngineKind> = selection.engines.iter().copied().collect();

                    assert_eq!(selection.engines.len(), 4, "{:?}", profile);
                    assert_eq!(unique.len(), 4, "{:?}", profile);
                }
            }
        }
    }
}

#[tokio::test]
async fn test_override_attempts_exactly_one_engine() {
    let calls = Arc::new(Mutex::new(Vec::new()));
    let engines = engine_set(vec![
        StubEngine::failing(EngineKind::Browser, EngineError::Other("crashed".into()))
            .with_calls(calls.clone()),
        StubEngine::succeeding(EngineKind::Http).with_calls(calls.clone()),
    ]);
    let orchestrator = orchestrator(engines, RetryPolicy::immediate());
    let request = request().with_engine_override(EngineKind::Browser);

    let selection = EngineSelector::default().select(&request, None);
    let result = orchestrator.run(&request, &selection.engines).await;

    assert_eq!(result.status, CrawlStatus::Failed);
    assert_eq!(result.metadata.attempted_engines, vec![EngineKind::Browser]);
    assert_eq!(calls.lock().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_permanent_error_falls_back_without_backoff() {
    let engines = engine_set(vec![
        StubEngine::failing(EngineKind::Http, not_found()),
        StubEngine::succeeding(EngineKind::AiExtraction),
    ]);
    let orchestrator = orchestrator(engines, RetryPolicy::default());

    let started = tokio::time::Instant::now();
    let result = orchestrator
        .run(&request(), &[EngineKind::Http, EngineKind::AiExtraction])
        .await;

    assert_eq!(result.status, CrawlStatus::Complete);
    assert_eq!(
        result.metadata.attempted_engines,
        vec![EngineKind::Http, EngineKind::AiExtraction]
    );
    assert_eq!(result.metadata.attempts[0].outcome, AttemptOutcome::PermanentError);
    assert_eq!(result.metadata.attempts[0].backoff_ms, 0);
    assert!(started.elapsed() < Duration::from_millis(1));
}

#[tokio::test(start_paused = true)]
async fn test_transient_error_backs_off_before_next_engine() {
    let engines = engine_set(vec![
        StubEngine::failing(EngineKind::Http, EngineError::Network("connection reset".into())),
        StubEngine::succeeding(EngineKind::AiExtraction),
    ]);
    let orchestrator = orchestrator(engines, RetryPolicy::default());

    let started = tokio::time::Instant::now();
    let result = orchestrator
        .run(&request(), &[EngineKind::Http, EngineKind::AiExtraction])
        .await;

    assert_eq!(result.status, CrawlStatus::Complete);
    assert_eq!(result.metadata.attempts[0].outcome, AttemptOutcome::TransientError);
    assert_eq!(result.metadata.attempts[0].backoff_ms, 1000);
    assert!(started.elapsed() >= Duration::from_secs(1));
}

#[tokio::test]
async fn test_all_below_threshold_returns_highest_candidate() {
    let engines = engine_set(vec![
        StubEngine::new(EngineKind::Http, |_| {
            Ok(crawlpilot::EngineOutput {
                text: "short".into(),
                ..Default::default()
            })
        }),
        StubEngine::new(EngineKind::Browser, |request| Ok(page(request.url_str()))),
    ]);
    // 分数与正文长度成正比，门槛设在任何页面都达不到的位置
    struct LengthScorer;
    impl crawlpilot::domain::services::quality_scorer::ContentScorer for LengthScorer {
        fn assess(
            &self,
            input: &QualityInput,
        ) -> crawlpilot::domain::services::quality_scorer::QualityAssessment {
            let score = input.cleaned_length.min(50) as u8;
            crawlpilot::domain::services::quality_scorer::QualityAssessment {
                score,
                confidence: 0.5,
                passed: false,
            }
        }
    }
    let orchestrator = FallbackOrchestrator::with_scorer(
        engines,
        OrchestratorConfig {
            retry_policy: RetryPolicy::immediate(),
            ..Default::default()
        },
        Arc::new(LengthScorer),
    );

    let result = orchestrator
        .run(&request(), &[EngineKind::Http, EngineKind::Browser])
        .await;

    assert_eq!(result.status, CrawlStatus::Complete);
    assert!(!result.metadata.quality_gate_passed);
    assert_eq!(result.metadata.engine_used, Some(EngineKind::Browser));
    assert_eq!(result.metadata.quality_score, 50);
    assert!(!result.text.is_empty());
}

#[tokio::test]
async fn test_fixed_score_above_threshold_is_accepted() {
    let engines = engine_set(vec![StubEngine::succeeding(EngineKind::Http)]);
    let orchestrator = FallbackOrchestrator::with_scorer(
        engines,
        OrchestratorConfig::default(),
        Arc::new(FixedScorer {
            score: 80,
            threshold: 60,
        }),
    );

    let result = orchestrator.run(&request(), &[EngineKind::Http]).await;

    assert!(result.metadata.quality_gate_passed);
    assert_eq!(result.metadata.quality_score, 80);
    assert!((result.metadata.confidence - 0.8).abs() < f64::EPSILON);
}

#[test]
fn test_quality_score_is_monotonic_in_cleaned_length() {
    let scorer = QualityScorer::default();
    for raw_length in [1usize, 10, 250, 4000] {
        let mut previous = 0u8;
        for cleaned_length in 0..=raw_length.min(400) {
            let score = scorer.score(&QualityInput {
                raw_length,
                cleaned_length,
                markdown_reduction: 0.5,
                ui_reduction: 0.25,
            });
            assert!(score >= previous, "raw {} cleaned {}", raw_length, cleaned_length);
            previous = score;
        }
    }
}
