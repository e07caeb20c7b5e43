// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use super::helpers::{
    engine_set, orchestrator, scheduler, ConcurrencyTracker, FixedScorer, StubEngine,
};
use crawlpilot::domain::models::crawl_result::AttemptOutcome;
use crawlpilot::domain::models::site_profile::SiteProfile;
use crawlpilot::utils::errors::{SchedulerError, ValidationError};
use crawlpilot::utils::retry_policy::RetryPolicy;
use crawlpilot::{
    CrawlStatus, EngineError, EngineKind, FallbackOrchestrator, JobStatus, OrchestratorConfig,
    ProgressEvent,
};
use futures::StreamExt;
use std::sync::Arc;
use std::time::Duration;

fn urls(count: usize) -> Vec<String> {
    (0..count)
        .map(|i| format!("https://site{}.example/page", i))
        .collect()
}

#[tokio::test]
async fn test_mixed_batch_completes_with_failed_url_recorded() {
    // bad.invalid 对所有引擎都返回永久性错误
    let behavior = |kind: EngineKind| {
        StubEngine::new(kind, |request| {
            if request.url_str().contains("bad.invalid") {
                Err(EngineError::Other("invalid url".to_string()))
            } else {
                Ok(super::helpers::page(request.url_str()))
            }
        })
    };
    let engines = engine_set(EngineKind::ALL.into_iter().map(behavior).collect());
    let orchestrator = FallbackOrchestrator::with_scorer(
        engines,
        OrchestratorConfig::default(),
        Arc::new(FixedScorer {
            score: 80,
            threshold: 60,
        }),
    );
    let (scheduler, _) = scheduler(orchestrator, SiteProfile::simple_static());

    let job_id = scheduler
        .submit(
            &["https://a.example", "https://bad.invalid", "https://b.example"],
            Some(2),
        )
        .unwrap();
    let summary = scheduler.wait(job_id).await.unwrap();

    assert_eq!(summary.status, JobStatus::Completed);
    assert_eq!(summary.counts.completed, 3);
    assert_eq!(summary.counts.succeeded, 2);
    assert_eq!(summary.counts.failed, 1);

    let results = scheduler.results(job_id).unwrap();
    assert_eq!(results[0].metadata.engine_used, Some(EngineKind::Http));
    assert_eq!(results[0].metadata.attempted_engines, vec![EngineKind::Http]);

    let bad = &results[1];
    assert_eq!(bad.status, CrawlStatus::Failed);
    assert_eq!(bad.metadata.attempted_engines.len(), 4);
    assert!(bad
        .metadata
        .attempts
        .iter()
        .all(|a| a.outcome == AttemptOutcome::PermanentError && a.backoff_ms == 0));
    assert_eq!(bad.error(), Some("invalid url"));
}

#[tokio::test]
async fn test_pool_never_exceeds_concurrency_limit() {
    let tracker = Arc::new(ConcurrencyTracker::default());
    let engines = engine_set(vec![StubEngine::succeeding(EngineKind::Http)
        .with_delay(Duration::from_millis(20))
        .with_tracker(tracker.clone())]);
    let (scheduler, _) = scheduler(
        orchestrator(engines, RetryPolicy::immediate()),
        SiteProfile::simple_static(),
    );

    let job_id = scheduler.submit(&urls(12), Some(3)).unwrap();
    let summary = scheduler.wait(job_id).await.unwrap();

    assert_eq!(summary.counts.completed, 12);
    assert!(tracker.peak() <= 3, "peak concurrency {}", tracker.peak());
    assert!(tracker.peak() >= 2, "pool did not run in parallel");
}

#[tokio::test]
async fn test_requested_concurrency_is_capped_by_hard_cap() {
    let tracker = Arc::new(ConcurrencyTracker::default());
    let engines = engine_set(vec![StubEngine::succeeding(EngineKind::Http)
        .with_delay(Duration::from_millis(10))
        .with_tracker(tracker.clone())]);
    let (scheduler, _) = scheduler(
        orchestrator(engines, RetryPolicy::immediate()),
        SiteProfile::simple_static(),
    );

    let job_id = scheduler.submit(&urls(30), Some(100)).unwrap();
    let summary = scheduler.wait(job_id).await.unwrap();

    assert_eq!(summary.concurrency_limit, 10);
    assert!(tracker.peak() <= 10);
}

#[tokio::test]
async fn test_every_url_gets_exactly_one_result() {
    let engines = engine_set(vec![StubEngine::new(EngineKind::Http, |request| {
        if request.url_str().contains("site3") || request.url_str().contains("site7") {
            Err(EngineError::Network("connection reset".into()))
        } else {
            Ok(super::helpers::page(request.url_str()))
        }
    })]);
    let (scheduler, _) = scheduler(
        orchestrator(engines, RetryPolicy::immediate()),
        SiteProfile::simple_static(),
    );
    let submitted = urls(10);

    let job_id = scheduler.submit(&submitted, Some(4)).unwrap();
    let summary = scheduler.wait(job_id).await.unwrap();
    let job = scheduler.status(job_id).unwrap();

    assert_eq!(summary.counts.completed, summary.counts.total);
    assert!(job.pending_indices().is_empty());
    let results = job.results_by_url();
    for url in &submitted {
        assert!(results.contains_key(url.as_str()), "missing {}", url);
    }
    assert_eq!(summary.counts.failed, 2);
}

#[tokio::test]
async fn test_progress_events_follow_job_lifecycle() {
    let engines = engine_set(vec![StubEngine::succeeding(EngineKind::Http)]);
    let (scheduler, progress) = scheduler(
        orchestrator(engines, RetryPolicy::immediate()),
        SiteProfile::simple_static(),
    );

    let job_id = scheduler.submit(&urls(4), Some(2)).unwrap();
    let events: Vec<ProgressEvent> = progress.subscribe(job_id).into_stream().collect().await;

    let percentages: Vec<u8> = events
        .iter()
        .filter_map(|event| match event {
            ProgressEvent::ProgressUpdate { percentage, .. } => Some(*percentage),
            _ => None,
        })
        .collect();
    assert_eq!(percentages, vec![5, 30, 50, 70, 90, 100]);

    match events.last() {
        Some(ProgressEvent::Completion { result, .. }) => {
            assert_eq!(result.job_id, job_id);
            assert_eq!(result.status, JobStatus::Completed);
            assert_eq!(result.counts.succeeded, 4);
        }
        other => panic!("expected completion event, got {:?}", other),
    }
}

#[tokio::test]
async fn test_cancel_stops_dispatch_and_keeps_finished_results() {
    let engines = engine_set(vec![StubEngine::succeeding(EngineKind::Http)
        .with_delay(Duration::from_millis(50))]);
    let (scheduler, progress) = scheduler(
        orchestrator(engines, RetryPolicy::immediate()),
        SiteProfile::simple_static(),
    );

    let job_id = scheduler.submit(&urls(8), Some(1)).unwrap();
    let mut subscription = progress.subscribe(job_id);

    // 第一个 URL 完成后取消
    let mut cancelled = false;
    let mut last = None;
    while let Some(event) = subscription.next().await {
        if !cancelled
            && matches!(&event, ProgressEvent::ProgressUpdate { step, .. } if step == "url_completed")
        {
            scheduler.cancel(job_id).unwrap();
            cancelled = true;
        }
        last = Some(event);
    }

    let summary = scheduler.wait(job_id).await.unwrap();
    assert_eq!(summary.status, JobStatus::Cancelled);
    assert!(summary.counts.completed >= 1);
    assert!(summary.counts.completed < 8);
    assert_eq!(
        scheduler.results(job_id).unwrap().len(),
        summary.counts.completed
    );
    assert!(matches!(last, Some(ProgressEvent::Error { .. })));
}

#[tokio::test]
async fn test_submission_is_validated_before_any_engine_runs() {
    let calls = Arc::new(parking_lot::Mutex::new(Vec::new()));
    let engines =
        engine_set(vec![StubEngine::succeeding(EngineKind::Http).with_calls(calls.clone())]);
    let (scheduler, _) = scheduler(
        orchestrator(engines, RetryPolicy::immediate()),
        SiteProfile::simple_static(),
    );

    let no_urls: Vec<String> = Vec::new();
    assert!(matches!(
        scheduler.submit(&no_urls, None),
        Err(SchedulerError::Validation(ValidationError::EmptyBatch))
    ));
    assert!(matches!(
        scheduler.submit(&["https://a.example", "ftp://files.example"], None),
        Err(SchedulerError::Validation(ValidationError::InvalidUrl { .. }))
    ));
    assert!(matches!(
        scheduler.submit(&["https://a.example"], Some(0)),
        Err(SchedulerError::Validation(
            ValidationError::InvalidConcurrency { .. }
        ))
    ));

    tokio::task::yield_now().await;
    assert!(calls.lock().is_empty());
    assert!(scheduler.list().is_empty());
}
