// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crawlpilot::domain::models::crawl_result::AttemptOutcome;
use crawlpilot::domain::models::strategy::StrategyKind;
use crawlpilot::engines::http_engine::HttpEngine;
use crawlpilot::engines::profiler::HtmlSiteProfiler;
use crawlpilot::utils::error_formatter::{explain_failure, FailureKind};
use crawlpilot::utils::retry_policy::RetryPolicy;
use crawlpilot::{
    CrawlPipeline, EngineKind, EngineSelector, EngineSet, FallbackOrchestrator, JobScheduler,
    JobStatus, OrchestratorConfig, ProgressBus, SchedulerConfig,
};
use std::sync::Arc;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const ARTICLE: &str = r#"<html><head><title>Release notes</title></head>
<body>
  <nav><a href="/">Home</a><a href="/docs">Docs</a><a href="/blog">Blog</a></nav>
  <article>
    <h1>Version 2.0 released</h1>
    <p>The new release rewrites the storage layer and improves startup time considerably.</p>
    <h2>Upgrading</h2>
    <p>Existing installations can upgrade in place. Configuration files remain compatible.</p>
    <p>Read the migration guide for details about the removed command line flags.</p>
  </article>
  <footer>Copyright 2025</footer>
</body></html>"#;

fn scheduler() -> JobScheduler {
    let engines = EngineSet::new().with(Arc::new(HttpEngine::default()));
    let orchestrator = FallbackOrchestrator::new(
        engines,
        OrchestratorConfig {
            retry_policy: RetryPolicy::immediate(),
            ..Default::default()
        },
    );
    let pipeline = CrawlPipeline::new(
        Arc::new(HtmlSiteProfiler::default()),
        EngineSelector::default(),
        orchestrator,
    );
    JobScheduler::new(
        Arc::new(pipeline),
        Arc::new(ProgressBus::default()),
        SchedulerConfig::default(),
    )
}

#[tokio::test]
async fn test_static_page_is_crawled_over_http() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/release"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(ARTICLE, "text/html"))
        .mount(&server)
        .await;

    let scheduler = scheduler();
    let job_id = scheduler
        .submit(&[format!("{}/release", server.uri())], None)
        .unwrap();
    let summary = scheduler.wait(job_id).await.unwrap();

    assert_eq!(summary.status, JobStatus::Completed);
    let result = &scheduler.results(job_id).unwrap()[0];
    assert!(result.is_complete());
    assert_eq!(result.title, "Release notes");
    assert!(result.text.contains("rewrites the storage layer"));
    assert!(!result.text.contains("Copyright 2025"));
    assert_eq!(result.metadata.engine_used, Some(EngineKind::Http));
    assert_eq!(result.metadata.strategy_used, Some(StrategyKind::SimpleStatic));
    assert!(result.metadata.site_profile.is_some());
}

#[tokio::test]
async fn test_missing_page_fails_without_backoff() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let scheduler = scheduler();
    let job_id = scheduler
        .submit(&[format!("{}/gone", server.uri())], None)
        .unwrap();
    let summary = scheduler.wait(job_id).await.unwrap();

    assert_eq!(summary.counts.failed, 1);
    let result = &scheduler.results(job_id).unwrap()[0];
    let first = &result.metadata.attempts[0];
    assert_eq!(first.engine, EngineKind::Http);
    assert_eq!(first.outcome, AttemptOutcome::PermanentError);
    assert!(first.error.as_deref().unwrap_or_default().contains("404"));
    assert!(result.metadata.attempts.iter().all(|a| a.backoff_ms == 0));

    // 其余引擎未注册
    assert!(result.metadata.attempts[1..]
        .iter()
        .all(|a| a.outcome == AttemptOutcome::Unavailable));
    let explanation = explain_failure(result).unwrap();
    assert_eq!(explanation.kind, FailureKind::AllEnginesErrored);
}
