// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use async_trait::async_trait;
use crawlpilot::domain::models::site_profile::SiteProfile;
use crawlpilot::domain::services::quality_scorer::{
    ContentScorer, QualityAssessment, QualityInput,
};
use crawlpilot::engines::profiler::{ProfileError, SiteProfiler};
use crawlpilot::engines::traits::EngineCapabilities;
use crawlpilot::utils::retry_policy::RetryPolicy;
use crawlpilot::{
    CrawlPipeline, CrawlRequest, EngineAdapter, EngineError, EngineKind, EngineOutput, EngineSet,
    EngineSelector, FallbackOrchestrator, JobScheduler, OrchestratorConfig, ProgressBus,
    SchedulerConfig,
};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use url::Url;

type Behavior = dyn Fn(&CrawlRequest) -> Result<EngineOutput, EngineError> + Send + Sync;

/// 记录同时进行的引擎调用数量
#[derive(Debug, Default)]
pub struct ConcurrencyTracker {
    current: AtomicUsize,
    peak: AtomicUsize,
}

impl ConcurrencyTracker {
    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    fn enter(&self) {
        let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
    }

    fn leave(&self) {
        self.current.fetch_sub(1, Ordering::SeqCst);
    }
}

/// 行为可编程的测试引擎
pub struct StubEngine {
    kind: EngineKind,
    behavior: Box<Behavior>,
    delay: Duration,
    tracker: Arc<ConcurrencyTracker>,
    calls: Arc<Mutex<Vec<(EngineKind, String)>>>,
}

impl StubEngine {
    pub fn new<F>(kind: EngineKind, behavior: F) -> Self
    where
        F: Fn(&CrawlRequest) -> Result<EngineOutput, EngineError> + Send + Sync + 'static,
    {
        Self {
            kind,
            behavior: Box::new(behavior),
            delay: Duration::ZERO,
            tracker: Arc::new(ConcurrencyTracker::default()),
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn succeeding(kind: EngineKind) -> Self {
        Self::new(kind, |request| Ok(page(request.url_str())))
    }

    pub fn failing(kind: EngineKind, error: EngineError) -> Self {
        Self::new(kind, move |_| Err(error.clone()))
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn with_tracker(mut self, tracker: Arc<ConcurrencyTracker>) -> Self {
        self.tracker = tracker;
        self
    }

    pub fn with_calls(mut self, calls: Arc<Mutex<Vec<(EngineKind, String)>>>) -> Self {
        self.calls = calls;
        self
    }
}

#[async_trait]
impl EngineAdapter for StubEngine {
    fn kind(&self) -> EngineKind {
        self.kind
    }

    fn capabilities(&self) -> EngineCapabilities {
        EngineCapabilities::default()
    }

    async fn attempt(&self, request: &CrawlRequest) -> Result<EngineOutput, EngineError> {
        self.calls
            .lock()
            .push((self.kind, request.url_str().to_string()));
        self.tracker.enter();
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        let result = (self.behavior)(request);
        self.tracker.leave();
        result
    }
}

/// 总是返回同一画像的分析器
pub struct StaticProfiler(pub SiteProfile);

#[async_trait]
impl SiteProfiler for StaticProfiler {
    async fn profile(&self, _url: &Url, _budget: Duration) -> Result<SiteProfile, ProfileError> {
        Ok(self.0.clone())
    }
}

/// 固定分数的评分器
pub struct FixedScorer {
    pub score: u8,
    pub threshold: u8,
}

impl ContentScorer for FixedScorer {
    fn assess(&self, _input: &QualityInput) -> QualityAssessment {
        QualityAssessment {
            score: self.score,
            confidence: f64::from(self.score) / 100.0,
            passed: self.score >= self.threshold,
        }
    }
}

/// 可读的页面内容
pub fn page(url: &str) -> EngineOutput {
    EngineOutput {
        title: format!("Page at {}", url),
        text: format!(
            "Readable article content fetched from {}.\nIt has several sentences of body text.",
            url
        ),
        ..Default::default()
    }
}

pub fn engine_set(engines: Vec<StubEngine>) -> EngineSet {
    engines
        .into_iter()
        .fold(EngineSet::new(), |set, engine| set.with(Arc::new(engine)))
}

pub fn orchestrator(engines: EngineSet, retry_policy: RetryPolicy) -> FallbackOrchestrator {
    FallbackOrchestrator::new(
        engines,
        OrchestratorConfig {
            retry_policy,
            ..Default::default()
        },
    )
}

/// 组装调度器与进度总线
pub fn scheduler(
    orchestrator: FallbackOrchestrator,
    profile: SiteProfile,
) -> (JobScheduler, Arc<ProgressBus>) {
    let pipeline = CrawlPipeline::new(
        Arc::new(StaticProfiler(profile)),
        EngineSelector::default(),
        orchestrator,
    );
    let progress = Arc::new(ProgressBus::default());
    let scheduler = JobScheduler::new(
        Arc::new(pipeline),
        progress.clone(),
        SchedulerConfig::default(),
    );
    (scheduler, progress)
}
