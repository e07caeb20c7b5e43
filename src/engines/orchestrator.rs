// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::domain::models::crawl_request::CrawlRequest;
use crate::domain::models::crawl_result::{
    AttemptOutcome, AttemptRecord, CrawlMetadata, CrawlResult, CrawlStatus,
};
use crate::domain::models::engine::EngineKind;
use crate::domain::models::job::CancelToken;
use crate::domain::services::quality_scorer::{
    ContentScorer, QualityInput, QualityScorer, DEFAULT_PASS_THRESHOLD,
};
use crate::engines::error_classifier::{ErrorClass, ErrorClassifier};
use crate::engines::registry::EngineSet;
use crate::engines::traits::{EngineError, EngineOutput};
use crate::utils::retry_policy::RetryPolicy;
use crate::utils::text_processing::{clean_text, CleanedText};
use chrono::Utc;
use metrics::{counter, histogram};
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// 编排器配置
///
/// 进程启动时由配置构造一次，之后显式传入。
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// 质量门槛 (0-100)
    pub quality_threshold: u8,
    /// 临时性失败后的退避策略
    pub retry_policy: RetryPolicy,
    /// 错误分类器
    pub classifier: ErrorClassifier,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            quality_threshold: DEFAULT_PASS_THRESHOLD,
            retry_policy: RetryPolicy::default(),
            classifier: ErrorClassifier::default(),
        }
    }
}

/// 引擎性能统计
#[derive(Debug, Clone)]
pub struct EngineStats {
    /// 成功率 (0.0 - 1.0)，指数平滑
    pub success_rate: f64,
    /// 平均响应时间，指数平滑
    pub avg_response_time: Duration,
    /// 最近使用时间
    pub last_used: Option<Instant>,
    /// 使用次数
    pub usage_count: u64,
    /// 产生内容的次数
    pub successes: u64,
    /// 失败次数
    pub failures: u64,
}

impl Default for EngineStats {
    fn default() -> Self {
        Self {
            success_rate: 1.0,
            avg_response_time: Duration::from_millis(500),
            last_used: None,
            usage_count: 0,
            successes: 0,
            failures: 0,
        }
    }
}

/// 编排状态
enum RunState {
    /// 等待下一次尝试
    Pending(VecDeque<EngineKind>),
    /// 正在尝试某个引擎
    Attempting(EngineKind, VecDeque<EngineKind>),
    /// 通过质量门槛
    Succeeded(Box<CrawlResult>),
    /// 引擎列表耗尽（或已取消）
    Exhausted,
}

/// 单次尝试的结局
enum AttemptResult {
    Content {
        result: Box<CrawlResult>,
        passed: bool,
    },
    Failed {
        error: EngineError,
        class: ErrorClass,
    },
}

/// 降级编排器
///
/// 按顺序逐个尝试引擎：超时与临时性错误退避后切换，永久性错误立即切换，
/// 通过质量门槛立即返回，否则保留为候选；耗尽时返回得分最高的候选。
pub struct FallbackOrchestrator {
    engines: EngineSet,
    scorer: Arc<dyn ContentScorer>,
    config: OrchestratorConfig,
    engine_stats: Arc<parking_lot::RwLock<HashMap<EngineKind, EngineStats>>>,
}

impl FallbackOrchestrator {
    pub fn new(engines: EngineSet, config: OrchestratorConfig) -> Self {
        let scorer = Arc::new(QualityScorer::new(config.quality_threshold));
        Self::with_scorer(engines, config, scorer)
    }

    /// 使用自定义评分器创建
    pub fn with_scorer(
        engines: EngineSet,
        config: OrchestratorConfig,
        scorer: Arc<dyn ContentScorer>,
    ) -> Self {
        let engine_stats = EngineKind::ALL
            .into_iter()
            .map(|kind| (kind, EngineStats::default()))
            .collect();

        Self {
            engines,
            scorer,
            config,
            engine_stats: Arc::new(parking_lot::RwLock::new(engine_stats)),
        }
    }

    pub fn engines(&self) -> &EngineSet {
        &self.engines
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    /// 引擎统计快照
    pub fn engine_stats(&self) -> HashMap<EngineKind, EngineStats> {
        self.engine_stats.read().clone()
    }

    /// 最坏情况下的总耗时：每个引擎一次完整超时，再加上全部退避上限
    pub fn expected_max_duration(&self, request: &CrawlRequest, engines: &[EngineKind]) -> Duration {
        let order = dedupe(engines);
        let attempts = order.len() as u32;
        let backoffs = attempts
            .saturating_sub(1)
            .min(self.config.retry_policy.max_retries);

        let mut policy = self.config.retry_policy.clone();
        policy.max_retries = backoffs;
        request
            .timeout()
            .checked_mul(attempts)
            .and_then(|total| total.checked_add(policy.total_backoff_cap()))
            .unwrap_or(Duration::MAX)
    }

    /// 按顺序驱动一个请求，总是返回一个结果
    pub async fn run(&self, request: &CrawlRequest, engines: &[EngineKind]) -> CrawlResult {
        self.run_with_cancel(request, engines, &CancelToken::new())
            .await
    }

    /// 同 [`run`](Self::run)，每次尝试前检查取消标记
    pub async fn run_with_cancel(
        &self,
        request: &CrawlRequest,
        engines: &[EngineKind],
        cancel: &CancelToken,
    ) -> CrawlResult {
        let started = Instant::now();
        let order = dedupe(engines);

        let mut attempted: Vec<EngineKind> = Vec::with_capacity(order.len());
        let mut attempts: Vec<AttemptRecord> = Vec::with_capacity(order.len());
        let mut candidates: Vec<CrawlResult> = Vec::new();
        let mut last_error: Option<String> = None;
        let mut backoffs_applied: u32 = 0;
        let mut cancelled = false;

        let mut state = RunState::Pending(order.into_iter().collect());
        loop {
            state = match state {
                RunState::Pending(mut remaining) => {
                    if cancel.is_cancelled() {
                        cancelled = true;
                        RunState::Exhausted
                    } else {
                        match remaining.pop_front() {
                            Some(engine) => RunState::Attempting(engine, remaining),
                            None => RunState::Exhausted,
                        }
                    }
                }
                RunState::Attempting(engine, remaining) => {
                    attempted.push(engine);
                    let attempt_started = Instant::now();
                    let result = self.attempt(engine, request).await;
                    let elapsed = attempt_started.elapsed();

                    match result {
                        AttemptResult::Content { mut result, passed } => {
                            let outcome = if passed {
                                AttemptOutcome::Succeeded
                            } else {
                                AttemptOutcome::BelowQuality
                            };
                            self.record_attempt(engine, outcome, elapsed);
                            attempts.push(AttemptRecord {
                                engine,
                                outcome,
                                error: None,
                                quality_score: Some(result.metadata.quality_score),
                                duration_ms: elapsed.as_millis() as u64,
                                backoff_ms: 0,
                            });

                            if passed {
                                info!(
                                    "Engine {} passed quality gate for {} (score {})",
                                    engine,
                                    request.url_str(),
                                    result.metadata.quality_score
                                );
                                result.metadata.quality_gate_passed = true;
                                RunState::Succeeded(result)
                            } else {
                                debug!(
                                    "Engine {} below quality gate for {} (score {} < {}), keeping as candidate",
                                    engine,
                                    request.url_str(),
                                    result.metadata.quality_score,
                                    self.config.quality_threshold
                                );
                                candidates.push(*result);
                                RunState::Pending(remaining)
                            }
                        }
                        AttemptResult::Failed { error, class } => {
                            let outcome = match (&error, class) {
                                (EngineError::Timeout, _) => AttemptOutcome::TimedOut,
                                (EngineError::Unavailable(_), _) => AttemptOutcome::Unavailable,
                                (_, ErrorClass::Permanent) => AttemptOutcome::PermanentError,
                                (_, ErrorClass::Transient) => AttemptOutcome::TransientError,
                            };
                            self.record_attempt(engine, outcome, elapsed);

                            let backoff = if class == ErrorClass::Transient
                                && !remaining.is_empty()
                                && self.config.retry_policy.should_retry(backoffs_applied)
                            {
                                backoffs_applied += 1;
                                self.config.retry_policy.calculate_backoff(backoffs_applied)
                            } else {
                                Duration::ZERO
                            };

                            warn!(
                                "Engine {} failed for {} ({}): {}",
                                engine,
                                request.url_str(),
                                outcome,
                                error
                            );

                            attempts.push(AttemptRecord {
                                engine,
                                outcome,
                                error: Some(error.to_string()),
                                quality_score: None,
                                duration_ms: elapsed.as_millis() as u64,
                                backoff_ms: backoff.as_millis() as u64,
                            });
                            last_error = Some(error.to_string());

                            if !backoff.is_zero() {
                                debug!("Backing off {:?} before next engine", backoff);
                                tokio::select! {
                                    _ = tokio::time::sleep(backoff) => {}
                                    _ = cancel.cancelled() => {
                                        debug!("Backoff interrupted by cancellation");
                                    }
                                }
                            }
                            RunState::Pending(remaining)
                        }
                    }
                }
                RunState::Succeeded(mut result) => {
                    self.finish_metadata(&mut result.metadata, started, attempted, attempts);
                    return *result;
                }
                RunState::Exhausted => break,
            };
        }

        if cancelled {
            info!("Stopped engine attempts for {} after cancellation", request.url_str());
            if last_error.is_none() && candidates.is_empty() {
                last_error = Some("cancelled before any engine was attempted".to_string());
            }
        }

        // 得分最高的候选；同分取最早的
        let best = candidates.into_iter().fold(None::<CrawlResult>, |best, candidate| {
            match best {
                Some(current) if current.metadata.quality_score >= candidate.metadata.quality_score => {
                    Some(current)
                }
                _ => Some(candidate),
            }
        });

        match best {
            Some(mut result) => {
                info!(
                    "No engine passed quality gate for {}, returning best candidate from {:?} (score {})",
                    request.url_str(),
                    result.metadata.engine_used,
                    result.metadata.quality_score
                );
                result.metadata.quality_gate_passed = false;
                self.finish_metadata(&mut result.metadata, started, attempted, attempts);
                result
            }
            None => {
                counter!("fallback_exhausted_total").increment(1);
                let error = last_error.unwrap_or_else(|| "no engines to attempt".to_string());
                warn!(
                    "All engines failed for {}: {}",
                    request.url_str(),
                    error
                );
                let mut metadata = CrawlMetadata::default();
                self.finish_metadata(&mut metadata, started, attempted, attempts);
                CrawlResult::failed(request.url_str(), error, metadata)
            }
        }
    }

    /// 调用单个引擎（带超时），成功时清洗并评分
    async fn attempt(&self, engine: EngineKind, request: &CrawlRequest) -> AttemptResult {
        let outcome = match self.engines.get(engine) {
            None => Err(EngineError::Unavailable(engine)),
            Some(adapter) => {
                debug!("Attempting engine {} for {}", engine, request.url_str());
                match tokio::time::timeout(request.timeout(), adapter.attempt(request)).await {
                    Ok(result) => result,
                    Err(_) => Err(EngineError::Timeout),
                }
            }
        };

        match outcome {
            Ok(output) => {
                let (result, passed) = self.score_output(engine, request, output);
                AttemptResult::Content {
                    result: Box::new(result),
                    passed,
                }
            }
            Err(error) => {
                let class = self.config.classifier.classify(&error);
                AttemptResult::Failed { error, class }
            }
        }
    }

    fn score_output(
        &self,
        engine: EngineKind,
        request: &CrawlRequest,
        output: EngineOutput,
    ) -> (CrawlResult, bool) {
        let cleaned = if request.clean_text() {
            clean_text(&output.text)
        } else {
            CleanedText::untouched(&output.text)
        };
        let assessment = self.scorer.assess(&QualityInput::from(&cleaned));

        let metadata = CrawlMetadata {
            engine_used: Some(engine),
            quality_score: assessment.score.min(100),
            confidence: assessment.confidence.clamp(0.0, 1.0),
            raw_text_length: cleaned.raw_length,
            extra: output.extra,
            ..Default::default()
        };

        let result = CrawlResult {
            url: request.url_str().to_string(),
            title: output.title,
            text: cleaned.text,
            hierarchy: output.hierarchy,
            metadata,
            status: CrawlStatus::Complete,
            timestamp: Utc::now(),
        };
        (result, assessment.passed)
    }

    fn finish_metadata(
        &self,
        metadata: &mut CrawlMetadata,
        started: Instant,
        attempted: Vec<EngineKind>,
        attempts: Vec<AttemptRecord>,
    ) {
        metadata.processing_time_ms = started.elapsed().as_millis() as u64;
        metadata.attempted_engines = attempted;
        metadata.attempts = attempts;
    }

    /// 更新引擎统计信息
    fn record_attempt(&self, engine: EngineKind, outcome: AttemptOutcome, response_time: Duration) {
        counter!(
            "engine_attempts_total",
            "engine" => engine.as_str(),
            "outcome" => outcome.to_string()
        )
        .increment(1);
        histogram!("engine_attempt_duration_seconds", "engine" => engine.as_str())
            .record(response_time.as_secs_f64());

        let mut stats = self.engine_stats.write();
        let stat = stats.entry(engine).or_default();

        let alpha = 0.1; // 平滑因子
        let success = outcome.produced_content();
        let current_success = if success { 1.0 } else { 0.0 };
        stat.success_rate = stat.success_rate * (1.0 - alpha) + current_success * alpha;

        let current_avg_ns = stat.avg_response_time.as_nanos() as f64;
        let response_ns = response_time.as_nanos() as f64;
        let new_avg_ns = current_avg_ns * (1.0 - alpha) + response_ns * alpha;
        stat.avg_response_time = Duration::from_nanos(new_avg_ns as u64);

        stat.last_used = Some(Instant::now());
        stat.usage_count += 1;
        if success {
            stat.successes += 1;
        } else {
            stat.failures += 1;
        }
    }
}

/// 去重并保持原有顺序
fn dedupe(engines: &[EngineKind]) -> Vec<EngineKind> {
    let mut order = Vec::with_capacity(engines.len());
    for engine in engines {
        if !order.contains(engine) {
            order.push(*engine);
        }
    }
    order
}
