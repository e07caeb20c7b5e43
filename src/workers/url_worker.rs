// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::domain::models::crawl_request::CrawlRequest;
use crate::domain::models::crawl_result::CrawlResult;
use crate::domain::models::job::CancelToken;
use crate::domain::models::site_profile::SiteProfile;
use crate::engines::orchestrator::FallbackOrchestrator;
use crate::engines::profiler::{ProfileError, SiteProfiler, DEFAULT_PROFILE_BUDGET};
use crate::engines::selector::EngineSelector;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

/// 单个 URL 的处理流水线：站点分析 → 引擎选择 → 降级编排
pub struct CrawlPipeline {
    profiler: Arc<dyn SiteProfiler>,
    profile_budget: Duration,
    selector: EngineSelector,
    orchestrator: FallbackOrchestrator,
}

impl CrawlPipeline {
    pub fn new(
        profiler: Arc<dyn SiteProfiler>,
        selector: EngineSelector,
        orchestrator: FallbackOrchestrator,
    ) -> Self {
        Self {
            profiler,
            profile_budget: DEFAULT_PROFILE_BUDGET,
            selector,
            orchestrator,
        }
    }

    pub fn with_profile_budget(mut self, budget: Duration) -> Self {
        self.profile_budget = budget;
        self
    }

    pub fn selector(&self) -> &EngineSelector {
        &self.selector
    }

    pub fn orchestrator(&self) -> &FallbackOrchestrator {
        &self.orchestrator
    }

    /// 处理一个请求，总是返回一个结果
    #[instrument(
        skip(self, request, cancel),
        fields(job_id = ?request.job_id(), url = %request.url_str())
    )]
    pub async fn process(&self, request: &CrawlRequest, cancel: &CancelToken) -> CrawlResult {
        info!("Processing URL");

        // 采用显式指定引擎时不需要画像；被禁用的指定引擎仍按画像选择策略
        let profile = if self.selector.honours_override(request) {
            None
        } else {
            self.profile(request).await
        };

        let selection = self.selector.select(request, profile.as_ref());
        debug!(
            "Selected engines {:?} ({})",
            selection.engines, selection.reason
        );

        let mut result = self
            .orchestrator
            .run_with_cancel(request, &selection.engines, cancel)
            .await;

        result.metadata.strategy_used = selection.strategy;
        result.metadata.selection_reason = Some(selection.reason);
        result.metadata.site_profile = profile;

        if result.is_complete() {
            info!(
                "URL finished with engine {:?}, score {}",
                result.metadata.engine_used, result.metadata.quality_score
            );
        } else {
            warn!(
                "URL failed after {} attempts: {}",
                result.metadata.attempted_engines.len(),
                result.error().unwrap_or("unknown error")
            );
        }
        result
    }

    /// 分析失败或超出预算时返回 `None`，由选择器使用默认策略
    async fn profile(&self, request: &CrawlRequest) -> Option<SiteProfile> {
        let outcome = tokio::time::timeout(
            self.profile_budget,
            self.profiler.profile(request.url(), self.profile_budget),
        )
        .await
        .unwrap_or_else(|_| {
            Err(ProfileError::Unavailable(format!(
                "profiling exceeded budget of {}ms",
                self.profile_budget.as_millis()
            )))
        });

        match outcome {
            Ok(profile) => Some(profile),
            Err(e) => {
                debug!("Site profile unavailable: {}", e);
                None
            }
        }
    }
}
