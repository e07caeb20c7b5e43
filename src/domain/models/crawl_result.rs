// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::domain::models::engine::EngineKind;
use crate::domain::models::site_profile::SiteProfile;
use crate::domain::models::strategy::StrategyKind;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// 抓取结果状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CrawlStatus {
    Complete,
    Failed,
}

impl fmt::Display for CrawlStatus {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            CrawlStatus::Complete => write!(f, "complete"),
            CrawlStatus::Failed => write!(f, "failed"),
        }
    }
}

/// 单次引擎尝试的结局
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttemptOutcome {
    /// 抓取成功且通过质量门槛
    Succeeded,
    /// 抓取成功但低于质量门槛，作为候选保留
    BelowQuality,
    /// 永久性错误（不会重试同一引擎，也不退避）
    PermanentError,
    /// 临时性错误（退避后切换下一个引擎）
    TransientError,
    /// 超时，按临时性错误处理
    TimedOut,
    /// 引擎未注册或已禁用
    Unavailable,
}

impl AttemptOutcome {
    /// 是否产生了可用内容
    pub fn produced_content(&self) -> bool {
        matches!(self, AttemptOutcome::Succeeded | AttemptOutcome::BelowQuality)
    }
}

impl fmt::Display for AttemptOutcome {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let name = match self {
            AttemptOutcome::Succeeded => "succeeded",
            AttemptOutcome::BelowQuality => "below_quality",
            AttemptOutcome::PermanentError => "permanent_error",
            AttemptOutcome::TransientError => "transient_error",
            AttemptOutcome::TimedOut => "timed_out",
            AttemptOutcome::Unavailable => "unavailable",
        };
        f.write_str(name)
    }
}

/// 引擎尝试记录
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttemptRecord {
    /// 尝试的引擎
    pub engine: EngineKind,
    /// 尝试结局
    pub outcome: AttemptOutcome,
    /// 错误信息（失败时）
    pub error: Option<String>,
    /// 质量分数（抓取成功时）
    pub quality_score: Option<u8>,
    /// 本次尝试耗时（毫秒）
    pub duration_ms: u64,
    /// 本次失败后、下一次尝试前的退避时间（毫秒）
    pub backoff_ms: u64,
}

/// 抓取结果元数据（来源信息）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct CrawlMetadata {
    /// 最终采用的引擎
    pub engine_used: Option<EngineKind>,
    /// 总处理时间（毫秒）
    pub processing_time_ms: u64,
    /// 质量分数 (0-100)
    pub quality_score: u8,
    /// 置信度 (0.0-1.0)
    pub confidence: f64,
    /// 是否通过质量门槛
    pub quality_gate_passed: bool,
    /// 使用的策略；显式指定引擎时为空
    pub strategy_used: Option<StrategyKind>,
    /// 策略选择原因
    pub selection_reason: Option<String>,
    /// 站点画像（分析可用时）
    pub site_profile: Option<SiteProfile>,
    /// 按顺序尝试过的引擎
    pub attempted_engines: Vec<EngineKind>,
    /// 每次尝试的详细记录
    pub attempts: Vec<AttemptRecord>,
    /// 原始文本长度（字符数）
    pub raw_text_length: usize,
    /// 错误信息
    pub error: Option<String>,
    /// 引擎返回的附加元数据
    #[serde(default, skip_serializing_if = "serde_json::Map::is_empty")]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// 抓取结果
///
/// 返回给调用方之后不再修改。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CrawlResult {
    pub url: String,
    pub title: String,
    pub text: String,
    /// 标题/章节层级结构，核心逻辑不解释其语义
    pub hierarchy: serde_json::Value,
    pub metadata: CrawlMetadata,
    pub status: CrawlStatus,
    pub timestamp: DateTime<Utc>,
}

impl CrawlResult {
    /// 创建没有任何内容的失败结果
    pub fn failed(url: impl Into<String>, error: impl Into<String>, metadata: CrawlMetadata) -> Self {
        let mut metadata = metadata;
        metadata.error = Some(error.into());
        metadata.quality_score = 0;
        metadata.confidence = 0.0;
        metadata.quality_gate_passed = false;
        Self {
            url: url.into(),
            title: String::new(),
            text: String::new(),
            hierarchy: serde_json::Value::Object(serde_json::Map::new()),
            metadata,
            status: CrawlStatus::Failed,
            timestamp: Utc::now(),
        }
    }

    pub fn is_complete(&self) -> bool {
        self.status == CrawlStatus::Complete
    }

    pub fn error(&self) -> Option<&str> {
        self.metadata.error.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failed_result_carries_error_and_no_content() {
        let metadata = CrawlMetadata {
            attempted_engines: vec![EngineKind::Http],
            quality_score: 42,
            ..Default::default()
        };
        let result = CrawlResult::failed("https://example.com", "boom", metadata);

        assert_eq!(result.status, CrawlStatus::Failed);
        assert_eq!(result.error(), Some("boom"));
        assert_eq!(result.metadata.quality_score, 0);
        assert!(result.text.is_empty());
        assert_eq!(result.metadata.attempted_engines, vec![EngineKind::Http]);
    }

    #[test]
    fn test_result_serializes_snake_case_status() {
        let result = CrawlResult::failed("https://example.com", "boom", CrawlMetadata::default());
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["status"], "failed");
    }
}
