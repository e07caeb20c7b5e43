// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::domain::models::crawl_request::CrawlRequest;
use crate::domain::models::crawl_result::CrawlResult;
use crate::utils::errors::DomainError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;
use uuid::Uuid;

/// 批量任务状态
///
/// 状态转换遵循以下流程：
/// Queued → Running → Completed/Failed/Cancelled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// 已提交，尚未派发
    #[default]
    Queued,
    /// 正在处理
    Running,
    /// 全部 URL 已有结果
    Completed,
    /// 调度器自身无法启动
    Failed,
    /// 已取消
    Cancelled,
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobStatus::Completed | JobStatus::Failed | JobStatus::Cancelled
        )
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            JobStatus::Queued => write!(f, "queued"),
            JobStatus::Running => write!(f, "running"),
            JobStatus::Completed => write!(f, "completed"),
            JobStatus::Failed => write!(f, "failed"),
            JobStatus::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// 任务计数
///
/// 始终满足 `succeeded + failed = completed <= total`。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct JobCounts {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub completed: usize,
}

impl JobCounts {
    /// 成功率 (0.0-1.0)，以总数为分母
    pub fn success_rate(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        self.succeeded as f64 / self.total as f64
    }
}

/// 协作式取消标记
///
/// 已开始的引擎调用不会被中断，只阻止后续的尝试与派发。
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<CancelState>);

#[derive(Debug, Default)]
struct CancelState {
    cancelled: AtomicBool,
    notify: Notify,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.cancelled.store(true, Ordering::SeqCst);
        self.0.notify.notify_waiters();
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.cancelled.load(Ordering::SeqCst)
    }

    /// 等待取消；已取消时立即返回
    pub async fn cancelled(&self) {
        loop {
            let notified = self.0.notify.notified();
            tokio::pin!(notified);
            // 先登记再检查标记，避免错过通知
            notified.as_mut().enable();
            if self.is_cancelled() {
                return;
            }
            notified.await;
        }
    }
}

/// 批量抓取任务
#[derive(Debug, Clone)]
pub struct Job {
    /// 任务ID
    pub id: Uuid,
    /// 按提交顺序排列的请求
    pub requests: Vec<CrawlRequest>,
    /// 并发上限（已按硬上限截断）
    pub concurrency_limit: usize,
    /// 当前状态
    pub status: JobStatus,
    /// 与 `requests` 一一对应的结果，逐步填充
    results: Vec<Option<CrawlResult>>,
    /// 计数
    pub counts: JobCounts,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    /// 调度器级别的错误（仅 Failed/Cancelled 时）
    pub error: Option<String>,
}

impl Job {
    pub fn new(id: Uuid, requests: Vec<CrawlRequest>, concurrency_limit: usize) -> Self {
        let total = requests.len();
        Self {
            id,
            results: vec![None; total],
            requests,
            concurrency_limit,
            status: JobStatus::Queued,
            counts: JobCounts {
                total,
                ..Default::default()
            },
            created_at: Utc::now(),
            started_at: None,
            finished_at: None,
            error: None,
        }
    }

    fn transition_error(&self, to: JobStatus) -> DomainError {
        DomainError::InvalidStateTransition {
            from: self.status.to_string(),
            to: to.to_string(),
        }
    }

    /// Queued → Running（首次派发时）
    pub fn start(&mut self) -> Result<(), DomainError> {
        match self.status {
            JobStatus::Queued => {
                self.status = JobStatus::Running;
                self.started_at = Some(Utc::now());
                Ok(())
            }
            JobStatus::Running => Ok(()),
            _ => Err(self.transition_error(JobStatus::Running)),
        }
    }

    /// 记录某个位置请求的结果并更新计数
    ///
    /// 当 `completed == total` 时任务自动进入 Completed。
    pub fn record(&mut self, index: usize, result: CrawlResult) -> Result<(), DomainError> {
        let slot = self
            .results
            .get_mut(index)
            .ok_or(DomainError::UnknownRequest(index))?;
        if slot.is_some() {
            return Err(DomainError::DuplicateResult(index));
        }

        if result.is_complete() {
            self.counts.succeeded += 1;
        } else {
            self.counts.failed += 1;
        }
        self.counts.completed += 1;
        *slot = Some(result);

        if self.counts.completed == self.counts.total && !self.status.is_terminal() {
            self.status = JobStatus::Completed;
            self.finished_at = Some(Utc::now());
        }
        Ok(())
    }

    /// 标记为失败（调度器无法启动）
    pub fn fail(&mut self, error: impl Into<String>) -> Result<(), DomainError> {
        if self.status.is_terminal() {
            return Err(self.transition_error(JobStatus::Failed));
        }
        self.status = JobStatus::Failed;
        self.error = Some(error.into());
        self.finished_at = Some(Utc::now());
        Ok(())
    }

    /// 标记为已取消；已完成的结果保留
    pub fn cancel(&mut self) -> Result<(), DomainError> {
        if self.status.is_terminal() {
            return Err(self.transition_error(JobStatus::Cancelled));
        }
        self.status = JobStatus::Cancelled;
        self.error = Some("job cancelled".to_string());
        self.finished_at = Some(Utc::now());
        Ok(())
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// 进度百分比：开始 5，之后按 `10 + 80 * completed / total` 递增，终态 100
    pub fn progress_percentage(&self) -> u8 {
        if self.status == JobStatus::Completed {
            return 100;
        }
        if self.counts.total == 0 || self.status == JobStatus::Queued {
            return 5;
        }
        (10 + (self.counts.completed * 80) / self.counts.total) as u8
    }

    /// 按提交顺序返回已有结果
    pub fn results(&self) -> impl Iterator<Item = &CrawlResult> {
        self.results.iter().flatten()
    }

    /// URL → 结果映射
    pub fn results_by_url(&self) -> HashMap<&str, &CrawlResult> {
        self.results().map(|r| (r.url.as_str(), r)).collect()
    }

    /// 尚未得到结果的请求位置
    pub fn pending_indices(&self) -> Vec<usize> {
        self.results
            .iter()
            .enumerate()
            .filter(|(_, r)| r.is_none())
            .map(|(i, _)| i)
            .collect()
    }

    pub fn summary(&self) -> JobSummary {
        JobSummary {
            job_id: self.id,
            status: self.status,
            counts: self.counts,
            success_rate: self.counts.success_rate(),
            concurrency_limit: self.concurrency_limit,
            created_at: self.created_at,
            started_at: self.started_at,
            finished_at: self.finished_at,
            error: self.error.clone(),
        }
    }

    /// 导出报告：任务摘要 + 按提交顺序排列的结果
    pub fn report(&self) -> JobReport {
        JobReport {
            summary: self.summary(),
            results: self.results().cloned().collect(),
        }
    }
}

/// 任务摘要
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobSummary {
    pub job_id: Uuid,
    pub status: JobStatus,
    pub counts: JobCounts,
    pub success_rate: f64,
    pub concurrency_limit: usize,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    pub error: Option<String>,
}

/// 导出格式，供下载等外部协作者使用
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobReport {
    pub summary: JobSummary,
    pub results: Vec<CrawlResult>,
}

impl JobReport {
    pub fn to_json_pretty(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    /// 写入 JSON 文件
    pub async fn write_json(&self, path: impl AsRef<Path>) -> anyhow::Result<()> {
        let json = self.to_json_pretty()?;
        tokio::fs::write(path, json).await?;
        Ok(())
    }
}
