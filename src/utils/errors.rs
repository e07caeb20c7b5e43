// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use thiserror::Error;
use uuid::Uuid;

/// 输入校验错误
///
/// 在任何引擎被调用之前同步返回，不会进入任务流水线。
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("URL is empty")]
    EmptyUrl,

    #[error("invalid URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("batch contains no URLs")]
    EmptyBatch,

    #[error("concurrency limit {requested} is outside 1..={hard_cap}")]
    InvalidConcurrency { requested: usize, hard_cap: usize },

    #[error("timeout must be greater than zero")]
    InvalidTimeout,
}

impl ValidationError {
    pub(crate) fn invalid_url(url: &str, reason: impl Into<String>) -> Self {
        ValidationError::InvalidUrl {
            url: url.to_string(),
            reason: reason.into(),
        }
    }
}

/// 领域状态错误
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// 状态转换不符合任务生命周期
    #[error("invalid job state transition from {from} to {to}")]
    InvalidStateTransition { from: String, to: String },

    /// 结果索引越界
    #[error("no request at position {0}")]
    UnknownRequest(usize),

    /// 同一请求被重复记录结果
    #[error("request at position {0} already has a result")]
    DuplicateResult(usize),
}

/// 调度器错误
#[derive(Error, Debug)]
pub enum SchedulerError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("job {0} not found")]
    JobNotFound(Uuid),

    #[error(transparent)]
    Domain(#[from] DomainError),
}
