// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::domain::models::job::JobSummary;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// 进度事件
///
/// 只发布、不持久化。`Completion` 与 `Error` 是任务的终止事件。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProgressEvent {
    ProgressUpdate {
        job_id: Uuid,
        step: String,
        percentage: u8,
        message: String,
        timestamp: DateTime<Utc>,
    },
    Completion {
        job_id: Uuid,
        result: JobSummary,
        timestamp: DateTime<Utc>,
    },
    Error {
        job_id: Uuid,
        message: String,
        timestamp: DateTime<Utc>,
    },
}

impl ProgressEvent {
    pub fn progress(
        job_id: Uuid,
        step: impl Into<String>,
        percentage: u8,
        message: impl Into<String>,
    ) -> Self {
        ProgressEvent::ProgressUpdate {
            job_id,
            step: step.into(),
            percentage: percentage.min(100),
            message: message.into(),
            timestamp: Utc::now(),
        }
    }

    pub fn completion(result: JobSummary) -> Self {
        ProgressEvent::Completion {
            job_id: result.job_id,
            result,
            timestamp: Utc::now(),
        }
    }

    pub fn error(job_id: Uuid, message: impl Into<String>) -> Self {
        ProgressEvent::Error {
            job_id,
            message: message.into(),
            timestamp: Utc::now(),
        }
    }

    pub fn job_id(&self) -> Uuid {
        match self {
            ProgressEvent::ProgressUpdate { job_id, .. }
            | ProgressEvent::Completion { job_id, .. }
            | ProgressEvent::Error { job_id, .. } => *job_id,
        }
    }

    /// 是否为终止事件（订阅在其之后结束）
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ProgressEvent::Completion { .. } | ProgressEvent::Error { .. }
        )
    }
}
