// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::engines::traits::EngineError;
use serde::{Deserialize, Serialize};

/// 默认的永久性错误关键字（匹配时忽略大小写）
pub const DEFAULT_PERMANENT_PATTERNS: [&str; 11] = [
    "404",
    "not found",
    "403",
    "forbidden",
    "dns",
    "name resolution",
    "connection refused",
    "invalid url",
    "malformed url",
    "ssl certificate",
    "certificate verify failed",
];

/// 错误类别
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorClass {
    /// 不重试同一引擎，直接切换且不退避
    Permanent,
    /// 退避后切换下一个引擎
    Transient,
}

/// 引擎错误分类器
///
/// 对错误消息做不区分大小写的子串匹配。超时始终是临时性错误，
/// 引擎不可用始终是永久性错误，与关键字无关。
#[derive(Debug, Clone)]
pub struct ErrorClassifier {
    permanent_patterns: Vec<String>,
}

impl Default for ErrorClassifier {
    fn default() -> Self {
        Self::new(DEFAULT_PERMANENT_PATTERNS)
    }
}

impl ErrorClassifier {
    pub fn new<I, S>(patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let permanent_patterns = patterns
            .into_iter()
            .map(|p| p.as_ref().trim().to_lowercase())
            .filter(|p| !p.is_empty())
            .collect();
        Self { permanent_patterns }
    }

    pub fn patterns(&self) -> &[String] {
        &self.permanent_patterns
    }

    pub fn classify(&self, error: &EngineError) -> ErrorClass {
        match error {
            EngineError::Timeout => ErrorClass::Transient,
            EngineError::Unavailable(_) => ErrorClass::Permanent,
            other => self.classify_message(&other.to_string()),
        }
    }

    pub fn classify_message(&self, message: &str) -> ErrorClass {
        let lowered = message.to_lowercase();
        if self
            .permanent_patterns
            .iter()
            .any(|pattern| lowered.contains(pattern.as_str()))
        {
            ErrorClass::Permanent
        } else {
            ErrorClass::Transient
        }
    }
}
