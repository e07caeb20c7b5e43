// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::domain::models::engine::EngineKind;
use crate::engines::validators::validate_crawl_url;
use crate::utils::errors::ValidationError;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use url::Url;
use uuid::Uuid;

/// 默认单次引擎尝试超时
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// 抓取请求
///
/// 创建后不可变；`with_*` 方法消耗自身并返回新值。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CrawlRequest {
    url: Url,
    engine_override: Option<EngineKind>,
    #[serde(with = "duration_millis")]
    timeout: Duration,
    clean_text: bool,
    target_content: Option<String>,
    anti_bot_mode: bool,
    job_id: Option<Uuid>,
}

impl CrawlRequest {
    /// 校验 URL 并以默认参数创建请求
    pub fn new(url: &str) -> Result<Self, ValidationError> {
        Ok(Self {
            url: validate_crawl_url(url)?,
            engine_override: None,
            timeout: DEFAULT_TIMEOUT,
            clean_text: true,
            target_content: None,
            anti_bot_mode: false,
            job_id: None,
        })
    }

    pub fn with_engine_override(mut self, engine: EngineKind) -> Self {
        self.engine_override = Some(engine);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Result<Self, ValidationError> {
        if timeout.is_zero() {
            return Err(ValidationError::InvalidTimeout);
        }
        self.timeout = timeout;
        Ok(self)
    }

    pub fn with_clean_text(mut self, clean_text: bool) -> Self {
        self.clean_text = clean_text;
        self
    }

    /// 目标内容提示，例如 "title"、"price"、"body"、"reviews"
    pub fn with_target_content(mut self, hint: impl Into<String>) -> Self {
        let hint = hint.into();
        let hint = hint.trim();
        self.target_content = if hint.is_empty() {
            None
        } else {
            Some(hint.to_string())
        };
        self
    }

    pub fn with_anti_bot_mode(mut self, anti_bot_mode: bool) -> Self {
        self.anti_bot_mode = anti_bot_mode;
        self
    }

    pub fn with_job_id(mut self, job_id: Uuid) -> Self {
        self.job_id = Some(job_id);
        self
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn url_str(&self) -> &str {
        self.url.as_str()
    }

    pub fn engine_override(&self) -> Option<EngineKind> {
        self.engine_override
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn clean_text(&self) -> bool {
        self.clean_text
    }

    pub fn target_content(&self) -> Option<&str> {
        self.target_content.as_deref()
    }

    pub fn anti_bot_mode(&self) -> bool {
        self.anti_bot_mode
    }

    pub fn job_id(&self) -> Option<Uuid> {
        self.job_id
    }
}

mod duration_millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}
