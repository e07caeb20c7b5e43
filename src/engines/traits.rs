// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::domain::models::crawl_request::CrawlRequest;
use crate::domain::models::engine::EngineKind;
use async_trait::async_trait;
use std::error::Error as StdError;
use thiserror::Error;

/// 引擎错误类型
///
/// 错误消息会被编排器的错误分类器检查，用于区分永久性与临时性失败。
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EngineError {
    /// 目标站点返回非成功状态码
    #[error("HTTP {status}: {message}")]
    Http { status: u16, message: String },
    /// 网络层失败（DNS、连接、TLS 等）
    #[error("network error: {0}")]
    Network(String),
    /// 超时
    #[error("timeout")]
    Timeout,
    /// 引擎未注册或已禁用
    #[error("engine unavailable: {0}")]
    Unavailable(EngineKind),
    /// 被反爬机制拦截
    #[error("blocked by anti-bot protection: {0}")]
    Blocked(String),
    /// 响应无法解析
    #[error("invalid response: {0}")]
    InvalidResponse(String),
    /// 其他错误
    #[error("{0}")]
    Other(String),
}

impl EngineError {
    /// 根据状态码构造错误，消息带上标准原因短语
    pub fn from_status(status: reqwest::StatusCode) -> Self {
        EngineError::Http {
            status: status.as_u16(),
            message: status
                .canonical_reason()
                .unwrap_or("unexpected status")
                .to_lowercase(),
        }
    }
}

impl From<reqwest::Error> for EngineError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_timeout() {
            return EngineError::Timeout;
        }
        if let Some(status) = error.status() {
            return EngineError::from_status(status);
        }
        if error.is_decode() || error.is_body() {
            return EngineError::InvalidResponse(error_chain(&error));
        }
        EngineError::Network(error_chain(&error))
    }
}

/// 拼接错误链，保留底层原因（例如 "dns error"、"connection refused"）
fn error_chain(error: &(dyn StdError + 'static)) -> String {
    let mut message = error.to_string();
    let mut source = error.source();
    while let Some(cause) = source {
        let text = cause.to_string();
        if !message.contains(&text) {
            message.push_str(": ");
            message.push_str(&text);
        }
        source = cause.source();
    }
    message
}

/// 引擎一次成功抓取的原始输出
///
/// 编排器在此基础上补充评分与来源信息，生成最终的 `CrawlResult`。
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EngineOutput {
    pub title: String,
    pub text: String,
    /// 标题层级结构
    pub hierarchy: serde_json::Value,
    /// 引擎特有的附加信息
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// 引擎能力描述
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EngineCapabilities {
    pub javascript_rendering: bool,
    pub anti_bot_bypass: bool,
    pub ai_extraction: bool,
    pub premium_service: bool,
    pub fast_static: bool,
}

/// 抓取引擎适配器特质
#[async_trait]
pub trait EngineAdapter: Send + Sync {
    /// 引擎标识
    fn kind(&self) -> EngineKind;

    /// 引擎能力
    fn capabilities(&self) -> EngineCapabilities;

    /// 执行一次抓取
    ///
    /// 普通的 HTTP 或渲染失败必须以 `EngineError` 返回，不得 panic。
    async fn attempt(&self, request: &CrawlRequest) -> Result<EngineOutput, EngineError>;
}
