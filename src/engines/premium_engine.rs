// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::domain::models::crawl_request::CrawlRequest;
use crate::domain::models::engine::EngineKind;
use crate::engines::hierarchy::{hierarchy_from_markdown, markdown_title};
use crate::engines::traits::{EngineAdapter, EngineCapabilities, EngineError, EngineOutput};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::debug;

/// 高级抓取 API 引擎
///
/// 调用兼容 `/v1/scrape` 接口的托管抓取服务，服务端负责渲染与反爬绕过，
/// 返回 Markdown 正文。
pub struct PremiumApiEngine {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

#[derive(Serialize)]
struct ScrapeApiRequest<'a> {
    url: &'a str,
    formats: [&'static str; 1],
    #[serde(rename = "onlyMainContent")]
    only_main_content: bool,
    #[serde(rename = "waitFor", skip_serializing_if = "Option::is_none")]
    wait_for: Option<u64>,
    timeout: u64,
}

#[derive(Deserialize, Debug)]
struct ScrapeApiResponse {
    success: bool,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    data: Option<ScrapeApiData>,
}

#[derive(Deserialize, Debug, Default)]
struct ScrapeApiData {
    #[serde(default)]
    markdown: Option<String>,
    #[serde(default)]
    metadata: serde_json::Map<String, serde_json::Value>,
}

impl PremiumApiEngine {
    pub fn new(base_url: impl Into<String>, api_key: Option<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.filter(|k| !k.trim().is_empty()),
        }
    }

    fn endpoint(&self) -> String {
        format!("{}/v1/scrape", self.base_url)
    }
}

#[async_trait]
impl EngineAdapter for PremiumApiEngine {
    fn kind(&self) -> EngineKind {
        EngineKind::Premium
    }

    fn capabilities(&self) -> EngineCapabilities {
        EngineCapabilities {
            javascript_rendering: true,
            anti_bot_bypass: true,
            premium_service: true,
            ..Default::default()
        }
    }

    async fn attempt(&self, request: &CrawlRequest) -> Result<EngineOutput, EngineError> {
        let start = Instant::now();
        let body = ScrapeApiRequest {
            url: request.url_str(),
            formats: ["markdown"],
            only_main_content: true,
            wait_for: request.anti_bot_mode().then_some(5000),
            timeout: request.timeout().as_millis() as u64,
        };

        let mut call = self
            .client
            .post(self.endpoint())
            .timeout(request.timeout())
            .json(&body);
        if let Some(key) = &self.api_key {
            call = call.bearer_auth(key);
        }
        let response = call.send().await?;

        let status = response.status();
        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::PAYMENT_REQUIRED
        {
            return Err(EngineError::Other(format!(
                "premium API rejected the request ({})",
                status
            )));
        }
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(EngineError::Other("premium API rate limit exceeded".to_string()));
        }
        if status.is_server_error() {
            return Err(EngineError::Other(format!("premium API unavailable ({})", status)));
        }

        let api_response: ScrapeApiResponse = response
            .json()
            .await
            .map_err(|e| EngineError::InvalidResponse(e.to_string()))?;

        if !api_response.success {
            return Err(EngineError::Other(format!(
                "premium API error: {}",
                api_response
                    .error
                    .unwrap_or_else(|| "unknown error".to_string())
            )));
        }

        let data = api_response.data.unwrap_or_default();

        // 目标站点本身的状态码
        if let Some(code) = data.metadata.get("statusCode").and_then(|v| v.as_u64()) {
            if let Ok(target_status) = reqwest::StatusCode::from_u16(code as u16) {
                if target_status.is_client_error() || target_status.is_server_error() {
                    return Err(EngineError::from_status(target_status));
                }
            }
        }

        let markdown = data.markdown.unwrap_or_default();
        if markdown.trim().is_empty() {
            return Err(EngineError::InvalidResponse(
                "premium API returned no content".to_string(),
            ));
        }

        let title = data
            .metadata
            .get("title")
            .or_else(|| data.metadata.get("ogTitle"))
            .and_then(|v| v.as_str())
            .map(str::to_string)
            .or_else(|| markdown_title(&markdown))
            .unwrap_or_default();

        debug!(
            "Premium API returned {} chars for {} in {}ms",
            markdown.len(),
            request.url_str(),
            start.elapsed().as_millis()
        );

        let mut extra = serde_json::Map::new();
        extra.insert("markdown_length".to_string(), markdown.len().into());
        if !data.metadata.is_empty() {
            extra.insert(
                "premium_metadata".to_string(),
                serde_json::Value::Object(data.metadata),
            );
        }

        Ok(EngineOutput {
            hierarchy: hierarchy_from_markdown(&markdown, &title),
            title,
            text: markdown,
            extra,
        })
    }
}
