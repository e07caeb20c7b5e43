// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::domain::models::crawl_request::CrawlRequest;
use crate::domain::models::engine::EngineKind;
use crate::engines::hierarchy::HierarchyBuilder;
use crate::engines::traits::{EngineAdapter, EngineCapabilities, EngineError, EngineOutput};
use async_trait::async_trait;
use once_cell::sync::Lazy;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE};
use scraper::{ElementRef, Html, Selector};
use std::time::Instant;
use tracing::debug;

/// 默认 User-Agent
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (compatible; crawlpilot/0.1)";

/// 反爬模式下使用的浏览器 User-Agent
const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// 不参与正文提取的标签
const SKIPPED_TAGS: [&str; 8] = [
    "script", "style", "noscript", "template", "nav", "header", "footer", "aside",
];

static TITLE: Lazy<Selector> = Lazy::new(|| Selector::parse("title").unwrap());
static HEADINGS: Lazy<Selector> = Lazy::new(|| Selector::parse("h1, h2, h3, h4").unwrap());
static MAIN_CONTENT: Lazy<Selector> = Lazy::new(|| Selector::parse("main, article").unwrap());
static BODY: Lazy<Selector> = Lazy::new(|| Selector::parse("body").unwrap());
static NAV_MENUS: Lazy<Selector> = Lazy::new(|| {
    Selector::parse("nav, ul[class*='menu'], ul[class*='nav'], ol[class*='nav']").unwrap()
});
static LINKS: Lazy<Selector> = Lazy::new(|| Selector::parse("a").unwrap());

/// 纯 HTTP 抓取引擎
///
/// 基于 reqwest 获取页面，使用 scraper 提取标题、正文和标题层级。
#[derive(Debug, Clone)]
pub struct HttpEngine {
    user_agent: String,
}

impl Default for HttpEngine {
    fn default() -> Self {
        Self::new(DEFAULT_USER_AGENT)
    }
}

impl HttpEngine {
    pub fn new(user_agent: impl Into<String>) -> Self {
        Self {
            user_agent: user_agent.into(),
        }
    }

    fn headers(anti_bot_mode: bool) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(
            ACCEPT,
            HeaderValue::from_static(
                "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8",
            ),
        );
        if anti_bot_mode {
            headers.insert(
                ACCEPT_LANGUAGE,
                HeaderValue::from_static("en-US,en;q=0.9,ko;q=0.8"),
            );
            headers.insert("Upgrade-Insecure-Requests", HeaderValue::from_static("1"));
        }
        headers
    }
}

#[async_trait]
impl EngineAdapter for HttpEngine {
    fn kind(&self) -> EngineKind {
        EngineKind::Http
    }

    fn capabilities(&self) -> EngineCapabilities {
        EngineCapabilities {
            fast_static: true,
            ..Default::default()
        }
    }

    async fn attempt(&self, request: &CrawlRequest) -> Result<EngineOutput, EngineError> {
        let user_agent = if request.anti_bot_mode() {
            BROWSER_USER_AGENT
        } else {
            self.user_agent.as_str()
        };

        // Each request gets a fresh client for cookie isolation
        let client = reqwest::Client::builder()
            .user_agent(user_agent)
            .timeout(request.timeout())
            .cookie_store(true)
            .build()?;

        let start = Instant::now();
        let response = client
            .get(request.url().clone())
            .headers(Self::headers(request.anti_bot_mode()))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(EngineError::from_status(status));
        }

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("text/html")
            .to_string();
        let body = response.text().await?;

        debug!(
            "Fetched {} ({} bytes, {}) in {}ms",
            request.url_str(),
            body.len(),
            content_type,
            start.elapsed().as_millis()
        );

        let mut output = if content_type.contains("html") || content_type.trim().is_empty() {
            parse_html(&body)
        } else {
            EngineOutput {
                title: String::new(),
                text: body.trim().to_string(),
                hierarchy: HierarchyBuilder::new("").build(),
                extra: Default::default(),
            }
        };

        if output.text.trim().is_empty() {
            return Err(EngineError::InvalidResponse(
                "page contains no extractable text".to_string(),
            ));
        }

        output
            .extra
            .insert("status_code".to_string(), status.as_u16().into());
        output
            .extra
            .insert("content_type".to_string(), content_type.into());
        Ok(output)
    }
}

/// 从 HTML 提取标题、可见正文与标题层级
pub fn parse_html(html: &str) -> EngineOutput {
    let document = Html::parse_document(html);

    let title = document
        .select(&TITLE)
        .next()
        .map(|t| collapse(&t.text().collect::<String>()))
        .unwrap_or_default();

    let mut builder = HierarchyBuilder::new(&title);
    for heading in document.select(&HEADINGS) {
        let level = heading.value().name()[1..].parse::<u8>().unwrap_or(3);
        builder.push_heading(level, &collapse(&heading.text().collect::<String>()));
    }
    for menu in document.select(&NAV_MENUS) {
        let items: Vec<String> = menu
            .select(&LINKS)
            .map(|a| collapse(&a.text().collect::<String>()))
            .filter(|t| !t.is_empty())
            .collect();
        if items.len() > 2 {
            builder.navigation(items);
            break;
        }
    }

    let root = document
        .select(&MAIN_CONTENT)
        .next()
        .or_else(|| document.select(&BODY).next())
        .unwrap_or_else(|| document.root_element());

    EngineOutput {
        title,
        text: visible_text(root),
        hierarchy: builder.build(),
        extra: Default::default(),
    }
}

fn visible_text(root: ElementRef<'_>) -> String {
    let mut lines = Vec::new();
    for node in root.descendants() {
        let Some(text) = node.value().as_text() else {
            continue;
        };
        let hidden = node.ancestors().any(|ancestor| {
            ancestor
                .value()
                .as_element()
                .is_some_and(|e| SKIPPED_TAGS.contains(&e.name()))
        });
        if hidden {
            continue;
        }
        let line = collapse(text);
        if !line.is_empty() {
            lines.push(line);
        }
    }
    lines.join("\n")
}

fn collapse(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
