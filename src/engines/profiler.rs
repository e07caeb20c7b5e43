// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::domain::models::site_profile::{AntiBotRisk, SiteProfile, SiteType};
use crate::engines::http_engine::DEFAULT_USER_AGENT;
use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::header::HeaderMap;
use scraper::{Html, Selector};
use std::time::Duration;
use thiserror::Error;
use tracing::debug;
use url::Url;

/// 默认分析时间预算
pub const DEFAULT_PROFILE_BUDGET: Duration = Duration::from_secs(5);
/// 默认采样字节数
pub const DEFAULT_SAMPLE_BYTES: usize = 50_000;

/// 站点分析错误
///
/// 对调用方而言从不致命：选择器会退回默认策略。
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProfileError {
    #[error("site profile unavailable: {0}")]
    Unavailable(String),
}

/// 站点分析器特质
#[async_trait]
pub trait SiteProfiler: Send + Sync {
    /// 在 `budget` 时间内生成站点画像
    async fn profile(&self, url: &Url, budget: Duration) -> Result<SiteProfile, ProfileError>;
}

/// 关闭分析时使用的分析器，总是返回不可用
#[derive(Debug, Clone, Copy, Default)]
pub struct DisabledProfiler;

#[async_trait]
impl SiteProfiler for DisabledProfiler {
    async fn profile(&self, _url: &Url, _budget: Duration) -> Result<SiteProfile, ProfileError> {
        Err(ProfileError::Unavailable("site profiling disabled".to_string()))
    }
}

static SCRIPTS: Lazy<Selector> = Lazy::new(|| Selector::parse("script").unwrap());
static ALL_ELEMENTS: Lazy<Selector> = Lazy::new(|| Selector::parse("*").unwrap());
static BODY: Lazy<Selector> = Lazy::new(|| Selector::parse("body").unwrap());

static FRAMEWORK_MARKERS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)react|vue\.js|vue\(|angular|ng-app|svelte|__next_data__|_next/").unwrap()
});

static JS_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"(?i)\.ajax\(|fetch\(|axios\.|XMLHttpRequest",
        r"import\(|require\(",
        r"(?i)addEventListener|onClick|onLoad",
        r"(?i)getElementById|querySelector|createElement",
        r"(?i)async|await|Promise|setTimeout",
    ]
    .iter()
    .map(|p| Regex::new(p).unwrap())
    .collect()
});

const BOT_DETECTION_VENDORS: [&str; 5] = [
    "distil_r_captcha",
    "perimeterx",
    "imperva",
    "akamai",
    "datadome",
];

const RATE_LIMIT_HEADERS: [&str; 3] = ["x-ratelimit", "retry-after", "x-rate-limit"];

/// 基于 HTML 采样的启发式站点分析器
#[derive(Debug, Clone)]
pub struct HtmlSiteProfiler {
    client: reqwest::Client,
    sample_bytes: usize,
}

impl Default for HtmlSiteProfiler {
    fn default() -> Self {
        Self::new(DEFAULT_USER_AGENT, DEFAULT_SAMPLE_BYTES)
    }
}

impl HtmlSiteProfiler {
    pub fn new(user_agent: &str, sample_bytes: usize) -> Self {
        let client = reqwest::Client::builder()
            .user_agent(user_agent)
            .build()
            .unwrap_or_default();
        Self {
            client,
            sample_bytes: sample_bytes.max(1),
        }
    }

    async fn fetch_sample(&self, url: &Url) -> Result<(HeaderMap, String), ProfileError> {
        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| ProfileError::Unavailable(e.to_string()))?;
        let headers = response.headers().clone();
        let body = response
            .text()
            .await
            .map_err(|e| ProfileError::Unavailable(e.to_string()))?;
        Ok((headers, truncate_at_boundary(body, self.sample_bytes)))
    }
}

#[async_trait]
impl SiteProfiler for HtmlSiteProfiler {
    async fn profile(&self, url: &Url, budget: Duration) -> Result<SiteProfile, ProfileError> {
        let (headers, html) = tokio::time::timeout(budget, self.fetch_sample(url))
            .await
            .map_err(|_| {
                ProfileError::Unavailable(format!(
                    "profiling exceeded budget of {}ms",
                    budget.as_millis()
                ))
            })??;

        if html.trim().is_empty() {
            return Err(ProfileError::Unavailable("empty sample".to_string()));
        }

        let profile = analyze_html(&html, &headers);
        debug!(
            "Profiled {}: type={}, js={} ({}), anti_bot={}",
            url,
            profile.site_type,
            profile.javascript_level,
            profile.javascript_score,
            profile.anti_bot_risk
        );
        Ok(profile)
    }
}

fn truncate_at_boundary(mut text: String, max_bytes: usize) -> String {
    if text.len() > max_bytes {
        let mut cut = max_bytes;
        while !text.is_char_boundary(cut) {
            cut -= 1;
        }
        text.truncate(cut);
    }
    text
}

/// 根据 HTML 样本和响应头计算站点画像
pub fn analyze_html(html: &str, headers: &HeaderMap) -> SiteProfile {
    SiteProfile::new(
        detect_site_type(html),
        javascript_score(html),
        detect_anti_bot(html, headers),
    )
}

/// SPA 特征打分：≥70 视为单页应用，≥40 视为服务端渲染的动态站点
pub fn spa_score(html: &str) -> u32 {
    let document = Html::parse_document(html);
    let script_count = document.select(&SCRIPTS).count();
    let dom_nodes = document.select(&ALL_ELEMENTS).count();
    let text_length: usize = document
        .select(&BODY)
        .next()
        .map(|body| body.text().map(|t| t.trim().chars().count()).sum())
        .unwrap_or(0);

    let mut score = 0;
    if script_count > 10 {
        score += 30;
    }
    if FRAMEWORK_MARKERS.is_match(html) {
        score += 40;
    }
    if html.contains("data-reactroot") || html.contains("__NEXT_DATA__") {
        score += 50;
    }
    if text_length < 500 && dom_nodes > 50 {
        score += 30;
    }
    score
}

fn detect_site_type(html: &str) -> SiteType {
    match spa_score(html) {
        score if score >= 70 => SiteType::SinglePageApp,
        score if score >= 40 => SiteType::ServerRendered,
        _ => SiteType::Static,
    }
}

/// JavaScript 复杂度：动态脚本模式命中数 × 2，上限 100
pub fn javascript_score(html: &str) -> u8 {
    let hits: usize = JS_PATTERNS.iter().map(|p| p.find_iter(html).count()).sum();
    (hits.saturating_mul(2)).min(100) as u8
}

fn detect_anti_bot(html: &str, headers: &HeaderMap) -> AntiBotRisk {
    let lowered = html.to_lowercase();
    let header_names: Vec<String> = headers
        .keys()
        .map(|name| name.as_str().to_lowercase())
        .collect();
    let has_header = |needle: &str| header_names.iter().any(|name| name.contains(needle));

    let indicators = [
        lowered.contains("cloudflare") || has_header("cf-ray"),
        lowered.contains("recaptcha") || lowered.contains("grecaptcha"),
        lowered.contains("captcha"),
        BOT_DETECTION_VENDORS.iter().any(|v| lowered.contains(v)),
        RATE_LIMIT_HEADERS.iter().any(|h| has_header(h)),
        lowered.contains("challenge") && lowered.contains("javascript"),
    ];

    match indicators.iter().filter(|hit| **hit).count() {
        0 => AntiBotRisk::Low,
        1 => AntiBotRisk::Medium,
        _ => AntiBotRisk::High,
    }
}
