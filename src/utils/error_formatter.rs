// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::domain::models::crawl_result::{AttemptOutcome, CrawlResult};
use crate::domain::models::engine::EngineKind;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use std::fmt;

/// 错误模式 → (用户提示, 建议)
static ERROR_PATTERNS: Lazy<Vec<(Regex, &'static str, &'static str)>> = Lazy::new(|| {
    [
        (
            r"timeout|timed out",
            "The website took too long to respond",
            "Try again later",
        ),
        (
            r"connection.*refused|connection.*failed|network.*unreachable",
            "The website could not be reached",
            "Check the network connection or try again later",
        ),
        (
            r"name.*resolution|dns|host.*not.*found",
            "The website address could not be resolved",
            "Check that the URL is correct",
        ),
        (
            r"404|not found",
            "The requested page does not exist",
            "Check that the URL is correct",
        ),
        (
            r"403|forbidden|access.*denied",
            "Access to the page was denied",
            "The site may not allow automated access",
        ),
        (
            r"5\d\d|server error|bad gateway|service unavailable",
            "The website reported a server error",
            "Try again later",
        ),
        (
            r"ssl|certificate",
            "The website's security certificate is invalid",
            "Check the site's TLS configuration",
        ),
        (
            r"captcha|cloudflare|blocked|bot",
            "The website blocked automated access",
            "Retry with anti-bot mode or a premium engine",
        ),
        (
            r"rate limit|too many requests|429",
            "The request was rate limited",
            "Lower the concurrency or try again later",
        ),
        (
            r"invalid url|malformed url",
            "The URL is not valid",
            "Check that the URL is correct",
        ),
    ]
    .into_iter()
    .map(|(pattern, message, suggestion)| {
        (
            Regex::new(&format!("(?i){}", pattern)).unwrap(),
            message,
            suggestion,
        )
    })
    .collect()
});

/// 失败类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// 每个引擎都报错
    AllEnginesErrored,
    /// 每个引擎都只产出低质量内容
    AllBelowQuality,
    /// 部分报错、部分低质量
    Mixed,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            FailureKind::AllEnginesErrored => write!(f, "every engine failed"),
            FailureKind::AllBelowQuality => {
                write!(f, "every engine produced low-quality output")
            }
            FailureKind::Mixed => write!(f, "no engine produced content above the quality gate"),
        }
    }
}

/// 单个引擎被放弃的原因
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EngineVerdict {
    pub engine: EngineKind,
    pub outcome: AttemptOutcome,
    pub reason: String,
}

/// 面向用户的失败说明
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailureExplanation {
    pub kind: FailureKind,
    pub user_message: String,
    pub suggestion: String,
    pub engines: Vec<EngineVerdict>,
}

impl fmt::Display for FailureExplanation {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        writeln!(f, "{} ({})", self.user_message, self.kind)?;
        for verdict in &self.engines {
            writeln!(f, "  - {}: {}", verdict.engine.description(), verdict.reason)?;
        }
        write!(f, "Suggestion: {}", self.suggestion)
    }
}

/// 解释失败或未通过质量门槛的结果；通过门槛的结果返回 `None`
pub fn explain_failure(result: &CrawlResult) -> Option<FailureExplanation> {
    if result.is_complete() && result.metadata.quality_gate_passed {
        return None;
    }

    let engines: Vec<EngineVerdict> = result
        .metadata
        .attempts
        .iter()
        .map(|attempt| EngineVerdict {
            engine: attempt.engine,
            outcome: attempt.outcome,
            reason: match (&attempt.error, attempt.quality_score) {
                (Some(error), _) => format!("{} ({})", attempt.outcome, sanitize(error)),
                (None, Some(score)) => format!("{} (score {})", attempt.outcome, score),
                (None, None) => attempt.outcome.to_string(),
            },
        })
        .collect();

    let below_quality = engines
        .iter()
        .filter(|v| v.outcome == AttemptOutcome::BelowQuality)
        .count();
    let kind = if below_quality == 0 {
        FailureKind::AllEnginesErrored
    } else if below_quality == engines.len() {
        FailureKind::AllBelowQuality
    } else {
        FailureKind::Mixed
    };

    let (user_message, suggestion) = match kind {
        FailureKind::AllEnginesErrored => {
            let error = result.error().unwrap_or("unknown error");
            match_pattern(error).unwrap_or((
                "The page content could not be extracted",
                "Try a different engine or try again later",
            ))
        }
        _ => (
            "Content was extracted but did not meet the quality threshold",
            "Review the best candidate or lower the quality threshold",
        ),
    };

    Some(FailureExplanation {
        kind,
        user_message: user_message.to_string(),
        suggestion: suggestion.to_string(),
        engines,
    })
}

fn match_pattern(error: &str) -> Option<(&'static str, &'static str)> {
    ERROR_PATTERNS
        .iter()
        .find(|(pattern, _, _)| pattern.is_match(error))
        .map(|(_, message, suggestion)| (*message, *suggestion))
}

/// 截断过长的错误信息
fn sanitize(error: &str) -> String {
    const MAX_CHARS: usize = 160;
    let line = error.lines().next().unwrap_or_default().trim();
    if line.chars().count() > MAX_CHARS {
        let truncated: String = line.chars().take(MAX_CHARS).collect();
        format!("{}...", truncated)
    } else {
        line.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::crawl_result::{AttemptRecord, CrawlMetadata, CrawlStatus};

    fn attempt(engine: EngineKind, outcome: AttemptOutcome, error: Option<&str>) -> AttemptRecord {
        AttemptRecord {
            engine,
            outcome,
            error: error.map(str::to_string),
            quality_score: error.is_none().then_some(35),
            duration_ms: 10,
            backoff_ms: 0,
        }
    }

    #[test]
    fn test_all_errors_use_last_error_message() {
        let metadata = CrawlMetadata {
            attempts: vec![
                attempt(EngineKind::Http, AttemptOutcome::TimedOut, Some("timeout")),
                attempt(
                    EngineKind::Browser,
                    AttemptOutcome::PermanentError,
                    Some("HTTP 404: not found"),
                ),
            ],
            ..Default::default()
        };
        let result = CrawlResult::failed("https://a.example/", "HTTP 404: not found", metadata);

        let explanation = explain_failure(&result).unwrap();
        assert_eq!(explanation.kind, FailureKind::AllEnginesErrored);
        assert_eq!(explanation.user_message, "The requested page does not exist");
        assert_eq!(explanation.engines.len(), 2);
        assert_eq!(explanation.engines[0].reason, "timed_out (timeout)");
    }

    #[test]
    fn test_low_quality_is_distinguished_from_errors() {
        let mut result = CrawlResult::failed("https://a.example/", "x", CrawlMetadata::default());
        result.status = CrawlStatus::Complete;
        result.metadata.error = None;
        result.metadata.attempts = vec![
            attempt(EngineKind::Http, AttemptOutcome::BelowQuality, None),
            attempt(EngineKind::AiExtraction, AttemptOutcome::BelowQuality, None),
        ];

        let explanation = explain_failure(&result).unwrap();
        assert_eq!(explanation.kind, FailureKind::AllBelowQuality);
        assert_eq!(explanation.engines[1].reason, "below_quality (score 35)");

        result.metadata.attempts.push(attempt(
            EngineKind::Premium,
            AttemptOutcome::Unavailable,
            Some("engine unavailable: premium"),
        ));
        assert_eq!(explain_failure(&result).unwrap().kind, FailureKind::Mixed);
    }

    #[test]
    fn test_passing_result_needs_no_explanation() {
        let mut result = CrawlResult::failed("https://a.example/", "x", CrawlMetadata::default());
        result.status = CrawlStatus::Complete;
        result.metadata.quality_gate_passed = true;
        assert!(explain_failure(&result).is_none());
    }

    #[test]
    fn test_display_lists_engines() {
        let metadata = CrawlMetadata {
            attempts: vec![attempt(
                EngineKind::Http,
                AttemptOutcome::PermanentError,
                Some("network error: dns error"),
            )],
            ..Default::default()
        };
        let result = CrawlResult::failed("https://a.example/", "network error: dns error", metadata);
        let text = explain_failure(&result).unwrap().to_string();

        assert!(text.starts_with("The website address could not be resolved"));
        assert!(text.contains("permanent_error (network error: dns error)"));
    }
}
