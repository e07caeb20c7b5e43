// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::utils::errors::ValidationError;
use url::Url;

/// 已知会导致抓取失败的 URL 协议前缀
const KNOWN_BAD_SCHEMES: [&str; 2] = ["javascript:", "mailto:"];

/// 校验抓取目标 URL
///
/// 必须是带主机名的绝对 http/https 地址。
pub fn validate_crawl_url(raw: &str) -> Result<Url, ValidationError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::EmptyUrl);
    }

    if trimmed.starts_with('#') {
        return Err(ValidationError::invalid_url(raw, "fragment-only link"));
    }

    let lowered = trimmed.to_ascii_lowercase();
    if let Some(scheme) = KNOWN_BAD_SCHEMES.iter().find(|s| lowered.starts_with(*s)) {
        return Err(ValidationError::invalid_url(
            raw,
            format!("known bad URL scheme '{}'", scheme),
        ));
    }

    let url = Url::parse(trimmed).map_err(|e| ValidationError::invalid_url(raw, e.to_string()))?;

    match url.scheme() {
        "http" | "https" => {}
        other => {
            return Err(ValidationError::invalid_url(
                raw,
                format!("unsupported scheme '{}'", other),
            ))
        }
    }

    match url.host_str() {
        Some(host) if !host.is_empty() => Ok(url),
        _ => Err(ValidationError::invalid_url(raw, "missing host")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accepts_absolute_http_urls() {
        assert!(validate_crawl_url("https://a.example").is_ok());
        assert!(validate_crawl_url("  http://example.com/path?q=1 ").is_ok());
    }

    #[test]
    fn test_bad_scheme_text_inside_query_is_allowed() {
        assert!(validate_crawl_url("https://x.example/?next=mailto:a@b").is_ok());
        assert!(validate_crawl_url("https://x.example/login?redirect=javascript:void(0)").is_ok());
        assert!(matches!(
            validate_crawl_url("JavaScript:alert(1)"),
            Err(ValidationError::InvalidUrl { .. })
        ));
    }

    #[test]
    fn test_rejects_relative_and_foreign_schemes() {
        assert_eq!(validate_crawl_url(""), Err(ValidationError::EmptyUrl));
        assert!(matches!(
            validate_crawl_url("/relative/path"),
            Err(ValidationError::InvalidUrl { .. })
        ));
        assert!(matches!(
            validate_crawl_url("ftp://example.com/file"),
            Err(ValidationError::InvalidUrl { .. })
        ));
        assert!(matches!(
            validate_crawl_url("mailto:someone@example.com"),
            Err(ValidationError::InvalidUrl { .. })
        ));
        assert!(matches!(
            validate_crawl_url("#top"),
            Err(ValidationError::InvalidUrl { .. })
        ));
    }
}
