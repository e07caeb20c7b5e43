// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// 抓取引擎标识
///
/// 引擎集合是封闭的四种实现；顺序只在某个策略的偏好列表内有意义。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EngineKind {
    /// 高级抓取 API 服务
    Premium,
    /// AI 内容提取引擎
    AiExtraction,
    /// 浏览器自动化引擎
    Browser,
    /// 纯 HTTP 引擎
    Http,
}

impl EngineKind {
    /// 全部引擎
    pub const ALL: [EngineKind; 4] = [
        EngineKind::Premium,
        EngineKind::AiExtraction,
        EngineKind::Browser,
        EngineKind::Http,
    ];

    /// 引擎名称（与配置、日志、指标中使用的名称一致）
    pub fn as_str(&self) -> &'static str {
        match self {
            EngineKind::Premium => "premium",
            EngineKind::AiExtraction => "ai_extraction",
            EngineKind::Browser => "browser",
            EngineKind::Http => "http",
        }
    }

    /// 面向用户的简短描述
    pub fn description(&self) -> &'static str {
        match self {
            EngineKind::Premium => "premium scraping service",
            EngineKind::AiExtraction => "AI-based extractor",
            EngineKind::Browser => "browser automation",
            EngineKind::Http => "plain HTTP fetcher",
        }
    }
}

impl fmt::Display for EngineKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 未知引擎名称
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown engine '{0}'")]
pub struct UnknownEngine(pub String);

impl FromStr for EngineKind {
    type Err = UnknownEngine;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "premium" => Ok(EngineKind::Premium),
            "ai_extraction" | "ai" => Ok(EngineKind::AiExtraction),
            "browser" => Ok(EngineKind::Browser),
            "http" => Ok(EngineKind::Http),
            _ => Err(UnknownEngine(s.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_engine_kind_round_trips_through_name() {
        for kind in EngineKind::ALL {
            assert_eq!(kind.as_str().parse::<EngineKind>().unwrap(), kind);
        }
    }

    #[test]
    fn test_engine_kind_accepts_dashed_names() {
        assert_eq!(
            "AI-Extraction".parse::<EngineKind>().unwrap(),
            EngineKind::AiExtraction
        );
        assert!("selenium".parse::<EngineKind>().is_err());
    }
}
