// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use serde::{Deserialize, Serialize};
use std::fmt;

/// 站点渲染类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SiteType {
    /// 纯静态页面
    Static,
    /// 服务端渲染页面
    ServerRendered,
    /// 单页应用
    SinglePageApp,
}

impl fmt::Display for SiteType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            SiteType::Static => write!(f, "static"),
            SiteType::ServerRendered => write!(f, "server_rendered"),
            SiteType::SinglePageApp => write!(f, "single_page_app"),
        }
    }
}

/// JavaScript 复杂度等级
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JavascriptLevel {
    Low,
    Medium,
    High,
}

impl JavascriptLevel {
    /// 根据 0-100 的复杂度分数推导等级
    pub fn from_score(score: u8) -> Self {
        match score {
            0..=20 => JavascriptLevel::Low,
            21..=50 => JavascriptLevel::Medium,
            _ => JavascriptLevel::High,
        }
    }
}

impl fmt::Display for JavascriptLevel {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            JavascriptLevel::Low => write!(f, "low"),
            JavascriptLevel::Medium => write!(f, "medium"),
            JavascriptLevel::High => write!(f, "high"),
        }
    }
}

/// 反爬虫风险等级
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum AntiBotRisk {
    Low,
    Medium,
    High,
    #[default]
    Unknown,
}

impl fmt::Display for AntiBotRisk {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            AntiBotRisk::Low => write!(f, "low"),
            AntiBotRisk::Medium => write!(f, "medium"),
            AntiBotRisk::High => write!(f, "high"),
            AntiBotRisk::Unknown => write!(f, "unknown"),
        }
    }
}

/// 站点画像
///
/// 由站点分析器针对每个 URL 生成一次，引擎选择器只读取、不修改。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SiteProfile {
    /// 渲染类型
    pub site_type: SiteType,
    /// JavaScript 复杂度等级
    pub javascript_level: JavascriptLevel,
    /// JavaScript 复杂度分数 (0-100)
    pub javascript_score: u8,
    /// 反爬虫风险
    pub anti_bot_risk: AntiBotRisk,
    /// 是否必须执行 JavaScript 才能拿到内容
    pub requires_js: bool,
}

impl SiteProfile {
    /// 创建站点画像，JavaScript 等级由分数推导
    pub fn new(site_type: SiteType, javascript_score: u8, anti_bot_risk: AntiBotRisk) -> Self {
        let javascript_score = javascript_score.min(100);
        Self {
            site_type,
            javascript_level: JavascriptLevel::from_score(javascript_score),
            javascript_score,
            anti_bot_risk,
            requires_js: javascript_score > 30,
        }
    }

    /// 典型的静态站点画像
    pub fn simple_static() -> Self {
        Self::new(SiteType::Static, 0, AntiBotRisk::Low)
    }
}
