// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::domain::models::engine::EngineKind;
use serde::{Deserialize, Serialize};
use std::fmt;

/// 抓取策略名称
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyKind {
    /// 复杂单页应用
    ComplexSpa,
    /// 强反爬虫站点
    AntiBotHeavy,
    /// 需要 AI 语义提取
    AiAnalysisNeeded,
    /// 简单静态站点
    SimpleStatic,
}

impl StrategyKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            StrategyKind::ComplexSpa => "complex_spa",
            StrategyKind::AntiBotHeavy => "anti_bot_heavy",
            StrategyKind::AiAnalysisNeeded => "ai_analysis_needed",
            StrategyKind::SimpleStatic => "simple_static",
        }
    }
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 策略画像：主引擎 + 固定的回退顺序
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StrategyProfile {
    /// 策略名称
    pub name: StrategyKind,
    /// 主引擎
    pub primary: EngineKind,
    /// 回退顺序（其余三个引擎的一个排列）
    pub fallback: [EngineKind; 3],
}

impl StrategyProfile {
    /// 主引擎在前、回退引擎在后的完整顺序
    pub fn engine_order(&self) -> Vec<EngineKind> {
        let mut order = Vec::with_capacity(4);
        order.push(self.primary);
        order.extend_from_slice(&self.fallback);
        order
    }

    /// 检查主引擎与回退列表是否恰好覆盖全部四个引擎
    pub fn is_complete_permutation(&self) -> bool {
        let order = self.engine_order();
        EngineKind::ALL
            .iter()
            .all(|kind| order.iter().filter(|k| *k == kind).count() == 1)
    }
}
