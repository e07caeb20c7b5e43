// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::domain::models::crawl_request::CrawlRequest;
use crate::domain::models::engine::EngineKind;
use crate::domain::models::site_profile::{AntiBotRisk, JavascriptLevel, SiteProfile, SiteType};
use crate::domain::models::strategy::{StrategyKind, StrategyProfile};
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use thiserror::Error;
use tracing::{debug, warn};

/// 策略表错误
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StrategyTableError {
    #[error("strategy {0} does not list every engine exactly once")]
    NotAPermutation(StrategyKind),
    #[error("strategy {0} is missing from the table")]
    MissingStrategy(StrategyKind),
}

/// 策略表
///
/// 进程启动时构造一次，之后只读。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StrategyTable {
    profiles: HashMap<StrategyKind, StrategyProfile>,
}

impl Default for StrategyTable {
    fn default() -> Self {
        Self::standard()
    }
}

impl StrategyTable {
    /// 标准策略表
    pub fn standard() -> Self {
        let profiles = [
            StrategyProfile {
                name: StrategyKind::ComplexSpa,
                primary: EngineKind::AiExtraction,
                fallback: [EngineKind::Premium, EngineKind::Browser, EngineKind::Http],
            },
            StrategyProfile {
                name: StrategyKind::AntiBotHeavy,
                primary: EngineKind::Browser,
                fallback: [EngineKind::Premium, EngineKind::AiExtraction, EngineKind::Http],
            },
            StrategyProfile {
                name: StrategyKind::AiAnalysisNeeded,
                primary: EngineKind::AiExtraction,
                fallback: [EngineKind::Premium, EngineKind::Browser, EngineKind::Http],
            },
            StrategyProfile {
                name: StrategyKind::SimpleStatic,
                primary: EngineKind::Http,
                fallback: [EngineKind::AiExtraction, EngineKind::Premium, EngineKind::Browser],
            },
        ];
        Self {
            profiles: profiles.into_iter().map(|p| (p.name, p)).collect(),
        }
    }

    /// 使用自定义策略表；每个策略都必须存在且是四个引擎的排列
    pub fn custom(
        profiles: impl IntoIterator<Item = StrategyProfile>,
    ) -> Result<Self, StrategyTableError> {
        let profiles: HashMap<StrategyKind, StrategyProfile> =
            profiles.into_iter().map(|p| (p.name, p)).collect();

        for kind in [
            StrategyKind::ComplexSpa,
            StrategyKind::AntiBotHeavy,
            StrategyKind::AiAnalysisNeeded,
            StrategyKind::SimpleStatic,
        ] {
            let profile = profiles
                .get(&kind)
                .ok_or(StrategyTableError::MissingStrategy(kind))?;
            if !profile.is_complete_permutation() {
                return Err(StrategyTableError::NotAPermutation(kind));
            }
        }
        Ok(Self { profiles })
    }

    /// 查找策略；构造时已保证每个策略都存在
    pub fn profile(&self, kind: StrategyKind) -> Option<&StrategyProfile> {
        self.profiles.get(&kind)
    }
}

/// 引擎选择结果
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EngineSelection {
    /// 使用的策略；显式指定引擎时为空
    pub strategy: Option<StrategyKind>,
    /// 有序引擎列表
    pub engines: Vec<EngineKind>,
    /// 选择原因
    pub reason: String,
}

/// 引擎选择器
///
/// 将站点画像（或显式指定的引擎）映射为有序的引擎列表。
#[derive(Debug, Clone, Default)]
pub struct EngineSelector {
    table: StrategyTable,
    disabled: HashSet<EngineKind>,
}

impl EngineSelector {
    pub fn new(table: StrategyTable) -> Self {
        Self {
            table,
            disabled: HashSet::new(),
        }
    }

    /// 被禁用的引擎不能作为显式指定引擎
    pub fn with_disabled(mut self, disabled: impl IntoIterator<Item = EngineKind>) -> Self {
        self.disabled = disabled.into_iter().collect();
        self
    }

    pub fn table(&self) -> &StrategyTable {
        &self.table
    }

    /// 按画像分类策略；优先级：反爬风险 > SPA/高 JS > 目标内容提示 > 默认
    pub fn classify(
        &self,
        profile: Option<&SiteProfile>,
        target_hint: Option<&str>,
    ) -> (StrategyKind, String) {
        let Some(profile) = profile else {
            return (
                StrategyKind::SimpleStatic,
                "site profile unavailable, using default strategy".to_string(),
            );
        };

        if profile.anti_bot_risk == AntiBotRisk::High {
            return (
                StrategyKind::AntiBotHeavy,
                "high anti-bot risk detected".to_string(),
            );
        }

        if profile.site_type == SiteType::SinglePageApp
            || profile.javascript_level == JavascriptLevel::High
        {
            return (
                StrategyKind::ComplexSpa,
                format!(
                    "site type {} with {} javascript complexity",
                    profile.site_type, profile.javascript_level
                ),
            );
        }

        if let Some(hint) = target_hint {
            if profile.site_type != SiteType::Static {
                return (
                    StrategyKind::AiAnalysisNeeded,
                    format!(
                        "target content '{}' requested on a {} site",
                        hint, profile.site_type
                    ),
                );
            }
        }

        (
            StrategyKind::SimpleStatic,
            format!("{} site without special requirements", profile.site_type),
        )
    }

    /// 请求的显式指定引擎是否会被采用（存在且未被禁用）
    pub fn honours_override(&self, request: &CrawlRequest) -> bool {
        request
            .engine_override()
            .is_some_and(|engine| !self.disabled.contains(&engine))
    }

    /// 为请求选择有序引擎列表
    pub fn select(&self, request: &CrawlRequest, profile: Option<&SiteProfile>) -> EngineSelection {
        if let Some(engine) = request.engine_override() {
            if self.honours_override(request) {
                debug!("Using explicit engine override {}", engine);
                return EngineSelection {
                    strategy: None,
                    engines: vec![engine],
                    reason: format!("engine override: {}", engine),
                };
            }
            warn!(
                "Engine override {} is disabled, falling back to strategy selection",
                engine
            );
        }

        let (strategy, reason) = self.classify(profile, request.target_content());
        let engines = match self.table.profile(strategy) {
            Some(profile) => profile.engine_order(),
            None => EngineKind::ALL.to_vec(),
        };

        debug!(
            "Selected strategy {} for {}: {:?} ({})",
            strategy,
            request.url_str(),
            engines,
            reason
        );

        EngineSelection {
            strategy: Some(strategy),
            engines,
            reason,
        }
    }
}
