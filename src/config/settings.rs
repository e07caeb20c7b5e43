// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::domain::models::engine::EngineKind;
use crate::engines::error_classifier::{ErrorClassifier, DEFAULT_PERMANENT_PATTERNS};
use crate::engines::http_engine::DEFAULT_USER_AGENT;
use crate::engines::orchestrator::OrchestratorConfig;
use crate::queue::scheduler::SchedulerConfig;
use crate::utils::retry_policy::RetryPolicy;
use crate::utils::telemetry::DEFAULT_LOG_FILTER;
use config::builder::DefaultState;
use config::{Config, ConfigBuilder, ConfigError, Environment, File};
use serde::Deserialize;
use std::net::SocketAddr;
use std::time::Duration;

/// 环境变量前缀
pub const ENV_PREFIX: &str = "CRAWLPILOT";

/// 应用程序配置设置
///
/// 进程启动时加载一次，再转换为各组件的不可变配置值显式传入。
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    /// 降级编排配置
    pub orchestrator: OrchestratorSettings,
    /// 任务调度配置
    pub scheduler: SchedulerSettings,
    /// 站点分析配置
    pub profiler: ProfilerSettings,
    /// 进度事件配置
    pub progress: ProgressSettings,
    /// 引擎配置
    pub engines: EngineSettings,
    /// 日志与指标配置
    pub telemetry: TelemetrySettings,
}

/// 降级编排配置设置
#[derive(Debug, Clone, Deserialize)]
pub struct OrchestratorSettings {
    /// 质量门槛 (0-100)
    pub quality_threshold: u8,
    /// 每个请求最多退避次数
    pub max_retries: u32,
    /// 首次退避时间（毫秒）
    pub backoff_base_ms: u64,
    /// 退避上限（毫秒）
    pub backoff_max_ms: u64,
    /// 单次引擎尝试超时（秒）
    pub default_timeout_secs: u64,
    /// 永久性错误关键字
    pub permanent_error_patterns: Vec<String>,
}

/// 任务调度配置设置
#[derive(Debug, Clone, Deserialize)]
pub struct SchedulerSettings {
    pub default_concurrency: usize,
    pub hard_cap: usize,
}

/// 站点分析配置设置
#[derive(Debug, Clone, Deserialize)]
pub struct ProfilerSettings {
    pub enabled: bool,
    /// 分析时间预算（毫秒）
    pub budget_ms: u64,
    /// 采样字节数
    pub sample_bytes: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProgressSettings {
    /// 每个订阅者的队列容量
    pub subscriber_capacity: usize,
}

/// 引擎配置设置
#[derive(Debug, Clone, Deserialize)]
pub struct EngineSettings {
    /// 禁用的引擎名称
    pub disabled: Vec<String>,
    pub user_agent: String,
    /// 高级抓取 API 地址；未配置时不注册该引擎
    #[serde(default)]
    pub premium_api_url: Option<String>,
    #[serde(default)]
    pub premium_api_key: Option<String>,
}

/// 日志与指标配置设置
#[derive(Debug, Clone, Deserialize)]
pub struct TelemetrySettings {
    pub log_filter: String,
    pub json_logs: bool,
    /// Prometheus 导出地址，例如 `0.0.0.0:9000`
    #[serde(default)]
    pub metrics_addr: Option<String>,
}

impl Settings {
    /// 创建新的配置实例
    ///
    /// 依次叠加：内置默认值 → `config/default` → `config/{APP_ENVIRONMENT}` →
    /// `CRAWLPILOT__*` 环境变量
    ///
    /// # Returns
    ///
    /// * `Ok(Settings)` - 成功加载的配置
    /// * `Err(ConfigError)` - 配置加载失败
    pub fn new() -> Result<Self, ConfigError> {
        let env = std::env::var("APP_ENVIRONMENT").unwrap_or_else(|_| "default".to_string());
        let builder = Self::defaults()?
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{}", env)).required(false))
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("engines.disabled")
                    .with_list_parse_key("orchestrator.permanent_error_patterns")
                    .try_parsing(true),
            );

        builder.build()?.try_deserialize()
    }

    /// 仅使用内置默认值和给定覆盖项，不读取文件与环境变量
    pub fn with_overrides(overrides: &[(&str, &str)]) -> Result<Self, ConfigError> {
        let mut builder = Self::defaults()?;
        for (key, value) in overrides {
            builder = builder.set_override(*key, *value)?;
        }
        builder.build()?.try_deserialize()
    }

    fn defaults() -> Result<ConfigBuilder<DefaultState>, ConfigError> {
        let patterns: Vec<String> = DEFAULT_PERMANENT_PATTERNS
            .iter()
            .map(|p| p.to_string())
            .collect();

        Config::builder()
            // Orchestrator
            .set_default("orchestrator.quality_threshold", 60)?
            .set_default("orchestrator.max_retries", 3)?
            .set_default("orchestrator.backoff_base_ms", 1000)?
            .set_default("orchestrator.backoff_max_ms", 30_000)?
            .set_default("orchestrator.default_timeout_secs", 30)?
            .set_default("orchestrator.permanent_error_patterns", patterns)?
            // Scheduler
            .set_default("scheduler.default_concurrency", 5)?
            .set_default("scheduler.hard_cap", 10)?
            // Profiler
            .set_default("profiler.enabled", true)?
            .set_default("profiler.budget_ms", 5000)?
            .set_default("profiler.sample_bytes", 50_000)?
            // Progress
            .set_default("progress.subscriber_capacity", 64)?
            // Engines
            .set_default("engines.disabled", Vec::<String>::new())?
            .set_default("engines.user_agent", DEFAULT_USER_AGENT)?
            // Telemetry
            .set_default("telemetry.log_filter", DEFAULT_LOG_FILTER)?
            .set_default("telemetry.json_logs", false)
    }

    /// 编排器配置
    pub fn orchestrator_config(&self) -> OrchestratorConfig {
        let o = &self.orchestrator;
        OrchestratorConfig {
            quality_threshold: o.quality_threshold.min(100),
            retry_policy: RetryPolicy::new(
                o.max_retries,
                Duration::from_millis(o.backoff_base_ms),
                Duration::from_millis(o.backoff_max_ms),
            ),
            classifier: ErrorClassifier::new(o.permanent_error_patterns.iter()),
        }
    }

    /// 调度器配置
    pub fn scheduler_config(&self) -> SchedulerConfig {
        SchedulerConfig {
            default_concurrency: self.scheduler.default_concurrency,
            hard_cap: self.scheduler.hard_cap.max(1),
            request_timeout: self.default_timeout(),
        }
    }

    /// 单次引擎尝试超时
    pub fn default_timeout(&self) -> Duration {
        Duration::from_secs(self.orchestrator.default_timeout_secs.max(1))
    }

    pub fn profile_budget(&self) -> Duration {
        Duration::from_millis(self.profiler.budget_ms)
    }

    /// 解析禁用的引擎名称；未知名称视为配置错误
    pub fn disabled_engines(&self) -> Result<Vec<EngineKind>, ConfigError> {
        self.engines
            .disabled
            .iter()
            .filter(|name| !name.trim().is_empty())
            .map(|name| {
                name.parse::<EngineKind>()
                    .map_err(|e| ConfigError::Message(e.to_string()))
            })
            .collect()
    }

    /// 解析指标导出地址
    pub fn metrics_addr(&self) -> Result<Option<SocketAddr>, ConfigError> {
        self.telemetry
            .metrics_addr
            .as_deref()
            .filter(|addr| !addr.trim().is_empty())
            .map(|addr| {
                addr.parse::<SocketAddr>().map_err(|e| {
                    ConfigError::Message(format!("invalid metrics address '{}': {}", addr, e))
                })
            })
            .transpose()
    }
}
