// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 配置模块
///
/// 处理应用程序的配置设置和环境变量
pub mod config;

/// 领域模块
///
/// 包含请求、结果、任务等核心实体以及质量评分服务
pub mod domain;

/// 引擎模块
///
/// 引擎适配器、站点分析、引擎选择与降级编排
pub mod engines;

/// 基础设施模块
///
/// 指标导出
pub mod infrastructure;

/// 队列模块
///
/// 实现批量任务调度与进度事件分发
pub mod queue;

/// 工具模块
///
/// 提供通用的工具函数和辅助功能
pub mod utils;

/// 工作器模块
///
/// 单个 URL 的处理流水线
pub mod workers;

pub use domain::models::crawl_request::CrawlRequest;
pub use domain::models::crawl_result::{CrawlMetadata, CrawlResult, CrawlStatus};
pub use domain::models::engine::EngineKind;
pub use domain::models::job::{Job, JobReport, JobStatus, JobSummary};
pub use domain::models::progress::ProgressEvent;
pub use engines::orchestrator::{FallbackOrchestrator, OrchestratorConfig};
pub use engines::registry::EngineSet;
pub use engines::selector::{EngineSelector, StrategyTable};
pub use engines::traits::{EngineAdapter, EngineError, EngineOutput};
pub use queue::progress_bus::ProgressBus;
pub use queue::scheduler::{JobScheduler, SchedulerConfig};
pub use workers::url_worker::CrawlPipeline;
