// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 领域模型模块
///
/// 该模块定义了系统的核心业务实体，包括：
/// - 抓取请求（crawl_request）：单个 URL 的不可变抓取请求
/// - 抓取结果（crawl_result）：带来源信息和尝试记录的最终结果
/// - 引擎（engine）：四种抓取引擎的标识
/// - 站点画像（site_profile）：渲染方式、JS 复杂度与反爬风险
/// - 策略（strategy）：站点类别到引擎顺序的静态映射
/// - 任务（job）：批量抓取任务及其状态机
/// - 进度（progress）：按任务发布的进度事件
pub mod crawl_request;
pub mod crawl_result;
pub mod engine;
pub mod job;
pub mod progress;
pub mod site_profile;
pub mod strategy;
