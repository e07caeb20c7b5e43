// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 工作器模块
///
/// 单个 URL 的处理流水线
pub mod url_worker;

pub use url_worker::CrawlPipeline;
