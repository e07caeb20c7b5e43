// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 领域服务模块
///
/// 包含的服务：
/// - 质量评分（quality_scorer）：根据清洗前后的文本计算 0-100 质量分数
pub mod quality_scorer;
