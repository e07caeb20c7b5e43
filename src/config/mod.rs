// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 配置模块
///
/// 分层加载配置，并转换为编排器、调度器等组件的配置值
pub mod settings;
