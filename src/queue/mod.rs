// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 队列模块
///
/// 批量任务调度与进度事件分发
pub mod progress_bus;
pub mod scheduler;
