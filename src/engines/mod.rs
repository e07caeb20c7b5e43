// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

pub mod error_classifier;
pub mod hierarchy;
pub mod http_engine;
pub mod orchestrator;
pub mod premium_engine;
pub mod profiler;
pub mod registry;
pub mod selector;
pub mod traits;
pub mod validators;
