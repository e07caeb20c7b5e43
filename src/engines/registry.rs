// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::domain::models::engine::EngineKind;
use crate::engines::traits::EngineAdapter;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::{debug, warn};

/// 引擎集合
///
/// 每种引擎最多注册一个适配器；被禁用的引擎不会注册。
#[derive(Clone, Default)]
pub struct EngineSet {
    adapters: HashMap<EngineKind, Arc<dyn EngineAdapter>>,
    disabled: HashSet<EngineKind>,
}

impl EngineSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// 以禁用列表创建
    pub fn with_disabled(disabled: impl IntoIterator<Item = EngineKind>) -> Self {
        Self {
            adapters: HashMap::new(),
            disabled: disabled.into_iter().collect(),
        }
    }

    /// 注册适配器，返回被替换的旧适配器
    pub fn register(&mut self, adapter: Arc<dyn EngineAdapter>) -> Option<Arc<dyn EngineAdapter>> {
        let kind = adapter.kind();
        if self.disabled.contains(&kind) {
            warn!("Engine {} is disabled, skipping registration", kind);
            return None;
        }
        debug!("Registering engine {}", kind);
        self.adapters.insert(kind, adapter)
    }

    /// 链式注册
    pub fn with(mut self, adapter: Arc<dyn EngineAdapter>) -> Self {
        self.register(adapter);
        self
    }

    pub fn get(&self, kind: EngineKind) -> Option<Arc<dyn EngineAdapter>> {
        self.adapters.get(&kind).cloned()
    }

    pub fn is_disabled(&self, kind: EngineKind) -> bool {
        self.disabled.contains(&kind)
    }

    pub fn is_available(&self, kind: EngineKind) -> bool {
        self.adapters.contains_key(&kind)
    }

    /// 已注册的引擎，按固定顺序返回
    pub fn available(&self) -> Vec<EngineKind> {
        EngineKind::ALL
            .into_iter()
            .filter(|kind| self.adapters.contains_key(kind))
            .collect()
    }

    pub fn disabled(&self) -> Vec<EngineKind> {
        EngineKind::ALL
            .into_iter()
            .filter(|kind| self.disabled.contains(kind))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.adapters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.adapters.is_empty()
    }
}

impl std::fmt::Debug for EngineSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EngineSet")
            .field("available", &self.available())
            .field("disabled", &self.disabled())
            .finish()
    }
}
