// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{json, Map, Value};

/// 页面没有标题时使用的顶层名称
pub const DEFAULT_ROOT: &str = "web page";
/// 不属于任何上级标题的条目
const ORPHAN_KEY: &str = "other";
/// 导航菜单条目
const NAVIGATION_KEY: &str = "navigation";
/// 导航条目上限
const MAX_NAVIGATION_ITEMS: usize = 10;

static MARKDOWN_HEADING: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(#{1,4})\s+(.+?)\s*#*\s*$").unwrap());

/// 标题层级构建器
///
/// 输出形如 `{"depth1": 标题, "depth2": {h1: [h2...]}, "depth3": {h2: [h3...]}}`。
#[derive(Debug, Clone)]
pub struct HierarchyBuilder {
    root: String,
    depth2: Map<String, Value>,
    depth3: Map<String, Value>,
    current_h1: Option<String>,
    current_h2: Option<String>,
}

impl HierarchyBuilder {
    pub fn new(title: &str) -> Self {
        let title = title.trim();
        Self {
            root: if title.is_empty() {
                DEFAULT_ROOT.to_string()
            } else {
                title.to_string()
            },
            depth2: Map::new(),
            depth3: Map::new(),
            current_h1: None,
            current_h2: None,
        }
    }

    /// 标题名称（可能被第一个 h1 覆盖）
    pub fn root(&self) -> &str {
        &self.root
    }

    /// 追加一个标题，`level` 为 1-4，4 级按 3 级处理
    pub fn push_heading(&mut self, level: u8, text: &str) {
        let text = text.trim();
        if text.is_empty() {
            return;
        }
        match level {
            1 => {
                self.depth2
                    .entry(text.to_string())
                    .or_insert_with(|| Value::Array(Vec::new()));
                self.current_h1 = Some(text.to_string());
                self.current_h2 = None;
            }
            2 => {
                let parent = self
                    .current_h1
                    .clone()
                    .unwrap_or_else(|| ORPHAN_KEY.to_string());
                push_item(&mut self.depth2, parent, text);
                self.current_h2 = Some(text.to_string());
            }
            3 | 4 => {
                let parent = self
                    .current_h2
                    .clone()
                    .or_else(|| self.current_h1.clone())
                    .unwrap_or_else(|| ORPHAN_KEY.to_string());
                push_item(&mut self.depth3, parent, text);
            }
            _ => {}
        }
    }

    /// 记录导航菜单条目
    pub fn navigation(&mut self, items: Vec<String>) {
        let items: Vec<Value> = items
            .into_iter()
            .map(|item| item.trim().to_string())
            .filter(|item| !item.is_empty())
            .take(MAX_NAVIGATION_ITEMS)
            .map(Value::String)
            .collect();
        if !items.is_empty() {
            self.depth2
                .insert(NAVIGATION_KEY.to_string(), Value::Array(items));
        }
    }

    pub fn build(self) -> Value {
        json!({
            "depth1": self.root,
            "depth2": Value::Object(self.depth2),
            "depth3": Value::Object(self.depth3),
        })
    }
}

fn push_item(map: &mut Map<String, Value>, key: String, item: &str) {
    let entry = map.entry(key).or_insert_with(|| Value::Array(Vec::new()));
    if let Value::Array(items) = entry {
        items.push(Value::String(item.to_string()));
    }
}

/// 从 Markdown 标题构建层级；第一个 h1 作为顶层名称
pub fn hierarchy_from_markdown(markdown: &str, fallback_title: &str) -> Value {
    let mut builder = HierarchyBuilder::new(fallback_title);
    let mut root_taken = !fallback_title.trim().is_empty();

    for line in markdown.lines() {
        let Some(captures) = MARKDOWN_HEADING.captures(line.trim()) else {
            continue;
        };
        let level = captures[1].len() as u8;
        let text = captures[2].trim();
        if level == 1 && !root_taken {
            builder.root = text.to_string();
            root_taken = true;
        }
        builder.push_heading(level, text);
    }
    builder.build()
}

/// Markdown 中第一个 h1 标题
pub fn markdown_title(markdown: &str) -> Option<String> {
    markdown.lines().find_map(|line| {
        MARKDOWN_HEADING
            .captures(line.trim())
            .filter(|c| c[1].len() == 1)
            .map(|c| c[2].trim().to_string())
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_headings_nest_under_nearest_parent() {
        let mut builder = HierarchyBuilder::new("Docs");
        builder.push_heading(2, "Preface");
        builder.push_heading(1, "Guide");
        builder.push_heading(2, "Install");
        builder.push_heading(3, "Linux");
        builder.push_heading(4, "Debian");
        let value = builder.build();

        assert_eq!(value["depth1"], "Docs");
        assert_eq!(value["depth2"]["other"], json!(["Preface"]));
        assert_eq!(value["depth2"]["Guide"], json!(["Install"]));
        assert_eq!(value["depth3"]["Install"], json!(["Linux", "Debian"]));
    }

    #[test]
    fn test_markdown_hierarchy_uses_first_h1_as_root() {
        let markdown = "intro\n# Product\n## Price\n### Discounts ###\n";
        let value = hierarchy_from_markdown(markdown, "");

        assert_eq!(value["depth1"], "Product");
        assert_eq!(value["depth2"]["Product"], json!(["Price"]));
        assert_eq!(value["depth3"]["Price"], json!(["Discounts"]));
        assert_eq!(markdown_title(markdown).as_deref(), Some("Product"));
    }

    #[test]
    fn test_empty_title_uses_default_root() {
        let value = HierarchyBuilder::new("  ").build();
        assert_eq!(value["depth1"], DEFAULT_ROOT);
    }

    #[test]
    fn test_navigation_is_capped() {
        let mut builder = HierarchyBuilder::new("Site");
        builder.navigation((0..20).map(|i| format!("item {}", i)).collect());
        let value = builder.build();
        assert_eq!(value["depth2"]["navigation"].as_array().unwrap().len(), 10);
    }
}
