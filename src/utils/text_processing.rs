// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

//! 抓取文本清洗模块
//!
//! 提供抓取结果的文本清洗，并统计清洗前后的噪声数量：
//! - 转义字符还原
//! - javascript/锚点/mailto 链接展开为纯文本
//! - 分隔线与 UI 噪声词移除
//! - 空白压缩
//!
//! 统计结果由质量评分器使用。

use once_cell::sync::Lazy;
use regex::Regex;

/// Markdown 噪声：连续两个以上的 `#`、`*`、`-`
static MARKDOWN_NOISE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[#\*\-]{2,}").unwrap());

/// UI 噪声：下划线包裹的控件文本与图标/按钮标记
static UI_NOISE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"_[^_\n]*_|아이콘|버튼|(?i:\b(?:icon|button)\b)").unwrap()
});

static ESCAPED_PAREN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\\([()])").unwrap());

static NON_CONTENT_LINK: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\[([^\]]+)\]\((?:javascript:|#|mailto:)[^()]*(?:\([^)]*\)[^()]*)*\)").unwrap()
});

static LONG_LINK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\[([^\]]+)\]\((https?://[^/)\s]+)/[^)\s]*\)").unwrap());

static UI_CONTROL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)_[^_\n]*(?:아이콘|버튼|링크|icon|button|link)_|아이콘|버튼|\b(?:icon|button)\b")
        .unwrap()
});

static UI_TRAILER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?im)\s*(?:바로가기|더보기|새창열림|펼치기|skip to (?:main )?content|read more)\s*$")
        .unwrap()
});

static UNDERSCORE_EMPHASIS: Lazy<Regex> = Lazy::new(|| Regex::new(r"_([^_\n]+)_").unwrap());

static BOLD: Lazy<Regex> = Lazy::new(|| Regex::new(r"\*\*([^*\n]+)\*\*").unwrap());

static DEEP_HEADING: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?m)^#{4,}").unwrap());

static SEPARATOR_LINE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^\s*(?:[\*\-_]\s*){3,}$").unwrap());

static STAR_BULLET: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?m)^(\s*)\*\s+").unwrap());

static MULTI_SPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[ \t]{2,}").unwrap());

static MULTI_NEWLINE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n{3,}").unwrap());

/// 清洗结果及噪声统计
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CleanedText {
    pub text: String,
    /// 原始文本字符数
    pub raw_length: usize,
    /// 清洗后字符数
    pub cleaned_length: usize,
    pub markdown_noise_before: usize,
    pub markdown_noise_after: usize,
    pub ui_noise_before: usize,
    pub ui_noise_after: usize,
}

impl CleanedText {
    /// 未清洗的文本：长度不变，噪声计数前后相同
    pub fn untouched(raw: &str) -> Self {
        let markdown = count_markdown_noise(raw);
        let ui = count_ui_noise(raw);
        let length = raw.chars().count();
        Self {
            text: raw.to_string(),
            raw_length: length,
            cleaned_length: length,
            markdown_noise_before: markdown,
            markdown_noise_after: markdown,
            ui_noise_before: ui,
            ui_noise_after: ui,
        }
    }

    /// Markdown 噪声移除比例；未检测到噪声时为 1.0
    pub fn markdown_reduction(&self) -> f64 {
        reduction(self.markdown_noise_before, self.markdown_noise_after)
    }

    /// UI 噪声移除比例；未检测到噪声时为 1.0
    pub fn ui_reduction(&self) -> f64 {
        reduction(self.ui_noise_before, self.ui_noise_after)
    }
}

fn reduction(before: usize, after: usize) -> f64 {
    if before == 0 {
        return 1.0;
    }
    (before.saturating_sub(after) as f64 / before as f64).clamp(0.0, 1.0)
}

pub fn count_markdown_noise(text: &str) -> usize {
    MARKDOWN_NOISE.find_iter(text).count()
}

pub fn count_ui_noise(text: &str) -> usize {
    UI_NOISE.find_iter(text).count()
}

/// 清洗抓取到的文本
pub fn clean_text(raw: &str) -> CleanedText {
    let mut cleaned = raw
        .replace("\\n", "\n")
        .replace("\\t", "\t")
        .replace("\\\"", "\"")
        .replace("\\'", "'");
    cleaned = ESCAPED_PAREN.replace_all(&cleaned, "$1").into_owned();

    cleaned = NON_CONTENT_LINK.replace_all(&cleaned, "$1").into_owned();
    cleaned = LONG_LINK.replace_all(&cleaned, "$1 ($2)").into_owned();

    cleaned = UI_CONTROL.replace_all(&cleaned, "").into_owned();
    cleaned = UI_TRAILER.replace_all(&cleaned, "").into_owned();
    cleaned = UNDERSCORE_EMPHASIS.replace_all(&cleaned, "$1").into_owned();

    cleaned = BOLD.replace_all(&cleaned, "$1").into_owned();
    cleaned = DEEP_HEADING.replace_all(&cleaned, "###").into_owned();
    cleaned = SEPARATOR_LINE.replace_all(&cleaned, "").into_owned();
    cleaned = STAR_BULLET.replace_all(&cleaned, "$1- ").into_owned();

    cleaned = MULTI_SPACE.replace_all(&cleaned, " ").into_owned();

    let lines: Vec<&str> = cleaned
        .lines()
        .map(str::trim)
        .filter(|line| !(line.chars().count() == 1 && "#*-_".contains(*line)))
        .collect();
    let joined = lines.join("\n");
    let text = MULTI_NEWLINE
        .replace_all(joined.trim(), "\n\n")
        .into_owned();

    CleanedText {
        raw_length: raw.chars().count(),
        cleaned_length: text.chars().count(),
        markdown_noise_before: count_markdown_noise(raw),
        markdown_noise_after: count_markdown_noise(&text),
        ui_noise_before: count_ui_noise(raw),
        ui_noise_after: count_ui_noise(&text),
        text,
    }
}
