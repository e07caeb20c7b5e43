// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::utils::text_processing::CleanedText;

/// 长度保留权重
const LENGTH_WEIGHT: f64 = 0.4;
/// Markdown 噪声移除权重
const MARKDOWN_WEIGHT: f64 = 0.3;
/// UI 噪声移除权重
const UI_WEIGHT: f64 = 0.3;

/// 默认通过阈值
pub const DEFAULT_PASS_THRESHOLD: u8 = 60;

/// 质量评分输入
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QualityInput {
    pub raw_length: usize,
    pub cleaned_length: usize,
    /// 已移除的 Markdown 噪声比例 (0.0-1.0)
    pub markdown_reduction: f64,
    /// 已移除的 UI 噪声比例 (0.0-1.0)
    pub ui_reduction: f64,
}

impl From<&CleanedText> for QualityInput {
    fn from(cleaned: &CleanedText) -> Self {
        Self {
            raw_length: cleaned.raw_length,
            cleaned_length: cleaned.cleaned_length,
            markdown_reduction: cleaned.markdown_reduction(),
            ui_reduction: cleaned.ui_reduction(),
        }
    }
}

/// 质量评估
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QualityAssessment {
    /// 分数 (0-100)
    pub score: u8,
    /// 置信度 (0.0-1.0)
    pub confidence: f64,
    /// 是否达到阈值
    pub passed: bool,
}

/// 质量评分特质
///
/// 编排器通过该特质评分，测试中可替换为固定分数的实现。
pub trait ContentScorer: Send + Sync {
    fn assess(&self, input: &QualityInput) -> QualityAssessment;
}

/// 基于清洗统计的质量评分器
#[derive(Debug, Clone, Copy)]
pub struct QualityScorer {
    pass_threshold: u8,
}

impl Default for QualityScorer {
    fn default() -> Self {
        Self::new(DEFAULT_PASS_THRESHOLD)
    }
}

impl QualityScorer {
    pub fn new(pass_threshold: u8) -> Self {
        Self {
            pass_threshold: pass_threshold.min(100),
        }
    }

    pub fn pass_threshold(&self) -> u8 {
        self.pass_threshold
    }

    /// 计算 0-100 分数
    ///
    /// `100 × (0.4 × 长度比 + 0.3 × Markdown 移除比 + 0.3 × UI 移除比)`，
    /// 每一项先截断到 [0, 1]；原始长度为 0 时长度比为 0。
    pub fn score(&self, input: &QualityInput) -> u8 {
        let length_ratio = if input.raw_length == 0 {
            0.0
        } else {
            input.cleaned_length as f64 / input.raw_length as f64
        };

        let weighted = LENGTH_WEIGHT * clamp_unit(length_ratio)
            + MARKDOWN_WEIGHT * clamp_unit(input.markdown_reduction)
            + UI_WEIGHT * clamp_unit(input.ui_reduction);

        (weighted * 100.0).round().clamp(0.0, 100.0) as u8
    }

    pub fn passes(&self, score: u8) -> bool {
        score >= self.pass_threshold
    }
}

impl ContentScorer for QualityScorer {
    fn assess(&self, input: &QualityInput) -> QualityAssessment {
        // 原始文本为空时不存在任何内容
        if input.raw_length == 0 {
            return QualityAssessment {
                score: 0,
                confidence: 0.0,
                passed: false,
            };
        }
        let score = self.score(input);
        QualityAssessment {
            score,
            confidence: f64::from(score) / 100.0,
            passed: self.passes(score),
        }
    }
}

fn clamp_unit(value: f64) -> f64 {
    if value.is_nan() {
        return 0.0;
    }
    value.clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::text_processing::clean_text;

    fn input(raw: usize, cleaned: usize, md: f64, ui: f64) -> QualityInput {
        QualityInput {
            raw_length: raw,
            cleaned_length: cleaned,
            markdown_reduction: md,
            ui_reduction: ui,
        }
    }

    #[test]
    fn test_score_formula() {
        let scorer = QualityScorer::default();
        assert_eq!(scorer.score(&input(100, 100, 1.0, 1.0)), 100);
        assert_eq!(scorer.score(&input(100, 50, 1.0, 0.0)), 50);
        assert_eq!(scorer.score(&input(100, 100, 0.0, 0.0)), 40);
    }

    #[test]
    fn test_zero_raw_length_scores_zero_length_ratio() {
        let scorer = QualityScorer::default();
        assert_eq!(scorer.score(&input(0, 10, 0.0, 0.0)), 0);
        let assessment = scorer.assess(&input(0, 0, 1.0, 1.0));
        assert_eq!(assessment.score, 0);
        assert!(!assessment.passed);
    }

    #[test]
    fn test_inputs_are_clamped() {
        let scorer = QualityScorer::default();
        assert_eq!(scorer.score(&input(10, 50, 2.0, -1.0)), 70);
    }

    #[test]
    fn test_score_is_monotonic_in_cleaned_length() {
        let scorer = QualityScorer::default();
        let mut previous = 0;
        for cleaned in 0..=200 {
            let score = scorer.score(&input(200, cleaned, 0.5, 0.25));
            assert!(score >= previous, "score dropped at cleaned={}", cleaned);
            previous = score;
        }
    }

    #[test]
    fn test_threshold_is_inclusive() {
        let scorer = QualityScorer::new(60);
        assert!(scorer.passes(60));
        assert!(!scorer.passes(59));
    }

    #[test]
    fn test_clean_plain_text_passes_default_gate() {
        let cleaned = clean_text("A perfectly ordinary paragraph of article text.");
        let assessment = QualityScorer::default().assess(&QualityInput::from(&cleaned));
        assert!(assessment.passed);
        assert_eq!(assessment.score, 100);
        assert_eq!(assessment.confidence, 1.0);
    }
}
