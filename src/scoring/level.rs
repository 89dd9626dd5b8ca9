use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const MAX_SCORE_PER_QUESTION: u32 = 5;
pub const HIGH_THRESHOLD: u32 = 60;
pub const LOW_THRESHOLD: u32 = 40;
// Used when a dimension has no entry in the count map
pub const FALLBACK_QUESTION_COUNT: u32 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    High,
    Medium,
    Low,
}

impl Level {
    pub fn as_str(&self) -> &'static str {
        match self {
            Level::High => "high",
            Level::Medium => "medium",
            Level::Low => "low",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Level::High => "High",
            Level::Medium => "Medium",
            Level::Low => "Low",
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("high threshold {0} is above 100")]
    HighAbove100(u32),
    #[error("low threshold {low} must be below high threshold {high}")]
    ThresholdsOverlap { low: u32, high: u32 },
    #[error("max score per question must be positive")]
    ZeroMaxScore,
}

/// Thresholds and per-question limits shared by the classifier and matcher.
///
/// Thresholds are whole percentages. Every field has a default so a partial
/// JSON override only needs the values it changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ScoringConfig {
    pub high_threshold: u32,
    pub low_threshold: u32,
    pub max_score_per_question: u32,
    pub fallback_question_count: u32,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            high_threshold: HIGH_THRESHOLD,
            low_threshold: LOW_THRESHOLD,
            max_score_per_question: MAX_SCORE_PER_QUESTION,
            fallback_question_count: FALLBACK_QUESTION_COUNT,
        }
    }
}

impl ScoringConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.high_threshold > 100 {
            return Err(ConfigError::HighAbove100(self.high_threshold));
        }
        if self.low_threshold >= self.high_threshold {
            return Err(ConfigError::ThresholdsOverlap {
                low: self.low_threshold,
                high: self.high_threshold,
            });
        }
        if self.max_score_per_question == 0 {
            return Err(ConfigError::ZeroMaxScore);
        }
        Ok(())
    }

    pub fn max_score(&self, question_count: u32) -> u32 {
        question_count.saturating_mul(self.max_score_per_question)
    }

    /// Classify `score` as a share of `max_score`.
    ///
    /// `high` wins over `low` when both thresholds are met. Comparison is done
    /// on integer cross-products so exactly 60% and exactly 40% land on the
    /// threshold side. A zero `max_score` has no percentage and yields
    /// `Medium` for every score, including a positive one that a plain
    /// division would push to infinity and `High`.
    pub fn classify(&self, score: u32, max_score: u32) -> Level {
        if max_score == 0 {
            return Level::Medium;
        }

        let scaled = u64::from(score) * 100;
        let max = u64::from(max_score);

        if scaled >= u64::from(self.high_threshold) * max {
            Level::High
        } else if scaled <= u64::from(self.low_threshold) * max {
            Level::Low
        } else {
            Level::Medium
        }
    }
}

pub fn percentage(score: u32, max_score: u32) -> f64 {
    if max_score == 0 {
        0.0
    } else {
        (score as f64 / max_score as f64) * 100.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    mod classify_tests {
        use super::*;

        fn classify(score: u32, max_score: u32) -> Level {
            ScoringConfig::default().classify(score, max_score)
        }

        #[test]
        fn exactly_sixty_percent_is_high() {
            assert_eq!(classify(30, 50), Level::High);
            assert_eq!(classify(9, 15), Level::High);
        }

        #[test]
        fn exactly_forty_percent_is_low() {
            assert_eq!(classify(20, 50), Level::Low);
            assert_eq!(classify(6, 15), Level::Low);
        }

        #[test]
        fn fifty_percent_is_medium() {
            assert_eq!(classify(25, 50), Level::Medium);
        }

        #[test]
        fn just_inside_medium_band() {
            // 41% and 59%
            assert_eq!(classify(41, 100), Level::Medium);
            assert_eq!(classify(59, 100), Level::Medium);
        }

        #[test]
        fn zero_score_is_low() {
            assert_eq!(classify(0, 5), Level::Low);
            assert_eq!(classify(0, 50), Level::Low);
        }

        #[test]
        fn full_score_is_high() {
            assert_eq!(classify(15, 15), Level::High);
        }

        #[test]
        fn above_max_is_high() {
            assert_eq!(classify(40, 15), Level::High);
        }

        #[test]
        fn zero_max_score_falls_back_to_medium() {
            assert_eq!(classify(0, 0), Level::Medium);
            assert_eq!(classify(7, 0), Level::Medium);
        }

        #[test]
        fn custom_thresholds() {
            let config = ScoringConfig {
                high_threshold: 80,
                low_threshold: 20,
                ..ScoringConfig::default()
            };
            assert_eq!(config.classify(12, 15), Level::High);
            assert_eq!(config.classify(11, 15), Level::Medium);
            assert_eq!(config.classify(3, 15), Level::Low);
        }

        #[test]
        fn large_values_do_not_overflow() {
            assert_eq!(classify(u32::MAX, u32::MAX), Level::High);
        }
    }

    mod config_tests {
        use super::*;

        #[test]
        fn default_values() {
            let config = ScoringConfig::default();
            assert_eq!(config.high_threshold, 60);
            assert_eq!(config.low_threshold, 40);
            assert_eq!(config.max_score_per_question, 5);
            assert_eq!(config.fallback_question_count, 5);
            assert!(config.validate().is_ok());
        }

        #[test]
        fn max_score_multiplies_count() {
            let config = ScoringConfig::default();
            assert_eq!(config.max_score(3), 15);
            assert_eq!(config.max_score(0), 0);
        }

        #[test]
        fn partial_json_uses_defaults() {
            let config: ScoringConfig = serde_json::from_str(r#"{"highThreshold": 70}"#).unwrap();
            assert_eq!(config.high_threshold, 70);
            assert_eq!(config.low_threshold, 40);
        }

        #[test]
        fn overlapping_thresholds_rejected() {
            let config = ScoringConfig {
                high_threshold: 50,
                low_threshold: 50,
                ..ScoringConfig::default()
            };
            assert_eq!(
                config.validate(),
                Err(ConfigError::ThresholdsOverlap { low: 50, high: 50 })
            );
        }

        #[test]
        fn high_above_100_rejected() {
            let config = ScoringConfig {
                high_threshold: 120,
                ..ScoringConfig::default()
            };
            assert_eq!(config.validate(), Err(ConfigError::HighAbove100(120)));
        }

        #[test]
        fn zero_max_score_rejected() {
            let config = ScoringConfig {
                max_score_per_question: 0,
                ..ScoringConfig::default()
            };
            assert_eq!(config.validate(), Err(ConfigError::ZeroMaxScore));
        }
    }

    mod level_tests {
        use super::*;

        #[test]
        fn as_str_returns_correct_values() {
            assert_eq!(Level::High.as_str(), "high");
            assert_eq!(Level::Medium.as_str(), "medium");
            assert_eq!(Level::Low.as_str(), "low");
        }

        #[test]
        fn serializes_lowercase() {
            assert_eq!(serde_json::to_string(&Level::High).unwrap(), "\"high\"");
            let level: Level = serde_json::from_str("\"low\"").unwrap();
            assert_eq!(level, Level::Low);
        }
    }

    #[test]
    fn percentage_handles_zero_max() {
        assert_eq!(percentage(3, 0), 0.0);
        assert_eq!(percentage(12, 15), 80.0);
    }
}
