use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

use super::aggregate::ScoreMap;
use super::level::{Level, ScoringConfig};

pub type DimensionCounts = BTreeMap<String, u32>;
pub type LevelMap = BTreeMap<String, Level>;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ScoringError {
    #[error("test has no result labels to match against")]
    NoResultLabels,
}

/// A candidate outcome. `condition` lists the levels it requires; an empty
/// condition can only ever win through the fallback path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultLabel {
    pub name: String,
    #[serde(default)]
    pub condition: BTreeMap<String, Level>,
    #[serde(default)]
    pub is_default: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub emoji: Option<String>,
    #[serde(default, alias = "desc", skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl ResultLabel {
    pub fn agreements(&self, levels: &LevelMap) -> usize {
        self.condition
            .iter()
            .filter(|(dim, level)| levels.get(dim.as_str()) == Some(*level))
            .count()
    }

    pub fn is_exact(&self, levels: &LevelMap) -> bool {
        !self.condition.is_empty() && self.agreements(levels) == self.condition.len()
    }
}

/// Which phase produced a match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchKind {
    Exact,
    Partial,
    Fallback,
}

impl MatchKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MatchKind::Exact => "exact",
            MatchKind::Partial => "partial",
            MatchKind::Fallback => "fallback",
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Selection<'l> {
    pub label: &'l ResultLabel,
    pub kind: MatchKind,
    pub agreements: usize,
}

pub struct Matcher<'c> {
    config: &'c ScoringConfig,
}

impl<'c> Matcher<'c> {
    pub fn new(config: &'c ScoringConfig) -> Self {
        Self { config }
    }

    /// Classify every dimension of the session. Dimensions absent from
    /// `counts` use the configured fallback question count; missing scores
    /// count as zero.
    pub fn levels<'d, I>(
        &self,
        scores: &ScoreMap,
        dimensions: I,
        counts: &DimensionCounts,
    ) -> LevelMap
    where
        I: IntoIterator<Item = &'d str>,
    {
        let mut levels = LevelMap::new();

        for dim in dimensions {
            let question_count = counts
                .get(dim)
                .copied()
                .unwrap_or(self.config.fallback_question_count);
            let max_score = self.config.max_score(question_count);
            if max_score == 0 {
                tracing::warn!(
                    dimension = dim,
                    "dimension has no questions, classifying as medium"
                );
            }

            let level = self.config.classify(scores.get(dim), max_score);
            tracing::trace!(
                dimension = dim,
                score = scores.get(dim),
                max_score,
                level = level.as_str()
            );
            levels.insert(dim.to_string(), level);
        }

        levels
    }

    /// Pick the best label for `levels`.
    ///
    /// Exact matches win first, the most specific condition taking priority
    /// and list order breaking ties. Otherwise the label agreeing on the most
    /// condition keys wins, earlier labels keeping ties, seeded with the
    /// default label (the one flagged `isDefault`, else the last).
    pub fn select<'l>(
        &self,
        levels: &LevelMap,
        labels: &'l [ResultLabel],
    ) -> Result<Selection<'l>, ScoringError> {
        let fallback = default_label(labels).ok_or(ScoringError::NoResultLabels)?;

        let mut exact: Option<&ResultLabel> = None;
        for label in labels.iter().filter(|l| l.is_exact(levels)) {
            if exact.map_or(true, |best| label.condition.len() > best.condition.len()) {
                exact = Some(label);
            }
        }

        if let Some(label) = exact {
            tracing::debug!(label = %label.name, keys = label.condition.len(), "exact match");
            return Ok(Selection {
                label,
                kind: MatchKind::Exact,
                agreements: label.condition.len(),
            });
        }

        let mut best = fallback;
        let mut best_count = 0;
        for label in labels {
            let count = label.agreements(levels);
            if count > best_count {
                best = label;
                best_count = count;
            }
        }

        let kind = if best_count == 0 {
            MatchKind::Fallback
        } else {
            MatchKind::Partial
        };
        tracing::debug!(
            label = %best.name,
            agreements = best_count,
            kind = kind.as_str(),
            "no exact match"
        );

        Ok(Selection {
            label: best,
            kind,
            agreements: best_count,
        })
    }

}

pub fn default_label(labels: &[ResultLabel]) -> Option<&ResultLabel> {
    labels.iter().find(|l| l.is_default).or_else(|| labels.last())
}

#[cfg(test)]
impl ResultLabel {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            condition: BTreeMap::new(),
            is_default: false,
            emoji: None,
            description: None,
        }
    }

    pub fn with_condition(mut self, dimension: &str, level: Level) -> Self {
        self.condition.insert(dimension.to_string(), level);
        self
    }

    pub fn as_default(mut self) -> Self {
        self.is_default = true;
        self
    }
}
