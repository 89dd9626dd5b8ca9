use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One selected option: `score` counts toward `dimension`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Answer {
    pub dimension: String,
    pub score: u32,
}

impl Answer {
    pub fn new(dimension: impl Into<String>, score: u32) -> Self {
        Self {
            dimension: dimension.into(),
            score,
        }
    }
}

/// Per-dimension score sums for one test session.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ScoreMap(BTreeMap<String, u32>);

impl ScoreMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, dimension: &str, score: u32) {
        let total = self.0.entry(dimension.to_string()).or_insert(0);
        *total = total.saturating_add(score);
    }

    // Missing dimensions read as zero
    pub fn get(&self, dimension: &str) -> u32 {
        self.0.get(dimension).copied().unwrap_or(0)
    }
}

impl Extend<Answer> for ScoreMap {
    fn extend<I: IntoIterator<Item = Answer>>(&mut self, iter: I) {
        for answer in iter {
            self.record(&answer.dimension, answer.score);
        }
    }
}

impl FromIterator<Answer> for ScoreMap {
    fn from_iter<I: IntoIterator<Item = Answer>>(iter: I) -> Self {
        let mut scores = ScoreMap::new();
        scores.extend(iter);
        scores
    }
}

impl<K: Into<String>> FromIterator<(K, u32)> for ScoreMap {
    fn from_iter<I: IntoIterator<Item = (K, u32)>>(iter: I) -> Self {
        iter.into_iter()
            .map(|(dimension, score)| Answer::new(dimension, score))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::seq::SliceRandom;

    fn answers() -> Vec<Answer> {
        vec![
            Answer::new("curious", 5),
            Answer::new("alert", 1),
            Answer::new("curious", 4),
            Answer::new("alert", 2),
            Answer::new("curious", 3),
            Answer::new("calm", 5),
        ]
    }

    #[test]
    fn sums_per_dimension() {
        let scores: ScoreMap = answers().into_iter().collect();
        assert_eq!(scores.get("curious"), 12);
        assert_eq!(scores.get("alert"), 3);
        assert_eq!(scores.get("calm"), 5);
    }

    #[test]
    fn missing_dimension_reads_zero() {
        let scores = ScoreMap::new();
        assert_eq!(scores.get("curious"), 0);
        assert_eq!(scores, ScoreMap::default());
    }

    #[test]
    fn order_does_not_change_totals() {
        let expected: ScoreMap = answers().into_iter().collect();

        let mut rng = rand::thread_rng();
        for _ in 0..20 {
            let mut shuffled = answers();
            shuffled.shuffle(&mut rng);
            let scores: ScoreMap = shuffled.into_iter().collect();
            assert_eq!(scores, expected);
        }

        let reversed: ScoreMap = answers().into_iter().rev().collect();
        assert_eq!(reversed, expected);
    }

    #[test]
    fn scores_are_not_range_checked() {
        let mut scores = ScoreMap::new();
        scores.record("alert", 0);
        scores.record("alert", 42);
        assert_eq!(scores.get("alert"), 42);
    }

    #[test]
    fn extend_adds_to_existing_totals() {
        let mut scores: ScoreMap = [("alert", 2u32)].into_iter().collect();
        scores.extend(vec![Answer::new("alert", 3)]);
        assert_eq!(scores.get("alert"), 5);
    }

    #[test]
    fn serializes_as_plain_map() {
        let scores: ScoreMap = [("alert", 3u32), ("curious", 12)].into_iter().collect();
        let json = serde_json::to_string(&scores).unwrap();
        assert_eq!(json, r#"{"alert":3,"curious":12}"#);
    }
}
