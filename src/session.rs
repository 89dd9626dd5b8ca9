use rand::seq::SliceRandom;
use serde::Serialize;
use std::collections::BTreeMap;
use thiserror::Error;

use crate::content::{Question, TestDefinition, TestMode};
use crate::scoring::{
    Answer, LevelMap, MatchKind, Matcher, ResultLabel, ScoreMap, ScoringConfig, ScoringError,
};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SessionError {
    #[error("question '{0}' is not part of this test")]
    UnknownQuestion(String),
    #[error("question '{question}' has no option {option}")]
    UnknownOption { question: String, option: usize },
    #[error(transparent)]
    Scoring(#[from] ScoringError),
}

/// Result of a finished session, ready for display or storage.
#[derive(Debug, Clone, Serialize)]
pub struct Outcome {
    pub test_id: String,
    pub mode: TestMode,
    pub result: ResultLabel,
    pub match_kind: MatchKind,
    // Condition keys the chosen label agreed on
    pub agreements: usize,
    pub scores: ScoreMap,
    pub levels: LevelMap,
    pub answered: usize,
    pub total: usize,
}

/// One run through a test. Answers are keyed by question so re-answering
/// replaces the earlier choice.
pub struct TestSession<'t> {
    test: &'t TestDefinition,
    mode: TestMode,
    order: Vec<&'t Question>,
    // question id -> option index
    choices: BTreeMap<String, usize>,
}

impl<'t> TestSession<'t> {
    pub fn new(test: &'t TestDefinition, mode: TestMode) -> Self {
        Self {
            test,
            mode,
            order: test.questions_for(mode).collect(),
            choices: BTreeMap::new(),
        }
    }

    pub fn shuffled(mut self) -> Self {
        self.order.shuffle(&mut rand::thread_rng());
        self
    }

    pub fn questions(&self) -> &[&'t Question] {
        &self.order
    }

    pub fn answer(&mut self, question_id: &str, option: usize) -> Result<(), SessionError> {
        let question = self
            .order
            .iter()
            .find(|q| q.id == question_id)
            .ok_or_else(|| SessionError::UnknownQuestion(question_id.to_string()))?;

        if option >= question.options.len() {
            return Err(SessionError::UnknownOption {
                question: question_id.to_string(),
                option,
            });
        }

        if self.choices.insert(question_id.to_string(), option).is_some() {
            tracing::debug!(question = question_id, option, "answer replaced");
        }
        Ok(())
    }

    pub fn remaining(&self) -> impl Iterator<Item = &'t Question> + '_ {
        self.order
            .iter()
            .copied()
            .filter(move |q| !self.choices.contains_key(&q.id))
    }

    pub fn is_complete(&self) -> bool {
        self.remaining().next().is_none()
    }

    pub fn answers(&self) -> Vec<Answer> {
        self.order
            .iter()
            .filter_map(|q| {
                let option = self.choices.get(&q.id)?;
                Some(Answer::new(q.dimension.as_str(), q.options[*option].score))
            })
            .collect()
    }

    pub fn scores(&self) -> ScoreMap {
        self.answers().into_iter().collect()
    }

    pub fn finish(&self, config: &ScoringConfig) -> Result<Outcome, SessionError> {
        let scores = self.scores();
        let counts = self.test.dimension_counts(self.mode);
        let matcher = Matcher::new(config);

        let levels = matcher.levels(&scores, self.test.dimension_keys(), &counts);
        let selection = matcher.select(&levels, &self.test.result_labels)?;

        tracing::info!(
            test = %self.test.id,
            mode = self.mode.as_str(),
            result = %selection.label.name,
            kind = selection.kind.as_str(),
            "test finished"
        );

        Ok(Outcome {
            test_id: self.test.id.clone(),
            mode: self.mode,
            result: selection.label.clone(),
            match_kind: selection.kind,
            agreements: selection.agreements,
            scores,
            levels,
            answered: self.choices.len(),
            total: self.order.len(),
        })
    }
}
