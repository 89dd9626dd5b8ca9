use serde::Serialize;
use std::collections::HashSet;
use thiserror::Error;

use crate::content::{Catalog, Poll, Quiz, TestDefinition, TestMode};
use crate::scoring::ScoringConfig;

/// A content problem found before it can reach a test-taker.
#[derive(Debug, Clone, Error, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ContentIssue {
    #[error("test '{test}' has no result labels")]
    NoResultLabels { test: String },
    #[error("test '{test}' marks {count} result labels as default")]
    MultipleDefaults { test: String, count: usize },
    #[error("test '{test}' question '{question}' uses undefined dimension '{dimension}'")]
    UnknownQuestionDimension {
        test: String,
        question: String,
        dimension: String,
    },
    #[error("test '{test}' question '{question}' has no answer options")]
    NoOptions { test: String, question: String },
    #[error("test '{test}' question '{question}' option {option} scores {score}, expected 1..={max}")]
    ScoreOutOfRange {
        test: String,
        question: String,
        option: usize,
        score: u32,
        max: u32,
    },
    #[error("test '{test}' has duplicate question id '{question}'")]
    DuplicateQuestion { test: String, question: String },
    #[error("test '{test}' dimension '{dimension}' has no questions in {mode} mode")]
    EmptyDimension {
        test: String,
        dimension: String,
        mode: &'static str,
    },
    #[error("test '{test}' result '{label}' requires undefined dimension '{dimension}'")]
    UnknownConditionDimension {
        test: String,
        label: String,
        dimension: String,
    },
    #[error("poll '{poll}' needs at least two options")]
    TooFewPollOptions { poll: String },
    #[error("quiz '{quiz}' question '{question}' answer {answer} is out of range")]
    TriviaAnswerOutOfRange {
        quiz: String,
        question: String,
        answer: usize,
    },
}

pub fn validate_catalog(catalog: &Catalog, config: &ScoringConfig) -> Vec<ContentIssue> {
    let mut issues = Vec::new();
    for test in catalog.tests.values() {
        issues.extend(validate_test(test, config));
    }
    for poll in catalog.polls.values() {
        issues.extend(validate_poll(poll));
    }
    for quiz in catalog.quizzes.values() {
        issues.extend(validate_quiz(quiz));
    }

    if issues.is_empty() {
        tracing::debug!("content is valid");
    } else {
        tracing::warn!(count = issues.len(), "content has issues");
    }
    issues
}

pub fn validate_test(test: &TestDefinition, config: &ScoringConfig) -> Vec<ContentIssue> {
    let mut issues = Vec::new();
    let id = || test.id.clone();

    if test.result_labels.is_empty() {
        issues.push(ContentIssue::NoResultLabels { test: id() });
    }

    let defaults = test.result_labels.iter().filter(|l| l.is_default).count();
    if defaults > 1 {
        issues.push(ContentIssue::MultipleDefaults {
            test: id(),
            count: defaults,
        });
    }

    let mut seen = HashSet::new();
    for question in &test.questions {
        if !seen.insert(question.id.as_str()) {
            issues.push(ContentIssue::DuplicateQuestion {
                test: id(),
                question: question.id.clone(),
            });
        }

        if !test.dimensions.contains_key(&question.dimension) {
            issues.push(ContentIssue::UnknownQuestionDimension {
                test: id(),
                question: question.id.clone(),
                dimension: question.dimension.clone(),
            });
        }

        if question.options.is_empty() {
            issues.push(ContentIssue::NoOptions {
                test: id(),
                question: question.id.clone(),
            });
        }

        for (i, option) in question.options.iter().enumerate() {
            if option.score == 0 || option.score > config.max_score_per_question {
                issues.push(ContentIssue::ScoreOutOfRange {
                    test: id(),
                    question: question.id.clone(),
                    option: i + 1,
                    score: option.score,
                    max: config.max_score_per_question,
                });
            }
        }
    }

    for mode in [TestMode::Base, TestMode::Deep] {
        if mode == TestMode::Deep && !test.has_deep_questions() {
            continue;
        }
        for (dimension, count) in test.dimension_counts(mode) {
            if count == 0 && test.dimensions.contains_key(&dimension) {
                issues.push(ContentIssue::EmptyDimension {
                    test: id(),
                    dimension,
                    mode: mode.as_str(),
                });
            }
        }
    }

    for label in &test.result_labels {
        for dimension in label.condition.keys() {
            if !test.dimensions.contains_key(dimension) {
                issues.push(ContentIssue::UnknownConditionDimension {
                    test: id(),
                    label: label.name.clone(),
                    dimension: dimension.clone(),
                });
            }
        }
    }

    issues
}

pub fn validate_poll(poll: &Poll) -> Vec<ContentIssue> {
    if poll.options.len() < 2 {
        vec![ContentIssue::TooFewPollOptions {
            poll: poll.id.clone(),
        }]
    } else {
        Vec::new()
    }
}

pub fn validate_quiz(quiz: &Quiz) -> Vec<ContentIssue> {
    quiz.questions
        .iter()
        .filter(|q| q.answer >= q.options.len())
        .map(|q| ContentIssue::TriviaAnswerOutOfRange {
            quiz: quiz.id.clone(),
            question: q.id.clone(),
            answer: q.answer,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::fixtures::{cat_test, catalog};
    use crate::content::{AnswerOption, Dimension, Question, TriviaQuestion};
    use crate::scoring::level::Level;
    use crate::scoring::ResultLabel;

    fn validate(test: &TestDefinition) -> Vec<ContentIssue> {
        validate_test(test, &ScoringConfig::default())
    }

    #[test]
    fn fixture_catalog_is_valid() {
        assert!(validate_catalog(&catalog(), &ScoringConfig::default()).is_empty());
    }

    #[test]
    fn bundled_content_is_valid() {
        let dir = std::path::Path::new(env!("CARGO_MANIFEST_DIR")).join("content");
        let catalog = Catalog::load_dir(dir).unwrap();
        assert_eq!(
            validate_catalog(&catalog, &ScoringConfig::default()),
            Vec::<ContentIssue>::new()
        );
    }

    #[test]
    fn empty_result_labels_reported() {
        let mut test = cat_test();
        test.result_labels.clear();
        assert_eq!(
            validate(&test),
            vec![ContentIssue::NoResultLabels {
                test: "cat".to_string()
            }]
        );
    }

    #[test]
    fn multiple_defaults_reported() {
        let mut test = cat_test();
        test.result_labels.push(ResultLabel::new("A").as_default());
        test.result_labels.push(ResultLabel::new("B").as_default());
        assert!(validate(&test).contains(&ContentIssue::MultipleDefaults {
            test: "cat".to_string(),
            count: 2
        }));
    }

    #[test]
    fn unknown_question_dimension_reported() {
        let mut test = cat_test();
        test.questions[0].dimension = "sleepy".to_string();
        let issues = validate(&test);
        assert!(issues.contains(&ContentIssue::UnknownQuestionDimension {
            test: "cat".to_string(),
            question: "c1".to_string(),
            dimension: "sleepy".to_string(),
        }));
    }

    #[test]
    fn score_out_of_range_reported() {
        let mut test = cat_test();
        test.questions[1].options.push(AnswerOption {
            text: "Teleport".to_string(),
            score: 9,
        });
        test.questions[1].options[0].score = 0;

        let issues = validate(&test);
        assert_eq!(
            issues
                .iter()
                .filter(|i| matches!(i, ContentIssue::ScoreOutOfRange { .. }))
                .count(),
            2
        );
    }

    #[test]
    fn question_without_options_reported() {
        let mut test = cat_test();
        test.questions[0].options.clear();
        assert!(validate(&test).contains(&ContentIssue::NoOptions {
            test: "cat".to_string(),
            question: "c1".to_string()
        }));
    }

    #[test]
    fn duplicate_question_reported() {
        let mut test = cat_test();
        let copy = test.questions[0].clone();
        test.questions.push(copy);
        assert!(validate(&test).contains(&ContentIssue::DuplicateQuestion {
            test: "cat".to_string(),
            question: "c1".to_string()
        }));
    }

    #[test]
    fn zero_question_dimension_reported_per_mode() {
        let mut test = cat_test();
        test.dimensions.insert("calm".to_string(), Dimension::default());
        test.questions.push(Question {
            id: "d1".to_string(),
            dimension: "calm".to_string(),
            prompt: "Deep only".to_string(),
            options: vec![AnswerOption {
                text: "Purr".to_string(),
                score: 5,
            }],
            deep: true,
        });

        let issues = validate(&test);
        assert!(issues.contains(&ContentIssue::EmptyDimension {
            test: "cat".to_string(),
            dimension: "calm".to_string(),
            mode: "base",
        }));
        assert!(!issues
            .iter()
            .any(|i| matches!(i, ContentIssue::EmptyDimension { mode: "deep", .. })));
    }

    #[test]
    fn unknown_condition_dimension_reported() {
        let mut test = cat_test();
        test.result_labels
            .insert(0, ResultLabel::new("Ghost").with_condition("spooky", Level::High));
        assert!(validate(&test).contains(&ContentIssue::UnknownConditionDimension {
            test: "cat".to_string(),
            label: "Ghost".to_string(),
            dimension: "spooky".to_string(),
        }));
    }

    #[test]
    fn poll_needs_two_options() {
        let poll = Poll {
            id: "p".to_string(),
            question: "?".to_string(),
            options: vec!["only".to_string()],
        };
        assert_eq!(validate_poll(&poll).len(), 1);
    }

    #[test]
    fn trivia_answer_out_of_range() {
        let quiz = Quiz {
            id: "q".to_string(),
            title: "Quiz".to_string(),
            questions: vec![TriviaQuestion {
                id: "t".to_string(),
                prompt: "?".to_string(),
                options: vec!["a".to_string(), "b".to_string()],
                answer: 2,
            }],
        };
        assert_eq!(
            validate_quiz(&quiz),
            vec![ContentIssue::TriviaAnswerOutOfRange {
                quiz: "q".to_string(),
                question: "t".to_string(),
                answer: 2
            }]
        );
    }

    #[test]
    fn issue_messages_name_the_content() {
        let issue = ContentIssue::EmptyDimension {
            test: "cat".to_string(),
            dimension: "calm".to_string(),
            mode: "base",
        };
        assert_eq!(issue.to_string(), "test 'cat' dimension 'calm' has no questions in base mode");
    }
}
