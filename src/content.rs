use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::scoring::{DimensionCounts, ResultLabel};

#[derive(Debug, Error)]
pub enum ContentError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("duplicate {kind} id '{id}' in {path}")]
    DuplicateId {
        kind: &'static str,
        id: String,
        path: PathBuf,
    },
}

// Base mode skips deep-only questions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TestMode {
    #[default]
    Base,
    Deep,
}

impl TestMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            TestMode::Base => "base",
            TestMode::Deep => "deep",
        }
    }

    pub fn from_deep_flag(deep: bool) -> Self {
        if deep {
            TestMode::Deep
        } else {
            TestMode::Base
        }
    }

    pub fn includes(&self, question: &Question) -> bool {
        match self {
            TestMode::Base => !question.deep,
            TestMode::Deep => true,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Dimension {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnswerOption {
    pub text: String,
    pub score: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Question {
    pub id: String,
    pub dimension: String,
    #[serde(rename = "q")]
    pub prompt: String,
    #[serde(rename = "a", default)]
    pub options: Vec<AnswerOption>,
    #[serde(default)]
    pub deep: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestDefinition {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    pub dimensions: BTreeMap<String, Dimension>,
    pub questions: Vec<Question>,
    pub result_labels: Vec<ResultLabel>,
}

impl TestDefinition {
    pub fn dimension_keys(&self) -> impl Iterator<Item = &str> {
        self.dimensions.keys().map(String::as_str)
    }

    pub fn questions_for(&self, mode: TestMode) -> impl Iterator<Item = &Question> {
        self.questions.iter().filter(move |q| mode.includes(q))
    }

    /// Question count per declared dimension for `mode`. Declared dimensions
    /// without questions are present with a zero count.
    pub fn dimension_counts(&self, mode: TestMode) -> DimensionCounts {
        let mut counts: DimensionCounts = self.dimensions.keys().map(|k| (k.clone(), 0)).collect();
        for question in self.questions_for(mode) {
            *counts.entry(question.dimension.clone()).or_insert(0) += 1;
        }
        counts
    }

    pub fn has_deep_questions(&self) -> bool {
        self.questions.iter().any(|q| q.deep)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Poll {
    pub id: String,
    pub question: String,
    pub options: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TriviaQuestion {
    pub id: String,
    #[serde(rename = "q")]
    pub prompt: String,
    pub options: Vec<String>,
    // Index into `options`
    pub answer: usize,
}

impl TriviaQuestion {
    pub fn is_correct(&self, choice: usize) -> bool {
        choice == self.answer
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Quiz {
    pub id: String,
    pub title: String,
    pub questions: Vec<TriviaQuestion>,
}

impl Quiz {
    pub fn question(&self, id: &str) -> Option<&TriviaQuestion> {
        self.questions.iter().find(|q| q.id == id)
    }
}

/// All content loaded from a directory with `tests/`, `polls/` and
/// `quizzes/` sub-directories of JSON files.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    pub tests: BTreeMap<String, TestDefinition>,
    pub polls: BTreeMap<String, Poll>,
    pub quizzes: BTreeMap<String, Quiz>,
}

impl Catalog {
    pub fn load_dir<P: AsRef<Path>>(dir: P) -> Result<Self, ContentError> {
        let dir = dir.as_ref();
        tracing::debug!(dir = %dir.display(), "loading content");

        let catalog = Self {
            tests: load_kind(&dir.join("tests"), "test", |t: &TestDefinition| t.id.clone())?,
            polls: load_kind(&dir.join("polls"), "poll", |p: &Poll| p.id.clone())?,
            quizzes: load_kind(&dir.join("quizzes"), "quiz", |q: &Quiz| q.id.clone())?,
        };

        tracing::info!(
            tests = catalog.tests.len(),
            polls = catalog.polls.len(),
            quizzes = catalog.quizzes.len(),
            "content loaded"
        );
        Ok(catalog)
    }

    pub fn test(&self, id: &str) -> Option<&TestDefinition> {
        self.tests.get(id)
    }

    pub fn poll(&self, id: &str) -> Option<&Poll> {
        self.polls.get(id)
    }

    pub fn quiz(&self, id: &str) -> Option<&Quiz> {
        self.quizzes.get(id)
    }
}

fn load_kind<T, F>(
    dir: &Path,
    kind: &'static str,
    id_of: F,
) -> Result<BTreeMap<String, T>, ContentError>
where
    T: for<'de> Deserialize<'de>,
    F: Fn(&T) -> String,
{
    let mut items = BTreeMap::new();
    if !dir.is_dir() {
        tracing::debug!(dir = %dir.display(), "no {} directory", kind);
        return Ok(items);
    }

    let entries = fs::read_dir(dir).map_err(|source| ContentError::Io {
        path: dir.to_path_buf(),
        source,
    })?;

    let mut paths = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|source| ContentError::Io {
            path: dir.to_path_buf(),
            source,
        })?;
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) == Some("json") {
            paths.push(path);
        }
    }
    paths.sort();

    for path in paths {
        let raw = fs::read_to_string(&path).map_err(|source| ContentError::Io {
            path: path.clone(),
            source,
        })?;
        let item: T = serde_json::from_str(&raw).map_err(|source| ContentError::Parse {
            path: path.clone(),
            source,
        })?;

        let id = id_of(&item);
        if items.contains_key(&id) {
            return Err(ContentError::DuplicateId { kind, id, path });
        }
        tracing::trace!(kind, id = %id, path = %path.display(), "loaded");
        items.insert(id, item);
    }

    Ok(items)
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;

    pub const CAT_TEST: &str = r#"{
        "id": "cat",
        "title": "Which cat are you?",
        "dimensions": {"curious": {"name": "Curiosity"}, "alert": {"name": "Alertness"}},
        "questions": [
            {"id": "c1", "dimension": "curious", "q": "A box appears.", "a": [{"text": "Ignore", "score": 1}, {"text": "Sniff", "score": 3}, {"text": "Climb in", "score": 5}]},
            {"id": "c2", "dimension": "curious", "q": "A door opens.", "a": [{"text": "Stay", "score": 1}, {"text": "Peek", "score": 3}, {"text": "Run through", "score": 5}, {"text": "Watch", "score": 2}]},
            {"id": "c3", "dimension": "curious", "q": "New smell.", "a": [{"text": "Meh", "score": 1}, {"text": "Follow it", "score": 5}], "deep": true},
            {"id": "a1", "dimension": "alert", "q": "A noise at night.", "a": [{"text": "Sleep on", "score": 1}, {"text": "Ears up", "score": 3}, {"text": "Pounce", "score": 5}]},
            {"id": "a2", "dimension": "alert", "q": "Vacuum cleaner.", "a": [{"text": "Nap", "score": 1}, {"text": "Hide", "score": 5}, {"text": "Stare", "score": 2}]},
            {"id": "a3", "dimension": "alert", "q": "Bird outside.", "a": [{"text": "Yawn", "score": 1}, {"text": "Chatter", "score": 5}], "deep": true}
        ],
        "resultLabels": [
            {"name": "Explorer", "emoji": "🧭", "condition": {"curious": "high"}},
            {"name": "Dreamer", "desc": "Curious but relaxed", "condition": {"curious": "high", "alert": "low"}},
            {"name": "Guard", "condition": {"alert": "high"}},
            {"name": "Everycat", "condition": {}}
        ]
    }"#;

    pub fn cat_test() -> TestDefinition {
        serde_json::from_str(CAT_TEST).expect("fixture should parse")
    }

    pub fn catalog() -> Catalog {
        let mut catalog = Catalog::default();
        let test = cat_test();
        catalog.tests.insert(test.id.clone(), test);
        catalog.polls.insert(
            "naps".to_string(),
            Poll {
                id: "naps".to_string(),
                question: "Best nap spot?".to_string(),
                options: vec!["Sunbeam".to_string(), "Keyboard".to_string(), "Box".to_string()],
            },
        );
        catalog.quizzes.insert(
            "facts".to_string(),
            Quiz {
                id: "facts".to_string(),
                title: "Cat facts".to_string(),
                questions: vec![TriviaQuestion {
                    id: "t1".to_string(),
                    prompt: "How many hours a day do cats sleep?".to_string(),
                    options: vec!["4".to_string(), "15".to_string()],
                    answer: 1,
                }],
            },
        );
        catalog
    }
}
