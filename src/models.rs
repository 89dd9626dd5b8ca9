use serde::{Deserialize, Serialize};

// Who an answer belongs to: an anonymous device until the user logs in
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "lowercase")]
pub enum Identity {
    Device(String),
    User(String),
}

impl Identity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Identity::Device(_) => "device",
            Identity::User(_) => "user",
        }
    }

    pub fn id(&self) -> &str {
        match self {
            Identity::Device(id) | Identity::User(id) => id,
        }
    }

    pub fn device_id(&self) -> Option<&str> {
        match self {
            Identity::Device(id) => Some(id),
            Identity::User(_) => None,
        }
    }

    pub fn user_id(&self) -> Option<&str> {
        match self {
            Identity::User(id) => Some(id),
            Identity::Device(_) => None,
        }
    }

    pub fn from_parts(device: Option<String>, user: Option<String>) -> Option<Self> {
        match (user, device) {
            (Some(user), _) => Some(Identity::User(user)),
            (None, Some(device)) => Some(Identity::Device(device)),
            (None, None) => None,
        }
    }
}

impl std::fmt::Display for Identity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.as_str(), self.id())
    }
}

// A persisted test outcome
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredResult {
    pub id: i64,
    pub test_id: String,
    pub result_name: String,
    pub mode: String,
    pub match_kind: String,
    pub device_id: Option<String>,
    pub user_id: Option<String>,
    pub scores_json: String,
    pub created_at: String,
}

// One row of a test's result distribution
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RankingEntry {
    pub rank: usize,
    pub result_name: String,
    pub count: i64,
    pub share: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollTally {
    pub poll_id: String,
    pub option: usize,
    pub votes: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuizQuestionStats {
    pub question_id: String,
    pub attempts: i64,
    pub correct: i64,
}

impl QuizQuestionStats {
    pub fn accuracy(&self) -> f64 {
        if self.attempts == 0 {
            0.0
        } else {
            (self.correct as f64 / self.attempts as f64) * 100.0
        }
    }
}

// What moved from a device to an account during a merge
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergeReport {
    pub results: usize,
    pub quiz_answers: usize,
    pub poll_votes: usize,
    pub poll_votes_dropped: usize,
}

impl MergeReport {
    pub fn is_empty(&self) -> bool {
        self.results == 0
            && self.quiz_answers == 0
            && self.poll_votes == 0
            && self.poll_votes_dropped == 0
    }
}

// JSON output wrapper for CLI
#[derive(Debug, Serialize)]
pub struct JsonOutput<T: Serialize> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<String>,
}

impl<T: Serialize> JsonOutput<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn err(msg: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(msg.into()),
        }
    }
}
