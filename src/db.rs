use chrono::Utc;
use rusqlite::{params, Connection, Result, Row};
use std::path::Path;

use crate::models::{
    Identity, MergeReport, PollTally, QuizQuestionStats, RankingEntry, StoredResult,
};
use crate::session::Outcome;

pub struct Database {
    conn: Connection,
}

impl Database {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let conn = Connection::open(path)?;
        Ok(Self { conn })
    }

    pub fn init(&self) -> Result<()> {
        self.conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS results (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                test_id TEXT NOT NULL,
                result_name TEXT NOT NULL,
                mode TEXT NOT NULL CHECK(mode IN ('base', 'deep')),
                match_kind TEXT NOT NULL CHECK(match_kind IN ('exact', 'partial', 'fallback')),
                device_id TEXT,
                user_id TEXT,
                scores_json TEXT NOT NULL,
                created_at TEXT NOT NULL DEFAULT (datetime('now')),
                CHECK(device_id IS NOT NULL OR user_id IS NOT NULL)
            );

            -- One vote per identity per poll; device rows become user rows on merge
            CREATE TABLE IF NOT EXISTS poll_votes (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                poll_id TEXT NOT NULL,
                option_index INTEGER NOT NULL,
                device_id TEXT,
                user_id TEXT,
                voted_at TEXT NOT NULL DEFAULT (datetime('now')),
                CHECK(device_id IS NOT NULL OR user_id IS NOT NULL)
            );

            -- Trivia answers
            CREATE TABLE IF NOT EXISTS quiz_answers (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                quiz_id TEXT NOT NULL,
                question_id TEXT NOT NULL,
                choice INTEGER NOT NULL,
                correct INTEGER NOT NULL,
                device_id TEXT,
                user_id TEXT,
                answered_at TEXT NOT NULL DEFAULT (datetime('now')),
                CHECK(device_id IS NOT NULL OR user_id IS NOT NULL)
            );

            -- Devices bridged into accounts
            CREATE TABLE IF NOT EXISTS identity_links (
                device_id TEXT NOT NULL,
                user_id TEXT NOT NULL,
                linked_at TEXT NOT NULL DEFAULT (datetime('now')),
                PRIMARY KEY (device_id, user_id)
            );

            CREATE INDEX IF NOT EXISTS idx_results_test ON results(test_id);
            CREATE INDEX IF NOT EXISTS idx_results_device ON results(device_id);
            CREATE INDEX IF NOT EXISTS idx_results_user ON results(user_id);
            CREATE UNIQUE INDEX IF NOT EXISTS idx_poll_votes_device ON poll_votes(poll_id, device_id) WHERE user_id IS NULL;
            CREATE UNIQUE INDEX IF NOT EXISTS idx_poll_votes_user ON poll_votes(poll_id, user_id) WHERE user_id IS NOT NULL;
            CREATE INDEX IF NOT EXISTS idx_quiz_answers_quiz ON quiz_answers(quiz_id);
            "#,
        )?;

        Ok(())
    }

    // Result operations
    pub fn save_result(&self, identity: &Identity, outcome: &Outcome) -> Result<i64> {
        let scores_json = serde_json::to_string(&outcome.scores)
            .map_err(|e| rusqlite::Error::ToSqlConversionFailure(Box::new(e)))?;

        self.conn.execute(
            r#"
            INSERT INTO results (test_id, result_name, mode, match_kind, device_id, user_id, scores_json, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            "#,
            params![
                outcome.test_id,
                outcome.result.name,
                outcome.mode.as_str(),
                outcome.match_kind.as_str(),
                identity.device_id(),
                identity.user_id(),
                scores_json,
                Utc::now().to_rfc3339(),
            ],
        )?;

        let id = self.conn.last_insert_rowid();
        tracing::debug!(id, %identity, test = %outcome.test_id, "result saved");
        Ok(id)
    }

    pub fn list_results(&self, identity: &Identity) -> Result<Vec<StoredResult>> {
        let query = format!(
            r#"
            SELECT id, test_id, result_name, mode, match_kind, device_id, user_id, scores_json, created_at
            FROM results
            WHERE {}
            ORDER BY created_at DESC, id DESC
            "#,
            identity_clause(identity)
        );

        let mut stmt = self.conn.prepare(&query)?;
        let rows = stmt.query_map(params![identity.id()], stored_result)?;
        let results = rows.collect::<Result<Vec<_>>>()?;

        Ok(results)
    }

    pub fn latest_result(
        &self,
        identity: &Identity,
        test_id: &str,
    ) -> Result<Option<StoredResult>> {
        Ok(self
            .list_results(identity)?
            .into_iter()
            .find(|r| r.test_id == test_id))
    }

    /// Result labels of a test ordered by how often they were assigned.
    /// Equal counts share a rank.
    pub fn result_ranking(&self, test_id: &str) -> Result<Vec<RankingEntry>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT result_name, COUNT(*) AS n
            FROM results
            WHERE test_id = ?1
            GROUP BY result_name
            ORDER BY n DESC, result_name ASC
            "#,
        )?;

        let rows = stmt.query_map(params![test_id], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
        })?;
        let counts = rows.collect::<Result<Vec<_>>>()?;

        let total: i64 = counts.iter().map(|(_, n)| n).sum();
        let mut ranking: Vec<RankingEntry> = Vec::with_capacity(counts.len());
        for (i, (result_name, count)) in counts.into_iter().enumerate() {
            let rank = match ranking.last() {
                Some(prev) if prev.count == count => prev.rank,
                _ => i + 1,
            };
            ranking.push(RankingEntry {
                rank,
                result_name,
                count,
                share: (count as f64 / total as f64) * 100.0,
            });
        }

        Ok(ranking)
    }

    // Poll operations

    /// Record a vote, replacing any earlier vote by the same identity.
    /// Returns true when a previous vote was replaced.
    pub fn cast_vote(&self, identity: &Identity, poll_id: &str, option: usize) -> Result<bool> {
        let tx = self.conn.unchecked_transaction()?;

        let removed = tx.execute(
            &format!("DELETE FROM poll_votes WHERE poll_id = ?2 AND {}", identity_clause(identity)),
            params![identity.id(), poll_id],
        )?;

        tx.execute(
            r#"
            INSERT INTO poll_votes (poll_id, option_index, device_id, user_id, voted_at)
            VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
            params![
                poll_id,
                option as i64,
                identity.device_id(),
                identity.user_id(),
                Utc::now().to_rfc3339()
            ],
        )?;

        tx.commit()?;
        tracing::debug!(%identity, poll = poll_id, option, replaced = removed > 0, "vote cast");
        Ok(removed > 0)
    }

    pub fn current_vote(&self, identity: &Identity, poll_id: &str) -> Result<Option<usize>> {
        let vote = self.conn.query_row(
            &format!(
                "SELECT option_index FROM poll_votes WHERE poll_id = ?2 AND {}",
                identity_clause(identity)
            ),
            params![identity.id(), poll_id],
            |row| row.get::<_, i64>(0),
        );

        match vote {
            Ok(option) => Ok(Some(option as usize)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e),
        }
    }

    // Vote counts per option; options nobody picked are absent
    pub fn poll_tally(&self, poll_id: &str) -> Result<Vec<PollTally>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT option_index, COUNT(*)
            FROM poll_votes
            WHERE poll_id = ?1
            GROUP BY option_index
            ORDER BY option_index
            "#,
        )?;

        let rows = stmt.query_map(params![poll_id], |row| {
            Ok(PollTally {
                poll_id: poll_id.to_string(),
                option: row.get::<_, i64>(0)? as usize,
                votes: row.get(1)?,
            })
        })?;
        let tally = rows.collect::<Result<Vec<_>>>()?;

        Ok(tally)
    }

    // Trivia operations
    pub fn record_quiz_answer(
        &self,
        identity: &Identity,
        quiz_id: &str,
        question_id: &str,
        choice: usize,
        correct: bool,
    ) -> Result<i64> {
        self.conn.execute(
            r#"
            INSERT INTO quiz_answers (quiz_id, question_id, choice, correct, device_id, user_id, answered_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
            params![
                quiz_id,
                question_id,
                choice as i64,
                correct,
                identity.device_id(),
                identity.user_id(),
                Utc::now().to_rfc3339()
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    pub fn quiz_stats(&self, quiz_id: &str) -> Result<Vec<QuizQuestionStats>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT question_id, COUNT(*), COALESCE(SUM(correct), 0)
            FROM quiz_answers
            WHERE quiz_id = ?1
            GROUP BY question_id
            ORDER BY question_id
            "#,
        )?;

        let rows = stmt.query_map(params![quiz_id], |row| {
            Ok(QuizQuestionStats {
                question_id: row.get(0)?,
                attempts: row.get(1)?,
                correct: row.get(2)?,
            })
        })?;
        let stats = rows.collect::<Result<Vec<_>>>()?;

        Ok(stats)
    }

    // Identity operations

    /// Hand everything recorded under an anonymous device to a user account.
    ///
    /// Where both already voted on the same poll the user's vote is kept.
    /// Running it again for the same pair moves nothing.
    pub fn merge_device(&self, device_id: &str, user_id: &str) -> Result<MergeReport> {
        let tx = self.conn.unchecked_transaction()?;

        let results = tx.execute(
            "UPDATE results SET user_id = ?2 WHERE device_id = ?1 AND user_id IS NULL",
            params![device_id, user_id],
        )?;

        let quiz_answers = tx.execute(
            "UPDATE quiz_answers SET user_id = ?2 WHERE device_id = ?1 AND user_id IS NULL",
            params![device_id, user_id],
        )?;

        let poll_votes_dropped = tx.execute(
            r#"
            DELETE FROM poll_votes
            WHERE device_id = ?1 AND user_id IS NULL
              AND poll_id IN (SELECT poll_id FROM poll_votes WHERE user_id = ?2)
            "#,
            params![device_id, user_id],
        )?;

        let poll_votes = tx.execute(
            "UPDATE poll_votes SET user_id = ?2 WHERE device_id = ?1 AND user_id IS NULL",
            params![device_id, user_id],
        )?;

        tx.execute(
            "INSERT OR IGNORE INTO identity_links (device_id, user_id, linked_at) VALUES (?1, ?2, ?3)",
            params![device_id, user_id, Utc::now().to_rfc3339()],
        )?;

        tx.commit()?;

        let report = MergeReport {
            results,
            quiz_answers,
            poll_votes,
            poll_votes_dropped,
        };
        tracing::info!(device = device_id, user = user_id, ?report, "device merged");
        Ok(report)
    }

    pub fn linked_users(&self, device_id: &str) -> Result<Vec<String>> {
        let mut stmt = self.conn.prepare(
            "SELECT user_id FROM identity_links WHERE device_id = ?1 ORDER BY linked_at, user_id",
        )?;
        let rows = stmt.query_map(params![device_id], |row| row.get(0))?;
        let users = rows.collect::<Result<Vec<String>>>()?;

        Ok(users)
    }

    pub fn get_stats(&self) -> Result<Stats> {
        let total_results: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM results", [], |row| row.get(0))?;

        let tests_taken: i64 = self.conn.query_row(
            "SELECT COUNT(DISTINCT test_id) FROM results",
            [],
            |row| row.get(0),
        )?;

        let total_votes: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM poll_votes", [], |row| row.get(0))?;

        let total_quiz_answers: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM quiz_answers", [], |row| row.get(0))?;

        let linked_devices: i64 = self.conn.query_row(
            "SELECT COUNT(DISTINCT device_id) FROM identity_links",
            [],
            |row| row.get(0),
        )?;

        let quiz_accuracy: f64 = self
            .conn
            .query_row(
                "SELECT COALESCE(AVG(correct) * 100.0, 0) FROM quiz_answers",
                [],
                |row| row.get(0),
            )
            .unwrap_or(0.0);

        Ok(Stats {
            total_results,
            tests_taken,
            total_votes,
            total_quiz_answers,
            linked_devices,
            quiz_accuracy,
        })
    }
}

// Rows owned by an identity; binds the identity id as ?1
fn identity_clause(identity: &Identity) -> &'static str {
    match identity {
        Identity::Device(_) => "device_id = ?1 AND user_id IS NULL",
        Identity::User(_) => "user_id = ?1",
    }
}

fn stored_result(row: &Row<'_>) -> Result<StoredResult> {
    Ok(StoredResult {
        id: row.get(0)?,
        test_id: row.get(1)?,
        result_name: row.get(2)?,
        mode: row.get(3)?,
        match_kind: row.get(4)?,
        device_id: row.get(5)?,
        user_id: row.get(6)?,
        scores_json: row.get(7)?,
        created_at: row.get(8)?,
    })
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct Stats {
    pub total_results: i64,
    pub tests_taken: i64,
    pub total_votes: i64,
    pub total_quiz_answers: i64,
    pub linked_devices: i64,
    pub quiz_accuracy: f64,
}
