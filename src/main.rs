mod config;
mod content;
mod db;
mod interactive;
mod models;
mod scoring;
mod session;
mod validate;

use clap::{Args, Parser, Subcommand};
use std::io;
use std::path::PathBuf;
use tracing_subscriber::{fmt, EnvFilter};

use config::Settings;
use content::{Catalog, TestDefinition, TestMode, TriviaQuestion};
use db::Database;
use models::{Identity, JsonOutput, StoredResult};
use scoring::{percentage, MatchKind, ScoringConfig};
use session::{Outcome, TestSession};

#[derive(Parser)]
#[command(name = "chemi")]
#[command(about = "Personality tests, polls and trivia quizzes in the terminal")]
#[command(version)]
struct Cli {
    /// Output as JSON
    #[arg(long, global = true)]
    json: bool,

    /// Content directory containing tests/, polls/ and quizzes/
    #[arg(long, global = true)]
    content: Option<PathBuf>,

    /// Debug logging on stderr
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database
    Init,

    /// Browse and take personality tests
    #[command(subcommand)]
    Test(TestCommands),

    /// Show how often each result was reached for a test
    Rank {
        /// Test ID
        test: String,
    },

    /// Show stored results for a device or user
    History {
        #[command(flatten)]
        identity: IdentityArgs,

        /// Only the latest result for this test
        #[arg(long, short)]
        test: Option<String>,
    },

    /// Vote on polls
    #[command(subcommand)]
    Poll(PollCommands),

    /// Answer trivia quizzes
    #[command(subcommand)]
    Quiz(QuizCommands),

    /// Move everything recorded on a device to a user account
    Merge {
        /// Device ID to merge from
        #[arg(long)]
        device: String,

        /// User ID to merge into
        #[arg(long)]
        user: String,
    },

    /// Show usage statistics
    Stats,

    /// Check content files for mistakes
    Validate,
}

#[derive(Subcommand)]
enum TestCommands {
    /// List available tests
    List,

    /// Show test details
    Show {
        /// Test ID
        id: String,
    },

    /// Take a test interactively
    Take {
        /// Test ID
        id: String,

        /// Include deep-mode questions
        #[arg(long)]
        deep: bool,

        /// Ask questions in random order
        #[arg(long)]
        shuffle: bool,

        #[command(flatten)]
        identity: IdentityArgs,
    },

    /// Score a test from answers given on the command line
    Score {
        /// Test ID
        id: String,

        /// Comma-separated question=option pairs, options numbered from 1
        #[arg(long, short)]
        answers: String,

        /// Score in deep mode
        #[arg(long)]
        deep: bool,

        #[command(flatten)]
        identity: IdentityArgs,
    },
}

#[derive(Subcommand)]
enum PollCommands {
    /// List available polls
    List,

    /// Vote on a poll (re-voting replaces the earlier vote)
    Vote {
        /// Poll ID
        poll: String,

        /// Option number, starting at 1
        option: usize,

        #[command(flatten)]
        identity: IdentityArgs,
    },

    /// Show vote counts
    Results {
        /// Poll ID
        poll: String,

        #[command(flatten)]
        identity: IdentityArgs,
    },
}

#[derive(Subcommand)]
enum QuizCommands {
    /// List available quizzes
    List,

    /// Answer one trivia question
    Answer {
        /// Quiz ID
        quiz: String,

        /// Question ID
        question: String,

        /// Option number, starting at 1
        choice: usize,

        #[command(flatten)]
        identity: IdentityArgs,
    },

    /// Show per-question accuracy
    Stats {
        /// Quiz ID
        quiz: String,
    },
}

#[derive(Args, Debug, Clone, Default)]
struct IdentityArgs {
    /// Anonymous device ID
    #[arg(long, conflicts_with = "user")]
    device: Option<String>,

    /// Logged-in user ID
    #[arg(long)]
    user: Option<String>,
}

impl IdentityArgs {
    fn resolve(self) -> Option<Identity> {
        Identity::from_parts(self.device, self.user)
    }

    fn require(self) -> Result<Identity, String> {
        self.resolve()
            .ok_or_else(|| "Pass --device <id> or --user <id>".to_string())
    }
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if let Err(e) = run(cli) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("chemi=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    fmt().with_env_filter(filter).with_writer(io::stderr).init();
}

fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let settings = Settings::load(cli.content)?;
    let json = cli.json;

    match cli.command {
        Commands::Init => {
            open_db(&settings)?;
            if json {
                println!("{}", serde_json::to_string(&JsonOutput::<()>::ok(()))?);
            } else {
                println!("Database initialized at: {}", settings.db_path.display());
            }
        }

        Commands::Test(test_cmd) => {
            let catalog = Catalog::load_dir(&settings.content_dir)?;

            match test_cmd {
                TestCommands::List => {
                    let tests: Vec<serde_json::Value> = catalog
                        .tests
                        .values()
                        .map(|t| {
                            serde_json::json!({
                                "id": t.id,
                                "title": t.title,
                                "questions": t.questions_for(TestMode::Base).count(),
                                "deep_questions": t.questions_for(TestMode::Deep).count(),
                            })
                        })
                        .collect();

                    if json {
                        println!("{}", serde_json::to_string(&JsonOutput::ok(&tests))?);
                    } else if catalog.tests.is_empty() {
                        println!("No tests found in {}.", settings.content_dir.display());
                    } else {
                        println!("{:<16} {:<40} QUESTIONS", "ID", "TITLE");
                        println!("{}", "-".repeat(70));
                        for test in catalog.tests.values() {
                            let base = test.questions_for(TestMode::Base).count();
                            let deep = test.questions_for(TestMode::Deep).count();
                            let count = if deep > base {
                                format!("{} ({} deep)", base, deep)
                            } else {
                                base.to_string()
                            };
                            println!("{:<16} {:<40} {}", test.id, truncate(&test.title, 38), count);
                        }
                    }
                }

                TestCommands::Show { id } => {
                    let Some(test) = catalog.test(&id) else {
                        return not_found(json, &format!("Test '{}' not found", id));
                    };

                    if json {
                        println!("{}", serde_json::to_string(&JsonOutput::ok(test))?);
                    } else {
                        print_test(test);
                    }
                }

                TestCommands::Take {
                    id,
                    deep,
                    shuffle,
                    identity,
                } => {
                    let Some(test) = catalog.test(&id) else {
                        return not_found(json, &format!("Test '{}' not found", id));
                    };

                    let mut session = TestSession::new(test, TestMode::from_deep_flag(deep));
                    if shuffle {
                        session = session.shuffled();
                    }

                    let stdin = io::stdin();
                    // Keep stdout clean for the JSON document
                    let finish = if json {
                        interactive::take_test(&mut session, stdin.lock(), io::stderr())?
                    } else {
                        println!("=== {} ===", test.title);
                        interactive::take_test(&mut session, stdin.lock(), io::stdout())?
                    };

                    if !session.is_complete() {
                        tracing::debug!(?finish, "test left unfinished");
                        if json {
                            println!(
                                "{}",
                                serde_json::to_string(&JsonOutput::<()>::err("Test not finished"))?
                            );
                        } else {
                            println!("Test not finished, nothing saved.");
                        }
                        return Ok(());
                    }

                    let outcome = session.finish(&settings.scoring)?;
                    let saved = save_outcome(&settings, identity.resolve(), &outcome)?;
                    report_outcome(json, test, &outcome, &settings.scoring, saved)?;
                }

                TestCommands::Score {
                    id,
                    answers,
                    deep,
                    identity,
                } => {
                    let Some(test) = catalog.test(&id) else {
                        return not_found(json, &format!("Test '{}' not found", id));
                    };

                    let mut session = TestSession::new(test, TestMode::from_deep_flag(deep));
                    for (question, option) in parse_answers(&answers)? {
                        session.answer(&question, option)?;
                    }

                    let outcome = session.finish(&settings.scoring)?;
                    let saved = save_outcome(&settings, identity.resolve(), &outcome)?;
                    report_outcome(json, test, &outcome, &settings.scoring, saved)?;
                }
            }
        }

        Commands::Rank { test } => {
            let db = open_db(&settings)?;
            let ranking = db.result_ranking(&test)?;

            if json {
                println!("{}", serde_json::to_string(&JsonOutput::ok(&ranking))?);
            } else if ranking.is_empty() {
                println!("No results recorded for '{}'.", test);
            } else {
                println!("{:<6} {:<30} {:>7} {:>7}", "RANK", "RESULT", "COUNT", "SHARE");
                println!("{}", "-".repeat(54));
                for entry in ranking {
                    println!(
                        "{:<6} {:<30} {:>7} {:>6.1}%",
                        entry.rank,
                        truncate(&entry.result_name, 28),
                        entry.count,
                        entry.share
                    );
                }
            }
        }

        Commands::History { identity, test } => {
            let identity = identity.require()?;
            let db = open_db(&settings)?;

            let results: Vec<StoredResult> = match &test {
                Some(test_id) => db.latest_result(&identity, test_id)?.into_iter().collect(),
                None => db.list_results(&identity)?,
            };

            if json {
                println!("{}", serde_json::to_string(&JsonOutput::ok(&results))?);
            } else if results.is_empty() {
                println!("No results for {}.", identity);
            } else {
                println!("{:<6} {:<16} {:<24} {:<6} TAKEN", "ID", "TEST", "RESULT", "MODE");
                println!("{}", "-".repeat(80));
                for result in results {
                    println!(
                        "{:<6} {:<16} {:<24} {:<6} {}",
                        result.id,
                        truncate(&result.test_id, 14),
                        truncate(&result.result_name, 22),
                        result.mode,
                        result.created_at
                    );
                }
            }
        }

        Commands::Poll(poll_cmd) => {
            let catalog = Catalog::load_dir(&settings.content_dir)?;

            match poll_cmd {
                PollCommands::List => {
                    let polls: Vec<_> = catalog.polls.values().collect();
                    if json {
                        println!("{}", serde_json::to_string(&JsonOutput::ok(&polls))?);
                    } else if polls.is_empty() {
                        println!("No polls found.");
                    } else {
                        for poll in polls {
                            println!("{}: {}", poll.id, poll.question);
                            for (i, option) in poll.options.iter().enumerate() {
                                println!("  {}) {}", i + 1, option);
                            }
                        }
                    }
                }

                PollCommands::Vote {
                    poll,
                    option,
                    identity,
                } => {
                    let identity = identity.require()?;
                    let Some(found) = catalog.poll(&poll) else {
                        return not_found(json, &format!("Poll '{}' not found", poll));
                    };
                    let index = interactive::choice_index(option, found.options.len())
                        .ok_or_else(|| {
                            format!("Poll '{}' has options 1 to {}", poll, found.options.len())
                        })?;

                    let db = open_db(&settings)?;
                    let replaced = db.cast_vote(&identity, &poll, index)?;

                    if json {
                        println!(
                            "{}",
                            serde_json::to_string(&JsonOutput::ok(serde_json::json!({
                                "poll_id": poll,
                                "option": index + 1,
                                "replaced": replaced
                            })))?
                        );
                    } else if replaced {
                        println!("Vote changed to '{}'.", found.options[index]);
                    } else {
                        println!("Voted for '{}'.", found.options[index]);
                    }
                }

                PollCommands::Results { poll, identity } => {
                    let Some(found) = catalog.poll(&poll) else {
                        return not_found(json, &format!("Poll '{}' not found", poll));
                    };

                    let db = open_db(&settings)?;
                    let tally = db.poll_tally(&poll)?;
                    let mine = match identity.resolve() {
                        Some(identity) => db.current_vote(&identity, &poll)?,
                        None => None,
                    };

                    // Options nobody voted for still show up with zero
                    let votes: Vec<i64> = (0..found.options.len())
                        .map(|i| {
                            tally
                                .iter()
                                .find(|t| t.option == i)
                                .map_or(0, |t| t.votes)
                        })
                        .collect();
                    let total: i64 = votes.iter().sum();

                    if json {
                        println!(
                            "{}",
                            serde_json::to_string(&JsonOutput::ok(serde_json::json!({
                                "poll_id": found.id,
                                "question": found.question,
                                "options": found.options,
                                "votes": votes,
                                "total": total,
                                "my_vote": mine
                            })))?
                        );
                    } else {
                        println!("{}", found.question);
                        println!("{}", "-".repeat(50));
                        for (i, (option, count)) in found.options.iter().zip(&votes).enumerate() {
                            let share = if total == 0 {
                                0.0
                            } else {
                                *count as f64 / total as f64 * 100.0
                            };
                            let marker = if mine == Some(i) { "*" } else { " " };
                            println!(
                                "{} {:<30} {:>5} {:>6.1}%",
                                marker,
                                truncate(option, 30),
                                count,
                                share
                            );
                        }
                        println!("Total votes: {}", total);
                    }
                }
            }
        }

        Commands::Quiz(quiz_cmd) => {
            let catalog = Catalog::load_dir(&settings.content_dir)?;

            match quiz_cmd {
                QuizCommands::List => {
                    if json {
                        let quizzes: Vec<_> = catalog.quizzes.values().collect();
                        println!("{}", serde_json::to_string(&JsonOutput::ok(&quizzes))?);
                    } else if catalog.quizzes.is_empty() {
                        println!("No quizzes found.");
                    } else {
                        println!("{:<16} {:<40} QUESTIONS", "ID", "TITLE");
                        println!("{}", "-".repeat(70));
                        for quiz in catalog.quizzes.values() {
                            println!(
                                "{:<16} {:<40} {}",
                                quiz.id,
                                truncate(&quiz.title, 38),
                                quiz.questions.len()
                            );
                        }
                    }
                }

                QuizCommands::Answer {
                    quiz,
                    question,
                    choice,
                    identity,
                } => {
                    let identity = identity.require()?;
                    let Some(found) = catalog.quiz(&quiz).and_then(|q| q.question(&question)) else {
                        return not_found(
                            json,
                            &format!("Question '{}' not found in quiz '{}'", question, quiz),
                        );
                    };
                    let index = interactive::choice_index(choice, found.options.len())
                        .ok_or_else(|| {
                            format!(
                                "Question '{}' has options 1 to {}",
                                question,
                                found.options.len()
                            )
                        })?;

                    let correct = found.is_correct(index);
                    let db = open_db(&settings)?;
                    db.record_quiz_answer(&identity, &quiz, &question, index, correct)?;

                    if json {
                        println!(
                            "{}",
                            serde_json::to_string(&JsonOutput::ok(quiz_answer_payload(
                                found, index
                            )))?
                        );
                    } else if correct {
                        println!("Correct!");
                    } else {
                        let answer = found
                            .options
                            .get(found.answer)
                            .map(String::as_str)
                            .unwrap_or("?");
                        println!("Wrong. The answer was '{}'.", answer);
                    }
                }

                QuizCommands::Stats { quiz } => {
                    let db = open_db(&settings)?;
                    let stats = db.quiz_stats(&quiz)?;

                    if json {
                        println!("{}", serde_json::to_string(&JsonOutput::ok(&stats))?);
                    } else if stats.is_empty() {
                        println!("No answers recorded for '{}'.", quiz);
                    } else {
                        println!(
                            "{:<16} {:>9} {:>8} {:>9}",
                            "QUESTION", "ATTEMPTS", "CORRECT", "ACCURACY"
                        );
                        println!("{}", "-".repeat(45));
                        for s in &stats {
                            println!(
                                "{:<16} {:>9} {:>8} {:>8.0}%",
                                truncate(&s.question_id, 16),
                                s.attempts,
                                s.correct,
                                s.accuracy()
                            );
                        }
                    }
                }
            }
        }

        Commands::Merge { device, user } => {
            let db = open_db(&settings)?;
            let report = db.merge_device(&device, &user)?;
            let linked = db.linked_users(&device)?;

            if json {
                println!(
                    "{}",
                    serde_json::to_string(&JsonOutput::ok(serde_json::json!({
                        "report": report,
                        "linked_users": linked
                    })))?
                );
            } else if report.is_empty() {
                println!("Nothing to merge from device {}.", device);
            } else {
                println!("Merged device {} into user {}:", device, user);
                println!("  Results: {}", report.results);
                println!("  Quiz answers: {}", report.quiz_answers);
                println!("  Poll votes: {}", report.poll_votes);
                if report.poll_votes_dropped > 0 {
                    println!(
                        "  Poll votes dropped (user already voted): {}",
                        report.poll_votes_dropped
                    );
                }
            }
        }

        Commands::Stats => {
            let db = open_db(&settings)?;
            let stats = db.get_stats()?;
            if json {
                println!("{}", serde_json::to_string(&JsonOutput::ok(&stats))?);
            } else {
                println!("=== Statistics ===");
                println!("Results stored: {}", stats.total_results);
                println!("Tests taken: {}", stats.tests_taken);
                println!("Poll votes: {}", stats.total_votes);
                println!("Quiz answers: {}", stats.total_quiz_answers);
                println!("Quiz accuracy: {:.1}%", stats.quiz_accuracy);
                println!("Linked devices: {}", stats.linked_devices);
            }
        }

        Commands::Validate => {
            let catalog = Catalog::load_dir(&settings.content_dir)?;
            let issues = validate::validate_catalog(&catalog, &settings.scoring);

            if json {
                println!(
                    "{}",
                    serde_json::to_string(&JsonOutput::ok(serde_json::json!({
                        "valid": issues.is_empty(),
                        "issues": issues
                    })))?
                );
            } else if issues.is_empty() {
                println!(
                    "Content OK: {} tests, {} polls, {} quizzes.",
                    catalog.tests.len(),
                    catalog.polls.len(),
                    catalog.quizzes.len()
                );
            } else {
                for issue in &issues {
                    println!("- {}", issue);
                }
            }

            if !issues.is_empty() {
                return Err(format!("{} content issue(s) found", issues.len()).into());
            }
        }
    }

    Ok(())
}

fn open_db(settings: &Settings) -> Result<Database, rusqlite::Error> {
    let db = Database::open(&settings.db_path)?;
    db.init()?;
    Ok(db)
}

fn save_outcome(
    settings: &Settings,
    identity: Option<Identity>,
    outcome: &Outcome,
) -> Result<Option<i64>, rusqlite::Error> {
    let Some(identity) = identity else {
        return Ok(None);
    };
    let db = open_db(settings)?;
    let id = db.save_result(&identity, outcome)?;
    Ok(Some(id))
}

fn not_found(json: bool, msg: &str) -> Result<(), Box<dyn std::error::Error>> {
    if json {
        println!("{}", serde_json::to_string(&JsonOutput::<()>::err(msg))?);
    } else {
        println!("{}.", msg);
    }
    Ok(())
}

fn print_test(test: &TestDefinition) {
    println!("Test: {}", test.title);
    println!("ID: {}", test.id);
    if let Some(desc) = &test.description {
        println!("Description: {}", desc);
    }

    let base = test.dimension_counts(TestMode::Base);
    let deep = test.dimension_counts(TestMode::Deep);
    println!();
    println!("--- Dimensions ---");
    for (key, dimension) in &test.dimensions {
        let name = dimension.name.as_deref().unwrap_or(key);
        let base_count = base.get(key).copied().unwrap_or(0);
        let deep_count = deep.get(key).copied().unwrap_or(0);
        println!("{:<20} {} questions ({} in deep mode)", name, base_count, deep_count);
    }

    println!();
    println!("--- Results ---");
    for label in &test.result_labels {
        let condition = if label.condition.is_empty() {
            "-".to_string()
        } else {
            label
                .condition
                .iter()
                .map(|(dim, level)| format!("{}={}", dim, level.as_str()))
                .collect::<Vec<_>>()
                .join(", ")
        };
        let default = if label.is_default { " (default)" } else { "" };
        println!("{:<24} {}{}", label.name, condition, default);
    }
}

fn report_outcome(
    json: bool,
    test: &TestDefinition,
    outcome: &Outcome,
    config: &ScoringConfig,
    saved: Option<i64>,
) -> Result<(), serde_json::Error> {
    if json {
        println!(
            "{}",
            serde_json::to_string(&JsonOutput::ok(serde_json::json!({
                "outcome": outcome,
                "saved_id": saved
            })))?
        );
        return Ok(());
    }

    let result = &outcome.result;
    println!();
    println!("=== {} ===", test.title);
    match &result.emoji {
        Some(emoji) => println!("You are: {} {}", emoji, result.name),
        None => println!("You are: {}", result.name),
    }
    if let Some(desc) = &result.description {
        println!("{}", desc);
    }
    println!(
        "Answered {}/{} ({} mode, {} match)",
        outcome.answered,
        outcome.total,
        outcome.mode.as_str(),
        outcome.match_kind.as_str()
    );
    if outcome.match_kind == MatchKind::Partial {
        println!(
            "Closest match: {} of {} conditions met",
            outcome.agreements,
            result.condition.len()
        );
    }

    let counts = test.dimension_counts(outcome.mode);
    println!();
    println!("{:<20} {:>7} {:>7} LEVEL", "DIMENSION", "SCORE", "PCT");
    println!("{}", "-".repeat(45));
    for (key, level) in &outcome.levels {
        let name = test
            .dimensions
            .get(key)
            .and_then(|d| d.name.as_deref())
            .unwrap_or(key);
        let count = counts
            .get(key)
            .copied()
            .unwrap_or(config.fallback_question_count);
        let max = config.max_score(count);
        let score = outcome.scores.get(key);
        println!(
            "{:<20} {:>7} {:>6.0}% {}",
            truncate(name, 20),
            format!("{}/{}", score, max),
            percentage(score, max),
            level.label()
        );
    }

    if let Some(id) = saved {
        println!();
        println!("Saved as result #{}.", id);
    }
    Ok(())
}

// Option numbers in output are 1-based, like the input
fn quiz_answer_payload(question: &TriviaQuestion, choice: usize) -> serde_json::Value {
    serde_json::json!({
        "correct": question.is_correct(choice),
        "choice": choice + 1,
        "answer": question.answer + 1
    })
}

/// Parse `q1=3,q2=1` into question ids with 0-based option indexes.
fn parse_answers(pairs: &str) -> Result<Vec<(String, usize)>, String> {
    pairs
        .split(',')
        .map(str::trim)
        .filter(|pair| !pair.is_empty())
        .map(|pair| {
            let (question, choice) = pair
                .split_once('=')
                .ok_or_else(|| format!("Invalid answer '{}', expected <question>=<option>", pair))?;
            let question = question.trim();
            let choice = choice.trim();
            let n: usize = choice
                .parse()
                .map_err(|_| format!("Invalid option '{}' for question '{}'", choice, question))?;
            if n == 0 {
                return Err(format!("Options start at 1 (question '{}')", question));
            }
            Ok((question.to_string(), n - 1))
        })
        .collect()
}

fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    mod truncate_tests {
        use super::*;

        #[test]
        fn truncate_short_string() {
            assert_eq!(truncate("hello", 10), "hello");
        }

        #[test]
        fn truncate_exact_length() {
            assert_eq!(truncate("hello", 5), "hello");
        }

        #[test]
        fn truncate_long_string() {
            assert_eq!(truncate("hello world", 8), "hello...");
        }

        #[test]
        fn truncate_multibyte() {
            assert_eq!(truncate("Schrödinger's cat", 8), "Schrö...");
        }

        #[test]
        fn truncate_empty_string() {
            assert_eq!(truncate("", 10), "");
        }
    }

    mod parse_answers_tests {
        use super::*;

        #[test]
        fn parses_pairs_to_zero_based() {
            let parsed = parse_answers("c1=3, c2=1").unwrap();
            assert_eq!(
                parsed,
                vec![("c1".to_string(), 2), ("c2".to_string(), 0)]
            );
        }

        #[test]
        fn ignores_empty_segments() {
            assert_eq!(parse_answers("c1=1,,").unwrap().len(), 1);
            assert!(parse_answers("").unwrap().is_empty());
        }

        #[test]
        fn rejects_missing_equals() {
            assert!(parse_answers("c1").unwrap_err().contains("expected <question>=<option>"));
        }

        #[test]
        fn rejects_bad_option() {
            assert!(parse_answers("c1=x").is_err());
            assert!(parse_answers("c1=0").unwrap_err().contains("start at 1"));
        }
    }

    mod quiz_payload_tests {
        use super::*;

        fn question() -> TriviaQuestion {
            TriviaQuestion {
                id: "p1".to_string(),
                prompt: "Which element has the symbol Fe?".to_string(),
                options: vec!["Fluorine".to_string(), "Iron".to_string(), "Lead".to_string()],
                answer: 1,
            }
        }

        #[test]
        fn answer_is_reported_one_based() {
            let payload = quiz_answer_payload(&question(), 0);
            assert_eq!(payload["correct"], false);
            assert_eq!(payload["choice"], 1);
            assert_eq!(payload["answer"], 2);
        }

        #[test]
        fn correct_choice_matches_answer_number() {
            let payload = quiz_answer_payload(&question(), 1);
            assert_eq!(payload["correct"], true);
            assert_eq!(payload["choice"], payload["answer"]);
        }
    }

    mod cli_parsing_tests {
        use super::*;

        #[test]
        fn parse_init_command() {
            let cli = Cli::try_parse_from(["chemi", "init"]).unwrap();
            assert!(!cli.json);
            assert!(!cli.verbose);
            assert!(matches!(cli.command, Commands::Init));
        }

        #[test]
        fn parse_json_flag_global() {
            let cli1 = Cli::try_parse_from(["chemi", "--json", "stats"]).unwrap();
            assert!(cli1.json);

            let cli2 = Cli::try_parse_from(["chemi", "stats", "--json"]).unwrap();
            assert!(cli2.json);
        }

        #[test]
        fn parse_content_dir() {
            let cli =
                Cli::try_parse_from(["chemi", "--content", "/srv/chemi", "validate"]).unwrap();
            assert_eq!(cli.content, Some(PathBuf::from("/srv/chemi")));
            assert!(matches!(cli.command, Commands::Validate));
        }

        #[test]
        fn parse_test_list() {
            let cli = Cli::try_parse_from(["chemi", "test", "list"]).unwrap();
            assert!(matches!(cli.command, Commands::Test(TestCommands::List)));
        }

        #[test]
        fn parse_test_take() {
            let cli = Cli::try_parse_from([
                "chemi", "test", "take", "cat", "--deep", "--shuffle", "--device", "d-1",
            ])
            .unwrap();
            match cli.command {
                Commands::Test(TestCommands::Take {
                    id,
                    deep,
                    shuffle,
                    identity,
                }) => {
                    assert_eq!(id, "cat");
                    assert!(deep);
                    assert!(shuffle);
                    assert_eq!(identity.resolve(), Some(Identity::Device("d-1".to_string())));
                }
                _ => panic!("Expected Test Take command"),
            }
        }

        #[test]
        fn parse_test_score() {
            let cli = Cli::try_parse_from(["chemi", "test", "score", "cat", "-a", "c1=3,c2=1"])
                .unwrap();
            match cli.command {
                Commands::Test(TestCommands::Score {
                    id,
                    answers,
                    deep,
                    identity,
                }) => {
                    assert_eq!(id, "cat");
                    assert_eq!(answers, "c1=3,c2=1");
                    assert!(!deep);
                    assert!(identity.resolve().is_none());
                }
                _ => panic!("Expected Test Score command"),
            }
        }

        #[test]
        fn device_and_user_conflict() {
            let result = Cli::try_parse_from([
                "chemi", "history", "--device", "d-1", "--user", "u-1",
            ]);
            assert!(result.is_err());
        }

        #[test]
        fn history_requires_identity_at_runtime() {
            let cli = Cli::try_parse_from(["chemi", "history"]).unwrap();
            match cli.command {
                Commands::History { identity, test } => {
                    assert!(test.is_none());
                    assert!(identity.require().is_err());
                }
                _ => panic!("Expected History command"),
            }
        }

        #[test]
        fn parse_poll_vote() {
            let cli =
                Cli::try_parse_from(["chemi", "poll", "vote", "naps", "2", "--user", "u-1"])
                    .unwrap();
            match cli.command {
                Commands::Poll(PollCommands::Vote {
                    poll,
                    option,
                    identity,
                }) => {
                    assert_eq!(poll, "naps");
                    assert_eq!(option, 2);
                    assert_eq!(identity.require(), Ok(Identity::User("u-1".to_string())));
                }
                _ => panic!("Expected Poll Vote command"),
            }
        }

        #[test]
        fn parse_quiz_answer() {
            let cli = Cli::try_parse_from([
                "chemi", "quiz", "answer", "facts", "t1", "2", "--device", "d-1",
            ])
            .unwrap();
            match cli.command {
                Commands::Quiz(QuizCommands::Answer {
                    quiz,
                    question,
                    choice,
                    ..
                }) => {
                    assert_eq!(quiz, "facts");
                    assert_eq!(question, "t1");
                    assert_eq!(choice, 2);
                }
                _ => panic!("Expected Quiz Answer command"),
            }
        }

        #[test]
        fn parse_merge_requires_both_ids() {
            let cli =
                Cli::try_parse_from(["chemi", "merge", "--device", "d-1", "--user", "u-1"])
                    .unwrap();
            match cli.command {
                Commands::Merge { device, user } => {
                    assert_eq!(device, "d-1");
                    assert_eq!(user, "u-1");
                }
                _ => panic!("Expected Merge command"),
            }

            assert!(Cli::try_parse_from(["chemi", "merge", "--device", "d-1"]).is_err());
        }

        #[test]
        fn parse_rank() {
            let cli = Cli::try_parse_from(["chemi", "rank", "cat"]).unwrap();
            assert!(matches!(cli.command, Commands::Rank { test } if test == "cat"));
        }

        #[test]
        fn parse_invalid_command_fails() {
            assert!(Cli::try_parse_from(["chemi", "invalid"]).is_err());
            assert!(Cli::try_parse_from(["chemi", "test", "show"]).is_err());
        }
    }
}
