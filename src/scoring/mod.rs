//! Turning answers into a result label: sum answer scores per dimension,
//! classify each dimension as high/medium/low, then match the levels against
//! a test's result labels.

pub mod aggregate;
pub mod level;
pub mod matcher;

pub use aggregate::{Answer, ScoreMap};
pub use level::{percentage, ConfigError, ScoringConfig};
pub use matcher::{DimensionCounts, LevelMap, MatchKind, Matcher, ResultLabel, ScoringError};
