use thiserror::Error;

use crate::candidates::ConnectTarget;

/// One failed connection attempt, kept so the final error names every target tried.
#[derive(Debug)]
pub struct CandidateFailure {
    pub target: ConnectTarget,
    pub error: sqlx::Error,
}

impl std::fmt::Display for CandidateFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.target, self.error)
    }
}

#[derive(Error, Debug)]
pub enum ObservationsError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Config error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("No database candidate reachable: {}", join_failures(.0))]
    ExhaustedCandidates(Vec<CandidateFailure>),

    #[error("Unexpected row shape: {0}")]
    RowShape(String),
}

fn join_failures(failures: &[CandidateFailure]) -> String {
    if failures.is_empty() {
        return "no candidates configured".to_string();
    }
    failures
        .iter()
        .map(|f| f.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}
