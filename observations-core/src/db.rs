use sqlx::{postgres::PgPoolOptions, PgPool};

use crate::candidates::{ConnectTarget, ConnectionCandidates};
use crate::config::DatabaseConfig;
use crate::error::CandidateFailure;

/// Result of walking the candidate list.
#[derive(Debug)]
pub enum ConnectOutcome {
    Connected { pool: PgPool, target: ConnectTarget },
    ExhaustedCandidates(Vec<CandidateFailure>),
}

/// Open a single-connection pool against one target.
///
/// The pool holds exactly one live connection (min = max = 1), so concurrent
/// callers queue on acquisition. Connecting eagerly surfaces a bad target here
/// instead of on the first query.
pub async fn connect(
    target: &ConnectTarget,
    config: &DatabaseConfig,
    candidates: &ConnectionCandidates,
) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .min_connections(1)
        .max_connections(1)
        .acquire_timeout(candidates.acquire_timeout)
        .connect_with(target.connect_options(config))
        .await
}

/// Try each candidate in order, logging failures, and stop at the first success.
pub async fn connect_first(
    candidates: &ConnectionCandidates,
    config: &DatabaseConfig,
) -> ConnectOutcome {
    let mut failures = Vec::with_capacity(candidates.targets.len());

    for target in &candidates.targets {
        match connect(target, config, candidates).await {
            Ok(pool) => {
                tracing::info!(candidate = %target, "Connected to metadata database");
                return ConnectOutcome::Connected {
                    pool,
                    target: target.clone(),
                };
            }
            Err(e) => {
                tracing::warn!(candidate = %target, error = %e, "Database connection failed, trying next candidate");
                failures.push(CandidateFailure {
                    target: target.clone(),
                    error: e,
                });
            }
        }
    }

    ConnectOutcome::ExhaustedCandidates(failures)
}

pub async fn health_check(pool: &PgPool) -> Result<String, sqlx::Error> {
    let row: (String,) = sqlx::query_as("SELECT version()").fetch_one(pool).await?;
    Ok(row.0)
}
