//! Query service for observation sequences and their images.
//!
//! The service is built once at startup and shared. Its database pool is
//! created on first use: candidates are tried in order (Cloud SQL socket,
//! then the development host) and the first that accepts a connection is
//! kept for the life of the process. If none does, the pool stays unset and
//! the next request starts over from the first candidate.

use async_trait::async_trait;
use sqlx::PgPool;
use tokio::sync::OnceCell;

use crate::candidates::ConnectionCandidates;
use crate::config::DatabaseConfig;
use crate::db::{self, ConnectOutcome};
use crate::error::ObservationsError;
use crate::models::Observations;
use crate::queries;

/// Read access to observations, as seen by the HTTP layer.
#[async_trait]
pub trait ObservationSource: Send + Sync {
    /// Images of `sequence_id` when given, otherwise every sequence with its image count.
    async fn get_observations(
        &self,
        sequence_id: Option<&str>,
    ) -> Result<Observations, ObservationsError>;

    /// Server version string of the backing database.
    async fn health(&self) -> Result<String, ObservationsError>;
}

pub struct ObservationService {
    config: DatabaseConfig,
    candidates: ConnectionCandidates,
    pool: OnceCell<PgPool>,
}

impl ObservationService {
    pub fn new(config: DatabaseConfig) -> Self {
        let candidates = ConnectionCandidates::from_config(&config);
        Self::with_candidates(config, candidates)
    }

    pub fn with_candidates(config: DatabaseConfig, candidates: ConnectionCandidates) -> Self {
        Self {
            config,
            candidates,
            pool: OnceCell::new(),
        }
    }

    /// Whether a pool has been established yet.
    pub fn is_ready(&self) -> bool {
        self.pool.initialized()
    }

    /// Get the pool, connecting on first call. Concurrent first callers wait
    /// on a single connection attempt rather than racing.
    pub async fn pool(&self) -> Result<&PgPool, ObservationsError> {
        self.pool
            .get_or_try_init(|| async {
                match db::connect_first(&self.candidates, &self.config).await {
                    ConnectOutcome::Connected { pool, .. } => Ok(pool),
                    ConnectOutcome::ExhaustedCandidates(failures) => {
                        tracing::error!(
                            attempts = failures.len(),
                            "All database candidates failed; pool left uninitialized"
                        );
                        Err(ObservationsError::ExhaustedCandidates(failures))
                    }
                }
            })
            .await
    }
}

#[async_trait]
impl ObservationSource for ObservationService {
    async fn get_observations(
        &self,
        sequence_id: Option<&str>,
    ) -> Result<Observations, ObservationsError> {
        let pool = self.pool().await?;

        // Dropping the pooled connection hands it back, on error paths too.
        // No transaction is opened: each statement autocommits.
        let mut conn = pool.acquire().await?;

        let observations = match sequence_id.filter(|id| !id.is_empty()) {
            Some(id) => {
                Observations::Images(queries::fetch_sequence_images(&mut *conn, id).await?)
            }
            None => Observations::Sequences(queries::fetch_sequences_with_counts(&mut *conn).await?),
        };

        tracing::debug!(
            sequence_id = sequence_id.unwrap_or(""),
            rows = observations.len(),
            "Observations query complete"
        );

        Ok(observations)
    }

    async fn health(&self) -> Result<String, ObservationsError> {
        let pool = self.pool().await?;
        Ok(db::health_check(pool).await?)
    }
}
