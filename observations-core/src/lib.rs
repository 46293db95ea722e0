pub mod candidates;
pub mod config;
pub mod db;
pub mod decode;
pub mod error;
pub mod models;
pub mod queries;
pub mod service;

pub use candidates::{ConnectTarget, ConnectionCandidates};
pub use config::ObservationsConfig;
pub use error::{CandidateFailure, ObservationsError};
pub use models::{
    Image, Observations, ObservationsEnvelope, Sequence, SequenceImageJoinRow,
    SequenceWithImageCount,
};
pub use service::{ObservationService, ObservationSource};
