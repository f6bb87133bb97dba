use uuid::Uuid;

use amora_shared::errors::{AppError, ErrorCode};

use crate::locks::LockError;
use crate::storage::StorageError;

/// Failures a matching flow reports to its caller.
///
/// Duplicate likes and lost promotion races are resolved inside the flows
/// and never appear here.
#[derive(Debug, thiserror::Error)]
pub enum MatchError {
    #[error("caller is not authenticated")]
    InvalidActor,

    #[error("cannot like yourself")]
    SelfLike,

    #[error("user {0} not found")]
    UnknownUser(Uuid),

    #[error("no pending like from {sender} to {recipient}")]
    NotPending { sender: Uuid, recipient: Uuid },

    #[error("match {0} not found")]
    MatchNotFound(Uuid),

    #[error("caller is not a participant of match {0}")]
    NotMatchParticipant(Uuid),

    #[error("invalid message: {0}")]
    InvalidMessage(&'static str),

    #[error("validation error: {0}")]
    Validation(String),

    #[error("pair lock unavailable: {0}")]
    LockUnavailable(#[from] LockError),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

pub type MatchResult<T> = Result<T, MatchError>;

impl MatchError {
    /// Infrastructure failures the caller can retry unchanged.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::LockUnavailable(_) | Self::Storage(StorageError::Unavailable(_))
        )
    }
}

impl From<MatchError> for AppError {
    fn from(err: MatchError) -> Self {
        let message = err.to_string();
        match err {
            MatchError::InvalidActor => AppError::unauthorized(message),
            MatchError::SelfLike => AppError::new(ErrorCode::CannotLikeSelf, message),
            MatchError::UnknownUser(_) => AppError::new(ErrorCode::ProfileNotFound, message),
            MatchError::NotPending { .. } => AppError::new(ErrorCode::LikeNotPending, message),
            MatchError::MatchNotFound(_) => AppError::new(ErrorCode::MatchNotFound, message),
            MatchError::NotMatchParticipant(_) => AppError::new(ErrorCode::NotMatchParticipant, message),
            MatchError::InvalidMessage(_) => AppError::new(ErrorCode::InvalidMessage, message),
            MatchError::Validation(msg) => AppError::new(ErrorCode::ValidationError, msg),
            MatchError::LockUnavailable(e) => {
                tracing::warn!(error = %e, "pair lock unavailable");
                AppError::unavailable("service temporarily unavailable, retry the action")
            }
            MatchError::Storage(StorageError::Unavailable(e)) => {
                tracing::error!(error = %e, "storage unavailable");
                AppError::unavailable("service temporarily unavailable, retry the action")
            }
            MatchError::Storage(StorageError::Rejected(reason)) => {
                tracing::warn!(%reason, "write rejected by storage constraint");
                AppError::new(ErrorCode::BadRequest, "request conflicts with stored data")
            }
            MatchError::Storage(e @ StorageError::Inconsistent(_)) => AppError::Internal(e.into()),
        }
    }
}
