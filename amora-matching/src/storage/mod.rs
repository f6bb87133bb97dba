//! Storage contract consumed by the matching flows.
//!
//! Every method is a single round trip with per-row consistency. The only
//! multi-row write is [`Storage::create_match_pair`], which is all-or-nothing.

use async_trait::async_trait;
use uuid::Uuid;

use crate::models::{Like, Match, MatchPair, Message, User, UserUpsert};

mod memory;
mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// Infrastructure failure. The caller may retry the whole action.
    #[error("storage unavailable: {0}")]
    Unavailable(String),

    /// The write breaks a foreign key or check constraint. Retrying the same
    /// request fails the same way.
    #[error("storage rejected write: {0}")]
    Rejected(String),

    /// Stored rows contradict each other, e.g. a match pair that does not mirror.
    #[error("storage inconsistency: {0}")]
    Inconsistent(String),
}

pub type StorageResult<T> = Result<T, StorageError>;

#[derive(Debug, Clone, PartialEq)]
pub enum Inserted {
    Created(Like),
    AlreadyExists,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Deleted {
    Deleted,
    NotFound,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PairCreated {
    Created(MatchPair),
    /// Both rows were already present; carries the stored pair.
    AlreadyExists(MatchPair),
}

impl PairCreated {
    pub fn pair(&self) -> &MatchPair {
        match self {
            Self::Created(p) | Self::AlreadyExists(p) => p,
        }
    }
}

#[async_trait]
pub trait Storage: Send + Sync {
    async fn get_user(&self, id: Uuid) -> StorageResult<Option<User>>;

    async fn upsert_user(&self, user: UserUpsert) -> StorageResult<User>;

    async fn insert_like(&self, sender: Uuid, recipient: Uuid) -> StorageResult<Inserted>;

    async fn delete_like(&self, sender: Uuid, recipient: Uuid) -> StorageResult<Deleted>;

    async fn find_like(&self, sender: Uuid, recipient: Uuid) -> StorageResult<Option<Like>>;

    /// Pending likes sent by `sender`, oldest first.
    async fn likes_from(&self, sender: Uuid) -> StorageResult<Vec<Like>>;

    /// Pending likes addressed to `recipient`, oldest first.
    async fn likes_to(&self, recipient: Uuid) -> StorageResult<Vec<Like>>;

    /// Create both mirrored rows for `{a, b}` or neither.
    ///
    /// If exactly one direction is already stored (a half pair), the missing
    /// direction is written with the same `pair_id` and the result is
    /// `Created`: a half pair is never returned to callers.
    async fn create_match_pair(&self, a: Uuid, b: Uuid) -> StorageResult<PairCreated>;

    async fn find_match_pair(&self, a: Uuid, b: Uuid) -> StorageResult<Option<MatchPair>>;

    async fn get_match_pair(&self, pair_id: Uuid) -> StorageResult<Option<MatchPair>>;

    /// Rows where `user_id` is the owner, newest first.
    async fn list_matches_for(&self, user_id: Uuid) -> StorageResult<Vec<Match>>;

    /// Up to `limit` users whose id is not in `exclude`.
    async fn list_candidates(&self, exclude: &[Uuid], limit: usize) -> StorageResult<Vec<User>>;

    async fn users_by_ids(&self, ids: &[Uuid]) -> StorageResult<Vec<User>>;

    async fn append_message(
        &self,
        pair_id: Uuid,
        sender: Uuid,
        recipient: Uuid,
        body: &str,
    ) -> StorageResult<Message>;

    /// All messages of a pair ordered by `(created_at, seq)` ascending.
    async fn list_messages(&self, pair_id: Uuid) -> StorageResult<Vec<Message>>;

    async fn ping(&self) -> StorageResult<()>;
}
