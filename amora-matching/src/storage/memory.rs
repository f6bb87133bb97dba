use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::Mutex;
use uuid::Uuid;

use super::{Deleted, Inserted, PairCreated, Storage, StorageError, StorageResult};
use crate::models::{Like, Match, MatchPair, Message, PairKey, User, UserUpsert};

#[derive(Default)]
struct Tables {
    users: HashMap<Uuid, User>,
    likes: HashMap<(Uuid, Uuid), Like>,
    matches: Vec<Match>,
    messages: Vec<Message>,
    next_seq: i64,
}

impl Tables {
    fn match_row(&self, user_id: Uuid, partner_id: Uuid) -> Option<&Match> {
        self.matches
            .iter()
            .find(|m| m.user_id == user_id && m.partner_id == partner_id)
    }

    fn pair_for(&self, a: Uuid, b: Uuid) -> StorageResult<Option<MatchPair>> {
        let key = PairKey::new(a, b);
        match (self.match_row(key.low, key.high), self.match_row(key.high, key.low)) {
            (Some(low), Some(high)) => MatchPair::from_rows(low, high)
                .map(Some)
                .ok_or_else(|| StorageError::Inconsistent(format!("match rows for {key} do not mirror"))),
            _ => Ok(None),
        }
    }
}

/// Process-local store with the same contract as [`super::PgStore`].
///
/// All tables sit behind one mutex, so every method is atomic. An optional
/// per-call latency is applied before the mutex is taken, which lets tests
/// interleave concurrent flows the way network round trips would.
#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
    latency: Option<Duration>,
    unavailable: AtomicBool,
    failing_deletes: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_latency(latency: Duration) -> Self {
        Self {
            latency: Some(latency),
            ..Self::default()
        }
    }

    /// Make every subsequent call fail with [`StorageError::Unavailable`].
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Make `delete_like` fail while every other call keeps working.
    pub fn set_deletes_failing(&self, failing: bool) {
        self.failing_deletes.store(failing, Ordering::SeqCst);
    }

    /// Write a single match direction, as a crashed non-transactional writer would.
    pub async fn insert_half_pair(&self, user_id: Uuid, partner_id: Uuid) -> Uuid {
        let pair_id = Uuid::now_v7();
        self.tables.lock().await.matches.push(Match {
            id: Uuid::now_v7(),
            pair_id,
            user_id,
            partner_id,
            is_mutual: true,
            created_at: Utc::now(),
        });
        pair_id
    }

    /// Number of match rows in either direction between `a` and `b`.
    pub async fn match_rows_between(&self, a: Uuid, b: Uuid) -> usize {
        self.tables
            .lock()
            .await
            .matches
            .iter()
            .filter(|m| PairKey::new(m.user_id, m.partner_id) == PairKey::new(a, b))
            .count()
    }

    async fn round_trip(&self) -> StorageResult<()> {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(StorageError::Unavailable("memory store marked unavailable".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl Storage for MemoryStore {
    async fn get_user(&self, id: Uuid) -> StorageResult<Option<User>> {
        self.round_trip().await?;
        Ok(self.tables.lock().await.users.get(&id).cloned())
    }

    async fn upsert_user(&self, user: UserUpsert) -> StorageResult<User> {
        self.round_trip().await?;
        let now = Utc::now();
        let mut tables = self.tables.lock().await;
        let stored = tables.users.entry(user.id).or_insert_with(|| User {
            id: user.id,
            display_name: String::new(),
            age: None,
            gender: None,
            bio: None,
            photo_url: None,
            created_at: now,
            updated_at: now,
        });
        if let Some(name) = user.display_name {
            stored.display_name = name;
        }
        if user.age.is_some() {
            stored.age = user.age;
        }
        if user.gender.is_some() {
            stored.gender = user.gender;
        }
        if user.bio.is_some() {
            stored.bio = user.bio;
        }
        if user.photo_url.is_some() {
            stored.photo_url = user.photo_url;
        }
        stored.updated_at = now;
        Ok(stored.clone())
    }

    async fn insert_like(&self, sender: Uuid, recipient: Uuid) -> StorageResult<Inserted> {
        self.round_trip().await?;
        let mut tables = self.tables.lock().await;
        if tables.likes.contains_key(&(sender, recipient)) {
            return Ok(Inserted::AlreadyExists);
        }
        let like = Like {
            id: Uuid::now_v7(),
            sender_id: sender,
            recipient_id: recipient,
            created_at: Utc::now(),
        };
        tables.likes.insert((sender, recipient), like.clone());
        Ok(Inserted::Created(like))
    }

    async fn delete_like(&self, sender: Uuid, recipient: Uuid) -> StorageResult<Deleted> {
        self.round_trip().await?;
        if self.failing_deletes.load(Ordering::SeqCst) {
            return Err(StorageError::Unavailable("like deletion failed".into()));
        }
        Ok(match self.tables.lock().await.likes.remove(&(sender, recipient)) {
            Some(_) => Deleted::Deleted,
            None => Deleted::NotFound,
        })
    }

    async fn find_like(&self, sender: Uuid, recipient: Uuid) -> StorageResult<Option<Like>> {
        self.round_trip().await?;
        Ok(self.tables.lock().await.likes.get(&(sender, recipient)).cloned())
    }

    async fn likes_from(&self, sender: Uuid) -> StorageResult<Vec<Like>> {
        self.round_trip().await?;
        let tables = self.tables.lock().await;
        let mut likes: Vec<Like> = tables.likes.values().filter(|l| l.sender_id == sender).cloned().collect();
        likes.sort_by_key(|l| (l.created_at, l.id));
        Ok(likes)
    }

    async fn likes_to(&self, recipient: Uuid) -> StorageResult<Vec<Like>> {
        self.round_trip().await?;
        let tables = self.tables.lock().await;
        let mut likes: Vec<Like> = tables.likes.values().filter(|l| l.recipient_id == recipient).cloned().collect();
        likes.sort_by_key(|l| (l.created_at, l.id));
        Ok(likes)
    }

    async fn create_match_pair(&self, a: Uuid, b: Uuid) -> StorageResult<PairCreated> {
        self.round_trip().await?;
        let mut tables = self.tables.lock().await;

        let forward = tables.match_row(a, b).map(|m| m.pair_id);
        let backward = tables.match_row(b, a).map(|m| m.pair_id);

        let now = Utc::now();
        let (pair_id, missing): (Uuid, Vec<(Uuid, Uuid)>) = match (forward, backward) {
            (Some(_), Some(_)) => {
                let pair = tables.pair_for(a, b)?.ok_or_else(|| {
                    StorageError::Inconsistent(format!("match rows for {} do not mirror", PairKey::new(a, b)))
                })?;
                return Ok(PairCreated::AlreadyExists(pair));
            }
            (Some(pair_id), None) => (pair_id, vec![(b, a)]),
            (None, Some(pair_id)) => (pair_id, vec![(a, b)]),
            (None, None) => (Uuid::now_v7(), vec![(a, b), (b, a)]),
        };

        if missing.len() == 1 {
            tracing::warn!(pair = %PairKey::new(a, b), %pair_id, "completing half-written match pair");
        }

        for (user_id, partner_id) in missing {
            tables.matches.push(Match {
                id: Uuid::now_v7(),
                pair_id,
                user_id,
                partner_id,
                is_mutual: true,
                created_at: now,
            });
        }

        let pair = tables
            .pair_for(a, b)?
            .ok_or_else(|| StorageError::Inconsistent("match pair missing after insert".into()))?;
        Ok(PairCreated::Created(pair))
    }

    async fn find_match_pair(&self, a: Uuid, b: Uuid) -> StorageResult<Option<MatchPair>> {
        self.round_trip().await?;
        self.tables.lock().await.pair_for(a, b)
    }

    async fn get_match_pair(&self, pair_id: Uuid) -> StorageResult<Option<MatchPair>> {
        self.round_trip().await?;
        let tables = self.tables.lock().await;
        let row = tables.matches.iter().find(|m| m.pair_id == pair_id).cloned();
        match row {
            Some(m) => tables.pair_for(m.user_id, m.partner_id),
            None => Ok(None),
        }
    }

    async fn list_matches_for(&self, user_id: Uuid) -> StorageResult<Vec<Match>> {
        self.round_trip().await?;
        let tables = self.tables.lock().await;
        let mut rows: Vec<Match> = tables.matches.iter().filter(|m| m.user_id == user_id).cloned().collect();
        rows.sort_by(|x, y| y.created_at.cmp(&x.created_at).then(y.id.cmp(&x.id)));
        Ok(rows)
    }

    async fn list_candidates(&self, exclude: &[Uuid], limit: usize) -> StorageResult<Vec<User>> {
        self.round_trip().await?;
        let tables = self.tables.lock().await;
        let mut users: Vec<User> = tables
            .users
            .values()
            .filter(|u| !exclude.contains(&u.id))
            .cloned()
            .collect();
        users.sort_by_key(|u| (u.created_at, u.id));
        users.truncate(limit);
        Ok(users)
    }

    async fn users_by_ids(&self, ids: &[Uuid]) -> StorageResult<Vec<User>> {
        self.round_trip().await?;
        let tables = self.tables.lock().await;
        Ok(ids.iter().filter_map(|id| tables.users.get(id).cloned()).collect())
    }

    async fn append_message(
        &self,
        pair_id: Uuid,
        sender: Uuid,
        recipient: Uuid,
        body: &str,
    ) -> StorageResult<Message> {
        self.round_trip().await?;
        let mut tables = self.tables.lock().await;
        tables.next_seq += 1;
        let message = Message {
            id: Uuid::now_v7(),
            seq: tables.next_seq,
            pair_id,
            sender_id: sender,
            recipient_id: recipient,
            body: body.to_string(),
            created_at: Utc::now(),
        };
        tables.messages.push(message.clone());
        Ok(message)
    }

    async fn list_messages(&self, pair_id: Uuid) -> StorageResult<Vec<Message>> {
        self.round_trip().await?;
        let tables = self.tables.lock().await;
        let mut messages: Vec<Message> = tables.messages.iter().filter(|m| m.pair_id == pair_id).cloned().collect();
        messages.sort_by_key(|m| (m.created_at, m.seq));
        Ok(messages)
    }

    async fn ping(&self) -> StorageResult<()> {
        self.round_trip().await
    }
}
