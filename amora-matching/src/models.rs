use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::schema::{likes, matches, messages, users};

// --- User ---

#[derive(Debug, Queryable, Selectable, Identifiable, Serialize, Clone, PartialEq)]
#[diesel(table_name = users)]
pub struct User {
    pub id: Uuid,
    pub display_name: String,
    pub age: Option<i32>,
    pub gender: Option<String>,
    pub bio: Option<String>,
    pub photo_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Insert-or-update payload. `None` fields keep the stored value (or the
/// column default on first insert).
#[derive(Debug, Insertable, AsChangeset, Deserialize, Clone, Default)]
#[diesel(table_name = users)]
pub struct UserUpsert {
    pub id: Uuid,
    pub display_name: Option<String>,
    pub age: Option<i32>,
    pub gender: Option<String>,
    pub bio: Option<String>,
    pub photo_url: Option<String>,
}

impl UserUpsert {
    pub fn minimal(id: Uuid) -> Self {
        Self { id, ..Default::default() }
    }
}

/// Public subset shown next to likes and matches.
#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct ProfileCard {
    pub id: Uuid,
    pub display_name: String,
    pub photo_url: Option<String>,
}

impl From<&User> for ProfileCard {
    fn from(u: &User) -> Self {
        Self {
            id: u.id,
            display_name: u.display_name.clone(),
            photo_url: u.photo_url.clone(),
        }
    }
}

// --- Like ---

#[derive(Debug, Queryable, Selectable, Identifiable, Serialize, Clone, PartialEq)]
#[diesel(table_name = likes)]
pub struct Like {
    pub id: Uuid,
    pub sender_id: Uuid,
    pub recipient_id: Uuid,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = likes)]
pub struct NewLike {
    pub id: Uuid,
    pub sender_id: Uuid,
    pub recipient_id: Uuid,
}

// --- Match ---

/// One direction of a mutual match, as seen from `user_id`.
#[derive(Debug, Queryable, Selectable, Identifiable, Serialize, Clone, PartialEq)]
#[diesel(table_name = matches)]
pub struct Match {
    pub id: Uuid,
    pub pair_id: Uuid,
    pub user_id: Uuid,
    pub partner_id: Uuid,
    pub is_mutual: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = matches)]
pub struct NewMatch {
    pub id: Uuid,
    pub pair_id: Uuid,
    pub user_id: Uuid,
    pub partner_id: Uuid,
    pub is_mutual: bool,
}

/// Both directions of a match, addressed by the shared `pair_id`.
#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct MatchPair {
    pub pair_id: Uuid,
    pub user_a_id: Uuid,
    pub user_b_id: Uuid,
    pub created_at: DateTime<Utc>,
}

impl MatchPair {
    /// Build a pair from its two rows. Returns `None` unless the rows mirror each other.
    pub fn from_rows(a: &Match, b: &Match) -> Option<Self> {
        let mirrored = a.pair_id == b.pair_id && a.user_id == b.partner_id && a.partner_id == b.user_id;
        mirrored.then(|| Self {
            pair_id: a.pair_id,
            user_a_id: a.user_id,
            user_b_id: a.partner_id,
            created_at: a.created_at.min(b.created_at),
        })
    }

    pub fn involves(&self, user_id: Uuid) -> bool {
        self.user_a_id == user_id || self.user_b_id == user_id
    }

    pub fn partner_of(&self, user_id: Uuid) -> Option<Uuid> {
        if self.user_a_id == user_id {
            Some(self.user_b_id)
        } else if self.user_b_id == user_id {
            Some(self.user_a_id)
        } else {
            None
        }
    }

    pub fn key(&self) -> PairKey {
        PairKey::new(self.user_a_id, self.user_b_id)
    }
}

/// Unordered pair of users, normalised so `{a, b}` and `{b, a}` are equal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct PairKey {
    pub low: Uuid,
    pub high: Uuid,
}

impl PairKey {
    pub fn new(a: Uuid, b: Uuid) -> Self {
        let (low, high) = if a < b { (a, b) } else { (b, a) };
        Self { low, high }
    }
}

impl std::fmt::Display for PairKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.low, self.high)
    }
}

// --- Message ---

#[derive(Debug, Queryable, Selectable, Identifiable, Serialize, Clone, PartialEq)]
#[diesel(table_name = messages)]
pub struct Message {
    pub id: Uuid,
    pub seq: i64,
    pub pair_id: Uuid,
    pub sender_id: Uuid,
    pub recipient_id: Uuid,
    pub body: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = messages)]
pub struct NewMessage<'a> {
    pub id: Uuid,
    pub pair_id: Uuid,
    pub sender_id: Uuid,
    pub recipient_id: Uuid,
    pub body: &'a str,
}
