use async_trait::async_trait;
use chrono::Utc;
use diesel::pg::PgConnection;
use diesel::prelude::*;
use diesel::result::DatabaseErrorKind;
use uuid::Uuid;

use amora_shared::clients::db::DbPool;

use super::{Deleted, Inserted, PairCreated, Storage, StorageError, StorageResult};
use crate::models::{Like, Match, MatchPair, Message, NewLike, NewMatch, NewMessage, PairKey, User, UserUpsert};
use crate::schema::{likes, matches, messages, users};

impl From<diesel::result::Error> for StorageError {
    fn from(err: diesel::result::Error) -> Self {
        match err {
            diesel::result::Error::DatabaseError(
                kind @ (DatabaseErrorKind::ForeignKeyViolation | DatabaseErrorKind::CheckViolation),
                info,
            ) => StorageError::Rejected(format!(
                "{kind:?} on {}: {}",
                info.constraint_name().unwrap_or("unknown constraint"),
                info.message()
            )),
            other => StorageError::Unavailable(other.to_string()),
        }
    }
}

/// PostgreSQL store. Uniqueness of likes and match directions is enforced by
/// the schema; pair creation runs in one transaction.
#[derive(Clone)]
pub struct PgStore {
    pool: DbPool,
}

impl PgStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Run `f` on a pooled connection off the async executor.
    async fn run<T, F>(&self, f: F) -> StorageResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut PgConnection) -> StorageResult<T> + Send + 'static,
    {
        let pool = self.pool.clone();
        tokio::task::spawn_blocking(move || {
            let mut conn = pool
                .get()
                .map_err(|e| StorageError::Unavailable(format!("connection pool: {e}")))?;
            f(&mut conn)
        })
        .await
        .map_err(|e| StorageError::Unavailable(format!("storage task failed: {e}")))?
    }
}

fn pair_rows(conn: &mut PgConnection, a: Uuid, b: Uuid) -> QueryResult<Vec<Match>> {
    matches::table
        .filter(
            matches::user_id
                .eq(a)
                .and(matches::partner_id.eq(b))
                .or(matches::user_id.eq(b).and(matches::partner_id.eq(a))),
        )
        .select(Match::as_select())
        .load(conn)
}

/// Assemble a pair from its stored rows, `user_a` being the lower id.
fn assemble_pair(key: PairKey, rows: &[Match]) -> StorageResult<Option<MatchPair>> {
    let low = rows.iter().find(|m| m.user_id == key.low && m.partner_id == key.high);
    let high = rows.iter().find(|m| m.user_id == key.high && m.partner_id == key.low);
    match (low, high) {
        (Some(low), Some(high)) => MatchPair::from_rows(low, high)
            .map(Some)
            .ok_or_else(|| StorageError::Inconsistent(format!("match rows for {key} do not mirror"))),
        _ => Ok(None),
    }
}

#[async_trait]
impl Storage for PgStore {
    async fn get_user(&self, id: Uuid) -> StorageResult<Option<User>> {
        self.run(move |conn| {
            Ok(users::table
                .find(id)
                .select(User::as_select())
                .first(conn)
                .optional()?)
        })
        .await
    }

    async fn upsert_user(&self, user: UserUpsert) -> StorageResult<User> {
        self.run(move |conn| {
            Ok(diesel::insert_into(users::table)
                .values(&user)
                .on_conflict(users::id)
                .do_update()
                .set((&user, users::updated_at.eq(Utc::now())))
                .returning(User::as_returning())
                .get_result(conn)?)
        })
        .await
    }

    async fn insert_like(&self, sender: Uuid, recipient: Uuid) -> StorageResult<Inserted> {
        self.run(move |conn| {
            let created = diesel::insert_into(likes::table)
                .values(&NewLike {
                    id: Uuid::now_v7(),
                    sender_id: sender,
                    recipient_id: recipient,
                })
                .on_conflict((likes::sender_id, likes::recipient_id))
                .do_nothing()
                .returning(Like::as_returning())
                .get_result(conn)
                .optional()?;
            Ok(match created {
                Some(like) => Inserted::Created(like),
                None => Inserted::AlreadyExists,
            })
        })
        .await
    }

    async fn delete_like(&self, sender: Uuid, recipient: Uuid) -> StorageResult<Deleted> {
        self.run(move |conn| {
            let n = diesel::delete(
                likes::table
                    .filter(likes::sender_id.eq(sender))
                    .filter(likes::recipient_id.eq(recipient)),
            )
            .execute(conn)?;
            Ok(if n > 0 { Deleted::Deleted } else { Deleted::NotFound })
        })
        .await
    }

    async fn find_like(&self, sender: Uuid, recipient: Uuid) -> StorageResult<Option<Like>> {
        self.run(move |conn| {
            Ok(likes::table
                .filter(likes::sender_id.eq(sender))
                .filter(likes::recipient_id.eq(recipient))
                .select(Like::as_select())
                .first(conn)
                .optional()?)
        })
        .await
    }

    async fn likes_from(&self, sender: Uuid) -> StorageResult<Vec<Like>> {
        self.run(move |conn| {
            Ok(likes::table
                .filter(likes::sender_id.eq(sender))
                .order((likes::created_at.asc(), likes::id.asc()))
                .select(Like::as_select())
                .load(conn)?)
        })
        .await
    }

    async fn likes_to(&self, recipient: Uuid) -> StorageResult<Vec<Like>> {
        self.run(move |conn| {
            Ok(likes::table
                .filter(likes::recipient_id.eq(recipient))
                .order((likes::created_at.asc(), likes::id.asc()))
                .select(Like::as_select())
                .load(conn)?)
        })
        .await
    }

    async fn create_match_pair(&self, a: Uuid, b: Uuid) -> StorageResult<PairCreated> {
        let key = PairKey::new(a, b);
        self.run(move |conn| {
            conn.transaction::<_, StorageError, _>(|conn| {
                let existing = pair_rows(conn, a, b)?;
                let pair_id = existing.first().map(|m| m.pair_id).unwrap_or_else(Uuid::now_v7);

                // Always write low->high first so concurrent creators queue on
                // the same unique key instead of deadlocking.
                let mut inserted = 0;
                for (user_id, partner_id) in [(key.low, key.high), (key.high, key.low)] {
                    if existing.iter().any(|m| m.user_id == user_id) {
                        continue;
                    }
                    inserted += diesel::insert_into(matches::table)
                        .values(&NewMatch {
                            id: Uuid::now_v7(),
                            pair_id,
                            user_id,
                            partner_id,
                            is_mutual: true,
                        })
                        .on_conflict((matches::user_id, matches::partner_id))
                        .do_nothing()
                        .execute(conn)?;
                }

                if existing.len() == 1 && inserted > 0 {
                    tracing::warn!(pair = %key, %pair_id, "completed half-written match pair");
                }

                let rows = pair_rows(conn, a, b)?;
                let pair = assemble_pair(key, &rows)?
                    .ok_or_else(|| StorageError::Inconsistent(format!("match pair {key} incomplete after insert")))?;

                Ok(if inserted > 0 {
                    PairCreated::Created(pair)
                } else {
                    PairCreated::AlreadyExists(pair)
                })
            })
        })
        .await
    }

    async fn find_match_pair(&self, a: Uuid, b: Uuid) -> StorageResult<Option<MatchPair>> {
        self.run(move |conn| {
            let rows = pair_rows(conn, a, b)?;
            assemble_pair(PairKey::new(a, b), &rows)
        })
        .await
    }

    async fn get_match_pair(&self, pair_id: Uuid) -> StorageResult<Option<MatchPair>> {
        self.run(move |conn| {
            let rows: Vec<Match> = matches::table
                .filter(matches::pair_id.eq(pair_id))
                .select(Match::as_select())
                .load(conn)?;
            match rows.first() {
                Some(m) => assemble_pair(PairKey::new(m.user_id, m.partner_id), &rows),
                None => Ok(None),
            }
        })
        .await
    }

    async fn list_matches_for(&self, user_id: Uuid) -> StorageResult<Vec<Match>> {
        self.run(move |conn| {
            Ok(matches::table
                .filter(matches::user_id.eq(user_id))
                .order((matches::created_at.desc(), matches::id.desc()))
                .select(Match::as_select())
                .load(conn)?)
        })
        .await
    }

    async fn list_candidates(&self, exclude: &[Uuid], limit: usize) -> StorageResult<Vec<User>> {
        let exclude = exclude.to_vec();
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        self.run(move |conn| {
            Ok(users::table
                .filter(users::id.ne_all(exclude))
                .order((users::created_at.asc(), users::id.asc()))
                .limit(limit)
                .select(User::as_select())
                .load(conn)?)
        })
        .await
    }

    async fn users_by_ids(&self, ids: &[Uuid]) -> StorageResult<Vec<User>> {
        let ids = ids.to_vec();
        self.run(move |conn| {
            Ok(users::table
                .filter(users::id.eq_any(ids))
                .select(User::as_select())
                .load(conn)?)
        })
        .await
    }

    async fn append_message(
        &self,
        pair_id: Uuid,
        sender: Uuid,
        recipient: Uuid,
        body: &str,
    ) -> StorageResult<Message> {
        let body = body.to_string();
        self.run(move |conn| {
            Ok(diesel::insert_into(messages::table)
                .values(&NewMessage {
                    id: Uuid::now_v7(),
                    pair_id,
                    sender_id: sender,
                    recipient_id: recipient,
                    body: &body,
                })
                .returning(Message::as_returning())
                .get_result(conn)?)
        })
        .await
    }

    async fn list_messages(&self, pair_id: Uuid) -> StorageResult<Vec<Message>> {
        self.run(move |conn| {
            Ok(messages::table
                .filter(messages::pair_id.eq(pair_id))
                .order((messages::created_at.asc(), messages::seq.asc()))
                .select(Message::as_select())
                .load(conn)?)
        })
        .await
    }

    async fn ping(&self) -> StorageResult<()> {
        self.run(|conn| {
            diesel::sql_query("SELECT 1").execute(conn)?;
            Ok(())
        })
        .await
    }
}
