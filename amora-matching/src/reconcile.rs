//! Like and match reconciliation.
//!
//! Per ordered pair (liker L, target T) the observable states are
//! `NoRelation`, `LikePending(L->T)` and `Matched({L,T})`. Every transition
//! for `{L,T}` runs under the pair lock: the reciprocal-like read, the pair
//! creation and the retirement of consumed likes happen without another
//! caller observing an intermediate state.

use std::sync::Arc;

use metrics::counter;
use serde::Serialize;
use uuid::Uuid;

use amora_shared::types::auth::IdentityProvider;

use crate::error::{MatchError, MatchResult};
use crate::locks::PairLocks;
use crate::models::{Like, MatchPair, PairKey, ProfileCard};
use crate::require_actor;
use crate::storage::{Deleted, Inserted, PairCreated, Storage};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum LikeOutcome {
    /// The like is recorded and waits for the target. `created` is false
    /// when the same like was already pending.
    Pending { created: bool },
    /// The pair is mutually matched. `created` is true for exactly one call
    /// per pair: the one that wrote the match rows.
    Matched { pair: MatchPair, created: bool },
}

impl LikeOutcome {
    pub fn is_match(&self) -> bool {
        matches!(self, Self::Matched { .. })
    }
}

/// Relationship between the caller and another user.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum PairState {
    NoRelation,
    LikePending { sender_id: Uuid, recipient_id: Uuid },
    /// Both likes stored but not yet promoted. Only visible to readers that
    /// do not take the pair lock, while a promotion is in flight.
    MutualPending,
    Matched { pair_id: Uuid },
}

/// A pending like together with the other party's card.
#[derive(Debug, Clone, Serialize)]
pub struct PendingLike {
    pub like: Like,
    pub profile: Option<ProfileCard>,
}

pub struct Reconciler {
    store: Arc<dyn Storage>,
    locks: Arc<PairLocks>,
}

impl Reconciler {
    pub fn new(store: Arc<dyn Storage>, locks: Arc<PairLocks>) -> Self {
        Self { store, locks }
    }

    /// The caller swipes right on `target`.
    pub async fn like(&self, identity: &impl IdentityProvider, target: Uuid) -> MatchResult<LikeOutcome> {
        let liker = require_actor(identity)?;
        if liker == target {
            return Err(MatchError::SelfLike);
        }
        self.require_user(liker).await?;
        self.require_user(target).await?;

        let guard = self.locks.acquire(PairKey::new(liker, target)).await?;
        let result = self.like_locked(liker, target).await;
        guard.release().await;
        result
    }

    async fn like_locked(&self, liker: Uuid, target: Uuid) -> MatchResult<LikeOutcome> {
        if let Some(pair) = self.store.find_match_pair(liker, target).await? {
            self.retire_likes(liker, target).await?;
            tracing::debug!(%liker, %target, pair_id = %pair.pair_id, "like on already matched pair");
            return Ok(LikeOutcome::Matched { pair, created: false });
        }

        let created = match self.store.insert_like(liker, target).await? {
            Inserted::Created(_) => {
                counter!("amora_likes_total").increment(1);
                true
            }
            Inserted::AlreadyExists => {
                tracing::debug!(%liker, %target, "duplicate like ignored");
                false
            }
        };

        if self.store.find_like(target, liker).await?.is_none() {
            tracing::info!(%liker, %target, "like pending");
            return Ok(LikeOutcome::Pending { created });
        }

        self.promote(liker, target).await
    }

    /// The caller withdraws a pending like to `target`.
    pub async fn cancel_like(&self, identity: &impl IdentityProvider, target: Uuid) -> MatchResult<()> {
        let liker = require_actor(identity)?;
        let guard = self.locks.acquire(PairKey::new(liker, target)).await?;
        let result = self.store.delete_like(liker, target).await;
        guard.release().await;

        match result? {
            Deleted::Deleted => {
                tracing::info!(%liker, %target, "like canceled");
                Ok(())
            }
            Deleted::NotFound => Err(MatchError::NotPending { sender: liker, recipient: target }),
        }
    }

    /// The caller accepts the pending like `sender` sent them.
    pub async fn accept_like(&self, identity: &impl IdentityProvider, sender: Uuid) -> MatchResult<LikeOutcome> {
        let recipient = require_actor(identity)?;
        let guard = self.locks.acquire(PairKey::new(sender, recipient)).await?;
        let result = self.accept_locked(sender, recipient).await;
        guard.release().await;
        result
    }

    async fn accept_locked(&self, sender: Uuid, recipient: Uuid) -> MatchResult<LikeOutcome> {
        if let Some(pair) = self.store.find_match_pair(sender, recipient).await? {
            self.retire_likes(sender, recipient).await?;
            return Ok(LikeOutcome::Matched { pair, created: false });
        }
        if self.store.find_like(sender, recipient).await?.is_none() {
            return Err(MatchError::NotPending { sender, recipient });
        }
        self.promote(recipient, sender).await
    }

    /// The caller declines the pending like `sender` sent them. Nothing is
    /// kept, so `sender` may like the caller again later.
    pub async fn reject_like(&self, identity: &impl IdentityProvider, sender: Uuid) -> MatchResult<()> {
        let recipient = require_actor(identity)?;
        let guard = self.locks.acquire(PairKey::new(sender, recipient)).await?;
        let result = self.store.delete_like(sender, recipient).await;
        guard.release().await;

        match result? {
            Deleted::Deleted => {
                tracing::info!(%sender, %recipient, "like rejected");
                Ok(())
            }
            Deleted::NotFound => Err(MatchError::NotPending { sender, recipient }),
        }
    }

    pub async fn pair_state(&self, identity: &impl IdentityProvider, other: Uuid) -> MatchResult<PairState> {
        let me = require_actor(identity)?;
        if let Some(pair) = self.store.find_match_pair(me, other).await? {
            return Ok(PairState::Matched { pair_id: pair.pair_id });
        }
        let outgoing = self.store.find_like(me, other).await?;
        let incoming = self.store.find_like(other, me).await?;
        Ok(match (outgoing, incoming) {
            (None, None) => PairState::NoRelation,
            (Some(_), Some(_)) => PairState::MutualPending,
            (Some(l), None) | (None, Some(l)) => PairState::LikePending {
                sender_id: l.sender_id,
                recipient_id: l.recipient_id,
            },
        })
    }

    pub async fn likes_sent(&self, identity: &impl IdentityProvider) -> MatchResult<Vec<PendingLike>> {
        let me = require_actor(identity)?;
        let likes = self.store.likes_from(me).await?;
        self.with_profiles(likes, |l| l.recipient_id).await
    }

    pub async fn likes_received(&self, identity: &impl IdentityProvider) -> MatchResult<Vec<PendingLike>> {
        let me = require_actor(identity)?;
        let likes = self.store.likes_to(me).await?;
        self.with_profiles(likes, |l| l.sender_id).await
    }

    /// Write the match pair for `{a, b}` and retire both likes. Caller holds the pair lock.
    ///
    /// Once the pair is stored the outcome stands even if retiring the likes
    /// fails. Leftover likes on a matched pair are removed by the next like
    /// or accept.
    async fn promote(&self, a: Uuid, b: Uuid) -> MatchResult<LikeOutcome> {
        let created = self.store.create_match_pair(a, b).await?;
        if let Err(e) = self.retire_likes(a, b).await {
            tracing::warn!(user_a = %a, user_b = %b, error = %e, "match stored, likes left for later cleanup");
        }

        Ok(match created {
            PairCreated::Created(pair) => {
                counter!("amora_matches_created_total").increment(1);
                tracing::info!(user_a = %a, user_b = %b, pair_id = %pair.pair_id, "match created");
                LikeOutcome::Matched { pair, created: true }
            }
            PairCreated::AlreadyExists(pair) => {
                counter!("amora_promotion_conflicts_total").increment(1);
                tracing::info!(user_a = %a, user_b = %b, pair_id = %pair.pair_id, "pair promoted by another caller");
                LikeOutcome::Matched { pair, created: false }
            }
        })
    }

    async fn retire_likes(&self, a: Uuid, b: Uuid) -> MatchResult<()> {
        self.store.delete_like(a, b).await?;
        self.store.delete_like(b, a).await?;
        Ok(())
    }

    async fn require_user(&self, id: Uuid) -> MatchResult<()> {
        match self.store.get_user(id).await? {
            Some(_) => Ok(()),
            None => Err(MatchError::UnknownUser(id)),
        }
    }

    async fn with_profiles(
        &self,
        likes: Vec<Like>,
        counterpart: impl Fn(&Like) -> Uuid,
    ) -> MatchResult<Vec<PendingLike>> {
        let ids: Vec<Uuid> = likes.iter().map(&counterpart).collect();
        let users = self.store.users_by_ids(&ids).await?;
        Ok(likes
            .into_iter()
            .map(|like| {
                let other = counterpart(&like);
                let profile = users.iter().find(|u| u.id == other).map(ProfileCard::from);
                PendingLike { like, profile }
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::UserUpsert;
    use crate::storage::MemoryStore;
    use amora_shared::types::auth::Anonymous;

    async fn setup() -> (Arc<MemoryStore>, Reconciler, Uuid, Uuid) {
        let store = Arc::new(MemoryStore::new());
        let (l, t) = (Uuid::now_v7(), Uuid::now_v7());
        for id in [l, t] {
            store.upsert_user(UserUpsert::minimal(id)).await.unwrap();
        }
        let reconciler = Reconciler::new(store.clone(), Arc::new(PairLocks::local()));
        (store, reconciler, l, t)
    }

    #[tokio::test]
    async fn anonymous_like_changes_nothing() {
        let (store, reconciler, _, t) = setup().await;
        let err = reconciler.like(&Anonymous, t).await.unwrap_err();
        assert!(matches!(err, MatchError::InvalidActor));
        assert!(store.likes_to(t).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn self_like_is_rejected() {
        let (_, reconciler, l, _) = setup().await;
        assert!(matches!(reconciler.like(&l, l).await, Err(MatchError::SelfLike)));
    }

    #[tokio::test]
    async fn like_to_unknown_user_is_rejected() {
        let (_, reconciler, l, _) = setup().await;
        let ghost = Uuid::now_v7();
        assert!(matches!(reconciler.like(&l, ghost).await, Err(MatchError::UnknownUser(id)) if id == ghost));
    }

    #[tokio::test]
    async fn pair_state_follows_transitions() {
        let (_, reconciler, l, t) = setup().await;
        assert_eq!(reconciler.pair_state(&l, t).await.unwrap(), PairState::NoRelation);

        reconciler.like(&l, t).await.unwrap();
        assert_eq!(
            reconciler.pair_state(&t, l).await.unwrap(),
            PairState::LikePending { sender_id: l, recipient_id: t }
        );

        let outcome = reconciler.like(&t, l).await.unwrap();
        let LikeOutcome::Matched { pair, created: true } = outcome else {
            panic!("expected a new match, got {outcome:?}");
        };
        assert_eq!(reconciler.pair_state(&l, t).await.unwrap(), PairState::Matched { pair_id: pair.pair_id });
    }

    #[tokio::test]
    async fn cancel_requires_pending_like() {
        let (_, reconciler, l, t) = setup().await;
        assert!(matches!(reconciler.cancel_like(&l, t).await, Err(MatchError::NotPending { .. })));
    }

    #[tokio::test]
    async fn liking_a_matched_partner_again_does_not_signal_twice() {
        let (store, reconciler, l, t) = setup().await;
        reconciler.like(&l, t).await.unwrap();
        assert!(matches!(reconciler.like(&t, l).await.unwrap(), LikeOutcome::Matched { created: true, .. }));

        let again = reconciler.like(&l, t).await.unwrap();
        assert!(matches!(again, LikeOutcome::Matched { created: false, .. }));
        assert!(store.find_like(l, t).await.unwrap().is_none());
        assert_eq!(store.match_rows_between(l, t).await, 2);
    }

    #[tokio::test]
    async fn received_likes_carry_sender_card() {
        let (store, reconciler, l, t) = setup().await;
        store
            .upsert_user(UserUpsert {
                id: l,
                display_name: Some("Lia".into()),
                ..Default::default()
            })
            .await
            .unwrap();
        reconciler.like(&l, t).await.unwrap();

        let received = reconciler.likes_received(&t).await.unwrap();
        assert_eq!(received.len(), 1);
        assert_eq!(received[0].like.sender_id, l);
        assert_eq!(received[0].profile.as_ref().map(|p| p.display_name.as_str()), Some("Lia"));
        assert!(reconciler.likes_sent(&t).await.unwrap().is_empty());
    }
}
