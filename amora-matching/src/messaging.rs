use serde::Serialize;
use uuid::Uuid;

use amora_shared::types::auth::IdentityProvider;

use crate::error::{MatchError, MatchResult};
use crate::models::{Match, MatchPair, Message, ProfileCard};
use crate::require_actor;
use crate::storage::Storage;

pub const MAX_MESSAGE_CHARS: usize = 2000;

/// A match row as shown in the caller's match list.
#[derive(Debug, Clone, Serialize)]
pub struct MatchSummary {
    #[serde(flatten)]
    pub row: Match,
    pub partner: Option<ProfileCard>,
}

/// The caller's matches, newest first, each with the partner's card.
pub async fn list_matches(store: &dyn Storage, identity: &impl IdentityProvider) -> MatchResult<Vec<MatchSummary>> {
    let me = require_actor(identity)?;
    let rows = store.list_matches_for(me).await?;
    let partner_ids: Vec<Uuid> = rows.iter().map(|m| m.partner_id).collect();
    let partners = store.users_by_ids(&partner_ids).await?;

    Ok(rows
        .into_iter()
        .map(|row| {
            let partner = partners.iter().find(|u| u.id == row.partner_id).map(ProfileCard::from);
            MatchSummary { row, partner }
        })
        .collect())
}

async fn participant_pair(store: &dyn Storage, pair_id: Uuid, me: Uuid) -> MatchResult<MatchPair> {
    let pair = store
        .get_match_pair(pair_id)
        .await?
        .ok_or(MatchError::MatchNotFound(pair_id))?;
    if !pair.involves(me) {
        return Err(MatchError::NotMatchParticipant(pair_id));
    }
    Ok(pair)
}

/// Append a message to a match. The recipient is the caller's partner in the pair.
pub async fn send_message(
    store: &dyn Storage,
    identity: &impl IdentityProvider,
    pair_id: Uuid,
    body: &str,
) -> MatchResult<Message> {
    let me = require_actor(identity)?;
    let body = body.trim();
    if body.is_empty() {
        return Err(MatchError::InvalidMessage("message body is empty"));
    }
    if body.chars().count() > MAX_MESSAGE_CHARS {
        return Err(MatchError::InvalidMessage("message body exceeds 2000 characters"));
    }

    let pair = participant_pair(store, pair_id, me).await?;
    let recipient = pair
        .partner_of(me)
        .ok_or(MatchError::NotMatchParticipant(pair_id))?;

    let message = store.append_message(pair_id, me, recipient, body).await?;
    tracing::debug!(%pair_id, sender = %me, seq = message.seq, "message appended");
    Ok(message)
}

/// Every message of a match, oldest first.
pub async fn list_messages(
    store: &dyn Storage,
    identity: &impl IdentityProvider,
    pair_id: Uuid,
) -> MatchResult<Vec<Message>> {
    let me = require_actor(identity)?;
    participant_pair(store, pair_id, me).await?;
    Ok(store.list_messages(pair_id).await?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::UserUpsert;
    use crate::storage::MemoryStore;

    async fn matched() -> (MemoryStore, Uuid, Uuid, Uuid) {
        let store = MemoryStore::new();
        let (a, b) = (Uuid::now_v7(), Uuid::now_v7());
        for id in [a, b] {
            store.upsert_user(UserUpsert::minimal(id)).await.unwrap();
        }
        let pair_id = store.create_match_pair(a, b).await.unwrap().pair().pair_id;
        (store, a, b, pair_id)
    }

    #[tokio::test]
    async fn recipient_is_the_partner() {
        let (store, a, b, pair_id) = matched().await;
        let message = send_message(&store, &b, pair_id, "  hola  ").await.unwrap();
        assert_eq!(message.sender_id, b);
        assert_eq!(message.recipient_id, a);
        assert_eq!(message.body, "hola");
    }

    #[tokio::test]
    async fn outsiders_cannot_read_or_write() {
        let (store, _, _, pair_id) = matched().await;
        let outsider = Uuid::now_v7();
        assert!(matches!(
            send_message(&store, &outsider, pair_id, "hi").await,
            Err(MatchError::NotMatchParticipant(_))
        ));
        assert!(matches!(
            list_messages(&store, &outsider, pair_id).await,
            Err(MatchError::NotMatchParticipant(_))
        ));
    }

    #[tokio::test]
    async fn empty_and_oversized_bodies_are_rejected() {
        let (store, a, _, pair_id) = matched().await;
        assert!(matches!(send_message(&store, &a, pair_id, "   ").await, Err(MatchError::InvalidMessage(_))));
        let long = "x".repeat(MAX_MESSAGE_CHARS + 1);
        assert!(matches!(send_message(&store, &a, pair_id, &long).await, Err(MatchError::InvalidMessage(_))));
        assert!(store.list_messages(pair_id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn unknown_match_is_not_found() {
        let (store, a, _, _) = matched().await;
        assert!(matches!(
            list_messages(&store, &a, Uuid::now_v7()).await,
            Err(MatchError::MatchNotFound(_))
        ));
    }

    #[tokio::test]
    async fn match_list_shows_partner() {
        let (store, a, b, _) = matched().await;
        let matches = list_matches(&store, &a).await.unwrap();
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].row.partner_id, b);
        assert_eq!(matches[0].partner.as_ref().map(|p| p.id), Some(b));
    }
}
