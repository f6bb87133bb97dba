use std::collections::HashSet;

use uuid::Uuid;

use amora_shared::types::auth::IdentityProvider;

use crate::error::MatchResult;
use crate::models::User;
use crate::require_actor;
use crate::storage::Storage;

pub const MAX_FEED_PAGE: usize = 100;

/// A page of profiles to swipe on.
///
/// Excludes the caller and everyone the caller is matched with. Users the
/// caller already liked stay in the feed.
pub async fn candidate_feed(
    store: &dyn Storage,
    identity: &impl IdentityProvider,
    limit: usize,
) -> MatchResult<Vec<User>> {
    let me = require_actor(identity)?;

    let mut excluded: HashSet<Uuid> = store
        .list_matches_for(me)
        .await?
        .into_iter()
        .map(|m| m.partner_id)
        .collect();
    excluded.insert(me);

    let excluded: Vec<Uuid> = excluded.into_iter().collect();
    let limit = limit.clamp(1, MAX_FEED_PAGE);
    let candidates = store.list_candidates(&excluded, limit).await?;

    tracing::debug!(user = %me, excluded = excluded.len(), returned = candidates.len(), "feed built");
    Ok(candidates)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::UserUpsert;
    use crate::storage::MemoryStore;

    #[tokio::test]
    async fn feed_never_contains_caller_or_matches() {
        let store = MemoryStore::new();
        let ids: Vec<Uuid> = (0..4).map(|_| Uuid::now_v7()).collect();
        for id in &ids {
            store.upsert_user(UserUpsert::minimal(*id)).await.unwrap();
        }
        store.create_match_pair(ids[0], ids[1]).await.unwrap();
        store.insert_like(ids[0], ids[2]).await.unwrap();

        let feed: Vec<Uuid> = candidate_feed(&store, &ids[0], 20)
            .await
            .unwrap()
            .into_iter()
            .map(|u| u.id)
            .collect();

        assert!(!feed.contains(&ids[0]));
        assert!(!feed.contains(&ids[1]));
        assert!(feed.contains(&ids[2]), "liked but unmatched users stay visible");
        assert!(feed.contains(&ids[3]));
    }

    #[tokio::test]
    async fn feed_page_is_bounded() {
        let store = MemoryStore::new();
        let me = Uuid::now_v7();
        store.upsert_user(UserUpsert::minimal(me)).await.unwrap();
        for _ in 0..5 {
            store.upsert_user(UserUpsert::minimal(Uuid::now_v7())).await.unwrap();
        }
        assert_eq!(candidate_feed(&store, &me, 2).await.unwrap().len(), 2);
        assert_eq!(candidate_feed(&store, &me, 0).await.unwrap().len(), 1);
    }
}
