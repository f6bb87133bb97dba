use std::sync::Arc;

use axum::routing::{get, post, put};
use axum::Router;
use metrics_exporter_prometheus::PrometheusHandle;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use uuid::Uuid;

use amora_shared::middleware::{metrics_middleware, JwtSecret, JwtSource};
use amora_shared::types::auth::IdentityProvider;

pub mod config;
pub mod error;
pub mod events;
pub mod feed;
pub mod locks;
pub mod messaging;
pub mod models;
pub mod profile;
pub mod reconcile;
pub mod routes;
pub mod schema;
pub mod storage;

use config::AppConfig;
use error::{MatchError, MatchResult};
use events::publisher::EventPublisher;
use locks::PairLocks;
use reconcile::Reconciler;
use storage::Storage;

pub struct AppState {
    pub config: AppConfig,
    pub store: Arc<dyn Storage>,
    pub locks: Arc<PairLocks>,
    pub reconciler: Reconciler,
    pub events: EventPublisher,
    pub jwt: JwtSecret,
    pub metrics: Option<PrometheusHandle>,
}

impl AppState {
    pub fn new(
        config: AppConfig,
        store: Arc<dyn Storage>,
        locks: PairLocks,
        events: EventPublisher,
        metrics: Option<PrometheusHandle>,
    ) -> Self {
        let locks = Arc::new(locks);
        let jwt = JwtSecret(config.jwt_secret.clone());
        Self {
            reconciler: Reconciler::new(store.clone(), locks.clone()),
            config,
            store,
            locks,
            events,
            jwt,
            metrics,
        }
    }
}

impl JwtSource for AppState {
    fn jwt_secret(&self) -> &JwtSecret {
        &self.jwt
    }
}

/// Resolve the calling user or fail with [`MatchError::InvalidActor`].
pub(crate) fn require_actor(identity: &impl IdentityProvider) -> MatchResult<Uuid> {
    identity.current_user_id().ok_or(MatchError::InvalidActor)
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(routes::health::health_check))
        .route("/metrics", get(routes::health::metrics))
        .route("/me", get(routes::profile::get_profile).patch(routes::profile::update_profile))
        .route("/feed", get(routes::feed::get_feed))
        .route("/likes/sent", get(routes::likes::list_sent))
        .route("/likes/received", get(routes::likes::list_received))
        .route("/likes/state/:other_id", get(routes::likes::pair_state))
        .route(
            "/likes/:user_id",
            post(routes::likes::send_like).delete(routes::likes::cancel_like),
        )
        .route("/likes/:user_id/respond", put(routes::likes::respond_like))
        .route("/matches", get(routes::matches::list_matches))
        .route(
            "/matches/:pair_id/messages",
            get(routes::messages::list_messages).post(routes::messages::send_message),
        )
        .layer(axum::middleware::from_fn(metrics_middleware))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
