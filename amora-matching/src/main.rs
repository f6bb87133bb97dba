use std::sync::Arc;

use amora_shared::clients::db::create_pool;
use amora_shared::clients::rabbitmq::RabbitMQClient;
use amora_shared::clients::redis::RedisClient;
use amora_shared::middleware::{init_metrics, init_tracing};

use amora_matching::config::{AppConfig, LockBackend, StorageBackend};
use amora_matching::events::publisher::EventPublisher;
use amora_matching::locks::{PairLocks, RedisPairLocks};
use amora_matching::storage::{MemoryStore, PgStore, Storage};
use amora_matching::{router, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing("amora-matching");

    let config = AppConfig::load()?;
    let port = config.port;

    let store: Arc<dyn Storage> = match config.storage_backend {
        StorageBackend::Postgres => {
            let pool = create_pool(&config.database_url, config.db_pool_size, config.db_timeout())?;
            Arc::new(PgStore::new(pool))
        }
        StorageBackend::Memory => {
            tracing::warn!("using in-memory storage, data is lost on restart");
            Arc::new(MemoryStore::new())
        }
    };

    let locks = match config.lock_backend {
        LockBackend::Local => PairLocks::local(),
        LockBackend::Redis => {
            let redis = RedisClient::connect(&config.redis_url).await?;
            PairLocks::Redis(RedisPairLocks::new(redis, config.lock_ttl(), config.lock_max_retries))
        }
    };

    let events = if config.events_enabled {
        EventPublisher::new(RabbitMQClient::connect(&config.rabbitmq_url).await?)
    } else {
        tracing::info!("event publishing disabled");
        EventPublisher::disabled()
    };

    let metrics = init_metrics()?;

    tracing::info!(
        storage = ?config.storage_backend,
        locks = locks.backend_name(),
        "backends configured"
    );

    let state = Arc::new(AppState::new(config, store, locks, events, Some(metrics)));
    let app = router(state);

    let addr = format!("0.0.0.0:{port}");
    tracing::info!(addr = %addr, "amora-matching starting");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
