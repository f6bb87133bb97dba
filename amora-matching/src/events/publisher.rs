use serde::Serialize;
use uuid::Uuid;

use amora_shared::clients::rabbitmq::RabbitMQClient;
use amora_shared::types::event::{payloads, routing_keys, Event};

use crate::models::{MatchPair, Message};

const SOURCE: &str = "amora-matching";
const PREVIEW_CHARS: usize = 100;

/// Fire-and-forget domain event publishing. Failures are logged and never
/// reach the caller of the flow that produced the event.
#[derive(Clone, Default)]
pub struct EventPublisher {
    rabbitmq: Option<RabbitMQClient>,
}

impl EventPublisher {
    pub fn new(rabbitmq: RabbitMQClient) -> Self {
        Self { rabbitmq: Some(rabbitmq) }
    }

    /// A publisher that only logs.
    pub fn disabled() -> Self {
        Self::default()
    }

    pub fn is_connected(&self) -> Option<bool> {
        self.rabbitmq.as_ref().map(RabbitMQClient::is_connected)
    }

    /// Hand the event to a background task; the caller does not wait for the broker.
    fn publish<T>(&self, routing_key: &'static str, event: Event<T>)
    where
        T: Serialize + Send + Sync + 'static,
    {
        let Some(rabbitmq) = self.rabbitmq.clone() else {
            tracing::debug!(routing_key, event_id = %event.id, "event publishing disabled");
            return;
        };
        tokio::spawn(async move {
            if let Err(e) = rabbitmq.publish(routing_key, &event).await {
                tracing::error!(error = %e, routing_key, event_id = %event.id, "failed to publish event");
            }
        });
    }

    pub fn like_sent(&self, sender_id: Uuid, recipient_id: Uuid) {
        let event = Event::new(
            SOURCE,
            routing_keys::MATCHING_LIKE_SENT,
            payloads::LikeSent { sender_id, recipient_id },
        )
        .with_user(sender_id);

        self.publish(routing_keys::MATCHING_LIKE_SENT, event);
    }

    pub fn match_created(&self, actor: Uuid, pair: &MatchPair) {
        let event = Event::new(
            SOURCE,
            routing_keys::MATCHING_MATCH_CREATED,
            payloads::MatchCreated {
                pair_id: pair.pair_id,
                user_a_id: pair.user_a_id,
                user_b_id: pair.user_b_id,
            },
        )
        .with_user(actor)
        .with_correlation(pair.pair_id);

        self.publish(routing_keys::MATCHING_MATCH_CREATED, event);
    }

    pub fn message_sent(&self, message: &Message) {
        let body_preview: String = message.body.chars().take(PREVIEW_CHARS).collect();
        let event = Event::new(
            SOURCE,
            routing_keys::MESSAGING_MESSAGE_SENT,
            payloads::MessageSent {
                message_id: message.id,
                pair_id: message.pair_id,
                sender_id: message.sender_id,
                recipient_id: message.recipient_id,
                body_preview,
            },
        )
        .with_user(message.sender_id)
        .with_correlation(message.pair_id);

        self.publish(routing_keys::MESSAGING_MESSAGE_SENT, event);
    }
}
