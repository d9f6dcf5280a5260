//! # Event Flows
//!
//! Router → event channel → consumer → log store, over the in-process
//! broker with real HTTP log stubs.
//!
//! Covered:
//! 1. A processed event is acknowledged and never redelivered
//! 2. A failed downstream call rejects the message without poisoning the queue
//! 3. Messages published while the consumer is disconnected are not lost,
//!    and the router keeps publishing across the connection drop
//! 4. Topology declaration is idempotent

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use action_gateway::{ActionRouter, Downstreams, LogRoute, TimeoutConfig};
    use axum::http::StatusCode;
    use event_consumer::{ConsumerConfig, ConsumerState, EventConsumer};
    use shared_bus::{ChannelConfig, EventChannel, EventProducer, InMemoryBroker, RetryPolicy, Topology};
    use shared_types::EventMessage;
    use tokio::sync::watch;
    use tokio::task::JoinHandle;
    use tokio_util::sync::CancellationToken;
    use transport_clients::{HttpJsonClient, LogService};

    use crate::integration::fixtures::{dead_url, eventually, StubDownstream};

    // =========================================================================
    // FIXTURES
    // =========================================================================

    struct Pipeline {
        broker: InMemoryBroker,
        producer: Arc<EventProducer>,
        router: ActionRouter,
        log: StubDownstream,
        state: watch::Receiver<ConsumerState>,
        cancel: CancellationToken,
        consumer: JoinHandle<()>,
    }

    impl Pipeline {
        async fn start(reconnect: RetryPolicy) -> Self {
            let broker = InMemoryBroker::new();
            let log = StubDownstream::accepting().await;

            let channel_config = ChannelConfig {
                connect_retry: RetryPolicy::immediate(Some(5)),
                ..ChannelConfig::default()
            };
            let producer = Arc::new(
                EventProducer::connect(Arc::new(broker.clone()), &channel_config)
                    .await
                    .unwrap(),
            );

            let log_client: Arc<dyn LogService> =
                Arc::new(HttpJsonClient::new(log.url.clone(), Duration::from_secs(5)).unwrap());
            let consumer = EventConsumer::new(
                Arc::new(broker.clone()),
                log_client,
                ConsumerConfig {
                    reconnect,
                    ..ConsumerConfig::default()
                },
            );
            let mut state = consumer.state();
            let cancel = CancellationToken::new();
            let task = consumer.spawn(cancel.clone());
            tokio::time::timeout(
                Duration::from_secs(5),
                state.wait_for(|s| *s == ConsumerState::Subscribed),
            )
            .await
            .unwrap()
            .unwrap();

            let router = event_router(producer.clone(), dead_url().await);
            Self {
                broker,
                producer,
                router,
                log,
                state,
                cancel,
                consumer: task,
            }
        }

        async fn log(&self, name: &str, data: &str) {
            let body = serde_json::json!({"action": "log", "log": {"name": name, "data": data}});
            let reply = self
                .router
                .dispatch_bytes(body.to_string().as_bytes())
                .await
                .unwrap();
            assert!(!reply.error);
        }

        async fn stop(self) {
            self.cancel.cancel();
            self.consumer.await.unwrap();
        }
    }

    /// A router whose only live downstream is the event channel.
    fn event_router(producer: Arc<EventProducer>, dead: String) -> ActionRouter {
        let http = Arc::new(HttpJsonClient::new(dead, Duration::from_secs(1)).unwrap());
        let downstreams = Downstreams {
            credentials: http.clone(),
            mail: http.clone(),
            log_http: http.clone(),
            log_rpc: http,
            events: producer,
        };
        ActionRouter::new(downstreams, LogRoute::Event, TimeoutConfig::default())
    }

    fn fast_reconnect() -> RetryPolicy {
        RetryPolicy::exponential(Duration::from_millis(10), Duration::from_millis(50))
    }

    // =========================================================================
    // SCENARIOS
    // =========================================================================

    #[tokio::test]
    async fn processed_event_is_acked_and_not_redelivered() {
        let pipeline = Pipeline::start(fast_reconnect()).await;

        pipeline.log("user-login", "ok").await;

        eventually("log downstream called", || pipeline.log.call_count() == 1).await;
        eventually("delivery acked", || pipeline.broker.stats().acked == 1).await;
        assert_eq!(
            pipeline.log.calls()[0].json(),
            serde_json::json!({"name": "user-login", "data": "ok"})
        );

        // A forced reconnect must not bring the settled message back.
        pipeline.broker.disconnect_all();
        let mut state = pipeline.state.clone();
        tokio::time::timeout(
            Duration::from_secs(5),
            state.wait_for(|s| *s == ConsumerState::Subscribed),
        )
        .await
        .unwrap()
        .unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;

        assert_eq!(pipeline.log.call_count(), 1);
        assert_eq!(pipeline.broker.queue_depth("logs"), Some(0));
        assert_eq!(pipeline.broker.stats().requeued, 0);

        pipeline.stop().await;
    }

    #[tokio::test]
    async fn failed_delivery_is_rejected_without_poisoning() {
        let pipeline = Pipeline::start(fast_reconnect()).await;
        pipeline.log.script(&[StatusCode::INTERNAL_SERVER_ERROR]);

        pipeline.log("user-login", "ok").await;
        eventually("message dead-lettered", || {
            pipeline.broker.stats().dead_lettered == 1
        })
        .await;
        assert_eq!(pipeline.broker.stats().acked, 0);

        // The identical message still goes through on its own.
        pipeline.log("user-login", "ok").await;
        eventually("second message acked", || pipeline.broker.stats().acked == 1).await;

        assert_eq!(pipeline.log.call_count(), 2);
        assert_eq!(pipeline.broker.queue_depth("logs"), Some(0));
        assert_eq!(pipeline.broker.stats().dead_lettered, 1);

        pipeline.stop().await;
    }

    #[tokio::test]
    async fn events_survive_consumer_disconnect() {
        // Slow enough that the publishes below land while the consumer is away.
        let pipeline = Pipeline::start(RetryPolicy::exponential(
            Duration::from_millis(300),
            Duration::from_millis(600),
        ))
        .await;

        pipeline.broker.disconnect_all();
        let mut state = pipeline.state.clone();
        tokio::time::timeout(
            Duration::from_secs(5),
            state.wait_for(|s| *s == ConsumerState::Disconnected),
        )
        .await
        .unwrap()
        .unwrap();

        // The router's producer lost its connection too and reopens it.
        for i in 0..3 {
            pipeline.log(&format!("away-{i}"), "x").await;
        }
        assert_eq!(pipeline.broker.queue_depth("logs"), Some(3));
        assert_eq!(pipeline.log.call_count(), 0);

        eventually("all three processed after reconnect", || {
            pipeline.log.call_count() == 3
        })
        .await;
        eventually("all acked", || pipeline.broker.stats().acked == 3).await;

        let names: Vec<String> = pipeline
            .log
            .calls()
            .iter()
            .map(|c| c.json()["name"].as_str().unwrap_or_default().to_string())
            .collect();
        assert_eq!(names, vec!["away-0", "away-1", "away-2"]);
        assert!(pipeline.producer.is_connected().await);

        pipeline.stop().await;
    }

    #[tokio::test]
    async fn unacked_delivery_is_redelivered_after_disconnect() {
        let broker = InMemoryBroker::new();
        let channel = EventChannel::connect(&broker, Topology::default(), &RetryPolicy::immediate(Some(1)))
            .await
            .unwrap();
        let mut subscription = channel.subscribe().await.unwrap();
        channel
            .publish("log.ERROR", &EventMessage::new("crash", "mid-flight"))
            .await
            .unwrap();

        // Received, never settled; the connection then dies.
        let first = subscription.recv().await.unwrap().unwrap();
        assert!(!first.redelivered);
        broker.disconnect_all();
        assert!(subscription.recv().await.unwrap().is_err());
        drop(first);

        let channel = EventChannel::connect(&broker, Topology::default(), &RetryPolicy::immediate(Some(1)))
            .await
            .unwrap();
        let mut subscription = channel.subscribe().await.unwrap();
        let again = subscription.recv().await.unwrap().unwrap();
        assert!(again.redelivered);
        assert_eq!(again.message, EventMessage::new("crash", "mid-flight"));
        again.ack.ack().await.unwrap();
    }

    #[tokio::test]
    async fn topology_declaration_is_idempotent() {
        let broker = InMemoryBroker::new();
        let policy = RetryPolicy::immediate(Some(1));

        let fresh = EventChannel::connect(&broker, Topology::default(), &policy)
            .await
            .unwrap();
        let existing = EventChannel::connect(&broker, Topology::default(), &policy)
            .await
            .unwrap();

        assert_eq!(fresh.topology().exchange_name, existing.topology().exchange_name);
        assert_eq!(fresh.topology().queue_name, existing.topology().queue_name);
        assert_eq!(broker.exchange_names(), vec!["logs_topic".to_string()]);
        assert_eq!(broker.queue_names(), vec!["logs".to_string()]);
        assert_eq!(broker.binding_count(), 1);
    }

    #[tokio::test]
    async fn event_message_survives_the_wire() {
        let pipeline = Pipeline::start(fast_reconnect()).await;
        let message = EventMessage::new("ünïcode \"quoted\"", "line1\nline2\t{json: true}");

        pipeline
            .producer
            .publish("log.INFO", &message)
            .await
            .unwrap();
        eventually("delivered", || pipeline.log.call_count() == 1).await;

        let received = pipeline.log.calls()[0].json();
        assert_eq!(received["name"], message.name.as_str());
        assert_eq!(received["data"], message.data.as_str());

        pipeline.stop().await;
    }
}
