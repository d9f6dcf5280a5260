//! # Dispatch Flows
//!
//! The router against real HTTP stubs and a real log RPC server.

#[cfg(test)]
mod tests {
    use std::net::{IpAddr, Ipv4Addr};
    use std::sync::Arc;

    use action_gateway::{ActionRouter, EventPublisher, GatewayConfig, LogRoute};
    use async_trait::async_trait;
    use axum::http::StatusCode;
    use parking_lot::Mutex;
    use serde_json::json;
    use shared_bus::ChannelError;
    use shared_types::{DispatchError, EventMessage};
    use transport_clients::{serve, InMemoryLogStore, RpcServerConfig};

    use crate::integration::fixtures::{dead_url, StubDownstream};

    /// Counts publishes instead of touching a broker.
    #[derive(Default)]
    struct CountingPublisher {
        published: Mutex<Vec<(String, EventMessage)>>,
    }

    #[async_trait]
    impl EventPublisher for CountingPublisher {
        async fn publish(&self, key: &str, m: &EventMessage) -> Result<(), ChannelError> {
            self.published.lock().push((key.to_string(), m.clone()));
            Ok(())
        }
    }

    struct Downstreams {
        auth: StubDownstream,
        log: StubDownstream,
        mail: StubDownstream,
        events: Arc<CountingPublisher>,
    }

    impl Downstreams {
        fn total_calls(&self) -> usize {
            self.auth.call_count()
                + self.log.call_count()
                + self.mail.call_count()
                + self.events.published.lock().len()
        }
    }

    async fn wire(route: LogRoute, log_rpc_url: String) -> (ActionRouter, Downstreams) {
        let downstreams = Downstreams {
            auth: StubDownstream::spawn(json!({
                "error": false,
                "message": "Logged in user admin@example.com",
                "data": {"id": 1, "email": "admin@example.com"}
            }))
            .await,
            log: StubDownstream::accepting().await,
            mail: StubDownstream::accepting().await,
            events: Arc::new(CountingPublisher::default()),
        };

        let mut config = GatewayConfig::default();
        config.downstreams.auth_url = downstreams.auth.url.clone();
        config.downstreams.log_url = downstreams.log.url.clone();
        config.downstreams.mail_url = downstreams.mail.url.clone();
        config.downstreams.log_rpc_url = log_rpc_url;
        config.log_route = route;

        let router = ActionRouter::from_config(&config, downstreams.events.clone()).unwrap();
        (router, downstreams)
    }

    #[tokio::test]
    async fn unknown_actions_never_reach_the_network() {
        let (router, downstreams) = wire(LogRoute::Http, dead_url().await).await;

        for body in [
            json!({"action": "payroll", "payroll": {"amount": 1}}),
            json!({"action": "", "auth": {"email": "a", "password": "b"}}),
            json!({"action": 7, "log": {"name": "n", "data": "d"}}),
        ] {
            let err = router
                .dispatch_bytes(body.to_string().as_bytes())
                .await
                .unwrap_err();
            assert!(matches!(err, DispatchError::UnknownAction(_)), "{body}");
        }

        assert_eq!(downstreams.total_calls(), 0);
    }

    #[tokio::test]
    async fn invalid_payloads_never_reach_the_network() {
        let (router, downstreams) = wire(LogRoute::Http, dead_url().await).await;

        for body in [
            json!({"action": "auth", "auth": {"email": "a@b.c"}}),
            json!({"action": "log", "log": {"name": "  ", "data": "d"}}),
            json!({"action": "mail"}),
        ] {
            let err = router
                .dispatch_bytes(body.to_string().as_bytes())
                .await
                .unwrap_err();
            assert!(matches!(err, DispatchError::ValidationFailed(_)), "{body}");
        }

        assert_eq!(downstreams.total_calls(), 0);
    }

    #[tokio::test]
    async fn auth_payload_reaches_credential_store_unchanged() {
        let (router, downstreams) = wire(LogRoute::Http, dead_url().await).await;
        let payload = json!({"email": "admin@example.com", "password": "verysecret"});

        let reply = router
            .dispatch_bytes(json!({"action": "auth", "auth": payload}).to_string().as_bytes())
            .await
            .unwrap();

        assert!(!reply.error);
        assert_eq!(reply.message, "Authenticated!");
        assert_eq!(reply.data.unwrap()["id"], 1);

        let calls = downstreams.auth.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].json(), payload);
        assert_eq!(downstreams.total_calls(), 1);
    }

    #[tokio::test]
    async fn auth_refusal_is_relayed() {
        let (router, downstreams) = wire(LogRoute::Http, dead_url().await).await;
        downstreams.auth.script(&[StatusCode::UNAUTHORIZED, StatusCode::FORBIDDEN]);
        let body = json!({"action": "auth", "auth": {"email": "a@b.c", "password": "nope"}});

        let first = router
            .dispatch_bytes(body.to_string().as_bytes())
            .await
            .unwrap_err();
        assert_eq!(
            first,
            DispatchError::DownstreamRejected {
                status: Some(401),
                message: "invalid credentials".into()
            }
        );

        let second = router
            .dispatch_bytes(body.to_string().as_bytes())
            .await
            .unwrap_err();
        assert_eq!(second.to_string(), "stub refused with 403");
    }

    #[tokio::test]
    async fn log_over_rpc_reaches_the_log_store() {
        let store = Arc::new(InMemoryLogStore::new());
        let server = serve(
            &RpcServerConfig {
                host: IpAddr::V4(Ipv4Addr::LOCALHOST),
                port: 0,
            },
            store.clone(),
        )
        .await
        .unwrap();
        let (router, downstreams) = wire(LogRoute::Rpc, server.url()).await;

        let reply = router
            .dispatch_bytes(br#"{"action":"log","log":{"name":"event","data":"hello"}}"#)
            .await
            .unwrap();

        assert!(!reply.error);
        assert_eq!(reply.message, "Processed payload via RPC: event");
        let entries = store.entries();
        assert_eq!(entries.len(), 1);
        assert_eq!((entries[0].name.as_str(), entries[0].data.as_str()), ("event", "hello"));
        assert_eq!(downstreams.total_calls(), 0);

        server.stop().await;
    }

    #[tokio::test]
    async fn log_over_rpc_with_no_server_is_unavailable() {
        let (router, _) = wire(LogRoute::Rpc, dead_url().await).await;
        let err = router
            .dispatch_bytes(br#"{"action":"log","log":{"name":"event","data":"hello"}}"#)
            .await
            .unwrap_err();
        assert!(matches!(err, DispatchError::DownstreamUnavailable(_)));
    }

    #[tokio::test]
    async fn log_over_event_returns_before_processing() {
        let (router, downstreams) = wire(LogRoute::Event, dead_url().await).await;
        let reply = router
            .dispatch_bytes(br#"{"action":"log","log":{"name":"user-login","data":"ok"}}"#)
            .await
            .unwrap();

        assert!(!reply.error);
        let published = downstreams.events.published.lock();
        assert_eq!(published.len(), 1);
        assert_eq!(published[0].0, "log.INFO");
        assert_eq!(downstreams.log.call_count(), 0);
    }

    #[tokio::test]
    async fn mail_is_sent_once() {
        let (router, downstreams) = wire(LogRoute::Rpc, dead_url().await).await;
        let mail = json!({"from": "a@x.io", "to": "b@x.io", "subject": "Hi", "message": "Hello"});

        let reply = router
            .dispatch_bytes(json!({"action": "mail", "mail": mail}).to_string().as_bytes())
            .await
            .unwrap();

        assert_eq!(reply.message, "Message sent to b@x.io");
        assert_eq!(downstreams.mail.calls()[0].json(), mail);
        assert_eq!(downstreams.total_calls(), 1);
    }
}
