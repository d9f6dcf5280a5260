//! # Node Flows
//!
//! The whole gateway started through `NodeRuntime`, driven over HTTP.

#[cfg(test)]
mod tests {
    use std::net::{IpAddr, Ipv4Addr};
    use std::sync::Arc;
    use std::time::Duration;

    use action_gateway::LogRoute;
    use event_consumer::ConsumerState;
    use node_runtime::config::NodeConfig;
    use node_runtime::runtime::NodeRuntime;
    use serde_json::{json, Value};
    use shared_bus::{InMemoryBroker, RetryPolicy};

    use crate::integration::fixtures::{eventually, StubDownstream};

    struct Stubs {
        auth: StubDownstream,
        log: StubDownstream,
        mail: StubDownstream,
    }

    async fn stubs() -> Stubs {
        Stubs {
            auth: StubDownstream::spawn(json!({
                "error": false,
                "message": "Logged in user@example.com",
                "data": {"id": 1}
            }))
            .await,
            log: StubDownstream::accepting().await,
            mail: StubDownstream::accepting().await,
        }
    }

    fn node_config(stubs: &Stubs, route: LogRoute) -> NodeConfig {
        let mut config = NodeConfig::default();
        config.gateway.http.host = IpAddr::V4(Ipv4Addr::LOCALHOST);
        config.gateway.http.port = 0;
        config.rpc_server.host = IpAddr::V4(Ipv4Addr::LOCALHOST);
        config.rpc_server.port = 0;
        config.channel.connect_retry = RetryPolicy::immediate(Some(3));
        config.consumer.reconnect =
            RetryPolicy::exponential(Duration::from_millis(10), Duration::from_millis(50));
        config.gateway.downstreams.auth_url = stubs.auth.url.clone();
        config.gateway.downstreams.log_url = stubs.log.url.clone();
        config.gateway.downstreams.mail_url = stubs.mail.url.clone();
        config.gateway.log_route = route;
        config
    }

    async fn start(stubs: &Stubs, route: LogRoute) -> NodeRuntime {
        let node = NodeRuntime::start(node_config(stubs, route), Arc::new(InMemoryBroker::new()))
            .await
            .unwrap();
        let mut state = node.consumer_state();
        tokio::time::timeout(
            Duration::from_secs(5),
            state.wait_for(|s| *s == ConsumerState::Subscribed),
        )
        .await
        .unwrap()
        .unwrap();
        node
    }

    async fn post(node: &NodeRuntime, body: Value) -> (u16, Value) {
        let response = reqwest::Client::new()
            .post(format!("http://{}/handle", node.http_addr()))
            .json(&body)
            .send()
            .await
            .unwrap();
        let status = response.status().as_u16();
        (status, response.json().await.unwrap())
    }

    #[tokio::test]
    async fn auth_answers_synchronously() {
        let stubs = stubs().await;
        let node = start(&stubs, LogRoute::Event).await;

        let (status, body) = post(
            &node,
            json!({"action": "auth", "auth": {"email": "user@example.com", "password": "pw"}}),
        )
        .await;

        assert_eq!(status, 200);
        assert_eq!(body["error"], false);
        assert_eq!(stubs.auth.call_count(), 1);
        assert_eq!(
            stubs.auth.calls()[0].json(),
            json!({"email": "user@example.com", "password": "pw"})
        );

        node.shutdown().await;
    }

    #[tokio::test]
    async fn event_routed_log_reaches_the_log_service() {
        let stubs = stubs().await;
        let node = start(&stubs, LogRoute::Event).await;

        let (status, body) = post(
            &node,
            json!({"action": "log", "log": {"name": "user-login", "data": "ok"}}),
        )
        .await;
        assert_eq!(status, 202);
        assert_eq!(body["error"], false);

        eventually("consumer forwarded the event", || stubs.log.call_count() == 1).await;
        assert_eq!(
            stubs.log.calls()[0].json(),
            json!({"name": "user-login", "data": "ok"})
        );
        assert_eq!(node.router().metrics().snapshot().events_published, 1);

        node.shutdown().await;
    }

    #[tokio::test]
    async fn http_routed_log_and_mail_are_accepted() {
        let stubs = stubs().await;
        let node = start(&stubs, LogRoute::Http).await;

        let (status, _) = post(
            &node,
            json!({"action": "log", "log": {"name": "audit", "data": "x"}}),
        )
        .await;
        assert_eq!(status, 202);

        let (status, body) = post(
            &node,
            json!({"action": "mail", "mail": {
                "from": "a@example.com",
                "to": "b@example.com",
                "subject": "hi",
                "message": "hello"
            }}),
        )
        .await;
        assert_eq!(status, 202);
        assert_eq!(body["message"], "Message sent to b@example.com");

        assert_eq!(stubs.log.call_count(), 1);
        assert_eq!(stubs.mail.call_count(), 1);
        assert_eq!(node.router().metrics().snapshot().events_published, 0);

        node.shutdown().await;
    }

    #[tokio::test]
    async fn bad_requests_never_leave_the_gateway() {
        let stubs = stubs().await;
        let node = start(&stubs, LogRoute::Event).await;

        let (status, body) = post(&node, json!({"action": "delete"})).await;
        assert_eq!(status, 400);
        assert_eq!(body["error"], true);

        let (status, _) = post(&node, json!({"action": "mail"})).await;
        assert_eq!(status, 400);

        let metrics = node.router().metrics().snapshot();
        assert_eq!(metrics.dispatch_failed, 2);
        assert_eq!(stubs.auth.call_count(), 0);
        assert_eq!(stubs.log.call_count(), 0);
        assert_eq!(stubs.mail.call_count(), 0);

        node.shutdown().await;
    }
}
