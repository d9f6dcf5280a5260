//! Component wiring and lifecycle.

use std::net::SocketAddr;
use std::sync::Arc;

use action_gateway::{ActionRouter, EventPublisher, GatewayService};
use anyhow::{bail, Context, Result};
use event_consumer::{ConsumerState, EventConsumer};
use shared_bus::{Broker, EventProducer, InMemoryBroker};
use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use transport_clients::{serve, HttpJsonClient, InMemoryLogStore, RpcServerHandle};

use crate::config::NodeConfig;

/// Pick the broker backend for `uri`.
pub fn select_broker(uri: &str) -> Result<Arc<dyn Broker>> {
    if uri.starts_with("memory://") {
        return Ok(Arc::new(InMemoryBroker::new()));
    }
    if uri.starts_with("amqp://") || uri.starts_with("amqps://") {
        return amqp_broker(uri);
    }
    bail!("unsupported broker uri '{uri}'")
}

#[cfg(feature = "amqp")]
fn amqp_broker(uri: &str) -> Result<Arc<dyn Broker>> {
    Ok(Arc::new(shared_bus::AmqpBroker::new(uri)))
}

#[cfg(not(feature = "amqp"))]
fn amqp_broker(uri: &str) -> Result<Arc<dyn Broker>> {
    bail!("broker uri '{uri}' needs the `amqp` feature")
}

/// A started gateway.
pub struct NodeRuntime {
    http_addr: SocketAddr,
    rpc: RpcServerHandle,
    log_store: Arc<InMemoryLogStore>,
    producer: Arc<EventProducer>,
    router: Arc<ActionRouter>,
    consumer_state: watch::Receiver<ConsumerState>,
    consumer_task: JoinHandle<()>,
    http_task: JoinHandle<()>,
    cancel: CancellationToken,
}

/// Components built and bound, nothing spawned yet.
struct Prepared {
    router: Arc<ActionRouter>,
    service: GatewayService,
    listener: TcpListener,
    http_addr: SocketAddr,
    consumer: EventConsumer,
}

impl NodeRuntime {
    /// Start every component in order. Fails if the producer channel cannot
    /// be established within its retry budget.
    ///
    /// A failed start leaves nothing running: no task is spawned until
    /// every fallible step has succeeded.
    pub async fn start(config: NodeConfig, broker: Arc<dyn Broker>) -> Result<Self> {
        config.validate().context("invalid node configuration")?;
        info!(
            broker = %broker.describe(),
            log_route = config.gateway.log_route.as_str(),
            "Starting dispatch gateway"
        );

        // Step 1: log store RPC server
        let log_store = Arc::new(InMemoryLogStore::new());
        let rpc = serve(&config.rpc_server, log_store.clone())
            .await
            .with_context(|| format!("failed to bind log rpc server on {}", config.rpc_server.socket_addr()))?;

        // Step 2: producer channel, fatal if unavailable
        let producer = match EventProducer::connect(Arc::clone(&broker), &config.channel).await {
            Ok(producer) => Arc::new(producer),
            Err(e) => {
                error!(error = %e, "Cannot start without the event channel");
                rpc.stop().await;
                return Err(e).context("event channel unavailable");
            }
        };

        // Step 3: router, ingress listener, consumer
        let Prepared {
            router,
            service,
            listener,
            http_addr,
            consumer,
        } = match Self::prepare(&config, &broker, &producer).await {
            Ok(prepared) => prepared,
            Err(e) => {
                error!(error = %format!("{e:#}"), "Gateway startup failed, releasing resources");
                producer.close().await;
                rpc.stop().await;
                return Err(e);
            }
        };

        // Step 4: spawn the consumer and the ingress
        let cancel = CancellationToken::new();
        let consumer_state = consumer.state();
        let consumer_task = consumer.spawn(cancel.child_token());

        let shutdown = cancel.child_token();
        let http_task = tokio::spawn(async move {
            if let Err(e) = service
                .serve(listener, async move { shutdown.cancelled().await })
                .await
            {
                error!(error = %e, "HTTP ingress failed");
            }
        });

        info!(
            http = %http_addr,
            rpc = %rpc.local_addr(),
            "Dispatch gateway started"
        );

        Ok(Self {
            http_addr,
            rpc,
            log_store,
            producer,
            router,
            consumer_state,
            consumer_task,
            http_task,
            cancel,
        })
    }

    async fn prepare(
        config: &NodeConfig,
        broker: &Arc<dyn Broker>,
        producer: &Arc<EventProducer>,
    ) -> Result<Prepared> {
        let publisher: Arc<dyn EventPublisher> = producer.clone();
        let router = Arc::new(
            ActionRouter::from_config(&config.gateway, publisher)
                .context("failed to build action router")?,
        );
        let service = GatewayService::new(config.gateway.clone(), Arc::clone(&router))
            .context("failed to build gateway service")?;
        let listener = service.bind().await.context("failed to bind HTTP ingress")?;
        let http_addr = listener
            .local_addr()
            .context("failed to read HTTP ingress address")?;

        // The consumer opens its own connection once spawned.
        let consumer_downstream = HttpJsonClient::new(
            config.gateway.downstreams.log_url.clone(),
            config.gateway.timeouts.http,
        )
        .context("failed to build consumer log client")?;
        let consumer = EventConsumer::new(
            Arc::clone(broker),
            Arc::new(consumer_downstream),
            config.consumer.clone(),
        );

        Ok(Prepared {
            router,
            service,
            listener,
            http_addr,
            consumer,
        })
    }

    pub fn http_addr(&self) -> SocketAddr {
        self.http_addr
    }

    pub fn rpc_addr(&self) -> SocketAddr {
        self.rpc.local_addr()
    }

    /// Entries written through the local log RPC server.
    pub fn log_store(&self) -> Arc<InMemoryLogStore> {
        Arc::clone(&self.log_store)
    }

    pub fn router(&self) -> Arc<ActionRouter> {
        Arc::clone(&self.router)
    }

    pub fn consumer_state(&self) -> watch::Receiver<ConsumerState> {
        self.consumer_state.clone()
    }

    /// Stop ingress, then the consumer, then the channel and RPC server.
    pub async fn shutdown(self) {
        let NodeRuntime {
            rpc,
            producer,
            consumer_task,
            http_task,
            cancel,
            ..
        } = self;
        info!("Shutting down dispatch gateway");
        cancel.cancel();

        if let Err(e) = http_task.await {
            warn!(error = %e, "HTTP ingress task ended abnormally");
        }
        if let Err(e) = consumer_task.await {
            warn!(error = %e, "Event consumer task ended abnormally");
        }

        producer.close().await;
        rpc.stop().await;
        info!("Dispatch gateway stopped");
    }
}
