//! Connect, subscribe, process, reconnect.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use backoff::backoff::Backoff;
use shared_bus::{Broker, ChannelError, EventChannel, IncomingEvent, Subscription};
use shared_types::LogPayload;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use transport_clients::LogService;

use crate::config::ConsumerConfig;
use crate::state::ConsumerState;

/// Counters for what the consumer has settled.
#[derive(Debug, Default)]
pub struct ConsumerStats {
    pub acked: AtomicU64,
    pub rejected: AtomicU64,
    pub reconnects: AtomicU64,
}

impl ConsumerStats {
    pub fn acked(&self) -> u64 {
        self.acked.load(Ordering::Relaxed)
    }

    pub fn rejected(&self) -> u64 {
        self.rejected.load(Ordering::Relaxed)
    }

    pub fn reconnects(&self) -> u64 {
        self.reconnects.load(Ordering::Relaxed)
    }
}

/// How one subscribed session ended.
enum SessionEnd {
    Cancelled,
    Disconnected(ChannelError),
}

/// Background consumer owning its own broker connection.
pub struct EventConsumer {
    broker: Arc<dyn Broker>,
    downstream: Arc<dyn LogService>,
    config: ConsumerConfig,
    state_tx: watch::Sender<ConsumerState>,
    stats: Arc<ConsumerStats>,
}

impl EventConsumer {
    pub fn new(
        broker: Arc<dyn Broker>,
        downstream: Arc<dyn LogService>,
        config: ConsumerConfig,
    ) -> Self {
        let (state_tx, _) = watch::channel(ConsumerState::Disconnected);
        Self {
            broker,
            downstream,
            config,
            state_tx,
            stats: Arc::new(ConsumerStats::default()),
        }
    }

    /// Watch lifecycle transitions.
    pub fn state(&self) -> watch::Receiver<ConsumerState> {
        self.state_tx.subscribe()
    }

    pub fn stats(&self) -> Arc<ConsumerStats> {
        Arc::clone(&self.stats)
    }

    pub fn spawn(self, cancel: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(self.run(cancel))
    }

    /// Run until `cancel` fires, reconnecting after every disconnect.
    ///
    /// Only cancellation ends the loop. The reconnect policy supplies the
    /// delays; an attempt cap on it is ignored here.
    pub async fn run(self, cancel: CancellationToken) {
        let policy = &self.config.reconnect;
        let mut backoff = policy.build_backoff();
        let mut attempt: u32 = 0;

        loop {
            self.transition(ConsumerState::Connecting);
            let opened = tokio::select! {
                _ = cancel.cancelled() => break,
                opened = self.open() => opened,
            };

            match opened {
                Ok((channel, subscription)) => {
                    backoff.reset();
                    attempt = 0;
                    self.transition(ConsumerState::Subscribed);

                    let end = self.consume(subscription, &cancel).await;
                    channel.close().await;
                    match end {
                        SessionEnd::Cancelled => break,
                        SessionEnd::Disconnected(e) => {
                            warn!(error = %e, "Event consumer lost its channel");
                        }
                    }
                }
                Err(e) => {
                    warn!(attempt = attempt + 1, error = %e, "Event consumer connect failed");
                }
            }

            self.transition(ConsumerState::Disconnected);
            attempt += 1;
            let delay = backoff.next_backoff().unwrap_or(policy.max_interval);
            info!(
                attempt,
                delay_ms = delay.as_millis() as u64,
                "Event consumer reconnecting"
            );
            self.stats.reconnects.fetch_add(1, Ordering::Relaxed);
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(delay) => {}
            }
        }

        self.transition(ConsumerState::Stopped);
    }

    /// One connect attempt plus subscribe. Retrying is the caller's job.
    async fn open(&self) -> Result<(EventChannel, Subscription), ChannelError> {
        let channel =
            EventChannel::try_connect(self.broker.as_ref(), self.config.topology.clone()).await?;
        match channel.subscribe().await {
            Ok(subscription) => Ok((channel, subscription)),
            Err(e) => {
                channel.close().await;
                Err(e)
            }
        }
    }

    async fn consume(&self, mut subscription: Subscription, cancel: &CancellationToken) -> SessionEnd {
        loop {
            // An event already received is always settled before stopping.
            let next = tokio::select! {
                biased;
                _ = cancel.cancelled() => return SessionEnd::Cancelled,
                next = subscription.recv() => next,
            };

            let event = match next {
                Some(Ok(event)) => event,
                Some(Err(e)) => return SessionEnd::Disconnected(e),
                None => {
                    return SessionEnd::Disconnected(ChannelError::ChannelDisconnected(
                        "subscription ended".into(),
                    ))
                }
            };

            if let Err(e) = self.process(event).await {
                if e.is_disconnect() {
                    return SessionEnd::Disconnected(e);
                }
                warn!(error = %e, "Failed to settle delivery");
            }
        }
    }

    /// Deliver one event downstream, then settle it.
    async fn process(&self, event: IncomingEvent) -> Result<(), ChannelError> {
        let IncomingEvent {
            message,
            routing_key,
            redelivered,
            ack,
        } = event;
        let entry = LogPayload::from(message);

        match self.downstream.write_log(&entry).await {
            Ok(reply) => {
                ack.ack().await?;
                self.stats.acked.fetch_add(1, Ordering::Relaxed);
                debug!(
                    routing_key = %routing_key,
                    name = %entry.name,
                    redelivered,
                    reply = %reply,
                    "Event processed"
                );
            }
            Err(e) => {
                let requeue = self.config.requeue_on_failure;
                ack.reject(requeue).await?;
                self.stats.rejected.fetch_add(1, Ordering::Relaxed);
                warn!(
                    routing_key = %routing_key,
                    name = %entry.name,
                    requeue,
                    error = %e,
                    "Downstream refused event, rejected"
                );
            }
        }
        Ok(())
    }

    fn transition(&self, next: ConsumerState) {
        let previous = self.state_tx.send_replace(next);
        if previous != next {
            info!(from = %previous, state = %next, "Event consumer state changed");
        }
    }
}
