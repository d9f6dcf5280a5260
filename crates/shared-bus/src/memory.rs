//! # In-Memory Broker
//!
//! A single-process broker with the AMQP semantics the gateway relies on:
//!
//! - topic, direct, and fanout exchanges
//! - durable queues that outlive every connection
//! - manual acknowledgement, reject with or without requeue
//! - unacknowledged deliveries requeued (marked redelivered) when their
//!   connection closes
//!
//! Suitable for single-node deployments and tests; distributed deployments
//! use the `amqp` backend. [`InMemoryBroker::disconnect_all`] and
//! [`InMemoryBroker::set_reachable`] simulate network failures.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;

use async_trait::async_trait;
use futures::StreamExt;
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tracing::{debug, info, warn};

use crate::broker::{AckHandle, Acknowledger, Broker, BrokerConnection, Delivery, DeliveryStream};
use crate::error::ChannelError;
use crate::topology::{ExchangeKind, Topology};

/// Counters for everything the broker has seen.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BrokerStats {
    pub published: u64,
    pub unroutable: u64,
    pub delivered: u64,
    pub acked: u64,
    pub requeued: u64,
    pub dead_lettered: u64,
}

#[derive(Debug, Clone)]
struct StoredMessage {
    routing_key: String,
    payload: Vec<u8>,
    redelivered: bool,
}

struct ConsumerSlot {
    connection_id: u64,
    sender: mpsc::UnboundedSender<Result<Delivery, ChannelError>>,
}

struct Unacked {
    connection_id: u64,
    message: StoredMessage,
}

struct QueueState {
    durable: bool,
    auto_delete: bool,
    exclusive: bool,
    ready: VecDeque<StoredMessage>,
    consumers: Vec<ConsumerSlot>,
    next_consumer: usize,
    unacked: HashMap<u64, Unacked>,
}

impl QueueState {
    fn from_topology(topology: &Topology) -> Self {
        Self {
            durable: topology.queue_durable,
            auto_delete: topology.queue_auto_delete,
            exclusive: topology.queue_exclusive,
            ready: VecDeque::new(),
            consumers: Vec::new(),
            next_consumer: 0,
            unacked: HashMap::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Binding {
    exchange: String,
    queue: String,
    pattern: String,
}

struct BrokerState {
    reachable: bool,
    next_connection_id: u64,
    next_delivery_tag: u64,
    open_connections: HashSet<u64>,
    exchanges: HashMap<String, ExchangeKind>,
    queues: HashMap<String, QueueState>,
    bindings: Vec<Binding>,
    stats: BrokerStats,
}

impl Default for BrokerState {
    fn default() -> Self {
        Self {
            reachable: true,
            next_connection_id: 1,
            next_delivery_tag: 1,
            open_connections: HashSet::new(),
            exchanges: HashMap::new(),
            queues: HashMap::new(),
            bindings: Vec::new(),
            stats: BrokerStats::default(),
        }
    }
}

type SharedState = Arc<Mutex<BrokerState>>;

/// In-process broker. Clones share the same exchanges and queues.
#[derive(Clone, Default)]
pub struct InMemoryBroker {
    state: SharedState,
}

impl InMemoryBroker {
    pub fn new() -> Self {
        Self::default()
    }

    /// While unreachable, every `connect()` fails.
    pub fn set_reachable(&self, reachable: bool) {
        self.state.lock().reachable = reachable;
        info!(reachable, "In-memory broker reachability changed");
    }

    /// Drop every open connection, as if the broker restarted.
    ///
    /// Queues and their ready messages survive; unacknowledged deliveries
    /// go back to the front of their queue.
    pub fn disconnect_all(&self) {
        let mut state = self.state.lock();
        let ids: Vec<u64> = state.open_connections.iter().copied().collect();
        for id in ids {
            close_connection(&self.state, &mut state, id, "connection reset by broker");
        }
    }

    pub fn stats(&self) -> BrokerStats {
        self.state.lock().stats.clone()
    }

    pub fn open_connections(&self) -> usize {
        self.state.lock().open_connections.len()
    }

    pub fn exchange_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.state.lock().exchanges.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn queue_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.state.lock().queues.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn binding_count(&self) -> usize {
        self.state.lock().bindings.len()
    }

    /// Messages waiting for a consumer.
    pub fn queue_depth(&self, queue: &str) -> Option<usize> {
        self.state.lock().queues.get(queue).map(|q| q.ready.len())
    }

    /// Messages delivered but not yet settled.
    pub fn unacked_count(&self, queue: &str) -> Option<usize> {
        self.state.lock().queues.get(queue).map(|q| q.unacked.len())
    }

    pub fn consumer_count(&self, queue: &str) -> Option<usize> {
        self.state.lock().queues.get(queue).map(|q| q.consumers.len())
    }
}

#[async_trait]
impl Broker for InMemoryBroker {
    async fn connect(&self) -> Result<Box<dyn BrokerConnection>, ChannelError> {
        let mut state = self.state.lock();
        if !state.reachable {
            return Err(ChannelError::Connect("in-memory broker unreachable".into()));
        }
        let id = state.next_connection_id;
        state.next_connection_id += 1;
        state.open_connections.insert(id);
        debug!(connection_id = id, "In-memory broker connection opened");

        Ok(Box::new(MemoryConnection {
            id,
            state: Arc::clone(&self.state),
        }))
    }

    fn describe(&self) -> String {
        "memory://local".to_string()
    }
}

/// One connection to an [`InMemoryBroker`]. Dropping it closes it.
pub struct MemoryConnection {
    id: u64,
    state: SharedState,
}

impl MemoryConnection {
    fn ensure_open(&self, state: &BrokerState) -> Result<(), ChannelError> {
        if state.open_connections.contains(&self.id) {
            Ok(())
        } else {
            Err(ChannelError::ChannelDisconnected(format!(
                "connection {} is closed",
                self.id
            )))
        }
    }
}

#[async_trait]
impl BrokerConnection for MemoryConnection {
    async fn declare(&self, topology: &Topology) -> Result<(), ChannelError> {
        let mut state = self.state.lock();
        self.ensure_open(&state)?;

        match state.exchanges.get(&topology.exchange_name) {
            Some(kind) if *kind != topology.exchange_kind => {
                return Err(ChannelError::Topology(format!(
                    "exchange '{}' already declared as {} (requested {})",
                    topology.exchange_name,
                    kind.as_str(),
                    topology.exchange_kind.as_str()
                )));
            }
            Some(_) => {}
            None => {
                state
                    .exchanges
                    .insert(topology.exchange_name.clone(), topology.exchange_kind);
            }
        }

        match state.queues.get(&topology.queue_name) {
            Some(queue)
                if queue.durable != topology.queue_durable
                    || queue.auto_delete != topology.queue_auto_delete
                    || queue.exclusive != topology.queue_exclusive =>
            {
                return Err(ChannelError::Topology(format!(
                    "queue '{}' already declared with different flags",
                    topology.queue_name
                )));
            }
            Some(_) => {}
            None => {
                state.queues.insert(
                    topology.queue_name.clone(),
                    QueueState::from_topology(topology),
                );
            }
        }

        let binding = Binding {
            exchange: topology.exchange_name.clone(),
            queue: topology.queue_name.clone(),
            pattern: topology.routing_key_pattern.clone(),
        };
        if !state.bindings.contains(&binding) {
            state.bindings.push(binding);
        }

        debug!(
            exchange = %topology.exchange_name,
            queue = %topology.queue_name,
            pattern = %topology.routing_key_pattern,
            "Topology declared"
        );
        Ok(())
    }

    async fn publish(
        &self,
        exchange: &str,
        routing_key: &str,
        payload: Vec<u8>,
    ) -> Result<(), ChannelError> {
        let mut state = self.state.lock();
        self.ensure_open(&state)?;

        let kind = *state
            .exchanges
            .get(exchange)
            .ok_or_else(|| ChannelError::Publish(format!("no exchange '{exchange}'")))?;

        let mut targets: Vec<String> = state
            .bindings
            .iter()
            .filter(|b| b.exchange == exchange && kind.routes(&b.pattern, routing_key))
            .map(|b| b.queue.clone())
            .collect();
        targets.sort();
        targets.dedup();

        state.stats.published += 1;
        if targets.is_empty() {
            state.stats.unroutable += 1;
            debug!(exchange, routing_key, "Message unroutable, dropped");
            return Ok(());
        }

        for queue_name in targets {
            if let Some(queue) = state.queues.get_mut(&queue_name) {
                queue.ready.push_back(StoredMessage {
                    routing_key: routing_key.to_string(),
                    payload: payload.clone(),
                    redelivered: false,
                });
            }
            pump(&self.state, &mut state, &queue_name);
        }
        Ok(())
    }

    async fn consume(&self, queue: &str) -> Result<DeliveryStream, ChannelError> {
        let mut state = self.state.lock();
        self.ensure_open(&state)?;

        let (sender, receiver) = mpsc::unbounded_channel();
        let slot = state
            .queues
            .get_mut(queue)
            .ok_or_else(|| ChannelError::Topology(format!("no queue '{queue}'")))?;
        slot.consumers.push(ConsumerSlot {
            connection_id: self.id,
            sender,
        });
        debug!(connection_id = self.id, queue, "Consumer attached");

        pump(&self.state, &mut state, queue);
        Ok(UnboundedReceiverStream::new(receiver).boxed())
    }

    fn is_open(&self) -> bool {
        self.state.lock().open_connections.contains(&self.id)
    }

    async fn close(&self) {
        let mut state = self.state.lock();
        close_connection(&self.state, &mut state, self.id, "connection closed by client");
    }
}

impl Drop for MemoryConnection {
    fn drop(&mut self) {
        let mut state = self.state.lock();
        if state.open_connections.contains(&self.id) {
            close_connection(&self.state, &mut state, self.id, "connection dropped");
        }
    }
}

/// Settles a delivery against the queue it came from.
struct MemoryAcker {
    state: SharedState,
    connection_id: u64,
    queue: String,
    delivery_tag: u64,
}

impl MemoryAcker {
    fn take_unacked(&self, state: &mut BrokerState) -> Result<StoredMessage, ChannelError> {
        if !state.open_connections.contains(&self.connection_id) {
            return Err(ChannelError::ChannelDisconnected(format!(
                "cannot settle delivery {}: connection {} is closed",
                self.delivery_tag, self.connection_id
            )));
        }
        let queue = state
            .queues
            .get_mut(&self.queue)
            .ok_or_else(|| ChannelError::Topology(format!("no queue '{}'", self.queue)))?;
        match queue.unacked.remove(&self.delivery_tag) {
            Some(entry) if entry.connection_id == self.connection_id => Ok(entry.message),
            Some(entry) => {
                queue.unacked.insert(self.delivery_tag, entry);
                Err(ChannelError::ChannelDisconnected(format!(
                    "delivery {} belongs to another connection",
                    self.delivery_tag
                )))
            }
            None => Err(ChannelError::ChannelDisconnected(format!(
                "unknown delivery tag {}",
                self.delivery_tag
            ))),
        }
    }
}

#[async_trait]
impl Acknowledger for MemoryAcker {
    async fn ack(&self) -> Result<(), ChannelError> {
        let mut state = self.state.lock();
        self.take_unacked(&mut state)?;
        state.stats.acked += 1;
        Ok(())
    }

    async fn reject(&self, requeue: bool) -> Result<(), ChannelError> {
        let mut state = self.state.lock();
        let mut message = self.take_unacked(&mut state)?;

        if requeue {
            message.redelivered = true;
            state.stats.requeued += 1;
            if let Some(queue) = state.queues.get_mut(&self.queue) {
                queue.ready.push_front(message);
            }
            pump(&self.state, &mut state, &self.queue);
        } else {
            state.stats.dead_lettered += 1;
            debug!(
                queue = %self.queue,
                routing_key = %message.routing_key,
                "Delivery rejected without requeue, dead-lettered"
            );
        }
        Ok(())
    }
}

/// Hand ready messages to consumers, round-robin.
fn pump(shared: &SharedState, state: &mut BrokerState, queue_name: &str) {
    loop {
        let tag = state.next_delivery_tag;
        let Some(queue) = state.queues.get_mut(queue_name) else {
            return;
        };
        if queue.consumers.is_empty() {
            return;
        }
        let Some(message) = queue.ready.pop_front() else {
            return;
        };

        let index = queue.next_consumer % queue.consumers.len();
        let connection_id = queue.consumers[index].connection_id;
        let delivery = Delivery {
            routing_key: message.routing_key.clone(),
            payload: message.payload.clone(),
            redelivered: message.redelivered,
            ack: AckHandle::new(MemoryAcker {
                state: Arc::clone(shared),
                connection_id,
                queue: queue_name.to_string(),
                delivery_tag: tag,
            }),
        };

        if queue.consumers[index].sender.send(Ok(delivery)).is_err() {
            // Receiver gone: forget the consumer and retry the same message.
            queue.consumers.remove(index);
            queue.ready.push_front(message);
            continue;
        }

        queue.unacked.insert(
            tag,
            Unacked {
                connection_id,
                message,
            },
        );
        queue.next_consumer = index + 1;
        state.next_delivery_tag += 1;
        state.stats.delivered += 1;
    }
}

fn close_connection(shared: &SharedState, state: &mut BrokerState, id: u64, reason: &str) {
    if !state.open_connections.remove(&id) {
        return;
    }

    let mut touched = Vec::new();
    let mut requeued = 0u64;
    for (name, queue) in state.queues.iter_mut() {
        let before = queue.consumers.len();
        queue.consumers.retain(|slot| {
            if slot.connection_id != id {
                return true;
            }
            let _ = slot
                .sender
                .send(Err(ChannelError::ChannelDisconnected(reason.to_string())));
            false
        });

        let mut orphaned: Vec<(u64, StoredMessage)> = queue
            .unacked
            .iter()
            .filter(|(_, entry)| entry.connection_id == id)
            .map(|(tag, entry)| (*tag, entry.message.clone()))
            .collect();
        // Newest first, so push_front leaves the oldest at the head.
        orphaned.sort_by(|a, b| b.0.cmp(&a.0));
        let orphan_count = orphaned.len();
        for (tag, mut message) in orphaned {
            queue.unacked.remove(&tag);
            message.redelivered = true;
            queue.ready.push_front(message);
        }
        requeued += orphan_count as u64;

        if before != queue.consumers.len() || orphan_count > 0 {
            touched.push(name.clone());
        }
    }
    state.stats.requeued += requeued;

    // auto-delete queues go away with their last consumer
    let doomed: Vec<String> = state
        .queues
        .iter()
        .filter(|(name, q)| q.auto_delete && q.consumers.is_empty() && touched.contains(*name))
        .map(|(name, _)| name.clone())
        .collect();
    for name in &doomed {
        state.queues.remove(name);
        state.bindings.retain(|b| &b.queue != name);
    }

    for name in touched.iter().filter(|n| !doomed.contains(*n)) {
        pump(shared, state, name);
    }

    if requeued > 0 {
        warn!(connection_id = id, requeued, reason, "Connection closed with unacked deliveries");
    } else {
        debug!(connection_id = id, reason, "In-memory broker connection closed");
    }
}
