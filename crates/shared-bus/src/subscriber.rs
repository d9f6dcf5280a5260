//! # Subscription
//!
//! The consuming side of the event channel: an unbounded, non-restartable
//! sequence of decoded events, each carrying the handle that settles it.

use futures::StreamExt;
use shared_types::EventMessage;
use tracing::{debug, warn};

use crate::broker::{AckHandle, DeliveryStream};
use crate::error::ChannelError;

/// One decoded event awaiting acknowledgement.
#[derive(Debug)]
pub struct IncomingEvent {
    pub message: EventMessage,
    pub routing_key: String,
    pub redelivered: bool,
    pub ack: AckHandle,
}

/// A live subscription to the channel's queue.
///
/// Yields `Ok(event)` for every delivery. When the connection drops it
/// yields a single `Err(ChannelError::ChannelDisconnected)` and then `None`
/// forever; it never reconnects by itself.
pub struct Subscription {
    deliveries: DeliveryStream,
    queue: String,
    terminated: bool,
}

impl Subscription {
    pub(crate) fn new(deliveries: DeliveryStream, queue: String) -> Self {
        Self {
            deliveries,
            queue,
            terminated: false,
        }
    }

    /// Receive the next event.
    ///
    /// Deliveries whose body is not a valid `EventMessage` are rejected
    /// without requeue and skipped.
    pub async fn recv(&mut self) -> Option<Result<IncomingEvent, ChannelError>> {
        if self.terminated {
            return None;
        }

        loop {
            let delivery = match self.deliveries.next().await {
                Some(Ok(delivery)) => delivery,
                Some(Err(e)) => return Some(Err(self.terminate(e))),
                None => {
                    return Some(Err(self.terminate(ChannelError::ChannelDisconnected(
                        "delivery stream closed".into(),
                    ))))
                }
            };

            match EventMessage::from_bytes(&delivery.payload) {
                Ok(message) => {
                    return Some(Ok(IncomingEvent {
                        message,
                        routing_key: delivery.routing_key,
                        redelivered: delivery.redelivered,
                        ack: delivery.ack,
                    }));
                }
                Err(e) => {
                    warn!(
                        queue = %self.queue,
                        routing_key = %delivery.routing_key,
                        error = %e,
                        "Malformed event body, rejecting"
                    );
                    if let Err(reject_err) = delivery.ack.reject(false).await {
                        if reject_err.is_disconnect() {
                            return Some(Err(self.terminate(reject_err)));
                        }
                    }
                }
            }
        }
    }

    /// Queue this subscription reads from.
    pub fn queue(&self) -> &str {
        &self.queue
    }

    pub fn is_terminated(&self) -> bool {
        self.terminated
    }

    /// Mark the subscription ended. The cause is surfaced as
    /// `ChannelDisconnected`, unwrapped if it already is one.
    fn terminate(&mut self, cause: ChannelError) -> ChannelError {
        self.terminated = true;
        let err = match cause {
            ChannelError::ChannelDisconnected(_) => cause,
            other => ChannelError::ChannelDisconnected(other.to_string()),
        };
        debug!(queue = %self.queue, error = %err, "Subscription terminated");
        err
    }
}
