//! # Topology Descriptor
//!
//! Exchange, queue, and binding declared by every connection. Declaration is
//! declare-if-absent, so running it on every (re)connect is safe.

use serde::{Deserialize, Serialize};

use crate::error::ChannelError;
use crate::{DEFAULT_BINDING, DEFAULT_EXCHANGE, DEFAULT_QUEUE};

/// Exchange routing strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExchangeKind {
    /// Pattern match over dot-separated routing keys.
    Topic,
    /// Exact routing key match.
    Direct,
    /// Every bound queue, key ignored.
    Fanout,
}

impl ExchangeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExchangeKind::Topic => "topic",
            ExchangeKind::Direct => "direct",
            ExchangeKind::Fanout => "fanout",
        }
    }

    /// Whether a binding with `pattern` receives a message routed with `key`.
    pub fn routes(&self, pattern: &str, key: &str) -> bool {
        match self {
            ExchangeKind::Topic => routing_key_matches(pattern, key),
            ExchangeKind::Direct => pattern == key,
            ExchangeKind::Fanout => true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Topology {
    pub exchange_name: String,
    pub exchange_kind: ExchangeKind,
    /// Binding pattern between the exchange and the queue.
    pub routing_key_pattern: String,
    pub queue_name: String,
    pub queue_durable: bool,
    pub queue_auto_delete: bool,
    pub queue_exclusive: bool,
}

impl Default for Topology {
    fn default() -> Self {
        Self {
            exchange_name: DEFAULT_EXCHANGE.to_string(),
            exchange_kind: ExchangeKind::Topic,
            routing_key_pattern: DEFAULT_BINDING.to_string(),
            queue_name: DEFAULT_QUEUE.to_string(),
            queue_durable: true,
            queue_auto_delete: false,
            queue_exclusive: false,
        }
    }
}

impl Topology {
    pub fn validate(&self) -> Result<(), ChannelError> {
        if self.exchange_name.is_empty() {
            return Err(ChannelError::Topology("exchange name cannot be empty".into()));
        }
        if self.queue_name.is_empty() {
            return Err(ChannelError::Topology("queue name cannot be empty".into()));
        }
        if self.routing_key_pattern.is_empty() {
            return Err(ChannelError::Topology(
                "routing key pattern cannot be empty".into(),
            ));
        }
        Ok(())
    }
}

/// AMQP topic matching: `*` matches exactly one word, `#` zero or more.
pub fn routing_key_matches(pattern: &str, key: &str) -> bool {
    let pattern: Vec<&str> = pattern.split('.').collect();
    let key: Vec<&str> = key.split('.').collect();
    match_words(&pattern, &key)
}

fn match_words(pattern: &[&str], key: &[&str]) -> bool {
    match (pattern.split_first(), key.split_first()) {
        (None, None) => true,
        (Some((&"#", rest)), _) => {
            // '#' swallows zero words, or one word and stays in place
            match_words(rest, key) || (!key.is_empty() && match_words(pattern, &key[1..]))
        }
        (Some((&"*", rest)), Some((_, key_rest))) => match_words(rest, key_rest),
        (Some((word, rest)), Some((key_word, key_rest))) => {
            word == key_word && match_words(rest, key_rest)
        }
        _ => false,
    }
}
