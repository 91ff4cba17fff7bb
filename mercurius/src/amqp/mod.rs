/*
 *  Copyright 2025 Colliery Software
 *
 *  Licensed under the Apache License, Version 2.0 (the "License");
 *  you may not use this file except in compliance with the License.
 *  You may obtain a copy of the License at
 *
 *      http://www.apache.org/licenses/LICENSE-2.0
 *
 *  Unless required by applicable law or agreed to in writing, software
 *  distributed under the License is distributed on an "AS IS" BASIS,
 *  WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
 *  See the License for the specific language governing permissions and
 *  limitations under the License.
 */

//! Outbound broker channel: lazy-reconnect publisher and match-all consumer.
//!
//! The channel never retries in a loop of its own. Construction succeeds
//! even when the broker is unreachable; every publish (and every consumer
//! restart) goes through `ensure_connected`, which re-dials at most once
//! per reconnect cooldown and otherwise reports *not-ready*. The drain
//! tick is the retry cadence.
//!
//! One queue is declared per daemon process — non-durable, exclusive,
//! auto-delete, named after the local host — and bound to the configured
//! exchange with the match-all routing key. Deliveries are auto-acked and
//! handed to the configured [`EventHandler`]; a panic inside the handler
//! is caught at the consumer boundary and never takes the daemon down.

use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Instant;

use lapin::options::{
    BasicConsumeOptions, BasicPublishOptions, QueueBindOptions, QueueDeclareOptions,
};
use lapin::types::FieldTable;
use lapin::{BasicProperties, Channel, Connection, ConnectionProperties};
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::config::{AmqpConfig, RECONNECT_COOLDOWN};
use crate::error::RelayError;

/// Prefix of the per-process consumer queue; the local hostname is
/// appended.
pub const CONSUMER_QUEUE_PREFIX: &str = "irods_rule_async_exec_cmd";

/// Routing key binding the consumer queue to the exchange.
const MATCH_ALL_ROUTING_KEY: &str = "#";

/// Persistent delivery mode per the AMQP basic class.
const DELIVERY_MODE_PERSISTENT: u8 = 2;

/// An inbound delivery, reduced to what the event translator needs.
#[derive(Debug, Clone)]
pub struct BrokerEvent {
    pub routing_key: String,
    pub body: Vec<u8>,
}

/// Seam for inbound event consumers. Implementations must not assume they
/// run on any particular task and must tolerate duplicate deliveries.
pub trait EventHandler: Send + Sync {
    fn on_event(&self, event: BrokerEvent);
}

#[derive(Default)]
struct ChannelState {
    connection: Option<Connection>,
    channel: Option<Channel>,
    queue_name: Option<String>,
    last_connect_attempt: Option<Instant>,
}

/// The broker channel. One per daemon.
pub struct AmqpChannel {
    config: AmqpConfig,
    state: Mutex<ChannelState>,
    handler: StdMutex<Option<Arc<dyn EventHandler>>>,
}

impl AmqpChannel {
    /// Creates the channel and makes a first connection attempt.
    ///
    /// An unreachable broker is not fatal here: the failure is logged and
    /// the next publish retries after the cooldown.
    pub async fn create(config: AmqpConfig, handler: Arc<dyn EventHandler>) -> Self {
        let channel = Self {
            config,
            state: Mutex::new(ChannelState::default()),
            handler: StdMutex::new(Some(handler)),
        };

        {
            let mut state = channel.state.lock().await;
            if let Err(err) = channel.ensure_connected(&mut state).await {
                warn!(error = %err, "broker unreachable at startup, will retry");
            }
        }

        channel
    }

    /// Publishes `body` as a persistent text/plain message under `key`.
    ///
    /// Returns a validation error for an empty key, *not-ready* while the
    /// broker is disconnected and inside the cooldown (or when the dial
    /// itself fails), and a remote error for a rejected publish.
    pub async fn publish(&self, key: &str, body: &str) -> Result<(), RelayError> {
        if key.is_empty() {
            return Err(RelayError::validation("send_message", "empty routing key"));
        }

        let mut state = self.state.lock().await;
        self.ensure_connected(&mut state).await?;

        let channel = state
            .channel
            .as_ref()
            .ok_or_else(|| RelayError::not_ready("AMQP", "channel not open"))?;

        let properties = BasicProperties::default()
            .with_delivery_mode(DELIVERY_MODE_PERSISTENT)
            .with_content_type("text/plain".into());

        channel
            .basic_publish(
                &self.config.exchange,
                key,
                BasicPublishOptions::default(),
                body.as_bytes(),
                properties,
            )
            .await?
            .await?;

        info!(routing_key = key, exchange = %self.config.exchange, "published broker message");
        Ok(())
    }

    /// Drops the consumer and closes the channel and connection. Safe to
    /// call repeatedly and on a never-connected channel.
    pub async fn release(&self) {
        let mut state = self.state.lock().await;

        // Closing the channel ends the delivery stream and lets the
        // consumer task run to completion.
        if let Some(channel) = state.channel.take() {
            if let Err(err) = channel.close(200, "shutting down").await {
                debug!(error = %err, "error closing broker channel");
            }
        }

        state.queue_name = None;

        if let Some(connection) = state.connection.take() {
            if connection.status().connected() {
                if let Err(err) = connection.close(200, "shutting down").await {
                    debug!(error = %err, "error closing broker connection");
                }
            }
        }

        if let Ok(mut handler) = self.handler.lock() {
            handler.take();
        }
    }

    /// Clears a dead connection and re-dials once the cooldown has passed.
    async fn ensure_connected(&self, state: &mut ChannelState) -> Result<(), RelayError> {
        if let Some(connection) = &state.connection {
            if !connection.status().connected() {
                state.connection = None;
                state.channel = None;
                state.queue_name = None;
            }
        }

        if state.connection.is_some() && state.channel.is_some() && state.queue_name.is_some() {
            return Ok(());
        }

        let cooldown_elapsed = state
            .last_connect_attempt
            .map(|at| at.elapsed() >= RECONNECT_COOLDOWN)
            .unwrap_or(true);
        if !cooldown_elapsed {
            return Err(RelayError::not_ready(
                "AMQP",
                format!(
                    "inside reconnect cooldown ({}s since last attempt)",
                    RECONNECT_COOLDOWN.as_secs()
                ),
            ));
        }

        self.connect(state).await
    }

    async fn connect(&self, state: &mut ChannelState) -> Result<(), RelayError> {
        info!(url = %self.config.url, "connecting to broker");

        state.last_connect_attempt = Some(Instant::now());
        state.connection = None;
        state.channel = None;
        state.queue_name = None;

        // A failed dial is transient by definition; surface it as
        // not-ready so the caller retains the item.
        let not_ready = |stage: &str, err: lapin::Error| {
            RelayError::not_ready("AMQP", format!("{stage} failed: {err}"))
        };

        let connection = Connection::connect(&self.config.url, ConnectionProperties::default())
            .await
            .map_err(|err| not_ready("connect", err))?;

        let channel = connection
            .create_channel()
            .await
            .map_err(|err| not_ready("channel open", err))?;

        let queue_name = consumer_queue_name();
        debug!(queue = %queue_name, "declaring consumer queue");

        let declare_options = QueueDeclareOptions {
            durable: false,
            exclusive: true,
            auto_delete: true,
            ..QueueDeclareOptions::default()
        };
        channel
            .queue_declare(&queue_name, declare_options, FieldTable::default())
            .await
            .map_err(|err| not_ready("queue declare", err))?;

        channel
            .queue_bind(
                &queue_name,
                &self.config.exchange,
                MATCH_ALL_ROUTING_KEY,
                QueueBindOptions::default(),
                FieldTable::default(),
            )
            .await
            .map_err(|err| not_ready("queue bind", err))?;

        let consume_options = BasicConsumeOptions {
            no_ack: true,
            ..BasicConsumeOptions::default()
        };
        let consumer = channel
            .basic_consume(&queue_name, "", consume_options, FieldTable::default())
            .await
            .map_err(|err| not_ready("consume", err))?;

        let handler = self.handler.lock().ok().and_then(|guard| guard.clone());
        tokio::spawn(consume_loop(consumer, handler));

        state.connection = Some(connection);
        state.channel = Some(channel);
        state.queue_name = Some(queue_name);

        info!(url = %self.config.url, "connected to broker");
        Ok(())
    }
}

/// Iterates deliveries until the channel closes. Handler panics are caught
/// here so a bad event can never kill the daemon.
async fn consume_loop(mut consumer: lapin::Consumer, handler: Option<Arc<dyn EventHandler>>) {
    use futures::StreamExt;

    while let Some(delivery) = consumer.next().await {
        match delivery {
            Ok(delivery) => {
                let routing_key = delivery.routing_key.as_str().to_string();
                debug!(routing_key = %routing_key, "consumed broker message");

                if let Some(handler) = &handler {
                    let event = BrokerEvent {
                        routing_key: routing_key.clone(),
                        body: delivery.data,
                    };
                    let outcome =
                        std::panic::catch_unwind(AssertUnwindSafe(|| handler.on_event(event)));
                    if outcome.is_err() {
                        error!(routing_key = %routing_key, "event handler panicked");
                    }
                }
            }
            Err(err) => {
                error!(error = %err, "broker consumer error");
                break;
            }
        }
    }

    debug!("broker consumer loop exited");
}

fn consumer_queue_name() -> String {
    match hostname::get() {
        Ok(name) => format!("{CONSUMER_QUEUE_PREFIX}.{}", name.to_string_lossy()),
        Err(_) => format!(
            "{CONSUMER_QUEUE_PREFIX}.autocreated.{}",
            Uuid::new_v4().simple()
        ),
    }
}
