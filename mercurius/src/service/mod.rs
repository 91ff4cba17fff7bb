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

//! The relay service: construction, supervision, and the periodic drain.
//!
//! Every tick the service scrapes the spool and fans the entries into two
//! FIFO lanes — broker messages and catalog requests — each drained by its
//! own worker for the duration of the pass. Workers are joined before the
//! tick returns, so passes never overlap.
//!
//! Outcome handling per item:
//!
//! 1. success — the spool entry is deleted;
//! 2. not-ready — the entry stays in place and the lane abandons the rest
//!    of its items for this pass (they retry next tick, still in order);
//! 3. anything else — the entry is quarantined under `failed/`.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::sync::{Mutex, Notify};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::amqp::{AmqpChannel, BrokerEvent, EventHandler};
use crate::bisque::{BisqueClient, EventTranslator};
use crate::config::ServerConfig;
use crate::error::RelayError;
use crate::platform::icommands::IcommandsConnector;
use crate::platform::PlatformClient;
use crate::spool::{Request, Spool};

/// How often the spool is drained. The tick is also the retry cadence for
/// not-ready items.
pub const SCRAPE_INTERVAL: Duration = Duration::from_secs(3);

/// Handler used when no catalog is configured: inbound events have nowhere
/// to go and are dropped.
struct IgnoreEvents;

impl EventHandler for IgnoreEvents {
    fn on_event(&self, event: BrokerEvent) {
        debug!(routing_key = %event.routing_key, "no catalog configured, ignoring broker event");
    }
}

/// The assembled daemon: spool, outbound collaborators, and the drain
/// task.
pub struct RelayService {
    spool: Arc<Spool>,
    amqp: Arc<AmqpChannel>,
    bisque: Option<Arc<BisqueClient>>,
    platform: Arc<PlatformClient>,
    shutdown: Arc<AtomicBool>,
    shutdown_notify: Arc<Notify>,
    drain_handle: Mutex<Option<JoinHandle<()>>>,
}

impl RelayService {
    /// Builds every collaborator and spawns the drain task.
    ///
    /// Unreachable collaborators are tolerated (they reconnect lazily);
    /// an unusable spool directory is fatal.
    pub async fn start(config: ServerConfig) -> Result<Arc<Self>, RelayError> {
        let spool = Arc::new(Spool::new(config.spool_dir_path()));

        let platform = Arc::new(
            PlatformClient::create(Box::new(IcommandsConnector::new(
                config.irods_config.clone(),
            )))
            .await,
        );

        let bisque = if config.is_bisque_configured() {
            Some(Arc::new(BisqueClient::new(
                config.bisque_config.clone(),
                platform.clone(),
            )?))
        } else {
            info!("catalog is not configured; catalog requests will be retained");
            None
        };

        // The translator feeds the spool from broker events; it is only
        // wired when there is a catalog to serve the resulting requests.
        let handler: Arc<dyn EventHandler> = match &bisque {
            Some(client) => Arc::new(EventTranslator::new(
                spool.clone(),
                client.config().clone(),
            )),
            None => Arc::new(IgnoreEvents),
        };

        let amqp = Arc::new(AmqpChannel::create(config.amqp_config.clone(), handler).await);

        spool.make_dirs()?;

        let service = Arc::new(Self {
            spool,
            amqp,
            bisque,
            platform,
            shutdown: Arc::new(AtomicBool::new(false)),
            shutdown_notify: Arc::new(Notify::new()),
            drain_handle: Mutex::new(None),
        });

        let drain_service = service.clone();
        let handle = tokio::spawn(async move {
            drain_service.run_drain_loop().await;
        });
        *service.drain_handle.lock().await = Some(handle);

        info!(spool = %service.spool.dir().display(), "relay service started");
        Ok(service)
    }

    /// Signals the drain task to exit at its next tick boundary, waits for
    /// it, then releases the collaborators. Idempotent.
    pub async fn stop(&self) {
        info!("stopping relay service");

        self.shutdown.store(true, Ordering::SeqCst);
        self.shutdown_notify.notify_waiters();

        if let Some(handle) = self.drain_handle.lock().await.take() {
            if let Err(err) = handle.await {
                error!(error = %err, "drain task ended abnormally");
            }
        }

        self.amqp.release().await;
        // The catalog client is stateless beyond its connection pool,
        // which drops with it.
        self.platform.release().await;

        info!("relay service stopped");
    }

    async fn run_drain_loop(self: Arc<Self>) {
        let mut interval = tokio::time::interval(SCRAPE_INTERVAL);

        loop {
            tokio::select! {
                _ = self.shutdown_notify.notified() => break,
                _ = interval.tick() => {}
            }

            if self.shutdown.load(Ordering::SeqCst) {
                break;
            }

            self.clone().drain_once().await;
        }

        debug!("drain loop exited");
    }

    /// One drain pass: scrape, fan out into the two lanes, join.
    pub(crate) async fn drain_once(self: Arc<Self>) {
        let outcome = match self.spool.scrape() {
            Ok(outcome) => outcome,
            Err(err) => {
                error!(error = %err, "failed to scrape spool");
                return;
            }
        };

        if let Some(err) = &outcome.last_error {
            warn!(error = %err, "scrape quarantined malformed entries");
        }

        if outcome.items.is_empty() {
            return;
        }
        debug!(count = outcome.items.len(), "processing spool entries");

        // Buffered to the pass size so feeding never blocks on a slow
        // lane.
        let capacity = outcome.items.len();
        let (message_tx, message_rx) = mpsc::channel::<Request>(capacity);
        let (bisque_tx, bisque_rx) = mpsc::channel::<Request>(capacity);

        let message_worker = {
            let service = self.clone();
            tokio::spawn(async move { service.run_lane("message", message_rx).await })
        };
        let bisque_worker = {
            let service = self.clone();
            tokio::spawn(async move { service.run_lane("bisque", bisque_rx).await })
        };

        for item in outcome.items {
            let lane = if item.is_send_message() {
                &message_tx
            } else {
                &bisque_tx
            };
            // A send only fails when the lane already halted and dropped
            // its receiver; the item stays spooled for the next pass.
            let _ = lane.send(item).await;
        }
        drop(message_tx);
        drop(bisque_tx);

        for worker in [message_worker, bisque_worker] {
            if let Err(err) = worker.await {
                error!(error = %err, "lane worker panicked");
            }
        }
    }

    /// Drains one lane in FIFO order until it is empty or a not-ready
    /// error halts it for this pass.
    async fn run_lane(&self, lane: &'static str, mut rx: mpsc::Receiver<Request>) {
        while let Some(item) = rx.recv().await {
            let request_type = item.request_type();

            match self.process_one(&item).await {
                Ok(()) => {
                    if let Err(err) = self.spool.mark_success(&item) {
                        error!(lane, %request_type, error = %err, "failed to delete dispatched entry");
                    }
                }
                Err(err) if err.is_not_ready() => {
                    debug!(lane, %request_type, error = %err, "lane halted, retaining items for next pass");
                    break;
                }
                Err(err) => {
                    error!(lane, %request_type, error = %err, "dispatch failed, quarantining entry");
                    if let Err(err) = self.spool.mark_failed(&item) {
                        error!(lane, %request_type, error = %err, "failed to quarantine entry");
                    }
                }
            }
        }
    }

    /// Dispatches one request to its outbound collaborator.
    async fn process_one(&self, item: &Request) -> Result<(), RelayError> {
        use crate::spool::RequestPayload;

        match &item.payload {
            RequestPayload::SendMessage { key, body } => self.amqp.publish(key, body).await,
            _ => match &self.bisque {
                Some(bisque) => bisque.process_item(item).await,
                None => Err(RelayError::not_ready("BisQue", "catalog is not configured")),
            },
        }
    }
}
