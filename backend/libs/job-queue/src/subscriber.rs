//! Pub/sub notification subscriber
//!
//! Pub/sub needs a dedicated connection (the multiplexed manager cannot
//! carry it), so the subscriber owns its own and reconnects with capped
//! backoff when the stream drops. Losing a notification is tolerable: the
//! workers also poll.

use futures::StreamExt;
use redis::Client;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use video_core::JobNotification;

const INITIAL_RECONNECT_DELAY: Duration = Duration::from_secs(1);
const MAX_RECONNECT_DELAY: Duration = Duration::from_secs(30);

/// Handle for the background subscriber task
pub struct SubscriberHandle {
    handle: JoinHandle<()>,
}

impl SubscriberHandle {
    /// Wait for the subscriber task to finish after shutdown was signalled.
    pub async fn join(self) {
        let _ = self.handle.await;
    }

    pub fn abort(&self) {
        self.handle.abort();
    }
}

/// Spawn the subscriber task for `channel`.
///
/// Decoded notifications arrive on the returned receiver. The task ends when
/// the shutdown flag flips, when the receiver is dropped, or on abort.
pub fn subscribe_notifications(
    client: Client,
    channel: String,
    shutdown: watch::Receiver<bool>,
) -> (mpsc::Receiver<JobNotification>, SubscriberHandle) {
    let (tx, rx) = mpsc::channel(16);

    let handle = tokio::spawn(async move {
        run_subscriber(client, channel, tx, shutdown).await;
    });

    (rx, SubscriberHandle { handle })
}

async fn run_subscriber(
    client: Client,
    channel: String,
    tx: mpsc::Sender<JobNotification>,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut reconnect_delay = INITIAL_RECONNECT_DELAY;

    loop {
        if *shutdown.borrow() {
            break;
        }

        let conn = match client.get_async_connection().await {
            Ok(conn) => conn,
            Err(e) => {
                warn!(error = %e, "pub/sub connection failed, retrying");
                if sleep_or_shutdown(&mut shutdown, reconnect_delay).await {
                    break;
                }
                reconnect_delay = (reconnect_delay * 2).min(MAX_RECONNECT_DELAY);
                continue;
            }
        };

        let mut pubsub = conn.into_pubsub();
        if let Err(e) = pubsub.subscribe(&channel).await {
            warn!(channel = %channel, error = %e, "pub/sub subscribe failed, retrying");
            if sleep_or_shutdown(&mut shutdown, reconnect_delay).await {
                break;
            }
            reconnect_delay = (reconnect_delay * 2).min(MAX_RECONNECT_DELAY);
            continue;
        }

        info!(channel = %channel, "subscribed to job notifications");
        reconnect_delay = INITIAL_RECONNECT_DELAY;

        {
            let mut stream = pubsub.on_message();
            loop {
                tokio::select! {
                    _ = shutdown.changed() => {
                        if *shutdown.borrow() {
                            debug!("notification subscriber shutting down");
                            return;
                        }
                    }
                    msg = stream.next() => {
                        let Some(msg) = msg else {
                            warn!(channel = %channel, "pub/sub stream closed, reconnecting");
                            break;
                        };
                        let payload: String = match msg.get_payload() {
                            Ok(payload) => payload,
                            Err(e) => {
                                warn!(error = %e, "failed to read notification payload");
                                continue;
                            }
                        };
                        match serde_json::from_str::<JobNotification>(&payload) {
                            Ok(notification) => {
                                debug!(job_id = %notification.job_id, "job notification received");
                                if tx.send(notification).await.is_err() {
                                    // receiver gone: the pool stopped
                                    return;
                                }
                            }
                            Err(e) => {
                                warn!(error = %e, "malformed job notification dropped");
                            }
                        }
                    }
                }
            }
        }
    }
}

/// Sleep for `delay`, returning true if shutdown fired first.
async fn sleep_or_shutdown(shutdown: &mut watch::Receiver<bool>, delay: Duration) -> bool {
    tokio::select! {
        _ = tokio::time::sleep(delay) => false,
        _ = shutdown.changed() => *shutdown.borrow(),
    }
}
