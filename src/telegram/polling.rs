//! Long-polling update source, used when no webhook URL is configured.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tracing::{debug, error, info, warn};

use super::{TelegramBot, TelegramError};
use crate::dispatcher::DispatchMessage;

/// Server-side wait of each `getUpdates` call.
const POLL_TIMEOUT: Duration = Duration::from_secs(30);

/// Pause after a failed poll before retrying.
const RETRY_DELAY: Duration = Duration::from_secs(3);

/// Polls `getUpdates` and forwards updates until `shutdown` flips to true.
pub async fn run_polling(
    bot: Arc<TelegramBot>,
    tx: mpsc::Sender<DispatchMessage>,
    mut shutdown: watch::Receiver<bool>,
) {
    if let Err(e) = bot.delete_webhook().await {
        warn!("Failed to remove webhook before polling: {}", e);
    }
    info!("Polling for updates");

    let mut offset: i64 = 0;

    loop {
        if *shutdown.borrow() {
            break;
        }

        let result = tokio::select! {
            _ = shutdown.changed() => break,
            result = bot.get_updates(offset, POLL_TIMEOUT) => result,
        };

        match result {
            Ok(updates) => {
                for update in updates {
                    offset = offset.max(update.update_id + 1);
                    debug!("Polled update {}", update.update_id);
                    if tx.send(DispatchMessage::Update(Box::new(update))).await.is_err() {
                        info!("Dispatcher closed, stopping poller");
                        return;
                    }
                }
            }
            Err(TelegramError::FloodWait(seconds)) => {
                warn!("Flood wait while polling: {} seconds", seconds);
                tokio::time::sleep(Duration::from_secs(u64::from(seconds))).await;
            }
            Err(e) => {
                error!("getUpdates failed: {}", e);
                tokio::time::sleep(RETRY_DELAY).await;
            }
        }
    }

    info!("Poller stopped");
}
