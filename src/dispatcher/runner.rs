//! Dispatcher loop.

use tokio::sync::mpsc;
use tracing::{debug, error, info};

use crate::commands::UpdateHandler;
use crate::telegram::{ChatApi, Update};

/// Messages accepted by the dispatcher.
#[derive(Debug)]
pub enum DispatchMessage {
    /// An update from the webhook or the poller.
    Update(Box<Update>),
    /// Stop after the messages already queued.
    Shutdown,
}

/// Feeds queued updates to the handler one at a time.
#[derive(Debug)]
pub struct Dispatcher<A> {
    handler: UpdateHandler<A>,
}

impl<A: ChatApi> Dispatcher<A> {
    #[must_use]
    pub const fn new(handler: UpdateHandler<A>) -> Self {
        Self { handler }
    }

    /// Runs until the channel closes or a shutdown message arrives.
    /// Returns the number of updates handled.
    pub async fn run(&self, mut rx: mpsc::Receiver<DispatchMessage>) -> u64 {
        info!("Dispatcher started");
        let mut handled = 0;

        while let Some(msg) = rx.recv().await {
            match msg {
                DispatchMessage::Update(update) => {
                    self.dispatch(*update).await;
                    handled += 1;
                }
                DispatchMessage::Shutdown => {
                    info!("Dispatcher shutting down");
                    break;
                }
            }
        }

        info!("Dispatcher stopped after {} updates", handled);
        handled
    }

    async fn dispatch(&self, update: Update) {
        let update_id = update.update_id;
        debug!("Handling update {}", update_id);

        match self.handler.handle(update).await {
            Ok(()) => {}
            Err(e) if e.is_stale_query() => {
                debug!("Update {}: callback query expired", update_id);
            }
            Err(e) => error!("Update {} failed: {}", update_id, e),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use super::*;
    use crate::store::open_stores;
    use crate::telegram::{InlineKeyboardMarkup, TelegramError};

    /// Counts sends and fails every edit.
    #[derive(Default)]
    struct CountingApi {
        sends: AtomicUsize,
    }

    impl ChatApi for CountingApi {
        async fn send_message(
            &self,
            _chat_id: i64,
            _text: &str,
            _markup: Option<&InlineKeyboardMarkup>,
        ) -> Result<i64, TelegramError> {
            let n = self.sends.fetch_add(1, Ordering::SeqCst);
            Ok(i64::try_from(n).unwrap() + 1)
        }

        async fn edit_message_text(
            &self,
            _chat_id: i64,
            _message_id: i64,
            _text: &str,
            _markup: Option<&InlineKeyboardMarkup>,
        ) -> Result<(), TelegramError> {
            Err(TelegramError::Decode("offline".to_owned()))
        }

        async fn delete_message(&self, _chat_id: i64, _message_id: i64) -> Result<(), TelegramError> {
            Ok(())
        }

        async fn answer_callback_query(&self, _query_id: &str, _text: Option<&str>) -> Result<(), TelegramError> {
            Err(TelegramError::Api {
                code: 400,
                description: "Bad Request: query is too old".to_owned(),
            })
        }
    }

    fn start(update_id: i64, uid: i64) -> Box<Update> {
        let update = serde_json::json!({
            "update_id": update_id,
            "message": {
                "message_id": update_id,
                "from": {"id": uid, "is_bot": false, "first_name": "Ola"},
                "chat": {"id": uid},
                "text": "/start"
            }
        });
        Box::new(serde_json::from_value(update).unwrap())
    }

    fn dispatcher(dir: &std::path::Path) -> (Arc<CountingApi>, Dispatcher<CountingApi>) {
        let (projects, sessions) = open_stores(dir, Duration::from_secs(2)).unwrap();
        let api = Arc::new(CountingApi::default());
        let handler = UpdateHandler::new(Arc::clone(&api), projects, sessions);
        (api, Dispatcher::new(handler))
    }

    #[tokio::test]
    async fn test_processes_until_shutdown() {
        let dir = tempfile::tempdir().unwrap();
        let (api, dispatcher) = dispatcher(dir.path());
        let (tx, rx) = mpsc::channel(8);

        tx.send(DispatchMessage::Update(start(1, 7))).await.unwrap();
        tx.send(DispatchMessage::Update(start(2, 8))).await.unwrap();
        tx.send(DispatchMessage::Shutdown).await.unwrap();
        tx.send(DispatchMessage::Update(start(3, 9))).await.unwrap();

        assert_eq!(dispatcher.run(rx).await, 2);
        assert_eq!(api.sends.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_stops_when_senders_drop() {
        let dir = tempfile::tempdir().unwrap();
        let (_api, dispatcher) = dispatcher(dir.path());
        let (tx, rx) = mpsc::channel(8);

        tx.send(DispatchMessage::Update(start(1, 7))).await.unwrap();
        drop(tx);

        assert_eq!(dispatcher.run(rx).await, 1);
    }

    #[tokio::test]
    async fn test_handler_errors_do_not_stop_loop() {
        let dir = tempfile::tempdir().unwrap();
        let (_api, dispatcher) = dispatcher(dir.path());
        let (tx, rx) = mpsc::channel(8);

        let press: Update = serde_json::from_value(serde_json::json!({
            "update_id": 5,
            "callback_query": {
                "id": "q",
                "from": {"id": 7, "is_bot": false, "first_name": "Ola"},
                "message": {"message_id": 1, "chat": {"id": 7}},
                "data": "noop"
            }
        }))
        .unwrap();
        tx.send(DispatchMessage::Update(Box::new(press))).await.unwrap();
        tx.send(DispatchMessage::Update(start(6, 7))).await.unwrap();
        drop(tx);

        assert_eq!(dispatcher.run(rx).await, 2);
    }
}
