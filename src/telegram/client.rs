//! Bot API client.

use std::future::Future;
use std::time::Duration;

use reqwest::Client;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::json;
use thiserror::Error;
use tracing::{debug, info, warn};

use super::RateLimiter;
use super::types::{ApiResponse, InlineKeyboardMarkup, MenuCommand, Message, Update, User};

/// Public Bot API endpoint.
const API_BASE: &str = "https://api.telegram.org";

/// Timeout for regular (non long-poll) requests.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(20);

/// Minimum spacing between outgoing sends and edits.
const MIN_SEND_INTERVAL: Duration = Duration::from_millis(40);

/// Parse mode used for every panel text.
const PARSE_MODE: &str = "Markdown";

/// Errors that can occur during Telegram operations.
#[derive(Debug, Error)]
pub enum TelegramError {
    #[error("Flood wait required: {0} seconds")]
    FloodWait(u32),

    #[error("Telegram API error {code}: {description}")]
    Api { code: i32, description: String },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Invalid API response: {0}")]
    Decode(String),
}

/// Edit failures after which the panel has to be sent anew.
const EDIT_TARGET_GONE: [&str; 4] = [
    "message to edit not found",
    "message identifier is not specified",
    "chat not found",
    "message can't be edited",
];

impl TelegramError {
    /// API error description, if Telegram returned one.
    #[must_use]
    pub fn description(&self) -> Option<&str> {
        match self {
            Self::Api { description, .. } => Some(description),
            _ => None,
        }
    }

    fn description_contains(&self, needles: &[&str]) -> bool {
        self.description().is_some_and(|d| {
            let d = d.to_lowercase();
            needles.iter().any(|n| d.contains(n))
        })
    }

    /// The edit carried exactly the content already shown.
    #[must_use]
    pub fn is_not_modified(&self) -> bool {
        self.description_contains(&["message is not modified"])
    }

    /// The message to edit no longer exists or cannot be edited.
    #[must_use]
    pub fn is_edit_target_gone(&self) -> bool {
        self.description_contains(&EDIT_TARGET_GONE)
    }

    /// The callback query expired before it was answered.
    #[must_use]
    pub fn is_stale_query(&self) -> bool {
        self.description_contains(&["query is too old", "query is not found", "query id is invalid"])
    }

    fn from_response<T>(response: ApiResponse<T>) -> Self {
        let description = response.description.unwrap_or_default();
        let retry_after = response
            .parameters
            .and_then(|p| p.retry_after)
            .or_else(|| extract_flood_wait_seconds(&description));

        match (response.error_code, retry_after) {
            (Some(429), Some(seconds)) => Self::FloodWait(seconds),
            (code, _) => Self::Api {
                code: code.unwrap_or_default(),
                description,
            },
        }
    }
}

/// Extracts flood wait seconds from an error description.
fn extract_flood_wait_seconds(err_msg: &str) -> Option<u32> {
    let patterns = ["retry after ", "FLOOD_WAIT_"];
    let lower = err_msg.to_lowercase();

    for pattern in patterns {
        if let Some(idx) = lower.find(&pattern.to_lowercase()) {
            let start = idx + pattern.len();
            let num_str: String = lower[start..]
                .chars()
                .take_while(char::is_ascii_digit)
                .collect();
            if let Ok(seconds) = num_str.parse() {
                return Some(seconds);
            }
        }
    }
    None
}

/// Chat operations the update handler needs.
pub trait ChatApi: Send + Sync {
    /// Sends a Markdown message and returns its id.
    fn send_message(
        &self,
        chat_id: i64,
        text: &str,
        markup: Option<&InlineKeyboardMarkup>,
    ) -> impl Future<Output = Result<i64, TelegramError>> + Send;

    /// Replaces the text and keyboard of an existing message.
    fn edit_message_text(
        &self,
        chat_id: i64,
        message_id: i64,
        text: &str,
        markup: Option<&InlineKeyboardMarkup>,
    ) -> impl Future<Output = Result<(), TelegramError>> + Send;

    fn delete_message(
        &self,
        chat_id: i64,
        message_id: i64,
    ) -> impl Future<Output = Result<(), TelegramError>> + Send;

    /// Answers a callback query, optionally with a toast.
    fn answer_callback_query(
        &self,
        query_id: &str,
        text: Option<&str>,
    ) -> impl Future<Output = Result<(), TelegramError>> + Send;
}

/// Bot API client over HTTPS.
pub struct TelegramBot {
    /// Shared HTTP client.
    http: Client,

    /// `https://api.telegram.org/bot<token>`.
    base_url: String,

    /// Rate limiter for outgoing messages.
    rate_limiter: RateLimiter,
}

impl TelegramBot {
    /// Creates a client for the given bot token.
    pub fn new(token: &str) -> Result<Self, TelegramError> {
        Self::with_api_base(token, API_BASE)
    }

    /// Creates a client against a custom Bot API server.
    pub fn with_api_base(token: &str, api_base: &str) -> Result<Self, TelegramError> {
        let http = Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self {
            http,
            base_url: format!("{}/bot{}", api_base.trim_end_matches('/'), token),
            rate_limiter: RateLimiter::new(MIN_SEND_INTERVAL),
        })
    }

    fn method_url(&self, method: &str) -> String {
        format!("{}/{}", self.base_url, method)
    }

    async fn call<P, R>(&self, method: &str, params: &P, timeout: Option<Duration>) -> Result<R, TelegramError>
    where
        P: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let mut request = self.http.post(self.method_url(method)).json(params);
        if let Some(timeout) = timeout {
            request = request.timeout(timeout);
        }

        let response = request.send().await?;
        let status = response.status();
        let body: ApiResponse<R> = response
            .json()
            .await
            .map_err(|e| TelegramError::Decode(format!("{method} ({status}): {e}")))?;

        if body.ok {
            return body
                .result
                .ok_or_else(|| TelegramError::Decode(format!("{method}: missing result")));
        }

        let err = TelegramError::from_response(body);
        debug!("{} failed: {}", method, err);
        Err(err)
    }

    /// Calls a rate-limited method, waiting out flood errors before returning them.
    async fn call_limited<P, R>(&self, method: &str, params: &P) -> Result<R, TelegramError>
    where
        P: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let waited = self.rate_limiter.wait_and_acquire().await;
        if !waited.is_zero() {
            debug!("Waited {:?} for rate limit", waited);
        }

        match self.call(method, params, None).await {
            Err(TelegramError::FloodWait(seconds)) => {
                self.rate_limiter.handle_flood_wait(seconds).await;
                Err(TelegramError::FloodWait(seconds))
            }
            other => other,
        }
    }

    /// Returns the bot's own account.
    pub async fn get_me(&self) -> Result<User, TelegramError> {
        self.call("getMe", &json!({}), None).await
    }

    /// Long-polls for updates after `offset`.
    pub async fn get_updates(&self, offset: i64, timeout: Duration) -> Result<Vec<Update>, TelegramError> {
        let params = json!({
            "offset": offset,
            "timeout": timeout.as_secs(),
            "allowed_updates": ["message", "callback_query"],
        });
        self.call("getUpdates", &params, Some(timeout + REQUEST_TIMEOUT))
            .await
    }

    /// Registers the webhook URL.
    pub async fn set_webhook(&self, url: &str, secret_token: Option<&str>) -> Result<(), TelegramError> {
        let mut params = json!({
            "url": url,
            "allowed_updates": ["message", "callback_query"],
        });
        if let Some(secret) = secret_token {
            params["secret_token"] = json!(secret);
        }
        let _: bool = self.call("setWebhook", &params, None).await?;
        info!("Webhook registered");
        Ok(())
    }

    /// Removes any webhook so `getUpdates` can be used.
    pub async fn delete_webhook(&self) -> Result<(), TelegramError> {
        let _: bool = self
            .call("deleteWebhook", &json!({ "drop_pending_updates": false }), None)
            .await?;
        Ok(())
    }

    /// Publishes the command menu.
    pub async fn set_my_commands(&self, commands: &[MenuCommand]) -> Result<(), TelegramError> {
        let _: bool = self
            .call("setMyCommands", &json!({ "commands": commands }), None)
            .await?;
        Ok(())
    }
}

impl ChatApi for TelegramBot {
    async fn send_message(
        &self,
        chat_id: i64,
        text: &str,
        markup: Option<&InlineKeyboardMarkup>,
    ) -> Result<i64, TelegramError> {
        let mut params = json!({
            "chat_id": chat_id,
            "text": text,
            "parse_mode": PARSE_MODE,
            "link_preview_options": { "is_disabled": true },
        });
        if let Some(markup) = markup {
            params["reply_markup"] = json!(markup);
        }
        let message: Message = self.call_limited("sendMessage", &params).await?;
        Ok(message.message_id)
    }

    async fn edit_message_text(
        &self,
        chat_id: i64,
        message_id: i64,
        text: &str,
        markup: Option<&InlineKeyboardMarkup>,
    ) -> Result<(), TelegramError> {
        let mut params = json!({
            "chat_id": chat_id,
            "message_id": message_id,
            "text": text,
            "parse_mode": PARSE_MODE,
            "link_preview_options": { "is_disabled": true },
        });
        if let Some(markup) = markup {
            params["reply_markup"] = json!(markup);
        }
        // Result is the edited message or `true`; neither is needed.
        let _: serde_json::Value = self.call_limited("editMessageText", &params).await?;
        Ok(())
    }

    async fn delete_message(&self, chat_id: i64, message_id: i64) -> Result<(), TelegramError> {
        let params = json!({ "chat_id": chat_id, "message_id": message_id });
        let _: bool = self.call("deleteMessage", &params, None).await?;
        Ok(())
    }

    async fn answer_callback_query(&self, query_id: &str, text: Option<&str>) -> Result<(), TelegramError> {
        let mut params = json!({ "callback_query_id": query_id });
        if let Some(text) = text {
            params["text"] = json!(text);
        }
        match self.call::<_, bool>("answerCallbackQuery", &params, None).await {
            Ok(_) => Ok(()),
            Err(e) => {
                if !e.is_stale_query() {
                    warn!("Failed to answer callback query: {}", e);
                }
                Err(e)
            }
        }
    }
}

impl std::fmt::Debug for TelegramBot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelegramBot")
            .field("rate_limiter", &self.rate_limiter)
            .finish_non_exhaustive()
    }
}
