//! Telegram Bot API integration.
//!
//! Provides the HTTPS client, the wire types, rate limiting and the two
//! update sources (webhook listener and long polling).

mod client;
mod polling;
mod rate_limiter;
mod types;
pub mod webhook;

pub use client::{ChatApi, TelegramBot, TelegramError};
pub use polling::run_polling;
pub use rate_limiter::RateLimiter;
pub use types::{
    CallbackQuery, Chat, InlineKeyboardButton, InlineKeyboardMarkup, MenuCommand, Message, PhotoSize,
    Update, User,
};
