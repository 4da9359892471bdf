//! Conversation handling.
//!
//! Parses slash commands and inline-button callbacks, renders the panels
//! and drives the per-user editing flow.

mod handler;
mod types;
pub mod views;

pub use handler::{HandlerError, UpdateHandler};
pub use types::{BotCommand, CallbackAction, DATE_FORMAT, NoteField};
pub use views::Panel;
