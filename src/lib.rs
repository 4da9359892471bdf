//! Etapy Bot Library
//!
//! A Telegram bot for tracking the stages of construction projects.
//!
//! This crate provides the core functionality for:
//! - Loading runtime settings from the environment
//! - Storing projects and stage progress in a shared Excel workbook
//! - Talking to the Telegram Bot API over webhook or long polling
//! - Driving the per-user panel conversation

pub mod commands;
pub mod config;
pub mod dispatcher;
pub mod store;
pub mod telegram;
