//! Core of the promotion-draw bot.
//!
//! Framework-agnostic: Telegram and Postgres live behind ports
//! ([`messaging::port::MessagingPort`], [`store::Store`]) implemented in the
//! adapter crates. This crate owns dispatch, rate limiting, claims, the admin
//! dialog and routing.

pub mod callback;
pub mod claim;
pub mod config;
pub mod deadline;
pub mod dialog;
pub mod dispatch;
pub mod domain;
pub mod errors;
pub mod formatting;
pub mod logging;
pub mod messaging;
pub mod ratelimit;
pub mod router;
pub mod store;
pub mod texts;

#[cfg(test)]
pub(crate) mod testing;

pub use errors::{Error, Result};
