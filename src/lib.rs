//! precache - offline cache proxy
//!
//! Precaches a fixed set of web assets into a named cache generation,
//! retires older generations on activation, and answers same-origin GET
//! requests cache-first with a network fallback and an offline page.

pub mod audit;
pub mod cache;
pub mod cli;
pub mod config;
pub mod error;
pub mod http;
pub mod network;
pub mod ui;
pub mod worker;

#[cfg(test)]
pub(crate) mod testing;

pub use error::{PrecacheError, PrecacheResult};
