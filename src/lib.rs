//! chat-ledger: records household purchases sent as chat messages into a single shared ledger and
//! organizes them into categorized monthly summaries on demand.

pub mod api;
pub mod args;
pub mod commands;
mod config;
pub mod dispatch;
mod error;
pub mod ledger;
pub mod model;
pub mod organize;
pub mod parse;
pub mod server;
mod utils;


pub use api::Mode;
pub use config::{ClassifierSettings, Config};
pub use error::Error;
pub use error::Result;
