//! # ChurchFlow Worker Library
//!
//! Delivers queued communications. The API moves a communication to SENDING
//! (or SCHEDULED with a send time); the worker claims it, resolves the
//! recipients and hands it to a dispatcher.
//!
//! ## Modules
//!
//! - `config`: environment-driven settings
//! - `queue`: claiming and settling rows of the `communications` table
//! - `dispatcher`: delivery backends (log, webhook)
//! - `orchestrator`: the polling loop
//!
//! ## Example
//!
//! ```no_run
//! use churchflow_worker::dispatcher::{Dispatcher, LogDispatcher};
//!
//! let dispatcher = LogDispatcher::new();
//! println!("Dispatcher: {}", dispatcher.name());
//! ```

pub mod config;
pub mod dispatcher;
pub mod orchestrator;
pub mod queue;
