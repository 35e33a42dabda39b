//! Logging infrastructure: structured event logging.
//!
//! Provides [`JsonlEventLogger`], a JSONL file writer fed by an
//! [`EventBus`](conductor_application::EventBus) subscription.

mod jsonl_logger;

pub use jsonl_logger::JsonlEventLogger;
