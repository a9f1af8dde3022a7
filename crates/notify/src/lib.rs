//! Delivery of countdown notifications.
//!
//! This crate provides:
//! - `Notifier` trait for pluggable delivery channels
//! - Webhook and log notifier implementations
//! - Minijinja rendering of notification messages
//! - `Dispatcher` that routes a notification to the channel named by its service id

pub mod config;
pub mod dispatcher;
pub mod log;
pub mod templating;
pub mod traits;
pub mod webhook;

pub use config::{ChannelConfig, ChannelKind, NotifyConfig};
pub use dispatcher::Dispatcher;
pub use templating::MessageContext;
pub use traits::{DispatchResult, Notification, Notifier, NotifyError};
