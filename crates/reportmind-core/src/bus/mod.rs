//! Message bus — inbound turns from channels, outbound replies to channels.

pub mod queue;
pub mod types;

pub use queue::MessageBus;
pub use types::{InboundMessage, OutboundMessage};
