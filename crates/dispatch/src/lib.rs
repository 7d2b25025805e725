//! Outbound message routing: destination normalization, message intents,
//! and delivery through a ready session.

pub mod dispatcher;
pub mod error;
pub mod intent;
pub mod phone;

pub use {
    dispatcher::{Delivery, Dispatcher},
    error::{Error, Result},
    intent::{IntentFields, MessageIntent},
    phone::PhonePolicy,
};
