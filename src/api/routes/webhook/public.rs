//! Public types for the webhook API

pub use crate::pipeline::InboundConfirmation as ConfirmationRequest;
