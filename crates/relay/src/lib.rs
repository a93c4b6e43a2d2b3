//! Routing between clients, the operator group and the CRM mirror.
//!
//! Client messages land in a per-client topic of the operator group and are
//! linked to their sender; operator replies quoting a linked message are sent
//! back to that client. Transports feed events into [`Relay`].

pub mod client;
pub mod engine;
pub mod error;
pub mod header;
pub mod operator;
pub mod topics;

pub use {
    client::{ClientDelivery, ClientRelay},
    engine::{InboundReport, Relay, RelayOptions},
    error::{Error, ErrorClass, Result},
    operator::{IgnoreReason, OperatorOutcome, OperatorRelay, RouteMiss},
    topics::TopicResolver,
};
