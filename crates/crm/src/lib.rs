//! CRM side of the relay.
//!
//! Mirrors client messages into a lead's timeline and pulls operator
//! activity back out of it. The CRM only supports polling, so the reverse
//! direction is a background loop driven by per-lead watermarks.

pub mod api;
pub mod binder;
pub mod cache;
pub mod echo;
pub mod error;
pub mod http;
pub mod memory;
pub mod mirror;
pub mod sync;
pub mod timestamp;
pub mod types;

pub use {
    api::CrmApi,
    binder::LeadBinder,
    cache::CrmCache,
    courier_store::LeadId,
    echo::{PrefixSelfAuthored, SelfAuthored},
    error::{Error, ErrorClass, Result},
    http::HttpCrm,
    memory::InMemoryCrm,
    mirror::{CrmMirror, MirrorChannel, MirrorReceipt},
    sync::{CycleReport, PollSynchronizer},
    types::{ChatDirection, ChatEntry, Comment, CustomFieldValue, LeadField, NewLead},
};
