//! API Client (spec §4.2): one request per poll, classified into a tagged
//! [`ApiOutcome`].

mod client;
mod outcome;

pub use client::ApiClient;
pub use outcome::{ApiOutcome, ApiPayload, TransportErrorKind};
