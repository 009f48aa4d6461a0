//! Transport boundary to the remote tax-compliance service.
//!
//! This crate provides:
//! - The request/response wire documents ([`RequestDocument`], [`ResponseDocument`])
//! - The [`TaxServiceClient`] trait and its reqwest implementation
//! - [`InMemoryTaxService`], a flat-rate fake for tests and local runs
//! - [`retry_transient`] for caller-side retries of transient failures

pub mod client;
pub mod document;
pub mod error;
pub mod http;
pub mod memory;
pub mod retry;

pub use client::TaxServiceClient;
pub use document::{
    AddressBlock, Addresses, AdjustTransactionRequest, AdjustmentReason, DISCOUNT_LINE_PREFIX,
    DocumentStatus, JurisdictionDetail, LineEntry, RequestDocument, ResponseDocument,
    ResponseLine,
};
pub use error::{Result, TransportError};
pub use http::{HttpClientConfig, HttpTaxServiceClient};
pub use memory::{InMemoryTaxService, RecordedCall};
pub use retry::{RetryPolicy, retry_transient};
