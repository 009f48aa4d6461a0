//! The transport boundary to the remote tax service.

use std::sync::Arc;

use async_trait::async_trait;

use crate::document::{AdjustTransactionRequest, RequestDocument, ResponseDocument};
use crate::error::Result;

/// Operations the remote tax service exposes.
///
/// Implementations perform no business logic and never retry on their own;
/// see [`crate::retry::retry_transient`] for caller-side retries.
#[async_trait]
pub trait TaxServiceClient: Send + Sync {
    /// Creates a transaction from a request document.
    async fn create_transaction(&self, document: &RequestDocument) -> Result<ResponseDocument>;

    /// Replaces an existing transaction's content.
    async fn adjust_transaction(
        &self,
        company_code: &str,
        code: &str,
        request: &AdjustTransactionRequest,
    ) -> Result<ResponseDocument>;

    async fn void_transaction(&self, company_code: &str, code: &str) -> Result<ResponseDocument>;

    async fn commit_transaction(&self, company_code: &str, code: &str)
    -> Result<ResponseDocument>;

    /// Fetches a transaction by document code. Returns `None` when the
    /// service has no such transaction.
    async fn get_transaction(
        &self,
        company_code: &str,
        code: &str,
    ) -> Result<Option<ResponseDocument>>;
}

#[async_trait]
impl<T> TaxServiceClient for Arc<T>
where
    T: TaxServiceClient + ?Sized,
{
    async fn create_transaction(&self, document: &RequestDocument) -> Result<ResponseDocument> {
        (**self).create_transaction(document).await
    }

    async fn adjust_transaction(
        &self,
        company_code: &str,
        code: &str,
        request: &AdjustTransactionRequest,
    ) -> Result<ResponseDocument> {
        (**self).adjust_transaction(company_code, code, request).await
    }

    async fn void_transaction(&self, company_code: &str, code: &str) -> Result<ResponseDocument> {
        (**self).void_transaction(company_code, code).await
    }

    async fn commit_transaction(
        &self,
        company_code: &str,
        code: &str,
    ) -> Result<ResponseDocument> {
        (**self).commit_transaction(company_code, code).await
    }

    async fn get_transaction(
        &self,
        company_code: &str,
        code: &str,
    ) -> Result<Option<ResponseDocument>> {
        (**self).get_transaction(company_code, code).await
    }
}
