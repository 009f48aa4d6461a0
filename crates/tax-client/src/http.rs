//! reqwest-backed client for the remote tax service's REST API.

use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;
use url::Url;

use crate::client::TaxServiceClient;
use crate::document::{AdjustTransactionRequest, RequestDocument, ResponseDocument};
use crate::error::{Result, TransportError};

const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Connection settings for [`HttpTaxServiceClient`].
#[derive(Debug, Clone)]
pub struct HttpClientConfig {
    pub base_url: String,
    pub account_id: String,
    pub license_key: String,
    pub timeout: Duration,
}

impl HttpClientConfig {
    pub fn new(
        base_url: impl Into<String>,
        account_id: impl Into<String>,
        license_key: impl Into<String>,
    ) -> Self {
        Self {
            base_url: base_url.into(),
            account_id: account_id.into(),
            license_key: license_key.into(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

#[derive(Serialize)]
struct VoidBody {
    code: &'static str,
}

#[derive(Serialize)]
struct CommitBody {
    commit: bool,
}

/// HTTP client authenticating with account id and license key (basic auth).
#[derive(Debug, Clone)]
pub struct HttpTaxServiceClient {
    client: reqwest::Client,
    base_url: Url,
    account_id: String,
    license_key: String,
}

impl HttpTaxServiceClient {
    pub fn new(config: HttpClientConfig) -> Result<Self> {
        let base_url = Url::parse(&config.base_url).map_err(|e| {
            TransportError::Configuration(format!("invalid base URL {:?}: {e}", config.base_url))
        })?;
        if base_url.cannot_be_a_base() {
            return Err(TransportError::Configuration(format!(
                "base URL {base_url} cannot carry a path"
            )));
        }
        if config.account_id.is_empty() || config.license_key.is_empty() {
            return Err(TransportError::Configuration(
                "account id and license key are required".to_string(),
            ));
        }

        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| {
                TransportError::Configuration(format!("failed to build HTTP client: {e}"))
            })?;

        Ok(Self {
            client,
            base_url,
            account_id: config.account_id,
            license_key: config.license_key,
        })
    }

    /// Builds `<base>/api/v2/<segments...>`, percent-encoding each segment.
    fn endpoint(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| {
                TransportError::Configuration(format!("base URL {} cannot carry a path", self.base_url))
            })?
            .pop_if_empty()
            .extend(["api", "v2"])
            .extend(segments);
        Ok(url)
    }

    fn transaction_endpoint(&self, company_code: &str, code: &str, action: &str) -> Result<Url> {
        let mut segments = vec!["companies", company_code, "transactions", code];
        if !action.is_empty() {
            segments.push(action);
        }
        self.endpoint(&segments)
    }

    async fn send(&self, url: &Url, request: reqwest::RequestBuilder) -> Result<reqwest::Response> {
        let response = request
            .basic_auth(&self.account_id, Some(&self.license_key))
            .send()
            .await
            .map_err(|e| map_send_error(url, e))?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        tracing::warn!(endpoint = %url, status = status.as_u16(), "tax service returned error status");
        if status.is_server_error() {
            Err(TransportError::Server {
                endpoint: url.to_string(),
                status: status.as_u16(),
                body,
            })
        } else {
            Err(TransportError::Client {
                endpoint: url.to_string(),
                status: status.as_u16(),
                body,
            })
        }
    }

    async fn post<B: Serialize + ?Sized, T: DeserializeOwned>(&self, url: Url, body: &B) -> Result<T> {
        let response = self.send(&url, self.client.post(url.clone()).json(body)).await?;
        decode(&url, response).await
    }
}

fn map_send_error(url: &Url, error: reqwest::Error) -> TransportError {
    if error.is_timeout() {
        TransportError::Timeout {
            endpoint: url.to_string(),
        }
    } else {
        TransportError::Connection {
            endpoint: url.to_string(),
            reason: error.to_string(),
        }
    }
}

async fn decode<T: DeserializeOwned>(url: &Url, response: reqwest::Response) -> Result<T> {
    let body = response.text().await.map_err(|e| map_send_error(url, e))?;
    serde_json::from_str(&body).map_err(|e| TransportError::Decode {
        endpoint: url.to_string(),
        reason: e.to_string(),
    })
}

#[async_trait]
impl TaxServiceClient for HttpTaxServiceClient {
    #[tracing::instrument(skip(self, document), fields(code = %document.code))]
    async fn create_transaction(&self, document: &RequestDocument) -> Result<ResponseDocument> {
        let url = self.endpoint(&["transactions", "create"])?;
        self.post(url, document).await
    }

    #[tracing::instrument(skip(self, request), fields(reason = %request.adjustment_reason))]
    async fn adjust_transaction(
        &self,
        company_code: &str,
        code: &str,
        request: &AdjustTransactionRequest,
    ) -> Result<ResponseDocument> {
        let url = self.transaction_endpoint(company_code, code, "adjust")?;
        self.post(url, request).await
    }

    #[tracing::instrument(skip(self))]
    async fn void_transaction(&self, company_code: &str, code: &str) -> Result<ResponseDocument> {
        let url = self.transaction_endpoint(company_code, code, "void")?;
        self.post(url, &VoidBody { code: "DocVoided" }).await
    }

    #[tracing::instrument(skip(self))]
    async fn commit_transaction(
        &self,
        company_code: &str,
        code: &str,
    ) -> Result<ResponseDocument> {
        let url = self.transaction_endpoint(company_code, code, "commit")?;
        self.post(url, &CommitBody { commit: true }).await
    }

    #[tracing::instrument(skip(self))]
    async fn get_transaction(
        &self,
        company_code: &str,
        code: &str,
    ) -> Result<Option<ResponseDocument>> {
        let url = self.transaction_endpoint(company_code, code, "")?;
        match self.send(&url, self.client.get(url.clone())).await {
            Ok(response) => decode(&url, response).await.map(Some),
            Err(TransportError::Client { status: 404, .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client(base: &str) -> HttpTaxServiceClient {
        HttpTaxServiceClient::new(HttpClientConfig::new(base, "1100", "secret")).unwrap()
    }

    #[test]
    fn endpoint_appends_api_prefix() {
        let url = client("https://sandbox.example.com")
            .endpoint(&["transactions", "create"])
            .unwrap();
        assert_eq!(
            url.as_str(),
            "https://sandbox.example.com/api/v2/transactions/create"
        );
    }

    #[test]
    fn transaction_endpoint_encodes_segments() {
        let url = client("https://sandbox.example.com/")
            .transaction_endpoint("ACME CO", "R/100", "adjust")
            .unwrap();
        assert_eq!(
            url.as_str(),
            "https://sandbox.example.com/api/v2/companies/ACME%20CO/transactions/R%2F100/adjust"
        );
    }

    #[test]
    fn rejects_invalid_configuration() {
        let bad_url = HttpTaxServiceClient::new(HttpClientConfig::new("not a url", "a", "b"));
        assert!(matches!(bad_url, Err(TransportError::Configuration(_))));

        let missing_key =
            HttpTaxServiceClient::new(HttpClientConfig::new("https://x.example.com", "a", ""));
        assert!(matches!(missing_key, Err(TransportError::Configuration(_))));
    }
}
