use crate::error::{InvalidSettingSnafu, Result};
use crate::fetch::client::HttpClient;
use async_trait::async_trait;
use reqwest::header::{HeaderName, HeaderValue};

/// An [`HttpClient`] wrapper that injects a gateway token as an HTTP header.
///
/// The header name and value are validated once, when the wrapper is built.
pub struct ApiKey<C> {
    pub inner: C,
    header_name: HeaderName,
    value: HeaderValue,
}

impl<C> ApiKey<C> {
    pub fn new(inner: C, header_name: &str, value: &str) -> Result<Self> {
        let Ok(header_name) = HeaderName::from_bytes(header_name.as_bytes()) else {
            return InvalidSettingSnafu {
                key: "gateway header name",
                value: header_name,
            }
            .fail();
        };
        let Ok(mut value) = HeaderValue::from_str(value) else {
            return InvalidSettingSnafu {
                key: "gateway token",
                value: "<redacted>",
            }
            .fail();
        };
        value.set_sensitive(true);
        Ok(Self {
            inner,
            header_name,
            value,
        })
    }

    /// Uses `Authorization: Bearer <token>`, what most SQL-over-HTTP gateways expect.
    pub fn bearer(inner: C, token: &str) -> Result<Self> {
        Self::new(inner, "Authorization", &format!("Bearer {token}"))
    }
}

#[async_trait]
impl<C: HttpClient> HttpClient for ApiKey<C> {
    async fn execute(&self, mut req: reqwest::Request) -> reqwest::Result<reqwest::Response> {
        req.headers_mut()
            .insert(self.header_name.clone(), self.value.clone());
        self.inner.execute(req).await
    }
}
