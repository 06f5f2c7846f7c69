use async_trait::async_trait;
use reqwest::{Request, Response};
use std::time::Duration;

/// Executes prepared HTTP requests; wrappers such as
/// [`super::auth::ApiKey`] layer credentials on top.
#[async_trait]
pub trait HttpClient: Send + Sync {
    async fn execute(&self, req: Request) -> reqwest::Result<Response>;
}

/// Plain `reqwest` client with connect and request timeouts.
pub struct BasicClient(reqwest::Client);

impl BasicClient {
    pub fn new(timeout: Duration) -> reqwest::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .connect_timeout(Duration::from_secs(10).min(timeout))
            .build()?;
        Ok(Self(client))
    }
}

#[async_trait]
impl HttpClient for BasicClient {
    async fn execute(&self, req: Request) -> reqwest::Result<Response> {
        self.0.execute(req).await
    }
}
