use async_trait::async_trait;
use serde::Serialize;
use snafu::{OptionExt, ResultExt};
use tracing::debug;

use super::{CountSource, LiveQuery};
use crate::analyzers::types::{LiveCount, LiveCountRow};
use crate::error::{EncodeQuerySnafu, GatewaySnafu, GatewayStatusSnafu, GatewayUrlSnafu, Result};
use crate::fetch::client::HttpClient;

#[derive(Serialize)]
struct QueryRequest<'a> {
    name: &'a str,
    query: &'a str,
}

/// Runs the count query through an SQL-over-HTTP gateway.
///
/// The gateway receives `{"name": ..., "query": ...}` as a JSON POST and
/// answers with a JSON array of rows carrying `cod_recinto`,
/// `delegados_asignados` and `delegados_asignar`.
pub struct GatewayCountSource<C> {
    client: C,
    url: String,
}

impl<C: HttpClient> GatewayCountSource<C> {
    pub fn new(client: C, url: impl Into<String>) -> Self {
        Self {
            client,
            url: url.into(),
        }
    }

    fn request(&self, query: &LiveQuery) -> Result<reqwest::Request> {
        let url: reqwest::Url = self
            .url
            .parse()
            .ok()
            .context(GatewayUrlSnafu { url: &self.url })?;

        let body = serde_json::to_vec(&QueryRequest {
            name: &query.name,
            query: &query.sql,
        })
        .context(EncodeQuerySnafu { query: &query.name })?;

        let mut req = reqwest::Request::new(reqwest::Method::POST, url);
        req.headers_mut().insert(
            reqwest::header::CONTENT_TYPE,
            reqwest::header::HeaderValue::from_static("application/json"),
        );
        *req.body_mut() = Some(body.into());
        Ok(req)
    }
}

#[async_trait]
impl<C: HttpClient> CountSource for GatewayCountSource<C> {
    fn describe(&self) -> String {
        format!("gateway {}", self.url)
    }

    async fn run(&self, query: &LiveQuery) -> Result<Vec<LiveCount>> {
        let req = self.request(query)?;
        let response = self.client.execute(req).await.context(GatewaySnafu)?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return GatewayStatusSnafu { status, body }.fail();
        }

        let rows: Vec<LiveCountRow> = response.json().await.context(GatewaySnafu)?;
        debug!(rows = rows.len(), "Gateway rows decoded");
        Ok(rows.into_iter().map(LiveCount::from).collect())
    }
}
